mod common;

use approx::assert_relative_eq;
use common::synthetic_road::{blank_road, expected_offset_px, straight_road, H, ROAD, W};
use lanefind::calib::CalibrationProfile;
use lanefind::config::LaneConfig;
use lanefind::core::RgbImage;
use lanefind::pipeline::LanePipeline;
use lanefind::render::draw_lane;
use lanefind::{SearchStrategy, Side};

fn pipeline(config: LaneConfig) -> LanePipeline {
    let profile = CalibrationProfile::identity(W, H);
    LanePipeline::new(config, &profile, W, H).unwrap()
}

#[test]
fn straight_road_is_acquired_then_tracked() {
    let config = LaneConfig::default();
    let xm = config.tracker.xm_per_pix;
    let mut p = pipeline(config);
    let frame = straight_road();

    let first = p.process_frame(&frame.view()).unwrap();
    assert_eq!(first.strategy, SearchStrategy::SlidingWindow);
    assert!(first.degraded.is_empty(), "{:?}", first.degraded);
    let m = first.measurement.expect("both lines fitted");
    let offset_px = m.signed_offset_m / xm;
    assert!(
        (offset_px - expected_offset_px()).abs() < 3.0,
        "offset {offset_px} px, expected {}",
        expected_offset_px()
    );
    assert_relative_eq!(m.offset_m, m.signed_offset_m.abs());
    assert!(m.curvature_m > 500.0, "curvature {}", m.curvature_m);

    let second = p.process_frame(&frame.view()).unwrap();
    assert_eq!(second.index, 1);
    assert_eq!(second.strategy, SearchStrategy::Local);
    assert!(second.measurement.is_some());
}

#[test]
fn lane_fill_is_drawn_between_the_lines() {
    let mut config = LaneConfig::default();
    config.overlay.enabled = false;
    let mut p = pipeline(config);
    let out = p.process_frame(&straight_road().view()).unwrap();

    let inside = out.image.get(W / 2, H - 6);
    assert!(inside[1] > ROAD[1] + 50, "{inside:?}");
    assert_eq!(inside[0], ROAD[0]);
    // Above the road trapezoid nothing is drawn.
    assert_eq!(out.image.get(12, 12), ROAD);
}

/// `frame` moved `dx` pixels to the right, uncovered columns filled with road.
fn shifted(frame: &RgbImage, dx: usize) -> RgbImage {
    let mut out = RgbImage::filled(frame.width, frame.height, ROAD);
    for y in 0..frame.height {
        for x in dx..frame.width {
            out.set(x, y, frame.get(x - dx, y));
        }
    }
    out
}

#[test]
fn lane_fill_follows_the_recent_fit_average() {
    let mut config = LaneConfig::default();
    config.overlay.enabled = false;
    let blend = config.overlay.lane_blend;
    let mut p = pipeline(config);
    let road = straight_road();
    let moved = shifted(&road, 12);

    p.process_frame(&road.view()).unwrap();
    let out = p.process_frame(&moved.view()).unwrap();

    let state = p.state();
    assert_eq!(state.left().history().count(), 2);
    let (sl, sr) = state.smoothed_fits().unwrap();
    let (cl, cr) = state.fits().unwrap();
    assert!((sl.c - cl.c).abs() > 1.0, "smoothed {} vs current {}", sl.c, cl.c);

    assert_eq!(out.image, draw_lane(&moved, &sl, &sr, p.mapper(), blend));
    assert_ne!(out.image, draw_lane(&moved, &cl, &cr, p.mapper(), blend));
}

#[test]
fn overlay_shades_the_diagnostic_boxes() {
    let mut p = pipeline(LaneConfig::default());
    let out = p.process_frame(&straight_road().view()).unwrap();
    assert_eq!(out.image.get(12, 12), [30, 30, 30]);
}

#[test]
fn blank_frames_degrade_then_reacquire() {
    let mut p = pipeline(LaneConfig::default());
    let road = straight_road();
    p.process_frame(&road.view()).unwrap();
    let held = p.process_frame(&road.view()).unwrap().measurement;

    let blank = blank_road();
    for _ in 0..2 {
        let out = p.process_frame(&blank.view()).unwrap();
        assert_eq!(out.strategy, SearchStrategy::Local);
        assert_eq!(out.degraded, vec![Side::Left, Side::Right]);
        // Previous fits stay in place.
        assert_eq!(out.measurement, held);
    }
    // Third failure returns both sides to acquisition.
    p.process_frame(&blank.view()).unwrap();
    let out = p.process_frame(&road.view()).unwrap();
    assert_eq!(out.strategy, SearchStrategy::SlidingWindow);
    assert!(out.degraded.is_empty());
}

#[test]
fn reset_forces_sliding_windows() {
    let mut p = pipeline(LaneConfig::default());
    let road = straight_road();
    p.process_frame(&road.view()).unwrap();
    p.reset();
    let out = p.process_frame(&road.view()).unwrap();
    assert_eq!(out.strategy, SearchStrategy::SlidingWindow);
    assert_eq!(p.frames_processed(), 2);
}
