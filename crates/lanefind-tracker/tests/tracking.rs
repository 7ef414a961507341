mod common;

use common::synthetic_mask::{mask_with_curves, vertical_lines};
use lanefind_core::GrayImage;
use lanefind_tracker::{
    local_search, sliding_window_search, LaneState, QuadraticFit, SearchStrategy, Side,
    TrackError, TrackerParams, TrackingStatus,
};

const W: usize = 1280;
const H: usize = 720;

fn curved_pair() -> GrayImage {
    mask_with_curves(
        W,
        H,
        &[(1e-4, -0.05, 380.0), (1e-4, -0.05, 880.0)],
        6,
    )
}

#[test]
fn sliding_windows_split_two_clusters() {
    let params = TrackerParams::default();
    let mask = mask_with_curves(W, H, &[(0.0, 0.0, 350.0), (0.0, 0.0, 950.0)], 12);
    let res = sliding_window_search(&mask.view(), &params);

    assert!(!res.left.is_empty() && !res.right.is_empty());
    let left_mean = res.left.mean_x_below(0).unwrap();
    let right_mean = res.right.mean_x_below(0).unwrap();
    let margin = params.margin as f64;
    assert!((left_mean - 350.0).abs() < margin, "left mean {left_mean}");
    assert!((right_mean - 950.0).abs() < margin, "right mean {right_mean}");
    assert!(res.left.x.iter().all(|&x| (344..=356).contains(&x)));
    assert!(res.right.x.iter().all(|&x| (944..=956).contains(&x)));
}

#[test]
fn local_search_keeps_band_and_drops_outliers() {
    let left = QuadraticFit {
        a: 2e-4,
        b: -0.1,
        c: 400.0,
    };
    let right = QuadraticFit { c: 900.0, ..left };
    let mut mask = mask_with_curves(W, H, &[(left.a, left.b, left.c), (right.a, right.b, right.c)], 1);
    // Clutter farther than the margin from either curve.
    for y in (0..H).step_by(3) {
        let x = left.eval(y as f64).round() as usize + 130;
        mask.set(x, y, 255);
    }

    let margin = 100.0;
    let (l, r) = local_search(&mask.view(), &left, &right, margin);
    assert_eq!(l.len(), H);
    assert_eq!(r.len(), H);
    for (&x, &y) in l.x.iter().zip(&l.y) {
        assert!((x as f64 - left.eval(y as f64)).abs() < margin);
    }
}

#[test]
fn straight_lines_report_exact_offset_and_infinite_curvature() {
    let params = TrackerParams::default();
    let xm = params.xm_per_pix;
    let mut state = LaneState::new(W, H, params).unwrap();
    let mask = vertical_lines(W, H, 400, 900);

    let out = state.update(&mask.view()).unwrap();
    assert_eq!(out.strategy, SearchStrategy::SlidingWindow);
    assert!(out.failures.is_empty());

    let m = out.measurement.unwrap();
    let expected = (((400.0 + 900.0) / 2.0) - 640.0) * xm;
    assert!((m.offset_m - expected).abs() < 1e-12, "offset {}", m.offset_m);
    assert!((m.signed_offset_m - expected).abs() < 1e-12);
    assert!(m.curvature_m.is_infinite() || m.curvature_m > 1e6);
    assert!(m.left_radius_m > 1e6 && m.right_radius_m > 1e6);
}

#[test]
fn occluded_frame_holds_previous_measurement() {
    let mut state = LaneState::new(W, H, TrackerParams::default()).unwrap();
    let lanes = curved_pair();
    let empty = GrayImage::new(W, H);

    let mut outputs = Vec::new();
    for frame in 1..=10 {
        let mask = if frame == 5 { &empty } else { &lanes };
        outputs.push(state.update(&mask.view()).expect("frame must not fail"));
    }

    let frame4 = outputs[3].measurement.unwrap();
    let frame5 = &outputs[4];
    assert_eq!(frame5.measurement.unwrap(), frame4);
    assert_eq!(frame5.degraded_sides(), vec![Side::Left, Side::Right]);
    assert!(matches!(
        frame5.failures[0],
        TrackError::NoPixelsFound { side: Side::Left }
    ));
    assert_eq!(outputs[5].strategy, SearchStrategy::Local);
    assert!(outputs[5].failures.is_empty());
    assert!(frame4.curvature_m.is_finite());
}

#[test]
fn three_degraded_frames_force_sliding_window_reacquisition() {
    let mut state = LaneState::new(W, H, TrackerParams::default()).unwrap();
    let lanes = curved_pair();
    let empty = GrayImage::new(W, H);

    assert_eq!(
        state.update(&lanes.view()).unwrap().strategy,
        SearchStrategy::SlidingWindow
    );
    for expected_degraded in 1..=3 {
        let out = state.update(&empty.view()).unwrap();
        assert_eq!(out.strategy, SearchStrategy::Local);
        assert_eq!(state.left().degraded_frames, expected_degraded);
    }
    assert_eq!(state.left().status, TrackingStatus::Unacquired);
    assert_eq!(state.right().status, TrackingStatus::Unacquired);

    let out = state.update(&lanes.view()).unwrap();
    assert_eq!(out.strategy, SearchStrategy::SlidingWindow);
    assert!(state.left().is_tracking() && state.right().is_tracking());
    assert_eq!(state.left().degraded_frames, 0);
}

#[test]
fn local_search_follows_drifting_lanes() {
    let mut state = LaneState::new(W, H, TrackerParams::default()).unwrap();
    for shift in [0.0, 20.0, 40.0, 60.0] {
        let mask = mask_with_curves(
            W,
            H,
            &[(0.0, 0.0, 400.0 + shift), (0.0, 0.0, 900.0 + shift)],
            4,
        );
        let out = state.update(&mask.view()).unwrap();
        assert!(out.failures.is_empty());
    }
    let (left, right) = state.fits().unwrap();
    assert!((left.eval(700.0) - 460.5).abs() < 1.0);
    assert!((right.eval(700.0) - 960.5).abs() < 1.0);
}

#[test]
fn smoothed_fits_average_the_last_frames() {
    let params = TrackerParams {
        history_len: 3,
        ..TrackerParams::default()
    };
    let mut state = LaneState::new(W, H, params).unwrap();
    assert!(state.smoothed_fits().is_none());
    for shift in [0.0, 20.0, 40.0, 60.0] {
        let mask = mask_with_curves(
            W,
            H,
            &[(0.0, 0.0, 400.0 + shift), (0.0, 0.0, 900.0 + shift)],
            4,
        );
        state.update(&mask.view()).unwrap();
    }
    assert_eq!(state.left().history().count(), 3);
    // Frames shifted by 20, 40 and 60 px; the first one has aged out.
    let (left, right) = state.smoothed_fits().unwrap();
    assert!((left.eval(700.0) - 440.5).abs() < 1.0, "{}", left.eval(700.0));
    assert!((right.eval(700.0) - 940.5).abs() < 1.0, "{}", right.eval(700.0));
}
