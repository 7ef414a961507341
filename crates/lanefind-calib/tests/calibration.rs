mod common;

use approx::assert_relative_eq;
use common::synthetic_board::{board_pose, project_corners, render_board, Pose, COLS, ROWS};
use lanefind_calib::{
    calibrate, detect_chessboard, undistort_gray, CalibrationCache, CalibrationCorrespondences,
    CalibrationError, CalibrationProfile, ChessboardParams, Distortion,
};
use lanefind_core::{estimate_homography, GrayImage};
use nalgebra::Point2;

const W: usize = 640;
const H: usize = 480;

fn camera(k1: f64) -> CalibrationProfile {
    CalibrationProfile::new(
        700.0,
        700.0,
        320.0,
        240.0,
        Distortion {
            k1,
            ..Default::default()
        },
        (W, H),
    )
}

fn poses() -> Vec<Pose> {
    vec![
        board_pose(0.0, 0.0, 0.03, 22.0),
        board_pose(0.4, 0.0, -0.05, 23.0),
        board_pose(-0.4, 0.1, 0.05, 22.0),
        board_pose(0.05, 0.42, 0.0, 24.0),
        board_pose(-0.1, -0.4, -0.04, 21.0),
        board_pose(0.3, 0.3, 0.02, 23.0),
    ]
}

/// RMS distance of detected corners to the best board homography.
fn homography_residual(points: &[Point2<f32>]) -> f64 {
    let board: Vec<Point2<f32>> = (0..ROWS)
        .flat_map(|r| (0..COLS).map(move |c| Point2::new(c as f32, r as f32)))
        .collect();
    let h = estimate_homography(&board, points).unwrap();
    let sum: f64 = board
        .iter()
        .zip(points)
        .map(|(b, p)| ((h.apply(*b) - p).norm() as f64).powi(2))
        .sum();
    (sum / points.len() as f64).sqrt()
}

#[test]
fn rendered_board_corners_match_ground_truth() {
    let cam = camera(0.0);
    let pose = board_pose(0.15, -0.2, 0.05, 22.0);
    let img = render_board(&cam, &pose, W, H);

    let board = detect_chessboard(&img.view(), &ChessboardParams::default()).expect("board");
    let truth = project_corners(&cam, &pose);
    assert_eq!(board.points.len(), COLS * ROWS);
    for (k, (p, t)) in board.points.iter().zip(&truth).enumerate() {
        let err = ((p.x as f64 - t.x).powi(2) + (p.y as f64 - t.y).powi(2)).sqrt();
        assert!(err < 0.75, "corner {k}: detected {p:?}, expected {t:?}");
    }
}

#[test]
fn barrel_distorted_boards_are_found_in_every_pose() {
    let cam = camera(-0.1);
    let params = ChessboardParams::default();
    for (k, pose) in poses().iter().enumerate() {
        let img = render_board(&cam, pose, W, H);
        let board = detect_chessboard(&img.view(), &params)
            .unwrap_or_else(|| panic!("pose {k}: no board"));
        let truth = project_corners(&cam, pose);
        for (p, t) in board.points.iter().zip(&truth) {
            let err = ((p.x as f64 - t.x).powi(2) + (p.y as f64 - t.y).powi(2)).sqrt();
            assert!(err < 1.0, "pose {k}: detected {p:?}, expected {t:?}");
        }
    }
}

#[test]
fn calibration_recovers_rendered_camera() {
    let truth = camera(-0.1);
    let images: Vec<GrayImage> = poses().iter().map(|p| render_board(&truth, p, W, H)).collect();

    let corr = CalibrationCorrespondences::collect(
        images.iter().map(GrayImage::view),
        &ChessboardParams::default(),
    )
    .unwrap();
    assert_eq!(corr.views(), images.len());

    let solved = calibrate(&corr, (W, H)).unwrap();
    assert!(solved.rms_reprojection_px < 0.5, "rms {}", solved.rms_reprojection_px);
    assert!((solved.fx() - 700.0).abs() / 700.0 < 0.03, "fx {}", solved.fx());
    assert!((solved.fy() - 700.0).abs() / 700.0 < 0.03, "fy {}", solved.fy());
    assert!((solved.cx() - 320.0).abs() < 15.0, "cx {}", solved.cx());
    assert!((solved.cy() - 240.0).abs() < 15.0, "cy {}", solved.cy());
    assert!(solved.distortion.k1 < 0.0, "k1 {}", solved.distortion.k1);
}

#[test]
fn undistortion_straightens_the_board() {
    let truth = camera(-0.5);
    let pose = board_pose(0.1, 0.1, 0.0, 18.0);
    let distorted = render_board(&truth, &pose, W, H);
    let params = ChessboardParams::default();

    let before = detect_chessboard(&distorted.view(), &params).expect("distorted board");
    let corrected = undistort_gray(&distorted.view(), &truth);
    assert_eq!((corrected.width, corrected.height), (W, H));
    let after = detect_chessboard(&corrected.view(), &params).expect("corrected board");

    let res_before = homography_residual(&before.points);
    let res_after = homography_residual(&after.points);
    assert!(res_before > 0.5, "distortion too weak: {res_before}");
    assert!(res_after < 0.5 * res_before, "{res_after} vs {res_before}");
}

#[test]
fn cached_correspondences_reproduce_the_profile() {
    let truth = camera(0.0);
    let images: Vec<GrayImage> = poses()[..3].iter().map(|p| render_board(&truth, p, W, H)).collect();
    let corr = CalibrationCorrespondences::collect(
        images.iter().map(GrayImage::view),
        &ChessboardParams::default(),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration_cache.json");
    CalibrationCache::from_correspondences(&corr, "set-1")
        .write_json(&path)
        .unwrap();
    let cache = CalibrationCache::load_json(&path).unwrap();
    assert!(cache.matches([COLS, ROWS], "set-1"));

    let direct = calibrate(&corr, (W, H)).unwrap();
    let cached = calibrate(&cache.to_correspondences(), (W, H)).unwrap();
    assert_relative_eq!(direct.fx(), cached.fx(), max_relative = 1e-4);
    assert_relative_eq!(direct.cy(), cached.cy(), max_relative = 1e-4);
    assert_eq!(direct.views, cached.views);

    // A different frame size re-solves from the same points.
    let resized = calibrate(&cache.to_correspondences(), (1280, 720)).unwrap();
    assert_eq!(resized.image_size, (1280, 720));
}

#[test]
fn blank_images_are_not_usable() {
    let blank = GrayImage::new(W, H);
    let err = CalibrationCorrespondences::collect(
        [blank.view(), blank.view()],
        &ChessboardParams::default(),
    )
    .unwrap_err();
    assert_eq!(err, CalibrationError::NoUsableImages { tried: 2 });
}
