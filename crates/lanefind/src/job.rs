//! Batch job: frames in, annotated frames plus a JSON report out.

use crate::adapt::{save_rgb, AdaptError};
use crate::config::{ConfigError, LaneConfig};
use crate::pipeline::{LanePipeline, PipelineError};
use crate::session::{CalibrationSession, SessionError};
use crate::source::{with_frame_source, ImageSequence, SourceError};
use lanefind_calib::CalibrationProfile;
use lanefind_tracker::{SearchStrategy, Side};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

pub const REPORT_FILE: &str = "report.json";

#[derive(thiserror::Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: AdaptError,
    },
}

/// Per-frame entry of [`JobReport`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameRecord {
    pub index: usize,
    pub source: PathBuf,
    pub output: PathBuf,
    /// `None` before both boundaries are fitted, or for straight lanes.
    pub curvature_m: Option<f64>,
    pub offset_m: Option<f64>,
    pub signed_offset_m: Option<f64>,
    pub strategy: SearchStrategy,
    pub degraded: Vec<Side>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalibrationSummary {
    pub views: usize,
    pub rms_reprojection_px: f64,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub distortion: [f64; 5],
    pub from_cache: bool,
}

impl CalibrationSummary {
    fn new(profile: &CalibrationProfile, from_cache: bool) -> Self {
        Self {
            views: profile.views,
            rms_reprojection_px: profile.rms_reprojection_px,
            fx: profile.fx(),
            fy: profile.fy(),
            cx: profile.cx(),
            cy: profile.cy(),
            distortion: profile.distortion.to_array(),
            from_cache,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct JobReport {
    pub frames: Vec<FrameRecord>,
    pub processed: usize,
    pub skipped: usize,
    /// `None` when the job ran without undistortion.
    pub calibration: Option<CalibrationSummary>,
}

impl JobReport {
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), JobError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Output file name for frame `index`.
pub fn frame_file_name(index: usize) -> String {
    format!("frame_{index:05}.png")
}

/// Process every frame under `input` and write results to `output_dir`.
///
/// Configuration and calibration errors abort the job. Frames that fail to
/// decode, process or save are logged and counted in [`JobReport::skipped`].
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(config), fields(input = %input.display()))
)]
pub fn run_job(input: &Path, output_dir: &Path, config: &LaneConfig) -> Result<JobReport, JobError> {
    config.validate()?;
    let session = match &config.calibration.images_dir {
        Some(_) => Some(CalibrationSession::open(&config.calibration)?),
        None => {
            log::info!("no calibration images configured, frames are not undistorted");
            None
        }
    };
    fs::create_dir_all(output_dir)?;

    let report = with_frame_source(input, |frames| {
        process_frames(frames, output_dir, config, session.as_ref())
    })??;
    report.write_json(output_dir.join(REPORT_FILE))?;
    log::info!(
        "job finished: {} frames processed, {} skipped",
        report.processed,
        report.skipped
    );
    Ok(report)
}

/// Build the pipeline for the geometry of the first decodable frame.
fn build_pipeline(
    width: usize,
    height: usize,
    config: &LaneConfig,
    session: Option<&CalibrationSession>,
    report: &mut JobReport,
) -> Result<LanePipeline, JobError> {
    let profile = match session {
        Some(s) => {
            let profile = s.profile(width, height)?;
            report.calibration = Some(CalibrationSummary::new(&profile, s.from_cache()));
            profile
        }
        None => CalibrationProfile::identity(width, height),
    };
    Ok(LanePipeline::new(config.clone(), &profile, width, height)?)
}

fn process_frames(
    frames: &mut ImageSequence,
    output_dir: &Path,
    config: &LaneConfig,
    session: Option<&CalibrationSession>,
) -> Result<JobReport, JobError> {
    let mut report = JobReport::default();
    let mut pipeline: Option<LanePipeline> = None;

    for frame in frames {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("skipping frame: {err}");
                report.skipped += 1;
                continue;
            }
        };

        if pipeline.is_none() {
            let (w, h) = (frame.image.width, frame.image.height);
            pipeline = Some(build_pipeline(w, h, config, session, &mut report)?);
        }
        let Some(pipeline) = pipeline.as_mut() else {
            continue;
        };

        let result = match pipeline.process_frame(&frame.image.view()) {
            Ok(result) => result,
            Err(err) => {
                log::warn!("skipping {}: {err}", frame.path.display());
                report.skipped += 1;
                continue;
            }
        };

        let output = output_dir.join(frame_file_name(frame.index));
        if let Err(source) = save_rgb(&result.image, &output) {
            let err = JobError::Output {
                path: output,
                source,
            };
            log::warn!("skipping {}: {err}", frame.path.display());
            report.skipped += 1;
            continue;
        }

        let m = result.measurement;
        report.frames.push(FrameRecord {
            index: frame.index,
            source: frame.path,
            output,
            curvature_m: m.map(|m| m.curvature_m).filter(|c| c.is_finite()),
            offset_m: m.map(|m| m.offset_m),
            signed_offset_m: m.map(|m| m.signed_offset_m),
            strategy: result.strategy,
            degraded: result.degraded,
        });
        report.processed += 1;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RgbImage;

    #[test]
    fn unwritable_frame_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("frames");
        let output = dir.path().join("out");
        fs::create_dir_all(&input).unwrap();
        for i in 0..3 {
            let frame = RgbImage::filled(320, 180, [90, 90, 90]);
            save_rgb(&frame, input.join(format!("f_{i}.png"))).unwrap();
        }
        // A directory squatting on the output name makes the save fail.
        fs::create_dir_all(output.join(frame_file_name(1))).unwrap();

        let report = run_job(&input, &output, &LaneConfig::default()).unwrap();
        assert_eq!((report.processed, report.skipped), (2, 1));
        let indices: Vec<usize> = report.frames.iter().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert!(output.join(frame_file_name(2)).is_file());
        assert!(output.join(REPORT_FILE).is_file());
    }
}
