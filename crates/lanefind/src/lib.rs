//! High-level facade crate for the `lanefind-*` workspace.
//!
//! This crate provides:
//! - stable re-exports of the core, calibration and tracker crates
//! - the JSON job configuration and the per-frame [`pipeline::LanePipeline`]
//! - lane overlay rendering with diagnostic panels
//! - (feature-gated) `image` crate adapters, a cache-backed calibration
//!   session, an ordered frame source and the batch job runner behind the
//!   `lanefind` CLI.
//!
//! ## Quickstart
//!
//! ```
//! use lanefind::calib::CalibrationProfile;
//! use lanefind::config::LaneConfig;
//! use lanefind::core::RgbImage;
//! use lanefind::pipeline::LanePipeline;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (w, h) = (320, 180);
//! let profile = CalibrationProfile::identity(w, h);
//! let mut pipeline = LanePipeline::new(LaneConfig::default(), &profile, w, h)?;
//!
//! let frame = RgbImage::filled(w, h, [90, 90, 90]);
//! let result = pipeline.process_frame(&frame.view())?;
//! println!("measurement: {:?}", result.measurement);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `lanefind::core`: image buffers, homographies, binarizer, perspective mapper, logger.
//! - `lanefind::calib`: chessboard detection, camera calibration, undistortion, cache record.
//! - `lanefind::tracker`: boundary models, lane state, sliding-window and local search.
//! - `lanefind::render`: lane fill and overlay boxes.
//! - `lanefind::job` (feature `image`): run a whole image sequence and write a report.

pub use lanefind_calib as calib;
pub use lanefind_core as core;
pub use lanefind_tracker as tracker;

pub use lanefind_tracker::{LaneMeasurement, SearchStrategy, Side};

pub mod config;
mod font;
pub mod pipeline;
pub mod render;

#[cfg(feature = "image")]
pub mod adapt;
#[cfg(feature = "image")]
pub mod job;
#[cfg(feature = "image")]
pub mod session;
#[cfg(feature = "image")]
pub mod source;
