//! Per-side boundary models and their acquisition state machine.

use crate::polyfit::QuadraticFit;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Left => "left",
            Side::Right => "right",
        })
    }
}

/// Whether a side has a fit that the next frame can search around.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingStatus {
    #[default]
    Unacquired,
    Tracking,
}

/// Outcome of one frame's fit attempt for a side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitEvent {
    Fitted,
    Failed,
}

/// Next status of a side.
///
/// A successful fit always moves to `Tracking`. A failure keeps the current
/// status until `degraded_frames` (already counting this failure) reaches
/// `limit`, which forces `Unacquired` so the next frame runs a sliding-window
/// search.
pub fn transition(
    current: TrackingStatus,
    event: FitEvent,
    degraded_frames: u32,
    limit: u32,
) -> TrackingStatus {
    match event {
        FitEvent::Fitted => TrackingStatus::Tracking,
        FitEvent::Failed if degraded_frames >= limit => TrackingStatus::Unacquired,
        FitEvent::Failed => current,
    }
}

/// Result of fitting one side's pixel set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SideFit {
    pub pixel_fit: QuadraticFit,
    pub meter_fit: QuadraticFit,
    pub curvature_radius: f64,
    pub base_x: f64,
}

/// Persistent representation of one tracked lane edge.
#[derive(Clone, Debug)]
pub struct BoundaryModel {
    pub side: Side,
    pub status: TrackingStatus,
    /// Pixels attributed to this side in the current frame.
    pub pixel_x: Vec<u32>,
    pub pixel_y: Vec<u32>,
    pub current_fit: Option<QuadraticFit>,
    pub meter_fit: Option<QuadraticFit>,
    /// Meters; `f64::INFINITY` for a straight boundary.
    pub curvature_radius: Option<f64>,
    /// Bird's-eye x of the boundary in the bottom band, pixels.
    pub base_x: Option<f64>,
    pub degraded_frames: u32,
    history: VecDeque<QuadraticFit>,
    history_len: usize,
}

impl BoundaryModel {
    pub fn new(side: Side, history_len: usize) -> Self {
        Self {
            side,
            status: TrackingStatus::Unacquired,
            pixel_x: Vec::new(),
            pixel_y: Vec::new(),
            current_fit: None,
            meter_fit: None,
            curvature_radius: None,
            base_x: None,
            degraded_frames: 0,
            history: VecDeque::with_capacity(history_len),
            history_len,
        }
    }

    #[inline]
    pub fn is_tracking(&self) -> bool {
        self.status == TrackingStatus::Tracking
    }

    /// Last successful pixel-space fits, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &QuadraticFit> {
        self.history.iter()
    }

    /// Coefficient-wise mean over the fit history.
    pub fn smoothed_fit(&self) -> Option<QuadraticFit> {
        QuadraticFit::mean(&self.history)
    }

    /// Replace the pixel set for this frame.
    pub(crate) fn set_pixels(&mut self, x: Vec<u32>, y: Vec<u32>) {
        self.pixel_x = x;
        self.pixel_y = y;
    }

    /// Store a fit computed from the current pixel set.
    pub(crate) fn accept(&mut self, fit: SideFit) {
        self.current_fit = Some(fit.pixel_fit);
        self.meter_fit = Some(fit.meter_fit);
        self.curvature_radius = Some(fit.curvature_radius);
        self.base_x = Some(fit.base_x);
        self.degraded_frames = 0;
        if self.history.len() == self.history_len {
            self.history.pop_front();
        }
        self.history.push_back(fit.pixel_fit);
        self.status = transition(self.status, FitEvent::Fitted, 0, 0);
    }

    /// Keep the previous fit and count a degraded frame.
    pub(crate) fn degrade(&mut self, limit: u32) {
        self.degraded_frames = self.degraded_frames.saturating_add(1);
        let next = transition(self.status, FitEvent::Failed, self.degraded_frames, limit);
        if next != self.status {
            log::warn!(
                "{} boundary lost after {} degraded frames, re-acquiring",
                self.side,
                self.degraded_frames
            );
        }
        self.status = next;
    }
}
