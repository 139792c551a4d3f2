//! Search configuration parameters.
//!
//! A [`SearchSettings`] handle is passed into every playout; there is no
//! process-wide mutable configuration. The surrounding engine owns the
//! mapping from UCI options to these fields.

use thiserror::Error;

/// Errors from validating search settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("kpuct must be positive and finite, got {0}")]
    InvalidKpuct(f32),

    #[error("fpu_reduction must be non-negative and finite, got {0}")]
    InvalidFpuReduction(f32),

    #[error("try_playout_limit must be at least 1, got {0}")]
    InvalidTryPlayoutLimit(i32),

    #[error("vld_max must be at least 1, got {0}")]
    InvalidVldMax(i64),
}

/// Tunable parameters of the tree search.
#[derive(Clone, Debug)]
pub struct SearchSettings {
    /// Exploration coefficient of the PUCT formula.
    pub kpuct: f32,

    /// First-play-urgency reduction: how far below the parent's mean an
    /// unvisited candidate is assumed to sit, scaled by the square root
    /// of the prior mass already explored.
    pub fpu_reduction: f32,

    /// How many times one playout may restart after colliding with
    /// in-flight work before giving up and returning no leaf.
    pub try_playout_limit: i32,

    /// Upper bound on the virtual-loss distance a single descent may
    /// charge.
    pub vld_max: i64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            kpuct: 1.25,
            fpu_reduction: 0.3,
            try_playout_limit: 8,
            vld_max: 50,
        }
    }
}

impl SearchSettings {
    /// Check that every parameter is usable.
    ///
    /// # Errors
    /// Returns the first offending parameter.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.kpuct.is_finite() || self.kpuct <= 0.0 {
            return Err(SettingsError::InvalidKpuct(self.kpuct));
        }
        if !self.fpu_reduction.is_finite() || self.fpu_reduction < 0.0 {
            return Err(SettingsError::InvalidFpuReduction(self.fpu_reduction));
        }
        if self.try_playout_limit < 1 {
            return Err(SettingsError::InvalidTryPlayoutLimit(
                self.try_playout_limit,
            ));
        }
        if self.vld_max < 1 {
            return Err(SettingsError::InvalidVldMax(self.vld_max));
        }
        Ok(())
    }

    /// Builder pattern: set the exploration coefficient.
    pub fn with_kpuct(mut self, kpuct: f32) -> Self {
        self.kpuct = kpuct;
        self
    }

    /// Builder pattern: set the first-play-urgency reduction.
    pub fn with_fpu_reduction(mut self, fpu_reduction: f32) -> Self {
        self.fpu_reduction = fpu_reduction;
        self
    }

    /// Builder pattern: set the playout retry budget.
    pub fn with_try_playout_limit(mut self, limit: i32) -> Self {
        self.try_playout_limit = limit;
        self
    }

    /// Builder pattern: set the virtual-loss-distance cap.
    pub fn with_vld_max(mut self, vld_max: i64) -> Self {
        self.vld_max = vld_max;
        self
    }
}
