//! Value-space types and centipawn conversion.
//!
//! A [`Score`] is a position value in [-1, 1] from the perspective of the
//! side whose move produced the position. The centipawn mapping is the
//! one the UCI front-end reports, so its constants are fixed.

use crate::{EngineError, Result};

/// Slope of the centipawn mapping. Same mapping as lc0.
const CP_SCALE: f64 = 290.680623072;

/// Argument scale of the centipawn mapping.
const CP_ARG: f64 = 1.548090806;

/// Convert a value in [-1, 1] to centipawns.
pub fn score_to_cp(score: f32) -> i32 {
    (CP_SCALE * (CP_ARG * f64::from(score)).tan()).round() as i32
}

/// Inverse of [`score_to_cp`].
pub fn cp_to_score(cp: i32) -> f32 {
    ((f64::from(cp) / CP_SCALE).atan() / CP_ARG) as f32
}

/// A position value estimate.
///
/// Invariant: the value is in [-1, 1], where +1 means the move leading to
/// the position was winning for the mover and -1 that it was losing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Score(f32);

impl Score {
    /// Create a new score.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidScore`] if the value is outside [-1, 1].
    pub fn new(value: f32) -> Result<Self> {
        if !(-1.0..=1.0).contains(&value) {
            return Err(EngineError::InvalidScore(value));
        }
        Ok(Self(value))
    }

    /// Create a score by clamping to [-1, 1].
    ///
    /// Use this for network outputs that may drift slightly outside the
    /// valid range.
    pub fn clamped(value: f32) -> Self {
        Self(value.clamp(-1.0, 1.0))
    }

    /// Score for a win.
    pub const WIN: Self = Self(1.0);

    /// Score for a loss.
    pub const LOSS: Self = Self(-1.0);

    /// Score for a draw.
    pub const DRAW: Self = Self(0.0);

    /// Get the underlying value.
    pub fn get(self) -> f32 {
        self.0
    }

    /// Negate the score (for the opponent's perspective).
    pub fn negate(self) -> Self {
        Self(-self.0)
    }

    /// Centipawn rendering of this score.
    pub fn to_cp(self) -> i32 {
        score_to_cp(self.0)
    }

    /// Score corresponding to a centipawn amount.
    pub fn from_cp(cp: i32) -> Self {
        Self::clamped(cp_to_score(cp))
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

impl From<Score> for f32 {
    fn from(s: Score) -> f32 {
        s.0
    }
}
