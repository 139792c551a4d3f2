//! Sable Core - Domain abstractions for the sable chess search
//!
//! This crate provides the seams between the tree search and the rest of
//! the engine: the [`Position`] trait the chess rules module implements,
//! and the value types shared across the workspace.
//!
//! # Types
//!
//! - [`Position`] - Trait for chess position handles
//! - [`Side`] - White or Black
//! - [`Score`] - Position value in [-1, 1]
//! - [`score_to_cp`] / [`cp_to_score`] - Centipawn conversion

mod error;
mod position;
mod types;

pub use error::{EngineError, Result};
pub use position::{Position, Side};
pub use types::{cp_to_score, score_to_cp, Score};
