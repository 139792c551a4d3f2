//! Endgame tablebase seam.
//!
//! The search consults a tablebase at two points: a WDL probe when a
//! fresh non-root leaf is expanded, and a DTZ probe at the root to
//! materialize a known-best move. Real probing lives in the surrounding
//! engine; the search only depends on this trait.

use sable_core::Position;

/// Outcome of a win/draw/loss probe, from the perspective of the side
/// that played the move into the probed position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wdl {
    Win,
    Loss,
    Draw,
}

/// Result of a distance-to-zeroing probe: the recommended move together
/// with its outcome and the number of plies to a zeroing move.
#[derive(Clone, Copy, Debug)]
pub struct DtzProbe<M> {
    pub wdl: Wdl,
    pub best_move: M,
    pub dtz: i32,
}

/// A probe into endgame tables. `None` means the position is not
/// covered.
pub trait Tablebase<P: Position>: Send + Sync {
    /// Win/draw/loss lookup.
    fn probe(&self, game: &P) -> Option<Wdl>;

    /// Distance-to-zeroing lookup with a recommended move.
    fn probe_dtz(&self, game: &P) -> Option<DtzProbe<P::Move>>;
}

/// A tablebase covering nothing. Used when no tables are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTablebase;

impl<P: Position> Tablebase<P> for NoTablebase {
    fn probe(&self, _game: &P) -> Option<Wdl> {
        None
    }

    fn probe_dtz(&self, _game: &P) -> Option<DtzProbe<P::Move>> {
        None
    }
}
