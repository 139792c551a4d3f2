//! Evaluation abstraction for leaf scoring.
//!
//! The `Evaluator` trait is the seam to the neural network: given a leaf
//! position (plus the history its input planes need and the legal moves
//! awaiting priors), it returns a value estimate and one prior per move.
//! The adapter is responsible for softmax-normalizing priors over the
//! presented moves; the search consumes them as-is.

use sable_core::{Position, Score};

/// Evaluation result: value estimate plus per-move priors.
#[derive(Clone, Debug)]
pub struct Evaluation<M> {
    /// Value of the position from the perspective of the side whose move
    /// produced it.
    pub value: Score,

    /// Prior probability per legal move. Should sum to ~1.0 over the
    /// moves that were presented for evaluation.
    pub priors: Vec<(M, f32)>,
}

/// Trait for scoring leaf positions.
///
/// Implementations range from a batched GPU network in the engine proper
/// to the uniform stub below for tests.
pub trait Evaluator<P: Position>: Send + Sync {
    /// Evaluate a position.
    ///
    /// `history` holds the preceding positions, oldest first, as produced
    /// by the node's compact history walk. `moves` are the legal moves
    /// awaiting priors.
    fn evaluate(&self, game: &P, history: &[P], moves: &[P::Move]) -> Evaluation<P::Move>;
}

/// Evaluator assigning equal priors to every legal move and a neutral
/// value. Useful for exercising the search without a network.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformEvaluator;

impl UniformEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl<P: Position> Evaluator<P> for UniformEvaluator {
    fn evaluate(&self, _game: &P, _history: &[P], moves: &[P::Move]) -> Evaluation<P::Move> {
        let prior = if moves.is_empty() {
            0.0
        } else {
            1.0 / moves.len() as f32
        };
        Evaluation {
            value: Score::DRAW,
            priors: moves.iter().map(|&mv| (mv, prior)).collect(),
        }
    }
}
