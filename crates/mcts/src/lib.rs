//! Parallel PUCT tree search for the sable chess engine.
//!
//! This crate is the node engine of a neural-network-guided search in
//! the AlphaZero/Leela tradition: a shared tree of [`Node`]s that many
//! worker threads extend cooperatively while an external evaluator
//! batches leaf positions for the network.
//!
//! # Search iteration
//!
//! 1. **Playout**: [`playout`] descends from the root picking the
//!    best-scoring child or [`Potential`] at each level, charging
//!    virtual loss so concurrent workers spread out. It returns the next
//!    leaf to score, or nothing when it keeps colliding with in-flight
//!    work (retry later).
//! 2. **Expansion & evaluation**: the leaf potentials are generated;
//!    rule draws, mates, and tablebase hits become exact values on the
//!    spot, anything else is handed to the [`Evaluator`] for priors and
//!    a value. [`expand_and_score`] packages this step.
//! 3. **Back-propagation**: the value walks to the root with its sign
//!    flipped at every ply, visit counts incremented and virtual loss
//!    released.
//!
//! The chess rules themselves live behind [`sable_core::Position`]; the
//! [`script`] module provides scripted positions for driving the search
//! in tests.
//!
//! # Example
//!
//! ```
//! use sable_core::Side;
//! use sable_mcts::script::{ScriptBoard, ScriptMove, ScriptPosition, ScriptState};
//! use sable_mcts::{expand_and_score, playout, Node, NoTablebase, SearchSettings, UniformEvaluator};
//! use std::sync::Arc;
//!
//! let board = Arc::new(ScriptBoard::new(vec![
//!     ScriptState::quiet(1, Side::White).with_moves(vec![(ScriptMove("e2e4"), 1)]),
//!     ScriptState::quiet(2, Side::Black).with_moves(vec![(ScriptMove("e7e5"), 0)]),
//! ]));
//! let root = Node::new_root(ScriptPosition::new(&board, 0));
//! let settings = SearchSettings::default();
//!
//! for _ in 0..16 {
//!     let result = playout(&root, &settings);
//!     if let Some(leaf) = result.leaf {
//!         expand_and_score(&leaf, &UniformEvaluator, &NoTablebase);
//!     }
//! }
//!
//! assert!(root.visited() > 0);
//! let (line, _depth) = root.principal_variation();
//! assert!(line.starts_with("e2e4"));
//! ```

pub mod config;
mod display;
pub mod evaluator;
pub mod node;
pub mod script;
pub mod search;
mod select;
pub mod tablebase;
mod value;

pub use config::{SearchSettings, SettingsError};
pub use evaluator::{Evaluation, Evaluator, UniformEvaluator};
pub use node::{Node, Potential, MAX_DEPTH};
pub use search::{expand_and_score, playout, Playout};
pub use select::virtual_loss_distance;
pub use tablebase::{DtzProbe, NoTablebase, Tablebase, Wdl};
