//! Scripted positions for driving the search without a rules engine.
//!
//! A [`ScriptBoard`] is a table of hand-written states and the moves
//! between them; a [`ScriptPosition`] is a cursor into that table
//! implementing the [`Position`] seam. Tests use scripts to construct
//! exactly the situations they need (mates, stalemates, repetitions,
//! tablebase hits) with none of the incidental complexity of real
//! chess.

use std::sync::atomic::{AtomicBool, AtomicI16, Ordering};
use std::sync::Arc;

use sable_core::{Position, Side};

/// Target index marking a scripted move that cannot be played at all
/// (`apply_move` returns false).
pub const REJECTED: usize = usize::MAX;

/// A move label in computer notation, e.g. `"e2e4"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScriptMove(pub &'static str);

impl std::fmt::Display for ScriptMove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// One scripted game state.
#[derive(Clone, Debug)]
pub struct ScriptState {
    /// Repetition identity: two states with equal keys count as the same
    /// position.
    pub key: u64,

    /// Side to move.
    pub side: Side,

    /// Plies since the last irreversible move.
    pub half_move_clock: u32,

    /// Dead position (no mate possible by any play).
    pub dead: bool,

    /// Which sides are in check, indexed by [`Side::index`].
    pub checked: [bool; 2],

    /// Pseudo-legal moves and their target state indices. A target of
    /// [`REJECTED`] makes the move unplayable.
    pub moves: Vec<(ScriptMove, usize)>,
}

impl ScriptState {
    /// A quiet reversible state with no moves.
    pub fn quiet(key: u64, side: Side) -> Self {
        Self {
            key,
            side,
            half_move_clock: 10,
            dead: false,
            checked: [false, false],
            moves: Vec::new(),
        }
    }

    /// Add outgoing moves.
    pub fn with_moves(mut self, moves: Vec<(ScriptMove, usize)>) -> Self {
        self.moves = moves;
        self
    }

    /// Put the given side in check.
    pub fn with_check(mut self, side: Side) -> Self {
        self.checked[side.index()] = true;
        self
    }

    /// Set the half-move clock.
    pub fn with_clock(mut self, clock: u32) -> Self {
        self.half_move_clock = clock;
        self
    }

    /// Mark the state as a dead position.
    pub fn with_dead(mut self) -> Self {
        self.dead = true;
        self
    }
}

/// A table of scripted states.
#[derive(Debug)]
pub struct ScriptBoard {
    states: Vec<ScriptState>,
}

impl ScriptBoard {
    pub fn new(states: Vec<ScriptState>) -> Self {
        Self { states }
    }

    fn state(&self, index: usize) -> &ScriptState {
        &self.states[index]
    }
}

/// Annotation caches written by the search (repetition count, mate
/// flags). Cloning a position snapshots the current annotations.
#[derive(Debug)]
struct Marks {
    repetitions: AtomicI16,
    checkmate: AtomicBool,
    stalemate: AtomicBool,
}

impl Marks {
    fn new() -> Self {
        Self {
            repetitions: AtomicI16::new(-1),
            checkmate: AtomicBool::new(false),
            stalemate: AtomicBool::new(false),
        }
    }
}

impl Clone for Marks {
    fn clone(&self) -> Self {
        Self {
            repetitions: AtomicI16::new(self.repetitions.load(Ordering::Relaxed)),
            checkmate: AtomicBool::new(self.checkmate.load(Ordering::Relaxed)),
            stalemate: AtomicBool::new(self.stalemate.load(Ordering::Relaxed)),
        }
    }
}

/// A cursor into a [`ScriptBoard`] implementing [`Position`].
#[derive(Clone, Debug)]
pub struct ScriptPosition {
    board: Arc<ScriptBoard>,
    state: usize,
    last: Option<ScriptMove>,
    marks: Marks,
}

impl ScriptPosition {
    pub fn new(board: &Arc<ScriptBoard>, start: usize) -> Self {
        Self {
            board: Arc::clone(board),
            state: start,
            last: None,
            marks: Marks::new(),
        }
    }

    /// Index of the current state in the script.
    pub fn state_index(&self) -> usize {
        self.state
    }

    fn current(&self) -> &ScriptState {
        self.board.state(self.state)
    }
}

impl Position for ScriptPosition {
    type Move = ScriptMove;

    fn apply_move(&mut self, mv: ScriptMove) -> bool {
        let target = match self.current().moves.iter().find(|(m, _)| *m == mv) {
            Some((_, target)) => *target,
            None => return false,
        };
        if target == REJECTED {
            return false;
        }
        self.state = target;
        self.last = Some(mv);
        self.marks = Marks::new();
        true
    }

    fn pseudo_legal_moves(&self, visit: &mut dyn FnMut(ScriptMove)) {
        for (mv, _) in &self.current().moves {
            visit(*mv);
        }
    }

    fn is_checked(&self, side: Side) -> bool {
        self.current().checked[side.index()]
    }

    fn active_side(&self) -> Side {
        self.current().side
    }

    fn last_move(&self) -> Option<ScriptMove> {
        self.last
    }

    fn half_move_clock(&self) -> u32 {
        self.current().half_move_clock
    }

    fn is_dead_position(&self) -> bool {
        self.current().dead
    }

    fn is_same_position(&self, other: &Self) -> bool {
        self.current().key == other.current().key
    }

    fn repetitions(&self) -> Option<u8> {
        match self.marks.repetitions.load(Ordering::Relaxed) {
            -1 => None,
            n => Some(n as u8),
        }
    }

    fn set_repetitions(&self, count: u8) {
        self.marks
            .repetitions
            .store(i16::from(count), Ordering::Relaxed);
    }

    fn set_checkmate(&self) {
        self.marks.checkmate.store(true, Ordering::Relaxed);
    }

    fn is_checkmate(&self) -> bool {
        self.marks.checkmate.load(Ordering::Relaxed)
    }

    fn set_stalemate(&self) {
        self.marks.stalemate.store(true, Ordering::Relaxed);
    }

    fn is_stalemate(&self) -> bool {
        self.marks.stalemate.load(Ordering::Relaxed)
    }
}
