//! Search-tree nodes.
//!
//! A [`Node`] is one vertex of the shared search tree: a position handle
//! plus the visit statistics the PUCT rule reads, links to materialized
//! children and to [`Potential`] moves that have priors but no node yet,
//! and the exactness state for game-theoretic terminals.
//!
//! Children are owned (`Arc`); the parent link is a `Weak` back-pointer
//! that [`Node::set_as_root_node`] clears before the old root is
//! released. Statistics live in atomics so concurrent playouts can read
//! them lock-free; the per-node `update_lock` serializes the incremental
//! mean update, and a single edges mutex guards both lists so a move can
//! never be present as a child and a potential at once.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use sable_core::{cp_to_score, Position};
use tracing::trace;

use crate::config::SearchSettings;
use crate::tablebase::{Tablebase, Wdl};
use crate::value::AtomicValue;

/// Depth horizon of the mate-distance bonus: a mate at depth `d` scores
/// `1 + (MAX_DEPTH - d) * 1e-4`, so shorter mates rank higher.
pub const MAX_DEPTH: u32 = 128;

const MATE_DISTANCE_STEP: f32 = 1.0e-4;

/// Number of preceding positions the compact history keeps (the network
/// input planes look this far back).
const PREVIOUS_MOVE_COUNT: usize = 11;

/// A legal move that has a prior but no materialized node yet.
#[derive(Clone, Copy, Debug)]
pub struct Potential<M> {
    mv: M,
    p_value: Option<f32>,
}

impl<M: Copy> Potential<M> {
    pub(crate) fn new(mv: M) -> Self {
        Self { mv, p_value: None }
    }

    /// The move this potential stands for.
    pub fn mv(&self) -> M {
        self.mv
    }

    /// Prior probability, once the policy head has assigned one.
    pub fn p_value(&self) -> Option<f32> {
        self.p_value
    }

    pub(crate) fn set_p_value(&mut self, p: f32) {
        self.p_value = Some(p);
    }
}

/// Child and potential lists, guarded together.
pub(crate) struct Edges<P: Position> {
    pub(crate) children: Vec<Arc<Node<P>>>,
    pub(crate) potentials: Vec<Potential<P::Move>>,
}

/// A vertex of the search tree.
pub struct Node<P: Position> {
    game: P,
    this: Weak<Node<P>>,
    parent: Mutex<Weak<Node<P>>>,
    edges: Mutex<Edges<P>>,
    visited: AtomicU32,
    virtual_loss: AtomicI64,
    q_value: AtomicValue,
    raw_q_value: AtomicValue,
    p_value: AtomicValue,
    policy_sum: AtomicValue,
    u_coeff: AtomicValue,
    exact: AtomicBool,
    tablebase: AtomicBool,
    scoring_or_scored: AtomicBool,
    update_lock: Mutex<()>,
}

impl<P: Position> Node<P> {
    /// Create a fresh root for the given position.
    pub fn new_root(game: P) -> Arc<Self> {
        Arc::new_cyclic(|this| Self::bare(game, this.clone(), Weak::new()))
    }

    fn new_child(parent: &Arc<Self>, game: P) -> Arc<Self> {
        Arc::new_cyclic(|this| Self::bare(game, this.clone(), Arc::downgrade(parent)))
    }

    fn bare(game: P, this: Weak<Self>, parent: Weak<Self>) -> Self {
        Self {
            game,
            this,
            parent: Mutex::new(parent),
            edges: Mutex::new(Edges {
                children: Vec::new(),
                potentials: Vec::new(),
            }),
            visited: AtomicU32::new(0),
            virtual_loss: AtomicI64::new(0),
            q_value: AtomicValue::empty(),
            raw_q_value: AtomicValue::empty(),
            p_value: AtomicValue::empty(),
            policy_sum: AtomicValue::zero(),
            u_coeff: AtomicValue::empty(),
            exact: AtomicBool::new(false),
            tablebase: AtomicBool::new(false),
            scoring_or_scored: AtomicBool::new(false),
            update_lock: Mutex::new(()),
        }
    }

    /// The position arriving at this node.
    pub fn game(&self) -> &P {
        &self.game
    }

    fn this(&self) -> Arc<Self> {
        self.this
            .upgrade()
            .expect("node must be owned by an Arc while in use")
    }

    pub(crate) fn edges(&self) -> MutexGuard<'_, Edges<P>> {
        self.edges.lock().expect("node edges mutex poisoned")
    }

    // ---- navigation ----------------------------------------------------

    /// The parent node, if this is not the root.
    pub fn parent(&self) -> Option<Arc<Self>> {
        self.parent
            .lock()
            .expect("node parent mutex poisoned")
            .upgrade()
    }

    /// Whether this node is the root of its tree.
    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    /// Walk parent links up to the root.
    pub fn root_node(&self) -> Arc<Self> {
        let mut current = self.this();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// Detach this node from its parent, making it a root. The caller is
    /// responsible for releasing the former root (and with it the
    /// discarded siblings) afterwards.
    pub fn set_as_root_node(&self) {
        if let Some(parent) = self.parent() {
            let mut edges = parent.edges();
            let before = edges.children.len();
            edges
                .children
                .retain(|child| !std::ptr::eq(Arc::as_ptr(child), self));
            debug_assert_eq!(edges.children.len() + 1, before);
        }
        *self.parent.lock().expect("node parent mutex poisoned") = Weak::new();
    }

    /// Plies between the root and this node.
    pub fn depth(&self) -> u32 {
        let mut depth = 0;
        let mut current = self.parent();
        while let Some(node) = current {
            depth += 1;
            current = node.parent();
        }
        depth
    }

    /// Height of the subtree below this node (0 for a leaf).
    pub fn tree_height(&self) -> u32 {
        let children = self.children();
        children
            .iter()
            .map(|child| 1 + child.tree_height())
            .max()
            .unwrap_or(0)
    }

    /// The positions preceding this node, oldest first. The compact form
    /// keeps only the recent history the network inputs consume.
    pub fn previous_moves(&self, full_history: bool) -> Vec<P> {
        let mut games = Vec::new();
        let mut current = self.parent();
        while let Some(node) = current {
            if !full_history && games.len() >= PREVIOUS_MOVE_COUNT {
                break;
            }
            games.push(node.game.clone());
            current = node.parent();
        }
        games.reverse();
        games
    }

    // ---- statistics ----------------------------------------------------

    /// Completed back-propagations through this node.
    pub fn visited(&self) -> u32 {
        self.visited.load(Ordering::Relaxed)
    }

    /// Phantom visits currently held by in-flight playouts.
    pub fn virtual_loss(&self) -> i64 {
        self.virtual_loss.load(Ordering::Relaxed)
    }

    pub(crate) fn add_virtual_loss(&self, amount: i64) {
        self.virtual_loss.fetch_add(amount, Ordering::Relaxed);
    }

    /// A node is already playing out while it carries virtual loss.
    pub fn is_already_playing_out(&self) -> bool {
        self.virtual_loss() > 0
    }

    /// Running mean value, once the node has been scored.
    pub fn q_value(&self) -> Option<f32> {
        self.q_value.get()
    }

    /// Initial network or exact value.
    pub fn raw_q_value(&self) -> Option<f32> {
        self.raw_q_value.get()
    }

    /// Store the initial value for this node.
    pub fn set_raw_q_value(&self, value: f32) {
        self.raw_q_value.set(value);
    }

    /// Prior probability assigned by the parent's policy head.
    pub fn p_value(&self) -> Option<f32> {
        self.p_value.get()
    }

    /// Store the prior probability.
    pub fn set_p_value(&self, value: f32) {
        self.p_value.set(value);
    }

    /// Sum of priors over children that have been visited at least once.
    pub fn policy_sum(&self) -> f32 {
        self.policy_sum.get().unwrap_or(0.0)
    }

    pub(crate) fn add_policy_sum(&self, p: f32) {
        self.policy_sum.fetch_add(p);
    }

    /// Exploration coefficient for this node's children, cached until the
    /// next visit. The cached base is the visit count alone; virtual loss
    /// fluctuates too quickly to be part of an invalidate-on-visit cache.
    pub fn u_coeff(&self, settings: &SearchSettings) -> f32 {
        if let Some(cached) = self.u_coeff.get() {
            return cached;
        }
        let coeff = settings.kpuct * (self.visited() as f32).sqrt();
        self.u_coeff.set(coeff);
        coeff
    }

    /// First-play urgency: the assumed mean of an unvisited candidate,
    /// the parent's mean reduced in proportion to the prior mass already
    /// explored.
    pub fn q_value_default(&self, settings: &SearchSettings) -> f32 {
        let q = self.q_value().unwrap_or(0.0);
        q - settings.fpu_reduction * self.policy_sum().sqrt()
    }

    /// Whether the value here is game-theoretically exact.
    pub fn is_exact(&self) -> bool {
        self.exact.load(Ordering::Relaxed)
    }

    /// Whether the exact value came from a tablebase.
    pub fn is_tablebase(&self) -> bool {
        self.tablebase.load(Ordering::Relaxed)
    }

    fn mark_exact(&self, raw: f32, from_tablebase: bool) {
        self.raw_q_value.set(raw);
        self.exact.store(true, Ordering::Relaxed);
        if from_tablebase {
            self.tablebase.store(true, Ordering::Relaxed);
        }
    }

    /// Claim this node for scoring. Only the first caller over the node's
    /// lifetime gets `true`; everyone after sees the claim taken.
    pub fn claim_for_scoring(&self) -> bool {
        !self.scoring_or_scored.swap(true, Ordering::AcqRel)
    }

    /// Whether some worker has claimed this node for scoring.
    pub fn is_scoring_or_scored(&self) -> bool {
        self.scoring_or_scored.load(Ordering::Acquire)
    }

    // ---- edges ---------------------------------------------------------

    /// Snapshot of the materialized children.
    pub fn children(&self) -> Vec<Arc<Self>> {
        self.edges().children.clone()
    }

    /// Snapshot of the unexpanded potentials.
    pub fn potentials(&self) -> Vec<Potential<P::Move>> {
        self.edges().potentials.clone()
    }

    /// Moves of the unexpanded potentials, in insertion order.
    pub fn potential_moves(&self) -> Vec<P::Move> {
        self.edges().potentials.iter().map(|p| p.mv()).collect()
    }

    pub fn has_children(&self) -> bool {
        !self.edges().children.is_empty()
    }

    pub fn has_potentials(&self) -> bool {
        !self.edges().potentials.is_empty()
    }

    /// A node is extendable while it has anywhere left to descend.
    pub fn is_extendable(&self) -> bool {
        let edges = self.edges();
        !edges.children.is_empty() || !edges.potentials.is_empty()
    }

    // ---- repetition & draw detection -----------------------------------

    /// Count of prior ancestor positions equal to this one, memoized on
    /// the position handle. Counting stops at an irreversible move or at
    /// two, which is all threefold detection needs.
    pub fn repetitions(&self) -> u8 {
        if let Some(cached) = self.game.repetitions() {
            return cached;
        }
        let mut count = 0u8;
        let mut current = self.parent();
        while let Some(node) = current {
            if self.game.is_same_position(&node.game) {
                count += 1;
            }
            if count >= 2 {
                break;
            }
            if node.game.half_move_clock() == 0 {
                break;
            }
            current = node.parent();
        }
        self.game.set_repetitions(count);
        count
    }

    /// Two prior occurrences plus the current one make three.
    pub fn is_three_fold(&self) -> bool {
        self.repetitions() >= 2
    }

    // ---- expansion -----------------------------------------------------

    /// Populate the potentials of a freshly claimed leaf, or mark the
    /// node exact when the position is terminal: rule draws first, then
    /// the tablebase (never at the root), then move enumeration, and a
    /// mate or stalemate verdict when nothing legal remains.
    pub fn generate_potentials(&self, tb: &dyn Tablebase<P>) {
        debug_assert!(!self.has_potentials());
        if self.has_potentials() {
            return;
        }

        if self.game.half_move_clock() >= 100 {
            self.mark_exact(0.0, false);
            return;
        }
        if self.game.is_dead_position() {
            self.mark_exact(0.0, false);
            return;
        }
        if self.is_three_fold() {
            self.mark_exact(0.0, false);
            return;
        }

        if !self.is_root() {
            let epsilon = cp_to_score(1);
            match tb.probe(&self.game) {
                Some(Wdl::Win) => {
                    self.mark_exact(1.0 - epsilon, true);
                    return;
                }
                Some(Wdl::Loss) => {
                    self.mark_exact(-1.0 + epsilon, true);
                    return;
                }
                Some(Wdl::Draw) => {
                    self.mark_exact(0.0, true);
                    return;
                }
                None => {}
            }
        }

        self.game
            .pseudo_legal_moves(&mut |mv| self.generate_potential(mv));

        // No legal reply: mate if in check, stalemate otherwise.
        if !self.has_potentials() {
            if self.game.is_checked(self.game.active_side()) {
                self.game.set_checkmate();
                let depth = self.depth() as f32;
                let raw = 1.0 + (MAX_DEPTH as f32) * MATE_DISTANCE_STEP - depth * MATE_DISTANCE_STEP;
                self.mark_exact(raw, false);
            } else {
                self.game.set_stalemate();
                self.mark_exact(0.0, false);
            }
            trace!(
                checkmate = self.game.is_checkmate(),
                depth = self.depth(),
                "terminal position found"
            );
            debug_assert!(self.game.is_checkmate() || self.game.is_stalemate());
        }
    }

    /// Validate one pseudo-legal move and append it as a potential.
    /// Unplayable and self-check moves are dropped silently.
    pub fn generate_potential(&self, mv: P::Move) {
        let mut game = self.game.clone();
        if !game.apply_move(mv) {
            return;
        }
        if game.is_checked(self.game.active_side()) {
            return;
        }
        self.edges().potentials.push(Potential::new(mv));
    }

    /// Hand the policy head's priors to the matching potentials.
    pub fn assign_priors(&self, priors: &[(P::Move, f32)]) {
        let mut edges = self.edges();
        for potential in edges.potentials.iter_mut() {
            if let Some((_, p)) = priors.iter().find(|(mv, _)| *mv == potential.mv()) {
                potential.set_p_value(*p);
            }
        }
    }

    /// Materialize the potential carrying `mv` into a real child,
    /// transferring the prior. Returns the child and whether this call
    /// created it: if another worker got there first the existing child
    /// is returned instead, so a move never appears twice.
    pub(crate) fn materialize(&self, mv: P::Move) -> Option<(Arc<Self>, bool)> {
        let this = self.this();
        let mut edges = self.edges();
        if let Some(index) = edges.potentials.iter().position(|p| p.mv() == mv) {
            let potential = edges.potentials.remove(index);
            let mut game = self.game.clone();
            let applied = game.apply_move(potential.mv());
            debug_assert!(applied, "potential move must remain applicable");
            if !applied {
                return None;
            }
            let child = Self::new_child(&this, game);
            if let Some(p) = potential.p_value() {
                child.set_p_value(p);
            }
            edges.children.push(Arc::clone(&child));
            Some((child, true))
        } else {
            edges
                .children
                .iter()
                .find(|child| child.game.last_move() == Some(mv))
                .map(|child| (Arc::clone(child), false))
        }
    }

    /// Materialize the potential carrying `mv`.
    pub fn generate_child(&self, mv: P::Move) -> Option<Arc<Self>> {
        self.materialize(mv).map(|(child, _)| child)
    }

    // ---- root tablebase materialization --------------------------------

    /// Probe the distance-to-zeroing table at the root and, on success,
    /// build the single recommended child with prior 1.0 and the exact
    /// value (inverted: the probe reports the parent's perspective),
    /// then back-propagate. Returns the distance to zeroing, or `None`
    /// when the table has nothing usable.
    pub fn check_and_generate_dtz(&self, tb: &dyn Tablebase<P>) -> Option<i32> {
        debug_assert!(self.is_root());
        let probe = tb.probe_dtz(&self.game)?;

        // An unplayable or illegal recommendation means the table and the
        // rules disagree; discard the probe and fall back to the network.
        let mut game = self.game.clone();
        if !game.apply_move(probe.best_move) {
            return None;
        }
        if game.is_checked(self.game.active_side()) {
            return None;
        }
        if game.is_checked(game.active_side()) {
            game.set_checkmate();
        }

        let child = Self::new_child(&self.this(), game);
        child.set_p_value(1.0);
        let epsilon = cp_to_score(1);
        match probe.wdl {
            Wdl::Win => child.mark_exact(1.0 - epsilon, true),
            Wdl::Loss => child.mark_exact(-1.0 + epsilon, true),
            Wdl::Draw => child.mark_exact(0.0, true),
        }

        // Seed an unscored root so back-propagation has a mean to fold
        // the child's value into.
        if self.q_value().is_none() {
            self.set_raw_q_value(0.0);
            self.q_value.set(0.0);
            self.visited.fetch_add(1, Ordering::Relaxed);
        }

        child.set_q_value_and_propagate();
        self.edges().children.push(child);
        trace!(dtz = probe.dtz, "root child generated from tablebase");
        Some(probe.dtz)
    }

    // ---- back-propagation ----------------------------------------------

    fn increment_visited(&self) {
        self.u_coeff.clear();
        self.virtual_loss.store(0, Ordering::Relaxed);
        self.visited.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish a freshly scored leaf: account its prior into the parent's
    /// policy sum on the first visit, copy the raw value into the mean,
    /// and propagate up to the root.
    pub fn set_q_value_and_propagate(&self) {
        debug_assert!(self.raw_q_value().is_some());
        if let Some(parent) = self.parent() {
            if self.visited() == 0 {
                parent.add_policy_sum(self.p_value().unwrap_or(0.0));
            }
        }
        {
            let _update = self.update_lock.lock().expect("node update mutex poisoned");
            if let Some(raw) = self.raw_q_value.get() {
                self.q_value.set(raw);
            }
            self.increment_visited();
        }
        self.back_propagate_value_full();
    }

    /// Fold one propagated value into this node's running mean.
    pub fn back_propagate_value(&self, value: f32) {
        let _update = self.update_lock.lock().expect("node update mutex poisoned");
        debug_assert!(self.q_value().is_some());
        debug_assert!(self.visited() > 0);
        let visits = self.visited() as f32;
        let q = self.q_value.get().unwrap_or(0.0);
        self.q_value.set((visits * q + value) / (visits + 1.0));
        self.increment_visited();
    }

    /// Walk this node's value to the root, flipping the sign at every
    /// step: what is good for the side that reached this node is bad for
    /// the side that let it happen.
    pub fn back_propagate_value_full(&self) {
        let mut value = self.q_value().unwrap_or(0.0);
        let mut current = self.parent();
        while let Some(node) = current {
            value = -value;
            node.back_propagate_value(value);
            current = node.parent();
        }
    }
}
