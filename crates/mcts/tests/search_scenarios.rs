//! End-to-end search scenarios on scripted positions.
//!
//! Each scenario drives full playout -> expand -> score -> propagate
//! cycles the way an engine worker would, and checks the externally
//! visible behavior: exactness verdicts, selection preferences,
//! principal variations, and the worker-collision protocol.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sable_core::{cp_to_score, Position, Side};
use sable_mcts::script::{ScriptBoard, ScriptMove, ScriptPosition, ScriptState, REJECTED};
use sable_mcts::{
    expand_and_score, playout, DtzProbe, Node, NoTablebase, SearchSettings, Tablebase,
    UniformEvaluator, Wdl,
};

type ScriptNode = Arc<Node<ScriptPosition>>;

fn run_cycles(root: &ScriptNode, settings: &SearchSettings, target: usize) -> usize {
    run_cycles_with(root, settings, target, &NoTablebase)
}

fn run_cycles_with(
    root: &ScriptNode,
    settings: &SearchSettings,
    target: usize,
    tb: &dyn Tablebase<ScriptPosition>,
) -> usize {
    let mut completed = 0;
    let mut attempts = 0;
    while completed < target && attempts < target * 4 {
        attempts += 1;
        let result = playout(root, settings);
        if let Some(leaf) = result.leaf {
            expand_and_score(&leaf, &UniformEvaluator, tb);
            completed += 1;
        }
    }
    completed
}

/// Mate in one: the only legal root move checkmates.
#[test]
fn immediate_mate_is_found_and_preferred() {
    let board = Arc::new(ScriptBoard::new(vec![
        // Root: one mating move, one self-check move, one unplayable move.
        ScriptState::quiet(1, Side::White).with_moves(vec![
            (ScriptMove("d1h5"), 1),
            (ScriptMove("k1k2"), 2),
            (ScriptMove("x0x0"), REJECTED),
        ]),
        // Black checkmated: in check, no replies.
        ScriptState::quiet(2, Side::Black).with_check(Side::Black),
        // Illegal target: white (the mover) still in check.
        ScriptState::quiet(3, Side::Black).with_check(Side::White),
    ]));
    let root = Node::new_root(ScriptPosition::new(&board, 0));
    let settings = SearchSettings::default();

    let completed = run_cycles(&root, &settings, 10);
    assert_eq!(root.visited() as usize, completed);

    // Expansion left exactly the one legal move.
    assert_eq!(root.children().len(), 1);
    let mate = &root.children()[0];
    assert_eq!(mate.game().last_move(), Some(ScriptMove("d1h5")));

    assert!(mate.is_exact());
    assert!(mate.game().is_checkmate());
    let raw = mate.raw_q_value().unwrap();
    assert!(raw > 1.0, "mate value carries the distance bonus, got {raw}");

    // The mating line dominates the report.
    let best = root.best_child_for_report().unwrap();
    assert_eq!(best.game().last_move(), Some(ScriptMove("d1h5")));
    let (line, _) = root.principal_variation();
    assert!(line.starts_with("d1h5"), "pv was {line}");
}

/// Stalemate: no legal replies but not in check.
#[test]
fn stalemate_scores_zero() {
    let board = Arc::new(ScriptBoard::new(vec![
        ScriptState::quiet(1, Side::White).with_moves(vec![(ScriptMove("a2a3"), 1)]),
        // Black has nothing, and is not in check.
        ScriptState::quiet(2, Side::Black),
    ]));
    let root = Node::new_root(ScriptPosition::new(&board, 0));
    let settings = SearchSettings::default();

    run_cycles(&root, &settings, 4);

    let child = &root.children()[0];
    assert!(child.is_exact());
    assert!(child.game().is_stalemate());
    assert!(!child.game().is_checkmate());
    assert_eq!(child.raw_q_value(), Some(0.0));
}

/// A reversible shuttle reaches the same position a third time and the
/// search scores it as an exact draw.
#[test]
fn threefold_line_becomes_exact_draw() {
    let board = Arc::new(ScriptBoard::new(vec![
        ScriptState::quiet(1, Side::White).with_moves(vec![(ScriptMove("n1n2"), 1)]),
        ScriptState::quiet(2, Side::Black).with_moves(vec![(ScriptMove("n8n7"), 0)]),
    ]));
    let root = Node::new_root(ScriptPosition::new(&board, 0));
    let settings = SearchSettings::default();

    // Enough cycles to walk the line down to the repetition.
    run_cycles(&root, &settings, 8);

    // Find the deepest materialized node: the third occurrence of the
    // root position, five plies down.
    let mut node = Arc::clone(&root);
    while let Some(child) = node.children().first().cloned() {
        node = child;
    }
    assert!(node.depth() >= 4);
    assert!(node.is_three_fold());
    assert!(node.is_exact());
    assert_eq!(node.raw_q_value(), Some(0.0));
}

struct WinTable;

impl Tablebase<ScriptPosition> for WinTable {
    fn probe(&self, _game: &ScriptPosition) -> Option<Wdl> {
        Some(Wdl::Win)
    }
    fn probe_dtz(&self, _game: &ScriptPosition) -> Option<DtzProbe<ScriptMove>> {
        None
    }
}

/// A covered endgame position gets its exact value from the tablebase
/// instead of the network.
#[test]
fn tablebase_win_is_exact_below_the_root() {
    let board = Arc::new(ScriptBoard::new(vec![
        ScriptState::quiet(1, Side::White).with_moves(vec![(ScriptMove("a2a3"), 1)]),
        ScriptState::quiet(2, Side::Black).with_moves(vec![(ScriptMove("a7a6"), 0)]),
    ]));
    let root = Node::new_root(ScriptPosition::new(&board, 0));
    let settings = SearchSettings::default();

    run_cycles_with(&root, &settings, 3, &WinTable);

    // The root expanded normally (no probe at the root) but its child is
    // an exact tablebase win.
    assert!(!root.is_exact());
    let child = &root.children()[0];
    assert!(child.is_exact());
    assert!(child.is_tablebase());
    let expected = 1.0 - cp_to_score(1);
    assert!((child.raw_q_value().unwrap() - expected).abs() < 1e-6);
    assert!(!child.has_potentials());
}

/// Two simulated workers on a single-path tree: the second cannot find
/// anything to score while the first holds the only leaf.
#[test]
fn worker_collision_yields_no_leaf() {
    let board = Arc::new(ScriptBoard::new(vec![
        ScriptState::quiet(1, Side::White).with_moves(vec![(ScriptMove("a2a3"), 1)]),
        ScriptState::quiet(2, Side::Black).with_moves(vec![(ScriptMove("a7a6"), 0)]),
    ]));
    let root = Node::new_root(ScriptPosition::new(&board, 0));
    let settings = SearchSettings::default().with_try_playout_limit(3);

    // Root scored; worker one claims the single continuation.
    run_cycles(&root, &settings, 1);
    let pending = playout(&root, &settings).leaf.unwrap();
    assert!(pending.is_scoring_or_scored());
    assert!(!pending.is_exact());

    // Worker two retries until its budget dies, then reports no leaf.
    let blocked = playout(&root, &settings);
    assert!(blocked.leaf.is_none());

    // Scoring the pending leaf unblocks the path.
    expand_and_score(&pending, &UniformEvaluator, &NoTablebase);
    assert!(playout(&root, &settings).leaf.is_some());
}

/// Promoting the played move's child to root drops the rest of the tree.
#[test]
fn child_promotion_reroots_the_tree() {
    let board = Arc::new(ScriptBoard::new(vec![
        ScriptState::quiet(1, Side::White).with_moves(vec![
            (ScriptMove("e2e4"), 1),
            (ScriptMove("d2d4"), 2),
        ]),
        ScriptState::quiet(2, Side::Black).with_moves(vec![(ScriptMove("e7e5"), 3)]),
        ScriptState::quiet(3, Side::Black).with_moves(vec![(ScriptMove("d7d5"), 3)]),
        ScriptState::quiet(4, Side::White).with_dead(),
    ]));
    let root = Node::new_root(ScriptPosition::new(&board, 0));
    let settings = SearchSettings::default();

    run_cycles(&root, &settings, 6);
    let chosen = root.best_child_for_report().unwrap();
    let visits_before = chosen.visited();

    chosen.set_as_root_node();
    assert!(chosen.is_root());
    assert_eq!(chosen.depth(), 0);
    drop(root);

    // The subtree survives the old root's release and keeps searching.
    assert_eq!(chosen.visited(), visits_before);
    let completed = run_cycles(&chosen, &settings, 3);
    assert!(completed > 0);
    assert_eq!(chosen.visited(), visits_before + completed as u32);
}

/// Several OS threads extend one tree; every completed cycle lands in
/// the root's visit count.
#[test]
fn concurrent_workers_share_one_tree() {
    let board = Arc::new(ScriptBoard::new(vec![
        ScriptState::quiet(1, Side::White).with_moves(vec![
            (ScriptMove("a2a3"), 1),
            (ScriptMove("b2b3"), 2),
            (ScriptMove("c2c3"), 3),
        ]),
        ScriptState::quiet(2, Side::Black).with_moves(vec![
            (ScriptMove("a7a6"), 4),
            (ScriptMove("b7b6"), 5),
        ]),
        ScriptState::quiet(3, Side::Black).with_moves(vec![
            (ScriptMove("c7c6"), 4),
            (ScriptMove("d7d6"), 5),
        ]),
        ScriptState::quiet(4, Side::Black).with_moves(vec![(ScriptMove("e7e6"), 5)]),
        ScriptState::quiet(5, Side::White).with_dead(),
        ScriptState::quiet(6, Side::White).with_dead(),
    ]));
    let root = Node::new_root(ScriptPosition::new(&board, 0));
    let settings = SearchSettings::default();
    let completed = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let mut done = 0;
                let mut attempts = 0;
                while done < 20 && attempts < 400 {
                    attempts += 1;
                    let result = playout(&root, &settings);
                    match result.leaf {
                        Some(leaf) => {
                            expand_and_score(&leaf, &UniformEvaluator, &NoTablebase);
                            completed.fetch_add(1, Ordering::SeqCst);
                            done += 1;
                        }
                        None => std::thread::yield_now(),
                    }
                }
            });
        }
    });

    let total = completed.load(Ordering::SeqCst);
    assert!(total > 0);
    assert_eq!(root.visited() as usize, total);

    // Statistics stayed in range under contention.
    let q = root.q_value().unwrap();
    assert!((-1.0..=1.0).contains(&q), "root q = {q}");
    for child in root.children() {
        if let Some(q) = child.q_value() {
            assert!((-1.0..=1.0).contains(&q), "child q = {q}");
        }
        assert!(child.visited() <= root.visited());
    }
}
