//! Playout descent and leaf scoring.
//!
//! One search iteration is: a worker runs [`playout`] from the root,
//! which descends best-score-first while charging virtual loss and
//! returns the next leaf to score. It returns nothing when it keeps
//! colliding with in-flight work; that is a retry hint, not an error.
//! The worker then has the leaf evaluated and back-propagated;
//! [`expand_and_score`] is that second half in one call.
//!
//! The descent never blocks on the evaluator: claims are atomic, and the
//! virtual-loss-distance bound lets one descent pre-charge the phantom
//! visits that keep other workers off the same path.

use std::sync::Arc;

use sable_core::Position;
use tracing::trace;

use crate::config::SearchSettings;
use crate::evaluator::Evaluator;
use crate::node::Node;
use crate::select::{select_candidates, virtual_loss_distance, Pick};
use crate::tablebase::Tablebase;

/// Outcome of one playout attempt.
pub struct Playout<P: Position> {
    /// The next leaf to score, or `None` when the local budgets ran out
    /// and the caller should retry later.
    pub leaf: Option<Arc<Node<P>>>,

    /// Plies walked by the descent that produced this outcome.
    pub depth: u32,

    /// Whether any node was materialized along the way.
    pub created_node: bool,
}

/// Descend from `start` to the next leaf worth scoring.
///
/// At each node, the first scoring claim, or an exact value (which is
/// re-propagated on every arrival), ends the descent. A node that is
/// already playing out, or that has nowhere to descend, costs one retry
/// from `try_playout_limit` and shrinks the virtual-loss budget before
/// the descent restarts from `start`; exhausting either budget yields no
/// leaf.
pub fn playout<P: Position>(start: &Arc<Node<P>>, settings: &SearchSettings) -> Playout<P> {
    let mut try_playout_limit = settings.try_playout_limit;
    let mut vld_max = settings.vld_max;
    let mut created_node = false;

    'restart: loop {
        let mut depth = 0u32;
        let mut vld = vld_max;
        let mut node = Arc::clone(start);

        loop {
            depth += 1;

            // A first claim or an exact node is our leaf. Exact nodes are
            // rescored so their value propagates again.
            if node.claim_for_scoring() || node.is_exact() {
                node.add_virtual_loss(1);
                trace!(
                    depth,
                    visits = node.visited(),
                    virtual_loss = node.virtual_loss(),
                    exact = node.is_exact(),
                    "leaf claimed"
                );
                return Playout {
                    leaf: Some(node),
                    depth,
                    created_node,
                };
            }

            // Otherwise charge virtual loss: a single phantom visit on a
            // quiet node, the remaining distance on one already playing
            // out.
            let already_playing_out = node.is_already_playing_out();
            let increment = if already_playing_out { vld - 1 } else { 1 };
            node.add_virtual_loss(increment);

            if already_playing_out || !node.is_extendable() {
                try_playout_limit -= 1;
                if try_playout_limit <= 0 {
                    trace!(depth, "retry budget exhausted, no leaf");
                    return Playout {
                        leaf: None,
                        depth,
                        created_node,
                    };
                }
                vld_max -= node.virtual_loss();
                if vld_max <= 0 {
                    trace!(depth, "virtual loss budget exhausted, no leaf");
                    return Playout {
                        leaf: None,
                        depth,
                        created_node,
                    };
                }
                trace!(depth, try_playout_limit, vld_max, "collision, restarting");
                continue 'restart;
            }

            let (best, second) = select_candidates(&node, settings);
            let Some(best) = best else {
                // Emptied between the extendability check and the scan;
                // treat it like a collision.
                try_playout_limit -= 1;
                if try_playout_limit <= 0 {
                    return Playout {
                        leaf: None,
                        depth,
                        created_node,
                    };
                }
                continue 'restart;
            };

            if let Some(second) = &second {
                let vld_new = virtual_loss_distance(
                    best.score,
                    second.q,
                    second.p,
                    node.u_coeff(settings),
                    settings.vld_max,
                );
                vld = vld.min(vld_new);
                debug_assert!(vld >= 1);
            }

            node = match best.pick {
                Pick::Child(child) => child,
                Pick::Potential(mv) => match node.materialize(mv) {
                    Some((child, created)) => {
                        created_node |= created;
                        child
                    }
                    None => {
                        // The potential vanished and left no child for
                        // its move; retry from the top.
                        try_playout_limit -= 1;
                        if try_playout_limit <= 0 {
                            return Playout {
                                leaf: None,
                                depth,
                                created_node,
                            };
                        }
                        continue 'restart;
                    }
                },
            };
        }
    }
}

/// Worker-side completion of a playout: expand the leaf if it has never
/// been scored, obtain priors and a value from the evaluator unless the
/// expansion produced an exact value, then publish and back-propagate.
pub fn expand_and_score<P, E>(leaf: &Arc<Node<P>>, evaluator: &E, tb: &dyn Tablebase<P>)
where
    P: Position,
    E: Evaluator<P> + ?Sized,
{
    if leaf.raw_q_value().is_none() {
        leaf.generate_potentials(tb);
        if leaf.raw_q_value().is_none() {
            let history = leaf.previous_moves(false);
            let moves = leaf.potential_moves();
            let eval = evaluator.evaluate(leaf.game(), &history, &moves);
            leaf.assign_priors(&eval.priors);
            leaf.set_raw_q_value(eval.value.get());
        }
    }
    leaf.set_q_value_and_propagate();
}
