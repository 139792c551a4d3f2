//! Reporting: principal variation, diagnostic tree dump, move trails.
//!
//! Children are ranked for reporting by effective visits, then mean
//! value, then prior: measurements before estimates. Selection during
//! search uses the PUCT score instead; this ordering is only for what
//! the engine shows the outside world.

use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use sable_core::{score_to_cp, Position};

use crate::config::SearchSettings;
use crate::node::Node;

fn report_rank<P: Position>(node: &Node<P>) -> (i64, f32, f32) {
    (
        node.visited() as i64 + node.virtual_loss(),
        node.q_value().unwrap_or(f32::NEG_INFINITY),
        node.p_value().unwrap_or(f32::NEG_INFINITY),
    )
}

fn report_order<P: Position>(a: &Arc<Node<P>>, b: &Arc<Node<P>>) -> Ordering {
    let (an, aq, ap) = report_rank(a);
    let (bn, bq, bp) = report_rank(b);
    an.cmp(&bn)
        .then(aq.partial_cmp(&bq).unwrap_or(Ordering::Equal))
        .then(ap.partial_cmp(&bp).unwrap_or(Ordering::Equal))
}

impl<P: Position> Node<P> {
    /// Top-ranked child for reporting; earlier siblings win ties.
    pub fn best_child_for_report(&self) -> Option<Arc<Self>> {
        let children = self.children();
        let mut best: Option<Arc<Self>> = None;
        for child in children {
            match &best {
                Some(current) if report_order(&child, current) != Ordering::Greater => {}
                _ => best = Some(child),
            }
        }
        best
    }

    fn move_text(&self) -> String {
        match self.game().last_move() {
            Some(mv) => mv.to_string(),
            None => String::from("start"),
        }
    }

    /// The best line from this node, greedily following the top-ranked
    /// child. Returns the line in computer notation and its length.
    pub fn principal_variation(&self) -> (String, u32) {
        let mut depth = 0;
        let line = self.pv_line(&mut depth);
        (line, depth)
    }

    fn pv_line(&self, depth: &mut u32) -> String {
        if !self.is_root() && self.p_value().is_none() {
            return String::new();
        }
        *depth += 1;

        match self.best_child_for_report() {
            None => self.move_text(),
            Some(child) => {
                let rest = child.pv_line(depth);
                if self.is_root() {
                    rest
                } else if rest.is_empty() {
                    self.move_text()
                } else {
                    format!("{} {}", self.move_text(), rest)
                }
            }
        }
    }

    /// Dump this subtree, one node per line, down to `max_depth` plies
    /// below the root. Diagnostics only.
    pub fn print_tree(&self, settings: &SearchSettings, max_depth: u32) -> String {
        let mut out = String::new();
        self.print_tree_into(&mut out, settings, max_depth);
        out
    }

    fn print_tree_into(&self, out: &mut String, settings: &SearchSettings, max_depth: u32) {
        let depth = self.depth();
        out.push('\n');
        for _ in 0..depth {
            out.push_str("      |");
        }

        let n = self.visited() as i64 + self.virtual_loss();
        let p = self.p_value().unwrap_or(0.0);
        let q = self.q_value().unwrap_or(0.0);
        let u = match self.parent() {
            Some(parent) => parent.u_coeff(settings) * p / (1.0 + n as f32),
            None => 0.0,
        };
        let raw = self.raw_q_value().unwrap_or(0.0);
        let height = self.tree_height().max(1);
        let _ = write!(
            out,
            "{:>6} n: {:>5} p: {:>6.2}% q: {:>8.5} u: {:>7.5} q+u: {:>8.5} v: {:>7.4} h: {:>2} cp: {}",
            self.move_text(),
            n,
            p * 100.0,
            q,
            u,
            q + u,
            raw,
            height,
            score_to_cp(q),
        );

        if depth < max_depth {
            let mut children = self.children();
            children.sort_by(|a, b| report_order(b, a));
            for child in children {
                child.print_tree_into(out, settings, max_depth);
            }
        }
    }
}

/// A node renders as the move trail of its recent history.
impl<P: Position> fmt::Display for Node<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut games = self.previous_moves(false);
        games.push(self.game().clone());
        for (i, game) in games.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match game.last_move() {
                Some(mv) => write!(f, "{mv}")?,
                None => f.write_str("start")?,
            }
        }
        Ok(())
    }
}
