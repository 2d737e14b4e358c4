//! Move inference
//!
//! A field that disappears at one path and appears at another is reported as
//! a move when the two subtrees look alike. Every `(removed, added)` pair with
//! the same type is scored; pairs at or above the floor are matched greedily,
//! best score first, one-to-one.

use std::cmp::Ordering;

use crate::schema::{Field, SchemaPath};

const NAME_WEIGHT_OBJECT: f64 = 0.3;
const STRUCTURE_WEIGHT: f64 = 0.7;
const NAME_WEIGHT_LEAF: f64 = 0.7;
const CONSTRAINTS_WEIGHT: f64 = 0.3;

/// Scores closer than this are ties
const EPSILON: f64 = 1e-9;

/// A subtree root present on only one side of the diff
#[derive(Debug, Clone)]
pub struct Candidate {
    pub path: SchemaPath,
    pub field: Field,
}

/// A removal paired with an addition
#[derive(Debug, Clone)]
pub struct Match {
    pub from: Candidate,
    pub to: Candidate,
    pub confidence: f64,
    pub ambiguous: bool,
}

/// Similarity of two same-typed fields in [0, 1]; `None` when types differ
pub fn score(old: &Candidate, new: &Candidate) -> Option<f64> {
    if old.field.ty != new.field.ty {
        return None;
    }

    let same_name = if old.path.name() == new.path.name() { 1.0 } else { 0.0 };

    let score = if old.field.ty.is_object() {
        NAME_WEIGHT_OBJECT * same_name + STRUCTURE_WEIGHT * structure(&old.field, &new.field)
    } else {
        let same_constraints = if old.field.constraints == new.field.constraints {
            1.0
        } else {
            0.0
        };
        NAME_WEIGHT_LEAF * same_name + CONSTRAINTS_WEIGHT * same_constraints
    };

    Some(round(score))
}

/// Jaccard similarity of descendant `(relative path, type)` sets
#[allow(clippy::cast_precision_loss)]
fn structure(old: &Field, new: &Field) -> f64 {
    let a = old.descendant_signatures();
    let b = new.descendant_signatures();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(&b).count() as f64;
    let total = a.union(&b).count() as f64;
    shared / total
}

fn round(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

fn tie(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// Pair removals with additions
///
/// Returns the matches plus the candidates left over on each side, all in a
/// deterministic order.
pub fn infer(
    removed: Vec<Candidate>,
    added: Vec<Candidate>,
    floor: f64,
) -> (Vec<Match>, Vec<Candidate>, Vec<Candidate>) {
    let mut scored: Vec<(usize, usize, f64)> = Vec::new();
    for (i, old) in removed.iter().enumerate() {
        for (j, new) in added.iter().enumerate() {
            if let Some(s) = score(old, new) {
                if s >= floor - EPSILON {
                    scored.push((i, j, s));
                }
            }
        }
    }

    scored.sort_by(|a, b| {
        b.2.partial_cmp(&a.2)
            .unwrap_or(Ordering::Equal)
            .then_with(|| removed[a.0].path.cmp(&removed[b.0].path))
            .then_with(|| added[a.1].path.cmp(&added[b.1].path))
    });

    let mut used_removed = vec![false; removed.len()];
    let mut used_added = vec![false; added.len()];
    let mut pairs = Vec::new();

    for &(i, j, s) in &scored {
        if used_removed[i] || used_added[j] {
            continue;
        }
        used_removed[i] = true;
        used_added[j] = true;

        // Another candidate with the same score on either side
        let ambiguous = scored
            .iter()
            .any(|&(oi, oj, os)| (oi == i) != (oj == j) && tie(os, s));
        pairs.push((i, j, s, ambiguous));
    }

    let mut removed: Vec<Option<Candidate>> = removed.into_iter().map(Some).collect();
    let mut added: Vec<Option<Candidate>> = added.into_iter().map(Some).collect();

    let mut matches: Vec<Match> = pairs
        .into_iter()
        .filter_map(|(i, j, confidence, ambiguous)| {
            Some(Match {
                from: removed[i].take()?,
                to: added[j].take()?,
                confidence,
                ambiguous,
            })
        })
        .collect();
    matches.sort_by(|a, b| a.to.path.cmp(&b.to.path));

    let leftover_removed = removed.into_iter().flatten().collect();
    let leftover_added = added.into_iter().flatten().collect();
    (matches, leftover_removed, leftover_added)
}
