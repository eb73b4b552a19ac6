//! Macro-averaged F1 over exact-boundary span matches.
//!
//! Pure functions with no external state: the finalizer feeds in the
//! `(gold, predicted)` pairs it loaded and gets a single score back.

use std::collections::{BTreeSet, HashSet};

use crate::model::Span;

/// Computes the macro-averaged F1 score over a collection of
/// `(gold, predicted)` span-list pairs.
///
/// The label set is taken from the gold data only. For each label, true
/// positives are exact `(start, end)` matches between gold and predicted
/// spans of that label, aggregated across all pairs; precision, recall and
/// F1 fall out with zero-denominator guards. The returned score is the
/// unweighted mean of per-label F1 — a rare label counts as much as a
/// frequent one. No gold labels at all scores 0.0.
pub fn macro_f1(pairs: &[(Vec<Span>, Vec<Span>)]) -> f64 {
    // BTreeSet for a deterministic iteration order
    let labels: BTreeSet<&str> = pairs
        .iter()
        .flat_map(|(gold, _)| gold.iter().map(|s| s.label.as_str()))
        .collect();
    if labels.is_empty() {
        return 0.0;
    }

    let mut sum = 0.0;
    for label in &labels {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for (gold, predicted) in pairs {
            let g: HashSet<(usize, usize)> = boundaries_of(gold, label);
            let p: HashSet<(usize, usize)> = boundaries_of(predicted, label);
            tp += g.intersection(&p).count();
            fp += p.difference(&g).count();
            fn_ += g.difference(&p).count();
        }
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        sum += f1;
    }
    sum / labels.len() as f64
}

fn boundaries_of(spans: &[Span], label: &str) -> HashSet<(usize, usize)> {
    spans
        .iter()
        .filter(|s| s.label == label)
        .map(|s| (s.start, s.end))
        .collect()
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
