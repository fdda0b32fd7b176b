//! Ranking metrics over a record collection: MRR and P@1.

use std::fmt;

use serde::Serialize;

use crate::dataset::Record;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsResult {
    /// Mean reciprocal rank of the gold answer; not-found counts as 0.
    pub mrr: f64,
    /// Fraction of records whose top candidate is the gold answer.
    pub p_at_1: f64,
    /// Records whose gold answer appears anywhere in the list.
    pub found: usize,
    pub total: usize,
}

impl fmt::Display for MetricsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MRR = {:.4}", self.mrr)?;
        writeln!(f, "P@1 = {:.4}", self.p_at_1)?;
        write!(f, "Found = {} / {}", self.found, self.total)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("cannot compute metrics over an empty dataset")]
    EmptyDataset,
}

/// Compute MRR and P@1, using each record's reranked list when
/// `use_reranked` is set and the record has one.
pub fn compute_metrics(
    records: &[Record],
    use_reranked: bool,
) -> Result<MetricsResult, EvaluationError> {
    if records.is_empty() {
        return Err(EvaluationError::EmptyDataset);
    }

    let mut found = 0usize;
    let mut correct_at_1 = 0usize;
    let mut mrr_sum = 0.0f64;

    for record in records {
        let list = record.evaluation_list(use_reranked);
        let Some(position) = list.iter().position(|p| *p == record.gold_answer) else {
            continue;
        };
        found += 1;
        mrr_sum += 1.0 / (position + 1) as f64;
        if position == 0 {
            correct_at_1 += 1;
        }
    }

    let total = records.len();
    Ok(MetricsResult {
        mrr: mrr_sum / total as f64,
        p_at_1: correct_at_1 as f64 / total as f64,
        found,
        total,
    })
}

/// Baseline vs. reranked metrics for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsComparison {
    pub baseline: MetricsResult,
    pub reranked: MetricsResult,
    pub mrr_delta: f64,
    pub p_at_1_delta: f64,
}

impl MetricsComparison {
    pub fn new(baseline: MetricsResult, reranked: MetricsResult) -> Self {
        Self {
            baseline,
            reranked,
            mrr_delta: reranked.mrr - baseline.mrr,
            p_at_1_delta: reranked.p_at_1 - baseline.p_at_1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(gold: &str, preds: &[&str]) -> Record {
        Record::new("q", gold, preds.iter().map(|s| s.to_string()).collect())
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn ranks_one_two_and_missing() {
        let records = vec![
            record("a", &["a", "b", "c"]),
            record("a", &["b", "a", "c"]),
            record("a", &["b", "c"]),
        ];
        let m = compute_metrics(&records, false).unwrap();
        assert!(approx(m.mrr, 0.5));
        assert!(approx(m.p_at_1, 1.0 / 3.0));
        assert_eq!(m.found, 2);
        assert_eq!(m.total, 3);
    }

    #[test]
    fn empty_candidate_list_counts_toward_total_only() {
        let records = vec![record("a", &[]), record("a", &["a"])];
        let m = compute_metrics(&records, false).unwrap();
        assert_eq!(m.found, 1);
        assert!(approx(m.mrr, 0.5));
        assert!(approx(m.p_at_1, 0.5));
    }

    #[test]
    fn gold_match_is_case_sensitive_and_first_occurrence() {
        let records = vec![record("Paris", &["paris", "Rome", "Paris", "Paris"])];
        let m = compute_metrics(&records, false).unwrap();
        assert!(approx(m.mrr, 1.0 / 3.0));
        assert!(approx(m.p_at_1, 0.0));
    }

    #[test]
    fn reranked_list_used_only_when_requested_and_present() {
        let mut with_rerank = record("a", &["b", "a"]);
        with_rerank.reranked_preds = Some(vec!["a".into(), "b".into()]);
        let without_rerank = record("a", &["b", "a"]);
        let records = vec![with_rerank, without_rerank];

        let baseline = compute_metrics(&records, false).unwrap();
        let reranked = compute_metrics(&records, true).unwrap();
        assert!(approx(baseline.mrr, 0.5));
        assert!(approx(reranked.mrr, 0.75));
        assert!(approx(reranked.p_at_1, 0.5));

        let cmp = MetricsComparison::new(baseline, reranked);
        assert!(approx(cmp.mrr_delta, 0.25));
        assert!(approx(cmp.p_at_1_delta, 0.5));
    }

    #[test]
    fn empty_dataset_is_an_error() {
        assert_eq!(
            compute_metrics(&[], false),
            Err(EvaluationError::EmptyDataset)
        );
    }

    #[test]
    fn display_matches_console_report() {
        let m = MetricsResult {
            mrr: 0.5,
            p_at_1: 1.0 / 3.0,
            found: 2,
            total: 3,
        };
        assert_eq!(m.to_string(), "MRR = 0.5000\nP@1 = 0.3333\nFound = 2 / 3");
    }
}
