//! Drift detection between the cached counter and the ledger.

use serde::{Deserialize, Serialize};

use crate::product::ProductId;

/// Non-fatal findings reported by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    DriftDetected { previous: i64, recalculated: i64 },
    /// The ledger sums below zero: a ledger bug or a lost concurrent write.
    NegativeStock { level: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub product_id: ProductId,
    pub previous: i64,
    pub recalculated: i64,
    pub delta: i64,
    pub diagnostics: Vec<Diagnostic>,
}

impl SyncReport {
    pub fn compare(product_id: ProductId, previous: i64, recalculated: i64) -> Self {
        let mut diagnostics = Vec::new();
        if previous != recalculated {
            diagnostics.push(Diagnostic::DriftDetected {
                previous,
                recalculated,
            });
        }
        if recalculated < 0 {
            diagnostics.push(Diagnostic::NegativeStock {
                level: recalculated,
            });
        }

        Self {
            product_id,
            previous,
            recalculated,
            delta: recalculated.saturating_sub(previous),
            diagnostics,
        }
    }

    pub fn drifted(&self) -> bool {
        self.delta != 0
    }
}

/// A product whose reconciliation failed; its counter was left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub product_id: ProductId,
    pub error: String,
}

/// Result of reconciling the whole catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    /// Reconciled plus failed.
    pub checked: usize,
    pub corrected: usize,
    pub total_delta: i64,
    pub products: Vec<SyncReport>,
    pub failed: Vec<SyncFailure>,
}

impl SyncSummary {
    pub fn from_reports(products: Vec<SyncReport>) -> Self {
        Self::from_outcomes(products, Vec::new())
    }

    pub fn from_outcomes(products: Vec<SyncReport>, failed: Vec<SyncFailure>) -> Self {
        Self {
            checked: products.len() + failed.len(),
            corrected: products.iter().filter(|r| r.drifted()).count(),
            total_delta: products
                .iter()
                .fold(0i64, |acc, r| acc.saturating_add(r.delta)),
            products,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::AggregateId;

    #[test]
    fn drift_is_reported_with_signed_delta() {
        let r = SyncReport::compare(ProductId::new(AggregateId::new()), 999, 70);
        assert_eq!(r.delta, -929);
        assert_eq!(
            r.diagnostics,
            vec![Diagnostic::DriftDetected {
                previous: 999,
                recalculated: 70
            }]
        );
    }

    #[test]
    fn clean_product_has_no_diagnostics() {
        let r = SyncReport::compare(ProductId::new(AggregateId::new()), 70, 70);
        assert_eq!(r.delta, 0);
        assert!(r.diagnostics.is_empty());
        assert!(!r.drifted());
    }

    #[test]
    fn negative_ledger_is_flagged_even_without_drift() {
        let r = SyncReport::compare(ProductId::new(AggregateId::new()), -2, -2);
        assert_eq!(r.diagnostics, vec![Diagnostic::NegativeStock { level: -2 }]);
    }

    #[test]
    fn summary_counts_corrections() {
        let p = || ProductId::new(AggregateId::new());
        let s = SyncSummary::from_reports(vec![
            SyncReport::compare(p(), 10, 10),
            SyncReport::compare(p(), 5, 8),
            SyncReport::compare(p(), 9, 1),
        ]);
        assert_eq!(s.checked, 3);
        assert_eq!(s.corrected, 2);
        assert_eq!(s.total_delta, -5);
    }

    #[test]
    fn failures_count_as_checked_but_not_corrected() {
        let p = || ProductId::new(AggregateId::new());
        let s = SyncSummary::from_outcomes(
            vec![SyncReport::compare(p(), 5, 8)],
            vec![SyncFailure {
                product_id: p(),
                error: "backend failure".into(),
            }],
        );
        assert_eq!(s.checked, 2);
        assert_eq!(s.corrected, 1);
        assert_eq!(s.total_delta, 3);
        assert_eq!(s.failed.len(), 1);
    }

    #[test]
    fn extreme_counters_do_not_overflow_the_delta() {
        let r = SyncReport::compare(ProductId::new(AggregateId::new()), -5, i64::MAX);
        assert_eq!(r.delta, i64::MAX);
        assert!(r.drifted());
    }

    #[test]
    fn diagnostics_serialize_with_kind_tag() {
        let json = serde_json::to_value(Diagnostic::NegativeStock { level: -1 }).unwrap();
        assert_eq!(json["kind"], "negative_stock");
    }
}
