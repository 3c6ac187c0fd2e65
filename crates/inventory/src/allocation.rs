//! FIFO allocation of employee-held stock.
//!
//! Planning is pure: it decides how much to take from each open assignment and leaves
//! the mutation (and the audit events) to the caller.

use serde::{Deserialize, Serialize};

use stockledger_core::DomainError;

use crate::assignment::{AssignmentId, StockAssignment};
use crate::quantity::Quantity;

/// What to do when an employee sells more than their open assignments cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortfallPolicy {
    /// Deduct what is there, report the rest as shortfall.
    #[default]
    Warn,
    /// Refuse the sale before anything is mutated.
    Reject,
}

impl core::str::FromStr for ShortfallPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(ShortfallPolicy::Warn),
            "reject" => Ok(ShortfallPolicy::Reject),
            other => Err(DomainError::validation(format!(
                "unknown shortfall policy: {other} (expected warn or reject)"
            ))),
        }
    }
}

/// One slice taken from one assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub assignment_id: AssignmentId,
    pub quantity: u64,
    pub remaining_after: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationPlan {
    pub requested: u64,
    pub deducted: u64,
    pub shortfall: u64,
    pub allocations: Vec<Allocation>,
}

impl AllocationPlan {
    pub fn is_fully_covered(&self) -> bool {
        self.shortfall == 0
    }
}

/// Open assignments, oldest first.
///
/// Ordered by assignment time, then by the store-assigned issue sequence so equal
/// timestamps still have a single answer.
pub fn fifo_queue<'a>(
    assignments: impl IntoIterator<Item = &'a StockAssignment>,
) -> Vec<&'a StockAssignment> {
    let mut open: Vec<&StockAssignment> = assignments.into_iter().filter(|a| a.is_open()).collect();
    open.sort_by_key(|a| (a.assigned_at(), a.issue_sequence(), a.id_typed()));
    open
}

/// Plan a FIFO deduction of `requested` units.
pub fn plan_fifo<'a>(
    assignments: impl IntoIterator<Item = &'a StockAssignment>,
    requested: Quantity,
) -> AllocationPlan {
    let mut needed = requested.get();
    let mut allocations = Vec::new();

    for a in fifo_queue(assignments) {
        if needed == 0 {
            break;
        }
        let take = a.remaining_quantity().min(needed);
        needed -= take;
        allocations.push(Allocation {
            assignment_id: a.id_typed(),
            quantity: take,
            remaining_after: a.remaining_quantity() - take,
        });
    }

    AllocationPlan {
        requested: requested.get(),
        deducted: requested.get() - needed,
        shortfall: needed,
        allocations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use stockledger_core::{AggregateId, EmployeeId};

    use crate::assignment::AssignmentStatus;
    use crate::product::ProductId;

    fn row(
        quantity: u64,
        remaining: u64,
        status: AssignmentStatus,
        minutes: i64,
        seq: u64,
    ) -> StockAssignment {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        StockAssignment::restore(
            AssignmentId::new(AggregateId::new()),
            EmployeeId::new(),
            ProductId::new(AggregateId::new()),
            quantity,
            remaining,
            status,
            seq,
            Some(t0 + Duration::minutes(minutes)),
            Some(t0 + Duration::minutes(minutes + 1)),
            None,
            2,
        )
    }

    fn qty(n: u64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    #[test]
    fn oldest_assignment_is_drained_first() {
        let a1 = row(10, 10, AssignmentStatus::Received, 0, 1);
        let a2 = row(5, 5, AssignmentStatus::Received, 30, 2);

        // Newer row first on purpose: input order must not matter.
        let plan = plan_fifo([&a2, &a1], qty(12));

        assert_eq!(plan.deducted, 12);
        assert_eq!(plan.shortfall, 0);
        assert_eq!(plan.allocations.len(), 2);
        assert_eq!(plan.allocations[0].assignment_id, a1.id_typed());
        assert_eq!(plan.allocations[0].remaining_after, 0);
        assert_eq!(plan.allocations[1].assignment_id, a2.id_typed());
        assert_eq!(plan.allocations[1].remaining_after, 3);
    }

    #[test]
    fn shortfall_is_reported_not_raised() {
        let a1 = row(10, 10, AssignmentStatus::Received, 0, 1);
        let a2 = row(5, 2, AssignmentStatus::Received, 30, 2);

        let plan = plan_fifo([&a1, &a2], qty(20));
        assert_eq!(plan.deducted, 12);
        assert_eq!(plan.shortfall, 8);
        assert!(!plan.is_fully_covered());
    }

    #[test]
    fn only_received_rows_with_stock_are_eligible() {
        let pending = row(10, 10, AssignmentStatus::Assigned, 0, 1);
        let returned = row(10, 0, AssignmentStatus::Returned, 1, 2);
        let drained = row(10, 0, AssignmentStatus::Received, 2, 3);
        let open = row(4, 4, AssignmentStatus::Received, 3, 4);

        let plan = plan_fifo([&pending, &returned, &drained, &open], qty(3));
        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].assignment_id, open.id_typed());
    }

    #[test]
    fn equal_timestamps_fall_back_to_issue_sequence() {
        let later_seq = row(5, 5, AssignmentStatus::Received, 0, 9);
        let earlier_seq = row(5, 5, AssignmentStatus::Received, 0, 3);

        let plan = plan_fifo([&later_seq, &earlier_seq], qty(2));
        assert_eq!(plan.allocations[0].assignment_id, earlier_seq.id_typed());
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("WARN".parse::<ShortfallPolicy>().unwrap(), ShortfallPolicy::Warn);
        assert_eq!(" reject ".parse::<ShortfallPolicy>().unwrap(), ShortfallPolicy::Reject);
        assert!("ignore".parse::<ShortfallPolicy>().is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 200,
            ..ProptestConfig::default()
        })]

        #[test]
        fn plan_conserves_quantity(
            remaining in proptest::collection::vec(0u64..50, 0..8),
            requested in 1u64..300,
        ) {
            let rows: Vec<StockAssignment> = remaining
                .iter()
                .enumerate()
                .map(|(i, r)| row(50, *r, AssignmentStatus::Received, i as i64, i as u64 + 1))
                .collect();

            let plan = plan_fifo(rows.iter(), qty(requested));
            let total_open: u64 = remaining.iter().sum();

            prop_assert_eq!(plan.deducted + plan.shortfall, requested);
            let allocated: u64 = plan.allocations.iter().map(|a| a.quantity).sum();
            prop_assert_eq!(allocated, plan.deducted);
            prop_assert_eq!(plan.deducted, requested.min(total_open));
            for alloc in &plan.allocations {
                prop_assert!(alloc.quantity > 0);
            }
        }
    }
}
