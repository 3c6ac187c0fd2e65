//! FIFO deduction from employee-held stock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, instrument, warn};

use stockledger_core::{Aggregate, AggregateRoot, EmployeeId, ExpectedVersion};
use stockledger_inventory::{
    Allocation, AssignmentCommand, AssignmentStatus, DeductAssignment, ProductId, Quantity,
    ShortfallPolicy, SourceRef, StockEvent, StockEventKind, StoredStockEvent, plan_fifo,
};

use crate::assignment_store::{AssignmentFilter, AssignmentStore};
use crate::error::EngineError;
use crate::ledger_store::LedgerStore;

/// What an employee sale actually consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationResult {
    pub requested: u64,
    pub deducted: u64,
    pub shortfall: u64,
    pub allocations: Vec<Allocation>,
    /// One `employee_sale` audit event per allocation.
    pub events: Vec<StoredStockEvent>,
}

/// Consumes an employee's open assignments oldest first.
///
/// Callers serialize per product; the ledger append is still version-checked.
#[derive(Debug, Clone)]
pub struct AssignmentAllocator<A, L> {
    assignments: A,
    ledger: L,
    policy: ShortfallPolicy,
}

impl<A, L> AssignmentAllocator<A, L>
where
    A: AssignmentStore,
    L: LedgerStore,
{
    pub fn new(assignments: A, ledger: L, policy: ShortfallPolicy) -> Self {
        Self {
            assignments,
            ledger,
            policy,
        }
    }

    pub fn policy(&self) -> ShortfallPolicy {
        self.policy
    }

    /// Deduct `quantity` from the employee's received assignments of `product_id`.
    ///
    /// Ledger events are appended before assignment rows are updated. A row update that
    /// fails afterwards leaves the audit trail ahead of the row; the failure is logged
    /// and returned.
    #[instrument(
        skip(self, source),
        fields(employee_id = %employee_id, product_id = %product_id, quantity = %quantity)
    )]
    pub async fn deduct(
        &self,
        employee_id: EmployeeId,
        product_id: ProductId,
        quantity: Quantity,
        source: SourceRef,
        occurred_at: DateTime<Utc>,
    ) -> Result<AllocationResult, EngineError> {
        let open = self
            .assignments
            .list(
                AssignmentFilter::for_employee_product(employee_id, product_id)
                    .with_status(AssignmentStatus::Received),
            )
            .await?;

        let plan = plan_fifo(&open, quantity);

        if !plan.is_fully_covered() {
            match self.policy {
                ShortfallPolicy::Reject => {
                    return Err(EngineError::InsufficientStock {
                        requested: plan.requested,
                        available: plan.deducted as i64,
                    });
                }
                ShortfallPolicy::Warn => warn!(
                    requested = plan.requested,
                    deducted = plan.deducted,
                    shortfall = plan.shortfall,
                    "employee sale exceeds held stock"
                ),
            }
        }

        if plan.allocations.is_empty() {
            return Ok(AllocationResult {
                requested: plan.requested,
                deducted: 0,
                shortfall: plan.shortfall,
                allocations: vec![],
                events: vec![],
            });
        }

        let mut audit = Vec::with_capacity(plan.allocations.len());
        for allocation in &plan.allocations {
            let q = Quantity::new(allocation.quantity)?;
            let kind = StockEventKind::EmployeeSale;
            audit.push(
                StockEvent::new(product_id, kind, q, source.clone(), occurred_at)?
                    .with_employee(employee_id)
                    .with_assignment(allocation.assignment_id),
            );
        }

        let version = self.ledger.stream_version(product_id).await?;
        let events = self
            .ledger
            .append(product_id, audit, ExpectedVersion::Exact(version))
            .await?;

        for allocation in &plan.allocations {
            let Some(row) = open.iter().find(|a| a.id_typed() == allocation.assignment_id) else {
                continue;
            };
            let mut row = row.clone();
            let before = row.version();
            row.execute(&AssignmentCommand::Deduct(DeductAssignment {
                quantity: Quantity::new(allocation.quantity)?,
                occurred_at,
            }))?;

            if let Err(err) = self
                .assignments
                .save(&row, ExpectedVersion::Exact(before))
                .await
            {
                error!(
                    assignment_id = %allocation.assignment_id,
                    quantity = allocation.quantity,
                    error = %err,
                    "assignment row update failed after ledger append"
                );
                return Err(err.into());
            }
        }

        Ok(AllocationResult {
            requested: plan.requested,
            deducted: plan.deducted,
            shortfall: plan.shortfall,
            allocations: plan.allocations,
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration;
    use stockledger_core::AggregateId;
    use stockledger_inventory::{
        AssignStock, AssignmentId, ReceiveAssignment, StockAssignment,
    };

    use crate::assignment_store::InMemoryAssignmentStore;
    use crate::ledger_store::InMemoryLedgerStore;

    struct Fixture {
        assignments: Arc<InMemoryAssignmentStore>,
        ledger: Arc<InMemoryLedgerStore>,
        employee: EmployeeId,
        product: ProductId,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                assignments: Arc::new(InMemoryAssignmentStore::new()),
                ledger: Arc::new(InMemoryLedgerStore::new()),
                employee: EmployeeId::new(),
                product: ProductId::new(AggregateId::new()),
            }
        }

        async fn received(&self, q: u64, at: DateTime<Utc>) -> AssignmentId {
            let mut a = StockAssignment::empty(
                AssignmentId::new(AggregateId::new()),
                self.employee,
                self.product,
            );
            a.execute(&AssignmentCommand::Assign(AssignStock {
                quantity: Quantity::new(q).unwrap(),
                occurred_at: at,
            }))
            .unwrap();
            let mut a = self.assignments.insert(a).await.unwrap();
            let before = a.version();
            a.execute(&AssignmentCommand::Receive(ReceiveAssignment { occurred_at: at }))
                .unwrap();
            self.assignments
                .save(&a, ExpectedVersion::Exact(before))
                .await
                .unwrap();
            a.id_typed()
        }

        fn allocator(
            &self,
            policy: ShortfallPolicy,
        ) -> AssignmentAllocator<Arc<InMemoryAssignmentStore>, Arc<InMemoryLedgerStore>> {
            AssignmentAllocator::new(self.assignments.clone(), self.ledger.clone(), policy)
        }

        async fn sell(
            &self,
            policy: ShortfallPolicy,
            q: u64,
            at: DateTime<Utc>,
        ) -> Result<AllocationResult, EngineError> {
            self.allocator(policy)
                .deduct(
                    self.employee,
                    self.product,
                    Quantity::new(q).unwrap(),
                    SourceRef::new("employee_sale", None),
                    at,
                )
                .await
        }

        async fn remaining(&self, id: AssignmentId) -> u64 {
            self.assignments.get(id).await.unwrap().unwrap().remaining_quantity()
        }
    }

    #[tokio::test]
    async fn oldest_assignment_is_drained_first() {
        let fx = Fixture::new();
        let t0 = Utc::now();
        let older = fx.received(10, t0).await;
        let newer = fx.received(5, t0 + Duration::minutes(1)).await;

        let result = fx.sell(ShortfallPolicy::Warn, 12, t0).await.unwrap();

        assert_eq!(result.deducted, 12);
        assert_eq!(result.shortfall, 0);
        assert_eq!(fx.remaining(older).await, 0);
        assert_eq!(fx.remaining(newer).await, 3);

        assert_eq!(result.events.len(), 2);
        assert!(result.events.iter().all(|e| e.payload().delta == 0));
        assert_eq!(result.events[0].payload().assignment_id, Some(older));
    }

    #[tokio::test]
    async fn warn_policy_deducts_what_is_held() {
        let fx = Fixture::new();
        let t0 = Utc::now();
        let only = fx.received(12, t0).await;

        let result = fx.sell(ShortfallPolicy::Warn, 20, t0).await.unwrap();

        assert_eq!(result.deducted, 12);
        assert_eq!(result.shortfall, 8);
        assert_eq!(fx.remaining(only).await, 0);
    }

    #[tokio::test]
    async fn reject_policy_mutates_nothing() {
        let fx = Fixture::new();
        let t0 = Utc::now();
        let only = fx.received(12, t0).await;

        let err = fx.sell(ShortfallPolicy::Reject, 20, t0).await.unwrap_err();

        assert!(matches!(
            err,
            EngineError::InsufficientStock {
                requested: 20,
                available: 12
            }
        ));
        assert_eq!(fx.remaining(only).await, 12);
        assert_eq!(fx.ledger.stream_version(fx.product).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn no_open_assignments_is_all_shortfall() {
        let fx = Fixture::new();
        let result = fx.sell(ShortfallPolicy::Warn, 3, Utc::now()).await.unwrap();

        assert_eq!(result.deducted, 0);
        assert_eq!(result.shortfall, 3);
        assert!(result.events.is_empty());
    }
}
