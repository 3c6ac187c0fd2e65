use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use stockledger_core::{AggregateRoot, ExpectedVersion};
use stockledger_inventory::{AssignmentId, StockAssignment};

use super::{AssignmentFilter, AssignmentStore};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Rows {
    next_sequence: u64,
    by_id: HashMap<AssignmentId, StockAssignment>,
}

/// In-memory assignment rows for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryAssignmentStore {
    rows: RwLock<Rows>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn insert(&self, mut assignment: StockAssignment) -> Result<StockAssignment, StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let id = assignment.id_typed();
        if rows.by_id.contains_key(&id) {
            return Err(StoreError::Duplicate(format!("assignment {id}")));
        }

        rows.next_sequence += 1;
        assignment.set_issue_sequence(rows.next_sequence);
        rows.by_id.insert(id, assignment.clone());
        Ok(assignment)
    }

    async fn get(&self, id: AssignmentId) -> Result<Option<StockAssignment>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;
        Ok(rows.by_id.get(&id).cloned())
    }

    async fn list(&self, filter: AssignmentFilter) -> Result<Vec<StockAssignment>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let mut out: Vec<StockAssignment> = rows
            .by_id
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        out.sort_by_key(|a| a.issue_sequence());
        Ok(out)
    }

    async fn save(
        &self,
        assignment: &StockAssignment,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))?;

        let id = assignment.id_typed();
        let stored = rows
            .by_id
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("assignment {id}")))?;

        let current = stored.version();
        expected_version
            .check(current)
            .map_err(|e| StoreError::Concurrency(format!("assignment {id}: {e}")))?;

        let issue_sequence = stored.issue_sequence();
        *stored = assignment.clone();
        stored.set_issue_sequence(issue_sequence);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockledger_core::{Aggregate, AggregateId, EmployeeId};
    use stockledger_inventory::{
        AssignStock, AssignmentCommand, AssignmentStatus, ProductId, Quantity, ReceiveAssignment,
    };

    fn created(employee_id: EmployeeId, product_id: ProductId, q: u64) -> StockAssignment {
        let id = AssignmentId::new(AggregateId::new());
        let mut a = StockAssignment::empty(id, employee_id, product_id);
        a.execute(&AssignmentCommand::Assign(AssignStock {
            quantity: Quantity::new(q).unwrap(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        a
    }

    #[tokio::test]
    async fn insert_stamps_increasing_issue_sequences() {
        let store = InMemoryAssignmentStore::new();
        let e = EmployeeId::new();
        let p = ProductId::new(AggregateId::new());

        let first = store.insert(created(e, p, 10)).await.unwrap();
        let second = store.insert(created(e, p, 5)).await.unwrap();

        assert!(first.issue_sequence() < second.issue_sequence());
        let listed = store
            .list(AssignmentFilter::for_employee_product(e, p))
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id_typed(), first.id_typed());
    }

    #[tokio::test]
    async fn save_with_stale_version_conflicts() {
        let store = InMemoryAssignmentStore::new();
        let stored = store
            .insert(created(EmployeeId::new(), ProductId::new(AggregateId::new()), 10))
            .await
            .unwrap();
        let before = stored.version();

        let mut a = stored.clone();
        a.execute(&AssignmentCommand::Receive(ReceiveAssignment {
            occurred_at: Utc::now(),
        }))
        .unwrap();
        store.save(&a, ExpectedVersion::Exact(before)).await.unwrap();

        let err = store
            .save(&a, ExpectedVersion::Exact(before))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));

        let reloaded = store.get(a.id_typed()).await.unwrap().unwrap();
        assert_eq!(reloaded.status(), AssignmentStatus::Received);
        assert_eq!(reloaded.issue_sequence(), stored.issue_sequence());
    }

    #[tokio::test]
    async fn filter_narrows_by_employee_and_status() {
        let store = InMemoryAssignmentStore::new();
        let alice = EmployeeId::new();
        let bob = EmployeeId::new();
        let p = ProductId::new(AggregateId::new());
        store.insert(created(alice, p, 1)).await.unwrap();
        store.insert(created(bob, p, 2)).await.unwrap();

        let for_bob = store
            .list(AssignmentFilter {
                employee_id: Some(bob),
                ..AssignmentFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0].quantity(), 2);

        let received = store
            .list(AssignmentFilter::default().with_status(AssignmentStatus::Received))
            .await
            .unwrap();
        assert!(received.is_empty());
    }
}
