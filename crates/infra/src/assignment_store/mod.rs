//! Persistence for employee stock assignments.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use stockledger_core::{EmployeeId, ExpectedVersion};
use stockledger_inventory::{AssignmentId, AssignmentStatus, ProductId, StockAssignment};

use crate::error::StoreError;

pub use in_memory::InMemoryAssignmentStore;
pub use postgres::PostgresAssignmentStore;

/// Optional filters for listing assignments. Empty matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentFilter {
    pub employee_id: Option<EmployeeId>,
    pub product_id: Option<ProductId>,
    pub status: Option<AssignmentStatus>,
}

impl AssignmentFilter {
    pub fn for_employee_product(employee_id: EmployeeId, product_id: ProductId) -> Self {
        Self {
            employee_id: Some(employee_id),
            product_id: Some(product_id),
            status: None,
        }
    }

    pub fn with_status(mut self, status: AssignmentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, a: &StockAssignment) -> bool {
        self.employee_id.is_none_or(|id| a.employee_id() == id)
            && self.product_id.is_none_or(|id| a.product_id() == id)
            && self.status.is_none_or(|s| a.status() == s)
    }
}

/// Assignment rows with row-level optimistic concurrency.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Insert a freshly created assignment and stamp its issue sequence.
    ///
    /// Returns the row as stored. Issue sequences are strictly increasing across the
    /// whole store.
    async fn insert(&self, assignment: StockAssignment) -> Result<StockAssignment, StoreError>;

    async fn get(&self, id: AssignmentId) -> Result<Option<StockAssignment>, StoreError>;

    /// Matching rows ordered by issue sequence.
    async fn list(&self, filter: AssignmentFilter) -> Result<Vec<StockAssignment>, StoreError>;

    /// Persist a mutated assignment if the stored row is still at `expected_version`.
    async fn save(
        &self,
        assignment: &StockAssignment,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> AssignmentStore for Arc<S>
where
    S: AssignmentStore + ?Sized,
{
    async fn insert(&self, assignment: StockAssignment) -> Result<StockAssignment, StoreError> {
        (**self).insert(assignment).await
    }

    async fn get(&self, id: AssignmentId) -> Result<Option<StockAssignment>, StoreError> {
        (**self).get(id).await
    }

    async fn list(&self, filter: AssignmentFilter) -> Result<Vec<StockAssignment>, StoreError> {
        (**self).list(filter).await
    }

    async fn save(
        &self,
        assignment: &StockAssignment,
        expected_version: ExpectedVersion,
    ) -> Result<(), StoreError> {
        (**self).save(assignment, expected_version).await
    }
}
