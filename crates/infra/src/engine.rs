//! Stock ledger engine: the single write path for every stock movement.
//!
//! Each operation runs as one unit of work under the product's lock:
//! validate against the ledger, append at the observed stream version, refresh the
//! cached counter. The counter refresh is best effort; the ledger append is the commit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use stockledger_core::{Aggregate, AggregateId, AggregateRoot, EmployeeId, ExpectedVersion};
use stockledger_inventory::{
    Allocation, AssignStock, AssignmentCommand, AssignmentEvent, AssignmentId, NewProduct,
    Product, ProductId, Quantity, ReceiveAssignment, ReturnAssignment, ShortfallPolicy,
    SourceRef, StockAssignment, StockBreakdown, StockEvent, StockEventKind, StockOperation,
    StoredStockEvent, SyncReport, SyncSummary, ValidationOutcome, apply_delta,
};

use crate::allocator::AssignmentAllocator;
use crate::assignment_store::{AssignmentFilter, AssignmentStore};
use crate::calculator::{LedgerSnapshot, StockCalculator};
use crate::error::EngineError;
use crate::ledger_store::LedgerStore;
use crate::locks::ProductLocks;
use crate::product_store::ProductStore;
use crate::reconciliation::ReconciliationService;
use crate::validation::ValidationGate;

/// Source operation recorded on opening-balance receipts.
pub const OPENING_BALANCE: &str = "opening_balance";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub shortfall_policy: ShortfallPolicy,
}

/// Result of a committed ledger write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub product_id: ProductId,
    pub events: Vec<StoredStockEvent>,
    /// Ledger-derived stock right after the append.
    pub stock_after: i64,
    /// False when the cached counter could not be refreshed; the next sync repairs it.
    pub counter_synced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRegistration {
    pub product: Product,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opening: Option<StockMovement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSale {
    pub employee_id: EmployeeId,
    pub requested: u64,
    pub deducted: u64,
    pub shortfall: u64,
    pub allocations: Vec<Allocation>,
    #[serde(flatten)]
    pub movement: StockMovement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentTransition {
    pub assignment: StockAssignment,
    /// Absent when the transition did not touch the warehouse.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement: Option<StockMovement>,
}

/// Engine over trait-object stores, as wired by the api crate.
pub type DynStockLedgerEngine =
    StockLedgerEngine<Arc<dyn ProductStore>, Arc<dyn LedgerStore>, Arc<dyn AssignmentStore>>;

pub struct StockLedgerEngine<P, L, A> {
    products: P,
    ledger: L,
    assignments: A,
    locks: Arc<ProductLocks>,
    calculator: StockCalculator<L>,
    gate: ValidationGate<P, L>,
    allocator: AssignmentAllocator<A, L>,
    reconciler: ReconciliationService<P, L>,
}

impl<P, L, A> StockLedgerEngine<P, L, A>
where
    P: ProductStore + Clone,
    L: LedgerStore + Clone,
    A: AssignmentStore + Clone,
{
    pub fn new(products: P, ledger: L, assignments: A, config: EngineConfig) -> Self {
        let locks = Arc::new(ProductLocks::new());
        Self {
            calculator: StockCalculator::new(ledger.clone()),
            gate: ValidationGate::new(products.clone(), ledger.clone()),
            allocator: AssignmentAllocator::new(
                assignments.clone(),
                ledger.clone(),
                config.shortfall_policy,
            ),
            reconciler: ReconciliationService::new(products.clone(), ledger.clone(), locks.clone()),
            products,
            ledger,
            assignments,
            locks,
        }
    }

    pub fn shortfall_policy(&self) -> ShortfallPolicy {
        self.allocator.policy()
    }

    // ---- catalog ----

    /// Create a product; a positive opening stock becomes an `opening_balance` receipt.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn register_product(
        &self,
        input: NewProduct,
        opening_stock: Option<Quantity>,
    ) -> Result<ProductRegistration, EngineError> {
        let id = ProductId::new(AggregateId::new());
        let product = Product::register(id, input, Utc::now())?;
        self.products.insert(product.clone()).await?;
        info!(product_id = %id, name = %product.name, "product registered");

        let Some(quantity) = opening_stock else {
            return Ok(ProductRegistration {
                product,
                opening: None,
            });
        };

        let opening = {
            let _guard = self.locks.acquire(id).await;
            let snapshot = self.calculator.snapshot(id).await?;
            let event = StockEvent::new(
                id,
                StockEventKind::PurchaseReceipt,
                quantity,
                SourceRef::new(OPENING_BALANCE, None),
                Utc::now(),
            )?;
            self.commit(id, vec![event], snapshot).await?
        };

        let product = self.products.get(id).await?.unwrap_or(product);
        Ok(ProductRegistration {
            product,
            opening: Some(opening),
        })
    }

    pub async fn get_product(&self, product_id: ProductId) -> Result<Product, EngineError> {
        self.products
            .get(product_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("product {product_id}")))
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, EngineError> {
        Ok(self.products.list().await?)
    }

    // ---- warehouse movements ----

    pub async fn receive_purchase(
        &self,
        product_id: ProductId,
        quantity: Quantity,
        purchase_order: Option<String>,
    ) -> Result<StockMovement, EngineError> {
        self.move_stock(
            product_id,
            StockEventKind::PurchaseReceipt,
            quantity,
            purchase_order,
            StockOperation::Receive,
        )
        .await
    }

    pub async fn record_sale(
        &self,
        product_id: ProductId,
        quantity: Quantity,
        sale: Option<String>,
    ) -> Result<StockMovement, EngineError> {
        self.move_stock(
            product_id,
            StockEventKind::Sale,
            quantity,
            sale,
            StockOperation::Deduct,
        )
        .await
    }

    pub async fn record_deposit(
        &self,
        product_id: ProductId,
        quantity: Quantity,
        reference: Option<String>,
    ) -> Result<StockMovement, EngineError> {
        self.move_stock(
            product_id,
            StockEventKind::Deposit,
            quantity,
            reference,
            StockOperation::Deduct,
        )
        .await
    }

    pub async fn record_refill(
        &self,
        product_id: ProductId,
        quantity: Quantity,
        reference: Option<String>,
    ) -> Result<StockMovement, EngineError> {
        self.move_stock(
            product_id,
            StockEventKind::Refill,
            quantity,
            reference,
            StockOperation::Deduct,
        )
        .await
    }

    pub async fn record_cylinder_return(
        &self,
        product_id: ProductId,
        quantity: Quantity,
        reference: Option<String>,
    ) -> Result<StockMovement, EngineError> {
        self.move_stock(
            product_id,
            StockEventKind::CylinderReturn,
            quantity,
            reference,
            StockOperation::Return,
        )
        .await
    }

    /// Compensating correction; a negative delta must be covered by current stock.
    #[instrument(skip(self, reason), fields(product_id = %product_id, delta = delta))]
    pub async fn adjust_stock(
        &self,
        product_id: ProductId,
        delta: i64,
        reason: String,
    ) -> Result<StockMovement, EngineError> {
        let now = Utc::now();
        let event = StockEvent::adjustment(product_id, delta, reason, now)?;
        let operation = if delta < 0 {
            StockOperation::Deduct
        } else {
            StockOperation::Receive
        };
        let magnitude = Quantity::new(delta.unsigned_abs())?;

        let _guard = self.locks.acquire(product_id).await;
        let (outcome, snapshot) = self.gate.check(product_id, magnitude, operation).await?;
        outcome.into_result()?;
        self.commit(product_id, vec![event], snapshot).await
    }

    #[instrument(
        skip(self, reference),
        fields(kind = %kind, product_id = %product_id, quantity = %quantity)
    )]
    async fn move_stock(
        &self,
        product_id: ProductId,
        kind: StockEventKind,
        quantity: Quantity,
        reference: Option<String>,
        operation: StockOperation,
    ) -> Result<StockMovement, EngineError> {
        let _guard = self.locks.acquire(product_id).await;

        let (outcome, snapshot) = self.gate.check(product_id, quantity, operation).await?;
        outcome.into_result()?;

        let event = StockEvent::new(
            product_id,
            kind,
            quantity,
            SourceRef::new(kind.as_str(), reference),
            Utc::now(),
        )?;
        self.commit(product_id, vec![event], snapshot).await
    }

    // ---- employee custody ----

    /// Record a sale made by an employee from stock they hold (FIFO over assignments).
    #[instrument(
        skip(self, reference),
        fields(employee_id = %employee_id, product_id = %product_id, quantity = %quantity)
    )]
    pub async fn record_employee_sale(
        &self,
        employee_id: EmployeeId,
        product_id: ProductId,
        quantity: Quantity,
        reference: Option<String>,
    ) -> Result<EmployeeSale, EngineError> {
        self.get_product(product_id).await?;
        let _guard = self.locks.acquire(product_id).await;

        let result = self
            .allocator
            .deduct(
                employee_id,
                product_id,
                quantity,
                SourceRef::new(StockEventKind::EmployeeSale.as_str(), reference),
                Utc::now(),
            )
            .await?;

        let stock_after = self.calculator.calculate(product_id).await?;
        let counter_synced = self.refresh_counter(product_id, stock_after).await;

        info!(
            deducted = result.deducted,
            shortfall = result.shortfall,
            allocations = result.allocations.len(),
            "employee sale recorded"
        );

        Ok(EmployeeSale {
            employee_id,
            requested: result.requested,
            deducted: result.deducted,
            shortfall: result.shortfall,
            allocations: result.allocations,
            movement: StockMovement {
                product_id,
                events: result.events,
                stock_after,
                counter_synced,
            },
        })
    }

    /// Create an assignment. Checks stock without reserving it; nothing is appended.
    #[instrument(
        skip(self),
        fields(employee_id = %employee_id, product_id = %product_id, quantity = %quantity)
    )]
    pub async fn assign_stock(
        &self,
        employee_id: EmployeeId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<StockAssignment, EngineError> {
        self.gate
            .validate(product_id, quantity, StockOperation::Deduct)
            .await?
            .into_result()?;

        let mut assignment = StockAssignment::empty(
            AssignmentId::new(AggregateId::new()),
            employee_id,
            product_id,
        );
        assignment.execute(&AssignmentCommand::Assign(AssignStock {
            quantity,
            occurred_at: Utc::now(),
        }))?;

        let stored = self.assignments.insert(assignment).await?;
        info!(assignment_id = %stored.id_typed(), "stock assigned");
        Ok(stored)
    }

    /// Employee confirms receipt: stock leaves the warehouse here.
    #[instrument(skip(self), fields(assignment_id = %assignment_id))]
    pub async fn receive_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<AssignmentTransition, EngineError> {
        let product_id = self.get_assignment(assignment_id).await?.product_id();
        let _guard = self.locks.acquire(product_id).await;

        let mut assignment = self.get_assignment(assignment_id).await?;
        let before = assignment.version();
        let now = Utc::now();
        assignment.execute(&AssignmentCommand::Receive(ReceiveAssignment { occurred_at: now }))?;

        let quantity = Quantity::new(assignment.quantity())?;
        let (outcome, snapshot) = self
            .gate
            .check(product_id, quantity, StockOperation::Deduct)
            .await?;
        outcome.into_result()?;

        let event = StockEvent::new(
            product_id,
            StockEventKind::AssignmentIssued,
            quantity,
            SourceRef::new("assignment_receive", Some(assignment_id.to_string())),
            now,
        )?
        .with_employee(assignment.employee_id())
        .with_assignment(assignment_id);

        let movement = self.commit(product_id, vec![event], snapshot).await?;
        self.save_after_append(&assignment, before).await?;

        Ok(AssignmentTransition {
            assignment,
            movement: Some(movement),
        })
    }

    /// Return whatever the employee still holds.
    #[instrument(skip(self), fields(assignment_id = %assignment_id))]
    pub async fn return_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<AssignmentTransition, EngineError> {
        let product_id = self.get_assignment(assignment_id).await?.product_id();
        let _guard = self.locks.acquire(product_id).await;

        let mut assignment = self.get_assignment(assignment_id).await?;
        let before = assignment.version();
        let now = Utc::now();
        let events =
            assignment.execute(&AssignmentCommand::Return(ReturnAssignment { occurred_at: now }))?;

        let restock = events.iter().find_map(|e| match e {
            AssignmentEvent::AssignmentReturned(r)
                if r.restocks_warehouse && r.returned_quantity > 0 =>
            {
                Some(r.returned_quantity)
            }
            _ => None,
        });

        let movement = match restock {
            Some(returned) => {
                let snapshot = self.calculator.snapshot(product_id).await?;
                let event = StockEvent::new(
                    product_id,
                    StockEventKind::AssignmentReturned,
                    Quantity::new(returned)?,
                    SourceRef::new("assignment_return", Some(assignment_id.to_string())),
                    now,
                )?
                .with_employee(assignment.employee_id())
                .with_assignment(assignment_id);
                Some(self.commit(product_id, vec![event], snapshot).await?)
            }
            None => None,
        };

        match movement {
            Some(_) => self.save_after_append(&assignment, before).await?,
            None => {
                self.assignments
                    .save(&assignment, ExpectedVersion::Exact(before))
                    .await?
            }
        }
        info!(restocked = restock.unwrap_or(0), "assignment returned");

        Ok(AssignmentTransition {
            assignment,
            movement,
        })
    }

    pub async fn get_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<StockAssignment, EngineError> {
        self.assignments
            .get(assignment_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("assignment {assignment_id}")))
    }

    pub async fn list_assignments(
        &self,
        filter: AssignmentFilter,
    ) -> Result<Vec<StockAssignment>, EngineError> {
        Ok(self.assignments.list(filter).await?)
    }

    // ---- reads and reconciliation ----

    pub async fn list_events(
        &self,
        product_id: ProductId,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredStockEvent>, EngineError> {
        self.get_product(product_id).await?;
        Ok(self.ledger.events_for(product_id, since).await?)
    }

    pub async fn calculate(&self, product_id: ProductId) -> Result<i64, EngineError> {
        self.get_product(product_id).await?;
        Ok(self.calculator.calculate(product_id).await?)
    }

    pub async fn breakdown(&self, product_id: ProductId) -> Result<StockBreakdown, EngineError> {
        self.get_product(product_id).await?;
        Ok(self.calculator.breakdown(product_id).await?)
    }

    pub async fn validate(
        &self,
        product_id: ProductId,
        quantity: Quantity,
        operation: StockOperation,
    ) -> Result<ValidationOutcome, EngineError> {
        self.gate.validate(product_id, quantity, operation).await
    }

    pub async fn sync_product(&self, product_id: ProductId) -> Result<SyncReport, EngineError> {
        self.reconciler.sync_product(product_id).await
    }

    pub async fn sync_all(&self) -> Result<SyncSummary, EngineError> {
        self.reconciler.sync_all().await
    }

    // ---- commit path ----

    async fn commit(
        &self,
        product_id: ProductId,
        events: Vec<StockEvent>,
        snapshot: LedgerSnapshot,
    ) -> Result<StockMovement, EngineError> {
        let stock_after = events
            .iter()
            .try_fold(snapshot.level, |level, e| apply_delta(level, e.delta))
            .map_err(|_| {
                warn!(
                    product_id = %product_id,
                    level = snapshot.level,
                    "append would overflow stock"
                );
                EngineError::validation(format!(
                    "movement would overflow stock level {}",
                    snapshot.level
                ))
            })?;

        let stored = match self
            .ledger
            .append(product_id, events, ExpectedVersion::Exact(snapshot.version))
            .await
        {
            Ok(stored) => stored,
            Err(err) => {
                let err = EngineError::from(err);
                match &err {
                    EngineError::Store(inner) => {
                        error!(product_id = %product_id, error = %inner, "ledger append failed")
                    }
                    other => {
                        warn!(product_id = %product_id, error = %other, "ledger append rejected")
                    }
                }
                return Err(err);
            }
        };

        let counter_synced = self.refresh_counter(product_id, stock_after).await;

        info!(
            product_id = %product_id,
            events = stored.len(),
            stock_after,
            counter_synced,
            "stock movement committed"
        );

        Ok(StockMovement {
            product_id,
            events: stored,
            stock_after,
            counter_synced,
        })
    }

    async fn refresh_counter(&self, product_id: ProductId, value: i64) -> bool {
        match self.products.set_current_stock(product_id, value).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    product_id = %product_id,
                    stock_after = value,
                    error = %err,
                    "cached stock counter refresh failed; ledger append kept"
                );
                false
            }
        }
    }

    async fn save_after_append(
        &self,
        assignment: &StockAssignment,
        before: u64,
    ) -> Result<(), EngineError> {
        if let Err(err) = self
            .assignments
            .save(assignment, ExpectedVersion::Exact(before))
            .await
        {
            error!(
                assignment_id = %assignment.id_typed(),
                status = assignment.status().as_str(),
                error = %err,
                "assignment row update failed after ledger append"
            );
            return Err(err.into());
        }
        Ok(())
    }
}
