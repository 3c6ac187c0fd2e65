use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Aggregate, AggregateId, AggregateRoot, DomainError, EmployeeId};
use stockledger_events::Event;

use crate::product::ProductId;
use crate::quantity::Quantity;

/// Stock assignment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentId(pub AggregateId);

impl AssignmentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Assigned,
    Received,
    Returned,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::Received => "received",
            AssignmentStatus::Returned => "returned",
        }
    }
}

impl core::str::FromStr for AssignmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assigned" => Ok(AssignmentStatus::Assigned),
            "received" => Ok(AssignmentStatus::Received),
            "returned" => Ok(AssignmentStatus::Returned),
            other => Err(DomainError::validation(format!("unknown assignment status: {other}"))),
        }
    }
}

/// Aggregate root: stock handed to one employee for one product.
///
/// `assigned -> received -> returned`; deductions only while `received`.
/// `remaining_quantity` never increases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAssignment {
    id: AssignmentId,
    employee_id: EmployeeId,
    product_id: ProductId,
    quantity: u64,
    remaining_quantity: u64,
    status: AssignmentStatus,
    /// FIFO tiebreaker assigned by the store on insert.
    issue_sequence: u64,
    assigned_at: Option<DateTime<Utc>>,
    received_at: Option<DateTime<Utc>>,
    returned_at: Option<DateTime<Utc>>,
    version: u64,
}

impl StockAssignment {
    /// Not-yet-created instance, ready for an `Assign` command.
    pub fn empty(id: AssignmentId, employee_id: EmployeeId, product_id: ProductId) -> Self {
        Self {
            id,
            employee_id,
            product_id,
            quantity: 0,
            remaining_quantity: 0,
            status: AssignmentStatus::Assigned,
            issue_sequence: 0,
            assigned_at: None,
            received_at: None,
            returned_at: None,
            version: 0,
        }
    }

    /// Rebuild from a persisted row.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: AssignmentId,
        employee_id: EmployeeId,
        product_id: ProductId,
        quantity: u64,
        remaining_quantity: u64,
        status: AssignmentStatus,
        issue_sequence: u64,
        assigned_at: Option<DateTime<Utc>>,
        received_at: Option<DateTime<Utc>>,
        returned_at: Option<DateTime<Utc>>,
        version: u64,
    ) -> Self {
        Self {
            id,
            employee_id,
            product_id,
            quantity,
            remaining_quantity,
            status,
            issue_sequence,
            assigned_at,
            received_at,
            returned_at,
            version,
        }
    }

    pub fn id_typed(&self) -> AssignmentId {
        self.id
    }

    pub fn employee_id(&self) -> EmployeeId {
        self.employee_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn remaining_quantity(&self) -> u64 {
        self.remaining_quantity
    }

    pub fn status(&self) -> AssignmentStatus {
        self.status
    }

    pub fn issue_sequence(&self) -> u64 {
        self.issue_sequence
    }

    pub fn assigned_at(&self) -> Option<DateTime<Utc>> {
        self.assigned_at
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        self.returned_at
    }

    pub fn is_created(&self) -> bool {
        self.version > 0
    }

    /// Open for FIFO allocation.
    pub fn is_open(&self) -> bool {
        self.status == AssignmentStatus::Received && self.remaining_quantity > 0
    }

    /// Set by the store exactly once, when the row is first inserted.
    pub fn set_issue_sequence(&mut self, sequence: u64) {
        self.issue_sequence = sequence;
    }
}

impl AggregateRoot for StockAssignment {
    type Id = AssignmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: Assign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignStock {
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Receive (employee confirms they hold the stock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveAssignment {
    pub occurred_at: DateTime<Utc>,
}

/// Command: Deduct (employee sold against this assignment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductAssignment {
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Return whatever is left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnAssignment {
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentCommand {
    Assign(AssignStock),
    Receive(ReceiveAssignment),
    Deduct(DeductAssignment),
    Return(ReturnAssignment),
}

/// Event: StockAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAssigned {
    pub assignment_id: AssignmentId,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssignmentReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentReceived {
    pub assignment_id: AssignmentId,
    pub quantity: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssignmentDeducted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentDeducted {
    pub assignment_id: AssignmentId,
    pub quantity: u64,
    pub remaining_after: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssignmentReturned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentReturned {
    pub assignment_id: AssignmentId,
    pub returned_quantity: u64,
    /// False when returned before it was ever received: nothing left the warehouse.
    pub restocks_warehouse: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentEvent {
    StockAssigned(StockAssigned),
    AssignmentReceived(AssignmentReceived),
    AssignmentDeducted(AssignmentDeducted),
    AssignmentReturned(AssignmentReturned),
}

impl Event for AssignmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AssignmentEvent::StockAssigned(_) => "stock.assignment.assigned",
            AssignmentEvent::AssignmentReceived(_) => "stock.assignment.received",
            AssignmentEvent::AssignmentDeducted(_) => "stock.assignment.deducted",
            AssignmentEvent::AssignmentReturned(_) => "stock.assignment.returned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AssignmentEvent::StockAssigned(e) => e.occurred_at,
            AssignmentEvent::AssignmentReceived(e) => e.occurred_at,
            AssignmentEvent::AssignmentDeducted(e) => e.occurred_at,
            AssignmentEvent::AssignmentReturned(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockAssignment {
    type Command = AssignmentCommand;
    type Event = AssignmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AssignmentEvent::StockAssigned(e) => {
                self.quantity = e.quantity;
                self.remaining_quantity = e.quantity;
                self.status = AssignmentStatus::Assigned;
                self.assigned_at = Some(e.occurred_at);
            }
            AssignmentEvent::AssignmentReceived(e) => {
                self.status = AssignmentStatus::Received;
                self.received_at = Some(e.occurred_at);
            }
            AssignmentEvent::AssignmentDeducted(e) => {
                self.remaining_quantity = e.remaining_after;
            }
            AssignmentEvent::AssignmentReturned(e) => {
                self.remaining_quantity = 0;
                self.status = AssignmentStatus::Returned;
                self.returned_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AssignmentCommand::Assign(cmd) => self.handle_assign(cmd),
            AssignmentCommand::Receive(cmd) => self.handle_receive(cmd),
            AssignmentCommand::Deduct(cmd) => self.handle_deduct(cmd),
            AssignmentCommand::Return(cmd) => self.handle_return(cmd),
        }
    }
}

impl StockAssignment {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.is_created() {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_status(&self, expected: AssignmentStatus) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::conflict(format!(
                "assignment is {}, expected {}",
                self.status.as_str(),
                expected.as_str()
            )));
        }
        Ok(())
    }

    fn handle_assign(&self, cmd: &AssignStock) -> Result<Vec<AssignmentEvent>, DomainError> {
        if self.is_created() {
            return Err(DomainError::conflict("assignment already exists"));
        }
        Ok(vec![AssignmentEvent::StockAssigned(StockAssigned {
            assignment_id: self.id,
            quantity: cmd.quantity.get(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveAssignment) -> Result<Vec<AssignmentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_status(AssignmentStatus::Assigned)?;
        Ok(vec![AssignmentEvent::AssignmentReceived(AssignmentReceived {
            assignment_id: self.id,
            quantity: self.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deduct(&self, cmd: &DeductAssignment) -> Result<Vec<AssignmentEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_status(AssignmentStatus::Received)?;

        let q = cmd.quantity.get();
        if q > self.remaining_quantity {
            return Err(DomainError::invariant(format!(
                "deduction of {q} exceeds remaining quantity {}",
                self.remaining_quantity
            )));
        }

        Ok(vec![AssignmentEvent::AssignmentDeducted(AssignmentDeducted {
            assignment_id: self.id,
            quantity: q,
            remaining_after: self.remaining_quantity - q,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_return(&self, cmd: &ReturnAssignment) -> Result<Vec<AssignmentEvent>, DomainError> {
        self.ensure_created()?;
        if self.status == AssignmentStatus::Returned {
            return Err(DomainError::conflict("assignment already returned"));
        }

        Ok(vec![AssignmentEvent::AssignmentReturned(AssignmentReturned {
            assignment_id: self.id,
            returned_quantity: self.remaining_quantity,
            restocks_warehouse: self.status == AssignmentStatus::Received,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_assignment() -> StockAssignment {
        StockAssignment::empty(
            AssignmentId::new(AggregateId::new()),
            EmployeeId::new(),
            ProductId::new(AggregateId::new()),
        )
    }

    fn qty(n: u64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    fn assigned(n: u64) -> StockAssignment {
        let mut a = new_assignment();
        a.execute(&AssignmentCommand::Assign(AssignStock {
            quantity: qty(n),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        a
    }

    fn received(n: u64) -> StockAssignment {
        let mut a = assigned(n);
        a.execute(&AssignmentCommand::Receive(ReceiveAssignment { occurred_at: Utc::now() }))
            .unwrap();
        a
    }

    #[test]
    fn assign_sets_quantity_and_remaining() {
        let a = assigned(10);
        assert_eq!(a.quantity(), 10);
        assert_eq!(a.remaining_quantity(), 10);
        assert_eq!(a.status(), AssignmentStatus::Assigned);
        assert!(a.assigned_at().is_some());
        assert_eq!(a.version(), 1);
        assert!(!a.is_open());
    }

    #[test]
    fn assign_twice_conflicts() {
        let a = assigned(10);
        let err = a
            .handle(&AssignmentCommand::Assign(AssignStock {
                quantity: qty(1),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn receive_opens_for_allocation() {
        let a = received(10);
        assert_eq!(a.status(), AssignmentStatus::Received);
        assert!(a.received_at().is_some());
        assert!(a.is_open());
    }

    #[test]
    fn receive_requires_assigned_status() {
        let a = received(10);
        let err = a
            .handle(&AssignmentCommand::Receive(ReceiveAssignment { occurred_at: Utc::now() }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let missing = new_assignment();
        let err = missing
            .handle(&AssignmentCommand::Receive(ReceiveAssignment { occurred_at: Utc::now() }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn deduct_reduces_remaining_and_rejects_overdraw() {
        let mut a = received(10);
        a.execute(&AssignmentCommand::Deduct(DeductAssignment {
            quantity: qty(4),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        assert_eq!(a.remaining_quantity(), 6);

        let err = a
            .handle(&AssignmentCommand::Deduct(DeductAssignment {
                quantity: qty(7),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn deduct_before_receive_conflicts() {
        let a = assigned(10);
        let err = a
            .handle(&AssignmentCommand::Deduct(DeductAssignment {
                quantity: qty(1),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn return_after_receive_restocks_remaining() {
        let mut a = received(10);
        a.execute(&AssignmentCommand::Deduct(DeductAssignment {
            quantity: qty(3),
            occurred_at: Utc::now(),
        }))
        .unwrap();

        let events = a
            .execute(&AssignmentCommand::Return(ReturnAssignment { occurred_at: Utc::now() }))
            .unwrap();
        match &events[0] {
            AssignmentEvent::AssignmentReturned(e) => {
                assert_eq!(e.returned_quantity, 7);
                assert!(e.restocks_warehouse);
            }
            other => panic!("expected AssignmentReturned, got {other:?}"),
        }
        assert_eq!(a.status(), AssignmentStatus::Returned);
        assert_eq!(a.remaining_quantity(), 0);
        assert!(!a.is_open());
    }

    #[test]
    fn return_before_receive_does_not_restock() {
        let mut a = assigned(5);
        let events = a
            .execute(&AssignmentCommand::Return(ReturnAssignment { occurred_at: Utc::now() }))
            .unwrap();
        assert!(matches!(
            &events[0],
            AssignmentEvent::AssignmentReturned(e)
                if !e.restocks_warehouse && e.returned_quantity == 5
        ));
    }

    #[test]
    fn returned_is_terminal() {
        let mut a = received(5);
        a.execute(&AssignmentCommand::Return(ReturnAssignment { occurred_at: Utc::now() }))
            .unwrap();
        for cmd in [
            AssignmentCommand::Return(ReturnAssignment { occurred_at: Utc::now() }),
            AssignmentCommand::Receive(ReceiveAssignment { occurred_at: Utc::now() }),
            AssignmentCommand::Deduct(DeductAssignment {
                quantity: qty(1),
                occurred_at: Utc::now(),
            }),
        ] {
            assert!(matches!(a.handle(&cmd), Err(DomainError::Conflict(_))));
        }
    }
}
