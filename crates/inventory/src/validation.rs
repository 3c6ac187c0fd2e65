//! Pre-flight stock checks.

use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult};

use crate::quantity::Quantity;

/// Direction of a requested stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockOperation {
    /// Sale, refill, deposit, assignment receipt.
    Deduct,
    /// Purchase receipt.
    Receive,
    /// Customer or employee return.
    Return,
}

impl StockOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockOperation::Deduct => "deduct",
            StockOperation::Receive => "receive",
            StockOperation::Return => "return",
        }
    }

    pub fn is_additive(&self) -> bool {
        !matches!(self, StockOperation::Deduct)
    }
}

impl core::str::FromStr for StockOperation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deduct" => Ok(StockOperation::Deduct),
            "receive" => Ok(StockOperation::Receive),
            "return" => Ok(StockOperation::Return),
            other => Err(DomainError::validation(format!(
                "invalid operation: {other} (expected deduct, receive or return)"
            ))),
        }
    }
}

pub const REASON_INSUFFICIENT_STOCK: &str = "insufficient_stock";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub available_quantity: i64,
    pub requested_quantity: u64,
    pub operation: StockOperation,
}

impl ValidationOutcome {
    /// Turn a refusal into `InsufficientStock`.
    pub fn into_result(self) -> DomainResult<Self> {
        if self.allowed {
            Ok(self)
        } else {
            Err(DomainError::insufficient_stock(
                self.requested_quantity,
                self.available_quantity,
            ))
        }
    }
}

/// Decide whether `operation` of `quantity` may proceed against `available`.
pub fn evaluate(
    available: i64,
    quantity: Quantity,
    operation: StockOperation,
) -> ValidationOutcome {
    let allowed = operation.is_additive() || quantity.as_delta() <= available;

    ValidationOutcome {
        allowed,
        reason: (!allowed).then(|| REASON_INSUFFICIENT_STOCK.to_string()),
        available_quantity: available,
        requested_quantity: quantity.get(),
        operation,
    }
}
