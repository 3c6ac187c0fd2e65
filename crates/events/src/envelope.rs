use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::AggregateId;

/// A committed event together with its stream position.
///
/// Produced only by stores: `sequence_number` is assigned at append time and is
/// strictly increasing (no gaps) within one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    stream_id: AggregateId,
    stream_type: String,
    sequence_number: u64,
    recorded_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        stream_id: AggregateId,
        stream_type: impl Into<String>,
        sequence_number: u64,
        recorded_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            stream_id,
            stream_type: stream_type.into(),
            sequence_number,
            recorded_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn stream_id(&self) -> AggregateId {
        self.stream_id
    }

    pub fn stream_type(&self) -> &str {
        &self.stream_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_metadata() {
        let env = EventEnvelope::new(
            Uuid::now_v7(),
            AggregateId::new(),
            "stock.product",
            7,
            Utc::now(),
            "payload",
        );
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["sequenceNumber"], 7);
        assert_eq!(json["streamType"], "stock.product");
        assert_eq!(json["payload"], "payload");
    }
}
