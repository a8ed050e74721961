use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dualbook_core::LedgerId;

use crate::Event;

/// Envelope for a journal event, carrying ledger + ordering metadata.
///
/// This is the unit a ledger appends to its journal.
///
/// Notes:
/// - `ledger_id` scopes the event; a journal never mixes ledgers.
/// - `sequence_number` is 1-based and gap-free within a ledger.
/// - `recorded_at` is system time, not business time (transactions carry their
///   own timestamp inside the payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    ledger_id: LedgerId,

    /// Monotonically increasing position in the ledger journal.
    sequence_number: u64,

    event_type: String,
    event_version: u32,
    recorded_at: DateTime<Utc>,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        ledger_id: LedgerId,
        sequence_number: u64,
        event_type: impl Into<String>,
        event_version: u32,
        recorded_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            ledger_id,
            sequence_number,
            event_type: event_type.into(),
            event_version,
            recorded_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn ledger_id(&self) -> LedgerId {
        self.ledger_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
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

impl<E: Event> EventEnvelope<E> {
    /// Wrap a freshly committed event, stamping id, type and recording time.
    pub fn seal(ledger_id: LedgerId, sequence_number: u64, payload: E) -> Self {
        Self::new(
            Uuid::now_v7(),
            ledger_id,
            sequence_number,
            payload.event_type(),
            payload.version(),
            Utc::now(),
            payload,
        )
    }
}
