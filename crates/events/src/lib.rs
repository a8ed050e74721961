//! Journal events: the facts a ledger records about itself.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
