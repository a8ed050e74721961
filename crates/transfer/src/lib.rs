//! Value movements between categories, on one ledger or mirrored on two.
//!
//! - A single-ledger transfer resolves the source and destination accounts by
//!   category + currency and posts one balanced transaction.
//! - A dual transfer posts one leg per ledger. Legs are separate atomic posts
//!   keyed by a caller-supplied token; there is no cross-ledger rollback. If the
//!   second leg fails the caller gets a `PartialTransfer` and retries with the
//!   same token, which never posts a leg twice.

pub mod coordinator;
pub mod error;
pub mod request;

pub use coordinator::{TransferCoordinator, TransferReceipt, transfer};
pub use error::{Leg, PartialTransfer, TransferError};
pub use request::{CategoryMove, TransferRequest, TransferToken};
