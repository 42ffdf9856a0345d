//! Error taxonomy shared across the slot engine.

mod types;

pub use types::{PublishBlocked, PublishError, Result, SlotError, StoreError};
