//! Viewport breakpoints and live detection of the active tier.
//!
//! `core` defines the closed, ordered breakpoint set and the media-query
//! predicates attached to each tier. `hub` is the shared media-query manager
//! every consumer subscribes through, and `oracle` folds the per-query match
//! states into a single active breakpoint.

mod core;
pub mod hub;
pub mod oracle;

pub use self::core::{Breakpoint, BreakpointQuery, MediaQuery, default_breakpoints};
pub use hub::{ListenerId, MediaQueryHub};
pub use oracle::{BreakpointOracle, ObserverId, select_active};
