//! Handler adaptation system.
//!
//! This module turns plain async functions into uniform, chainable request
//! handlers:
//!
//! - **Traits** ([`traits`]) — the [`Handler`] trait blanket-implemented over
//!   function arities, and [`IntoOutcome`] lowering arbitrary return types
//!   into an [`Outcome`];
//! - **Adapter** ([`adapter`]) — [`adapt`] builds the type-erased
//!   [`AdaptedHandler`] from a handler, a resolution plan, and a [`Snapshot`]
//!   of the owning scope's error handler and result chain.
//!
//! Handlers never touch pipeline control; the adapter maps their outcome to
//! [`Flow`](splice_core::Flow) so "business error" and "stop the pipeline"
//! stay distinct.

pub mod adapter;
pub mod traits;

pub use adapter::{AdaptedHandler, ErrorHandler, Snapshot, adapt, default_error_handler};
pub use traits::{Handler, IntoOutcome, Json, Outcome};
