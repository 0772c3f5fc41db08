//! # axon-runtime
//!
//! Runtime support linked by axon-generated resolvers:
//!
//! - [`interceptor`]: ordered before/after middleware chains around the two
//!   extension points generated code exposes — argument resolution and
//!   outbound call execution.
//! - [`scalar`]: the fixed set of named coercion rules the generator's
//!   scalar table references, turning raw GraphQL argument values into
//!   host-typed values.
//! - [`loader`]: the batch-match algorithms generated dataloaders call to
//!   zip batched responses back to their request keys by position.

pub mod interceptor;
pub mod loader;
pub mod scalar;

pub use interceptor::{CallContext, Chain, Interceptor, Next, Stage};
pub use loader::{collect_many, collect_one, BatchWindow};
pub use scalar::{NoData, ScalarError};

/// Errors surfaced to generated resolvers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A scalar coercion failed.
    #[error(transparent)]
    Scalar(#[from] ScalarError),

    /// A context key a field is bound to was never injected.
    #[error("missing context value `{0}`")]
    MissingContext(String),

    /// Failure reported by an interceptor or the terminal operation.
    #[error("{0}")]
    Call(String),
}
