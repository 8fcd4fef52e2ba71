//! Runtime adapters for deferred scheduler work.

#[cfg(feature = "tokio-runtime")]
pub mod tokio_defer;

#[cfg(feature = "tokio-runtime")]
pub use tokio_defer::TokioDefer;
