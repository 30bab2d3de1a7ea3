//! Gateway worker.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Worker`] | Owner-side handle of a worker thread |
//! | [`WorkerOptions`] | Worker configuration |

// ============================================================================
// Submodules
// ============================================================================

/// Worker handle and thread lifecycle.
pub mod core;

/// Worker configuration.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use core::Worker;
pub use options::WorkerOptions;
