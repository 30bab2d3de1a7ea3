//! Worker configuration.
//!
//! # Example
//!
//! ```
//! use ws_gateway::WorkerOptions;
//!
//! let options = WorkerOptions::new(3)
//!     .with_read_buffer_size(16 * 1024)
//!     .with_nodelay(false);
//!
//! assert!(options.validate().is_ok());
//! assert_eq!(options.pipe_address(), "inproc://wsrouter-3");
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::stream::DEFAULT_READ_BUFFER_SIZE;

// ============================================================================
// Constants
// ============================================================================

/// Prefix of the bridge pipe address.
const PIPE_ADDRESS_PREFIX: &str = "inproc://wsrouter-";

/// Prefix of the worker thread name.
const THREAD_NAME_PREFIX: &str = "ws-gateway-";

// ============================================================================
// WorkerOptions
// ============================================================================

/// Configuration of one gateway worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkerOptions {
    /// Worker id, unique per host process.
    pub id: u32,

    /// Maximum bytes delivered per stream read.
    pub read_buffer_size: usize,

    /// Disable Nagle's algorithm on accepted sockets.
    pub nodelay: bool,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            id: 0,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            nodelay: true,
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl WorkerOptions {
    /// Creates default options for the given worker id.
    #[inline]
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Parses options from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the input is not valid JSON for this type
    /// - [`Error::Config`] if the parsed options fail validation
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl WorkerOptions {
    /// Sets the worker id.
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    /// Sets the per-read chunk size.
    #[inline]
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Enables or disables `TCP_NODELAY` on accepted sockets.
    #[inline]
    #[must_use]
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

// ============================================================================
// Derived Values
// ============================================================================

impl WorkerOptions {
    /// Checks the options for values the worker cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `read_buffer_size` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(Error::config(
                "read_buffer_size must be greater than zero.\n\
                 Example: WorkerOptions::new(1).with_read_buffer_size(8192)",
            ));
        }
        Ok(())
    }

    /// Returns the bridge pipe address, `inproc://wsrouter-{id}`.
    #[must_use]
    pub fn pipe_address(&self) -> String {
        format!("{PIPE_ADDRESS_PREFIX}{}", self.id)
    }

    /// Returns the name of the worker thread.
    #[must_use]
    pub fn thread_name(&self) -> String {
        format!("{THREAD_NAME_PREFIX}{}", self.id)
    }
}

// ============================================================================
// Tests
// ============================================================================
