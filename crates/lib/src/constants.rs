//! Constants used throughout the coordtree library.
//!
//! Central definitions for the path delimiter and the defaults applied when a
//! [`ClientConfig`](crate::config::ClientConfig) leaves a field unset.

/// Separator between path segments.
pub const DELIMITER: char = '/';

/// Path of the root node, the only path allowed to end with the delimiter.
pub const ROOT: &str = "/";

/// Default connection timeout in milliseconds.
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 2_000;

/// Default session timeout in milliseconds.
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 2_000;

/// Default number of times the transport retries a retryable fault.
pub const DEFAULT_RETRY_COUNT: u32 = 1;

/// Default sleep between transport retries in milliseconds.
pub const DEFAULT_RETRY_SLEEP_MS: u64 = 100;

/// Default upper bound for a single store operation in milliseconds.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 30_000;

/// Default upper bound for the initial connect in seconds.
pub const DEFAULT_MAX_BLOCK_UNTIL_CONNECTED_SECS: u64 = 30;

/// Number of connection-state events buffered per subscriber.
pub const STATE_CHANNEL_CAPACITY: usize = 16;

/// Width of the zero-padded counter appended to sequential node names.
pub const SEQUENCE_WIDTH: usize = 10;
