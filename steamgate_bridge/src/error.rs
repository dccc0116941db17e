use thiserror::Error;

/// Errors reported when constructing an event bridge. Everything after
/// construction follows the boolean request contract instead: validation
/// and connectivity failures return false synchronously, and asynchronous
/// failures arrive as error-flagged events.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// A bridge already exists and is pinned to a different thread. The
    /// platform connection is a process-wide singleton, so all bridges must
    /// share one thread of control. This is a configuration error, not a
    /// runtime condition to retry.
    #[error("a bridge already exists on a different thread")]
    WrongThread,
    /// The host session was already torn down when the bridge was built.
    #[error("host session is not running")]
    HostNotRunning,
}
