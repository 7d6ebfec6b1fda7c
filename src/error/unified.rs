//! Error classification and recovery.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Fetch,
    StaleWrite,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Usage,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Nothing to do; the next poll tick retries.
    WaitForNextPoll,
    /// The user action was reverted and may be retried.
    RetryAction,
    CheckConfiguration,
    /// The caller passed something the engine refuses.
    FixRequest,
    CheckBackend,
}
