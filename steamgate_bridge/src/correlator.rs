// Call-result correlation.
//
// Every async platform request returns an opaque `CallHandle` immediately;
// the completion arrives through a later poll. The correlator remembers, per
// in-flight handle, where the eventual event must go and what kind of
// request produced it, so the completion handler can rebuild the right event
// without any captured closures.
//
// An entry is consumed exactly once. Entries whose handle never completes
// are dropped with the bridge, without dispatch; the host may already be
// gone by then.

use rustc_hash::FxHashMap;
use std::rc::Rc;

use steamgate_platform::CallHandle;

use crate::bridge::{EntriesRequest, HighScoreRequest};
use crate::dispatcher::EventDispatcher;

/// The per-request context stored until the platform reports completion.
pub struct PendingCall {
    /// Where the resulting event is delivered. For correlated calls this is
    /// always a single-listener dispatcher built when the request was made.
    pub dispatcher: Rc<EventDispatcher>,
    pub request: PendingRequest,
}

/// What kind of request the handle belongs to, with its side-channel data.
pub enum PendingRequest {
    /// A find issued by an explicit info request; the name back-fills the
    /// resulting event and feeds the name cache on success.
    LeaderboardInfo { name: String },
    /// An entry download already holding a resolved handle.
    LeaderboardEntries { name: String },
    /// A score upload already holding a resolved handle.
    HighScore { name: String },
    PlayerCount,
    /// A find issued internally to satisfy a request whose leaderboard name
    /// missed the cache. On success the stored original request is
    /// re-issued; on failure an error event of the original kind goes
    /// straight to the original listener.
    ResolveThenRetry { retry: RetryRequest },
}

/// The original request held across an internal name resolution.
pub enum RetryRequest {
    Entries(EntriesRequest),
    HighScore(HighScoreRequest),
}

impl RetryRequest {
    pub fn leaderboard_name(&self) -> &str {
        match self {
            RetryRequest::Entries(req) => &req.leaderboard_name,
            RetryRequest::HighScore(req) => &req.leaderboard_name,
        }
    }
}

#[derive(Default)]
pub struct CallResultCorrelator {
    pending: FxHashMap<CallHandle, PendingCall>,
}

impl CallResultCorrelator {
    pub fn new() -> CallResultCorrelator {
        CallResultCorrelator::default()
    }

    /// Store the context for an in-flight handle. Returns false, storing
    /// nothing, when the handle is invalid (the platform rejected the
    /// request synchronously); the caller reports that failure itself.
    pub fn register(&mut self, handle: CallHandle, call: PendingCall) -> bool {
        if !handle.is_valid() {
            return false;
        }
        if self.pending.insert(handle, call).is_some() {
            // Handles are unique per in-flight request; a collision means
            // the platform recycled one while we still tracked it.
            log::warn!("call handle {} re-registered while pending", handle.0);
        }
        true
    }

    /// Consume the context for a completed handle. `None` for handles never
    /// registered or already consumed.
    pub fn complete(&mut self, handle: CallHandle) -> Option<PendingCall> {
        self.pending.remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
