// Everything a single `poll_once` call can deliver.
//
// The platform pushes two shapes of event at the bridge:
// - `CallOutcome`: the completion of one earlier async request, matched back
//   to that request by its `CallHandle`. Carries a transport-level
//   `io_failed` flag separate from any in-payload success flag; the bridge
//   ORs the two together before anything reaches a listener.
// - `Notification`: a standing (fire-and-forget) notification not tied to
//   any particular request.
//
// All payload fields are owned copies. An SDK adapter must read ephemeral
// SDK caches (downloaded leaderboard rows, string names) while building
// these values, because the SDK may recycle that memory right after its
// callback returns.
//
// App-scoped notification variants carry the `AppId` the platform stamped
// on them; the bridge drops events stamped for a different application.
//
// See also: `platform.rs` for the trait that produces these,
// `steamgate_bridge::bridge` for the handlers that consume them.

use serde::{Deserialize, Serialize};

use crate::types::{
    AppId, CallHandle, ImageHandle, LeaderboardEntry, LeaderboardHandle, PersonaChange,
    ResultCode, SteamId,
};

/// One event reported by `Platform::poll_once`, in platform arrival order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PlatformEvent {
    CallResult(CallOutcome),
    Notification(Notification),
}

/// Completion of one in-flight asynchronous call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallOutcome {
    /// The handle the original request primitive returned.
    pub handle: CallHandle,
    /// True when the platform could not complete the request at all.
    /// Independent of any success flag inside `payload`.
    pub io_failed: bool,
    pub payload: CallPayload,
}

/// Per-kind completion data for a correlated call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CallPayload {
    /// Result of `find_leaderboard`.
    LeaderboardFound {
        found: bool,
        handle: LeaderboardHandle,
    },
    /// Result of `download_leaderboard_entries`. Entries are already copied
    /// out of the SDK's transient download cache.
    EntriesDownloaded {
        handle: LeaderboardHandle,
        entries: Vec<LeaderboardEntry>,
    },
    /// Result of `upload_leaderboard_score`.
    ScoreUploaded {
        success: bool,
        handle: LeaderboardHandle,
        score_changed: bool,
        global_rank_new: i32,
        global_rank_previous: i32,
    },
    /// Result of `request_player_count`.
    PlayerCount { success: bool, count: i32 },
}

/// A standing notification, emitted by the platform without being tied to
/// a specific prior request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Notification {
    /// The platform overlay opened or closed on top of the game.
    OverlayActivated { active: bool },
    /// The user approved or declined an in-game purchase in the overlay.
    MicroTxnAuthorization { authorized: bool, order_id: u64 },
    /// Some aspect of a user's public info changed.
    PersonaStateChanged {
        user: SteamId,
        changes: PersonaChange,
    },
    /// A previously requested large avatar finished downloading.
    AvatarImageLoaded { user: SteamId, image: ImageHandle },
    /// A previously requested achievement icon finished downloading.
    AchievementIconFetched {
        app: AppId,
        name: String,
        icon: ImageHandle,
        unlocked: bool,
    },
    /// The platform persisted an achievement progress update.
    AchievementStored {
        app: AppId,
        name: String,
        is_group: bool,
        current_progress: u32,
        max_progress: u32,
    },
    /// Stats and achievements for a user arrived from the platform.
    UserStatsReceived {
        app: AppId,
        user: SteamId,
        result: ResultCode,
    },
    /// The logged-in user's stats were written back to the platform.
    /// The platform does not include the user id here; the bridge reads the
    /// current user at capture time.
    UserStatsStored { app: AppId, result: ResultCode },
    /// The platform evicted a user's stats from its cache.
    UserStatsUnloaded { user: SteamId },
}
