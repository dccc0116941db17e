// The `Platform` trait: the full SDK surface the bridge depends on.
//
// Split into three groups:
// - The callback pump: `poll_once`, called exactly once per frame gate by
//   the bridge. Everything asynchronous funnels through it.
// - Async request primitives: return a `CallHandle` immediately; the
//   matching `CallOutcome` arrives through a later `poll_once`. An invalid
//   handle means the request never started (the platform connection is
//   down, or the arguments were rejected outright).
// - Synchronous lookups against the platform's local caches: leaderboard
//   attributes by handle, image metadata, avatar handles. These never
//   block; a miss is an `Option::None` or a marker handle, never a wait.
//
// The trait is object-safe; the bridge stores a `Box<dyn Platform>`.
// A production adapter wraps the vendor SDK; tests use a scripted fake.

use crate::event::PlatformEvent;
use crate::types::{
    AppId, AvatarSize, CallHandle, ImageHandle, ImageInfo, LeaderboardDisplayType,
    LeaderboardHandle, LeaderboardSortMethod, PlayerScope, SteamId,
};

pub trait Platform {
    /// The application id this process is running as.
    fn app_id(&self) -> AppId;

    /// The logged-in user, or `SteamId::INVALID` when nobody is logged on.
    fn current_user(&self) -> SteamId;

    /// False when the platform client connection is not established.
    /// Requests made while disconnected fail synchronously.
    fn is_connected(&self) -> bool;

    /// Run the platform's callback dispatch once and return every event it
    /// produced, in arrival order. This is the only reentry point for new
    /// notifications; nothing below delivers events directly.
    fn poll_once(&mut self) -> Vec<PlatformEvent>;

    // --- Async request primitives (completion arrives via poll_once) ---

    /// Resolve a leaderboard handle by its unique name.
    fn find_leaderboard(&mut self, name: &str) -> CallHandle;

    /// Download a slice of leaderboard rows. Indexing is 1-based for
    /// `Global` scope and relative to the logged-in user for
    /// `GlobalAroundUser`; `FriendsOnly` ignores the range.
    fn download_leaderboard_entries(
        &mut self,
        handle: LeaderboardHandle,
        scope: PlayerScope,
        start_index: i32,
        end_index: i32,
    ) -> CallHandle;

    /// Upload a score, keeping the user's best.
    fn upload_leaderboard_score(&mut self, handle: LeaderboardHandle, score: i32) -> CallHandle;

    /// Ask for the current number of players in this game.
    fn request_player_count(&mut self) -> CallHandle;

    /// Ask for another user's stats/achievements. The response arrives as a
    /// standing `UserStatsReceived` notification, not a call result.
    fn request_user_stats(&mut self, user: SteamId) -> CallHandle;

    /// Ask for the logged-in user's stats/achievements.
    fn request_current_user_stats(&mut self) -> bool;

    // --- Synchronous cache lookups ---

    /// The unique name of a leaderboard, if the platform has it cached.
    fn leaderboard_name(&self, handle: LeaderboardHandle) -> Option<String>;

    /// Total row count of a leaderboard known from a prior find result.
    fn leaderboard_entry_count(&self, handle: LeaderboardHandle) -> i32;

    fn leaderboard_sort_method(&self, handle: LeaderboardHandle) -> LeaderboardSortMethod;

    fn leaderboard_display_type(&self, handle: LeaderboardHandle) -> LeaderboardDisplayType;

    /// Metadata for a platform-cached image. `None` means the handle is not
    /// (or no longer) resolvable; ephemeral handles expire whenever the
    /// platform recycles its image cache.
    fn image_info(&self, handle: ImageHandle) -> Option<ImageInfo>;

    /// Handle to a user's avatar at the given size. `ImageHandle::NONE`
    /// means not cached yet; `ImageHandle::FETCH_PENDING` means a large
    /// avatar download is already in flight.
    fn avatar_image(&mut self, user: SteamId, size: AvatarSize) -> ImageHandle;

    /// Ask the platform to fetch a user's name/avatar data. Returns true if
    /// a fetch was actually issued (i.e. the info was not already cached);
    /// a `PersonaStateChanged` notification follows when it lands.
    fn request_user_information(&mut self, user: SteamId, name_only: bool) -> bool;

    /// Handle to an achievement's icon. `ImageHandle::NONE` means the
    /// platform started fetching it; an `AchievementIconFetched`
    /// notification follows once it is available.
    fn achievement_icon(&mut self, name: &str) -> ImageHandle;

    /// True while the platform overlay wants the game to keep presenting
    /// frames (it renders by hooking the game's swap chain).
    fn overlay_needs_present(&self) -> bool;
}
