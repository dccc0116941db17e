// Typed identifiers and small value types for the platform boundary.
//
// All of the 64-bit platform identifiers get newtype wrappers so the bridge
// can't mix a leaderboard handle up with a user id or a call handle. The
// wire encoding of 64-bit ids is always a decimal string (the host's number
// type cannot hold full 64-bit precision), so `Display` on these types
// renders the decimal form the outbound event schema uses.
//
// See also: `event.rs` for the payloads these types appear in,
// `steamgate_bridge::event` for the outbound record schemas.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 64-bit platform user id. Zero is the invalid/unset id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SteamId(pub u64);

impl SteamId {
    pub const INVALID: SteamId = SteamId(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 64-bit leaderboard handle. Zero means "no leaderboard".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaderboardHandle(pub u64);

impl LeaderboardHandle {
    pub const INVALID: LeaderboardHandle = LeaderboardHandle(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for LeaderboardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque token for one in-flight asynchronous platform call.
///
/// Returned immediately by every async request primitive; the matching
/// completion is reported later through `poll_once` as a [`CallOutcome`]
/// carrying the same handle. Zero means the request never started.
///
/// [`CallOutcome`]: crate::event::CallOutcome
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallHandle(pub u64);

impl CallHandle {
    pub const INVALID: CallHandle = CallHandle(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// A platform-owned image reference.
///
/// These are ephemeral: the platform may recycle the backing pixels at any
/// time, so a handle is only meaningful until the next failed
/// `Platform::image_info` lookup. Zero means "no image"; -1 is the
/// platform's marker for "a large-avatar download is already in flight".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageHandle(pub i32);

impl ImageHandle {
    pub const NONE: ImageHandle = ImageHandle(0);
    pub const FETCH_PENDING: ImageHandle = ImageHandle(-1);
}

/// The application id the platform assigned to this game.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppId(pub u32);

/// Raw platform result code. `1` is the platform's OK value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCode(pub i32);

impl ResultCode {
    pub const OK: ResultCode = ResultCode(1);
    /// The platform's generic failure code.
    pub const FAIL: ResultCode = ResultCode(2);

    pub fn is_ok(self) -> bool {
        self == ResultCode::OK
    }
}

impl Default for ResultCode {
    fn default() -> Self {
        ResultCode::FAIL
    }
}

/// Dimensions and handle of a platform-cached image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub handle: ImageHandle,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl ImageInfo {
    /// True when the handle references a real, fully loaded image.
    /// The 0 and -1 marker handles are never valid, and a loaded image
    /// always has nonzero dimensions.
    pub fn is_valid(self) -> bool {
        self.handle != ImageHandle::NONE
            && self.handle != ImageHandle::FETCH_PENDING
            && self.pixel_width > 0
            && self.pixel_height > 0
    }
}

/// Leaderboard sort order, as reported by the platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardSortMethod {
    #[default]
    None,
    Ascending,
    Descending,
    Unknown,
}

/// How leaderboard scores are meant to be displayed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardDisplayType {
    #[default]
    None,
    Numeric,
    Seconds,
    Milliseconds,
    Unknown,
}

/// Which slice of a leaderboard an entry-download request targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerScope {
    /// Absolute ranks; index 1 is the top score.
    #[default]
    Global,
    /// Ranks relative to the logged-in user; index 0 is that user.
    GlobalAroundUser,
    /// The user's friends only. The platform ignores index ranges here.
    FriendsOnly,
}

/// One downloaded leaderboard row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user: SteamId,
    pub global_rank: i32,
    pub score: i32,
}

/// Avatar image size selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvatarSize {
    Small,
    Medium,
    Large,
}

/// What changed about a user, as flagged by a persona-state notification.
///
/// The platform reports small and medium avatar updates under one `avatar`
/// flag; large avatars are never flagged here and instead arrive through
/// the chained fetch path (see `steamgate_bridge::bridge`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaChange {
    pub name: bool,
    pub status: bool,
    pub avatar: bool,
    pub relationship: bool,
    pub nickname: bool,
    pub steam_level: bool,
}
