// Outbound event payloads.
//
// `EventData` is the exhaustive set of event kinds the bridge can deliver,
// one variant per topic. A variant is captured during the poll phase with
// every field copied out of the platform immediately (the platform's own
// caches are ephemeral), and turned into the wire-shaped `serde_json::Value`
// only later, when its task is drained.
//
// The wire schemas live here as private serde structs with camelCase field
// names. Two rules apply across all of them:
// - 64-bit identifiers (user ids, leaderboard handles, purchase order ids)
//   are rendered as decimal strings. The host's number type cannot hold full
//   64-bit precision.
// - The delivered `isError` is the OR of the platform-reported error and the
//   correlator's transport-failure flag. A result that succeeded at the
//   platform level but arrived after an I/O failure still reads as an error.
//
// Materialization returns `None` in exactly one case: an achievement image
// whose handle the platform can no longer resolve. That one event is
// dropped, silently, without disturbing the rest of the drain.

use serde::Serialize;
use serde_json::Value;

use steamgate_platform::{
    ImageHandle, ImageInfo, LeaderboardDisplayType, LeaderboardEntry, LeaderboardHandle,
    LeaderboardSortMethod, PersonaChange, Platform, SteamId,
};

/// Outbound topic names, as subscribed to by script-side listeners.
pub mod topic {
    pub const OVERLAY_STATUS: &str = "overlayStatus";
    pub const LEADERBOARD_ENTRIES: &str = "leaderboardEntries";
    pub const LEADERBOARD_INFO: &str = "leaderboardInfo";
    pub const SET_HIGH_SCORE: &str = "setHighScore";
    pub const MICROTRANSACTION_AUTHORIZATION: &str = "microtransactionAuthorization";
    pub const ACTIVE_PLAYER_COUNT: &str = "activePlayerCount";
    pub const USER_INFO_UPDATE: &str = "userInfoUpdate";
    pub const ACHIEVEMENT_IMAGE_UPDATE: &str = "achievementImageUpdate";
    pub const ACHIEVEMENT_INFO_UPDATE: &str = "achievementInfoUpdate";
    pub const USER_PROGRESS_UPDATE: &str = "userProgressUpdate";
    pub const USER_PROGRESS_SAVE: &str = "userProgressSave";
    pub const USER_PROGRESS_UNLOAD: &str = "userProgressUnload";
}

/// One captured event, independent of platform memory from this point on.
#[derive(Clone, Debug)]
pub enum EventData {
    OverlayStatus {
        shown: bool,
    },
    LeaderboardEntries {
        is_error: bool,
        handle: LeaderboardHandle,
        entries: Vec<LeaderboardEntry>,
    },
    LeaderboardInfo {
        is_error: bool,
        handle: LeaderboardHandle,
        entry_count: i32,
        sort_method: LeaderboardSortMethod,
        display_type: LeaderboardDisplayType,
    },
    HighScore {
        is_error: bool,
        handle: LeaderboardHandle,
        score_changed: bool,
        global_rank_new: i32,
        global_rank_previous: i32,
    },
    MicroTxnAuthorization {
        authorized: bool,
        order_id: u64,
    },
    ActivePlayerCount {
        is_error: bool,
        count: i32,
    },
    UserInfoUpdate {
        user: SteamId,
        name_changed: bool,
        status_changed: bool,
        small_avatar_changed: bool,
        medium_avatar_changed: bool,
        large_avatar_changed: bool,
        relationship_changed: bool,
        nickname_changed: bool,
        steam_level_changed: bool,
    },
    AchievementImageUpdate {
        name: String,
        icon: ImageHandle,
        unlocked: bool,
    },
    AchievementInfoUpdate {
        name: String,
        is_group: bool,
        current_progress: u32,
        max_progress: u32,
    },
    UserProgressUpdate {
        user: SteamId,
        is_error: bool,
        result_code: i32,
    },
    UserProgressSave {
        user: SteamId,
        is_error: bool,
        result_code: i32,
    },
    UserProgressUnload {
        user: SteamId,
    },
}

impl EventData {
    /// A user-info event from a persona-state notification. The platform
    /// flags small and medium avatar changes together; the large flag is
    /// owned by the chained-fetch logic and passed in separately.
    pub fn user_info(user: SteamId, changes: PersonaChange, large_avatar_changed: bool) -> Self {
        EventData::UserInfoUpdate {
            user,
            name_changed: changes.name,
            status_changed: changes.status,
            small_avatar_changed: changes.avatar,
            medium_avatar_changed: changes.avatar,
            large_avatar_changed,
            relationship_changed: changes.relationship,
            nickname_changed: changes.nickname,
            steam_level_changed: changes.steam_level,
        }
    }

    /// A user-info event announcing only that the large avatar finished
    /// loading. Dispatched when a deferred large-avatar fetch completes.
    pub fn large_avatar_loaded(user: SteamId) -> Self {
        EventData::user_info(user, PersonaChange::default(), true)
    }

    pub fn topic(&self) -> &'static str {
        match self {
            EventData::OverlayStatus { .. } => topic::OVERLAY_STATUS,
            EventData::LeaderboardEntries { .. } => topic::LEADERBOARD_ENTRIES,
            EventData::LeaderboardInfo { .. } => topic::LEADERBOARD_INFO,
            EventData::HighScore { .. } => topic::SET_HIGH_SCORE,
            EventData::MicroTxnAuthorization { .. } => topic::MICROTRANSACTION_AUTHORIZATION,
            EventData::ActivePlayerCount { .. } => topic::ACTIVE_PLAYER_COUNT,
            EventData::UserInfoUpdate { .. } => topic::USER_INFO_UPDATE,
            EventData::AchievementImageUpdate { .. } => topic::ACHIEVEMENT_IMAGE_UPDATE,
            EventData::AchievementInfoUpdate { .. } => topic::ACHIEVEMENT_INFO_UPDATE,
            EventData::UserProgressUpdate { .. } => topic::USER_PROGRESS_UPDATE,
            EventData::UserProgressSave { .. } => topic::USER_PROGRESS_SAVE,
            EventData::UserProgressUnload { .. } => topic::USER_PROGRESS_UNLOAD,
        }
    }

    /// Build the wire-shaped payload for this event.
    ///
    /// `io_failed` is the correlator's transport flag, OR-composed into
    /// `isError`. `leaderboard_name` is the back-filled name for the three
    /// leaderboard topics (the platform omits it from completion payloads);
    /// a missing name degrades to `""` rather than failing.
    ///
    /// Returns `None` only when a referenced achievement image handle is no
    /// longer resolvable through `platform`.
    pub fn materialize(
        &self,
        io_failed: bool,
        leaderboard_name: Option<&str>,
        platform: &dyn Platform,
    ) -> Option<Value> {
        let name = leaderboard_name.unwrap_or("");
        match self {
            EventData::OverlayStatus { shown } => to_wire(&OverlayStatusRecord {
                phase: if *shown { "shown" } else { "hidden" },
            }),
            EventData::LeaderboardEntries {
                is_error,
                handle,
                entries,
            } => to_wire(&LeaderboardEntriesRecord {
                is_error: *is_error || io_failed,
                leaderboard_name: name,
                leaderboard_handle: handle.to_string(),
                entries: entries
                    .iter()
                    .map(|entry| LeaderboardEntryRecord {
                        user_steam_id: entry.user.to_string(),
                        global_rank: entry.global_rank,
                        score: entry.score,
                    })
                    .collect(),
            }),
            EventData::LeaderboardInfo {
                is_error,
                handle,
                entry_count,
                sort_method,
                display_type,
            } => {
                let is_error = *is_error || io_failed;
                to_wire(&LeaderboardInfoRecord {
                    is_error,
                    leaderboard_name: name,
                    // The handle is only meaningful for a successful find.
                    leaderboard_handle: (!is_error).then(|| handle.to_string()),
                    entry_count: *entry_count,
                    sort_method: *sort_method,
                    display_type: *display_type,
                })
            }
            EventData::HighScore {
                is_error,
                handle,
                score_changed,
                global_rank_new,
                global_rank_previous,
            } => to_wire(&HighScoreRecord {
                is_error: *is_error || io_failed,
                leaderboard_handle: handle.to_string(),
                leaderboard_name: name,
                score_changed: *score_changed,
                current_global_rank: rank_field(*score_changed, *global_rank_new),
                previous_global_rank: rank_field(*score_changed, *global_rank_previous),
            }),
            EventData::MicroTxnAuthorization {
                authorized,
                order_id,
            } => to_wire(&MicroTxnRecord {
                authorized: *authorized,
                order_id: order_id.to_string(),
            }),
            EventData::ActivePlayerCount { is_error, count } => {
                let is_error = *is_error || io_failed;
                to_wire(&ActivePlayerCountRecord {
                    is_error,
                    count: (!is_error).then_some(*count),
                })
            }
            EventData::UserInfoUpdate {
                user,
                name_changed,
                status_changed,
                small_avatar_changed,
                medium_avatar_changed,
                large_avatar_changed,
                relationship_changed,
                nickname_changed,
                steam_level_changed,
            } => to_wire(&UserInfoUpdateRecord {
                user_steam_id: user.to_string(),
                name_changed: *name_changed,
                status_changed: *status_changed,
                small_avatar_changed: *small_avatar_changed,
                medium_avatar_changed: *medium_avatar_changed,
                large_avatar_changed: *large_avatar_changed,
                relationship_changed: *relationship_changed,
                nickname_changed: *nickname_changed,
                steam_level_changed: *steam_level_changed,
            }),
            EventData::AchievementImageUpdate {
                name,
                icon,
                unlocked,
            } => {
                // Image handles are ephemeral; resolve at delivery time and
                // drop the event if the platform has recycled the image.
                let info = platform.image_info(*icon).filter(|info| info.is_valid())?;
                to_wire(&AchievementImageUpdateRecord {
                    achievement_name: name,
                    image_info: ImageInfoRecord::from(info),
                    unlocked: *unlocked,
                })
            }
            EventData::AchievementInfoUpdate {
                name,
                is_group,
                current_progress,
                max_progress,
            } => to_wire(&AchievementInfoUpdateRecord {
                achievement_name: name,
                is_group: *is_group,
                current_progress: (*max_progress > 0).then_some(*current_progress),
                max_progress: (*max_progress > 0).then_some(*max_progress),
            }),
            EventData::UserProgressUpdate {
                user,
                is_error,
                result_code,
            } => to_wire(&UserProgressRecord {
                user_steam_id: user.to_string(),
                is_error: *is_error || io_failed,
                result_code: *result_code,
            }),
            EventData::UserProgressSave {
                user,
                is_error,
                result_code,
            } => to_wire(&UserProgressRecord {
                user_steam_id: user.to_string(),
                is_error: *is_error || io_failed,
                result_code: *result_code,
            }),
            EventData::UserProgressUnload { user } => to_wire(&UserProgressUnloadRecord {
                user_steam_id: user.to_string(),
            }),
        }
    }
}

// Ranks are only meaningful when the upload actually changed the score, and
// the platform reports 0 for "no rank".
fn rank_field(score_changed: bool, rank: i32) -> Option<i32> {
    (score_changed && rank > 0).then_some(rank)
}

fn to_wire<T: Serialize>(record: &T) -> Option<Value> {
    match serde_json::to_value(record) {
        Ok(value) => Some(value),
        Err(err) => {
            log::error!("failed to serialize event payload: {err}");
            None
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OverlayStatusRecord {
    phase: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardEntryRecord {
    user_steam_id: String,
    global_rank: i32,
    score: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardEntriesRecord<'a> {
    is_error: bool,
    leaderboard_name: &'a str,
    leaderboard_handle: String,
    entries: Vec<LeaderboardEntryRecord>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LeaderboardInfoRecord<'a> {
    is_error: bool,
    leaderboard_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    leaderboard_handle: Option<String>,
    entry_count: i32,
    sort_method: LeaderboardSortMethod,
    display_type: LeaderboardDisplayType,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HighScoreRecord<'a> {
    is_error: bool,
    leaderboard_handle: String,
    leaderboard_name: &'a str,
    score_changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_global_rank: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_global_rank: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MicroTxnRecord {
    authorized: bool,
    order_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActivePlayerCountRecord {
    is_error: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserInfoUpdateRecord {
    user_steam_id: String,
    name_changed: bool,
    status_changed: bool,
    small_avatar_changed: bool,
    medium_avatar_changed: bool,
    large_avatar_changed: bool,
    relationship_changed: bool,
    nickname_changed: bool,
    steam_level_changed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageInfoRecord {
    image_handle: i32,
    pixel_width: u32,
    pixel_height: u32,
}

impl From<ImageInfo> for ImageInfoRecord {
    fn from(info: ImageInfo) -> Self {
        ImageInfoRecord {
            image_handle: info.handle.0,
            pixel_width: info.pixel_width,
            pixel_height: info.pixel_height,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AchievementImageUpdateRecord<'a> {
    achievement_name: &'a str,
    image_info: ImageInfoRecord,
    unlocked: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AchievementInfoUpdateRecord<'a> {
    achievement_name: &'a str,
    is_group: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_progress: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_progress: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserProgressRecord {
    user_steam_id: String,
    is_error: bool,
    result_code: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserProgressUnloadRecord {
    user_steam_id: String,
}
