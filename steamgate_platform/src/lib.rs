// steamgate_platform: the platform SDK boundary.
//
// This crate defines the data types and the `Platform` trait that sit
// between the steamgate event bridge and the actual platform client SDK.
// It contains no bridge logic and no host (scripting) types, only the
// identifiers, payloads, and request primitives the SDK surface exposes.
//
// Module overview:
// - `types.rs`:    Typed identifiers (SteamId, CallHandle, LeaderboardHandle,
//                  ImageHandle), image metadata, leaderboard enums, and the
//                  persona-change flag set.
// - `event.rs`:    Everything `poll_once` can deliver: correlated call
//                  outcomes and standing (fire-and-forget) notifications.
// - `platform.rs`: The `Platform` trait: polling, async request primitives,
//                  and synchronous cache lookups.
//
// The companion crate `steamgate_bridge` consumes this boundary. A real SDK
// adapter implements `Platform` against the vendor client library; tests
// implement it with a scripted fake.
//
// **Critical constraint: data lifetime.** Anything the platform hands out
// through `poll_once` is an owned copy. The SDK's own caches of notification
// data are ephemeral and may be recycled as soon as the callback returns, so
// an adapter must copy entry lists and string data into the payload types
// here, never lend references into SDK memory.

pub mod event;
pub mod platform;
pub mod types;

pub use event::{CallOutcome, CallPayload, Notification, PlatformEvent};
pub use platform::Platform;
pub use types::{
    AppId, AvatarSize, CallHandle, ImageHandle, ImageInfo, LeaderboardDisplayType,
    LeaderboardEntry, LeaderboardHandle, LeaderboardSortMethod, PersonaChange, PlayerScope,
    ResultCode, SteamId,
};
