// End-to-end poll/drain cycles against a scripted platform.
//
// The fake platform is driven from the outside through a shared state
// handle: tests queue the events the next poll should deliver and inspect
// which request primitives the bridge issued. Tests that construct bridges
// serialize on one lock because the bridge registry pins a thread of
// control process-wide.

use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, PoisonError};

use steamgate_bridge::{
    BridgeError, EntriesRequest, EventBridge, HighScoreRequest, HostSession, Listener, registry,
    topic,
};
use steamgate_platform::{
    AppId, AvatarSize, CallHandle, CallOutcome, CallPayload, ImageHandle, ImageInfo,
    LeaderboardDisplayType, LeaderboardEntry, LeaderboardHandle, LeaderboardSortMethod,
    Notification, PersonaChange, Platform, PlatformEvent, PlayerScope, ResultCode, SteamId,
};

static REGISTRY_LOCK: Mutex<()> = Mutex::new(());

fn registry_lock() -> MutexGuard<'static, ()> {
    REGISTRY_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

const APP: AppId = AppId(480);
const ME: SteamId = SteamId(76561197960287930);

#[derive(Default)]
struct FakeState {
    connected: bool,
    next_call: u64,
    incoming: VecDeque<PlatformEvent>,
    reject_requests: bool,

    find_calls: Vec<(CallHandle, String)>,
    download_calls: Vec<(CallHandle, LeaderboardHandle, PlayerScope, i32, i32)>,
    upload_calls: Vec<(CallHandle, LeaderboardHandle, i32)>,
    current_stats_requests: usize,

    board_entry_count: i32,
    board_sort: LeaderboardSortMethod,
    board_display: LeaderboardDisplayType,

    images: Vec<ImageInfo>,
    large_avatars: HashMap<SteamId, ImageHandle>,
    info_requests: Vec<SteamId>,
    achievement_icons: HashMap<String, ImageHandle>,
    overlay_needs_present: bool,
}

struct FakePlatform {
    state: Rc<RefCell<FakeState>>,
}

fn fake_platform() -> (Box<dyn Platform>, Rc<RefCell<FakeState>>) {
    let state = Rc::new(RefCell::new(FakeState {
        connected: true,
        next_call: 1,
        ..FakeState::default()
    }));
    (
        Box::new(FakePlatform {
            state: state.clone(),
        }),
        state,
    )
}

impl FakePlatform {
    fn next_handle(&self) -> CallHandle {
        let mut state = self.state.borrow_mut();
        if state.reject_requests {
            return CallHandle::INVALID;
        }
        let handle = CallHandle(state.next_call);
        state.next_call += 1;
        handle
    }
}

impl Platform for FakePlatform {
    fn app_id(&self) -> AppId {
        APP
    }
    fn current_user(&self) -> SteamId {
        ME
    }
    fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }
    fn poll_once(&mut self) -> Vec<PlatformEvent> {
        self.state.borrow_mut().incoming.drain(..).collect()
    }
    fn find_leaderboard(&mut self, name: &str) -> CallHandle {
        let handle = self.next_handle();
        if handle.is_valid() {
            self.state
                .borrow_mut()
                .find_calls
                .push((handle, name.to_owned()));
        }
        handle
    }
    fn download_leaderboard_entries(
        &mut self,
        board: LeaderboardHandle,
        scope: PlayerScope,
        start_index: i32,
        end_index: i32,
    ) -> CallHandle {
        let handle = self.next_handle();
        if handle.is_valid() {
            self.state
                .borrow_mut()
                .download_calls
                .push((handle, board, scope, start_index, end_index));
        }
        handle
    }
    fn upload_leaderboard_score(&mut self, board: LeaderboardHandle, score: i32) -> CallHandle {
        let handle = self.next_handle();
        if handle.is_valid() {
            self.state
                .borrow_mut()
                .upload_calls
                .push((handle, board, score));
        }
        handle
    }
    fn request_player_count(&mut self) -> CallHandle {
        self.next_handle()
    }
    fn request_user_stats(&mut self, _user: SteamId) -> CallHandle {
        self.next_handle()
    }
    fn request_current_user_stats(&mut self) -> bool {
        self.state.borrow_mut().current_stats_requests += 1;
        true
    }
    fn leaderboard_name(&self, _handle: LeaderboardHandle) -> Option<String> {
        None
    }
    fn leaderboard_entry_count(&self, _handle: LeaderboardHandle) -> i32 {
        self.state.borrow().board_entry_count
    }
    fn leaderboard_sort_method(&self, _handle: LeaderboardHandle) -> LeaderboardSortMethod {
        self.state.borrow().board_sort
    }
    fn leaderboard_display_type(&self, _handle: LeaderboardHandle) -> LeaderboardDisplayType {
        self.state.borrow().board_display
    }
    fn image_info(&self, handle: ImageHandle) -> Option<ImageInfo> {
        self.state
            .borrow()
            .images
            .iter()
            .copied()
            .find(|info| info.handle == handle)
    }
    fn avatar_image(&mut self, user: SteamId, size: AvatarSize) -> ImageHandle {
        match size {
            AvatarSize::Large => self
                .state
                .borrow()
                .large_avatars
                .get(&user)
                .copied()
                .unwrap_or(ImageHandle::NONE),
            _ => ImageHandle::NONE,
        }
    }
    fn request_user_information(&mut self, user: SteamId, _name_only: bool) -> bool {
        self.state.borrow_mut().info_requests.push(user);
        true
    }
    fn achievement_icon(&mut self, name: &str) -> ImageHandle {
        self.state
            .borrow()
            .achievement_icons
            .get(name)
            .copied()
            .unwrap_or(ImageHandle::NONE)
    }
    fn overlay_needs_present(&self) -> bool {
        self.state.borrow().overlay_needs_present
    }
}

type Seen = Rc<RefCell<Vec<(String, Value)>>>;

fn recording_listener(seen: &Seen) -> Listener {
    let seen = seen.clone();
    Listener::new(move |topic, payload| {
        seen.borrow_mut().push((topic.to_owned(), payload.clone()));
    })
}

fn push_notification(state: &Rc<RefCell<FakeState>>, note: Notification) {
    state
        .borrow_mut()
        .incoming
        .push_back(PlatformEvent::Notification(note));
}

fn push_completion(
    state: &Rc<RefCell<FakeState>>,
    handle: CallHandle,
    io_failed: bool,
    payload: CallPayload,
) {
    state
        .borrow_mut()
        .incoming
        .push_back(PlatformEvent::CallResult(CallOutcome {
            handle,
            io_failed,
            payload,
        }));
}

#[test]
fn notifications_dispatch_fifo_within_one_drain() {
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, state) = fake_platform();
    let bridge = EventBridge::new(session.handle(), platform).unwrap();

    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    {
        let bridge = bridge.borrow();
        for name in [
            topic::OVERLAY_STATUS,
            topic::MICROTRANSACTION_AUTHORIZATION,
            topic::USER_PROGRESS_UNLOAD,
        ] {
            bridge.add_event_listener(name, recording_listener(&seen));
        }
    }

    push_notification(&state, Notification::OverlayActivated { active: true });
    push_notification(
        &state,
        Notification::MicroTxnAuthorization {
            authorized: true,
            order_id: 9007199254740993,
        },
    );
    push_notification(&state, Notification::UserStatsUnloaded { user: ME });
    push_notification(&state, Notification::OverlayActivated { active: false });

    let report = bridge.borrow_mut().run_frame();
    assert_eq!(report.dispatched, 4);
    assert_eq!(report.dropped, 0);

    let seen = seen.borrow();
    let topics: Vec<&str> = seen.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(
        topics,
        vec![
            topic::OVERLAY_STATUS,
            topic::MICROTRANSACTION_AUTHORIZATION,
            topic::USER_PROGRESS_UNLOAD,
            topic::OVERLAY_STATUS,
        ]
    );
    assert_eq!(seen[0].1["phase"], json!("shown"));
    // 64-bit order ids survive as decimal strings.
    assert_eq!(seen[1].1["orderId"], json!("9007199254740993"));
    assert_eq!(seen[3].1["phase"], json!("hidden"));
}

#[test]
fn uncached_entries_request_resolves_then_retries_once() {
    // Scenario A, plus cache idempotence on the follow-up request.
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, state) = fake_platform();
    let bridge = EventBridge::new(session.handle(), platform).unwrap();

    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    assert!(
        bridge
            .borrow_mut()
            .request_leaderboard_entries(EntriesRequest {
                leaderboard_name: "Feet Climbed".to_owned(),
                player_scope: PlayerScope::Global,
                start_index: None,
                end_index: None,
                listener: recording_listener(&seen),
            })
    );
    assert_eq!(state.borrow().find_calls.len(), 1);
    assert!(state.borrow().download_calls.is_empty());

    // The internal find completes; the original download is re-issued
    // transparently in the same poll.
    let find = state.borrow().find_calls[0].0;
    push_completion(
        &state,
        find,
        false,
        CallPayload::LeaderboardFound {
            found: true,
            handle: LeaderboardHandle(8818188),
        },
    );
    bridge.borrow_mut().run_frame();
    assert!(seen.borrow().is_empty());
    let (download, board, scope, start, end) = state.borrow().download_calls[0];
    assert_eq!(board, LeaderboardHandle(8818188));
    assert_eq!(scope, PlayerScope::Global);
    assert_eq!((start, end), (1, 25));

    push_completion(
        &state,
        download,
        false,
        CallPayload::EntriesDownloaded {
            handle: LeaderboardHandle(8818188),
            entries: vec![LeaderboardEntry {
                user: ME,
                global_rank: 3,
                score: 1250,
            }],
        },
    );
    let report = bridge.borrow_mut().run_frame();
    assert_eq!(report.dispatched, 1);

    {
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        let (topic_name, payload) = &seen[0];
        assert_eq!(topic_name, topic::LEADERBOARD_ENTRIES);
        assert_eq!(payload["isError"], json!(false));
        assert_eq!(payload["leaderboardName"], json!("Feet Climbed"));
        assert_eq!(payload["leaderboardHandle"], json!("8818188"));
        assert_eq!(payload["entries"][0]["userSteamId"], json!(ME.to_string()));
        assert_eq!(payload["entries"][0]["globalRank"], json!(3));
    }

    // Same name again: the cached handle is used, no second resolution.
    assert!(
        bridge
            .borrow_mut()
            .request_leaderboard_entries(EntriesRequest {
                leaderboard_name: "Feet Climbed".to_owned(),
                player_scope: PlayerScope::GlobalAroundUser,
                start_index: None,
                end_index: None,
                listener: recording_listener(&seen),
            })
    );
    assert_eq!(state.borrow().find_calls.len(), 1);
    assert_eq!(state.borrow().download_calls.len(), 2);
    let (_, _, scope, start, end) = state.borrow().download_calls[1];
    assert_eq!(scope, PlayerScope::GlobalAroundUser);
    assert_eq!((start, end), (-12, 12));
}

#[test]
fn failed_resolution_reports_an_error_of_the_requested_kind() {
    // Scenario B: no retry, one error event on the entries topic.
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, state) = fake_platform();
    let bridge = EventBridge::new(session.handle(), platform).unwrap();

    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    assert!(
        bridge
            .borrow_mut()
            .request_leaderboard_entries(EntriesRequest {
                leaderboard_name: "No Such Board".to_owned(),
                player_scope: PlayerScope::Global,
                start_index: None,
                end_index: None,
                listener: recording_listener(&seen),
            })
    );

    let find = state.borrow().find_calls[0].0;
    push_completion(
        &state,
        find,
        false,
        CallPayload::LeaderboardFound {
            found: false,
            handle: LeaderboardHandle::INVALID,
        },
    );
    bridge.borrow_mut().run_frame();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    let (topic_name, payload) = &seen[0];
    assert_eq!(topic_name, topic::LEADERBOARD_ENTRIES);
    assert_eq!(payload["isError"], json!(true));
    assert_eq!(payload["leaderboardName"], json!("No Such Board"));
    assert_eq!(payload["entries"], json!([]));
    assert!(state.borrow().download_calls.is_empty());
    assert_eq!(bridge.borrow().pending_call_count(), 0);
}

#[test]
fn io_failure_composes_into_is_error() {
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, state) = fake_platform();
    let bridge = EventBridge::new(session.handle(), platform).unwrap();

    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    assert!(
        bridge
            .borrow_mut()
            .request_active_player_count(recording_listener(&seen))
    );
    let call = CallHandle(state.borrow().next_call - 1);

    // Platform-level success arriving after a transport failure must still
    // read as an error.
    push_completion(
        &state,
        call,
        true,
        CallPayload::PlayerCount {
            success: true,
            count: 23456,
        },
    );
    bridge.borrow_mut().run_frame();

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1["isError"], json!(true));
    assert!(seen[0].1.get("count").is_none());
}

#[test]
fn leaderboard_info_success_carries_attributes_and_primes_the_cache() {
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, state) = fake_platform();
    {
        let mut state = state.borrow_mut();
        state.board_entry_count = 420;
        state.board_sort = LeaderboardSortMethod::Descending;
        state.board_display = LeaderboardDisplayType::Numeric;
    }
    let bridge = EventBridge::new(session.handle(), platform).unwrap();

    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    assert!(
        bridge
            .borrow_mut()
            .request_leaderboard_info("Feet Climbed", recording_listener(&seen))
    );
    let find = state.borrow().find_calls[0].0;
    push_completion(
        &state,
        find,
        false,
        CallPayload::LeaderboardFound {
            found: true,
            handle: LeaderboardHandle(8818188),
        },
    );
    bridge.borrow_mut().run_frame();

    {
        let seen = seen.borrow();
        let payload = &seen[0].1;
        assert_eq!(payload["isError"], json!(false));
        assert_eq!(payload["leaderboardHandle"], json!("8818188"));
        assert_eq!(payload["entryCount"], json!(420));
        assert_eq!(payload["sortMethod"], json!("descending"));
        assert_eq!(payload["displayType"], json!("numeric"));
    }

    // The find primed the cache: an upload for the same name skips the
    // resolution step entirely.
    assert!(bridge.borrow_mut().request_set_high_score(HighScoreRequest {
        leaderboard_name: "Feet Climbed".to_owned(),
        value: 1300,
        listener: recording_listener(&seen),
    }));
    assert_eq!(state.borrow().find_calls.len(), 1);
    assert_eq!(state.borrow().upload_calls.len(), 1);
    assert_eq!(state.borrow().upload_calls[0].1, LeaderboardHandle(8818188));
}

#[test]
fn high_score_ranks_appear_only_when_the_score_changed() {
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, state) = fake_platform();
    let bridge = EventBridge::new(session.handle(), platform).unwrap();

    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    assert!(bridge.borrow_mut().request_set_high_score(HighScoreRequest {
        leaderboard_name: "Feet Climbed".to_owned(),
        value: 1300,
        listener: recording_listener(&seen),
    }));
    let find = state.borrow().find_calls[0].0;
    push_completion(
        &state,
        find,
        false,
        CallPayload::LeaderboardFound {
            found: true,
            handle: LeaderboardHandle(7),
        },
    );
    bridge.borrow_mut().run_frame();
    let upload = state.borrow().upload_calls[0].0;

    push_completion(
        &state,
        upload,
        false,
        CallPayload::ScoreUploaded {
            success: true,
            handle: LeaderboardHandle(7),
            score_changed: false,
            global_rank_new: 4,
            global_rank_previous: 9,
        },
    );
    bridge.borrow_mut().run_frame();

    let seen = seen.borrow();
    let payload = &seen[0].1;
    assert_eq!(payload["isError"], json!(false));
    assert_eq!(payload["scoreChanged"], json!(false));
    assert!(payload.get("currentGlobalRank").is_none());
    assert!(payload.get("previousGlobalRank").is_none());
}

#[test]
fn chained_large_avatar_fetch_defers_until_the_image_loads() {
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, state) = fake_platform();
    let friend = SteamId(76561197960265731);
    let bridge = EventBridge::new(session.handle(), platform).unwrap();

    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    bridge
        .borrow()
        .add_event_listener(topic::USER_INFO_UPDATE, recording_listener(&seen));

    // Asking for the large avatar of an unknown user subscribes them to the
    // chained fetch and issues exactly one persona information request.
    assert!(
        bridge
            .borrow_mut()
            .user_image_info(friend, AvatarSize::Large)
            .is_none()
    );
    assert_eq!(state.borrow().info_requests, vec![friend]);

    // Persona data lands; the large avatar download is now in flight, so
    // the update goes out without the large flag.
    state
        .borrow_mut()
        .large_avatars
        .insert(friend, ImageHandle::FETCH_PENDING);
    push_notification(
        &state,
        Notification::PersonaStateChanged {
            user: friend,
            changes: PersonaChange {
                name: true,
                avatar: true,
                ..PersonaChange::default()
            },
        },
    );
    bridge.borrow_mut().run_frame();
    {
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        let payload = &seen[0].1;
        assert_eq!(payload["nameChanged"], json!(true));
        assert_eq!(payload["smallAvatarChanged"], json!(true));
        assert_eq!(payload["mediumAvatarChanged"], json!(true));
        assert_eq!(payload["largeAvatarChanged"], json!(false));
    }

    // The deferred image arrives: exactly one more update, flagging only
    // the large avatar.
    push_notification(
        &state,
        Notification::AvatarImageLoaded {
            user: friend,
            image: ImageHandle(12),
        },
    );
    bridge.borrow_mut().run_frame();
    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    let payload = &seen[1].1;
    assert_eq!(payload["userSteamId"], json!(friend.to_string()));
    assert_eq!(payload["largeAvatarChanged"], json!(true));
    assert_eq!(payload["nameChanged"], json!(false));
    assert_eq!(payload["smallAvatarChanged"], json!(false));
    assert_eq!(state.borrow().info_requests, vec![friend]);
}

#[test]
fn already_loaded_large_avatar_is_flagged_on_the_persona_update() {
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, state) = fake_platform();
    let friend = SteamId(76561197960265731);
    state
        .borrow_mut()
        .large_avatars
        .insert(friend, ImageHandle(9));
    state.borrow_mut().images.push(ImageInfo {
        handle: ImageHandle(9),
        pixel_width: 184,
        pixel_height: 184,
    });
    let bridge = EventBridge::new(session.handle(), platform).unwrap();

    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    bridge
        .borrow()
        .add_event_listener(topic::USER_INFO_UPDATE, recording_listener(&seen));

    // Already cached: the lookup answers synchronously.
    let info = bridge
        .borrow_mut()
        .user_image_info(friend, AvatarSize::Large);
    assert_eq!(
        info,
        Some(ImageInfo {
            handle: ImageHandle(9),
            pixel_width: 184,
            pixel_height: 184,
        })
    );

    push_notification(
        &state,
        Notification::PersonaStateChanged {
            user: friend,
            changes: PersonaChange {
                avatar: true,
                ..PersonaChange::default()
            },
        },
    );
    bridge.borrow_mut().run_frame();
    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1["largeAvatarChanged"], json!(true));
}

#[test]
fn expired_achievement_image_drops_without_stopping_the_drain() {
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, state) = fake_platform();
    state.borrow_mut().images.push(ImageInfo {
        handle: ImageHandle(32),
        pixel_width: 64,
        pixel_height: 64,
    });
    let bridge = EventBridge::new(session.handle(), platform).unwrap();

    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    bridge
        .borrow()
        .add_event_listener(topic::ACHIEVEMENT_IMAGE_UPDATE, recording_listener(&seen));

    // Icon 31 is never resolvable; icon 32 is.
    push_notification(
        &state,
        Notification::AchievementIconFetched {
            app: APP,
            name: "ACH_EXPIRED".to_owned(),
            icon: ImageHandle(31),
            unlocked: false,
        },
    );
    push_notification(
        &state,
        Notification::AchievementIconFetched {
            app: APP,
            name: "ACH_WIN_100".to_owned(),
            icon: ImageHandle(32),
            unlocked: true,
        },
    );
    let report = bridge.borrow_mut().run_frame();
    assert_eq!(report.dropped, 1);
    assert_eq!(report.dispatched, 1);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].1["achievementName"], json!("ACH_WIN_100"));
    assert_eq!(seen[0].1["imageInfo"]["pixelWidth"], json!(64));
}

#[test]
fn foreign_app_notifications_are_dropped_before_capture() {
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, state) = fake_platform();
    let bridge = EventBridge::new(session.handle(), platform).unwrap();

    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    {
        let bridge = bridge.borrow();
        bridge.add_event_listener(topic::USER_PROGRESS_UPDATE, recording_listener(&seen));
        bridge.add_event_listener(topic::ACHIEVEMENT_INFO_UPDATE, recording_listener(&seen));
    }

    push_notification(
        &state,
        Notification::UserStatsReceived {
            app: AppId(999),
            user: ME,
            result: ResultCode::OK,
        },
    );
    push_notification(
        &state,
        Notification::AchievementStored {
            app: APP,
            name: "ACH_CLIMB".to_owned(),
            is_group: false,
            current_progress: 75,
            max_progress: 100,
        },
    );
    let report = bridge.borrow_mut().run_frame();
    assert_eq!(report.dispatched, 1);

    let seen = seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, topic::ACHIEVEMENT_INFO_UPDATE);
    assert_eq!(seen[0].1["currentProgress"], json!(75));
    assert_eq!(seen[0].1["maxProgress"], json!(100));
}

#[test]
fn user_progress_events_cover_update_save_and_unload() {
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, state) = fake_platform();
    let bridge = EventBridge::new(session.handle(), platform).unwrap();

    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    {
        let bridge = bridge.borrow();
        for name in [
            topic::USER_PROGRESS_UPDATE,
            topic::USER_PROGRESS_SAVE,
            topic::USER_PROGRESS_UNLOAD,
        ] {
            bridge.add_event_listener(name, recording_listener(&seen));
        }
    }

    // Construction already primed the logged-in user's stats once.
    assert_eq!(state.borrow().current_stats_requests, 1);
    assert!(bridge.borrow_mut().request_user_progress(None));
    assert_eq!(state.borrow().current_stats_requests, 2);

    push_notification(
        &state,
        Notification::UserStatsReceived {
            app: APP,
            user: ME,
            result: ResultCode::OK,
        },
    );
    push_notification(
        &state,
        Notification::UserStatsStored {
            app: APP,
            result: ResultCode::FAIL,
        },
    );
    push_notification(&state, Notification::UserStatsUnloaded { user: ME });
    let report = bridge.borrow_mut().run_frame();
    assert_eq!(report.dispatched, 3);

    let seen = seen.borrow();
    assert_eq!(seen[0].0, topic::USER_PROGRESS_UPDATE);
    assert_eq!(seen[0].1["isError"], json!(false));
    assert_eq!(seen[0].1["resultCode"], json!(1));
    assert_eq!(seen[1].0, topic::USER_PROGRESS_SAVE);
    assert_eq!(seen[1].1["isError"], json!(true));
    assert_eq!(seen[1].1["userSteamId"], json!(ME.to_string()));
    assert_eq!(seen[2].0, topic::USER_PROGRESS_UNLOAD);
    assert_eq!(seen[2].1["userSteamId"], json!(ME.to_string()));
}

#[test]
fn overlay_keeps_rendering_for_one_frame_after_it_hides() {
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, state) = fake_platform();
    let bridge = EventBridge::new(session.handle(), platform).unwrap();

    assert!(!bridge.borrow_mut().run_frame().wants_render);

    state.borrow_mut().overlay_needs_present = true;
    assert!(bridge.borrow_mut().run_frame().wants_render);
    assert!(bridge.borrow_mut().run_frame().wants_render);

    state.borrow_mut().overlay_needs_present = false;
    // The frame right after the overlay hides still presents.
    assert!(bridge.borrow_mut().run_frame().wants_render);
    assert!(!bridge.borrow_mut().run_frame().wants_render);
}

#[test]
fn suspended_host_turns_deliveries_into_noops() {
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, state) = fake_platform();
    let bridge = EventBridge::new(session.handle(), platform).unwrap();

    let seen: Seen = Rc::new(RefCell::new(Vec::new()));
    bridge
        .borrow()
        .add_event_listener(topic::USER_PROGRESS_UNLOAD, recording_listener(&seen));

    session.suspend();
    push_notification(&state, Notification::UserStatsUnloaded { user: ME });
    let report = bridge.borrow_mut().run_frame();
    assert_eq!(report.dispatched, 0);
    assert!(seen.borrow().is_empty());

    session.resume();
    push_notification(&state, Notification::UserStatsUnloaded { user: ME });
    let report = bridge.borrow_mut().run_frame();
    assert_eq!(report.dispatched, 1);
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn disconnected_platform_fails_requests_synchronously() {
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, state) = fake_platform();
    state.borrow_mut().connected = false;
    let bridge = EventBridge::new(session.handle(), platform).unwrap();

    let mut bridge = bridge.borrow_mut();
    assert!(!bridge.request_leaderboard_info("Feet Climbed", Listener::new(|_, _| {})));
    assert!(!bridge.request_active_player_count(Listener::new(|_, _| {})));
    assert!(!bridge.request_user_progress(None));
    assert!(!bridge.request_set_high_score(HighScoreRequest {
        leaderboard_name: "Feet Climbed".to_owned(),
        value: 1,
        listener: Listener::new(|_, _| {}),
    }));
    assert_eq!(bridge.pending_call_count(), 0);
    assert!(state.borrow().find_calls.is_empty());
}

#[test]
fn two_bridges_on_one_thread_coexist_in_the_registry() {
    // Scenario C, plus reverse lookup by host.
    let _guard = registry_lock();
    let session_a = HostSession::new();
    let session_b = HostSession::new();
    let (platform_a, _state_a) = fake_platform();
    let (platform_b, _state_b) = fake_platform();

    let bridge_a = EventBridge::new(session_a.handle(), platform_a).unwrap();
    let bridge_b = EventBridge::new(session_b.handle(), platform_b).unwrap();
    assert_eq!(registry::count(), 2);

    let found = registry::find_by_host(session_b.handle().id()).unwrap();
    assert_eq!(found.borrow().host().id(), session_b.handle().id());
    assert!(registry::find_by_host(session_a.handle().id()).is_some());

    drop(found);
    drop(bridge_a);
    assert_eq!(registry::count(), 1);
    assert!(registry::find_by_host(session_a.handle().id()).is_none());
    drop(bridge_b);
    assert_eq!(registry::count(), 0);
}

#[test]
fn second_bridge_from_another_thread_is_fatal() {
    let _guard = registry_lock();
    let session = HostSession::new();
    let (platform, _state) = fake_platform();
    let _bridge = EventBridge::new(session.handle(), platform).unwrap();

    let err = std::thread::spawn(|| {
        let session = HostSession::new();
        let (platform, _state) = fake_platform();
        EventBridge::new(session.handle(), platform).err()
    })
    .join()
    .unwrap();
    assert_eq!(err, Some(BridgeError::WrongThread));
    assert_eq!(registry::count(), 1);
}
