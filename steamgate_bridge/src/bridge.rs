// The event bridge orchestrator.
//
// One bridge serves one host session. Per frame it runs a single
// poll/drain cycle: the poll phase pumps the platform's callbacks once and
// turns everything that arrived into queued tasks (correlated call results
// through the correlator, standing notifications directly); the drain phase
// then empties the queue FIFO, materializing and publishing each task. The
// poll call is the only reentry point for new platform events, so a frame's
// drain can never grow its own queue.
//
// Cross-event state lives here and is touched only during the poll phase:
// - The name->handle cache for leaderboards. Populated on successful finds,
//   never evicted; a hit never triggers a second resolution.
// - The large-avatar subscription set for the chained fetch: a large avatar
//   can only be fetched after the user's persona data has loaded, so the
//   bridge watches persona updates for subscribed users and either flags the
//   change directly or waits for the deferred image-loaded notification.
// - The render-request latch that keeps the embedder presenting frames
//   while the platform overlay is visible, plus one frame after it hides.
//
// Requests follow the original boolean contract: validation and
// connectivity failures are reported synchronously as `false` (nothing is
// queued), everything asynchronous comes back as an event whose `isError`
// folds platform errors and transport failures together.
//
// **Critical constraint: name-cache-miss retry.** An entries download or
// score upload for an uncached leaderboard name must not fail. The bridge
// resolves the handle first and transparently re-issues the original
// request on success; if resolution (or the re-issue) fails, it synthesizes
// an error event of the originally requested kind and delivers it straight
// to the original listener, bypassing the queue, so callers always hear
// back on the kind they asked for.

use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use steamgate_platform::{
    AppId, AvatarSize, CallOutcome, CallPayload, ImageHandle, ImageInfo, LeaderboardDisplayType,
    LeaderboardHandle, LeaderboardSortMethod, Notification, Platform, PlatformEvent, PlayerScope,
    SteamId,
};

use crate::correlator::{CallResultCorrelator, PendingCall, PendingRequest, RetryRequest};
use crate::dispatcher::EventDispatcher;
use crate::error::BridgeError;
use crate::event::{EventData, topic};
use crate::host::{HostHandle, Listener};
use crate::registry::{self, BridgeId};
use crate::task::{DispatchOutcome, DispatchTask};

/// A leaderboard entries download, as issued by the host.
///
/// Index ranges are optional as a pair: provide both or neither. Defaults
/// and floors depend on the scope (see [`EventBridge::request_leaderboard_entries`]).
pub struct EntriesRequest {
    pub leaderboard_name: String,
    pub player_scope: PlayerScope,
    pub start_index: Option<i32>,
    pub end_index: Option<i32>,
    pub listener: Listener,
}

/// A keep-best score upload, as issued by the host.
pub struct HighScoreRequest {
    pub leaderboard_name: String,
    pub value: i32,
    pub listener: Listener,
}

/// What one frame's cycle did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Tasks materialized and delivered to at least one listener.
    pub dispatched: usize,
    /// Tasks dropped because a referenced ephemeral resource expired.
    pub dropped: usize,
    /// The embedder should present a frame (overlay visible, or it hid
    /// within the last frame).
    pub wants_render: bool,
}

pub struct EventBridge {
    host: HostHandle,
    platform: Box<dyn Platform>,
    dispatcher: Rc<EventDispatcher>,
    correlator: CallResultCorrelator,
    queue: VecDeque<DispatchTask>,
    leaderboard_handles: FxHashMap<String, LeaderboardHandle>,
    large_avatar_subscriptions: FxHashSet<SteamId>,
    render_requested: bool,
    registration: Option<BridgeId>,
}

impl EventBridge {
    /// Build a bridge for a running host session and register it in the
    /// process-wide registry.
    ///
    /// Fails with [`BridgeError::WrongThread`] if another live bridge is
    /// pinned to a different thread; the platform connection is a
    /// process-wide singleton and cannot be driven from two threads.
    pub fn new(
        host: HostHandle,
        mut platform: Box<dyn Platform>,
    ) -> Result<Rc<RefCell<EventBridge>>, BridgeError> {
        if !host.is_running() {
            return Err(BridgeError::HostNotRunning);
        }
        if platform.is_connected() {
            // Prime the logged-in user's stats so progress data is warm
            // before the host asks for it.
            platform.request_current_user_stats();
        }
        let bridge = Rc::new(RefCell::new(EventBridge {
            dispatcher: Rc::new(EventDispatcher::new(host.clone())),
            host: host.clone(),
            platform,
            correlator: CallResultCorrelator::new(),
            queue: VecDeque::new(),
            leaderboard_handles: FxHashMap::default(),
            large_avatar_subscriptions: FxHashSet::default(),
            render_requested: false,
            registration: None,
        }));
        let id = registry::register(host.id(), Rc::downgrade(&bridge))?;
        bridge.borrow_mut().registration = Some(id);
        Ok(bridge)
    }

    pub fn host(&self) -> &HostHandle {
        &self.host
    }

    /// Subscribe a listener to a standing event topic (see [`topic`]).
    pub fn add_event_listener(&self, topic: &str, listener: Listener) -> bool {
        self.dispatcher.subscribe(topic, listener)
    }

    pub fn remove_event_listener(&self, topic: &str, listener: &Listener) -> bool {
        self.dispatcher.unsubscribe(topic, listener)
    }

    /// Run one frame's poll/drain cycle.
    pub fn run_frame(&mut self) -> FrameReport {
        self.poll_platform();
        let (dispatched, dropped) = self.drain();
        let overlay = self.platform.overlay_needs_present();
        // One extra presented frame after the overlay hides, so its final
        // state is not left on screen.
        let wants_render = overlay || self.render_requested;
        self.render_requested = overlay;
        FrameReport {
            dispatched,
            dropped,
            wants_render,
        }
    }

    fn poll_platform(&mut self) {
        for event in self.platform.poll_once() {
            match event {
                PlatformEvent::CallResult(outcome) => self.on_call_completed(outcome),
                PlatformEvent::Notification(note) => self.on_notification(note),
            }
        }
    }

    fn drain(&mut self) -> (usize, usize) {
        let mut dispatched = 0;
        let mut dropped = 0;
        while let Some(task) = self.queue.pop_front() {
            match task.dispatch(self.platform.as_ref()) {
                DispatchOutcome::Delivered => dispatched += 1,
                DispatchOutcome::Undeliverable => {}
                DispatchOutcome::Expired => dropped += 1,
            }
        }
        (dispatched, dropped)
    }

    // --- Request surface ---

    /// Look up a leaderboard's attributes by name. The answer arrives as a
    /// single `leaderboardInfo` event on `listener`.
    pub fn request_leaderboard_info(&mut self, name: &str, listener: Listener) -> bool {
        if name.is_empty() {
            log::error!("leaderboard name must not be empty");
            return false;
        }
        if !self.platform.is_connected() {
            log::warn!("leaderboard info request while platform is unavailable");
            return false;
        }
        let call = self.platform.find_leaderboard(name);
        let dispatcher = Rc::new(EventDispatcher::single(
            self.host.clone(),
            topic::LEADERBOARD_INFO,
            listener,
        ));
        self.correlator.register(
            call,
            PendingCall {
                dispatcher,
                request: PendingRequest::LeaderboardInfo {
                    name: name.to_owned(),
                },
            },
        )
    }

    /// Download a slice of leaderboard rows. The answer arrives as a single
    /// `leaderboardEntries` event on the request's listener.
    ///
    /// Range defaults by scope: `Global` 1..=25 with the start floored at 1,
    /// `GlobalAroundUser` -12..=12, `FriendsOnly` ignores the range. The end
    /// is clamped to at least the start. Passing exactly one of the two
    /// indices is a validation error.
    pub fn request_leaderboard_entries(&mut self, request: EntriesRequest) -> bool {
        if request.leaderboard_name.is_empty() {
            log::error!("leaderboard name must not be empty");
            return false;
        }
        if request.start_index.is_some() != request.end_index.is_some() {
            log::error!("startIndex and endIndex must be provided together");
            return false;
        }
        if !self.platform.is_connected() {
            log::warn!("entries request while platform is unavailable");
            return false;
        }
        if let Some(&handle) = self.leaderboard_handles.get(&request.leaderboard_name) {
            return self.issue_entries_download(handle, &request);
        }
        self.resolve_then_retry(RetryRequest::Entries(request))
    }

    /// Upload a score, keeping the user's best. The answer arrives as a
    /// single `setHighScore` event on the request's listener.
    pub fn request_set_high_score(&mut self, request: HighScoreRequest) -> bool {
        if request.leaderboard_name.is_empty() {
            log::error!("leaderboard name must not be empty");
            return false;
        }
        if !self.platform.is_connected() {
            log::warn!("high score request while platform is unavailable");
            return false;
        }
        if let Some(&handle) = self.leaderboard_handles.get(&request.leaderboard_name) {
            return self.issue_score_upload(handle, &request);
        }
        self.resolve_then_retry(RetryRequest::HighScore(request))
    }

    /// Ask for the current global player count, answered by a single
    /// `activePlayerCount` event on `listener`.
    pub fn request_active_player_count(&mut self, listener: Listener) -> bool {
        if !self.platform.is_connected() {
            log::warn!("player count request while platform is unavailable");
            return false;
        }
        let call = self.platform.request_player_count();
        let dispatcher = Rc::new(EventDispatcher::single(
            self.host.clone(),
            topic::ACTIVE_PLAYER_COUNT,
            listener,
        ));
        self.correlator.register(
            call,
            PendingCall {
                dispatcher,
                request: PendingRequest::PlayerCount,
            },
        )
    }

    /// Ask the platform to (re)load a user's stats and achievements.
    /// `None` targets the logged-in user. The answer arrives as a standing
    /// `userProgressUpdate` event, not on a dedicated listener.
    pub fn request_user_progress(&mut self, user: Option<SteamId>) -> bool {
        if !self.platform.is_connected() {
            log::warn!("user progress request while platform is unavailable");
            return false;
        }
        match user {
            Some(user) if user != self.platform.current_user() => {
                if !user.is_valid() {
                    log::error!("user progress requested for an invalid user id");
                    return false;
                }
                self.platform.request_user_stats(user).is_valid()
            }
            _ => self.platform.request_current_user_stats(),
        }
    }

    /// Metadata for a user's avatar at the given size, if it is already
    /// loaded. A miss triggers the fetch chain: unknown users get a persona
    /// information request, and a `Large` request subscribes the user to the
    /// chained large-avatar fetch so a later `userInfoUpdate` announces it.
    pub fn user_image_info(&mut self, user: SteamId, size: AvatarSize) -> Option<ImageInfo> {
        if !user.is_valid() {
            return None;
        }
        if size == AvatarSize::Large {
            self.large_avatar_subscriptions.insert(user);
        }
        match self.platform.avatar_image(user, size) {
            ImageHandle::NONE => {
                // Nothing cached for this user yet; ask for their persona
                // data and report the change through userInfoUpdate.
                self.platform.request_user_information(user, false);
                None
            }
            ImageHandle::FETCH_PENDING => None,
            handle => self.platform.image_info(handle).filter(|info| info.is_valid()),
        }
    }

    /// Metadata for an achievement's icon, if it is already loaded. A miss
    /// starts the fetch; an `achievementImageUpdate` event follows.
    pub fn achievement_image_info(&mut self, name: &str) -> Option<ImageInfo> {
        if name.is_empty() {
            log::error!("achievement name must not be empty");
            return None;
        }
        match self.platform.achievement_icon(name) {
            ImageHandle::NONE => None,
            handle => self.platform.image_info(handle).filter(|info| info.is_valid()),
        }
    }

    /// In-flight correlated calls. Pending entries are dropped, not
    /// delivered, if the bridge is torn down first.
    pub fn pending_call_count(&self) -> usize {
        self.correlator.len()
    }

    /// Tasks queued for the next drain phase.
    pub fn queued_task_count(&self) -> usize {
        self.queue.len()
    }

    // --- Poll-phase handlers ---

    fn on_call_completed(&mut self, outcome: CallOutcome) {
        let Some(PendingCall {
            dispatcher,
            request,
        }) = self.correlator.complete(outcome.handle)
        else {
            log::debug!("completion for unknown call handle {}", outcome.handle.0);
            return;
        };
        match request {
            PendingRequest::LeaderboardInfo { name } => {
                let CallPayload::LeaderboardFound { found, handle } = outcome.payload else {
                    log::error!("mismatched completion payload for a leaderboard find");
                    return;
                };
                let is_error = !found || !handle.is_valid();
                if !is_error && !outcome.io_failed {
                    self.leaderboard_handles.insert(name.clone(), handle);
                }
                // Attribute lookups are only meaningful on success; read
                // them now, while the handle is known fresh.
                let (entry_count, sort_method, display_type) = if is_error || outcome.io_failed {
                    (0, LeaderboardSortMethod::None, LeaderboardDisplayType::None)
                } else {
                    (
                        self.platform.leaderboard_entry_count(handle),
                        self.platform.leaderboard_sort_method(handle),
                        self.platform.leaderboard_display_type(handle),
                    )
                };
                self.queue.push_back(DispatchTask {
                    dispatcher,
                    io_failed: outcome.io_failed,
                    leaderboard_name: Some(name),
                    data: EventData::LeaderboardInfo {
                        is_error,
                        handle,
                        entry_count,
                        sort_method,
                        display_type,
                    },
                });
            }
            PendingRequest::LeaderboardEntries { name } => {
                let CallPayload::EntriesDownloaded { handle, entries } = outcome.payload else {
                    log::error!("mismatched completion payload for an entries download");
                    return;
                };
                self.queue.push_back(DispatchTask {
                    dispatcher,
                    io_failed: outcome.io_failed,
                    leaderboard_name: Some(name),
                    data: EventData::LeaderboardEntries {
                        is_error: false,
                        handle,
                        entries,
                    },
                });
            }
            PendingRequest::HighScore { name } => {
                let CallPayload::ScoreUploaded {
                    success,
                    handle,
                    score_changed,
                    global_rank_new,
                    global_rank_previous,
                } = outcome.payload
                else {
                    log::error!("mismatched completion payload for a score upload");
                    return;
                };
                self.queue.push_back(DispatchTask {
                    dispatcher,
                    io_failed: outcome.io_failed,
                    leaderboard_name: Some(name),
                    data: EventData::HighScore {
                        is_error: !success,
                        handle,
                        score_changed,
                        global_rank_new,
                        global_rank_previous,
                    },
                });
            }
            PendingRequest::PlayerCount => {
                let CallPayload::PlayerCount { success, count } = outcome.payload else {
                    log::error!("mismatched completion payload for a player count request");
                    return;
                };
                self.queue.push_back(DispatchTask {
                    dispatcher,
                    io_failed: outcome.io_failed,
                    leaderboard_name: None,
                    data: EventData::ActivePlayerCount {
                        is_error: !success,
                        count,
                    },
                });
            }
            PendingRequest::ResolveThenRetry { retry } => {
                self.on_resolution_completed(outcome, dispatcher, retry);
            }
        }
    }

    fn on_resolution_completed(
        &mut self,
        outcome: CallOutcome,
        dispatcher: Rc<EventDispatcher>,
        retry: RetryRequest,
    ) {
        let resolved = match outcome.payload {
            CallPayload::LeaderboardFound { found, handle }
                if found && handle.is_valid() && !outcome.io_failed =>
            {
                Some(handle)
            }
            CallPayload::LeaderboardFound { .. } => None,
            _ => {
                log::error!("mismatched completion payload for an internal leaderboard find");
                None
            }
        };
        let Some(handle) = resolved else {
            self.deliver_retry_failure(dispatcher, retry);
            return;
        };
        self.leaderboard_handles
            .insert(retry.leaderboard_name().to_owned(), handle);
        let started = match &retry {
            RetryRequest::Entries(request) => self.issue_entries_download(handle, request),
            RetryRequest::HighScore(request) => self.issue_score_upload(handle, request),
        };
        if !started {
            self.deliver_retry_failure(dispatcher, retry);
        }
    }

    // Resolution failed, or the retried request never started. The caller
    // still hears back on the kind it originally asked for; this goes
    // straight to the original listener instead of the queue.
    fn deliver_retry_failure(&mut self, dispatcher: Rc<EventDispatcher>, retry: RetryRequest) {
        let name = retry.leaderboard_name().to_owned();
        let data = match retry {
            RetryRequest::Entries(_) => EventData::LeaderboardEntries {
                is_error: true,
                handle: LeaderboardHandle::INVALID,
                entries: Vec::new(),
            },
            RetryRequest::HighScore(_) => EventData::HighScore {
                is_error: true,
                handle: LeaderboardHandle::INVALID,
                score_changed: false,
                global_rank_new: 0,
                global_rank_previous: 0,
            },
        };
        let task = DispatchTask {
            dispatcher,
            io_failed: true,
            leaderboard_name: Some(name),
            data,
        };
        task.dispatch(self.platform.as_ref());
    }

    fn on_notification(&mut self, note: Notification) {
        match note {
            Notification::OverlayActivated { active } => {
                self.enqueue(EventData::OverlayStatus { shown: active });
            }
            Notification::MicroTxnAuthorization {
                authorized,
                order_id,
            } => {
                self.enqueue(EventData::MicroTxnAuthorization {
                    authorized,
                    order_id,
                });
            }
            Notification::PersonaStateChanged { user, changes } => {
                let large_avatar_changed = changes.avatar && self.check_large_avatar(user);
                self.enqueue(EventData::user_info(user, changes, large_avatar_changed));
            }
            Notification::AvatarImageLoaded { user, image } => {
                if self.large_avatar_subscriptions.contains(&user) && image != ImageHandle::NONE {
                    self.enqueue(EventData::large_avatar_loaded(user));
                }
            }
            Notification::AchievementIconFetched {
                app,
                name,
                icon,
                unlocked,
            } => {
                if self.owns_app(app) {
                    self.enqueue(EventData::AchievementImageUpdate {
                        name,
                        icon,
                        unlocked,
                    });
                }
            }
            Notification::AchievementStored {
                app,
                name,
                is_group,
                current_progress,
                max_progress,
            } => {
                if self.owns_app(app) {
                    self.enqueue(EventData::AchievementInfoUpdate {
                        name,
                        is_group,
                        current_progress,
                        max_progress,
                    });
                }
            }
            Notification::UserStatsReceived { app, user, result } => {
                if self.owns_app(app) {
                    self.enqueue(EventData::UserProgressUpdate {
                        user,
                        is_error: !result.is_ok(),
                        result_code: result.0,
                    });
                }
            }
            Notification::UserStatsStored { app, result } => {
                if self.owns_app(app) {
                    let user = self.platform.current_user();
                    self.enqueue(EventData::UserProgressSave {
                        user,
                        is_error: !result.is_ok(),
                        result_code: result.0,
                    });
                }
            }
            Notification::UserStatsUnloaded { user } => {
                self.enqueue(EventData::UserProgressUnload { user });
            }
        }
    }

    // --- Helpers ---

    fn enqueue(&mut self, data: EventData) {
        self.queue
            .push_back(DispatchTask::notification(self.dispatcher.clone(), data));
    }

    fn owns_app(&self, app: AppId) -> bool {
        if app == self.platform.app_id() {
            true
        } else {
            log::debug!("dropping notification stamped for foreign app {}", app.0);
            false
        }
    }

    // Chained large-avatar fetch: for a subscribed user whose avatar
    // changed, either the large image is already cached (flag it on the
    // outgoing event) or a fetch is now in flight and the deferred
    // AvatarImageLoaded notification will announce it.
    fn check_large_avatar(&mut self, user: SteamId) -> bool {
        if !self.large_avatar_subscriptions.contains(&user) {
            return false;
        }
        match self.platform.avatar_image(user, AvatarSize::Large) {
            ImageHandle::NONE | ImageHandle::FETCH_PENDING => false,
            _ => true,
        }
    }

    fn resolve_then_retry(&mut self, retry: RetryRequest) -> bool {
        let (topic, listener) = match &retry {
            RetryRequest::Entries(request) => (topic::LEADERBOARD_ENTRIES, &request.listener),
            RetryRequest::HighScore(request) => (topic::SET_HIGH_SCORE, &request.listener),
        };
        let dispatcher = Rc::new(EventDispatcher::single(
            self.host.clone(),
            topic,
            listener.clone(),
        ));
        let call = self.platform.find_leaderboard(retry.leaderboard_name());
        self.correlator.register(
            call,
            PendingCall {
                dispatcher,
                request: PendingRequest::ResolveThenRetry { retry },
            },
        )
    }

    fn issue_entries_download(&mut self, handle: LeaderboardHandle, request: &EntriesRequest) -> bool {
        let (start, end) =
            resolve_entry_range(request.player_scope, request.start_index, request.end_index);
        let call = self
            .platform
            .download_leaderboard_entries(handle, request.player_scope, start, end);
        let dispatcher = Rc::new(EventDispatcher::single(
            self.host.clone(),
            topic::LEADERBOARD_ENTRIES,
            request.listener.clone(),
        ));
        self.correlator.register(
            call,
            PendingCall {
                dispatcher,
                request: PendingRequest::LeaderboardEntries {
                    name: request.leaderboard_name.clone(),
                },
            },
        )
    }

    fn issue_score_upload(&mut self, handle: LeaderboardHandle, request: &HighScoreRequest) -> bool {
        let call = self.platform.upload_leaderboard_score(handle, request.value);
        let dispatcher = Rc::new(EventDispatcher::single(
            self.host.clone(),
            topic::SET_HIGH_SCORE,
            request.listener.clone(),
        ));
        self.correlator.register(
            call,
            PendingCall {
                dispatcher,
                request: PendingRequest::HighScore {
                    name: request.leaderboard_name.clone(),
                },
            },
        )
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        if let Some(id) = self.registration.take() {
            registry::unregister(id);
        }
    }
}

fn resolve_entry_range(scope: PlayerScope, start: Option<i32>, end: Option<i32>) -> (i32, i32) {
    let (default_start, default_end) = match scope {
        PlayerScope::Global => (1, 25),
        PlayerScope::GlobalAroundUser => (-12, 12),
        // The platform ignores the range for friends.
        PlayerScope::FriendsOnly => (0, 0),
    };
    let mut start = start.unwrap_or(default_start);
    if scope == PlayerScope::Global && start < 1 {
        start = 1;
    }
    let end = end.unwrap_or(default_end).max(start);
    (start, end)
}
