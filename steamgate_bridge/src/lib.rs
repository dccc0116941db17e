// steamgate_bridge: the frame-gated event bridge.
//
// The platform SDK (abstracted by `steamgate_platform::Platform`) pushes
// callback-style notifications and correlated call results. The scripting
// host on the other side is single-threaded and can only accept events at
// frame boundaries. This crate reconciles the two: it polls the platform
// exactly once per frame, converts what arrives into typed event payloads,
// queues them in arrival order, and delivers each queued event exactly once
// to the host's listeners while the host is still running.
//
// Module overview:
// - `host.rs`:       Host session liveness and identity-comparable listener
//                    callbacks (the scripting-host boundary).
// - `dispatcher.rs`: Named-topic publish/subscribe with snapshot delivery.
// - `event.rs`:      Event payload variants, wire record schemas, and the
//                    outbound topic names.
// - `task.rs`:       One queued unit of delivery (payload + dispatcher +
//                    correlation flags), with late materialization.
// - `correlator.rs`: In-flight call handle -> pending delivery context.
// - `bridge.rs`:     The orchestrator: per-frame poll/drain cycle, the
//                    request surface, handle caching, chained avatar fetch.
// - `registry.rs`:   Process-wide bridge registry and thread-of-control
//                    enforcement.
// - `error.rs`:      Construction errors.
//
// **Critical constraint: phase separation.** Each frame runs one poll phase
// (the only point where platform callbacks re-enter) and then one drain
// phase. Handlers invoked during the poll may only enqueue; nothing is
// materialized or delivered until the drain. This is what makes the FIFO and
// exactly-once guarantees hold without any locking on the hot path.

pub mod bridge;
pub mod correlator;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod host;
pub mod registry;
pub mod task;

pub use bridge::{EntriesRequest, EventBridge, FrameReport, HighScoreRequest};
pub use dispatcher::EventDispatcher;
pub use error::BridgeError;
pub use event::{topic, EventData};
pub use host::{HostHandle, HostId, HostSession, Listener};
pub use task::{DispatchOutcome, DispatchTask};
