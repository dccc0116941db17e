// The scripting-host boundary.
//
// The bridge never talks to a real script interpreter; it sees the host as
// two things. A `HostSession` models the host's lifetime: while the session
// is alive and running, event delivery is allowed, and the moment it drops
// (or suspends) every publish becomes a no-op. A `Listener` wraps one
// script-side callback behind an identity so subscribe/unsubscribe can
// compare "the same function" the way a script registry reference would,
// without comparing closures structurally.
//
// Both types are single-threaded by design and use `Rc` for the shared
// state. Cross-thread use is ruled out one level up by the bridge registry.

use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HOST_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of one host session within this process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HostId(u64);

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host#{}", self.0)
    }
}

/// Owns the liveness of one scripting-host instance.
///
/// Dropping the session marks the host as not running; handles taken from it
/// keep working but every publish through them becomes a no-op from then on.
#[derive(Debug)]
pub struct HostSession {
    handle: HostHandle,
}

impl HostSession {
    pub fn new() -> HostSession {
        HostSession {
            handle: HostHandle {
                id: HostId(NEXT_HOST_ID.fetch_add(1, Ordering::Relaxed)),
                running: Rc::new(Cell::new(true)),
            },
        }
    }

    pub fn handle(&self) -> HostHandle {
        self.handle.clone()
    }

    /// Temporarily stop accepting deliveries (host paused by the runtime).
    pub fn suspend(&self) {
        self.handle.running.set(false);
    }

    pub fn resume(&self) {
        self.handle.running.set(true);
    }
}

impl Default for HostSession {
    fn default() -> Self {
        HostSession::new()
    }
}

impl Drop for HostSession {
    fn drop(&mut self) {
        self.handle.running.set(false);
    }
}

/// Cheap clonable reference to a host session's identity and liveness flag.
#[derive(Clone, Debug)]
pub struct HostHandle {
    id: HostId,
    running: Rc<Cell<bool>>,
}

impl HostHandle {
    pub fn id(&self) -> HostId {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }
}

/// One script-side event callback.
///
/// Clones share the callback and the identity, so a clone compares equal to
/// the original. Equality is identity, never structure.
#[derive(Clone)]
pub struct Listener {
    id: u64,
    callback: Rc<RefCell<dyn FnMut(&str, &Value)>>,
}

impl Listener {
    pub fn new(callback: impl FnMut(&str, &Value) + 'static) -> Listener {
        Listener {
            id: NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed),
            callback: Rc::new(RefCell::new(callback)),
        }
    }

    pub fn invoke(&self, topic: &str, payload: &Value) {
        (self.callback.borrow_mut())(topic, payload);
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Listener) -> bool {
        self.id == other.id
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener#{}", self.id)
    }
}
