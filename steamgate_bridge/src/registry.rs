// Process-wide registry of live bridges.
//
// The platform's underlying client connection is a process-wide singleton,
// so when several host instances share one process their bridges must all
// live on one thread of control. The registry enforces that rule at
// construction time: the first registration pins the constructing thread,
// later registrations from any other thread fail outright, and the pin
// clears once the last bridge is gone.
//
// Registration happens inside `EventBridge::new` and unregistration in its
// `Drop`; nothing else touches this table. Bookkeeping (ids, host ids, the
// pin) lives behind a `Mutex` so the wrong-thread check is race-free. The
// actual bridge references are `Rc`-based and single-threaded, so they live
// in a thread-local side table instead: on the pinned thread that table
// sees every live bridge, and reverse lookup from any other thread finds
// nothing it could safely use anyway.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};

use crate::bridge::EventBridge;
use crate::error::BridgeError;
use crate::host::HostId;

/// Identity of one registered bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BridgeId(u64);

impl fmt::Display for BridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bridge#{}", self.0)
    }
}

struct RegistryState {
    next_id: u64,
    pinned: Option<ThreadId>,
    rows: Vec<Row>,
}

struct Row {
    id: BridgeId,
    #[allow(dead_code)]
    host: HostId,
}

static REGISTRY: Mutex<RegistryState> = Mutex::new(RegistryState {
    next_id: 1,
    pinned: None,
    rows: Vec::new(),
});

thread_local! {
    static LOCAL_BRIDGES: RefCell<Vec<(BridgeId, HostId, Weak<RefCell<EventBridge>>)>> =
        const { RefCell::new(Vec::new()) };
}

fn lock() -> std::sync::MutexGuard<'static, RegistryState> {
    // The registry stays consistent even if a holder panicked; bookkeeping
    // writes are all single assignments.
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Register a newly constructed bridge for a host session.
///
/// Fails with [`BridgeError::WrongThread`] when another live bridge is
/// pinned to a different thread. The caller must abort construction.
pub fn register(
    host: HostId,
    bridge: Weak<RefCell<EventBridge>>,
) -> Result<BridgeId, BridgeError> {
    let current = thread::current().id();
    let mut state = lock();
    if !state.rows.is_empty() && state.pinned.is_some_and(|pinned| pinned != current) {
        return Err(BridgeError::WrongThread);
    }
    state.pinned = Some(current);
    let id = BridgeId(state.next_id);
    state.next_id += 1;
    state.rows.push(Row { id, host });
    drop(state);

    LOCAL_BRIDGES.with(|local| local.borrow_mut().push((id, host, bridge)));
    Ok(id)
}

/// Remove a bridge. Clears the thread pin when it was the last one.
pub fn unregister(id: BridgeId) {
    let mut state = lock();
    state.rows.retain(|row| row.id != id);
    if state.rows.is_empty() {
        state.pinned = None;
    }
    drop(state);

    LOCAL_BRIDGES.with(|local| local.borrow_mut().retain(|(row_id, _, _)| *row_id != id));
}

/// Look up the live bridge serving a host session, on the current thread.
pub fn find_by_host(host: HostId) -> Option<Rc<RefCell<EventBridge>>> {
    LOCAL_BRIDGES.with(|local| {
        local
            .borrow()
            .iter()
            .find(|(_, row_host, _)| *row_host == host)
            .and_then(|(_, _, weak)| weak.upgrade())
    })
}

/// Number of live bridges in the process.
pub fn count() -> usize {
    lock().rows.len()
}

/// Serializes tests that touch the process-wide registry.
#[cfg(test)]
pub(crate) fn test_guard() -> std::sync::MutexGuard<'static, ()> {
    static GUARD: Mutex<()> = Mutex::new(());
    GUARD.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostSession;

    #[test]
    fn same_thread_registrations_accumulate_and_unpin_at_zero() {
        let _guard = test_guard();
        let host_a = HostSession::new();
        let host_b = HostSession::new();

        let a = register(host_a.handle().id(), Weak::new()).unwrap();
        let b = register(host_b.handle().id(), Weak::new()).unwrap();
        assert_ne!(a, b);
        assert_eq!(count(), 2);

        unregister(a);
        assert_eq!(count(), 1);
        unregister(b);
        assert_eq!(count(), 0);

        // Pin cleared: a different thread may now host the next bridge.
        let host_c = HostSession::new();
        let host_c_id = host_c.handle().id();
        let from_thread = thread::spawn(move || {
            let id = register(host_c_id, Weak::new())?;
            unregister(id);
            Ok::<(), BridgeError>(())
        })
        .join()
        .unwrap();
        assert!(from_thread.is_ok());
    }

    #[test]
    fn second_thread_is_rejected_while_a_bridge_lives() {
        let _guard = test_guard();
        let host = HostSession::new();
        let id = register(host.handle().id(), Weak::new()).unwrap();

        let other_host = HostSession::new();
        let other_id = other_host.handle().id();
        let result = thread::spawn(move || register(other_id, Weak::new()).map(|_| ()))
            .join()
            .unwrap();
        assert_eq!(result, Err(BridgeError::WrongThread));

        unregister(id);
        assert_eq!(count(), 0);
    }

    #[test]
    fn find_by_host_misses_for_unknown_hosts() {
        let _guard = test_guard();
        let host = HostSession::new();
        assert!(find_by_host(host.handle().id()).is_none());
    }
}
