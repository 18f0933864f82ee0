use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

/// Bounded queue of outbound text frames for one connection.
pub type Outbox = mpsc::Sender<String>;

/// Process-unique handle for one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

struct Observer {
    outbox: Outbox,
    registered: bool,
}

/// Live membership guarded by the registry lock.
pub struct Membership {
    observers: HashMap<ConnectionId, Observer>,
}

impl Membership {
    pub fn outbox(&self, id: ConnectionId) -> Option<&Outbox> {
        self.observers.get(&id).map(|observer| &observer.outbox)
    }

    /// Marks a connection as registered. Returns `false` if it is not connected.
    pub fn promote(&mut self, id: ConnectionId) -> bool {
        match self.observers.get_mut(&id) {
            Some(observer) => {
                observer.registered = true;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: ConnectionId) -> bool {
        self.observers.remove(&id).is_some()
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.observers
            .get(&id)
            .map(|observer| observer.registered)
            .unwrap_or(false)
    }

    /// Copy of the registered observers, safe to iterate while the live set changes.
    pub fn recipients(&self) -> Vec<(ConnectionId, Outbox)> {
        let mut recipients: Vec<_> = self
            .observers
            .iter()
            .filter(|(_, observer)| observer.registered)
            .map(|(id, observer)| (*id, observer.outbox.clone()))
            .collect();
        recipients.sort_by_key(|(id, _)| *id);
        recipients
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn registered_count(&self) -> usize {
        self.observers.values().filter(|o| o.registered).count()
    }
}

/// Tracks every open connection and whether it asked for point-cloud updates.
pub struct SessionRegistry {
    next_id: AtomicU64,
    members: Mutex<Membership>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            members: Mutex::new(Membership {
                observers: HashMap::new(),
            }),
        }
    }

    /// Runs `apply` inside the registry critical section.
    ///
    /// Nothing inside may await; callers use this to pair a store mutation with the
    /// recipient snapshot that must observe it.
    pub fn with_members<R>(&self, apply: impl FnOnce(&mut Membership) -> R) -> R {
        let mut members = self.members.lock().unwrap_or_else(PoisonError::into_inner);
        apply(&mut members)
    }

    /// Adds a connection in the unregistered state.
    pub fn connect(&self, outbox: Outbox) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.with_members(|members| {
            members.observers.insert(
                id,
                Observer {
                    outbox,
                    registered: false,
                },
            );
        });
        id
    }

    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.with_members(|members| members.remove(id))
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.with_members(|members| members.is_registered(id))
    }

    pub fn snapshot(&self) -> Vec<(ConnectionId, Outbox)> {
        self.with_members(|members| members.recipients())
    }

    pub fn len(&self) -> usize {
        self.with_members(|members| members.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn registered_count(&self) -> usize {
        self.with_members(|members| members.registered_count())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connections_start_unregistered() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(4);
        let id = registry.connect(tx);

        assert_eq!(registry.len(), 1);
        assert!(!registry.is_registered(id));
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn snapshot_lists_only_registered_connections() {
        let registry = SessionRegistry::new();
        let (tx_a, _rx_a) = mpsc::channel(4);
        let (tx_b, _rx_b) = mpsc::channel(4);
        let a = registry.connect(tx_a);
        let b = registry.connect(tx_b);

        registry.with_members(|members| members.promote(b));

        let ids: Vec<_> = registry.snapshot().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![b]);
        assert!(!registry.is_registered(a));
        assert_eq!(registry.registered_count(), 1);
    }

    #[test]
    fn disconnect_removes_regardless_of_state() {
        let registry = SessionRegistry::new();
        let (tx_a, _rx_a) = mpsc::channel(4);
        let (tx_b, _rx_b) = mpsc::channel(4);
        let a = registry.connect(tx_a);
        let b = registry.connect(tx_b);
        registry.with_members(|members| members.promote(b));

        assert!(registry.disconnect(a));
        assert!(registry.disconnect(b));
        assert!(!registry.disconnect(b));
        assert!(registry.is_empty());
    }

    #[test]
    fn promote_unknown_connection_fails() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::channel(4);
        let id = registry.connect(tx);
        registry.disconnect(id);
        assert!(!registry.with_members(|members| members.promote(id)));
    }
}
