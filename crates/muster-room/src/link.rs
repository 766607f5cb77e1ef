//! The per-connection handle contract and the membership table.

use std::collections::HashMap;
use std::future::Future;

use muster_protocol::{ClientId, Packet};

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// One client's transport, as the room sees it.
///
/// The transport layer owns the implementation (socket, framing,
/// retransmission); the room only needs to address packets and tag
/// reliable ones with the connection's sequence number.
pub trait Link: Send + Sync + 'static {
    /// The error type for send failures.
    type Error: std::error::Error + Send + Sync + 'static;

    /// The identity the transport assigned this connection.
    fn client_id(&self) -> ClientId;

    /// The next sequence number for reliable framing. Monotonically
    /// increasing per connection.
    fn next_nonce(&self) -> u64;

    /// Sends one framed packet to the client.
    fn send(&self, packet: Packet) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// The membership table: client identity → connection handle.
///
/// No ordering is guaranteed. Removing an absent identity is a no-op
/// returning `None`, never an error. The same table type backs the
/// waiting room, which holds connections not yet admitted to
/// membership.
#[derive(Debug)]
pub struct Members<L> {
    inner: HashMap<ClientId, L>,
}

impl<L> Members<L> {
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    /// Inserts a member, replacing any previous handle for the same id.
    pub fn add(&mut self, client: ClientId, link: L) {
        self.inner.insert(client, link);
    }

    /// Removes a member, returning its handle if it was present.
    pub fn remove(&mut self, client: &ClientId) -> Option<L> {
        self.inner.remove(client)
    }

    pub fn get(&self, client: &ClientId) -> Option<&L> {
        self.inner.get(client)
    }

    pub fn contains(&self, client: &ClientId) -> bool {
        self.inner.contains_key(client)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// All `(identity, handle)` pairs, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&ClientId, &L)> {
        self.inner.iter()
    }

    /// The current member identities.
    pub fn ids(&self) -> Vec<ClientId> {
        self.inner.keys().copied().collect()
    }

    /// Keeps only the members the predicate accepts.
    pub fn retain(&mut self, keep: impl FnMut(&ClientId, &mut L) -> bool) {
        self.inner.retain(keep);
    }

    /// Empties the table, returning everything it held.
    pub fn drain(&mut self) -> Vec<(ClientId, L)> {
        self.inner.drain().collect()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl<L> Default for Members<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(id: u32) -> ClientId {
        ClientId(id)
    }

    #[test]
    fn test_members_add_and_get() {
        let mut members = Members::new();
        members.add(cid(1), "alice");
        members.add(cid(2), "bob");

        assert_eq!(members.get(&cid(1)), Some(&"alice"));
        assert_eq!(members.len(), 2);
        assert!(members.contains(&cid(2)));
    }

    #[test]
    fn test_members_remove_returns_handle() {
        let mut members = Members::new();
        members.add(cid(1), "alice");

        assert_eq!(members.remove(&cid(1)), Some("alice"));
        assert!(members.is_empty());
    }

    #[test]
    fn test_members_remove_absent_is_noop() {
        let mut members: Members<&str> = Members::new();
        assert_eq!(members.remove(&cid(99)), None);
    }

    #[test]
    fn test_members_add_replaces_existing_handle() {
        let mut members = Members::new();
        members.add(cid(1), "old");
        members.add(cid(1), "new");

        assert_eq!(members.len(), 1);
        assert_eq!(members.get(&cid(1)), Some(&"new"));
    }

    #[test]
    fn test_members_ids_and_drain() {
        let mut members = Members::new();
        members.add(cid(1), "a");
        members.add(cid(2), "b");

        let mut ids = members.ids();
        ids.sort_by_key(|c| c.0);
        assert_eq!(ids, vec![cid(1), cid(2)]);

        let drained = members.drain();
        assert_eq!(drained.len(), 2);
        assert!(members.is_empty());
    }

    #[test]
    fn test_members_retain() {
        let mut members = Members::new();
        members.add(cid(1), "a");
        members.add(cid(2), "b");

        members.retain(|id, _| id.0 == 2);

        assert!(!members.contains(&cid(1)));
        assert!(members.contains(&cid(2)));
    }
}
