//! Handle table: per-session mapping from handle id to handle record.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::ids::draw_unique_id;
use crate::plugin::{PluginEntry, PluginToken};
use crate::sdp::{MediaContext, Negotiator};
use crate::session::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `fresh -> attached -> negotiating -> media-ready -> closed`. Relay
/// callbacks only forward bytes while in `MediaReady`; any other state drops
/// RTP/RTCP silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Fresh,
    Attached,
    Negotiating,
    MediaReady,
    Closed,
}

/// The binding of one session to one plugin instance; owns a media pipeline.
///
/// The owning session is referenced only by id: handles are always reached
/// through `Session::handle`, which is already borrowing the session, so
/// there is no risk of the back-reference outliving its target.
pub struct Handle {
    id: HandleId,
    session_id: SessionId,
    plugin: Arc<PluginEntry>,
    plugin_token: PluginToken,
    state: Mutex<HandleState>,
    media: Mutex<MediaContext>,
    negotiator: Negotiator,
}

impl Handle {
    pub fn new(
        id: HandleId,
        session_id: SessionId,
        plugin: Arc<PluginEntry>,
        plugin_token: PluginToken,
        negotiator: Negotiator,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            session_id,
            plugin,
            plugin_token,
            state: Mutex::new(HandleState::Fresh),
            media: Mutex::new(MediaContext::default()),
            negotiator,
        })
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn plugin(&self) -> &Arc<PluginEntry> {
        &self.plugin
    }

    pub fn plugin_token(&self) -> PluginToken {
        self.plugin_token
    }

    pub fn state(&self) -> HandleState {
        *self.state.lock().expect("handle state mutex poisoned")
    }

    pub fn set_state(&self, state: HandleState) {
        *self.state.lock().expect("handle state mutex poisoned") = state;
    }

    pub fn media(&self) -> std::sync::MutexGuard<'_, MediaContext> {
        self.media.lock().expect("media context mutex poisoned")
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    /// Whether this handle currently forwards RTP/RTCP.
    pub fn is_media_ready(&self) -> bool {
        self.state() == HandleState::MediaReady
    }
}

/// Per-session mapping from handle id to handle record.
#[derive(Default)]
pub struct HandleTable {
    handles: HashMap<HandleId, Arc<Handle>>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a handle id unique within this session.
    pub fn insert(&mut self, build: impl FnOnce(HandleId) -> Arc<Handle>) -> Arc<Handle> {
        let id = HandleId::new(draw_unique_id(|candidate| {
            self.handles.contains_key(&HandleId::new(candidate))
        }));
        let handle = build(id);
        self.handles.insert(id, handle.clone());
        handle
    }

    pub fn get(&self, id: HandleId) -> Option<Arc<Handle>> {
        self.handles.get(&id).cloned()
    }

    /// Explicit, atomic removal from the session's handle table.
    pub fn remove(&mut self, id: HandleId) -> Option<Arc<Handle>> {
        self.handles.remove(&id)
    }

    pub fn drain(&mut self) -> Vec<Arc<Handle>> {
        self.handles.drain().map(|(_, handle)| handle).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::registry::testing::dummy_plugin_entry;

    #[test]
    fn attach_then_detach_leaves_table_unchanged() {
        let mut table = HandleTable::new();
        let plugin = dummy_plugin_entry();
        let before = table.len();

        let handle = table.insert(|id| {
            Handle::new(id, SessionId::new(1), plugin.clone(), PluginToken(1), crate::core::NegotiationFactory::stub().build())
        });

        table.remove(handle.id());
        assert_eq!(table.len(), before);
    }

    #[test]
    fn non_media_ready_handle_drops_relay() {
        let plugin = dummy_plugin_entry();
        let handle = Handle::new(
            HandleId::new(1),
            SessionId::new(1),
            plugin,
            PluginToken(1),
            crate::core::NegotiationFactory::stub().build(),
        );
        assert!(!handle.is_media_ready());

        handle.set_state(HandleState::MediaReady);
        assert!(handle.is_media_ready());

        handle.set_state(HandleState::Closed);
        assert!(!handle.is_media_ready());
    }
}
