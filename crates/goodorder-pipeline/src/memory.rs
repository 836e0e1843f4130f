//! Per-conversation message history.
//!
//! Process-wide store keyed by conversation id. Sessions are created on
//! first append and evicted least-recently-used once the capacity is
//! reached, so memory stays bounded even though individual histories are
//! never pruned. The map lock is held only for map operations; callers on
//! distinct conversation ids do not contend beyond that. Two concurrent
//! appends to the *same* id are not ordered — callers are expected to
//! serialise per conversation.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    Human,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "Human",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug)]
struct Session {
    messages: Vec<ChatMessage>,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    clock: u64,
}

/// Bounded LRU store of conversation histories.
#[derive(Debug)]
pub struct SessionStore {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl SessionStore {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// `capacity` is the maximum number of live sessions, at least 1.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of a conversation's history, oldest first. Unseen ids
    /// yield an empty history without creating a session.
    pub fn history(&self, conversation_id: &str) -> Vec<ChatMessage> {
        let mut inner = self.inner.lock().expect("session store lock poisoned");
        inner.clock += 1;
        let tick = inner.clock;
        match inner.sessions.get_mut(conversation_id) {
            Some(session) => {
                session.last_used = tick;
                session.messages.clone()
            }
            None => Vec::new(),
        }
    }

    /// Append one message, creating the session on first reference.
    pub fn append(&self, conversation_id: &str, role: ChatRole, text: &str) {
        let mut inner = self.inner.lock().expect("session store lock poisoned");
        inner.clock += 1;
        let tick = inner.clock;

        if !inner.sessions.contains_key(conversation_id) {
            if inner.sessions.len() >= self.capacity {
                evict_oldest(&mut inner);
            }
            debug!(conversation_id, "created session");
            inner.sessions.insert(
                conversation_id.to_string(),
                Session {
                    messages: Vec::new(),
                    last_used: tick,
                },
            );
        }

        let session = inner
            .sessions
            .get_mut(conversation_id)
            .expect("session just ensured");
        session.last_used = tick;
        session.messages.push(ChatMessage {
            role,
            text: text.to_string(),
        });
    }

    /// Append one human/assistant exchange.
    pub fn record_exchange(&self, conversation_id: &str, user_text: &str, reply_text: &str) {
        self.append(conversation_id, ChatRole::Human, user_text);
        self.append(conversation_id, ChatRole::Assistant, reply_text);
    }

    /// Drop a conversation's history.
    pub fn reset(&self, conversation_id: &str) {
        let mut inner = self.inner.lock().expect("session store lock poisoned");
        inner.sessions.remove(conversation_id);
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("session store lock poisoned")
            .sessions
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn evict_oldest(inner: &mut Inner) {
    if let Some(oldest) = inner
        .sessions
        .iter()
        .min_by_key(|(_, s)| s.last_used)
        .map(|(id, _)| id.clone())
    {
        debug!(conversation_id = %oldest, "evicting least-recently-used session");
        inner.sessions.remove(&oldest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchanges_double_the_message_count_in_order() {
        let store = SessionStore::new();
        for i in 0..3 {
            store.record_exchange("c1", &format!("q{i}"), &format!("a{i}"));
        }

        let history = store.history("c1");
        assert_eq!(history.len(), 6);
        assert_eq!(history[0].role, ChatRole::Human);
        assert_eq!(history[0].text, "q0");
        assert_eq!(history[5].role, ChatRole::Assistant);
        assert_eq!(history[5].text, "a2");
    }

    #[test]
    fn unseen_id_has_empty_history_and_no_session() {
        let store = SessionStore::new();
        assert!(store.history("nope").is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn sessions_are_isolated() {
        let store = SessionStore::new();
        store.record_exchange("a", "hello", "hi");
        store.record_exchange("b", "bonjour", "salut");

        assert_eq!(store.history("a").len(), 2);
        assert_eq!(store.history("b").len(), 2);
        assert_eq!(store.history("a")[0].text, "hello");
    }

    #[test]
    fn reset_drops_only_the_named_session() {
        let store = SessionStore::new();
        store.record_exchange("a", "x", "y");
        store.record_exchange("b", "x", "y");
        store.reset("a");

        assert!(store.history("a").is_empty());
        assert_eq!(store.history("b").len(), 2);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let store = SessionStore::with_capacity(2);
        store.append("a", ChatRole::Human, "1");
        store.append("b", ChatRole::Human, "2");
        // Touch "a" so "b" becomes the eviction candidate.
        let _ = store.history("a");
        store.append("c", ChatRole::Human, "3");

        assert_eq!(store.len(), 2);
        assert!(!store.history("a").is_empty());
        assert!(store.history("b").is_empty());
        assert!(!store.history("c").is_empty());
    }

    #[test]
    fn concurrent_distinct_keys() {
        use std::sync::Arc;

        let store = Arc::new(SessionStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let id = format!("conv-{i}");
                    for n in 0..50 {
                        store.record_exchange(&id, &format!("q{n}"), &format!("a{n}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for i in 0..8 {
            assert_eq!(store.history(&format!("conv-{i}")).len(), 100);
        }
    }
}
