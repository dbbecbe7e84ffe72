//! Per-chat mutual exclusion for agent invocations.
//!
//! Each chat with an invocation in flight owns one entry in the map: a fair
//! (FIFO) async mutex. Waiters for the same chat queue on that mutex in
//! arrival order; other chats never touch it. The entry is removed when the
//! last holder releases with nobody queued behind it.

use std::collections::HashMap;
use std::sync::{Arc, MutexGuard, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use crate::models::ChatId;

type Slot = Arc<Mutex<()>>;

/// Registry of per-chat locks. Clones share the same registry; separate
/// `ChatLocks::new()` instances never do.
#[derive(Debug, Clone, Default)]
pub struct ChatLocks {
    slots: Arc<std::sync::Mutex<HashMap<ChatId, Slot>>>,
}

impl ChatLocks {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other invocation for `chat_id` is in flight, then
    /// claim the chat. Released when the returned guard is dropped.
    pub async fn acquire(&self, chat_id: ChatId) -> ChatLockGuard {
        let slot = Arc::clone(self.slots().entry(chat_id).or_default());
        let guard = Arc::clone(&slot).lock_owned().await;
        trace!(chat_id, "chat lock acquired");

        ChatLockGuard {
            chat_id,
            guard: Some(guard),
            slot,
            locks: self.clone(),
        }
    }

    /// Whether an invocation for `chat_id` currently holds the lock.
    #[must_use]
    pub fn is_in_flight(&self, chat_id: ChatId) -> bool {
        self.slots()
            .get(&chat_id)
            .is_some_and(|slot| slot.try_lock().is_err())
    }

    /// Number of chats with a holder or waiters.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.slots().len()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ChatId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof that the holder is the only invocation in flight for its chat.
#[derive(Debug)]
pub struct ChatLockGuard {
    chat_id: ChatId,
    guard: Option<OwnedMutexGuard<()>>,
    slot: Slot,
    locks: ChatLocks,
}

impl ChatLockGuard {
    /// Chat this guard belongs to.
    #[must_use]
    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Release the chat explicitly. Equivalent to dropping the guard.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ChatLockGuard {
    fn drop(&mut self) {
        // Holding the map lock keeps new acquirers from cloning the slot
        // between the release and the count check below.
        let mut slots = self.locks.slots();
        drop(self.guard.take());

        // One reference in the map, one in `self.slot`: nobody is queued.
        if Arc::strong_count(&self.slot) == 2
            && slots
                .get(&self.chat_id)
                .is_some_and(|slot| Arc::ptr_eq(slot, &self.slot))
        {
            slots.remove(&self.chat_id);
        }
        trace!(chat_id = self.chat_id, "chat lock released");
    }
}
