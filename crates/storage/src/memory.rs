//! In-memory store and cache used by tests and local dry runs.
//!
//! Both types honor the same contracts as their production counterparts,
//! including the pending-only status transitions, and can be switched into
//! a failing mode to exercise error paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use herald_core::{Message, MessageStatus};

use crate::cache::CacheSink;
use crate::error::{CacheError, StoreError};
use crate::store::MessageStore;

// ── Message store ────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryMessageStore {
    messages: Mutex<BTreeMap<i64, Message>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with pending messages.
    pub fn with_pending<I, P, C>(seed: I) -> Self
    where
        I: IntoIterator<Item = (i64, P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let store = Self::new();
        for (id, phone, content) in seed {
            store.insert(Message::pending(id, phone, content));
        }
        store
    }

    pub fn insert(&self, message: Message) {
        self.lock().insert(message.id, message);
    }

    pub fn get(&self, id: i64) -> Option<Message> {
        self.lock().get(&id).cloned()
    }

    pub fn status_of(&self, id: i64) -> Option<MessageStatus> {
        self.lock().get(&id).map(|m| m.status)
    }

    /// Number of status updates that changed a row.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every read (fetch, list, count, ping) fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every status update fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<i64, Message>> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Other("store unavailable".to_string()));
        }
        Ok(())
    }

    fn transition(
        &self,
        id: i64,
        status: MessageStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Other("store unavailable".to_string()));
        }
        let mut messages = self.lock();
        if let Some(msg) = messages.get_mut(&id) {
            if msg.status == MessageStatus::Pending {
                msg.status = status;
                msg.sent_at = Some(at);
                self.writes.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn fetch_pending(&self, limit: u32) -> Result<Vec<Message>, StoreError> {
        self.check_read()?;
        Ok(self
            .lock()
            .values()
            .filter(|m| m.status == MessageStatus::Pending)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_sent(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.transition(id, MessageStatus::Sent, at)
    }

    async fn mark_failed(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.transition(id, MessageStatus::Failed, at)
    }

    async fn list_by_status(
        &self,
        status: MessageStatus,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, StoreError> {
        self.check_read()?;
        let mut matching: Vec<Message> = self
            .lock()
            .values()
            .filter(|m| m.status == status)
            .cloned()
            .collect();
        // Newest first; unstamped rows last; ties broken by id descending.
        matching.sort_by(|a, b| match (a.sent_at, b.sent_at) {
            (Some(x), Some(y)) => y.cmp(&x).then(b.id.cmp(&a.id)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.id.cmp(&a.id),
        });
        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_by_status(&self, status: MessageStatus) -> Result<u64, StoreError> {
        self.check_read()?;
        Ok(self.lock().values().filter(|m| m.status == status).count() as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_read()
    }
}

// ── Cache ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Duration)>>,
    fail: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).map(|(v, _)| v.clone())
    }

    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.lock().get(key).map(|(_, ttl)| *ttl)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every operation fail.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (String, Duration)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CacheError::Other("cache unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheSink for MemoryCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.check()?;
        self.lock()
            .insert(key.to_string(), (value.to_string(), ttl));
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.check()
    }
}
