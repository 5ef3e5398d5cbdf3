// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process coordination store
//!
//! Holds all state behind one mutex, so every script is trivially atomic.
//! Expiry follows the injected [`Clock`], which lets tests move leases
//! forward without sleeping. Suitable for single-process deployments and
//! for tests; processes that do not share memory need a networked store.

use super::{
    decode_queue_entry, encode_queue_entry, AtomicScript, CoordinationStore, ScriptReply,
    StoreError,
};
use async_trait::async_trait;
use dlm_core::{Clock, SystemClock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(VecDeque<String>),
    /// Reader token to its lease deadline
    Readers(BTreeMap<String, Instant>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
struct Data {
    entries: HashMap<String, Entry>,
}

impl Data {
    /// Fetch a live entry, dropping it first if it has expired
    fn live(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
        let expired = self
            .entries
            .get(key)
            .and_then(|e| e.expires_at)
            .is_some_and(|at| at <= now);
        if expired {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn get_str(&mut self, key: &str, now: Instant) -> Result<Option<String>, StoreError> {
        match self.live(key, now) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn set_str(&mut self, key: &str, value: &str, expires_at: Option<Instant>) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at,
            },
        );
    }

    fn list_mut(
        &mut self,
        key: &str,
        now: Instant,
    ) -> Result<Option<&mut VecDeque<String>>, StoreError> {
        match self.live(key, now) {
            None => Ok(None),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(Some(list)),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    /// Live reader count after purging expired readers
    fn live_readers(&mut self, key: &str, now: Instant) -> Result<usize, StoreError> {
        let count = match self.live(key, now) {
            None => return Ok(0),
            Some(Entry {
                value: Value::Readers(readers),
                ..
            }) => {
                readers.retain(|_, deadline| *deadline > now);
                readers.len()
            }
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
        };
        if count == 0 {
            self.entries.remove(key);
        }
        Ok(count)
    }

    /// Drop queue heads whose waiters have given up
    fn purge_queue_heads(
        &mut self,
        key: &str,
        now_ms: u64,
        now: Instant,
    ) -> Result<(), StoreError> {
        let Some(queue) = self.list_mut(key, now)? else {
            return Ok(());
        };
        while let Some(head) = queue.front() {
            match decode_queue_entry(head) {
                Some((_, deadline)) if deadline > now_ms => break,
                _ => {
                    queue.pop_front();
                }
            }
        }
        if queue.is_empty() {
            self.entries.remove(key);
        }
        Ok(())
    }

    fn remove_queue_entry(
        &mut self,
        key: &str,
        sequence: u64,
        now: Instant,
    ) -> Result<bool, StoreError> {
        let Some(queue) = self.list_mut(key, now)? else {
            return Ok(false);
        };
        let before = queue.len();
        queue.retain(|entry| decode_queue_entry(entry).map(|(seq, _)| seq) != Some(sequence));
        let removed = queue.len() != before;
        // Lists vanish once empty
        if queue.is_empty() {
            self.entries.remove(key);
        }
        Ok(removed)
    }

    fn extend_expiry(&mut self, key: &str, ttl: Duration, now: Instant) {
        if let Some(entry) = self.entries.get_mut(key) {
            let at = now + ttl;
            entry.expires_at = Some(entry.expires_at.map_or(at, |cur| cur.max(at)));
        }
    }
}

/// Coordination store kept in process memory
#[derive(Clone)]
pub struct MemoryStore<C: Clock = SystemClock> {
    clock: C,
    /// Origin for millisecond deadlines stored inside values
    epoch: Instant,
    data: Arc<Mutex<Data>>,
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        let epoch = clock.now();
        Self {
            clock,
            epoch,
            data: Arc::new(Mutex::new(Data::default())),
        }
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.entries
            .values()
            .filter(|e| !matches!(e.expires_at, Some(at) if at <= now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn now_ms(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_millis() as u64
    }

    fn run(&self, data: &mut Data, script: &AtomicScript) -> Result<ScriptReply, StoreError> {
        let now = self.clock.now();
        match script {
            AtomicScript::AcquireExclusive {
                key,
                readers_key,
                token,
                owner_prefix,
                ttl,
            } => {
                if let Some(holder) = data.get_str(key, now)? {
                    if holder.starts_with(owner_prefix.as_str()) {
                        if let Some(entry) = data.entries.get_mut(key) {
                            entry.expires_at = Some(now + *ttl);
                        }
                        return Ok(ScriptReply::Granted(holder));
                    }
                    return Ok(ScriptReply::Denied);
                }
                if data.live_readers(readers_key, now)? > 0 {
                    return Ok(ScriptReply::Denied);
                }
                data.set_str(key, token, Some(now + *ttl));
                Ok(ScriptReply::Granted(token.clone()))
            }

            AtomicScript::ReleaseExclusive { key, token } => {
                if data.get_str(key, now)?.as_deref() == Some(token.as_str()) {
                    data.entries.remove(key);
                    Ok(ScriptReply::Flag(true))
                } else {
                    Ok(ScriptReply::Flag(false))
                }
            }

            AtomicScript::AcquireRead {
                holder_key,
                readers_key,
                token,
                ttl,
            } => {
                if data.get_str(holder_key, now)?.is_some() {
                    return Ok(ScriptReply::Denied);
                }
                data.live_readers(readers_key, now)?;
                let entry = data.entries.entry(readers_key.clone()).or_insert(Entry {
                    value: Value::Readers(BTreeMap::new()),
                    expires_at: None,
                });
                match &mut entry.value {
                    Value::Readers(readers) => {
                        readers.insert(token.clone(), now + *ttl);
                    }
                    _ => return Err(StoreError::WrongType(readers_key.clone())),
                }
                data.extend_expiry(readers_key, *ttl, now);
                Ok(ScriptReply::Granted(token.clone()))
            }

            AtomicScript::ReleaseRead { readers_key, token } => {
                data.live_readers(readers_key, now)?;
                let removed = match data.live(readers_key, now) {
                    Some(Entry {
                        value: Value::Readers(readers),
                        ..
                    }) => readers.remove(token).is_some(),
                    _ => false,
                };
                data.live_readers(readers_key, now)?;
                Ok(ScriptReply::Flag(removed))
            }

            AtomicScript::Enqueue {
                sequence_key,
                queue_key,
                entry_ttl,
                queue_ttl,
            } => {
                let current = match data.get_str(sequence_key, now)? {
                    Some(s) => s
                        .parse::<u64>()
                        .map_err(|_| StoreError::WrongType(sequence_key.clone()))?,
                    None => 0,
                };
                let sequence = current + 1;
                let keep_alive = (*queue_ttl).max(*entry_ttl);
                data.set_str(sequence_key, &sequence.to_string(), Some(now + keep_alive));

                let deadline = self.now_ms(now) + entry_ttl.as_millis() as u64;
                let entry = encode_queue_entry(sequence, deadline);
                match data.list_mut(queue_key, now)? {
                    Some(queue) => queue.push_back(entry),
                    None => {
                        data.entries.insert(
                            queue_key.clone(),
                            Entry {
                                value: Value::List(VecDeque::from([entry])),
                                expires_at: None,
                            },
                        );
                    }
                }
                data.extend_expiry(queue_key, keep_alive, now);
                Ok(ScriptReply::Count(sequence))
            }

            AtomicScript::FairAttempt {
                holder_key,
                readers_key,
                queue_key,
                token,
                owner_prefix,
                sequence,
                ttl,
            } => {
                data.purge_queue_heads(queue_key, self.now_ms(now), now)?;
                if let Some(holder) = data.get_str(holder_key, now)? {
                    if holder.starts_with(owner_prefix.as_str()) {
                        if let Some(entry) = data.entries.get_mut(holder_key) {
                            entry.expires_at = Some(now + *ttl);
                        }
                        data.remove_queue_entry(queue_key, *sequence, now)?;
                        return Ok(ScriptReply::Granted(holder));
                    }
                    return Ok(ScriptReply::Denied);
                }
                if data.live_readers(readers_key, now)? > 0 {
                    return Ok(ScriptReply::Denied);
                }
                let at_head = data
                    .list_mut(queue_key, now)?
                    .and_then(|q| q.front().map(String::as_str).and_then(decode_queue_entry))
                    .is_some_and(|(seq, _)| seq == *sequence);
                if !at_head {
                    return Ok(ScriptReply::Denied);
                }
                if let Some(queue) = data.list_mut(queue_key, now)? {
                    queue.pop_front();
                    if queue.is_empty() {
                        data.entries.remove(queue_key);
                    }
                }
                data.set_str(holder_key, token, Some(now + *ttl));
                Ok(ScriptReply::Granted(token.clone()))
            }

            AtomicScript::Dequeue {
                queue_key,
                sequence,
            } => Ok(ScriptReply::Flag(
                data.remove_queue_entry(queue_key, *sequence, now)?,
            )),
        }
    }
}

#[async_trait]
impl<C: Clock> CoordinationStore for MemoryStore<C> {
    async fn eval(&self, script: &AtomicScript) -> Result<ScriptReply, StoreError> {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        self.run(&mut data, script)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now();
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.get_str(key, now)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.set_str(key, value, ttl.map(|t| now + t));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let existed = data.live(key, now).is_some();
        data.entries.remove(key);
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        Ok(data.live(key, now).is_some())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = self.clock.now();
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        Ok(data
            .live(key, now)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let now = self.clock.now();
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = data
            .entries
            .iter()
            .filter(|(k, e)| k.starts_with(prefix) && !matches!(e.expires_at, Some(at) if at <= now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let now = self.clock.now();
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(list) = data.list_mut(key, now)? {
            list.push_back(value.to_string());
            return Ok(list.len() as u64);
        }
        data.entries.insert(
            key.to_string(),
            Entry {
                value: Value::List(VecDeque::from([value.to_string()])),
                expires_at: None,
            },
        );
        Ok(1)
    }

    async fn list_peek(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now();
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        Ok(data.list_mut(key, now)?.and_then(|l| l.front().cloned()))
    }

    async fn list_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now();
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let Some(list) = data.list_mut(key, now)? else {
            return Ok(None);
        };
        let head = list.pop_front();
        if list.is_empty() {
            data.entries.remove(key);
        }
        Ok(head)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
