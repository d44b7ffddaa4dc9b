//! Typed in-memory store with per-key expiration
//!
//! A key holds at most one of three value shapes at a time: a string, a
//! deque-backed list, or a field/value hash. Expirations live in a side
//! table keyed on the wall clock so they survive snapshots. Every operation
//! lazily reaps the touched key; a rate-limited full sweep covers the rest.

use crate::error::{Result, RustyRadishError};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace};

/// Minimum spacing between opportunistic full sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// A consistent copy of the whole key space, used by the snapshot codec.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub strings: HashMap<String, String>,
    pub lists: HashMap<String, VecDeque<String>>,
    pub hashes: HashMap<String, HashMap<String, String>>,
    pub expiry: HashMap<String, SystemTime>,
}

#[derive(Default)]
struct StoreInner {
    strings: HashMap<String, String>,
    lists: HashMap<String, VecDeque<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
    expiry: HashMap<String, SystemTime>,
    last_sweep: Option<Instant>,
}

/// Thread-safe keyed store. All public operations serialize on one mutex
/// and contain no I/O, so the critical sections stay short.
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
    sweep_interval: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }

    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            sweep_interval,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.maybe_sweep(self.sweep_interval);
        inner
    }

    /* ------------------------------------------------------------------ */
    /* Keyspace                                                            */
    /* ------------------------------------------------------------------ */

    /// Drop every key, value, and expiry.
    pub fn flush_all(&self) {
        let mut inner = self.lock();
        inner.strings.clear();
        inner.lists.clear();
        inner.hashes.clear();
        inner.expiry.clear();
        debug!("flushed all keys");
    }

    /// Write a string value, displacing any other-typed value and clearing
    /// the key's expiry.
    pub fn set(&self, key: &str, value: String) {
        let mut inner = self.lock();
        inner.lists.remove(key);
        inner.hashes.remove(key);
        inner.expiry.remove(key);
        inner.strings.insert(key.to_string(), value);
    }

    /// Fetch the string value at `key`. Returns `None` when absent and a
    /// wrong-type error when the key holds a list or hash.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.lock();
        inner.purge_if_expired(key);
        if let Some(value) = inner.strings.get(key) {
            return Ok(Some(value.clone()));
        }
        if inner.lists.contains_key(key) || inner.hashes.contains_key(key) {
            return Err(RustyRadishError::WrongType {
                key: key.to_string(),
            });
        }
        Ok(None)
    }

    /// Remove `key` across all stores; returns whether anything was removed.
    pub fn del(&self, key: &str) -> bool {
        let mut inner = self.lock();
        inner.purge_if_expired(key);
        let removed = inner.remove_everywhere(key);
        inner.expiry.remove(key);
        removed
    }

    /// All live keys across the three stores, in unspecified order.
    /// Forces a full sweep so no expired key leaks into the listing.
    pub fn keys(&self) -> Vec<String> {
        let mut inner = self.lock();
        inner.sweep();
        let mut out =
            Vec::with_capacity(inner.strings.len() + inner.lists.len() + inner.hashes.len());
        out.extend(inner.strings.keys().cloned());
        out.extend(inner.lists.keys().cloned());
        out.extend(inner.hashes.keys().cloned());
        out
    }

    /// The type name of the value at `key`: "string", "list", "hash", or
    /// "none".
    pub fn key_type(&self, key: &str) -> &'static str {
        let mut inner = self.lock();
        inner.purge_if_expired(key);
        if inner.strings.contains_key(key) {
            "string"
        } else if inner.lists.contains_key(key) {
            "list"
        } else if inner.hashes.contains_key(key) {
            "hash"
        } else {
            "none"
        }
    }

    /// Move `old` to `new`, carrying the expiry along and overwriting any
    /// value previously held under `new`. Returns false when `old` is
    /// absent.
    pub fn rename(&self, old: &str, new: &str) -> bool {
        let mut inner = self.lock();
        inner.purge_if_expired(old);
        if !inner.exists(old) {
            return false;
        }
        // A self-rename must not clear the destination: that is the source.
        if old == new {
            return true;
        }

        inner.remove_everywhere(new);
        inner.expiry.remove(new);

        if let Some(value) = inner.strings.remove(old) {
            inner.strings.insert(new.to_string(), value);
        }
        if let Some(list) = inner.lists.remove(old) {
            inner.lists.insert(new.to_string(), list);
        }
        if let Some(hash) = inner.hashes.remove(old) {
            inner.hashes.insert(new.to_string(), hash);
        }
        if let Some(deadline) = inner.expiry.remove(old) {
            inner.expiry.insert(new.to_string(), deadline);
        }
        true
    }

    /// Schedule `key` to expire `seconds` from now. Returns false when the
    /// key is absent or the deadline is not representable. Non-positive
    /// values land the deadline in the past and the key is reaped on its
    /// next touch.
    pub fn expire(&self, key: &str, seconds: i64) -> bool {
        let mut inner = self.lock();
        inner.purge_if_expired(key);
        if !inner.exists(key) {
            return false;
        }
        let now = SystemTime::now();
        let deadline = if seconds >= 0 {
            // Checked: i64::MAX seconds overflows SystemTime, and a panic
            // here would poison the store lock.
            match now.checked_add(Duration::from_secs(seconds as u64)) {
                Some(deadline) => deadline,
                None => return false,
            }
        } else {
            // Any unrepresentably-distant past deadline is just "expired".
            now.checked_sub(Duration::from_secs(seconds.unsigned_abs()))
                .unwrap_or(UNIX_EPOCH)
        };
        inner.expiry.insert(key.to_string(), deadline);
        true
    }

    /// Remaining time to live in whole seconds (rounded up); -1 when the key
    /// is persistent, -2 when it is absent or already expired.
    pub fn ttl(&self, key: &str) -> i64 {
        let mut inner = self.lock();
        inner.purge_if_expired(key);
        if !inner.exists(key) {
            return -2;
        }
        match inner.expiry.get(key) {
            None => -1,
            Some(deadline) => match deadline.duration_since(SystemTime::now()) {
                Ok(remaining) => remaining.as_millis().div_ceil(1000) as i64,
                Err(_) => -2,
            },
        }
    }

    /* ------------------------------------------------------------------ */
    /* Numeric                                                             */
    /* ------------------------------------------------------------------ */

    /// Increment the integer stored at `key`, treating a missing key as "0".
    /// The stored value is left untouched when it does not parse.
    pub fn incr(&self, key: &str) -> Result<i64> {
        let mut inner = self.lock();
        inner.purge_if_expired(key);
        if inner.lists.contains_key(key) || inner.hashes.contains_key(key) {
            return Err(RustyRadishError::WrongType {
                key: key.to_string(),
            });
        }

        let current = match inner.strings.get(key) {
            Some(value) => value
                .trim()
                .parse::<i64>()
                .map_err(|_| RustyRadishError::NotAnInteger {
                    value: value.clone(),
                })?,
            None => 0,
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| RustyRadishError::NotAnInteger {
                value: current.to_string(),
            })?;
        inner.strings.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    /* ------------------------------------------------------------------ */
    /* Lists                                                               */
    /* ------------------------------------------------------------------ */

    /// Prepend one element; returns the new length.
    pub fn lpush(&self, key: &str, value: String) -> Result<usize> {
        let mut inner = self.lock();
        let list = inner.list_entry(key)?;
        list.push_front(value);
        Ok(list.len())
    }

    /// Append one element; returns the new length.
    pub fn rpush(&self, key: &str, value: String) -> Result<usize> {
        let mut inner = self.lock();
        let list = inner.list_entry(key)?;
        list.push_back(value);
        Ok(list.len())
    }

    pub fn lpop(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.lock();
        let Some(list) = inner.list_mut(key)? else {
            return Ok(None);
        };
        let popped = list.pop_front();
        if list.is_empty() {
            inner.drop_list(key);
        }
        Ok(popped)
    }

    pub fn rpop(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.lock();
        let Some(list) = inner.list_mut(key)? else {
            return Ok(None);
        };
        let popped = list.pop_back();
        if list.is_empty() {
            inner.drop_list(key);
        }
        Ok(popped)
    }

    pub fn llen(&self, key: &str) -> Result<usize> {
        let mut inner = self.lock();
        Ok(inner.list_mut(key)?.map_or(0, |list| list.len()))
    }

    /// Element at `index`; negative indexes count from the tail.
    pub fn lindex(&self, key: &str, index: i64) -> Result<Option<String>> {
        let mut inner = self.lock();
        let Some(list) = inner.list_mut(key)? else {
            return Ok(None);
        };
        Ok(resolve_index(index, list.len()).map(|i| list[i].clone()))
    }

    /// Overwrite the element at `index`; false when out of range.
    pub fn lset(&self, key: &str, index: i64, value: String) -> Result<bool> {
        let mut inner = self.lock();
        let Some(list) = inner.list_mut(key)? else {
            return Ok(false);
        };
        match resolve_index(index, list.len()) {
            Some(i) => {
                list[i] = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Inclusive slice with negative-index and clamping semantics.
    pub fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let mut inner = self.lock();
        let Some(list) = inner.list_mut(key)? else {
            return Ok(Vec::new());
        };
        let len = list.len() as i64;

        let mut start = if start < 0 { len + start } else { start };
        let mut stop = if stop < 0 { len + stop } else { stop };
        if start < 0 {
            start = 0;
        }
        if stop >= len {
            stop = len - 1;
        }
        if start > stop || start >= len {
            return Ok(Vec::new());
        }

        Ok(list
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }

    /// The whole list at `key` (empty when absent).
    pub fn lget(&self, key: &str) -> Result<Vec<String>> {
        let mut inner = self.lock();
        Ok(inner
            .list_mut(key)?
            .map_or_else(Vec::new, |list| list.iter().cloned().collect()))
    }

    /// Remove occurrences of `value`: `count > 0` from the head, `count < 0`
    /// from the tail, `count == 0` all. Returns the number removed.
    pub fn lrem(&self, key: &str, count: i64, value: &str) -> Result<i64> {
        let mut inner = self.lock();
        let Some(list) = inner.list_mut(key)? else {
            return Ok(0);
        };

        let before = list.len();
        if count == 0 {
            list.retain(|item| item != value);
        } else if count > 0 {
            let mut remaining = count as usize;
            let mut kept = VecDeque::with_capacity(list.len());
            for item in list.drain(..) {
                if remaining > 0 && item == value {
                    remaining -= 1;
                } else {
                    kept.push_back(item);
                }
            }
            *list = kept;
        } else {
            let mut remaining = count.unsigned_abs() as usize;
            let mut kept = VecDeque::with_capacity(list.len());
            for item in list.drain(..).rev() {
                if remaining > 0 && item == value {
                    remaining -= 1;
                } else {
                    kept.push_front(item);
                }
            }
            *list = kept;
        }
        let removed = (before - list.len()) as i64;

        if list.is_empty() {
            inner.drop_list(key);
        }
        Ok(removed)
    }

    /* ------------------------------------------------------------------ */
    /* Hashes                                                              */
    /* ------------------------------------------------------------------ */

    /// Set one field; true when the field was newly created.
    pub fn hset(&self, key: &str, field: &str, value: String) -> Result<bool> {
        let mut inner = self.lock();
        let hash = inner.hash_entry(key)?;
        Ok(hash.insert(field.to_string(), value).is_none())
    }

    pub fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut inner = self.lock();
        Ok(inner
            .hash_mut(key)?
            .and_then(|hash| hash.get(field).cloned()))
    }

    pub fn hexists(&self, key: &str, field: &str) -> Result<bool> {
        let mut inner = self.lock();
        Ok(inner
            .hash_mut(key)?
            .is_some_and(|hash| hash.contains_key(field)))
    }

    /// Remove one field; the hash itself goes with its last field.
    pub fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        let mut inner = self.lock();
        let Some(hash) = inner.hash_mut(key)? else {
            return Ok(false);
        };
        let removed = hash.remove(field).is_some();
        if hash.is_empty() {
            inner.drop_hash(key);
        }
        Ok(removed)
    }

    pub fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>> {
        let mut inner = self.lock();
        Ok(inner.hash_mut(key)?.map_or_else(Vec::new, |hash| {
            hash.iter()
                .map(|(f, v)| (f.clone(), v.clone()))
                .collect()
        }))
    }

    pub fn hkeys(&self, key: &str) -> Result<Vec<String>> {
        let mut inner = self.lock();
        Ok(inner
            .hash_mut(key)?
            .map_or_else(Vec::new, |hash| hash.keys().cloned().collect()))
    }

    pub fn hvals(&self, key: &str) -> Result<Vec<String>> {
        let mut inner = self.lock();
        Ok(inner
            .hash_mut(key)?
            .map_or_else(Vec::new, |hash| hash.values().cloned().collect()))
    }

    pub fn hlen(&self, key: &str) -> Result<usize> {
        let mut inner = self.lock();
        Ok(inner.hash_mut(key)?.map_or(0, |hash| hash.len()))
    }

    pub fn hmset(&self, key: &str, pairs: Vec<(String, String)>) -> Result<()> {
        let mut inner = self.lock();
        let hash = inner.hash_entry(key)?;
        for (field, value) in pairs {
            hash.insert(field, value);
        }
        Ok(())
    }

    /* ------------------------------------------------------------------ */
    /* Snapshot support                                                    */
    /* ------------------------------------------------------------------ */

    /// Clone the whole key space after a forced sweep. The copy is made
    /// under the lock, so it is a consistent point-in-time view.
    pub fn export(&self) -> StoreSnapshot {
        let mut inner = self.lock();
        inner.sweep();
        StoreSnapshot {
            strings: inner.strings.clone(),
            lists: inner.lists.clone(),
            hashes: inner.hashes.clone(),
            expiry: inner.expiry.clone(),
        }
    }

    /// Replace all state with `snapshot`, then purge anything that expired
    /// while the snapshot sat on disk.
    pub fn import(&self, snapshot: StoreSnapshot) {
        let mut inner = self.lock();
        inner.strings = snapshot.strings;
        inner.lists = snapshot.lists;
        inner.hashes = snapshot.hashes;
        inner.expiry = snapshot.expiry;
        inner.sweep();
    }
}

/// Map a possibly-negative index onto `0..len`.
fn resolve_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { len + index } else { index };
    if index < 0 || index >= len {
        None
    } else {
        Some(index as usize)
    }
}

impl StoreInner {
    fn exists(&self, key: &str) -> bool {
        self.strings.contains_key(key)
            || self.lists.contains_key(key)
            || self.hashes.contains_key(key)
    }

    fn remove_everywhere(&mut self, key: &str) -> bool {
        let mut removed = self.strings.remove(key).is_some();
        removed |= self.lists.remove(key).is_some();
        removed |= self.hashes.remove(key).is_some();
        removed
    }

    /// Reap `key` now when its deadline has passed.
    fn purge_if_expired(&mut self, key: &str) -> bool {
        let expired = self
            .expiry
            .get(key)
            .is_some_and(|deadline| *deadline <= SystemTime::now());
        if expired {
            self.remove_everywhere(key);
            self.expiry.remove(key);
            trace!(key, "lazily purged expired key");
        }
        expired
    }

    /// Walk the whole expiry table, removing everything past its deadline.
    fn sweep(&mut self) {
        let now = SystemTime::now();
        let expired: Vec<String> = self
            .expiry
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.remove_everywhere(key);
            self.expiry.remove(key);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "swept expired keys");
        }
        self.last_sweep = Some(Instant::now());
    }

    fn maybe_sweep(&mut self, interval: Duration) {
        let due = self
            .last_sweep
            .map_or(true, |last| last.elapsed() >= interval);
        if due {
            self.sweep();
        }
    }

    /// Mutable list access with type discipline; `Ok(None)` when absent.
    fn list_mut(&mut self, key: &str) -> Result<Option<&mut VecDeque<String>>> {
        self.purge_if_expired(key);
        if self.lists.contains_key(key) {
            return Ok(self.lists.get_mut(key));
        }
        if self.strings.contains_key(key) || self.hashes.contains_key(key) {
            return Err(RustyRadishError::WrongType {
                key: key.to_string(),
            });
        }
        Ok(None)
    }

    /// List access that creates the list on a missing key.
    fn list_entry(&mut self, key: &str) -> Result<&mut VecDeque<String>> {
        self.purge_if_expired(key);
        if self.strings.contains_key(key) || self.hashes.contains_key(key) {
            return Err(RustyRadishError::WrongType {
                key: key.to_string(),
            });
        }
        Ok(self.lists.entry(key.to_string()).or_default())
    }

    fn drop_list(&mut self, key: &str) {
        self.lists.remove(key);
        self.expiry.remove(key);
    }

    fn hash_mut(&mut self, key: &str) -> Result<Option<&mut HashMap<String, String>>> {
        self.purge_if_expired(key);
        if self.hashes.contains_key(key) {
            return Ok(self.hashes.get_mut(key));
        }
        if self.strings.contains_key(key) || self.lists.contains_key(key) {
            return Err(RustyRadishError::WrongType {
                key: key.to_string(),
            });
        }
        Ok(None)
    }

    fn hash_entry(&mut self, key: &str) -> Result<&mut HashMap<String, String>> {
        self.purge_if_expired(key);
        if self.strings.contains_key(key) || self.lists.contains_key(key) {
            return Err(RustyRadishError::WrongType {
                key: key.to_string(),
            });
        }
        Ok(self.hashes.entry(key.to_string()).or_default())
    }

    fn drop_hash(&mut self, key: &str) {
        self.hashes.remove(key);
        self.expiry.remove(key);
    }
}
