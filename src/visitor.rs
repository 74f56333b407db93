use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub type Timestamp = DateTime<Utc>;

// Admission state for one client identity
#[derive(Debug, Clone)]
pub struct VisitorRecord {
    last_seen: Timestamp,
    request_count: u32,
    timestamps: Vec<Timestamp>, // admissions since the last window reset
    evicted: bool,              // set when the store drops this record
}

impl VisitorRecord {
    pub fn new(now: Timestamp) -> Self {
        Self {
            last_seen: now,
            request_count: 0,
            timestamps: Vec::new(),
            evicted: false,
        }
    }

    pub fn last_seen(&self) -> Timestamp {
        self.last_seen
    }

    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    /// True once the record has been removed from its store. A handle to an
    /// evicted record must not be mutated further; look the identity up again.
    pub fn is_evicted(&self) -> bool {
        self.evicted
    }

    /// Time since `last_seen`, clamped to zero when `now` is behind it.
    pub fn idle_for(&self, now: Timestamp) -> Duration {
        (now - self.last_seen).to_std().unwrap_or(Duration::ZERO)
    }

    pub(crate) fn reset(&mut self) {
        self.request_count = 0;
        self.timestamps.clear();
    }

    pub(crate) fn record_admission(&mut self, now: Timestamp) {
        self.request_count += 1;
        // last_seen never moves backwards, even if callers hand us a skewed clock
        self.last_seen = self.last_seen.max(now);
        self.timestamps.push(now);
    }

    fn is_stale(&self, idle_threshold: Duration, now: Timestamp) -> bool {
        self.idle_for(now) > idle_threshold
    }
}

pub type RecordHandle = Arc<Mutex<VisitorRecord>>;

// Lock a record, recovering the guard if a previous holder panicked
pub fn lock_record(handle: &RecordHandle) -> MutexGuard<'_, VisitorRecord> {
    match handle.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Concurrent registry of visitor records keyed by client identity.
///
/// Two lock levels: the map's shard locks guard the key set, and each record
/// carries its own mutex for its counters. Callers must never take a shard
/// lock while holding a record lock. The store itself only ever goes the
/// other way (shard, then record) when it evicts.
#[derive(Default)]
pub struct VisitorStore {
    records: DashMap<String, RecordHandle>,
}

impl VisitorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live record for `identity`, creating an empty one if needed.
    /// Concurrent callers for the same identity all receive the same handle.
    pub fn get_or_create(&self, identity: &str, now: Timestamp) -> RecordHandle {
        if let Some(existing) = self.records.get(identity) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .records
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(VisitorRecord::new(now))));
        Arc::clone(entry.value())
    }

    /// Point-in-time copy of every record's admission timestamps.
    ///
    /// Handles are collected first and each record is locked on its own,
    /// so no shard lock is held while copying.
    pub fn snapshot(&self) -> HashMap<String, Vec<Timestamp>> {
        let handles: Vec<(String, RecordHandle)> = self
            .records
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        handles
            .into_iter()
            .filter_map(|(identity, handle)| {
                let record = lock_record(&handle);
                if record.is_evicted() {
                    None
                } else {
                    Some((identity, record.timestamps.clone()))
                }
            })
            .collect()
    }

    /// Removes `identity`. Returns whether a record was present.
    pub fn remove(&self, identity: &str) -> bool {
        self.records
            .remove_if(identity, |_, handle| {
                lock_record(handle).evicted = true;
                true
            })
            .is_some()
    }

    /// Visits every record idle for longer than `idle_threshold` and evicts
    /// those for which `action` returns true. Returns the number evicted.
    ///
    /// Each visit happens under the record's own lock, so an admission in
    /// flight for that identity finishes before the record is judged.
    pub fn for_each_stale<F>(&self, idle_threshold: Duration, now: Timestamp, mut action: F) -> usize
    where
        F: FnMut(&str, &VisitorRecord) -> bool,
    {
        let mut evicted = 0;
        self.records.retain(|identity, handle| {
            let mut record = lock_record(handle);
            if record.is_stale(idle_threshold, now) && action(identity.as_str(), &record) {
                record.evicted = true;
                evicted += 1;
                false
            } else {
                true
            }
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn at(secs: i64) -> Timestamp {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn get_or_create_returns_same_record() {
        let store = VisitorStore::new();
        let first = store.get_or_create("10.0.0.1", at(0));
        let second = store.get_or_create("10.0.0.1", at(5));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);

        let record = lock_record(&first);
        assert_eq!(record.request_count(), 0);
        assert!(record.timestamps().is_empty());
        assert_eq!(record.last_seen(), at(0));
    }

    #[test]
    fn concurrent_creation_yields_one_record() {
        let store = Arc::new(VisitorStore::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.get_or_create("203.0.113.9", at(0)))
            })
            .collect();
        let records: Vec<RecordHandle> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(store.len(), 1);
        assert!(records.iter().all(|r| Arc::ptr_eq(r, &records[0])));
    }

    #[test]
    fn remove_is_idempotent_and_marks_evicted() {
        let store = VisitorStore::new();
        let handle = store.get_or_create("10.0.0.1", at(0));

        assert!(store.remove("10.0.0.1"));
        assert!(!store.remove("10.0.0.1"));
        assert!(!store.remove("never-seen"));
        assert!(lock_record(&handle).is_evicted());
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_is_an_independent_copy() {
        let store = VisitorStore::new();
        let handle = store.get_or_create("10.0.0.1", at(0));
        lock_record(&handle).record_admission(at(1));

        let snapshot = store.snapshot();
        lock_record(&handle).record_admission(at(2));

        assert_eq!(snapshot["10.0.0.1"], vec![at(1)]);
        assert_eq!(lock_record(&handle).timestamps(), &[at(1), at(2)]);
    }

    #[test]
    fn for_each_stale_only_evicts_idle_records() {
        let store = VisitorStore::new();
        store.get_or_create("old", at(0));
        store.get_or_create("fresh", at(50));

        let mut seen = Vec::new();
        let evicted = store.for_each_stale(Duration::from_secs(60), at(61), |identity, _| {
            seen.push(identity.to_string());
            true
        });

        assert_eq!(evicted, 1);
        assert_eq!(seen, vec!["old".to_string()]);
        assert!(store.snapshot().contains_key("fresh"));
        assert!(!store.snapshot().contains_key("old"));
    }

    #[test]
    fn for_each_stale_uses_strict_threshold() {
        let store = VisitorStore::new();
        store.get_or_create("edge", at(0));

        assert_eq!(store.for_each_stale(Duration::from_secs(60), at(60), |_, _| true), 0);
        assert_eq!(store.for_each_stale(Duration::from_secs(60), at(61), |_, _| true), 1);
    }

    #[test]
    fn for_each_stale_keeps_records_the_action_declines() {
        let store = VisitorStore::new();
        store.get_or_create("pinned", at(0));

        let evicted = store.for_each_stale(Duration::from_secs(1), at(100), |_, _| false);

        assert_eq!(evicted, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn last_seen_never_moves_backwards() {
        let mut record = VisitorRecord::new(at(10));
        record.record_admission(at(5));

        assert_eq!(record.last_seen(), at(10));
        assert_eq!(record.request_count(), 1);
        assert_eq!(record.timestamps().len(), 1);
        assert_eq!(record.idle_for(at(0)), Duration::ZERO);
    }
}
