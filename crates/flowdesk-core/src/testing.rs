//! Test doubles shared by the unit tests of this crate.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use flowdesk_types::error::RepositoryError;

use crate::clock::Clock;
use crate::storage::kv_store::KvStore;

/// In-memory `KvStore` with an optional write failure switch.
#[derive(Default)]
pub struct MemoryKv {
    values: Mutex<HashMap<String, String>>,
    fail_writes: Mutex<bool>,
    /// Writes seen so far, and the single write number that should fail.
    writes: Mutex<(usize, Option<usize>)>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn put_raw(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }

    /// Fail only the `n`th write from now (1-based).
    pub fn fail_nth_write(&self, n: usize) {
        let mut writes = self.writes.lock().unwrap();
        *writes = (0, Some(n));
    }

    fn check_write(&self) -> Result<(), RepositoryError> {
        let mut writes = self.writes.lock().unwrap();
        writes.0 += 1;
        if *self.fail_writes.lock().unwrap() || writes.1 == Some(writes.0) {
            return Err(RepositoryError::Connection);
        }
        Ok(())
    }
}

impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        self.check_write()?;
        self.put_raw(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), RepositoryError> {
        self.check_write()?;
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Clock that advances by a fixed tick on every reading.
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
    tick: Duration,
}

impl ManualClock {
    pub fn new(tick_ms: i64) -> Self {
        Self {
            current: Mutex::new(Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap()),
            tick: Duration::milliseconds(tick_ms),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut current = self.current.lock().unwrap();
        let now = *current;
        *current = now + self.tick;
        now
    }
}
