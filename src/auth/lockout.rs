use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
struct AttemptRecord {
    attempts: u32,
    locked_until: Option<DateTime<Utc>>,
}

/// Failed login tracking per (email, client IP) pair
#[derive(Debug, Clone)]
pub struct LoginLockout {
    max_attempts: u32,
    lockout_duration: Duration,
    records: Arc<Mutex<HashMap<String, AttemptRecord>>>,
}

impl LoginLockout {
    pub fn new(max_attempts: u32, lockout_duration: Duration) -> Self {
        Self {
            max_attempts,
            lockout_duration,
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn key(email: &str, ip: &str) -> String {
        format!("{}:{}", email.trim().to_lowercase(), ip)
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, AttemptRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `Err(seconds)` while the pair is locked
    pub fn check(&self, email: &str, ip: &str) -> Result<(), u64> {
        self.check_at(email, ip, Utc::now())
    }

    pub fn check_at(&self, email: &str, ip: &str, now: DateTime<Utc>) -> Result<(), u64> {
        let key = Self::key(email, ip);
        let mut records = self.records();

        let Some(locked_until) = records.get(&key).and_then(|record| record.locked_until) else {
            return Ok(());
        };

        if now < locked_until {
            let remaining = (locked_until - now).num_seconds().max(1) as u64;
            return Err(remaining);
        }

        // cooldown elapsed, start counting afresh
        records.remove(&key);
        Ok(())
    }

    /// Returns the attempts left before the pair locks
    pub fn record_failure(&self, email: &str, ip: &str) -> u32 {
        self.record_failure_at(email, ip, Utc::now())
    }

    pub fn record_failure_at(&self, email: &str, ip: &str, now: DateTime<Utc>) -> u32 {
        let mut records = self.records();
        let record = records.entry(Self::key(email, ip)).or_default();

        record.attempts += 1;
        if record.attempts >= self.max_attempts {
            record.locked_until = Some(now + self.lockout_duration);
        }

        self.max_attempts.saturating_sub(record.attempts)
    }

    pub fn remaining_attempts(&self, email: &str, ip: &str) -> u32 {
        let attempts = self
            .records()
            .get(&Self::key(email, ip))
            .map(|record| record.attempts)
            .unwrap_or(0);
        self.max_attempts.saturating_sub(attempts)
    }

    pub fn reset(&self, email: &str, ip: &str) {
        self.records().remove(&Self::key(email, ip));
    }

    /// Drop records whose lockout has elapsed
    pub fn cleanup(&self) {
        let now = Utc::now();
        self.records()
            .retain(|_, record| record.locked_until.map_or(true, |until| until > now));
    }
}
