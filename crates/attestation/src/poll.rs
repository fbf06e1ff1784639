//! Bounded fixed-interval polling

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often and how many times to poll an eventually-consistent source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub max_attempts: u32,
    #[serde(rename = "interval_ms", with = "millis")]
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Voting-round alignment: 10 checks, 5 s apart
    pub fn round_default() -> Self {
        Self::new(10, Duration::from_secs(5))
    }

    /// Proof retrieval: 20 requests, 15 s apart
    pub fn proof_default() -> Self {
        Self::new(20, Duration::from_secs(15))
    }

    /// Verifier transaction lookup: 5 requests, 10 s apart
    pub fn tx_lookup_default() -> Self {
        Self::new(5, Duration::from_secs(10))
    }

    pub fn backoff(&self) -> FixedBackoff {
        FixedBackoff::new(self.interval, self.max_attempts)
    }

    /// Upper bound on time spent sleeping under this policy
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Fixed delay between attempts with an attempt ceiling
pub struct FixedBackoff {
    interval: Duration,
    max_attempts: u32,
    current_attempt: u32,
}

impl FixedBackoff {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            current_attempt: 0,
        }
    }

    /// Delay before the next attempt, `None` once the ceiling is reached
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.current_attempt += 1;
        Some(self.interval)
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_attempt >= self.max_attempts
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_backoff_ceiling() {
        let mut backoff = FixedBackoff::new(Duration::from_millis(100), 3);

        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.current_attempt(), 3);
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn test_fixed_backoff_reset() {
        let mut backoff = FixedBackoff::new(Duration::from_millis(10), 1);
        backoff.next_delay();
        assert!(backoff.is_exhausted());

        backoff.reset();
        assert_eq!(backoff.current_attempt(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_zero_attempts_never_polls() {
        let mut backoff = PollPolicy::new(0, Duration::from_secs(1)).backoff();
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(PollPolicy::round_default().max_wait(), Duration::from_secs(50));
        assert_eq!(PollPolicy::proof_default().max_attempts, 20);
        assert_eq!(PollPolicy::tx_lookup_default().interval, Duration::from_secs(10));
    }

    #[test]
    fn test_policy_serde_uses_millis() {
        let policy: PollPolicy =
            serde_json::from_str(r#"{"max_attempts": 4, "interval_ms": 2500}"#).unwrap();
        assert_eq!(policy, PollPolicy::new(4, Duration::from_millis(2500)));
    }
}
