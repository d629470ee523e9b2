use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Token bucket for one source. Capacity equals the configured
/// requests-per-minute; tokens refill continuously at rpm/60 per second.
///
/// `acquire` blocks the caller until a token is available — the intentional
/// suspension point of the gateway. No busy-spin: the wait duration is
/// computed from the refill rate and slept once per round.
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rpm: u32) -> Self {
        let capacity = rpm.max(1) as f64;
        Self {
            capacity,
            refill_per_sec: capacity / 60.0,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token, waiting for refill when the bucket is empty.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().expect("bucket lock poisoned");
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                // Time until the deficit refills.
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec)
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently available (after refill), for observability.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().expect("bucket lock poisoned");
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
        state.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_up_to_capacity_is_immediate() {
        let bucket = TokenBucket::new(10);
        let start = Instant::now();
        for _ in 0..10 {
            bucket.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn drained_bucket_waits_for_refill() {
        // 10 rpm = one token every 6 seconds.
        let bucket = TokenBucket::new(10);
        for _ in 0..10 {
            bucket.acquire().await;
        }

        let start = Instant::now();
        bucket.acquire().await;
        let waited = start.elapsed();
        assert!(
            waited >= Duration::from_secs_f64(5.9) && waited <= Duration::from_secs_f64(6.1),
            "expected ~6s wait, got {waited:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_fifteen_at_ten_rpm_spaces_the_tail() {
        let bucket = TokenBucket::new(10);
        let start = Instant::now();
        let mut elapsed = Vec::new();
        for _ in 0..15 {
            bucket.acquire().await;
            elapsed.push(start.elapsed());
        }

        // First 10 immediate, the rest spaced at the 6s refill cadence.
        for e in &elapsed[..10] {
            assert_eq!(*e, Duration::ZERO);
        }
        for (i, e) in elapsed[10..].iter().enumerate() {
            let eligible = Duration::from_secs_f64(6.0 * (i + 1) as f64);
            assert!(
                *e >= eligible - Duration::from_millis(100),
                "call {} fired at {e:?}, before its eligible time {eligible:?}",
                i + 11
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_cap_at_capacity() {
        let bucket = TokenBucket::new(10);
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(bucket.available() <= 10.0);
    }
}
