// crates/labeldb-recorder/src/rate_limit.rs
// ============================================================================
// Module: Token Bucket
// Description: Async token-bucket rate limiter for the recorder loop.
// Purpose: Bound sustained write throughput; backpressure the ingest queue.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! A token bucket with fractional refill: capacity `burst`, refilled at
//! `rate` tokens per second. The single consumer awaits one token per
//! identity; when the bucket is empty the acquire sleeps exactly until the
//! next token accrues. Because the ingest channel is bounded, a slow drain
//! here transitively throttles producers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use tokio::time::Instant;

// ============================================================================
// SECTION: Token Bucket
// ============================================================================

/// Single-consumer async token bucket.
#[derive(Debug)]
pub struct TokenBucket {
    /// Refill rate in tokens per second.
    rate: f64,
    /// Maximum tokens the bucket holds.
    burst: f64,
    /// Tokens currently available.
    tokens: f64,
    /// Instant of the last refill accounting.
    refilled_at: Instant,
}

impl TokenBucket {
    /// Creates a bucket that starts full.
    ///
    /// `rate` and `burst` are clamped to a minimum of one token per hour and
    /// one token, keeping the arithmetic finite.
    #[must_use]
    pub fn new(rate: f64, burst: f64) -> Self {
        let rate = rate.max(1.0 / 3600.0);
        let burst = burst.max(1.0);
        Self {
            rate,
            burst,
            tokens: burst,
            refilled_at: Instant::now(),
        }
    }

    /// Waits until one token is available and consumes it.
    pub async fn acquire(&mut self) {
        self.refill();
        if self.tokens < 1.0 {
            let deficit = 1.0 - self.tokens;
            let wait = Duration::from_secs_f64(deficit / self.rate);
            tokio::time::sleep(wait).await;
            self.refill();
        }
        // Refill after the computed sleep guarantees at least one token.
        self.tokens = (self.tokens - 1.0).max(0.0);
    }

    /// Credits tokens accrued since the last refill.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.refilled_at);
        self.refilled_at = now;
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_token_is_immediately_available() {
        let mut bucket = TokenBucket::new(10.0, 1.0);
        let before = Instant::now();
        bucket.acquire().await;
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_bucket_waits_for_refill() {
        let mut bucket = TokenBucket::new(10.0, 1.0);
        bucket.acquire().await;

        let before = Instant::now();
        bucket.acquire().await;
        let waited = Instant::now().duration_since(before);
        // 10 tokens/s means the next token accrues after 100ms.
        assert!(waited >= Duration::from_millis(100));
        assert!(waited < Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_rate_is_bounded() {
        let mut bucket = TokenBucket::new(200.0, 1.0);
        let start = Instant::now();
        for _ in 0..21 {
            bucket.acquire().await;
        }
        // 21 acquires at 200/s with burst 1: the 20 post-burst tokens need
        // at least 100ms of accrual.
        assert!(Instant::now().duration_since(start) >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_bucket_does_not_accumulate_beyond_burst() {
        let mut bucket = TokenBucket::new(10.0, 1.0);
        tokio::time::sleep(Duration::from_secs(60)).await;
        bucket.acquire().await;

        // Despite the long idle stretch only one token was stored.
        let before = Instant::now();
        bucket.acquire().await;
        assert!(Instant::now().duration_since(before) >= Duration::from_millis(100));
    }
}
