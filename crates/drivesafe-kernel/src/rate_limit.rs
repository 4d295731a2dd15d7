//! [`RateLimitedVerifier`] – caps how many PIN attempts reach the inner
//! verifier per minute.
//!
//! A 4-digit PIN with unlimited retries falls to brute force in minutes.
//! Wrapping the verifier bounds the attempt rate without the controller
//! knowing: attempts over quota are refused outright and the inner verifier
//! is not consulted.

use std::num::NonZeroU32;

use drivesafe_types::PinMode;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::warn;

use crate::pin_verifier::PinVerifier;

/// Decorator that refuses PIN attempts beyond `attempts_per_minute`.
///
/// # Example
///
/// ```
/// use drivesafe_kernel::pin_verifier::{PinVerifier, StaticPinVerifier};
/// use drivesafe_kernel::rate_limit::RateLimitedVerifier;
/// use drivesafe_types::PinMode;
///
/// let v = RateLimitedVerifier::new(StaticPinVerifier::default(), 2);
/// assert!(!v.verify(PinMode::Activate, "0000"));
/// assert!(!v.verify(PinMode::Activate, "0001"));
/// // Quota spent: even the right code is refused for now.
/// assert!(!v.verify(PinMode::Activate, "1234"));
/// ```
pub struct RateLimitedVerifier<V> {
    inner: V,
    limiter: DefaultDirectRateLimiter,
}

impl<V: PinVerifier> RateLimitedVerifier<V> {
    /// Allow a burst of `attempts_per_minute`, replenished evenly over a
    /// minute.  Zero is treated as one.
    pub fn new(inner: V, attempts_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(attempts_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            inner,
            limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        }
    }
}

impl<V: PinVerifier> PinVerifier for RateLimitedVerifier<V> {
    fn verify(&self, mode: PinMode, code: &str) -> bool {
        if self.limiter.check().is_err() {
            warn!(%mode, "PIN attempt refused: attempt rate exceeded");
            return false;
        }
        self.inner.verify(mode, code)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::pin_verifier::StaticPinVerifier;

    struct CountingVerifier {
        calls: Arc<AtomicUsize>,
    }

    impl PinVerifier for CountingVerifier {
        fn verify(&self, _mode: PinMode, code: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            code == "1234"
        }
    }

    #[test]
    fn attempts_within_quota_reach_inner_verifier() {
        let v = RateLimitedVerifier::new(StaticPinVerifier::default(), 5);
        assert!(!v.verify(PinMode::Activate, "9999"));
        assert!(v.verify(PinMode::Activate, "1234"));
    }

    #[test]
    fn attempts_over_quota_skip_inner_verifier() {
        let calls = Arc::new(AtomicUsize::new(0));
        let v = RateLimitedVerifier::new(
            CountingVerifier {
                calls: Arc::clone(&calls),
            },
            3,
        );
        for _ in 0..3 {
            assert!(!v.verify(PinMode::Deactivate, "0000"));
        }
        assert!(!v.verify(PinMode::Deactivate, "1234"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn zero_quota_still_allows_one_attempt() {
        let v = RateLimitedVerifier::new(StaticPinVerifier::default(), 0);
        assert!(v.verify(PinMode::Activate, "1234"));
        assert!(!v.verify(PinMode::Activate, "1234"));
    }
}
