//! Backoff between retry attempts.
//!
//! [`BackoffPolicy`] describes the delay curve, [`ExponentialBackoff`] walks
//! it: `base * multiplier^attempt`, randomized by +/- `jitter` and clamped to
//! `max_delay`.
//!
//! The default curve is exponential. The fixed wait with 10% jitter that
//! common gRPC retry middlewares default to is `multiplier(1.0)` with
//! `jitter(0.1)` and `max_delay` a little above `base_delay`.

use std::time::Duration;

/// Default backoff values for per-call retries.
pub mod defaults {
    use std::time::Duration;

    /// Default delay before the first retry.
    pub const BASE_DELAY: Duration = Duration::from_millis(50);

    /// Default multiplier for exponential backoff.
    pub const MULTIPLIER: f64 = 1.6;

    /// Default jitter factor (0.2 means +/- 20%).
    pub const JITTER: f64 = 0.2;

    /// Default maximum delay between retries.
    pub const MAX_DELAY: Duration = Duration::from_secs(1);
}

/// Configuration of the delay between retry attempts.
///
/// # Example
///
/// ```
/// use tonic_qos::BackoffPolicy;
/// use std::time::Duration;
///
/// let policy = BackoffPolicy::new()
///     .base_delay(Duration::from_millis(10))
///     .max_delay(Duration::from_millis(200))
///     .jitter(0.0);
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Multiplier for exponential backoff. Should be >= 1.0.
    pub multiplier: f64,

    /// Jitter factor between 0.0 and 1.0.
    /// A value of 0.2 keeps the actual delay within +/- 20% of the computed delay.
    pub jitter: f64,

    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: defaults::BASE_DELAY,
            multiplier: defaults::MULTIPLIER,
            jitter: defaults::JITTER,
            max_delay: defaults::MAX_DELAY,
        }
    }
}

impl BackoffPolicy {
    /// Create a new BackoffPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// A constant delay between attempts, without jitter.
    pub fn constant(delay: Duration) -> Self {
        Self {
            base_delay: delay,
            multiplier: 1.0,
            jitter: 0.0,
            max_delay: delay,
        }
    }

    /// Set the delay before the first retry.
    pub fn base_delay(self, base_delay: Duration) -> Self {
        Self { base_delay, ..self }
    }

    /// Set the upper bound of a single delay.
    pub fn max_delay(self, max_delay: Duration) -> Self {
        Self { max_delay, ..self }
    }

    /// Set the growth factor between consecutive delays.
    ///
    /// # Panics
    ///
    /// Panics if `multiplier` is below 1.0.
    pub fn multiplier(self, multiplier: f64) -> Self {
        let policy = Self { multiplier, ..self };
        if let Err(err) = policy.check_multiplier() {
            panic!("{err}");
        }
        policy
    }

    /// Set the jitter fraction.
    ///
    /// # Panics
    ///
    /// Panics if `jitter` is outside `0.0..=1.0`.
    pub fn jitter(self, jitter: f64) -> Self {
        let policy = Self { jitter, ..self };
        if let Err(err) = policy.check_jitter() {
            panic!("{err}");
        }
        policy
    }

    /// Check the policy for values the backoff cannot walk.
    ///
    /// The retry interceptor runs this before the first attempt and fails the
    /// call with `InvalidArgument` when it does not hold.
    pub fn validate(&self) -> Result<(), InvalidBackoff> {
        if self.base_delay > self.max_delay {
            return Err(InvalidBackoff("base_delay must not exceed max_delay"));
        }
        self.check_multiplier()?;
        self.check_jitter()
    }

    fn check_multiplier(&self) -> Result<(), InvalidBackoff> {
        if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            Ok(())
        } else {
            Err(InvalidBackoff("multiplier must be >= 1.0"))
        }
    }

    fn check_jitter(&self) -> Result<(), InvalidBackoff> {
        if (0.0..=1.0).contains(&self.jitter) {
            Ok(())
        } else {
            Err(InvalidBackoff("jitter must be between 0.0 and 1.0"))
        }
    }

    /// Start walking this policy.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.clone())
    }
}

/// A [`BackoffPolicy`] that failed [`BackoffPolicy::validate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid backoff policy: {0}")]
pub struct InvalidBackoff(&'static str);

/// Backoff state of one call.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    attempts: u32,
}

impl ExponentialBackoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Number of delays handed out so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The delay before the next retry.
    pub fn next_delay(&mut self) -> Duration {
        let exponent = i32::try_from(self.attempts).unwrap_or(i32::MAX);
        self.attempts = self.attempts.saturating_add(1);

        let cap = self.policy.max_delay.as_secs_f64();
        let raw = (self.policy.base_delay.as_secs_f64() * self.policy.multiplier.powi(exponent))
            .min(cap);

        let spread = if self.policy.jitter > 0.0 {
            rand::random_range(-self.policy.jitter..=self.policy.jitter)
        } else {
            0.0
        };

        Duration::from_secs_f64((raw * (1.0 + spread)).clamp(0.0, cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_policy_default() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_millis(50));
        assert!((policy.multiplier - 1.6).abs() < f64::EPSILON);
        assert!((policy.jitter - 0.2).abs() < f64::EPSILON);
        assert_eq!(policy.max_delay, Duration::from_secs(1));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_backoff_policy_validate() {
        let inverted = BackoffPolicy {
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(1),
            ..Default::default()
        };
        assert_eq!(
            inverted.validate().unwrap_err().to_string(),
            "invalid backoff policy: base_delay must not exceed max_delay"
        );

        let shrinking = BackoffPolicy {
            multiplier: 0.5,
            ..Default::default()
        };
        assert!(shrinking.validate().is_err());

        let wild = BackoffPolicy {
            jitter: -0.1,
            ..Default::default()
        };
        assert!(wild.validate().is_err());
    }

    #[test]
    #[should_panic(expected = "multiplier must be >= 1.0")]
    fn test_backoff_policy_invalid_multiplier() {
        BackoffPolicy::new().multiplier(0.5);
    }

    #[test]
    #[should_panic(expected = "jitter must be between 0.0 and 1.0")]
    fn test_backoff_policy_invalid_jitter() {
        BackoffPolicy::new().jitter(1.5);
    }

    #[test]
    fn test_exponential_backoff_no_jitter() {
        let mut backoff = BackoffPolicy::new()
            .base_delay(Duration::from_secs(1))
            .multiplier(2.0)
            .max_delay(Duration::from_secs(100))
            .jitter(0.0)
            .backoff();

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_exponential_backoff_max_delay_clamping() {
        let mut backoff = BackoffPolicy::new()
            .base_delay(Duration::from_secs(10))
            .multiplier(10.0)
            .max_delay(Duration::from_secs(15))
            .jitter(0.0)
            .backoff();

        assert_eq!(backoff.next_delay(), Duration::from_secs(10));
        assert_eq!(backoff.next_delay(), Duration::from_secs(15));
        assert_eq!(backoff.next_delay(), Duration::from_secs(15));
    }

    #[test]
    fn test_exponential_backoff_with_jitter() {
        let mut backoff = BackoffPolicy::new()
            .base_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(100))
            .jitter(0.2)
            .backoff();

        let delay = backoff.next_delay();
        assert!(delay >= Duration::from_millis(800));
        assert!(delay <= Duration::from_millis(1200));
    }

    #[test]
    fn test_constant_backoff() {
        let mut backoff = BackoffPolicy::constant(Duration::from_millis(5)).backoff();
        assert_eq!(backoff.next_delay(), Duration::from_millis(5));
        assert_eq!(backoff.next_delay(), Duration::from_millis(5));
    }
}
