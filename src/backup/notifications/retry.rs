use crate::backup::notifications::smtp::SmtpNotificationConfig;
use crate::backup::notifications::Notification;
use crate::backup::result_error::result::Result;
use bon::Builder;
use getset::Getters;
use std::fmt::Display;
use std::time::Duration;
use tracing::debug;

/// Growth factor between two consecutive backoff delays.
pub static BACKOFF_FACTOR: u32 = 3;

/// Bounded retry with exponential backoff: `base_delay * 3^(attempt - 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Builder, Getters)]
#[getset(get = "pub")]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        BACKOFF_FACTOR
            .checked_pow(attempt.saturating_sub(1))
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }
}

impl From<&SmtpNotificationConfig> for RetryPolicy {
    fn from(config: &SmtpNotificationConfig) -> Self {
        RetryPolicy::builder()
            .max_attempts(*config.max_try())
            .base_delay(*config.retry_base_delay())
            .build()
    }
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration)
    }
}

/// Delivers messages over `channel`, retrying per `policy`.
#[derive(Getters)]
#[getset(get = "pub")]
pub struct NotificationDispatcher<N, S = ThreadSleeper> {
    channel: N,
    policy: RetryPolicy,
    sleeper: S,
}

impl<N: Notification> NotificationDispatcher<N> {
    pub fn new(channel: N, policy: RetryPolicy) -> Self {
        Self::with_sleeper(channel, policy, ThreadSleeper)
    }
}

impl<N: Notification, S: Sleeper> NotificationDispatcher<N, S> {
    pub fn with_sleeper(channel: N, policy: RetryPolicy, sleeper: S) -> Self {
        Self {
            channel,
            policy,
            sleeper,
        }
    }

    /// Stops at the first successful attempt. After the last failed attempt its
    /// error is returned as is, without waiting.
    pub fn dispatch<D1: Display, D2: Display>(&self, topic: D1, msg: D2) -> Result<()> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.channel.send(&topic, &msg) {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.policy.backoff(attempt);
                    debug!(
                        "Error sending notification, try {}/{}, retrying in {:?} ({})",
                        attempt, max_attempts, delay, e
                    );
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}
