//! Bounded retry on soft (acknowledgement-level) failure.
//!
//! Only a response whose acknowledgement fails the success predicate is
//! retried. An `Err` from the operation (transport trouble, usage errors)
//! propagates immediately. Attempts are strictly sequential and there is no
//! delay between them.

use std::future::Future;

use crate::ack::{AckCode, Acknowledged};

/// Retry configuration for one operation family.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first (default: 2, i.e. 3 calls total).
    pub max_retries: u32,
    /// Decides whether an acknowledgement counts as success.
    pub success: fn(AckCode) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            success: AckCode::is_success,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Upper bound on the number of calls made.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    #[must_use]
    pub fn is_satisfied(&self, ack: AckCode) -> bool {
        (self.success)(ack)
    }
}

/// Retry state machine: `Init -> Attempted -> {Success, Retrying, GivenUp}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Init,
    Attempted,
    Success,
    Retrying,
    GivenUp,
}

impl RetryState {
    /// Evaluates an attempt. `attempts` counts calls made so far, including
    /// the one being evaluated.
    #[must_use]
    pub fn after_attempt(policy: &RetryPolicy, ack: AckCode, attempts: u32) -> Self {
        if policy.is_satisfied(ack) {
            Self::Success
        } else if attempts <= policy.max_retries {
            Self::Retrying
        } else {
            Self::GivenUp
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::GivenUp)
    }
}

/// The last response of a retry sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T> {
    /// The final response, returned unchanged even when unsuccessful.
    pub value: T,
    /// Total number of calls made.
    pub attempts: u32,
    /// Either [`RetryState::Success`] or [`RetryState::GivenUp`].
    pub state: RetryState,
}

impl<T> RetryOutcome<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == RetryState::Success
    }
}

/// Wraps one logical operation in the bounded retry loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryingCaller {
    policy: RetryPolicy,
}

impl RetryingCaller {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` until its acknowledgement satisfies the policy or the
    /// retry budget is spent.
    ///
    /// A given-up sequence is *not* an error: the last response is handed
    /// back for the caller to interpret.
    ///
    /// # Errors
    ///
    /// Returns the operation's error as soon as any attempt fails with `Err`.
    pub async fn call<T, E, F, Fut>(&self, mut operation: F) -> Result<RetryOutcome<T>, E>
    where
        T: Acknowledged,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let value = operation().await?;
            let ack = value.ack();

            match RetryState::after_attempt(&self.policy, ack, attempts) {
                RetryState::Success => {
                    if attempts > 1 {
                        tracing::info!(attempts, "operation acknowledged after retry");
                    }
                    return Ok(RetryOutcome {
                        value,
                        attempts,
                        state: RetryState::Success,
                    });
                }
                RetryState::GivenUp => {
                    tracing::warn!(
                        attempts,
                        ack = ack.as_str(),
                        error = value.error_message().unwrap_or_default(),
                        "giving up after unsuccessful acknowledgements"
                    );
                    return Ok(RetryOutcome {
                        value,
                        attempts,
                        state: RetryState::GivenUp,
                    });
                }
                RetryState::Init | RetryState::Attempted | RetryState::Retrying => {
                    tracing::warn!(
                        attempt = attempts,
                        max_attempts = self.policy.max_attempts(),
                        ack = ack.as_str(),
                        "unsuccessful acknowledgement, retrying"
                    );
                }
            }
        }
    }
}
