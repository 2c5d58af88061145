//! Stability polling
//!
//! The backend accumulates export requests as they arrive and offers no
//! completion signal. Delivery is considered finished once two consecutive
//! fetches return payloads of the same length.
//!
//! Length equality stands in for content equality, so two different payloads
//! that happen to have the same length are accepted as stable.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::config::StabilityConfig;
use crate::error::Result;

/// Encoding of an empty export collection
pub const EMPTY_PAYLOAD: &str = "[]";

/// Stand-in for deadlines too far away to represent, roughly 30 years
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + timeout`, saturating to a far-future instant instead of
/// overflowing
pub(crate) fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// When to consider the accumulated payload complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilityPolicy {
    /// Payloads of this length or shorter never count as stable
    pub min_length: usize,
    /// Stop polling after this long and return whatever was last fetched
    pub deadline: Duration,
    /// Delay between fetches
    pub poll_interval: Duration,
}

impl Default for StabilityPolicy {
    fn default() -> Self {
        Self {
            min_length: EMPTY_PAYLOAD.len(),
            deadline: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl From<&StabilityConfig> for StabilityPolicy {
    fn from(config: &StabilityConfig) -> Self {
        Self {
            min_length: config.min_length,
            deadline: config.deadline,
            poll_interval: config.poll_interval,
        }
    }
}

impl StabilityPolicy {
    /// Override the deadline
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Override the poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Override the minimum length
    #[must_use]
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }
}

/// The payload a poll loop settled on
#[derive(Debug, Clone)]
pub struct StableContent {
    /// Last fetched payload
    pub content: String,
    /// `false` when the deadline passed before the payload stopped growing
    pub stable: bool,
    /// Number of fetches performed
    pub attempts: u32,
    /// Time spent polling
    pub elapsed: Duration,
}

/// Per-invocation loop state
#[derive(Debug)]
struct PollState {
    last_observed_size: Option<usize>,
    deadline: Instant,
    attempts: u32,
}

impl PollState {
    fn new(deadline: Instant) -> Self {
        Self {
            last_observed_size: None,
            deadline,
            attempts: 0,
        }
    }

    /// Record a fetched size and report whether it matches the previous one.
    /// The first observation is only a baseline.
    fn observe(&mut self, size: usize, min_length: usize) -> bool {
        self.attempts += 1;
        let stable = size > min_length && self.last_observed_size == Some(size);
        self.last_observed_size = Some(size);
        stable
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Fetch the accumulated payload until its length stops changing.
///
/// Returns the stable payload, or the last fetched payload once
/// `policy.deadline` passes (`stable == false`). Running out of time is not an
/// error: an incomplete payload surfaces through the assertions made on it.
/// Errors returned by `fetch` end the loop and propagate unchanged.
pub async fn await_stable_content<F, Fut>(
    mut fetch: F,
    policy: &StabilityPolicy,
) -> Result<StableContent>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let started = Instant::now();
    let mut state = PollState::new(deadline_after(started, policy.deadline));
    let mut content = EMPTY_PAYLOAD.to_string();

    while !state.expired() {
        content = fetch().await?;
        let size = content.len();

        if state.observe(size, policy.min_length) {
            debug!(size, attempts = state.attempts, "Content stable");
            return Ok(StableContent {
                content,
                stable: true,
                attempts: state.attempts,
                elapsed: started.elapsed(),
            });
        }

        debug!(size, attempts = state.attempts, "Current content size");
        sleep(policy.poll_interval).await;
    }

    warn!(
        size = content.len(),
        attempts = state.attempts,
        deadline = ?policy.deadline,
        "Content did not stabilize before the deadline, using last fetched payload"
    );

    Ok(StableContent {
        content,
        stable: false,
        attempts: state.attempts,
        elapsed: started.elapsed(),
    })
}
