//! # Link-Loss Failsafe
//!
//! Two-state machine polled once per host tick.
//!
//! ```text
//!            gap > timeout / send failsafe
//!   LinkOk ------------------------------> LinkLost
//!          <------------------------------
//!            gap <= timeout / log recovery
//! ```
//!
//! Both edges fire once. Polling while the condition is unchanged does nothing,
//! so a link that stays down produces exactly one command. A failed send still
//! counts as sent; the next command can only follow a recovery.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use super::command::CommandChannel;
use crate::error::{RelayError, Result};

/// Link state derived from heartbeat freshness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Ok,
    Lost,
}

/// Transition observed by a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogEvent {
    /// No transition.
    Unchanged,
    /// Heartbeat timed out; failsafe issued.
    LinkLost,
    /// Heartbeat resumed after a loss.
    LinkRestored,
}

#[derive(Debug)]
struct WatchdogState {
    last_heartbeat_at: Instant,
    failsafe_sent: bool,
}

/// Heartbeat watchdog driving the failsafe command.
///
/// Heartbeat updates and polls may come from different tasks; both go through
/// an internal lock that is never held across the command send.
#[derive(Debug)]
pub struct Watchdog<C> {
    timeout: Duration,
    state: Mutex<WatchdogState>,
    channel: C,
}

impl<C: CommandChannel> Watchdog<C> {
    /// Create a watchdog whose heartbeat clock starts now.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Config` if `timeout` is zero.
    pub fn new(timeout: Duration, channel: C) -> Result<Self> {
        Self::starting_at(timeout, channel, Instant::now())
    }

    /// Create a watchdog whose heartbeat clock starts at `started_at`.
    pub fn starting_at(timeout: Duration, channel: C, started_at: Instant) -> Result<Self> {
        if timeout.is_zero() {
            return Err(RelayError::Config(
                "heartbeat timeout must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            timeout,
            state: Mutex::new(WatchdogState {
                last_heartbeat_at: started_at,
                failsafe_sent: false,
            }),
            channel,
        })
    }

    /// Record a heartbeat observed at `at`. Older timestamps are ignored.
    pub fn record_heartbeat(&self, at: Instant) {
        let mut state = self.lock();
        if at > state.last_heartbeat_at {
            state.last_heartbeat_at = at;
        }
    }

    /// Evaluate the link at `now` and fire at most one transition.
    pub async fn poll(&self, now: Instant) -> WatchdogEvent {
        let event = {
            let mut state = self.lock();
            let gap = now.saturating_duration_since(state.last_heartbeat_at);
            let timed_out = gap > self.timeout;

            match (timed_out, state.failsafe_sent) {
                (true, false) => {
                    state.failsafe_sent = true;
                    warn!(
                        gap_ms = gap.as_millis() as u64,
                        "No heartbeat from ground station, link lost"
                    );
                    WatchdogEvent::LinkLost
                }
                (false, true) => {
                    state.failsafe_sent = false;
                    info!("Ground station heartbeat resumed, link restored");
                    WatchdogEvent::LinkRestored
                }
                _ => WatchdogEvent::Unchanged,
            }
        };

        if event == WatchdogEvent::LinkLost {
            match self.channel.send_failsafe().await {
                Ok(()) => info!("Failsafe disarm command sent"),
                Err(e) => error!("Failed to send failsafe command: {}", e),
            }
        }

        event
    }

    pub fn link_state(&self) -> LinkState {
        if self.lock().failsafe_sent {
            LinkState::Lost
        } else {
            LinkState::Ok
        }
    }

    pub fn failsafe_sent(&self) -> bool {
        self.lock().failsafe_sent
    }

    fn lock(&self) -> MutexGuard<'_, WatchdogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchdog::command::MockCommandChannel;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn channel_expecting(times: usize) -> MockCommandChannel {
        let mut channel = MockCommandChannel::new();
        channel.expect_send_failsafe().times(times).returning(|| Ok(()));
        channel
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = Watchdog::new(Duration::ZERO, MockCommandChannel::new());
        assert!(matches!(result, Err(RelayError::Config(_))));
    }

    #[tokio::test]
    async fn test_starts_link_ok() {
        let start = Instant::now();
        let watchdog = Watchdog::starting_at(TIMEOUT, channel_expecting(0), start).unwrap();

        assert_eq!(watchdog.link_state(), LinkState::Ok);
        assert_eq!(watchdog.poll(start + Duration::from_secs(1)).await, WatchdogEvent::Unchanged);
        assert!(!watchdog.failsafe_sent());
    }

    #[tokio::test]
    async fn test_gap_equal_to_timeout_is_not_loss() {
        let start = Instant::now();
        let watchdog = Watchdog::starting_at(TIMEOUT, channel_expecting(0), start).unwrap();

        assert_eq!(watchdog.poll(start + TIMEOUT).await, WatchdogEvent::Unchanged);
        assert_eq!(watchdog.link_state(), LinkState::Ok);
    }

    #[tokio::test]
    async fn test_timeout_sends_failsafe_exactly_once() {
        let start = Instant::now();
        let watchdog = Watchdog::starting_at(TIMEOUT, channel_expecting(1), start).unwrap();

        let lost_at = start + TIMEOUT + Duration::from_millis(1);
        assert_eq!(watchdog.poll(lost_at).await, WatchdogEvent::LinkLost);
        assert_eq!(watchdog.link_state(), LinkState::Lost);

        for i in 1..50u64 {
            let event = watchdog.poll(lost_at + Duration::from_millis(100 * i)).await;
            assert_eq!(event, WatchdogEvent::Unchanged);
        }
        assert!(watchdog.failsafe_sent());
    }

    #[tokio::test]
    async fn test_heartbeat_restores_link_without_command() {
        let start = Instant::now();
        let watchdog = Watchdog::starting_at(TIMEOUT, channel_expecting(1), start).unwrap();

        let lost_at = start + Duration::from_secs(6);
        assert_eq!(watchdog.poll(lost_at).await, WatchdogEvent::LinkLost);

        let heartbeat_at = lost_at + Duration::from_secs(1);
        watchdog.record_heartbeat(heartbeat_at);
        assert_eq!(
            watchdog.poll(heartbeat_at + Duration::from_millis(10)).await,
            WatchdogEvent::LinkRestored
        );
        assert_eq!(watchdog.link_state(), LinkState::Ok);
        assert!(!watchdog.failsafe_sent());

        assert_eq!(
            watchdog.poll(heartbeat_at + Duration::from_millis(20)).await,
            WatchdogEvent::Unchanged
        );
    }

    #[tokio::test]
    async fn test_second_loss_episode_sends_again() {
        let start = Instant::now();
        let watchdog = Watchdog::starting_at(TIMEOUT, channel_expecting(2), start).unwrap();

        assert_eq!(watchdog.poll(start + Duration::from_secs(6)).await, WatchdogEvent::LinkLost);

        let heartbeat_at = start + Duration::from_secs(7);
        watchdog.record_heartbeat(heartbeat_at);
        assert_eq!(watchdog.poll(heartbeat_at).await, WatchdogEvent::LinkRestored);

        assert_eq!(
            watchdog.poll(heartbeat_at + Duration::from_secs(6)).await,
            WatchdogEvent::LinkLost
        );
    }

    #[tokio::test]
    async fn test_regular_heartbeats_keep_link_ok() {
        let start = Instant::now();
        let watchdog = Watchdog::starting_at(TIMEOUT, channel_expecting(0), start).unwrap();

        for second in 1..=60u64 {
            let now = start + Duration::from_secs(second);
            watchdog.record_heartbeat(now);
            assert_eq!(watchdog.poll(now).await, WatchdogEvent::Unchanged);
        }
    }

    #[tokio::test]
    async fn test_failed_send_still_counts_as_sent() {
        let mut channel = MockCommandChannel::new();
        channel
            .expect_send_failsafe()
            .times(1)
            .returning(|| Err(RelayError::Transport("link down".to_string())));

        let start = Instant::now();
        let watchdog = Watchdog::starting_at(TIMEOUT, channel, start).unwrap();

        let lost_at = start + Duration::from_secs(6);
        assert_eq!(watchdog.poll(lost_at).await, WatchdogEvent::LinkLost);
        assert!(watchdog.failsafe_sent());
        assert_eq!(watchdog.poll(lost_at + Duration::from_secs(1)).await, WatchdogEvent::Unchanged);
    }

    #[tokio::test]
    async fn test_stale_heartbeat_does_not_rewind_clock() {
        let start = Instant::now();
        let watchdog = Watchdog::starting_at(TIMEOUT, channel_expecting(0), start).unwrap();

        watchdog.record_heartbeat(start + Duration::from_secs(4));
        watchdog.record_heartbeat(start + Duration::from_secs(1));
        assert_eq!(watchdog.poll(start + Duration::from_secs(8)).await, WatchdogEvent::Unchanged);
    }
}
