//! Single join attempt.
//!
//! Requests the join once, then samples the link status until a terminal
//! status shows up or the wait bound runs out. The attempt is tick-driven:
//! [`ConnectionAttempt::poll`] performs one sample without sleeping, and
//! [`ConnectionAttempt::run`] drives it with a blocking sleep between ticks.

use super::{ConnectionOutcome, Station};
use crate::config::Credential;
use log::{debug, info, warn};
use std::time::Duration;

/// Default interval between status samples.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default upper bound on a single attempt, in seconds.
pub const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Timing for a join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptConfig {
    /// Sleep between status samples.
    pub poll_interval: Duration,
    /// Give up after this much polling.
    pub max_wait: Duration,
}

impl AttemptConfig {
    /// Number of samples taken before the attempt times out (at least 1).
    pub fn max_polls(&self) -> u32 {
        let polls = if self.poll_interval.is_zero() {
            self.max_wait.as_millis()
        } else {
            self.max_wait.as_nanos() / self.poll_interval.as_nanos()
        };
        polls.clamp(1, u32::MAX as u128) as u32
    }
}

impl Default for AttemptConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Polling,
    Done(ConnectionOutcome),
}

/// Join attempt state machine for one credential.
pub struct ConnectionAttempt {
    credential: Credential,
    config: AttemptConfig,
    polls: u32,
    phase: Phase,
}

impl ConnectionAttempt {
    /// Prepare an attempt. Nothing is sent to the radio yet.
    pub fn new(credential: &Credential, config: AttemptConfig) -> Self {
        Self {
            credential: credential.clone(),
            config,
            polls: 0,
            phase: Phase::Idle,
        }
    }

    /// Network this attempt targets.
    pub fn ssid(&self) -> &str {
        self.credential.ssid()
    }

    /// Outcome, once the attempt has finished.
    pub fn outcome(&self) -> Option<ConnectionOutcome> {
        match self.phase {
            Phase::Done(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Status samples taken so far.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Request the join.
    ///
    /// Returns an outcome right away if the radio refuses the request.
    pub fn begin<S: Station + ?Sized>(&mut self, station: &mut S) -> Option<ConnectionOutcome> {
        if self.phase != Phase::Idle {
            return self.outcome();
        }

        info!(
            "Trying \"{}\" ({})",
            self.credential.ssid(),
            if self.credential.is_open() {
                "open"
            } else {
                "secured"
            }
        );

        match station.join(self.credential.ssid(), self.credential.password()) {
            Ok(()) => {
                self.phase = Phase::Polling;
                None
            }
            Err(e) => {
                warn!("Join request for \"{}\" failed: {}", self.credential.ssid(), e);
                Some(self.finish(ConnectionOutcome::NoAdapter))
            }
        }
    }

    /// Take one status sample.
    ///
    /// Returns the outcome once a terminal status is seen or the wait bound
    /// is exhausted; `None` means keep polling.
    pub fn poll<S: Station + ?Sized>(&mut self, station: &mut S) -> Option<ConnectionOutcome> {
        match self.phase {
            Phase::Idle => return self.begin(station),
            Phase::Done(outcome) => return Some(outcome),
            Phase::Polling => {}
        }

        self.polls += 1;
        let status = station.status();
        debug!(
            "\"{}\" poll {}/{}: {:?}",
            self.credential.ssid(),
            self.polls,
            self.config.max_polls(),
            status
        );

        if let Some(outcome) = status.outcome() {
            return Some(self.finish(outcome));
        }

        if self.polls >= self.config.max_polls() {
            if let Err(e) = station.disconnect() {
                warn!("Failed to abort join of \"{}\": {}", self.credential.ssid(), e);
            }
            return Some(self.finish(ConnectionOutcome::TimedOut));
        }

        None
    }

    /// Run the attempt to completion, sleeping between samples.
    pub fn run<S: Station + ?Sized>(mut self, station: &mut S) -> ConnectionOutcome {
        if let Some(outcome) = self.begin(station) {
            return outcome;
        }
        loop {
            std::thread::sleep(self.config.poll_interval);
            if let Some(outcome) = self.poll(station) {
                return outcome;
            }
        }
    }

    fn finish(&mut self, outcome: ConnectionOutcome) -> ConnectionOutcome {
        self.phase = Phase::Done(outcome);
        if outcome.is_joined() {
            info!("Connected to \"{}\"", self.credential.ssid());
        } else {
            warn!("\"{}\": {}", self.credential.ssid(), outcome);
        }
        outcome
    }
}

/// Run one blocking join attempt.
pub fn attempt<S: Station + ?Sized>(
    station: &mut S,
    credential: &Credential,
    config: AttemptConfig,
) -> ConnectionOutcome {
    ConnectionAttempt::new(credential, config).run(station)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wifi::{LinkStatus, RadioError};
    use std::collections::VecDeque;

    /// Station replaying a fixed sequence of statuses.
    struct ScriptedStation {
        statuses: VecDeque<LinkStatus>,
        fallback: LinkStatus,
        refuse_join: bool,
        joins: Vec<String>,
        disconnects: usize,
    }

    impl ScriptedStation {
        fn new(statuses: &[LinkStatus], fallback: LinkStatus) -> Self {
            Self {
                statuses: statuses.iter().copied().collect(),
                fallback,
                refuse_join: false,
                joins: Vec::new(),
                disconnects: 0,
            }
        }
    }

    impl Station for ScriptedStation {
        fn join(&mut self, ssid: &str, _password: &str) -> Result<(), RadioError> {
            if self.refuse_join {
                return Err(RadioError::Unavailable("radio off".into()));
            }
            self.joins.push(ssid.to_string());
            Ok(())
        }

        fn status(&mut self) -> LinkStatus {
            self.statuses.pop_front().unwrap_or(self.fallback)
        }

        fn disconnect(&mut self) -> Result<(), RadioError> {
            self.disconnects += 1;
            Ok(())
        }
    }

    fn fast() -> AttemptConfig {
        AttemptConfig {
            poll_interval: Duration::from_millis(1),
            max_wait: Duration::from_millis(20),
        }
    }

    fn credential() -> Credential {
        Credential::new("home", "password123").unwrap()
    }

    // ==================== Config Tests ====================

    #[test]
    fn test_default_config() {
        let config = AttemptConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.max_polls(), 60);
    }

    #[test]
    fn test_max_polls_at_least_one() {
        let config = AttemptConfig {
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(1),
        };
        assert_eq!(config.max_polls(), 1);
    }

    #[test]
    fn test_max_polls_zero_interval() {
        let config = AttemptConfig {
            poll_interval: Duration::ZERO,
            max_wait: Duration::from_millis(5),
        };
        assert_eq!(config.max_polls(), 5);
    }

    // ==================== Attempt Tests ====================

    #[test]
    fn test_joined_after_negotiation() {
        let mut station = ScriptedStation::new(
            &[
                LinkStatus::Disconnected,
                LinkStatus::Unknown,
                LinkStatus::Disconnected,
                LinkStatus::Connected,
            ],
            LinkStatus::Disconnected,
        );
        let outcome = attempt(&mut station, &credential(), fast());
        assert_eq!(outcome, ConnectionOutcome::Joined);
        assert_eq!(station.joins, vec!["home"]);
    }

    #[test]
    fn test_join_requested_once() {
        let mut station = ScriptedStation::new(
            &[LinkStatus::Disconnected; 5],
            LinkStatus::ConnectFailed,
        );
        let outcome = attempt(&mut station, &credential(), fast());
        assert_eq!(outcome, ConnectionOutcome::AuthRejected);
        assert_eq!(station.joins.len(), 1);
    }

    #[test]
    fn test_terminal_failures() {
        for (status, expected) in [
            (LinkStatus::NoAdapter, ConnectionOutcome::NoAdapter),
            (LinkStatus::NoSuchNetwork, ConnectionOutcome::NoSuchNetwork),
            (LinkStatus::ConnectionLost, ConnectionOutcome::LinkLost),
        ] {
            let mut station = ScriptedStation::new(&[status], LinkStatus::Disconnected);
            assert_eq!(attempt(&mut station, &credential(), fast()), expected);
            assert_eq!(station.disconnects, 0);
        }
    }

    #[test]
    fn test_unknown_status_times_out() {
        let mut station = ScriptedStation::new(&[], LinkStatus::Unknown);
        let outcome = attempt(&mut station, &credential(), fast());
        assert_eq!(outcome, ConnectionOutcome::TimedOut);
        assert_eq!(station.disconnects, 1);
    }

    #[test]
    fn test_refused_join_is_no_adapter() {
        let mut station = ScriptedStation::new(&[], LinkStatus::Connected);
        station.refuse_join = true;
        let outcome = attempt(&mut station, &credential(), fast());
        assert_eq!(outcome, ConnectionOutcome::NoAdapter);
    }

    #[test]
    fn test_tick_driven_polling() {
        let mut station = ScriptedStation::new(
            &[LinkStatus::Disconnected, LinkStatus::Connected],
            LinkStatus::Disconnected,
        );
        let mut attempt = ConnectionAttempt::new(&credential(), fast());

        assert_eq!(attempt.begin(&mut station), None);
        assert_eq!(attempt.poll(&mut station), None);
        assert_eq!(attempt.poll(&mut station), Some(ConnectionOutcome::Joined));
        assert_eq!(attempt.polls(), 2);

        // Finished attempts stay finished
        assert_eq!(attempt.poll(&mut station), Some(ConnectionOutcome::Joined));
        assert_eq!(attempt.outcome(), Some(ConnectionOutcome::Joined));
        assert_eq!(station.joins.len(), 1);
    }

    #[test]
    fn test_timeout_after_max_polls() {
        let config = AttemptConfig {
            poll_interval: Duration::from_millis(1),
            max_wait: Duration::from_millis(3),
        };
        let mut station = ScriptedStation::new(&[], LinkStatus::Disconnected);
        let mut attempt = ConnectionAttempt::new(&credential(), config);

        attempt.begin(&mut station);
        assert_eq!(attempt.poll(&mut station), None);
        assert_eq!(attempt.poll(&mut station), None);
        assert_eq!(
            attempt.poll(&mut station),
            Some(ConnectionOutcome::TimedOut)
        );
    }
}
