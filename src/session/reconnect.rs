//! Reconnect policy: classifies closes and paces reconnect attempts.

use crate::config::ReconnectConfig;
use crate::events::DisconnectReason;
use serde::Serialize;
use std::time::Duration;

/// Why the policy stopped reconnecting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FinalReason {
    LoggedOut,
    RetriesExhausted,
}

/// Observable policy state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ReconnectState {
    #[serde(rename_all = "camelCase")]
    Connecting { attempt: u32 },
    Open,
    #[serde(rename_all = "camelCase")]
    ClosedRetry {
        attempt: u32,
        delay_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },
    #[serde(rename_all = "camelCase")]
    ClosedFinal {
        reason: FinalReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },
}

impl ReconnectState {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::ClosedFinal { .. })
    }
}

/// What to do after a close.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Run the bootstrapper once after `after`.
    Reconnect { after: Duration, attempt: u32 },
    /// Stop; no further bootstrap.
    Halt(FinalReason),
    /// Already final; nothing to do.
    Ignore,
}

/// Capped exponential backoff with an optional attempt limit.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    state: ReconnectState,
    failures: u32,
    next_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        let next_delay = config.initial_delay();
        Self {
            config,
            state: ReconnectState::Connecting { attempt: 0 },
            failures: 0,
            next_delay,
        }
    }

    pub fn state(&self) -> &ReconnectState {
        &self.state
    }

    /// A connection attempt started.
    pub fn on_connecting(&mut self) {
        if !self.state.is_final() {
            self.state = ReconnectState::Connecting {
                attempt: self.failures,
            };
        }
    }

    /// Handshake completed: backoff starts over.
    pub fn on_open(&mut self) {
        self.failures = 0;
        self.next_delay = self.config.initial_delay();
        self.state = ReconnectState::Open;
    }

    /// The connection closed (or could not be established) with `status_code`.
    pub fn on_close(&mut self, status_code: Option<u16>) -> Decision {
        if self.state.is_final() {
            return Decision::Ignore;
        }
        let logged_out = status_code
            .and_then(DisconnectReason::from_code)
            .is_some_and(DisconnectReason::is_logged_out);
        if logged_out {
            return self.finish(FinalReason::LoggedOut, status_code);
        }

        self.failures += 1;
        if self
            .config
            .max_attempts
            .is_some_and(|max| self.failures > max)
        {
            return self.finish(FinalReason::RetriesExhausted, status_code);
        }

        let delay = self.next_delay;
        self.next_delay = self.grow(delay);
        self.state = ReconnectState::ClosedRetry {
            attempt: self.failures,
            delay_ms: delay.as_millis() as u64,
            status_code,
        };
        Decision::Reconnect {
            after: delay,
            attempt: self.failures,
        }
    }

    /// Next delay after `delay`, capped. Non-finite or overflowing products saturate at the cap.
    fn grow(&self, delay: Duration) -> Duration {
        let max = self.config.max_delay();
        let factor = self.config.factor.max(1.0);
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
            .unwrap_or(max)
            .min(max)
    }

    fn finish(&mut self, reason: FinalReason, status_code: Option<u16>) -> Decision {
        self.state = ReconnectState::ClosedFinal {
            reason,
            status_code,
        };
        Decision::Halt(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: Option<u32>) -> ReconnectPolicy {
        ReconnectPolicy::new(ReconnectConfig {
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            factor: 2.0,
            max_attempts,
        })
    }

    fn delay_of(d: Decision) -> u64 {
        match d {
            Decision::Reconnect { after, .. } => after.as_millis() as u64,
            other => panic!("expected reconnect, got {:?}", other),
        }
    }

    #[test]
    fn logged_out_is_final() {
        let mut p = policy(None);
        p.on_open();
        assert_eq!(p.on_close(Some(401)), Decision::Halt(FinalReason::LoggedOut));
        assert!(p.state().is_final());
        assert_eq!(p.on_close(Some(428)), Decision::Ignore);
        p.on_connecting();
        assert!(p.state().is_final());
    }

    #[test]
    fn every_other_code_reconnects() {
        for code in [Some(428), Some(408), Some(440), Some(500), Some(515), Some(999), None] {
            let mut p = policy(None);
            assert!(
                matches!(p.on_close(code), Decision::Reconnect { attempt: 1, .. }),
                "code {:?}",
                code
            );
        }
    }

    #[test]
    fn backoff_doubles_up_to_cap_and_resets_on_open() {
        let mut p = policy(None);
        let delays: Vec<u64> = (0..6).map(|_| delay_of(p.on_close(Some(428)))).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000]);

        p.on_open();
        assert_eq!(p.state(), &ReconnectState::Open);
        assert_eq!(delay_of(p.on_close(Some(428))), 100);
    }

    #[test]
    fn huge_or_invalid_factor_saturates_at_cap() {
        for factor in [1e20, f64::INFINITY, f64::NAN, -3.0] {
            let mut p = ReconnectPolicy::new(ReconnectConfig {
                initial_delay_ms: 2_000,
                max_delay_ms: 30_000,
                factor,
                max_attempts: None,
            });
            let delays: Vec<u64> = (0..3).map(|_| delay_of(p.on_close(Some(428)))).collect();
            assert_eq!(delays[0], 2_000, "factor {}", factor);
            assert!(delays.iter().all(|d| *d <= 30_000), "factor {}", factor);
        }
    }

    #[test]
    fn attempt_limit_surfaces_terminal_state() {
        let mut p = policy(Some(2));
        assert!(matches!(p.on_close(None), Decision::Reconnect { attempt: 1, .. }));
        assert!(matches!(p.on_close(None), Decision::Reconnect { attempt: 2, .. }));
        assert_eq!(
            p.on_close(None),
            Decision::Halt(FinalReason::RetriesExhausted)
        );
        assert_eq!(
            p.state(),
            &ReconnectState::ClosedFinal {
                reason: FinalReason::RetriesExhausted,
                status_code: None
            }
        );
    }

    #[test]
    fn state_serializes_with_tag() {
        let mut p = policy(None);
        p.on_close(Some(428));
        let v = serde_json::to_value(p.state()).unwrap();
        assert_eq!(v["state"], "closedRetry");
        assert_eq!(v["attempt"], 1);
        assert_eq!(v["delayMs"], 100);
        assert_eq!(v["statusCode"], 428);
    }
}
