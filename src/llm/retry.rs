// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Retry and fallback policy for chat requests
//!
//! Retries back off linearly: retry `n` waits `retry_delay_ms * n`. Once the
//! retry budget is spent the session escalates to the provider's fallback
//! model, which gets exactly one attempt.

use std::time::Duration;

use crate::config::settings::ResilienceConfig;
use crate::error::ErrorClass;

/// Retry configuration with smart defaults
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Automatic retries before escalation
    pub max_retries: u32,
    /// Base delay in milliseconds (linearly increased)
    pub retry_delay_ms: u64,
    /// Delay before the fallback attempt
    pub fallback_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&ResilienceConfig::default())
    }
}

impl From<&ResilienceConfig> for RetryConfig {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
            fallback_delay_ms: config.fallback_delay_ms,
        }
    }
}

impl RetryConfig {
    /// Delay before the `attempt`-th retry (1-based)
    pub fn linear_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_delay_ms.saturating_mul(attempt.max(1) as u64))
    }

    /// Delay before reconnecting after a dropped connection
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Delay before the fallback attempt
    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }
}

/// What the controller should do about a failed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Resend the same request on the same model
    Retry {
        delay: Duration,
        /// Retry counter after this failure
        retries: u32,
        /// The failure was a dropped connection
        reconnect: bool,
    },
    /// Switch to the fallback model and resend once
    Fallback {
        model: String,
        delay: Duration,
        retries: u32,
    },
    /// Give up and show the error to the user
    Surface {
        retries: u32,
        fallback_available: bool,
    },
}

/// Decide how to recover from a failed request.
///
/// `retries` is the session's counter before this failure; `fallback_model`
/// is the provider's fallback, if it has one.
pub fn decide(
    class: ErrorClass,
    retries: u32,
    on_fallback: bool,
    fallback_model: Option<&str>,
    config: &RetryConfig,
) -> RecoveryAction {
    let fallback = fallback_model.filter(|_| !on_fallback);

    match class {
        ErrorClass::ModelCapacity => {
            if on_fallback {
                return RecoveryAction::Surface {
                    retries,
                    fallback_available: false,
                };
            }
            let retries = (retries + 1).min(config.max_retries);
            if retries >= config.max_retries {
                escalate(retries, fallback, config)
            } else {
                RecoveryAction::Retry {
                    delay: config.linear_delay(retries),
                    retries,
                    reconnect: false,
                }
            }
        }
        ErrorClass::Connection => {
            if on_fallback {
                RecoveryAction::Surface {
                    retries,
                    fallback_available: false,
                }
            } else if retries < config.max_retries {
                RecoveryAction::Retry {
                    delay: config.reconnect_delay(),
                    retries: retries + 1,
                    reconnect: true,
                }
            } else {
                escalate(retries, fallback, config)
            }
        }
        ErrorClass::Generic => RecoveryAction::Surface {
            retries,
            fallback_available: fallback.is_some(),
        },
    }
}

fn escalate(retries: u32, fallback: Option<&str>, config: &RetryConfig) -> RecoveryAction {
    match fallback {
        Some(model) => RecoveryAction::Fallback {
            model: model.to_string(),
            delay: config.fallback_delay(),
            retries,
        },
        None => RecoveryAction::Surface {
            retries,
            fallback_available: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RetryConfig {
        RetryConfig::default()
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 1000);
        assert_eq!(config.fallback_delay_ms, 1000);
    }

    #[test]
    fn test_linear_delay() {
        let config = config();
        assert_eq!(config.linear_delay(1).as_millis(), 1000);
        assert_eq!(config.linear_delay(2).as_millis(), 2000);
        assert_eq!(config.linear_delay(3).as_millis(), 3000);
        // Attempt numbers are 1-based; zero is treated as the first attempt
        assert_eq!(config.linear_delay(0).as_millis(), 1000);
    }

    #[test]
    fn test_capacity_errors_retry_then_fallback() {
        let config = config();
        let fallback = Some("gpt-4o-mini");

        let first = decide(ErrorClass::ModelCapacity, 0, false, fallback, &config);
        assert_eq!(
            first,
            RecoveryAction::Retry {
                delay: Duration::from_millis(1000),
                retries: 1,
                reconnect: false
            }
        );

        let second = decide(ErrorClass::ModelCapacity, 1, false, fallback, &config);
        assert_eq!(
            second,
            RecoveryAction::Retry {
                delay: Duration::from_millis(2000),
                retries: 2,
                reconnect: false
            }
        );

        let third = decide(ErrorClass::ModelCapacity, 2, false, fallback, &config);
        assert_eq!(
            third,
            RecoveryAction::Fallback {
                model: "gpt-4o-mini".to_string(),
                delay: Duration::from_millis(1000),
                retries: 3
            }
        );
    }

    #[test]
    fn test_capacity_error_at_max_retries_goes_straight_to_fallback() {
        let action = decide(ErrorClass::ModelCapacity, 3, false, Some("gemini-2.0-flash"), &config());
        assert!(matches!(action, RecoveryAction::Fallback { ref model, retries: 3, .. } if model == "gemini-2.0-flash"));
    }

    #[test]
    fn test_capacity_error_on_fallback_surfaces() {
        let action = decide(ErrorClass::ModelCapacity, 3, true, Some("gpt-4o-mini"), &config());
        assert_eq!(
            action,
            RecoveryAction::Surface {
                retries: 3,
                fallback_available: false
            }
        );
    }

    #[test]
    fn test_capacity_error_without_fallback_entry_surfaces_when_exhausted() {
        let action = decide(ErrorClass::ModelCapacity, 2, false, None, &config());
        assert!(matches!(action, RecoveryAction::Surface { retries: 3, .. }));
    }

    #[test]
    fn test_connection_errors_count_up_to_max() {
        let config = config();
        let mut retries = 0;
        for _ in 0..3 {
            match decide(ErrorClass::Connection, retries, false, Some("gpt-4o-mini"), &config) {
                RecoveryAction::Retry {
                    delay,
                    retries: next,
                    reconnect,
                } => {
                    assert_eq!(delay.as_millis(), 1000);
                    assert!(reconnect);
                    retries = next;
                }
                other => panic!("expected retry, got {:?}", other),
            }
        }
        assert_eq!(retries, 3);

        let escalated = decide(ErrorClass::Connection, retries, false, Some("gpt-4o-mini"), &config);
        assert!(matches!(escalated, RecoveryAction::Fallback { retries: 3, .. }));
    }

    #[test]
    fn test_connection_error_on_fallback_surfaces() {
        let action = decide(ErrorClass::Connection, 0, true, Some("gpt-4o-mini"), &config());
        assert_eq!(
            action,
            RecoveryAction::Surface {
                retries: 0,
                fallback_available: false
            }
        );
    }

    #[test]
    fn test_generic_errors_surface() {
        let action = decide(ErrorClass::Generic, 0, false, Some("gpt-4o-mini"), &config());
        assert_eq!(
            action,
            RecoveryAction::Surface {
                retries: 0,
                fallback_available: true
            }
        );
    }

    #[test]
    fn test_zero_max_retries_escalates_immediately() {
        let config = RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        };
        let action = decide(ErrorClass::ModelCapacity, 0, false, Some("claude-3-haiku"), &config);
        assert!(matches!(action, RecoveryAction::Fallback { retries: 0, .. }));
    }
}
