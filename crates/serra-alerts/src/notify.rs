//! Notification transport seam
//!
//! External delivery (mail relays, push gateways, SMS brokers) is a consumed
//! interface: the engine only needs `send(channel, message) -> delivery
//! result`. The shipped implementation logs; real transports plug in behind
//! the trait.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serra_core::Severity;
use thiserror::Error;
use tracing::info;

/// Delivery channel for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Push,
    Sms,
}

/// Proof of a dispatched notification
#[derive(Debug, Clone)]
pub struct Delivery {
    pub channel: Channel,
    pub dispatched_at: DateTime<Utc>,
}

/// Errors from notification transports
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("channel {0:?} is not configured")]
    ChannelDisabled(Channel),

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Outbound notification transport
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: Channel, message: &str) -> Result<Delivery, NotifyError>;
}

/// Notifier that writes to the log instead of an external transport
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, channel: Channel, message: &str) -> Result<Delivery, NotifyError> {
        info!(?channel, message, "Notification dispatched");
        Ok(Delivery {
            channel,
            dispatched_at: Utc::now(),
        })
    }
}

/// Daily window during which non-critical notifications are suppressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl QuietHours {
    /// Whether a time of day falls inside the window
    ///
    /// Windows may wrap past midnight (22:00–07:00).
    pub fn contains(&self, at: NaiveTime) -> bool {
        if self.start <= self.end {
            at >= self.start && at < self.end
        } else {
            at >= self.start || at < self.end
        }
    }
}

/// Per-user notification preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_on")]
    pub email: bool,

    #[serde(default = "default_on")]
    pub push: bool,

    #[serde(default)]
    pub sms: bool,

    /// Only deliver critical alerts
    #[serde(default)]
    pub critical_only: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiet_hours: Option<QuietHours>,
}

fn default_on() -> bool {
    true
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email: true,
            push: true,
            sms: false,
            critical_only: false,
            quiet_hours: None,
        }
    }
}

impl NotificationSettings {
    /// Channels enabled in the preferences
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels = Vec::new();
        if self.email {
            channels.push(Channel::Email);
        }
        if self.push {
            channels.push(Channel::Push);
        }
        if self.sms {
            channels.push(Channel::Sms);
        }
        channels
    }

    /// Channels a severity should go out on at the given time of day
    ///
    /// Critical alerts always go out; everything else is subject to the
    /// critical-only filter and quiet hours.
    pub fn route(&self, severity: Severity, at: NaiveTime) -> Vec<Channel> {
        if severity < Severity::Critical {
            if self.critical_only {
                return Vec::new();
            }
            if let Some(quiet) = &self.quiet_hours {
                if quiet.contains(at) {
                    return Vec::new();
                }
            }
        }
        self.channels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        s.parse().unwrap()
    }

    #[test]
    fn test_quiet_hours_plain_window() {
        let quiet = QuietHours {
            start: t("12:00:00"),
            end: t("14:00:00"),
        };
        assert!(quiet.contains(t("13:00:00")));
        assert!(!quiet.contains(t("15:00:00")));
    }

    #[test]
    fn test_quiet_hours_wrap_midnight() {
        let quiet = QuietHours {
            start: t("22:00:00"),
            end: t("07:00:00"),
        };
        assert!(quiet.contains(t("23:30:00")));
        assert!(quiet.contains(t("03:00:00")));
        assert!(!quiet.contains(t("12:00:00")));
    }

    #[test]
    fn test_route_critical_always_delivers() {
        let settings = NotificationSettings {
            critical_only: true,
            quiet_hours: Some(QuietHours {
                start: t("00:00:00"),
                end: t("23:59:59"),
            }),
            ..Default::default()
        };

        let channels = settings.route(Severity::Critical, t("12:00:00"));
        assert_eq!(channels, vec![Channel::Email, Channel::Push]);
    }

    #[test]
    fn test_route_filters_non_critical() {
        let settings = NotificationSettings {
            critical_only: true,
            ..Default::default()
        };
        assert!(settings.route(Severity::Warning, t("12:00:00")).is_empty());

        let quiet = NotificationSettings {
            quiet_hours: Some(QuietHours {
                start: t("22:00:00"),
                end: t("07:00:00"),
            }),
            ..Default::default()
        };
        assert!(quiet.route(Severity::Info, t("23:00:00")).is_empty());
        assert!(!quiet.route(Severity::Info, t("12:00:00")).is_empty());
    }

    #[tokio::test]
    async fn test_log_notifier_accepts() {
        let delivery = LogNotifier
            .send(Channel::Push, "Température critique (32°C)")
            .await
            .unwrap();
        assert_eq!(delivery.channel, Channel::Push);
    }
}
