//! Alert generation from sensor status transitions
//!
//! The monitor subscribes to SensorUpdated events and raises an alert
//! whenever a reading crosses between status bands: Warning and Critical on
//! the way out, Info when the reading recovers. Raised alerts are routed to
//! the notifier per the user's notification settings.

use std::sync::Arc;

use chrono::Utc;
use serra_core::{EventKind, EventPayload, Sensor, SensorStatus, Severity};
use serra_event_bus::EventBus;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::log::AlertLog;
use crate::notify::{NotificationSettings, Notifier};

/// Background task generating alerts from the event stream
pub struct AlertMonitor;

impl AlertMonitor {
    /// Subscribe to the bus and process transitions until it closes
    pub fn spawn(
        bus: Arc<EventBus>,
        log: Arc<AlertLog>,
        notifier: Arc<dyn Notifier>,
        settings: NotificationSettings,
    ) -> JoinHandle<()> {
        let mut rx = bus.subscribe(EventKind::SensorUpdated);

        tokio::spawn(async move {
            info!("Alert monitor started");
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let EventPayload::SensorUpdated(data) = &event.payload else {
                            continue;
                        };
                        let Some((severity, message)) = transition(&data.old, &data.new) else {
                            continue;
                        };

                        let alert = log.raise(
                            data.site_id.clone(),
                            data.new.id.clone(),
                            message,
                            severity,
                            event.context.child(),
                        );

                        for channel in settings.route(severity, Utc::now().time()) {
                            if let Err(e) = notifier.send(channel, &alert.message).await {
                                warn!(?channel, error = %e, "Notification failed");
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Alert monitor lagged behind the event stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event bus closed, stopping alert monitor");
                        break;
                    }
                }
            }
        })
    }
}

/// Alert to raise for a status transition, if any
fn transition(old: &Sensor, new: &Sensor) -> Option<(Severity, String)> {
    if old.status == new.status {
        return None;
    }
    let (severity, label) = match new.status {
        SensorStatus::Critical => (Severity::Critical, "critical"),
        SensorStatus::Warning => (Severity::Warning, "out of range"),
        SensorStatus::Ok => (Severity::Info, "back to normal"),
    };
    Some((
        severity,
        format!("{} {}: {:.1} {}", new.name, label, new.value, new.unit),
    ))
}
