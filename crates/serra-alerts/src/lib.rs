//! Alerts for serra
//!
//! Three pieces: the [`AlertLog`] owning all alert records, the
//! [`AlertMonitor`] that generates alerts from sensor status transitions on
//! the bus, and the [`Notifier`] seam through which alerts reach external
//! transports.

mod log;
mod monitor;
mod notify;

pub use log::{AlertError, AlertLog, AlertResult};
pub use monitor::AlertMonitor;
pub use notify::{
    Channel, Delivery, LogNotifier, NotificationSettings, Notifier, NotifyError, QuietHours,
};
