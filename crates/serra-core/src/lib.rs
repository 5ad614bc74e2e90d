//! Core types for serra
//!
//! This crate provides the fundamental types used throughout the greenhouse
//! monitoring engine: typed identifiers, the Site/Sensor/Equipment/Alert
//! entities, the causality Context, and the domain event payloads carried on
//! the event bus.

mod alert;
mod context;
mod equipment;
mod event;
mod ids;
mod sensor;
mod site;

pub use alert::{Alert, Severity};
pub use context::Context;
pub use equipment::{Equipment, EquipmentKind};
pub use event::{
    AlertRaisedData, EquipmentChangedData, Event, EventKind, EventPayload, RuleFiredData,
    SensorUpdatedData, SiteStatusChangedData,
};
pub use ids::{AlertId, EquipmentId, IdError, RuleId, SensorId, SiteId};
pub use sensor::{Sensor, SensorKind, SensorStatus};
pub use site::{Coordinates, Site, SiteStatus};
