//! Rule model: conditions, actions, and the configuration they parse from

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use serra_core::{EquipmentId, RuleId, SensorKind, SiteId};

/// Comparison operator of a rule condition
///
/// Serialized as the operator glyph, the shape rule forms submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    Above,

    #[serde(rename = "<")]
    Below,

    #[serde(rename = ">=")]
    AboveOrEqual,

    #[serde(rename = "<=")]
    BelowOrEqual,

    #[serde(rename = "=")]
    Equal,
}

impl Comparison {
    /// Apply the operator to a reading and a threshold
    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Above => value > threshold,
            Comparison::Below => value < threshold,
            Comparison::AboveOrEqual => value >= threshold,
            Comparison::BelowOrEqual => value <= threshold,
            Comparison::Equal => value == threshold,
        }
    }
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let glyph = match self {
            Comparison::Above => ">",
            Comparison::Below => "<",
            Comparison::AboveOrEqual => ">=",
            Comparison::BelowOrEqual => "<=",
            Comparison::Equal => "=",
        };
        f.write_str(glyph)
    }
}

/// What a firing rule does to its target equipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentCommand {
    TurnOn,
    TurnOff,
}

impl EquipmentCommand {
    /// Active state the command drives the equipment to
    pub fn target_state(&self) -> bool {
        matches!(self, EquipmentCommand::TurnOn)
    }

    /// The opposite command, applied when a bounded firing expires
    pub fn reverse(&self) -> Self {
        match self {
            EquipmentCommand::TurnOn => EquipmentCommand::TurnOff,
            EquipmentCommand::TurnOff => EquipmentCommand::TurnOn,
        }
    }
}

/// Threshold test against a sensor kind on the rule's site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub sensor_kind: SensorKind,
    pub op: Comparison,
    pub threshold: f64,
}

impl RuleCondition {
    /// Whether a reading satisfies the condition
    pub fn holds(&self, value: f64) -> bool {
        self.op.compare(value, self.threshold)
    }
}

/// Equipment directive carried by a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAction {
    pub equipment_id: EquipmentId,
    pub command: EquipmentCommand,

    /// Minutes the commanded state should hold before being reversed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_mins: Option<u32>,
}

impl RuleAction {
    /// Duration of a bounded firing
    pub fn duration(&self) -> Option<Duration> {
        self.duration_mins
            .map(|mins| Duration::from_secs(u64::from(mins) * 60))
    }
}

/// A validated automation rule owned by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: RuleId,
    pub name: String,
    pub site_id: SiteId,
    pub condition: RuleCondition,
    pub action: RuleAction,
    pub enabled: bool,

    /// Last time the rule drove its equipment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fired: Option<DateTime<Utc>>,
}

/// Rule definition as submitted by forms or configuration files
///
/// Identifiers arrive as raw strings and are validated by the registry, so
/// a bad reference is a [`ValidationError`](crate::ValidationError) rather
/// than a parse failure deep inside serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Explicit id; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,
    pub site_id: String,
    pub condition: ConditionConfig,
    pub action: ActionConfig,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Condition section of a rule definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(alias = "sensor_type")]
    pub sensor_kind: SensorKind,

    #[serde(alias = "operator")]
    pub op: Comparison,

    #[serde(alias = "value")]
    pub threshold: f64,
}

/// Action section of a rule definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    pub equipment_id: String,

    #[serde(alias = "action")]
    pub command: EquipmentCommand,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_mins: Option<u32>,
}
