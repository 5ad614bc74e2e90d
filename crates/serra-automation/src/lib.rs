//! Automation rules for serra
//!
//! A rule ties a sensor-threshold condition to an equipment action, scoped
//! to one site. This crate provides the rule model, the registry that owns
//! all rules, and the validation that keeps every rule resolvable against
//! the state store. Evaluation lives in `serra-engine`.

mod registry;
mod rule;

pub use registry::{RuleError, RuleRegistry, RuleResult, ValidationError};
pub use rule::{
    ActionConfig, AutomationRule, Comparison, ConditionConfig, EquipmentCommand, RuleAction,
    RuleCondition, RuleConfig,
};
