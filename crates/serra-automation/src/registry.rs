//! Rule registry: owns all automation rules, validated against the store
//!
//! Rules are kept in registration order; the evaluation loop depends on
//! that order as its deterministic tie-break when two rules claim the same
//! equipment in one pass.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info};
use ulid::Ulid;

use serra_core::{EquipmentId, IdError, RuleId, SensorKind, SiteId};
use serra_state_store::SiteStore;

use crate::rule::{AutomationRule, RuleAction, RuleCondition, RuleConfig};

/// Why a rule definition was rejected
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("rule name cannot be empty")]
    EmptyName,

    #[error("rule action references no equipment")]
    EmptyEquipmentId,

    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    #[error("site not found: {0}")]
    SiteNotFound(SiteId),

    #[error("site {site_id} has no {kind:?} sensor")]
    SensorKindMissing { site_id: SiteId, kind: SensorKind },

    #[error("equipment {equipment_id} is not owned by site {site_id}")]
    EquipmentNotOnSite {
        site_id: SiteId,
        equipment_id: EquipmentId,
    },

    #[error("threshold must be a finite number, got {0}")]
    NonFiniteThreshold(f64),

    #[error("duration must be at least one minute")]
    ZeroDuration,
}

/// Errors from registry operations
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("rule not found: {0}")]
    NotFound(RuleId),

    #[error("rule already registered: {0}")]
    Duplicate(RuleId),

    #[error("invalid rule: {0}")]
    Validation(#[from] ValidationError),
}

/// Result type for registry operations
pub type RuleResult<T> = Result<T, RuleError>;

/// Owns every automation rule, in registration order
pub struct RuleRegistry {
    rules: RwLock<IndexMap<RuleId, AutomationRule>>,
}

impl RuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(IndexMap::new()),
        }
    }

    /// Validate a definition against the store and register it
    ///
    /// Assigns a ULID when the definition carries no id. Rejected
    /// definitions leave the registry untouched.
    pub fn add(&self, config: RuleConfig, store: &SiteStore) -> RuleResult<RuleId> {
        let rule = validate(config, store)?;
        let id = rule.id.clone();

        let mut rules = self.rules.write().expect("registry lock poisoned");
        if rules.contains_key(&id) {
            return Err(RuleError::Duplicate(id));
        }

        info!(rule_id = %id, name = %rule.name, site_id = %rule.site_id, "Registered rule");
        rules.insert(id.clone(), rule);
        Ok(id)
    }

    /// Register a batch of definitions, stopping at the first invalid one
    pub fn load(&self, configs: Vec<RuleConfig>, store: &SiteStore) -> RuleResult<()> {
        for config in configs {
            self.add(config, store)?;
        }
        Ok(())
    }

    /// Remove a rule
    pub fn remove(&self, id: &RuleId) -> RuleResult<AutomationRule> {
        let mut rules = self.rules.write().expect("registry lock poisoned");
        // shift_remove keeps the registration order of the survivors
        let rule = rules
            .shift_remove(id)
            .ok_or_else(|| RuleError::NotFound(id.clone()))?;
        info!(rule_id = %id, "Removed rule");
        Ok(rule)
    }

    /// Get a rule snapshot
    pub fn get(&self, id: &RuleId) -> RuleResult<AutomationRule> {
        let rules = self.rules.read().expect("registry lock poisoned");
        rules
            .get(id)
            .cloned()
            .ok_or_else(|| RuleError::NotFound(id.clone()))
    }

    /// All rules, in registration order
    pub fn all(&self) -> Vec<AutomationRule> {
        let rules = self.rules.read().expect("registry lock poisoned");
        rules.values().cloned().collect()
    }

    /// Rules scoped to one site, in registration order
    pub fn for_site(&self, site_id: &SiteId) -> Vec<AutomationRule> {
        let rules = self.rules.read().expect("registry lock poisoned");
        rules
            .values()
            .filter(|r| &r.site_id == site_id)
            .cloned()
            .collect()
    }

    /// Enable or disable a rule
    pub fn set_enabled(&self, id: &RuleId, enabled: bool) -> RuleResult<()> {
        let mut rules = self.rules.write().expect("registry lock poisoned");
        let rule = rules
            .get_mut(id)
            .ok_or_else(|| RuleError::NotFound(id.clone()))?;
        rule.enabled = enabled;
        info!(rule_id = %id, enabled, "Rule enablement changed");
        Ok(())
    }

    /// Flip a rule's enablement, returning the new state
    pub fn toggle(&self, id: &RuleId) -> RuleResult<bool> {
        let mut rules = self.rules.write().expect("registry lock poisoned");
        let rule = rules
            .get_mut(id)
            .ok_or_else(|| RuleError::NotFound(id.clone()))?;
        rule.enabled = !rule.enabled;
        info!(rule_id = %id, enabled = rule.enabled, "Rule enablement toggled");
        Ok(rule.enabled)
    }

    /// Record that a rule just drove its equipment
    pub fn mark_fired(&self, id: &RuleId, when: DateTime<Utc>) {
        let mut rules = self.rules.write().expect("registry lock poisoned");
        if let Some(rule) = rules.get_mut(id) {
            rule.last_fired = Some(when);
            debug!(rule_id = %id, "Marked rule fired");
        }
    }

    /// Number of registered rules
    pub fn count(&self) -> usize {
        self.rules.read().expect("registry lock poisoned").len()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(config: RuleConfig, store: &SiteStore) -> Result<AutomationRule, ValidationError> {
    if config.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if config.action.equipment_id.is_empty() {
        return Err(ValidationError::EmptyEquipmentId);
    }
    if !config.condition.threshold.is_finite() {
        return Err(ValidationError::NonFiniteThreshold(config.condition.threshold));
    }
    if config.action.duration_mins == Some(0) {
        return Err(ValidationError::ZeroDuration);
    }

    let site_id = SiteId::new(config.site_id)?;
    let equipment_id = EquipmentId::new(config.action.equipment_id)?;
    let id = match config.id {
        Some(raw) => RuleId::new(raw)?,
        None => RuleId::new(Ulid::new().to_string()).expect("ulid is a valid id"),
    };

    let site = store
        .site(&site_id)
        .map_err(|_| ValidationError::SiteNotFound(site_id.clone()))?;

    if !site.has_sensor_kind(config.condition.sensor_kind) {
        return Err(ValidationError::SensorKindMissing {
            site_id,
            kind: config.condition.sensor_kind,
        });
    }
    if site.equipment(&equipment_id).is_none() {
        return Err(ValidationError::EquipmentNotOnSite {
            site_id,
            equipment_id,
        });
    }

    Ok(AutomationRule {
        id,
        name: config.name,
        site_id,
        condition: RuleCondition {
            sensor_kind: config.condition.sensor_kind,
            op: config.condition.op,
            threshold: config.condition.threshold,
        },
        action: RuleAction {
            equipment_id,
            command: config.action.command,
            duration_mins: config.action.duration_mins,
        },
        enabled: config.enabled,
        last_fired: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{ActionConfig, Comparison, ConditionConfig, EquipmentCommand};
    use serra_core::{Equipment, EquipmentKind, Sensor, SensorId, Site};
    use serra_event_bus::EventBus;
    use std::sync::Arc;

    fn store_with_demo_site() -> SiteStore {
        let store = SiteStore::new(Arc::new(EventBus::new()));
        let site_id = SiteId::new("1").unwrap();
        let mut site = Site::new(site_id.clone(), "Serre Tomates Bio", "Zone Nord");
        site.sensors.push(Sensor::new(
            SensorId::new("s1").unwrap(),
            "Température Air",
            SensorKind::Temperature,
            24.5,
            site_id.clone(),
        ));
        site.equipment.push(Equipment::new(
            EquipmentId::new("e2").unwrap(),
            "Ventilateur",
            EquipmentKind::Fan,
            true,
            site_id,
        ));
        store.insert_site(site).unwrap();
        store
    }

    fn ventilation_config() -> RuleConfig {
        RuleConfig {
            id: None,
            name: "Ventilation automatique".to_string(),
            site_id: "1".to_string(),
            condition: ConditionConfig {
                sensor_kind: SensorKind::Temperature,
                op: Comparison::Above,
                threshold: 28.0,
            },
            action: ActionConfig {
                equipment_id: "e2".to_string(),
                command: EquipmentCommand::TurnOn,
                duration_mins: Some(15),
            },
            enabled: true,
        }
    }

    #[test]
    fn test_add_assigns_ulid_when_no_id() {
        let store = store_with_demo_site();
        let registry = RuleRegistry::new();

        let id = registry.add(ventilation_config(), &store).unwrap();
        assert_eq!(id.as_str().len(), 26);
        assert_eq!(registry.count(), 1);

        let rule = registry.get(&id).unwrap();
        assert_eq!(rule.name, "Ventilation automatique");
        assert!(rule.last_fired.is_none());
    }

    #[test]
    fn test_empty_equipment_id_rejected() {
        let store = store_with_demo_site();
        let registry = RuleRegistry::new();

        let mut config = ventilation_config();
        config.action.equipment_id = String::new();

        assert!(matches!(
            registry.add(config, &store),
            Err(RuleError::Validation(ValidationError::EmptyEquipmentId))
        ));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_empty_name_rejected() {
        let store = store_with_demo_site();
        let registry = RuleRegistry::new();

        let mut config = ventilation_config();
        config.name = "   ".to_string();

        assert!(matches!(
            registry.add(config, &store),
            Err(RuleError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let store = store_with_demo_site();
        let registry = RuleRegistry::new();

        let mut config = ventilation_config();
        config.condition.threshold = f64::NAN;

        assert!(matches!(
            registry.add(config, &store),
            Err(RuleError::Validation(ValidationError::NonFiniteThreshold(_)))
        ));
    }

    #[test]
    fn test_unknown_site_rejected() {
        let store = store_with_demo_site();
        let registry = RuleRegistry::new();

        let mut config = ventilation_config();
        config.site_id = "9".to_string();

        assert!(matches!(
            registry.add(config, &store),
            Err(RuleError::Validation(ValidationError::SiteNotFound(_)))
        ));
    }

    #[test]
    fn test_sensor_kind_must_exist_on_site() {
        let store = store_with_demo_site();
        let registry = RuleRegistry::new();

        let mut config = ventilation_config();
        config.condition.sensor_kind = SensorKind::Ph;

        assert!(matches!(
            registry.add(config, &store),
            Err(RuleError::Validation(ValidationError::SensorKindMissing { .. }))
        ));
    }

    #[test]
    fn test_equipment_must_be_on_same_site() {
        let store = store_with_demo_site();
        let registry = RuleRegistry::new();

        let mut config = ventilation_config();
        config.action.equipment_id = "e9".to_string();

        assert!(matches!(
            registry.add(config, &store),
            Err(RuleError::Validation(ValidationError::EquipmentNotOnSite { .. }))
        ));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let store = store_with_demo_site();
        let registry = RuleRegistry::new();

        let mut config = ventilation_config();
        config.action.duration_mins = Some(0);

        assert!(matches!(
            registry.add(config, &store),
            Err(RuleError::Validation(ValidationError::ZeroDuration))
        ));
    }

    #[test]
    fn test_remove_and_not_found() {
        let store = store_with_demo_site();
        let registry = RuleRegistry::new();
        let id = registry.add(ventilation_config(), &store).unwrap();

        let removed = registry.remove(&id).unwrap();
        assert_eq!(removed.id, id);
        assert!(matches!(registry.remove(&id), Err(RuleError::NotFound(_))));
        assert!(matches!(registry.get(&id), Err(RuleError::NotFound(_))));
    }

    #[test]
    fn test_toggle_and_set_enabled() {
        let store = store_with_demo_site();
        let registry = RuleRegistry::new();
        let id = registry.add(ventilation_config(), &store).unwrap();

        assert!(!registry.toggle(&id).unwrap());
        assert!(registry.toggle(&id).unwrap());

        registry.set_enabled(&id, false).unwrap();
        assert!(!registry.get(&id).unwrap().enabled);
    }

    #[test]
    fn test_registration_order_preserved() {
        let store = store_with_demo_site();
        let registry = RuleRegistry::new();

        for raw in ["r-ventilation", "r-irrigation", "r-chauffage"] {
            let mut config = ventilation_config();
            config.id = Some(raw.to_string());
            registry.add(config, &store).unwrap();
        }

        let ids: Vec<_> = registry.all().into_iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["r-ventilation", "r-irrigation", "r-chauffage"]);

        // removal keeps the survivors' order
        registry
            .remove(&RuleId::new("r-irrigation").unwrap())
            .unwrap();
        let ids: Vec<_> = registry.all().into_iter().map(|r| r.id.to_string()).collect();
        assert_eq!(ids, vec!["r-ventilation", "r-chauffage"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let store = store_with_demo_site();
        let registry = RuleRegistry::new();

        let mut config = ventilation_config();
        config.id = Some("r1".to_string());
        registry.add(config.clone(), &store).unwrap();

        assert!(matches!(
            registry.add(config, &store),
            Err(RuleError::Duplicate(_))
        ));
    }
}
