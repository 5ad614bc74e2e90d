//! Pure evaluation pass over rule and site snapshots
//!
//! Planning is separated from the async loop so the policy decisions
//! (edge-triggering, conflict resolution, site gating) are plain functions
//! over cloned data.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serra_automation::{AutomationRule, EquipmentCommand};
use serra_core::{EquipmentId, RuleId, Site, SiteId};
use tracing::debug;

/// A rule firing produced by one evaluation pass
#[derive(Debug, Clone, PartialEq)]
pub struct Firing {
    pub rule_id: RuleId,
    pub site_id: SiteId,
    pub equipment_id: EquipmentId,
    pub command: EquipmentCommand,

    /// How long the commanded state should hold before reversal
    pub duration: Option<Duration>,

    /// Reading that satisfied the condition
    pub observed: f64,
    pub threshold: f64,
}

/// Per-rule condition results carried between passes
///
/// Rules fire on the false→true transition of their condition only; a
/// condition that stays true across passes does not re-fire.
#[derive(Debug, Default)]
pub struct EdgeTracker {
    last: HashMap<RuleId, bool>,
}

impl EdgeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest result; returns true on a false→true transition
    fn observe(&mut self, rule_id: &RuleId, result: bool) -> bool {
        let prev = self.last.insert(rule_id.clone(), result).unwrap_or(false);
        result && !prev
    }

    /// Drop state for rules that no longer exist
    pub fn retain(&mut self, live: &HashSet<RuleId>) {
        self.last.retain(|id, _| live.contains(id));
    }
}

/// Evaluate all rules against the given site snapshots
///
/// Rules are visited in registration order. Within one pass the first rule
/// to claim an equipment wins; later claims on the same equipment are
/// dropped. Sites that are not active are skipped entirely, freezing the
/// edge state of their rules.
pub fn plan(rules: &[AutomationRule], sites: &[Site], edges: &mut EdgeTracker) -> Vec<Firing> {
    let by_id: HashMap<&SiteId, &Site> = sites.iter().map(|s| (&s.id, s)).collect();
    let mut claimed: HashSet<&EquipmentId> = HashSet::new();
    let mut firings = Vec::new();

    for rule in rules {
        if !rule.enabled {
            continue;
        }
        let Some(site) = by_id.get(&rule.site_id) else {
            continue;
        };
        if !site.is_active() {
            continue;
        }
        let Some(sensor) = site.first_sensor_of(rule.condition.sensor_kind) else {
            continue;
        };

        let result = rule.condition.holds(sensor.value);
        if !edges.observe(&rule.id, result) {
            continue;
        }

        if !claimed.insert(&rule.action.equipment_id) {
            debug!(
                rule_id = %rule.id,
                equipment_id = %rule.action.equipment_id,
                "Equipment already claimed this pass, dropping firing"
            );
            continue;
        }

        firings.push(Firing {
            rule_id: rule.id.clone(),
            site_id: rule.site_id.clone(),
            equipment_id: rule.action.equipment_id.clone(),
            command: rule.action.command,
            duration: rule.action.duration(),
            observed: sensor.value,
            threshold: rule.condition.threshold,
        });
    }

    firings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serra_automation::{Comparison, RuleAction, RuleCondition};
    use serra_core::{Equipment, EquipmentKind, Sensor, SensorId, SensorKind, SiteStatus};

    fn demo_site(temperature: f64) -> Site {
        let site_id = SiteId::new("1").unwrap();
        let mut site = Site::new(site_id.clone(), "Serre Tomates Bio", "Zone Nord");
        site.sensors.push(Sensor::new(
            SensorId::new("s1").unwrap(),
            "Température Air",
            SensorKind::Temperature,
            temperature,
            site_id.clone(),
        ));
        site.equipment.push(Equipment::new(
            EquipmentId::new("e2").unwrap(),
            "Ventilateur",
            EquipmentKind::Fan,
            false,
            site_id.clone(),
        ));
        site.equipment.push(Equipment::new(
            EquipmentId::new("e1").unwrap(),
            "Pompe Irrigation",
            EquipmentKind::Pump,
            false,
            site_id,
        ));
        site
    }

    fn rule(id: &str, threshold: f64, command: EquipmentCommand, equipment: &str) -> AutomationRule {
        AutomationRule {
            id: RuleId::new(id).unwrap(),
            name: "Ventilation automatique".to_string(),
            site_id: SiteId::new("1").unwrap(),
            condition: RuleCondition {
                sensor_kind: SensorKind::Temperature,
                op: Comparison::Above,
                threshold,
            },
            action: RuleAction {
                equipment_id: EquipmentId::new(equipment).unwrap(),
                command,
                duration_mins: None,
            },
            enabled: true,
            last_fired: None,
        }
    }

    #[test]
    fn test_fires_on_transition_only() {
        let rules = vec![rule("r1", 28.0, EquipmentCommand::TurnOn, "e2")];
        let mut edges = EdgeTracker::new();

        // below threshold: nothing
        let firings = plan(&rules, &[demo_site(24.5)], &mut edges);
        assert!(firings.is_empty());

        // crossing: fires once
        let firings = plan(&rules, &[demo_site(30.0)], &mut edges);
        assert_eq!(firings.len(), 1);
        assert_eq!(firings[0].equipment_id.as_str(), "e2");
        assert_eq!(firings[0].observed, 30.0);

        // still above: no re-fire
        let firings = plan(&rules, &[demo_site(31.0)], &mut edges);
        assert!(firings.is_empty());

        // drops below, crosses again: fires again
        plan(&rules, &[demo_site(25.0)], &mut edges);
        let firings = plan(&rules, &[demo_site(29.0)], &mut edges);
        assert_eq!(firings.len(), 1);
    }

    #[test]
    fn test_disabled_rule_never_fires() {
        let mut r = rule("r1", 28.0, EquipmentCommand::TurnOn, "e2");
        r.enabled = false;
        let mut edges = EdgeTracker::new();

        let firings = plan(&[r], &[demo_site(35.0)], &mut edges);
        assert!(firings.is_empty());
    }

    #[test]
    fn test_inactive_site_is_skipped() {
        let rules = vec![rule("r1", 28.0, EquipmentCommand::TurnOn, "e2")];
        let mut site = demo_site(35.0);
        site.status = SiteStatus::Maintenance;
        let mut edges = EdgeTracker::new();

        assert!(plan(&rules, &[site], &mut edges).is_empty());
    }

    #[test]
    fn test_conflict_resolves_to_first_registered() {
        // contradictory commands on the same fan, same tick
        let rules = vec![
            rule("r1", 28.0, EquipmentCommand::TurnOn, "e2"),
            rule("r2", 28.0, EquipmentCommand::TurnOff, "e2"),
        ];
        let mut edges = EdgeTracker::new();

        let firings = plan(&rules, &[demo_site(30.0)], &mut edges);
        assert_eq!(firings.len(), 1);
        assert_eq!(firings[0].rule_id.as_str(), "r1");
        assert_eq!(firings[0].command, EquipmentCommand::TurnOn);
    }

    #[test]
    fn test_distinct_equipment_fire_together() {
        let rules = vec![
            rule("r1", 28.0, EquipmentCommand::TurnOn, "e2"),
            rule("r2", 28.0, EquipmentCommand::TurnOn, "e1"),
        ];
        let mut edges = EdgeTracker::new();

        let firings = plan(&rules, &[demo_site(30.0)], &mut edges);
        assert_eq!(firings.len(), 2);
    }

    #[test]
    fn test_missing_sensor_kind_is_skipped() {
        let mut r = rule("r1", 6.0, EquipmentCommand::TurnOn, "e2");
        r.condition.sensor_kind = SensorKind::Ph;
        let mut edges = EdgeTracker::new();

        assert!(plan(&[r], &[demo_site(30.0)], &mut edges).is_empty());
    }

    #[test]
    fn test_retain_prunes_removed_rules() {
        let rules = vec![rule("r1", 28.0, EquipmentCommand::TurnOn, "e2")];
        let mut edges = EdgeTracker::new();
        plan(&rules, &[demo_site(30.0)], &mut edges);

        // rule removed: its edge state goes with it, so re-adding starts clean
        edges.retain(&HashSet::new());
        let firings = plan(&rules, &[demo_site(30.0)], &mut edges);
        assert_eq!(firings.len(), 1);
    }
}
