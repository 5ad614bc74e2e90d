//! Built-in demo dataset
//!
//! Two greenhouses with the stock sensors, equipment and rules. Used by the
//! server when no configuration file is given and by tests that want a
//! populated store without YAML fixtures.

use serra_automation::{ActionConfig, Comparison, ConditionConfig, EquipmentCommand, RuleConfig};
use serra_core::{Coordinates, EquipmentKind, SensorKind, SiteStatus};

use crate::model::{EquipmentConfig, SensorConfig, SerraConfig, SiteConfig};

/// The demo configuration
pub fn demo() -> SerraConfig {
    SerraConfig {
        engine: Default::default(),
        notifications: Default::default(),
        sites: vec![
            SiteConfig {
                id: "1".to_string(),
                name: "Serre Tomates Bio".to_string(),
                location: "Zone Nord".to_string(),
                coordinates: Some(Coordinates {
                    lat: 46.2276,
                    lng: 2.2137,
                }),
                status: SiteStatus::Active,
                sensors: vec![
                    SensorConfig {
                        id: "s1".to_string(),
                        name: "Température Air".to_string(),
                        kind: SensorKind::Temperature,
                        value: 24.5,
                    },
                    SensorConfig {
                        id: "s2".to_string(),
                        name: "Humidité Air".to_string(),
                        kind: SensorKind::HumidityAir,
                        value: 68.0,
                    },
                    SensorConfig {
                        id: "s3".to_string(),
                        name: "Humidité Sol".to_string(),
                        kind: SensorKind::HumiditySoil,
                        value: 45.0,
                    },
                    SensorConfig {
                        id: "s4".to_string(),
                        name: "pH Sol".to_string(),
                        kind: SensorKind::Ph,
                        value: 6.8,
                    },
                    SensorConfig {
                        id: "s5".to_string(),
                        name: "Luminosité".to_string(),
                        kind: SensorKind::Light,
                        value: 850.0,
                    },
                ],
                equipment: vec![
                    EquipmentConfig {
                        id: "e1".to_string(),
                        name: "Pompe Irrigation".to_string(),
                        kind: EquipmentKind::Pump,
                        active: false,
                    },
                    EquipmentConfig {
                        id: "e2".to_string(),
                        name: "Ventilateur".to_string(),
                        kind: EquipmentKind::Fan,
                        active: true,
                    },
                    EquipmentConfig {
                        id: "e3".to_string(),
                        name: "Éclairage LED".to_string(),
                        kind: EquipmentKind::Light,
                        active: false,
                    },
                ],
            },
            SiteConfig {
                id: "2".to_string(),
                name: "Serre Légumes".to_string(),
                location: "Zone Sud".to_string(),
                coordinates: Some(Coordinates {
                    lat: 46.22,
                    lng: 2.21,
                }),
                status: SiteStatus::Active,
                sensors: vec![
                    SensorConfig {
                        id: "s6".to_string(),
                        name: "Température Air".to_string(),
                        kind: SensorKind::Temperature,
                        value: 22.1,
                    },
                    SensorConfig {
                        id: "s7".to_string(),
                        name: "Humidité Air".to_string(),
                        kind: SensorKind::HumidityAir,
                        value: 72.0,
                    },
                ],
                equipment: vec![EquipmentConfig {
                    id: "e4".to_string(),
                    name: "Pompe Irrigation".to_string(),
                    kind: EquipmentKind::Pump,
                    active: true,
                }],
            },
        ],
        rules: vec![
            RuleConfig {
                id: Some("r1".to_string()),
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
            },
            RuleConfig {
                id: Some("r2".to_string()),
                name: "Irrigation programmée".to_string(),
                site_id: "1".to_string(),
                condition: ConditionConfig {
                    sensor_kind: SensorKind::HumiditySoil,
                    op: Comparison::Below,
                    threshold: 40.0,
                },
                action: ActionConfig {
                    equipment_id: "e1".to_string(),
                    command: EquipmentCommand::TurnOn,
                    duration_mins: Some(10),
                },
                enabled: false,
            },
        ],
    }
}
