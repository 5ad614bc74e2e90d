//! serra server
//!
//! Main entry point: loads configuration (or the demo dataset), assembles
//! the core services, and runs the evaluation engine until interrupted.

use anyhow::Result;
use serra_alerts::{AlertLog, AlertMonitor, LogNotifier};
use serra_automation::RuleRegistry;
use serra_config::SerraConfig;
use serra_engine::{EngineConfig, EvaluationEngine};
use serra_event_bus::EventBus;
use serra_history::Recorder;
use serra_state_store::SiteStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// The assembled serra services
pub struct Serra {
    /// Event bus for pub/sub communication
    pub bus: Arc<EventBus>,
    /// Site state store
    pub store: Arc<SiteStore>,
    /// Automation rule registry
    pub rules: Arc<RuleRegistry>,
    /// Alert log
    pub alerts: Arc<AlertLog>,
    /// Sensor reading history
    pub history: Arc<Recorder>,
}

impl Serra {
    /// Build and populate the services from a configuration document
    pub fn from_config(config: &SerraConfig) -> Result<Self> {
        let bus = Arc::new(EventBus::new());

        let store = Arc::new(SiteStore::new(bus.clone()));
        for site in config.build_sites()? {
            store.insert_site(site)?;
        }

        let rules = Arc::new(RuleRegistry::new());
        rules.load(config.rules.clone(), &store)?;

        let alerts = Arc::new(AlertLog::new(bus.clone()));
        let history = Arc::new(Recorder::new());

        Ok(Self {
            bus,
            store,
            rules,
            alerts,
            history,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match std::env::args().nth(1) {
        Some(path) => {
            info!(%path, "Loading configuration file");
            serra_config::load(&path)?
        }
        None => {
            info!("No configuration file given, using the demo dataset");
            serra_config::demo()
        }
    };

    let serra = Serra::from_config(&config)?;
    info!(
        sites = serra.store.site_count(),
        rules = serra.rules.count(),
        "serra initialized"
    );

    let _recorder_task = serra.history.clone().spawn(&serra.bus);
    let _monitor_task = AlertMonitor::spawn(
        serra.bus.clone(),
        serra.alerts.clone(),
        Arc::new(LogNotifier),
        config.notifications.clone(),
    );

    let engine = EvaluationEngine::new(
        serra.store.clone(),
        serra.rules.clone(),
        serra.bus.clone(),
        EngineConfig {
            tick_interval: Duration::from_secs(config.engine.tick_interval_secs),
            command_buffer: config.engine.command_buffer,
        },
    );
    engine.start();

    info!("serra is running");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    engine.stop();

    Ok(())
}
