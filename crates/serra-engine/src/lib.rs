//! Evaluation engine for serra
//!
//! The engine runs the periodic pass that turns automation rules into
//! equipment actions: read the condition's sensor, compare against the
//! threshold, and drive the target equipment unless it is already in the
//! requested state. Duration-bound firings schedule a reverse action that
//! the engine applies when due.
//!
//! All equipment writes — rule firings, duration reversals, and manual
//! toggles routed through [`EngineHandle`] — happen on the engine task, so
//! the tick and user-initiated changes are serialized and a manual toggle
//! can never be silently overwritten by a concurrently scheduled rule
//! action. A manual toggle also cancels any pending reversal on its
//! equipment, which is what keeps a stale timer from re-disabling equipment
//! a user just re-enabled.

mod plan;

pub use plan::{plan, EdgeTracker, Firing};

use chrono::Utc;
use serra_automation::{EquipmentCommand, RuleRegistry};
use serra_core::{Context, Equipment, EquipmentId, EventPayload, RuleFiredData, RuleId};
use serra_event_bus::EventBus;
use serra_state_store::{SiteStore, StoreError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Period of the evaluation tick
    pub tick_interval: Duration,

    /// Depth of the serialized command queue
    pub command_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
            command_buffer: 32,
        }
    }
}

/// Errors surfaced to engine callers
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is not running")]
    Stopped,

    #[error(transparent)]
    Store(#[from] StoreError),
}

enum Command {
    ToggleEquipment {
        equipment_id: EquipmentId,
        context: Context,
        reply: oneshot::Sender<Result<Equipment, StoreError>>,
    },
}

/// Reverse action scheduled by a duration-bound firing
struct PendingReversal {
    rule_id: RuleId,
    command: EquipmentCommand,
    due: Instant,
}

/// The evaluation engine
///
/// Owns the tick loop; constructed once at startup and started with
/// [`EvaluationEngine::start`].
pub struct EvaluationEngine {
    store: Arc<SiteStore>,
    registry: Arc<RuleRegistry>,
    bus: Arc<EventBus>,
    config: EngineConfig,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    cmd_tx: mpsc::Sender<Command>,
    /// Receiver parked here until start() moves it into the loop task
    cmd_rx: Mutex<Option<mpsc::Receiver<Command>>>,
}

impl EvaluationEngine {
    /// Create a new engine over the given store, registry and bus
    pub fn new(
        store: Arc<SiteStore>,
        registry: Arc<RuleRegistry>,
        bus: Arc<EventBus>,
        config: EngineConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);

        Self {
            store,
            registry,
            bus,
            config,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            cmd_tx,
            cmd_rx: Mutex::new(Some(cmd_rx)),
        }
    }

    /// Handle for routing manual equipment writes through the engine
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Start the evaluation loop
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Evaluation engine already running");
            return;
        }

        let mut cmd_rx = match self.cmd_rx.lock().expect("engine lock poisoned").take() {
            Some(rx) => rx,
            None => {
                warn!("Engine command queue already consumed, not starting");
                return;
            }
        };

        info!(tick = ?self.config.tick_interval, "Starting evaluation engine");

        let store = self.store.clone();
        let registry = self.registry.clone();
        let bus = self.bus.clone();
        let running = self.running.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let tick_interval = self.config.tick_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let mut edges = EdgeTracker::new();
            let mut pending: HashMap<EquipmentId, PendingReversal> = HashMap::new();

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        run_pass(&store, &registry, &bus, &mut edges, &mut pending);
                    }
                    cmd = cmd_rx.recv() => {
                        match cmd {
                            Some(cmd) => handle_command(&store, &mut pending, cmd),
                            None => break,
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Received shutdown signal");
                        break;
                    }
                }
            }

            running.store(false, Ordering::SeqCst);
            info!("Evaluation engine stopped");
        });
    }

    /// Stop the evaluation loop
    pub fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        info!("Stopping evaluation engine");
        let _ = self.shutdown_tx.send(());
    }

    /// Whether the loop task is alive
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Cheap clone-able handle submitting writes to the engine task
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl EngineHandle {
    /// Flip an actuator, serialized with the evaluation tick
    ///
    /// Cancels any pending duration reversal on the equipment.
    pub async fn toggle_equipment(
        &self,
        equipment_id: EquipmentId,
        context: Context,
    ) -> Result<Equipment, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::ToggleEquipment {
                equipment_id,
                context,
                reply,
            })
            .await
            .map_err(|_| EngineError::Stopped)?;

        rx.await
            .map_err(|_| EngineError::Stopped)?
            .map_err(EngineError::Store)
    }
}

/// One evaluation pass: apply due reversals, then plan and apply firings
fn run_pass(
    store: &SiteStore,
    registry: &RuleRegistry,
    bus: &EventBus,
    edges: &mut EdgeTracker,
    pending: &mut HashMap<EquipmentId, PendingReversal>,
) {
    let now = Instant::now();

    // reversals first, so a stale timer cannot override this pass's firings
    let due: Vec<EquipmentId> = pending
        .iter()
        .filter(|(_, p)| p.due <= now)
        .map(|(id, _)| id.clone())
        .collect();
    for equipment_id in due {
        let Some(reversal) = pending.remove(&equipment_id) else {
            continue;
        };
        match store.set_equipment_active(
            &equipment_id,
            reversal.command.target_state(),
            Context::new(),
        ) {
            Ok(write) if write.changed => {
                debug!(
                    equipment_id = %equipment_id,
                    rule_id = %reversal.rule_id,
                    "Applied duration reversal"
                );
            }
            Ok(_) => {
                debug!(equipment_id = %equipment_id, "Reversal target already in state");
            }
            Err(e) => {
                warn!(equipment_id = %equipment_id, error = %e, "Reversal failed");
            }
        }
    }

    let rules = registry.all();
    let live: HashSet<RuleId> = rules.iter().map(|r| r.id.clone()).collect();
    edges.retain(&live);

    let sites = store.sites();
    for firing in plan(&rules, &sites, edges) {
        let context = Context::new();
        match store.set_equipment_active(
            &firing.equipment_id,
            firing.command.target_state(),
            context.clone(),
        ) {
            Ok(write) => {
                if write.changed {
                    registry.mark_fired(&firing.rule_id, Utc::now());
                    info!(
                        rule_id = %firing.rule_id,
                        equipment_id = %firing.equipment_id,
                        observed = firing.observed,
                        threshold = firing.threshold,
                        "Rule fired"
                    );
                    bus.fire(
                        EventPayload::RuleFired(RuleFiredData {
                            rule_id: firing.rule_id.clone(),
                            site_id: firing.site_id.clone(),
                            equipment_id: firing.equipment_id.clone(),
                            active: write.equipment.active,
                            observed: firing.observed,
                            threshold: firing.threshold,
                        }),
                        context,
                    );
                } else {
                    debug!(
                        rule_id = %firing.rule_id,
                        equipment_id = %firing.equipment_id,
                        "Equipment already in requested state"
                    );
                }

                // the newest directive owns the reversal slot (last-wins)
                match firing.duration {
                    Some(duration) => {
                        pending.insert(
                            firing.equipment_id.clone(),
                            PendingReversal {
                                rule_id: firing.rule_id.clone(),
                                command: firing.command.reverse(),
                                due: now + duration,
                            },
                        );
                    }
                    None => {
                        pending.remove(&firing.equipment_id);
                    }
                }
            }
            Err(e) => {
                warn!(rule_id = %firing.rule_id, error = %e, "Failed to apply rule action");
            }
        }
    }
}

fn handle_command(
    store: &SiteStore,
    pending: &mut HashMap<EquipmentId, PendingReversal>,
    cmd: Command,
) {
    match cmd {
        Command::ToggleEquipment {
            equipment_id,
            context,
            reply,
        } => {
            if pending.remove(&equipment_id).is_some() {
                debug!(
                    equipment_id = %equipment_id,
                    "Manual toggle cancelled pending reversal"
                );
            }
            let result = store.toggle_equipment(&equipment_id, context);
            let _ = reply.send(result);
        }
    }
}
