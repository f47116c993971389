use std::{collections::HashMap, time::Duration};
use tracing::{debug, error, info, warn};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::actors::{Actor, ControlMessage};

pub type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

const DEFAULT_GRACE: Duration = Duration::from_secs(10);

struct Slot {
    factory: ActorFactory,
    stall_timeout: Duration,
    handle: Option<JoinHandle<()>>,
    pulse: Instant,
    actor_id: Option<Uuid>,
    stopped: bool,
}

/// Keeps every registered actor alive until `shutdown` fires.
pub struct Supervisor {
    slots: HashMap<String, Slot>,
    owners: HashMap<Uuid, String>,
    shutdown: CancellationToken,
    grace: Duration,
}

impl Supervisor {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            slots: HashMap::new(),
            owners: HashMap::new(),
            shutdown,
            grace: DEFAULT_GRACE,
        }
    }

    /// How long `start` waits for actors to exit after shutdown before aborting them.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn register_actor(
        &mut self,
        label: impl Into<String>,
        stall_timeout: Duration,
        factory: ActorFactory,
    ) {
        self.slots.insert(
            label.into(),
            Slot {
                factory,
                stall_timeout,
                handle: None,
                pulse: Instant::now(),
                actor_id: None,
                stopped: false,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub async fn start(&mut self) {
        let mut check_interval = time::interval(Duration::from_secs(1));
        check_interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        let (supervisor_tx, mut supervisor_rx) = mpsc::channel::<ControlMessage>(512);
        let shutdown = self.shutdown.clone();

        let labels: Vec<String> = self.slots.keys().cloned().collect();
        labels.into_iter().for_each(|label| {
            self.spawn_actor(&label, supervisor_tx.clone());
        });

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, draining {} actors", self.slots.len());
                    break;
                }

                Some(msg) = supervisor_rx.recv() => self.handle_message(msg),

                _ = check_interval.tick() => {
                    // A Shutdown queued by an actor that just exited must land first.
                    while let Ok(msg) = supervisor_rx.try_recv() {
                        self.handle_message(msg);
                    }

                    let now = Instant::now();
                    let mut restart = Vec::new();

                    for (label, slot) in self.slots.iter_mut() {
                        if slot.stopped {
                            continue;
                        }
                        let finished = slot.handle.as_ref().is_none_or(|h| h.is_finished());
                        if finished {
                            warn!("{} exited unexpectedly, respawning", label);
                            restart.push(label.clone());
                        } else if now.duration_since(slot.pulse) > slot.stall_timeout {
                            warn!("{} is unresponsive!", label);
                            if let Some(handle) = slot.handle.take() {
                                handle.abort();
                            }
                            restart.push(label.clone());
                        }
                    }

                    restart.into_iter().for_each(|label| {
                        self.spawn_actor(&label, supervisor_tx.clone());
                    });
                }
            }
        }

        self.drain().await;
    }

    fn handle_message(&mut self, msg: ControlMessage) {
        match msg {
            ControlMessage::Heartbeat(id) => {
                if let Some(slot) = self.slot_of(id) {
                    slot.pulse = Instant::now();
                }
            }
            ControlMessage::Shutdown(id) => {
                warn!("{} is shutting down gracefully.", self.label_of(id));
                if let Some(slot) = self.slot_of(id) {
                    slot.stopped = true;
                }
            }
            ControlMessage::Error(id, error_msg) => {
                error!("Actor {} reported error: {}", self.label_of(id), error_msg);
                if let Some(slot) = self.slot_of(id) {
                    slot.pulse = Instant::now();
                }
            }
        }
    }

    async fn drain(&mut self) {
        let deadline = Instant::now() + self.grace;

        for (label, slot) in self.slots.iter_mut() {
            let Some(mut handle) = slot.handle.take() else {
                continue;
            };
            match time::timeout_at(deadline, &mut handle).await {
                Ok(_) => debug!("{} stopped", label),
                Err(_) => {
                    warn!("{} did not stop within {:?}, aborting", label, self.grace);
                    handle.abort();
                }
            }
        }
        self.owners.clear();
    }

    fn spawn_actor(&mut self, label: &str, tx: mpsc::Sender<ControlMessage>) {
        let Some(slot) = self.slots.get_mut(label) else {
            return;
        };

        let mut new_actor = (slot.factory)();
        let actor_id = new_actor.id();
        let actor_type = new_actor.name();
        let owner = label.to_string();
        let new_actor_handle = tokio::spawn(async move {
            if let Err(e) = new_actor.run(tx).await {
                error!("Actor {} ({:?}) crashed: {}", owner, actor_type, e);
            }
        });

        if let Some(previous) = slot.actor_id.replace(actor_id) {
            self.owners.remove(&previous);
        }
        slot.handle = Some(new_actor_handle);
        slot.pulse = Instant::now();
        self.owners.insert(actor_id, label.to_string());
    }

    fn slot_of(&mut self, id: Uuid) -> Option<&mut Slot> {
        let label = self.owners.get(&id)?;
        self.slots.get_mut(label)
    }

    fn label_of(&self, id: Uuid) -> &str {
        self.owners.get(&id).map(String::as_str).unwrap_or("unknown actor")
    }
}
