use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::FetchMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorType {
    RealtimeCollector,
    HistoricalCollector,
}

impl From<FetchMode> for ActorType {
    fn from(mode: FetchMode) -> Self {
        match mode {
            FetchMode::Realtime => Self::RealtimeCollector,
            FetchMode::Historical => Self::HistoricalCollector,
        }
    }
}

/// Messages sent from Actors to the Supervisor
pub enum ControlMessage {
    Heartbeat(Uuid),
    Shutdown(Uuid),
    Error(Uuid, String),
}

impl std::fmt::Debug for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Heartbeat(id) => write!(f, "Heartbeat({:?})", id),
            Self::Shutdown(id) => write!(f, "Shutdown({:?})", id),
            Self::Error(id, err) => write!(f, "Error({:?}, {})", id, err),
        }
    }
}

/// The trait that all restartable services must implement
#[async_trait]
pub trait Actor: Send + Sync {
    fn name(&self) -> ActorType;

    fn id(&self) -> Uuid;

    /// The main loop of the actor.
    /// It must send `ControlMessage::Heartbeat` at least once per cycle and
    /// `ControlMessage::Shutdown` before returning on request.
    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()>;
}
