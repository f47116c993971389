pub mod supervisor;

pub use common::actors::{Actor, ActorType, ControlMessage};
pub use supervisor::{ActorFactory, Supervisor};
