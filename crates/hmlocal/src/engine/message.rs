//! Message types for hmlocal
//!
//! Messages are split by direction:
//! - `EngineMessage`: requests from entities and platforms to the engine
//! - `Command`: actions the engine routes to a single entity

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::entity::Entity;

/// Channel types for messages TO the engine.
///
/// Unbounded because the senders are synchronous library callbacks that must
/// never block.
pub type EngineSender = mpsc::UnboundedSender<EngineMessage>;
pub type EngineReceiver = mpsc::UnboundedReceiver<EngineMessage>;

/// What a removal request takes with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalScope {
    /// The entity and, if still registered, its whole device.
    Device,
    /// Only the entity's registry entry.
    Entity,
}

/// Messages FROM platforms and entities TO the engine
pub enum EngineMessage {
    /// A platform wrapped new data points
    AddEntities {
        entry_id: String,
        entities: Vec<Arc<dyn Entity>>,
    },

    /// An entity's data point changed; write its state again
    StateChanged { unique_id: String },

    /// The library reported that an entity's device is gone
    Remove {
        unique_id: String,
        scope: RemovalScope,
    },
}

impl fmt::Debug for EngineMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineMessage::AddEntities { entry_id, entities } => f
                .debug_struct("AddEntities")
                .field("entry_id", entry_id)
                .field(
                    "entities",
                    &entities.iter().map(|e| e.unique_id()).collect::<Vec<_>>(),
                )
                .finish(),
            EngineMessage::StateChanged { unique_id } => f
                .debug_struct("StateChanged")
                .field("unique_id", unique_id)
                .finish(),
            EngineMessage::Remove { unique_id, scope } => f
                .debug_struct("Remove")
                .field("unique_id", unique_id)
                .field("scope", scope)
                .finish(),
        }
    }
}

/// Commands FROM the engine TO a single entity
#[derive(Debug, Clone, PartialEq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    Press,
    Open,
    Close,
    Stop,
    SetPosition(u8),
    OpenTilt,
    CloseTilt,
    StopTilt,
    SetTiltPosition(u8),
    SetCombinedPosition {
        position: u8,
        tilt_position: Option<u8>,
        wait_for_callback: Option<u32>,
    },
    Lock,
    Unlock,
    TurnOn,
    TurnOff,
    TurnOnSiren {
        tone: Option<String>,
        light: Option<String>,
        duration: Option<u32>,
    },
    SetOnTime(f64),
    SetNativeValue(f64),
    SelectOption(String),
    SetValue(String),
    Install {
        version: Option<String>,
        backup: bool,
    },
}
