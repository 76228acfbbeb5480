//! Entity platforms
//!
//! Each platform module registers a setup function in [`PLATFORMS`]. Setup
//! connects the platform to the "new data point" signals of its categories,
//! wraps every announced data point in an entity and drains the data points
//! the control unit already knows about.

pub mod binary_sensor;
pub mod button;
pub mod cover;
pub mod event;
pub mod generic_entity;
pub mod lock;
pub mod number;
pub mod select;
pub mod sensor;
pub mod siren;
pub mod switch;
pub mod text;
pub mod update;

use std::sync::Arc;

use linkme::distributed_slice;
use tracing::debug;
use tracing::info;

use crate::config::IntegrationConfig;
use crate::engine::ConfigEntry;
use crate::engine::Dispatcher;
use crate::engine::Engine;
use crate::engine::EngineMessage;
use crate::engine::EngineSender;
use crate::engine::Entity;
use crate::engine::EntityService;
use crate::engine::Platform;
use crate::engine::Signal;
use crate::engine::SignalCallback;
use crate::hub::ControlUnit;
use crate::hub::DataPointCategory;
use crate::hub::DataPointHandle;

pub const DOMAIN: &str = "homematicip_local";

/// Everything a platform setup needs for one config entry.
pub struct PlatformContext {
    pub engine: Arc<Engine>,
    pub entry: Arc<ConfigEntry>,
    pub dispatcher: Dispatcher,
    pub control_unit: Arc<dyn ControlUnit>,
}

/// Hands wrapped entities to the engine.
#[derive(Clone)]
pub struct EntitySink {
    sender: EngineSender,
    entry_id: String,
}

impl EntitySink {
    /// Returns the number of entities handed over; empty batches are dropped.
    pub fn add_entities(&self, entities: Vec<Arc<dyn Entity>>) -> usize {
        if entities.is_empty() {
            return 0;
        }
        let count = entities.len();
        let msg = EngineMessage::AddEntities {
            entry_id: self.entry_id.clone(),
            entities,
        };
        if self.sender.send(msg).is_err() {
            debug!("Engine is gone, dropping {} entities", count);
            return 0;
        }
        count
    }
}

impl PlatformContext {
    pub fn entity_sink(&self) -> EntitySink {
        EntitySink {
            sender: self.engine.sender(),
            entry_id: self.entry.entry_id().to_string(),
        }
    }

    /// Wrap the data points of `category`: those announced later through the
    /// dispatcher and those the control unit already has.
    ///
    /// `wrap` returns `None` for data points the platform cannot represent.
    pub fn add_data_points<F>(&self, category: DataPointCategory, wrap: F)
    where
        F: Fn(&Arc<dyn ControlUnit>, DataPointHandle) -> Option<Arc<dyn Entity>>
            + Send
            + Sync
            + 'static,
    {
        let sink = self.entity_sink();
        let control_unit = self.control_unit.clone();
        let platform = category.platform();
        let add = Arc::new(move |data_points: Vec<DataPointHandle>| {
            debug!("Adding {} {} data points", data_points.len(), category);
            let entities = data_points
                .into_iter()
                .filter_map(|data_point| wrap(&control_unit, data_point))
                .filter(|entity| {
                    let matches = entity.platform() == platform;
                    if !matches {
                        debug!(
                            "Dropping {} entity {} announced as {}",
                            entity.platform(),
                            entity.unique_id(),
                            category
                        );
                    }
                    matches
                })
                .collect();
            sink.add_entities(entities);
        });

        let signal = Signal::new_data_point(self.entry.entry_id(), category);
        let callback: SignalCallback = add.clone();
        self.entry
            .on_unload(self.dispatcher.connect(signal, callback));

        let existing = if category.is_hub() {
            self.control_unit.new_hub_data_points(category)
        } else {
            self.control_unit.new_data_points(category)
        };
        add(existing);
    }

    pub fn register_entity_service(&self, name: &str, service: EntityService) {
        self.engine.register_entity_service(name, service);
    }
}

/// A platform's entry in the setup registry.
pub struct PlatformRegistration {
    pub platform: Platform,
    pub setup: fn(&PlatformContext),
}

#[distributed_slice]
pub static PLATFORMS: [PlatformRegistration];

/// Set up every registered platform not blocked by configuration.
///
/// Returns the platforms that were set up, sorted.
pub fn setup_entry(ctx: &PlatformContext, config: &IntegrationConfig) -> Vec<Platform> {
    let mut platforms = Vec::new();
    for registration in PLATFORMS {
        if config.blocked_platforms.contains(&registration.platform) {
            info!(
                "Platform {} is blocked for entry {}",
                registration.platform,
                ctx.entry.entry_id()
            );
            continue;
        }
        (registration.setup)(ctx);
        platforms.push(registration.platform);
    }
    platforms.sort();
    info!(
        "Set up {} platforms for entry {}",
        platforms.len(),
        ctx.entry.entry_id()
    );
    platforms
}

/// Disconnect every platform of the entry and remove its entities.
///
/// Returns the number of entities removed.
pub async fn unload_entry(engine: &Engine, entry: &ConfigEntry) -> usize {
    let subscriptions = entry.unload();
    let removed = engine.unload_entry(entry.entry_id()).await;
    info!(
        "Unloaded entry {}: {} subscriptions, {} entities",
        entry.entry_id(),
        subscriptions,
        removed
    );
    removed
}

/// Log and drop a data point handed to the wrong platform.
pub(crate) fn unexpected(platform: Platform, data_point: DataPointHandle) -> Option<Arc<dyn Entity>> {
    debug!(
        "Platform {} ignores data point {:?}",
        platform, data_point
    );
    None
}
