mod config_entry;
mod device;
mod dispatcher;
#[allow(clippy::module_inception)]
mod engine;
mod entity;
mod message;
mod restore;
mod service;
mod translations;

pub use config_entry::ConfigEntry;
pub use device::DeviceEntry;
pub use device::DeviceInfo;
pub use device::DeviceRegistry;
pub use dispatcher::Dispatcher;
pub use dispatcher::Signal;
pub use dispatcher::SignalCallback;
pub use engine::Engine;
pub use engine::EntityState;
pub use entity::Attributes;
pub use entity::Entity;
pub use entity::EntityContext;
pub use entity::EntityCore;
pub use entity::EntityError;
pub use entity::Platform;
pub use entity::on_off;
pub use message::Command;
pub use message::EngineMessage;
pub use message::EngineReceiver;
pub use message::EngineSender;
pub use message::RemovalScope;
pub use restore::RestoreCache;
pub use restore::RestoredState;
pub use service::EntityService;
pub use service::ServiceData;
pub use service::ServiceError;
pub use service::ServiceSchema;
pub use service::Validator;
pub use translations::Translations;
