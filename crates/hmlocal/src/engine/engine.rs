use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::device::DeviceEntry;
use super::device::DeviceRegistry;
use super::entity::Attributes;
use super::entity::Entity;
use super::entity::EntityContext;
use super::entity::EntityError;
use super::message::Command;
use super::message::EngineMessage;
use super::message::EngineReceiver;
use super::message::EngineSender;
use super::message::RemovalScope;
use super::restore::RestoreCache;
use super::restore::RestoredState;
use super::service::EntityService;
use super::service::ServiceError;
use super::translations::Translations;

/// Last written state of an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub state: serde_json::Value,
    pub attributes: Attributes,
    pub available: bool,
    pub name: Option<String>,
}

struct EntityRecord {
    entity: Arc<dyn Entity>,
    entry_id: String,
    device_id: Option<String>,
    enabled: Arc<AtomicBool>,
}

/// hmlocal engine
///
/// Host side of the adapter: keeps the entity and device registries, writes
/// entity states, routes commands and services to entities and reacts to the
/// messages entities send back.
pub struct Engine {
    /// unique_id -> registered entity
    entities: std::sync::Mutex<HashMap<String, EntityRecord>>,

    /// unique_id -> last written state
    states: std::sync::Mutex<HashMap<String, EntityState>>,

    devices: std::sync::Mutex<DeviceRegistry>,

    restore: RestoreCache,

    /// service name -> service
    services: std::sync::Mutex<HashMap<String, EntityService>>,

    translations: Translations,

    /// Registry enabled flags set before an entity was added
    enabled_overrides: std::sync::Mutex<HashMap<String, bool>>,

    /// Receive messages from entities and platforms
    message_rx: Mutex<EngineReceiver>,

    /// Sender handed to entities and platforms
    message_tx: EngineSender,
}

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        Self {
            entities: std::sync::Mutex::new(HashMap::new()),
            states: std::sync::Mutex::new(HashMap::new()),
            devices: std::sync::Mutex::new(DeviceRegistry::default()),
            restore: RestoreCache::default(),
            services: std::sync::Mutex::new(HashMap::new()),
            translations: Translations::default(),
            enabled_overrides: std::sync::Mutex::new(HashMap::new()),
            message_rx: Mutex::new(message_rx),
            message_tx,
        }
    }

    pub fn sender(&self) -> EngineSender {
        self.message_tx.clone()
    }

    /// States persisted by a previous run, consulted when entities are added.
    pub fn restore_cache(&self) -> &RestoreCache {
        &self.restore
    }

    pub fn translations(&self) -> &Translations {
        &self.translations
    }

    /// Run the engine's main event loop
    pub async fn run(&self) {
        info!("Engine starting");

        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            self.handle_message(msg).await;
        }

        info!("Engine shutting down");
    }

    /// Handle every message queued so far, including those queued while
    /// handling. Returns the number of messages handled.
    pub async fn process_pending(&self) -> usize {
        let mut rx = self.message_rx.lock().await;
        let mut handled = 0;
        while let Ok(msg) = rx.try_recv() {
            self.handle_message(msg).await;
            handled += 1;
        }
        handled
    }

    async fn handle_message(&self, msg: EngineMessage) {
        debug!("Engine message: {:?}", msg);
        match msg {
            EngineMessage::AddEntities { entry_id, entities } => {
                for entity in entities {
                    self.add_entity(&entry_id, entity).await;
                }
            }
            EngineMessage::StateChanged { unique_id } => {
                self.write_state(&unique_id);
            }
            EngineMessage::Remove { unique_id, scope } => {
                self.remove(&unique_id, scope).await;
            }
        }
    }

    /// Register an entity, link it to its device and let it subscribe to its data point.
    pub async fn add_entity(&self, entry_id: &str, entity: Arc<dyn Entity>) {
        let unique_id = entity.unique_id().to_string();
        let enabled = self
            .enabled_overrides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&unique_id)
            .copied()
            .unwrap_or_else(|| entity.enabled_default());
        let enabled = Arc::new(AtomicBool::new(enabled));

        {
            let mut entities = self.entities.lock().unwrap_or_else(PoisonError::into_inner);
            if entities.contains_key(&unique_id) {
                warn!("Entity {} is already registered, skipping", unique_id);
                return;
            }
            let device_id = entity.device_info().and_then(|info| {
                self.devices
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .link_entity(info, &unique_id)
            });
            entities.insert(
                unique_id.clone(),
                EntityRecord {
                    entity: entity.clone(),
                    entry_id: entry_id.to_string(),
                    device_id,
                    enabled: enabled.clone(),
                },
            );
        }
        info!("Entity added: {} ({})", unique_id, entity.platform());

        let ctx = EntityContext {
            sender: self.message_tx.clone(),
            enabled,
            restored: self.restore.get(&unique_id),
            translations: self.translations.clone(),
        };
        if let Err(e) = entity.added(ctx).await {
            warn!("Entity {} failed to load its initial value: {}", unique_id, e);
        }
        self.write_state(&unique_id);
    }

    /// Write the current state of an enabled entity. Returns whether a state was written.
    pub fn write_state(&self, unique_id: &str) -> bool {
        let Some(entity) = self.enabled_entity(unique_id) else {
            return false;
        };
        let state = EntityState {
            state: entity.state_json(),
            attributes: entity.extra_state_attributes(),
            available: entity.available(),
            name: entity.name(),
        };
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(unique_id.to_string(), state);
        true
    }

    /// Toggle the registry enabled flag. Disabled entities keep their
    /// subscriptions but have no state.
    pub fn set_entity_enabled(&self, unique_id: &str, enabled: bool) {
        self.enabled_overrides
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(unique_id.to_string(), enabled);

        let flag = self
            .entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(unique_id)
            .map(|record| record.enabled.clone());
        let Some(flag) = flag else {
            return;
        };
        flag.store(enabled, Ordering::SeqCst);
        if enabled {
            self.write_state(unique_id);
        } else {
            self.states
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(unique_id);
        }
    }

    /// Handle a removal request from an entity.
    ///
    /// Device scope removes the entity, then the device it is linked to and
    /// every other entity of that device. The device registry hands out a
    /// device only once, so concurrent requests from sibling entities find
    /// nothing left to do.
    pub async fn remove(&self, unique_id: &str, scope: RemovalScope) {
        let device_id = self
            .entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(unique_id)
            .and_then(|record| record.device_id.clone());

        self.force_remove(unique_id).await;

        if scope == RemovalScope::Entity {
            return;
        }
        let Some(device_id) = device_id else {
            return;
        };
        let removed = self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove_device(&device_id);
        match removed {
            Some(device) => {
                info!("Device removed: {}", device.id);
                for entity_id in &device.entity_ids {
                    self.force_remove(entity_id).await;
                }
            }
            None => debug!("Device {} already removed", device_id),
        }
    }

    /// Drop an entity from the registry, remembering its last state for restore.
    ///
    /// Returns false when the entity was not registered.
    pub async fn force_remove(&self, unique_id: &str) -> bool {
        let record = self
            .entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(unique_id);
        let Some(record) = record else {
            return false;
        };

        let last_state = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(unique_id);
        if let Some(last_state) = last_state {
            self.restore
                .insert(unique_id, snapshot(record.entity.as_ref(), last_state));
        }
        if let Some(device_id) = &record.device_id {
            self.devices
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .unlink_entity(device_id, unique_id);
        }

        record.entity.will_remove().await;
        info!("Entity removed: {}", unique_id);
        true
    }

    /// Remove every entity of a config entry. Returns how many were removed.
    pub async fn unload_entry(&self, entry_id: &str) -> usize {
        let unique_ids: Vec<String> = self
            .entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, record)| record.entry_id == entry_id)
            .map(|(unique_id, _)| unique_id.clone())
            .collect();

        let mut removed = 0;
        for unique_id in unique_ids {
            if self.force_remove(&unique_id).await {
                removed += 1;
            }
        }
        removed
    }

    /// Route a command to the entity that owns `unique_id`.
    pub async fn send_command(&self, unique_id: &str, command: Command) -> Result<(), EntityError> {
        let entity = self
            .entity(unique_id)
            .ok_or_else(|| EntityError::NotFound(unique_id.to_string()))?;
        entity.handle_command(command).await?;
        self.write_state(unique_id);
        Ok(())
    }

    /// Manual refresh of an entity's value.
    pub async fn update_entity(&self, unique_id: &str) -> Result<(), EntityError> {
        let entity = self
            .entity(unique_id)
            .ok_or_else(|| EntityError::NotFound(unique_id.to_string()))?;
        entity.update().await?;
        self.write_state(unique_id);
        Ok(())
    }

    pub fn register_entity_service(&self, name: &str, service: EntityService) {
        let mut services = self.services.lock().unwrap_or_else(PoisonError::into_inner);
        if services.insert(name.to_string(), service).is_none() {
            debug!("Registered entity service {}", name);
        }
    }

    pub fn has_service(&self, name: &str) -> bool {
        self.services
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Validate `data` against the service schema and run it on one entity.
    pub async fn call_service(
        &self,
        name: &str,
        unique_id: &str,
        data: &serde_json::Value,
    ) -> Result<(), ServiceError> {
        let service = self
            .services
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownService(name.to_string()))?;
        let entity = self
            .entity(unique_id)
            .ok_or_else(|| EntityError::NotFound(unique_id.to_string()))?;
        if entity.platform() != service.platform {
            return Err(ServiceError::WrongPlatform {
                service: name.to_string(),
                platform: entity.platform(),
            });
        }

        let command = service.command(data)?;
        self.send_command(unique_id, command).await?;
        Ok(())
    }

    pub fn state(&self, unique_id: &str) -> Option<EntityState> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(unique_id)
            .cloned()
    }

    pub fn entity(&self, unique_id: &str) -> Option<Arc<dyn Entity>> {
        self.entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(unique_id)
            .map(|record| record.entity.clone())
    }

    /// Registered unique ids, sorted.
    pub fn entity_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn device(&self, device_id: &str) -> Option<DeviceEntry> {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device_id)
            .cloned()
    }

    pub fn device_count(&self) -> usize {
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn enabled_entity(&self, unique_id: &str) -> Option<Arc<dyn Entity>> {
        let entities = self.entities.lock().unwrap_or_else(PoisonError::into_inner);
        let record = entities.get(unique_id)?;
        record
            .enabled
            .load(Ordering::SeqCst)
            .then(|| record.entity.clone())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Restore snapshot of a removed entity, without its unrecorded attributes.
fn snapshot(entity: &dyn Entity, last: EntityState) -> RestoredState {
    let state = match last.state {
        serde_json::Value::Null => "unknown".to_string(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    };
    let mut attributes = last.attributes;
    for key in entity.unrecorded_attributes() {
        attributes.remove(*key);
    }
    RestoredState {
        state,
        attributes,
        native_value: entity.extra_restore_data(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::engine::DeviceInfo;
    use crate::engine::EntityCore;
    use crate::engine::Platform;
    use crate::engine::service::ServiceSchema;
    use crate::engine::service::Validator;

    struct TestEntity {
        unique_id: String,
        device: Option<DeviceInfo>,
        removed: AtomicUsize,
        commands: std::sync::Mutex<Vec<Command>>,
    }

    impl TestEntity {
        fn new(unique_id: &str, device: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                unique_id: unique_id.to_string(),
                device: device.map(|d| DeviceInfo::linked("homematicip_local", d)),
                removed: AtomicUsize::new(0),
                commands: std::sync::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl EntityCore for TestEntity {
        fn unique_id(&self) -> &str {
            &self.unique_id
        }

        fn name(&self) -> Option<String> {
            None
        }

        fn available(&self) -> bool {
            true
        }

        fn device_info(&self) -> Option<DeviceInfo> {
            self.device.clone()
        }

        fn enabled_default(&self) -> bool {
            true
        }

        fn extra_state_attributes(&self) -> Attributes {
            let mut attributes = Attributes::new();
            attributes.insert("address".into(), json!("VCU0000001:1"));
            attributes.insert("current_position".into(), json!(40));
            attributes
        }

        async fn added(&self, _ctx: EntityContext) -> Result<(), EntityError> {
            Ok(())
        }

        async fn will_remove(&self) {
            self.removed.fetch_add(1, Ordering::SeqCst);
        }

        async fn update(&self) -> Result<(), EntityError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Entity for TestEntity {
        fn core(&self) -> &dyn EntityCore {
            self
        }

        fn platform(&self) -> Platform {
            Platform::Cover
        }

        fn state_json(&self) -> serde_json::Value {
            json!("open")
        }

        fn unrecorded_attributes(&self) -> &'static [&'static str] {
            &["address"]
        }

        async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
            self.commands.lock().unwrap().push(command);
            Ok(())
        }
    }

    fn add(engine: &Engine, entities: Vec<Arc<TestEntity>>) {
        let entities = entities
            .into_iter()
            .map(|e| e as Arc<dyn Entity>)
            .collect();
        engine
            .sender()
            .send(EngineMessage::AddEntities {
                entry_id: "entry".to_string(),
                entities,
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_entities_writes_state_and_links_device() {
        let engine = Engine::new();
        add(
            &engine,
            vec![TestEntity::new("a", Some("DEV1")), TestEntity::new("b", Some("DEV1"))],
        );
        assert_eq!(engine.process_pending().await, 1);

        assert_eq!(engine.entity_ids(), vec!["a", "b"]);
        assert_eq!(engine.state("a").unwrap().state, json!("open"));
        assert_eq!(engine.device_count(), 1);
        let device = engine.device("homematicip_local:DEV1").unwrap();
        assert_eq!(device.entity_ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_device_removal_happens_once() {
        let engine = Engine::new();
        let a = TestEntity::new("a", Some("DEV1"));
        let b = TestEntity::new("b", Some("DEV1"));
        add(&engine, vec![a.clone(), b.clone()]);
        engine.process_pending().await;

        for unique_id in ["a", "b"] {
            engine
                .sender()
                .send(EngineMessage::Remove {
                    unique_id: unique_id.to_string(),
                    scope: RemovalScope::Device,
                })
                .unwrap();
        }
        engine.process_pending().await;

        assert!(engine.entity_ids().is_empty());
        assert_eq!(engine.device_count(), 0);
        assert_eq!(a.removed.load(Ordering::SeqCst), 1);
        assert_eq!(b.removed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_entity_scope_keeps_device() {
        let engine = Engine::new();
        add(
            &engine,
            vec![TestEntity::new("a", Some("DEV1")), TestEntity::new("b", Some("DEV1"))],
        );
        engine.process_pending().await;

        engine.remove("a", RemovalScope::Entity).await;

        assert_eq!(engine.entity_ids(), vec!["b"]);
        assert_eq!(
            engine.device("homematicip_local:DEV1").unwrap().entity_ids,
            vec!["b"]
        );
    }

    #[tokio::test]
    async fn test_force_remove_snapshots_recorded_attributes() {
        let engine = Engine::new();
        add(&engine, vec![TestEntity::new("a", None)]);
        engine.process_pending().await;

        assert!(engine.force_remove("a").await);
        assert!(!engine.force_remove("a").await);

        let restored = engine.restore_cache().get("a").unwrap();
        assert_eq!(restored.state, "open");
        assert_eq!(restored.attribute("current_position"), Some(&json!(40)));
        assert_eq!(restored.attribute("address"), None);
    }

    #[tokio::test]
    async fn test_disabled_entity_has_no_state() {
        let engine = Engine::new();
        engine.set_entity_enabled("a", false);
        add(&engine, vec![TestEntity::new("a", None)]);
        engine.process_pending().await;

        assert!(engine.state("a").is_none());
        engine.set_entity_enabled("a", true);
        assert!(engine.state("a").is_some());
    }

    #[tokio::test]
    async fn test_duplicate_unique_id_is_skipped() {
        let engine = Engine::new();
        let first = TestEntity::new("a", None);
        engine.add_entity("entry", first.clone()).await;
        engine.add_entity("entry", TestEntity::new("a", None)).await;

        assert_eq!(engine.entity_ids().len(), 1);
        assert!(Arc::ptr_eq(
            &(engine.entity("a").unwrap()),
            &(first as Arc<dyn Entity>)
        ));
    }

    #[tokio::test]
    async fn test_call_service_validates_and_routes() {
        let engine = Engine::new();
        let entity = TestEntity::new("a", None);
        engine.add_entity("entry", entity.clone()).await;
        engine.register_entity_service(
            "set_position",
            EntityService {
                platform: Platform::Cover,
                schema: ServiceSchema::new()
                    .required("position", Validator::IntRange { min: 0, max: 100 }),
                build: |data| Command::SetPosition(data.int("position").unwrap_or(0) as u8),
            },
        );

        engine
            .call_service("set_position", "a", &json!({"position": 70}))
            .await
            .unwrap();
        assert!(matches!(
            engine
                .call_service("set_position", "a", &json!({"position": 170}))
                .await,
            Err(ServiceError::InvalidField { .. })
        ));
        assert!(matches!(
            engine.call_service("nope", "a", &json!({})).await,
            Err(ServiceError::UnknownService(_))
        ));
        assert!(matches!(
            engine
                .call_service("set_position", "missing", &json!({"position": 1}))
                .await,
            Err(ServiceError::Entity(EntityError::NotFound(_)))
        ));

        assert_eq!(*entity.commands.lock().unwrap(), vec![Command::SetPosition(70)]);
    }

    #[tokio::test]
    async fn test_unload_entry_removes_entities() {
        let engine = Engine::new();
        engine.add_entity("entry", TestEntity::new("a", None)).await;
        engine.add_entity("other", TestEntity::new("b", None)).await;

        assert_eq!(engine.unload_entry("entry").await, 1);
        assert_eq!(engine.entity_ids(), vec!["b"]);
    }
}
