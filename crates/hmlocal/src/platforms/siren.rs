use std::sync::Arc;

use async_trait::async_trait;
use linkme::distributed_slice;
use serde_json::Value;

use super::PLATFORMS;
use super::PlatformContext;
use super::PlatformRegistration;
use super::generic_entity::RestoreEntity;
use super::generic_entity::UNRECORDED_ATTRIBUTES;
use super::unexpected;
use crate::engine::Attributes;
use crate::engine::Command;
use crate::engine::Entity;
use crate::engine::EntityCore;
use crate::engine::EntityError;
use crate::engine::EntityService;
use crate::engine::Platform;
use crate::engine::ServiceSchema;
use crate::engine::Validator;
use crate::engine::on_off;
use crate::hub::DataPointCategory;
use crate::hub::DataPointHandle;
use crate::hub::SirenDataPoint;
use crate::hub::SirenOnArgs;

pub const SERVICE_TURN_ON_SIREN: &str = "turn_on_siren";

pub const ATTR_AVAILABLE_TONES: &str = "available_tones";
pub const ATTR_AVAILABLE_LIGHTS: &str = "available_lights";
pub const ATTR_SUPPORTED_FEATURES: &str = "supported_features";

#[distributed_slice(PLATFORMS)]
static SIREN: PlatformRegistration = PlatformRegistration {
    platform: Platform::Siren,
    setup: setup_entry,
};

pub fn setup_entry(ctx: &PlatformContext) {
    ctx.add_data_points(DataPointCategory::Siren, |_, data_point| match data_point {
        DataPointHandle::Siren(dp) => Some(Arc::new(Siren::new(dp)) as _),
        other => unexpected(Platform::Siren, other),
    });

    ctx.register_entity_service(
        SERVICE_TURN_ON_SIREN,
        EntityService {
            platform: Platform::Siren,
            schema: ServiceSchema::new()
                .optional("tone", Validator::String)
                .optional("light", Validator::String)
                .optional("duration", Validator::PositiveInt),
            build: |data| Command::TurnOnSiren {
                tone: data.string("tone"),
                light: data.string("light"),
                duration: data
                    .int("duration")
                    .and_then(|duration| u32::try_from(duration).ok()),
            },
        },
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SirenFeature {
    TurnOn,
    TurnOff,
    Tones,
    Duration,
}

pub struct Siren {
    entity: RestoreEntity<dyn SirenDataPoint>,
    features: Vec<SirenFeature>,
}

impl Siren {
    pub fn new(data_point: Arc<dyn SirenDataPoint>) -> Self {
        let mut features = vec![SirenFeature::TurnOn, SirenFeature::TurnOff];
        if data_point.supports_tones() {
            features.push(SirenFeature::Tones);
        }
        if data_point.supports_duration() {
            features.push(SirenFeature::Duration);
        }
        Self {
            entity: RestoreEntity::new(data_point, Platform::Siren),
            features,
        }
    }

    pub fn is_on(&self) -> Option<bool> {
        let data_point = self.entity.data_point();
        if data_point.is_valid() {
            return Some(data_point.is_on() == Some(true));
        }
        self.entity.restored_state().map(|state| state == "on")
    }

    pub fn supported_features(&self) -> &[SirenFeature] {
        &self.features
    }

    /// Empty tone or light names and a zero duration are left unset.
    fn on_args(
        tone: Option<String>,
        light: Option<String>,
        duration: Option<u32>,
    ) -> SirenOnArgs {
        SirenOnArgs {
            acoustic_alarm: tone.filter(|tone| !tone.is_empty()),
            optical_alarm: light.filter(|light| !light.is_empty()),
            duration: duration.filter(|duration| *duration > 0),
        }
    }
}

#[async_trait]
impl Entity for Siren {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Siren
    }

    fn state_json(&self) -> Value {
        on_off(self.is_on())
    }

    fn extra_state_attributes(&self) -> Attributes {
        let data_point = self.entity.data_point();
        let mut attributes = self.entity.extra_state_attributes();
        if let Some(tones) = data_point.available_tones() {
            attributes.insert(ATTR_AVAILABLE_TONES.into(), tones.into());
        }
        if let Some(lights) = data_point.available_lights() {
            attributes.insert(ATTR_AVAILABLE_LIGHTS.into(), lights.into());
        }
        let features: Vec<Value> = self
            .features
            .iter()
            .map(|feature| feature.to_string().into())
            .collect();
        attributes.insert(ATTR_SUPPORTED_FEATURES.into(), features.into());
        attributes
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        let data_point = self.entity.data_point();
        match command {
            Command::TurnOn => data_point.turn_on(SirenOnArgs::default()).await?,
            Command::TurnOnSiren {
                tone,
                light,
                duration,
            } => {
                data_point
                    .turn_on(Self::on_args(tone, light, duration))
                    .await?
            }
            Command::TurnOff => data_point.turn_off().await?,
            other => return Err(EntityError::unsupported(Platform::Siren, &other)),
        }
        Ok(())
    }
}
