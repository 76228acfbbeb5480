//! Shutters, blinds and garage doors.

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
use crate::hub::CoverDataPoint;
use crate::hub::CoverType;
use crate::hub::DataPointCategory;
use crate::hub::DataPointHandle;

pub const SERVICE_SET_COVER_COMBINED_POSITION: &str = "set_cover_combined_position";

pub const ATTR_CURRENT_POSITION: &str = "current_position";
pub const ATTR_CURRENT_TILT_POSITION: &str = "current_tilt_position";

const POSITION: Validator = Validator::IntRange { min: 0, max: 100 };

#[distributed_slice(PLATFORMS)]
static COVER: PlatformRegistration = PlatformRegistration {
    platform: Platform::Cover,
    setup: setup_entry,
};

pub fn setup_entry(ctx: &PlatformContext) {
    ctx.add_data_points(DataPointCategory::Cover, |_, data_point| match data_point {
        DataPointHandle::Cover(dp) => Some(Arc::new(Cover::new(dp)) as _),
        other => unexpected(Platform::Cover, other),
    });

    ctx.register_entity_service(
        SERVICE_SET_COVER_COMBINED_POSITION,
        EntityService {
            platform: Platform::Cover,
            schema: ServiceSchema::new()
                .required("position", POSITION)
                .optional("tilt_position", POSITION)
                .optional("wait_for_callback", Validator::PositiveInt),
            build: |data| Command::SetCombinedPosition {
                position: data.int("position").map_or(0, clamp_position),
                tilt_position: data.int("tilt_position").map(clamp_position),
                wait_for_callback: data
                    .int("wait_for_callback")
                    .and_then(|wait| u32::try_from(wait).ok()),
            },
        },
    );
}

fn clamp_position(position: i64) -> u8 {
    position.clamp(0, 100) as u8
}

/// Cover family, resolved once when the entity is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverKind {
    Shutter,
    /// Shutter with slats
    Blind,
    Garage,
}

impl From<&CoverType> for CoverKind {
    fn from(cover_type: &CoverType) -> Self {
        match cover_type {
            CoverType::Shutter => CoverKind::Shutter,
            CoverType::Blind => CoverKind::Blind,
            CoverType::IpBlind { operation_mode } if operation_mode.as_deref() == Some("SHUTTER") => {
                CoverKind::Shutter
            }
            CoverType::IpBlind { .. } => CoverKind::Blind,
            CoverType::Garage => CoverKind::Garage,
        }
    }
}

pub struct Cover {
    entity: RestoreEntity<dyn CoverDataPoint>,
    kind: CoverKind,
}

impl Cover {
    pub fn new(data_point: Arc<dyn CoverDataPoint>) -> Self {
        let kind = CoverKind::from(&data_point.cover_type());
        Self {
            entity: RestoreEntity::new(data_point, Platform::Cover),
            kind,
        }
    }

    pub fn kind(&self) -> CoverKind {
        self.kind
    }

    fn supports_tilt(&self) -> bool {
        self.kind == CoverKind::Blind
    }

    fn restored_position(&self, key: &str) -> Option<u8> {
        self.entity
            .restored_attribute(key)?
            .as_u64()
            .and_then(|p| u8::try_from(p).ok())
    }

    pub fn current_position(&self) -> Option<u8> {
        let data_point = self.entity.data_point();
        if data_point.is_valid() {
            return data_point.current_position();
        }
        self.restored_position(ATTR_CURRENT_POSITION)
    }

    /// Only blinds have slats.
    pub fn current_tilt_position(&self) -> Option<u8> {
        if !self.supports_tilt() {
            return None;
        }
        let data_point = self.entity.data_point();
        if data_point.is_valid() {
            return data_point.current_tilt_position();
        }
        self.restored_position(ATTR_CURRENT_TILT_POSITION)
    }

    pub fn is_closed(&self) -> Option<bool> {
        let data_point = self.entity.data_point();
        if data_point.is_valid() {
            return data_point.is_closed();
        }
        self.entity.restored_state().map(|state| state == "closed")
    }

    pub fn is_opening(&self) -> Option<bool> {
        self.entity.data_point().is_opening()
    }

    pub fn is_closing(&self) -> Option<bool> {
        self.entity.data_point().is_closing()
    }

    /// Position and tilt in one call, sent through a call collector.
    async fn set_combined_position(
        &self,
        position: u8,
        tilt_position: Option<u8>,
        wait_for_callback: Option<u32>,
    ) -> Result<(), EntityError> {
        let data_point = self.entity.data_point();
        let collector = data_point.call_collector();
        data_point
            .set_position(Some(position), tilt_position, Some(collector.as_ref()))
            .await?;
        collector.send_data(wait_for_callback).await?;
        Ok(())
    }
}

#[async_trait]
impl Entity for Cover {
    fn core(&self) -> &dyn EntityCore {
        &self.entity
    }

    fn platform(&self) -> Platform {
        Platform::Cover
    }

    fn state_json(&self) -> Value {
        let state = if self.is_opening() == Some(true) {
            "opening"
        } else if self.is_closing() == Some(true) {
            "closing"
        } else {
            match self.is_closed() {
                Some(true) => "closed",
                Some(false) => "open",
                None => return Value::Null,
            }
        };
        state.into()
    }

    fn extra_state_attributes(&self) -> Attributes {
        let mut attributes = self.entity.extra_state_attributes();
        if let Some(position) = self.current_position() {
            attributes.insert(ATTR_CURRENT_POSITION.into(), position.into());
        }
        if let Some(tilt) = self.current_tilt_position() {
            attributes.insert(ATTR_CURRENT_TILT_POSITION.into(), tilt.into());
        }
        attributes
    }

    fn unrecorded_attributes(&self) -> &'static [&'static str] {
        UNRECORDED_ATTRIBUTES
    }

    async fn handle_command(&self, command: Command) -> Result<(), EntityError> {
        let data_point = self.entity.data_point();
        match command {
            Command::Open => data_point.open().await?,
            Command::Close => data_point.close().await?,
            Command::Stop => data_point.stop().await?,
            Command::SetPosition(position) => {
                data_point
                    .set_position(Some(position.min(100)), None, None)
                    .await?
            }
            Command::SetCombinedPosition {
                position,
                tilt_position,
                wait_for_callback,
            } => {
                self.set_combined_position(position, tilt_position, wait_for_callback)
                    .await?
            }
            Command::OpenTilt if self.supports_tilt() => data_point.open_tilt().await?,
            Command::CloseTilt if self.supports_tilt() => data_point.close_tilt().await?,
            Command::StopTilt if self.supports_tilt() => data_point.stop_tilt().await?,
            Command::SetTiltPosition(tilt) if self.supports_tilt() => {
                data_point
                    .set_position(None, Some(tilt.min(100)), None)
                    .await?
            }
            other => return Err(EntityError::unsupported(Platform::Cover, &other)),
        }
        Ok(())
    }
}
