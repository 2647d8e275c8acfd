use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::attribute::AttributeInstance;
use crate::model::object::ObjectInstance;

/// The dehydrated link row of a port instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortInstanceRow {
    pub uuid: Uuid,
    pub port_uuid: Uuid,
    pub class_instance_uuid: Option<Uuid>,
    pub scene_instance_uuid: Option<Uuid>,
}

/// A port instance: a connection point defined by a metamodel port, owned by a
/// class instance and/or placed directly on a scene instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortInstance {
    #[serde(flatten)]
    pub base: ObjectInstance,
    /// Defining port in the metamodel.
    pub port_uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_instance_uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_instance_uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_instances: Vec<AttributeInstance>,
}

impl PortInstance {
    pub fn new(port_uuid: Uuid) -> Self {
        Self {
            base: ObjectInstance::new(),
            port_uuid,
            class_instance_uuid: None,
            scene_instance_uuid: None,
            attribute_instances: Vec::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.base.uuid
    }

    pub fn row(&self) -> PortInstanceRow {
        PortInstanceRow {
            uuid: self.base.uuid,
            port_uuid: self.port_uuid,
            class_instance_uuid: self.class_instance_uuid,
            scene_instance_uuid: self.scene_instance_uuid,
        }
    }

    pub fn from_parts(base: ObjectInstance, row: PortInstanceRow) -> Self {
        Self {
            base,
            port_uuid: row.port_uuid,
            class_instance_uuid: row.class_instance_uuid,
            scene_instance_uuid: row.scene_instance_uuid,
            attribute_instances: Vec::new(),
        }
    }
}
