use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::attribute::AttributeInstance;
use crate::model::class::ClassInstance;
use crate::model::object::ObjectInstance;
use crate::model::port::PortInstance;
use crate::model::relationclass::RelationclassInstance;
use crate::model::role::RoleInstance;

/// The dehydrated link row of a scene instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneInstanceRow {
    pub uuid: Uuid,
    pub scene_type_uuid: Uuid,
}

/// A scene instance: a model canvas conforming to a scene type. Class and
/// relationclass instances are members through the scene assignment join
/// (membership, not embedded ownership, so a class instance survives removal
/// from a scene). Ports, attributes and roles attach through their own scene
/// references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneInstance {
    #[serde(flatten)]
    pub base: ObjectInstance,
    /// Defining scene type in the metamodel.
    pub scene_type_uuid: Uuid,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub class_instances: Vec<ClassInstance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationclass_instances: Vec<RelationclassInstance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_instances: Vec<PortInstance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_instances: Vec<AttributeInstance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub role_instances: Vec<RoleInstance>,
}

impl SceneInstance {
    pub fn new(scene_type_uuid: Uuid) -> Self {
        Self {
            base: ObjectInstance::new(),
            scene_type_uuid,
            class_instances: Vec::new(),
            relationclass_instances: Vec::new(),
            port_instances: Vec::new(),
            attribute_instances: Vec::new(),
            role_instances: Vec::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.base.uuid
    }

    pub fn row(&self) -> SceneInstanceRow {
        SceneInstanceRow {
            uuid: self.base.uuid,
            scene_type_uuid: self.scene_type_uuid,
        }
    }

    pub fn from_parts(base: ObjectInstance, row: SceneInstanceRow) -> Self {
        Self {
            base,
            scene_type_uuid: row.scene_type_uuid,
            class_instances: Vec::new(),
            relationclass_instances: Vec::new(),
            port_instances: Vec::new(),
            attribute_instances: Vec::new(),
            role_instances: Vec::new(),
        }
    }
}
