use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::attribute::AttributeInstance;
use crate::model::object::ObjectInstance;
use crate::model::port::PortInstance;

/// The dehydrated link row of a class instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInstanceRow {
    pub uuid: Uuid,
    pub class_uuid: Uuid,
    pub relationclass_uuid: Option<Uuid>,
    pub decomposable_scene_uuid: Option<Uuid>,
    pub aggregator_uuid: Option<Uuid>,
    pub bendpoint_relationclass_uuid: Option<Uuid>,
}

/// A class instance: a placed object conforming to a metamodel class. The
/// optional references mark special realizations: an instance created from a
/// relationclass, an instance decomposing into a sub-scene, an aggregator, or
/// a line bendpoint belonging to a relationclass instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInstance {
    #[serde(flatten)]
    pub base: ObjectInstance,
    /// Defining class in the metamodel.
    pub class_uuid: Uuid,
    /// Defining relationclass, when this instance realizes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationclass_uuid: Option<Uuid>,
    /// Sub-scene this instance decomposes into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decomposable_scene_uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregator_uuid: Option<Uuid>,
    /// Relationclass instance whose line this bendpoint belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bendpoint_relationclass_uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_instances: Vec<AttributeInstance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_instances: Vec<PortInstance>,
}

impl ClassInstance {
    pub fn new(class_uuid: Uuid) -> Self {
        Self {
            base: ObjectInstance::new(),
            class_uuid,
            relationclass_uuid: None,
            decomposable_scene_uuid: None,
            aggregator_uuid: None,
            bendpoint_relationclass_uuid: None,
            attribute_instances: Vec::new(),
            port_instances: Vec::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.base.uuid
    }

    pub fn row(&self) -> ClassInstanceRow {
        ClassInstanceRow {
            uuid: self.base.uuid,
            class_uuid: self.class_uuid,
            relationclass_uuid: self.relationclass_uuid,
            decomposable_scene_uuid: self.decomposable_scene_uuid,
            aggregator_uuid: self.aggregator_uuid,
            bendpoint_relationclass_uuid: self.bendpoint_relationclass_uuid,
        }
    }

    pub fn from_parts(base: ObjectInstance, row: ClassInstanceRow) -> Self {
        Self {
            base,
            class_uuid: row.class_uuid,
            relationclass_uuid: row.relationclass_uuid,
            decomposable_scene_uuid: row.decomposable_scene_uuid,
            aggregator_uuid: row.aggregator_uuid,
            bendpoint_relationclass_uuid: row.bendpoint_relationclass_uuid,
            attribute_instances: Vec::new(),
            port_instances: Vec::new(),
        }
    }
}
