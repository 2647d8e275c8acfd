use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::object::ObjectInstance;

/// The dehydrated link row of a role instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleInstanceRow {
    pub uuid: Uuid,
    pub role_uuid: Uuid,
    pub class_instance_uuid: Option<Uuid>,
    pub port_instance_uuid: Option<Uuid>,
    pub scene_instance_uuid: Option<Uuid>,
    pub attribute_instance_uuid: Option<Uuid>,
    pub relationclass_instance_uuid: Option<Uuid>,
    pub relationclass_uuid: Option<Uuid>,
}

/// A role instance: one endpoint of a relationclass instance, attached to at
/// most one anchor. A role with no anchor is transient and only valid inside
/// the two-phase relationclass creation window; `relationclass_uuid` is the
/// back-reference patched in once the relationclass row exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleInstance {
    #[serde(flatten)]
    pub base: ObjectInstance,
    /// Defining role in the metamodel.
    pub role_uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_instance_uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_instance_uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_instance_uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_instance_uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationclass_instance_uuid: Option<Uuid>,
    /// Owning relationclass instance, once linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationclass_uuid: Option<Uuid>,
}

impl RoleInstance {
    pub fn new(role_uuid: Uuid) -> Self {
        Self {
            base: ObjectInstance::new(),
            role_uuid,
            class_instance_uuid: None,
            port_instance_uuid: None,
            scene_instance_uuid: None,
            attribute_instance_uuid: None,
            relationclass_instance_uuid: None,
            relationclass_uuid: None,
        }
    }

    pub fn anchored_to_class(role_uuid: Uuid, class_instance_uuid: Uuid) -> Self {
        let mut role = Self::new(role_uuid);
        role.class_instance_uuid = Some(class_instance_uuid);
        role
    }

    pub fn anchored_to_scene(role_uuid: Uuid, scene_instance_uuid: Uuid) -> Self {
        let mut role = Self::new(role_uuid);
        role.scene_instance_uuid = Some(scene_instance_uuid);
        role
    }

    pub fn uuid(&self) -> Uuid {
        self.base.uuid
    }

    /// The single anchor this role attaches to, if any.
    pub fn anchor(&self) -> Option<Uuid> {
        self.class_instance_uuid
            .or(self.port_instance_uuid)
            .or(self.scene_instance_uuid)
            .or(self.attribute_instance_uuid)
            .or(self.relationclass_instance_uuid)
    }

    pub fn row(&self) -> RoleInstanceRow {
        RoleInstanceRow {
            uuid: self.base.uuid,
            role_uuid: self.role_uuid,
            class_instance_uuid: self.class_instance_uuid,
            port_instance_uuid: self.port_instance_uuid,
            scene_instance_uuid: self.scene_instance_uuid,
            attribute_instance_uuid: self.attribute_instance_uuid,
            relationclass_instance_uuid: self.relationclass_instance_uuid,
            relationclass_uuid: self.relationclass_uuid,
        }
    }

    pub fn from_parts(base: ObjectInstance, row: RoleInstanceRow) -> Self {
        Self {
            base,
            role_uuid: row.role_uuid,
            class_instance_uuid: row.class_instance_uuid,
            port_instance_uuid: row.port_instance_uuid,
            scene_instance_uuid: row.scene_instance_uuid,
            attribute_instance_uuid: row.attribute_instance_uuid,
            relationclass_instance_uuid: row.relationclass_instance_uuid,
            relationclass_uuid: row.relationclass_uuid,
        }
    }
}
