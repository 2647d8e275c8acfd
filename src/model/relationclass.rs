use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::class::ClassInstance;
use crate::model::role::RoleInstance;

/// The dehydrated link row of a relationclass instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationclassInstanceRow {
    pub uuid: Uuid,
    pub role_from_uuid: Uuid,
    pub role_to_uuid: Uuid,
    pub line_points: Vec<Uuid>,
}

/// A relationclass instance: a class instance specialization connecting two
/// role endpoints, with an ordered list of bendpoint references shaping its
/// line.
///
/// Creation is two-phase: both roles are inserted unlinked, the relationclass
/// row is inserted referencing their UUIDs, then each role is patched with the
/// relationclass back-reference. A relationclass instance cannot persist
/// without both ends eventually set; the unlinked window exists only inside
/// the enclosing transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationclassInstance {
    #[serde(flatten)]
    pub class_instance: ClassInstance,
    pub role_from: RoleInstance,
    pub role_to: RoleInstance,
    /// Ordered bendpoint class-instance references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub line_points: Vec<Uuid>,
}

impl RelationclassInstance {
    pub fn new(
        class_uuid: Uuid,
        relationclass_uuid: Uuid,
        role_from: RoleInstance,
        role_to: RoleInstance,
    ) -> Self {
        let mut class_instance = ClassInstance::new(class_uuid);
        class_instance.relationclass_uuid = Some(relationclass_uuid);
        Self {
            class_instance,
            role_from,
            role_to,
            line_points: Vec::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.class_instance.base.uuid
    }

    pub fn row(&self) -> RelationclassInstanceRow {
        RelationclassInstanceRow {
            uuid: self.uuid(),
            role_from_uuid: self.role_from.uuid(),
            role_to_uuid: self.role_to.uuid(),
            line_points: self.line_points.clone(),
        }
    }
}
