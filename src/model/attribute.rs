use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::object::ObjectInstance;
use crate::model::role::RoleInstance;

/// The dehydrated link row of an attribute instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeInstanceRow {
    pub uuid: Uuid,
    pub attribute_uuid: Uuid,
    pub value: Option<serde_json::Value>,
    pub assigned_scene_instance_uuid: Option<Uuid>,
    pub assigned_class_instance_uuid: Option<Uuid>,
    pub assigned_port_instance_uuid: Option<Uuid>,
    pub role_from_uuid: Option<Uuid>,
    pub table_row: Option<i64>,
    pub table_attribute_uuid: Option<Uuid>,
}

/// An attribute instance: a scalar value conforming to a metamodel attribute,
/// anchored to at most one of scene/class/port instance. A table-typed
/// attribute owns its cells as row-tagged child attribute instances; cells are
/// never addressable as ownership roots outside their table, but remain
/// individually creatable and deletable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeInstance {
    #[serde(flatten)]
    pub base: ObjectInstance,
    /// Defining attribute in the metamodel.
    pub attribute_uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_scene_instance_uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_class_instance_uuid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_port_instance_uuid: Option<Uuid>,
    /// Role endpoint this attribute realizes, hydrated on read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_instance_from: Option<Box<RoleInstance>>,
    /// Row tag of a table cell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_row: Option<i64>,
    /// Back-reference from a cell to its owning table attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_attribute_uuid: Option<Uuid>,
    /// Cells of a table-typed attribute.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub table_attributes: Vec<AttributeInstance>,
}

impl AttributeInstance {
    pub fn new(attribute_uuid: Uuid) -> Self {
        Self {
            base: ObjectInstance::new(),
            attribute_uuid,
            value: None,
            assigned_scene_instance_uuid: None,
            assigned_class_instance_uuid: None,
            assigned_port_instance_uuid: None,
            role_instance_from: None,
            table_row: None,
            table_attribute_uuid: None,
            table_attributes: Vec::new(),
        }
    }

    pub fn with_value(attribute_uuid: Uuid, value: serde_json::Value) -> Self {
        let mut attribute = Self::new(attribute_uuid);
        attribute.value = Some(value);
        attribute
    }

    /// A row-tagged cell of a table-typed attribute.
    pub fn table_cell(attribute_uuid: Uuid, table_row: i64, value: serde_json::Value) -> Self {
        let mut cell = Self::with_value(attribute_uuid, value);
        cell.table_row = Some(table_row);
        cell
    }

    pub fn uuid(&self) -> Uuid {
        self.base.uuid
    }

    /// Attach hydrated cells to a table-typed attribute.
    pub fn add_table_attributes(&mut self, cells: impl IntoIterator<Item = AttributeInstance>) {
        self.table_attributes.extend(cells);
    }

    pub fn row(&self) -> AttributeInstanceRow {
        AttributeInstanceRow {
            uuid: self.base.uuid,
            attribute_uuid: self.attribute_uuid,
            value: self.value.clone(),
            assigned_scene_instance_uuid: self.assigned_scene_instance_uuid,
            assigned_class_instance_uuid: self.assigned_class_instance_uuid,
            assigned_port_instance_uuid: self.assigned_port_instance_uuid,
            role_from_uuid: self.role_instance_from.as_ref().map(|role| role.uuid()),
            table_row: self.table_row,
            table_attribute_uuid: self.table_attribute_uuid,
        }
    }

    pub fn from_parts(base: ObjectInstance, row: AttributeInstanceRow) -> Self {
        Self {
            base,
            attribute_uuid: row.attribute_uuid,
            value: row.value,
            assigned_scene_instance_uuid: row.assigned_scene_instance_uuid,
            assigned_class_instance_uuid: row.assigned_class_instance_uuid,
            assigned_port_instance_uuid: row.assigned_port_instance_uuid,
            role_instance_from: None,
            table_row: row.table_row,
            table_attribute_uuid: row.table_attribute_uuid,
            table_attributes: Vec::new(),
        }
    }
}
