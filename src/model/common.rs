use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 2D placement of an instance on a drawing plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord2d {
    pub x: f64,
    pub y: f64,
}

/// 3D placement of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Per-axis rotation of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// The closed set of concrete instance node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceKind {
    Class,
    Relationclass,
    Port,
    Attribute,
    Role,
    Scene,
}

/// Metamodel category a parent instance was instantiated from. Drives the
/// selection of the children-lookup query variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    SceneType,
    Class,
    Relationclass,
    Port,
    Attribute,
}

pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Default timestamp for rows that predate audit stamping.
pub fn default_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(0, 0).unwrap_or_else(Utc::now)
}
