use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::common::{default_timestamp, Coord2d, Coord3d, Rotation};

/// The shared substrate row every concrete instance node is built on.
///
/// All non-identity fields are optional: an update payload carries only the
/// fields it wants to change, and [`ObjectInstance::coalesce_onto`] merges the
/// rest from the stored row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInstance {
    #[serde(default = "Uuid::new_v4")]
    pub uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord_2d: Option<Coord2d>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord_3d: Option<Coord3d>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Rotation>,
    /// Textual geometry descriptor interpreted by the drawing surface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<bool>,
    /// Free-form per-instance variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_variables: Option<serde_json::Value>,

    #[serde(default = "default_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl ObjectInstance {
    /// A fresh base row with a generated identity.
    pub fn new() -> Self {
        Self::with_uuid(Uuid::new_v4())
    }

    pub fn with_uuid(uuid: Uuid) -> Self {
        let now = Utc::now();
        Self {
            uuid,
            name: None,
            description: None,
            coord_2d: None,
            coord_3d: None,
            rotation: None,
            geometry: None,
            visibility: None,
            custom_variables: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn named(name: &str) -> Self {
        let mut base = Self::new();
        base.name = Some(name.to_string());
        base
    }

    /// Null-coalescing merge: every field present in `self` wins, every field
    /// omitted keeps the stored value. Identity and creation stamp always come
    /// from the stored row.
    pub fn coalesce_onto(&self, stored: &ObjectInstance) -> ObjectInstance {
        ObjectInstance {
            uuid: stored.uuid,
            name: self.name.clone().or_else(|| stored.name.clone()),
            description: self
                .description
                .clone()
                .or_else(|| stored.description.clone()),
            coord_2d: self.coord_2d.or(stored.coord_2d),
            coord_3d: self.coord_3d.or(stored.coord_3d),
            rotation: self.rotation.or(stored.rotation),
            geometry: self.geometry.clone().or_else(|| stored.geometry.clone()),
            visibility: self.visibility.or(stored.visibility),
            custom_variables: self
                .custom_variables
                .clone()
                .or_else(|| stored.custom_variables.clone()),
            created_at: stored.created_at,
            updated_at: Utc::now(),
        }
    }
}

impl Default for ObjectInstance {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesce_keeps_omitted_fields() {
        let mut stored = ObjectInstance::named("pump");
        stored.description = Some("main pump".to_string());
        stored.visibility = Some(true);

        let mut patch = ObjectInstance::with_uuid(stored.uuid);
        patch.name = Some("pump-2".to_string());

        let merged = patch.coalesce_onto(&stored);
        assert_eq!(merged.uuid, stored.uuid);
        assert_eq!(merged.name.as_deref(), Some("pump-2"));
        assert_eq!(merged.description.as_deref(), Some("main pump"));
        assert_eq!(merged.visibility, Some(true));
        assert_eq!(merged.created_at, stored.created_at);
    }

    #[test]
    fn coalesce_overwrites_present_fields() {
        let mut stored = ObjectInstance::named("valve");
        stored.coord_2d = Some(Coord2d { x: 1.0, y: 2.0 });

        let mut patch = ObjectInstance::with_uuid(stored.uuid);
        patch.coord_2d = Some(Coord2d { x: 9.0, y: 9.0 });

        let merged = patch.coalesce_onto(&stored);
        assert_eq!(merged.coord_2d, Some(Coord2d { x: 9.0, y: 9.0 }));
        assert_eq!(merged.name.as_deref(), Some("valve"));
    }
}
