use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{
    Access, AccessGrant, AttributeInstanceRow, ClassInstanceRow, InstanceKind, ObjectInstance,
    ParentKind, PortInstanceRow, RelationclassInstanceRow, RoleInstanceRow, SceneInstanceRow,
};

/// Storage/transport failure. Always transaction-fatal; never used for
/// expected business outcomes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("row decode failed for {uuid}: {message}")]
    Decode { uuid: Uuid, message: String },
}

/// One row removed by a storage cascade, tagged with its kind so post-delete
/// rules can dispatch without re-reading rows that no longer exist. `kind` is
/// `None` for a base row that never received a typed link row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Deleted {
    pub uuid: Uuid,
    pub kind: Option<InstanceKind>,
}

impl Deleted {
    pub fn new(uuid: Uuid, kind: Option<InstanceKind>) -> Self {
        Self { uuid, kind }
    }

    pub fn is_role(&self) -> bool {
        self.kind == Some(InstanceKind::Role)
    }
}

/// The closed set of named relationship queries. Each variant selects one
/// parameterized statement in the adapter; the engine never sees SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildQuery {
    /// Attribute instances anchored to a scene instance.
    AttributesOfScene(Uuid),
    /// Attribute instances anchored to a class instance.
    AttributesOfClass(Uuid),
    /// Attribute instances anchored to a port instance.
    AttributesOfPort(Uuid),
    /// Cells of a table-typed attribute instance.
    TableCells(Uuid),
    /// Port instances owned by a class instance.
    PortsOfClass(Uuid),
    /// Port instances placed directly on a scene instance.
    PortsOfScene(Uuid),
    /// Role instances anchored to a scene instance.
    RolesOfScene(Uuid),
    /// Plain class instances assigned to a scene instance.
    SceneClassMembers(Uuid),
    /// Relationclass instances assigned to a scene instance.
    SceneRelationclassMembers(Uuid),
    /// Relationclass instances registered with the role as `from` or `to` end.
    RelationclassesWithRoleEnd(Uuid),
    /// Scene instances conforming to a metamodel scene type.
    ScenesOfSceneType(Uuid),
}

/// Base-row operations: the substrate table every instance node shares.
#[async_trait]
pub trait ObjectRowStore {
    /// Insert a base row. Returns `false` without touching storage when the
    /// UUID already exists (the idempotent-create guard).
    async fn insert_object(&mut self, row: &ObjectInstance) -> Result<bool, StoreError>;
    async fn fetch_object(&mut self, uuid: Uuid) -> Result<Option<ObjectInstance>, StoreError>;
    async fn update_object(&mut self, row: &ObjectInstance) -> Result<(), StoreError>;
    /// Remove the row and every row contractually dependent on it, in one
    /// closure computation at the storage boundary. Idempotent on absent
    /// UUIDs (empty result); the returned set is unordered and includes the
    /// requested UUID on success.
    async fn delete_cascade(&mut self, uuid: Uuid) -> Result<Vec<Deleted>, StoreError>;
}

/// Typed link-row operations, one trio per concrete instance kind, plus the
/// scene assignment join.
#[async_trait]
pub trait LinkRowStore {
    async fn insert_class_row(&mut self, row: &ClassInstanceRow) -> Result<(), StoreError>;
    async fn fetch_class_row(&mut self, uuid: Uuid) -> Result<Option<ClassInstanceRow>, StoreError>;
    async fn update_class_row(&mut self, row: &ClassInstanceRow) -> Result<(), StoreError>;

    async fn insert_port_row(&mut self, row: &PortInstanceRow) -> Result<(), StoreError>;
    async fn fetch_port_row(&mut self, uuid: Uuid) -> Result<Option<PortInstanceRow>, StoreError>;
    async fn update_port_row(&mut self, row: &PortInstanceRow) -> Result<(), StoreError>;

    async fn insert_attribute_row(&mut self, row: &AttributeInstanceRow) -> Result<(), StoreError>;
    async fn fetch_attribute_row(
        &mut self,
        uuid: Uuid,
    ) -> Result<Option<AttributeInstanceRow>, StoreError>;
    async fn update_attribute_row(&mut self, row: &AttributeInstanceRow) -> Result<(), StoreError>;

    async fn insert_role_row(&mut self, row: &RoleInstanceRow) -> Result<(), StoreError>;
    async fn fetch_role_row(&mut self, uuid: Uuid) -> Result<Option<RoleInstanceRow>, StoreError>;
    async fn update_role_row(&mut self, row: &RoleInstanceRow) -> Result<(), StoreError>;

    async fn insert_relationclass_row(
        &mut self,
        row: &RelationclassInstanceRow,
    ) -> Result<(), StoreError>;
    async fn fetch_relationclass_row(
        &mut self,
        uuid: Uuid,
    ) -> Result<Option<RelationclassInstanceRow>, StoreError>;
    async fn update_relationclass_row(
        &mut self,
        row: &RelationclassInstanceRow,
    ) -> Result<(), StoreError>;

    async fn insert_scene_row(&mut self, row: &SceneInstanceRow) -> Result<(), StoreError>;
    async fn fetch_scene_row(&mut self, uuid: Uuid) -> Result<Option<SceneInstanceRow>, StoreError>;
    async fn update_scene_row(&mut self, row: &SceneInstanceRow) -> Result<(), StoreError>;

    /// Assign an instance to a scene. Membership, not ownership.
    async fn link_to_scene(&mut self, scene_uuid: Uuid, member_uuid: Uuid)
        -> Result<(), StoreError>;
    /// Remove a scene assignment; the member row itself is untouched.
    async fn unlink_from_scene(
        &mut self,
        scene_uuid: Uuid,
        member_uuid: Uuid,
    ) -> Result<(), StoreError>;
}

/// Relationship and category queries over the instance graph.
#[async_trait]
pub trait GraphQueryStore {
    /// Child UUIDs for one named relationship query, ordered by UUID for
    /// deterministic hydration.
    async fn child_uuids(&mut self, query: ChildQuery) -> Result<Vec<Uuid>, StoreError>;
    /// The metamodel category that instantiated the given UUID, if any.
    /// Relationclass takes precedence over plain class.
    async fn resolve_parent_kind(&mut self, uuid: Uuid) -> Result<Option<ParentKind>, StoreError>;
}

/// Per-operation, per-user rights checks.
#[async_trait]
pub trait RightsStore {
    /// Whether `user_uuid` holds the given right on `uuid`. An instance with
    /// no registered grants is unrestricted; once grants exist, the user
    /// needs an explicit flag.
    async fn check_access(
        &mut self,
        uuid: Uuid,
        user_uuid: Uuid,
        access: Access,
    ) -> Result<bool, StoreError>;
    /// Register or replace the grant for one (instance, user) pair.
    async fn put_access(&mut self, grant: &AccessGrant) -> Result<(), StoreError>;
}

/// A transaction-scoped storage client. Exclusively owned by one logical
/// flow; statements issued through it are strictly sequential. Dropping the
/// handle without committing rolls the transaction back.
#[async_trait]
pub trait StoreTx:
    ObjectRowStore + LinkRowStore + GraphQueryStore + RightsStore + Send
{
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Hands out transaction-scoped clients. Implementations are shared across
/// concurrent flows and hold no per-request state.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}
