use uuid::Uuid;

use crate::logic::delete_rules::DeleteRuleEngine;
use crate::logic::object_instance::ObjectInstanceStore;
use crate::logic::resolver::ParentTypeResolver;
use crate::logic::{try_outcome, EngineResult};
use crate::model::{Outcome, ParentKind, RoleInstance};
use crate::store::traits::{ChildQuery, StoreTx};

/// Role instances are leaves: they hydrate no children and never re-expand
/// the relationclass that owns them, which is what keeps recursive hydration
/// free of cycle guards.
pub struct RoleInstanceRepository;

impl RoleInstanceRepository {
    pub async fn get_by_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<RoleInstance>> {
        let base = try_outcome!(ObjectInstanceStore::get_by_uuid(tx, uuid, user_uuid).await?);
        let Some(row) = tx.fetch_role_row(uuid).await? else {
            return Ok(Outcome::NotFound);
        };
        Ok(Outcome::Found(RoleInstance::from_parts(base, row)))
    }

    pub async fn get_all_by_parent_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        parent_uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Vec<RoleInstance>> {
        let query = match ParentTypeResolver::resolve(tx, parent_uuid).await? {
            Some(ParentKind::SceneType) => ChildQuery::RolesOfScene(parent_uuid),
            _ => return Ok(Vec::new()),
        };
        let mut roles = Vec::new();
        for uuid in tx.child_uuids(query).await? {
            if let Some(role) = Self::get_by_uuid(tx, uuid, user_uuid).await?.found() {
                roles.push(role);
            }
        }
        Ok(roles)
    }

    pub async fn create<S: StoreTx + ?Sized>(
        tx: &mut S,
        role: &RoleInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<RoleInstance>> {
        try_outcome!(ObjectInstanceStore::create(tx, &role.base, user_uuid).await?);
        tx.insert_role_row(&role.row()).await?;
        Self::get_by_uuid(tx, role.uuid(), user_uuid).await
    }

    /// Partial update of base and link-row fields; also the phase-three patch
    /// that links a role to its relationclass once that row exists.
    pub async fn update<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        desired: &RoleInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<RoleInstance>> {
        let Some(stored) = tx.fetch_role_row(uuid).await? else {
            return Ok(Outcome::NotFound);
        };
        try_outcome!(ObjectInstanceStore::update(tx, uuid, &desired.base, user_uuid).await?);

        let mut row = desired.row();
        row.uuid = uuid;
        row.class_instance_uuid = row.class_instance_uuid.or(stored.class_instance_uuid);
        row.port_instance_uuid = row.port_instance_uuid.or(stored.port_instance_uuid);
        row.scene_instance_uuid = row.scene_instance_uuid.or(stored.scene_instance_uuid);
        row.attribute_instance_uuid = row
            .attribute_instance_uuid
            .or(stored.attribute_instance_uuid);
        row.relationclass_instance_uuid = row
            .relationclass_instance_uuid
            .or(stored.relationclass_instance_uuid);
        row.relationclass_uuid = row.relationclass_uuid.or(stored.relationclass_uuid);
        tx.update_role_row(&row).await?;

        Self::get_by_uuid(tx, uuid, user_uuid).await
    }

    /// Hard update equals soft update for roles: they own no child
    /// collections to reconcile.
    pub async fn hard_update<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        desired: &RoleInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<RoleInstance>> {
        Self::update(tx, uuid, desired, user_uuid).await
    }

    /// Delete a role instance. An absent UUID is a no-op; an existing UUID
    /// that is not a role is a constraint violation. The deletion rules then
    /// take any relationclass instance the role anchored as `from`/`to`.
    pub async fn delete_by_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<Vec<Uuid>>> {
        if !DeleteRuleEngine::ensure_role(tx, uuid).await? {
            return Ok(Outcome::Found(Vec::new()));
        }
        ObjectInstanceStore::delete_by_uuid(tx, uuid, user_uuid).await
    }

    pub async fn delete_all_by_parent_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        parent_uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<Vec<Uuid>>> {
        let query = match ParentTypeResolver::resolve(tx, parent_uuid).await? {
            Some(ParentKind::SceneType) => ChildQuery::RolesOfScene(parent_uuid),
            _ => return Ok(Outcome::Found(Vec::new())),
        };
        let uuids = tx.child_uuids(query).await?;
        ObjectInstanceStore::delete_collection(tx, &uuids, user_uuid).await
    }
}
