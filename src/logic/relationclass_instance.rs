use uuid::Uuid;

use crate::logic::attribute_instance::AttributeInstanceRepository;
use crate::logic::class_instance::ClassInstanceRepository;
use crate::logic::diff::DiffEngine;
use crate::logic::object_instance::ObjectInstanceStore;
use crate::logic::port_instance::PortInstanceRepository;
use crate::logic::resolver::ParentTypeResolver;
use crate::logic::role_instance::RoleInstanceRepository;
use crate::logic::{try_outcome, EngineResult};
use crate::model::{Outcome, ParentKind, RelationclassInstance, RoleInstance};
use crate::store::traits::{ChildQuery, StoreTx};

pub struct RelationclassInstanceRepository;

impl RelationclassInstanceRepository {
    pub async fn get_by_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<RelationclassInstance>> {
        let class_instance =
            try_outcome!(ClassInstanceRepository::get_by_uuid(tx, uuid, user_uuid).await?);
        let Some(row) = tx.fetch_relationclass_row(uuid).await? else {
            return Ok(Outcome::NotFound);
        };
        let role_from = try_outcome!(
            RoleInstanceRepository::get_by_uuid(tx, row.role_from_uuid, user_uuid).await?
        );
        let role_to =
            try_outcome!(RoleInstanceRepository::get_by_uuid(tx, row.role_to_uuid, user_uuid).await?);

        Ok(Outcome::Found(RelationclassInstance {
            class_instance,
            role_from,
            role_to,
            line_points: row.line_points,
        }))
    }

    pub async fn get_all_by_parent_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        parent_uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Vec<RelationclassInstance>> {
        let query = match ParentTypeResolver::resolve(tx, parent_uuid).await? {
            Some(ParentKind::SceneType) => ChildQuery::SceneRelationclassMembers(parent_uuid),
            _ => return Ok(Vec::new()),
        };
        let mut relationclasses = Vec::new();
        for uuid in tx.child_uuids(query).await? {
            if let Some(relationclass) = Self::get_by_uuid(tx, uuid, user_uuid).await?.found() {
                relationclasses.push(relationclass);
            }
        }
        Ok(relationclasses)
    }

    /// Two-phase creation. Role rows cannot declare their relationclass
    /// before that row exists, and the relationclass row needs both role
    /// UUIDs; the ordering deadlock is broken by creating the roles unlinked,
    /// inserting the relationclass row, then patching the back-references.
    pub async fn create<S: StoreTx + ?Sized>(
        tx: &mut S,
        relationclass: &RelationclassInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<RelationclassInstance>> {
        // Phase one: both ends, unlinked.
        for role in [&relationclass.role_from, &relationclass.role_to] {
            let mut role = role.clone();
            role.relationclass_uuid = None;
            match RoleInstanceRepository::create(tx, &role, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }

        // Phase two: the class-instance substrate and the relationclass row
        // referencing both role UUIDs.
        try_outcome!(
            ObjectInstanceStore::create(tx, &relationclass.class_instance.base, user_uuid).await?
        );
        tx.insert_class_row(&relationclass.class_instance.row())
            .await?;
        tx.insert_relationclass_row(&relationclass.row()).await?;

        // Phase three: patch each role with its relationclass back-reference.
        for role_uuid in [
            relationclass.role_from.uuid(),
            relationclass.role_to.uuid(),
        ] {
            if let Some(mut row) = tx.fetch_role_row(role_uuid).await? {
                row.relationclass_uuid = Some(relationclass.uuid());
                tx.update_role_row(&row).await?;
            }
        }

        for attribute in &relationclass.class_instance.attribute_instances {
            let mut attribute = attribute.clone();
            attribute.assigned_class_instance_uuid = Some(relationclass.uuid());
            match AttributeInstanceRepository::create(tx, &attribute, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }
        for port in &relationclass.class_instance.port_instances {
            let mut port = port.clone();
            port.class_instance_uuid = Some(relationclass.uuid());
            match PortInstanceRepository::create(tx, &port, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }

        Self::get_by_uuid(tx, relationclass.uuid(), user_uuid).await
    }

    pub async fn update<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        desired: &RelationclassInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<RelationclassInstance>> {
        let current = try_outcome!(Self::get_by_uuid(tx, uuid, user_uuid).await?);

        // Class-level fields and owned attribute/port collections.
        try_outcome!(
            ClassInstanceRepository::update(tx, uuid, &desired.class_instance, user_uuid).await?
        );

        // The two ends reconcile like any owned collection: fresh roles are
        // created and linked before the relationclass row points at them,
        // known roles updated in place.
        let current_roles = vec![current.role_from.clone(), current.role_to.clone()];
        let desired_roles = vec![desired.role_from.clone(), desired.role_to.clone()];
        let roles = DiffEngine::partition(&current_roles, &desired_roles);
        for added in &roles.added {
            let mut added: RoleInstance = added.clone();
            added.relationclass_uuid = Some(uuid);
            match RoleInstanceRepository::create(tx, &added, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }
        for modified in &roles.modified {
            match RoleInstanceRepository::update(tx, modified.uuid(), modified, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }

        let mut row = desired.row();
        row.uuid = uuid;
        if row.line_points.is_empty() {
            row.line_points = current.row().line_points;
        }
        tx.update_relationclass_row(&row).await?;

        Self::get_by_uuid(tx, uuid, user_uuid).await
    }

    /// Soft update plus deletion of replaced roles and removed class-level
    /// children. Replaced roles are deleted after the relationclass row
    /// points at the new ends, so the dangling-endpoint rule has nothing to
    /// fire on.
    pub async fn hard_update<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        desired: &RelationclassInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<RelationclassInstance>> {
        let current = try_outcome!(Self::get_by_uuid(tx, uuid, user_uuid).await?);
        let current_roles = vec![current.role_from.clone(), current.role_to.clone()];
        let desired_roles = vec![desired.role_from.clone(), desired.role_to.clone()];
        let roles = DiffEngine::partition(&current_roles, &desired_roles);

        try_outcome!(
            ClassInstanceRepository::hard_update(tx, uuid, &desired.class_instance, user_uuid)
                .await?
        );
        try_outcome!(Self::update(tx, uuid, desired, user_uuid).await?);

        for removed in &roles.removed {
            match ObjectInstanceStore::delete_by_uuid(tx, removed.uuid(), user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }

        Self::get_by_uuid(tx, uuid, user_uuid).await
    }

    pub async fn delete_by_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<Vec<Uuid>>> {
        ObjectInstanceStore::delete_by_uuid(tx, uuid, user_uuid).await
    }

    pub async fn delete_all_by_parent_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        parent_uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<Vec<Uuid>>> {
        let query = match ParentTypeResolver::resolve(tx, parent_uuid).await? {
            Some(ParentKind::SceneType) => ChildQuery::SceneRelationclassMembers(parent_uuid),
            _ => return Ok(Outcome::Found(Vec::new())),
        };
        let uuids = tx.child_uuids(query).await?;
        ObjectInstanceStore::delete_collection(tx, &uuids, user_uuid).await
    }

    /// The relationclass instance holding the given role as `from` or `to`
    /// end, if any. This is the hydrating counterpart of the role-end lookup
    /// the deletion rules run on raw UUIDs.
    pub async fn get_if_role_from_or_to<S: StoreTx + ?Sized>(
        tx: &mut S,
        role_uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Option<RelationclassInstance>> {
        let uuids = tx
            .child_uuids(ChildQuery::RelationclassesWithRoleEnd(role_uuid))
            .await?;
        for uuid in uuids {
            if let Some(relationclass) = Self::get_by_uuid(tx, uuid, user_uuid).await?.found() {
                return Ok(Some(relationclass));
            }
        }
        Ok(None)
    }
}
