use uuid::Uuid;

use crate::logic::attribute_instance::AttributeInstanceRepository;
use crate::logic::class_instance::ClassInstanceRepository;
use crate::logic::diff::DiffEngine;
use crate::logic::object_instance::ObjectInstanceStore;
use crate::logic::port_instance::PortInstanceRepository;
use crate::logic::relationclass_instance::RelationclassInstanceRepository;
use crate::logic::role_instance::RoleInstanceRepository;
use crate::logic::{try_outcome, EngineResult};
use crate::model::{Outcome, SceneInstance};
use crate::store::traits::{ChildQuery, StoreTx};

/// Scene instances compose all five member collections. Class and
/// relationclass instances join through the scene assignment; ports,
/// attributes and roles attach through their own scene references.
pub struct SceneInstanceRepository;

impl SceneInstanceRepository {
    pub async fn get_by_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<SceneInstance>> {
        let base = try_outcome!(ObjectInstanceStore::get_by_uuid(tx, uuid, user_uuid).await?);
        let Some(row) = tx.fetch_scene_row(uuid).await? else {
            return Ok(Outcome::NotFound);
        };
        let mut scene = SceneInstance::from_parts(base, row);
        scene.class_instances =
            ClassInstanceRepository::get_all_by_parent_uuid(tx, uuid, user_uuid).await?;
        scene.relationclass_instances =
            RelationclassInstanceRepository::get_all_by_parent_uuid(tx, uuid, user_uuid).await?;
        scene.port_instances =
            PortInstanceRepository::get_all_by_parent_uuid(tx, uuid, user_uuid).await?;
        scene.attribute_instances =
            AttributeInstanceRepository::get_all_by_parent_uuid(tx, uuid, user_uuid).await?;
        scene.role_instances =
            RoleInstanceRepository::get_all_by_parent_uuid(tx, uuid, user_uuid).await?;
        Ok(Outcome::Found(scene))
    }

    /// Scene instances conforming to a scene type. Scenes have no instance
    /// parent, so the parent here is the metamodel scene type itself.
    pub async fn get_all_by_parent_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        scene_type_uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Vec<SceneInstance>> {
        let mut scenes = Vec::new();
        for uuid in tx
            .child_uuids(ChildQuery::ScenesOfSceneType(scene_type_uuid))
            .await?
        {
            if let Some(scene) = Self::get_by_uuid(tx, uuid, user_uuid).await?.found() {
                scenes.push(scene);
            }
        }
        Ok(scenes)
    }

    pub async fn create<S: StoreTx + ?Sized>(
        tx: &mut S,
        scene: &SceneInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<SceneInstance>> {
        try_outcome!(ObjectInstanceStore::create(tx, &scene.base, user_uuid).await?);
        tx.insert_scene_row(&scene.row()).await?;

        for class in &scene.class_instances {
            match ClassInstanceRepository::create(tx, class, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
            tx.link_to_scene(scene.uuid(), class.uuid()).await?;
        }
        for relationclass in &scene.relationclass_instances {
            match RelationclassInstanceRepository::create(tx, relationclass, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
            tx.link_to_scene(scene.uuid(), relationclass.uuid()).await?;
        }
        for port in &scene.port_instances {
            let mut port = port.clone();
            port.scene_instance_uuid = Some(scene.uuid());
            match PortInstanceRepository::create(tx, &port, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }
        for attribute in &scene.attribute_instances {
            let mut attribute = attribute.clone();
            attribute.assigned_scene_instance_uuid = Some(scene.uuid());
            match AttributeInstanceRepository::create(tx, &attribute, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }
        for role in &scene.role_instances {
            let mut role = role.clone();
            role.scene_instance_uuid = Some(scene.uuid());
            match RoleInstanceRepository::create(tx, &role, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }

        Self::get_by_uuid(tx, scene.uuid(), user_uuid).await
    }

    pub async fn update<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        desired: &SceneInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<SceneInstance>> {
        let current = try_outcome!(Self::get_by_uuid(tx, uuid, user_uuid).await?);
        try_outcome!(ObjectInstanceStore::update(tx, uuid, &desired.base, user_uuid).await?);

        let mut row = desired.row();
        row.uuid = uuid;
        tx.update_scene_row(&row).await?;

        let classes = DiffEngine::partition(&current.class_instances, &desired.class_instances);
        for added in &classes.added {
            match ClassInstanceRepository::create(tx, added, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
            tx.link_to_scene(uuid, added.uuid()).await?;
        }
        for modified in &classes.modified {
            match ClassInstanceRepository::update(tx, modified.uuid(), modified, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }

        let relationclasses = DiffEngine::partition(
            &current.relationclass_instances,
            &desired.relationclass_instances,
        );
        for added in &relationclasses.added {
            match RelationclassInstanceRepository::create(tx, added, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
            tx.link_to_scene(uuid, added.uuid()).await?;
        }
        for modified in &relationclasses.modified {
            match RelationclassInstanceRepository::update(tx, modified.uuid(), modified, user_uuid)
                .await?
            {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }

        let ports = DiffEngine::partition(&current.port_instances, &desired.port_instances);
        for added in &ports.added {
            let mut added = added.clone();
            added.scene_instance_uuid = Some(uuid);
            match PortInstanceRepository::create(tx, &added, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }
        for modified in &ports.modified {
            match PortInstanceRepository::update(tx, modified.uuid(), modified, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }

        let attributes =
            DiffEngine::partition(&current.attribute_instances, &desired.attribute_instances);
        for added in &attributes.added {
            let mut added = added.clone();
            added.assigned_scene_instance_uuid = Some(uuid);
            match AttributeInstanceRepository::create(tx, &added, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }
        for modified in &attributes.modified {
            match AttributeInstanceRepository::update(tx, modified.uuid(), modified, user_uuid)
                .await?
            {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }

        let roles = DiffEngine::partition(&current.role_instances, &desired.role_instances);
        for added in &roles.added {
            let mut added = added.clone();
            added.scene_instance_uuid = Some(uuid);
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

        Self::get_by_uuid(tx, uuid, user_uuid).await
    }

    /// Soft update plus deletion of every member the diff marked removed,
    /// across all five collections.
    pub async fn hard_update<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        desired: &SceneInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<SceneInstance>> {
        let current = try_outcome!(Self::get_by_uuid(tx, uuid, user_uuid).await?);

        let mut removed: Vec<Uuid> = Vec::new();
        removed.extend(
            DiffEngine::partition(&current.class_instances, &desired.class_instances)
                .removed
                .iter()
                .map(|class| class.uuid()),
        );
        removed.extend(
            DiffEngine::partition(
                &current.relationclass_instances,
                &desired.relationclass_instances,
            )
            .removed
            .iter()
            .map(|relationclass| relationclass.uuid()),
        );
        removed.extend(
            DiffEngine::partition(&current.port_instances, &desired.port_instances)
                .removed
                .iter()
                .map(|port| port.uuid()),
        );
        removed.extend(
            DiffEngine::partition(&current.attribute_instances, &desired.attribute_instances)
                .removed
                .iter()
                .map(|attribute| attribute.uuid()),
        );
        removed.extend(
            DiffEngine::partition(&current.role_instances, &desired.role_instances)
                .removed
                .iter()
                .map(|role| role.uuid()),
        );

        try_outcome!(Self::update(tx, uuid, desired, user_uuid).await?);

        match ObjectInstanceStore::delete_collection(tx, &removed, user_uuid).await? {
            Outcome::Found(_) | Outcome::NotFound => {}
            Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
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

    /// Delete every scene instance of a scene type, accumulating all
    /// affected UUIDs.
    pub async fn delete_all_by_parent_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        scene_type_uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<Vec<Uuid>>> {
        let uuids = tx
            .child_uuids(ChildQuery::ScenesOfSceneType(scene_type_uuid))
            .await?;
        ObjectInstanceStore::delete_collection(tx, &uuids, user_uuid).await
    }
}
