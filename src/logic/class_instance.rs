use uuid::Uuid;

use crate::logic::attribute_instance::AttributeInstanceRepository;
use crate::logic::diff::DiffEngine;
use crate::logic::object_instance::ObjectInstanceStore;
use crate::logic::port_instance::PortInstanceRepository;
use crate::logic::resolver::ParentTypeResolver;
use crate::logic::{try_outcome, EngineResult};
use crate::model::{ClassInstance, Outcome, ParentKind};
use crate::store::traits::{ChildQuery, StoreTx};

pub struct ClassInstanceRepository;

impl ClassInstanceRepository {
    pub async fn get_by_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<ClassInstance>> {
        let base = try_outcome!(ObjectInstanceStore::get_by_uuid(tx, uuid, user_uuid).await?);
        let Some(row) = tx.fetch_class_row(uuid).await? else {
            return Ok(Outcome::NotFound);
        };
        let mut class = ClassInstance::from_parts(base, row);
        class.attribute_instances =
            AttributeInstanceRepository::get_all_by_parent_uuid(tx, uuid, user_uuid).await?;
        class.port_instances =
            PortInstanceRepository::get_all_by_parent_uuid(tx, uuid, user_uuid).await?;
        Ok(Outcome::Found(class))
    }

    /// Plain class instances assigned to a scene; relationclass instances are
    /// hydrated by their own repository.
    pub async fn get_all_by_parent_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        parent_uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Vec<ClassInstance>> {
        let query = match ParentTypeResolver::resolve(tx, parent_uuid).await? {
            Some(ParentKind::SceneType) => ChildQuery::SceneClassMembers(parent_uuid),
            _ => return Ok(Vec::new()),
        };
        let mut classes = Vec::new();
        for uuid in tx.child_uuids(query).await? {
            if let Some(class) = Self::get_by_uuid(tx, uuid, user_uuid).await?.found() {
                classes.push(class);
            }
        }
        Ok(classes)
    }

    pub async fn create<S: StoreTx + ?Sized>(
        tx: &mut S,
        class: &ClassInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<ClassInstance>> {
        try_outcome!(ObjectInstanceStore::create(tx, &class.base, user_uuid).await?);
        tx.insert_class_row(&class.row()).await?;

        for attribute in &class.attribute_instances {
            let mut attribute = attribute.clone();
            attribute.assigned_class_instance_uuid = Some(class.uuid());
            match AttributeInstanceRepository::create(tx, &attribute, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }
        for port in &class.port_instances {
            let mut port = port.clone();
            port.class_instance_uuid = Some(class.uuid());
            match PortInstanceRepository::create(tx, &port, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }

        Self::get_by_uuid(tx, class.uuid(), user_uuid).await
    }

    pub async fn update<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        desired: &ClassInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<ClassInstance>> {
        let current = try_outcome!(Self::get_by_uuid(tx, uuid, user_uuid).await?);
        try_outcome!(ObjectInstanceStore::update(tx, uuid, &desired.base, user_uuid).await?);

        let stored = current.row();
        let mut row = desired.row();
        row.uuid = uuid;
        row.relationclass_uuid = row.relationclass_uuid.or(stored.relationclass_uuid);
        row.decomposable_scene_uuid = row.decomposable_scene_uuid.or(stored.decomposable_scene_uuid);
        row.aggregator_uuid = row.aggregator_uuid.or(stored.aggregator_uuid);
        row.bendpoint_relationclass_uuid = row
            .bendpoint_relationclass_uuid
            .or(stored.bendpoint_relationclass_uuid);
        tx.update_class_row(&row).await?;

        let attributes =
            DiffEngine::partition(&current.attribute_instances, &desired.attribute_instances);
        for added in &attributes.added {
            let mut added = added.clone();
            added.assigned_class_instance_uuid = Some(uuid);
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

        let ports = DiffEngine::partition(&current.port_instances, &desired.port_instances);
        for added in &ports.added {
            let mut added = added.clone();
            added.class_instance_uuid = Some(uuid);
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

        Self::get_by_uuid(tx, uuid, user_uuid).await
    }

    /// Soft update plus deletion of every child the diff marked removed.
    pub async fn hard_update<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        desired: &ClassInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<ClassInstance>> {
        let current = try_outcome!(Self::get_by_uuid(tx, uuid, user_uuid).await?);
        let attributes =
            DiffEngine::partition(&current.attribute_instances, &desired.attribute_instances);
        let ports = DiffEngine::partition(&current.port_instances, &desired.port_instances);

        try_outcome!(Self::update(tx, uuid, desired, user_uuid).await?);

        for removed in attributes
            .removed
            .iter()
            .map(|attribute| attribute.uuid())
            .chain(ports.removed.iter().map(|port| port.uuid()))
        {
            match ObjectInstanceStore::delete_by_uuid(tx, removed, user_uuid).await? {
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
            Some(ParentKind::SceneType) => ChildQuery::SceneClassMembers(parent_uuid),
            _ => return Ok(Outcome::Found(Vec::new())),
        };
        let uuids = tx.child_uuids(query).await?;
        ObjectInstanceStore::delete_collection(tx, &uuids, user_uuid).await
    }
}
