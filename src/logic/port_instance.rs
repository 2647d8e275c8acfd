use uuid::Uuid;

use crate::logic::attribute_instance::AttributeInstanceRepository;
use crate::logic::diff::DiffEngine;
use crate::logic::object_instance::ObjectInstanceStore;
use crate::logic::resolver::ParentTypeResolver;
use crate::logic::{try_outcome, EngineResult};
use crate::model::{Outcome, ParentKind, PortInstance};
use crate::store::traits::{ChildQuery, StoreTx};

pub struct PortInstanceRepository;

impl PortInstanceRepository {
    pub async fn get_by_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<PortInstance>> {
        let base = try_outcome!(ObjectInstanceStore::get_by_uuid(tx, uuid, user_uuid).await?);
        let Some(row) = tx.fetch_port_row(uuid).await? else {
            return Ok(Outcome::NotFound);
        };
        let mut port = PortInstance::from_parts(base, row);
        port.attribute_instances =
            AttributeInstanceRepository::get_all_by_parent_uuid(tx, uuid, user_uuid).await?;
        Ok(Outcome::Found(port))
    }

    pub async fn get_all_by_parent_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        parent_uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Vec<PortInstance>> {
        let Some(query) = Self::parent_query(tx, parent_uuid).await? else {
            return Ok(Vec::new());
        };
        let mut ports = Vec::new();
        for uuid in tx.child_uuids(query).await? {
            if let Some(port) = Self::get_by_uuid(tx, uuid, user_uuid).await?.found() {
                ports.push(port);
            }
        }
        Ok(ports)
    }

    pub async fn create<S: StoreTx + ?Sized>(
        tx: &mut S,
        port: &PortInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<PortInstance>> {
        try_outcome!(ObjectInstanceStore::create(tx, &port.base, user_uuid).await?);
        tx.insert_port_row(&port.row()).await?;

        for attribute in &port.attribute_instances {
            let mut attribute = attribute.clone();
            attribute.assigned_port_instance_uuid = Some(port.uuid());
            match AttributeInstanceRepository::create(tx, &attribute, user_uuid).await? {
                Outcome::Found(_) | Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }

        Self::get_by_uuid(tx, port.uuid(), user_uuid).await
    }

    pub async fn update<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        desired: &PortInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<PortInstance>> {
        let current = try_outcome!(Self::get_by_uuid(tx, uuid, user_uuid).await?);
        try_outcome!(ObjectInstanceStore::update(tx, uuid, &desired.base, user_uuid).await?);

        let stored = current.row();
        let mut row = desired.row();
        row.uuid = uuid;
        row.class_instance_uuid = row.class_instance_uuid.or(stored.class_instance_uuid);
        row.scene_instance_uuid = row.scene_instance_uuid.or(stored.scene_instance_uuid);
        tx.update_port_row(&row).await?;

        let attributes =
            DiffEngine::partition(&current.attribute_instances, &desired.attribute_instances);
        for added in &attributes.added {
            let mut added = added.clone();
            added.assigned_port_instance_uuid = Some(uuid);
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

        Self::get_by_uuid(tx, uuid, user_uuid).await
    }

    pub async fn hard_update<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        desired: &PortInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<PortInstance>> {
        let current = try_outcome!(Self::get_by_uuid(tx, uuid, user_uuid).await?);
        let attributes =
            DiffEngine::partition(&current.attribute_instances, &desired.attribute_instances);

        try_outcome!(Self::update(tx, uuid, desired, user_uuid).await?);

        for removed in &attributes.removed {
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
        let Some(query) = Self::parent_query(tx, parent_uuid).await? else {
            return Ok(Outcome::Found(Vec::new()));
        };
        let uuids = tx.child_uuids(query).await?;
        ObjectInstanceStore::delete_collection(tx, &uuids, user_uuid).await
    }

    async fn parent_query<S: StoreTx + ?Sized>(
        tx: &mut S,
        parent_uuid: Uuid,
    ) -> EngineResult<Option<ChildQuery>> {
        Ok(ParentTypeResolver::resolve(tx, parent_uuid)
            .await?
            .and_then(|kind| match kind {
                ParentKind::Class | ParentKind::Relationclass => {
                    Some(ChildQuery::PortsOfClass(parent_uuid))
                }
                ParentKind::SceneType => Some(ChildQuery::PortsOfScene(parent_uuid)),
                ParentKind::Port | ParentKind::Attribute => None,
            }))
    }
}
