use futures::future::BoxFuture;
use uuid::Uuid;

use crate::logic::diff::DiffEngine;
use crate::logic::object_instance::ObjectInstanceStore;
use crate::logic::resolver::ParentTypeResolver;
use crate::logic::role_instance::RoleInstanceRepository;
use crate::logic::{try_outcome, EngineResult};
use crate::model::{AttributeInstance, Outcome, ParentKind};
use crate::store::traits::{ChildQuery, StoreTx};

/// Attribute instances anchor to exactly one of scene/class/port, may realize
/// a role endpoint, and (when table-typed) own their cells as row-tagged child
/// attribute instances. The cell recursion is why the core operations here
/// return boxed futures.
pub struct AttributeInstanceRepository;

impl AttributeInstanceRepository {
    pub fn get_by_uuid<'a, S: StoreTx + ?Sized>(
        tx: &'a mut S,
        uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> BoxFuture<'a, EngineResult<Outcome<AttributeInstance>>> {
        Box::pin(async move {
            let base = try_outcome!(ObjectInstanceStore::get_by_uuid(tx, uuid, user_uuid).await?);
            let Some(row) = tx.fetch_attribute_row(uuid).await? else {
                return Ok(Outcome::NotFound);
            };
            let role_from_uuid = row.role_from_uuid;
            let mut attribute = AttributeInstance::from_parts(base, row);

            if let Some(role_uuid) = role_from_uuid {
                if let Some(role) = RoleInstanceRepository::get_by_uuid(tx, role_uuid, user_uuid)
                    .await?
                    .found()
                {
                    attribute.role_instance_from = Some(Box::new(role));
                }
            }

            let mut cells = Vec::new();
            for cell_uuid in tx.child_uuids(ChildQuery::TableCells(uuid)).await? {
                if let Some(cell) = Self::get_by_uuid(tx, cell_uuid, user_uuid).await?.found() {
                    cells.push(cell);
                }
            }
            attribute.add_table_attributes(cells);

            Ok(Outcome::Found(attribute))
        })
    }

    pub async fn get_all_by_parent_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        parent_uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Vec<AttributeInstance>> {
        let Some(query) = Self::parent_query(tx, parent_uuid).await? else {
            return Ok(Vec::new());
        };
        let mut attributes = Vec::new();
        for uuid in tx.child_uuids(query).await? {
            if let Some(attribute) = Self::get_by_uuid(tx, uuid, user_uuid).await?.found() {
                attributes.push(attribute);
            }
        }
        Ok(attributes)
    }

    pub fn create<'a, S: StoreTx + ?Sized>(
        tx: &'a mut S,
        attribute: &AttributeInstance,
        user_uuid: Option<Uuid>,
    ) -> BoxFuture<'a, EngineResult<Outcome<AttributeInstance>>> {
        let attribute = attribute.clone();
        Box::pin(async move {
            try_outcome!(ObjectInstanceStore::create(tx, &attribute.base, user_uuid).await?);

            let mut row = attribute.row();
            // The role endpoint must exist before the link row can point at
            // it; an already-present role is kept as-is.
            if let Some(role) = &attribute.role_instance_from {
                match RoleInstanceRepository::create(tx, role, user_uuid).await? {
                    Outcome::Found(created) => row.role_from_uuid = Some(created.uuid()),
                    Outcome::NotFound => {}
                    Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
                }
            }
            tx.insert_attribute_row(&row).await?;

            for cell in &attribute.table_attributes {
                let mut cell = cell.clone();
                cell.table_attribute_uuid = Some(attribute.uuid());
                match Self::create(tx, &cell, user_uuid).await? {
                    Outcome::Found(_) | Outcome::NotFound => {}
                    Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
                }
            }

            Self::get_by_uuid(tx, attribute.uuid(), user_uuid).await
        })
    }

    /// Soft update: base and link-row fields are merged, added cells are
    /// created, modified cells updated in place. Cells missing from the
    /// payload stay persisted.
    pub fn update<'a, S: StoreTx + ?Sized>(
        tx: &'a mut S,
        uuid: Uuid,
        desired: &AttributeInstance,
        user_uuid: Option<Uuid>,
    ) -> BoxFuture<'a, EngineResult<Outcome<AttributeInstance>>> {
        let desired = desired.clone();
        Box::pin(async move {
            let current = try_outcome!(Self::get_by_uuid(tx, uuid, user_uuid).await?);
            try_outcome!(ObjectInstanceStore::update(tx, uuid, &desired.base, user_uuid).await?);

            let stored = current.row();
            let mut row = desired.row();
            row.uuid = uuid;
            row.value = row.value.or(stored.value);
            row.assigned_scene_instance_uuid = row
                .assigned_scene_instance_uuid
                .or(stored.assigned_scene_instance_uuid);
            row.assigned_class_instance_uuid = row
                .assigned_class_instance_uuid
                .or(stored.assigned_class_instance_uuid);
            row.assigned_port_instance_uuid = row
                .assigned_port_instance_uuid
                .or(stored.assigned_port_instance_uuid);
            row.role_from_uuid = row.role_from_uuid.or(stored.role_from_uuid);
            row.table_row = row.table_row.or(stored.table_row);
            row.table_attribute_uuid = row.table_attribute_uuid.or(stored.table_attribute_uuid);
            tx.update_attribute_row(&row).await?;

            let cells = DiffEngine::partition(&current.table_attributes, &desired.table_attributes);
            for added in &cells.added {
                let mut added = added.clone();
                added.table_attribute_uuid = Some(uuid);
                match Self::create(tx, &added, user_uuid).await? {
                    Outcome::Found(_) | Outcome::NotFound => {}
                    Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
                }
            }
            for modified in &cells.modified {
                match Self::update(tx, modified.uuid(), modified, user_uuid).await? {
                    Outcome::Found(_) | Outcome::NotFound => {}
                    Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
                }
            }

            Self::get_by_uuid(tx, uuid, user_uuid).await
        })
    }

    /// Hard update: soft update plus deletion of every cell the diff marked
    /// removed.
    pub async fn hard_update<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        desired: &AttributeInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<AttributeInstance>> {
        let current = try_outcome!(Self::get_by_uuid(tx, uuid, user_uuid).await?);
        let cells = DiffEngine::partition(&current.table_attributes, &desired.table_attributes);

        try_outcome!(Self::update(tx, uuid, desired, user_uuid).await?);

        for removed in &cells.removed {
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

    /// Which relationship query hydrates attributes for the given parent.
    async fn parent_query<S: StoreTx + ?Sized>(
        tx: &mut S,
        parent_uuid: Uuid,
    ) -> EngineResult<Option<ChildQuery>> {
        Ok(ParentTypeResolver::resolve(tx, parent_uuid)
            .await?
            .map(|kind| match kind {
                ParentKind::Class | ParentKind::Relationclass => {
                    ChildQuery::AttributesOfClass(parent_uuid)
                }
                ParentKind::Port => ChildQuery::AttributesOfPort(parent_uuid),
                ParentKind::SceneType => ChildQuery::AttributesOfScene(parent_uuid),
                ParentKind::Attribute => ChildQuery::TableCells(parent_uuid),
            }))
    }
}
