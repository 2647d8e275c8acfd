use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::model::{
    Access, AccessGrant, AttributeInstanceRow, ClassInstanceRow, InstanceKind, ObjectInstance,
    ParentKind, PortInstanceRow, RelationclassInstanceRow, RoleInstanceRow, SceneInstanceRow,
};
use crate::store::traits::{
    ChildQuery, Deleted, GraphQueryStore, LinkRowStore, ObjectRowStore, RightsStore, Store,
    StoreError, StoreTx,
};

/// The full table set. `BTreeMap` keys keep every scan deterministic.
#[derive(Debug, Default, Clone)]
struct Tables {
    objects: BTreeMap<Uuid, ObjectInstance>,
    class_rows: BTreeMap<Uuid, ClassInstanceRow>,
    port_rows: BTreeMap<Uuid, PortInstanceRow>,
    attribute_rows: BTreeMap<Uuid, AttributeInstanceRow>,
    role_rows: BTreeMap<Uuid, RoleInstanceRow>,
    relationclass_rows: BTreeMap<Uuid, RelationclassInstanceRow>,
    scene_rows: BTreeMap<Uuid, SceneInstanceRow>,
    /// (scene, member) assignment join.
    scene_links: BTreeSet<(Uuid, Uuid)>,
    /// (instance, user) → grant.
    rights: BTreeMap<(Uuid, Uuid), AccessGrant>,
}

impl Tables {
    fn kind_of(&self, uuid: Uuid) -> Option<InstanceKind> {
        if self.relationclass_rows.contains_key(&uuid) {
            Some(InstanceKind::Relationclass)
        } else if self.class_rows.contains_key(&uuid) {
            Some(InstanceKind::Class)
        } else if self.port_rows.contains_key(&uuid) {
            Some(InstanceKind::Port)
        } else if self.attribute_rows.contains_key(&uuid) {
            Some(InstanceKind::Attribute)
        } else if self.role_rows.contains_key(&uuid) {
            Some(InstanceKind::Role)
        } else if self.scene_rows.contains_key(&uuid) {
            Some(InstanceKind::Scene)
        } else {
            None
        }
    }

    /// Rows whose existence is contractually dependent on `uuid`. Reference
    /// edges (a relationclass holding a role as `from`/`to` end) are not
    /// followed here; that consequence belongs to the deletion rule engine.
    fn dependents(&self, uuid: Uuid) -> Vec<Uuid> {
        let mut out = Vec::new();
        for row in self.attribute_rows.values() {
            if row.assigned_scene_instance_uuid == Some(uuid)
                || row.assigned_class_instance_uuid == Some(uuid)
                || row.assigned_port_instance_uuid == Some(uuid)
                || row.table_attribute_uuid == Some(uuid)
            {
                out.push(row.uuid);
            }
        }
        for row in self.port_rows.values() {
            if row.class_instance_uuid == Some(uuid) || row.scene_instance_uuid == Some(uuid) {
                out.push(row.uuid);
            }
        }
        for row in self.role_rows.values() {
            let anchored = row.class_instance_uuid == Some(uuid)
                || row.port_instance_uuid == Some(uuid)
                || row.scene_instance_uuid == Some(uuid)
                || row.attribute_instance_uuid == Some(uuid)
                || row.relationclass_instance_uuid == Some(uuid);
            if anchored || row.relationclass_uuid == Some(uuid) {
                out.push(row.uuid);
            }
        }
        for row in self.class_rows.values() {
            if row.bendpoint_relationclass_uuid == Some(uuid) {
                out.push(row.uuid);
            }
        }
        for (scene, member) in &self.scene_links {
            if *scene == uuid {
                out.push(*member);
            }
        }
        out
    }

    /// Fixpoint walk over the dependency edges. The dependency graph is
    /// cyclic-capable, so membership in `seen` is the only termination
    /// criterion.
    fn cascade_closure(&self, root: Uuid) -> Vec<Deleted> {
        if !self.objects.contains_key(&root) {
            return Vec::new();
        }
        let mut seen = BTreeSet::new();
        let mut frontier = vec![root];
        while let Some(uuid) = frontier.pop() {
            if !seen.insert(uuid) {
                continue;
            }
            for dependent in self.dependents(uuid) {
                if self.objects.contains_key(&dependent) && !seen.contains(&dependent) {
                    frontier.push(dependent);
                }
            }
        }
        seen.into_iter()
            .map(|uuid| Deleted::new(uuid, self.kind_of(uuid)))
            .collect()
    }

    fn purge(&mut self, victims: &[Deleted]) {
        let gone: BTreeSet<Uuid> = victims.iter().map(|victim| victim.uuid).collect();
        self.objects.retain(|uuid, _| !gone.contains(uuid));
        self.class_rows.retain(|uuid, _| !gone.contains(uuid));
        self.port_rows.retain(|uuid, _| !gone.contains(uuid));
        self.attribute_rows.retain(|uuid, _| !gone.contains(uuid));
        self.role_rows.retain(|uuid, _| !gone.contains(uuid));
        self.relationclass_rows.retain(|uuid, _| !gone.contains(uuid));
        self.scene_rows.retain(|uuid, _| !gone.contains(uuid));
        self.scene_links
            .retain(|(scene, member)| !gone.contains(scene) && !gone.contains(member));
        self.rights
            .retain(|(instance, _), _| !gone.contains(instance));
    }
}

/// In-process storage adapter with snapshot transactions: `begin` clones the
/// table set, `commit` publishes it, dropping the handle discards it. Used by
/// the test suite and as the reference implementation of the cascade closure.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let work = self.tables.lock().clone();
        Ok(Box::new(MemoryTx {
            shared: Arc::clone(&self.tables),
            work,
        }))
    }
}

pub struct MemoryTx {
    shared: Arc<Mutex<Tables>>,
    work: Tables,
}

#[async_trait]
impl ObjectRowStore for MemoryTx {
    async fn insert_object(&mut self, row: &ObjectInstance) -> Result<bool, StoreError> {
        if self.work.objects.contains_key(&row.uuid) {
            return Ok(false);
        }
        self.work.objects.insert(row.uuid, row.clone());
        Ok(true)
    }

    async fn fetch_object(&mut self, uuid: Uuid) -> Result<Option<ObjectInstance>, StoreError> {
        Ok(self.work.objects.get(&uuid).cloned())
    }

    async fn update_object(&mut self, row: &ObjectInstance) -> Result<(), StoreError> {
        self.work.objects.insert(row.uuid, row.clone());
        Ok(())
    }

    async fn delete_cascade(&mut self, uuid: Uuid) -> Result<Vec<Deleted>, StoreError> {
        let victims = self.work.cascade_closure(uuid);
        self.work.purge(&victims);
        Ok(victims)
    }
}

#[async_trait]
impl LinkRowStore for MemoryTx {
    async fn insert_class_row(&mut self, row: &ClassInstanceRow) -> Result<(), StoreError> {
        self.work.class_rows.insert(row.uuid, row.clone());
        Ok(())
    }

    async fn fetch_class_row(
        &mut self,
        uuid: Uuid,
    ) -> Result<Option<ClassInstanceRow>, StoreError> {
        Ok(self.work.class_rows.get(&uuid).cloned())
    }

    async fn update_class_row(&mut self, row: &ClassInstanceRow) -> Result<(), StoreError> {
        self.work.class_rows.insert(row.uuid, row.clone());
        Ok(())
    }

    async fn insert_port_row(&mut self, row: &PortInstanceRow) -> Result<(), StoreError> {
        self.work.port_rows.insert(row.uuid, row.clone());
        Ok(())
    }

    async fn fetch_port_row(&mut self, uuid: Uuid) -> Result<Option<PortInstanceRow>, StoreError> {
        Ok(self.work.port_rows.get(&uuid).cloned())
    }

    async fn update_port_row(&mut self, row: &PortInstanceRow) -> Result<(), StoreError> {
        self.work.port_rows.insert(row.uuid, row.clone());
        Ok(())
    }

    async fn insert_attribute_row(&mut self, row: &AttributeInstanceRow) -> Result<(), StoreError> {
        self.work.attribute_rows.insert(row.uuid, row.clone());
        Ok(())
    }

    async fn fetch_attribute_row(
        &mut self,
        uuid: Uuid,
    ) -> Result<Option<AttributeInstanceRow>, StoreError> {
        Ok(self.work.attribute_rows.get(&uuid).cloned())
    }

    async fn update_attribute_row(&mut self, row: &AttributeInstanceRow) -> Result<(), StoreError> {
        self.work.attribute_rows.insert(row.uuid, row.clone());
        Ok(())
    }

    async fn insert_role_row(&mut self, row: &RoleInstanceRow) -> Result<(), StoreError> {
        self.work.role_rows.insert(row.uuid, row.clone());
        Ok(())
    }

    async fn fetch_role_row(&mut self, uuid: Uuid) -> Result<Option<RoleInstanceRow>, StoreError> {
        Ok(self.work.role_rows.get(&uuid).cloned())
    }

    async fn update_role_row(&mut self, row: &RoleInstanceRow) -> Result<(), StoreError> {
        self.work.role_rows.insert(row.uuid, row.clone());
        Ok(())
    }

    async fn insert_relationclass_row(
        &mut self,
        row: &RelationclassInstanceRow,
    ) -> Result<(), StoreError> {
        self.work.relationclass_rows.insert(row.uuid, row.clone());
        Ok(())
    }

    async fn fetch_relationclass_row(
        &mut self,
        uuid: Uuid,
    ) -> Result<Option<RelationclassInstanceRow>, StoreError> {
        Ok(self.work.relationclass_rows.get(&uuid).cloned())
    }

    async fn update_relationclass_row(
        &mut self,
        row: &RelationclassInstanceRow,
    ) -> Result<(), StoreError> {
        self.work.relationclass_rows.insert(row.uuid, row.clone());
        Ok(())
    }

    async fn insert_scene_row(&mut self, row: &SceneInstanceRow) -> Result<(), StoreError> {
        self.work.scene_rows.insert(row.uuid, row.clone());
        Ok(())
    }

    async fn fetch_scene_row(
        &mut self,
        uuid: Uuid,
    ) -> Result<Option<SceneInstanceRow>, StoreError> {
        Ok(self.work.scene_rows.get(&uuid).cloned())
    }

    async fn update_scene_row(&mut self, row: &SceneInstanceRow) -> Result<(), StoreError> {
        self.work.scene_rows.insert(row.uuid, row.clone());
        Ok(())
    }

    async fn link_to_scene(
        &mut self,
        scene_uuid: Uuid,
        member_uuid: Uuid,
    ) -> Result<(), StoreError> {
        self.work.scene_links.insert((scene_uuid, member_uuid));
        Ok(())
    }

    async fn unlink_from_scene(
        &mut self,
        scene_uuid: Uuid,
        member_uuid: Uuid,
    ) -> Result<(), StoreError> {
        self.work.scene_links.remove(&(scene_uuid, member_uuid));
        Ok(())
    }
}

#[async_trait]
impl GraphQueryStore for MemoryTx {
    async fn child_uuids(&mut self, query: ChildQuery) -> Result<Vec<Uuid>, StoreError> {
        let tables = &self.work;
        let uuids = match query {
            ChildQuery::AttributesOfScene(parent) => tables
                .attribute_rows
                .values()
                .filter(|row| row.assigned_scene_instance_uuid == Some(parent))
                .map(|row| row.uuid)
                .collect(),
            ChildQuery::AttributesOfClass(parent) => tables
                .attribute_rows
                .values()
                .filter(|row| row.assigned_class_instance_uuid == Some(parent))
                .map(|row| row.uuid)
                .collect(),
            ChildQuery::AttributesOfPort(parent) => tables
                .attribute_rows
                .values()
                .filter(|row| row.assigned_port_instance_uuid == Some(parent))
                .map(|row| row.uuid)
                .collect(),
            ChildQuery::TableCells(parent) => tables
                .attribute_rows
                .values()
                .filter(|row| row.table_attribute_uuid == Some(parent))
                .map(|row| row.uuid)
                .collect(),
            ChildQuery::PortsOfClass(parent) => tables
                .port_rows
                .values()
                .filter(|row| row.class_instance_uuid == Some(parent))
                .map(|row| row.uuid)
                .collect(),
            ChildQuery::PortsOfScene(parent) => tables
                .port_rows
                .values()
                .filter(|row| row.scene_instance_uuid == Some(parent))
                .map(|row| row.uuid)
                .collect(),
            ChildQuery::RolesOfScene(parent) => tables
                .role_rows
                .values()
                .filter(|row| row.scene_instance_uuid == Some(parent))
                .map(|row| row.uuid)
                .collect(),
            ChildQuery::SceneClassMembers(scene) => tables
                .scene_links
                .iter()
                .filter(|(s, member)| {
                    *s == scene
                        && tables.class_rows.contains_key(member)
                        && !tables.relationclass_rows.contains_key(member)
                })
                .map(|(_, member)| *member)
                .collect(),
            ChildQuery::SceneRelationclassMembers(scene) => tables
                .scene_links
                .iter()
                .filter(|(s, member)| *s == scene && tables.relationclass_rows.contains_key(member))
                .map(|(_, member)| *member)
                .collect(),
            ChildQuery::RelationclassesWithRoleEnd(role) => tables
                .relationclass_rows
                .values()
                .filter(|row| row.role_from_uuid == role || row.role_to_uuid == role)
                .map(|row| row.uuid)
                .collect::<Vec<_>>(),
            ChildQuery::ScenesOfSceneType(scene_type) => tables
                .scene_rows
                .values()
                .filter(|row| row.scene_type_uuid == scene_type)
                .map(|row| row.uuid)
                .collect(),
        };
        let mut uuids: Vec<Uuid> = uuids;
        uuids.sort();
        uuids.dedup();
        Ok(uuids)
    }

    async fn resolve_parent_kind(&mut self, uuid: Uuid) -> Result<Option<ParentKind>, StoreError> {
        Ok(match self.work.kind_of(uuid) {
            Some(InstanceKind::Relationclass) => Some(ParentKind::Relationclass),
            Some(InstanceKind::Class) => Some(ParentKind::Class),
            Some(InstanceKind::Port) => Some(ParentKind::Port),
            Some(InstanceKind::Attribute) => Some(ParentKind::Attribute),
            Some(InstanceKind::Scene) => Some(ParentKind::SceneType),
            Some(InstanceKind::Role) | None => None,
        })
    }
}

#[async_trait]
impl RightsStore for MemoryTx {
    async fn check_access(
        &mut self,
        uuid: Uuid,
        user_uuid: Uuid,
        access: Access,
    ) -> Result<bool, StoreError> {
        let restricted = self
            .work
            .rights
            .keys()
            .any(|(instance, _)| *instance == uuid);
        if !restricted {
            return Ok(true);
        }
        Ok(self
            .work
            .rights
            .get(&(uuid, user_uuid))
            .map(|grant| grant.allows(access))
            .unwrap_or(false))
    }

    async fn put_access(&mut self, grant: &AccessGrant) -> Result<(), StoreError> {
        self.work
            .rights
            .insert((grant.instance_uuid, grant.user_uuid), grant.clone());
        Ok(())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        *self.shared.lock() = self.work;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeInstance, ClassInstance};

    #[tokio::test]
    async fn commit_publishes_and_rollback_discards() {
        let store = MemoryStore::new();
        let object = ObjectInstance::named("committed");

        let mut tx = store.begin().await.unwrap();
        assert!(tx.insert_object(&object).await.unwrap());
        tx.commit().await.unwrap();

        let discarded = ObjectInstance::named("discarded");
        let mut tx = store.begin().await.unwrap();
        assert!(tx.insert_object(&discarded).await.unwrap());
        tx.rollback().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.fetch_object(object.uuid).await.unwrap().is_some());
        assert!(tx.fetch_object(discarded.uuid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cascade_follows_containment_not_references() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let class = ClassInstance::new(Uuid::new_v4());
        tx.insert_object(&class.base).await.unwrap();
        tx.insert_class_row(&class.row()).await.unwrap();

        let mut attribute = AttributeInstance::new(Uuid::new_v4());
        attribute.assigned_class_instance_uuid = Some(class.uuid());
        tx.insert_object(&attribute.base).await.unwrap();
        tx.insert_attribute_row(&attribute.row()).await.unwrap();

        // Deleting the attribute never takes the owning class with it.
        let victims = tx.delete_cascade(attribute.uuid()).await.unwrap();
        assert_eq!(victims.len(), 1);
        assert_eq!(victims[0].uuid, attribute.uuid());
        assert!(tx.fetch_object(class.uuid()).await.unwrap().is_some());

        // Deleting an absent uuid is idempotent.
        let victims = tx.delete_cascade(attribute.uuid()).await.unwrap();
        assert!(victims.is_empty());
    }

    #[tokio::test]
    async fn rights_default_open_until_first_grant() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let instance = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        assert!(tx
            .check_access(instance, stranger, Access::Write)
            .await
            .unwrap());

        tx.put_access(&AccessGrant::all(instance, owner)).await.unwrap();
        assert!(tx.check_access(instance, owner, Access::Delete).await.unwrap());
        assert!(!tx
            .check_access(instance, stranger, Access::Read)
            .await
            .unwrap());
    }
}
