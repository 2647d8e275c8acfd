use std::collections::HashSet;

use uuid::Uuid;

use modelgraph_db::store::traits::{LinkRowStore, RightsStore};
use modelgraph_db::{
    AccessGrant, AttributeInstance, ClassInstance, ClassInstanceRepository, MemoryStore,
    ObjectInstanceStore, Outcome, PortInstance, RelationclassInstance,
    RelationclassInstanceRepository, RoleInstance, RoleInstanceRepository, SceneInstance,
    SceneInstanceRepository, Store, StoreTx,
};

async fn begin(store: &MemoryStore) -> Box<dyn StoreTx> {
    store.begin().await.expect("transaction should open")
}

fn uuids(set: &[Uuid]) -> HashSet<Uuid> {
    set.iter().copied().collect()
}

/// Deleting a UUID that was never created returns an empty affected set and
/// never raises, through the object store and the typed repositories alike.
#[tokio::test]
async fn idempotent_deletion_of_unknown_uuid() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let ghost = Uuid::new_v4();
    let affected = ObjectInstanceStore::delete_by_uuid(tx.as_mut(), ghost, None)
        .await
        .unwrap();
    assert_eq!(affected, Outcome::Found(Vec::new()));

    let affected = ClassInstanceRepository::delete_by_uuid(tx.as_mut(), ghost, None)
        .await
        .unwrap();
    assert_eq!(affected, Outcome::Found(Vec::new()));

    let affected = RoleInstanceRepository::delete_by_uuid(tx.as_mut(), ghost, None)
        .await
        .unwrap();
    assert_eq!(affected, Outcome::Found(Vec::new()));
}

/// Deleting a class instance owning three attributes and two ports returns
/// the class UUID plus every descendant UUID.
#[tokio::test]
async fn cascade_completeness_for_class_children() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let mut class = ClassInstance::new(Uuid::new_v4());
    for value in ["one", "two", "three"] {
        class
            .attribute_instances
            .push(AttributeInstance::with_value(
                Uuid::new_v4(),
                serde_json::json!(value),
            ));
    }
    class.port_instances.push(PortInstance::new(Uuid::new_v4()));
    class.port_instances.push(PortInstance::new(Uuid::new_v4()));

    let created = ClassInstanceRepository::create(tx.as_mut(), &class, None)
        .await
        .unwrap()
        .found()
        .expect("class should be created");
    assert_eq!(created.attribute_instances.len(), 3);
    assert_eq!(created.port_instances.len(), 2);

    let affected = ClassInstanceRepository::delete_by_uuid(tx.as_mut(), class.uuid(), None)
        .await
        .unwrap()
        .found()
        .expect("delete should be allowed");

    let mut expected: Vec<Uuid> = vec![class.uuid()];
    expected.extend(class.attribute_instances.iter().map(|a| a.uuid()));
    expected.extend(class.port_instances.iter().map(|p| p.uuid()));
    assert_eq!(uuids(&affected), uuids(&expected));
}

/// Deleting a child never takes its owner with it: an attribute deletion
/// excludes the owning class, a scene-anchored role deletion excludes the
/// scene.
#[tokio::test]
async fn cascade_precision_spares_owners() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let mut class = ClassInstance::new(Uuid::new_v4());
    class
        .attribute_instances
        .push(AttributeInstance::with_value(
            Uuid::new_v4(),
            serde_json::json!(42),
        ));
    let attribute_uuid = class.attribute_instances[0].uuid();
    ClassInstanceRepository::create(tx.as_mut(), &class, None)
        .await
        .unwrap();

    let affected =
        modelgraph_db::AttributeInstanceRepository::delete_by_uuid(tx.as_mut(), attribute_uuid, None)
            .await
            .unwrap()
            .found()
            .unwrap();
    assert_eq!(uuids(&affected), uuids(&[attribute_uuid]));
    assert!(
        ClassInstanceRepository::get_by_uuid(tx.as_mut(), class.uuid(), None)
            .await
            .unwrap()
            .is_found()
    );

    let mut scene = SceneInstance::new(Uuid::new_v4());
    scene
        .role_instances
        .push(RoleInstance::new(Uuid::new_v4()));
    let role_uuid = scene.role_instances[0].uuid();
    SceneInstanceRepository::create(tx.as_mut(), &scene, None)
        .await
        .unwrap();

    let affected = RoleInstanceRepository::delete_by_uuid(tx.as_mut(), role_uuid, None)
        .await
        .unwrap()
        .found()
        .unwrap();
    assert!(affected.contains(&role_uuid));
    assert!(!affected.contains(&scene.uuid()));
}

/// Two-phase creation: a relationclass created with two fresh role payloads
/// resolves to roles whose back-references point at the new relationclass.
#[tokio::test]
async fn two_phase_relationclass_creation_links_roles() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let source = ClassInstance::new(Uuid::new_v4());
    let target = ClassInstance::new(Uuid::new_v4());
    ClassInstanceRepository::create(tx.as_mut(), &source, None)
        .await
        .unwrap();
    ClassInstanceRepository::create(tx.as_mut(), &target, None)
        .await
        .unwrap();

    let relationclass = RelationclassInstance::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        RoleInstance::anchored_to_class(Uuid::new_v4(), source.uuid()),
        RoleInstance::anchored_to_class(Uuid::new_v4(), target.uuid()),
    );
    let created = RelationclassInstanceRepository::create(tx.as_mut(), &relationclass, None)
        .await
        .unwrap()
        .found()
        .expect("relationclass should be created");

    assert_eq!(created.role_from.uuid(), relationclass.role_from.uuid());
    assert_eq!(created.role_to.uuid(), relationclass.role_to.uuid());
    assert_eq!(
        created.role_from.relationclass_uuid,
        Some(relationclass.uuid())
    );
    assert_eq!(
        created.role_to.relationclass_uuid,
        Some(relationclass.uuid())
    );
    assert_eq!(created.role_from.class_instance_uuid, Some(source.uuid()));
    assert_eq!(created.role_to.class_instance_uuid, Some(target.uuid()));
}

/// Deleting a role that anchors a relationclass end deletes the relationclass
/// instance too; both UUIDs (and the opposite end owned by the relationclass)
/// land in the affected set, while the connected class instances survive.
#[tokio::test]
async fn role_anchored_cascade_takes_relationclass() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let source = ClassInstance::new(Uuid::new_v4());
    let target = ClassInstance::new(Uuid::new_v4());
    ClassInstanceRepository::create(tx.as_mut(), &source, None)
        .await
        .unwrap();
    ClassInstanceRepository::create(tx.as_mut(), &target, None)
        .await
        .unwrap();

    let relationclass = RelationclassInstance::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        RoleInstance::anchored_to_class(Uuid::new_v4(), source.uuid()),
        RoleInstance::anchored_to_class(Uuid::new_v4(), target.uuid()),
    );
    RelationclassInstanceRepository::create(tx.as_mut(), &relationclass, None)
        .await
        .unwrap();

    let affected =
        RoleInstanceRepository::delete_by_uuid(tx.as_mut(), relationclass.role_from.uuid(), None)
            .await
            .unwrap()
            .found()
            .unwrap();

    assert!(affected.contains(&relationclass.role_from.uuid()));
    assert!(affected.contains(&relationclass.uuid()));
    assert!(affected.contains(&relationclass.role_to.uuid()));
    assert!(!affected.contains(&source.uuid()));
    assert!(!affected.contains(&target.uuid()));

    assert!(
        RelationclassInstanceRepository::get_by_uuid(tx.as_mut(), relationclass.uuid(), None)
            .await
            .unwrap()
            .is_not_found()
    );
    assert!(
        ClassInstanceRepository::get_by_uuid(tx.as_mut(), source.uuid(), None)
            .await
            .unwrap()
            .is_found()
    );
}

/// Bendpoints belong to the relationclass whose line they shape and die with
/// it.
#[tokio::test]
async fn relationclass_cascade_takes_bendpoints() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let source = ClassInstance::new(Uuid::new_v4());
    let target = ClassInstance::new(Uuid::new_v4());
    ClassInstanceRepository::create(tx.as_mut(), &source, None)
        .await
        .unwrap();
    ClassInstanceRepository::create(tx.as_mut(), &target, None)
        .await
        .unwrap();

    let mut relationclass = RelationclassInstance::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        RoleInstance::anchored_to_class(Uuid::new_v4(), source.uuid()),
        RoleInstance::anchored_to_class(Uuid::new_v4(), target.uuid()),
    );
    RelationclassInstanceRepository::create(tx.as_mut(), &relationclass, None)
        .await
        .unwrap();

    let mut bendpoint = ClassInstance::new(Uuid::new_v4());
    bendpoint.bendpoint_relationclass_uuid = Some(relationclass.uuid());
    ClassInstanceRepository::create(tx.as_mut(), &bendpoint, None)
        .await
        .unwrap();
    relationclass.line_points = vec![bendpoint.uuid()];
    RelationclassInstanceRepository::update(tx.as_mut(), relationclass.uuid(), &relationclass, None)
        .await
        .unwrap();

    let affected =
        RelationclassInstanceRepository::delete_by_uuid(tx.as_mut(), relationclass.uuid(), None)
            .await
            .unwrap()
            .found()
            .unwrap();
    assert!(affected.contains(&bendpoint.uuid()));
    assert!(affected.contains(&relationclass.role_from.uuid()));
    assert!(affected.contains(&relationclass.role_to.uuid()));
}

/// A soft update omitting a child leaves it persisted; a hard update with the
/// same payload deletes it.
#[tokio::test]
async fn soft_update_preserves_hard_update_deletes() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let mut scene = SceneInstance::new(Uuid::new_v4());
    for value in ["a", "b", "c"] {
        scene
            .attribute_instances
            .push(AttributeInstance::with_value(
                Uuid::new_v4(),
                serde_json::json!(value),
            ));
    }
    SceneInstanceRepository::create(tx.as_mut(), &scene, None)
        .await
        .unwrap();

    let hydrated = SceneInstanceRepository::get_by_uuid(tx.as_mut(), scene.uuid(), None)
        .await
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(hydrated.attribute_instances.len(), 3);

    let mut desired = hydrated.clone();
    let omitted = desired.attribute_instances.pop().unwrap();

    let after_soft = SceneInstanceRepository::update(tx.as_mut(), scene.uuid(), &desired, None)
        .await
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(after_soft.attribute_instances.len(), 3);

    let after_hard = SceneInstanceRepository::hard_update(tx.as_mut(), scene.uuid(), &desired, None)
        .await
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(after_hard.attribute_instances.len(), 2);
    assert!(!after_hard
        .attribute_instances
        .iter()
        .any(|attribute| attribute.uuid() == omitted.uuid()));
}

/// A modified child in the payload is reconciled in place by soft update.
#[tokio::test]
async fn soft_update_applies_modified_children() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let mut class = ClassInstance::new(Uuid::new_v4());
    class
        .attribute_instances
        .push(AttributeInstance::with_value(
            Uuid::new_v4(),
            serde_json::json!("before"),
        ));
    ClassInstanceRepository::create(tx.as_mut(), &class, None)
        .await
        .unwrap();

    let mut desired = ClassInstanceRepository::get_by_uuid(tx.as_mut(), class.uuid(), None)
        .await
        .unwrap()
        .found()
        .unwrap();
    desired.attribute_instances[0].value = Some(serde_json::json!("after"));

    let updated = ClassInstanceRepository::update(tx.as_mut(), class.uuid(), &desired, None)
        .await
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(
        updated.attribute_instances[0].value,
        Some(serde_json::json!("after"))
    );
}

/// A table-typed attribute with 3×3 row-tagged cells round-trips, and its
/// deletion returns all nine cell UUIDs plus the table UUID.
#[tokio::test]
async fn table_attribute_round_trip_and_cascade() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let column_metas = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    let mut table = AttributeInstance::new(Uuid::new_v4());
    for row in 0..3i64 {
        for (column, column_meta) in column_metas.iter().enumerate() {
            table.table_attributes.push(AttributeInstance::table_cell(
                *column_meta,
                row,
                serde_json::json!(format!("r{row}c{column}")),
            ));
        }
    }

    let created = modelgraph_db::AttributeInstanceRepository::create(tx.as_mut(), &table, None)
        .await
        .unwrap()
        .found()
        .expect("table attribute should be created");
    assert_eq!(created.table_attributes.len(), 9);

    for cell in &created.table_attributes {
        assert!(cell.table_row.is_some());
        assert_eq!(cell.table_attribute_uuid, Some(table.uuid()));
        assert!(column_metas.contains(&cell.attribute_uuid));
    }
    let rows: Vec<i64> = created
        .table_attributes
        .iter()
        .filter_map(|cell| cell.table_row)
        .collect();
    for row in 0..3i64 {
        assert_eq!(rows.iter().filter(|r| **r == row).count(), 3);
    }

    let affected =
        modelgraph_db::AttributeInstanceRepository::delete_by_uuid(tx.as_mut(), table.uuid(), None)
            .await
            .unwrap()
            .found()
            .unwrap();
    let mut expected: Vec<Uuid> = vec![table.uuid()];
    expected.extend(table.table_attributes.iter().map(|cell| cell.uuid()));
    assert_eq!(uuids(&affected), uuids(&expected));
}

/// A user lacking a right gets a Forbidden value and no mutation happens.
#[tokio::test]
async fn rights_short_circuit_without_mutation() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let reader = Uuid::new_v4();
    let stranger = Uuid::new_v4();

    let mut class = ClassInstance::new(Uuid::new_v4());
    class.base.name = Some("guarded".to_string());
    ClassInstanceRepository::create(tx.as_mut(), &class, None)
        .await
        .unwrap();
    tx.put_access(&AccessGrant::read_only(class.uuid(), reader))
        .await
        .unwrap();

    // Reading with the granted right works.
    assert!(
        ClassInstanceRepository::get_by_uuid(tx.as_mut(), class.uuid(), Some(reader))
            .await
            .unwrap()
            .is_found()
    );
    // A user with no grant on a restricted instance cannot read.
    assert!(
        ClassInstanceRepository::get_by_uuid(tx.as_mut(), class.uuid(), Some(stranger))
            .await
            .unwrap()
            .is_forbidden()
    );

    // Write and delete are forbidden for the read-only user.
    let mut desired = class.clone();
    desired.base.name = Some("tampered".to_string());
    assert!(
        ClassInstanceRepository::update(tx.as_mut(), class.uuid(), &desired, Some(reader))
            .await
            .unwrap()
            .is_forbidden()
    );
    assert!(
        ClassInstanceRepository::delete_by_uuid(tx.as_mut(), class.uuid(), Some(reader))
            .await
            .unwrap()
            .is_forbidden()
    );

    // The instance is unchanged and still present.
    let unchanged = ClassInstanceRepository::get_by_uuid(tx.as_mut(), class.uuid(), None)
        .await
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(unchanged.base.name.as_deref(), Some("guarded"));
}

/// Scene membership is assignment, not ownership: unlinking a class instance
/// removes it from the hydrated scene but the instance itself survives.
#[tokio::test]
async fn class_instance_outlives_scene_removal() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let mut scene = SceneInstance::new(Uuid::new_v4());
    scene.class_instances.push(ClassInstance::new(Uuid::new_v4()));
    let member_uuid = scene.class_instances[0].uuid();
    SceneInstanceRepository::create(tx.as_mut(), &scene, None)
        .await
        .unwrap();

    tx.unlink_from_scene(scene.uuid(), member_uuid).await.unwrap();

    let hydrated = SceneInstanceRepository::get_by_uuid(tx.as_mut(), scene.uuid(), None)
        .await
        .unwrap()
        .found()
        .unwrap();
    assert!(hydrated.class_instances.is_empty());
    assert!(
        ClassInstanceRepository::get_by_uuid(tx.as_mut(), member_uuid, None)
            .await
            .unwrap()
            .is_found()
    );
}

/// Deleting a scene cascades every member collection.
#[tokio::test]
async fn scene_deletion_cascades_members() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let mut scene = SceneInstance::new(Uuid::new_v4());
    scene.class_instances.push(ClassInstance::new(Uuid::new_v4()));
    scene.port_instances.push(PortInstance::new(Uuid::new_v4()));
    scene
        .attribute_instances
        .push(AttributeInstance::with_value(
            Uuid::new_v4(),
            serde_json::json!(true),
        ));
    scene.role_instances.push(RoleInstance::new(Uuid::new_v4()));
    SceneInstanceRepository::create(tx.as_mut(), &scene, None)
        .await
        .unwrap();

    let affected = SceneInstanceRepository::delete_by_uuid(tx.as_mut(), scene.uuid(), None)
        .await
        .unwrap()
        .found()
        .unwrap();

    let mut expected = vec![scene.uuid()];
    expected.push(scene.class_instances[0].uuid());
    expected.push(scene.port_instances[0].uuid());
    expected.push(scene.attribute_instances[0].uuid());
    expected.push(scene.role_instances[0].uuid());
    assert_eq!(uuids(&affected), uuids(&expected));
}

/// A caller-supplied UUID that already exists yields "not created" instead of
/// an error, so composite creators can pre-assign child UUIDs safely.
#[tokio::test]
async fn duplicate_uuid_create_is_guarded() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let class = ClassInstance::new(Uuid::new_v4());
    assert!(ClassInstanceRepository::create(tx.as_mut(), &class, None)
        .await
        .unwrap()
        .is_found());
    assert!(ClassInstanceRepository::create(tx.as_mut(), &class, None)
        .await
        .unwrap()
        .is_not_found());
    assert!(ObjectInstanceStore::create(tx.as_mut(), &class.base, None)
        .await
        .unwrap()
        .is_not_found());
}

/// Fields omitted from an update payload keep their stored values.
#[tokio::test]
async fn partial_update_keeps_omitted_fields() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let mut class = ClassInstance::new(Uuid::new_v4());
    class.base.name = Some("boiler".to_string());
    class.base.description = Some("feeds the main loop".to_string());
    ClassInstanceRepository::create(tx.as_mut(), &class, None)
        .await
        .unwrap();

    let mut desired = ClassInstance::new(class.class_uuid);
    desired.base = modelgraph_db::ObjectInstance::with_uuid(class.uuid());
    desired.base.name = Some("boiler-2".to_string());

    let updated = ClassInstanceRepository::update(tx.as_mut(), class.uuid(), &desired, None)
        .await
        .unwrap()
        .found()
        .unwrap();
    assert_eq!(updated.base.name.as_deref(), Some("boiler-2"));
    assert_eq!(
        updated.base.description.as_deref(),
        Some("feeds the main loop")
    );
}

/// Children lookups pick the relationship query matching the parent's
/// metamodel category: the same repository call hydrates class-anchored and
/// port-anchored attributes through different joins.
#[tokio::test]
async fn children_lookup_follows_parent_category() {
    let store = MemoryStore::new();
    let mut tx = begin(&store).await;

    let mut class = ClassInstance::new(Uuid::new_v4());
    class
        .attribute_instances
        .push(AttributeInstance::with_value(
            Uuid::new_v4(),
            serde_json::json!("class-level"),
        ));
    ClassInstanceRepository::create(tx.as_mut(), &class, None)
        .await
        .unwrap();

    let mut port = PortInstance::new(Uuid::new_v4());
    port.class_instance_uuid = Some(class.uuid());
    port.attribute_instances.push(AttributeInstance::with_value(
        Uuid::new_v4(),
        serde_json::json!("port-level"),
    ));
    modelgraph_db::PortInstanceRepository::create(tx.as_mut(), &port, None)
        .await
        .unwrap();

    let class_attributes = modelgraph_db::AttributeInstanceRepository::get_all_by_parent_uuid(
        tx.as_mut(),
        class.uuid(),
        None,
    )
    .await
    .unwrap();
    assert_eq!(class_attributes.len(), 1);
    assert_eq!(
        class_attributes[0].value,
        Some(serde_json::json!("class-level"))
    );

    let port_attributes = modelgraph_db::AttributeInstanceRepository::get_all_by_parent_uuid(
        tx.as_mut(),
        port.uuid(),
        None,
    )
    .await
    .unwrap();
    assert_eq!(port_attributes.len(), 1);
    assert_eq!(
        port_attributes[0].value,
        Some(serde_json::json!("port-level"))
    );
}

/// Work staged in a transaction disappears on rollback and survives commit.
#[tokio::test]
async fn transaction_rollback_discards_engine_writes() {
    let store = MemoryStore::new();

    let class = ClassInstance::new(Uuid::new_v4());
    let mut tx = begin(&store).await;
    ClassInstanceRepository::create(tx.as_mut(), &class, None)
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    let mut tx = begin(&store).await;
    assert!(
        ClassInstanceRepository::get_by_uuid(tx.as_mut(), class.uuid(), None)
            .await
            .unwrap()
            .is_not_found()
    );

    ClassInstanceRepository::create(tx.as_mut(), &class, None)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = begin(&store).await;
    assert!(
        ClassInstanceRepository::get_by_uuid(tx.as_mut(), class.uuid(), None)
            .await
            .unwrap()
            .is_found()
    );
}
