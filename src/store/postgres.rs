use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::model::{
    Access, AccessGrant, AttributeInstanceRow, ClassInstanceRow, Coord2d, Coord3d, InstanceKind,
    ObjectInstance, ParentKind, PortInstanceRow, RelationclassInstanceRow, RoleInstanceRow,
    Rotation, SceneInstanceRow,
};
use crate::store::traits::{
    ChildQuery, Deleted, GraphQueryStore, LinkRowStore, ObjectRowStore, RightsStore, Store,
    StoreError, StoreTx,
};

/// Schema DDL, applied idempotently by [`PgStore::migrate`]. Typed link rows,
/// the scene assignment join and rights rows hang off the base table with
/// `ON DELETE CASCADE`, so removing base rows is the single point of deletion.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS object_instance (
        uuid UUID PRIMARY KEY,
        name TEXT,
        description TEXT,
        coord_2d JSONB,
        coord_3d JSONB,
        rotation JSONB,
        geometry TEXT,
        visibility BOOLEAN,
        custom_variables JSONB,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS class_instance (
        uuid UUID PRIMARY KEY REFERENCES object_instance(uuid) ON DELETE CASCADE,
        class_uuid UUID NOT NULL,
        relationclass_uuid UUID,
        decomposable_scene_uuid UUID,
        aggregator_uuid UUID,
        bendpoint_relationclass_uuid UUID
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS port_instance (
        uuid UUID PRIMARY KEY REFERENCES object_instance(uuid) ON DELETE CASCADE,
        port_uuid UUID NOT NULL,
        class_instance_uuid UUID,
        scene_instance_uuid UUID
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attribute_instance (
        uuid UUID PRIMARY KEY REFERENCES object_instance(uuid) ON DELETE CASCADE,
        attribute_uuid UUID NOT NULL,
        value JSONB,
        assigned_scene_instance_uuid UUID,
        assigned_class_instance_uuid UUID,
        assigned_port_instance_uuid UUID,
        role_from_uuid UUID,
        table_row BIGINT,
        table_attribute_uuid UUID
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_instance (
        uuid UUID PRIMARY KEY REFERENCES object_instance(uuid) ON DELETE CASCADE,
        role_uuid UUID NOT NULL,
        class_instance_uuid UUID,
        port_instance_uuid UUID,
        scene_instance_uuid UUID,
        attribute_instance_uuid UUID,
        relationclass_instance_uuid UUID,
        relationclass_uuid UUID
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS relationclass_instance (
        uuid UUID PRIMARY KEY REFERENCES object_instance(uuid) ON DELETE CASCADE,
        role_from_uuid UUID NOT NULL,
        role_to_uuid UUID NOT NULL,
        line_points JSONB NOT NULL DEFAULT '[]'::jsonb
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scene_instance (
        uuid UUID PRIMARY KEY REFERENCES object_instance(uuid) ON DELETE CASCADE,
        scene_type_uuid UUID NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assigned_to_scene (
        scene_uuid UUID NOT NULL REFERENCES object_instance(uuid) ON DELETE CASCADE,
        member_uuid UUID NOT NULL REFERENCES object_instance(uuid) ON DELETE CASCADE,
        PRIMARY KEY (scene_uuid, member_uuid)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS instance_rights (
        instance_uuid UUID NOT NULL REFERENCES object_instance(uuid) ON DELETE CASCADE,
        user_uuid UUID NOT NULL,
        can_read BOOLEAN NOT NULL DEFAULT FALSE,
        can_write BOOLEAN NOT NULL DEFAULT FALSE,
        can_delete BOOLEAN NOT NULL DEFAULT FALSE,
        PRIMARY KEY (instance_uuid, user_uuid)
    )
    "#,
];

/// Named rights-check statements. An instance with no grants is unrestricted;
/// once grants exist the acting user needs an explicit flag.
const READ_CHECK: &str = r#"
    SELECT NOT EXISTS (SELECT 1 FROM instance_rights WHERE instance_uuid = $1)
        OR COALESCE((SELECT can_read FROM instance_rights
                     WHERE instance_uuid = $1 AND user_uuid = $2), FALSE) AS allowed
"#;
const WRITE_CHECK: &str = r#"
    SELECT NOT EXISTS (SELECT 1 FROM instance_rights WHERE instance_uuid = $1)
        OR COALESCE((SELECT can_write FROM instance_rights
                     WHERE instance_uuid = $1 AND user_uuid = $2), FALSE) AS allowed
"#;
const DELETE_CHECK: &str = r#"
    SELECT NOT EXISTS (SELECT 1 FROM instance_rights WHERE instance_uuid = $1)
        OR COALESCE((SELECT can_delete FROM instance_rights
                     WHERE instance_uuid = $1 AND user_uuid = $2), FALSE) AS allowed
"#;

/// Containment closure of one root. The edge list unions every dependency
/// relation the data model declares; reference edges (relationclass role
/// ends) are absent here and handled by the deletion rule engine.
const CASCADE_CLOSURE: &str = r#"
    WITH RECURSIVE deps(parent_uuid, child_uuid) AS (
        SELECT assigned_scene_instance_uuid, uuid FROM attribute_instance
            WHERE assigned_scene_instance_uuid IS NOT NULL
        UNION ALL
        SELECT assigned_class_instance_uuid, uuid FROM attribute_instance
            WHERE assigned_class_instance_uuid IS NOT NULL
        UNION ALL
        SELECT assigned_port_instance_uuid, uuid FROM attribute_instance
            WHERE assigned_port_instance_uuid IS NOT NULL
        UNION ALL
        SELECT table_attribute_uuid, uuid FROM attribute_instance
            WHERE table_attribute_uuid IS NOT NULL
        UNION ALL
        SELECT class_instance_uuid, uuid FROM port_instance
            WHERE class_instance_uuid IS NOT NULL
        UNION ALL
        SELECT scene_instance_uuid, uuid FROM port_instance
            WHERE scene_instance_uuid IS NOT NULL
        UNION ALL
        SELECT class_instance_uuid, uuid FROM role_instance
            WHERE class_instance_uuid IS NOT NULL
        UNION ALL
        SELECT port_instance_uuid, uuid FROM role_instance
            WHERE port_instance_uuid IS NOT NULL
        UNION ALL
        SELECT scene_instance_uuid, uuid FROM role_instance
            WHERE scene_instance_uuid IS NOT NULL
        UNION ALL
        SELECT attribute_instance_uuid, uuid FROM role_instance
            WHERE attribute_instance_uuid IS NOT NULL
        UNION ALL
        SELECT relationclass_instance_uuid, uuid FROM role_instance
            WHERE relationclass_instance_uuid IS NOT NULL
        UNION ALL
        SELECT relationclass_uuid, uuid FROM role_instance
            WHERE relationclass_uuid IS NOT NULL
        UNION ALL
        SELECT bendpoint_relationclass_uuid, uuid FROM class_instance
            WHERE bendpoint_relationclass_uuid IS NOT NULL
        UNION ALL
        SELECT scene_uuid, member_uuid FROM assigned_to_scene
    ),
    closure(uuid) AS (
        SELECT uuid FROM object_instance WHERE uuid = $1
        UNION
        SELECT d.child_uuid FROM deps d JOIN closure c ON d.parent_uuid = c.uuid
    )
    SELECT cl.uuid,
           CASE
               WHEN rc.uuid IS NOT NULL THEN 'relationclass'
               WHEN k.uuid IS NOT NULL THEN 'class'
               WHEN p.uuid IS NOT NULL THEN 'port'
               WHEN a.uuid IS NOT NULL THEN 'attribute'
               WHEN r.uuid IS NOT NULL THEN 'role'
               WHEN sc.uuid IS NOT NULL THEN 'scene'
           END AS kind
    FROM closure cl
    LEFT JOIN relationclass_instance rc ON rc.uuid = cl.uuid
    LEFT JOIN class_instance k ON k.uuid = cl.uuid
    LEFT JOIN port_instance p ON p.uuid = cl.uuid
    LEFT JOIN attribute_instance a ON a.uuid = cl.uuid
    LEFT JOIN role_instance r ON r.uuid = cl.uuid
    LEFT JOIN scene_instance sc ON sc.uuid = cl.uuid
"#;

const OBJECT_COLUMNS: &str = "uuid, name, description, coord_2d, coord_3d, rotation, geometry, \
                              visibility, custom_variables, created_at, updated_at";

/// PostgreSQL storage adapter. Holds the connection pool; transaction-scoped
/// clients are handed out through [`Store::begin`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new PostgreSQL store with the given database URL.
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_max_connections(database_url, 20).await
    }

    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let url = config.database_url()?;
        Self::with_max_connections(&url, config.database.max_connections.unwrap_or(20)).await
    }

    /// Apply the schema DDL. Safe to run repeatedly.
    pub async fn migrate(&self) -> Result<()> {
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply schema migration")?;
        }
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

/// One open transaction against PostgreSQL. Dropping without commit rolls
/// back through sqlx.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

fn decode_json<T: serde::de::DeserializeOwned>(
    uuid: Uuid,
    value: Option<serde_json::Value>,
) -> Result<Option<T>, StoreError> {
    value
        .map(|value| serde_json::from_value(value))
        .transpose()
        .map_err(|err| StoreError::Decode {
            uuid,
            message: err.to_string(),
        })
}

fn object_from_row(row: &PgRow) -> Result<ObjectInstance, StoreError> {
    let uuid: Uuid = row.try_get("uuid")?;
    Ok(ObjectInstance {
        uuid,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        coord_2d: decode_json::<Coord2d>(uuid, row.try_get("coord_2d")?)?,
        coord_3d: decode_json::<Coord3d>(uuid, row.try_get("coord_3d")?)?,
        rotation: decode_json::<Rotation>(uuid, row.try_get("rotation")?)?,
        geometry: row.try_get("geometry")?,
        visibility: row.try_get("visibility")?,
        custom_variables: row.try_get("custom_variables")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn kind_from_label(label: Option<&str>) -> Option<InstanceKind> {
    match label {
        Some("relationclass") => Some(InstanceKind::Relationclass),
        Some("class") => Some(InstanceKind::Class),
        Some("port") => Some(InstanceKind::Port),
        Some("attribute") => Some(InstanceKind::Attribute),
        Some("role") => Some(InstanceKind::Role),
        Some("scene") => Some(InstanceKind::Scene),
        _ => None,
    }
}

#[async_trait]
impl ObjectRowStore for PgTx {
    async fn insert_object(&mut self, row: &ObjectInstance) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO object_instance
                (uuid, name, description, coord_2d, coord_3d, rotation, geometry,
                 visibility, custom_variables, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (uuid) DO NOTHING
            "#,
        )
        .bind(row.uuid)
        .bind(&row.name)
        .bind(&row.description)
        .bind(row.coord_2d.map(|c| serde_json::json!(c)))
        .bind(row.coord_3d.map(|c| serde_json::json!(c)))
        .bind(row.rotation.map(|r| serde_json::json!(r)))
        .bind(&row.geometry)
        .bind(row.visibility)
        .bind(&row.custom_variables)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_object(&mut self, uuid: Uuid) -> Result<Option<ObjectInstance>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {OBJECT_COLUMNS} FROM object_instance WHERE uuid = $1"
        ))
        .bind(uuid)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(object_from_row).transpose()
    }

    async fn update_object(&mut self, row: &ObjectInstance) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE object_instance SET
                name = $2, description = $3, coord_2d = $4, coord_3d = $5,
                rotation = $6, geometry = $7, visibility = $8,
                custom_variables = $9, updated_at = $10
            WHERE uuid = $1
            "#,
        )
        .bind(row.uuid)
        .bind(&row.name)
        .bind(&row.description)
        .bind(row.coord_2d.map(|c| serde_json::json!(c)))
        .bind(row.coord_3d.map(|c| serde_json::json!(c)))
        .bind(row.rotation.map(|r| serde_json::json!(r)))
        .bind(&row.geometry)
        .bind(row.visibility)
        .bind(&row.custom_variables)
        .bind(row.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_cascade(&mut self, uuid: Uuid) -> Result<Vec<Deleted>, StoreError> {
        let rows = sqlx::query(CASCADE_CLOSURE)
            .bind(uuid)
            .fetch_all(&mut *self.tx)
            .await?;

        let mut victims = Vec::with_capacity(rows.len());
        for row in &rows {
            let victim_uuid: Uuid = row.try_get("uuid")?;
            let label: Option<String> = row.try_get("kind")?;
            victims.push(Deleted::new(victim_uuid, kind_from_label(label.as_deref())));
        }

        if !victims.is_empty() {
            let uuids: Vec<Uuid> = victims.iter().map(|victim| victim.uuid).collect();
            sqlx::query("DELETE FROM object_instance WHERE uuid = ANY($1)")
                .bind(&uuids)
                .execute(&mut *self.tx)
                .await?;
        }

        Ok(victims)
    }
}

#[async_trait]
impl LinkRowStore for PgTx {
    async fn insert_class_row(&mut self, row: &ClassInstanceRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO class_instance
                (uuid, class_uuid, relationclass_uuid, decomposable_scene_uuid,
                 aggregator_uuid, bendpoint_relationclass_uuid)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(row.uuid)
        .bind(row.class_uuid)
        .bind(row.relationclass_uuid)
        .bind(row.decomposable_scene_uuid)
        .bind(row.aggregator_uuid)
        .bind(row.bendpoint_relationclass_uuid)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn fetch_class_row(
        &mut self,
        uuid: Uuid,
    ) -> Result<Option<ClassInstanceRow>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT uuid, class_uuid, relationclass_uuid, decomposable_scene_uuid,
                   aggregator_uuid, bendpoint_relationclass_uuid
            FROM class_instance WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| -> Result<ClassInstanceRow, StoreError> {
            Ok(ClassInstanceRow {
                uuid: row.try_get("uuid")?,
                class_uuid: row.try_get("class_uuid")?,
                relationclass_uuid: row.try_get("relationclass_uuid")?,
                decomposable_scene_uuid: row.try_get("decomposable_scene_uuid")?,
                aggregator_uuid: row.try_get("aggregator_uuid")?,
                bendpoint_relationclass_uuid: row.try_get("bendpoint_relationclass_uuid")?,
            })
        })
        .transpose()
    }

    async fn update_class_row(&mut self, row: &ClassInstanceRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE class_instance SET
                class_uuid = $2, relationclass_uuid = $3, decomposable_scene_uuid = $4,
                aggregator_uuid = $5, bendpoint_relationclass_uuid = $6
            WHERE uuid = $1
            "#,
        )
        .bind(row.uuid)
        .bind(row.class_uuid)
        .bind(row.relationclass_uuid)
        .bind(row.decomposable_scene_uuid)
        .bind(row.aggregator_uuid)
        .bind(row.bendpoint_relationclass_uuid)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_port_row(&mut self, row: &PortInstanceRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO port_instance (uuid, port_uuid, class_instance_uuid, scene_instance_uuid)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(row.uuid)
        .bind(row.port_uuid)
        .bind(row.class_instance_uuid)
        .bind(row.scene_instance_uuid)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn fetch_port_row(&mut self, uuid: Uuid) -> Result<Option<PortInstanceRow>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT uuid, port_uuid, class_instance_uuid, scene_instance_uuid
            FROM port_instance WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| -> Result<PortInstanceRow, StoreError> {
            Ok(PortInstanceRow {
                uuid: row.try_get("uuid")?,
                port_uuid: row.try_get("port_uuid")?,
                class_instance_uuid: row.try_get("class_instance_uuid")?,
                scene_instance_uuid: row.try_get("scene_instance_uuid")?,
            })
        })
        .transpose()
    }

    async fn update_port_row(&mut self, row: &PortInstanceRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE port_instance SET
                port_uuid = $2, class_instance_uuid = $3, scene_instance_uuid = $4
            WHERE uuid = $1
            "#,
        )
        .bind(row.uuid)
        .bind(row.port_uuid)
        .bind(row.class_instance_uuid)
        .bind(row.scene_instance_uuid)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_attribute_row(&mut self, row: &AttributeInstanceRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO attribute_instance
                (uuid, attribute_uuid, value, assigned_scene_instance_uuid,
                 assigned_class_instance_uuid, assigned_port_instance_uuid,
                 role_from_uuid, table_row, table_attribute_uuid)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(row.uuid)
        .bind(row.attribute_uuid)
        .bind(&row.value)
        .bind(row.assigned_scene_instance_uuid)
        .bind(row.assigned_class_instance_uuid)
        .bind(row.assigned_port_instance_uuid)
        .bind(row.role_from_uuid)
        .bind(row.table_row)
        .bind(row.table_attribute_uuid)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn fetch_attribute_row(
        &mut self,
        uuid: Uuid,
    ) -> Result<Option<AttributeInstanceRow>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT uuid, attribute_uuid, value, assigned_scene_instance_uuid,
                   assigned_class_instance_uuid, assigned_port_instance_uuid,
                   role_from_uuid, table_row, table_attribute_uuid
            FROM attribute_instance WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| -> Result<AttributeInstanceRow, StoreError> {
            Ok(AttributeInstanceRow {
                uuid: row.try_get("uuid")?,
                attribute_uuid: row.try_get("attribute_uuid")?,
                value: row.try_get("value")?,
                assigned_scene_instance_uuid: row.try_get("assigned_scene_instance_uuid")?,
                assigned_class_instance_uuid: row.try_get("assigned_class_instance_uuid")?,
                assigned_port_instance_uuid: row.try_get("assigned_port_instance_uuid")?,
                role_from_uuid: row.try_get("role_from_uuid")?,
                table_row: row.try_get("table_row")?,
                table_attribute_uuid: row.try_get("table_attribute_uuid")?,
            })
        })
        .transpose()
    }

    async fn update_attribute_row(&mut self, row: &AttributeInstanceRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE attribute_instance SET
                attribute_uuid = $2, value = $3, assigned_scene_instance_uuid = $4,
                assigned_class_instance_uuid = $5, assigned_port_instance_uuid = $6,
                role_from_uuid = $7, table_row = $8, table_attribute_uuid = $9
            WHERE uuid = $1
            "#,
        )
        .bind(row.uuid)
        .bind(row.attribute_uuid)
        .bind(&row.value)
        .bind(row.assigned_scene_instance_uuid)
        .bind(row.assigned_class_instance_uuid)
        .bind(row.assigned_port_instance_uuid)
        .bind(row.role_from_uuid)
        .bind(row.table_row)
        .bind(row.table_attribute_uuid)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_role_row(&mut self, row: &RoleInstanceRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO role_instance
                (uuid, role_uuid, class_instance_uuid, port_instance_uuid,
                 scene_instance_uuid, attribute_instance_uuid,
                 relationclass_instance_uuid, relationclass_uuid)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(row.uuid)
        .bind(row.role_uuid)
        .bind(row.class_instance_uuid)
        .bind(row.port_instance_uuid)
        .bind(row.scene_instance_uuid)
        .bind(row.attribute_instance_uuid)
        .bind(row.relationclass_instance_uuid)
        .bind(row.relationclass_uuid)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn fetch_role_row(&mut self, uuid: Uuid) -> Result<Option<RoleInstanceRow>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT uuid, role_uuid, class_instance_uuid, port_instance_uuid,
                   scene_instance_uuid, attribute_instance_uuid,
                   relationclass_instance_uuid, relationclass_uuid
            FROM role_instance WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| -> Result<RoleInstanceRow, StoreError> {
            Ok(RoleInstanceRow {
                uuid: row.try_get("uuid")?,
                role_uuid: row.try_get("role_uuid")?,
                class_instance_uuid: row.try_get("class_instance_uuid")?,
                port_instance_uuid: row.try_get("port_instance_uuid")?,
                scene_instance_uuid: row.try_get("scene_instance_uuid")?,
                attribute_instance_uuid: row.try_get("attribute_instance_uuid")?,
                relationclass_instance_uuid: row.try_get("relationclass_instance_uuid")?,
                relationclass_uuid: row.try_get("relationclass_uuid")?,
            })
        })
        .transpose()
    }

    async fn update_role_row(&mut self, row: &RoleInstanceRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE role_instance SET
                role_uuid = $2, class_instance_uuid = $3, port_instance_uuid = $4,
                scene_instance_uuid = $5, attribute_instance_uuid = $6,
                relationclass_instance_uuid = $7, relationclass_uuid = $8
            WHERE uuid = $1
            "#,
        )
        .bind(row.uuid)
        .bind(row.role_uuid)
        .bind(row.class_instance_uuid)
        .bind(row.port_instance_uuid)
        .bind(row.scene_instance_uuid)
        .bind(row.attribute_instance_uuid)
        .bind(row.relationclass_instance_uuid)
        .bind(row.relationclass_uuid)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_relationclass_row(
        &mut self,
        row: &RelationclassInstanceRow,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO relationclass_instance (uuid, role_from_uuid, role_to_uuid, line_points)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(row.uuid)
        .bind(row.role_from_uuid)
        .bind(row.role_to_uuid)
        .bind(serde_json::json!(row.line_points))
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn fetch_relationclass_row(
        &mut self,
        uuid: Uuid,
    ) -> Result<Option<RelationclassInstanceRow>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT uuid, role_from_uuid, role_to_uuid, line_points
            FROM relationclass_instance WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|row| -> Result<RelationclassInstanceRow, StoreError> {
            let uuid: Uuid = row.try_get("uuid")?;
            let line_points: serde_json::Value = row.try_get("line_points")?;
            Ok(RelationclassInstanceRow {
                uuid,
                role_from_uuid: row.try_get("role_from_uuid")?,
                role_to_uuid: row.try_get("role_to_uuid")?,
                line_points: decode_json::<Vec<Uuid>>(uuid, Some(line_points))?
                    .unwrap_or_default(),
            })
        })
        .transpose()
    }

    async fn update_relationclass_row(
        &mut self,
        row: &RelationclassInstanceRow,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE relationclass_instance SET
                role_from_uuid = $2, role_to_uuid = $3, line_points = $4
            WHERE uuid = $1
            "#,
        )
        .bind(row.uuid)
        .bind(row.role_from_uuid)
        .bind(row.role_to_uuid)
        .bind(serde_json::json!(row.line_points))
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_scene_row(&mut self, row: &SceneInstanceRow) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO scene_instance (uuid, scene_type_uuid) VALUES ($1, $2)")
            .bind(row.uuid)
            .bind(row.scene_type_uuid)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn fetch_scene_row(
        &mut self,
        uuid: Uuid,
    ) -> Result<Option<SceneInstanceRow>, StoreError> {
        let row =
            sqlx::query("SELECT uuid, scene_type_uuid FROM scene_instance WHERE uuid = $1")
                .bind(uuid)
                .fetch_optional(&mut *self.tx)
                .await?;

        row.map(|row| -> Result<SceneInstanceRow, StoreError> {
            Ok(SceneInstanceRow {
                uuid: row.try_get("uuid")?,
                scene_type_uuid: row.try_get("scene_type_uuid")?,
            })
        })
        .transpose()
    }

    async fn update_scene_row(&mut self, row: &SceneInstanceRow) -> Result<(), StoreError> {
        sqlx::query("UPDATE scene_instance SET scene_type_uuid = $2 WHERE uuid = $1")
            .bind(row.uuid)
            .bind(row.scene_type_uuid)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn link_to_scene(
        &mut self,
        scene_uuid: Uuid,
        member_uuid: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO assigned_to_scene (scene_uuid, member_uuid)
            VALUES ($1, $2)
            ON CONFLICT (scene_uuid, member_uuid) DO NOTHING
            "#,
        )
        .bind(scene_uuid)
        .bind(member_uuid)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn unlink_from_scene(
        &mut self,
        scene_uuid: Uuid,
        member_uuid: Uuid,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM assigned_to_scene WHERE scene_uuid = $1 AND member_uuid = $2")
            .bind(scene_uuid)
            .bind(member_uuid)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl GraphQueryStore for PgTx {
    async fn child_uuids(&mut self, query: ChildQuery) -> Result<Vec<Uuid>, StoreError> {
        let (sql, parent) = match query {
            ChildQuery::AttributesOfScene(parent) => (
                "SELECT uuid FROM attribute_instance \
                 WHERE assigned_scene_instance_uuid = $1 ORDER BY uuid",
                parent,
            ),
            ChildQuery::AttributesOfClass(parent) => (
                "SELECT uuid FROM attribute_instance \
                 WHERE assigned_class_instance_uuid = $1 ORDER BY uuid",
                parent,
            ),
            ChildQuery::AttributesOfPort(parent) => (
                "SELECT uuid FROM attribute_instance \
                 WHERE assigned_port_instance_uuid = $1 ORDER BY uuid",
                parent,
            ),
            ChildQuery::TableCells(parent) => (
                "SELECT uuid FROM attribute_instance \
                 WHERE table_attribute_uuid = $1 ORDER BY table_row, uuid",
                parent,
            ),
            ChildQuery::PortsOfClass(parent) => (
                "SELECT uuid FROM port_instance WHERE class_instance_uuid = $1 ORDER BY uuid",
                parent,
            ),
            ChildQuery::PortsOfScene(parent) => (
                "SELECT uuid FROM port_instance WHERE scene_instance_uuid = $1 ORDER BY uuid",
                parent,
            ),
            ChildQuery::RolesOfScene(parent) => (
                "SELECT uuid FROM role_instance WHERE scene_instance_uuid = $1 ORDER BY uuid",
                parent,
            ),
            ChildQuery::SceneClassMembers(scene) => (
                "SELECT s.member_uuid AS uuid FROM assigned_to_scene s \
                 JOIN class_instance k ON k.uuid = s.member_uuid \
                 LEFT JOIN relationclass_instance rc ON rc.uuid = s.member_uuid \
                 WHERE s.scene_uuid = $1 AND rc.uuid IS NULL ORDER BY uuid",
                scene,
            ),
            ChildQuery::SceneRelationclassMembers(scene) => (
                "SELECT s.member_uuid AS uuid FROM assigned_to_scene s \
                 JOIN relationclass_instance rc ON rc.uuid = s.member_uuid \
                 WHERE s.scene_uuid = $1 ORDER BY uuid",
                scene,
            ),
            ChildQuery::RelationclassesWithRoleEnd(role) => (
                "SELECT uuid FROM relationclass_instance \
                 WHERE role_from_uuid = $1 OR role_to_uuid = $1 ORDER BY uuid",
                role,
            ),
            ChildQuery::ScenesOfSceneType(scene_type) => (
                "SELECT uuid FROM scene_instance WHERE scene_type_uuid = $1 ORDER BY uuid",
                scene_type,
            ),
        };

        let rows = sqlx::query(sql)
            .bind(parent)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("uuid").map_err(StoreError::from))
            .collect()
    }

    async fn resolve_parent_kind(&mut self, uuid: Uuid) -> Result<Option<ParentKind>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT CASE
                WHEN EXISTS (SELECT 1 FROM relationclass_instance WHERE uuid = $1)
                    THEN 'relationclass'
                WHEN EXISTS (SELECT 1 FROM class_instance WHERE uuid = $1) THEN 'class'
                WHEN EXISTS (SELECT 1 FROM port_instance WHERE uuid = $1) THEN 'port'
                WHEN EXISTS (SELECT 1 FROM attribute_instance WHERE uuid = $1) THEN 'attribute'
                WHEN EXISTS (SELECT 1 FROM scene_instance WHERE uuid = $1) THEN 'scene_type'
            END AS kind
            "#,
        )
        .bind(uuid)
        .fetch_one(&mut *self.tx)
        .await?;

        let label: Option<String> = row.try_get("kind")?;
        Ok(match label.as_deref() {
            Some("relationclass") => Some(ParentKind::Relationclass),
            Some("class") => Some(ParentKind::Class),
            Some("port") => Some(ParentKind::Port),
            Some("attribute") => Some(ParentKind::Attribute),
            Some("scene_type") => Some(ParentKind::SceneType),
            _ => None,
        })
    }
}

#[async_trait]
impl RightsStore for PgTx {
    async fn check_access(
        &mut self,
        uuid: Uuid,
        user_uuid: Uuid,
        access: Access,
    ) -> Result<bool, StoreError> {
        let sql = match access {
            Access::Read => READ_CHECK,
            Access::Write => WRITE_CHECK,
            Access::Delete => DELETE_CHECK,
        };
        let row = sqlx::query(sql)
            .bind(uuid)
            .bind(user_uuid)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.try_get("allowed")?)
    }

    async fn put_access(&mut self, grant: &AccessGrant) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO instance_rights (instance_uuid, user_uuid, can_read, can_write, can_delete)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (instance_uuid, user_uuid) DO UPDATE SET
                can_read = EXCLUDED.can_read,
                can_write = EXCLUDED.can_write,
                can_delete = EXCLUDED.can_delete
            "#,
        )
        .bind(grant.instance_uuid)
        .bind(grant.user_uuid)
        .bind(grant.can_read)
        .bind(grant.can_write)
        .bind(grant.can_delete)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_round_trip() {
        assert_eq!(
            kind_from_label(Some("relationclass")),
            Some(InstanceKind::Relationclass)
        );
        assert_eq!(kind_from_label(Some("class")), Some(InstanceKind::Class));
        assert_eq!(kind_from_label(Some("scene")), Some(InstanceKind::Scene));
        assert_eq!(kind_from_label(Some("unknown")), None);
        assert_eq!(kind_from_label(None), None);
    }

    #[test]
    fn json_decode_reports_offending_uuid() {
        let uuid = Uuid::new_v4();
        let ok = decode_json::<Coord2d>(uuid, Some(serde_json::json!({"x": 1.0, "y": 2.0})))
            .unwrap();
        assert_eq!(ok, Some(Coord2d { x: 1.0, y: 2.0 }));

        let err = decode_json::<Coord2d>(uuid, Some(serde_json::json!("not-a-coordinate")))
            .unwrap_err();
        match err {
            StoreError::Decode { uuid: reported, .. } => assert_eq!(reported, uuid),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn absent_json_decodes_to_none() {
        assert_eq!(
            decode_json::<Coord2d>(Uuid::new_v4(), None).unwrap(),
            None
        );
    }
}
