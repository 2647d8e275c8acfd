use chrono::Utc;
use itertools::Itertools;
use uuid::Uuid;

use crate::logic::delete_rules::DeleteRuleEngine;
use crate::logic::rights::RightsGate;
use crate::logic::EngineResult;
use crate::model::{ObjectInstance, Outcome};
use crate::store::traits::StoreTx;

/// The substrate every instance node shares. This is the only component that
/// issues raw insert/update/delete against base rows; typed repositories
/// compose it and add their link rows on top.
pub struct ObjectInstanceStore;

impl ObjectInstanceStore {
    pub async fn get_by_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<ObjectInstance>> {
        if let Some(denied) = RightsGate::can_read(tx, uuid, user_uuid).await? {
            return Ok(Outcome::Forbidden(denied));
        }
        let fetched = tx.fetch_object(uuid).await.map_err(|err| {
            log::error!("failed to fetch object {uuid}: {err}");
            err
        })?;
        Ok(Outcome::from_option(fetched))
    }

    /// Insert a base row. A caller-supplied UUID that already exists yields
    /// `NotFound` ("not created") instead of an error, so composite creators
    /// can pre-assign child UUIDs before the parent exists.
    pub async fn create<S: StoreTx + ?Sized>(
        tx: &mut S,
        object: &ObjectInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<ObjectInstance>> {
        if let Some(denied) = RightsGate::can_write(tx, object.uuid, user_uuid).await? {
            return Ok(Outcome::Forbidden(denied));
        }
        let mut row = object.clone();
        row.created_at = Utc::now();
        row.updated_at = row.created_at;
        let inserted = tx.insert_object(&row).await.map_err(|err| {
            log::error!("failed to insert object {}: {err}", row.uuid);
            err
        })?;
        if !inserted {
            return Ok(Outcome::NotFound);
        }
        Ok(Outcome::Found(row))
    }

    /// Partial update: any field omitted in `patch` keeps the stored value.
    pub async fn update<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        patch: &ObjectInstance,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<ObjectInstance>> {
        let Some(stored) = tx.fetch_object(uuid).await? else {
            return Ok(Outcome::NotFound);
        };
        if let Some(denied) = RightsGate::can_write(tx, uuid, user_uuid).await? {
            return Ok(Outcome::Forbidden(denied));
        }
        let merged = patch.coalesce_onto(&stored);
        tx.update_object(&merged).await.map_err(|err| {
            log::error!("failed to update object {uuid}: {err}");
            err
        })?;
        Ok(Outcome::Found(merged))
    }

    /// Delete the row and everything contractually dependent on it, then run
    /// the deletion rules over the victims. Returns the complete affected
    /// UUID set; idempotent on absent UUIDs.
    pub async fn delete_by_uuid<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<Vec<Uuid>>> {
        if let Some(denied) = RightsGate::can_delete(tx, uuid, user_uuid).await? {
            return Ok(Outcome::Forbidden(denied));
        }
        let victims = tx.delete_cascade(uuid).await.map_err(|err| {
            log::error!("cascade delete failed for {uuid}: {err}");
            err
        })?;
        if victims.is_empty() {
            return Ok(Outcome::Found(Vec::new()));
        }
        log::debug!("cascade removed {} rows for {uuid}", victims.len());

        let consequences = match DeleteRuleEngine::apply(tx, victims.clone(), user_uuid).await? {
            Outcome::Found(consequences) => consequences,
            Outcome::NotFound => Vec::new(),
            Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
        };

        let affected = victims
            .into_iter()
            .map(|victim| victim.uuid)
            .chain(consequences)
            .unique()
            .collect();
        Ok(Outcome::Found(affected))
    }

    /// Delete a set of instances, accumulating every affected UUID. The first
    /// forbidden member short-circuits so the enclosing transaction can roll
    /// back whole instead of partially applying.
    pub async fn delete_collection<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuids: &[Uuid],
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<Vec<Uuid>>> {
        let mut affected = Vec::new();
        for &uuid in uuids {
            match Self::delete_by_uuid(tx, uuid, user_uuid).await? {
                Outcome::Found(set) => affected.extend(set),
                Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }
        Ok(Outcome::Found(affected.into_iter().unique().collect()))
    }
}
