use futures::future::BoxFuture;
use uuid::Uuid;

use crate::logic::object_instance::ObjectInstanceStore;
use crate::logic::{EngineError, EngineResult};
use crate::model::Outcome;
use crate::store::traits::{ChildQuery, Deleted, StoreTx};

/// Post-delete hooks enforcing cross-type consequences that plain ownership
/// cascades cannot express. Rules run sequentially over the victim set of a
/// confirmed deletion; a rule failure aborts the enclosing transaction.
pub struct DeleteRuleEngine;

impl DeleteRuleEngine {
    /// Run every rule over a cascade victim set and return the additional
    /// affected UUIDs. Boxed because consequent deletions re-enter the object
    /// store, which re-enters this engine for their own victims.
    pub fn apply<'a, S: StoreTx + ?Sized>(
        tx: &'a mut S,
        victims: Vec<Deleted>,
        user_uuid: Option<Uuid>,
    ) -> BoxFuture<'a, EngineResult<Outcome<Vec<Uuid>>>> {
        Box::pin(async move {
            let mut affected = Vec::new();
            for victim in victims.iter().filter(|victim| victim.is_role()) {
                match Self::delete_relationclass_if_role_from_to(tx, victim.uuid, user_uuid)
                    .await?
                {
                    Outcome::Found(consequences) => affected.extend(consequences),
                    Outcome::NotFound => {}
                    Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
                }
            }
            Ok(Outcome::Found(affected))
        })
    }

    /// Precondition for explicit role deletions: `Ok(false)` when the UUID
    /// resolves to nothing at all (the idempotent path), a constraint
    /// violation when it exists but is not a role.
    pub async fn ensure_role<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
    ) -> EngineResult<bool> {
        if tx.fetch_object(uuid).await?.is_none() {
            return Ok(false);
        }
        if tx.fetch_role_row(uuid).await?.is_none() {
            return Err(EngineError::Constraint(format!(
                "{uuid} does not resolve to a role instance"
            )));
        }
        Ok(true)
    }

    /// A relationclass instance is meaningless with a dangling endpoint. Role
    /// anchoring is a reference, not containment, so the storage cascade
    /// cannot follow it; this rule closes the gap after the fact.
    async fn delete_relationclass_if_role_from_to<S: StoreTx + ?Sized>(
        tx: &mut S,
        role_uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Outcome<Vec<Uuid>>> {
        let relationclasses = tx
            .child_uuids(ChildQuery::RelationclassesWithRoleEnd(role_uuid))
            .await?;
        let mut affected = Vec::new();
        for relationclass_uuid in relationclasses {
            log::debug!(
                "deleting relationclass {relationclass_uuid} left dangling by role {role_uuid}"
            );
            match ObjectInstanceStore::delete_by_uuid(tx, relationclass_uuid, user_uuid).await? {
                Outcome::Found(set) => affected.extend(set),
                Outcome::NotFound => {}
                Outcome::Forbidden(denied) => return Ok(Outcome::Forbidden(denied)),
            }
        }
        Ok(Outcome::Found(affected))
    }
}
