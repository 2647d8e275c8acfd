use uuid::Uuid;

use crate::logic::EngineResult;
use crate::model::{Access, Forbidden};
use crate::store::traits::StoreTx;

/// The per-operation authorization check. A failed check becomes a
/// [`Forbidden`] value for the caller to thread upward; it never raises, so
/// composite operations can compose rights checks across nested entities
/// without unwinding the stack. Flows without an acting user (internal
/// machinery, the deletion rule engine) pass `None` and are never gated.
pub struct RightsGate;

impl RightsGate {
    pub async fn check<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        user_uuid: Option<Uuid>,
        access: Access,
    ) -> EngineResult<Option<Forbidden>> {
        let Some(user_uuid) = user_uuid else {
            return Ok(None);
        };
        if tx.check_access(uuid, user_uuid, access).await? {
            Ok(None)
        } else {
            log::debug!("{access:?} denied on {uuid} for user {user_uuid}");
            Ok(Some(Forbidden::new(uuid, user_uuid, access)))
        }
    }

    pub async fn can_read<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Option<Forbidden>> {
        Self::check(tx, uuid, user_uuid, Access::Read).await
    }

    pub async fn can_write<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Option<Forbidden>> {
        Self::check(tx, uuid, user_uuid, Access::Write).await
    }

    pub async fn can_delete<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
        user_uuid: Option<Uuid>,
    ) -> EngineResult<Option<Forbidden>> {
        Self::check(tx, uuid, user_uuid, Access::Delete).await
    }
}
