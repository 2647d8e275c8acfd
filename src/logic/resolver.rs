use uuid::Uuid;

use crate::logic::EngineResult;
use crate::model::ParentKind;
use crate::store::traits::StoreTx;

/// Resolves which metamodel category instantiated a UUID. Children lookups
/// use the answer to pick the matching relationship query (an attribute
/// attached to a port is a different join than one attached to a class).
/// Relationclass takes precedence over plain class: a relationclass instance
/// carries both link rows.
pub struct ParentTypeResolver;

impl ParentTypeResolver {
    pub async fn resolve<S: StoreTx + ?Sized>(
        tx: &mut S,
        uuid: Uuid,
    ) -> EngineResult<Option<ParentKind>> {
        Ok(tx.resolve_parent_kind(uuid).await?)
    }
}
