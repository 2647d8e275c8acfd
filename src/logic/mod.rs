pub mod attribute_instance;
pub mod class_instance;
pub mod delete_rules;
pub mod diff;
pub mod object_instance;
pub mod port_instance;
pub mod relationclass_instance;
pub mod resolver;
pub mod rights;
pub mod role_instance;
pub mod scene_instance;

/// Transaction-aborting failures. Expected business outcomes (not-found,
/// forbidden) never appear here; they travel as [`crate::model::Outcome`]
/// values instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A deletion/creation rule was breached. Surfaced as a conflict-class
    /// result at the boundary.
    #[error("constraint violation: {0}")]
    Constraint(String),
    /// Underlying query execution failed. Forces rollback upstream.
    #[error(transparent)]
    Store(#[from] crate::store::traits::StoreError),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Unwrap a [`crate::model::Outcome`], returning early from the enclosing
/// function on `NotFound`/`Forbidden` so composite operations short-circuit
/// without losing the original context.
macro_rules! try_outcome {
    ($expr:expr) => {
        match $expr {
            $crate::model::Outcome::Found(value) => value,
            $crate::model::Outcome::NotFound => return Ok($crate::model::Outcome::NotFound),
            $crate::model::Outcome::Forbidden(denied) => {
                return Ok($crate::model::Outcome::Forbidden(denied))
            }
        }
    };
}
pub(crate) use try_outcome;

pub use attribute_instance::AttributeInstanceRepository;
pub use class_instance::ClassInstanceRepository;
pub use delete_rules::DeleteRuleEngine;
pub use diff::{CollectionDiff, DiffEngine, Keyed, IGNORED_FIELDS};
pub use object_instance::ObjectInstanceStore;
pub use port_instance::PortInstanceRepository;
pub use relationclass_instance::RelationclassInstanceRepository;
pub use resolver::ParentTypeResolver;
pub use rights::RightsGate;
pub use role_instance::RoleInstanceRepository;
pub use scene_instance::SceneInstanceRepository;
