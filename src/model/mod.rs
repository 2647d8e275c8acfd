pub mod attribute;
pub mod class;
pub mod common;
pub mod object;
pub mod outcome;
pub mod port;
pub mod relationclass;
pub mod role;
pub mod scene;

pub use attribute::{AttributeInstance, AttributeInstanceRow};
pub use class::{ClassInstance, ClassInstanceRow};
pub use common::{
    default_timestamp, generate_uuid, Coord2d, Coord3d, InstanceKind, ParentKind, Rotation,
};
pub use object::ObjectInstance;
pub use outcome::{Access, AccessGrant, Forbidden, Outcome};
pub use port::{PortInstance, PortInstanceRow};
pub use relationclass::{RelationclassInstance, RelationclassInstanceRow};
pub use role::{RoleInstance, RoleInstanceRow};
pub use scene::{SceneInstance, SceneInstanceRow};
