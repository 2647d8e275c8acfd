use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The operation a rights check guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    Write,
    Delete,
}

/// A failed rights check, carried up the call chain as a value so composite
/// operations can inspect and re-wrap it without unwinding the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forbidden {
    pub uuid: Uuid,
    pub user_uuid: Uuid,
    pub access: Access,
}

impl Forbidden {
    pub fn new(uuid: Uuid, user_uuid: Uuid, access: Access) -> Self {
        Self {
            uuid,
            user_uuid,
            access,
        }
    }
}

/// A rights grant for one (instance, user) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub instance_uuid: Uuid,
    pub user_uuid: Uuid,
    pub can_read: bool,
    pub can_write: bool,
    pub can_delete: bool,
}

impl AccessGrant {
    pub fn all(instance_uuid: Uuid, user_uuid: Uuid) -> Self {
        Self {
            instance_uuid,
            user_uuid,
            can_read: true,
            can_write: true,
            can_delete: true,
        }
    }

    pub fn read_only(instance_uuid: Uuid, user_uuid: Uuid) -> Self {
        Self {
            instance_uuid,
            user_uuid,
            can_read: true,
            can_write: false,
            can_delete: false,
        }
    }

    pub fn allows(&self, access: Access) -> bool {
        match access {
            Access::Read => self.can_read,
            Access::Write => self.can_write,
            Access::Delete => self.can_delete,
        }
    }
}

/// Expected business outcomes threaded through return types. Storage and
/// invariant failures travel separately as errors; a missing row or a failed
/// rights check is a result, not a fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome<T> {
    Found(T),
    NotFound,
    Forbidden(Forbidden),
}

impl<T> Outcome<T> {
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(value) => Outcome::Found(value),
            None => Outcome::NotFound,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Outcome::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Outcome::NotFound)
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Outcome::Forbidden(_))
    }

    /// The found value, discarding the outcome context.
    pub fn found(self) -> Option<T> {
        match self {
            Outcome::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_found(&self) -> Option<&T> {
        match self {
            Outcome::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Found(value) => Outcome::Found(f(value)),
            Outcome::NotFound => Outcome::NotFound,
            Outcome::Forbidden(denied) => Outcome::Forbidden(denied),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_map_preserves_context() {
        let found: Outcome<i32> = Outcome::Found(2);
        assert_eq!(found.map(|v| v * 2), Outcome::Found(4));

        let missing: Outcome<i32> = Outcome::NotFound;
        assert!(missing.map(|v| v * 2).is_not_found());

        let denied: Outcome<i32> = Outcome::Forbidden(Forbidden::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Access::Write,
        ));
        assert!(denied.map(|v| v * 2).is_forbidden());
    }

    #[test]
    fn grant_flags_map_to_access() {
        let grant = AccessGrant::read_only(Uuid::new_v4(), Uuid::new_v4());
        assert!(grant.allows(Access::Read));
        assert!(!grant.allows(Access::Write));
        assert!(!grant.allows(Access::Delete));
    }
}
