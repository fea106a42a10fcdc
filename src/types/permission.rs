use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Roles is a bitmask of roles held on a single resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roles(u32);

impl Roles {
    pub const READ: Roles = Roles(1 << 0); // 1
    pub const WRITE: Roles = Roles(1 << 1); // 2
    pub const MANAGE: Roles = Roles(1 << 2); // 4
    pub const SHARE: Roles = Roles(1 << 3); // 8
    pub const CLONE: Roles = Roles(1 << 4); // 16

    /// Every role a resource can grant.
    #[must_use]
    pub const fn all() -> Roles {
        Roles(Self::READ.0 | Self::WRITE.0 | Self::MANAGE.0 | Self::SHARE.0 | Self::CLONE.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this bitmask contains every role in `required`.
    #[must_use]
    pub const fn has(self, required: Roles) -> bool {
        self.0 & required.0 == required.0
    }

    #[must_use]
    pub const fn union(self, other: Roles) -> Roles {
        Roles(self.0 | other.0)
    }

    /// Expands the bitmask with implied roles: manage implies read and write.
    #[must_use]
    pub fn expand_implied(self) -> Roles {
        if self.has(Self::MANAGE) {
            self.union(Self::READ).union(Self::WRITE)
        } else {
            self
        }
    }

    pub fn parse(s: &str) -> Option<Roles> {
        match s.to_ascii_lowercase().as_str() {
            "read" => Some(Self::READ),
            "write" => Some(Self::WRITE),
            "manage" => Some(Self::MANAGE),
            "share" => Some(Self::SHARE),
            "clone" => Some(Self::CLONE),
            _ => None,
        }
    }

    pub fn parse_many(strs: &[&str]) -> Option<Roles> {
        let mut result = Roles::default();
        for s in strs {
            result = result.union(Self::parse(s)?);
        }
        Some(result)
    }

    #[must_use]
    pub fn to_strings(self) -> Vec<&'static str> {
        let mut roles = Vec::new();
        if self.has(Self::READ) {
            roles.push("read");
        }
        if self.has(Self::WRITE) {
            roles.push("write");
        }
        if self.has(Self::MANAGE) {
            roles.push("manage");
        }
        if self.has(Self::SHARE) {
            roles.push("share");
        }
        if self.has(Self::CLONE) {
            roles.push("clone");
        }
        roles
    }
}

impl fmt::Display for Roles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_strings().join(", "))
    }
}

/// Role assignments attached to a permission-checked resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub users: BTreeMap<String, Roles>,
    #[serde(default)]
    pub groups: BTreeMap<String, Roles>,
}

impl Permissions {
    #[must_use]
    pub fn with_user(user_id: &str, roles: Roles) -> Self {
        let mut permissions = Self::default();
        permissions.update_user(user_id, roles);
        permissions
    }

    /// Replaces the roles held by a user. Empty roles remove the entry.
    pub fn update_user(&mut self, user_id: &str, roles: Roles) {
        if roles.is_empty() {
            self.users.remove(user_id);
        } else {
            self.users.insert(user_id.to_string(), roles);
        }
    }

    pub fn remove_user(&mut self, user_id: &str) -> bool {
        self.users.remove(user_id).is_some()
    }

    pub fn update_group(&mut self, group_id: &str, roles: Roles) {
        if roles.is_empty() {
            self.groups.remove(group_id);
        } else {
            self.groups.insert(group_id.to_string(), roles);
        }
    }

    /// Direct user roles united with the roles of every group the principal
    /// belongs to, expanded with implied roles.
    #[must_use]
    pub fn roles_for(&self, principal: &Principal) -> Roles {
        let mut roles = self
            .users
            .get(&principal.user_id)
            .copied()
            .unwrap_or_default();

        for group in &principal.groups {
            if let Some(group_roles) = self.groups.get(group) {
                roles = roles.union(*group_roles);
            }
        }

        roles.expand_implied()
    }
}

/// The caller on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl Principal {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            groups: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_has() {
        let r = Roles::READ.union(Roles::WRITE);
        assert!(r.has(Roles::READ));
        assert!(r.has(Roles::WRITE));
        assert!(!r.has(Roles::MANAGE));
    }

    #[test]
    fn test_manage_implies_read_and_write() {
        let expanded = Roles::MANAGE.expand_implied();
        assert!(expanded.has(Roles::READ));
        assert!(expanded.has(Roles::WRITE));
        assert!(!expanded.has(Roles::SHARE));
    }

    #[test]
    fn test_write_does_not_imply_read() {
        assert!(!Roles::WRITE.expand_implied().has(Roles::READ));
    }

    #[test]
    fn test_parse_roles() {
        assert_eq!(Roles::parse("READ"), Some(Roles::READ));
        assert_eq!(Roles::parse("nope"), None);
        assert_eq!(
            Roles::parse_many(&["read", "clone"]),
            Some(Roles::READ.union(Roles::CLONE))
        );
    }

    #[test]
    fn test_roles_for_unites_groups() {
        let mut permissions = Permissions::with_user("alice", Roles::READ);
        permissions.update_group("editors", Roles::WRITE);
        permissions.update_group("admins", Roles::MANAGE);

        let alice = Principal::new("alice").with_groups(["editors"]);
        let roles = permissions.roles_for(&alice);
        assert!(roles.has(Roles::READ.union(Roles::WRITE)));
        assert!(!roles.has(Roles::MANAGE));

        let bob = Principal::new("bob").with_groups(["admins"]);
        assert!(permissions.roles_for(&bob).has(Roles::READ));

        let carol = Principal::new("carol");
        assert!(permissions.roles_for(&carol).is_empty());
    }

    #[test]
    fn test_update_user_with_empty_roles_removes_entry() {
        let mut permissions = Permissions::with_user("alice", Roles::READ);
        permissions.update_user("alice", Roles::default());
        assert!(permissions.users.is_empty());
    }
}
