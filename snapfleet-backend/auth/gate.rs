use super::{AuthConfig, Permission};

/// Outcome of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allow(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Maps (actor, permission) onto allow/deny against the loaded role tables.
///
/// Deny is the default: an unknown actor, an assignment naming a role that
/// doesn't exist, or a role without the permission all fall through to
/// `Deny`. Absence of a permission is a normal outcome, not an error, and
/// the check has no side effects.
pub struct PermissionGate {
    config: AuthConfig,
}

impl PermissionGate {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn check(&self, actor: &str, permission: Permission) -> Decision {
        for role_name in self.config.roles_for(actor) {
            let Some(role) = self.config.role(role_name) else {
                tracing::debug!(actor = %actor, role = %role_name, "assignment references unknown role");
                continue;
            };
            if role.permissions.contains(&permission) {
                return Decision::Allow;
            }
        }
        Decision::Deny
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::auth::{Role, SNAPSHOT_MANAGER, SNAPSHOT_VIEWER};

    fn gate() -> PermissionGate {
        let mut assignments = HashMap::new();
        assignments.insert("viewer".to_string(), vec![SNAPSHOT_VIEWER.to_string()]);
        assignments.insert("manager".to_string(), vec![SNAPSHOT_MANAGER.to_string()]);
        assignments.insert("ghost".to_string(), vec!["Nonexistent Role".to_string()]);
        PermissionGate::new(AuthConfig::from_parts(vec![], assignments))
    }

    #[test]
    fn unknown_actor_is_denied() {
        assert_eq!(
            gate().check("stranger", Permission::ViewSnapshots),
            Decision::Deny
        );
    }

    #[test]
    fn viewer_can_view_but_not_mutate() {
        let gate = gate();
        assert!(gate.check("viewer", Permission::ViewSnapshots).is_allow());
        assert_eq!(gate.check("viewer", Permission::CreateSnapshots), Decision::Deny);
        assert_eq!(gate.check("viewer", Permission::EditSnapshots), Decision::Deny);
        assert_eq!(gate.check("viewer", Permission::DestroySnapshots), Decision::Deny);
        assert_eq!(gate.check("viewer", Permission::RevertSnapshots), Decision::Deny);
    }

    #[test]
    fn manager_holds_every_snapshot_permission() {
        let gate = gate();
        for permission in [
            Permission::ViewSnapshots,
            Permission::CreateSnapshots,
            Permission::EditSnapshots,
            Permission::DestroySnapshots,
            Permission::RevertSnapshots,
        ] {
            assert!(gate.check("manager", permission).is_allow(), "{permission}");
        }
    }

    #[test]
    fn assignment_to_unknown_role_is_denied() {
        assert_eq!(
            gate().check("ghost", Permission::ViewSnapshots),
            Decision::Deny
        );
    }

    #[test]
    fn any_held_role_granting_the_permission_allows() {
        let mut assignments = HashMap::new();
        assignments.insert(
            "ops".to_string(),
            vec!["Nonexistent Role".to_string(), SNAPSHOT_MANAGER.to_string()],
        );
        let gate = PermissionGate::new(AuthConfig::from_parts(vec![], assignments));
        assert!(gate.check("ops", Permission::RevertSnapshots).is_allow());
    }

    #[test]
    fn custom_role_grants_its_permissions() {
        let custom = Role {
            name: "Reverter".to_string(),
            permissions: vec![Permission::ViewSnapshots, Permission::RevertSnapshots],
        };
        let mut assignments = HashMap::new();
        assignments.insert("oncall".to_string(), vec!["Reverter".to_string()]);
        let gate = PermissionGate::new(AuthConfig::from_parts(vec![custom], assignments));
        assert!(gate.check("oncall", Permission::RevertSnapshots).is_allow());
        assert_eq!(gate.check("oncall", Permission::DestroySnapshots), Decision::Deny);
    }
}
