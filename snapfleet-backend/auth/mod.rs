pub mod gate;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A named snapshot capability, scoped to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewSnapshots,
    CreateSnapshots,
    EditSnapshots,
    DestroySnapshots,
    RevertSnapshots,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::ViewSnapshots => "view_snapshots",
            Permission::CreateSnapshots => "create_snapshots",
            Permission::EditSnapshots => "edit_snapshots",
            Permission::DestroySnapshots => "destroy_snapshots",
            Permission::RevertSnapshots => "revert_snapshots",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named bundle of permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub permissions: Vec<Permission>,
}

pub const SNAPSHOT_VIEWER: &str = "Snapshot Viewer";
pub const SNAPSHOT_MANAGER: &str = "Snapshot Manager";

/// The two roles every deployment gets, whatever `roles.yaml` says.
pub fn builtin_roles() -> Vec<Role> {
    vec![
        Role {
            name: SNAPSHOT_VIEWER.to_string(),
            permissions: vec![Permission::ViewSnapshots],
        },
        Role {
            name: SNAPSHOT_MANAGER.to_string(),
            permissions: vec![
                Permission::ViewSnapshots,
                Permission::CreateSnapshots,
                Permission::EditSnapshots,
                Permission::DestroySnapshots,
                Permission::RevertSnapshots,
            ],
        },
    ]
}

/// On-disk shape of `roles.yaml`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RolesFile {
    #[serde(default)]
    roles: Vec<Role>,
    /// actor id → role names
    #[serde(default)]
    assignments: HashMap<String, Vec<String>>,
}

/// Role and assignment tables, loaded once at startup. Deliberately immutable
/// after load: role changes are a config edit + restart, not a runtime
/// mutation of shared state.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    roles: Vec<Role>,
    assignments: HashMap<String, Vec<String>>,
}

impl AuthConfig {
    /// Load from a `roles.yaml` file. A missing file yields the built-in
    /// roles and no assignments; an unparseable file does the same with a
    /// warning. Built-in roles are added only if the file doesn't already
    /// define a role of the same name.
    pub fn load(path: &Path) -> Self {
        let file = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str::<RolesFile>(&contents) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse roles file, using built-in roles only");
                    RolesFile::default()
                }
            },
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read roles file");
                }
                RolesFile::default()
            }
        };

        Self::from_parts(file.roles, file.assignments)
    }

    /// Assemble from explicit tables (used by tests and `load`).
    pub fn from_parts(
        mut roles: Vec<Role>,
        assignments: HashMap<String, Vec<String>>,
    ) -> Self {
        for builtin in builtin_roles() {
            if !roles.iter().any(|r| r.name == builtin.name) {
                roles.push(builtin);
            }
        }
        tracing::info!(
            roles = roles.len(),
            actors = assignments.len(),
            "auth config loaded"
        );
        Self { roles, assignments }
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn role(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name == name)
    }

    /// Role names assigned to an actor. Unknown actors hold no roles.
    pub fn roles_for(&self, actor: &str) -> &[String] {
        self.assignments
            .get(actor)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}
