use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{PortalError, Result};

/// Roles allowed to use the moderation endpoints
pub const ADMIN_ROLES: [&str; 2] = ["Administrators", "Root"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub profile_pic: String,
    #[serde(default)]
    pub banned: bool,
}

impl User {
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

/// Group membership; absent while an account awaits approval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub role: String,
}

/// Body of the session status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStatus {
    pub user: User,
    #[serde(default)]
    pub group: Option<Group>,
}

/// Moderation actions accepted by the admin endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAction {
    Delete,
    Ban,
    Unban,
    ChangeRole(String),
}

impl AdminAction {
    /// Build an action from its wire name; `change_role` needs a role
    pub fn parse(action: &str, role: Option<&str>) -> Result<Self> {
        match (action, role) {
            ("delete", _) => Ok(AdminAction::Delete),
            ("ban", _) => Ok(AdminAction::Ban),
            ("unban", _) => Ok(AdminAction::Unban),
            ("change_role", Some(role)) if !role.trim().is_empty() => {
                Ok(AdminAction::ChangeRole(role.trim().to_string()))
            }
            ("change_role", _) => Err(PortalError::Configuration(
                "change_role requires a role".to_string(),
            )),
            (other, _) => Err(PortalError::Configuration(format!(
                "unknown admin action: {}",
                other
            ))),
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            AdminAction::Delete => "delete",
            AdminAction::Ban => "ban",
            AdminAction::Unban => "unban",
            AdminAction::ChangeRole(_) => "change_role",
        }
    }

    /// Form fields posted to the admin endpoint
    pub fn form_fields(&self, user_id: &str) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("user_id", user_id.to_string()),
            ("action", self.wire_name().to_string()),
        ];
        if let AdminAction::ChangeRole(role) = self {
            fields.push(("role", role.clone()));
        }
        fields
    }
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminAction::ChangeRole(role) => write!(f, "change_role({})", role),
            other => f.write_str(other.wire_name()),
        }
    }
}
