use portal_core::session::ADMIN_ROLES;
use portal_core::{Group, User, UserStatus};

/// Where a guarded page sends the visitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    RedirectHome,
    RedirectBanned,
    RedirectPending,
}

impl Access {
    /// Page path the redirect points at
    pub fn redirect_path(&self) -> Option<&'static str> {
        match self {
            Access::Granted => None,
            Access::RedirectHome => Some("/"),
            Access::RedirectBanned => Some("/banned"),
            Access::RedirectPending => Some("/pending"),
        }
    }
}

/// Signed-in state as reported by the session endpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    status: Option<UserStatus>,
}

impl Session {
    pub fn from_status(status: Option<UserStatus>) -> Self {
        Self { status }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status.is_some()
    }

    pub fn user(&self) -> Option<&User> {
        self.status.as_ref().map(|s| &s.user)
    }

    pub fn group(&self) -> Option<&Group> {
        self.status.as_ref().and_then(|s| s.group.as_ref())
    }

    pub fn role(&self) -> Option<&str> {
        self.group().map(|g| g.role.as_str())
    }

    pub fn is_banned(&self) -> bool {
        self.user().is_some_and(|u| u.banned)
    }

    pub fn is_admin(&self) -> bool {
        self.role().is_some_and(|role| ADMIN_ROLES.contains(&role))
    }

    /// Decide whether a page needing one of `required_roles` may be shown.
    ///
    /// An empty role list only requires an approved, unbanned account.
    pub fn access(&self, required_roles: &[&str]) -> Access {
        let Some(status) = &self.status else {
            return Access::RedirectHome;
        };
        if status.user.banned {
            return Access::RedirectBanned;
        }
        let Some(group) = &status.group else {
            return Access::RedirectPending;
        };
        if !required_roles.is_empty() && !required_roles.contains(&group.role.as_str()) {
            return Access::RedirectHome;
        }
        Access::Granted
    }
}
