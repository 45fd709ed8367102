use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Portal a user belongs to. Stored as lowercase text in the `users.role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }

    /// The role on the other side of a conversation. Admins never take part in one.
    pub fn counterpart(&self) -> Option<Role> {
        match self {
            Role::Patient => Some(Role::Doctor),
            Role::Doctor => Some(Role::Patient),
            Role::Admin => None,
        }
    }

    /// Path of this role's message view in the web portal.
    pub fn messages_path(&self) -> String {
        format!("/{}/messages", self.as_str())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Category of a notification row.
pub mod notification_kind {
    pub const MESSAGE: &str = "message";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counterpart_pairs_patients_with_doctors() {
        assert_eq!(Role::Patient.counterpart(), Some(Role::Doctor));
        assert_eq!(Role::Doctor.counterpart(), Some(Role::Patient));
        assert_eq!(Role::Admin.counterpart(), None);
    }

    #[test]
    fn parses_stored_role_text() {
        assert_eq!("doctor".parse::<Role>().unwrap(), Role::Doctor);
        assert!("nurse".parse::<Role>().is_err());
        assert_eq!(Role::Patient.messages_path(), "/patient/messages");
    }
}
