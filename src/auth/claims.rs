use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role carried in the session and the public user projection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Standard,
    Admin,
}

impl Role {
    pub fn from_is_admin(is_admin: bool) -> Self {
        if is_admin {
            Role::Admin
        } else {
            Role::Standard
        }
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// JWT payload of a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,     // user ID
    pub email: String, // login handle at issuance time
    pub role: Role,
    pub iat: i64, // issued at (unix timestamp)
    pub exp: i64, // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
}
