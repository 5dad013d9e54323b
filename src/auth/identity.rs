use std::{collections::BTreeSet, fmt, str::FromStr, time::SystemTime};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::ProfileEntity;

/// Who is calling, as seen by every component that enforces permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    /// No session.
    Anonymous,
    /// Signed-in user; `has_profile` is false while the username is not chosen yet.
    User {
        /// Account id.
        id: Uuid,
        /// Whether a username was chosen.
        has_profile: bool,
    },
    /// Signed-in user holding the operator role.
    Operator {
        /// Account id.
        id: Uuid,
        /// Whether a username was chosen.
        has_profile: bool,
    },
}

impl Identity {
    /// Account id of a signed-in caller.
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Identity::Anonymous => None,
            Identity::User { id, .. } | Identity::Operator { id, .. } => Some(*id),
        }
    }

    /// Whether ingestion and curation are allowed.
    pub fn is_operator(&self) -> bool {
        matches!(self, Identity::Operator { .. })
    }

    /// `false` for anonymous callers and users in the needs-setup state.
    pub fn has_profile(&self) -> bool {
        match self {
            Identity::Anonymous => false,
            Identity::User { has_profile, .. } | Identity::Operator { has_profile, .. } => {
                *has_profile
            }
        }
    }
}

/// Capability carried by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Every signed-in account.
    User,
    /// May ingest, delete and curate games.
    Operator,
}

impl Role {
    /// Lowercase name as used in provider claims.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Operator => "operator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "operator" => Ok(Role::Operator),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

/// Authenticated session held by an [`AuthGate`](super::AuthGate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Account id at the identity provider.
    pub user_id: Uuid,
    /// Account email.
    pub email: String,
    /// Bearer token the client sends back.
    pub access_token: String,
    /// When the provider stops accepting `access_token`, if it said.
    pub expires_at: Option<SystemTime>,
    /// Resolved roles; always contains [`Role::User`].
    pub roles: BTreeSet<Role>,
    /// `None` while the user is in the needs-setup state.
    pub profile: Option<ProfileEntity>,
}

impl Session {
    /// Identity claims derived from the roles and profile of this session.
    pub fn identity(&self) -> Identity {
        let has_profile = self.profile.is_some();
        if self.roles.contains(&Role::Operator) {
            Identity::Operator {
                id: self.user_id,
                has_profile,
            }
        } else {
            Identity::User {
                id: self.user_id,
                has_profile,
            }
        }
    }

    /// Chosen username, if the profile is complete.
    pub fn username(&self) -> Option<&str> {
        self.profile.as_ref().map(|profile| profile.username.as_str())
    }
}
