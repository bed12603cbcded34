use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Collection holding one account record per authenticated user
pub const USERS: &str = "users";

/// Collection holding append-only "A invited B" edges
pub const INVITATIONS: &str = "invitations";

/// Field of the account record carrying the remaining invitation quota
pub const QUOTA_FIELD: &str = "invitation";

/// Field of the account record carrying the invitation key
pub const INVITATION_KEY_FIELD: &str = "invitationKey";

/// Account record stored under the user's uid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountRecord {
    pub name: Option<String>,
    pub image: Option<String>,
    /// Remaining invitations this account can hand out
    pub invitation: i64,
    #[serde(rename = "invitationKey")]
    pub invitation_key: String,
    /// Left empty by clients; the store stamps it on write
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl AccountRecord {
    pub fn new(name: Option<String>, image: Option<String>, quota: i64, invitation_key: String) -> Self {
        AccountRecord {
            name,
            image,
            invitation: quota,
            invitation_key,
            timestamp: None,
        }
    }

    pub fn has_invitations_left(&self) -> bool {
        self.invitation > 0
    }

    /// Relative signup link that hands this account's key to a new user
    pub fn invite_path(&self) -> String {
        format!("/signup?token={}", self.invitation_key)
    }
}

/// Invitation edge: `from` invited `to`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvitationEdge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl InvitationEdge {
    pub fn new(from: &str, to: &str) -> Self {
        InvitationEdge {
            from: from.to_string(),
            to: to.to_string(),
            timestamp: None,
        }
    }
}
