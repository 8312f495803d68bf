use crate::serde_implementations::datetime_utc;
use chrono::{DateTime, Utc};
use email_address::EmailAddress;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: EmailAddress,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "datetime_utc")]
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Name shown to other members, falling back from display name to username.
    pub fn public_name(&self) -> &str {
        match self.display_name.as_deref() {
            Some(display_name) if !display_name.trim().is_empty() => display_name,
            _ if !self.username.is_empty() => &self.username,
            _ => "A friend",
        }
    }

    pub fn to_profile(&self) -> MemberProfile {
        MemberProfile {
            user_id: self.id,
            username: self.username.to_owned(),
            display_name: self.display_name.to_owned(),
            avatar_url: self.avatar_url.to_owned(),
        }
    }
}

/// What other members may see about an account. Never carries the email address.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MemberProfile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SignupAttributes {
    pub username: String,
    pub display_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub fn valid_username(username: &str) -> bool {
    let length = username.chars().count();
    (2..=30).contains(&length)
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn identity(username: &str, display_name: Option<&str>) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: EmailAddress::from_str("someone@example.com").unwrap(),
            username: username.into(),
            display_name: display_name.map(Into::into),
            avatar_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn public_name_prefers_display_name() {
        assert_eq!(identity("mina", Some("Mina K")).public_name(), "Mina K");
        assert_eq!(identity("mina", Some("  ")).public_name(), "mina");
        assert_eq!(identity("", None).public_name(), "A friend");
    }

    #[test]
    fn username_rules() {
        assert!(valid_username("closet.queen_22"));
        assert!(!valid_username("a"));
        assert!(!valid_username("has space"));
        assert!(!valid_username(&"x".repeat(31)));
    }
}
