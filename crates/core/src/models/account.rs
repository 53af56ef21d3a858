use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const USERNAME_MAX_LEN: usize = 40;
pub const EMAIL_MAX_LEN: usize = 255;
pub const FIRST_NAME_MAX_LEN: usize = 40;
pub const LAST_NAME_MAX_LEN: usize = 100;

/// A locally registered account. The directory entry mirrors it but is owned by the directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// 8-digit numeric token mailed at registration.
    pub verification_token: String,
    pub is_verified: bool,
    pub is_admin: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

/// Fields needed to insert a new account. The id and join date are assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub verification_token: String,
    pub is_verified: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl Account {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Staff and superusers may use the admin pages.
    pub fn can_administer(&self) -> bool {
        self.is_active && (self.is_staff || self.is_superuser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Account {
        Account {
            id: 7,
            username: "jdoe".to_string(),
            email: "jdoe@example.edu".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            password_hash: "$argon2id$v=19$secret".to_string(),
            verification_token: "12345678".to_string(),
            is_verified: false,
            is_admin: false,
            is_staff: false,
            is_superuser: false,
            is_active: true,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn full_name_joins_names() {
        assert_eq!(sample().full_name(), "Jane Doe");
    }

    #[test]
    fn password_hash_is_not_serialized() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"username\":\"jdoe\""));
    }

    #[test]
    fn staff_can_administer() {
        let mut account = sample();
        assert!(!account.can_administer());
        account.is_staff = true;
        assert!(account.can_administer());
        account.is_active = false;
        assert!(!account.can_administer());
    }
}
