use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::records::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
}

/// Clinic user account. `email` is stored normalized (trimmed, lowercase);
/// `password_hash` never leaves this struct on a read path.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<OffsetDateTime>,
    pub profile_picture: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub fn new(email: String, password_hash: String, name: String, role: Role) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            name,
            firstname: None,
            lastname: None,
            phone: None,
            address: None,
            city: None,
            role,
            is_active: true,
            last_login: None,
            profile_picture: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Denormalized display name, kept in sync with firstname/lastname.
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.firstname.as_deref().unwrap_or_default(),
            self.lastname.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }
}

impl Entity for User {
    fn id(&self) -> Uuid {
        self.id
    }

    fn unique_key(&self) -> Option<String> {
        Some(self.email.clone())
    }

    fn unique_field() -> &'static str {
        "Email"
    }

    fn touch(&mut self, now: OffsetDateTime) {
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_trims_missing_parts() {
        let mut user = User::new(
            "a@clinic.test".into(),
            "hash".into(),
            String::new(),
            Role::Staff,
        );
        assert_eq!(user.full_name(), "");

        user.firstname = Some("Maya".into());
        assert_eq!(user.full_name(), "Maya");

        user.lastname = Some("Lindgren".into());
        assert_eq!(user.full_name(), "Maya Lindgren");
    }
}
