use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::assets::dto::UPLOADS_PREFIX;
use crate::auth::model::{Role, User};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Partial profile update; only supplied fields change.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// User as seen by clients: everything except the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub role: Role,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    pub profile_picture: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            firstname: u.firstname,
            lastname: u.lastname,
            phone: u.phone,
            address: u.address,
            city: u.city,
            role: u.role,
            is_active: u.is_active,
            last_login: u.last_login,
            profile_picture: u.profile_picture.map(|key| format!("{UPLOADS_PREFIX}/{key}")),
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginData {
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub data: LoginData,
}

#[derive(Debug, Serialize)]
pub struct UserData {
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: UserData,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePictureData {
    pub profile_picture: String,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct ProfilePictureResponse {
    pub success: bool,
    pub message: String,
    pub data: ProfilePictureData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_user_never_serializes_the_hash() {
        let user = User::new(
            "admin@clinic.test".into(),
            "$argon2id$secret".into(),
            "Clinic Admin".into(),
            Role::Admin,
        );
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
        assert!(json.contains("admin@clinic.test"));
        assert!(json.contains("\"role\":\"admin\""));
    }

    #[test]
    fn profile_picture_maps_to_public_url() {
        let mut user = User::new("a@b.co".into(), "h".into(), String::new(), Role::Staff);
        user.profile_picture = Some("image-7-7.png".into());
        let public = PublicUser::from(user);
        assert_eq!(
            public.profile_picture.as_deref(),
            Some("/uploads/assets/image-7-7.png")
        );
    }
}
