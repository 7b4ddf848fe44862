use axum::extract::FromRef;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::dto::UpdateProfileRequest;
use crate::auth::jwt::JwtKeys;
use crate::auth::model::{Role, User};
use crate::auth::password::{hash_password, verify_password};
use crate::blobs::BlobStore;
use crate::error::AppError;
use crate::records::RecordStore;
use crate::state::AppState;

/// Single message for every login failure cause, so callers cannot probe
/// which emails exist.
const INVALID_CREDENTIALS: &str = "Invalid email or password.";

pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub async fn login(state: &AppState, email: &str, password: &str) -> Result<(User, String), AppError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required.".into(),
        ));
    }

    let lookup = email.clone();
    let user = state
        .users
        .find_one(Box::new(move |u: &User| u.email == lookup))
        .await?
        .ok_or_else(|| AppError::Auth(INVALID_CREDENTIALS.into()))?;

    if !user.is_active {
        warn!(user_id = %user.id, "login attempt for inactive account");
        return Err(AppError::Auth(INVALID_CREDENTIALS.into()));
    }

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::Auth(INVALID_CREDENTIALS.into()));
    }

    let user = state
        .users
        .update_by_id(
            user.id,
            Box::new(|u: &mut User| u.last_login = Some(time::OffsetDateTime::now_utc())),
        )
        .await?
        .ok_or_else(|| AppError::Auth(INVALID_CREDENTIALS.into()))?;

    let token = JwtKeys::from_ref(state).sign(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok((user, token))
}

pub async fn get_profile(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))
}

/// Partial profile update. A changed email is normalized and must not be
/// held by any other user; the display name follows firstname/lastname.
pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> Result<User, AppError> {
    let current = get_profile(state, user_id).await?;

    let UpdateProfileRequest {
        firstname,
        lastname,
        email,
        phone,
        address,
        city,
    } = req;

    let new_email = match email {
        Some(raw) => {
            let email = normalize_email(&raw);
            if !is_valid_email(&email) {
                return Err(AppError::Validation("Invalid email".into()));
            }
            if email != current.email {
                let probe = email.clone();
                let taken = state
                    .users
                    .find_one(Box::new(move |u: &User| u.id != user_id && u.email == probe))
                    .await?;
                if taken.is_some() {
                    return Err(AppError::Conflict(
                        "Email is already taken by another user.".into(),
                    ));
                }
            }
            Some(email)
        }
        None => None,
    };

    state
        .users
        .update_by_id(
            user_id,
            Box::new(move |u: &mut User| {
                if let Some(email) = new_email {
                    u.email = email;
                }
                let rename = firstname.is_some() || lastname.is_some();
                if let Some(firstname) = firstname {
                    u.firstname = Some(firstname);
                }
                if let Some(lastname) = lastname {
                    u.lastname = Some(lastname);
                }
                if rename {
                    u.name = u.full_name();
                }
                if let Some(phone) = phone {
                    u.phone = Some(phone);
                }
                if let Some(address) = address {
                    u.address = Some(address);
                }
                if let Some(city) = city {
                    u.city = Some(city);
                }
            }),
        )
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))
}

pub async fn change_password(
    state: &AppState,
    user_id: Uuid,
    current_password: &str,
    new_password: &str,
) -> Result<(), AppError> {
    if current_password.is_empty() || new_password.is_empty() {
        return Err(AppError::Validation(
            "Current password and new password are required.".into(),
        ));
    }

    let user = get_profile(state, user_id).await?;
    if !verify_password(current_password, &user.password_hash)? {
        return Err(AppError::Auth("Current password is incorrect.".into()));
    }

    let new_hash = hash_password(new_password)?;
    state
        .users
        .update_by_id(user_id, Box::new(move |u: &mut User| u.password_hash = new_hash))
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))?;
    info!(user_id = %user_id, "password changed");
    Ok(())
}

/// Replace the profile picture. The old blob is removed first, best-effort,
/// so a failed removal never blocks the new upload.
pub async fn upload_profile_picture(
    state: &AppState,
    user_id: Uuid,
    body: Bytes,
    original_name: &str,
) -> Result<(String, User), AppError> {
    if body.is_empty() {
        return Err(AppError::Validation("No image file uploaded.".into()));
    }

    let user = get_profile(state, user_id).await?;

    if let Some(old_key) = &user.profile_picture {
        if let Err(e) = state.blobs.delete(old_key).await {
            warn!(error = %e, key = %old_key, "failed to remove old profile picture");
        }
    }

    let key = state.blobs.save(body, original_name).await?;
    let stored = key.clone();
    let updated = state
        .users
        .update_by_id(
            user_id,
            Box::new(move |u: &mut User| u.profile_picture = Some(stored)),
        )
        .await?;

    match updated {
        Some(user) => Ok((key, user)),
        None => {
            if let Err(e) = state.blobs.delete(&key).await {
                warn!(error = %e, %key, "failed to remove blob for vanished user");
            }
            Err(AppError::NotFound("User not found.".into()))
        }
    }
}

/// Clear the profile picture; succeeds even when none was set.
pub async fn delete_profile_picture(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    let user = get_profile(state, user_id).await?;

    if let Some(key) = &user.profile_picture {
        if let Err(e) = state.blobs.delete(key).await {
            warn!(error = %e, %key, "failed to remove profile picture blob");
        }
    }

    state
        .users
        .update_by_id(user_id, Box::new(|u: &mut User| u.profile_picture = None))
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))
}

/// Seed an active admin account when no user holds `email` yet. Accounts
/// are otherwise created out-of-band; `main` supplies the credentials from
/// ADMIN_EMAIL/ADMIN_PASSWORD.
pub async fn bootstrap_admin(
    state: &AppState,
    email: &str,
    password: &str,
    name: &str,
) -> anyhow::Result<()> {
    let email = normalize_email(email);
    let probe = email.clone();
    let existing = state
        .users
        .find_one(Box::new(move |u: &User| u.email == probe))
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let name = name.to_string();
    let hash = hash_password(password)?;
    let admin = User::new(email.clone(), hash, name, Role::Admin);
    state.users.insert(admin).await?;
    info!(%email, "admin account bootstrapped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_user(state: &AppState, email: &str, password: &str) -> User {
        let hash = hash_password(password).expect("hash");
        let user = User::new(
            normalize_email(email),
            hash,
            "Test User".into(),
            Role::Staff,
        );
        state.users.insert(user).await.expect("seed user")
    }

    fn png() -> Bytes {
        Bytes::from_static(b"\x89PNG fake bytes")
    }

    #[tokio::test]
    async fn login_succeeds_and_sets_last_login() {
        let (_dir, state) = AppState::for_tests();
        let seeded = seed_user(&state, "nurse@clinic.test", "s3cret-pw").await;
        assert!(seeded.last_login.is_none());

        let (user, token) = login(&state, "  Nurse@Clinic.Test ", "s3cret-pw")
            .await
            .expect("login");
        assert_eq!(user.id, seeded.id);
        assert!(user.last_login.is_some());

        let claims = JwtKeys::from_ref(&state).verify(&token).expect("token");
        assert_eq!(claims.sub, seeded.id);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let (_dir, state) = AppState::for_tests();
        let seeded = seed_user(&state, "nurse@clinic.test", "s3cret-pw").await;

        let unknown = login(&state, "ghost@clinic.test", "whatever")
            .await
            .unwrap_err();
        let wrong_pw = login(&state, "nurse@clinic.test", "wrong").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong_pw.to_string());
        assert!(matches!(unknown, AppError::Auth(_)));
        assert!(matches!(wrong_pw, AppError::Auth(_)));

        state
            .users
            .update_by_id(seeded.id, Box::new(|u: &mut User| u.is_active = false))
            .await
            .expect("deactivate");
        let inactive = login(&state, "nurse@clinic.test", "s3cret-pw")
            .await
            .unwrap_err();
        assert_eq!(inactive.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn change_password_rejects_wrong_current_and_keeps_old_hash() {
        let (_dir, state) = AppState::for_tests();
        let user = seed_user(&state, "pt@clinic.test", "old-password").await;

        let err = change_password(&state, user.id, "not-the-old-one", "new-password")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
        assert_eq!(err.to_string(), "Current password is incorrect.");

        // Old password still authenticates.
        login(&state, "pt@clinic.test", "old-password")
            .await
            .expect("old password still valid");
    }

    #[tokio::test]
    async fn change_password_stores_the_new_hash() {
        let (_dir, state) = AppState::for_tests();
        let user = seed_user(&state, "pt@clinic.test", "old-password").await;

        change_password(&state, user.id, "old-password", "new-password")
            .await
            .expect("change");
        login(&state, "pt@clinic.test", "new-password")
            .await
            .expect("new password works");
        let err = login(&state, "pt@clinic.test", "old-password")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }

    #[tokio::test]
    async fn second_picture_upload_replaces_the_first_blob() {
        let (_dir, state) = AppState::for_tests();
        let user = seed_user(&state, "pt@clinic.test", "pw-123456").await;

        let (first_key, _) = upload_profile_picture(&state, user.id, png(), "me.png")
            .await
            .expect("first upload");
        assert!(state.blobs.exists(&first_key).await);

        let (second_key, updated) = upload_profile_picture(&state, user.id, png(), "me2.png")
            .await
            .expect("second upload");
        assert_ne!(first_key, second_key);
        assert!(!state.blobs.exists(&first_key).await);
        assert!(state.blobs.exists(&second_key).await);
        assert_eq!(updated.profile_picture.as_deref(), Some(second_key.as_str()));

        // Exactly one blob on disk.
        assert_eq!(std::fs::read_dir(_dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn upload_rejects_empty_bytes() {
        let (_dir, state) = AppState::for_tests();
        let user = seed_user(&state, "pt@clinic.test", "pw-123456").await;
        let err = upload_profile_picture(&state, user.id, Bytes::new(), "me.png")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_profile_picture_clears_field_and_blob() {
        let (_dir, state) = AppState::for_tests();
        let user = seed_user(&state, "pt@clinic.test", "pw-123456").await;

        // No-op success when none exists.
        let cleared = delete_profile_picture(&state, user.id).await.expect("noop");
        assert!(cleared.profile_picture.is_none());

        let (key, _) = upload_profile_picture(&state, user.id, png(), "me.png")
            .await
            .expect("upload");
        let cleared = delete_profile_picture(&state, user.id)
            .await
            .expect("delete");
        assert!(cleared.profile_picture.is_none());
        assert!(!state.blobs.exists(&key).await);
    }

    #[tokio::test]
    async fn update_profile_recomputes_name_and_patches_fields() {
        let (_dir, state) = AppState::for_tests();
        let user = seed_user(&state, "pt@clinic.test", "pw-123456").await;

        let updated = update_profile(
            &state,
            user.id,
            UpdateProfileRequest {
                firstname: Some("Maya".into()),
                lastname: Some("Lindgren".into()),
                city: Some("Uppsala".into()),
                ..Default::default()
            },
        )
        .await
        .expect("update");
        assert_eq!(updated.name, "Maya Lindgren");
        assert_eq!(updated.city.as_deref(), Some("Uppsala"));
        assert_eq!(updated.email, "pt@clinic.test");

        // Patching one name part keeps the other.
        let updated = update_profile(
            &state,
            user.id,
            UpdateProfileRequest {
                firstname: Some("Mia".into()),
                ..Default::default()
            },
        )
        .await
        .expect("update");
        assert_eq!(updated.name, "Mia Lindgren");
    }

    #[tokio::test]
    async fn update_profile_rejects_taken_email() {
        let (_dir, state) = AppState::for_tests();
        seed_user(&state, "taken@clinic.test", "pw-123456").await;
        let user = seed_user(&state, "mine@clinic.test", "pw-123456").await;

        let err = update_profile(
            &state,
            user.id,
            UpdateProfileRequest {
                email: Some("  TAKEN@clinic.test ".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Re-submitting one's own email in different case is fine.
        let updated = update_profile(
            &state,
            user.id,
            UpdateProfileRequest {
                email: Some("MINE@clinic.test".into()),
                ..Default::default()
            },
        )
        .await
        .expect("own email ok");
        assert_eq!(updated.email, "mine@clinic.test");
    }

    #[tokio::test]
    async fn update_profile_rejects_malformed_email() {
        let (_dir, state) = AppState::for_tests();
        let user = seed_user(&state, "pt@clinic.test", "pw-123456").await;
        let err = update_profile(
            &state,
            user.id,
            UpdateProfileRequest {
                email: Some("not-an-email".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn bootstrap_admin_seeds_once() {
        let (_dir, state) = AppState::for_tests();

        bootstrap_admin(&state, "Admin@Clinic.Test", "bootstrap-pw", "Clinic Admin")
            .await
            .expect("bootstrap");
        bootstrap_admin(&state, "admin@clinic.test", "other-pw", "Clinic Admin")
            .await
            .expect("idempotent");

        let admin = state
            .users
            .find_one(Box::new(|u: &User| u.email == "admin@clinic.test"))
            .await
            .expect("find")
            .expect("seeded");
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.is_active);

        // The first seed wins; the second run changed nothing.
        login(&state, "admin@clinic.test", "bootstrap-pw")
            .await
            .expect("admin can log in");
    }
}
