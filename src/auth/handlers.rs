use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::auth::dto::{
    ChangePasswordRequest, LoginData, LoginRequest, LoginResponse, MessageResponse,
    ProfilePictureData, ProfilePictureResponse, UpdateProfileRequest, UserData, UserResponse,
};
use crate::auth::extractors::AuthUser;
use crate::auth::service;
use crate::error::AppError;
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/profile", get(get_profile).put(update_profile))
        .route("/auth/change-password", put(change_password))
        .route(
            "/auth/upload-profile-picture",
            post(upload_profile_picture).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/auth/profile-picture", delete(delete_profile_picture))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (user, token) = service::login(&state, &payload.email, &payload.password).await?;
    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful.".into(),
        data: LoginData {
            user: user.into(),
            token,
        },
    }))
}

#[instrument(skip(state))]
async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = service::get_profile(&state, user_id).await?;
    Ok(Json(UserResponse {
        success: true,
        message: None,
        data: UserData { user: user.into() },
    }))
}

#[instrument(skip(state, payload))]
async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = service::update_profile(&state, user_id, payload).await?;
    Ok(Json(UserResponse {
        success: true,
        message: Some("Profile updated successfully.".into()),
        data: UserData { user: user.into() },
    }))
}

#[instrument(skip(state, payload))]
async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    service::change_password(
        &state,
        user_id,
        &payload.current_password,
        &payload.new_password,
    )
    .await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Password changed successfully.".into(),
    }))
}

#[instrument(skip(state, mp))]
async fn upload_profile_picture(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<ProfilePictureResponse>, AppError> {
    let mut upload = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("profilePicture") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::Validation("Only image files are allowed!".into()));
        }
        let original_name = field.file_name().unwrap_or("upload").to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid image upload: {e}")))?;
        upload = Some((body, original_name));
    }

    let (body, original_name) =
        upload.ok_or_else(|| AppError::Validation("No image file uploaded.".into()))?;
    let (key, user) = service::upload_profile_picture(&state, user_id, body, &original_name).await?;

    Ok(Json(ProfilePictureResponse {
        success: true,
        message: "Profile picture uploaded successfully.".into(),
        data: ProfilePictureData {
            profile_picture: format!("{}/{key}", crate::assets::dto::UPLOADS_PREFIX),
            user: user.into(),
        },
    }))
}

#[instrument(skip(state))]
async fn delete_profile_picture(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = service::delete_profile_picture(&state, user_id).await?;
    Ok(Json(UserResponse {
        success: true,
        message: Some("Profile picture deleted successfully.".into()),
        data: UserData { user: user.into() },
    }))
}
