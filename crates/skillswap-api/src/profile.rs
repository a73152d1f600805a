use axum::{
    Extension, Json,
    extract::{Path, State},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tracing::info;
use uuid::Uuid;

use skillswap_types::api::{
    AccountInfo, AvatarUploadRequest, Claims, CreditsResponse, UpdateProfileRequest,
};
use skillswap_types::models::{Profile, PublicProfile};

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, ApiResult};

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;
const MAX_BIO_LEN: usize = 1000;
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;
const AVATAR_TYPES: &[&str] = &["png", "jpeg", "jpg", "gif", "webp"];

/// GET /api/profile: token check passthrough, `{uid, email}`.
pub async fn account_info(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<AccountInfo>> {
    let id = claims.sub.to_string();
    let user = state
        .blocking(move |db| db.get_user_by_id(&id))
        .await?
        .ok_or_else(|| ApiError::Internal(format!("no user record for {}", claims.sub)))?;

    Ok(Json(AccountInfo {
        uid: claims.sub,
        email: user.email,
    }))
}

pub async fn get_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Profile>> {
    Ok(Json(load_profile(&state, claims.sub).await?))
}

/// PUT /users/me: merge save, absent fields keep their stored value.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Profile>> {
    let username = match req.username {
        Some(name) => {
            let name = name.trim().to_string();
            if !USERNAME_LEN.contains(&name.chars().count()) {
                return Err(ApiError::validation(format!(
                    "Username must be {} to {} characters",
                    USERNAME_LEN.start(),
                    USERNAME_LEN.end()
                )));
            }
            Some(name)
        }
        None => None,
    };
    if req.bio.as_ref().is_some_and(|bio| bio.chars().count() > MAX_BIO_LEN) {
        return Err(ApiError::validation(format!(
            "Bio must be at most {MAX_BIO_LEN} characters"
        )));
    }
    if let Some(avatar) = &req.avatar {
        if !(avatar.starts_with("https://") || avatar.starts_with("http://")) {
            return Err(ApiError::validation("Avatar must be an http(s) URL"));
        }
    }

    let id = claims.sub.to_string();
    let bio = req.bio;
    let avatar = req.avatar;
    let found = state
        .blocking(move |db| {
            db.update_profile(&id, username.as_deref(), bio.as_deref(), avatar.as_deref())
        })
        .await?;
    if !found {
        return Err(ApiError::NotFound("user"));
    }

    info!("Profile saved for {}", claims.sub);
    Ok(Json(load_profile(&state, claims.sub).await?))
}

/// POST /users/me/avatar: store an uploaded image and make it the avatar.
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AvatarUploadRequest>,
) -> ApiResult<Json<Profile>> {
    let (ext, bytes) = parse_image_data_url(&req.data_url)?;

    let dest = format!("avatars/{}/{}.{}", claims.sub, Uuid::new_v4(), ext);
    let blob = state.media.put(&dest, &bytes).await?;
    let url = skillswap_media::public_url(&state.public_url, &blob.path);

    let id = claims.sub.to_string();
    let found = state
        .blocking(move |db| db.update_profile(&id, None, None, Some(url.as_str())))
        .await?;
    if !found {
        return Err(ApiError::NotFound("user"));
    }

    Ok(Json(load_profile(&state, claims.sub).await?))
}

/// GET /users: people you can start a conversation with.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<PublicProfile>>> {
    let id = claims.sub.to_string();
    let rows = state.blocking(move |db| db.list_users_with_profile(&id)).await?;
    Ok(Json(rows.into_iter().map(convert::public_profile).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<PublicProfile>> {
    let id = user_id.to_string();
    let row = state
        .blocking(move |db| db.get_user_by_id(&id))
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(convert::public_profile(row)))
}

pub async fn get_credits(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<CreditsResponse>> {
    let id = claims.sub.to_string();
    let balance = state.blocking(move |db| db.get_balance(&id)).await?;
    Ok(Json(CreditsResponse { balance }))
}

pub(crate) async fn load_profile(state: &AppState, user_id: Uuid) -> ApiResult<Profile> {
    let id = user_id.to_string();
    let (row, balance) = state
        .blocking(move |db| Ok((db.get_user_by_id(&id)?, db.get_balance(&id)?)))
        .await?;
    let row = row.ok_or(ApiError::NotFound("user"))?;
    Ok(convert::profile(row, balance))
}

/// Splits `data:image/<ext>;base64,<payload>` into (ext, decoded bytes).
fn parse_image_data_url(data_url: &str) -> ApiResult<(String, Vec<u8>)> {
    let invalid = || ApiError::validation("Expected a base64 image data URL");

    let rest = data_url.strip_prefix("data:image/").ok_or_else(invalid)?;
    let (ext, payload) = rest.split_once(";base64,").ok_or_else(invalid)?;
    let ext = ext.to_ascii_lowercase();
    if !AVATAR_TYPES.contains(&ext.as_str()) {
        return Err(ApiError::validation(format!("Unsupported image type: {ext}")));
    }

    let bytes = B64.decode(payload.trim()).map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }
    if bytes.len() > MAX_AVATAR_BYTES {
        return Err(ApiError::validation("Avatar image is too large"));
    }
    Ok((ext, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_parsing() {
        let (ext, bytes) = parse_image_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(ext, "png");
        assert_eq!(bytes, b"hello");

        assert!(parse_image_data_url("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(parse_image_data_url("data:image/svg;base64,aGVsbG8=").is_err());
        assert!(parse_image_data_url("data:image/png;base64,!!!").is_err());
        assert!(parse_image_data_url("https://cdn/x.png").is_err());
    }
}
