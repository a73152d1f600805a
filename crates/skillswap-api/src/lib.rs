pub mod auth;
pub mod chats;
pub mod convert;
pub mod error;
pub mod media;
pub mod middleware;
pub mod profile;
pub mod skills;

#[cfg(test)]
mod tests;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// JSON envelope overhead on top of the raw avatar bytes (base64 is 4/3).
const AVATAR_BODY_LIMIT: usize = profile::MAX_AVATAR_BYTES / 3 * 4 + 64 * 1024;

/// REST routes. The WebSocket gateway is mounted by the server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/media/{*path}", get(media::download));

    let protected_routes = Router::new()
        .route("/api/profile", get(profile::account_info))
        .route("/users", get(profile::list_users))
        .route("/users/me", get(profile::get_me).put(profile::update_me))
        .route(
            "/users/me/avatar",
            post(profile::upload_avatar).layer(DefaultBodyLimit::max(AVATAR_BODY_LIMIT)),
        )
        .route("/users/me/credits", get(profile::get_credits))
        .route("/users/{user_id}", get(profile::get_user))
        .route("/skills", get(skills::list_skills).post(skills::create_skill))
        .route("/skills/mine", get(skills::my_skills))
        .route("/skills/{skill_id}", get(skills::get_skill))
        .route("/skills/{skill_id}/lectures", get(skills::get_lectures))
        .route(
            "/chats/{peer_id}/messages",
            get(chats::get_messages).post(chats::send_message),
        )
        .route("/uploads", post(media::create_upload))
        .route(
            "/uploads/{upload_id}",
            get(media::upload_status)
                .put(media::append_upload)
                .delete(media::discard_upload)
                .layer(DefaultBodyLimit::max(media::MAX_CHUNK_BYTES)),
        )
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
