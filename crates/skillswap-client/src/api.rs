use std::sync::Arc;

use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use uuid::Uuid;

use skillswap_rules::chat;
use skillswap_types::api::{
    AccountInfo, AvatarUploadRequest, ChatHistoryResponse, CreateSkillRequest,
    CreateSkillResponse, CreditsResponse, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse, SendMessageRequest, SkillDetailResponse, SkillSummary,
    UpdateProfileRequest, UploadStatus,
};
use skillswap_types::models::{ChatMessage, Lecture, Profile, PublicProfile};

use crate::error::{ClientError, Result};
use crate::live::Subscription;
use crate::session::{Identity, Session};

/// Size of each `PUT /uploads/{id}` chunk.
pub const UPLOAD_CHUNK_SIZE: usize = 4 * 1024 * 1024; // 4 MB

/// Typed HTTP client. Every call reads the bearer token from the shared
/// [`Session`] and keeps its cached profile current.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_session(base_url, Arc::new(Session::new()))
    }

    pub fn with_session(base_url: impl Into<String>, session: Arc<Session>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
            session,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -- Auth --

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Profile> {
        let body = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            display_name: display_name.map(str::to_string),
        };
        let resp: RegisterResponse =
            send(self.http.post(self.url("/auth/register")).json(&body)).await?;

        self.session.set_identity(Identity {
            user_id: resp.user_id,
            email: email.trim().to_lowercase(),
            token: resp.token,
        });
        info!("Registered {}", resp.user_id);
        self.load_profile().await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Profile> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let resp: LoginResponse =
            send(self.http.post(self.url("/auth/login")).json(&body)).await?;

        self.session.set_identity(Identity {
            user_id: resp.user_id,
            email: resp.email,
            token: resp.token,
        });
        info!("Signed in as {}", resp.user_id);
        self.load_profile().await
    }

    pub fn sign_out(&self) {
        self.session.sign_out();
    }

    /// `GET /api/profile`: the token's `{uid, email}`.
    pub async fn account_info(&self) -> Result<AccountInfo> {
        send(self.request(Method::GET, "/api/profile")?).await
    }

    // -- Profile --

    /// Fetches the own profile and caches it in the session.
    pub async fn load_profile(&self) -> Result<Profile> {
        let profile: Profile = send(self.request(Method::GET, "/users/me")?).await?;
        self.session.set_profile(profile.clone());
        Ok(profile)
    }

    /// Merge save: `None` fields are left untouched on the server.
    pub async fn save_profile(&self, update: &UpdateProfileRequest) -> Result<Profile> {
        let profile: Profile = send(self.request(Method::PUT, "/users/me")?.json(update)).await?;
        self.session.set_profile(profile.clone());
        Ok(profile)
    }

    /// Uploads a `data:image/...;base64,` avatar.
    pub async fn upload_avatar(&self, data_url: &str) -> Result<Profile> {
        let body = AvatarUploadRequest {
            data_url: data_url.to_string(),
        };
        let profile: Profile =
            send(self.request(Method::POST, "/users/me/avatar")?.json(&body)).await?;
        self.session.set_profile(profile.clone());
        Ok(profile)
    }

    pub async fn conversation_partners(&self) -> Result<Vec<PublicProfile>> {
        send(self.request(Method::GET, "/users")?).await
    }

    pub async fn user(&self, user_id: Uuid) -> Result<PublicProfile> {
        send(self.request(Method::GET, &format!("/users/{user_id}"))?).await
    }

    pub async fn credits(&self) -> Result<i64> {
        let resp: CreditsResponse = send(self.request(Method::GET, "/users/me/credits")?).await?;
        self.session.set_credits(resp.balance);
        Ok(resp.balance)
    }

    // -- Skills --

    pub async fn create_skill(&self, req: &CreateSkillRequest) -> Result<CreateSkillResponse> {
        let resp: CreateSkillResponse =
            send(self.request(Method::POST, "/skills")?.json(req)).await?;
        if resp.credits_awarded > 0 {
            self.credits().await?;
        }
        Ok(resp)
    }

    /// Published catalog; a blank query returns everything.
    pub async fn skills(&self, query: &str) -> Result<Vec<SkillSummary>> {
        send(self.request(Method::GET, "/skills")?.query(&[("q", query)])).await
    }

    pub async fn my_skills(&self) -> Result<Vec<SkillSummary>> {
        send(self.request(Method::GET, "/skills/mine")?).await
    }

    pub async fn skill(&self, skill_id: Uuid) -> Result<SkillDetailResponse> {
        send(self.request(Method::GET, &format!("/skills/{skill_id}"))?).await
    }

    /// Full lecture content. Fails with [`ClientError::InsufficientCredits`]
    /// when the balance is below the skill's price.
    pub async fn lectures(&self, skill_id: Uuid) -> Result<Vec<Lecture>> {
        send(self.request(Method::GET, &format!("/skills/{skill_id}/lectures"))?).await
    }

    // -- Chats --

    /// Room shared with `peer_id`, computed the same way on both sides.
    pub fn room_key(&self, peer_id: Uuid) -> Result<String> {
        let me = self.session.user_id().ok_or(ClientError::NotSignedIn)?;
        Ok(chat::room_key(&me.to_string(), &peer_id.to_string()))
    }

    pub async fn messages(&self, peer_id: Uuid) -> Result<ChatHistoryResponse> {
        send(self.request(Method::GET, &format!("/chats/{peer_id}/messages"))?).await
    }

    pub async fn send_message(&self, peer_id: Uuid, text: &str) -> Result<ChatMessage> {
        let body = SendMessageRequest {
            text: text.to_string(),
        };
        send(
            self.request(Method::POST, &format!("/chats/{peer_id}/messages"))?
                .json(&body),
        )
        .await
    }

    // -- Uploads --

    /// Stages a fresh recording and returns the id to reference from a
    /// `Recording` lecture draft.
    pub async fn upload_recording(&self, data: Bytes) -> Result<Uuid> {
        let staged: UploadStatus = send(self.request(Method::POST, "/uploads")?).await?;
        self.resume_upload(staged.id, data).await?;
        Ok(staged.id)
    }

    /// Sends whatever part of `data` the server has not received yet.
    pub async fn resume_upload(&self, upload_id: Uuid, data: Bytes) -> Result<u64> {
        let status: UploadStatus =
            send(self.request(Method::GET, &format!("/uploads/{upload_id}"))?).await?;
        let total = data.len() as u64;
        let mut offset = status.bytes_received;

        while offset < total {
            let end = (offset as usize + UPLOAD_CHUNK_SIZE).min(data.len());
            let chunk = data.slice(offset as usize..end);
            match self.append_chunk(upload_id, offset, chunk).await {
                Ok(status) => offset = status.bytes_received,
                Err(ClientError::UploadOffset { expected }) if expected <= total => {
                    debug!("Upload {} resuming at {} instead of {}", upload_id, expected, offset);
                    offset = expected;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(offset)
    }

    /// One raw `PUT /uploads/{id}?offset=N`.
    pub async fn append_chunk(&self, upload_id: Uuid, offset: u64, chunk: Bytes) -> Result<UploadStatus> {
        send(
            self.request(Method::PUT, &format!("/uploads/{upload_id}"))?
                .query(&[("offset", offset)])
                .header("Content-Type", "application/octet-stream")
                .body(chunk),
        )
        .await
    }

    /// Throws away a staged recording.
    pub async fn discard_upload(&self, upload_id: Uuid) -> Result<()> {
        let resp = self
            .request(Method::DELETE, &format!("/uploads/{upload_id}"))?
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status.as_u16(), &body));
        }
        Ok(())
    }

    /// Downloads a public media URL (lecture recordings, avatars).
    pub async fn fetch_media(&self, url: &str) -> Result<Bytes> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status.as_u16(), &body));
        }
        Ok(resp.bytes().await?)
    }

    // -- Live --

    /// Opens the gateway and identifies with the session token.
    pub async fn live(&self) -> Result<Subscription> {
        let token = self.session.token().ok_or(ClientError::NotSignedIn)?;
        Subscription::connect(&gateway_url(&self.base_url), &token).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.session.token().ok_or(ClientError::NotSignedIn)?;
        Ok(self.http.request(method, self.url(path)).bearer_auth(token))
    }
}

async fn send<T: DeserializeOwned>(req: RequestBuilder) -> Result<T> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::from_response(status.as_u16(), &body));
    }
    Ok(resp.json().await?)
}

/// `http(s)://host` becomes `ws(s)://host/gateway`.
pub(crate) fn gateway_url(base_url: &str) -> String {
    let base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base_url.to_string()
    };
    format!("{}/gateway", base.trim_end_matches('/'))
}
