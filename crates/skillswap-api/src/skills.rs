use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use skillswap_db::models::{NewLecture, NewSkill, SkillRow};
use skillswap_rules::credits::{self, CreditCheck};
use skillswap_rules::search;
use skillswap_types::api::{
    Claims, CreateSkillRequest, CreateSkillResponse, DraftContent, SkillDetailResponse,
    SkillQuery, SkillSummary,
};
use skillswap_types::events::GatewayEvent;
use skillswap_types::models::{Lecture, LectureContent};

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, ApiResult};

const MAX_NAME_LEN: usize = 120;

/// POST /skills: save a skill; published skills earn the author credits.
pub async fn create_skill(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateSkillRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("Skill name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::validation(format!(
            "Skill name must be at most {MAX_NAME_LEN} characters"
        )));
    }

    let owner = claims.sub.to_string();
    validate_drafts(&state, &owner, &req).await?;

    let skill_id = Uuid::new_v4();
    let award = credits::award_for_drafts(&req.lectures);

    // Promote fresh recordings to their permanent home. Until the skill is
    // saved, `promoted` tracks what to move back on failure.
    let mut promoted: Vec<(String, String)> = Vec::new();
    let mut lectures: Vec<Lecture> = Vec::with_capacity(req.lectures.len());
    for (index, draft) in req.lectures.into_iter().enumerate() {
        let title = match draft.title.trim() {
            "" => format!("Lecture {}", index + 1),
            title => title.to_string(),
        };
        let content = match draft.content {
            DraftContent::Video { url } => LectureContent::Video {
                url: url.trim().to_string(),
            },
            DraftContent::Text { body } => LectureContent::Text { body },
            DraftContent::Recording { upload_id } => {
                let dest = format!("lectures/{}/{}/lecture_{}.webm", owner, skill_id, index + 1);
                let upload = upload_id.to_string();
                let blob = match state.media.promote(&owner, &upload, &dest).await {
                    Ok(blob) => blob,
                    Err(e) => {
                        restore_uploads(&state, &owner, &promoted).await;
                        return Err(e.into());
                    }
                };
                promoted.push((upload, dest));
                debug!("Lecture {} stored: {} bytes, sha256 {}", index + 1, blob.size, blob.sha256);
                LectureContent::Video {
                    url: skillswap_media::public_url(&state.public_url, &blob.path),
                }
            }
        };
        lectures.push(Lecture { title, content });
    }

    let published = req.published;
    let description = req.description.trim().to_string();
    let category = req.category.trim().to_string();
    let id = skill_id.to_string();
    let author_id = owner.clone();

    let saved = state
        .blocking(move |db| {
            let author = db
                .get_user_by_id(&author_id)?
                .ok_or_else(|| anyhow::anyhow!("author {} has no user record", author_id))?;
            let author_name = convert::author_name(&author);

            let new_lectures: Vec<NewLecture<'_>> = lectures
                .iter()
                .map(|l| NewLecture {
                    title: &l.title,
                    kind: l.content.kind().as_str(),
                    content: l.content.value(),
                })
                .collect();

            let balance = db.create_skill(
                &NewSkill {
                    id: &id,
                    name: &name,
                    description: &description,
                    category: &category,
                    credits_required: award,
                    published,
                    author_id: &author_id,
                    author_name: &author_name,
                },
                &new_lectures,
                published.then_some(award),
            )?;

            let row = db
                .get_skill(&id)?
                .ok_or_else(|| anyhow::anyhow!("skill {} vanished after insert", id))?;
            Ok((balance, row, db.get_lectures(&id)?))
        })
        .await;
    let (balance, row, lecture_rows) = match saved {
        Ok(saved) => saved,
        Err(e) => {
            restore_uploads(&state, &owner, &promoted).await;
            return Err(e);
        }
    };

    let skill = convert::skill(row, lecture_rows);
    let credits_awarded = if published { award } else { 0 };

    if published {
        info!(
            "{} published '{}' ({} lectures, +{} credits)",
            claims.sub,
            skill.name,
            skill.lectures.len(),
            award
        );
        state.dispatcher.broadcast(GatewayEvent::SkillPublished {
            skill: SkillSummary::from(&skill),
        });
        if let Some(balance) = balance {
            state
                .dispatcher
                .send_to_user(claims.sub, GatewayEvent::CreditsUpdate {
                    user_id: claims.sub,
                    balance,
                })
                .await;
        }
    } else {
        info!("{} saved draft '{}'", claims.sub, skill.name);
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateSkillResponse {
            skill,
            credits_awarded,
        }),
    ))
}

/// Moves promoted recordings back to staging so the author can retry.
async fn restore_uploads(state: &AppState, owner: &str, promoted: &[(String, String)]) {
    for (upload_id, dest) in promoted {
        if let Err(e) = state.media.restore(owner, upload_id, dest).await {
            error!("Failed to restore upload {} from {}: {}", upload_id, dest, e);
        }
    }
}

/// Everything is checked before any recording is promoted, so a rejected
/// request leaves staged uploads in place for a retry.
async fn validate_drafts(state: &AppState, owner: &str, req: &CreateSkillRequest) -> ApiResult<()> {
    let mut recordings = HashSet::new();
    for (index, draft) in req.lectures.iter().enumerate() {
        let n = index + 1;
        match &draft.content {
            DraftContent::Video { url } if url.trim().is_empty() => {
                return Err(ApiError::validation(format!("Lecture {n} has no video link")));
            }
            DraftContent::Text { body } if body.trim().is_empty() => {
                return Err(ApiError::validation(format!("Lecture {n} has no text")));
            }
            DraftContent::Recording { upload_id } => {
                if !recordings.insert(*upload_id) {
                    return Err(ApiError::validation(format!(
                        "Lecture {n} reuses a recording from an earlier lecture"
                    )));
                }
                let size = state.media.upload_size(owner, &upload_id.to_string()).await?;
                match size {
                    Some(size) if size > 0 => {}
                    Some(_) => {
                        return Err(ApiError::validation(format!(
                            "Lecture {n} recording is empty"
                        )));
                    }
                    None => {
                        warn!("{} referenced unknown upload {}", owner, upload_id);
                        return Err(ApiError::validation(format!(
                            "Lecture {n} recording was not uploaded"
                        )));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// GET /skills?q=: published catalog, filtered by name.
pub async fn list_skills(
    State(state): State<AppState>,
    Query(query): Query<SkillQuery>,
) -> ApiResult<Json<Vec<SkillSummary>>> {
    let rows = state.blocking(|db| db.list_published_skills()).await?;
    let summaries: Vec<SkillSummary> = rows.into_iter().map(convert::skill_summary).collect();
    Ok(Json(search::filter(summaries, query.q.as_deref().unwrap_or(""))))
}

/// GET /skills/mine: own skills, drafts included.
pub async fn my_skills(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<SkillSummary>>> {
    let id = claims.sub.to_string();
    let rows = state.blocking(move |db| db.list_skills_by_author(&id)).await?;
    Ok(Json(rows.into_iter().map(convert::skill_summary).collect()))
}

/// GET /skills/{id}: summary, lecture outline and the caller's access.
pub async fn get_skill(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(skill_id): Path<Uuid>,
) -> ApiResult<Json<SkillDetailResponse>> {
    let (row, lectures, balance) = load_visible(&state, &claims, skill_id).await?;
    let access = credits::access(balance, row.credits_required);

    Ok(Json(SkillDetailResponse {
        lectures: lectures.iter().map(convert::lecture_outline).collect(),
        skill: convert::skill_summary(row),
        access,
    }))
}

/// GET /skills/{id}/lectures: full content, gated on the credit balance.
/// Viewing never spends credits.
pub async fn get_lectures(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(skill_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Lecture>>> {
    let (row, lectures, balance) = load_visible(&state, &claims, skill_id).await?;

    match credits::check_access(balance, row.credits_required) {
        CreditCheck::Granted => Ok(Json(lectures.into_iter().map(convert::lecture).collect())),
        CreditCheck::Denied { shortfall } => Err(ApiError::InsufficientCredits {
            required: row.credits_required,
            balance,
            shortfall,
        }),
    }
}

/// Loads a skill the caller may see (published, or their own draft) along
/// with its lectures and the caller's balance.
async fn load_visible(
    state: &AppState,
    claims: &Claims,
    skill_id: Uuid,
) -> ApiResult<(SkillRow, Vec<skillswap_db::models::LectureRow>, i64)> {
    let id = skill_id.to_string();
    let viewer = claims.sub.to_string();
    let (row, lectures, balance) = state
        .blocking(move |db| {
            let Some(row) = db.get_skill(&id)? else {
                return Ok((None, Vec::new(), 0));
            };
            let lectures = db.get_lectures(&id)?;
            let balance = db.get_balance(&viewer)?;
            Ok((Some(row), lectures, balance))
        })
        .await?;

    let row = row
        .filter(|row| row.published || row.author_id == claims.sub.to_string())
        .ok_or(ApiError::NotFound("skill"))?;
    Ok((row, lectures, balance))
}
