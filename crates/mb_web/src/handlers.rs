use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use mb_core::{storage::is_valid_audio_name, Briefing, PushKeys, PushSubscription, VoiceOptions};
use mb_news::{date_range, run_daily, DailyReport, GenerateOutcome, GenerateRequest, HistoricalStatus};
use mb_tts::elevenlabs::{MODELS, VOICES};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::newsletter::{is_valid_email, normalize_email, SignupOutcome};
use crate::AppState;

pub const HISTORY_LIMIT: usize = 14;

const USAGE_WARNING_PERCENT: u64 = 80;

fn parse_date(raw: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))
}

/// An empty body reads as the default value.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}

fn authorize(headers: &HeaderMap, secret: Option<&str>) -> ApiResult<()> {
    let Some(secret) = secret else {
        return Ok(());
    };
    let expected = format!("Bearer {}", secret);
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "success": true, "status": "ok" }))
}

#[derive(Debug, Default, Deserialize)]
pub struct BriefingsQuery {
    pub date: Option<String>,
    pub history: Option<String>,
}

pub async fn get_briefings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BriefingsQuery>,
) -> ApiResult<Json<Value>> {
    if query.history.as_deref() == Some("true") {
        let history = state.storage.history(HISTORY_LIMIT).await?;
        return Ok(Json(json!({ "success": true, "history": history })));
    }

    if let Some(raw) = query.date.as_deref() {
        let date = parse_date(raw)?;
        return match state.storage.get_briefing(date).await? {
            Some(briefing) => Ok(Json(json!({ "success": true, "briefing": briefing }))),
            None => Err(ApiError::not_found(format!("No briefing found for {}", date))),
        };
    }

    match state.storage.get_briefing(Utc::now().date_naive()).await? {
        Some(briefing) => Ok(Json(json!({ "success": true, "briefing": briefing }))),
        None => Err(ApiError::NotFound {
            message: "No briefing generated yet for today".to_string(),
            hint: Some("POST /api/briefings/generate to create today's briefing".to_string()),
        }),
    }
}

pub async fn list_dates(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let dates = state.storage.list_dates().await?;
    Ok(Json(json!({ "success": true, "dates": dates })))
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateBody {
    pub date: Option<String>,
    #[serde(default)]
    pub force: bool,
    pub voice: Option<String>,
    pub model: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryOverview<'a> {
    category: &'a str,
    display_name: &'a str,
    emoji: &'a str,
    headline: &'a str,
    duration: &'a str,
    story_count: usize,
    has_audio: bool,
}

/// Compact view of a briefing returned by the generation endpoints.
fn overview(briefing: &Briefing) -> Value {
    let categories: Vec<CategoryOverview> = briefing
        .category_briefs
        .iter()
        .map(|brief| CategoryOverview {
            category: brief.topic.key(),
            display_name: &brief.display_name,
            emoji: &brief.emoji,
            headline: &brief.headline,
            duration: &brief.estimated_duration,
            story_count: brief.story_count,
            has_audio: brief.audio_url.is_some(),
        })
        .collect();

    json!({
        "headline": briefing.full_briefing.headline,
        "duration": briefing.full_briefing.duration,
        "audioUrl": briefing.full_briefing.audio_url,
        "totalStories": briefing.meta.total_stories,
        "categoryBriefs": categories,
    })
}

pub async fn generate_briefing(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body: GenerateBody = parse_body(&body)?;
    let date = body.date.as_deref().map(parse_date).transpose()?;
    let request = GenerateRequest {
        date,
        force: body.force,
        voice: VoiceOptions { voice: body.voice, model: body.model },
    };

    let response = match state.generator.generate(request).await? {
        GenerateOutcome::Skipped(existing) => json!({
            "success": true,
            "skipped": true,
            "date": existing.date,
            "message": "Briefing already exists",
            "briefing": overview(&existing),
        }),
        GenerateOutcome::Generated { briefing, elapsed } => json!({
            "success": true,
            "skipped": false,
            "date": briefing.date,
            "processingTime": format!("{:.1}s", elapsed.as_secs_f64()),
            "briefing": overview(&briefing),
        }),
    };
    Ok(Json(response))
}

#[derive(Serialize)]
pub struct CronResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(flatten)]
    pub report: DailyReport,
}

pub async fn cron_daily(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<CronResponse>> {
    authorize(&headers, state.cron_secret.as_deref())?;
    info!("⏰ Daily cron triggered");

    let report = run_daily(&state.generator, state.notifier.as_deref()).await?;
    let message = if report.skipped {
        "Briefing already generated today"
    } else {
        "Daily briefing generated"
    };
    Ok(Json(CronResponse { success: true, message, report }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalBody {
    pub dates: Option<Vec<String>>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn generate_historical(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    authorize(&headers, state.admin_secret())?;
    let body: HistoricalBody = parse_body(&body)?;

    let dates = match body {
        HistoricalBody { dates: Some(dates), .. } => dates
            .iter()
            .map(|d| parse_date(d))
            .collect::<ApiResult<Vec<_>>>()?,
        HistoricalBody { start_date: Some(start), end_date: Some(end), .. } => {
            date_range(parse_date(&start)?, parse_date(&end)?)?
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Please provide either 'dates' array or 'startDate'/'endDate'".to_string(),
            ))
        }
    };

    let results = state.generator.generate_historical(&dates).await;
    let count = |status: HistoricalStatus| results.iter().filter(|r| r.status == status).count();
    let (successful, skipped, failed) = (
        count(HistoricalStatus::Success),
        count(HistoricalStatus::Skipped),
        count(HistoricalStatus::Error),
    );
    info!(
        "📚 Historical batch complete: {} success, {} skipped, {} failed",
        successful, skipped, failed
    );

    Ok(Json(json!({
        "success": true,
        "summary": {
            "total": dates.len(),
            "successful": successful,
            "skipped": skipped,
            "failed": failed,
        },
        "results": results,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct NewsletterBody {
    #[serde(default)]
    pub email: String,
}

pub async fn subscribe_newsletter(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body: NewsletterBody = parse_body(&body)?;
    if !body.email.contains('@') {
        return Err(ApiError::BadRequest("Valid email required".to_string()));
    }
    if !is_valid_email(body.email.trim()) {
        return Err(ApiError::BadRequest("Invalid email format".to_string()));
    }
    let email = normalize_email(&body.email);

    let mut message = "Thanks for subscribing! Check your email for confirmation.";
    if let Some(provider) = &state.newsletter {
        match provider.subscribe(&email).await {
            Ok(SignupOutcome::Subscribed) => {}
            Ok(SignupOutcome::AlreadySubscribed) => message = "You're already subscribed!",
            Err(e) => {
                warn!("{} signup failed for {}: {}", provider.name(), email, e);
                return Err(ApiError::Internal("Failed to subscribe. Please try again.".to_string()));
            }
        }
    }

    // The local copy is the only record when no provider is configured.
    match state.storage.add_subscriber(&email).await {
        Ok(_) => {}
        Err(e) if state.newsletter.is_some() => warn!("Local subscriber save failed: {}", e),
        Err(e) => return Err(e.into()),
    }

    info!("✅ Newsletter signup: {}", email);
    Ok(Json(json!({ "success": true, "message": message })))
}

pub async fn push_public_key(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    match &state.vapid_public_key {
        Some(key) => Ok(Json(json!({ "success": true, "publicKey": key }))),
        None => Err(ApiError::Unavailable("Push notifications not configured".to_string())),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeBody {
    pub endpoint: Option<String>,
    pub keys: Option<PushKeys>,
}

pub async fn push_subscribe(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    if !state.push_configured() {
        return Err(ApiError::Unavailable(
            "Push notifications not configured on server".to_string(),
        ));
    }
    let body: SubscribeBody = parse_body(&body)?;
    let (Some(endpoint), Some(keys)) = (body.endpoint.filter(|e| !e.is_empty()), body.keys) else {
        return Err(ApiError::BadRequest("Invalid subscription format".to_string()));
    };

    state
        .storage
        .save_push_subscription(&PushSubscription { endpoint, keys })
        .await?;
    Ok(Json(json!({ "success": true, "message": "Subscription saved" })))
}

#[derive(Debug, Default, Deserialize)]
pub struct UnsubscribeBody {
    pub endpoint: Option<String>,
}

pub async fn push_unsubscribe(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body: UnsubscribeBody = parse_body(&body)?;
    let Some(endpoint) = body.endpoint.filter(|e| !e.is_empty()) else {
        return Err(ApiError::BadRequest("Endpoint required".to_string()));
    };

    let removed = state.storage.remove_push_subscription(&endpoint).await?;
    Ok(Json(json!({
        "success": removed,
        "message": if removed { "Subscription removed" } else { "Subscription not found" },
    })))
}

pub async fn tts_usage(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let Some(provider) = &state.elevenlabs else {
        return Err(ApiError::Unavailable("ElevenLabs not configured".to_string()));
    };
    let usage = provider.usage().await?;
    let percent_used = usage.percent_used();

    let tip = if percent_used > USAGE_WARNING_PERCENT {
        "Credits running low: consider a larger plan or switch to the flash model"
    } else {
        "Credits looking good! The flash model uses half the credits."
    };
    Ok(Json(json!({
        "success": true,
        "elevenlabs": {
            "creditsUsed": usage.character_count,
            "creditsLimit": usage.character_limit,
            "creditsRemaining": usage.remaining_characters,
            "percentUsed": percent_used,
            "estimatedDaysRemaining": usage.estimated_days_remaining(),
        },
        "tip": tip,
    })))
}

fn presets(table: &[(&str, &str)]) -> Value {
    table
        .iter()
        .map(|(name, id)| json!({ "name": name, "id": id }))
        .collect()
}

/// Preset names accepted by the `voice` and `model` generation options,
/// plus the account's own voices when ElevenLabs is configured.
pub async fn tts_voices(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let account = match &state.elevenlabs {
        Some(provider) => provider.voices().await?,
        None => Vec::new(),
    };
    Ok(Json(json!({
        "success": true,
        "presets": { "voices": presets(&VOICES), "models": presets(&MODELS) },
        "voices": account,
    })))
}

pub async fn get_audio(
    State(state): State<Arc<AppState>>,
    Path(file): Path<String>,
) -> ApiResult<Response> {
    if !is_valid_audio_name(&file) {
        return Err(ApiError::not_found(format!("Audio {} not found", file)));
    }
    match state.storage.get_audio(&file).await? {
        Some(bytes) => Ok((
            [
                (header::CONTENT_TYPE, "audio/mpeg"),
                (header::CACHE_CONTROL, "public, max-age=86400"),
            ],
            bytes,
        )
            .into_response()),
        None => Err(ApiError::not_found(format!("Audio {} not found", file))),
    }
}
