use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{extract::Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, warn};

use crate::config;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthUser;
use crate::plans::Plan;
use crate::styles::{find_style, is_accessible, StyleOption, STYLE_OPTIONS};
use crate::usage::{check_usage_allowed, increment_usage, today_utc};

/// Base64 payload ceiling, matching the client-side resize target.
const MAX_IMAGE_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub image_base64: String,
    pub mime_type: String,
}

/// Seam for the external image generation service.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        image_base64: &str,
        mime_type: &str,
        prompt: &str,
    ) -> Result<GeneratedImage>;
}

/// Gemini-backed generator. `base_url` is overridable so tests can point it
/// at a local mock server.
pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl GeminiGenerator {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build generation client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: "gemini-2.5-flash-image".to_string(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(
            "https://generativelanguage.googleapis.com",
            config::GEMINI_API_KEY.clone(),
        )
    }
}

#[async_trait]
impl ImageGenerator for GeminiGenerator {
    async fn generate(
        &self,
        image_base64: &str,
        mime_type: &str,
        prompt: &str,
    ) -> Result<GeneratedImage> {
        let api_key = self
            .api_key
            .as_deref()
            .context("GEMINI_API_KEY is not configured")?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let payload = json!({
            "contents": [{
                "parts": [
                    { "inline_data": { "mime_type": mime_type, "data": image_base64 } },
                    { "text": prompt },
                ],
            }],
            "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] },
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&payload)
            .send()
            .await
            .context("failed to contact generation service")?
            .error_for_status()
            .context("generation service rejected the request")?;

        let body: serde_json::Value = response
            .json()
            .await
            .context("failed to decode generation response")?;

        let parts = body
            .pointer("/candidates/0/content/parts")
            .and_then(|value| value.as_array())
            .context("no candidates in generation response")?;

        for part in parts {
            if let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) {
                if let Some(data) = inline.get("data").and_then(|v| v.as_str()) {
                    let mime = inline
                        .get("mimeType")
                        .or_else(|| inline.get("mime_type"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("image/png");
                    return Ok(GeneratedImage {
                        image_base64: data.to_string(),
                        mime_type: mime.to_string(),
                    });
                }
            }
        }

        anyhow::bail!("no image in generation response")
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub image_base64: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub style: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub image: String,
    pub mime_type: String,
    pub usage: UsageSummary,
}

#[derive(Debug, Serialize)]
pub struct UsageSummary {
    pub used: i32,
    pub limit: i32,
}

fn has_override(email: &str) -> bool {
    config::ADMIN_EMAIL.as_deref() == Some(email)
}

/// Request-time composition for one generation. Ordering is load-bearing:
/// the quota gate runs before the upstream call, and the ledger increment
/// only lands after a confirmed success.
pub async fn generate(
    Extension(pool): Extension<PgPool>,
    Extension(generator): Extension<Arc<dyn ImageGenerator>>,
    AuthUser { user_id, email }: AuthUser,
    Json(payload): Json<GenerateRequest>,
) -> AppResult<Json<GenerateResponse>> {
    let verdict = check_usage_allowed(&pool, user_id).await.map_err(|e| {
        error!(?e, "DB error evaluating usage");
        AppError::Db(e)
    })?;
    if !verdict.allowed {
        return Err(AppError::QuotaExceeded {
            used: verdict.used,
            limit: verdict.limit,
            plan: verdict.plan,
        });
    }

    if payload.image_base64.is_empty() {
        return Err(AppError::BadRequest(
            "Missing required fields: image_base64, style".into(),
        ));
    }
    let Some(style) = find_style(&payload.style) else {
        return Err(AppError::BadRequest(format!(
            "Invalid style: {}",
            payload.style
        )));
    };
    if payload.image_base64.len() > MAX_IMAGE_SIZE {
        return Err(AppError::BadRequest(
            "Image too large. Maximum size is 4MB.".into(),
        ));
    }

    let plan = Plan::from_key(verdict.plan);
    if !is_accessible(plan, has_override(&email), style.tier) {
        return Err(AppError::Forbidden(
            "This style requires a PRO plan. Please upgrade to access it.".into(),
        ));
    }

    let mut prompt = style.prompt.to_string();
    if let Some(extra) = payload.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        prompt.push_str("\n\nAdditional user instructions:\n");
        prompt.push_str(extra);
    }

    let mime_type = payload.mime_type.as_deref().unwrap_or("image/png");
    let result = generator
        .generate(&payload.image_base64, mime_type, &prompt)
        .await
        .map_err(|e| {
            error!(?e, "image generation failed");
            AppError::Message("Image generation failed".into())
        })?;

    // A failed increment after a delivered image is an accepted soft failure.
    let used = match increment_usage(&pool, user_id, today_utc()).await {
        Ok(count) => count,
        Err(e) => {
            warn!(?e, %user_id, "usage increment failed after successful generation");
            verdict.used + 1
        }
    };

    Ok(Json(GenerateResponse {
        success: true,
        image: result.image_base64,
        mime_type: result.mime_type,
        usage: UsageSummary {
            used,
            limit: verdict.limit,
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct StyleEntry {
    #[serde(flatten)]
    pub style: StyleOption,
    pub accessible: bool,
}

/// Style catalog with per-user accessibility for the style picker.
pub async fn list_styles(
    Extension(pool): Extension<PgPool>,
    AuthUser { user_id, email }: AuthUser,
) -> AppResult<Json<Vec<StyleEntry>>> {
    let plan = crate::usage::get_user_plan(&pool, user_id)
        .await
        .map_err(|e| {
            error!(?e, "DB error fetching profile plan");
            AppError::Db(e)
        })?;
    let override_flag = has_override(&email);
    let entries = STYLE_OPTIONS
        .iter()
        .map(|style| StyleEntry {
            style: *style,
            accessible: is_accessible(plan, override_flag, style.tier),
        })
        .collect();
    Ok(Json(entries))
}
