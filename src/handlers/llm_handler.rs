use actix_web::{web, HttpResponse};

use crate::errors::ApiError;
use crate::services::ai_assistant::{AiAssistant, AssistantRequest};
use crate::services::rate_limiter::RateLimiter;
use crate::utils::auth::CurrentUser;

/// The body is taken raw so the rate limit is charged before the payload
/// is validated: unauthenticated → 401, over the limit → 429, bad body → 400.
pub async fn ask_assistant(
    user: CurrentUser,
    limiter: web::Data<RateLimiter>,
    assistant: web::Data<AiAssistant>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    if let Err(retry_after) = limiter.check(user.id) {
        log::warn!("user {} hit the LLM rate limit", user.id);
        return Err(ApiError::RateLimited {
            retry_after: retry_after.as_secs_ceil(),
        });
    }

    let request: AssistantRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?;
    if request.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest(String::from("Prompt is required")));
    }

    let reply = assistant.complete(&request).await?;
    Ok(HttpResponse::Ok().json(reply))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/llm").route(web::post().to(ask_assistant)));
}
