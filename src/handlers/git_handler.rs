use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::dto::git_dto::{
    CommitRequest, CreateBranchRequest, HistoryQuery, PathsRequest, RemoteRequest,
    SwitchBranchRequest,
};
use crate::errors::ApiError;
use crate::services::git_manager::{GitManager, DEFAULT_HISTORY_LIMIT};
use crate::utils::auth::CurrentUser;

pub async fn status(
    _user: CurrentUser,
    git: web::Data<GitManager>,
) -> Result<HttpResponse, ApiError> {
    let git = git.into_inner();
    let status = web::block(move || git.status()).await??;
    Ok(HttpResponse::Ok().json(status))
}

pub async fn branches(
    _user: CurrentUser,
    git: web::Data<GitManager>,
) -> Result<HttpResponse, ApiError> {
    let git = git.into_inner();
    let branches = web::block(move || git.branches()).await??;
    Ok(HttpResponse::Ok().json(branches))
}

pub async fn stage(
    _user: CurrentUser,
    git: web::Data<GitManager>,
    request: web::Json<PathsRequest>,
) -> Result<HttpResponse, ApiError> {
    let git = git.into_inner();
    let paths = request.into_inner().paths;
    web::block(move || git.stage(&paths)).await??;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn unstage(
    _user: CurrentUser,
    git: web::Data<GitManager>,
    request: web::Json<PathsRequest>,
) -> Result<HttpResponse, ApiError> {
    let git = git.into_inner();
    let paths = request.into_inner().paths;
    web::block(move || git.unstage(&paths)).await??;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn commit(
    _user: CurrentUser,
    git: web::Data<GitManager>,
    request: web::Json<CommitRequest>,
) -> Result<HttpResponse, ApiError> {
    let git = git.into_inner();
    let message = request.into_inner().message;
    let commit = web::block(move || git.commit(&message)).await??;
    Ok(HttpResponse::Ok().json(commit))
}

pub async fn switch_branch(
    _user: CurrentUser,
    git: web::Data<GitManager>,
    request: web::Json<SwitchBranchRequest>,
) -> Result<HttpResponse, ApiError> {
    let git = git.into_inner();
    let name = request.into_inner().name;
    web::block(move || git.switch_branch(&name)).await??;
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn create_branch(
    _user: CurrentUser,
    git: web::Data<GitManager>,
    request: web::Json<CreateBranchRequest>,
) -> Result<HttpResponse, ApiError> {
    let git = git.into_inner();
    let CreateBranchRequest { name, checkout } = request.into_inner();
    web::block(move || git.create_branch(&name, checkout)).await??;
    Ok(HttpResponse::Created().json(json!({ "success": true })))
}

/// Pull and push accept an empty body, meaning `origin` and the current
/// branch. Anything else must be a valid `RemoteRequest`.
fn remote_request(body: &[u8]) -> Result<RemoteRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RemoteRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
}

pub async fn pull(
    _user: CurrentUser,
    git: web::Data<GitManager>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let RemoteRequest { remote, branch } = remote_request(&body)?;
    let git = git.into_inner();
    let result = web::block(move || git.pull(remote.as_deref(), branch.as_deref())).await??;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn push(
    _user: CurrentUser,
    git: web::Data<GitManager>,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let RemoteRequest { remote, branch } = remote_request(&body)?;
    let git = git.into_inner();
    let result = web::block(move || git.push(remote.as_deref(), branch.as_deref())).await??;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn diff(
    _user: CurrentUser,
    git: web::Data<GitManager>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let git = git.into_inner();
    let path = path.into_inner();
    let requested = path.clone();
    let diff = web::block(move || git.diff(&requested)).await??;
    Ok(HttpResponse::Ok().json(json!({ "path": path, "diff": diff })))
}

pub async fn history(
    _user: CurrentUser,
    git: web::Data<GitManager>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, ApiError> {
    let git = git.into_inner();
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let commits = web::block(move || git.history(limit)).await??;
    Ok(HttpResponse::Ok().json(commits))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/git")
            .route("/status", web::get().to(status))
            .route("/branches", web::get().to(branches))
            .route("/stage", web::post().to(stage))
            .route("/unstage", web::post().to(unstage))
            .route("/commit", web::post().to(commit))
            .route("/branch/switch", web::post().to(switch_branch))
            .route("/branch/create", web::post().to(create_branch))
            .route("/pull", web::post().to(pull))
            .route("/push", web::post().to(push))
            .route("/diff/{path:.*}", web::get().to(diff))
            .route("/history", web::get().to(history)),
    );
}
