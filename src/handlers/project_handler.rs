use actix_web::{web, HttpResponse};
use serde_json::json;
use sqlx::SqlitePool;

use crate::dto::project_dto::{NewProjectDTO, ProjectDetailDTO, SaveFileDTO};
use crate::errors::ApiError;
use crate::models::file::ProjectFile;
use crate::models::project::Project;
use crate::utils::auth::CurrentUser;

async fn owned_project(
    db_pool: &SqlitePool,
    project_id: i64,
    user: &CurrentUser,
) -> Result<Project, ApiError> {
    Project::find_for_user(db_pool, project_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(String::from("Project not found")))
}

pub async fn list_projects(
    db_pool: web::Data<SqlitePool>,
    user: CurrentUser,
) -> Result<HttpResponse, ApiError> {
    let projects = Project::list_for_user(&db_pool, user.id).await?;
    Ok(HttpResponse::Ok().json(projects))
}

pub async fn add_project(
    db_pool: web::Data<SqlitePool>,
    user: CurrentUser,
    new_project: web::Json<NewProjectDTO>,
) -> Result<HttpResponse, ApiError> {
    let name = new_project.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest(String::from("Project name is required")));
    }

    let project = Project::create(&db_pool, user.id, name, &new_project.description).await?;
    log::info!("user {} created project {}", user.id, project.id);
    Ok(HttpResponse::Created().json(project))
}

pub async fn get_project_by_id(
    db_pool: web::Data<SqlitePool>,
    user: CurrentUser,
    project_id: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let project = owned_project(&db_pool, project_id.into_inner(), &user).await?;
    let files = ProjectFile::list_for_project(&db_pool, project.id).await?;
    Ok(HttpResponse::Ok().json(ProjectDetailDTO { project, files }))
}

pub async fn delete_project(
    db_pool: web::Data<SqlitePool>,
    user: CurrentUser,
    project_id: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let project = owned_project(&db_pool, project_id.into_inner(), &user).await?;
    Project::delete(&db_pool, project.id).await?;
    log::info!("user {} deleted project {}", user.id, project.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub async fn list_files(
    db_pool: web::Data<SqlitePool>,
    user: CurrentUser,
    project_id: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let project = owned_project(&db_pool, project_id.into_inner(), &user).await?;
    let files = ProjectFile::list_for_project(&db_pool, project.id).await?;
    Ok(HttpResponse::Ok().json(files))
}

pub async fn save_file(
    db_pool: web::Data<SqlitePool>,
    user: CurrentUser,
    project_id: web::Path<i64>,
    file: web::Json<SaveFileDTO>,
) -> Result<HttpResponse, ApiError> {
    let project = owned_project(&db_pool, project_id.into_inner(), &user).await?;
    let path = file.path.trim();
    if path.is_empty() {
        return Err(ApiError::BadRequest(String::from("File path is required")));
    }

    let saved = ProjectFile::upsert(&db_pool, project.id, path, &file.content).await?;
    Ok(HttpResponse::Ok().json(saved))
}

pub async fn delete_file(
    db_pool: web::Data<SqlitePool>,
    user: CurrentUser,
    ids: web::Path<(i64, i64)>,
) -> Result<HttpResponse, ApiError> {
    let (project_id, file_id) = ids.into_inner();
    let project = owned_project(&db_pool, project_id, &user).await?;
    if !ProjectFile::delete(&db_pool, project.id, file_id).await? {
        return Err(ApiError::NotFound(String::from("File not found")));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/projects")
            .route(web::get().to(list_projects))
            .route(web::post().to(add_project)),
    );

    cfg.service(
        web::resource("/projects/{id}")
            .route(web::get().to(get_project_by_id))
            .route(web::delete().to(delete_project)),
    );

    cfg.service(
        web::resource("/projects/{id}/files")
            .route(web::get().to(list_files))
            .route(web::put().to(save_file)),
    );

    cfg.service(
        web::resource("/projects/{id}/files/{file_id}").route(web::delete().to(delete_file)),
    );
}
