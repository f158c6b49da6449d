use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::dto::file_dto::{FileOperation, FileRequest, FolderRequest, SearchRequest};
use crate::errors::ApiError;
use crate::services::file_manager::FileManager;
use crate::services::search::{self, SearchOptions, DEFAULT_MAX_RESULTS};
use crate::utils::auth::CurrentUser;

pub async fn file_operation(
    _user: CurrentUser,
    file_manager: web::Data<FileManager>,
    request: web::Json<FileRequest>,
) -> Result<HttpResponse, ApiError> {
    let FileRequest {
        path,
        content,
        operation,
    } = request.into_inner();
    let fm = file_manager.into_inner();

    match operation {
        FileOperation::Read => {
            let content = web::block(move || fm.read_file(&path)).await??;
            Ok(HttpResponse::Ok().json(json!({ "content": content })))
        }
        FileOperation::Write => {
            let content = content.ok_or_else(|| {
                ApiError::BadRequest(String::from("Content is required for write"))
            })?;
            web::block(move || fm.write_file(&path, &content)).await??;
            Ok(HttpResponse::Ok().json(json!({ "success": true })))
        }
        FileOperation::Delete => {
            web::block(move || fm.delete(&path)).await??;
            Ok(HttpResponse::Ok().json(json!({ "success": true })))
        }
        FileOperation::List => {
            let files = web::block(move || fm.list_dir(&path)).await??;
            Ok(HttpResponse::Ok().json(json!({ "files": files })))
        }
    }
}

pub async fn get_tree(
    _user: CurrentUser,
    file_manager: web::Data<FileManager>,
) -> Result<HttpResponse, ApiError> {
    let fm = file_manager.into_inner();
    let tree = web::block(move || fm.tree()).await??;
    Ok(HttpResponse::Ok().json(json!({ "tree": tree })))
}

pub async fn create_folder(
    _user: CurrentUser,
    file_manager: web::Data<FileManager>,
    request: web::Json<FolderRequest>,
) -> Result<HttpResponse, ApiError> {
    let fm = file_manager.into_inner();
    let path = request.into_inner().path;
    web::block(move || fm.create_folder(&path)).await??;
    Ok(HttpResponse::Created().json(json!({ "success": true })))
}

pub async fn search_files(
    _user: CurrentUser,
    file_manager: web::Data<FileManager>,
    request: web::Json<SearchRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    if request.query.is_empty() {
        return Err(ApiError::BadRequest(String::from("Query is required")));
    }
    let options = SearchOptions {
        case_sensitive: request.case_sensitive.unwrap_or(true),
        max_results: request.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
    };

    let fm = file_manager.into_inner();
    let results = web::block(move || search::search(fm.root(), &request.query, &options)).await?;
    Ok(HttpResponse::Ok().json(json!({ "results": results })))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/files").route(web::post().to(file_operation)));
    cfg.service(web::resource("/files/tree").route(web::get().to(get_tree)));
    cfg.service(web::resource("/files/folder").route(web::post().to(create_folder)));
    cfg.service(web::resource("/files/search").route(web::post().to(search_files)));
}
