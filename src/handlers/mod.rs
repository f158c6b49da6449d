use actix_web::{web, HttpResponse};
use serde_json::json;

pub mod file_handler;
pub mod git_handler;
pub mod llm_handler;
pub mod project_handler;
pub mod user_handler;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
    cfg.service(
        web::scope("/api")
            .configure(user_handler::init_routes)
            .configure(llm_handler::init_routes)
            .configure(file_handler::init_routes)
            .configure(git_handler::init_routes)
            .configure(project_handler::init_routes),
    );
}
