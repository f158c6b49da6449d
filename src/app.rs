use actix_files::Files;
use actix_web::web;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::config::{ConfigError, Settings};
use crate::errors::{json_error_handler, query_error_handler};
use crate::handlers;
use crate::services::ai_assistant::{AiAssistant, LlmError};
use crate::services::file_manager::{FileError, FileManager};
use crate::services::git_manager::{GitError, GitManager};
use crate::services::rate_limiter::RateLimiter;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("workspace: {0}")]
    Workspace(#[from] FileError),
    #[error("git: {0}")]
    Git(#[from] GitError),
    #[error("llm client: {0}")]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shared state handed to every worker. Each piece is its own `web::Data`
/// so handlers extract only what they use.
#[derive(Clone)]
pub struct AppData {
    pub pool: web::Data<SqlitePool>,
    pub settings: web::Data<Settings>,
    pub file_manager: web::Data<FileManager>,
    pub git: web::Data<GitManager>,
    pub assistant: web::Data<AiAssistant>,
    pub rate_limiter: web::Data<RateLimiter>,
}

impl AppData {
    pub fn new(pool: SqlitePool, settings: Settings) -> Result<AppData, StartupError> {
        let file_manager = FileManager::new(&settings.workspace_root)?;
        let git = GitManager::new(
            file_manager.root(),
            &settings.git_author_name,
            &settings.git_author_email,
        );
        git.ensure_repository()?;

        let assistant = AiAssistant::new(
            settings.openai_api_key.clone(),
            &settings.openai_base_url,
            &settings.openai_model,
        )?;
        if !assistant.is_configured() {
            log::warn!("OPENAI_API_KEY is not set; /api/llm will fail until it is");
        }
        let rate_limiter = RateLimiter::new(settings.llm_rate_limit, settings.llm_rate_window);

        Ok(AppData {
            pool: web::Data::new(pool),
            settings: web::Data::new(settings),
            file_manager: web::Data::new(file_manager),
            git: web::Data::new(git),
            assistant: web::Data::new(assistant),
            rate_limiter: web::Data::new(rate_limiter),
        })
    }

    /// Registers state, extractor configs, API routes and, when the
    /// frontend has been built, its static files.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.pool.clone())
            .app_data(self.settings.clone())
            .app_data(self.file_manager.clone())
            .app_data(self.git.clone())
            .app_data(self.assistant.clone())
            .app_data(self.rate_limiter.clone())
            .app_data(
                web::JsonConfig::default()
                    .limit(MAX_BODY_BYTES)
                    .error_handler(json_error_handler),
            )
            .app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler));

        handlers::init_routes(cfg);

        let static_dir = &self.settings.static_dir;
        if static_dir.is_dir() {
            cfg.service(Files::new("/", static_dir).index_file("index.html"));
        }
    }
}
