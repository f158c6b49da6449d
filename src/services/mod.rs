pub mod ai_assistant;
pub mod file_manager;
pub mod git_manager;
pub mod rate_limiter;
pub mod search;
