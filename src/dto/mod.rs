pub mod file_dto;
pub mod git_dto;
pub mod project_dto;
pub mod user_dto;
