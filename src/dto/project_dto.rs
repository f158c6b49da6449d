use serde::{Deserialize, Serialize};

use crate::models::file::ProjectFile;
use crate::models::project::Project;

#[derive(Debug, Deserialize)]
pub struct NewProjectDTO {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveFileDTO {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetailDTO {
    #[serde(flatten)]
    pub project: Project,
    pub files: Vec<ProjectFile>,
}
