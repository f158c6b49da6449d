use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Read,
    Write,
    Delete,
    List,
}

#[derive(Debug, Deserialize)]
pub struct FileRequest {
    pub path: String,
    #[serde(default)]
    pub content: Option<String>,
    pub operation: FileOperation,
}

#[derive(Debug, Deserialize)]
pub struct FolderRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub case_sensitive: Option<bool>,
    #[serde(default)]
    pub max_results: Option<usize>,
}
