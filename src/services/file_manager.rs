use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Directories never shown in the tree or searched.
pub const IGNORED_DIRS: &[&str] = &[".git", "node_modules"];

#[derive(Debug, Error)]
pub enum FileError {
    #[error("Path is outside the workspace: {0}")]
    PathOutsideWorkspace(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("File system error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

/// Sandboxed access to the workspace directory. Every caller-supplied path
/// goes through [`FileManager::resolve`] before touching the disk.
#[derive(Debug, Clone)]
pub struct FileManager {
    root: PathBuf,
}

impl FileManager {
    /// Creates the workspace root if needed and pins its canonical form.
    pub fn new(root: impl AsRef<Path>) -> Result<FileManager, FileError> {
        fs::create_dir_all(root.as_ref())?;
        let root = fs::canonicalize(root.as_ref())?;
        Ok(FileManager { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a workspace-relative path to an absolute one inside the root.
    ///
    /// A leading `/` is treated as the workspace root. Any `..` that climbs
    /// above the root is rejected, and so is an existing path whose canonical
    /// form (following symlinks) lands outside it.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, FileError> {
        if path.contains('\0') {
            return Err(FileError::InvalidPath(path.replace('\0', "\\0")));
        }

        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(path).components() {
            match component {
                Component::Prefix(_) => {
                    return Err(FileError::PathOutsideWorkspace(path.to_string()))
                }
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(FileError::PathOutsideWorkspace(path.to_string()));
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
            }
        }

        self.check_real_location(&resolved, path)?;
        Ok(resolved)
    }

    fn check_real_location(&self, resolved: &Path, original: &str) -> Result<(), FileError> {
        let mut probe = resolved;
        while fs::symlink_metadata(probe).is_err() {
            match probe.parent() {
                Some(parent) => probe = parent,
                None => return Err(FileError::PathOutsideWorkspace(original.to_string())),
            }
        }

        let real = fs::canonicalize(probe)
            .map_err(|_| FileError::PathOutsideWorkspace(original.to_string()))?;
        if real.starts_with(&self.root) {
            Ok(())
        } else {
            Err(FileError::PathOutsideWorkspace(original.to_string()))
        }
    }

    /// Workspace-relative form of an absolute path, `/`-separated.
    pub fn relative(&self, absolute: &Path) -> String {
        absolute
            .strip_prefix(&self.root)
            .unwrap_or(absolute)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    fn resolve_below_root(&self, path: &str) -> Result<PathBuf, FileError> {
        let resolved = self.resolve(path)?;
        if resolved == self.root {
            return Err(FileError::InvalidPath(String::from(
                "operation not allowed on the workspace root",
            )));
        }
        Ok(resolved)
    }

    pub fn read_file(&self, path: &str) -> Result<String, FileError> {
        let resolved = self.resolve(path)?;
        if !resolved.exists() {
            return Err(FileError::NotFound(path.to_string()));
        }
        if resolved.is_dir() {
            return Err(FileError::InvalidPath(format!("{} is a directory", path)));
        }
        Ok(fs::read_to_string(&resolved)?)
    }

    pub fn write_file(&self, path: &str, content: &str) -> Result<(), FileError> {
        let resolved = self.resolve_below_root(path)?;
        if resolved.is_dir() {
            return Err(FileError::InvalidPath(format!("{} is a directory", path)));
        }
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&resolved, content)?;
        log::debug!("wrote {} bytes to {}", content.len(), resolved.display());
        Ok(())
    }

    pub fn delete(&self, path: &str) -> Result<(), FileError> {
        let resolved = self.resolve_below_root(path)?;
        let metadata = match fs::symlink_metadata(&resolved) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FileError::NotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if metadata.is_dir() {
            fs::remove_dir_all(&resolved)?;
        } else {
            fs::remove_file(&resolved)?;
        }
        log::info!("deleted {}", resolved.display());
        Ok(())
    }

    pub fn create_folder(&self, path: &str) -> Result<(), FileError> {
        let resolved = self.resolve_below_root(path)?;
        if resolved.is_file() {
            return Err(FileError::InvalidPath(format!("{} is a file", path)));
        }
        fs::create_dir_all(&resolved)?;
        Ok(())
    }

    pub fn list_dir(&self, path: &str) -> Result<Vec<FileEntry>, FileError> {
        let resolved = self.resolve(path)?;
        if !resolved.exists() {
            return Err(FileError::NotFound(path.to_string()));
        }
        if !resolved.is_dir() {
            return Err(FileError::InvalidPath(format!("{} is not a directory", path)));
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&resolved)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            let kind = if metadata.is_dir() {
                FileKind::Directory
            } else {
                FileKind::File
            };
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: self.relative(&entry.path()),
                kind,
                size: if kind == FileKind::File { metadata.len() } else { 0 },
            });
        }
        entries.sort_by(|a, b| directories_first(a.kind, &a.name, b.kind, &b.name));
        Ok(entries)
    }

    /// Recursive listing of the whole workspace for the file tree panel.
    pub fn tree(&self) -> Result<Vec<FileNode>, FileError> {
        self.tree_under(&self.root)
    }

    fn tree_under(&self, dir: &Path) -> Result<Vec<FileNode>, FileError> {
        let mut nodes = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                if IGNORED_DIRS.contains(&name.as_str()) {
                    continue;
                }
                nodes.push(FileNode {
                    children: Some(self.tree_under(&entry.path())?),
                    name,
                    path: self.relative(&entry.path()),
                    kind: FileKind::Directory,
                });
            } else {
                nodes.push(FileNode {
                    name,
                    path: self.relative(&entry.path()),
                    kind: FileKind::File,
                    children: None,
                });
            }
        }
        nodes.sort_by(|a, b| directories_first(a.kind, &a.name, b.kind, &b.name));
        Ok(nodes)
    }
}

fn directories_first(a_kind: FileKind, a_name: &str, b_kind: FileKind, b_name: &str) -> Ordering {
    match (a_kind, b_kind) {
        (FileKind::Directory, FileKind::File) => Ordering::Less,
        (FileKind::File, FileKind::Directory) => Ordering::Greater,
        _ => a_name.to_lowercase().cmp(&b_name.to_lowercase()),
    }
}
