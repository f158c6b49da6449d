use std::path::{Component, Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{
    BranchType, Commit, Cred, CredentialType, DiffFormat, DiffOptions, ErrorCode, FetchOptions,
    IndexAddOption, ObjectType, PushOptions, RemoteCallbacks, Repository, Signature, Sort, Status,
    StatusOptions,
};
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const MAX_HISTORY_LIMIT: usize = 500;

/// Stop answering credential prompts after this many attempts; libgit2
/// keeps asking as long as the callback returns something.
const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Workspace is not a git repository")]
    NotARepository,
    #[error("{0}")]
    Operation(String),
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    Typechange,
    Untracked,
    Conflicted,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileStatus {
    pub path: String,
    /// Staged change, if any.
    pub index: Option<ChangeKind>,
    /// Unstaged change, if any.
    pub worktree: Option<ChangeKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitStatus {
    pub branch: Option<String>,
    pub ahead: usize,
    pub behind: usize,
    pub files: Vec<FileStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchList {
    pub current: Option<String>,
    pub local: Vec<String>,
    pub remote: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitInfo {
    pub hash: String,
    pub short_hash: String,
    pub message: String,
    pub author: String,
    pub email: String,
    pub timestamp: i64,
}

impl CommitInfo {
    fn from_commit(commit: &Commit<'_>) -> CommitInfo {
        let hash = commit.id().to_string();
        let author = commit.author();
        CommitInfo {
            short_hash: hash.chars().take(7).collect(),
            hash,
            message: commit.message().unwrap_or_default().trim_end().to_string(),
            author: author.name().unwrap_or_default().to_string(),
            email: author.email().unwrap_or_default().to_string(),
            timestamp: commit.time().seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PullResult {
    pub branch: String,
    pub updated: bool,
    pub head: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushResult {
    pub remote: String,
    pub branch: String,
}

/// Git operations on the repository rooted at the workspace. The repository
/// is reopened for every call; callers run these on a blocking thread.
#[derive(Debug, Clone)]
pub struct GitManager {
    root: PathBuf,
    author_name: String,
    author_email: String,
}

impl GitManager {
    pub fn new(root: impl Into<PathBuf>, author_name: &str, author_email: &str) -> GitManager {
        GitManager {
            root: root.into(),
            author_name: author_name.to_string(),
            author_email: author_email.to_string(),
        }
    }

    /// Initializes a repository at the workspace root unless one exists.
    pub fn ensure_repository(&self) -> Result<(), GitError> {
        match Repository::open(&self.root) {
            Ok(_) => Ok(()),
            Err(e) if e.code() == ErrorCode::NotFound => {
                Repository::init(&self.root)?;
                log::info!("initialized git repository in {}", self.root.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn open(&self) -> Result<Repository, GitError> {
        Repository::open(&self.root).map_err(|e| match e.code() {
            ErrorCode::NotFound => GitError::NotARepository,
            _ => GitError::Git(e),
        })
    }

    pub fn status(&self) -> Result<GitStatus, GitError> {
        let repo = self.open()?;
        let branch = current_branch(&repo);

        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .renames_head_to_index(true);

        let statuses = repo.statuses(Some(&mut options))?;
        let files = statuses
            .iter()
            .filter_map(|entry| {
                let path = entry.path()?.to_string();
                let status = entry.status();
                Some(FileStatus {
                    path,
                    index: index_change(status),
                    worktree: worktree_change(status),
                })
            })
            .collect();

        let (ahead, behind) = ahead_behind(&repo).unwrap_or((0, 0));

        Ok(GitStatus {
            branch,
            ahead,
            behind,
            files,
        })
    }

    pub fn branches(&self) -> Result<BranchList, GitError> {
        let repo = self.open()?;
        let mut local = Vec::new();
        let mut remote = Vec::new();

        for item in repo.branches(None)? {
            let (branch, kind) = item?;
            let Some(name) = branch.name()?.map(String::from) else {
                continue;
            };
            match kind {
                BranchType::Local => local.push(name),
                BranchType::Remote if !name.ends_with("/HEAD") => remote.push(name),
                BranchType::Remote => {}
            }
        }
        local.sort();
        remote.sort();

        Ok(BranchList {
            current: current_branch(&repo),
            local,
            remote,
        })
    }

    pub fn stage(&self, paths: &[String]) -> Result<(), GitError> {
        let specs = pathspecs(paths)?;
        let repo = self.open()?;
        let mut index = repo.index()?;
        // add_all picks up new and modified files, update_all records deletions.
        index.add_all(specs.iter().map(String::as_str), IndexAddOption::DEFAULT, None)?;
        index.update_all(specs.iter().map(String::as_str), None)?;
        index.write()?;
        log::debug!("staged {:?}", specs);
        Ok(())
    }

    pub fn unstage(&self, paths: &[String]) -> Result<(), GitError> {
        let specs = pathspecs(paths)?;
        let repo = self.open()?;

        match head_commit(&repo) {
            Some(commit) => {
                repo.reset_default(Some(commit.as_object()), specs.iter().map(String::as_str))?
            }
            None => {
                let mut index = repo.index()?;
                index.remove_all(specs.iter().map(String::as_str), None)?;
                index.write()?;
            }
        }
        log::debug!("unstaged {:?}", specs);
        Ok(())
    }

    pub fn commit(&self, message: &str) -> Result<CommitInfo, GitError> {
        if message.trim().is_empty() {
            return Err(GitError::InvalidInput(String::from("Commit message is required")));
        }

        let repo = self.open()?;
        let mut index = repo.index()?;
        let tree_id = index.write_tree()?;
        let parent = head_commit(&repo);

        let nothing_staged = match &parent {
            Some(parent) => parent.tree_id() == tree_id,
            None => index.is_empty(),
        };
        if nothing_staged {
            return Err(GitError::InvalidInput(String::from("Nothing to commit")));
        }

        let tree = repo.find_tree(tree_id)?;
        let signature = repo
            .signature()
            .or_else(|_| Signature::now(&self.author_name, &self.author_email))?;
        let parents: Vec<&Commit<'_>> = parent.iter().collect();

        let oid = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        let commit = repo.find_commit(oid)?;
        log::info!("created commit {}", oid);
        Ok(CommitInfo::from_commit(&commit))
    }

    pub fn switch_branch(&self, name: &str) -> Result<(), GitError> {
        let repo = self.open()?;
        switch_to(&repo, name)
    }

    pub fn create_branch(&self, name: &str, checkout: bool) -> Result<(), GitError> {
        validate_branch_name(name)?;
        let repo = self.open()?;

        if repo.find_branch(name, BranchType::Local).is_ok() {
            return Err(GitError::InvalidInput(format!("Branch already exists: {}", name)));
        }
        let Some(target) = head_commit(&repo) else {
            return Err(GitError::InvalidInput(String::from(
                "Cannot create a branch before the first commit",
            )));
        };
        repo.branch(name, &target, false)?;
        log::info!("created branch {}", name);

        if checkout {
            switch_to(&repo, name)?;
        }
        Ok(())
    }

    /// Fetches `branch` from `remote` and fast-forwards the local branch of
    /// the same name. Diverged histories are reported as an error instead of
    /// merged. HEAD and the work tree move only when that branch is checked
    /// out.
    pub fn pull(&self, remote: Option<&str>, branch: Option<&str>) -> Result<PullResult, GitError> {
        let repo = self.open()?;
        let remote_name = remote.unwrap_or(DEFAULT_REMOTE);
        let branch = resolve_branch(&repo, branch)?;

        let mut remote = repo
            .find_remote(remote_name)
            .map_err(|_| GitError::InvalidInput(format!("Remote not found: {}", remote_name)))?;
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(credential_callbacks());
        remote.fetch(&[branch.as_str()], Some(&mut fetch_options), None)?;

        let fetch_head = repo.find_reference("FETCH_HEAD")?;
        let fetched = repo.reference_to_annotated_commit(&fetch_head)?.id();

        let refname = format!("refs/heads/{}", branch);
        let local_tip = repo.find_reference(&refname).ok().and_then(|r| r.target());
        if let Some(tip) = local_tip {
            if tip == fetched || repo.graph_descendant_of(tip, fetched)? {
                return Ok(PullResult {
                    branch,
                    updated: false,
                    head: Some(tip.to_string()),
                });
            }
            if !repo.graph_descendant_of(fetched, tip)? {
                return Err(GitError::Operation(String::from(
                    "Local and remote branches have diverged; only fast-forward pulls are supported",
                )));
            }
        }

        // The work tree only follows when the pulled branch is checked out.
        let checked_out = current_branch(&repo).as_deref() == Some(branch.as_str());
        if checked_out {
            let target = repo.find_object(fetched, Some(ObjectType::Commit))?;
            let mut checkout = CheckoutBuilder::new();
            checkout.safe();
            repo.checkout_tree(&target, Some(&mut checkout))?;
        }

        match repo.find_reference(&refname) {
            Ok(mut reference) => {
                reference.set_target(fetched, "pull: fast-forward")?;
            }
            Err(_) => {
                repo.reference(&refname, fetched, false, "pull: create branch")?;
            }
        }
        if checked_out {
            repo.set_head(&refname)?;
        }
        log::info!("fast-forwarded {} to {}", branch, fetched);

        Ok(PullResult {
            branch,
            updated: true,
            head: Some(fetched.to_string()),
        })
    }

    pub fn push(&self, remote: Option<&str>, branch: Option<&str>) -> Result<PushResult, GitError> {
        let repo = self.open()?;
        let remote_name = remote.unwrap_or(DEFAULT_REMOTE);
        let branch = resolve_branch(&repo, branch)?;
        let mut local = repo
            .find_branch(&branch, BranchType::Local)
            .map_err(|_| GitError::InvalidInput(format!("Branch not found: {}", branch)))?;

        let mut remote = repo
            .find_remote(remote_name)
            .map_err(|_| GitError::InvalidInput(format!("Remote not found: {}", remote_name)))?;
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch);

        let mut rejection: Option<String> = None;
        {
            let mut callbacks = credential_callbacks();
            callbacks.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    rejection = Some(format!("{}: {}", refname, message));
                }
                Ok(())
            });
            let mut push_options = PushOptions::new();
            push_options.remote_callbacks(callbacks);
            remote.push(&[refspec.as_str()], Some(&mut push_options))?;
        }
        if let Some(reason) = rejection {
            return Err(GitError::Operation(format!("Push rejected: {}", reason)));
        }

        if local.upstream().is_err() {
            let upstream = format!("{}/{}", remote_name, branch);
            if let Err(e) = local.set_upstream(Some(&upstream)) {
                log::warn!("could not set upstream {}: {}", upstream, e);
            }
        }
        log::info!("pushed {} to {}", branch, remote_name);

        Ok(PushResult {
            remote: remote_name.to_string(),
            branch,
        })
    }

    /// Unified diff of one path between HEAD and the working tree, staged
    /// changes included.
    pub fn diff(&self, path: &str) -> Result<String, GitError> {
        let spec = pathspec(path)?;
        let repo = self.open()?;
        let head_tree = repo.head().ok().and_then(|head| head.peel_to_tree().ok());

        let mut options = DiffOptions::new();
        options
            .pathspec(spec.as_str())
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .show_untracked_content(true);

        let diff = repo.diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut options))?;
        let mut out = String::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                out.push(line.origin());
            }
            out.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;
        Ok(out)
    }

    pub fn history(&self, limit: usize) -> Result<Vec<CommitInfo>, GitError> {
        let repo = self.open()?;
        if head_commit(&repo).is_none() {
            return Ok(Vec::new());
        }

        let mut revwalk = repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(Sort::TIME)?;

        let mut commits = Vec::new();
        for oid in revwalk.take(limit.clamp(1, MAX_HISTORY_LIMIT)) {
            let commit = repo.find_commit(oid?)?;
            commits.push(CommitInfo::from_commit(&commit));
        }
        Ok(commits)
    }
}

fn head_commit(repo: &Repository) -> Option<Commit<'_>> {
    repo.head().ok().and_then(|head| head.peel_to_commit().ok())
}

/// Name of the checked-out branch, including an unborn one. `None` when
/// HEAD is detached.
fn current_branch(repo: &Repository) -> Option<String> {
    match repo.head() {
        Ok(head) if head.is_branch() => head.shorthand().map(String::from),
        Ok(_) => None,
        Err(_) => repo.find_reference("HEAD").ok().and_then(|head| {
            head.symbolic_target()
                .map(|target| target.trim_start_matches("refs/heads/").to_string())
        }),
    }
}

fn resolve_branch(repo: &Repository, branch: Option<&str>) -> Result<String, GitError> {
    match branch {
        Some(name) => {
            validate_branch_name(name)?;
            Ok(name.to_string())
        }
        None => current_branch(repo)
            .ok_or_else(|| GitError::InvalidInput(String::from("HEAD is detached; name a branch"))),
    }
}

fn ahead_behind(repo: &Repository) -> Option<(usize, usize)> {
    let head = repo.head().ok()?;
    if !head.is_branch() {
        return None;
    }
    let local_oid = head.target()?;
    let branch = repo.find_branch(head.shorthand()?, BranchType::Local).ok()?;
    let upstream_oid = branch.upstream().ok()?.get().target()?;
    repo.graph_ahead_behind(local_oid, upstream_oid).ok()
}

fn switch_to(repo: &Repository, name: &str) -> Result<(), GitError> {
    validate_branch_name(name)?;
    let branch = match repo.find_branch(name, BranchType::Local) {
        Ok(branch) => branch,
        Err(_) => track_remote_branch(repo, name)?,
    };

    let reference = branch.into_reference();
    let refname = reference
        .name()
        .ok_or_else(|| GitError::Operation(format!("Branch name is not valid UTF-8: {}", name)))?
        .to_string();
    let target = reference.peel(ObjectType::Commit)?;

    let mut checkout = CheckoutBuilder::new();
    checkout.safe();
    repo.checkout_tree(&target, Some(&mut checkout))?;
    repo.set_head(&refname)?;
    log::info!("switched to {}", refname);
    Ok(())
}

/// Creates a local branch tracking `remote/name` when only the remote side
/// exists, e.g. switching to `origin/feature` creates `feature`.
fn track_remote_branch<'r>(repo: &'r Repository, name: &str) -> Result<git2::Branch<'r>, GitError> {
    let remote_branch = repo
        .find_branch(name, BranchType::Remote)
        .map_err(|_| GitError::InvalidInput(format!("Branch not found: {}", name)))?;
    let local_name = name.split_once('/').map(|(_, rest)| rest).unwrap_or(name);
    let commit = remote_branch.get().peel_to_commit()?;
    let mut local = repo.branch(local_name, &commit, false)?;
    local.set_upstream(Some(name))?;
    Ok(local)
}

fn validate_branch_name(name: &str) -> Result<(), GitError> {
    if name.trim().is_empty() || !git2::Branch::name_is_valid(name)? {
        return Err(GitError::InvalidInput(format!("Invalid branch name: {:?}", name)));
    }
    Ok(())
}

/// Converts a workspace path into a repository-relative pathspec, refusing
/// anything that climbs out of the workspace.
fn pathspec(path: &str) -> Result<String, GitError> {
    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(GitError::InvalidInput(format!(
                    "Path is outside the workspace: {}",
                    path
                )))
            }
        }
    }
    if parts.is_empty() {
        Ok(String::from("."))
    } else {
        Ok(parts.join("/"))
    }
}

fn pathspecs(paths: &[String]) -> Result<Vec<String>, GitError> {
    if paths.is_empty() {
        return Err(GitError::InvalidInput(String::from("At least one path is required")));
    }
    paths.iter().map(|p| pathspec(p)).collect()
}

fn index_change(status: Status) -> Option<ChangeKind> {
    if status.is_conflicted() {
        Some(ChangeKind::Conflicted)
    } else if status.is_index_new() {
        Some(ChangeKind::Added)
    } else if status.is_index_modified() {
        Some(ChangeKind::Modified)
    } else if status.is_index_deleted() {
        Some(ChangeKind::Deleted)
    } else if status.is_index_renamed() {
        Some(ChangeKind::Renamed)
    } else if status.is_index_typechange() {
        Some(ChangeKind::Typechange)
    } else {
        None
    }
}

fn worktree_change(status: Status) -> Option<ChangeKind> {
    if status.is_conflicted() {
        Some(ChangeKind::Conflicted)
    } else if status.is_wt_new() {
        Some(ChangeKind::Untracked)
    } else if status.is_wt_modified() {
        Some(ChangeKind::Modified)
    } else if status.is_wt_deleted() {
        Some(ChangeKind::Deleted)
    } else if status.is_wt_renamed() {
        Some(ChangeKind::Renamed)
    } else if status.is_wt_typechange() {
        Some(ChangeKind::Typechange)
    } else {
        None
    }
}

fn credential_callbacks<'a>() -> RemoteCallbacks<'a> {
    let mut attempts = 0;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("authentication failed"));
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            if let Some(username) = username {
                return Cred::ssh_key_from_agent(username);
            }
        }
        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            let config = git2::Config::open_default()?;
            return Cred::credential_helper(&config, url, username);
        }
        if allowed.contains(CredentialType::DEFAULT) {
            return Cred::default();
        }
        Err(git2::Error::from_str("no supported credential type"))
    });
    callbacks
}
