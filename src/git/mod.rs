//! Git-backed upstream source
//!
//! The upstream package is published as tags of a git repository. This module
//! keeps a bare clone in the cache, refreshes its tags once per process and
//! reads the schema document straight out of each tagged tree; nothing is
//! ever checked out.
//!
//! Authentication is delegated to git's native system (see [`auth`]).

pub mod auth;
pub mod error;

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use git2::{AutotagOption, FetchOptions, RemoteCallbacks, Repository, build::RepoBuilder};
use tracing::{debug, info, warn};

use crate::artifact::UpstreamSource;
use crate::cache::{self, DiskCache};
use crate::error::{OverlayError, Result, artifact, git as git_error};

pub use auth::setup_auth_callbacks;
pub use error::interpret_git_error;

const TAG_REFSPEC: &str = "+refs/tags/*:refs/tags/*";

/// Convert SCP-style SSH URLs (git@host:path) to ssh:// form for libgit2
fn normalize_ssh_url(url: &str) -> Cow<'_, str> {
    if !url.starts_with("git@") {
        return Cow::Borrowed(url);
    }
    match url.split_once(':') {
        Some((host, path)) => {
            let path = path.trim_start_matches('/');
            Cow::Owned(format!("ssh://{host}/{path}"))
        }
        None => Cow::Borrowed(url),
    }
}

fn fetch_options<'cb>() -> FetchOptions<'cb> {
    let mut callbacks = RemoteCallbacks::new();
    setup_auth_callbacks(&mut callbacks);
    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks);
    options.download_tags(AutotagOption::All);
    options
}

/// Upstream releases as tags of a git repository
pub struct GitUpstream {
    url: String,
    schema_path: String,
    clone_dir: PathBuf,
    /// Opened (and refreshed) on first use in this process
    repo: Mutex<Option<Repository>>,
}

impl GitUpstream {
    pub fn new(
        url: impl Into<String>,
        schema_path: impl Into<String>,
        clone_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            url: url.into(),
            schema_path: schema_path.into(),
            clone_dir: clone_dir.into(),
            repo: Mutex::new(None),
        }
    }

    /// Upstream whose clone lives in the shared cache
    pub fn in_cache(url: &str, schema_path: &str, disk: &DiskCache) -> Self {
        let slug = cache::source_slug(&format!("git:{url}"));
        Self::new(url, schema_path, disk.repo_dir(&slug))
    }

    fn with_repo<T>(&self, f: impl FnOnce(&Repository) -> Result<T>) -> Result<T> {
        let mut guard = self.repo.lock().map_err(|_| OverlayError::GitOperationFailed {
            message: "upstream repository lock poisoned".to_string(),
        })?;
        if guard.is_none() {
            *guard = Some(self.open_or_clone()?);
        }
        match guard.as_ref() {
            Some(repo) => f(repo),
            None => Err(git_error::operation_failed("upstream repository unavailable")),
        }
    }

    fn open_or_clone(&self) -> Result<Repository> {
        if self.clone_dir.join("HEAD").exists() {
            let repo = Repository::open_bare(&self.clone_dir).map_err(|e| {
                git_error::operation_failed(format!(
                    "Failed to open {}: {}",
                    self.clone_dir.display(),
                    e.message()
                ))
            })?;
            // A stale clone still serves every tag it already has
            if let Err(err) = self.refresh(&repo) {
                warn!(url = %self.url, "could not refresh upstream tags: {}", err);
            }
            return Ok(repo);
        }

        if let Some(parent) = self.clone_dir.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                git_error::clone_failed(&self.url, format!("Failed to create cache directory: {e}"))
            })?;
        }

        info!(url = %self.url, "cloning upstream repository");
        let url = normalize_ssh_url(&self.url);
        let repo = RepoBuilder::new()
            .bare(true)
            .fetch_options(fetch_options())
            .clone(&url, &self.clone_dir)
            .map_err(|e| self.transport_error(&e, true))?;
        self.refresh(&repo)?;
        Ok(repo)
    }

    fn refresh(&self, repo: &Repository) -> Result<()> {
        debug!(url = %self.url, "refreshing upstream tags");
        let mut remote = repo
            .find_remote("origin")
            .or_else(|_| repo.remote_anonymous(&self.url))?;
        remote
            .fetch(&[TAG_REFSPEC], Some(&mut fetch_options()), None)
            .map_err(|e| self.transport_error(&e, false))
    }

    fn transport_error(&self, err: &git2::Error, cloning: bool) -> OverlayError {
        let reason = interpret_git_error(err);
        if error::classify(err).is_transient() {
            artifact::fetch_failed("*", 1, reason)
        } else if cloning {
            git_error::clone_failed(&self.url, reason)
        } else {
            git_error::operation_failed(reason)
        }
    }
}

impl UpstreamSource for GitUpstream {
    fn describe(&self) -> String {
        format!("git:{}", self.url)
    }

    fn fetch(&self, tag: &str) -> Result<Vec<u8>> {
        self.with_repo(|repo| {
            let reference = repo
                .find_reference(&format!("refs/tags/{tag}"))
                .map_err(|_| artifact::not_found(tag, self.describe()))?;
            let tree = reference.peel_to_tree().map_err(|e| {
                artifact::malformed(tag, format!("tag does not point to a tree: {}", e.message()))
            })?;
            let entry = tree.get_path(Path::new(&self.schema_path)).map_err(|_| {
                artifact::malformed(
                    tag,
                    format!("schema document {} is missing", self.schema_path),
                )
            })?;
            let blob = repo.find_blob(entry.id()).map_err(|e| {
                artifact::malformed(
                    tag,
                    format!("{} is not a file: {}", self.schema_path, e.message()),
                )
            })?;
            Ok(blob.content().to_vec())
        })
        .map_err(|err| match err {
            OverlayError::FetchFailed {
                attempts, reason, ..
            } => artifact::fetch_failed(tag, attempts, reason),
            other => other,
        })
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        self.with_repo(|repo| {
            let names = repo.tag_names(None)?;
            let mut tags: Vec<String> = names.iter().flatten().map(str::to_string).collect();
            crate::artifact::sort_tags(&mut tags);
            Ok(tags)
        })
    }
}
