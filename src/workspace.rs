// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Working copy of a target repository.
//!
//! A __workspace__ is a fresh clone of the repository whose Renovate
//! configuration is being updated. It lives only for the duration of one
//! run, and is owned exclusively by that run. All local work happens through
//! libgit2: cloning, locating the configuration file, branching, diffing,
//! and committing. Only the final push is handed to the `git` binary, so it
//! goes through whatever credential helpers the user has set up.

use crate::{
    config::CommitSettings,
    syscall::{syscall_non_interactive, ToolError},
};

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::RepoBuilder, Config, DiffFormat, DiffOptions, FetchOptions, Oid, RemoteCallbacks,
    Repository, Signature,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    time,
};
use tracing::{debug, info, instrument, warn};

/// Branch assumed when the remote does not advertise one.
pub const FALLBACK_BRANCH: &str = "main";

/// Working copy of target repository.
pub struct Workspace {
    repository: Repository,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Workspace")
            .field("path", &self.repository.path())
            .finish()
    }
}

impl Workspace {
    /// Clone target repository into a new working copy.
    ///
    /// The progress of the clone is displayed through a progress bar. If any
    /// credentials are required for the clone to continue, then the user will
    /// be prompted for that information accordingly. The progress bar will be
    /// blocked for user input.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Git2`] if libgit2 operations fail.
    /// - Return [`WorkspaceError::IndicatifStyleTemplate`] if progress bar
    ///   cannot be styled.
    #[instrument(skip(url, path, bar), level = "debug")]
    pub fn try_clone(
        url: impl AsRef<str>,
        path: impl AsRef<Path>,
        bar: ProgressBar,
    ) -> Result<Self> {
        let (url, path) = (url.as_ref(), path.as_ref());
        info!("clone {url} into {:?}", path.display());
        bar.set_style(ProgressStyle::with_template(
            "{spinner:.cyan} clone {msg} {pos}/{len} objects",
        )?);
        bar.set_message(url.to_owned());
        bar.enable_steady_tick(time::Duration::from_millis(120));

        let prompter = IndicatifPrompter::new(bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter);
        let git_config = Config::open_default()?;

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(authenticator.credentials(&git_config));
        callbacks.transfer_progress(|stats| {
            // INVARIANT: Resolved deltas count as well, so the bar keeps moving.
            bar.set_length((stats.total_objects() + stats.total_deltas()) as u64);
            bar.set_position((stats.received_objects() + stats.indexed_deltas()) as u64);
            true
        });

        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(callbacks);
        let repository = RepoBuilder::new().fetch_options(fetch).clone(url, path);
        bar.finish_and_clear();

        Ok(Self {
            repository: repository?,
        })
    }

    /// Absolute path to top-level of working copy.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Bare`] if repository has no working tree.
    pub fn root(&self) -> Result<&Path> {
        self.repository.workdir().ok_or(WorkspaceError::Bare)
    }

    /// Find first candidate path that exists in working copy.
    ///
    /// Candidates are relative to the top-level of the working copy, and are
    /// tried in order.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Bare`] if repository has no working tree.
    pub fn locate(
        &self,
        candidates: impl IntoIterator<Item = impl AsRef<Path>>,
    ) -> Result<Option<PathBuf>> {
        let root = self.root()?;
        for candidate in candidates {
            let candidate = candidate.as_ref();
            if root.join(candidate).is_file() {
                debug!("found {:?}", candidate.display());
                return Ok(Some(candidate.to_path_buf()));
            }
        }

        Ok(None)
    }

    /// Short name of branch that HEAD points to.
    ///
    /// Right after cloning this is the default branch of the remote. Falls
    /// back to [`FALLBACK_BRANCH`] if HEAD is detached.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Git2`] if HEAD cannot be read.
    pub fn default_branch(&self) -> Result<String> {
        let head = self.repository.find_reference("HEAD")?;
        let branch = head
            .symbolic_target()
            .and_then(|target| target.strip_prefix("refs/heads/"))
            .unwrap_or(FALLBACK_BRANCH);

        Ok(branch.to_owned())
    }

    /// Read file relative to top-level of working copy.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Read`] if file cannot be read.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<String> {
        let full_path = self.root()?.join(path.as_ref());
        read_to_string(&full_path).map_err(|err| WorkspaceError::Read {
            source: err,
            path: full_path,
        })
    }

    /// Write file relative to top-level of working copy.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Write`] if file cannot be written.
    pub fn write(&self, path: impl AsRef<Path>, contents: impl AsRef<str>) -> Result<()> {
        let full_path = self.root()?.join(path.as_ref());
        write(&full_path, contents.as_ref().as_bytes()).map_err(|err| WorkspaceError::Write {
            source: err,
            path: full_path,
        })
    }

    /// Create new branch at HEAD and switch to it.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Git2`] if branch already exists, or HEAD
    ///   has no commits.
    #[instrument(skip(self), level = "debug")]
    pub fn checkout_new_branch(&self, name: &str) -> Result<()> {
        info!("create branch {name}");
        let head = self.repository.head()?.peel_to_commit()?;
        let branch = self.repository.branch(name, &head, false)?;

        // INVARIANT: Branch tip equals HEAD, so the working tree needs no update.
        match branch.get().name() {
            Some(refname) => self.repository.set_head(refname)?,
            None => return Err(WorkspaceError::InvalidBranch(name.to_owned())),
        }

        Ok(())
    }

    /// Unstaged changes of a file as a patch.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Git2`] if diff cannot be computed.
    pub fn diff(&self, path: impl AsRef<Path>) -> Result<String> {
        let mut options = DiffOptions::new();
        options.pathspec(path.as_ref());
        let diff = self
            .repository
            .diff_index_to_workdir(None, Some(&mut options))?;

        let mut patch = String::new();
        diff.print(DiffFormat::Patch, |_, _, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                patch.push(line.origin());
            }
            patch.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;

        Ok(patch)
    }

    /// Stage file and commit it on top of HEAD.
    ///
    /// Uses the author from commit settings if both name and email are set,
    /// otherwise falls back to the author from Git configuration.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Git2`] if staging or committing fails, or no
    ///   author can be determined.
    #[instrument(skip(self, path, settings), level = "debug")]
    pub fn stage_and_commit(
        &self,
        path: impl AsRef<Path>,
        settings: &CommitSettings,
    ) -> Result<Oid> {
        // INVARIANT: Always use new tree produced by index after staging new entry.
        let mut index = self.repository.index()?;
        index.add_path(path.as_ref())?;
        index.write()?;
        let tree = self.repository.find_tree(index.write_tree()?)?;

        let signature = match (&settings.author_name, &settings.author_email) {
            (Some(name), Some(email)) => Signature::now(name, email)?,
            _ => self.repository.signature()?,
        };
        let parent = self.repository.head()?.peel_to_commit()?;

        // INVARIANT: Commit to HEAD by appending to current tip.
        let oid = self.repository.commit(
            Some("HEAD"),
            &signature,
            &signature,
            settings.message.as_str(),
            &tree,
            &[&parent],
        )?;
        info!("committed {oid}: {}", settings.message);

        Ok(oid)
    }

    /// Push branch to origin and set it as upstream.
    ///
    /// # Errors
    ///
    /// - Return [`WorkspaceError::Push`] if `git push` fails.
    #[instrument(skip(self), level = "debug")]
    pub fn push(&self, branch: &str) -> Result<()> {
        info!("push branch {branch}");
        let output = syscall_non_interactive(
            "git",
            ["push", "--set-upstream", "origin", branch],
            Some(self.root()?),
        )
        .map_err(WorkspaceError::Push)?;

        // INVARIANT: Git reports push progress on stderr.
        if !output.stderr.is_empty() {
            debug!("{}", output.stderr);
        }

        Ok(())
    }
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username")
                .prompt()
                .inspect_err(|err| warn!("username prompt failed: {err}"))
                .ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .inspect_err(|err| warn!("password prompt failed: {err}"))
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .inspect_err(|err| warn!("password prompt failed: {err}"))
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .inspect_err(|err| warn!("passphrase prompt failed: {err}"))
                .ok()
        })
    }
}

/// Workspace error types.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Repository was cloned without a working tree.
    #[error("repository has no working tree")]
    Bare,

    /// Branch name is not valid UTF-8.
    #[error("invalid branch name {0:?}")]
    InvalidBranch(String),

    /// File in working copy cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File in working copy cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Branch cannot be pushed.
    #[error("failed to push branch")]
    Push(#[source] ToolError),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
type Result<T, E = WorkspaceError> = std::result::Result<T, E>;
