// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Preset setup pipeline.
//!
//! Adding a preset to a repository is a strictly sequential chain of steps:
//!
//! 1. Clone the target repository.
//! 2. Locate its Renovate configuration file.
//! 3. Inject the preset reference.
//! 4. Commit the result on a new branch.
//! 5. Push the branch.
//! 6. Open a pull request.
//!
//! Each step only runs if the previous one succeeded, and the first failure
//! aborts the rest. Nothing is rolled back: a pushed branch without a pull
//! request is reported as such, along with the page to open one by hand.
//!
//! If the preset is already listed, the pipeline stops right after step 3
//! without touching the remote at all.

use crate::{
    config::Settings,
    hosting::{compare_url, Availability, Hosting, PullRequest},
    inject::{inject, InjectError},
    preset::PresetReference,
    syscall::ToolError,
    workspace::{Workspace, WorkspaceError},
};

use indicatif::ProgressBar;
use std::path::{Component, Path, PathBuf};
use tracing::{info, instrument, warn};

/// What to set up, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Owner of target repository.
    pub owner: String,

    /// Name of target repository.
    pub repo: String,

    /// Preset to add.
    pub preset: PresetReference,

    /// Open a pull request after pushing.
    pub open_pull_request: bool,

    /// Explicit configuration file path, skipping the search.
    pub config_path: Option<PathBuf>,

    /// Explicit branch name, instead of the one from settings.
    pub branch: Option<String>,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Preset already listed, nothing was pushed.
    Unchanged { path: PathBuf },

    /// Branch pushed, pull request not requested.
    Pushed { branch: String, compare_url: String },

    /// Branch pushed, but pull request could not be opened.
    PullRequestSkipped {
        branch: String,
        compare_url: String,
        reason: String,
    },

    /// Branch pushed and pull request opened.
    PullRequestOpened { url: String },
}

/// Sequential preset setup pipeline.
#[derive(Debug)]
pub struct Pipeline<'s, H>
where
    H: Hosting,
{
    settings: &'s Settings,
    hosting: H,
    progress: ProgressBar,
}

impl<'s, H> Pipeline<'s, H>
where
    H: Hosting,
{
    /// Construct new pipeline.
    ///
    /// Clone progress is hidden until [`Pipeline::with_progress`] is given
    /// a visible progress bar.
    pub fn new(settings: &'s Settings, hosting: H) -> Self {
        Self {
            settings,
            hosting,
            progress: ProgressBar::hidden(),
        }
    }

    /// Display clone progress through given progress bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run pipeline, cloning target repository below `workdir`.
    ///
    /// The clone lands in a fresh directory that is removed once the run
    /// ends, so repeated runs can share the same `workdir`.
    ///
    /// # Errors
    ///
    /// - Return [`PipelineError::ConfigOutsideRepository`] if the explicit
    ///   configuration path is absolute or climbs out of the repository.
    /// - Return [`PipelineError::Scratch`] if no clone directory can be
    ///   created below `workdir`.
    /// - Return [`PipelineError::Workspace`] if cloning, reading, writing,
    ///   or committing fails.
    /// - Return [`PipelineError::ConfigNotFound`] if no configuration file
    ///   exists.
    /// - Return [`PipelineError::Inject`] if configuration file cannot be
    ///   updated.
    /// - Return [`PipelineError::Push`] if branch cannot be pushed.
    /// - Return [`PipelineError::PullRequest`] if pull request creation
    ///   fails after the branch was pushed.
    #[instrument(
        skip(self, request, workdir),
        fields(owner = %request.owner, repo = %request.repo)
    )]
    pub fn run(&self, request: &Request, workdir: impl AsRef<Path>) -> Result<Outcome> {
        if let Some(path) = &request.config_path {
            confine(path)?;
        }

        // INVARIANT: Every run clones into its own directory below workdir.
        let workdir = workdir.as_ref();
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{}-", request.repo))
            .tempdir_in(workdir)
            .map_err(|err| PipelineError::Scratch {
                source: err,
                path: workdir.to_path_buf(),
            })?;

        let url = self.settings.remote_url_for(&request.owner, &request.repo);
        let workspace = Workspace::try_clone(url, scratch.path(), self.progress.clone())?;

        let path = match &request.config_path {
            Some(path) => path.clone(),
            None => workspace
                .locate(&self.settings.locations)?
                .ok_or_else(|| PipelineError::ConfigNotFound {
                    searched: self.settings.locations.clone(),
                })?,
        };
        info!("found renovate config at {:?}", path.display());

        let base = workspace.default_branch()?;
        info!("default branch: {base}");

        let document = workspace.read(&path)?;
        let injection =
            inject(&document, request.preset.as_str()).map_err(|err| PipelineError::Inject {
                source: err,
                path: path.clone(),
            })?;
        if !injection.changed {
            info!("preset {} already exists in extends", request.preset);
            return Ok(Outcome::Unchanged { path });
        }

        let branch = request
            .branch
            .clone()
            .unwrap_or_else(|| self.settings.branch.clone());
        workspace.checkout_new_branch(&branch)?;
        workspace.write(&path, &injection.text)?;
        info!(
            "added {} to extends array\n{}",
            request.preset,
            workspace.diff(&path)?
        );

        workspace.stage_and_commit(&path, &self.settings.commit)?;
        workspace.push(&branch).map_err(|err| match err {
            WorkspaceError::Push(source) => PipelineError::Push {
                source,
                branch: branch.clone(),
            },
            err => PipelineError::Workspace(err),
        })?;

        let compare_url = compare_url(
            &self.settings.web_url,
            &request.owner,
            &request.repo,
            &base,
            &branch,
        );
        if !request.open_pull_request {
            return Ok(Outcome::Pushed {
                branch,
                compare_url,
            });
        }

        if let Availability::Unavailable(reason) = self.hosting.availability() {
            warn!("{reason}");
            return Ok(Outcome::PullRequestSkipped {
                branch,
                compare_url,
                reason,
            });
        }

        let body = self.settings.pull_request.body_for(&request.preset);
        let pull_request = PullRequest {
            owner: &request.owner,
            repo: &request.repo,
            base: &base,
            head: &branch,
            title: &self.settings.pull_request.title,
            body: &body,
            workdir: workspace.root()?,
        };
        match self.hosting.open_pull_request(&pull_request) {
            Ok(url) => Ok(Outcome::PullRequestOpened { url }),
            Err(source) => Err(PipelineError::PullRequest {
                source,
                branch,
                compare_url,
            }),
        }
    }
}

// Configuration path must name a file inside the working copy.
fn confine(path: &Path) -> Result<()> {
    let inside = path
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if !inside || path.as_os_str().is_empty() {
        return Err(PipelineError::ConfigOutsideRepository {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}

/// Pipeline error types.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// No configuration file at any searched location.
    #[error("no renovate configuration file found, looked for: {}", searched.join(", "))]
    ConfigNotFound { searched: Vec<String> },

    /// Explicit configuration path leaves the working copy.
    #[error("configuration path {:?} must be relative to the repository root", path.display())]
    ConfigOutsideRepository { path: PathBuf },

    /// Scratch directory for the clone cannot be created.
    #[error("failed to create scratch directory in {:?}", path.display())]
    Scratch {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration file cannot be updated.
    #[error("failed to update {:?}", path.display())]
    Inject {
        #[source]
        source: InjectError,
        path: PathBuf,
    },

    /// Branch cannot be pushed.
    #[error("failed to push branch {branch:?}")]
    Push {
        #[source]
        source: ToolError,
        branch: String,
    },

    /// Pull request cannot be opened, but branch was pushed.
    #[error(
        "failed to open pull request; branch {branch:?} has been pushed, \
         create a pull request manually at {compare_url}"
    )]
    PullRequest {
        #[source]
        source: ToolError,
        branch: String,
        compare_url: String,
    },

    /// Working copy operations fail.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

/// Friendly result alias :3
type Result<T, E = PipelineError> = std::result::Result<T, E>;
