// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Code hosting integration.
//!
//! Opening a pull request is the only thing that needs the code host. It is
//! also the only optional step: if the host tooling is missing, the pushed
//! branch is still useful, and the user can open the pull request by hand
//! from the compare page.

use crate::syscall::{syscall_non_interactive, ToolError};

use std::{ffi::OsString, path::Path};
use tracing::{debug, instrument};

/// Pull request to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest<'a> {
    /// Owner of target repository.
    pub owner: &'a str,

    /// Name of target repository.
    pub repo: &'a str,

    /// Branch the change should be merged into.
    pub base: &'a str,

    /// Branch that carries the change.
    pub head: &'a str,

    /// Pull request title.
    pub title: &'a str,

    /// Pull request body.
    pub body: &'a str,

    /// Working copy of target repository.
    pub workdir: &'a Path,
}

/// Whether pull requests can be opened right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// Ready to open pull requests.
    Ready,

    /// Cannot open pull requests, with a hint for the user.
    Unavailable(String),
}

/// Layer of indirection for code host access.
pub trait Hosting {
    /// Check if pull requests can be opened.
    fn availability(&self) -> Availability;

    /// Open pull request and return its URL.
    fn open_pull_request(&self, request: &PullRequest<'_>) -> Result<String, ToolError>;
}

/// Code host access through the GitHub CLI.
#[derive(Debug, Clone)]
pub struct GhCli {
    program: OsString,
}

impl GhCli {
    /// Construct new GitHub CLI handle using `gh` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("gh")
    }

    /// Construct new GitHub CLI handle using a specific binary.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GhCli {
    fn default() -> Self {
        Self::new()
    }
}

impl Hosting for GhCli {
    /// Check that `gh` is installed and authenticated.
    #[instrument(skip(self), level = "debug")]
    fn availability(&self) -> Availability {
        match syscall_non_interactive(&self.program, ["--version"], None) {
            Ok(output) => debug!("{}", output.stdout),
            Err(ToolError::NotFound { .. }) => {
                return Availability::Unavailable(
                    "gh CLI not found in PATH. Please install it: https://cli.github.com/".into(),
                );
            }
            Err(err) => return Availability::Unavailable(format!("gh CLI is not usable: {err}")),
        }

        match syscall_non_interactive(&self.program, ["auth", "status"], None) {
            Ok(_) => Availability::Ready,
            Err(err) => {
                debug!("{err}");
                Availability::Unavailable(
                    "gh CLI is not authenticated. Please run: gh auth login".into(),
                )
            }
        }
    }

    #[instrument(skip(self, request), level = "debug")]
    fn open_pull_request(&self, request: &PullRequest<'_>) -> Result<String, ToolError> {
        let repository = format!("{}/{}", request.owner, request.repo);
        let output = syscall_non_interactive(
            &self.program,
            [
                "pr",
                "create",
                "--repo",
                repository.as_str(),
                "--title",
                request.title,
                "--body",
                request.body,
                "--base",
                request.base,
                "--head",
                request.head,
            ],
            Some(request.workdir),
        )?;

        Ok(output.stdout.trim().to_owned())
    }
}

/// Web page for comparing branch against base, used to open pull requests
/// by hand.
pub fn compare_url(web_url: &str, owner: &str, repo: &str, base: &str, head: &str) -> String {
    format!(
        "{}/{owner}/{repo}/compare/{base}...{head}",
        web_url.trim_end_matches('/')
    )
}
