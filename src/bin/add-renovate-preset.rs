// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use renovate_config::{
    config::Settings,
    hosting::GhCli,
    path::default_settings_file,
    pipeline::{Outcome, Pipeline, Request},
    preset::{Preset, PresetReference},
};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::ProgressBar;
use std::{path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Add a renovate-config preset to a GitHub repository.
///
/// Clones the repository, adds the preset to the `extends` array of its
/// Renovate configuration, pushes the change on a new branch, and opens a
/// pull request for it.
#[derive(Debug, Clone, Parser)]
#[command(
    about,
    long_about,
    override_usage = "add-renovate-preset [options] <owner> <repo>",
    version
)]
struct Cli {
    /// GitHub repository owner.
    #[arg(value_name = "owner")]
    pub owner: String,

    /// GitHub repository name.
    #[arg(value_name = "repo")]
    pub repo: String,

    /// Preset reference, or name of a preset from the catalog.
    #[arg(short, long, value_name = "reference", long_help = catalog_help())]
    pub preset: Option<String>,

    /// Do not create a pull request, just push the branch.
    #[arg(long)]
    pub no_pr: bool,

    /// Path to Renovate configuration file inside the repository.
    #[arg(short, long, value_name = "path")]
    pub file: Option<PathBuf>,

    /// Branch to commit the change on.
    #[arg(short, long, value_name = "branch")]
    pub branch: Option<String>,

    /// Settings file to use instead of the default one.
    #[arg(long, value_name = "path")]
    pub settings: Option<PathBuf>,
}

impl Cli {
    fn run(self) -> Result<()> {
        let settings_path = match self.settings {
            Some(path) => path,
            None => default_settings_file()?,
        };
        let settings = Settings::load(settings_path)?;

        let preset = match self.preset {
            Some(preset) => PresetReference::resolve(preset)?,
            None => settings.preset_reference()?,
        };
        let request = Request {
            owner: self.owner,
            repo: self.repo,
            preset,
            open_pull_request: !self.no_pr,
            config_path: self.file,
            branch: self.branch,
        };

        // INVARIANT: Scratch directory must outlive the pipeline run.
        let scratch;
        let workdir = match &settings.workdir {
            Some(workdir) => {
                mkdirp::mkdirp(workdir)
                    .with_context(|| format!("failed to create {:?}", workdir.display()))?;
                workdir.clone()
            }
            None => {
                scratch = tempfile::Builder::new()
                    .prefix("renovate-preset-")
                    .tempdir()
                    .context("failed to create scratch directory")?;
                scratch.path().to_path_buf()
            }
        };

        let pipeline = Pipeline::new(&settings, GhCli::new()).with_progress(ProgressBar::new(0));
        match pipeline.run(&request, workdir)? {
            Outcome::Unchanged { path } => {
                info!(
                    "no changes needed, {} already lists {}",
                    path.display(),
                    request.preset
                );
            }
            Outcome::Pushed {
                branch,
                compare_url,
            } => {
                info!("branch {branch} pushed successfully");
                info!("create a pull request at: {compare_url}");
            }
            Outcome::PullRequestSkipped {
                branch,
                compare_url,
                reason,
            } => {
                warn!("pull request skipped: {reason}");
                info!("branch {branch} has been pushed to the repository");
                info!("you can create a pull request manually at: {compare_url}");
            }
            Outcome::PullRequestOpened { url } => info!("pull request opened: {url}"),
        }

        info!("done!");
        Ok(())
    }
}

// Long help for `--preset`, listing what the catalog offers.
fn catalog_help() -> String {
    let mut help = String::from(
        "Preset reference, or name of a preset from the catalog.\n\nCatalog presets:",
    );
    for preset in Preset::ALL {
        help.push_str(&format!(
            "\n  {:<8} {} ({})",
            preset.name(),
            preset.reference(),
            preset.file_name()
        ));
        if let Some(description) = preset.description() {
            help.push_str(&format!("\n           {description}"));
        }
    }

    help
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}
