// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the settings file that tunes how presets are added
//! to target repositories. Every key is optional; anything left out falls
//! back to the defaults the tool ships with, so no settings file is needed at
//! all for the common case.
//!
//! # Example
//!
//! ```toml
//! preset = "base"
//! remote_url = "git@github.com:{owner}/{repo}.git"
//! workdir = "~/.cache/renovate-preset"
//!
//! [commit]
//! author_name = "Renovate Bot"
//! author_email = "bot@example.com"
//! ```

use crate::preset::PresetReference;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument};

/// Locations searched for a Renovate configuration file, in order.
pub const DEFAULT_LOCATIONS: [&str; 5] = [
    "renovate.json",
    ".github/renovate.json",
    ".gitlab/renovate.json",
    ".renovaterc.json",
    ".renovaterc",
];

/// Settings file layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Preset reference to add when none is given on the command line.
    pub preset: String,

    /// Clone URL template, with `{owner}` and `{repo}` placeholders.
    pub remote_url: String,

    /// Base URL of the code host web interface.
    pub web_url: String,

    /// Name of branch that carries the change.
    pub branch: String,

    /// Directory to clone into instead of a throwaway temporary directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,

    /// Relative paths searched for a Renovate configuration file.
    pub locations: Vec<String>,

    /// Commit settings.
    pub commit: CommitSettings,

    /// Pull request settings.
    pub pull_request: PullRequestSettings,
}

impl Settings {
    /// Load settings from file.
    ///
    /// A missing file is not an error, it just means defaults are used.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if settings file exists but cannot be
    ///   read.
    /// - Return [`ConfigError::Deserialize`] if settings file is malformed.
    /// - Return [`ConfigError::ShellExpansion`] if `workdir` refers to an
    ///   undefined environment variable.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no settings at {:?}, using defaults", path.display());
            return Ok(Self::default());
        }

        debug!("load settings from {:?}", path.display());
        read_to_string(path)
            .map_err(|err| ConfigError::Read {
                source: err,
                path: path.to_path_buf(),
            })?
            .parse()
    }

    /// Clone URL of target repository.
    pub fn remote_url_for(&self, owner: &str, repo: &str) -> String {
        self.remote_url
            .replace("{owner}", owner)
            .replace("{repo}", repo)
    }

    /// Preset reference to use when none is given on the command line.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Preset`] if configured preset is blank.
    pub fn preset_reference(&self) -> Result<PresetReference> {
        Ok(PresetReference::resolve(&self.preset)?)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preset: PresetReference::default().to_string(),
            remote_url: "https://github.com/{owner}/{repo}.git".into(),
            web_url: "https://github.com".into(),
            branch: "chore/add-renovate-config-preset".into(),
            workdir: None,
            locations: DEFAULT_LOCATIONS.map(String::from).to_vec(),
            commit: CommitSettings::default(),
            pull_request: PullRequestSettings::default(),
        }
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on workdir field.
        if let Some(workdir) = settings.workdir.take() {
            settings.workdir = Some(PathBuf::from(
                shellexpand::full(workdir.to_string_lossy().as_ref())
                    .map_err(ConfigError::ShellExpansion)?
                    .into_owned(),
            ));
        }

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Commit settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CommitSettings {
    /// Commit message.
    pub message: String,

    /// Author name, instead of the one from Git configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,

    /// Author email, instead of the one from Git configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
}

impl Default for CommitSettings {
    fn default() -> Self {
        Self {
            message: "chore: add renovate-config preset".into(),
            author_name: None,
            author_email: None,
        }
    }
}

/// Pull request settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PullRequestSettings {
    /// Pull request title.
    pub title: String,

    /// Pull request body. Occurrences of `{preset}` become the preset
    /// reference.
    pub body: String,
}

impl PullRequestSettings {
    /// Pull request body for given preset reference.
    pub fn body_for(&self, preset: &PresetReference) -> String {
        self.body.replace("{preset}", preset.as_str())
    }
}

impl Default for PullRequestSettings {
    fn default() -> Self {
        Self {
            title: "Add renovate-config preset".into(),
            body: concat!(
                "This PR adds the renovate-config preset to the repository's ",
                "Renovate configuration.\n",
                "\n",
                "The preset includes best practices and recommended configurations ",
                "for dependency updates.\n",
                "\n",
                "Changes:\n",
                "- Added `{preset}` to the `extends` configuration\n",
            )
            .into(),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read settings file.
    #[error("failed to read settings file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Configured preset reference is invalid.
    #[error(transparent)]
    Preset(#[from] crate::preset::PresetError),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("WORKROOT", "/home/blah/work")])]
    fn deserialize_partial_settings() -> anyhow::Result<()> {
        let result: Settings = r#"
            preset = "base"
            remote_url = "git@github.com:{owner}/{repo}.git"
            workdir = "$WORKROOT/renovate"

            [commit]
            author_name = "Renovate Bot"
            author_email = "bot@blah.org"
        "#
        .parse()?;

        let expect = Settings {
            preset: "base".into(),
            remote_url: "git@github.com:{owner}/{repo}.git".into(),
            workdir: Some(PathBuf::from("/home/blah/work/renovate")),
            commit: CommitSettings {
                author_name: Some("Renovate Bot".into()),
                author_email: Some("bot@blah.org".into()),
                ..CommitSettings::default()
            },
            ..Settings::default()
        };

        assert_eq!(result, expect);
        assert_eq!(
            result.preset_reference()?.as_str(),
            "github>lewtec/renovate-config:base"
        );

        Ok(())
    }

    #[test]
    fn serialized_defaults_parse_back() -> anyhow::Result<()> {
        let expect = Settings::default();
        let result: Settings = expect.to_string().parse()?;
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn malformed_settings_are_rejected() {
        let result = "locations = \"renovate.json\"".parse::<Settings>();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[sealed_test]
    fn missing_settings_file_means_defaults() -> anyhow::Result<()> {
        let result = Settings::load("missing.toml")?;
        assert_eq!(result, Settings::default());

        Ok(())
    }

    #[sealed_test]
    fn settings_file_is_loaded() -> anyhow::Result<()> {
        std::fs::write("settings.toml", "branch = \"renovate/preset\"\n")?;
        let result = Settings::load("settings.toml")?;
        assert_eq!(result.branch, "renovate/preset");
        assert_eq!(result.locations, DEFAULT_LOCATIONS.to_vec());

        Ok(())
    }

    #[test]
    fn remote_url_placeholders_are_filled() {
        let settings = Settings::default();
        assert_eq!(
            settings.remote_url_for("lewtec", "website"),
            "https://github.com/lewtec/website.git"
        );
    }

    #[test]
    fn pull_request_body_names_preset() {
        let body = PullRequestSettings::default().body_for(&PresetReference::default());
        assert!(body.contains(
            "- Added `github>lewtec/renovate-config:base` to the `extends` configuration"
        ));
    }
}
