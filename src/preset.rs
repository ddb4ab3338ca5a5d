// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Preset catalog.
//!
//! This repository doubles as a Renovate preset source. Each preset is a
//! static JSON document at the top-level of the repository, so Renovate can
//! resolve `github>lewtec/renovate-config:<name>` to `<name>.json` without
//! any help. The documents are embedded here so the setup tool always knows
//! which presets exist.
//!
//! # Preset References
//!
//! A __preset reference__ names a preset by host, repository, and preset
//! name, e.g., `github>lewtec/renovate-config:base`. Leaving the preset
//! name off means `default`. Outside of this catalog references are opaque
//! strings, and two references only match if they are identical.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Repository that hosts the catalog.
pub const CATALOG_REPOSITORY: &str = "lewtec/renovate-config";

/// Host scheme Renovate uses to fetch presets from GitHub.
pub const CATALOG_HOST: &str = "github";

/// Named preset shipped by this repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Preset used when a reference leaves out the preset name.
    Default,

    /// Shared baseline configuration.
    Base,
}

impl Preset {
    /// Every preset in the catalog.
    pub const ALL: [Preset; 2] = [Preset::Default, Preset::Base];

    /// Name of preset as used in a reference.
    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Base => "base",
        }
    }

    /// File name of preset document at the top-level of the repository.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Default => "default.json",
            Self::Base => "base.json",
        }
    }

    /// Raw JSON document of preset.
    pub fn document(self) -> &'static str {
        match self {
            Self::Default => include_str!("../default.json"),
            Self::Base => include_str!("../base.json"),
        }
    }

    /// Human readable summary from the `description` field of the document.
    pub fn description(self) -> Option<String> {
        let document: serde_json::Value = serde_json::from_str(self.document()).ok()?;
        document.get("description")?.as_str().map(str::to_owned)
    }

    /// Full reference to preset.
    pub fn reference(self) -> PresetReference {
        match self {
            Self::Default => PresetReference(format!("{CATALOG_HOST}>{CATALOG_REPOSITORY}")),
            Self::Base => PresetReference(format!(
                "{CATALOG_HOST}>{CATALOG_REPOSITORY}:{}",
                self.name()
            )),
        }
    }

    /// Look up preset by its name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.name() == name)
    }
}

impl Display for Preset {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.name())
    }
}

/// Reference to a Renovate preset.
///
/// # Invariant
///
/// - Never empty.
/// - No surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresetReference(String);

impl PresetReference {
    /// Resolve user input into a preset reference.
    ///
    /// Bare catalog names like `base` expand to their full reference. Any
    /// other input is taken verbatim.
    ///
    /// # Errors
    ///
    /// - Return [`PresetError::Empty`] if input is blank.
    pub fn resolve(input: impl AsRef<str>) -> Result<Self> {
        let input = input.as_ref().trim();
        match Preset::from_name(input) {
            Some(preset) => Ok(preset.reference()),
            None => input.parse(),
        }
    }

    /// Treat reference as string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for PresetReference {
    fn default() -> Self {
        Preset::Base.reference()
    }
}

impl FromStr for PresetReference {
    type Err = PresetError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let data = data.trim();
        if data.is_empty() {
            return Err(PresetError::Empty);
        }

        Ok(Self(data.to_owned()))
    }
}

impl Display for PresetReference {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

impl AsRef<str> for PresetReference {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Preset reference error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresetError {
    /// Reference contains nothing but whitespace.
    #[error("preset reference cannot be empty")]
    Empty,
}

/// Friendly result alias :3
type Result<T, E = PresetError> = std::result::Result<T, E>;
