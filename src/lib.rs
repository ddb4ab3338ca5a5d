// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shareable Renovate presets, and the tooling to roll them out.
//!
//! This crate carries the preset catalog of `lewtec/renovate-config`, and
//! the machinery behind `add-renovate-preset`: a tool that clones a target
//! repository, adds a preset reference to the `extends` array of its Renovate
//! configuration, and proposes the change through a pull request.
//!
//! The heart of it is [`inject::inject`], a pure function that edits the
//! configuration text in place. It is idempotent, and leaves every byte it
//! does not need to touch exactly as it found it. Everything else is a thin,
//! sequential layer over Git and the GitHub CLI, see [`pipeline`].

pub mod config;
pub mod hosting;
pub mod inject;
pub mod path;
pub mod pipeline;
pub mod preset;
pub mod syscall;
pub mod workspace;
