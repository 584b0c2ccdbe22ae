// Copyright 2026 steam-manifest contributors
// SPDX-License-Identifier: Apache-2.0

//! Steam manifest fetcher library.
//!
//! Exposes the acquisition engine and its collaborators for the binary and
//! for integration tests.

pub mod cli;
pub mod config;
pub mod engine;
pub mod fetch;
pub mod github;
pub mod steam_path;
pub mod steam_store;
pub mod vdf;
pub mod writer;
