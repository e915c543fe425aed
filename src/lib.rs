// Copyright 2026 Merchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Merchwatch library — resilient campaign-merch scrape pipeline.
//!
//! This library crate exposes the core modules for integration testing.

#![allow(
    dead_code,
    unused_imports,
    clippy::new_without_default,
    clippy::should_implement_trait
)]

pub mod browser;
pub mod cli;
pub mod config;
pub mod extract;
pub mod parse;
pub mod pool;
pub mod progress;
pub mod proxy;
pub mod record;
pub mod snapshot;
