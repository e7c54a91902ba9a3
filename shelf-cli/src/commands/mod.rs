pub mod run;
pub mod schedule;
pub mod setup;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn home_dir() -> Result<PathBuf> {
    shelf_core::config::home().context("could not determine home directory")
}
