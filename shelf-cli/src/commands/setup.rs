//! `shelf setup`: write ~/.shelf/config.yaml from flags or prompts.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use shelf_core::{config, SyncConfig};

/// Arguments for `shelf setup`. With no flags, every field is prompted for.
#[derive(Args, Debug, Default)]
pub struct SetupArgs {
    /// GitHub personal access token with `repo` scope.
    #[arg(long)]
    pub token: Option<String>,

    /// Account that owns the target repository.
    #[arg(long)]
    pub owner: Option<String>,

    /// Target repository name.
    #[arg(long)]
    pub repo: Option<String>,

    /// Local directory to mirror.
    #[arg(long, value_name = "PATH")]
    pub library: Option<PathBuf>,

    /// Branch to commit to.
    #[arg(long)]
    pub branch: Option<String>,

    /// Create the repository as private if it does not exist yet.
    #[arg(long)]
    pub private: bool,
}

impl SetupArgs {
    fn any_flag(&self) -> bool {
        self.token.is_some()
            || self.owner.is_some()
            || self.repo.is_some()
            || self.library.is_some()
            || self.branch.is_some()
            || self.private
    }

    fn apply(self, config: &mut SyncConfig) {
        if let Some(token) = self.token {
            config.github_token = token;
        }
        if let Some(owner) = self.owner {
            config.owner = owner;
        }
        if let Some(repo) = self.repo {
            config.repo = repo;
        }
        if let Some(library) = self.library {
            config.library_path = library;
        }
        if let Some(branch) = self.branch {
            config.branch = branch;
        }
        if self.private {
            config.create_private = true;
        }
    }

    pub fn run(self, home: &Path) -> Result<ExitCode> {
        let mut config =
            config::load_or_default_at(home).context("failed to read existing configuration")?;

        if self.any_flag() {
            self.apply(&mut config);
        } else {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stdout();
            prompt_all(&mut config, &mut input, &mut output).context("failed to read answers")?;
        }

        let path = config::save_at(home, &config).context("failed to save configuration")?;
        println!("{} saved {}", "✓".green().bold(), path.display());

        match config.validate() {
            Ok(()) => println!("run `shelf run --dry-run` to preview the first sync"),
            Err(err) => println!("{} configuration incomplete: {err}", "!".yellow().bold()),
        }
        Ok(ExitCode::SUCCESS)
    }
}

/// Ask for each field, keeping the current value on an empty answer.
pub fn prompt_all(
    config: &mut SyncConfig,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> io::Result<()> {
    let masked = mask(&config.github_token);
    if let Some(token) = ask(input, output, "GitHub token", &masked)? {
        config.github_token = token;
    }
    if let Some(owner) = ask(input, output, "GitHub owner", &config.owner)? {
        config.owner = owner;
    }
    if let Some(repo) = ask(input, output, "Repository name", &config.repo)? {
        config.repo = repo;
    }
    let library = config.library_path.display().to_string();
    if let Some(path) = ask(input, output, "Library path", &library)? {
        config.library_path = PathBuf::from(path);
    }
    if let Some(branch) = ask(input, output, "Branch", &config.branch)? {
        config.branch = branch;
    }
    Ok(())
}

fn ask(
    input: &mut impl BufRead,
    output: &mut impl Write,
    label: &str,
    current: &str,
) -> io::Result<Option<String>> {
    if current.is_empty() {
        write!(output, "{label}: ")?;
    } else {
        write!(output, "{label} [{current}]: ")?;
    }
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();
    Ok((!answer.is_empty()).then(|| answer.to_string()))
}

fn mask(token: &str) -> String {
    let count = token.chars().count();
    if count == 0 {
        return String::new();
    }
    let tail: String = token.chars().skip(count.saturating_sub(4)).collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_answers_keep_current_values() {
        let mut config = SyncConfig {
            github_token: "ghp_abcdef1234".into(),
            owner: "octo".into(),
            repo: "library".into(),
            ..SyncConfig::default()
        };
        let mut input = Cursor::new("\nnew-owner\n\n/srv/code\n\n");
        let mut output = Vec::new();
        prompt_all(&mut config, &mut input, &mut output).unwrap();

        assert_eq!(config.github_token, "ghp_abcdef1234");
        assert_eq!(config.owner, "new-owner");
        assert_eq!(config.repo, "library");
        assert_eq!(config.library_path, PathBuf::from("/srv/code"));
        assert_eq!(config.branch, "main");

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("GitHub token [****1234]: "));
        assert!(!shown.contains("ghp_abcdef"));
    }

    #[test]
    fn end_of_input_keeps_everything() {
        let mut config = SyncConfig::default();
        let before = config.clone();
        prompt_all(&mut config, &mut Cursor::new(""), &mut Vec::new()).unwrap();
        assert_eq!(config, before);
    }

    #[test]
    fn flags_override_only_what_is_given() {
        let mut config = SyncConfig {
            owner: "octo".into(),
            ..SyncConfig::default()
        };
        SetupArgs {
            repo: Some("notes".into()),
            private: true,
            ..SetupArgs::default()
        }
        .apply(&mut config);
        assert_eq!(config.owner, "octo");
        assert_eq!(config.repo, "notes");
        assert!(config.create_private);
    }
}
