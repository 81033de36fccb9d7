pub mod actions;
pub mod competitor;
pub mod exercise;
pub mod history;
pub mod init;
pub mod lane;

use anyhow::Context;
use heat_core::rules::RuleSet;
use heat_core::store::CompetitionDb;
use std::path::Path;

/// Open an existing competition database.
pub fn open_db(path: &Path) -> anyhow::Result<CompetitionDb> {
    if !path.exists() {
        anyhow::bail!(
            "no competition database at {}: run 'heat init' first",
            path.display()
        );
    }
    CompetitionDb::open(path).with_context(|| format!("failed to open {}", path.display()))
}

/// Load the rule tables: an explicit override file, or the built-ins.
pub fn load_rules(path: Option<&Path>) -> anyhow::Result<RuleSet> {
    match path {
        Some(p) => RuleSet::load(p).with_context(|| format!("failed to load {}", p.display())),
        None => Ok(RuleSet::builtin()),
    }
}
