use crate::cmd::{load_rules, open_db};
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use heat_core::engine::Engine;
use heat_core::types::{Category, CompetitorStatus};
use std::path::Path;

#[derive(Subcommand)]
pub enum CompetitorSubcommand {
    /// Add a waiting competitor at the back of the queue
    Add {
        name: String,
        /// Federation category code, e.g. h1 or n2.2
        #[arg(long)]
        category: Category,
    },
    /// List competitors
    List {
        /// Filter by status: waiting | lane | ready | done
        #[arg(long)]
        status: Option<CompetitorStatus>,
    },
    /// Retire a competitor from the waiting list (journaled, undoable)
    Remove { id: String },
    /// Explicitly reassign a competitor's queue rank
    Rerank { id: String, rank: i64 },
}

pub fn run(
    db_path: &Path,
    rules_path: Option<&Path>,
    subcmd: CompetitorSubcommand,
    json: bool,
) -> anyhow::Result<()> {
    match subcmd {
        CompetitorSubcommand::Add { name, category } => add(db_path, &name, category, json),
        CompetitorSubcommand::List { status } => list(db_path, status, json),
        CompetitorSubcommand::Remove { id } => remove(db_path, rules_path, &id, json),
        CompetitorSubcommand::Rerank { id, rank } => rerank(db_path, &id, rank, json),
    }
}

fn add(db_path: &Path, name: &str, category: Category, json: bool) -> anyhow::Result<()> {
    let db = open_db(db_path)?;
    let competitor = db
        .add_competitor(name, category)
        .context("failed to add competitor")?;

    if json {
        print_json(&competitor)?;
    } else {
        println!(
            "Added {} [{}] as #{} ({})",
            competitor.name, competitor.category, competitor.order_rank, competitor.id
        );
    }
    Ok(())
}

fn list(db_path: &Path, status: Option<CompetitorStatus>, json: bool) -> anyhow::Result<()> {
    let db = open_db(db_path)?;
    let snap = db.snapshot().context("failed to read competition")?;

    let mut competitors: Vec<_> = match status {
        Some(CompetitorStatus::Waiting) => snap.waiting().into_iter().cloned().collect(),
        Some(CompetitorStatus::Done) => snap.done().into_iter().cloned().collect(),
        Some(s) => snap
            .competitors
            .iter()
            .filter(|c| c.status == s)
            .cloned()
            .collect(),
        None => snap.competitors.clone(),
    };
    if status.is_none() {
        competitors.sort_by_key(|c| c.order_rank);
    }

    if json {
        print_json(&competitors)?;
        return Ok(());
    }

    if competitors.is_empty() {
        println!("No competitors.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = competitors
        .iter()
        .map(|c| {
            vec![
                c.id.clone(),
                c.name.clone(),
                c.category.to_string(),
                c.status.to_string(),
                c.order_rank.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "CATEGORY", "STATUS", "RANK"], &rows);
    Ok(())
}

fn remove(db_path: &Path, rules_path: Option<&Path>, id: &str, json: bool) -> anyhow::Result<()> {
    let db = open_db(db_path)?;
    let rules = load_rules(rules_path)?;
    let engine = Engine::new(&db, &rules);
    let record = engine
        .remove_competitor(id)
        .with_context(|| format!("failed to remove competitor '{id}'"))?;

    if json {
        print_json(&serde_json::json!({ "id": id, "action_seq": record.seq }))?;
    } else {
        println!("Removed competitor {id} (undo available)");
    }
    Ok(())
}

fn rerank(db_path: &Path, id: &str, rank: i64, json: bool) -> anyhow::Result<()> {
    let db = open_db(db_path)?;
    let competitor = db
        .set_order_rank(id, rank)
        .with_context(|| format!("failed to rerank competitor '{id}'"))?;

    if json {
        print_json(&competitor)?;
    } else {
        println!("{} is now #{}", competitor.name, competitor.order_rank);
    }
    Ok(())
}
