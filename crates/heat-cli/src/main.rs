mod cmd;
mod output;
mod paths;

use clap::{Parser, Subcommand};
use cmd::{competitor::CompetitorSubcommand, exercise::ExerciseSubcommand, lane::LaneSubcommand};
use heat_core::types::ExerciseType;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "heat",
    about = "Live heat/lane scheduling for multi-station competitions",
    version,
    propagate_version = true
)]
struct Cli {
    /// Competition database file (default: nearest heat.redb, else ./heat.redb)
    #[arg(long, global = true, env = "HEAT_DB")]
    db: Option<PathBuf>,

    /// Compatibility rules override file (default: built-in tables)
    #[arg(long, global = true, env = "HEAT_RULES")]
    rules: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the competition database and its lanes
    Init {
        /// Exercise name, e.g. "Bench finals"
        #[arg(long)]
        name: String,

        /// Exercise type: bench | kettle | airbike | rowing
        #[arg(long = "type")]
        exercise_type: ExerciseType,

        /// Number of lanes to create (types auto-cycled from the rules)
        #[arg(long, default_value_t = 0)]
        lanes: u32,
    },

    /// Show or update the exercise record
    Exercise {
        #[command(subcommand)]
        subcommand: ExerciseSubcommand,
    },

    /// Manage the competitor queue
    Competitor {
        #[command(subcommand)]
        subcommand: CompetitorSubcommand,
    },

    /// Manage lanes
    Lane {
        #[command(subcommand)]
        subcommand: LaneSubcommand,
    },

    /// Place one waiting competitor into the first compatible slot
    Fill { competitor_id: String },

    /// Fill all compatible empty slots from the waiting queue
    Autofill,

    /// Advance a single lane to the next round
    Clear { lane_id: u32 },

    /// Advance every unlocked non-empty lane
    NextRound,

    /// Re-insert a done competitor into a compatible slot
    Return { competitor_id: String },

    /// Undo the most recent action
    Undo,

    /// List the action journal, newest first
    History {
        /// Show every entry instead of the latest 20
        #[arg(long)]
        all: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let db = paths::resolve_db(cli.db.as_deref());
    let rules = cli.rules.as_deref();
    let json = cli.json;

    let result = match cli.command {
        Commands::Init {
            name,
            exercise_type,
            lanes,
        } => cmd::init::run(&db, rules, &name, exercise_type, lanes, json),
        Commands::Exercise { subcommand } => cmd::exercise::run(&db, subcommand, json),
        Commands::Competitor { subcommand } => cmd::competitor::run(&db, rules, subcommand, json),
        Commands::Lane { subcommand } => cmd::lane::run(&db, rules, subcommand, json),
        Commands::Fill { competitor_id } => cmd::actions::fill(&db, rules, &competitor_id, json),
        Commands::Autofill => cmd::actions::autofill(&db, rules, json),
        Commands::Clear { lane_id } => cmd::actions::clear(&db, rules, lane_id, json),
        Commands::NextRound => cmd::actions::next_round(&db, rules, json),
        Commands::Return { competitor_id } => {
            cmd::actions::return_done(&db, rules, &competitor_id, json)
        }
        Commands::Undo => cmd::actions::undo(&db, rules, json),
        Commands::History { all } => cmd::history::run(&db, all, json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
