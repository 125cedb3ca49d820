// Command-line surface for the minutes projection core.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use rotation_core::model::{GameContext, PlayerId};

#[derive(Parser)]
#[command(name = "rotation")]
#[command(about = "Season profiles, minutes projections, and team rotations")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import per-game logs from CSV (defaults to data_paths.game_logs)
    ImportLogs { path: Option<PathBuf> },

    /// Replace rosters from CSV (defaults to data_paths.rosters)
    ImportRoster { path: Option<PathBuf> },

    /// Rebuild season profiles, for everyone or a single player
    Aggregate {
        #[arg(long)]
        season: Option<String>,

        #[arg(long, requires = "season")]
        player: Option<PlayerId>,
    },

    /// Print a stored season profile
    Profile {
        #[arg(long)]
        player: PlayerId,

        #[arg(long)]
        season: String,
    },

    /// Project minutes for one player in an upcoming game
    Project {
        #[arg(long)]
        player: PlayerId,

        #[arg(long)]
        team: String,

        #[arg(long)]
        season: String,

        #[command(flatten)]
        game: GameArgs,
    },

    /// Project a team's full rotation for an upcoming game
    Team {
        #[arg(long)]
        team: String,

        #[arg(long)]
        season: String,

        #[command(flatten)]
        game: GameArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct GameArgs {
    /// Home game
    #[arg(long)]
    pub home: bool,

    /// Days since the previous game (0 = back-to-back)
    #[arg(long, default_value = "1")]
    pub rest: u32,

    /// Injured teammates, comma separated player ids
    #[arg(long, value_delimiter = ',')]
    pub injured: Vec<PlayerId>,

    #[arg(long)]
    pub opponent: Option<String>,
}

impl GameArgs {
    pub fn to_context(&self) -> GameContext {
        let mut ctx = GameContext::new(self.home, self.rest).with_injured(self.injured.iter().copied());
        ctx.opponent_id = self.opponent.clone();
        ctx
    }
}
