use chessearn_core::auth::revocation::DEFAULT_RETENTION_DAYS;
use chessearn_core::models::auth::Role;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "chessearn", version, about = "ChessEarn administration tool")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct DatabaseArgs {
    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the version.
    Version,

    /// Delete revoked-token records older than the retention window.
    PruneRevoked {
        /// Records older than this many days are removed.
        #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS, value_parser = clap::value_parser!(i64).range(1..))]
        days: i64,

        #[command(flatten)]
        db: DatabaseArgs,
    },

    /// Change the role of an existing user.
    SetRole {
        /// Email, username or phone number of the user.
        #[arg(long)]
        identifier: String,

        /// admin, player or developer (case-insensitive).
        #[arg(long)]
        role: Role,

        #[command(flatten)]
        db: DatabaseArgs,
    },

    /// Apply pending database migrations.
    Migrate {
        #[command(flatten)]
        db: DatabaseArgs,
    },
}
