// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use chessearn_core::auth::revocation::{PgRevocationLedger, RevocationLedger};
use chessearn_core::auth::store::{CredentialStore, PgCredentialStore};
use chessearn_core::models::auth::{Role, UserChanges};
use clap::Parser;
use cli::{Cli, Commands, DatabaseArgs};
use sqlx::PgPool;

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    logging::init()?;

    let args = Cli::parse();

    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::PruneRevoked { days, db } => {
            let removed = block_on(prune_revoked(&db, days))??;
            println!("{removed}");
        }
        Commands::SetRole {
            identifier,
            role,
            db,
        } => {
            block_on(set_role(&db, &identifier, role))??;
        }
        Commands::Migrate { db } => {
            block_on(migrate(&db))??;
        }
    }

    Ok(())
}

fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

async fn connect(db: &DatabaseArgs) -> Result<PgPool> {
    Ok(PgPool::connect(&db.database_url).await?)
}

async fn prune_revoked(db: &DatabaseArgs, days: i64) -> Result<u64> {
    let pool = connect(db).await?;
    let ledger = PgRevocationLedger::new(pool);
    let removed = ledger
        .prune_older_than(chrono::Duration::days(days))
        .await?;
    log::info!("removed {removed} revoked token(s) older than {days} day(s)");
    Ok(removed)
}

async fn set_role(db: &DatabaseArgs, identifier: &str, role: Role) -> Result<()> {
    let pool = connect(db).await?;
    let store = PgCredentialStore::new(pool);
    let user = store
        .find_by_identifier(identifier)
        .await?
        .ok_or_else(|| Error::Custom(format!("no user matches '{identifier}'")))?
        .user;
    let changes = UserChanges {
        role: Some(role),
        ..UserChanges::default()
    };
    store.update(&user.id, changes).await?;
    log::info!("{} is now {}", user.username, role.label());
    Ok(())
}

async fn migrate(db: &DatabaseArgs) -> Result<()> {
    let pool = connect(db).await?;
    chessearn_core::migrate::migrate(&pool).await?;
    log::info!("migrations applied");
    Ok(())
}
