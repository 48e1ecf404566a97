use std::{fs, path::PathBuf};

use anyhow::Result;
use clap::Parser;
use log::info;

use inventory_tracker::{
    db::establish_pool,
    logging::init_logging,
    repo::device_repo::{new_device_repo, seed_sample_devices},
    server::{ServerConfig, run},
};

#[derive(Parser, Debug, Clone)]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
    /// SQLite db file path
    #[arg(long, env = "DB_PATH", default_value = "./inventory.db")]
    db_path: PathBuf,
    /// Directory with the static frontend assets
    #[arg(long, default_value = "public")]
    static_dir: PathBuf,
    /// Do not insert sample devices into an empty database
    #[arg(long, default_value_t = false)]
    no_seed: bool,
    /// Run migrations and exit (for testing/deployment)
    #[arg(long, default_value_t = false)]
    migrate_only: bool,
}

#[actix_web::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    if let Some(parent) = args.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let pool = establish_pool(&args.db_path)?;
    if args.migrate_only {
        info!("migrations applied, exiting due to --migrate-only flag");
        return Ok(());
    }
    let repo = new_device_repo(pool);
    if !args.no_seed {
        let inserted = seed_sample_devices(&repo)?;
        if inserted > 0 {
            info!("inserted {inserted} sample devices into empty database");
        }
    }

    let config = ServerConfig {
        addr: format!("0.0.0.0:{}", args.port),
        static_dir: args.static_dir,
    };
    run(config, repo).await
}
