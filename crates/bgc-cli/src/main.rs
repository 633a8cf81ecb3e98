//! bgc - Command-line interface for the BGC annotation database.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use bgc_core::{BgcConfig, DatabaseConfig, DeletePolicy, NewHmmDatabase, Store};
use bgc_store::{SqliteStore, SCHEMA};

/// bgc - Biosynthetic gene cluster annotation database
#[derive(Parser)]
#[command(name = "bgc")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database path (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Config file (default: user config dir, then ./bgc.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Print the schema
    Schema,

    /// Show row counts per table
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a row and, with --cascade, everything depending on it
    Delete {
        #[command(subcommand)]
        target: DeleteTarget,

        /// Delete dependent rows instead of rejecting the delete
        #[arg(long, global = true)]
        cascade: bool,
    },

    /// Register an HMM database file, recording its MD5 checksum
    RegisterHmm {
        /// Path to the HMM file
        path: PathBuf,
    },

    /// Copy the database to a new file
    Snapshot {
        /// Output database path
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum DeleteTarget {
    /// Delete a genomic record
    Gbk { id: i64 },

    /// Delete a region
    Region { id: i64 },

    /// Delete an HMM database
    HmmDb { id: i64 },
}

impl DeleteTarget {
    fn table(&self) -> &'static str {
        match self {
            DeleteTarget::Gbk { .. } => "gbk",
            DeleteTarget::Region { .. } => "region",
            DeleteTarget::HmmDb { .. } => "hmm_db",
        }
    }

    fn id(&self) -> i64 {
        match *self {
            DeleteTarget::Gbk { id } | DeleteTarget::Region { id } | DeleteTarget::HmmDb { id } => id,
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(cli: &Cli) -> Result<DatabaseConfig, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => BgcConfig::load(path)?,
        None => BgcConfig::load_default()?,
    };

    let mut database = config.database;
    if let Some(path) = &cli.database {
        database.path = path.clone();
    }
    Ok(database)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Init => {
            init_database(&config)?;
        }
        Commands::Schema => {
            println!("{}", SCHEMA.trim());
        }
        Commands::Stats { json } => {
            let store = get_store(&config)?;
            stats(&store, json).await?;
        }
        Commands::Delete { target, cascade } => {
            if cascade {
                config.delete_policy = DeletePolicy::Cascade;
            }
            let store = get_store(&config)?;
            if let Err(e) = delete(&store, &target).await {
                eprintln!("Error [{}]: {}", e.error_code(), e);
                if store.delete_policy() == DeletePolicy::Restrict && e.constraint_kind().is_some()
                {
                    eprintln!(
                        "Rows still depend on {} {}; use --cascade to delete them too.",
                        target.table(),
                        target.id()
                    );
                }
                return Err(e.into());
            }
        }
        Commands::RegisterHmm { path } => {
            let store = get_store(&config)?;
            register_hmm(&store, &path).await?;
        }
        Commands::Snapshot { output } => {
            let store = get_store(&config)?;
            store.save_to_disk(&output)?;
            println!("Saved database to: {}", output.display());
        }
    }

    Ok(())
}

fn init_database(config: &DatabaseConfig) -> Result<(), Box<dyn std::error::Error>> {
    let _store = SqliteStore::open(&config.path, config)?;
    println!("Initialized database at: {}", config.path.display());
    Ok(())
}

fn get_store(config: &DatabaseConfig) -> Result<SqliteStore, Box<dyn std::error::Error>> {
    if !config.path.exists() {
        eprintln!(
            "Database {} does not exist. Run 'bgc init' first, or specify a path with -d.",
            config.path.display()
        );
        std::process::exit(1);
    }

    Ok(SqliteStore::open(&config.path, config)?)
}

async fn stats(store: &SqliteStore, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let counts = store.table_counts().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }

    println!("gbk              {:>10}", counts.gbk);
    println!("bgc_region       {:>10}", counts.bgc_region);
    println!("bgc_region_type  {:>10}", counts.bgc_region_type);
    println!("cds              {:>10}", counts.cds);
    println!("hsp              {:>10}", counts.hsp);
    println!("hsp_alignment    {:>10}", counts.hsp_alignment);
    println!("hmm              {:>10}", counts.hmm);
    println!("hmm_db           {:>10}", counts.hmm_db);
    println!("storage bytes    {:>10}", counts.storage_bytes);
    Ok(())
}

async fn delete(store: &SqliteStore, target: &DeleteTarget) -> bgc_core::Result<()> {
    match *target {
        DeleteTarget::Gbk { id } => store.delete_gbk(id).await?,
        DeleteTarget::Region { id } => store.delete_region(id).await?,
        DeleteTarget::HmmDb { id } => store.delete_hmm_db(id).await?,
    }

    println!("Deleted {} {}", target.table(), target.id());
    Ok(())
}

async fn register_hmm(store: &SqliteStore, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let hmm_db = NewHmmDatabase::from_file(path)?;

    if let Some(existing) = store.get_hmm_db_by_path(&hmm_db.path).await? {
        if existing.md5 == hmm_db.md5 {
            println!("Already registered as hmm_db {} ({})", existing.id, existing.md5);
            return Ok(());
        }
    }

    let id = store.insert_hmm_db(hmm_db.clone()).await?;
    println!("Registered {} as hmm_db {} ({})", hmm_db.path, id, hmm_db.md5);
    Ok(())
}
