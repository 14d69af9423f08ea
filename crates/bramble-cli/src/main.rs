#![deny(unsafe_code)]

//! bramble CLI — daemon launcher and one-shot client.
//!
//! `bramble start` runs the master in the foreground; every other
//! subcommand is a single client transaction against a running master,
//! except `local`, which never talks to the master at all.

mod local;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bramble_config::AppConfig;
use bramble_core::{Master, MasterClient};

/// bramble — a multiset daemon backed by a tree of worker tasks.
#[derive(Parser)]
#[command(name = "bramble", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "bramble.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the master daemon in the foreground.
    Start,

    /// Stop the master and tear down the whole tree.
    Stop,

    /// Report how many elements the set holds (total and distinct).
    #[command(name = "howmany")]
    HowMany,

    /// Report the smallest value in the set.
    Min,

    /// Report the largest value in the set.
    Max,

    /// Is a value present, and in how many copies?
    #[command(allow_negative_numbers = true)]
    Exist { element: f32 },

    /// Report the sum of all values, duplicates counted.
    Sum,

    /// Insert one value.
    #[command(allow_negative_numbers = true)]
    Insert { element: f32 },

    /// Insert random values drawn uniformly from [lo, hi).
    #[command(name = "insertmany", allow_negative_numbers = true)]
    InsertMany { count: u32, lo: f32, hi: f32 },

    /// Ask every node to log its value (output lands in the master console).
    Print,

    /// Count copies of a value in a random array with local threads only.
    #[command(allow_negative_numbers = true)]
    Local {
        threads: usize,
        element: f32,
        count: usize,
        lo: f32,
        hi: f32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let config = load_config(&cli.config).await?;
    let client = MasterClient::new(&config.daemon.socket_path);

    match cli.command {
        Commands::Start => {
            info!("starting bramble master");
            Master::new(config).run().await?;
        }
        Commands::Stop => {
            client.stop().await?;
            println!("master stopped");
        }
        Commands::HowMany => {
            let (total, distinct) = client.how_many().await?;
            println!("{total} element(s), {distinct} distinct");
        }
        Commands::Min => match client.min().await? {
            Some(element) => println!("minimum: {element}"),
            None => println!("empty set: no minimum"),
        },
        Commands::Max => match client.max().await? {
            Some(element) => println!("maximum: {element}"),
            None => println!("empty set: no maximum"),
        },
        Commands::Exist { element } => match client.exist(element).await? {
            Some(count) => println!("element {element}: present in {count} copy(ies)"),
            None => println!("element {element}: absent"),
        },
        Commands::Sum => {
            let total = client.sum().await?;
            println!("sum of elements: {total}");
        }
        Commands::Insert { element } => {
            client.insert(element).await?;
            println!("insertion of element {element}: ok");
        }
        Commands::InsertMany { count, lo, hi } => {
            if count < 1 {
                anyhow::bail!("insertmany: count must be strictly positive");
            }
            if hi < lo {
                anyhow::bail!("insertmany: hi must not be less than lo");
            }
            let payload =
                bramble_core::rng::generate(count as usize, lo, hi, config.client.precision);
            client.insert_many(payload).await?;
            println!("insertion of {count} element(s): ok");
        }
        Commands::Print => {
            client.print().await?;
            println!("print ok (see master console)");
        }
        Commands::Local {
            threads,
            element,
            count,
            lo,
            hi,
        } => {
            if threads < 1 {
                anyhow::bail!("local: threads must be strictly positive");
            }
            if count < 1 {
                anyhow::bail!("local: count must be strictly positive");
            }
            if hi <= lo {
                anyhow::bail!("local: hi must be strictly greater than lo");
            }
            local::run(threads, element, count, lo, hi, config.client.precision)?;
        }
    }

    Ok(())
}

async fn load_config(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        AppConfig::load(path).await.map_err(|e| anyhow::anyhow!(e))
    } else {
        info!(path = %path.display(), "config file not found, using defaults");
        Ok(AppConfig::default())
    }
}
