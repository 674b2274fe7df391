//! tessera-node — operator entry point for the transaction store.
//!
//! The consensus engine and the query surfaces run out of process; this
//! binary owns the embedded ledger database. It recovers torn commits on
//! startup, writes the chain identity record, and reports store status.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use tessera_core::OperationRegistry;
use tessera_state::{LedgerStore, StateEngine};

#[derive(Parser, Debug)]
#[command(
    name = "tessera-node",
    version,
    about = "Tessera transaction core — ledger store and chain bookkeeping"
)]
struct Args {
    /// Directory for the persistent ledger database.
    #[arg(long, default_value = "~/.tessera/data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the chain identity record for a fresh ledger.
    InitChain {
        #[arg(long)]
        chain_id: String,
    },
    /// Print chain identity, latest block, and row counts.
    Status,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tessera=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let store = Arc::new(LedgerStore::open(&data_dir).context("opening ledger database")?);
    let registry = Arc::new(OperationRegistry::with_default_operations());
    let engine = StateEngine::new(Arc::clone(&store), registry);

    // Recover from a torn commit before reporting or mutating anything.
    engine.rollback().context("rolling back unfinalized block")?;

    match args.command {
        Command::InitChain { chain_id } => {
            engine.init_chain(&chain_id).context("storing chain record")?;
            info!(chain_id = %chain_id, "chain record written");
        }
        Command::Status => {
            match engine.load_abci_chain().context("reading chain record")? {
                Some(chain) => println!(
                    "chain:  {} (height {}, synced: {})",
                    chain.chain_id, chain.height, chain.is_synced
                ),
                None => println!("chain:  <uninitialized>"),
            }
            match store.latest_block().context("reading latest block")? {
                Some(block) => println!(
                    "block:  height {} with {} transaction(s)",
                    block.height,
                    block.transactions.len()
                ),
                None => println!("block:  <none committed>"),
            }
            println!(
                "rows:   {} transaction(s), {} unspent output(s)",
                store.count_transactions(),
                store.count_unspent_outputs()
            );
        }
    }
    Ok(())
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
