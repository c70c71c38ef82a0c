//! treekv CLI
//!
//! Runs one command against a tree kept in a snapshot file. The tree is
//! loaded (or created empty), the command runs in a fresh session, and the
//! tree is written back. Leased keys therefore never outlive one invocation.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use treekv::{Client, Config, MemoryTree, Transaction, TxnOpResult};

/// treekv CLI
#[derive(Parser, Debug)]
#[command(name = "treekv-cli")]
#[command(about = "CLI for the treekv flat key-value store")]
#[command(version)]
struct Args {
    /// Snapshot file holding the tree between runs
    #[arg(short, long, default_value = "./treekv.snap")]
    snapshot: PathBuf,

    /// Namespace prefix all keys live under
    #[arg(short, long, default_value = "/treekv")]
    prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a key (its parent must exist)
    Create {
        key: String,
        value: String,

        /// Tie the key to the session (removed when the command exits)
        #[arg(long)]
        lease: bool,
    },

    /// Write a key, creating it if needed
    Set { key: String, value: String },

    /// Compare-and-set; version 0 creates
    Cas {
        key: String,
        value: String,
        version: u64,
    },

    /// Print version and value
    Get { key: String },

    /// Print the version, 0 if absent
    Exists { key: String },

    /// List direct children
    Children { key: String },

    /// Erase a key and its subtree
    Erase {
        key: String,

        /// Required version, 0 for unconditional
        #[arg(default_value = "0")]
        version: u64,
    },

    /// Commit a transaction
    ///
    /// Flag order on the command line is NOT preserved: checks run first,
    /// then every --create, then every --set, then every --erase. A
    /// transaction that must erase a key before recreating it cannot be
    /// expressed here.
    Commit {
        /// KEY=VERSION that must hold
        #[arg(long = "check", value_parser = parse_check)]
        checks: Vec<(String, u64)>,

        /// KEY=VALUE to create
        #[arg(long = "create", value_parser = parse_pair)]
        creates: Vec<(String, String)>,

        /// KEY=VALUE to overwrite
        #[arg(long = "set", value_parser = parse_pair)]
        sets: Vec<(String, String)>,

        /// KEY to erase
        #[arg(long = "erase")]
        erases: Vec<String>,
    },
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", s))
}

fn parse_check(s: &str) -> Result<(String, u64), String> {
    let (key, version) = parse_pair(s)?;
    let version = version
        .parse()
        .map_err(|e| format!("bad version in {:?}: {}", s, e))?;
    Ok((key, version))
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("Command failed: {}", e);
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> treekv::Result<()> {
    let tree = if args.snapshot.exists() {
        MemoryTree::load_snapshot(&args.snapshot)?
    } else {
        tracing::info!("No snapshot at {}, starting empty", args.snapshot.display());
        MemoryTree::new()
    };

    let config = Config::builder().prefix(&args.prefix).build();
    let client = Client::connect(&tree, config)?;

    match args.command {
        Commands::Create { key, value, lease } => {
            println!("{}", client.create(&key, value, lease)?);
        }
        Commands::Set { key, value } => {
            println!("{}", client.set(&key, value)?);
        }
        Commands::Cas { key, value, version } => {
            println!("{}", client.cas(&key, value, version)?);
        }
        Commands::Get { key } => {
            let (version, value, _) = client.get(&key, false)?;
            println!("{} {}", version, String::from_utf8_lossy(&value));
        }
        Commands::Exists { key } => {
            let (version, _) = client.exists(&key, false)?;
            println!("{}", version);
        }
        Commands::Children { key } => {
            let (children, _) = client.children(&key, false)?;
            for child in children {
                println!("{}", child);
            }
        }
        Commands::Erase { key, version } => {
            client.erase(&key, version)?;
        }
        Commands::Commit { checks, creates, sets, erases } => {
            let mut txn = Transaction::new();
            for (key, version) in checks {
                txn = txn.check(key, version);
            }
            for (key, value) in creates {
                txn = txn.create(key, value, false);
            }
            for (key, value) in sets {
                txn = txn.set(key, value);
            }
            for key in erases {
                txn = txn.erase(key);
            }

            for result in client.commit(&txn)? {
                match result {
                    TxnOpResult::Create(v) => println!("create {}", v),
                    TxnOpResult::Set(v) => println!("set {}", v),
                }
            }
        }
    }

    client.close();
    tree.save_snapshot(&args.snapshot)
}
