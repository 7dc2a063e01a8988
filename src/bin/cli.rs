//! PathKV CLI Client
//!
//! Command-line interface for interacting with a PathKV server.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use pathkv::protocol::WriteOptions;
use pathkv::{Client, ClientConfig, Identity, Lookup, PathKvError, TcpConnector};
use serde_json::{json, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// PathKV CLI
#[derive(Parser, Debug)]
#[command(name = "pathkv-cli")]
#[command(about = "CLI for the PathKV data layer")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7878")]
    server: String,

    /// Workspace to operate in
    #[arg(short, long, default_value = "default")]
    workspace: String,

    /// Acting user id
    #[arg(short, long)]
    user: Option<String>,

    /// Per-call timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read the value at a path
    Get {
        /// Path to read
        path: String,
    },

    /// Write a JSON value at a path
    Set {
        /// Path to write
        path: String,

        /// JSON value (plain text is stored as a string)
        value: String,

        /// Fail unless the stored version equals this
        #[arg(long)]
        expected_version: Option<u64>,
    },

    /// List values under a path prefix
    Tree {
        /// Path prefix ("/" for the whole workspace)
        #[arg(default_value = "/")]
        prefix: String,

        /// Max items to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Cursor from a previous page
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Check server health
    Health,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();
    let config = ClientConfig::builder()
        .timeout(Duration::from_secs(args.timeout))
        .max_retries(1)
        .build();
    let client = Client::new(config, Arc::new(TcpConnector::new(&args.server)));

    let mut identity = Identity::new(&args.workspace);
    if let Some(user) = &args.user {
        identity = identity.with_user(user);
    }

    match run(&client, &identity, args.command) {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("error [{}]: {}", e.code(), e);
            std::process::exit(1);
        }
    }
}

fn run(client: &Client, identity: &Identity, command: Commands) -> Result<Value, PathKvError> {
    match command {
        Commands::Get { path } => Ok(match client.read(identity, &path)? {
            Lookup::Found { value, version } => json!({ "found": true, "value": value, "version": version }),
            Lookup::NotFound => json!({ "found": false, "value": null }),
        }),
        Commands::Set {
            path,
            value,
            expected_version,
        } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            let options = WriteOptions {
                expected_version,
                ..WriteOptions::default()
            };
            Ok(serde_json::to_value(client.write(identity, &path, value, options)?)?)
        }
        Commands::Tree { prefix, limit, cursor } => Ok(serde_json::to_value(client.read_tree(
            identity,
            &prefix,
            limit,
            cursor.as_deref(),
        )?)?),
        Commands::Health => Ok(serde_json::to_value(client.health_check()?)?),
    }
}
