use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use etcd_v2_client::config::{load_config, ClientConfig, ServerConfig};
use etcd_v2_client::keys::{KeyRequest, KeyResult};
use etcd_v2_client::observability::init_logging;
use etcd_v2_client::{EtcdClient, EtcdError};

#[derive(Parser)]
#[command(name = "keyctl")]
#[command(about = "Read and write keys on a key-value cluster", long_about = None)]
struct Cli {
    /// Primary server, `host:port` or `http://host:port` (repeatable)
    #[arg(short, long = "endpoint")]
    endpoints: Vec<String>,

    /// Secondary server, tried after every primary (repeatable)
    #[arg(long = "secondary")]
    secondaries: Vec<String>,

    /// TOML configuration file; endpoints given on the command line are added to it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not fail over to the next server after a connect failure
    #[arg(long, default_value_t = false)]
    no_retry: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a key or directory
    Get {
        key: String,

        #[arg(long, default_value_t = false)]
        consistent: bool,

        #[arg(short, long, default_value_t = false)]
        recursive: bool,

        #[arg(long, default_value_t = false)]
        sorted: bool,

        /// Block until the key changes
        #[arg(short, long, default_value_t = false)]
        wait: bool,

        /// Wait for the first change at or after this index
        #[arg(long)]
        wait_index: Option<u64>,
    },
    /// Create or update a key
    Set {
        key: String,

        value: Option<String>,

        /// Time to live in seconds
        #[arg(long)]
        ttl: Option<u64>,

        #[arg(long, default_value_t = false)]
        dir: bool,

        #[arg(long, default_value_t = false)]
        must_exist: bool,

        #[arg(long, default_value_t = false)]
        must_not_exist: bool,

        #[arg(long)]
        prev_value: Option<String>,

        #[arg(long)]
        prev_index: Option<u64>,

        /// Create an ordered key inside the directory KEY
        #[arg(long, default_value_t = false)]
        in_order: bool,
    },
    /// Remove a key or directory
    Rm {
        key: String,

        #[arg(long, default_value_t = false)]
        dir: bool,

        #[arg(short, long, default_value_t = false)]
        recursive: bool,

        #[arg(long)]
        prev_value: Option<String>,

        #[arg(long)]
        prev_index: Option<u64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };
    init_logging(&config.observability.log_level);

    let client = match EtcdClient::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    match run(&client, cli.command) {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_config(cli: &Cli) -> Result<ClientConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };

    let primaries = cli.endpoints.iter().map(|address| (address, true));
    let secondaries = cli.secondaries.iter().map(|address| (address, false));
    for (address, primary) in primaries.chain(secondaries) {
        config.servers.push(ServerConfig {
            address: address.clone(),
            primary,
        });
    }
    if config.servers.is_empty() {
        config.servers.push(ServerConfig {
            address: "127.0.0.1:4001".to_string(),
            primary: true,
        });
    }
    if cli.no_retry {
        config.dispatch.retry_on_connect_failure = false;
    }
    Ok(config)
}

fn run(client: &EtcdClient, command: Commands) -> Result<KeyResult, EtcdError> {
    match command {
        Commands::Get {
            key,
            consistent,
            recursive,
            sorted,
            wait,
            wait_index,
        } => {
            let mut request = client.get(&key);
            if consistent {
                request = request.consistent();
            }
            if recursive {
                request = request.recursive();
            }
            if sorted {
                request = request.sorted();
            }
            if wait {
                request = request.wait_for_change();
            }
            if let Some(index) = wait_index {
                request = request.wait_index(index);
            }
            request.send()
        }
        Commands::Set {
            key,
            value,
            ttl,
            dir,
            must_exist,
            must_not_exist,
            prev_value,
            prev_index,
            in_order,
        } => {
            let mut request = client.set(&key);
            if let Some(value) = value {
                request = request.value(value);
            }
            if let Some(secs) = ttl {
                request = request.time_to_live(Duration::from_secs(secs));
            }
            if dir {
                request = request.directory();
            }
            if must_exist {
                request = request.must_exist();
            }
            if must_not_exist {
                request = request.must_not_exist();
            }
            if let Some(value) = prev_value {
                request = request.previous_value(value);
            }
            if let Some(index) = prev_index {
                request = request.previous_index(index);
            }
            if in_order {
                request = request.in_order();
            }
            request.send()
        }
        Commands::Rm {
            key,
            dir,
            recursive,
            prev_value,
            prev_index,
        } => {
            let mut request = client.delete(&key);
            if dir {
                request = request.directory();
            }
            if recursive {
                request = request.recursive();
            }
            if let Some(value) = prev_value {
                request = request.previous_value(value);
            }
            if let Some(index) = prev_index {
                request = request.previous_index(index);
            }
            request.send()
        }
    }
}
