use bucket_bloom_rs::common::{bytes2hr, display_bytes};
use bucket_bloom_rs::{
    Command, CommandAdapter, FilterConfigBuilder, KeyRegistry, Reply,
    lock_filter,
};
use clap::{Parser, Subcommand};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new, empty filter state file
    Create {
        /// Path to the state file
        #[arg(short, long)]
        state: PathBuf,

        /// Expected items per time bucket
        #[arg(short, long, default_value = "10000")]
        capacity: usize,

        /// False positive rate of one bucket (between 0 and 1)
        #[arg(short, long, default_value = "0.01")]
        fpr: f64,

        /// Number of retained time buckets
        #[arg(short, long, default_value = "16")]
        buckets: usize,

        /// Longest accepted item in bytes
        #[arg(long, default_value = "65536")]
        max_item_len: usize,
    },

    /// Load a filter state file and perform operations
    Load {
        /// Path to the state file
        #[arg(short, long)]
        state: PathBuf,

        #[command(subcommand)]
        operation: LoadCommands,
    },
}

#[derive(Subcommand)]
enum LoadCommands {
    /// Run a raw command, e.g. `exec BBF.ADD key item`
    Exec {
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Insert an item into a key's current bucket
    Add {
        #[arg(short, long)]
        key: String,
        #[arg(short, long)]
        item: String,
    },

    /// Check if an item exists in a key's live window
    Exists {
        #[arg(short, long)]
        key: String,
        #[arg(short, long)]
        item: String,
    },

    /// Advance a key's current time
    IncTime {
        #[arg(short, long)]
        key: String,
        #[arg(short, long, default_value = "1")]
        delta: u64,
    },

    /// Set a key's current time
    SetTime {
        #[arg(short, long)]
        key: String,
        #[arg(short, long, allow_negative_numbers = true)]
        time: i64,
    },

    /// Evict every item of one bucket
    ClrTime {
        #[arg(short, long)]
        key: String,
        #[arg(short, long, allow_negative_numbers = true)]
        bucket: i64,
    },

    /// List all keys
    Keys,

    /// Display configuration, or the buckets of one key
    Info {
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Remove a key (with confirmation)
    Remove {
        #[arg(short, long)]
        key: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Create {
            state,
            capacity,
            fpr,
            buckets,
            max_item_len,
        } => {
            if state.exists() {
                println!("Error: State file already exists at {}", state.display());
                println!("Use the 'load' command to operate on existing state.");
                return Ok(());
            }

            let config = FilterConfigBuilder::default()
                .capacity_per_bucket(*capacity)
                .false_positive_rate(*fpr)
                .num_buckets(*buckets)
                .max_item_len(*max_item_len)
                .build()?;
            let registry = KeyRegistry::new(config)?;
            registry.save_to_path(state)?;

            println!("Created new filter state at {}", state.display());
            println!("Configuration:");
            println!("  Capacity per bucket: {capacity}");
            println!("  False positive rate: {fpr}");
            println!("  Buckets: {buckets}");
            println!("  Max item length: {max_item_len} bytes");
        }
        Commands::Load { state, operation } => {
            handle_load_command(state, operation)?;
        }
    }

    Ok(())
}

fn handle_load_command(
    state: &Path,
    operation: &LoadCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(KeyRegistry::load_from_path(state)?);
    let adapter = CommandAdapter::new(Arc::clone(&registry));

    let command = match operation {
        LoadCommands::Exec { args } => {
            let args: Vec<Vec<u8>> =
                args.iter().map(|a| a.as_bytes().to_vec()).collect();
            Command::parse(&args)
        }
        LoadCommands::Add { key, item } => Ok(Command::Add {
            key: key.as_bytes().to_vec(),
            item: item.as_bytes().to_vec(),
        }),
        LoadCommands::Exists { key, item } => Ok(Command::Exists {
            key: key.as_bytes().to_vec(),
            item: item.as_bytes().to_vec(),
        }),
        LoadCommands::IncTime { key, delta } => Ok(Command::IncTime {
            key: key.as_bytes().to_vec(),
            delta: *delta,
        }),
        LoadCommands::SetTime { key, time } => Ok(Command::SetTime {
            key: key.as_bytes().to_vec(),
            time: *time,
        }),
        LoadCommands::ClrTime { key, bucket } => Ok(Command::ClearTime {
            key: key.as_bytes().to_vec(),
            bucket: *bucket,
        }),
        LoadCommands::Keys => {
            let keys = registry.keys()?;
            if keys.is_empty() {
                println!("(empty array)");
            }
            for (i, key) in keys.iter().enumerate() {
                println!("{}) \"{}\"", i + 1, display_bytes(key));
            }
            return Ok(());
        }
        LoadCommands::Info { key: None } => {
            print_registry_info(state, &registry)?;
            return Ok(());
        }
        LoadCommands::Info { key: Some(key) } => {
            print_key_info(&registry, key)?;
            return Ok(());
        }
        LoadCommands::Remove { key, force } => {
            if *force
                || confirm_action(&format!(
                    "Are you sure you want to remove key '{key}'?"
                ))
            {
                if registry.remove(key.as_bytes())? {
                    registry.save_to_path(state)?;
                    println!("Key '{key}' removed");
                } else {
                    println!("Key '{key}' does not exist");
                }
            } else {
                println!("Remove cancelled");
            }
            return Ok(());
        }
    };

    let reply = match command {
        Ok(command) => {
            let reply = match adapter.apply(&command) {
                Ok(reply) => reply,
                Err(e) => Reply::error(&e),
            };
            if command.is_write() && !reply.is_error() {
                registry.save_to_path(state)?;
            }
            reply
        }
        Err(e) => Reply::error(&e),
    };
    println!("{reply}");

    Ok(())
}

fn print_registry_info(
    state: &Path,
    registry: &KeyRegistry,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = registry.config();
    let params = config.params()?;

    println!("Bucket Bloom Filter Configuration:");
    println!("  State file: {}", state.display());
    println!("  Capacity per bucket: {}", config.capacity_per_bucket);
    println!("  False positive rate: {:.4}", config.false_positive_rate);
    println!("  Buckets: {}", config.num_buckets);
    println!("  Max item length: {} bytes", config.max_item_len);
    println!("  Bits per bucket: {}", params.bits_per_block);
    println!("  Number of hash functions: {}", params.num_hashes);
    println!(
        "  Memory per key: {}",
        bytes2hr(params.bytes_per_filter(config.num_buckets))
    );

    println!("\nCurrent State:");
    println!("  Keys: {}", registry.len()?);
    Ok(())
}

fn print_key_info(
    registry: &KeyRegistry,
    key: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(filter) = registry.get(key.as_bytes())? else {
        println!("Key '{key}' does not exist");
        return Ok(());
    };
    let info = lock_filter(&filter)?.info();

    println!("Filter '{key}':");
    println!("  Current time: {}", info.current_time);
    println!("  Window: [{}, {}]", info.window_start, info.current_time);
    println!("  Items inserted: {}", info.total_insert_count);
    println!("  Estimated false positive rate: {:.6}", info.estimated_fpr);
    println!("\nLive buckets:");
    if info.buckets.is_empty() {
        println!("  (none)");
    }
    for bucket in &info.buckets {
        println!(
            "  bucket {:>8}: {:>8} inserts, {:>6.2}% bits set",
            bucket.bucket,
            bucket.insert_count,
            bucket.fill_ratio * 100.0
        );
    }
    Ok(())
}

fn confirm_action(prompt: &str) -> bool {
    use std::io::{self, Write};

    print!("{prompt} [y/N]: ");
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    input.trim().to_lowercase() == "y"
}
