use clap::{Parser, Subcommand};
use stash_core::{CoreConfig, Registry};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "stash")]
#[command(about = "Stash file registry CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all registered files
    List,
    /// Show the file registered under an id
    Get {
        /// File id
        id: i64,
    },
    /// Store a local file in the upload directory
    Add {
        /// Path of the file to upload
        path: PathBuf,
    },
    /// Delete a file and its record
    Remove {
        /// File id
        id: i64,
    },
    /// Print the number of registered files
    Count,
    /// Report files without records and records without files
    Audit,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'stash --help' for commands");
        return Ok(());
    };

    let cfg = CoreConfig::from_env()?;
    let registry = Registry::open(Arc::new(cfg)).await?;

    match command {
        Commands::List => match registry.list().await {
            Ok(records) if records.is_empty() => println!("No files found."),
            Ok(records) => {
                for record in records {
                    println!("{}", record);
                }
            }
            Err(e) => eprintln!("Error listing files: {}", e),
        },
        Commands::Get { id } => match registry.get_by_id(id).await {
            Ok(record) => println!("{}", record),
            Err(e) => eprintln!("Error looking up file {}: {}", id, e),
        },
        Commands::Add { path } => {
            let raw_filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let content = std::fs::read(&path)?;
            match registry.add(&raw_filename, &content).await {
                Ok(record) => println!("Uploaded {}", record),
                Err(e) => eprintln!("Error uploading {}: {}", path.display(), e),
            }
        }
        Commands::Remove { id } => match registry.remove_by_id(id).await {
            Ok(()) => println!("Deleted file {}", id),
            Err(e) => eprintln!("Error deleting file {}: {}", id, e),
        },
        Commands::Count => match registry.count().await {
            Ok(count) => println!("{}", count),
            Err(e) => eprintln!("Error counting files: {}", e),
        },
        Commands::Audit => match registry.audit().await {
            Ok(audit) if audit.is_consistent() => println!("Registry is consistent."),
            Ok(audit) => {
                for name in &audit.untracked_files {
                    println!("untracked: {}", name);
                }
                for record in &audit.missing_files {
                    println!("missing:   {}", record);
                }
            }
            Err(e) => eprintln!("Error auditing registry: {}", e),
        },
    }

    registry.close().await;
    Ok(())
}
