//! FileGate CLI
//!
//! One address space over local directories and rclone remotes.

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use filegate::config::Config;
use filegate::fs::{FsPath, PathResolver};
use filegate::zip::{ZipJob, ZipStreamer};
use filegate::FileEntry;
use rclone::Rclone;

/// FileGate - browse, read, and archive local and rclone-backed files.
#[derive(Parser, Debug)]
#[command(name = "filegate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List a directory, local or remote
    Ls {
        /// Path to list ("/var/data" or "remote:/path")
        path: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show a path's type and MIME information
    Stat {
        /// Path to inspect
        path: String,
    },

    /// Stream a file's raw bytes to standard output
    Cat {
        /// Path to read
        path: String,
    },

    /// Write a local file's full contents
    Write {
        /// Destination path
        path: String,

        /// Content to write; read from standard input when omitted
        content: Option<String>,
    },

    /// Create a local directory
    Mkdir {
        /// Directory to create
        path: String,
    },

    /// Create an empty local file if it does not exist
    Touch {
        /// File to create
        path: String,
    },

    /// Upload a file into the gated tree
    Put {
        /// Source file on this machine
        source: PathBuf,

        /// Destination path
        dest: String,
    },

    /// Download a directory as a zip archive
    Zip {
        /// Directory to archive
        path: String,

        /// Output file (defaults to <name>.zip; "-" streams to stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// List the remotes rclone is configured with
    Remotes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    // Apply environment variable overrides
    config.apply_env_overrides();

    // Validate configuration
    config.validate()?;

    // Initialize tracing. Logs go to stderr so `cat` and `zip -o -` can
    // own stdout; RUST_LOG overrides both the flag and the config level.
    let default_filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.log.level.clone()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let resolver = PathResolver::from_config(&config);

    // Handle commands
    match cli.command {
        Commands::Ls { path, json } => {
            let target = resolver.resolve(&path);
            match target.list().await {
                Ok(mut entries) => {
                    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then(a.name.cmp(&b.name)));
                    if json {
                        println!("{}", serde_json::to_string_pretty(&entries)?);
                    } else {
                        print_listing_table(&entries);
                    }
                }
                Err(e) => {
                    eprintln!("Failed to list {}: {}", target, e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Stat { path } => {
            let target = resolver.resolve(&path);
            let is_dir = match target.is_directory().await {
                Ok(is_dir) => is_dir,
                Err(e) => {
                    eprintln!("Failed to stat {}: {}", target, e);
                    std::process::exit(1);
                }
            };
            let mime = match target.mime_type().await {
                Ok(mime) => mime,
                Err(e) => {
                    eprintln!("Failed to stat {}: {}", target, e);
                    std::process::exit(1);
                }
            };
            println!("Path:       {}", target);
            println!("Directory:  {}", if is_dir { "yes" } else { "no" });
            println!("MIME type:  {}", mime);
            let preview = filegate::mime::preview_safe(&mime);
            if preview != mime {
                println!("Preview as: {}", preview);
            }
        }
        Commands::Cat { path } => {
            let target = resolver.resolve(&path);
            if let Err(e) = cat_path(&target).await {
                eprintln!("Failed to read {}: {}", target, e);
                std::process::exit(1);
            }
        }
        Commands::Write { path, content } => {
            let bytes = match content {
                Some(content) => content.into_bytes(),
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin()
                        .read_to_end(&mut buf)
                        .context("Failed to read standard input")?;
                    buf
                }
            };
            let target = resolver.resolve(&path);
            match target.write(&bytes) {
                Ok(()) => println!("Wrote {} bytes to {}", bytes.len(), target),
                Err(e) => {
                    eprintln!("Failed to write {}: {}", target, e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Mkdir { path } => {
            let target = resolver.resolve(&path);
            match target.mkdir() {
                Ok(()) => println!("Created {}", target),
                Err(e) => {
                    eprintln!("Failed to create {}: {}", target, e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Touch { path } => {
            let target = resolver.resolve(&path);
            match target.touch() {
                Ok(()) => println!("Touched {}", target),
                Err(e) => {
                    eprintln!("Failed to touch {}: {}", target, e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Put { source, dest } => {
            let target = resolver.resolve(&dest);
            let mut file = std::fs::File::open(&source)
                .with_context(|| format!("Failed to open source file: {}", source.display()))?;
            match target.handle_upload(&mut file) {
                Ok(written) => println!("Uploaded {} bytes to {}", written, target),
                Err(e) => {
                    eprintln!("Failed to upload to {}: {}", target, e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Zip { path, output } => {
            let target = resolver.resolve(&path);

            let (ok, reason) = target.can_download_as_zip(&config.download).await;
            if !ok {
                eprintln!(
                    "Cannot archive {}: {}",
                    target,
                    reason.unwrap_or_else(|| "rejected".to_string())
                );
                std::process::exit(1);
            }

            let entries = match target.files_to_zip().await {
                Ok(entries) => entries,
                Err(e) => {
                    eprintln!("Failed to enumerate {}: {}", target, e);
                    std::process::exit(1);
                }
            };

            let output = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "{}.zip",
                    target.base_name().unwrap_or_else(|| "archive".to_string())
                ))
            });
            let job = ZipJob {
                root: target,
                entries,
            };
            let streamer = ZipStreamer::new();

            let result = if output.as_os_str() == "-" {
                streamer.stream(&job, std::io::stdout()).await
            } else {
                let file = std::fs::File::create(&output).with_context(|| {
                    format!("Failed to create output file: {}", output.display())
                })?;
                streamer.stream(&job, file).await
            };

            match result {
                Ok(summary) => {
                    if output.as_os_str() != "-" {
                        println!(
                            "Wrote {} ({} entries, {} skipped)",
                            output.display(),
                            summary.written,
                            summary.skipped
                        );
                    }
                }
                Err(e) => {
                    eprintln!("Failed to archive {}: {}", job.root, e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Remotes => {
            let rclone = Rclone::with_command(&config.rclone.command)
                .low_level_retries(config.rclone.low_level_retries);
            match rclone.remotes().await {
                Ok(remotes) => print_remotes_table(&remotes),
                Err(e) => {
                    eprintln!("Failed to list remotes: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/// Stream a file's bytes to stdout without buffering the whole file.
async fn cat_path(path: &FsPath) -> filegate::Result<()> {
    match path {
        FsPath::Local(local) => {
            let mut file = local.open()?;
            let mut stdout = std::io::stdout().lock();
            std::io::copy(&mut file, &mut stdout)?;
            stdout.flush()?;
        }
        FsPath::Remote(remote) => {
            let mut source = remote.read_stream().await?;
            let mut stdout = std::io::stdout();
            while let Some(chunk) = source.next_chunk().await? {
                stdout.write_all(&chunk)?;
            }
            source.finish().await?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Print directory entries in a formatted ASCII table.
fn print_listing_table(entries: &[FileEntry]) {
    if entries.is_empty() {
        println!("Empty directory.");
        return;
    }

    // Calculate the name column width
    let name_width = entries
        .iter()
        .map(|e| e.name.len() + if e.is_dir { 1 } else { 0 })
        .max()
        .unwrap_or(4)
        .max(4);

    println!(
        "{:<name_width$}  {:>12}  {:<16}",
        "NAME",
        "SIZE",
        "MODIFIED",
        name_width = name_width
    );

    for entry in entries {
        let name = if entry.is_dir {
            format!("{}/", entry.name)
        } else {
            entry.name.clone()
        };
        let size = if entry.is_dir {
            "-".to_string()
        } else {
            entry.size.to_string()
        };
        let modified = entry
            .modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<name_width$}  {:>12}  {:<16}",
            name,
            size,
            modified,
            name_width = name_width
        );
    }
}

/// Print configured remotes in a formatted ASCII table.
fn print_remotes_table(remotes: &[rclone::RemoteDescriptor]) {
    if remotes.is_empty() {
        println!("No remotes configured.");
        return;
    }

    let name_width = remotes
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(4)
        .max(4);

    println!("{:<name_width$}  TYPE", "NAME", name_width = name_width);
    for remote in remotes {
        println!(
            "{:<name_width$}  {}",
            remote.name,
            remote.kind,
            name_width = name_width
        );
    }
}
