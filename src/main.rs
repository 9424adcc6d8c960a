use clap::{ArgAction, Parser, Subcommand};
use oxfta::archive::{pack_dir, unpack_to, Archive, PackOptions};
use oxfta::error::exit_code;
use oxfta::{ContainerError, Scheme};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

#[derive(Parser)]
#[command(name = "oxfta", version, about = "Passphrase-encrypted directory containers")]
struct Cli {
    /// More diagnostics on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Only report errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a folder into an encrypted container
    Pack {
        source_folder: PathBuf,
        output_file:   PathBuf,
        passphrase:    String,
        /// Scheme: aead (version 2, default) or split-key (version 3)
        #[arg(short, long, default_value = "aead", value_parser = parse_scheme)]
        scheme: Scheme,
        /// Encode files on all cores (holds every encoded file in memory)
        #[arg(long)]
        parallel: bool,
    },
    /// Unpack a container into a folder
    Unpack {
        container_file: PathBuf,
        output_folder:  PathBuf,
        passphrase:     String,
    },
    /// List container contents
    List {
        container_file: PathBuf,
        passphrase:     String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(exit_code::FAILURE as u8))
        }
    }
}

fn run(command: Commands) -> Result<(), ContainerError> {
    match command {

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { source_folder, output_file, passphrase, scheme, parallel } => {
            let opts = PackOptions { scheme, parallel };
            let summary = pack_dir(&source_folder, &output_file, &passphrase, opts)?;
            println!("Packed {} file(s) → {} ({} bytes, {})",
                     summary.files, output_file.display(), summary.container_len, scheme);
        }

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack { container_file, output_folder, passphrase } => {
            let n = unpack_to(&container_file, &output_folder, &passphrase)?;
            println!("Unpacked {} file(s) to {}", n, output_folder.display());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { container_file, passphrase } => {
            if !container_file.is_file() {
                return Err(ContainerError::Input(format!(
                    "container file not found: {}", container_file.display()
                )));
            }
            let ar = Archive::open(&container_file, &passphrase)?;
            println!("Container: {} ({})", container_file.display(), ar.scheme());
            println!("{:<40} {:>12} {:>12} {:>10}", "Path", "Offset", "Stored", "Compressed");
            for info in ar.list() {
                println!("{:<40} {:>12} {:>12} {:>10}",
                         info.path, info.offset, info.stored_size,
                         if info.compressed { "yes" } else { "no" });
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn parse_scheme(s: &str) -> Result<Scheme, String> {
    Scheme::from_name(s).ok_or_else(|| format!("unknown scheme '{s}' (expected aead or split-key)"))
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (_, 0)    => Level::WARN,
        (_, 1)    => Level::INFO,
        (_, 2)    => Level::DEBUG,
        _         => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
