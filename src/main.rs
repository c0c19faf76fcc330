use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mprom::build::{ChecksumFixup, ExternalTool};
use mprom::session::{Session, SessionOptions};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mpromtool", about = "Extract and rebuild Mario Party N64 ROM segments")]
struct Cli {
    /// Input ROM (big-endian .z64)
    #[arg(long)]
    base: PathBuf,
    /// Directory holding game_<ROMID>.json descriptors
    #[arg(long, default_value = "gameconfig")]
    desc: PathBuf,
    /// Worker threads; 0 uses every core
    #[arg(short, long, default_value = "0")]
    jobs: usize,
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump every segment of the ROM into a directory
    Extract {
        out_dir: PathBuf,
    },
    /// Rebuild a ROM from a dump directory
    Build {
        in_dir: PathBuf,
        output: PathBuf,
        /// Program run on the written ROM to fix its checksum
        #[arg(long)]
        crc_tool: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .init();

    let opts = SessionOptions { jobs: cli.jobs };
    let session = Session::open(&cli.base, &cli.desc, opts)
        .with_context(|| format!("opening {}", cli.base.display()))?;

    match cli.command {

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { out_dir } => {
            let game = session.extract().context("extracting segments")?;
            let listing = session
                .dump(&game, &out_dir)
                .with_context(|| format!("writing {}", out_dir.display()))?;
            info!(
                files = game.files.file_count(),
                images = listing.hvqdata.len(),
                banks = listing.musbanks.len(),
                out = %out_dir.display(),
                "extracted"
            );
        }

        // ── Build ────────────────────────────────────────────────────────────
        Commands::Build { in_dir, output, crc_tool } => {
            let game = session
                .load_assets(&in_dir)
                .with_context(|| format!("loading {}", in_dir.display()))?;
            let built = session.build(&game).context("building image")?;
            built.write(&output)?;
            info!(
                size = built.image.len(),
                blake3 = %hex::encode(built.digest().as_bytes()),
                out = %output.display(),
                "built"
            );
            if let Some(program) = crc_tool {
                ExternalTool::new(program)
                    .fix(&output)
                    .context("fixing checksum")?;
            }
        }
    }

    Ok(())
}
