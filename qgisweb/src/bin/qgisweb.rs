use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Parser, Subcommand};
use log::{error, info};
use qgisweb::{ContainerSummary, read_document};

/// Defines the styles used for the CLI help output.
const HELP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Blue.on_default().bold())
    .usage(AnsiColor::Blue.on_default().bold())
    .literal(AnsiColor::White.on_default())
    .placeholder(AnsiColor::Green.on_default());

#[derive(Parser, PartialEq, Debug)]
#[command(
    version,
    name = "qgisweb",
    about = "A utility to inspect .qgisweb tile containers",
    after_help = "Use RUST_LOG environment variable to control logging level, e.g. RUST_LOG=debug or RUST_LOG=qgisweb=debug.",
    styles = HELP_STYLES
)]
pub struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, PartialEq, Debug)]
enum Commands {
    /// Show the extent and the number of tiles per zoom level of a container or a zip bundle
    #[command(name = "info", alias = "summary")]
    Info { file: PathBuf },
    /// Write the decoded JSON document of a container or a zip bundle
    #[command(name = "decode")]
    Decode {
        /// Container or bundle to read
        file: PathBuf,
        /// File to write the JSON document to. Prints to stdout if not set.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let env = env_logger::Env::default().default_filter_or("qgisweb=info");
    env_logger::Builder::from_env(env)
        .format_indent(None)
        .format_module_path(false)
        .format_target(false)
        .format_timestamp(None)
        .init();

    if let Err(err) = main_int() {
        error!("{err}");
        std::process::exit(1);
    }
}

fn main_int() -> anyhow::Result<()> {
    let args = Args::parse();
    match args.command {
        Commands::Info { file } => {
            let summary = ContainerSummary::from_file(&file)?;
            println!("File: {}", file.display());
            print!("{summary}");
        }
        Commands::Decode { file, output } => decode(&file, output.as_deref())?,
    }
    Ok(())
}

fn decode(file: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("Input file does not exist: {}", file.display());
    }
    let document = read_document(file)?;
    if let Some(output) = output {
        fs::write(output, &document)?;
        info!(
            "Decoded {} into {} ({} bytes)",
            file.display(),
            output.display(),
            document.len()
        );
    } else {
        io::stdout().lock().write_all(&document)?;
    }
    Ok(())
}
