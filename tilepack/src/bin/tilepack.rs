use std::env;

use clap::Parser as _;
use tilepack::TilepackResult;
use tilepack::config::{Args, Config, read_config};
use tilepack::job::{Generator, JobEvent};
use tilepack::logging::{TileProgress, ensure_qgisweb_log_level_matches, init_tracing};
use tilepack::render::GraticuleRenderer;
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn start(args: &Args) -> TilepackResult<()> {
    info!("Starting tilepack v{VERSION}");

    let mut config = if let Some(cfg_filename) = &args.config {
        info!("Using {}", cfg_filename.display());
        read_config(cfg_filename, &subst::Env)?
    } else {
        Config::default()
    };
    config.merge_args(args);
    config.finalize();

    if let Some(file_name) = &args.save_config {
        config.save_to_file(file_name)?;
    } else {
        info!("Use --save-config to save or print the configuration.");
    }

    let job = config.to_job()?;
    let renderer = GraticuleRenderer::new(config.graticule.clone().unwrap_or_default());
    let handle = Generator::new().submit(job, renderer)?;

    let mut progress: Option<TileProgress> = None;
    for event in handle.events().iter() {
        match event {
            JobEvent::ProgressStarted(total) => progress = Some(TileProgress::new(total)),
            JobEvent::ProgressUpdated(done) => {
                if let Some(progress) = &mut progress {
                    progress.set_position(done);
                }
            }
            JobEvent::Finished { .. } => {
                if let Some(progress) = &progress {
                    progress.finish();
                }
            }
            // the worker logs these itself
            JobEvent::Info(_) | JobEvent::Failed(_) => {}
        }
    }

    let result = handle.join()?;
    println!("{}", result.summary());
    Ok(())
}

fn main() {
    let filter = ensure_qgisweb_log_level_matches(env::var("RUST_LOG").ok(), "tilepack=");
    init_tracing(&filter, env::var("TILEPACK_FORMAT").ok());

    let args = Args::parse();
    if let Err(e) = start(&args) {
        // Ensure the message is printed, even if the logging is disabled
        if tracing::enabled!(tracing::Level::ERROR) {
            error!("{e}");
        } else {
            eprintln!("{e}");
        }
        std::process::exit(1);
    }
}
