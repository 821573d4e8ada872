use clap::{Parser, Subcommand};
use sitepress::backend::{AppEngineBackend, Backend, DiskBackend, ObjectStorageBackend, PublishError};
use sitepress::config::{self, PublishConfig, Target};
use sitepress::event::Events;
use sitepress::path::SitePath;
use sitepress::responder::HttpResponder;
use sitepress::{output, pipeline};
use std::error::Error;
use std::path::{Path, PathBuf};

/// Overrides for the config file's publish settings.
#[derive(clap::Args, Clone)]
struct PublishArgs {
    /// Publish target (overrides `target`)
    #[arg(long, value_enum)]
    target: Option<Target>,

    /// Output directory for disk and app-engine (overrides `deploy_dir`)
    #[arg(long)]
    deploy_dir: Option<PathBuf>,

    /// Publish on this many workers (turns on `publish.multithread`)
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Parser)]
#[command(name = "sitepress")]
#[command(about = "Publish a running site's pages as static files")]
#[command(long_about = "\
Publish a running site's pages as static files

Every path listed by the configured producers is fetched from `base_url`
and stored on the selected target:

  disk        deploy/index.html, deploy/about/index.html, ...
  s3          bucket objects (unchanged content is skipped), then a
              CloudFront invalidation when a distribution is configured
  app-engine  deploy/deploy/... plus an app.yaml handler table

Run 'sitepress gen-config' to generate a documented sitepress.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = "sitepress.toml", global = true)]
    config: PathBuf,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every path and publish it to the target
    Publish(PublishArgs),
    /// List every producer's paths and where they will be stored
    Paths,
    /// Print a stock sitepress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Publish(args) => {
            let mut config = config::load_config(&cli.config)?;
            apply_overrides(&mut config, &args);
            config.validate()?;
            let registry = config.registry(config_dir(&cli.config));

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_publish_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = publish(&config, &registry, Events::new(tx));
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            let summary = result?;
            tracing::info!(paths = summary.paths_published, "done");
        }
        Command::Paths => {
            let config = config::load_config(&cli.config)?;
            let registry = config.registry(config_dir(&cli.config));
            let mut producers: Vec<(&str, &[SitePath])> = Vec::new();
            for producer in registry.producers() {
                producers.push((producer.name(), producer.paths()?));
            }
            output::print_paths_output(&producers, config.target);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize `tracing` output on stderr. `RUST_LOG` wins over `--log-level`.
fn init_logging(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn apply_overrides(config: &mut PublishConfig, args: &PublishArgs) {
    if let Some(target) = args.target {
        config.target = target;
    }
    if let Some(dir) = &args.deploy_dir {
        config.deploy_dir = dir.display().to_string();
    }
    if let Some(workers) = args.workers {
        config.publish.multithread = true;
        config.publish.workers = Some(workers);
    }
}

/// Directory relative `paths_file`s resolve against.
fn config_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or(Path::new("."))
}

/// Build the configured backend and run the pipeline through it. `events`
/// is dropped on return, which ends the printer thread.
fn publish(
    config: &PublishConfig,
    registry: &sitepress::producer::Registry,
    events: Events,
) -> Result<pipeline::RunSummary, Box<dyn Error>> {
    match config.target {
        Target::Disk => run(&mut DiskBackend::new(&config.deploy_dir), config, registry, &events),
        Target::AppEngine => run(
            &mut AppEngineBackend::new(
                &config.deploy_dir,
                config.app_engine.app_id.clone(),
                config.app_engine.runtime.clone(),
            ),
            config,
            registry,
            &events,
        ),
        Target::S3 => run(
            &mut object_storage_backend(config)?,
            config,
            registry,
            &events,
        ),
    }
}

fn run<B: Backend>(
    backend: &mut B,
    config: &PublishConfig,
    registry: &sitepress::producer::Registry,
    events: &Events,
) -> Result<pipeline::RunSummary, Box<dyn Error>> {
    let workers = config::effective_workers(config);
    let responder = HttpResponder::new(&config.base_url).map_err(PublishError::ResponderSetup)?;
    let summary = pipeline::publish(
        backend,
        registry,
        workers,
        || Ok(responder.clone()),
        events,
    )?;
    Ok(summary)
}

#[cfg(feature = "aws")]
fn object_storage_backend(config: &PublishConfig) -> Result<ObjectStorageBackend, Box<dyn Error>> {
    use sitepress::storage::aws::AwsContext;
    use sitepress::storage::{Cdn, ObjectStore};
    use std::sync::Arc;

    let region = (!config.s3.region.is_empty()).then_some(config.s3.region.as_str());
    let aws = AwsContext::load(region)?;
    let store: Arc<dyn ObjectStore> = Arc::new(aws.bucket(&config.s3.bucket));
    let cdn: Option<Arc<dyn Cdn>> = if config.s3.distribution_id.is_empty() {
        None
    } else {
        let cloudfront: Arc<dyn Cdn> = Arc::new(aws.cloudfront());
        Some(cloudfront)
    };
    Ok(ObjectStorageBackend::new(store, cdn, config.s3.settings()))
}

#[cfg(not(feature = "aws"))]
fn object_storage_backend(_config: &PublishConfig) -> Result<ObjectStorageBackend, Box<dyn Error>> {
    Err("the s3 target needs the `aws` feature (cargo install sitepress --features aws)".into())
}
