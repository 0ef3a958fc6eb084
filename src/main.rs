//! petcry CLI
//!
//! Classifies pet vocalizations (anger / hunger / lonely) with a staged ONNX model.
//!
//! # Usage
//!
//! ```bash
//! # Stage a trained model (records its sha256 and input contract)
//! petcry setup-model --model-dir ./models --source cry_classifier.onnx --num-classes 3
//!
//! # Classify recordings
//! petcry classify --model-dir ./models --species dog bark1.wav bark2.m4a
//!
//! # Serve over HTTP
//! petcry serve --model-dir ./models --port 8080
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use petcry::report::{FileReport, OutputFormat};
use petcry::server::{serve, AppState};
use petcry_core::{LabelOverrides, SpeciesPolicy};
use petcry_neural::{
    CryEngine, CryPipeline, EngineConfig, FeatureConfig, ModelManager, ShortInputPolicy,
};

#[derive(Parser)]
#[command(name = "petcry")]
#[command(about = "Classify animal cries into emotional states")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that loads the model.
#[derive(clap::Args, Debug, Clone)]
struct ModelArgs {
    /// Model directory (defaults to $PETCRY_MODEL_DIR, then the user cache dir)
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Reject unknown species tags instead of using the generic label set
    #[arg(long)]
    strict_species: bool,

    /// Reject recordings shorter than the 2 s window instead of zero-padding
    #[arg(long)]
    reject_short: bool,

    /// ONNX Runtime intra-op threads
    #[arg(long, default_value = "1")]
    intra_threads: usize,
}

/// Request scheduling options.
#[derive(clap::Args, Debug, Clone)]
struct EngineArgs {
    /// Concurrent classifications (defaults to available cores)
    #[arg(long)]
    workers: Option<usize>,

    /// Requests allowed to wait for a worker (defaults to 4 per worker)
    #[arg(long)]
    queue_depth: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "10")]
    timeout_secs: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one or more recordings
    Classify {
        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Species tag (dog, cat, 개, 고양이); omit for the generic label set
        #[arg(short, long)]
        species: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Print Korean state names
        #[arg(long)]
        korean: bool,

        /// Audio files (wav, flac, ogg, mp3, m4a)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Copy a trained model into the model directory and pin its hash
    SetupModel {
        /// Model directory (defaults to $PETCRY_MODEL_DIR, then the user cache dir)
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Trained ONNX classifier
        #[arg(long)]
        source: PathBuf,

        /// Number of output classes
        #[arg(long, default_value = "3")]
        num_classes: usize,

        /// JSON file with per-species label overrides ({"dog": [...], "cat": [...], "generic": [...]})
        #[arg(long)]
        labels: Option<PathBuf>,
    },

    /// Print the staged manifest and check the model against the feature contract
    Inspect {
        #[command(flatten)]
        model: ModelArgs,
    },

    /// Start the HTTP server
    Serve {
        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Server port
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Answer 503 when the queue is full instead of waiting for a slot
        #[arg(long)]
        shed_load: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Classify {
            model,
            engine,
            species,
            format,
            korean,
            files,
        } => {
            let engine = CryEngine::new(Arc::new(load_pipeline(&model)?), engine_config(&engine)?);

            let mut tasks = tokio::task::JoinSet::new();
            for (idx, path) in files.iter().cloned().enumerate() {
                let engine = engine.clone();
                let species = species.clone();
                tasks.spawn(async move {
                    let result = match tokio::fs::read(&path).await {
                        Ok(bytes) => engine.predict(bytes, species).await,
                        Err(e) => Err(petcry_core::PipelineError::Decode(format!(
                            "cannot read {}: {}",
                            path.display(),
                            e
                        ))),
                    };
                    (idx, result)
                });
            }

            let mut results: Vec<_> = (0..files.len()).map(|_| None).collect();
            while let Some(joined) = tasks.join_next().await {
                let (idx, result) = joined.context("classification task failed")?;
                results[idx] = Some(result);
            }

            let mut failures = 0;
            for (path, result) in files.iter().zip(results) {
                let Some(result) = result else { continue };
                if result.is_err() {
                    failures += 1;
                }
                println!("{}", FileReport::new(path, &result).render(format, korean));
            }

            if failures > 0 {
                bail!("{} of {} recordings failed", failures, files.len());
            }
        }

        Commands::SetupModel {
            model_dir,
            source,
            num_classes,
            labels,
        } => {
            let manager = model_manager(model_dir);
            let overrides = match labels {
                Some(path) => {
                    let bytes = std::fs::read(&path)
                        .with_context(|| format!("reading label overrides {:?}", path))?;
                    serde_json::from_slice::<LabelOverrides>(&bytes)
                        .with_context(|| format!("parsing label overrides {:?}", path))?
                }
                None => LabelOverrides::default(),
            };

            let input_shape = FeatureConfig::default().input_shape();
            let manifest = manager.stage(&source, input_shape, num_classes, overrides)?;
            println!(
                "Staged {:?} in {:?} (sha256 {})",
                source,
                manager.root(),
                manifest.classifier_sha256
            );
        }

        Commands::Inspect { model } => {
            let manager = model_manager(model.model_dir.clone());
            let manifest = manager.load_manifest()?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);

            let pipeline = load_pipeline(&model)?;
            println!("features: {:?}", pipeline.features().input_shape());
            for (species, set) in pipeline.labels().sets() {
                let labels: Vec<&str> = set.iter().collect();
                println!("{}: {}", species, labels.join(", "));
            }
            println!("contract ok");
        }

        Commands::Serve {
            model,
            engine,
            port,
            host,
            shed_load,
        } => {
            let engine = CryEngine::new(Arc::new(load_pipeline(&model)?), engine_config(&engine)?);
            tracing::info!("Engine ready: {:?}", engine);

            let state = Arc::new(AppState { engine, shed_load });
            let addr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("invalid bind address {}:{}", host, port))?;
            serve(state, addr).await?;
        }
    }

    Ok(())
}

fn model_manager(model_dir: Option<PathBuf>) -> ModelManager {
    match model_dir {
        Some(dir) => ModelManager::from_dir(dir),
        None => ModelManager::new(),
    }
}

/// Load and validate the staged model. Any failure here is fatal.
fn load_pipeline(args: &ModelArgs) -> anyhow::Result<CryPipeline> {
    let manager = model_manager(args.model_dir.clone());
    let policy = if args.strict_species {
        SpeciesPolicy::Strict
    } else {
        SpeciesPolicy::Fallback
    };
    let features = FeatureConfig {
        short_input: if args.reject_short {
            ShortInputPolicy::Reject
        } else {
            ShortInputPolicy::ZeroPad
        },
        ..FeatureConfig::default()
    };

    tracing::info!("Loading classifier from {:?}", manager.root());
    let pipeline = CryPipeline::from_model_dir(&manager, policy, features, args.intra_threads)
        .with_context(|| format!("loading model from {:?}", manager.root()))?;
    Ok(pipeline)
}

fn engine_config(args: &EngineArgs) -> anyhow::Result<EngineConfig> {
    if args.timeout_secs == 0 {
        bail!("--timeout-secs must be at least 1");
    }
    if args.workers == Some(0) {
        bail!("--workers must be at least 1");
    }

    let defaults = EngineConfig::default();
    let workers = args.workers.unwrap_or(defaults.workers);
    Ok(EngineConfig {
        workers,
        queue_depth: args.queue_depth.unwrap_or(workers * 4),
        request_timeout: Duration::from_secs(args.timeout_secs),
    })
}
