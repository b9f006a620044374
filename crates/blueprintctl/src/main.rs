//! Blueprint engine command line tool.
//!
//! Loads blueprint definitions from a directory and drives the engine:
//! list what loaded, validate a single definition, or execute a blueprint
//! with a JSON payload. Capabilities default to the built-in `noop`; real
//! agents can be stood in for with `--stub name=json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blueprint_capability::{create_default_registry, StubCapability};
use blueprint_engine::blueprint::{load_dir, load_file};
use blueprint_engine::engine::{AutoApprovalGate, BlueprintRunner, StepExecutor};
use blueprint_engine::registry::BlueprintRegistry;

#[derive(Parser)]
#[command(name = "blueprintctl")]
#[command(version, about = "Blueprint workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List blueprints loaded from the definitions directory
    List {
        /// Directory containing blueprint definitions
        #[arg(short, long, default_value = "blueprints")]
        dir: PathBuf,
    },
    /// Validate a single blueprint definition file
    Validate {
        /// Definition file to check
        file: PathBuf,
    },
    /// Execute a blueprint and print its execution summary
    Exec {
        /// Blueprint id (looked up in --dir) or a definition file path
        reference: String,

        /// Directory containing blueprint definitions
        #[arg(short, long, default_value = "blueprints")]
        dir: PathBuf,

        /// Trigger payload as a JSON string
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,

        /// Stub a capability with a canned output (format: name=json), can
        /// be repeated
        #[arg(long = "stub", value_name = "NAME=JSON")]
        stubs: Vec<String>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::List { dir } => list(&dir),
        Commands::Validate { file } => validate(&file),
        Commands::Exec {
            reference,
            dir,
            payload,
            stubs,
        } => exec(&reference, &dir, payload.as_deref(), &stubs).await,
    }
}

fn list(dir: &Path) -> Result<()> {
    let registry = BlueprintRegistry::new();
    registry.register_all(load_dir(dir)?);

    if registry.is_empty() {
        println!("No blueprints found in {}", dir.display());
        return Ok(());
    }

    for summary in registry.list() {
        println!(
            "{:<30} {:<10} {:>3} steps  {}",
            summary.id,
            summary.trigger_type.as_deref().unwrap_or("-"),
            summary.total_steps,
            summary.name,
        );
    }
    Ok(())
}

fn validate(file: &Path) -> Result<()> {
    match load_file(file) {
        Ok(blueprint) => {
            println!(
                "OK: {} ({} steps)",
                blueprint.id,
                blueprint.total_steps()
            );
            Ok(())
        }
        Err(e) => bail!("{}: {}", file.display(), e),
    }
}

async fn exec(
    reference: &str,
    dir: &Path,
    payload: Option<&str>,
    stubs: &[String],
) -> Result<()> {
    let registry = Arc::new(BlueprintRegistry::new());

    // A path to a definition file takes precedence over a registered id.
    let reference_path = PathBuf::from(reference);
    let blueprint_id = if reference_path.is_file() {
        let blueprint = load_file(&reference_path)?;
        let id = blueprint.id.clone();
        registry.register(blueprint);
        id
    } else {
        registry.register_all(load_dir(dir)?);
        reference.to_string()
    };

    let mut capabilities = create_default_registry();
    for stub in stubs {
        let (name, output) = parse_stub(stub)?;
        capabilities.register(StubCapability::new(name, output));
    }

    let trigger_data = payload
        .map(|p| serde_json::from_str(p).context("invalid --payload JSON"))
        .transpose()?;

    let executor = StepExecutor::new(Arc::new(capabilities), Arc::new(AutoApprovalGate));
    let runner = BlueprintRunner::new(registry, executor);

    let summary = runner.execute_blueprint(&blueprint_id, trigger_data).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if summary.status != blueprint_engine::RunState::Completed {
        bail!("run finished with status '{}'", summary.status);
    }
    Ok(())
}

/// Parse a `name=json` stub argument.
fn parse_stub(arg: &str) -> Result<(String, serde_json::Value)> {
    let Some((name, raw)) = arg.split_once('=') else {
        bail!("invalid --stub '{}', expected name=json", arg);
    };
    let output = serde_json::from_str(raw)
        .with_context(|| format!("invalid JSON in --stub '{}'", name))?;
    Ok((name.to_string(), output))
}
