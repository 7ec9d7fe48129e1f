// SPDX-License-Identifier: MIT

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use stategraph_rs::graph::{
    CheckpointStore, Executor, FileCheckpointStore, RunConfig, RunOutput, Update, WorkflowFailed,
};
use stategraph_rs::server;
use stategraph_rs::workflow::{Workflow, WorkflowBuilder};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a workflow from a file
    Run {
        /// Path to the workflow file
        #[arg(short, long)]
        file: PathBuf,

        /// Initial input as a JSON object
        #[arg(short, long, default_value = "{}")]
        input: String,

        /// Override the workflow's step limit
        #[arg(long)]
        max_steps: Option<usize>,

        /// Override the workflow's concurrency limit
        #[arg(long)]
        concurrency: Option<usize>,

        /// Persist a checkpoint per step into this directory
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,

        /// Run identifier (generated when omitted)
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Resume a run from its latest checkpoint
    Resume {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long)]
        run_id: String,

        #[arg(long)]
        checkpoint_dir: PathBuf,

        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// Compile a workflow and print its topology
    Validate {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,

        /// Directory holding workflow YAML files
        #[arg(short, long, default_value = "workflows")]
        dir: PathBuf,

        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Run {
            file,
            input,
            max_steps,
            concurrency,
            checkpoint_dir,
            run_id,
        } => {
            let workflow = load(&file)?;
            let input: serde_json::Value =
                serde_json::from_str(&input).context("--input is not valid JSON")?;
            let input =
                Update::from_json(input).ok_or_else(|| anyhow!("--input must be a JSON object"))?;

            let mut config = workflow.config.clone();
            if let Some(max_steps) = max_steps {
                config.max_steps = max_steps;
            }
            if let Some(limit) = concurrency {
                config.concurrency_limit = limit;
            }
            if run_id.is_some() {
                config.run_id = run_id;
            }

            let executor = with_checkpoints(workflow.executor(), checkpoint_dir, &mut config);
            println!("Running workflow: {}", workflow.name);
            let result = run_until_interrupted(&executor, executor.run(input, &config)).await;
            report(result)?;
        }
        Commands::Resume {
            file,
            run_id,
            checkpoint_dir,
            max_steps,
        } => {
            let workflow = load(&file)?;
            let mut config = workflow.config.clone();
            if let Some(max_steps) = max_steps {
                config.max_steps = max_steps;
            }

            let executor = with_checkpoints(workflow.executor(), Some(checkpoint_dir), &mut config);
            println!("Resuming run {} of workflow: {}", run_id, workflow.name);
            let result = run_until_interrupted(&executor, executor.resume(&run_id, &config)).await;
            report(result)?;
        }
        Commands::Validate { file } => {
            let workflow = load(&file)?;
            let graph = &workflow.graph;
            println!("Workflow '{}' is valid", workflow.name);
            if !workflow.description.is_empty() {
                println!("  {}", workflow.description);
            }
            println!("Nodes ({}):", graph.nodes().len());
            for spec in graph.nodes().iter() {
                println!("  - {} ({:?})", spec.id, spec.mode);
            }
            println!("Edges ({}):", graph.edges().len());
            for edge in graph.edges().iter() {
                println!("  - {} -> {}", edge.source(), edge.targets().join(" | "));
            }
        }
        Commands::Serve {
            port,
            dir,
            checkpoint_dir,
        } => {
            server::serve(port, dir, checkpoint_dir)
                .await
                .map_err(|e| anyhow!(e))?;
        }
    }

    Ok(())
}

fn load(file: &Path) -> anyhow::Result<Workflow> {
    WorkflowBuilder::new()
        .load(file)
        .with_context(|| format!("failed to build workflow from {}", file.display()))
}

fn with_checkpoints(executor: Executor, dir: Option<PathBuf>, config: &mut RunConfig) -> Executor {
    match dir {
        Some(dir) => {
            config.checkpoint_enabled = true;
            let store: Arc<dyn CheckpointStore> = Arc::new(FileCheckpointStore::new(dir));
            executor.with_checkpointer(store)
        }
        None => executor,
    }
}

/// Cancel the run cooperatively on Ctrl-C
async fn run_until_interrupted<F>(executor: &Executor, run: F) -> Result<RunOutput, WorkflowFailed>
where
    F: std::future::Future<Output = Result<RunOutput, WorkflowFailed>>,
{
    let handle = executor.cancellation_handle();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, stopping after the current step");
            handle.cancel();
        }
    });
    let result = run.await;
    watcher.abort();
    result
}

fn report(result: Result<RunOutput, WorkflowFailed>) -> anyhow::Result<()> {
    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(failure) => {
            eprintln!("{}", serde_json::to_string_pretty(&failure.to_json())?);
            Err(anyhow::Error::new(failure))
        }
    }
}
