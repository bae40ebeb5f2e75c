use anyhow::{Context, Result};
use pipeline_runner::cli::commands::{ListCommand, PlanCommand, RunCommand, ValidateCommand};
use pipeline_runner::cli::output::*;
use pipeline_runner::cli::{run_exit_code, Cli, Command, EXIT_FAILED, EXIT_OK};
use pipeline_runner::core::{load_workflow, PipelineConfig, WorkflowLoader};
use pipeline_runner::execution::{EngineError, ExecutionEngine};
use pipeline_runner::runner::{CommandRunner, DryRunRunner, ShellRunner};
use pipeline_runner::{ExecutionStatus, Pipeline, RunContext, StepState, TriggerEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // RUST_LOG wins over the flags
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Errors returned from here (a workflow that cannot be loaded) exit with 1
    let code = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, &cli).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Plan(cmd) => plan_pipeline(cmd)?,
        Command::List(cmd) => list_workflows(cmd)?,
    };

    if code != EXIT_OK {
        std::process::exit(code);
    }
    Ok(())
}

async fn run_pipeline(cmd: &RunCommand, cli: &Cli) -> Result<i32> {
    let (path, config) =
        load_workflow(cmd.file.as_deref()).context("Failed to load pipeline config")?;

    println!(
        "{} Loaded pipeline: {} {}",
        INFO,
        style(&config.name).bold(),
        style(path.display()).dim()
    );

    let mut pipeline = config.to_pipeline()?;
    let workspace = cmd.workspace()?;
    let event = cmd.trigger_event(&workspace)?;

    let referenced = pipeline.referenced_secrets();
    let secrets = cmd.resolve_secrets(&referenced);
    for name in referenced.iter().filter(|name| !secrets.contains_key(*name)) {
        println!(
            "{} Secret {} is not set; steps using it will fail",
            WARN,
            style(name).yellow()
        );
    }

    for (key, value) in &cmd.env {
        println!(
            "{} Env override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }
    let env: HashMap<String, String> = cmd.env.iter().cloned().collect();

    let context = RunContext::new(&workspace, event.clone())
        .with_env(env)
        .with_secrets(secrets);

    if cmd.dry_run {
        println!("{} Dry run: commands are printed, not executed", INFO);
    }
    println!();

    let show_output = !cli.quiet;
    let result = if cmd.dry_run {
        execute(DryRunRunner::new(), &mut pipeline, &event, context, show_output).await
    } else {
        execute(ShellRunner::new(), &mut pipeline, &event, context, show_output).await
    };

    if !matches!(result, Ok(ExecutionStatus::Skipped)) {
        print!("\n{}", format_run_summary(&pipeline));
    }

    let code = run_exit_code(&result);
    match result {
        Ok(ExecutionStatus::Skipped) => {
            println!(
                "\n{} {} {} for {}",
                INFO,
                style(&pipeline.name).bold(),
                style("skipped").dim(),
                event.git_ref
            );
        }
        Ok(_) => {
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&pipeline.name).bold(),
                style("successfully").green()
            );
        }
        Err(e) => {
            if cli.quiet {
                print_failed_output(&pipeline);
            }
            println!(
                "\n{} {} {}",
                CROSS,
                style(&pipeline.name).bold(),
                style("failed").red()
            );
            error!("{}", e);
        }
    }
    Ok(code)
}

async fn execute<R: CommandRunner>(
    runner: R,
    pipeline: &mut Pipeline,
    event: &TriggerEvent,
    context: RunContext,
    show_output: bool,
) -> Result<ExecutionStatus, EngineError> {
    let engine = ExecutionEngine::new(runner);

    let reporter = Arc::new(RunReporter::new(show_output));
    let handler = reporter.clone();
    engine.add_event_handler(move |event| handler.handle(&event));

    engine.execute(pipeline, event, context).await
}

/// Quiet runs hide live output, so show the tail of the failing step
fn print_failed_output(pipeline: &Pipeline) {
    for step in pipeline.steps() {
        if let StepState::Failed { output, .. } = &step.state {
            if !output.is_empty() {
                println!("\n{} Output of {}:", INFO, style(&step.id).bold());
                println!("{}", format_output(output, 20));
            }
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<i32> {
    println!("{} Validating pipeline...", INFO);

    match load_workflow(cmd.file.as_deref()) {
        Ok((path, config)) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  File: {}", style(path.display()).dim());
            println!("  Name: {}", style(&config.name).bold());
            println!(
                "  Branches: {}",
                style(push_branches(&config).join(", ")).cyan()
            );
            println!("  Steps: {}", style(config.steps.len()).cyan());
            println!("  Env: {}", style(config.env().len()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(EXIT_OK)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            Ok(EXIT_FAILED)
        }
    }
}

fn plan_pipeline(cmd: &PlanCommand) -> Result<i32> {
    let (_, config) =
        load_workflow(cmd.file.as_deref()).context("Failed to load pipeline config")?;
    let pipeline = config.to_pipeline()?;

    if cmd.json {
        let steps: Vec<serde_json::Value> = pipeline
            .steps()
            .iter()
            .map(|step| {
                serde_json::json!({
                    "id": step.id,
                    "name": step.name,
                    "description": step.describe(),
                    "shell": step.shell,
                    "working_directory": step.working_directory,
                    "timeout_secs": step.timeout_secs,
                })
            })
            .collect();
        let plan = serde_json::json!({
            "name": pipeline.name,
            "branches": push_branches(&config),
            "secrets": pipeline.referenced_secrets(),
            "steps": steps,
        });
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", format_plan(&pipeline));
    }

    Ok(EXIT_OK)
}

fn list_workflows(cmd: &ListCommand) -> Result<i32> {
    let dir = match &cmd.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let loader = WorkflowLoader::new(dir);
    let candidates = loader.candidates();

    if candidates.is_empty() {
        println!("{} No workflow files found", INFO);
        for dir in loader.search_dirs() {
            println!("  searched {}", style(dir.display()).dim());
        }
        return Ok(EXIT_OK);
    }

    println!("{} Workflow files (first valid one is used):", INFO);
    for path in &candidates {
        match PipelineConfig::from_file(path) {
            Ok(config) => println!(
                "  {} {} - {} ({} steps)",
                CHECK,
                path.display(),
                style(&config.name).bold(),
                style(config.steps.len()).cyan()
            ),
            Err(e) => println!(
                "  {} {} - {}",
                CROSS,
                path.display(),
                style(format!("{:#}", e)).red()
            ),
        }
    }

    Ok(EXIT_OK)
}

fn push_branches(config: &PipelineConfig) -> Vec<String> {
    config
        .trigger
        .push
        .as_ref()
        .map(|push| push.branches.clone())
        .unwrap_or_default()
}
