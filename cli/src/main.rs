//! CLI entrypoint for conductor
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use conductor_application::{
    DiffProvider, EventSink, GenerationRoleHandler, NoDiffProvider, NoEventSink, NoProgress,
    OrchestrationProgress, OrchestratorContext, RequestClient, RoleHandlers,
    RunOrchestrationUseCase, RunRequest, SessionManager, Workflow,
};
use conductor_domain::{ConfigIssue, IssueSeverity, OutputMode};
use conductor_infrastructure::{
    ConfigLoader, CopilotGenerationService, FileConfig, GitDiffProvider, JsonlEventSink,
    RunArtifacts, RunLog,
};
use conductor_presentation::{Cli, ConsoleFormatter, OutputFormat, ProgressReporter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        for line in ConfigLoader::describe_sources(cli.config.as_deref()) {
            println!("{}", line);
        }
        return Ok(());
    }

    // === Configuration ===
    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };
    apply_cli_overrides(&cli, &mut config);

    let issues = config.validate();
    print_issues(&issues);
    if ConfigIssue::has_errors(&issues) {
        bail!("Invalid configuration ({} error(s))", error_count(&issues));
    }

    let (models, _) = config.models.to_role_models();
    let (workflow, _) = config.orchestration.parse_workflow();
    let (max_iterations, _) = config.orchestration.parse_max_iterations();
    let (loop_params, _) = config.orchestration.to_loop_params();
    let (mode, _) = config.output.parse_mode();

    let workspace = resolve_workspace(cli.workspace.as_deref())?;
    let task = match (cli.task.clone(), workflow) {
        (Some(task), _) => task,
        (None, Workflow::ReviewOnly) => String::new(),
        (None, Workflow::Feature) => bail!("A task is required. Use --review-only to review the current diff."),
    };

    let artifacts = RunArtifacts::create(&workspace, config.output.runs_dir.as_deref())
        .context("Failed to create run directory")?;
    let _log_guard = init_tracing(&cli, &config, artifacts.run_dir(), artifacts.log_file_name());

    info!("Starting conductor run {} in {}", artifacts.run_id(), workspace.display());

    // === Dependency Injection ===
    let service = CopilotGenerationService::with_command(&config.session.copilot_command)
        .await
        .context("Failed to start the Copilot CLI")?
        .with_working_directory(&workspace);
    let sessions = Arc::new(SessionManager::new(
        Arc::new(service),
        config.session.to_session_params(),
    ));
    let client = Arc::new(RequestClient::new(
        sessions.clone(),
        config.request.to_request_params(),
    ));

    let handler = Arc::new(
        GenerationRoleHandler::new(client.clone())
            .with_available_tools(config.session.available_tools.clone())
            .with_excluded_tools(config.session.excluded_tools.clone()),
    );
    let diff: Arc<dyn DiffProvider> = match GitDiffProvider::try_new(&workspace).await {
        Some(provider) => Arc::new(provider),
        None => Arc::new(NoDiffProvider),
    };
    let events: Arc<dyn EventSink> = match JsonlEventSink::new(artifacts.events_path()) {
        Some(sink) => Arc::new(sink),
        None => Arc::new(NoEventSink),
    };
    let orchestrator = OrchestratorContext::new(client.clone(), RoleHandlers::uniform(handler.clone()))
        .with_diff_provider(diff)
        .with_event_sink(events);

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling run");
                token.cancel();
            }
        });
    }

    let warm_up = handler.configurations(&models);
    tokio::select! {
        _ = sessions.warm_up_all(&warm_up) => {}
        _ = token.cancelled() => {}
    }

    let progress: Arc<dyn OrchestrationProgress> =
        if cli.quiet || cli.output == OutputFormat::Json {
            Arc::new(NoProgress)
        } else {
            Arc::new(ProgressReporter::new())
        };
    let use_case = RunOrchestrationUseCase::new(orchestrator)
        .with_progress(progress)
        .with_cancellation(token.clone());

    let request = RunRequest::new(task.clone(), &workspace)
        .with_workflow(workflow)
        .with_models(models.clone())
        .with_loop_params(loop_params)
        .with_max_iterations(max_iterations)
        .with_review_required(config.orchestration.review_required);
    let run_log = RunLog::start(artifacts.run_id(), workflow, &task, models, mode);

    let result = use_case.execute(request, artifacts.run_id()).await;
    sessions.shutdown().await;

    match result {
        Ok(report) => {
            artifacts.write_report(&task, &report, mode)?;
            artifacts.write_run_log(&run_log.completed(&report))?;

            let output = match cli.output {
                OutputFormat::Text => ConsoleFormatter::format(&report, Some(artifacts.run_dir())),
                OutputFormat::Json => ConsoleFormatter::format_json(&report, Some(artifacts.run_dir())),
            };
            println!("{}", output);
            Ok(())
        }
        Err(e) if e.is_cancelled() => {
            artifacts.write_run_log(&run_log.cancelled(client.usage().snapshot()))?;
            bail!("Run cancelled (log: {})", artifacts.run_dir().display())
        }
        Err(e) => {
            artifacts.write_run_log(&run_log.failed(e.to_string(), client.usage().snapshot()))?;
            Err(e).context(format!("Run failed (log: {})", artifacts.run_dir().display()))
        }
    }
}

/// Overlay command-line flags on the loaded file configuration.
fn apply_cli_overrides(cli: &Cli, config: &mut FileConfig) {
    let models = &mut config.models;
    for (flag, slot) in [
        (&cli.planner, &mut models.planner),
        (&cli.frontend, &mut models.frontend),
        (&cli.builder, &mut models.builder),
        (&cli.style, &mut models.style),
        (&cli.architect, &mut models.architecture),
    ] {
        if let Some(model) = flag {
            *slot = Some(model.clone());
        }
    }

    if cli.review_only {
        config.orchestration.workflow = Workflow::ReviewOnly.as_str().to_string();
    }
    if let Some(max) = cli.max_iterations {
        config.orchestration.max_iterations = Some(max);
    }
    if let Some(required) = cli.review_required_override() {
        config.orchestration.review_required = Some(required);
    }
    if let Some(mode) = cli.mode {
        config.output.mode = OutputMode::from(mode).as_str().to_string();
    }
}

fn resolve_workspace(explicit: Option<&Path>) -> Result<PathBuf> {
    let dir = match explicit {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };
    dir.canonicalize()
        .with_context(|| format!("Workspace {} does not exist", dir.display()))
}

fn error_count(issues: &[ConfigIssue]) -> usize {
    issues
        .iter()
        .filter(|i| i.severity == IssueSeverity::Error)
        .count()
}

fn print_issues(issues: &[ConfigIssue]) {
    for issue in issues {
        let label = match issue.severity {
            IssueSeverity::Error => "Error",
            IssueSeverity::Warning => "Warning",
        };
        eprintln!("{}: {}", label, issue.message);
    }
}

/// Filter directive: `-v` count first, then `RUST_LOG`, then `[logging] level`.
fn filter_directive(verbose: u8, env: Option<String>, configured: Option<&str>) -> String {
    match verbose {
        0 => env
            .filter(|d| !d.trim().is_empty())
            .or_else(|| configured.map(str::to_string))
            .unwrap_or_else(|| "warn".to_string()),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(), // -vvv or more
    }
}

/// Console layer on stderr plus a plain-text file layer in the run directory.
fn init_tracing(cli: &Cli, config: &FileConfig, run_dir: &Path, file_name: &str) -> WorkerGuard {
    let directive = filter_directive(
        cli.verbose,
        std::env::var("RUST_LOG").ok(),
        config.logging.level.as_deref(),
    );

    let appender = tracing_appender::rolling::never(run_dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(&directive));
    let file = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(EnvFilter::new(&directive));

    tracing_subscriber::registry().with(console).with(file).init();
    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive_priority() {
        assert_eq!(filter_directive(0, None, None), "warn");
        assert_eq!(filter_directive(0, None, Some("info")), "info");
        assert_eq!(
            filter_directive(0, Some("conductor=debug".into()), Some("info")),
            "conductor=debug"
        );
        assert_eq!(filter_directive(2, Some("error".into()), Some("info")), "debug");
        assert_eq!(filter_directive(5, None, None), "trace");
    }

    #[test]
    fn test_cli_overrides_replace_file_values() {
        let cli = Cli::parse_from([
            "conductor",
            "--review-only",
            "--builder",
            "gpt-5.2-codex",
            "--max-iterations",
            "12",
            "--mode",
            "branch",
        ]);
        let mut config = FileConfig::default();
        config.models.style = Some("claude-haiku-4.5".to_string());

        apply_cli_overrides(&cli, &mut config);

        assert_eq!(config.models.builder.as_deref(), Some("gpt-5.2-codex"));
        assert_eq!(config.models.style.as_deref(), Some("claude-haiku-4.5"));
        assert_eq!(config.orchestration.parse_workflow().0, Workflow::ReviewOnly);
        assert_eq!(config.output.parse_mode().0, OutputMode::Branch);

        // Out-of-range CLI values are validated like file values.
        let issues = config.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
    }

    #[test]
    fn test_resolve_missing_workspace() {
        assert!(resolve_workspace(Some(Path::new("/definitely/not/here"))).is_err());
    }
}
