//! `releaseflow` command line.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use releaseflow::cancellation::CancellationToken;
use releaseflow::config::{load_config, validate_config, Config};
use releaseflow::context::{RunContext, RunIdentity};
use releaseflow::core::StageOutcome;
use releaseflow::events::LoggingEventSink;
use releaseflow::pipeline::{
    release_pipeline, ExitCodePolicy, PipelineRunResult, EXIT_CONFIG_ERROR,
};
use releaseflow::release::{publisher_from_config, DryRunPublisher, ReleaseArtifactDescriptor};
use releaseflow::trigger::{EventKind, ReleaseTagMatcher, TriggerContext};

#[derive(Parser, Debug)]
#[command(name = "releaseflow", version, about = "Release-gating CI pipeline")]
struct Cli {
    /// Configuration file (TOML).
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline for a trigger.
    Run(RunArgs),

    /// Show which stages a trigger would run, and the release descriptor for tags.
    Describe {
        #[command(flatten)]
        trigger: TriggerArgs,

        /// Emit JSON (machine-readable).
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    trigger: TriggerArgs,

    /// Directory commands run in and relative paths resolve against.
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,

    /// Exit with 10 + index of the failing stage instead of 1.
    #[arg(long)]
    stage_exit_codes: bool,

    /// Log what would be published instead of uploading.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct TriggerArgs {
    /// Event kind (push, pull_request, tag_push). Inferred from the ref if omitted.
    #[arg(long)]
    event: Option<EventKind>,

    /// Git ref, e.g. refs/heads/main or refs/tags/v2.0.1. A bare tag name is accepted with --event tag_push.
    #[arg(long = "ref", value_name = "REF")]
    ref_name: Option<String>,

    /// Read GITHUB_EVENT_NAME and GITHUB_REF from the environment.
    #[arg(long, conflicts_with_all = ["event", "ref_name"])]
    from_env: bool,
}

impl TriggerArgs {
    fn resolve(&self, config: &Config) -> Result<TriggerContext> {
        let matcher = ReleaseTagMatcher::from_option(config.trigger.release_tag_pattern.as_deref())?;

        if self.from_env || (self.event.is_none() && self.ref_name.is_none()) {
            return TriggerContext::from_ci_env(|key| std::env::var(key).ok(), &matcher)
                .context("Failed to read the trigger from the CI environment");
        }

        let Some(ref_name) = &self.ref_name else {
            bail!("--ref is required when --event is given");
        };
        Ok(TriggerContext::from_parts(self.event, ref_name, &matcher))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_settings(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            load_config(Some(path))
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => load_config(None).context("Failed to load default configuration")?,
    };
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let outcome = match cli.command {
        Command::Run(args) => run(cli.config.as_deref(), args).await,
        Command::Describe { trigger, json } => describe(cli.config.as_deref(), &trigger, json),
        Command::Config => print_config(cli.config.as_deref()),
    };

    outcome.unwrap_or_else(|e| {
        error!("{e:#}");
        ExitCode::from(EXIT_CONFIG_ERROR)
    })
}

async fn run(config_path: Option<&Path>, args: RunArgs) -> Result<ExitCode> {
    let mut config = load_settings(config_path)?;
    if let Some(workdir) = args.workdir {
        config.pipeline.workdir = workdir;
    }
    if args.stage_exit_codes {
        config.pipeline.stage_exit_codes = true;
    }
    if config.artifact.env_file.is_none() {
        config.artifact.env_file = std::env::var_os("GITHUB_ENV").map(PathBuf::from);
    }

    let trigger = args.trigger.resolve(&config)?;

    // Branch and pull-request runs never publish, so they need no credentials.
    let dry_run = args.dry_run || !trigger.is_release_tag();
    let repository = config
        .publish
        .repository
        .clone()
        .or_else(|| std::env::var("GITHUB_REPOSITORY").ok());
    let publisher = publisher_from_config(&config.publish, repository, dry_run)
        .context("Failed to configure the release publisher")?;
    let pipeline = release_pipeline(&config, publisher)?;

    let mut identity = RunIdentity::new();
    if let Ok(external_id) = std::env::var("GITHUB_RUN_ID") {
        identity = identity.with_external_id(external_id);
    }

    let token = Arc::new(CancellationToken::new());
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling run");
                token.cancel("interrupted");
            }
        });
    }

    let ctx = RunContext::new(trigger)
        .with_identity(identity)
        .with_workdir(&config.pipeline.workdir)
        .with_event_sink(Arc::new(LoggingEventSink::default()))
        .with_cancellation(token);

    let result = pipeline.run(&ctx).await;

    if args.json {
        let report = serde_json::to_string_pretty(&result).context("Failed to serialize run report")?;
        println!("{report}");
    } else {
        print_summary(&result);
    }

    let policy = if config.pipeline.stage_exit_codes {
        ExitCodePolicy::PerStage
    } else {
        ExitCodePolicy::Uniform
    };
    Ok(ExitCode::from(result.exit_code(policy)))
}

fn print_summary(result: &PipelineRunResult) {
    println!("{} {} ({})", result.pipeline, result.status, result.trigger);
    for stage in &result.stages {
        let detail = match stage.outcome {
            StageOutcome::Skipped => stage.skip_reason.clone().unwrap_or_default(),
            StageOutcome::Failure => {
                let message = stage.error.as_ref().map(|e| e.message.clone()).unwrap_or_default();
                if stage.tolerated {
                    format!("tolerated: {message}")
                } else {
                    message
                }
            }
            _ => stage.duration_ms.map(|ms| format!("{ms} ms")).unwrap_or_default(),
        };
        let outcome = stage.outcome.to_string();
        println!("  {:>2}. {:<24} {outcome:<8} {detail}", stage.index, stage.name);
    }
    for (key, value) in &result.exports {
        println!("  {key}={value}");
    }
}

fn describe(config_path: Option<&Path>, args: &TriggerArgs, json: bool) -> Result<ExitCode> {
    let config = load_settings(config_path)?;
    let trigger = args.resolve(&config)?;
    let pipeline = release_pipeline(&config, Arc::new(DryRunPublisher))?;
    let plan = pipeline.plan(&trigger);
    let descriptor = ReleaseArtifactDescriptor::for_trigger(
        &trigger,
        &config.artifact.name,
        config.artifact.effective_inputs(),
        Utc::now(),
    );

    if json {
        let report = serde_json::json!({
            "trigger": trigger,
            "plan": plan,
            "descriptor": descriptor,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("trigger: {trigger} (release tag: {})", trigger.is_release_tag());
    for (position, stage) in plan.iter().enumerate() {
        let verdict = if stage.runs { "run" } else { "skip" };
        println!(
            "  {:>2}. {:<24} {verdict:<4} [{}, {:?}]",
            position + 1,
            stage.name,
            stage.condition,
            stage.fatality
        );
    }
    if let Some(descriptor) = descriptor {
        for (key, value) in descriptor.exports() {
            println!("  {key}={value}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn print_config(config_path: Option<&Path>) -> Result<ExitCode> {
    let config = load_settings(config_path)?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render configuration")?;
    print!("{rendered}");
    Ok(ExitCode::SUCCESS)
}
