use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axe_mode::host::{InMemoryHost, PageFixture};
use axe_mode::report::{read_document, read_report};
use axe_mode::script::{Script, Session, StepRecord};
use axemode_audit_oracle::{AuditOracle, CommandOracle, ReportFileOracle};
use axemode_core_types::TargetSelector;
use axemode_overlay::{
    segment, AxeMode, NameResolver, OverlayConfig, OverlayDeps, OverlaySnapshot, PanelView,
    ViolationsByTarget,
};
use axemode_policy_center::{load_snapshot_with_options, LoadOptions, PolicySnapshot};
use axemode_scheduler::{metrics as scheduler_metrics, AuditScheduler, IdleExecutor, ManualIdleExecutor};
use axemode_state_center::{ActivationCenter, InMemoryStateCenter, StateCenterStats};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// axe-mode - live accessibility overlay
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path (YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    /// Log line format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    output: OutputFormat,

    /// Policy override as `path=value`; may be repeated
    #[arg(long = "set", value_name = "PATH=VALUE")]
    overrides: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Yaml,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Group an audit report's violations by affected element
    Segment(SegmentArgs),
    /// Print the detail panels an audit report would produce
    Inspect(InspectArgs),
    /// Drive the overlay against an in-memory page with a scripted session
    Simulate(SimulateArgs),
    /// Show the effective configuration and where each value came from
    Config,
}

#[derive(Args)]
struct SegmentArgs {
    /// Audit results file (`{"violations": [...]}` or a bare list)
    #[arg(long, value_name = "FILE")]
    report: PathBuf,
}

#[derive(Args)]
struct InspectArgs {
    #[arg(long, value_name = "FILE")]
    report: PathBuf,

    /// Only show the panel for this selector
    #[arg(long, value_name = "SELECTOR")]
    target: Option<String>,
}

#[derive(Args)]
struct SimulateArgs {
    /// Page layout fixture: element selectors with rectangles
    #[arg(long, value_name = "FILE")]
    page: PathBuf,

    /// Session script
    #[arg(long, value_name = "FILE")]
    script: PathBuf,

    /// Audit results file re-read on every audit; falls back to `oracle.command`
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Write the diagnostics ring to this file as JSON
    #[arg(long, value_name = "FILE")]
    diagnostics: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.debug, cli.log_format)?;
    info!(target: "axemode.cli", "axe-mode v{}", env!("CARGO_PKG_VERSION"));

    let result = match load_policy(cli.config.as_deref(), &cli.overrides) {
        Ok(policy) => match cli.command {
            Commands::Segment(args) => cmd_segment(args, cli.output),
            Commands::Inspect(args) => cmd_inspect(args, cli.output),
            Commands::Simulate(args) => cmd_simulate(args, &policy, cli.output).await,
            Commands::Config => cmd_config(&policy, cli.output),
        },
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(target: "axemode.cli", "Command failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(level: &str, debug: bool, format: LogFormat) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    Ok(())
}

fn load_policy(path: Option<&Path>, overrides: &[String]) -> Result<PolicySnapshot> {
    let options = LoadOptions {
        paths: path.map(|p| vec![p.to_path_buf()]).unwrap_or_default(),
        include_env: true,
        cli_overrides: overrides.to_vec(),
    };
    load_snapshot_with_options(&options).context("Failed to load configuration")
}

fn emit<T: serde::Serialize>(payload: &T, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(payload)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(payload)?),
        OutputFormat::Human => {}
    }
    Ok(())
}

fn cmd_segment(args: SegmentArgs, output: OutputFormat) -> Result<()> {
    let violations = read_report(&args.report)?;
    let segmented = segment(&violations);
    info!(
        target: "axemode.cli",
        violations = violations.len(),
        targets = segmented.len(),
        "report.segmented"
    );

    if !matches!(output, OutputFormat::Human) {
        return emit(&segmented, output);
    }
    print_segments(&segmented, violations.len());
    Ok(())
}

fn print_segments(segmented: &ViolationsByTarget, total: usize) {
    println!("{} violation(s) across {} target(s)", total, segmented.len());
    for group in segmented.iter() {
        let ids: Vec<&str> = group.violations.iter().map(|v| v.id.as_str()).collect();
        println!("  {} -> {}", group.target, ids.join(", "));
    }
}

fn cmd_inspect(args: InspectArgs, output: OutputFormat) -> Result<()> {
    let violations = read_report(&args.report)?;
    let segmented = segment(&violations);

    let panels: Vec<PanelView> = match &args.target {
        Some(target) => {
            let selector = TargetSelector::from(target.as_str());
            let Some(group) = segmented.get(&selector) else {
                bail!("no violations reported for {target}");
            };
            vec![PanelView::build(&selector, group, None)]
        }
        None => segmented
            .iter()
            .map(|group| PanelView::build(&group.target, &group.violations, None))
            .collect(),
    };

    if !matches!(output, OutputFormat::Human) {
        return emit(&panels, output);
    }
    for panel in &panels {
        print!("{}", panel.render_text());
        println!();
    }
    Ok(())
}

async fn cmd_simulate(args: SimulateArgs, policy: &PolicySnapshot, output: OutputFormat) -> Result<()> {
    let config = OverlayConfig::from_policy(policy)?;
    let page: PageFixture = read_document(&args.page)?;
    let script: Script = read_document(&args.script)?;

    let oracle: Arc<dyn AuditOracle> = match (&args.report, &policy.oracle.command) {
        (Some(report), _) => Arc::new(ReportFileOracle::new(report.clone())),
        (None, Some(command)) => Arc::new(CommandOracle::new(command.clone(), policy.oracle.args.clone())),
        (None, None) => bail!("simulate needs --report or an oracle.command setting"),
    };

    let host = Arc::new(InMemoryHost::new(page, config.frame_interval));
    let diagnostics = Arc::new(InMemoryStateCenter::new(policy.diagnostics.capacity));
    let idle = Arc::new(ManualIdleExecutor::new());
    let scheduler = if config.scheduler.force_sync {
        AuditScheduler::new(None)
    } else {
        AuditScheduler::new(Some(idle.clone() as Arc<dyn IdleExecutor>))
    };
    let activation = Arc::new(ActivationCenter::new(config.initial_flags));
    let deps = OverlayDeps {
        oracle,
        lookup: host.clone(),
        surface: host.clone(),
        names: Some(host.clone() as Arc<dyn NameResolver>),
        state_center: diagnostics.clone(),
    };
    let overlay = AxeMode::with_parts(config, deps, activation, scheduler);

    let session = Session {
        overlay: &overlay,
        host: &host,
        idle: &idle,
    };
    let steps = session.run(&script).await?;
    let snapshot = overlay.snapshot().await;
    let panels = host.visible_panels();
    let stats = diagnostics.stats();

    if let Some(path) = &args.diagnostics {
        diagnostics
            .write_snapshot(path)
            .with_context(|| format!("Failed to write diagnostics to {}", path.display()))?;
        info!(target: "axemode.cli", path = %path.display(), "diagnostics.written");
    }

    if matches!(output, OutputFormat::Human) {
        print_simulation(&steps, &snapshot, &panels, &stats);
    } else {
        let payload = json!({
            "steps": steps,
            "overlay": snapshot,
            "markers": host.markers(),
            "panels": panels,
            "diagnostics": stats,
            "scheduler": scheduler_metrics::snapshot(),
        });
        emit(&payload, output)?;
    }

    overlay.unmount().await;
    Ok(())
}

fn print_simulation(
    steps: &[StepRecord],
    snapshot: &OverlaySnapshot,
    panels: &[PanelView],
    stats: &StateCenterStats,
) {
    for record in steps {
        let mut line = format!("step {:>2} {}", record.index, record.step);
        for (selector, state) in &record.transitions {
            line.push_str(&format!(" {selector}={state:?}"));
        }
        if let Some(note) = &record.note {
            line.push_str(&format!(" ({note})"));
        }
        println!("{line}");
    }
    println!();
    println!(
        "{} suspended={} mode={:?} targets={}",
        snapshot.cycle,
        snapshot.suspended,
        snapshot.mode,
        snapshot.targets.len()
    );
    if let Some(err) = &snapshot.last_error {
        println!("last audit failed: {err}");
    }
    for entry in &snapshot.entries {
        println!(
            "  {} [{:?}] {} {:?} -> {}",
            entry.selector,
            entry.role,
            entry.rect,
            entry.state,
            entry.violations.join(", ")
        );
    }
    for panel in panels {
        println!();
        print!("{}", panel.render_text());
    }
    println!();
    println!(
        "audits: scheduled={} superseded={} completed={} failed={} discarded={} lookup_failures={}",
        stats.audits_scheduled,
        stats.audits_superseded,
        stats.audits_completed,
        stats.audits_failed,
        stats.audits_discarded,
        stats.lookup_failures
    );
}

fn cmd_config(policy: &PolicySnapshot, output: OutputFormat) -> Result<()> {
    if !matches!(output, OutputFormat::Human) {
        return emit(policy, output);
    }
    let value = serde_json::to_value(policy)?;
    println!("Policy Revision: {}", policy.rev);
    for (path, provenance) in &policy.provenance {
        let pointer = format!("/{}", path.replace('.', "/"));
        let current = value
            .pointer(&pointer)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("  {path} = {current} ({:?})", provenance.source);
    }
    Ok(())
}
