//! Pullplan CLI — validate, resolve, catalog and schedule commands.
//!
//! Commands:
//! - `validate` — schema-check one template document
//! - `resolve` — run one document through the pipeline and print the report
//! - `catalog` — resolve a directory of documents and write plan artifacts
//! - `schedule` — print the intraday pull schedule derived from a catalog
//!
//! Reports go to stdout; logs go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pullplan_core::{
    DocumentError, ResolveOptions, Resolver, RunReport, ScopePolicy, TemplateOutcome, Validator,
};
use pullplan_runner::{
    format_offset, units_csv, write_artifacts, BatchReport, BatchResolver, Catalog, RunnerConfig,
    Schedule,
};

#[derive(Parser)]
#[command(
    name = "pullplan",
    about = "Pullplan CLI — resolve data-pull templates into concrete fetch plans"
)]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schema-check a template document and list every violation.
    Validate {
        /// Path to a JSON template document.
        file: PathBuf,

        /// Ignore template keys outside the schema instead of rejecting them.
        #[arg(long, default_value_t = false)]
        allow_unknown_fields: bool,
    },
    /// Resolve a template document and print the report.
    Resolve {
        /// Path to a JSON template document.
        file: PathBuf,

        /// When an undated template is an error: require, when_resolved, allow (default).
        #[arg(long)]
        scope: Option<ScopePolicy>,

        /// Ignore template keys outside the schema instead of rejecting them.
        #[arg(long, default_value_t = false)]
        allow_unknown_fields: bool,

        /// Report format.
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },
    /// Resolve every document in a templates directory and write artifacts.
    Catalog {
        /// Path to a runner TOML config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Templates directory (overrides the config).
        #[arg(long)]
        templates_dir: Option<PathBuf>,

        /// Output directory (overrides the config).
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Resolve on one thread.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Print the pull schedule derived from a templates directory.
    Schedule {
        /// Path to a runner TOML config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Templates directory (overrides the config).
        #[arg(long)]
        templates_dir: Option<PathBuf>,

        /// Schedule format (csv is not supported here).
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
    Csv,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match cli.command {
        Commands::Validate {
            file,
            allow_unknown_fields,
        } => run_validate(&file, allow_unknown_fields),
        Commands::Resolve {
            file,
            scope,
            allow_unknown_fields,
            format,
        } => run_resolve(&file, scope, allow_unknown_fields, format),
        Commands::Catalog {
            config,
            templates_dir,
            output_dir,
            sequential,
        } => run_catalog(config, templates_dir, output_dir, sequential),
        Commands::Schedule {
            config,
            templates_dir,
            format,
        } => run_schedule(config, templates_dir, format),
    }
}

fn init_logging(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn read_document(path: &Path) -> Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn load_config(
    config_path: Option<PathBuf>,
    templates_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<RunnerConfig> {
    let mut config = match config_path {
        Some(path) => RunnerConfig::from_file(&path)?,
        None => RunnerConfig::default(),
    };
    if let Some(dir) = templates_dir {
        config.templates_dir = dir;
    }
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    Ok(config)
}

fn resolve_catalog(config: &RunnerConfig) -> Result<BatchReport> {
    let catalog = Catalog::load_dir(&config.templates_dir)?;
    info!(
        dir = %config.templates_dir.display(),
        documents = catalog.len(),
        "catalog loaded"
    );
    Ok(BatchResolver::from_config(config).resolve_catalog(&catalog))
}

// ── Commands ─────────────────────────────────────────────────────────

fn run_validate(file: &Path, allow_unknown_fields: bool) -> Result<()> {
    let doc = read_document(file)?;
    match Validator::new(!allow_unknown_fields).validate(&doc) {
        Ok(config) => {
            println!(
                "{}: valid ({} template(s){})",
                file.display(),
                config.templates.len(),
                if config.common.is_some() { ", with common" } else { "" }
            );
            Ok(())
        }
        Err(violations) => {
            for v in &violations {
                println!("{v}");
            }
            bail!("{}: {} violation(s)", file.display(), violations.len());
        }
    }
}

fn run_resolve(
    file: &Path,
    scope: Option<ScopePolicy>,
    allow_unknown_fields: bool,
    format: ReportFormat,
) -> Result<()> {
    let doc = read_document(file)?;
    let resolver = Resolver::new(ResolveOptions {
        scope: scope.unwrap_or_default(),
        deny_unknown_fields: !allow_unknown_fields,
    });

    let report = match resolver.resolve(&doc) {
        Ok(report) => report,
        Err(err) => {
            print_document_error(&err);
            bail!("{}: {err}", file.display());
        }
    };

    match format {
        ReportFormat::Text => print_report(&report),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ReportFormat::Csv => print!("{}", units_csv(&report)?),
    }

    if !report.is_clean() {
        bail!(
            "{} of {} template(s) failed",
            report.failures().count(),
            report.outcomes.len()
        );
    }
    Ok(())
}

fn run_catalog(
    config_path: Option<PathBuf>,
    templates_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    sequential: bool,
) -> Result<()> {
    let mut config = load_config(config_path, templates_dir, output_dir)?;
    if sequential {
        config.parallel = false;
    }

    let batch = resolve_catalog(&config)?;
    let written = write_artifacts(&config.output_dir, &batch)?;

    for doc in &batch.documents {
        match &doc.result {
            Ok(report) => println!(
                "{:<24} {:>4} planned {:>4} failed {:>8} units  {}",
                doc.name,
                report.plans().count(),
                report.failures().count(),
                report.unit_count(),
                &report.fingerprint()[..12],
            ),
            Err(err) => println!("{:<24} rejected: {err}", doc.name),
        }
    }
    println!(
        "{} file(s) written to {}",
        written.len(),
        config.output_dir.display()
    );
    Ok(())
}

fn run_schedule(
    config_path: Option<PathBuf>,
    templates_dir: Option<PathBuf>,
    format: ReportFormat,
) -> Result<()> {
    if format == ReportFormat::Csv {
        bail!("--format csv is not supported for schedules");
    }
    let config = load_config(config_path, templates_dir, None)?;
    let batch = resolve_catalog(&config)?;

    let Some(schedule) = Schedule::build(&batch, &config.schedule) else {
        println!("No plan has a resolution; nothing to schedule.");
        return Ok(());
    };

    if format == ReportFormat::Json {
        println!("{}", serde_json::to_string_pretty(&schedule)?);
        return Ok(());
    }

    println!(
        "Every {} from {} to {} ({} cycle(s))",
        schedule.interval,
        schedule.first_cycle,
        schedule.last_cycle,
        schedule.cycle_count()
    );
    for item in &schedule.items {
        println!(
            "  {}[{}]  {:<10} {} unit(s)",
            item.document,
            item.template_index,
            item.resolution.as_ref().map_or("-", |r| r.as_str()),
            item.units
        );
    }
    for offset in schedule.cycles() {
        println!("  {}  {} due", format_offset(offset), schedule.due_at(offset).count());
    }
    Ok(())
}

// ── Output ───────────────────────────────────────────────────────────

fn print_report(report: &RunReport) {
    for outcome in &report.outcomes {
        match outcome {
            TemplateOutcome::Planned(plan) => {
                let e = &plan.expanded;
                println!(
                    "templates[{}]: {} {} {} {}x{} -> {} unit(s), {} {} row(s) x {} col(s)",
                    plan.template_index,
                    e.vendor,
                    e.endpoint,
                    e.resolution.as_ref().map_or("-", |r| r.as_str()),
                    e.symbols.len(),
                    e.fields.len(),
                    e.len(),
                    e.orientation,
                    plan.shape.row_count(),
                    plan.shape.columns().len(),
                );
            }
            TemplateOutcome::Failed(failure) => {
                println!("templates[{}]: FAILED", failure.template_index);
                for err in &failure.errors {
                    println!("  - {err}");
                }
            }
        }
    }
    println!(
        "{} planned, {} failed, {} unit(s)",
        report.plans().count(),
        report.failures().count(),
        report.unit_count()
    );
}

fn print_document_error(err: &DocumentError) {
    for v in err.violations() {
        eprintln!("  {v}");
    }
}
