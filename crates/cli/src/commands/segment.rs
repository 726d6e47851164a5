use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use storefront_core::clock::clock_for;
use storefront_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use storefront_core::errors::{ApplicationError, InterfaceError};
use storefront_core::rfm::{
    ReportStats, RunDiagnostics, SegmentSummary, SegmentationEngine, SegmentationOptions,
    SegmentationRun, WalkInPolicy,
};
use storefront_core::source::AnalysisScope;
use tracing::warn;
use uuid::Uuid;

use crate::commands::CommandResult;
use crate::source::JsonFileSource;

const COMMAND: &str = "segment";

#[derive(Clone, Debug, Args)]
pub struct SegmentArgs {
    #[arg(help = "Path to a JSON transaction snapshot (array or {\"transactions\": [...]})")]
    pub input: PathBuf,
    #[arg(long, help = "Pin the reference time (RFC 3339) instead of using the wall clock")]
    pub now: Option<String>,
    #[arg(long, help = "Drop transactions without a customer instead of pooling them")]
    pub exclude_walk_in: bool,
    #[arg(long, help = "Emit only stats, segment summaries, and diagnostics")]
    pub summary: bool,
    #[arg(long, default_value = "default", help = "Organization the snapshot belongs to")]
    pub organization: String,
    #[arg(long, help = "Path to a storefront.toml config file")]
    pub config: Option<PathBuf>,
}

impl SegmentArgs {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            now: None,
            exclude_walk_in: false,
            summary: false,
            organization: "default".to_string(),
            config: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunSummary<'a> {
    reference_time: DateTime<Utc>,
    stats: &'a ReportStats,
    segments: &'a [SegmentSummary],
    diagnostics: &'a RunDiagnostics,
}

impl<'a> From<&'a SegmentationRun> for RunSummary<'a> {
    fn from(run: &'a SegmentationRun) -> Self {
        Self {
            reference_time: run.reference_time,
            stats: &run.report.stats,
            segments: &run.report.segments,
            diagnostics: &run.diagnostics,
        }
    }
}

pub fn run(args: SegmentArgs) -> CommandResult {
    let correlation_id = Uuid::new_v4().to_string();
    let summary_only = args.summary;

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::correlated_failure(
                COMMAND,
                "internal",
                format!("failed to initialize async runtime: {error}"),
                &correlation_id,
                1,
            );
        }
    };

    match runtime.block_on(segment_snapshot(args)) {
        Ok(run) => {
            let message = format!(
                "segmented {} customers into {} segments",
                run.report.stats.total_customers,
                run.report.segments.len()
            );
            if summary_only {
                CommandResult::success_with_data(
                    COMMAND,
                    message,
                    &correlation_id,
                    &RunSummary::from(&run),
                )
            } else {
                CommandResult::success_with_data(COMMAND, message, &correlation_id, &run)
            }
        }
        Err(error) => {
            let interface = error.into_interface(correlation_id.as_str());
            warn!(
                event_name = "cli.segment.failed",
                correlation_id = %correlation_id,
                error_class = interface.error_class(),
                error = %interface,
                "segmentation command failed"
            );
            CommandResult::correlated_failure(
                COMMAND,
                interface.error_class(),
                format!("{} ({interface})", interface.user_message()),
                &correlation_id,
                exit_code_for(&interface),
            )
        }
    }
}

async fn segment_snapshot(args: SegmentArgs) -> Result<SegmentationRun, ApplicationError> {
    let overrides = ConfigOverrides {
        walk_in_policy: args.exclude_walk_in.then_some(WalkInPolicy::Exclude),
        reference_time: args.now,
        ..ConfigOverrides::default()
    };
    let config = AppConfig::load(LoadOptions {
        require_file: args.config.is_some(),
        config_path: args.config,
        overrides,
    })?;

    let engine = SegmentationEngine::new(SegmentationOptions::from_config(&config));
    let clock = clock_for(config.segmentation.reference_time.as_deref());
    let source = JsonFileSource::new(args.input);
    let scope = AnalysisScope::organization(args.organization);

    engine.analyze_source(&source, &scope, clock.as_ref()).await
}

fn exit_code_for(error: &InterfaceError) -> u8 {
    match error {
        InterfaceError::BadRequest { .. } => 2,
        InterfaceError::ServiceUnavailable { .. } => 3,
        InterfaceError::Internal { .. } => 1,
    }
}
