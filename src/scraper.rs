//! Scrape orchestrator
//!
//! load ids → resume diff → bounded concurrent fetch → batched RESULT / ERROR appends.
//!
//! Fetches run as spawned tasks, at most `max_workers` at a time. A single
//! consumer owns both batch writers, so nothing mutable is shared between
//! workers. Outcomes arrive in completion order; rows are keyed, not ordered.

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, info_span, warn, Instrument};

use crate::core::batch::BatchWriter;
use crate::core::flatten::{detail_to_row, error_header, failure_to_row, result_header, row_identifier};
use crate::core::normalize::collect_identifiers;
use crate::core::resume::ResumeIndex;
use crate::models::config::ScraperConfig;
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{FetchFailure, NotifyNumber, Outcome, Row};
use crate::providers::registry::RegistryClient;
use crate::sheets::{
    output_layout, prepare_output, read_identifier_cells, read_only, GoogleSheetsClient, Sheet,
    SheetLocation, SheetSink,
};
use crate::telemetry::{export_summary, RunStats, RunSummary};

/// Progress is logged at most this often
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Granularity of interval flush checks
const TICK: Duration = Duration::from_secs(1);

/// What a run would do
#[derive(Debug, Clone)]
pub struct Plan {
    /// Distinct identifiers in the input
    pub total: usize,
    /// Of those, already present in RESULT
    pub already_done: usize,
    /// Still to fetch, in input order
    pub pending: Vec<NotifyNumber>,
}

impl Plan {
    pub fn build(input_cells: &[String], output_rows: &[Row]) -> Self {
        let ids = collect_identifiers(input_cells);
        let total = ids.len();
        let index = ResumeIndex::from_rows(output_rows);
        let pending = index.pending(ids);
        Self {
            total,
            already_done: total - pending.len(),
            pending,
        }
    }
}

pub struct Scraper {
    config: ScraperConfig,
    registry: RegistryClient,
    input: Sheet,
    results: Sheet,
    errors: Sheet,
    stats: Arc<RunStats>,
}

impl Scraper {
    /// Resolve every location in the config and build the clients
    pub fn new(config: ScraperConfig) -> AppResult<Self> {
        config.validate()?;

        let input: SheetLocation = config.input.parse()?;
        let results: SheetLocation = config.results.parse()?;
        let errors: SheetLocation = config.errors.parse()?;

        let needs_google = [&input, &results, &errors]
            .iter()
            .any(|loc| matches!(loc, SheetLocation::Google { .. }));

        let google = if needs_google {
            let token = config
                .google_token
                .as_deref()
                .ok_or_else(|| AppError::missing_env("GOOGLE_OAUTH_TOKEN"))?;
            Some(GoogleSheetsClient::new(
                &config.sheets_api_url,
                token,
                config.request_timeout(),
            )?)
        } else {
            None
        };

        let input = Sheet::open(&input, google.as_ref())?;
        let results = Sheet::open(&results, google.as_ref())?;
        let errors = Sheet::open(&errors, google.as_ref())?;

        Self::with_sheets(config, input, results, errors)
    }

    /// Build from already opened sheets
    pub fn with_sheets(config: ScraperConfig, input: Sheet, results: Sheet, errors: Sheet) -> AppResult<Self> {
        config.validate()?;
        for sheet in [&results, &errors] {
            if !sheet.is_writable() {
                return Err(read_only(&sheet.describe()));
            }
        }
        let registry = RegistryClient::new(&config.registry_url, config.request_timeout())?;
        Ok(Self {
            config,
            registry,
            input,
            results,
            errors,
            stats: Arc::new(RunStats::new()),
        })
    }

    pub fn stats(&self) -> Arc<RunStats> {
        self.stats.clone()
    }

    /// Read the input and the RESULT sheet and compute what is left to do.
    /// Writes nothing.
    pub async fn plan(&self) -> AppResult<Plan> {
        let input_rows = self.input.read_rows().await?;
        let cells = read_identifier_cells(&input_rows, &self.config.input_column())?;
        let output_rows = self.results.read_rows().await?;
        Ok(Plan::build(&cells, &output_rows))
    }

    pub async fn run(&self) -> AppResult<RunSummary> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run until done or until `shutdown` resolves. On shutdown, in-flight
    /// fetch tasks are aborted and everything already received is flushed.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> AppResult<RunSummary> {
        let span = info_span!("run", id = %self.stats.run_id());
        self.run_inner(shutdown).instrument(span).await
    }

    async fn run_inner(&self, shutdown: impl Future<Output = ()>) -> AppResult<RunSummary> {
        info!("🚀 Starting scrape");
        info!("📥 Input:  {}", self.input.describe());
        info!("📤 Result: {}", self.results.describe());
        info!("📤 Errors: {}", self.errors.describe());

        if self.config.dry_run {
            let plan = self.plan().await?;
            self.report_plan(&plan);
            if !plan.pending.is_empty() {
                info!("🧪 Dry run, nothing fetched");
            }
            return self.finish_summary();
        }

        let header = result_header(&self.config.detail_columns, self.config.capture_extra);
        let input_rows = self.input.read_rows().await?;
        let cells = read_identifier_cells(&input_rows, &self.config.input_column())?;
        let output_rows = prepare_output(&self.results, &header).await?;
        let error_rows = prepare_output(&self.errors, &error_header()).await?;
        let plan = Plan::build(&cells, &output_rows);
        self.report_plan(&plan);
        if plan.pending.is_empty() {
            return self.finish_summary();
        }

        let layouts = Layouts {
            result: output_layout(&output_rows, &header),
            error: output_layout(&error_rows, &error_header()),
        };
        self.fetch_all(plan.pending, &layouts, shutdown).await?;
        self.finish_summary()
    }

    fn report_plan(&self, plan: &Plan) {
        self.stats
            .record_plan(plan.total, plan.already_done, plan.pending.len());
        info!("Total notify numbers: {}", plan.total);
        info!("Already done       : {}", plan.already_done);
        info!("To do              : {}", plan.pending.len());
        if plan.pending.is_empty() {
            info!("✅ All notify numbers are already processed");
        }
    }

    async fn fetch_all(
        &self,
        pending: Vec<NotifyNumber>,
        layouts: &Layouts,
        shutdown: impl Future<Output = ()>,
    ) -> AppResult<()> {
        let config = &self.config;
        let policy = config.retry_policy();

        let mut result_writer = BatchWriter::new(&self.results, "RESULT", config.batch_size, config.flush_interval());
        let mut error_writer = BatchWriter::new(&self.errors, "ERROR", config.batch_size, config.flush_interval());

        let mut outcomes = stream::iter(pending)
            .map(|id| {
                let registry = self.registry.clone();
                async move {
                    let task_id = id.clone();
                    let mut task = FetchTask(tokio::spawn(async move { registry.fetch_detail(id, &policy).await }));
                    match (&mut task.0).await {
                        Ok(outcome) => outcome,
                        Err(e) => Outcome::Failure {
                            id: task_id,
                            failure: FetchFailure::from_error(&AppError::unhandled(e.to_string()), 0),
                        },
                    }
                }
            })
            .buffer_unordered(config.max_workers);

        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_progress = Instant::now();
        tokio::pin!(shutdown);

        // Mid-run append failures keep rows buffered for the next flush and
        // are logged by the writer, so their results are not inspected here.
        info!("🔍 Fetching with {} workers", config.max_workers);
        loop {
            tokio::select! {
                next = outcomes.next() => {
                    let Some(outcome) = next else { break };
                    self.stats.record_outcome(&outcome);
                    match outcome {
                        Outcome::Success { id, detail, .. } => {
                            let row = detail_to_row(&id, &detail, &layouts.result, Utc::now());
                            let _ = result_writer.push(row).await;
                        }
                        Outcome::Failure { id, failure } => {
                            let row = failure_to_row(&id, &failure, &layouts.error, Utc::now());
                            let _ = error_writer.push(row).await;
                        }
                    }
                }
                _ = ticker.tick() => {
                    let _ = result_writer.tick().await;
                    let _ = error_writer.tick().await;
                    if last_progress.elapsed() >= PROGRESS_LOG_INTERVAL {
                        info!("{}", self.stats.progress_line());
                        last_progress = Instant::now();
                    }
                }
                _ = &mut shutdown => {
                    warn!("🛑 Shutdown requested, flushing {} buffered rows", result_writer.pending() + error_writer.pending());
                    break;
                }
            }
            self.divert_rejected(&mut result_writer, &mut error_writer, layouts).await;
            self.stats
                .record_rows_written(result_writer.rows_written(), error_writer.rows_written());
        }
        // Drops the in-flight fetches, aborting their tasks
        drop(outcomes);
        info!("{}", self.stats.progress_line());

        // Remaining rows must land; a failure here loses data, so it is surfaced
        let results_flushed = result_writer.finish().await;
        self.divert_rejected(&mut result_writer, &mut error_writer, layouts).await;
        let errors_flushed = error_writer.finish().await;
        self.divert_rejected(&mut result_writer, &mut error_writer, layouts).await;
        self.stats
            .record_rows_written(result_writer.rows_written(), error_writer.rows_written());
        results_flushed?;
        errors_flushed?;
        Ok(())
    }

    /// RESULT rows the sheet refused on their own become ERROR rows.
    /// Refused ERROR rows can only be logged.
    async fn divert_rejected<S: SheetSink>(
        &self,
        result_writer: &mut BatchWriter<S>,
        error_writer: &mut BatchWriter<S>,
        layouts: &Layouts,
    ) {
        for (row, err) in error_writer.take_rejected() {
            error!("❌ ERROR row dropped ({}): {:?}", err, row);
        }
        for (row, err) in result_writer.take_rejected() {
            let Some(id) = row_identifier(&layouts.result, &row) else {
                error!("❌ RESULT row dropped ({}): {:?}", err, row);
                continue;
            };
            let failure = FetchFailure {
                code: err.code,
                message: format!("RESULT append rejected: {}", err.message),
                attempts: 0,
            };
            let row = failure_to_row(&id, &failure, &layouts.error, Utc::now());
            let _ = error_writer.push(row).await;
        }
    }

    fn finish_summary(&self) -> AppResult<RunSummary> {
        let summary = self.stats.snapshot();
        info!("{}", summary.report());
        if let Some(path) = &self.config.summary_path {
            match export_summary(&summary, path) {
                Ok(path) => info!("✅ Summary exported to: {}", path.display()),
                Err(e) => warn!("❌ Summary export failed: {}", e),
            }
        }
        Ok(summary)
    }
}

/// Column order of the output sheets, taken from their existing headers
struct Layouts {
    result: Row,
    error: Row,
}

/// A spawned fetch that is aborted when its future is dropped
struct FetchTask(JoinHandle<Outcome>);

impl Drop for FetchTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}
