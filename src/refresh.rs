use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{interval_at, Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    config::RefreshConfig,
    errors::{FetchError, MonitorError},
    fetcher::StatsFetcher,
    history::HistoryRecorder,
    model::{MonitorTarget, StatsResponse},
    table::RenderedTable,
};

/// Requests handled by the controller loop
#[derive(Debug)]
pub enum RefreshCommand {
    /// New target submitted: fetch now and (re)start the timer
    Start(MonitorTarget),
    /// Auto-refresh toggle
    SetEnabled(bool),
    /// Cancel the timer
    Stop,
    /// Copy of the rendered table
    QueryTable {
        response_tx: oneshot::Sender<RenderedTable>,
    },
    /// Current controller status
    QueryStatus {
        response_tx: oneshot::Sender<RefreshStatus>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshStatus {
    pub enabled: bool,
    pub running: bool,
    pub in_flight: usize,
    pub last_sequence: u64,
    pub applied_sequence: u64,
}

/// What happened to a finished request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Applied { rows: usize },
    Stale,
    Rejected { status: String },
    Failed,
}

/// Enabled flag and request numbering
#[derive(Debug, Clone)]
pub struct RefreshState {
    enabled: bool,
    last_sequence: u64,
}

impl RefreshState {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last_sequence: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Number for the next request, strictly increasing
    pub fn next_sequence(&mut self) -> u64 {
        self.last_sequence += 1;
        self.last_sequence
    }

    /// Sequence to dispatch for a timer tick, `None` while disabled
    pub fn on_tick(&mut self) -> Option<u64> {
        self.enabled.then(|| self.next_sequence())
    }
}

struct FetchCompletion {
    sequence: u64,
    result: Result<StatsResponse, FetchError>,
}

/// Single owner of the timer, the toggle and the rendered table
pub struct RefreshController {
    config: RefreshConfig,
    fetcher: Arc<StatsFetcher>,
    state: RefreshState,
    table: RenderedTable,
    history: Option<HistoryRecorder>,
    target: Option<Arc<MonitorTarget>>,
    timer: Option<Interval>,
    in_flight: usize,
    command_rx: mpsc::Receiver<RefreshCommand>,
    completion_tx: mpsc::UnboundedSender<FetchCompletion>,
    completion_rx: mpsc::UnboundedReceiver<FetchCompletion>,
}

impl RefreshController {
    pub fn new(config: RefreshConfig, fetcher: StatsFetcher) -> (Self, RefreshHandle) {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let controller = Self {
            state: RefreshState::new(config.enabled),
            config,
            fetcher: Arc::new(fetcher),
            table: RenderedTable::new(),
            history: None,
            target: None,
            timer: None,
            in_flight: 0,
            command_rx,
            completion_tx,
            completion_rx,
        };

        (controller, RefreshHandle { command_tx })
    }

    /// Save applied tables through `recorder`
    pub fn with_history(mut self, recorder: HistoryRecorder) -> Self {
        self.history = Some(recorder);
        self
    }

    pub async fn run(&mut self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                shutdown = shutdown_rx.changed() => {
                    match shutdown {
                        Ok(_) => info!("Refresh controller shutting down"),
                        Err(e) => warn!("Shutdown channel closed: {}", e),
                    }
                    break;
                }

                command = self.command_rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => {
                            debug!("All refresh handles dropped");
                            break;
                        }
                    }
                }

                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion.sequence, completion.result);
                }

                _ = next_tick(&mut self.timer) => {
                    self.handle_tick();
                }
            }
        }

        self.timer = None;
        info!("Refresh controller shutdown complete");
    }

    /// Table as it was when the loop exited
    pub fn table(&self) -> &RenderedTable {
        &self.table
    }

    fn handle_command(&mut self, command: RefreshCommand) {
        match command {
            RefreshCommand::Start(target) => self.start(target),

            RefreshCommand::SetEnabled(enabled) => {
                self.state.set_enabled(enabled);
                info!("Auto refresh {}", if enabled { "enabled" } else { "disabled" });
            }

            RefreshCommand::Stop => {
                if self.timer.take().is_some() {
                    info!("Monitoring stopped");
                }
            }

            RefreshCommand::QueryTable { response_tx } => {
                if response_tx.send(self.table.clone()).is_err() {
                    warn!("Failed to send rendered table");
                }
            }

            RefreshCommand::QueryStatus { response_tx } => {
                if response_tx.send(self.status()).is_err() {
                    warn!("Failed to send refresh status");
                }
            }
        }
    }

    fn start(&mut self, target: MonitorTarget) {
        if self.timer.is_some() {
            debug!("Replacing running refresh timer");
        }

        info!(
            "Monitoring {} every {:?} (interfaces: {})",
            target.address,
            self.config.interval,
            if target.interfaces.is_empty() {
                "all".to_string()
            } else {
                target.interfaces.join(", ")
            }
        );

        self.target = Some(Arc::new(target));

        let period = self.config.interval;
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);

        // The submission itself always fetches, the toggle only gates ticks
        let sequence = self.state.next_sequence();
        self.dispatch(sequence);
    }

    fn handle_tick(&mut self) {
        match self.state.on_tick() {
            Some(sequence) => self.dispatch(sequence),
            None => debug!("Auto refresh disabled, skipping tick"),
        }
    }

    fn dispatch(&mut self, sequence: u64) {
        let Some(target) = self.target.clone() else {
            return;
        };

        let fetcher = Arc::clone(&self.fetcher);
        let completion_tx = self.completion_tx.clone();
        self.in_flight += 1;
        debug!("Dispatching stats request #{}", sequence);

        tokio::spawn(async move {
            let result = fetcher.fetch(&target).await;
            // Controller gone means nobody is interested in the result
            let _ = completion_tx.send(FetchCompletion { sequence, result });
        });
    }

    fn handle_completion(
        &mut self,
        sequence: u64,
        result: Result<StatsResponse, FetchError>,
    ) -> CompletionOutcome {
        self.in_flight = self.in_flight.saturating_sub(1);

        let at = now_local();
        let outcome = match result {
            Ok(response) if response.is_success() => {
                let rows = response.rows();
                let count = rows.len();
                if self.table.apply(sequence, rows, at) {
                    CompletionOutcome::Applied { rows: count }
                } else {
                    CompletionOutcome::Stale
                }
            }
            Ok(response) => {
                let status = response.status_label().to_string();
                warn!("Stats request #{} returned status {}", sequence, status);
                self.table
                    .record_error(sequence, format!("backend status: {}", status));
                CompletionOutcome::Rejected { status }
            }
            Err(e) => {
                warn!("Stats request #{} failed: {}", sequence, e);
                self.table.record_error(sequence, e.to_string());
                CompletionOutcome::Failed
            }
        };

        match &outcome {
            CompletionOutcome::Applied { rows } => {
                debug!("Applied stats #{} ({} rows)", sequence, rows);
                if self.config.print_table {
                    println!("{}", self.table.render_text());
                }
                if let Some(recorder) = self.history.as_mut() {
                    if let Err(e) = recorder.record(&self.table, at, std::time::Instant::now()) {
                        warn!("Failed to save history: {}", e);
                    }
                }
            }
            CompletionOutcome::Stale => debug!(
                "Discarded stats #{}, #{} already applied",
                sequence,
                self.table.applied_sequence()
            ),
            _ => {}
        }

        outcome
    }

    fn status(&self) -> RefreshStatus {
        RefreshStatus {
            enabled: self.state.is_enabled(),
            running: self.timer.is_some(),
            in_flight: self.in_flight,
            last_sequence: self.state.last_sequence(),
            applied_sequence: self.table.applied_sequence(),
        }
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Cloneable front end of a running [`RefreshController`]
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    command_tx: mpsc::Sender<RefreshCommand>,
}

impl RefreshHandle {
    async fn send(&self, command: RefreshCommand) -> Result<(), MonitorError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| MonitorError::ControllerGone)
    }

    pub async fn start(&self, target: MonitorTarget) -> Result<(), MonitorError> {
        self.send(RefreshCommand::Start(target)).await
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<(), MonitorError> {
        self.send(RefreshCommand::SetEnabled(enabled)).await
    }

    pub async fn stop(&self) -> Result<(), MonitorError> {
        self.send(RefreshCommand::Stop).await
    }

    pub async fn table(&self) -> Result<RenderedTable, MonitorError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(RefreshCommand::QueryTable { response_tx }).await?;
        response_rx.await.map_err(|_| MonitorError::ControllerGone)
    }

    pub async fn status(&self) -> Result<RefreshStatus, MonitorError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(RefreshCommand::QueryStatus { response_tx })
            .await?;
        response_rx.await.map_err(|_| MonitorError::ControllerGone)
    }
}
