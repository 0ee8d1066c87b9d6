use std::fmt;
use std::sync::Mutex;
use std::time::Instant;

/// The lifecycle task the application is currently executing. Transitions
/// follow a strict DAG; anything else is a programming error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationTask {
    Initializing,
    RunningPreCrawlFilters,
    FinishedPreCrawlFilters,
    RunningPostCrawlFilters,
    FinishedPostCrawlFilters,
    RunningIndexer,
    ReadyToSearch,
    RunningRankers,
    Errored,
    Shutdown,
}

impl fmt::Display for ApplicationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplicationTask::Initializing => "Initializing",
            ApplicationTask::RunningPreCrawlFilters => "RunningPreCrawlFilters",
            ApplicationTask::FinishedPreCrawlFilters => "FinishedPreCrawlFilters",
            ApplicationTask::RunningPostCrawlFilters => "RunningPostCrawlFilters",
            ApplicationTask::FinishedPostCrawlFilters => "FinishedPostCrawlFilters",
            ApplicationTask::RunningIndexer => "RunningIndexer",
            ApplicationTask::ReadyToSearch => "ReadyToSearch",
            ApplicationTask::RunningRankers => "RunningRankers",
            ApplicationTask::Errored => "Errored",
            ApplicationTask::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Progress snapshot of the current task.
#[derive(Debug, Clone)]
pub struct ApplicationState {
    pub task: ApplicationTask,
    pub task_started_at: Instant,
    pub total_work_items: u64,
    pub processed_work_items: u64,
    pub remaining_work_items: u64,
    pub estimated_remaining_seconds: u64,
    pub error_details: String,
}

/// Owns the `ApplicationState` behind a mutex. Stage runners report progress
/// through it and the coordinator drives lifecycle transitions; an invalid
/// transition panics, because it means the pipeline sequencing itself is
/// broken.
pub struct StateManager {
    state: Mutex<ApplicationState>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ApplicationState {
                task: ApplicationTask::Initializing,
                task_started_at: Instant::now(),
                total_work_items: 0,
                processed_work_items: 0,
                remaining_work_items: 0,
                estimated_remaining_seconds: 0,
                error_details: String::new(),
            }),
        }
    }

    pub fn snapshot(&self) -> ApplicationState {
        self.state.lock().unwrap().clone()
    }

    pub fn current_task(&self) -> ApplicationTask {
        self.state.lock().unwrap().task
    }

    pub fn set_total_work_items(&self, total_work_items: u64) {
        let mut state = self.state.lock().unwrap();
        state.total_work_items = total_work_items;
        state.remaining_work_items = total_work_items;
        state.processed_work_items = 0;
    }

    /// Advances progress and refreshes the remaining-time estimate. Progress
    /// only ever moves forward.
    pub fn increment_processed(&self, amount: u64) {
        if amount == 0 {
            return;
        }

        let mut state = self.state.lock().unwrap();
        state.processed_work_items += amount;
        state.remaining_work_items = state
            .total_work_items
            .saturating_sub(state.processed_work_items);

        let elapsed_seconds = state.task_started_at.elapsed().as_secs_f64();
        let estimate = if state.processed_work_items > 0 {
            (elapsed_seconds / state.processed_work_items as f64)
                * state.remaining_work_items as f64
        } else {
            // A wild estimate until the first item lands
            state.remaining_work_items as f64 * 0.01
        };
        state.estimated_remaining_seconds = estimate as u64;
    }

    pub fn on_pre_crawl_filters_started(&self) {
        self.begin(&[ApplicationTask::Initializing], ApplicationTask::RunningPreCrawlFilters);
    }

    pub fn on_pre_crawl_filters_finished(&self) {
        self.finish(
            &[ApplicationTask::RunningPreCrawlFilters],
            ApplicationTask::FinishedPreCrawlFilters,
        );
    }

    pub fn on_post_crawl_filters_started(&self) {
        self.begin(
            &[ApplicationTask::FinishedPreCrawlFilters],
            ApplicationTask::RunningPostCrawlFilters,
        );
    }

    pub fn on_post_crawl_filters_finished(&self) {
        self.finish(
            &[ApplicationTask::RunningPostCrawlFilters],
            ApplicationTask::FinishedPostCrawlFilters,
        );
    }

    pub fn on_indexing_started(&self) {
        self.begin(
            &[ApplicationTask::FinishedPostCrawlFilters],
            ApplicationTask::RunningIndexer,
        );
    }

    pub fn on_ready_to_search(&self) {
        self.finish(
            &[ApplicationTask::RunningIndexer],
            ApplicationTask::ReadyToSearch,
        );
    }

    /// Begins a ranking iff the pipeline is currently searchable. Unlike the
    /// stage transitions, a refusal here is a normal outcome (another query
    /// may have just started, or a shutdown may have landed), not a
    /// sequencing bug, so it reports `false` instead of panicking.
    pub fn try_ranking_started(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.task != ApplicationTask::ReadyToSearch {
            return false;
        }
        state.task = ApplicationTask::RunningRankers;
        state.task_started_at = Instant::now();
        true
    }

    /// Returns the pipeline to searchable after a ranking. A shutdown or
    /// error that landed mid-ranking takes precedence and is left in place.
    pub fn on_ranking_finished(&self) {
        let mut state = self.state.lock().unwrap();
        if state.task != ApplicationTask::RunningRankers {
            return;
        }
        state.task = ApplicationTask::ReadyToSearch;
        state.total_work_items = 0;
        state.processed_work_items = 0;
        state.remaining_work_items = 0;
        state.estimated_remaining_seconds = 0;
    }

    /// Reachable from any state; records the failure detail and halts the
    /// pipeline (checkpoints stay on disk for a later resumption).
    pub fn on_errored(&self, error_details: &str) {
        let mut state = self.state.lock().unwrap();
        state.task = ApplicationTask::Errored;
        state.error_details = error_details.to_string();
    }

    /// Reachable from any state.
    pub fn on_shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.task = ApplicationTask::Shutdown;
    }

    fn begin(&self, expected: &[ApplicationTask], next: ApplicationTask) {
        let mut state = self.state.lock().unwrap();
        if !expected.contains(&state.task) {
            panic!("state transition violation: {} -> {}", state.task, next);
        }
        state.task = next;
        state.task_started_at = Instant::now();
    }

    fn finish(&self, expected: &[ApplicationTask], next: ApplicationTask) {
        let mut state = self.state.lock().unwrap();
        if !expected.contains(&state.task) {
            panic!("state transition violation: {} -> {}", state.task, next);
        }
        state.task = next;
        state.total_work_items = 0;
        state.processed_work_items = 0;
        state.remaining_work_items = 0;
        state.estimated_remaining_seconds = 0;
    }
}
