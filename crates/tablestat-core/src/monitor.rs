//! The shared monitor: one [`LoadState`] behind a mutex, a poll loop that
//! feeds it, and the command set every front end (TUI keys, HTTP) drives.
//!
//! Collection happens outside the lock; applying a batch, running a command
//! and rendering each take the lock exactly once, so a reader always sees a
//! complete generation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};

use crate::entity::Level;
use crate::error::{Error, Result, SourceError};
use crate::persist::{CsvLog, SavedFile, SnapshotStore};
use crate::sort::SortSpec;
use crate::source::LoadSource;
use crate::sources::SourceKind;
use crate::state::{LoadState, epoch_millis};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything needed to start monitoring.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Descriptor of the monitored cluster; also keys the saved-file names.
    pub target: String,
    /// Substring an entity name must contain to be shown.
    pub entity_filter: Option<String>,
    pub level: Level,
    /// Pause between iterations.
    pub interval: Duration,
    /// Where `save` writes and `load` looks.
    pub save_dir: PathBuf,
    /// Append every iteration to this CSV file.
    pub log_path: Option<PathBuf>,
    pub source: SourceKind,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            target: "synthetic".to_string(),
            entity_filter: None,
            level: Level::Table,
            interval: Duration::from_secs(3),
            save_dir: PathBuf::from("."),
            log_path: None,
            source: SourceKind::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// One dashboard command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ToggleDiffFromStart,
    ToggleChangedOnly,
    ToggleRate,
    ResetBaseline,
    Save,
    TogglePause,
    Sort(SortSpec),
    /// Load the saved file at this index of the listing.
    Load(usize),
}

impl Command {
    /// Parse a key token: `d c r R S p`, any sort key, or `L<index>`.
    pub fn parse(token: &str) -> Result<Command> {
        if let Some(index) = token.strip_prefix('L')
            && !index.is_empty()
        {
            return index
                .parse()
                .map(Command::Load)
                .map_err(|_| Error::InvalidSelector(index.to_string()));
        }
        let mut chars = token.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return Err(Error::UnknownCommand(token.to_string()));
        };
        let command = match c {
            'd' => Command::ToggleDiffFromStart,
            'c' => Command::ToggleChangedOnly,
            'r' => Command::ToggleRate,
            'R' => Command::ResetBaseline,
            'S' => Command::Save,
            'p' => Command::TogglePause,
            c => SortSpec::from_key(c)
                .map(Command::Sort)
                .ok_or_else(|| Error::UnknownCommand(token.to_string()))?,
        };
        Ok(command)
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

pub struct Monitor {
    config: MonitorConfig,
    state: Mutex<LoadState>,
    store: SnapshotStore,
    paused: AtomicBool,
    running: Arc<AtomicBool>,
}

impl Monitor {
    /// Build the shared state. Fails only if the continuous log cannot be opened.
    pub fn new(config: MonitorConfig) -> Result<Self> {
        let mut state = LoadState::new(config.level);
        if let Some(path) = &config.log_path {
            state.set_log(Some(CsvLog::open(path, config.level)?));
            log::info!("logging every iteration to {}", path.display());
        }
        let store = SnapshotStore::new(
            &config.save_dir,
            &config.target,
            config.entity_filter.as_deref(),
            SystemTime::now(),
        );
        Ok(Self {
            config,
            state: Mutex::new(state),
            store,
            paused: AtomicBool::new(false),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Lock the engine. A poisoned lock is recovered: the engine never leaves
    /// a half-applied generation behind.
    pub fn state(&self) -> MutexGuard<'_, LoadState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    // -----------------------------------------------------------------------
    // Run control
    // -----------------------------------------------------------------------

    /// Flag cleared by [`stop`](Self::stop); hand it to a Ctrl+C handler.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Flip pause; returns the new state. An in-flight iteration completes.
    pub fn toggle_pause(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------------

    /// Run one iteration: collect without the lock, apply under it. A source
    /// at another level than the dashboard is rejected before collecting.
    pub fn poll_once(&self, source: &mut dyn LoadSource) -> Result<()> {
        self.state().check_level(source.level())?;
        let batch = source.collect()?;
        let now = source.collected_at().unwrap_or_else(epoch_millis);
        self.state().apply_at(batch, now);
        Ok(())
    }

    /// Poll every `interval` until stopped. A failing source is retried on
    /// the next tick; an exhausted or mismatched one ends the loop but not
    /// the monitor.
    pub fn run_poll_loop(&self, source: &mut dyn LoadSource) {
        log::info!(
            "polling {} every {}ms",
            source.name(),
            self.config.interval.as_millis()
        );
        while self.is_running() {
            if !self.is_paused() {
                match self.poll_once(source) {
                    Ok(()) => {}
                    Err(Error::Source(SourceError::Exhausted)) => {
                        log::info!("{} exhausted, keeping last iteration", source.name());
                        break;
                    }
                    Err(e @ Error::LevelMismatch { .. }) => {
                        log::error!("{}: {e}", source.name());
                        break;
                    }
                    Err(e) => log::warn!("{}: {e}, retrying next tick", source.name()),
                }
            }
            self.sleep_interval();
        }
    }

    /// Sleep one interval in 10ms slices so a stop is noticed promptly.
    fn sleep_interval(&self) {
        let deadline = Instant::now() + self.config.interval;
        while Instant::now() < deadline && self.is_running() {
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Run a parsed command and describe what it did.
    pub fn execute(&self, command: Command) -> Result<String> {
        let message = match command {
            Command::ToggleDiffFromStart => {
                let on = self.state().toggle_diff_from_start();
                format!("diff from start: {}", on_off(on))
            }
            Command::ToggleChangedOnly => {
                let on = self.state().toggle_show_changed_only();
                format!("changed only: {}", on_off(on))
            }
            Command::ToggleRate => {
                let on = self.state().toggle_show_rate();
                format!("rate: {}", on_off(on))
            }
            Command::ResetBaseline => {
                self.state().reset_diff_start_point();
                "baseline resets at next iteration".to_string()
            }
            Command::Save => {
                let path = self.save()?;
                format!("saved to {}", path.display())
            }
            Command::TogglePause => {
                let verb = if self.toggle_pause() { "paused" } else { "resumed" };
                verb.to_string()
            }
            Command::Sort(spec) => {
                let mut state = self.state();
                state.set_sort_spec(spec);
                format!("sort: {}", state.sort_description())
            }
            Command::Load(index) => {
                let path = self.load(&index.to_string())?;
                format!("baseline loaded from {}", path.display())
            }
        };
        log::debug!("{message}");
        Ok(message)
    }

    /// [`Command::parse`] then [`execute`](Self::execute).
    pub fn execute_key(&self, token: &str) -> Result<String> {
        self.execute(Command::parse(token)?)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn save(&self) -> Result<PathBuf> {
        let state = self.state();
        self.store.save(&state)
    }

    /// Parse the selected file without holding the lock, then install it.
    pub fn load(&self, selector: &str) -> Result<PathBuf> {
        let (path, baseline) = self.store.read_selected(selector, self.config.level)?;
        self.state().install_baseline(baseline);
        Ok(path)
    }

    pub fn list_saved(&self) -> Result<Vec<SavedFile>> {
        self.store.list_saved()
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
