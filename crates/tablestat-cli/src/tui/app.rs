//! TUI application state and event loop.
//!
//! Polling runs on a background thread owned by the command; the UI only
//! locks the shared monitor to draw and to run commands, so a slow source
//! never blocks the keyboard.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;

use tablestat_core::{Command, Monitor};

pub struct App {
    monitor: Arc<Monitor>,
    running: bool,
    scroll: usize,
    /// Digits typed after `L`, loaded on Enter.
    pending_load: Option<String>,
    /// Result of the last command, shown in the status line.
    status: Option<(String, bool)>,
}

impl App {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self {
            monitor,
            running: true,
            scroll: 0,
            pending_load: None,
            status: None,
        }
    }

    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        // Install panic hook that restores terminal before printing the panic.
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
            original_hook(info);
        }));

        let result = self.run_loop(&mut terminal);

        // Always restore terminal, even if the loop returned an error.
        let _ = std::panic::take_hook();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;

        result
    }

    fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        while self.running && self.monitor.is_running() {
            let rows = self.monitor.state().visible_entities().len();
            self.clamp_scroll(rows);
            terminal.draw(|f| super::ui::draw(f, self))?;

            if event::poll(Duration::from_millis(100))?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                self.handle_key(key.code);
            }
        }
        Ok(())
    }

    pub(crate) fn handle_key(&mut self, key: KeyCode) {
        if let Some(digits) = self.pending_load.as_mut() {
            match key {
                KeyCode::Char(c) if c.is_ascii_digit() => digits.push(c),
                KeyCode::Backspace => {
                    digits.pop();
                }
                KeyCode::Enter if !digits.is_empty() => {
                    let selector = format!("L{digits}");
                    self.pending_load = None;
                    match Command::parse(&selector) {
                        Ok(command) => self.run_command(command),
                        Err(e) => self.status = Some((e.to_string(), true)),
                    }
                }
                _ => {
                    self.pending_load = None;
                    self.status = Some(("load cancelled".to_string(), false));
                }
            }
            return;
        }

        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Up | KeyCode::Char('k') => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => self.scroll += 1,
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(10),
            KeyCode::PageDown => self.scroll += 10,
            KeyCode::Home => self.scroll = 0,
            KeyCode::Char('L') => {
                self.pending_load = Some(String::new());
                self.status = Some(("load saved baseline: index, then Enter".to_string(), false));
            }
            KeyCode::Char(c) => {
                if let Ok(command) = Command::parse(&c.to_string()) {
                    self.run_command(command);
                }
            }
            _ => {}
        }
    }

    fn run_command(&mut self, command: Command) {
        self.status = Some(match self.monitor.execute(command) {
            Ok(message) => (message, false),
            Err(e) => (e.to_string(), true),
        });
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// First visible row, clamped by the renderer to the row count.
    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn clamp_scroll(&mut self, rows: usize) {
        self.scroll = self.scroll.min(rows.saturating_sub(1));
    }

    /// Last status message and whether it is an error.
    pub fn status(&self) -> Option<(&str, bool)> {
        self.status.as_ref().map(|(m, e)| (m.as_str(), *e))
    }

    /// Index typed so far while a load is pending.
    pub fn pending_load(&self) -> Option<&str> {
        self.pending_load.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tablestat_core::{Level, MonitorConfig, SyntheticSource};

    fn app(dir: &std::path::Path) -> App {
        let monitor = Monitor::new(MonitorConfig {
            save_dir: dir.to_path_buf(),
            ..MonitorConfig::default()
        })
        .unwrap();
        App::new(Arc::new(monitor))
    }

    #[test]
    fn command_keys_reach_the_monitor() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path());
        app.handle_key(KeyCode::Char('r'));
        app.handle_key(KeyCode::Char('d'));
        app.handle_key(KeyCode::Char('#'));
        let state = app.monitor().state();
        assert!(state.is_show_rate());
        assert!(state.is_diff_from_start());
        assert_eq!(state.sort_description(), "Regions (diff)");
    }

    #[test]
    fn pause_key_toggles_monitor() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path());
        app.handle_key(KeyCode::Char('p'));
        assert!(app.monitor().is_paused());
        assert_eq!(app.status(), Some(("paused", false)));
        app.handle_key(KeyCode::Char('p'));
        assert!(!app.monitor().is_paused());
    }

    #[test]
    fn load_waits_for_enter() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path());
        let mut source = SyntheticSource::new(Level::Table, 3, 1);
        app.monitor().poll_once(&mut source).unwrap();
        app.handle_key(KeyCode::Char('S'));
        app.monitor().poll_once(&mut source).unwrap();

        app.handle_key(KeyCode::Char('L'));
        assert_eq!(app.pending_load(), Some(""));
        app.handle_key(KeyCode::Char('0'));
        assert_eq!(app.pending_load(), Some("0"));
        assert!(!app.monitor().state().is_diff_from_start());
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.pending_load(), None);
        assert!(app.monitor().state().is_diff_from_start());
    }

    #[test]
    fn load_accepts_multi_digit_index() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path());
        app.handle_key(KeyCode::Char('L'));
        app.handle_key(KeyCode::Char('1'));
        app.handle_key(KeyCode::Char('9'));
        app.handle_key(KeyCode::Backspace);
        app.handle_key(KeyCode::Char('2'));
        assert_eq!(app.pending_load(), Some("12"));
        app.handle_key(KeyCode::Enter);
        let (message, is_error) = app.status().unwrap();
        assert!(is_error);
        assert!(message.contains("no saved file at index 12"), "{message}");
    }

    #[test]
    fn enter_without_index_cancels_load() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path());
        app.handle_key(KeyCode::Char('L'));
        app.handle_key(KeyCode::Enter);
        assert_eq!(app.pending_load(), None);
        assert_eq!(app.status(), Some(("load cancelled", false)));
    }

    #[test]
    fn load_of_missing_file_reports_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path());
        app.handle_key(KeyCode::Char('L'));
        app.handle_key(KeyCode::Char('3'));
        app.handle_key(KeyCode::Enter);
        let (message, is_error) = app.status().unwrap();
        assert!(is_error);
        assert!(message.contains("no saved file at index 3"), "{message}");
        assert!(!app.monitor().state().is_diff_from_start());
    }

    #[test]
    fn digit_after_cancelled_load_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path());
        app.handle_key(KeyCode::Char('L'));
        app.handle_key(KeyCode::Esc);
        assert!(app.running);
        app.handle_key(KeyCode::Char('2'));
        assert_eq!(app.monitor().state().sort_description(), "Writes");
    }

    #[test]
    fn quit_and_scroll() {
        let tmp = tempfile::tempdir().unwrap();
        let mut app = app(tmp.path());
        app.handle_key(KeyCode::Up);
        assert_eq!(app.scroll(), 0);
        app.handle_key(KeyCode::PageDown);
        app.clamp_scroll(4);
        assert_eq!(app.scroll(), 3);
        app.handle_key(KeyCode::Char('q'));
        assert!(!app.running);
    }
}
