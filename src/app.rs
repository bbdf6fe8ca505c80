use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ropey::Rope;

use crate::autosave::{AutosaveComponent, AutosaveConfig, FileTarget, SaveStatus};
use crate::error::RegistryError;
use crate::interface::ExtensionRegistry;
use crate::model::config::AppConfig;
use crate::model::item::ItemDraft;
use crate::model::mode::Mode;
use crate::msg::{Direction as MoveDir, Msg};

const MAX_NOTIFICATIONS: usize = 8;
const VISIBLE_NOTIFICATIONS: usize = 3;

pub struct App {
    pub mode: Mode,
    pub item: ItemDraft,
    pub config: AppConfig,
    registry: ExtensionRegistry,
    autosave: AutosaveComponent<Rope, FileTarget>,
    command_input: String,
    pub notifications: VecDeque<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: AppConfig, event_tx: mpsc::Sender<Msg>) -> Result<Self> {
        let registry = ExtensionRegistry::with_builtin()?;
        let manifest = registry
            .get(&config.interface.id)
            .ok_or_else(|| RegistryError::UnknownInterface(config.interface.id.clone()))?;
        if manifest.component != "autosave" {
            bail!(
                "interface {} mounts component {}, which this host does not provide",
                manifest.id,
                manifest.component
            );
        }

        let autosave_config = resolve_autosave(&registry, &config)?;
        let target = FileTarget::new(config.item_path());
        let rope = target.load()?.unwrap_or_default();
        tracing::info!("editing item {}", target.path().display());

        let mut item = ItemDraft::from_rope(rope);
        item.viewport.scroll_off = config.editor.scroll_off;

        let autosave = AutosaveComponent::mount(autosave_config, target, event_tx)
            .with_feedback_window(config.feedback_window());
        let notifications = VecDeque::from(vec![registry.summary_notification()]);

        Ok(Self {
            mode: Mode::Normal,
            item,
            config,
            registry,
            autosave,
            command_input: String::new(),
            notifications,
            should_quit: false,
        })
    }

    pub fn save_status(&self) -> &SaveStatus {
        self.autosave.status()
    }

    pub fn autosave_frequency(&self) -> Duration {
        self.autosave.frequency()
    }

    // ── MVU: Update ──────────────────────────────────────────────

    pub fn update(&mut self, msg: Msg) -> Result<()> {
        self.update_at(msg, Instant::now())
    }

    pub fn update_at(&mut self, msg: Msg, now: Instant) -> Result<()> {
        match msg {
            Msg::Key(key) => self.handle_key(key, now)?,
            Msg::InsertChar(ch) => {
                self.item.insert_char(ch);
                self.record_edit(now);
            }
            Msg::DeleteChar => {
                if self.item.delete_char_before() {
                    self.record_edit(now);
                }
            }
            Msg::NewLine => {
                self.item.insert_newline();
                self.record_edit(now);
            }
            Msg::MoveCursor(dir) => self.move_cursor(dir),
            Msg::SetMode(mode) => self.mode = mode,
            Msg::SaveNow => self.autosave.save_now(self.item.snapshot(), now),
            Msg::SetFrequency(ms) => self.set_frequency(ms),
            Msg::SaveFinished(result) => {
                if let Some(notice) = self.autosave.on_save_finished(result, now) {
                    self.push_notification(notice);
                }
            }
            Msg::ConfigChanged(path) => self.reload_config(path),
            Msg::ShowInterfaces => {
                for row in self.registry.list_notifications() {
                    self.push_notification(row);
                }
            }
            Msg::Tick => self.autosave.tick(now),
            Msg::Quit => self.should_quit = true,
            Msg::Resize(_w, h) => {
                self.item.viewport.height = h.saturating_sub(2 + VISIBLE_NOTIFICATIONS as u16);
                self.item.scroll_to_cursor();
            }
        }
        Ok(())
    }

    /// Wait out an in-flight save, then write whatever is still unsaved.
    pub fn shutdown(&mut self) {
        self.autosave.flush_blocking(self.item.snapshot());
    }

    fn record_edit(&mut self, now: Instant) {
        self.item.scroll_to_cursor();
        self.autosave.on_edit(self.item.snapshot(), now);
    }

    fn set_frequency(&mut self, ms: i64) {
        match AutosaveConfig::from_millis(ms) {
            Ok(config) => {
                self.autosave.reconfigure(config);
                self.push_notification(format!("autosave every {ms}ms from the next edit"));
            }
            Err(err) => self.push_notification(err.to_string()),
        }
    }

    fn reload_config(&mut self, path: PathBuf) {
        let reloaded = AppConfig::load_from(Some(&path))
            .map_err(RegistryError::from)
            .and_then(|config| {
                let autosave_config = resolve_autosave(&self.registry, &config)?;
                Ok((config, autosave_config))
            });

        match reloaded {
            Ok((config, autosave_config)) => {
                if config.item_path() != self.config.item_path() {
                    tracing::warn!("item_path changes apply after restart");
                }
                self.autosave.reconfigure(autosave_config);
                self.autosave.set_feedback_window(config.feedback_window());
                self.item.viewport.scroll_off = config.editor.scroll_off;
                self.item.scroll_to_cursor();
                self.config = config;
                self.push_notification(format!(
                    "config reloaded: autosave every {}ms",
                    autosave_config.frequency_ms()
                ));
            }
            Err(err) => {
                tracing::warn!("config reload failed, keeping previous settings: {err}");
                self.push_notification(format!("config reload failed: {err}"));
            }
        }
    }

    fn push_notification(&mut self, message: String) {
        self.notifications.push_back(message);
        while self.notifications.len() > MAX_NOTIFICATIONS {
            self.notifications.pop_front();
        }
    }

    fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
            return self.update_at(Msg::SaveNow, now);
        }

        match self.mode {
            Mode::Normal => self.handle_key_normal(key, now),
            Mode::Insert => self.handle_key_insert(key, now),
            Mode::Command => self.handle_key_command(key, now),
        }
    }

    fn handle_key_normal(&mut self, key: KeyEvent, now: Instant) -> Result<()> {
        match key.code {
            KeyCode::Char('i') => self.update_at(Msg::SetMode(Mode::Insert), now),
            KeyCode::Char(':') => {
                self.command_input.clear();
                self.update_at(Msg::SetMode(Mode::Command), now)
            }
            KeyCode::Char('q') => self.update_at(Msg::Quit, now),
            KeyCode::Char('h') | KeyCode::Left => self.update_at(Msg::MoveCursor(MoveDir::Left), now),
            KeyCode::Char('l') | KeyCode::Right => self.update_at(Msg::MoveCursor(MoveDir::Right), now),
            KeyCode::Char('k') | KeyCode::Up => self.update_at(Msg::MoveCursor(MoveDir::Up), now),
            KeyCode::Char('j') | KeyCode::Down => self.update_at(Msg::MoveCursor(MoveDir::Down), now),
            KeyCode::Char('0') | KeyCode::Home => {
                self.update_at(Msg::MoveCursor(MoveDir::LineStart), now)
            }
            KeyCode::Char('$') | KeyCode::End => {
                self.update_at(Msg::MoveCursor(MoveDir::LineEnd), now)
            }
            _ => Ok(()),
        }
    }

    fn handle_key_insert(&mut self, key: KeyEvent, now: Instant) -> Result<()> {
        match key.code {
            KeyCode::Esc => self.update_at(Msg::SetMode(Mode::Normal), now),
            KeyCode::Enter => self.update_at(Msg::NewLine, now),
            KeyCode::Backspace => self.update_at(Msg::DeleteChar, now),
            KeyCode::Char(ch) => self.update_at(Msg::InsertChar(ch), now),
            KeyCode::Left => self.update_at(Msg::MoveCursor(MoveDir::Left), now),
            KeyCode::Right => self.update_at(Msg::MoveCursor(MoveDir::Right), now),
            KeyCode::Up => self.update_at(Msg::MoveCursor(MoveDir::Up), now),
            KeyCode::Down => self.update_at(Msg::MoveCursor(MoveDir::Down), now),
            KeyCode::Home => self.update_at(Msg::MoveCursor(MoveDir::LineStart), now),
            KeyCode::End => self.update_at(Msg::MoveCursor(MoveDir::LineEnd), now),
            _ => Ok(()),
        }
    }

    fn handle_key_command(&mut self, key: KeyEvent, now: Instant) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.command_input.clear();
                self.update_at(Msg::SetMode(Mode::Normal), now)?;
            }
            KeyCode::Enter => {
                let command = std::mem::take(&mut self.command_input);
                self.update_at(Msg::SetMode(Mode::Normal), now)?;
                self.run_command(command.trim(), now)?;
            }
            KeyCode::Backspace => {
                self.command_input.pop();
            }
            KeyCode::Char(ch) => self.command_input.push(ch),
            _ => {}
        }
        Ok(())
    }

    fn run_command(&mut self, command: &str, now: Instant) -> Result<()> {
        if let Some(raw) = command.strip_prefix("set frequency") {
            return match raw.trim().parse::<i64>() {
                Ok(ms) => self.update_at(Msg::SetFrequency(ms), now),
                Err(_) => {
                    self.push_notification("usage: set frequency <milliseconds>".to_string());
                    Ok(())
                }
            };
        }

        match command {
            "" => {}
            "w" => self.update_at(Msg::SaveNow, now)?,
            "q" | "wq" => self.update_at(Msg::Quit, now)?,
            "interfaces" => self.update_at(Msg::ShowInterfaces, now)?,
            "manifest" => self.show_manifest(),
            "help" => {
                for line in [
                    "commands:",
                    "  w (ctrl-s)              save now",
                    "  set frequency <ms>      change autosave interval",
                    "  manifest | interfaces   describe registered interfaces",
                    "  q                       save and quit",
                ] {
                    self.push_notification(line.to_string());
                }
            }
            other => self.push_notification(format!("unknown command: {other}")),
        }
        Ok(())
    }

    fn show_manifest(&mut self) {
        let Some(manifest) = self.registry.get(&self.config.interface.id) else {
            return;
        };

        let mut lines = vec![format!(
            "{} ({}): {}",
            manifest.name,
            manifest.id,
            manifest.description.as_deref().unwrap_or("")
        )];
        lines.extend(manifest.options.iter().map(|option| {
            format!(
                "  option {} [{}]: {}",
                option.field,
                option.kind.label(),
                option.meta.note.as_deref().unwrap_or(&option.name)
            )
        }));

        for line in lines {
            self.push_notification(line);
        }
    }

    fn move_cursor(&mut self, dir: MoveDir) {
        match dir {
            MoveDir::Up => self.item.move_vertical(-1),
            MoveDir::Down => self.item.move_vertical(1),
            MoveDir::Left => self.item.move_left(),
            MoveDir::Right => self.item.move_right(),
            MoveDir::LineStart => self.item.move_line_start(),
            MoveDir::LineEnd => self.item.move_line_end(),
        }
        self.item.scroll_to_cursor();
    }

    // ── MVU: View ────────────────────────────────────────────────

    pub fn view(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),                            // header
                Constraint::Min(1),                               // item
                Constraint::Length(VISIBLE_NOTIFICATIONS as u16), // notifications
                Constraint::Length(1),                            // status bar
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0]);
        self.render_item(frame, chunks[1]);
        self.render_notifications(frame, chunks[2]);
        self.render_status_bar(frame, chunks[3]);

        if self.mode != Mode::Command {
            let (row, col) = self.item.cursor();
            let area = chunks[1];
            let y = row.saturating_sub(self.item.viewport.top_line) as u16 + area.y;
            if y < area.y + area.height {
                frame.set_cursor_position((col as u16 + area.x, y));
            }
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let title = self
            .registry
            .get(&self.config.interface.id)
            .map(|manifest| manifest.name.clone())
            .unwrap_or_default();

        let header = Line::from(vec![
            Span::styled(
                format!(" {title} "),
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" {}", self.config.item_path().display()),
                Style::default().fg(Color::Gray),
            ),
        ]);
        frame.render_widget(Paragraph::new(header), area);
    }

    fn render_item(&self, frame: &mut Frame, area: Rect) {
        let top = self.item.viewport.top_line;
        let bottom = (top + area.height as usize).min(self.item.line_count());
        let lines: Vec<Line> = (top..bottom)
            .map(|i| Line::raw(self.item.line_text(i).unwrap_or_default()))
            .collect();
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn render_notifications(&self, frame: &mut Frame, area: Rect) {
        let lines: Vec<Line> = self
            .notifications
            .iter()
            .rev()
            .take(area.height as usize)
            .rev()
            .map(|note| Line::styled(note.clone(), Style::default().fg(Color::DarkGray)))
            .collect();
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let mode_style = match self.mode {
            Mode::Normal => Style::default().fg(Color::Black).bg(Color::Magenta),
            Mode::Insert => Style::default().fg(Color::Black).bg(Color::Cyan),
            Mode::Command => Style::default().fg(Color::Black).bg(Color::Yellow),
        }
        .add_modifier(Modifier::BOLD);

        let save_style = match self.save_status() {
            SaveStatus::Idle => Style::default().fg(Color::Gray),
            SaveStatus::Pending => Style::default().fg(Color::Yellow),
            SaveStatus::Saving => Style::default().fg(Color::Cyan),
            SaveStatus::Saved => Style::default().fg(Color::Green),
            SaveStatus::Failed(_) => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        };

        let (row, col) = self.item.cursor();
        let suffix = if self.mode == Mode::Command {
            format!(" | :{}", self.command_input)
        } else {
            String::new()
        };

        let bar = Line::from(vec![
            Span::styled(format!(" {} ", self.mode.label()), mode_style),
            Span::styled(format!(" {} ", self.autosave.status_label()), save_style),
            Span::styled(
                format!(
                    " {}:{}  every {}ms{} ",
                    row + 1,
                    col + 1,
                    self.autosave_frequency().as_millis(),
                    suffix
                ),
                Style::default().fg(Color::Gray),
            ),
        ]);
        let status = Paragraph::new(bar).style(Style::default().bg(Color::DarkGray));
        frame.render_widget(status, area);
    }
}

fn resolve_autosave(
    registry: &ExtensionRegistry,
    config: &AppConfig,
) -> Result<AutosaveConfig, RegistryError> {
    let options = registry.resolve_options(&config.interface.id, &config.interface.options)?;
    Ok(AutosaveConfig::from_options(&options)?)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn write_config(dir: &Path, frequency: &str) -> PathBuf {
        write_config_with(dir, frequency, "")
    }

    /// `general` holds extra lines for the `[general]` table.
    fn write_config_with(dir: &Path, frequency: &str, general: &str) -> PathBuf {
        let path = dir.join("config.toml");
        let item = dir.join("item.md");
        fs::write(
            &path,
            format!(
                "[general]\nitem_path = {:?}\n{general}\n[interface.options]\nautosave_frequency = {frequency}\n",
                item.display().to_string()
            ),
        )
        .unwrap();
        path
    }

    fn app(dir: &Path, frequency_ms: u64) -> (App, mpsc::Receiver<Msg>) {
        let path = write_config(dir, &frequency_ms.to_string());
        let config = AppConfig::load_from(Some(&path)).unwrap();
        let (tx, rx) = mpsc::channel();
        (App::new(config, tx).unwrap(), rx)
    }

    fn type_text(app: &mut App, text: &str, at: Instant) {
        for ch in text.chars() {
            app.update_at(Msg::InsertChar(ch), at).unwrap();
        }
    }

    fn pump_save(app: &mut App, rx: &mpsc::Receiver<Msg>, now: Instant) {
        let msg = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(msg, Msg::SaveFinished(_)));
        app.update_at(msg, now).unwrap();
    }

    #[test]
    fn typing_is_saved_after_the_interval() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, rx) = app(dir.path(), 200);
        let t0 = Instant::now();

        type_text(&mut app, "hello", t0);
        app.update_at(Msg::Tick, t0 + ms(100)).unwrap();
        assert_eq!(*app.save_status(), SaveStatus::Pending);

        app.update_at(Msg::Tick, t0 + ms(200)).unwrap();
        assert_eq!(*app.save_status(), SaveStatus::Saving);
        pump_save(&mut app, &rx, t0 + ms(210));

        assert_eq!(*app.save_status(), SaveStatus::Saved);
        assert_eq!(fs::read_to_string(dir.path().join("item.md")).unwrap(), "hello");
    }

    #[test]
    fn existing_item_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("item.md"), "line one\nline two").unwrap();
        let (app, _rx) = app(dir.path(), 500);
        assert_eq!(app.item.line_count(), 2);
        assert_eq!(app.item.line_text(1).as_deref(), Some("line two"));
    }

    #[test]
    fn invalid_mount_frequency_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "-5");
        let config = AppConfig::load_from(Some(&path)).unwrap();
        let (tx, _rx) = mpsc::channel();
        assert!(App::new(config, tx).is_err());
    }

    #[test]
    fn set_frequency_rejects_non_positive_values() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _rx) = app(dir.path(), 500);

        app.update_at(Msg::SetFrequency(0), Instant::now()).unwrap();
        assert_eq!(app.autosave_frequency(), ms(500));
        assert!(
            app.notifications
                .back()
                .is_some_and(|note| note.contains("invalid configuration"))
        );

        app.update_at(Msg::SetFrequency(50), Instant::now()).unwrap();
        assert_eq!(app.autosave_frequency(), ms(50));
    }

    #[test]
    fn command_line_changes_frequency() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _rx) = app(dir.path(), 500);
        let now = Instant::now();

        for code in [KeyCode::Char(':')]
            .into_iter()
            .chain("set frequency 125".chars().map(KeyCode::Char))
            .chain([KeyCode::Enter])
        {
            app.update_at(Msg::Key(KeyEvent::new(code, KeyModifiers::NONE)), now)
                .unwrap();
        }

        assert_eq!(app.mode, Mode::Normal);
        assert_eq!(app.autosave_frequency(), ms(125));
    }

    #[test]
    fn config_reload_applies_new_frequency() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _rx) = app(dir.path(), 500);

        let path = write_config(dir.path(), "80");
        app.update_at(Msg::ConfigChanged(path), Instant::now()).unwrap();
        assert_eq!(app.autosave_frequency(), ms(80));
    }

    #[test]
    fn bad_config_reload_keeps_previous_frequency() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _rx) = app(dir.path(), 500);

        let path = write_config(dir.path(), "\"soon\"");
        app.update_at(Msg::ConfigChanged(path), Instant::now()).unwrap();

        assert_eq!(app.autosave_frequency(), ms(500));
        assert!(
            app.notifications
                .back()
                .is_some_and(|note| note.starts_with("config reload failed"))
        );
    }

    #[test]
    fn shutdown_writes_pending_edits() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, rx) = app(dir.path(), 60_000);

        type_text(&mut app, "unsaved", Instant::now());
        app.update_at(Msg::Quit, Instant::now()).unwrap();
        assert!(app.should_quit);
        app.shutdown();

        assert_eq!(fs::read_to_string(dir.path().join("item.md")).unwrap(), "unsaved");
        assert!(rx.try_recv().is_err(), "final save runs on the caller's thread");
    }

    #[test]
    fn shutdown_during_save_writes_edits_made_after_it_started() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _rx) = app(dir.path(), 100);
        let t0 = Instant::now();

        type_text(&mut app, "first", t0);
        app.update_at(Msg::Tick, t0 + ms(100)).unwrap();
        assert_eq!(*app.save_status(), SaveStatus::Saving);
        type_text(&mut app, " second", t0 + ms(110));

        app.shutdown();
        assert_eq!(
            fs::read_to_string(dir.path().join("item.md")).unwrap(),
            "first second"
        );
    }

    #[test]
    fn config_reload_applies_feedback_window_and_scroll_off() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config_with(dir.path(), "100", "saved_feedback_ms = 100\n");
        let config = AppConfig::load_from(Some(&path)).unwrap();
        let (tx, rx) = mpsc::channel();
        let mut app = App::new(config, tx).unwrap();

        let path = write_config_with(
            dir.path(),
            "100",
            "saved_feedback_ms = 10000\n\n[editor]\nscroll_off = 7\n",
        );
        app.update_at(Msg::ConfigChanged(path), Instant::now()).unwrap();
        assert_eq!(app.item.viewport.scroll_off, 7);

        let t0 = Instant::now();
        type_text(&mut app, "x", t0);
        app.update_at(Msg::Tick, t0 + ms(100)).unwrap();
        pump_save(&mut app, &rx, t0 + ms(110));

        app.update_at(Msg::Tick, t0 + ms(300)).unwrap();
        assert_eq!(*app.save_status(), SaveStatus::Saved);
        app.update_at(Msg::Tick, t0 + ms(10_110)).unwrap();
        assert_eq!(*app.save_status(), SaveStatus::Idle);
    }

    #[test]
    fn keys_dispatch_mode_and_cursor_messages() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("item.md"), "ab\ncd").unwrap();
        let (mut app, _rx) = app(dir.path(), 500);
        let now = Instant::now();
        let key = |code| Msg::Key(KeyEvent::new(code, KeyModifiers::NONE));

        app.update_at(key(KeyCode::Char('j')), now).unwrap();
        app.update_at(key(KeyCode::Char('$')), now).unwrap();
        assert_eq!(app.item.cursor(), (1, 2));

        app.update_at(key(KeyCode::Char('i')), now).unwrap();
        assert_eq!(app.mode, Mode::Insert);
        app.update_at(key(KeyCode::Esc), now).unwrap();
        assert_eq!(app.mode, Mode::Normal);

        app.update_at(Msg::SetMode(Mode::Insert), now).unwrap();
        app.update_at(Msg::MoveCursor(MoveDir::LineStart), now).unwrap();
        assert_eq!(app.mode, Mode::Insert);
        assert_eq!(app.item.cursor(), (1, 0));
    }

    #[test]
    fn ctrl_s_saves_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, rx) = app(dir.path(), 60_000);
        let now = Instant::now();

        type_text(&mut app, "quick", now);
        let ctrl_s = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);
        app.update_at(Msg::Key(ctrl_s), now).unwrap();
        pump_save(&mut app, &rx, now + ms(5));

        assert_eq!(fs::read_to_string(dir.path().join("item.md")).unwrap(), "quick");
    }
}
