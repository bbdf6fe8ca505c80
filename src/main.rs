use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use autosave_interface::app::App;
use autosave_interface::model::config::AppConfig;
use autosave_interface::msg::Msg;

/// Tick period; also the resolution of autosave timers.
const TICK: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    // Initialize logging to file (never stdout)
    let log_dir = directories::ProjectDirs::from("", "", "autosave")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| std::path::PathBuf::from("/tmp"));
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "autosave.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter("autosave_interface=info,autosave=info")
        .init();

    tracing::info!("autosave starting");

    let config = AppConfig::load()?;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, config);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        tracing::error!("autosave exited with error: {e:?}");
        eprintln!("autosave error: {e:?}");
    }

    Ok(())
}

fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, config: AppConfig) -> Result<()> {
    let (tx, rx) = mpsc::channel::<Msg>();
    let mut app = App::new(config, tx.clone())?;

    // Input thread — reads terminal events and forwards as Msg
    let tx_input = tx.clone();
    thread::spawn(move || {
        loop {
            if let Ok(event) = event::read() {
                let msg = match event {
                    Event::Key(k) => Msg::Key(k),
                    Event::Resize(w, h) => Msg::Resize(w, h),
                    _ => continue,
                };
                if tx_input.send(msg).is_err() {
                    break;
                }
            }
        }
    });

    // Tick thread — drives autosave timers
    let tx_tick = tx.clone();
    thread::spawn(move || {
        loop {
            thread::sleep(TICK);
            if tx_tick.send(Msg::Tick).is_err() {
                break;
            }
        }
    });

    if let Some(config_path) = AppConfig::user_config_path() {
        spawn_config_watcher(config_path, tx.clone());
    }

    let size = terminal.size()?;
    app.update(Msg::Resize(size.width, size.height))?;

    // ── Main event loop ──
    loop {
        // Batch-drain all pending messages
        let first = rx.recv()?;
        app.update(first)?;

        while let Ok(msg) = rx.try_recv() {
            app.update(msg)?;
        }

        if app.should_quit {
            app.shutdown();
            break;
        }

        terminal.draw(|f| app.view(f))?;
    }

    Ok(())
}

/// Watch the user config file and emit `ConfigChanged` when it is written.
/// The directory is watched so that creating the file later is picked up.
fn spawn_config_watcher(config_path: PathBuf, tx: mpsc::Sender<Msg>) {
    let Some(config_dir) = config_path.parent().map(PathBuf::from) else {
        return;
    };

    thread::spawn(move || {
        if let Err(err) = std::fs::create_dir_all(&config_dir) {
            tracing::warn!("failed to create config dir {}: {err}", config_dir.display());
            return;
        }

        let tx_watch = tx.clone();
        let watched = config_path.clone();
        let mut watcher: RecommendedWatcher =
            match notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
                        && event.paths.iter().any(|path| path == &watched)
                        && tx_watch.send(Msg::ConfigChanged(watched.clone())).is_err()
                    {
                        tracing::debug!("config watcher receiver gone");
                    }
                }
                Err(err) => {
                    tracing::warn!("config watcher error: {err}");
                }
            }) {
                Ok(w) => w,
                Err(err) => {
                    tracing::warn!("failed to initialize config watcher: {err}");
                    return;
                }
            };

        if let Err(err) = watcher.watch(&config_dir, RecursiveMode::NonRecursive) {
            tracing::warn!("failed to watch config dir {}: {err}", config_dir.display());
            return;
        }

        loop {
            thread::park();
        }
    });
}
