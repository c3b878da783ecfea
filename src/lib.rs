pub mod app;
pub mod config;
pub mod drag;
pub mod format;
pub mod gateway;
pub mod layout;
pub mod logging;
pub mod menu;
pub mod model;
pub mod notify;
pub mod search;
pub mod storage;
pub mod tree;
pub mod ui;
pub mod worker;

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::{error, info};

use app::App;
use config::{Cli, Config, USAGE};
use gateway::HttpGateway;
use worker::Worker;

pub fn run() -> Result<()> {
    let cli = Cli::parse(std::env::args().skip(1))?;
    if cli.help {
        println!("{USAGE}");
        return Ok(());
    }
    let config = Config::load(&cli)?;
    logging::init(&config.log_file)?;
    info!(base_url = %config.base_url, storage = %config.storage_path.display(), "starting");

    let gateway = HttpGateway::new(
        &config.base_url,
        config.csrf_token.clone(),
        config.request_timeout,
    )
    .context("failed to build HTTP client")?;
    let worker = Worker::spawn(Box::new(gateway));
    let store = storage::open_or_memory(&config.storage_path);
    let mut app = App::new(store, &config);

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(info);
    }));

    let mut tui = Tui::new()?;
    let run_result = run_app(&mut tui, &mut app, &worker);
    let restore_result = tui.restore();

    if let Err(err) = &run_result {
        error!(error = %format!("{err:#}"), "event loop failed");
    }
    run_result?;
    restore_result?;
    info!("stopped");
    Ok(())
}

fn run_app(tui: &mut Tui, app: &mut App, worker: &Worker) -> Result<()> {
    loop {
        for request in app.take_requests() {
            worker.submit(request)?;
        }
        for completion in worker.completions() {
            app.apply(completion);
        }
        app.tick(Instant::now());

        tui.draw(app)?;
        if app.should_quit() {
            return Ok(());
        }

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        // Drain everything queued so a burst of mouse events costs one redraw.
        loop {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key),
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                _ => {}
            }
            if !event::poll(Duration::from_millis(0))? {
                break;
            }
        }
    }
}

struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
    fn new() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
            .context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend).context("failed to create terminal")?;
        Ok(Self { terminal })
    }

    fn draw(&mut self, app: &mut App) -> Result<()> {
        self.terminal.draw(|frame| {
            app.arrange(frame.area());
            ui::draw(frame, app);
        })?;
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        disable_raw_mode().context("failed to disable raw mode")?;
        execute!(
            self.terminal.backend_mut(),
            DisableMouseCapture,
            LeaveAlternateScreen
        )
        .context("failed to leave alternate screen")?;
        self.terminal.show_cursor().context("failed to show cursor")?;
        Ok(())
    }
}
