pub mod app;
pub mod input;
pub mod ui;

use anyhow::Result;
use ratatui::{backend::CrosstermBackend, prelude::*};
use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use crate::tui::input::{map_key, Action};
use app::App;

/// Run the terminal client until the operator quits. The caller keeps the
/// app, so its history can be saved afterwards.
pub fn start(app: &mut App) -> Result<()> {
    log::info!("[TUI] simkit starting...");

    let mut stdout = io::stdout();
    crossterm::terminal::enable_raw_mode()?;
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(&mut stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::LeaveAlternateScreen)?;
    crossterm::terminal::disable_raw_mode()?;

    res
}

fn body_rows(height: u16) -> usize {
    usize::from(height.saturating_sub(ui::CHROME_ROWS))
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<&mut Stdout>>, app: &mut App) -> Result<()> {
    let mut rows = body_rows(terminal.size()?.height);
    app.resize(rows);

    loop {
        app.tick(Instant::now());
        terminal.draw(|f| ui::render_ui(f, app))?;

        if !crossterm::event::poll(Duration::from_millis(100))? {
            continue;
        }
        match crossterm::event::read()? {
            crossterm::event::Event::Key(key) => match map_key(key) {
                Action::None => {}
                action => {
                    log::debug!("[TUI] {action:?}");
                    if !app.apply(action) {
                        break;
                    }
                }
            },
            crossterm::event::Event::Resize(_, height) => {
                let new_rows = body_rows(height);
                if new_rows != rows {
                    rows = new_rows;
                    app.resize(rows);
                }
            }
            _ => {}
        }
    }

    terminal.clear()?;
    Ok(())
}
