use std::io::{self, Stdout};

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::error::{AppError, Result};

type Backend = CrosstermBackend<Stdout>;

/// Owns the terminal while the browser runs. Raw mode and the alternate
/// screen are given back by [`Tui::restore`] or, failing that, on drop.
pub struct Tui {
    terminal: Terminal<Backend>,
    mouse: bool,
    active: bool,
}

impl Tui {
    pub fn new(mouse: bool) -> Result<Self> {
        terminal::enable_raw_mode()
            .map_err(|e| AppError::Terminal(format!("failed to enter raw mode: {}", e)))?;
        let mut stdout = io::stdout();
        if mouse {
            execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        } else {
            execute!(stdout, EnterAlternateScreen)?;
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        tracing::debug!(mouse, "terminal taken over");
        Ok(Self {
            terminal,
            mouse,
            active: true,
        })
    }

    /// Safe to call more than once.
    pub fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        terminal::disable_raw_mode()?;
        let backend = self.terminal.backend_mut();
        if self.mouse {
            execute!(backend, DisableMouseCapture, LeaveAlternateScreen)?;
        } else {
            execute!(backend, LeaveAlternateScreen)?;
        }
        self.terminal.show_cursor()?;
        tracing::debug!("terminal restored");
        Ok(())
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<Backend> {
        &mut self.terminal
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            tracing::warn!(%err, "could not restore terminal");
        }
    }
}

/// Leave raw mode before the default panic output so it stays readable.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        tracing::error!(%info, "panic");
        previous(info);
    }));
}
