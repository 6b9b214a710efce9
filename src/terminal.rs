use std::io::{self, Stdout, Write};
use std::panic;

use anyhow::Result;
use crossterm::cursor::{Hide, Show};
use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

pub type AppTerminal = Terminal<CrosstermBackend<Stdout>>;

/// The browser's hold on the terminal: raw mode, the alternate screen and
/// bracketed paste (a pasted local path arrives as one event). Closing is
/// idempotent and also happens on drop.
pub struct ScreenSession {
    open: bool,
}

impl ScreenSession {
    pub fn open() -> Result<(AppTerminal, Self)> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        enter_screen(&mut stdout)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok((terminal, Self { open: true }))
    }

    pub fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        release_stdout()?;
        self.open = false;
        Ok(())
    }
}

impl Drop for ScreenSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Hands the terminal back before the default panic message is printed.
pub fn install_panic_hook() {
    let previous_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = release_stdout();
        previous_hook(panic_info);
    }));
}

fn release_stdout() -> Result<()> {
    disable_raw_mode()?;
    leave_screen(&mut io::stdout())?;
    Ok(())
}

fn enter_screen(out: &mut impl Write) -> io::Result<()> {
    execute!(out, EnterAlternateScreen, EnableBracketedPaste, Hide)
}

fn leave_screen(out: &mut impl Write) -> io::Result<()> {
    execute!(out, Show, DisableBracketedPaste, LeaveAlternateScreen)
}
