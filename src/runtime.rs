use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use crossterm::event::{self, Event as CrosstermEvent, KeyEventKind};
use tracing::warn;

use crate::model::Event;

/// Forwards terminal input to the app channel and emits a tick every
/// `tick_rate`. Stops once the receiving side is gone.
pub fn spawn_event_pump(tx: Sender<Event>, tick_rate: Duration) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut last_tick = Instant::now();

        loop {
            let timeout = tick_rate.saturating_sub(last_tick.elapsed());
            let forwarded = match event::poll(timeout) {
                Ok(true) => match event::read() {
                    Ok(terminal_event) => match translate(terminal_event) {
                        Some(event) => tx.send(event).is_ok(),
                        None => true,
                    },
                    Err(err) => {
                        warn!("failed to read terminal event: {err}");
                        true
                    }
                },
                Ok(false) => true,
                Err(err) => {
                    warn!("failed to poll terminal event: {err}");
                    true
                }
            };
            if !forwarded {
                break;
            }

            if last_tick.elapsed() >= tick_rate {
                if tx.send(Event::Tick).is_err() {
                    break;
                }
                last_tick = Instant::now();
            }
        }
    })
}

fn translate(terminal_event: CrosstermEvent) -> Option<Event> {
    match terminal_event {
        // Release events only show up on Windows; acting on them would
        // double every keystroke.
        CrosstermEvent::Key(key) if key.kind != KeyEventKind::Release => Some(Event::Input(key)),
        CrosstermEvent::Paste(text) => Some(Event::Paste(text)),
        CrosstermEvent::Resize(width, height) => Some(Event::Resize { width, height }),
        _ => None,
    }
}
