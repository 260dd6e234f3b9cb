use std::io::{self, Write};
use std::time::Duration;

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Color, Colors, Print, ResetColor, SetColors},
    terminal::{self, disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use image::imageops::FilterType;

use crate::config::QUIT_KEY;
use crate::error::MarkpipeResult;
use crate::playback::{DisplaySink, Frame, InputSource};

/// Restores the terminal when dropped, so every exit path (end of stream,
/// quit, error) releases it.
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), cursor::Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

/// Renders frames into the terminal as half-block cells, two pixel rows per
/// text row, true-color.
pub struct TerminalScreen {
    stdout: io::Stdout,
    _guard: TerminalGuard,
}

impl TerminalScreen {
    pub fn new() -> MarkpipeResult<TerminalScreen> {
        enable_raw_mode()?;
        if let Err(err) = execute!(io::stdout(), EnterAlternateScreen, cursor::Hide) {
            disable_raw_mode().ok();
            return Err(err.into());
        }
        Ok(TerminalScreen {
            stdout: io::stdout(),
            _guard: TerminalGuard,
        })
    }
}

impl DisplaySink for TerminalScreen {
    fn show(&mut self, frame: &Frame) -> MarkpipeResult<()> {
        let (cols, rows) = terminal::size()?;
        let cols = u32::from(cols.max(1));
        let rows = u32::from(rows.max(1));

        let scaled = image::imageops::resize(frame, cols, rows * 2, FilterType::Triangle);

        queue!(self.stdout, cursor::MoveTo(0, 0))?;
        for y in 0..rows {
            for x in 0..cols {
                let top = scaled.get_pixel(x, y * 2);
                let bottom = scaled.get_pixel(x, y * 2 + 1);
                queue!(
                    self.stdout,
                    SetColors(Colors::new(
                        Color::Rgb {
                            r: top[0],
                            g: top[1],
                            b: top[2],
                        },
                        Color::Rgb {
                            r: bottom[0],
                            g: bottom[1],
                            b: bottom[2],
                        },
                    )),
                    Print('▀')
                )?;
            }
            if y + 1 < rows {
                queue!(self.stdout, Print("\r\n"))?;
            }
        }
        queue!(self.stdout, ResetColor)?;
        self.stdout.flush()?;
        Ok(())
    }
}

/// Key polling over the same terminal. Reading events does not touch stdout,
/// so this stays separate from the screen and both can be handed to the
/// controller independently.
pub struct TerminalKeys;

impl InputSource for TerminalKeys {
    fn poll_key(&mut self, timeout: Duration) -> MarkpipeResult<Option<char>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                return Ok(None);
            }
            // ctrl-c behaves like the quit key in raw mode
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                if let KeyCode::Char('c') = key.code {
                    return Ok(Some(QUIT_KEY));
                }
                return Ok(None);
            }
            if let KeyCode::Char(ch) = key.code {
                return Ok(Some(ch));
            }
        }
        Ok(None)
    }
}
