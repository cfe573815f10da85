//! Render surface backed by a real terminal through crossterm.

use std::io::{self, IsTerminal, Write};

use crossterm::cursor::{MoveDown, MoveTo, MoveUp, RestorePosition, SavePosition};
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use steppanel_core::PanelError;

use crate::surface::{RenderSurface, SurfaceId};

/// Which process stream the panel draws on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// A crossterm-driven surface on stdout or stderr.
///
/// Commands are queued into an in-memory frame buffer and delivered with a
/// single `write_all` on [`flush`](RenderSurface::flush).
#[derive(Debug)]
pub struct TerminalSurface {
    stream: Stream,
    buffer: Vec<u8>,
}

impl TerminalSurface {
    /// Surface on standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Stream::Stdout)
    }

    /// Surface on standard error.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Stream::Stderr)
    }

    /// Surface on the given stream.
    #[must_use]
    pub fn new(stream: Stream) -> Self {
        Self {
            stream,
            buffer: Vec::with_capacity(4096),
        }
    }

    /// Whether the stream is attached to an interactive terminal.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        match self.stream {
            Stream::Stdout => io::stdout().is_terminal(),
            Stream::Stderr => io::stderr().is_terminal(),
        }
    }
}

fn unavailable(reason: impl Into<String>) -> PanelError {
    PanelError::SurfaceUnavailable(reason.into())
}

impl RenderSurface for TerminalSurface {
    fn id(&self) -> SurfaceId {
        match self.stream {
            Stream::Stdout => SurfaceId::Stdout,
            Stream::Stderr => SurfaceId::Stderr,
        }
    }

    fn dimensions(&mut self) -> Result<(u16, u16), PanelError> {
        if !self.is_interactive() {
            return Err(unavailable(format!("{} is not a terminal", self.id())));
        }
        let (cols, rows) =
            terminal::size().map_err(|e| unavailable(format!("terminal size: {e}")))?;
        if rows == 0 || cols == 0 {
            return Err(unavailable("terminal reports zero size"));
        }
        Ok((rows, cols))
    }

    fn cursor_row(&mut self) -> Result<u16, PanelError> {
        crossterm::cursor::position()
            .map(|(_, row)| row)
            .map_err(|e| unavailable(format!("cursor position: {e}")))
    }

    fn move_cursor(&mut self, rows: i32) -> io::Result<()> {
        let steps = u16::try_from(rows.unsigned_abs()).unwrap_or(u16::MAX);
        match rows {
            0 => Ok(()),
            r if r < 0 => queue!(self.buffer, MoveUp(steps)),
            _ => queue!(self.buffer, MoveDown(steps)),
        }
    }

    fn move_to_row(&mut self, row: u16) -> io::Result<()> {
        queue!(self.buffer, MoveTo(0, row))
    }

    fn set_scroll_region(&mut self, top: u16, bottom: u16) -> io::Result<()> {
        // DECSTBM is 1-based.
        write!(
            self.buffer,
            "\x1b[{};{}r",
            u32::from(top) + 1,
            u32::from(bottom) + 1
        )
    }

    fn reset_scroll_region(&mut self) -> io::Result<()> {
        self.buffer.extend_from_slice(b"\x1b[r");
        Ok(())
    }

    fn clear_line(&mut self) -> io::Result<()> {
        queue!(self.buffer, Clear(ClearType::CurrentLine))
    }

    fn save_cursor(&mut self) -> io::Result<()> {
        queue!(self.buffer, SavePosition)
    }

    fn restore_cursor(&mut self) -> io::Result<()> {
        queue!(self.buffer, RestorePosition)
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        queue!(self.buffer, Print(text))
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let result = match self.stream {
            Stream::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(&self.buffer).and_then(|()| out.flush())
            }
            Stream::Stderr => {
                let mut out = io::stderr().lock();
                out.write_all(&self.buffer).and_then(|()| out.flush())
            }
        };
        self.buffer.clear();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_stream() {
        assert_eq!(TerminalSurface::stdout().id(), SurfaceId::Stdout);
        assert_eq!(TerminalSurface::stderr().id(), SurfaceId::Stderr);
    }

    #[test]
    fn commands_are_buffered_until_flush() {
        let mut surface = TerminalSurface::stderr();
        surface.save_cursor().unwrap();
        surface.move_to_row(3).unwrap();
        surface.write("hello").unwrap();
        surface.restore_cursor().unwrap();
        assert!(!surface.buffer.is_empty());
        let text = String::from_utf8_lossy(&surface.buffer).to_string();
        assert!(text.contains("hello"));
        assert!(text.contains("\x1b[4;1H"));
    }

    #[test]
    fn scroll_region_is_one_based() {
        let mut surface = TerminalSurface::stderr();
        surface.set_scroll_region(16, 39).unwrap();
        surface.reset_scroll_region().unwrap();
        assert_eq!(
            String::from_utf8_lossy(&surface.buffer),
            "\x1b[17;40r\x1b[r"
        );
    }

    #[test]
    fn zero_move_is_empty() {
        let mut surface = TerminalSurface::stdout();
        surface.move_cursor(0).unwrap();
        assert!(surface.buffer.is_empty());
    }
}
