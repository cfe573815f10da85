//! The render surface capability and the one-panel-per-stream registry.

use std::fmt;
use std::io;

use parking_lot::{const_mutex, Mutex};
use steppanel_core::PanelError;

/// Identity of an output stream, used for exclusive ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceId {
    /// Process standard output.
    Stdout,
    /// Process standard error.
    Stderr,
    /// An in-memory surface; clones share the id.
    Memory(u64),
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceId::Stdout => write!(f, "stdout"),
            SurfaceId::Stderr => write!(f, "stderr"),
            SurfaceId::Memory(n) => write!(f, "memory#{n}"),
        }
    }
}

/// Cursor and region control over a character-cell terminal.
///
/// Rows are 0-based. Output may be buffered until [`flush`](Self::flush);
/// implementations should deliver one flush as one write.
pub trait RenderSurface: Send {
    /// Stream identity.
    fn id(&self) -> SurfaceId;

    /// Terminal size as `(rows, cols)`.
    ///
    /// # Errors
    ///
    /// Returns `SurfaceUnavailable` when the stream is not an interactive
    /// terminal or the size cannot be determined.
    fn dimensions(&mut self) -> Result<(u16, u16), PanelError>;

    /// Row the cursor is on.
    ///
    /// # Errors
    ///
    /// Returns `SurfaceUnavailable` when the terminal cannot report it.
    fn cursor_row(&mut self) -> Result<u16, PanelError>;

    /// Move the cursor up (negative) or down (positive).
    fn move_cursor(&mut self, rows: i32) -> io::Result<()>;

    /// Move the cursor to the first column of `row`.
    fn move_to_row(&mut self, row: u16) -> io::Result<()>;

    /// Confine scrolling to rows `top..=bottom`.
    fn set_scroll_region(&mut self, top: u16, bottom: u16) -> io::Result<()>;

    /// Restore full-screen scrolling.
    fn reset_scroll_region(&mut self) -> io::Result<()>;

    /// Erase the row the cursor is on.
    fn clear_line(&mut self) -> io::Result<()>;

    /// Remember the cursor position.
    fn save_cursor(&mut self) -> io::Result<()>;

    /// Return to the remembered cursor position.
    fn restore_cursor(&mut self) -> io::Result<()>;

    /// Write text at the cursor.
    fn write(&mut self, text: &str) -> io::Result<()>;

    /// Deliver buffered output.
    fn flush(&mut self) -> io::Result<()>;
}

impl<S: RenderSurface + ?Sized> RenderSurface for Box<S> {
    fn id(&self) -> SurfaceId {
        (**self).id()
    }
    fn dimensions(&mut self) -> Result<(u16, u16), PanelError> {
        (**self).dimensions()
    }
    fn cursor_row(&mut self) -> Result<u16, PanelError> {
        (**self).cursor_row()
    }
    fn move_cursor(&mut self, rows: i32) -> io::Result<()> {
        (**self).move_cursor(rows)
    }
    fn move_to_row(&mut self, row: u16) -> io::Result<()> {
        (**self).move_to_row(row)
    }
    fn set_scroll_region(&mut self, top: u16, bottom: u16) -> io::Result<()> {
        (**self).set_scroll_region(top, bottom)
    }
    fn reset_scroll_region(&mut self) -> io::Result<()> {
        (**self).reset_scroll_region()
    }
    fn clear_line(&mut self) -> io::Result<()> {
        (**self).clear_line()
    }
    fn save_cursor(&mut self) -> io::Result<()> {
        (**self).save_cursor()
    }
    fn restore_cursor(&mut self) -> io::Result<()> {
        (**self).restore_cursor()
    }
    fn write(&mut self, text: &str) -> io::Result<()> {
        (**self).write(text)
    }
    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

static OWNED: Mutex<Vec<SurfaceId>> = const_mutex(Vec::new());

/// Exclusive claim on an output stream, released on drop.
#[derive(Debug)]
pub struct OwnershipGuard {
    id: SurfaceId,
}

impl OwnershipGuard {
    /// Claim `id` for this process.
    ///
    /// # Errors
    ///
    /// Returns `SurfaceAlreadyOwned` if another panel holds the stream.
    pub fn claim(id: SurfaceId) -> Result<Self, PanelError> {
        let mut owned = OWNED.lock();
        if owned.contains(&id) {
            return Err(PanelError::SurfaceAlreadyOwned);
        }
        owned.push(id);
        Ok(Self { id })
    }

    /// The claimed stream.
    #[must_use]
    pub fn id(&self) -> SurfaceId {
        self.id
    }
}

impl Drop for OwnershipGuard {
    fn drop(&mut self) {
        OWNED.lock().retain(|owned| *owned != self.id);
    }
}

/// Whether a panel currently owns `id`.
#[must_use]
pub fn is_owned(id: SurfaceId) -> bool {
    OWNED.lock().contains(&id)
}
