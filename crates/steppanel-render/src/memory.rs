//! In-memory render surface with a simulated screen, for tests and headless use.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use steppanel_core::PanelError;

use crate::surface::{RenderSurface, SurfaceId};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceOp {
    MoveCursor(i32),
    MoveToRow(u16),
    SetScrollRegion(u16, u16),
    ResetScrollRegion,
    ClearLine,
    SaveCursor,
    RestoreCursor,
    Write(String),
}

#[derive(Debug)]
struct Screen {
    rows: u16,
    cols: u16,
    lines: Vec<Vec<char>>,
    row: u16,
    col: u16,
    saved: Option<(u16, u16)>,
    region: Option<(u16, u16)>,
    scrolled_off: Vec<String>,
}

impl Screen {
    fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows,
            cols,
            lines: vec![Vec::new(); usize::from(rows)],
            row: 0,
            col: 0,
            saved: None,
            region: None,
            scrolled_off: Vec::new(),
        }
    }

    fn last_row(&self) -> u16 {
        self.rows.saturating_sub(1)
    }

    fn line_feed(&mut self) {
        let (top, bottom) = self.region.unwrap_or((0, self.last_row()));
        if self.row == bottom {
            let removed = self.lines.remove(usize::from(top));
            self.lines.insert(usize::from(bottom), Vec::new());
            if top == 0 {
                self.scrolled_off.push(removed.into_iter().collect());
            }
        } else if self.row < self.last_row() {
            self.row += 1;
        }
        self.col = 0;
    }

    fn put(&mut self, ch: char) {
        if ch == '\n' {
            self.line_feed();
            return;
        }
        if self.col >= self.cols {
            self.line_feed();
        }
        let line = &mut self.lines[usize::from(self.row)];
        let col = usize::from(self.col);
        if line.len() <= col {
            line.resize(col + 1, ' ');
        }
        line[col] = ch;
        self.col += 1;
    }

    fn text(&mut self, text: &str) {
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            // Skip ANSI CSI sequences; they take no cells.
            if ch == '\x1b' && chars.peek() == Some(&'[') {
                chars.next();
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
                continue;
            }
            self.put(ch);
        }
    }
}

#[derive(Debug)]
struct MemoryState {
    screen: Screen,
    ops: Vec<SurfaceOp>,
    pending: Vec<SurfaceOp>,
    frames: Vec<Vec<SurfaceOp>>,
    unavailable: Option<String>,
    fail_after_flushes: Option<usize>,
    flushes: usize,
}

/// Render surface that simulates a terminal screen in memory.
///
/// Clones share state and identity, so a test can keep one handle while the
/// renderer owns another.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    id: SurfaceId,
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySurface {
    /// A `rows` × `cols` screen with the cursor at the top-left.
    #[must_use]
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            id: SurfaceId::Memory(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
            state: Arc::new(Mutex::new(MemoryState {
                screen: Screen::new(rows.max(1), cols),
                ops: Vec::new(),
                pending: Vec::new(),
                frames: Vec::new(),
                unavailable: None,
                fail_after_flushes: None,
                flushes: 0,
            })),
        }
    }

    /// A surface whose `dimensions` always fails, like a redirected stream.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let surface = Self::new(1, 1);
        surface.state.lock().unavailable = Some(reason.into());
        surface
    }

    /// Start with the cursor on `row`, as if output already preceded us.
    #[must_use]
    pub fn with_cursor_row(self, row: u16) -> Self {
        {
            let mut state = self.state.lock();
            state.screen.row = row.min(state.screen.last_row());
        }
        self
    }

    /// Make every flush after the first `flushes` fail with a broken pipe.
    #[must_use]
    pub fn fail_after(self, flushes: usize) -> Self {
        self.state.lock().fail_after_flushes = Some(flushes);
        self
    }

    /// Change the reported width, as a terminal resize would.
    pub fn set_cols(&self, cols: u16) {
        self.state.lock().screen.cols = cols;
    }

    /// Write a line of ordinary output at the cursor, as a caller's
    /// `println!` would. Not recorded as a surface op.
    pub fn print_line(&self, text: &str) {
        let mut state = self.state.lock();
        state.screen.text(text);
        state.screen.put('\n');
    }

    /// Every recorded op, in order.
    #[must_use]
    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.state.lock().ops.clone()
    }

    /// Ops grouped by the flush that delivered them.
    #[must_use]
    pub fn frames(&self) -> Vec<Vec<SurfaceOp>> {
        self.state.lock().frames.clone()
    }

    /// All text passed to `write`, in order.
    #[must_use]
    pub fn written(&self) -> Vec<String> {
        self.state
            .lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::Write(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Visible screen rows with trailing blanks trimmed.
    #[must_use]
    pub fn screen(&self) -> Vec<String> {
        self.state
            .lock()
            .screen
            .lines
            .iter()
            .map(|line| line.iter().collect::<String>().trim_end().to_string())
            .collect()
    }

    /// One visible row.
    #[must_use]
    pub fn row(&self, row: u16) -> String {
        self.screen()
            .get(usize::from(row))
            .cloned()
            .unwrap_or_default()
    }

    /// Lines that scrolled off the top of the screen.
    #[must_use]
    pub fn scrolled_off(&self) -> Vec<String> {
        self.state.lock().screen.scrolled_off.clone()
    }

    /// Cursor as `(row, col)`.
    #[must_use]
    pub fn cursor(&self) -> (u16, u16) {
        let state = self.state.lock();
        (state.screen.row, state.screen.col)
    }

    /// Active scroll region, if any.
    #[must_use]
    pub fn scroll_region(&self) -> Option<(u16, u16)> {
        self.state.lock().screen.region
    }

    /// Number of successful flushes.
    #[must_use]
    pub fn flushes(&self) -> usize {
        self.state.lock().flushes
    }

    fn record(&self, op: SurfaceOp) -> io::Result<()> {
        let mut state = self.state.lock();
        let screen = &mut state.screen;
        match &op {
            SurfaceOp::MoveCursor(rows) => {
                let target = i32::from(screen.row) + rows;
                let clamped = target.clamp(0, i32::from(screen.last_row()));
                screen.row = u16::try_from(clamped).unwrap_or(0);
            }
            SurfaceOp::MoveToRow(row) => {
                screen.row = (*row).min(screen.last_row());
                screen.col = 0;
            }
            SurfaceOp::SetScrollRegion(top, bottom) => {
                let bottom = (*bottom).min(screen.last_row());
                // VT100 ignores regions shorter than two lines.
                if *top < bottom {
                    screen.region = Some((*top, bottom));
                    screen.row = 0;
                    screen.col = 0;
                }
            }
            SurfaceOp::ResetScrollRegion => {
                screen.region = None;
                screen.row = 0;
                screen.col = 0;
            }
            SurfaceOp::ClearLine => {
                let row = usize::from(screen.row);
                screen.lines[row].clear();
            }
            SurfaceOp::SaveCursor => screen.saved = Some((screen.row, screen.col)),
            SurfaceOp::RestoreCursor => {
                if let Some((row, col)) = screen.saved {
                    screen.row = row;
                    screen.col = col;
                }
            }
            SurfaceOp::Write(text) => screen.text(text),
        }
        state.ops.push(op.clone());
        state.pending.push(op);
        Ok(())
    }
}

impl RenderSurface for MemorySurface {
    fn id(&self) -> SurfaceId {
        self.id
    }

    fn dimensions(&mut self) -> Result<(u16, u16), PanelError> {
        let state = self.state.lock();
        if let Some(reason) = &state.unavailable {
            return Err(PanelError::SurfaceUnavailable(reason.clone()));
        }
        Ok((state.screen.rows, state.screen.cols))
    }

    fn cursor_row(&mut self) -> Result<u16, PanelError> {
        let state = self.state.lock();
        if let Some(reason) = &state.unavailable {
            return Err(PanelError::SurfaceUnavailable(reason.clone()));
        }
        Ok(state.screen.row)
    }

    fn move_cursor(&mut self, rows: i32) -> io::Result<()> {
        self.record(SurfaceOp::MoveCursor(rows))
    }

    fn move_to_row(&mut self, row: u16) -> io::Result<()> {
        self.record(SurfaceOp::MoveToRow(row))
    }

    fn set_scroll_region(&mut self, top: u16, bottom: u16) -> io::Result<()> {
        self.record(SurfaceOp::SetScrollRegion(top, bottom))
    }

    fn reset_scroll_region(&mut self) -> io::Result<()> {
        self.record(SurfaceOp::ResetScrollRegion)
    }

    fn clear_line(&mut self) -> io::Result<()> {
        self.record(SurfaceOp::ClearLine)
    }

    fn save_cursor(&mut self) -> io::Result<()> {
        self.record(SurfaceOp::SaveCursor)
    }

    fn restore_cursor(&mut self) -> io::Result<()> {
        self.record(SurfaceOp::RestoreCursor)
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        self.record(SurfaceOp::Write(text.to_string()))
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        if state
            .fail_after_flushes
            .is_some_and(|limit| state.flushes >= limit)
        {
            state.pending.clear();
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "surface closed"));
        }
        state.flushes += 1;
        let frame = std::mem::take(&mut state.pending);
        state.frames.push(frame);
        Ok(())
    }
}
