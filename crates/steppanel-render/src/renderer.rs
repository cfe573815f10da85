//! The fixed-region panel renderer.
//!
//! On attach the renderer reserves `height` rows at the cursor, confines
//! terminal scrolling to the rows below them (DECSTBM) and parks the cursor
//! at the top of that scrolling region, so ordinary output keeps flowing
//! beneath the panel. Every redraw saves the cursor, rewrites each panel row
//! in place, restores the cursor and flushes once.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use steppanel_core::{
    Clock, PanelError, Snapshot, StepEvent, StepObserver, DEFAULT_HISTORY_CAPACITY,
    DEFAULT_TICK_INTERVAL,
};
use tracing::{debug, error, info, warn};

use crate::layout::PanelLayout;
use crate::surface::{OwnershipGuard, RenderSurface, SurfaceId};
use crate::ticker::Ticker;

/// Smallest scrolling region a terminal honours.
pub const MIN_SCROLL_ROWS: u16 = 2;

/// Renderer settings.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Panel height in rows; `None` sizes it to the tallest possible content.
    pub height: Option<u16>,
    /// History capacity the default height is computed for.
    pub history_capacity: usize,
    /// Rows that must stay available for scrolling output below the panel;
    /// never less than [`MIN_SCROLL_ROWS`].
    pub min_scroll_rows: u16,
    /// Periodic redraw interval; `None` disables the ticker.
    pub tick_interval: Option<Duration>,
    /// Panel drawing.
    pub layout: PanelLayout,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            height: None,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            min_scroll_rows: MIN_SCROLL_ROWS,
            tick_interval: Some(DEFAULT_TICK_INTERVAL),
            layout: PanelLayout::default(),
        }
    }
}

impl RendererConfig {
    /// Fix the panel height.
    #[must_use]
    pub fn with_height(mut self, height: u16) -> Self {
        self.height = Some(height);
        self
    }

    /// Size the default height for this history capacity.
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Set or disable the periodic redraw.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Option<Duration>) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Set the layout.
    #[must_use]
    pub fn with_layout(mut self, layout: PanelLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Effective panel height.
    #[must_use]
    pub fn panel_height(&self) -> u16 {
        self.height
            .unwrap_or_else(|| self.layout.natural_height(self.history_capacity))
            .max(1)
    }
}

struct Frame {
    surface: Box<dyn RenderSurface>,
    layout: PanelLayout,
    top: u16,
    height: u16,
    cols: u16,
    latest: Option<Snapshot>,
    disabled: bool,
    detached: bool,
    guard: Option<OwnershipGuard>,
}

impl Frame {
    fn draw(&mut self) -> Result<(), PanelError> {
        if self.disabled || self.detached {
            return Ok(());
        }
        let Some(snapshot) = self.latest.as_ref() else {
            return Ok(());
        };
        if let Ok((_, cols)) = self.surface.dimensions() {
            self.cols = cols;
        }
        let lines = self.layout.render(snapshot, self.height, self.cols);
        if let Err(err) = self.write_frame(&lines) {
            self.disabled = true;
            error!(
                surface = %self.surface.id(),
                error = %err,
                "panel write failed, panel disabled"
            );
            return Err(PanelError::Surface(err.to_string()));
        }
        Ok(())
    }

    fn write_frame(&mut self, lines: &[String]) -> io::Result<()> {
        self.surface.save_cursor()?;
        for (offset, line) in (0u16..).zip(lines) {
            self.surface.move_to_row(self.top + offset)?;
            self.surface.clear_line()?;
            self.surface.write(line)?;
        }
        self.surface.restore_cursor()?;
        self.surface.flush()
    }

    fn release_region(&mut self) -> io::Result<()> {
        self.surface.save_cursor()?;
        self.surface.reset_scroll_region()?;
        self.surface.restore_cursor()?;
        self.surface.flush()
    }

    fn finish(&mut self) {
        if self.detached {
            return;
        }
        if let Err(err) = self.draw() {
            debug!(error = %err, "final redraw failed");
        }
        if !self.disabled {
            if let Err(err) = self.release_region() {
                warn!(error = %err, "could not reset scroll region");
            }
        }
        self.detached = true;
        if let Some(guard) = self.guard.take() {
            info!(surface = %guard.id(), "panel detached");
        }
    }
}

fn tick_frame(frame: &Mutex<Frame>, clock: &dyn Clock) {
    let mut frame = frame.lock();
    if let Some(latest) = frame.latest.as_ref() {
        let retimed = latest.retimed(clock);
        frame.latest = Some(retimed);
        // A failure is logged once by `draw`; the ticker keeps going as a no-op.
        let _ = frame.draw();
    }
}

/// Draws snapshots into a fixed region at the top of the scrolling output.
pub struct PanelRenderer {
    frame: Arc<Mutex<Frame>>,
    ticker: Mutex<Option<Ticker>>,
    id: SurfaceId,
    height: u16,
}

impl PanelRenderer {
    /// Take exclusive ownership of `surface` and reserve the panel rows.
    ///
    /// # Errors
    ///
    /// `SurfaceUnavailable` when the surface has no usable size or is too
    /// short for the panel plus the scrolling rows; `SurfaceAlreadyOwned`
    /// when another panel holds the same stream.
    pub fn attach(
        mut surface: Box<dyn RenderSurface>,
        config: RendererConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PanelError> {
        let (rows, cols) = surface.dimensions()?;
        let height = config.panel_height();
        let scroll_rows = config.min_scroll_rows.max(MIN_SCROLL_ROWS);
        if u32::from(rows) < u32::from(height) + u32::from(scroll_rows) {
            return Err(PanelError::SurfaceUnavailable(format!(
                "terminal has {rows} rows, panel needs {height} plus {scroll_rows} for output"
            )));
        }

        let id = surface.id();
        let guard = OwnershipGuard::claim(id)?;
        let top = reserve(surface.as_mut(), rows, height, scroll_rows)?;
        info!(surface = %id, top, height, rows, cols, "panel attached");

        let frame = Arc::new(Mutex::new(Frame {
            surface,
            layout: config.layout,
            top,
            height,
            cols,
            latest: None,
            disabled: false,
            detached: false,
            guard: Some(guard),
        }));

        let ticker = config.tick_interval.and_then(|interval| {
            let shared = Arc::clone(&frame);
            let clock = Arc::clone(&clock);
            Ticker::spawn(interval, move || tick_frame(&shared, clock.as_ref()))
                .map_err(|err| warn!(error = %err, "could not start panel ticker"))
                .ok()
        });

        Ok(Self {
            frame,
            ticker: Mutex::new(ticker),
            id,
            height,
        })
    }

    /// Redraw the panel from `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns `PanelError::Surface` from the call whose write failed; the
    /// renderer is a no-op from then on.
    pub fn redraw(&self, snapshot: &Snapshot) -> Result<(), PanelError> {
        let mut frame = self.frame.lock();
        frame.latest = Some(snapshot.clone());
        frame.draw()
    }

    /// Stop the ticker, draw the final frame, restore full-screen scrolling
    /// and release the surface. The panel stays on screen. Idempotent.
    pub fn detach(&self) {
        if let Some(mut ticker) = self.ticker.lock().take() {
            ticker.stop();
        }
        self.frame.lock().finish();
    }

    /// Whether redraws still reach the surface.
    #[must_use]
    pub fn is_active(&self) -> bool {
        let frame = self.frame.lock();
        !frame.disabled && !frame.detached
    }

    /// Whether a write failure disabled the renderer.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.frame.lock().disabled
    }

    /// Stream the panel draws on.
    #[must_use]
    pub fn surface_id(&self) -> SurfaceId {
        self.id
    }

    /// First row of the panel.
    #[must_use]
    pub fn top_row(&self) -> u16 {
        self.frame.lock().top
    }

    /// Panel height in rows.
    #[must_use]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Most recently drawn snapshot.
    #[must_use]
    pub fn latest(&self) -> Option<Snapshot> {
        self.frame.lock().latest.clone()
    }
}

impl std::fmt::Debug for PanelRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelRenderer")
            .field("surface", &self.id)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl StepObserver for PanelRenderer {
    fn on_event(&self, _event: &StepEvent, snapshot: &Snapshot) {
        let _ = self.redraw(snapshot);
    }
}

impl Drop for PanelRenderer {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Reserve `height` rows at the cursor and set up the scrolling region.
/// Returns the panel's top row.
fn reserve(
    surface: &mut dyn RenderSurface,
    rows: u16,
    height: u16,
    scroll_rows: u16,
) -> Result<u16, PanelError> {
    let unavailable = |err: io::Error| PanelError::SurfaceUnavailable(err.to_string());

    surface
        .write(&"\n".repeat(usize::from(height)))
        .map_err(unavailable)?;
    surface
        .move_cursor(-i32::from(height))
        .map_err(unavailable)?;
    surface.flush().map_err(unavailable)?;
    let mut top = surface.cursor_row()?;

    let needed = u32::from(top) + u32::from(height) + u32::from(scroll_rows);
    if needed > u32::from(rows) {
        let deficit = u16::try_from(needed - u32::from(rows)).unwrap_or(u16::MAX);
        surface.move_to_row(rows - 1).map_err(unavailable)?;
        surface
            .write(&"\n".repeat(usize::from(deficit)))
            .map_err(unavailable)?;
        top = top.saturating_sub(deficit);
    }

    let first_scroll_row = top + height;
    surface
        .set_scroll_region(first_scroll_row, rows - 1)
        .map_err(unavailable)?;
    surface.move_to_row(first_scroll_row).map_err(unavailable)?;
    surface.flush().map_err(unavailable)?;
    Ok(top)
}
