//! # steppanel-render
//!
//! Drawing side of the status panel: the [`RenderSurface`] capability with a
//! crossterm terminal implementation and an in-memory one, the panel
//! [`PanelLayout`], and the [`PanelRenderer`] that keeps the panel pinned
//! above scrolling output.

pub mod layout;
pub mod memory;
pub mod renderer;
pub mod surface;
pub mod terminal;
pub mod theme;
pub mod ticker;

// Re-exports
pub use layout::{clip, PanelLayout};
pub use memory::{MemorySurface, SurfaceOp};
pub use renderer::{PanelRenderer, RendererConfig};
pub use surface::{is_owned, OwnershipGuard, RenderSurface, SurfaceId};
pub use terminal::{Stream, TerminalSurface};
pub use theme::{is_color_disabled, PanelTheme};
pub use ticker::Ticker;
