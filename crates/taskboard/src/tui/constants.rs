//! Shared constants for the TUI to keep layout and timing in sync.

/// Interval in milliseconds between UI ticks/redraws.
pub const TUI_TICK_RATE_MS: u64 = 200;
/// Time-to-live in seconds for transient status messages.
pub const UI_MESSAGE_TTL_SECS: u64 = 5;
/// Marker shown beside the task under the cursor.
pub const CURSOR_SYMBOL: &str = "▶ ";
/// Marker shown beside the task being dragged.
pub const DRAG_SYMBOL: &str = "↕ ";
/// Suffix for tasks still waiting for a server id.
pub const PENDING_SUFFIX: &str = " (saving)";
/// Height of the key help and status rows.
pub const FOOTER_HEIGHT: u16 = 3;
