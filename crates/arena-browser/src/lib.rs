//! Browser session manager — one long-lived authenticated Chrome context,
//! controlled over CDP, plus the per-request chunk bridge that carries
//! streamed data out of the page.

pub mod bridge;
pub mod session;

pub use bridge::{fresh_binding_name, ChunkBridge};
pub use chromiumoxide::Page;
pub use session::{run_page_task, SessionManager, SessionState};
