//! Compositor Module
//!
//! Turns the layer stack into displayable and exportable images:
//! - Snapshots: immutable copies of the stack for rendering
//! - Signatures: per-layer cache keys
//! - Compositor: cached, incremental frame rendering
//! - Render thread: the compositor on a worker thread

mod composite;
mod render_thread;
mod signature;
mod snapshot;

pub use composite::{export_flattened, export_layer, Compositor, CompositorStats};
pub use render_thread::{Frame, RenderThread};
pub use signature::{base_key, LayerSignature};
pub use snapshot::{LayerSnapshot, RenderSnapshot};
