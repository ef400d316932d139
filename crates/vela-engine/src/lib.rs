//! Vela Engine
//! ============
//! The real-time audio engine behind Vela Studio: transport scheduling, mix
//! graph routing with plug-in delay compensation, the fixed insert plug-in
//! family, automation read/write, meters, and offline master/stem rendering.

pub mod automation;
pub mod buffer;
pub mod clips;
pub mod commands;
pub mod core;
pub mod delay;
pub mod facade;
pub mod graph;
pub mod meters;
pub mod plugins;
pub mod render;
pub mod track;
pub mod transport;
pub mod voices;
pub mod wav;

pub use buffer::{AudioBuffer, BufferConfig, ChannelLayout};
pub use clips::{AudioClip, ClipError, CrossfadeSpec, FadeCurve, FadeSpec, StretchQuality};
pub use commands::{ClipEdit, Command, TrackPatch};
pub use core::{EngineContext, EngineError, EngineResult};
pub use facade::Engine;
pub use graph::{compute_pdc, topological_order, validate_destination, PdcPlan, MAX_ROUTE_DEPTH};
pub use render::{render_master, render_stems, sanitize_stem_name, CancellationToken, RenderRequest, StemRender};
pub use transport::{EventKind, ScheduledEvent, Transport};
