pub mod badge;
pub mod config;
pub mod dispatch;
pub mod markers;
pub mod page;
pub mod painter;
pub mod reconciler;
pub mod site;
pub mod tracker;

mod engine;
mod inbound;

pub use crate::config::{ConfigError, EngineConfig};
pub use crate::dispatch::SetupState;
pub use crate::engine::WatchSync;
pub use crate::markers::{Marker, MarkerTable};
pub use crate::page::{Page, TimeUpdate};
pub use crate::reconciler::{LookupBatch, Reconciler, Transition};
pub use crate::site::{Site, YoutubeSite};
pub use crate::tracker::{PlaybackWatcher, Progress, watched_threshold};
