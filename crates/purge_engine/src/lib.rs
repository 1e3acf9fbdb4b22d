//! Purge engine: async orchestration of a bulk-deletion run.
mod actions;
mod config;
mod controller;
mod engine;
mod executor;
mod governor;
mod pace;
mod page;
mod persist;
mod source;
mod transport;
mod types;

pub use actions::{Confirmation, DeletionActions, HttpDeletionActions};
pub use config::{Clock, EngineConfig};
pub use controller::{Controller, EngineFault, EngineParts};
pub use engine::{EngineHandle, StopHandle};
pub use executor::DeletionExecutor;
pub use governor::{Governor, RateLimitSnapshot};
pub use pace::{pause, Cancelled};
pub use page::{PageError, PageProcessor, PageReport};
pub use persist::{
    ensure_cursor_dir, AtomicFileWriter, CursorStore, FileCursorStore, MemoryCursorStore,
    PersistError,
};
pub use source::{ContentSource, HttpContentSource, Navigation, SourceError};
pub use transport::{
    GovernedTransport, Method, ReqwestTransport, Transport, TransportError, TransportErrorKind,
    TransportRequest, TransportResponse, TransportSettings, THROTTLED_STATUS,
};
pub use types::{ChannelProgressSink, EngineEvent, NullSink, ProgressSink, RunEnd};
