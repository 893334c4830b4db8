//! Pipeline latency statistics: offline replay of a captured event log.
//!
//! Each log line is `<epoch ms>:<payload>`. Raw (CSV) payloads are input
//! events fed to the stream-processing pipeline; structured (JSON) payloads
//! are derived events it emitted, citing the inputs and internal timestamps
//! that produced them. One pass correlates the two and yields exact
//! percentiles of end-to-end, processing, input-phase and output-phase
//! latency, plus end-to-end per derived event type.
//!
//! Every sample is held in memory until the pass ends, since exact
//! percentiles need the full sorted series. No state survives a run.

pub mod codec;
pub mod config;
pub mod correlate;
pub mod engine;
pub mod error;
pub mod eventlog;
pub mod index;
pub mod record;
pub mod report;
pub mod series;
pub mod types;
pub mod usecase;

pub use codec::{EventCodec, JsonEventCodec};
pub use config::{Config, RankRule};
pub use engine::StatsEngine;
pub use error::{CodecError, StatsError};
pub use report::{Stats, Summary};
pub use series::{Percentile, SeriesKind};
pub use types::{Event, UseCase};
pub use usecase::EventIdentity;
