pub mod config;
pub mod export;
pub mod observability;
pub mod pipeline;
pub mod sinks;
pub mod sources;
pub mod transform;

pub use pipeline::{Envelope, Pipeline};
