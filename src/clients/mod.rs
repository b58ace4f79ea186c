pub mod analysis_client;
pub mod endpoints;
pub mod event_stream;

pub use analysis_client::AnalysisClient;
pub use event_stream::{decode_event_stream, SseDecoder};
