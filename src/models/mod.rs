pub mod file;
pub mod result;
pub mod session;
pub mod wire;

pub use file::{CandidateFile, FileDescriptor, MAX_FILE_SIZE_BYTES, PNG_MEDIA_TYPE};
pub use result::{AnalysisPayload, FileResult};
pub use session::Session;
pub use wire::{
    BatchItem, BatchResponse, CurrentProcessing, RetryResponse, SaveRequest, SaveResponse,
    SavedRecord, StartResponse, StatusEvent, StatusResponse, StreamMessage,
};
