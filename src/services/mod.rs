pub mod payload;
pub mod presenter;
pub mod storage;
pub mod strategy;
pub mod validator;

pub use payload::{extract_display, parse_fenced_json, PayloadDisplay};
pub use presenter::{BusyGuard, ConsolePresenter, MessageLevel, Presenter};
pub use storage::{FileStore, KeyValueStore, MemoryStore, ResultMirror, RESULTS_STORAGE_KEY};
pub use strategy::ProcessingMode;
pub use validator::{FileSetValidator, RejectReason, RejectedFile, Selection, ValidationReport};
