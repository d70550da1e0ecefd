use crate::bus::BusError;
use crate::editor::EditorError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("editor error: {0}")]
    Editor(#[from] EditorError),

    #[error("transport error: {0}")]
    Bus(#[from] BusError),

    #[error("malformed event: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
