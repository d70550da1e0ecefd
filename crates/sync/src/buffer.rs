use std::collections::HashMap;

use crate::diff::normalize_newlines;
use crate::protocol::ProblemId;

/// Latest known text of every problem, newline-normalized.
#[derive(Debug, Default)]
pub struct BufferCache {
    buffers: HashMap<ProblemId, String>,
}

impl BufferCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, problem_id: ProblemId) -> Option<&str> {
        self.buffers.get(&problem_id).map(String::as_str)
    }

    /// Text of a problem, or the empty string if nothing was written yet.
    pub fn text_or_empty(&self, problem_id: ProblemId) -> String {
        self.get(problem_id).unwrap_or_default().to_string()
    }

    /// Store `text` and report whether it differs from what was cached.
    pub fn store(&mut self, problem_id: ProblemId, text: &str) -> bool {
        let text = normalize_newlines(text);
        if self.get(problem_id) == Some(text.as_str()) {
            return false;
        }
        self.buffers.insert(problem_id, text);
        true
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
