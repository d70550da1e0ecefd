//! Editor surface abstraction.
//!
//! An [`EditorAdapter`] is whatever hosts the code being edited. It reports
//! local activity as a queue of [`EditorEvent`]s that the engine drains, and
//! accepts batches of remote edits that must leave the user's selections and
//! scroll position where they were.

use crate::diff::{self, LineIndex, Position, TextEdit};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    /// The buffer content changed.
    Changed,
    /// The primary cursor moved.
    CursorMoved(Position),
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("editor model is not available")]
    Unavailable,
    #[error("invalid edit range: {0}")]
    InvalidRange(#[from] diff::EditRangeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor: Position,
    pub head: Position,
}

impl Selection {
    pub fn caret(at: Position) -> Self {
        Self {
            anchor: at,
            head: at,
        }
    }
}

pub trait EditorAdapter {
    /// Current buffer content.
    fn content(&self) -> String;

    /// Apply a batch of edits expressed against the current content as one
    /// undo step, keeping selections and scroll position.
    fn apply_edits(&mut self, edits: &[TextEdit]) -> Result<(), EditorError>;

    /// Replace the whole buffer, e.g. when another problem is loaded.
    fn set_content(&mut self, text: &str) -> Result<(), EditorError>;

    /// Drain the local activity recorded since the last call.
    fn take_events(&mut self) -> Vec<EditorEvent>;
}

/// Scope in which edits applied to the editor are remote, not typed.
///
/// It holds the only mutable borrow of the editor, so nothing that could
/// broadcast a local edit can run while it is alive. Events the editor
/// records meanwhile are discarded when the scope ends.
pub struct RemoteApply<'a, E: EditorAdapter + ?Sized> {
    editor: &'a mut E,
}

impl<'a, E: EditorAdapter + ?Sized> RemoteApply<'a, E> {
    pub fn begin(editor: &'a mut E) -> Self {
        Self { editor }
    }

    pub fn content(&self) -> String {
        self.editor.content()
    }

    pub fn apply_edits(&mut self, edits: &[TextEdit]) -> Result<(), EditorError> {
        self.editor.apply_edits(edits)
    }

    pub fn set_content(&mut self, text: &str) -> Result<(), EditorError> {
        self.editor.set_content(text)
    }
}

impl<E: EditorAdapter + ?Sized> Drop for RemoteApply<'_, E> {
    fn drop(&mut self) {
        let echoed = self.editor.take_events();
        if !echoed.is_empty() {
            tracing::trace!(count = echoed.len(), "suppressed editor events from remote apply");
        }
    }
}

/// In-memory editor model.
///
/// Tracks selections, a scroll offset and an undo stack the way a code editor
/// widget does, which makes it usable both headless and in tests.
#[derive(Debug)]
pub struct TextModel {
    text: String,
    selections: Vec<Selection>,
    scroll_top: u32,
    undo_stack: Vec<String>,
    events: Vec<EditorEvent>,
    attached: bool,
}

impl TextModel {
    pub fn new(text: &str) -> Self {
        Self {
            text: diff::normalize_newlines(text),
            selections: vec![Selection::caret(Position::new(1, 1))],
            scroll_top: 0,
            undo_stack: Vec::new(),
            events: Vec::new(),
            attached: true,
        }
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    pub fn cursor(&self) -> Position {
        self.selections
            .first()
            .map(|s| s.head)
            .unwrap_or(Position::new(1, 1))
    }

    pub fn scroll_top(&self) -> u32 {
        self.scroll_top
    }

    pub fn set_scroll_top(&mut self, scroll_top: u32) {
        self.scroll_top = scroll_top;
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Revert the most recent edit group.
    pub fn undo(&mut self) -> bool {
        match self.undo_stack.pop() {
            Some(previous) => {
                self.text = previous;
                self.clamp_selections();
                self.events.push(EditorEvent::Changed);
                true
            }
            None => false,
        }
    }

    /// Detach the model, as when the widget is torn down. Edits then fail.
    pub fn detach(&mut self) {
        self.attached = false;
    }

    pub fn attach(&mut self) {
        self.attached = true;
    }

    pub fn set_selections(&mut self, selections: Vec<Selection>) {
        self.selections = selections;
        self.clamp_selections();
        let head = self.cursor();
        self.events.push(EditorEvent::CursorMoved(head));
    }

    /// Move the caret, as a click or arrow key would.
    pub fn move_cursor(&mut self, at: Position) {
        self.set_selections(vec![Selection::caret(at)]);
    }

    /// Type `text` at the caret, as the user would.
    pub fn type_text(&mut self, text: &str) -> Result<(), EditorError> {
        if !self.attached {
            return Err(EditorError::Unavailable);
        }
        let at = self.cursor();
        let typed = diff::normalize_newlines(text);
        let edit = TextEdit {
            start: at,
            end: at,
            text: typed.clone(),
        };
        let updated = diff::apply_edits(&self.text, &[edit])?;
        self.undo_stack.push(std::mem::replace(&mut self.text, updated));

        let line_breaks = typed.matches('\n').count() as u32;
        let caret = match typed.rsplit_once('\n') {
            Some((_, tail)) => Position::new(
                at.line_number + line_breaks,
                tail.chars().count() as u32 + 1,
            ),
            None => Position::new(at.line_number, at.column + typed.chars().count() as u32),
        };
        self.selections = vec![Selection::caret(caret)];
        self.events.push(EditorEvent::Changed);
        self.events.push(EditorEvent::CursorMoved(caret));
        Ok(())
    }

    fn clamp_selections(&mut self) {
        let chars: Vec<char> = self.text.chars().collect();
        let index = LineIndex::new(&chars);
        let clamp = |pos: Position| {
            let last_line = index.line_count() as u32;
            let line = pos.line_number.clamp(1, last_line);
            let max_column = index.line_len((line - 1) as usize) as u32 + 1;
            Position::new(line, pos.column.clamp(1, max_column))
        };
        for selection in &mut self.selections {
            selection.anchor = clamp(selection.anchor);
            selection.head = clamp(selection.head);
        }
    }
}

impl Default for TextModel {
    fn default() -> Self {
        Self::new("")
    }
}

impl EditorAdapter for TextModel {
    fn content(&self) -> String {
        self.text.clone()
    }

    fn apply_edits(&mut self, edits: &[TextEdit]) -> Result<(), EditorError> {
        if !self.attached {
            return Err(EditorError::Unavailable);
        }
        if edits.is_empty() {
            return Ok(());
        }

        let saved_selections = self.selections.clone();
        let saved_scroll = self.scroll_top;

        let updated = diff::apply_edits(&self.text, edits)?;
        self.undo_stack.push(std::mem::replace(&mut self.text, updated));

        self.selections = saved_selections;
        self.clamp_selections();
        self.scroll_top = saved_scroll;

        // A widget fires its change and cursor hooks for every mutation.
        self.events.push(EditorEvent::Changed);
        self.events.push(EditorEvent::CursorMoved(self.cursor()));
        Ok(())
    }

    fn set_content(&mut self, text: &str) -> Result<(), EditorError> {
        if !self.attached {
            return Err(EditorError::Unavailable);
        }
        let text = diff::normalize_newlines(text);
        if text == self.text {
            return Ok(());
        }
        self.undo_stack.push(std::mem::replace(&mut self.text, text));
        self.clamp_selections();
        self.events.push(EditorEvent::Changed);
        Ok(())
    }

    fn take_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::compute_edits;

    #[test]
    fn typing_records_change_and_cursor() {
        let mut model = TextModel::new("");
        model.type_text("ab\ncd").unwrap();
        assert_eq!(model.content(), "ab\ncd");
        assert_eq!(model.cursor(), Position::new(2, 3));
        assert_eq!(
            model.take_events(),
            vec![
                EditorEvent::Changed,
                EditorEvent::CursorMoved(Position::new(2, 3))
            ]
        );
        assert!(model.take_events().is_empty());
    }

    #[test]
    fn remote_edits_keep_selection_and_scroll() {
        let mut model = TextModel::new("line one\nline two\nline three");
        model.move_cursor(Position::new(3, 6));
        model.set_scroll_top(120);

        let edits = compute_edits(&model.content(), "line 1\nline two\nline three");
        model.apply_edits(&edits).unwrap();

        assert_eq!(model.content(), "line 1\nline two\nline three");
        assert_eq!(model.cursor(), Position::new(3, 6));
        assert_eq!(model.scroll_top(), 120);
    }

    #[test]
    fn remote_edits_form_one_undo_step() {
        let mut model = TextModel::new("a\nb\nc");
        let edits = compute_edits("a\nb\nc", "x\nb\ny");
        assert!(edits.len() > 1);
        model.apply_edits(&edits).unwrap();
        assert_eq!(model.undo_depth(), 1);
        assert!(model.undo());
        assert_eq!(model.content(), "a\nb\nc");
    }

    #[test]
    fn selections_are_clamped_when_text_shrinks() {
        let mut model = TextModel::new("first\nsecond\nthird");
        model.move_cursor(Position::new(3, 5));
        model.apply_edits(&compute_edits(&model.content(), "first")).unwrap();
        assert_eq!(model.cursor(), Position::new(1, 5));
    }

    #[test]
    fn detached_model_rejects_edits() {
        let mut model = TextModel::new("x");
        model.detach();
        let edits = compute_edits("x", "y");
        assert!(matches!(
            model.apply_edits(&edits),
            Err(EditorError::Unavailable)
        ));
        assert_eq!(model.content(), "x");
    }

    #[test]
    fn remote_apply_discards_echoed_events() {
        let mut model = TextModel::new("a");
        {
            let mut scope = RemoteApply::begin(&mut model);
            let edits = compute_edits(&scope.content(), "ab");
            scope.apply_edits(&edits).unwrap();
        }
        assert_eq!(model.content(), "ab");
        assert!(model.take_events().is_empty());
    }
}
