//! Character-level text diffing and conversion to editor edits.
//!
//! [`compute_edits`] turns an old and a new snapshot into a list of
//! line/column range edits that an editor can apply in one batch. The diff
//! itself is Myers' O(ND) algorithm (middle-snake bisection, linear space)
//! followed by an efficiency cleanup that folds short equalities sandwiched
//! between changes into the surrounding edits, so a live editor receives few,
//! contiguous operations.

use serde::{Deserialize, Serialize};

/// Equalities shorter than this, surrounded by edits, are not worth keeping.
const EDIT_COST: usize = 4;

/// Default combined size (old + new, in chars) above which diffing is skipped.
pub const DEFAULT_FULL_REPLACE_THRESHOLD: usize = 200_000;

/// Collapse `\r\n` and lone `\r` into `\n`.
pub fn normalize_newlines(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// 1-based line/column position. Columns count Unicode scalar values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub line_number: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line_number: u32, column: u32) -> Self {
        Self {
            line_number,
            column,
        }
    }
}

/// Replace the range `start..end` of the old text with `text`.
///
/// A zero-width range is an insertion, an empty `text` a deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub start: Position,
    pub end: Position,
    pub text: String,
}

impl TextEdit {
    pub fn is_insert(&self) -> bool {
        self.start == self.end
    }

    pub fn is_delete(&self) -> bool {
        self.text.is_empty() && self.start != self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffOptions {
    /// Combined char count beyond which a single full-buffer replace is
    /// emitted instead of a diff. `None` always diffs.
    pub full_replace_threshold: Option<usize>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            full_replace_threshold: Some(DEFAULT_FULL_REPLACE_THRESHOLD),
        }
    }
}

/// Compute the edits turning `old` into `new` with default options.
pub fn compute_edits(old: &str, new: &str) -> Vec<TextEdit> {
    compute_edits_with(old, new, &DiffOptions::default())
}

pub fn compute_edits_with(old: &str, new: &str, options: &DiffOptions) -> Vec<TextEdit> {
    let old = normalize_newlines(old);
    let new = normalize_newlines(new);
    if old == new {
        return Vec::new();
    }

    let old_chars: Vec<char> = old.chars().collect();
    let new_chars: Vec<char> = new.chars().collect();
    let index = LineIndex::new(&old_chars);

    if let Some(threshold) = options.full_replace_threshold {
        if old_chars.len() + new_chars.len() > threshold {
            tracing::debug!(
                old_len = old_chars.len(),
                new_len = new_chars.len(),
                "diff skipped, replacing whole buffer"
            );
            return vec![TextEdit {
                start: Position::new(1, 1),
                end: index.position(old_chars.len()),
                text: new,
            }];
        }
    }

    let mut chunks = diff_chars(&old_chars, &new_chars);
    cleanup_efficiency(&mut chunks);

    let mut edits = Vec::new();
    let mut offset = 0;
    for chunk in &chunks {
        let len = chunk.text.len();
        match chunk.op {
            Op::Equal => offset += len,
            Op::Delete => {
                edits.push(TextEdit {
                    start: index.position(offset),
                    end: index.position(offset + len),
                    text: String::new(),
                });
                offset += len;
            }
            Op::Insert => {
                let at = index.position(offset);
                edits.push(TextEdit {
                    start: at,
                    end: at,
                    text: chunk.text.iter().collect(),
                });
            }
        }
    }
    edits
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum EditRangeError {
    #[error("position {line}:{column} lies outside the text")]
    OutOfBounds { line: u32, column: u32 },
    #[error("edit ranges overlap or are out of order")]
    Overlapping,
}

/// Apply an edit list produced against `text` and return the new text.
///
/// Every range refers to `text` as it was before any edit, the way a batch
/// edit in an editor is interpreted.
pub fn apply_edits(text: &str, edits: &[TextEdit]) -> Result<String, EditRangeError> {
    let chars: Vec<char> = normalize_newlines(text).chars().collect();
    let index = LineIndex::new(&chars);

    let mut spans = Vec::with_capacity(edits.len());
    for edit in edits {
        let start = index.offset(edit.start)?;
        let end = index.offset(edit.end)?;
        if end < start {
            return Err(EditRangeError::Overlapping);
        }
        spans.push((start, end, edit.text.as_str()));
    }

    let mut out = String::with_capacity(chars.len());
    let mut cursor = 0;
    for (start, end, replacement) in spans {
        if start < cursor {
            return Err(EditRangeError::Overlapping);
        }
        out.extend(&chars[cursor..start]);
        out.push_str(replacement);
        cursor = end;
    }
    out.extend(&chars[cursor..]);
    Ok(out)
}

/// Char offsets of the start of every line of a text.
pub(crate) struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub(crate) fn new(chars: &[char]) -> Self {
        let mut starts = vec![0];
        for (i, c) in chars.iter().enumerate() {
            if *c == '\n' {
                starts.push(i + 1);
            }
        }
        Self {
            starts,
            len: chars.len(),
        }
    }

    pub(crate) fn position(&self, offset: usize) -> Position {
        let line = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Position::new((line + 1) as u32, (offset - self.starts[line] + 1) as u32)
    }

    pub(crate) fn offset(&self, pos: Position) -> Result<usize, EditRangeError> {
        let out_of_bounds = EditRangeError::OutOfBounds {
            line: pos.line_number,
            column: pos.column,
        };
        if pos.line_number == 0 || pos.column == 0 {
            return Err(out_of_bounds);
        }
        let line = (pos.line_number - 1) as usize;
        let start = *self.starts.get(line).ok_or(out_of_bounds.clone())?;
        // Last valid column sits just before the newline, or at end of text.
        let line_end = self
            .starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.len);
        let offset = start + (pos.column - 1) as usize;
        if offset > line_end {
            return Err(out_of_bounds);
        }
        Ok(offset)
    }

    pub(crate) fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Length in chars of a 0-based line, excluding its newline.
    pub(crate) fn line_len(&self, line: usize) -> usize {
        let start = self.starts[line];
        let end = self
            .starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.len);
        end - start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Delete,
    Insert,
    Equal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Chunk {
    op: Op,
    text: Vec<char>,
}

impl Chunk {
    fn new(op: Op, text: &[char]) -> Self {
        Self {
            op,
            text: text.to_vec(),
        }
    }
}

fn diff_chars(old: &[char], new: &[char]) -> Vec<Chunk> {
    if old == new {
        if old.is_empty() {
            return Vec::new();
        }
        return vec![Chunk::new(Op::Equal, old)];
    }

    let prefix = common_prefix(old, new);
    let suffix = common_suffix(&old[prefix..], &new[prefix..]);

    let mut chunks = Vec::new();
    if prefix > 0 {
        chunks.push(Chunk::new(Op::Equal, &old[..prefix]));
    }
    chunks.extend(diff_middle(
        &old[prefix..old.len() - suffix],
        &new[prefix..new.len() - suffix],
    ));
    if suffix > 0 {
        chunks.push(Chunk::new(Op::Equal, &old[old.len() - suffix..]));
    }

    merge(&mut chunks);
    chunks
}

fn common_prefix(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[char], b: &[char]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Diff two texts that share neither prefix nor suffix.
fn diff_middle(old: &[char], new: &[char]) -> Vec<Chunk> {
    if old.is_empty() {
        return vec![Chunk::new(Op::Insert, new)];
    }
    if new.is_empty() {
        return vec![Chunk::new(Op::Delete, old)];
    }

    let (long, short, long_op) = if old.len() > new.len() {
        (old, new, Op::Delete)
    } else {
        (new, old, Op::Insert)
    };
    if let Some(at) = find_subslice(long, short) {
        return vec![
            Chunk::new(long_op, &long[..at]),
            Chunk::new(Op::Equal, short),
            Chunk::new(long_op, &long[at + short.len()..]),
        ];
    }
    if short.len() == 1 {
        return vec![Chunk::new(Op::Delete, old), Chunk::new(Op::Insert, new)];
    }

    bisect(old, new)
}

fn find_subslice(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Find the middle snake of the edit graph and recurse on both halves.
fn bisect(old: &[char], new: &[char]) -> Vec<Chunk> {
    let old_len = old.len() as isize;
    let new_len = new.len() as isize;
    let max_d = (old_len + new_len + 1) / 2;
    let v_offset = max_d;
    let v_len = (2 * max_d + 2) as usize;
    let mut v1 = vec![-1isize; v_len];
    let mut v2 = vec![-1isize; v_len];
    v1[(v_offset + 1) as usize] = 0;
    v2[(v_offset + 1) as usize] = 0;

    let delta = old_len - new_len;
    // With an odd delta the forward path detects the overlap, otherwise the
    // reverse path does.
    let front = delta % 2 != 0;
    let (mut k1_start, mut k1_end, mut k2_start, mut k2_end) = (0isize, 0isize, 0isize, 0isize);

    for d in 0..max_d {
        let mut k1 = -d + k1_start;
        while k1 <= d - k1_end {
            let k1_offset = (v_offset + k1) as usize;
            let mut x1 = if k1 == -d || (k1 != d && v1[k1_offset - 1] < v1[k1_offset + 1]) {
                v1[k1_offset + 1]
            } else {
                v1[k1_offset - 1] + 1
            };
            let mut y1 = x1 - k1;
            while x1 < old_len && y1 < new_len && old[x1 as usize] == new[y1 as usize] {
                x1 += 1;
                y1 += 1;
            }
            v1[k1_offset] = x1;
            if x1 > old_len {
                k1_end += 2;
            } else if y1 > new_len {
                k1_start += 2;
            } else if front {
                let k2_offset = v_offset + delta - k1;
                if k2_offset >= 0 && (k2_offset as usize) < v_len && v2[k2_offset as usize] != -1
                {
                    let x2 = old_len - v2[k2_offset as usize];
                    if x1 >= x2 {
                        return bisect_split(old, new, x1 as usize, y1 as usize);
                    }
                }
            }
            k1 += 2;
        }

        let mut k2 = -d + k2_start;
        while k2 <= d - k2_end {
            let k2_offset = (v_offset + k2) as usize;
            let mut x2 = if k2 == -d || (k2 != d && v2[k2_offset - 1] < v2[k2_offset + 1]) {
                v2[k2_offset + 1]
            } else {
                v2[k2_offset - 1] + 1
            };
            let mut y2 = x2 - k2;
            while x2 < old_len
                && y2 < new_len
                && old[(old_len - x2 - 1) as usize] == new[(new_len - y2 - 1) as usize]
            {
                x2 += 1;
                y2 += 1;
            }
            v2[k2_offset] = x2;
            if x2 > old_len {
                k2_end += 2;
            } else if y2 > new_len {
                k2_start += 2;
            } else if !front {
                let k1_offset = v_offset + delta - k2;
                if k1_offset >= 0 && (k1_offset as usize) < v_len && v1[k1_offset as usize] != -1
                {
                    let x1 = v1[k1_offset as usize];
                    let y1 = v_offset + x1 - k1_offset;
                    if x1 >= old_len - x2 {
                        return bisect_split(old, new, x1 as usize, y1 as usize);
                    }
                }
            }
            k2 += 2;
        }
    }

    // No commonality at all.
    vec![Chunk::new(Op::Delete, old), Chunk::new(Op::Insert, new)]
}

fn bisect_split(old: &[char], new: &[char], x: usize, y: usize) -> Vec<Chunk> {
    let mut chunks = diff_chars(&old[..x], &new[..y]);
    chunks.extend(diff_chars(&old[x..], &new[y..]));
    chunks
}

/// Normalize a chunk list: every run of changes between two equalities
/// becomes at most one delete followed by one insert, text shared by the
/// start or end of both moves into the neighbouring equality, and adjacent
/// equalities are joined.
fn merge(chunks: &mut Vec<Chunk>) {
    let mut out: Vec<Chunk> = Vec::with_capacity(chunks.len());
    let mut deleted: Vec<char> = Vec::new();
    let mut inserted: Vec<char> = Vec::new();

    fn push_equal(out: &mut Vec<Chunk>, text: &[char]) {
        if text.is_empty() {
            return;
        }
        match out.last_mut() {
            Some(last) if last.op == Op::Equal => last.text.extend_from_slice(text),
            _ => out.push(Chunk::new(Op::Equal, text)),
        }
    }

    fn flush(out: &mut Vec<Chunk>, deleted: &mut Vec<char>, inserted: &mut Vec<char>) {
        if deleted.is_empty() && inserted.is_empty() {
            return;
        }
        if !deleted.is_empty() && !inserted.is_empty() {
            let prefix = common_prefix(deleted, inserted);
            if prefix > 0 {
                push_equal(out, &deleted[..prefix]);
                deleted.drain(..prefix);
                inserted.drain(..prefix);
            }
            let suffix = common_suffix(deleted, inserted);
            if suffix > 0 {
                let shared: Vec<char> = deleted[deleted.len() - suffix..].to_vec();
                deleted.truncate(deleted.len() - suffix);
                inserted.truncate(inserted.len() - suffix);
                if !deleted.is_empty() {
                    out.push(Chunk::new(Op::Delete, deleted));
                }
                if !inserted.is_empty() {
                    out.push(Chunk::new(Op::Insert, inserted));
                }
                push_equal(out, &shared);
                deleted.clear();
                inserted.clear();
                return;
            }
        }
        if !deleted.is_empty() {
            out.push(Chunk::new(Op::Delete, deleted));
        }
        if !inserted.is_empty() {
            out.push(Chunk::new(Op::Insert, inserted));
        }
        deleted.clear();
        inserted.clear();
    }

    for chunk in chunks.drain(..) {
        match chunk.op {
            Op::Delete => deleted.extend(chunk.text),
            Op::Insert => inserted.extend(chunk.text),
            Op::Equal => {
                flush(&mut out, &mut deleted, &mut inserted);
                push_equal(&mut out, &chunk.text);
            }
        }
    }
    flush(&mut out, &mut deleted, &mut inserted);

    *chunks = out;
}

/// Fold short equalities that are surrounded by edits into those edits.
///
/// An equality is absorbed when it has changes of both kinds on both sides,
/// or when it is shorter than half the edit cost and three of the four
/// surrounding slots hold a change.
fn cleanup_efficiency(chunks: &mut Vec<Chunk>) {
    let mut changed = false;
    let mut equalities: Vec<usize> = Vec::new();
    let mut last_equality: Option<Vec<char>> = None;
    let mut pointer: isize = 0;
    let (mut pre_ins, mut pre_del, mut post_ins, mut post_del) = (false, false, false, false);

    while (pointer as usize) < chunks.len() {
        let p = pointer as usize;
        if chunks[p].op == Op::Equal {
            if chunks[p].text.len() < EDIT_COST && (post_ins || post_del) {
                equalities.push(p);
                pre_ins = post_ins;
                pre_del = post_del;
                last_equality = Some(chunks[p].text.clone());
            } else {
                equalities.clear();
                last_equality = None;
            }
            post_ins = false;
            post_del = false;
        } else {
            if chunks[p].op == Op::Delete {
                post_del = true;
            } else {
                post_ins = true;
            }

            let surrounding = [pre_ins, pre_del, post_ins, post_del]
                .iter()
                .filter(|flag| **flag)
                .count();
            let absorb = match &last_equality {
                Some(eq) => {
                    (pre_ins && pre_del && post_ins && post_del)
                        || (eq.len() < EDIT_COST / 2 && surrounding == 3)
                }
                None => false,
            };

            if absorb {
                if let (Some(eq), Some(&at)) = (last_equality.take(), equalities.last()) {
                    // The equality becomes a delete of itself plus an insert
                    // of itself, which merge() folds into its neighbours.
                    chunks.insert(at, Chunk::new(Op::Delete, &eq));
                    chunks[at + 1].op = Op::Insert;
                    equalities.pop();

                    if pre_ins && pre_del {
                        post_ins = true;
                        post_del = true;
                        equalities.clear();
                    } else {
                        equalities.pop();
                        pointer = equalities.last().map(|&i| i as isize).unwrap_or(-1);
                        post_ins = false;
                        post_del = false;
                    }
                    changed = true;
                }
            }
        }
        pointer += 1;
    }

    if changed {
        merge(chunks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn render(chunks: &[Chunk]) -> Vec<(Op, String)> {
        chunks
            .iter()
            .map(|c| (c.op, c.text.iter().collect()))
            .collect()
    }

    fn roundtrip(old: &str, new: &str) {
        let edits = compute_edits_with(old, new, &DiffOptions {
            full_replace_threshold: None,
        });
        let applied = apply_edits(old, &edits).unwrap();
        assert_eq!(applied, normalize_newlines(new), "edits: {edits:?}");
    }

    #[test]
    fn identical_texts_produce_no_edits() {
        assert!(compute_edits("fn main() {}\n", "fn main() {}\n").is_empty());
        assert!(compute_edits("", "").is_empty());
    }

    #[test]
    fn line_endings_do_not_produce_edits() {
        assert!(compute_edits("a\r\nb\rc", "a\nb\nc").is_empty());
    }

    #[test]
    fn single_line_replacement() {
        let edits = compute_edits("a\nb\nc", "a\nx\nc");
        assert_eq!(
            edits,
            vec![
                TextEdit {
                    start: Position::new(2, 1),
                    end: Position::new(2, 2),
                    text: String::new(),
                },
                TextEdit {
                    start: Position::new(2, 2),
                    end: Position::new(2, 2),
                    text: "x".to_string(),
                },
            ]
        );
        assert_eq!(apply_edits("a\nb\nc", &edits).unwrap(), "a\nx\nc");
    }

    #[test]
    fn insertion_uses_old_text_coordinates() {
        let edits = compute_edits("let x = 1;\n", "let x = 1;\nlet y = 2;\n");
        assert_eq!(edits.len(), 1);
        assert!(edits[0].is_insert());
        assert_eq!(edits[0].start, Position::new(2, 1));
        assert_eq!(edits[0].text, "let y = 2;\n");
    }

    #[test]
    fn deletion_spanning_lines() {
        let old = "one\ntwo\nthree\n";
        let edits = compute_edits(old, "one\nthree\n");
        assert_eq!(edits.len(), 1);
        assert!(edits[0].is_delete());
        assert_eq!(apply_edits(old, &edits).unwrap(), "one\nthree\n");
    }

    #[test]
    fn diff_finds_common_subsequence() {
        let chunks = diff_chars(&chars("abcxyz"), &chars("abXcyz"));
        assert_eq!(
            render(&chunks),
            vec![
                (Op::Equal, "ab".to_string()),
                (Op::Insert, "X".to_string()),
                (Op::Equal, "c".to_string()),
                (Op::Delete, "x".to_string()),
                (Op::Equal, "yz".to_string()),
            ]
        );
    }

    #[test]
    fn efficiency_cleanup_absorbs_short_equalities() {
        // Four changes around a one-char equality collapse into one pair.
        let mut chunks = vec![
            Chunk::new(Op::Delete, &chars("ab")),
            Chunk::new(Op::Insert, &chars("12")),
            Chunk::new(Op::Equal, &chars("x")),
            Chunk::new(Op::Delete, &chars("cd")),
            Chunk::new(Op::Insert, &chars("34")),
        ];
        cleanup_efficiency(&mut chunks);
        assert_eq!(
            render(&chunks),
            vec![
                (Op::Delete, "abxcd".to_string()),
                (Op::Insert, "12x34".to_string()),
            ]
        );
    }

    #[test]
    fn efficiency_cleanup_keeps_long_equalities() {
        let mut chunks = vec![
            Chunk::new(Op::Delete, &chars("ab")),
            Chunk::new(Op::Insert, &chars("12")),
            Chunk::new(Op::Equal, &chars("wxyz")),
            Chunk::new(Op::Delete, &chars("cd")),
            Chunk::new(Op::Insert, &chars("34")),
        ];
        let before = chunks.clone();
        cleanup_efficiency(&mut chunks);
        assert_eq!(chunks, before);
    }

    #[test]
    fn multibyte_columns_count_chars() {
        let edits = compute_edits("héllo wörld", "héllo wärld");
        let applied = apply_edits("héllo wörld", &edits).unwrap();
        assert_eq!(applied, "héllo wärld");
        assert!(edits.iter().all(|e| e.start.line_number == 1));
        assert_eq!(edits[0].start.column, 8);
    }

    #[test]
    fn large_inputs_fall_back_to_full_replace() {
        let old = "x".repeat(60);
        let new = "y".repeat(60);
        let edits = compute_edits_with(&old, &new, &DiffOptions {
            full_replace_threshold: Some(100),
        });
        assert_eq!(
            edits,
            vec![TextEdit {
                start: Position::new(1, 1),
                end: Position::new(1, 61),
                text: new.clone(),
            }]
        );
        assert_eq!(apply_edits(&old, &edits).unwrap(), new);
    }

    #[test]
    fn roundtrip_examples() {
        roundtrip("", "print('hi')\n");
        roundtrip("print('hi')\n", "");
        roundtrip("for i in range(10):\n    print(i)\n", "for j in range(3):\n    print(j * 2)\n");
        roundtrip("abc", "xyz");
        roundtrip("a\n\n\nb", "\n\na\nb\n");
        roundtrip("def f():\r\n    return 1\r\n", "def f():\n    return 2\n");
    }

    #[test]
    fn apply_rejects_out_of_range_positions() {
        let edit = TextEdit {
            start: Position::new(3, 1),
            end: Position::new(3, 1),
            text: "x".to_string(),
        };
        assert!(matches!(
            apply_edits("one line", &[edit]),
            Err(EditRangeError::OutOfBounds { line: 3, .. })
        ));
    }

    #[test]
    fn line_index_positions() {
        let text = chars("ab\ncd\n");
        let index = LineIndex::new(&text);
        assert_eq!(index.position(0), Position::new(1, 1));
        assert_eq!(index.position(2), Position::new(1, 3));
        assert_eq!(index.position(3), Position::new(2, 1));
        assert_eq!(index.position(6), Position::new(3, 1));
        assert_eq!(index.offset(Position::new(2, 3)).unwrap(), 5);
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line_len(1), 2);
    }

    fn source_text() -> impl Strategy<Value = String> {
        proptest::collection::vec(
            prop_oneof![
                Just("\n".to_string()),
                Just("\r\n".to_string()),
                Just("    ".to_string()),
                "[a-d]{1,3}",
                "[éß→]",
            ],
            0..24,
        )
        .prop_map(|parts| parts.concat())
    }

    proptest! {
        #[test]
        fn edits_reproduce_the_new_text(old in source_text(), new in source_text()) {
            let edits = compute_edits_with(&old, &new, &DiffOptions { full_replace_threshold: None });
            let applied = apply_edits(&old, &edits).unwrap();
            prop_assert_eq!(applied, normalize_newlines(&new));
        }

        #[test]
        fn reconciled_text_needs_no_further_edits(old in source_text(), new in source_text()) {
            let edits = compute_edits(&old, &new);
            let applied = apply_edits(&old, &edits).unwrap();
            prop_assert!(compute_edits(&applied, &new).is_empty());
        }

        #[test]
        fn edits_are_ordered_and_disjoint(old in source_text(), new in source_text()) {
            let edits = compute_edits(&old, &new);
            for pair in edits.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start);
            }
        }
    }
}
