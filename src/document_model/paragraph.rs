use super::text_buffer::{ChangeListener, TextBuffer, TextChange};
use crate::observer::{Listeners, Subscription};
use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::mem;
use std::rc::Rc;

pub const PARAGRAPH_SEPARATOR: char = '\u{2029}';

/// Stable identity of a paragraph. Survives edits that only move the
/// paragraph's boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParagraphId(u64);

/// Half-open character range `start..end` of one paragraph. The
/// delimiter that closes a paragraph sits at `end` and belongs to
/// neither neighbour; the next paragraph starts at `end + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paragraph {
    id: ParagraphId,
    start: usize,
    end: usize,
}

impl Paragraph {
    pub fn id(&self) -> ParagraphId {
        self.id
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// One batched structural notification per refresh pass. `removed` holds
/// indices into the list as it was before the pass, `added` and `updated`
/// index the list after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParagraphChange {
    pub added: Vec<usize>,
    pub removed: Vec<usize>,
    pub updated: Vec<usize>,
}

impl ParagraphChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

pub trait ParagraphListener {
    fn paragraphs_changed(&mut self, change: &ParagraphChange, paragraphs: &[Paragraph]);
}

impl<F: FnMut(&ParagraphChange, &[Paragraph])> ParagraphListener for F {
    fn paragraphs_changed(&mut self, change: &ParagraphChange, paragraphs: &[Paragraph]) {
        self(change, paragraphs)
    }
}

/// Incremental index of paragraph boundaries over a `TextBuffer`.
///
/// As a `ChangeListener` the index only queues change payloads. Once the
/// edit is complete the owner calls `reset_traversal` followed by
/// `refresh`, which shifts stored ranges, rescans the paragraphs touched
/// by the queued edits and emits a single `ParagraphChange`.
pub struct ParagraphIndex {
    paragraphs: Vec<Paragraph>,
    pending: Vec<TextChange>,
    traversal_reset: bool,
    hint: Cell<usize>,
    next_id: u64,
    unicode_separators: bool,
    listeners: Listeners<dyn ParagraphListener>,
}

impl ParagraphIndex {
    pub fn new(buffer: &TextBuffer, unicode_separators: bool) -> Self {
        let mut index = Self {
            paragraphs: Vec::new(),
            pending: Vec::new(),
            traversal_reset: true,
            hint: Cell::new(0),
            next_id: 0,
            unicode_separators,
            listeners: Listeners::new(),
        };
        index.paragraphs = index.scan(&buffer.text(), 0);
        index
    }

    pub fn is_delimiter(&self, c: char) -> bool {
        c == '\n' || (self.unicode_separators && c == PARAGRAPH_SEPARATOR)
    }

    fn fresh_id(&mut self) -> ParagraphId {
        let id = ParagraphId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Split `text`, which starts at offset `base`, into paragraphs with
    /// fresh identities.
    fn scan(&mut self, text: &str, base: usize) -> Vec<Paragraph> {
        self.scan_ranges(text, base)
            .into_iter()
            .map(|(start, end)| Paragraph {
                id: self.fresh_id(),
                start,
                end,
            })
            .collect()
    }

    fn scan_ranges(&self, text: &str, base: usize) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut start = base;
        let mut offset = base;
        for c in text.chars() {
            if self.is_delimiter(c) {
                ranges.push((start, offset));
                start = offset + 1;
            }
            offset += 1;
        }
        ranges.push((start, offset));
        ranges
    }

    pub fn subscribe(&mut self, listener: Rc<RefCell<dyn ParagraphListener>>) -> Subscription {
        self.listeners.add(listener)
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.listeners.remove(subscription)
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn len(&self) -> usize {
        self.paragraphs.len()
    }

    /// Always false: even an empty document has one paragraph.
    pub fn is_empty(&self) -> bool {
        self.paragraphs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Paragraph> {
        self.paragraphs.get(index)
    }

    pub fn index_of(&self, id: ParagraphId) -> Option<usize> {
        self.paragraphs.iter().position(|paragraph| paragraph.id == id)
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Index of the paragraph containing `offset`. An offset on a
    /// delimiter belongs to the paragraph it closes; offsets past the end
    /// map to the last paragraph.
    pub fn paragraph_at(&self, offset: usize) -> usize {
        let hint = self.hint.get();
        if let Some(paragraph) = self.paragraphs.get(hint) {
            let after_previous = hint == 0 || self.paragraphs[hint - 1].end < offset;
            if after_previous && offset <= paragraph.end {
                return hint;
            }
        }
        let index = self
            .paragraphs
            .partition_point(|paragraph| paragraph.end < offset)
            .min(self.paragraphs.len() - 1);
        self.hint.set(index);
        index
    }

    /// Discard all identities and rescan the whole buffer.
    pub fn rebuild(&mut self, buffer: &TextBuffer) -> ParagraphChange {
        let removed = (0..self.paragraphs.len()).collect();
        self.pending.clear();
        self.paragraphs = self.scan(&buffer.text(), 0);
        self.reset_traversal();
        let change = ParagraphChange {
            added: (0..self.paragraphs.len()).collect(),
            removed,
            updated: Vec::new(),
        };
        self.emit(&change);
        change
    }

    /// Signal that the edit which produced the queued changes is complete
    /// and the buffer may be read again.
    pub fn reset_traversal(&mut self) {
        self.traversal_reset = true;
        self.hint.set(0);
    }

    /// Bring the index up to date with `buffer`. Returns `None` when
    /// nothing was queued or when the traversal state has not been reset
    /// since the last mutation.
    pub fn refresh(&mut self, buffer: &TextBuffer) -> Option<ParagraphChange> {
        if self.pending.is_empty() {
            return None;
        }
        if !self.traversal_reset {
            warn!(
                "paragraph refresh skipped: {} pending change(s) without a traversal reset",
                self.pending.len()
            );
            return None;
        }

        let before = self.paragraphs.clone();
        let (low, high) = self.shift_through_pending();
        let text_len = buffer.len();

        let first = self.paragraphs.partition_point(|paragraph| paragraph.end < low);
        let last = self.paragraphs.partition_point(|paragraph| paragraph.start <= high) - 1;
        let window_start = self.paragraphs[first].start;
        let window_end = match self.paragraphs.get(last + 1) {
            Some(next) => next.start - 1,
            None => text_len,
        };

        let ranges = self.scan_ranges(&buffer.text_between(window_start, window_end), window_start);
        let old = self.paragraphs[first..=last].to_vec();
        let origins = Self::match_identities(&old, &ranges);

        let fresh: Vec<Paragraph> = ranges
            .iter()
            .zip(&origins)
            .map(|(&(start, end), origin)| Paragraph {
                id: match origin {
                    Some(k) => old[*k].id,
                    None => self.fresh_id(),
                },
                start,
                end,
            })
            .collect();
        let fresh_len = fresh.len();
        self.paragraphs.splice(first..=last, fresh);

        let mut change = ParagraphChange::default();
        for (k, _) in old.iter().enumerate() {
            if !origins.contains(&Some(k)) {
                change.removed.push(first + k);
            }
        }
        for index in first..self.paragraphs.len() {
            let old_index = if index < first + fresh_len {
                match origins[index - first] {
                    Some(k) => first + k,
                    None => {
                        change.added.push(index);
                        continue;
                    }
                }
            } else {
                index + old.len() - fresh_len
            };
            let previous = &before[old_index];
            let current = &self.paragraphs[index];
            if (previous.start, previous.end) != (current.start, current.end) {
                change.updated.push(index);
            }
        }

        self.check_partition(text_len);
        debug!(
            "paragraph refresh: window {window_start}..{window_end}, {} paragraphs, {change:?}",
            self.paragraphs.len()
        );
        self.hint.set(first);
        if !change.is_empty() {
            self.emit(&change);
        }
        Some(change)
    }

    /// Move stored ranges through every queued change using only the
    /// payload, returning the dirty window in final coordinates.
    fn shift_through_pending(&mut self) -> (usize, usize) {
        let mut dirty: Option<(usize, usize)> = None;
        for change in mem::take(&mut self.pending) {
            match change {
                TextChange::Inserted {
                    position, length, ..
                } => {
                    let at = self
                        .paragraphs
                        .partition_point(|paragraph| paragraph.end < position)
                        .min(self.paragraphs.len() - 1);
                    self.paragraphs[at].end += length;
                    for paragraph in &mut self.paragraphs[at + 1..] {
                        paragraph.start += length;
                        paragraph.end += length;
                    }
                    let shift = |x: usize| if x >= position { x + length } else { x };
                    dirty = Some(match dirty {
                        None => (position, position + length),
                        Some((low, high)) => {
                            (shift(low).min(position), shift(high).max(position + length))
                        }
                    });
                }
                TextChange::Deleted {
                    position, length, ..
                } => {
                    let end = position + length;
                    let map = |x: usize| {
                        if x <= position {
                            x
                        } else if x <= end {
                            position
                        } else {
                            x - length
                        }
                    };
                    let from = self
                        .paragraphs
                        .partition_point(|paragraph| paragraph.end <= position);
                    for paragraph in &mut self.paragraphs[from..] {
                        paragraph.start = map(paragraph.start);
                        paragraph.end = map(paragraph.end);
                    }
                    dirty = Some(match dirty {
                        None => (position, position),
                        Some((low, high)) => (map(low).min(position), map(high).max(position)),
                    });
                }
            }
        }
        dirty.unwrap_or((0, 0))
    }

    /// For each new range, the index in `old` whose identity it keeps.
    /// Exact range matches win; otherwise a paragraph keeps its identity
    /// when it still starts at the same offset. Deletions collapse removed
    /// paragraphs onto the survivor's start, so the last candidate wins.
    fn match_identities(old: &[Paragraph], ranges: &[(usize, usize)]) -> Vec<Option<usize>> {
        let mut used = vec![false; old.len()];
        let mut origins = vec![None; ranges.len()];

        for (slot, &(start, end)) in origins.iter_mut().zip(ranges) {
            if let Some(k) = (0..old.len())
                .find(|&k| !used[k] && old[k].start == start && old[k].end == end)
            {
                used[k] = true;
                *slot = Some(k);
            }
        }
        for (slot, &(start, _)) in origins.iter_mut().zip(ranges) {
            if slot.is_some() {
                continue;
            }
            if let Some(k) = (0..old.len())
                .rev()
                .find(|&k| !used[k] && old[k].start == start)
            {
                used[k] = true;
                *slot = Some(k);
            }
        }
        origins
    }

    fn emit(&self, change: &ParagraphChange) {
        let paragraphs = &self.paragraphs;
        self.listeners
            .notify(|listener| listener.paragraphs_changed(change, paragraphs));
    }

    fn check_partition(&self, text_len: usize) {
        assert!(!self.paragraphs.is_empty(), "paragraph index lost every paragraph");
        assert_eq!(self.paragraphs[0].start, 0, "first paragraph must start at 0");
        assert_eq!(
            self.paragraphs[self.paragraphs.len() - 1].end,
            text_len,
            "last paragraph must end at the text length"
        );
        debug_assert!(
            self.paragraphs
                .windows(2)
                .all(|pair| pair[0].start <= pair[0].end && pair[1].start == pair[0].end + 1),
            "paragraphs do not partition the text: {:?}",
            self.paragraphs
        );
    }
}

impl ChangeListener for ParagraphIndex {
    fn text_changed(&mut self, change: &TextChange) {
        self.pending.push(change.clone());
        self.traversal_reset = false;
    }
}

impl std::fmt::Debug for ParagraphIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParagraphIndex")
            .field("paragraphs", &self.paragraphs)
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Buffer with a subscribed index, refreshed the way the editor does it.
    struct Fixture {
        buffer: TextBuffer,
        index: Rc<RefCell<ParagraphIndex>>,
    }

    impl Fixture {
        fn new(text: &str) -> Self {
            let mut buffer = TextBuffer::from_string(text.to_string());
            let index = Rc::new(RefCell::new(ParagraphIndex::new(&buffer, false)));
            let listener: Rc<RefCell<dyn ChangeListener>> = index.clone();
            let _ = buffer.subscribe(listener);
            Self { buffer, index }
        }

        fn sync(&mut self) -> Option<ParagraphChange> {
            let mut index = self.index.borrow_mut();
            index.reset_traversal();
            index.refresh(&self.buffer)
        }

        fn ranges(&self) -> Vec<(usize, usize)> {
            self.index
                .borrow()
                .paragraphs()
                .iter()
                .map(|paragraph| (paragraph.start(), paragraph.end()))
                .collect()
        }

        fn ids(&self) -> Vec<ParagraphId> {
            self.index.borrow().paragraphs().iter().map(Paragraph::id).collect()
        }

        fn assert_consistent(&self) {
            let text = self.buffer.text();
            let expected: Vec<(usize, usize)> = {
                let mut ranges = Vec::new();
                let mut start = 0;
                for (offset, c) in text.chars().enumerate() {
                    if c == '\n' {
                        ranges.push((start, offset));
                        start = offset + 1;
                    }
                }
                ranges.push((start, text.chars().count()));
                ranges
            };
            assert_eq!(self.ranges(), expected, "text {text:?}");
            assert_eq!(
                self.index.borrow().len(),
                text.matches('\n').count() + 1
            );
        }
    }

    #[test]
    fn test_empty_document_has_one_paragraph() {
        let fixture = Fixture::new("");
        assert_eq!(fixture.ranges(), vec![(0, 0)]);
    }

    #[test]
    fn test_append_creates_paragraphs() {
        let mut fixture = Fixture::new("");
        fixture.buffer.append("Hello\nWorld\nLine 3");
        fixture.sync();
        assert_eq!(fixture.ranges(), vec![(0, 5), (6, 11), (12, 18)]);
        let starts: Vec<usize> = fixture.ranges().iter().skip(1).map(|r| r.0).collect();
        assert_eq!(starts, vec![6, 12]);
    }

    #[test]
    fn test_trailing_delimiter_leaves_empty_paragraph() {
        let fixture = Fixture::new("one\n");
        assert_eq!(fixture.ranges(), vec![(0, 3), (4, 4)]);
    }

    #[test]
    fn test_edit_inside_paragraph_keeps_identities() {
        let mut fixture = Fixture::new("alpha\nbeta\ngamma");
        let ids = fixture.ids();

        fixture.buffer.insert(7, "xyz").unwrap();
        let change = fixture.sync().unwrap();

        assert_eq!(fixture.ids(), ids);
        assert_eq!(fixture.ranges(), vec![(0, 5), (6, 13), (14, 19)]);
        assert!(change.added.is_empty());
        assert!(change.removed.is_empty());
        assert_eq!(change.updated, vec![1, 2]);
    }

    #[test]
    fn test_split_on_new_delimiter() {
        let mut fixture = Fixture::new("alpha\nbetagamma\ndelta");
        let ids = fixture.ids();

        fixture.buffer.insert(10, "\n").unwrap();
        let change = fixture.sync().unwrap();

        fixture.assert_consistent();
        let after = fixture.ids();
        assert_eq!(after.len(), 4);
        assert_eq!(after[0], ids[0]);
        assert_eq!(after[1], ids[1]);
        assert_eq!(after[3], ids[2]);
        assert!(!ids.contains(&after[2]));
        assert_eq!(change.added, vec![2]);
        assert_eq!(change.updated, vec![1, 3]);
        assert!(change.removed.is_empty());
    }

    #[test]
    fn test_merge_on_removed_delimiter() {
        let mut fixture = Fixture::new("Hello\nWorld\nLine 3");
        let ids = fixture.ids();

        fixture.buffer.delete(5, 1).unwrap();
        let change = fixture.sync().unwrap();

        assert_eq!(fixture.ranges(), vec![(0, 10), (11, 17)]);
        assert_eq!(fixture.ids(), vec![ids[0], ids[2]]);
        assert_eq!(change.removed, vec![1]);
        assert_eq!(change.updated, vec![0, 1]);
        assert!(change.added.is_empty());
    }

    #[test]
    fn test_delete_spanning_paragraphs() {
        let mut fixture = Fixture::new("a\nbb\nccc\ndddd");
        let ids = fixture.ids();

        fixture.buffer.delete(1, 6).unwrap();
        fixture.sync().unwrap();

        assert_eq!(fixture.buffer.text(), "ac\ndddd");
        fixture.assert_consistent();
        assert_eq!(fixture.ids(), vec![ids[0], ids[3]]);
    }

    #[test]
    fn test_delete_everything() {
        let mut fixture = Fixture::new("x\ny\nz");
        fixture.buffer.delete(0, 5).unwrap();
        fixture.sync().unwrap();
        assert_eq!(fixture.ranges(), vec![(0, 0)]);
    }

    #[test]
    fn test_refresh_requires_reset() {
        let mut fixture = Fixture::new("a\nb");
        fixture.buffer.insert(1, "\n").unwrap();

        let skipped = fixture.index.borrow_mut().refresh(&fixture.buffer);
        assert!(skipped.is_none());
        assert!(fixture.index.borrow().has_pending_changes());

        fixture.sync().unwrap();
        fixture.assert_consistent();
    }

    #[test]
    fn test_batched_changes_in_one_pass() {
        let mut fixture = Fixture::new("one\ntwo\nthree");
        let events = Rc::new(RefCell::new(0));
        let counter = events.clone();
        let listener: Rc<RefCell<dyn ParagraphListener>> = Rc::new(RefCell::new(
            move |_: &ParagraphChange, _: &[Paragraph]| *counter.borrow_mut() += 1,
        ));
        let _ = fixture.index.borrow_mut().subscribe(listener);

        fixture.buffer.insert(0, "zero\n").unwrap();
        fixture.buffer.delete(9, 4).unwrap();
        fixture.buffer.append("\nfour");
        fixture.sync().unwrap();

        assert_eq!(*events.borrow(), 1);
        fixture.assert_consistent();
    }

    #[test]
    fn test_paragraph_at() {
        let fixture = Fixture::new("ab\ncd\n\nef");
        let index = fixture.index.borrow();
        assert_eq!(index.paragraph_at(0), 0);
        assert_eq!(index.paragraph_at(2), 0);
        assert_eq!(index.paragraph_at(3), 1);
        assert_eq!(index.paragraph_at(6), 2);
        assert_eq!(index.paragraph_at(7), 3);
        assert_eq!(index.paragraph_at(1), 0);
        assert_eq!(index.paragraph_at(42), 3);
    }

    #[test]
    fn test_unicode_separator_option() {
        let buffer = TextBuffer::from_string("a\u{2029}b\nc".to_string());
        assert_eq!(ParagraphIndex::new(&buffer, false).len(), 2);
        assert_eq!(ParagraphIndex::new(&buffer, true).len(), 3);
    }

    #[test]
    fn test_random_edits_keep_partition() {
        let mut fixture = Fixture::new("seed\ntext\n");
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut next = |bound: usize| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            (seed % bound as u64) as usize
        };
        let pieces = ["\n", "ab", "c\nd", "\n\n", "xyz"];

        for round in 0..300 {
            let len = fixture.buffer.len();
            if len == 0 || next(2) == 0 {
                let text = pieces[next(pieces.len())];
                fixture.buffer.insert(next(len + 1), text).unwrap();
            } else {
                fixture.buffer.delete(next(len), next(5) + 1).unwrap();
            }
            // Refresh every few edits so some passes see several changes
            if round % 3 == 0 {
                fixture.sync();
                fixture.assert_consistent();
            }
        }
        fixture.sync();
        fixture.assert_consistent();
    }
}
