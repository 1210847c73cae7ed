use std::ops::Range;

use common::utils::tokenizer::ModelTokenizer;
use text_splitter::ChunkSizer;
use tracing::{debug, warn};

/// Sizes text in model tokens.
pub struct TokenCount<'a>(pub &'a dyn ModelTokenizer);

impl ChunkSizer for TokenCount<'_> {
    fn size(&self, chunk: &str) -> usize {
        self.0.count_tokens(chunk)
    }
}

/// Recursive separator splitter with overlapping windows.
///
/// The text is first cut into pieces that tile it: a piece is split at a
/// separator level only if it exceeds the piece limit, and only oversized
/// parts descend to the next, finer separator. Pieces are then packed
/// greedily into windows of at most `max_size`, each window after the first
/// starting `overlap` units before the end of the previous one.
pub struct RecursiveSplitter<'a, S> {
    sizer: S,
    max_size: usize,
    overlap: usize,
    separators: &'a [String],
}

impl<'a, S: ChunkSizer> RecursiveSplitter<'a, S> {
    /// `max_size` must be non-zero. The overlap is clamped below it.
    pub fn new(sizer: S, max_size: usize, overlap: usize, separators: &'a [String]) -> Self {
        let clamped = overlap.min(max_size.saturating_sub(1));
        if clamped != overlap {
            warn!(
                requested = overlap,
                applied = clamped,
                max_size,
                "overlap must stay below the chunk size; clamping"
            );
        }
        Self {
            sizer,
            max_size,
            overlap: clamped,
            separators,
        }
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Largest piece that still leaves room for a full overlap.
    fn piece_limit(&self) -> usize {
        self.max_size.saturating_sub(self.overlap).max(1)
    }

    pub fn size_of(&self, text: &str) -> usize {
        self.sizer.size(text)
    }

    fn size_between(&self, text: &str, span: Range<usize>) -> usize {
        self.sizer.size(text.get(span).unwrap_or_default())
    }

    fn fits(&self, text: &str, span: Range<usize>) -> bool {
        self.size_between(text, span) <= self.max_size
    }

    /// Byte ranges of the windows over `text`, in order.
    pub fn split(&self, text: &str) -> Vec<Range<usize>> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut pieces = Vec::new();
        self.collect_pieces(text, 0, 0, &mut pieces);
        debug!(pieces = pieces.len(), "split text into pieces");
        self.pack(text, &pieces)
    }

    fn collect_pieces(
        &self,
        part: &str,
        offset: usize,
        level: usize,
        pieces: &mut Vec<Range<usize>>,
    ) {
        let end = offset.saturating_add(part.len());
        if self.sizer.size(part) <= self.piece_limit() {
            pieces.push(offset..end);
            return;
        }
        let Some(separator) = self.separators.get(level) else {
            // Nothing finer to split on; kept whole and reported when packed.
            pieces.push(offset..end);
            return;
        };
        let next_level = level.saturating_add(1);
        if separator.is_empty() || !part.contains(separator.as_str()) {
            self.collect_pieces(part, offset, next_level, pieces);
            return;
        }
        let mut part_offset = offset;
        for sub_part in part.split_inclusive(separator.as_str()) {
            self.collect_pieces(sub_part, part_offset, next_level, pieces);
            part_offset = part_offset.saturating_add(sub_part.len());
        }
    }

    fn pack(&self, text: &str, pieces: &[Range<usize>]) -> Vec<Range<usize>> {
        let mut windows: Vec<Range<usize>> = Vec::new();
        let mut start = 0;
        let mut previous_end = 0;
        let mut next = 0;

        while let Some(first) = pieces.get(next) {
            if start < previous_end && !self.fits(text, start..first.end) {
                start = self.shrink_overlap(text, start, previous_end, first.end);
            }

            let mut last = next;
            while let Some(candidate) = pieces.get(last.saturating_add(1)) {
                if !self.fits(text, start..candidate.end) {
                    break;
                }
                last = last.saturating_add(1);
            }
            let end = pieces.get(last).map_or(first.end, |piece| piece.end);

            let size = self.size_between(text, start..end);
            if size > self.max_size {
                warn!(
                    size,
                    max_size = self.max_size,
                    "piece cannot be split any further; emitting it oversized"
                );
            }

            windows.push(start..end);
            next = last.saturating_add(1);
            previous_end = end;
            start = self.overlap_start(text, start, end);
        }
        windows
    }

    /// Earliest start before `end` whose suffix measures no more than the
    /// overlap, moved back one position if that falls short of it. For token
    /// sizes this lands on the boundary of the first overlapping token rather
    /// than inside it. Falls back to the window start for short windows.
    fn overlap_start(&self, text: &str, window_start: usize, end: usize) -> usize {
        if self.overlap == 0 {
            return end;
        }
        let positions = char_boundaries(text, window_start, end);
        let first_within = positions
            .partition_point(|&position| self.size_between(text, position..end) > self.overlap);
        let Some(&candidate) = positions.get(first_within) else {
            return window_start;
        };
        if self.size_between(text, candidate..end) >= self.overlap {
            return candidate;
        }
        first_within
            .checked_sub(1)
            .and_then(|index| positions.get(index))
            .copied()
            .unwrap_or(window_start)
    }

    /// Earliest start in `start..=previous_end` from which the piece ending at
    /// `piece_end` fits. Drops the overlap entirely when nothing fits.
    fn shrink_overlap(
        &self,
        text: &str,
        start: usize,
        previous_end: usize,
        piece_end: usize,
    ) -> usize {
        let positions = char_boundaries(text, start, previous_end);
        let first_fit =
            positions.partition_point(|&position| !self.fits(text, position..piece_end));
        let shrunk = positions.get(first_fit).copied().unwrap_or(previous_end);
        debug!(from = start, to = shrunk, "shrinking overlap to fit the next piece");
        shrunk
    }
}

/// Char boundaries of `text` from `start` through `end`, both included.
fn char_boundaries(text: &str, start: usize, end: usize) -> Vec<usize> {
    text.get(start..end)
        .unwrap_or_default()
        .char_indices()
        .map(|(index, _)| start.saturating_add(index))
        .chain(std::iter::once(end))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use text_splitter::Characters;

    fn separators() -> Vec<String> {
        ["\n\n", "\n", ".", " "].iter().map(ToString::to_string).collect()
    }

    fn windows<'t>(text: &'t str, max_size: usize, overlap: usize) -> Vec<&'t str> {
        let separators = separators();
        RecursiveSplitter::new(Characters, max_size, overlap, &separators)
            .split(text)
            .into_iter()
            .map(|span| &text[span])
            .collect()
    }

    #[test]
    fn empty_text_has_no_windows() {
        assert!(windows("", 10, 2).is_empty());
    }

    #[test]
    fn short_text_is_a_single_window() {
        assert_eq!(windows("Consciencism.", 20, 5), vec!["Consciencism."]);
    }

    #[test]
    fn piece_exactly_at_the_limit_is_not_split() {
        let text = "Africa must unite ok";
        assert_eq!(text.chars().count(), 20);
        assert_eq!(windows(text, 20, 5), vec![text]);
    }

    #[test]
    fn windows_overlap_by_exactly_the_overlap() {
        let text = "Hello world.\n\nThis is a test.\n\nFinal segment here.";

        let chunks = windows(text, 20, 5);

        assert_eq!(
            chunks,
            vec![
                "Hello world.\n\n",
                "ld.\n\nThis is a test.",
                "test.\n\nFinal ",
                "inal segment here.",
            ]
        );
        for pair in chunks.windows(2) {
            let previous: Vec<char> = pair[0].chars().collect();
            let tail: String = previous[previous.len() - 5..].iter().collect();
            assert!(pair[1].starts_with(&tail));
        }
    }

    #[test]
    fn unsplittable_pieces_are_emitted_whole() {
        let text = "tiny Pan-Africanism-without-any-spaces tail";

        let chunks = windows(text, 10, 0);

        assert!(chunks.contains(&"Pan-Africanism-without-any-spaces "));
        assert_eq!(chunks.concat(), text);
    }

    /// Counts whitespace separated words, like a word-level tokenizer.
    struct Words;

    impl ChunkSizer for Words {
        fn size(&self, chunk: &str) -> usize {
            chunk.split_whitespace().count()
        }
    }

    #[test]
    fn word_overlap_starts_on_a_word_boundary() {
        let text = "one two three four five six seven eight nine ten eleven twelve";
        let separators = separators();

        let chunks: Vec<&str> = RecursiveSplitter::new(Words, 6, 3, &separators)
            .split(text)
            .into_iter()
            .map(|span| &text[span])
            .collect();

        assert_eq!(
            chunks,
            vec![
                "one two three four five six ",
                " four five six seven eight nine ",
                " seven eight nine ten eleven twelve",
            ]
        );
    }

    #[test]
    fn overlap_is_clamped_below_the_chunk_size() {
        let separators = separators();
        let splitter = RecursiveSplitter::new(Characters, 4, 9, &separators);
        assert_eq!(splitter.overlap(), 3);
    }

    #[test]
    fn zero_overlap_windows_tile_the_text() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = windows(text, 12, 0);
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 12));
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "Ünité à tous. Été ou hiver ça va.";
        for chunk in windows(text, 8, 3) {
            assert!(chunk.chars().count() <= 8);
        }
    }
}
