//! Length-bounded splitting over character positions with preferred cut points.

use std::ops::Range;

/// Byte offset of every char in a text, plus the text length as a sentinel.
pub(crate) struct CharMap {
    offsets: Vec<usize>,
}

impl CharMap {
    pub(crate) fn new(text: &str) -> Self {
        let mut offsets: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        offsets.push(text.len());
        Self { offsets }
    }

    pub(crate) fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub(crate) fn byte(&self, pos: usize) -> usize {
        self.offsets[pos]
    }

    /// Char index of the first char starting at or after `byte`.
    pub(crate) fn char_at_byte(&self, byte: usize) -> usize {
        self.offsets.partition_point(|&o| o < byte)
    }
}

/// Allowed cut positions grouped by preference, most preferred level first.
#[derive(Debug, Default, Clone)]
pub(crate) struct Boundaries {
    levels: Vec<Vec<usize>>,
}

impl Boundaries {
    pub(crate) fn push_level(&mut self, mut positions: Vec<usize>) {
        positions.sort_unstable();
        positions.dedup();
        self.levels.push(positions);
    }

    /// Furthest cut in `(after, limit]` from the first level that has one.
    fn best_cut(&self, after: usize, limit: usize) -> Option<usize> {
        self.levels.iter().find_map(|level| {
            let idx = level.partition_point(|&p| p <= limit);
            (idx > 0 && level[idx - 1] > after).then(|| level[idx - 1])
        })
    }
}

/// Cover `0..len` with windows of at most `max` positions.
///
/// Each window after the first starts exactly `overlap` positions before the
/// previous window's end. A window ends at the best boundary that keeps the
/// next start moving forward, or at the hard bound when none qualifies.
pub(crate) fn split_positions(
    len: usize,
    max: usize,
    overlap: usize,
    boundaries: &Boundaries,
) -> Vec<Range<usize>> {
    let max = max.max(1);
    let overlap = overlap.min(max - 1);
    if len == 0 {
        return Vec::new();
    }
    if len <= max {
        return vec![0..len];
    }

    let mut out = Vec::new();
    let mut start = 0;
    loop {
        if len - start <= max {
            out.push(start..len);
            break;
        }
        let limit = start + max;
        let end = boundaries
            .best_cut(start + overlap, limit)
            .unwrap_or(limit);
        out.push(start..end);
        start = end - overlap;
    }
    out
}

/// Paragraph breaks, line ends and other whitespace, as cut positions after the separator.
pub(crate) fn text_levels(text: &str) -> [Vec<usize>; 3] {
    let mut paragraphs = Vec::new();
    let mut lines = Vec::new();
    let mut words = Vec::new();
    let mut prev = '\0';
    for (i, c) in text.chars().enumerate() {
        if c == '\n' {
            lines.push(i + 1);
            if prev == '\n' {
                paragraphs.push(i + 1);
            }
        } else if c.is_whitespace() {
            words.push(i + 1);
        }
        if c != '\r' {
            prev = c;
        }
    }
    [paragraphs, lines, words]
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn no_boundaries() -> Boundaries {
        Boundaries::default()
    }

    #[test]
    fn short_input_single_window() {
        assert_eq!(split_positions(10, 100, 10, &no_boundaries()), vec![0..10]);
        assert_eq!(split_positions(100, 100, 10, &no_boundaries()), vec![0..100]);
    }

    #[test]
    fn empty_input_no_windows() {
        assert!(split_positions(0, 100, 10, &no_boundaries()).is_empty());
    }

    #[test]
    fn hard_cuts_without_boundaries() {
        let windows = split_positions(250, 100, 20, &no_boundaries());
        assert_eq!(windows, vec![0..100, 80..180, 160..250]);
    }

    #[test]
    fn prefers_higher_level_even_if_shorter() {
        let mut b = Boundaries::default();
        b.push_level(vec![60]);
        b.push_level(vec![95]);
        let windows = split_positions(150, 100, 10, &b);
        assert_eq!(windows[0], 0..60);
    }

    #[test]
    fn falls_through_to_lower_level() {
        let mut b = Boundaries::default();
        b.push_level(vec![130]);
        b.push_level(vec![40, 90]);
        let windows = split_positions(150, 100, 10, &b);
        assert_eq!(windows[0], 0..90);
    }

    #[test]
    fn boundary_inside_overlap_is_ignored() {
        let mut b = Boundaries::default();
        b.push_level(vec![5]);
        let windows = split_positions(150, 100, 10, &b);
        assert_eq!(windows[0], 0..100);
    }

    #[test]
    fn overlap_clamped_below_max() {
        let windows = split_positions(30, 10, 50, &no_boundaries());
        assert!(windows.iter().all(|w| w.len() <= 10));
        assert_eq!(windows.last().unwrap().end, 30);
    }

    #[test]
    fn text_levels_positions() {
        let [paragraphs, lines, words] = text_levels("ab cd\n\nef\n");
        assert_eq!(paragraphs, vec![7]);
        assert_eq!(lines, vec![6, 7, 10]);
        assert_eq!(words, vec![3]);
    }

    #[test]
    fn text_levels_crlf_paragraph() {
        let [paragraphs, _, _] = text_levels("a\r\n\r\nb");
        assert_eq!(paragraphs, vec![5]);
    }

    #[test]
    fn char_map_multibyte() {
        let map = CharMap::new("aé😀b");
        assert_eq!(map.len(), 4);
        assert_eq!(map.byte(2), 3);
        assert_eq!(map.byte(4), 8);
        assert_eq!(map.char_at_byte(3), 2);
        assert_eq!(map.char_at_byte(8), 4);
    }

    proptest! {
        #[test]
        fn windows_bounded_overlapping_and_covering(
            len in 0usize..3000,
            max in 1usize..400,
            overlap in 0usize..200,
            cuts in proptest::collection::vec(0usize..3000, 0..60),
            split_at in 0usize..60,
        ) {
            let mut b = Boundaries::default();
            let (high, low) = cuts.split_at(split_at.min(cuts.len()));
            b.push_level(high.to_vec());
            b.push_level(low.to_vec());

            let windows = split_positions(len, max, overlap, &b);
            let effective_overlap = overlap.min(max - 1);

            if len == 0 {
                prop_assert!(windows.is_empty());
            } else {
                prop_assert_eq!(windows[0].start, 0);
                prop_assert_eq!(windows.last().unwrap().end, len);
            }
            for w in &windows {
                prop_assert!(w.end > w.start);
                prop_assert!(w.len() <= max);
            }
            for pair in windows.windows(2) {
                prop_assert_eq!(pair[1].start, pair[0].end - effective_overlap);
                prop_assert!(pair[1].start > pair[0].start);
            }
        }
    }
}
