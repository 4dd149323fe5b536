//! Heading-delimited sections of a markdown document.

use std::ops::Range;

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};

/// Deepest heading level that opens a new section.
const MAX_SECTION_DEPTH: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Section {
    /// Byte range in the document, heading line included.
    pub range: Range<usize>,
    /// Titles of the enclosing headings, outermost first.
    pub path: Vec<String>,
}

struct Heading {
    line_start: usize,
    end: usize,
    depth: u8,
    title: String,
}

/// Split `text` at level 1–3 headings.
///
/// Text before the first heading becomes a section with an empty path.
/// Sections holding nothing besides their heading are dropped.
pub(crate) fn sections(text: &str) -> Vec<Section> {
    let headings = headings(text);

    let mut out = Vec::new();
    let preamble_end = headings.first().map_or(text.len(), |h| h.line_start);
    if !text[..preamble_end].trim().is_empty() {
        out.push(Section {
            range: 0..preamble_end,
            path: Vec::new(),
        });
    }

    let mut stack: Vec<(u8, String)> = Vec::new();
    for (i, heading) in headings.iter().enumerate() {
        while stack.last().is_some_and(|(depth, _)| *depth >= heading.depth) {
            stack.pop();
        }
        stack.push((heading.depth, heading.title.clone()));

        let end = headings.get(i + 1).map_or(text.len(), |next| next.line_start);
        let body_start = heading.end.min(end);
        if text[body_start..end].trim().is_empty() {
            continue;
        }
        out.push(Section {
            range: heading.line_start..end,
            path: stack.iter().map(|(_, title)| title.clone()).collect(),
        });
    }
    out
}

fn headings(text: &str) -> Vec<Heading> {
    let mut found = Vec::new();
    let mut open: Option<Heading> = None;

    for (event, range) in Parser::new(text).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                let depth = heading_depth(level);
                if depth <= MAX_SECTION_DEPTH
                    && let Some(line_start) = block_line_start(text, range.start)
                {
                    open = Some(Heading {
                        line_start,
                        end: range.end,
                        depth,
                        title: String::new(),
                    });
                }
            }
            Event::Text(t) | Event::Code(t) => {
                if let Some(heading) = open.as_mut() {
                    heading.title.push_str(&t);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(mut heading) = open.take() {
                    heading.title = heading.title.trim().to_owned();
                    found.push(heading);
                }
            }
            _ => {}
        }
    }
    found
}

/// Start of the line containing `pos` when only indentation precedes it.
///
/// Headings nested in lists or quotes are not section starts.
fn block_line_start(text: &str, pos: usize) -> Option<usize> {
    let line_start = text[..pos].rfind('\n').map_or(0, |nl| nl + 1);
    text[line_start..pos]
        .chars()
        .all(|c| c == ' ')
        .then_some(line_start)
}

fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(text: &str) -> Vec<Vec<String>> {
        sections(text).into_iter().map(|s| s.path).collect()
    }

    #[test]
    fn nested_heading_paths() {
        let doc = "# Guide\nintro\n## Install\nrun it\n### Linux\napt\n## Usage\ncall it\n";
        assert_eq!(
            paths(doc),
            vec![
                vec!["Guide".to_owned()],
                vec!["Guide".to_owned(), "Install".to_owned()],
                vec!["Guide".to_owned(), "Install".to_owned(), "Linux".to_owned()],
                vec!["Guide".to_owned(), "Usage".to_owned()],
            ]
        );
    }

    #[test]
    fn sections_tile_the_document() {
        let doc = "preface\n# A\nalpha\n## B\nbeta\n";
        let secs = sections(doc);
        assert_eq!(secs[0].range, 0..8);
        assert!(secs[0].path.is_empty());
        assert_eq!(&doc[secs[1].range.clone()], "# A\nalpha\n");
        assert_eq!(&doc[secs[2].range.clone()], "## B\nbeta\n");
    }

    #[test]
    fn level_four_stays_in_content() {
        let doc = "## Api\ntext\n#### Detail\nmore\n";
        let secs = sections(doc);
        assert_eq!(secs.len(), 1);
        assert_eq!(secs[0].range, 0..doc.len());
    }

    #[test]
    fn fenced_code_hash_lines_ignored() {
        let doc = "## Script\n```sh\n# not a heading\necho hi\n```\n";
        assert_eq!(paths(doc), vec![vec!["Script".to_owned()]]);
    }

    #[test]
    fn heading_only_sections_dropped() {
        let doc = "# Title\n## Empty\n## Full\nbody\n";
        assert_eq!(
            paths(doc),
            vec![vec!["Title".to_owned(), "Full".to_owned()]]
        );
    }

    #[test]
    fn setext_headings_recognized() {
        let doc = "Title\n=====\nbody\n";
        assert_eq!(paths(doc), vec![vec!["Title".to_owned()]]);
    }

    #[test]
    fn inline_code_in_title() {
        let doc = "## The `chunk` call\nbody\n";
        assert_eq!(paths(doc), vec![vec!["The chunk call".to_owned()]]);
    }

    #[test]
    fn no_headings_single_section() {
        let doc = "just some notes\nwithout structure\n";
        let secs = sections(doc);
        assert_eq!(secs.len(), 1);
        assert_eq!(secs[0].range, 0..doc.len());
    }
}
