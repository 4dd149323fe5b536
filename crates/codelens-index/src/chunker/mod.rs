//! Boundary-respecting text splitting into bounded, provenance-tagged fragments.

mod markdown;
mod splitter;
mod syntax;

use std::ops::Range;

use serde::{Deserialize, Serialize};

pub use crate::languages::FragmentKind;
use crate::languages::{LanguageStrategyMap, Strategy};
use crate::scanner::ScannedFile;

use self::splitter::{Boundaries, CharMap, split_positions, text_levels};

/// Chunker configuration. Lengths are counted in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Upper bound on fragment length (default: 1000).
    pub max_chars: usize,
    /// Chars shared by consecutive fragments of one unit (default: 100).
    pub overlap_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            overlap_chars: 100,
        }
    }
}

/// Where a fragment's text came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMetadata {
    pub source_path: String,
    pub filename: String,
    pub extension: String,
    /// Enclosing markdown headings, outermost first. `None` outside markdown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_path: Option<Vec<String>>,
    pub kind: FragmentKind,
    /// Byte offsets of `content` in the source file.
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub content: String,
    pub metadata: FragmentMetadata,
}

impl Fragment {
    /// Identifier stable across runs for the same file and offsets.
    #[must_use]
    pub fn id(&self) -> String {
        fragment_id(
            &self.metadata.source_path,
            self.metadata.start,
            self.metadata.end,
        )
    }
}

/// UUID-shaped blake3 digest of the normalized path and byte range.
#[must_use]
pub fn fragment_id(source_path: &str, start: usize, end: usize) -> String {
    let key = format!("{}:{start}-{end}", normalize_source_path(source_path));
    let digest = blake3::hash(key.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest.as_bytes()[..16]);
    uuid::Uuid::from_bytes(bytes).to_string()
}

fn normalize_source_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    unified.trim_start_matches("./").to_owned()
}

/// Borrowed provenance for one file.
#[derive(Debug, Clone, Copy)]
pub struct SourceRef<'a> {
    pub source_path: &'a str,
    pub filename: &'a str,
    pub extension: &'a str,
}

impl<'a> From<&'a ScannedFile> for SourceRef<'a> {
    fn from(file: &'a ScannedFile) -> Self {
        Self {
            source_path: &file.relative_path,
            filename: &file.filename,
            extension: &file.extension,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
    strategies: LanguageStrategyMap,
}

impl Chunker {
    #[must_use]
    pub fn new(config: ChunkerConfig, strategies: LanguageStrategyMap) -> Self {
        Self { config, strategies }
    }

    #[must_use]
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    #[must_use]
    pub fn chunk_file(&self, file: &ScannedFile) -> Vec<Fragment> {
        self.chunk(&file.text, SourceRef::from(file))
    }

    /// Split `raw_text` with the strategy registered for `source.extension`.
    ///
    /// Unmapped extensions use the generic strategy. Output depends only on
    /// the inputs. Whitespace-only fragments are dropped.
    #[must_use]
    pub fn chunk(&self, raw_text: &str, source: SourceRef<'_>) -> Vec<Fragment> {
        let strategy = self
            .strategies
            .strategy_for(source.extension)
            .unwrap_or(Strategy::Generic);
        let kind = FragmentKind::classify(strategy, source.extension);

        let pieces: Vec<(Range<usize>, Option<Vec<String>>)> = match strategy {
            Strategy::Markdown => markdown::sections(raw_text)
                .into_iter()
                .flat_map(|section| {
                    let base = section.range.start;
                    self.split_unit(&raw_text[section.range.clone()], Vec::new())
                        .into_iter()
                        .map(move |r| (base + r.start..base + r.end, Some(section.path.clone())))
                        .collect::<Vec<_>>()
                })
                .collect(),
            Strategy::Syntax(lang) => {
                let structural = match syntax::syntax_levels(raw_text, lang) {
                    Some(levels) => levels.into(),
                    None => {
                        tracing::debug!(file = source.source_path, lang = %lang, "no syntax tree, splitting generically");
                        Vec::new()
                    }
                };
                self.split_unit(raw_text, structural)
                    .into_iter()
                    .map(|r| (r, None))
                    .collect()
            }
            Strategy::Generic => self
                .split_unit(raw_text, Vec::new())
                .into_iter()
                .map(|r| (r, None))
                .collect(),
        };

        pieces
            .into_iter()
            .filter(|(range, _)| !raw_text[range.clone()].trim().is_empty())
            .map(|(range, section_path)| Fragment {
                content: raw_text[range.clone()].to_owned(),
                metadata: FragmentMetadata {
                    source_path: source.source_path.to_owned(),
                    filename: source.filename.to_owned(),
                    extension: source.extension.to_owned(),
                    section_path,
                    kind,
                    start: range.start,
                    end: range.end,
                },
            })
            .collect()
    }

    /// Byte ranges covering `unit`, cutting at `structural` byte positions first,
    /// then paragraph, line and word boundaries.
    fn split_unit(&self, unit: &str, structural: Vec<Vec<usize>>) -> Vec<Range<usize>> {
        let map = CharMap::new(unit);
        let mut boundaries = Boundaries::default();
        for level in structural {
            boundaries.push_level(level.into_iter().map(|b| map.char_at_byte(b)).collect());
        }
        for level in text_levels(unit) {
            boundaries.push_level(level);
        }

        split_positions(
            map.len(),
            self.config.max_chars,
            self.config.overlap_chars,
            &boundaries,
        )
        .into_iter()
        .map(|r| map.byte(r.start)..map.byte(r.end))
        .collect()
    }
}
