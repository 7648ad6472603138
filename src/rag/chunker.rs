//! Document chunking.
//!
//! Chunk boundaries depend only on the input text and the policy, so the
//! same document always produces the same chunks.

use crate::types::{AppError, Result};
use crate::utils::toml_config::{ChunkStrategy, ChunkingConfig};
use text_splitter::{ChunkConfig, TextSplitter};

/// Rough token count used for chunk sizing and prompt budgets
/// (about three tokens per four English words).
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words * 4).div_ceil(3)
}

/// How a document is split into chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingPolicy {
    pub strategy: ChunkStrategy,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkingPolicy {
    pub fn new(strategy: ChunkStrategy, chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            strategy,
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Validation(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Validation(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl From<&ChunkingConfig> for ChunkingPolicy {
    fn from(config: &ChunkingConfig) -> Self {
        Self::new(config.strategy, config.chunk_size, config.chunk_overlap)
    }
}

impl Default for ChunkingPolicy {
    fn default() -> Self {
        Self::from(&ChunkingConfig::default())
    }
}

/// One chunk of a document, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub header: Option<String>,
}

impl TextChunk {
    fn plain(text: String) -> Self {
        Self { text, header: None }
    }
}

pub struct TextChunker {
    policy: ChunkingPolicy,
}

impl TextChunker {
    pub fn new(policy: ChunkingPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &ChunkingPolicy {
        &self.policy
    }

    pub fn chunk(&self, text: &str) -> Result<Vec<TextChunk>> {
        let chunks = match self.policy.strategy {
            ChunkStrategy::Words => {
                word_windows(text, self.policy.chunk_size, self.policy.chunk_overlap)
                    .into_iter()
                    .map(TextChunk::plain)
                    .collect()
            }
            ChunkStrategy::Characters => self.characters(text)?,
            ChunkStrategy::Sections => self.sections(text),
        };
        Ok(chunks)
    }

    fn characters(&self, text: &str) -> Result<Vec<TextChunk>> {
        let config = ChunkConfig::new(self.policy.chunk_size)
            .with_overlap(self.policy.chunk_overlap)
            .map_err(|e| AppError::Validation(format!("Invalid chunk configuration: {}", e)))?;
        let splitter = TextSplitter::new(config);

        Ok(splitter
            .chunks(text)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| TextChunk::plain(c.to_string()))
            .collect())
    }

    /// Split on headers; keep short sections whole, and pack paragraphs of
    /// longer ones until each piece passes half the chunk size.
    fn sections(&self, text: &str) -> Vec<TextChunk> {
        let size = self.policy.chunk_size;
        let overlap = self.policy.chunk_overlap;
        let mut out = Vec::new();

        for section in split_sections(text) {
            let body = section.paragraphs.join("\n");
            if body.trim().is_empty() {
                continue;
            }

            if estimate_tokens(&body) < size {
                out.push(TextChunk {
                    text: body,
                    header: section.header.clone(),
                });
                continue;
            }

            // (text, already overlaps the piece before it)
            let mut pieces: Vec<(String, bool)> = Vec::new();
            let mut current = String::new();
            for paragraph in &section.paragraphs {
                // A single paragraph longer than a chunk is windowed on its own
                if estimate_tokens(paragraph) >= size {
                    if !current.is_empty() {
                        pieces.push((std::mem::take(&mut current), false));
                    }
                    let window = (size * 3 / 4).max(1);
                    let windows =
                        word_windows(paragraph, window, overlap.min(window.saturating_sub(1)));
                    pieces.extend(windows.into_iter().enumerate().map(|(i, w)| (w, i > 0)));
                    continue;
                }

                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(paragraph);
                if estimate_tokens(&current) > size / 2 {
                    pieces.push((std::mem::take(&mut current), false));
                }
            }
            if !current.is_empty() {
                pieces.push((current, false));
            }

            let mut previous: Option<&str> = None;
            for (piece, overlapping) in &pieces {
                let text = match previous {
                    Some(prev) if overlap > 0 && !overlapping => {
                        let words: Vec<&str> = prev.split_whitespace().collect();
                        let tail = words[words.len().saturating_sub(overlap)..].join(" ");
                        format!("{}\n{}", tail, piece)
                    }
                    _ => piece.clone(),
                };
                out.push(TextChunk {
                    text,
                    header: section.header.clone(),
                });
                previous = Some(piece);
            }
        }

        out
    }
}

/// Word windows of `size` words, each starting `size - overlap` words after
/// the previous one. The last window ends exactly at the end of the text.
fn word_windows(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();

    let mut start = 0;
    while start < words.len() {
        let end = (start + size).min(words.len());
        chunks.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += step;
    }

    chunks
}

struct Section<'a> {
    header: Option<String>,
    paragraphs: Vec<&'a str>,
}

fn split_sections(text: &str) -> Vec<Section<'_>> {
    let mut sections = vec![Section {
        header: None,
        paragraphs: Vec::new(),
    }];

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match header_text(trimmed) {
            Some(header) => sections.push(Section {
                header: Some(header),
                paragraphs: Vec::new(),
            }),
            None => {
                if let Some(current) = sections.last_mut() {
                    current.paragraphs.push(trimmed);
                }
            }
        }
    }

    sections
}

/// Recognize markdown headings and numbered treaty headings
/// ("Article 12", "PART III", "Annex I").
fn header_text(line: &str) -> Option<String> {
    if let Some(rest) = line.strip_prefix('#') {
        let heading = rest.trim_start_matches('#').trim();
        return (!heading.is_empty()).then(|| heading.to_string());
    }

    if line.len() > 100 {
        return None;
    }
    let mut words = line.split_whitespace();
    let keyword = words.next()?.to_lowercase();
    let number = words.next()?;
    let numbered = number
        .trim_end_matches(['.', ':'])
        .chars()
        .all(|c| c.is_ascii_digit() || "IVXLCivxlc".contains(c));
    let is_heading = matches!(keyword.as_str(), "article" | "part" | "section" | "annex")
        && numbered
        && !number.is_empty();
    is_heading.then(|| line.to_string())
}
