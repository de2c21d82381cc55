use crate::error::IngestError;
use crate::models::Document;
use std::collections::VecDeque;

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Separators tried in order, coarsest first. The empty separator splits
/// into single characters.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Window sizes are counted in characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;
    Ok(recursive_split(text, &SEPARATORS, config))
}

/// Splits every document and tags each chunk with `start_index`, the character
/// offset of the chunk inside its parent.
pub fn split_documents(
    documents: &[Document],
    config: ChunkingConfig,
) -> Result<Vec<Document>, IngestError> {
    config.validate()?;

    let mut chunks = Vec::new();
    for document in documents {
        let mut start = 0usize;
        let mut previous_len = 0usize;

        for piece in recursive_split(&document.content, &SEPARATORS, config) {
            let search_from = (start + previous_len).saturating_sub(config.chunk_overlap);
            start = find_char_offset(&document.content, &piece, search_from)
                .or_else(|| find_char_offset(&document.content, &piece, 0))
                .unwrap_or(search_from);
            previous_len = char_len(&piece);

            let mut metadata = document.metadata.clone();
            metadata.start_index = Some(start);
            chunks.push(Document {
                content: piece,
                metadata,
            });
        }
    }

    Ok(chunks)
}

fn recursive_split(text: &str, separators: &[&str], config: ChunkingConfig) -> Vec<String> {
    let mut separator = separators.last().copied().unwrap_or("");
    let mut finer: &[&str] = &[];
    for (position, &candidate) in separators.iter().enumerate() {
        if candidate.is_empty() {
            separator = candidate;
            break;
        }
        if text.contains(candidate) {
            separator = candidate;
            finer = &separators[position + 1..];
            break;
        }
    }

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) < config.chunk_size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, config));
            pending.clear();
        }

        if finer.is_empty() {
            chunks.push(piece.to_string());
        } else {
            chunks.extend(recursive_split(piece, finer, config));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, config));
    }

    chunks
}

/// Each separator occurrence stays attached to the start of the piece that follows it.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(index, ch)| &text[index..index + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut cursor = 0;
    for (index, _) in text.match_indices(separator) {
        pieces.push(&text[cursor..index]);
        cursor = index;
    }
    pieces.push(&text[cursor..]);

    pieces.into_iter().filter(|piece| !piece.is_empty()).collect()
}

fn merge_pieces(pieces: &[&str], config: ChunkingConfig) -> Vec<String> {
    let mut merged = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);

        if total + len > config.chunk_size && !window.is_empty() {
            if let Some(chunk) = join_window(&window) {
                merged.push(chunk);
            }

            while total > config.chunk_overlap || (total + len > config.chunk_size && total > 0) {
                match window.pop_front() {
                    Some(front) => total -= char_len(front),
                    None => break,
                }
            }
        }

        window.push_back(piece);
        total += len;
    }

    if let Some(chunk) = join_window(&window) {
        merged.push(chunk);
    }

    merged
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined = window.iter().copied().collect::<String>();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn find_char_offset(haystack: &str, needle: &str, from_char: usize) -> Option<usize> {
    let from_byte = haystack
        .char_indices()
        .nth(from_char)
        .map(|(index, _)| index)
        .unwrap_or(haystack.len());

    haystack[from_byte..]
        .find(needle)
        .map(|found| char_len(&haystack[..from_byte + found]))
}
