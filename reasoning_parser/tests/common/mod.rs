//! Common test utilities for reasoning-parser tests

use reasoning_parser::{BaseReasoningParser, Piece, Segment, SegmentKind};

pub mod streaming_helpers {
    //! Chunking helpers that mimic how model tokens arrive.

    /// Split input into char-level chunks of 2-3 chars (deterministic).
    #[allow(dead_code)]
    pub fn create_realistic_chunks(input: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let chars: Vec<char> = input.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let chunk_size = if i + 3 <= chars.len() && chars[i].is_ascii_alphanumeric() {
                3
            } else {
                2
            };

            let end = (i + chunk_size).min(chars.len());
            chunks.push(chars[i..end].iter().collect());
            i = end;
        }

        chunks
    }

    /// Break right after marker punctuation so tokens straddle chunks.
    #[allow(dead_code)]
    pub fn create_strategic_chunks(input: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for ch in input.chars() {
            current.push(ch);
            let should_break = matches!(ch, '[' | '/' | '<' | '@' | '-') || current.len() >= 5;
            if should_break {
                chunks.push(std::mem::take(&mut current));
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }

    /// Split `input` at the given byte offsets (must be char boundaries).
    #[allow(dead_code)]
    pub fn split_at_offsets(input: &str, offsets: &[usize]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut last = 0;
        for &offset in offsets {
            chunks.push(input[last..offset].to_string());
            last = offset;
        }
        chunks.push(input[last..].to_string());
        chunks
    }

    /// Every char boundary strictly inside `input`.
    #[allow(dead_code)]
    pub fn inner_boundaries(input: &str) -> Vec<usize> {
        input
            .char_indices()
            .map(|(i, _)| i)
            .filter(|&i| i > 0)
            .collect()
    }
}

/// Feed chunks through a fresh parser, returning every traced piece.
#[allow(dead_code)]
pub fn run_pieces<S: AsRef<str>>(mut parser: BaseReasoningParser, chunks: &[S]) -> Vec<Piece> {
    let mut pieces = Vec::new();
    for chunk in chunks {
        pieces.extend(parser.feed(chunk.as_ref()));
    }
    pieces.extend(parser.finish());
    pieces
}

/// Merge adjacent content segments of the same kind. Markers split runs.
#[allow(dead_code)]
pub fn coalesce(pieces: &[Piece]) -> Vec<Piece> {
    let mut out: Vec<Piece> = Vec::new();
    for piece in pieces {
        match (out.last_mut(), piece) {
            (Some(Piece::Content(prev)), Piece::Content(next)) if prev.kind == next.kind => {
                prev.content.push_str(&next.content);
            }
            _ => out.push(piece.clone()),
        }
    }
    out
}

/// Concatenate all pieces, markers included.
#[allow(dead_code)]
pub fn reassemble(pieces: &[Piece]) -> String {
    pieces.iter().map(Piece::text).collect()
}

/// Concatenated content per kind.
#[allow(dead_code)]
pub fn by_kind(segments: &[Segment], kind: SegmentKind) -> String {
    segments
        .iter()
        .filter(|s| s.kind == kind)
        .map(|s| s.content.as_str())
        .collect()
}
