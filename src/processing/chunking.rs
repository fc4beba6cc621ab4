//! Recursive text splitting with overlap and start offsets.
//!
//! Pages are split with `semchunk-rs`, which recurses through paragraph, line, sentence, and word
//! boundaries until every piece fits a budget of `chunk_size - overlap`. Overlap is then taken
//! from the page text itself: each chunk after the first is extended backwards by up to `overlap`
//! length units. Pieces the splitter lets run over are cut at a word boundary so no chunk exceeds
//! `chunk_size`. Chunks therefore remain verbatim substrings of their page, which keeps
//! `start_index` exact.
//!
//! Length is measured in characters by default. Token mode uses `tiktoken-rs` and falls back to a
//! whitespace counter when the model has no known tokenizer (common for Ollama models).

use crate::config::{Config, LengthUnit};
use crate::document::{Document, DocumentMetadata};
use anyhow::Error as TokenizerError;
use semchunk_rs::Chunker;
use std::sync::Arc;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, r50k_base};

use super::types::ChunkingError;

/// Shared length function used for both splitting and overlap.
pub type LengthCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Index of the chunk echoed to the debug log after a split.
const SAMPLE_CHUNK_INDEX: usize = 10;

/// Splitter parameters derived from configuration.
#[derive(Debug, Clone)]
pub struct SplitterSettings {
    /// Maximum chunk length.
    pub chunk_size: usize,
    /// Overlap carried from the preceding text.
    pub chunk_overlap: usize,
    /// Unit of `chunk_size` and `chunk_overlap`.
    pub length_unit: LengthUnit,
    /// Model whose tokenizer is used in token mode.
    pub model: String,
}

impl SplitterSettings {
    /// Read splitter settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.text_splitter_chunk_size,
            chunk_overlap: config.text_splitter_chunk_overlap,
            length_unit: config.text_splitter_length_unit,
            model: config.embedding_model.clone(),
        }
    }

    fn validate(&self) -> Result<(), ChunkingError> {
        if self.chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkingError::InvalidOverlap {
                overlap: self.chunk_overlap,
                chunk_size: self.chunk_size,
            });
        }
        Ok(())
    }
}

/// A chunk located inside its parent text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    /// Byte offset of the chunk in the parent text.
    pub start: usize,
    /// Chunk text.
    pub text: String,
}

/// Split page documents into chunk documents carrying `start_index`.
pub fn split_documents(
    documents: &[Document],
    settings: &SplitterSettings,
) -> Result<Vec<Document>, ChunkingError> {
    settings.validate()?;
    let counter = build_length_counter(settings.length_unit, &settings.model)?;

    let mut chunks = Vec::new();
    for document in documents {
        let spans = split_text(
            &document.page_content,
            settings.chunk_size,
            settings.chunk_overlap,
            &counter,
        )?;
        chunks.extend(spans.into_iter().map(|span| Document {
            page_content: span.text,
            metadata: DocumentMetadata {
                start_index: Some(span.start),
                ..document.metadata.clone()
            },
        }));
    }

    tracing::info!(
        "Split {} documents into {} chunks.",
        documents.len(),
        chunks.len()
    );
    match chunks.get(SAMPLE_CHUNK_INDEX) {
        Some(sample) => tracing::debug!(
            page = sample.metadata.page,
            start_index = ?sample.metadata.start_index,
            content = %sample.page_content,
            "Sample chunk"
        ),
        None => tracing::debug!("Not enough chunks to print chunk {SAMPLE_CHUNK_INDEX}."),
    }

    Ok(chunks)
}

/// Split `text` into spans no longer than `chunk_size`, overlapping by up to `overlap`.
///
/// Base pieces are cut with a budget of `chunk_size - overlap` so that the overlap taken from the
/// preceding text still fits. Every span is a verbatim slice of `text` starting at `start`.
/// Returns an empty vector when the input text is all whitespace.
pub fn split_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    counter: &LengthCounter,
) -> Result<Vec<TextSpan>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if overlap >= chunk_size {
        return Err(ChunkingError::InvalidOverlap {
            overlap,
            chunk_size,
        });
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let counter_for_chunker = counter.clone();
    let chunker = Chunker::new(
        chunk_size - overlap,
        Box::new(move |segment: &str| counter_for_chunker.as_ref()(segment)),
    );
    let pieces = chunker.chunk(text);

    let mut spans = Vec::with_capacity(pieces.len());
    let mut cursor = 0;
    let mut previous_start: Option<usize> = None;

    for piece in &pieces {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let Some(offset) = text[cursor..].find(piece) else {
            // The splitter normalized this piece; keep it without overlap.
            tracing::trace!(cursor, "Chunk not found verbatim in page text");
            spans.push(TextSpan {
                start: cursor,
                text: trim_to_budget(piece, chunk_size, counter).to_string(),
            });
            continue;
        };

        let end = cursor + offset + piece.len();
        let mut piece_start = cursor + offset;
        // semchunk does not count the separators it joins with, so a piece can run over budget;
        // whatever is cut off the end becomes the next span.
        while piece_start < end {
            let span_start = match previous_start {
                Some(lower) if overlap > 0 => {
                    overlapped_start(text, lower, piece_start, end, overlap, chunk_size, counter)
                }
                _ => piece_start,
            };
            let span_end = budget_end(text, span_start, piece_start, end, chunk_size, counter);
            spans.push(TextSpan {
                start: span_start,
                text: text[span_start..span_end].to_string(),
            });
            previous_start = Some(piece_start);
            let rest = &text[span_end..end];
            piece_start = span_end + (rest.len() - rest.trim_start().len());
        }
        cursor = end;
    }

    Ok(spans)
}

/// Find where an overlapped chunk should begin.
///
/// The result lies in `[lower, start]`, covers at most `overlap` units before `start`, keeps the
/// whole chunk within `chunk_size`, and begins at the start of a word.
fn overlapped_start(
    text: &str,
    lower: usize,
    start: usize,
    end: usize,
    overlap: usize,
    chunk_size: usize,
    counter: &LengthCounter,
) -> usize {
    let overlap_start = earliest_start_within(text, lower, start, overlap, counter);
    let budget_start = earliest_start_within(text, overlap_start, end, chunk_size, counter);
    let candidate = budget_start.min(start);
    if counter.as_ref()(&text[candidate..end]) > chunk_size {
        return start;
    }
    align_to_word_start(text, candidate, start)
}

/// Move `candidate` forward to the next word start, never past `limit`.
fn align_to_word_start(text: &str, candidate: usize, limit: usize) -> usize {
    let mut aligned = candidate;
    if candidate > 0 && !text[..candidate].ends_with(char::is_whitespace) {
        match text[candidate..limit].find(char::is_whitespace) {
            Some(offset) => aligned = candidate + offset,
            None => return limit,
        }
    }
    let slice = &text[aligned..limit];
    aligned + (slice.len() - slice.trim_start().len())
}

/// End of the span starting at `span_start` that fits `chunk_size`.
///
/// Returns `end` when everything fits. Otherwise cuts at the last word boundary after
/// `piece_start`, or at a char boundary when the piece holds no whitespace. At least one
/// character of the piece is always taken so the caller makes progress.
fn budget_end(
    text: &str,
    span_start: usize,
    piece_start: usize,
    end: usize,
    chunk_size: usize,
    counter: &LengthCounter,
) -> usize {
    if counter.as_ref()(&text[span_start..end]) <= chunk_size {
        return end;
    }

    let mut cut = latest_end_within(text, span_start, end, chunk_size, counter);
    while cut > piece_start && counter.as_ref()(&text[span_start..cut]) > chunk_size {
        cut = previous_boundary(text, cut);
    }

    if cut > piece_start && !text[cut..].starts_with(char::is_whitespace) {
        if let Some(space) = text[piece_start..cut].rfind(char::is_whitespace) {
            cut = piece_start + space;
        }
    }
    let kept = text[piece_start..cut].trim_end().len();
    if kept > 0 {
        return piece_start + kept;
    }
    text[piece_start..end]
        .chars()
        .next()
        .map_or(end, |first| piece_start + first.len_utf8())
}

/// Smallest char boundary `b` in `[lower, end]` with `counter(text[b..end]) <= limit`.
///
/// Relies on the length function being monotonic in the slice length.
fn earliest_start_within(
    text: &str,
    lower: usize,
    end: usize,
    limit: usize,
    counter: &LengthCounter,
) -> usize {
    let boundaries: Vec<usize> = text[lower..end]
        .char_indices()
        .map(|(offset, _)| lower + offset)
        .chain(std::iter::once(end))
        .collect();
    let index =
        boundaries.partition_point(|&boundary| counter.as_ref()(&text[boundary..end]) > limit);
    boundaries.get(index).copied().unwrap_or(end)
}

/// Largest char boundary `b` in `[start, upper]` with `counter(text[start..b]) <= limit`.
fn latest_end_within(
    text: &str,
    start: usize,
    upper: usize,
    limit: usize,
    counter: &LengthCounter,
) -> usize {
    let boundaries: Vec<usize> = text[start..upper]
        .char_indices()
        .skip(1)
        .map(|(offset, _)| start + offset)
        .chain(std::iter::once(upper))
        .collect();
    let index =
        boundaries.partition_point(|&boundary| counter.as_ref()(&text[start..boundary]) <= limit);
    match index {
        0 => start,
        _ => boundaries[index - 1],
    }
}

fn previous_boundary(text: &str, index: usize) -> usize {
    text[..index]
        .char_indices()
        .next_back()
        .map_or(0, |(offset, _)| offset)
}

/// Longest prefix of `text` within `budget`, ending at a char boundary.
fn trim_to_budget<'a>(text: &'a str, budget: usize, counter: &LengthCounter) -> &'a str {
    let end = latest_end_within(text, 0, text.len(), budget, counter);
    text[..end].trim_end()
}

/// Build the length function for the requested unit.
pub fn build_length_counter(
    unit: LengthUnit,
    model: &str,
) -> Result<LengthCounter, ChunkingError> {
    match unit {
        LengthUnit::Chars => Ok(char_counter()),
        LengthUnit::Tokens => match build_tiktoken_counter(model) {
            Ok(counter) => Ok(counter),
            Err(error) => {
                tracing::warn!(
                    model,
                    error = %error,
                    "Tokenizer unavailable; falling back to whitespace counter"
                );
                Ok(whitespace_counter())
            }
        },
    }
}

fn char_counter() -> LengthCounter {
    Arc::new(|segment: &str| segment.chars().count())
}

fn build_tiktoken_counter(model: &str) -> Result<LengthCounter, ChunkingError> {
    let normalized = model.trim();
    let target = if normalized.is_empty() {
        "cl100k_base"
    } else {
        normalized
    };
    let encoding = resolve_encoding(target).map_err(|source| ChunkingError::Tokenizer {
        model: target.to_string(),
        source,
    })?;
    let encoding = Arc::new(encoding);

    Ok(Arc::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            match model {
                "cl100k_base" => cl100k_base(),
                "o200k_base" => o200k_base(),
                "p50k_base" => p50k_base(),
                "r50k_base" | "gpt2" => r50k_base(),
                _ => {
                    tracing::warn!(model, "Using 'cl100k_base' encoding for token counting");
                    cl100k_base()
                }
            }
        }
    }
}

fn whitespace_counter() -> LengthCounter {
    Arc::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUDGET_TEXT: &str = "The Budget provides $51.4 billion for the Department of Energy. \
        It invests in clean energy deployment and grid resilience.\n\n\
        The Budget supports the National Nuclear Security Administration. \
        Funding for science programs increases by 4 percent over the 2023 enacted level.";

    fn settings(chunk_size: usize, chunk_overlap: usize) -> SplitterSettings {
        SplitterSettings {
            chunk_size,
            chunk_overlap,
            length_unit: LengthUnit::Chars,
            model: "all-minilm".into(),
        }
    }

    #[test]
    fn whitespace_counter_splits_words() {
        let spans = split_text("one two three four five", 2, 0, &whitespace_counter())
            .expect("split");
        let texts: Vec<_> = spans.iter().map(|span| span.text.as_str()).collect();
        assert_eq!(texts, vec!["one two", "three four", "five"]);
        assert_eq!(spans[1].start, 8);
    }

    #[test]
    fn chunks_respect_budget_and_are_verbatim() {
        let counter = char_counter();
        let spans = split_text(BUDGET_TEXT, 60, 0, &counter).expect("split");
        assert!(spans.len() > 2);
        for span in &spans {
            assert!(counter.as_ref()(&span.text) <= 60, "{:?}", span.text);
            assert_eq!(&BUDGET_TEXT[span.start..span.start + span.text.len()], span.text);
        }
        let words: Vec<&str> = spans
            .iter()
            .flat_map(|span| span.text.split_whitespace())
            .collect();
        let original: Vec<&str> = BUDGET_TEXT.split_whitespace().collect();
        assert_eq!(words, original);
    }

    fn budget_report(paragraphs: usize) -> String {
        (1..=paragraphs)
            .map(|n| {
                format!(
                    "Section {n}. The Budget provides ${n}.4 billion for program {n}, an increase \
                     of {n} percent over the 2023 enacted level. It invests in clean energy, grid \
                     resilience, and workforce training across {n} regions."
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn assert_verbatim_and_bounded(text: &str, spans: &[TextSpan], chunk_size: usize) {
        let counter = char_counter();
        for span in spans {
            assert!(
                counter.as_ref()(&span.text) <= chunk_size,
                "{} chars: {:?}",
                counter.as_ref()(&span.text),
                span.text
            );
            assert_eq!(&text[span.start..span.start + span.text.len()], span.text);
            assert!(!span.text.starts_with(char::is_whitespace));
        }
    }

    fn assert_covers_text(text: &str, spans: &[TextSpan]) {
        let mut covered = 0;
        for span in spans {
            if span.start > covered {
                assert!(
                    text[covered..span.start].trim().is_empty(),
                    "text dropped: {:?}",
                    &text[covered..span.start]
                );
            }
            covered = covered.max(span.start + span.text.len());
        }
        assert!(text[covered..].trim().is_empty());
    }

    fn overlap_len(previous: &TextSpan, next: &TextSpan) -> usize {
        (previous.start + previous.text.len()).saturating_sub(next.start)
    }

    #[test]
    fn overlap_reaches_back_into_previous_chunk() {
        let counter = char_counter();
        let spans = split_text(BUDGET_TEXT, 60, 25, &counter).expect("split");
        assert!(spans.len() > 2);
        assert_verbatim_and_bounded(BUDGET_TEXT, &spans, 60);
        assert_covers_text(BUDGET_TEXT, &spans);
        for pair in spans.windows(2) {
            assert!(pair[1].start >= pair[0].start);
            assert!(pair[1].start + pair[1].text.len() > pair[0].start + pair[0].text.len());
        }
        assert!(spans.windows(2).any(|pair| overlap_len(&pair[0], &pair[1]) > 0));
    }

    #[test]
    fn default_settings_bound_long_text_and_overlap_every_chunk() {
        let text = budget_report(60);
        let spans = split_text(&text, 1000, 500, &char_counter()).expect("split");
        assert!(spans.len() > 10, "got {} chunks", spans.len());
        assert_verbatim_and_bounded(&text, &spans, 1000);
        assert_covers_text(&text, &spans);
        for pair in spans.windows(2) {
            let shared = overlap_len(&pair[0], &pair[1]);
            assert!(shared > 0, "no overlap before chunk at {}", pair[1].start);
            assert!(shared <= 500, "overlap of {shared} chars");
        }
    }

    #[test]
    fn long_text_without_overlap_stays_within_budget() {
        let text = budget_report(60);
        let spans = split_text(&text, 1000, 0, &char_counter()).expect("split");
        assert_verbatim_and_bounded(&text, &spans, 1000);
        assert_covers_text(&text, &spans);
        let words: Vec<&str> = spans
            .iter()
            .flat_map(|span| span.text.split_whitespace())
            .collect();
        assert_eq!(words, text.split_whitespace().collect::<Vec<_>>());
    }

    #[test]
    fn multibyte_text_keeps_byte_offsets_and_char_budget() {
        let text = "Énergie — le budget de l'État augmente de 4 % pour la transition. ".repeat(40);
        let spans = split_text(&text, 100, 40, &char_counter()).expect("split");
        assert!(spans.len() > 5);
        assert!(spans.iter().all(|span| text.is_char_boundary(span.start)));
        assert_verbatim_and_bounded(&text, &spans, 100);
        assert_covers_text(&text, &spans);
        assert!(
            spans
                .iter()
                .any(|span| text[..span.start].chars().count() != span.start)
        );
        assert!(spans.windows(2).any(|pair| overlap_len(&pair[0], &pair[1]) > 0));
    }

    #[test]
    fn oversized_word_is_cut_at_char_boundaries() {
        let text = "Überweisungsbetragsobergrenzenüberschreitung";
        let spans = split_text(text, 10, 0, &char_counter()).expect("split");
        assert_verbatim_and_bounded(text, &spans, 10);
        let rebuilt: String = spans.iter().map(|span| span.text.as_str()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        let spans = split_text(" \n\t ", 10, 2, &char_counter()).expect("split");
        assert!(spans.is_empty());
    }

    #[test]
    fn rejects_zero_chunk_size_and_oversized_overlap() {
        let counter = char_counter();
        assert!(matches!(
            split_text("hello", 0, 0, &counter).unwrap_err(),
            ChunkingError::InvalidChunkSize
        ));
        assert!(matches!(
            split_text("hello", 5, 5, &counter).unwrap_err(),
            ChunkingError::InvalidOverlap { overlap: 5, chunk_size: 5 }
        ));
    }

    #[test]
    fn split_documents_carries_page_metadata() {
        let pages = crate::document::pages_to_documents(
            "brief.pdf",
            vec![BUDGET_TEXT.to_string(), String::new(), "Appendix table".to_string()],
        );
        let chunks = split_documents(&pages, &settings(80, 20)).expect("chunks");

        assert!(chunks.iter().all(|chunk| chunk.metadata.source == "brief.pdf"));
        assert!(chunks.iter().all(|chunk| chunk.metadata.page != 1));
        let last = chunks.last().expect("last chunk");
        assert_eq!(last.metadata.page, 2);
        assert_eq!(last.metadata.start_index, Some(0));
        assert_eq!(last.page_content, "Appendix table");
    }

    #[test]
    fn token_mode_respects_tiktoken_budget() {
        let counter =
            build_length_counter(LengthUnit::Tokens, "text-embedding-3-small").expect("counter");
        let spans = split_text(BUDGET_TEXT, 12, 3, &counter).expect("split");
        for span in &spans {
            assert!(counter.as_ref()(&span.text) <= 12);
        }
    }
}
