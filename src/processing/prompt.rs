//! Prompt assembly for grounded answers.

use super::types::RetrievedChunk;

/// Reply the model is told to give when the context lacks the answer.
pub const NOT_FOUND_ANSWER: &str = "Not found in document.";

/// Separator placed between retrieved chunks.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Reply used by retrieval-only queries with no hits.
pub const NO_MATCHES: &str = "Unable to find any matches!";

/// System and user messages for a single completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    /// System instruction.
    pub system: String,
    /// User message.
    pub user: String,
}

/// Join chunk texts with the context separator.
pub fn join_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Join chunk texts, each preceded by a source label the model can cite.
fn labelled_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("[{}]\n{}", source_label(chunk), chunk.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Human-readable citation for a chunk; pages are shown one-based.
pub fn source_label(chunk: &RetrievedChunk) -> String {
    let source = chunk
        .source
        .as_deref()
        .and_then(|path| path.rsplit(['/', '\\']).next())
        .unwrap_or("document");
    match chunk.page {
        Some(page) => format!("{source}, page {}", page + 1),
        None => source.to_string(),
    }
}

/// Prompt for narrative questions, asking for labelled sections.
pub fn standard_prompt(chunks: &[RetrievedChunk], question: &str) -> PromptPair {
    let system = format!(
        "Answer only based on the context below. If the answer is not in the context, say '{NOT_FOUND_ANSWER}'\n\n\
         Format your reply exactly as:\n\
         ANSWER:\n<the answer>\n\n\
         SOURCES:\n<the bracketed source labels you used>\n\n\
         RELEVANT EXCERPTS:\n<short verbatim quotes from the context>"
    );
    PromptPair {
        system,
        user: format!(
            "Context:\n{}\n\nQuestion: {}",
            labelled_context(chunks),
            question.trim()
        ),
    }
}

/// Prompt for questions about amounts, shares, and year-over-year changes.
pub fn numerical_prompt(chunks: &[RetrievedChunk], question: &str) -> PromptPair {
    let system = format!(
        "Answer only based on the context below. If the answer is not in the context, say '{NOT_FOUND_ANSWER}'\n\n\
         The question asks for figures. Quote every amount exactly as written, with its unit \
         (for example \"$51.4 billion\") and the fiscal year it applies to. When a change is asked \
         for, give both values and the difference or percent change. Do not estimate or round."
    );
    PromptPair {
        system,
        user: format!(
            "Context:\n{}\n\nQuestion: {}",
            labelled_context(chunks),
            question.trim()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, page: Option<usize>) -> RetrievedChunk {
        RetrievedChunk {
            id: "id".into(),
            score: 0.9,
            text: text.into(),
            source: Some("dataset/usa-2025-budget-brief.pdf".into()),
            page,
            start_index: None,
        }
    }

    #[test]
    fn context_is_joined_with_separator() {
        let joined = join_context(&[chunk("first", Some(0)), chunk("second", Some(1))]);
        assert_eq!(joined, "first\n\n---\n\nsecond");
    }

    #[test]
    fn source_label_uses_file_name_and_one_based_page() {
        assert_eq!(
            source_label(&chunk("x", Some(2))),
            "usa-2025-budget-brief.pdf, page 3"
        );
    }

    #[test]
    fn standard_prompt_requests_sections_and_embeds_context() {
        let prompt = standard_prompt(&[chunk("The Budget provides $51.4 billion.", Some(0))], "  How much? ");
        assert!(prompt.system.contains("Not found in document."));
        assert!(prompt.system.contains("RELEVANT EXCERPTS:"));
        assert!(prompt.user.contains("[usa-2025-budget-brief.pdf, page 1]"));
        assert!(prompt.user.ends_with("Question: How much?"));
    }

    #[test]
    fn numerical_prompt_asks_for_exact_figures() {
        let prompt = numerical_prompt(&[chunk("4 percent increase", None)], "What is the increase?");
        assert!(prompt.system.contains("Quote every amount exactly"));
        assert!(prompt.user.contains("[usa-2025-budget-brief.pdf]"));
    }
}
