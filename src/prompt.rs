//! Grounded prompt assembly.
//!
//! Retrieved passages become a numbered context block; the instruction
//! text tells the model to answer only from that block and to cite the
//! passage numbers it used. Passage `i` in the input is always citation
//! `[i+1]` in the prompt, so citations in the answer can be mapped back
//! to specific passages.

use crate::models::RetrievedPassage;

/// Render passages as numbered citation lines, blank-line separated:
///
/// ```text
/// [1] (body:4217) Replica goes into recovery ...
///
/// [2] (comment:4217) Check the transaction log ...
/// ```
pub fn build_context(passages: &[RetrievedPassage]) -> String {
    passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("[{}] ({}:{}) {}", i + 1, p.source, p.issue_number, p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Assemble the full grounded prompt for the completion model.
pub fn build_prompt(query: &str, passages: &[RetrievedPassage]) -> String {
    let context = build_context(passages);
    format!(
        "You are a support assistant answering questions about Apache Solr \
         using excerpts from past GitHub issues.\n\
         Answer using ONLY the context below. Cite the bracketed numbers of \
         the excerpts you rely on, like [1] or [2]. If the context does not \
         contain enough information to answer, say so instead of guessing.\n\n\
         Context:\n{context}\n\nQuestion: {query}\n\nAnswer:"
    )
}
