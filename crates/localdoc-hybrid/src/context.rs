//! Display context around ranked chunks and the bounded context handed to
//! an LLM collaborator.
use serde::Serialize;

use localdoc_core::config::{ContextMode, ContextSettings};
use localdoc_core::types::{Chunk, ChunkId, ContextWindow, Document, DocumentId, ScoredResult};
use localdoc_core::Corpus;

#[derive(Debug, Clone)]
pub struct ContextBuilder {
    lines_before: usize,
    lines_after: usize,
    max_chars: usize,
    mode: ContextMode,
}

impl ContextBuilder {
    pub fn new(lines_before: usize, lines_after: usize, max_chars: usize, mode: ContextMode) -> Self {
        Self { lines_before, lines_after, max_chars, mode }
    }

    pub fn from_settings(settings: &ContextSettings) -> Self {
        Self::new(settings.lines_before, settings.lines_after, settings.max_context_chars, settings.mode)
    }

    pub fn with_mode(mut self, mode: ContextMode) -> Self {
        self.mode = mode;
        self
    }

    /// Window around `doc.chunks[index]`, within the character budget.
    pub fn window(&self, doc: &Document, index: usize) -> ContextWindow {
        let Some(matched) = doc.chunks.get(index) else { return ContextWindow::default() };
        let (start, end) = match self.mode {
            ContextMode::Snippet => (index, index),
            ContextMode::Lines => (
                index.saturating_sub(self.lines_before),
                (index + self.lines_after).min(doc.chunks.len() - 1),
            ),
            ContextMode::Paragraph => self.paragraph_bounds(&doc.chunks, index),
        };
        let mut window = ContextWindow {
            before: doc.chunks[start..index].iter().map(|c| c.raw_text.clone()).collect(),
            matched: matched.raw_text.clone(),
            after: doc.chunks[index + 1..=end].iter().map(|c| c.raw_text.clone()).collect(),
        };
        self.fit(&mut window);
        window
    }

    /// Replaces the snippet context of each result with its window.
    pub fn attach(&self, corpus: &Corpus, results: &mut [ScoredResult]) {
        for result in results {
            if let Some((doc, index)) = corpus.locate(&result.chunk_id) {
                result.context = self.window(doc, index);
            }
        }
    }

    /// Neighbors on the same page with no blank line in between, at most
    /// `lines_before`/`lines_after` away.
    fn paragraph_bounds(&self, chunks: &[Chunk], index: usize) -> (usize, usize) {
        let adjacent = |a: &Chunk, b: &Chunk| {
            a.page_number == b.page_number
                && match (a.line_number, b.line_number) {
                    (Some(x), Some(y)) => y == x + 1,
                    _ => true,
                }
        };
        let mut start = index;
        while start > 0 && index - start < self.lines_before && adjacent(&chunks[start - 1], &chunks[start]) {
            start -= 1;
        }
        let mut end = index;
        while end + 1 < chunks.len() && end - index < self.lines_after && adjacent(&chunks[end], &chunks[end + 1]) {
            end += 1;
        }
        (start, end)
    }

    /// Drops the farthest surrounding lines, then truncates the matched line,
    /// until the rendered window fits `max_chars`.
    fn fit(&self, window: &mut ContextWindow) {
        while rendered_len(window) > self.max_chars {
            if !window.before.is_empty() && window.before.len() >= window.after.len() {
                window.before.remove(0);
            } else if !window.after.is_empty() {
                window.after.pop();
            } else {
                window.matched = truncate_chars(&window.matched, self.max_chars);
                break;
            }
        }
    }
}

/// One ranked chunk's context, in rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextBlock {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub page_number: Option<u32>,
    pub line_number: Option<u32>,
    pub text: String,
}

/// Ordered context blocks whose total text stays within
/// `max_context_chars`. Stops at the first block that does not fit; the
/// first block is truncated rather than dropped.
pub fn build_llm_context(results: &[ScoredResult], max_context_chars: usize) -> Vec<ContextBlock> {
    let mut blocks = Vec::new();
    let mut remaining = max_context_chars;
    for result in results {
        let text = result.context.render();
        let len = text.chars().count();
        let text = if len <= remaining {
            remaining -= len;
            text
        } else if blocks.is_empty() && remaining > 0 {
            let cut = truncate_chars(&text, remaining);
            remaining = 0;
            cut
        } else {
            break;
        };
        blocks.push(ContextBlock {
            chunk_id: result.chunk_id.clone(),
            document_id: result.document_id.clone(),
            page_number: result.page_number,
            line_number: result.line_number,
            text,
        });
    }
    blocks
}

fn rendered_len(window: &ContextWindow) -> usize {
    let lines = window.before.len() + 1 + window.after.len();
    window.char_len() + lines - 1
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
