//! Chunked redaction with entities that straddle chunk boundaries.
//!
//! [`StreamingBuffer`] keeps the trailing `overlap_size` characters of input
//! unemitted. Each chunk triggers detection over the whole retained buffer;
//! only text proven complete is redacted and returned. When `overlap_size` is
//! at least the longest entity the detector can match, the concatenated
//! output of every [`StreamingBuffer::add_chunk`] plus
//! [`StreamingBuffer::finalize`] equals [`RedactionPipeline::redact`] on the
//! full text. A smaller overlap can miss entities cut at a boundary.
//!
//! The last emitted character stays in front of the pending text as read-only
//! context, so word boundaries and line anchors see the same neighbour they
//! would in the full text. Detection runs through [`Detector::detect_from`]
//! and never reports a span inside that context.

pub mod io;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::detect::Detector;
use crate::error::Result;
use crate::pipeline::{RedactionPipeline, Redactor, TokenFormat};
use crate::span::{select_spans, Span};
use crate::store::TokenStore;

pub use io::{redact_async_reader, redact_reader, DEFAULT_CHUNK_BYTES};

/// Overlap used when none is configured.
pub const DEFAULT_OVERLAP: usize = 512;

/// Per-chunk bookkeeping, one entry per non-empty chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_index: usize,
    /// Characters in the chunk.
    pub input_size: usize,
    /// Characters emitted for this chunk.
    pub output_size: usize,
    /// Characters retained in the buffer afterwards.
    pub buffer_size: usize,
    pub entities_redacted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStats {
    pub total_chunks: usize,
    pub total_input_chars: usize,
    pub total_output_chars: usize,
    pub total_entities_redacted: u64,
    pub buffer_size: usize,
    /// `output / input`; 1.0 before any input.
    pub compression_ratio: f64,
    /// Spans discarded because their text did not match the source.
    pub spans_dropped: usize,
}

pub struct StreamingBuffer {
    detector: Arc<dyn Detector>,
    redactor: Redactor,
    overlap_size: usize,
    /// Context followed by pending text.
    buffer: String,
    /// Byte length of the context prefix of `buffer`.
    context_len: usize,
    chunk_index: usize,
    total_input_chars: usize,
    total_output_chars: usize,
    spans_dropped: usize,
    metadata: Vec<ChunkMetadata>,
}

impl StreamingBuffer {
    pub fn new(detector: Arc<dyn Detector>, overlap_size: usize) -> Self {
        Self {
            detector,
            redactor: Redactor::default(),
            overlap_size,
            buffer: String::new(),
            context_len: 0,
            chunk_index: 0,
            total_input_chars: 0,
            total_output_chars: 0,
            spans_dropped: 0,
            metadata: Vec::new(),
        }
    }

    /// Share the pipeline's detector, template and store. The buffer keeps its
    /// own counter, starting at zero.
    pub fn from_pipeline(pipeline: &RedactionPipeline, overlap_size: usize) -> Self {
        let mut buffer = Self::new(Arc::clone(pipeline.detector()), overlap_size);
        buffer.redactor = Redactor::new(pipeline.format().clone(), pipeline.store().cloned());
        buffer
    }

    pub fn with_format(mut self, format: TokenFormat) -> Self {
        self.redactor = Redactor::new(format, self.redactor.store().cloned());
        self
    }

    pub fn with_store(mut self, store: Arc<TokenStore>) -> Self {
        self.redactor = Redactor::new(self.redactor.format().clone(), Some(store));
        self
    }

    pub fn overlap_size(&self) -> usize {
        self.overlap_size
    }

    pub fn store(&self) -> Option<&Arc<TokenStore>> {
        self.redactor.store()
    }

    /// Append a chunk and return the redacted text that is now safe to emit.
    ///
    /// On a detection error the chunk is rolled back, leaving the buffer as it
    /// was before the call.
    pub fn add_chunk(&mut self, chunk: &str) -> Result<String> {
        if chunk.is_empty() {
            return Ok(String::new());
        }

        let previous_len = self.buffer.len();
        let input_size = chunk.chars().count();
        self.buffer.push_str(chunk);

        let buffered = self.pending().chars().count();
        if buffered <= self.overlap_size {
            self.total_input_chars += input_size;
            self.push_metadata(input_size, 0, buffered, 0);
            return Ok(String::new());
        }

        // Byte offset of the first overlap character.
        let safe_end = self
            .pending()
            .char_indices()
            .nth(buffered - self.overlap_size)
            .map_or(self.buffer.len(), |(idx, _)| self.context_len + idx);

        let spans = match self.select() {
            Ok(spans) => spans,
            Err(e) => {
                self.buffer.truncate(previous_len);
                return Err(e);
            }
        };
        self.total_input_chars += input_size;

        // An entity still open at the boundary moves the boundary to its start.
        let actual_safe_end = spans
            .iter()
            .find(|s| s.start < safe_end && safe_end < s.end)
            .map_or(safe_end, |s| s.start);
        let complete = spans
            .iter()
            .take_while(|s| s.end <= actual_safe_end)
            .count();

        let mut out = String::with_capacity(actual_safe_end - self.context_len);
        let entities = self.redactor.emit(
            &self.buffer,
            self.context_len..actual_safe_end,
            &spans[..complete],
            &mut out,
        );
        self.advance_context(actual_safe_end);

        let output_size = out.chars().count();
        self.total_output_chars += output_size;
        let retained = self.pending().chars().count();
        tracing::debug!(
            chunk = self.chunk_index,
            output_size,
            retained,
            entities,
            "streaming step"
        );
        self.push_metadata(input_size, output_size, retained, entities);
        Ok(out)
    }

    /// Redact and return everything still buffered. No boundary correction:
    /// no more input will arrive.
    pub fn finalize(&mut self) -> Result<String> {
        if self.pending().is_empty() {
            return Ok(String::new());
        }

        let spans = self.select()?;
        let mut out = String::with_capacity(self.buffer.len() - self.context_len);
        let entities =
            self.redactor
                .emit(&self.buffer, self.context_len..self.buffer.len(), &spans, &mut out);
        self.buffer.clear();
        self.context_len = 0;

        self.total_output_chars += out.chars().count();
        tracing::debug!(entities, "finalized stream");
        Ok(out)
    }

    pub fn get_metadata(&self) -> Vec<ChunkMetadata> {
        self.metadata.clone()
    }

    pub fn get_stats(&self) -> StreamStats {
        let compression_ratio = if self.total_input_chars > 0 {
            self.total_output_chars as f64 / self.total_input_chars as f64
        } else {
            1.0
        };
        StreamStats {
            total_chunks: self.chunk_index,
            total_input_chars: self.total_input_chars,
            total_output_chars: self.total_output_chars,
            total_entities_redacted: self.redactor.counter(),
            buffer_size: self.pending().chars().count(),
            compression_ratio,
            spans_dropped: self.spans_dropped,
        }
    }

    /// Return to the initial state for a new, independent stream. Clears the
    /// attached token store as well.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.context_len = 0;
        self.chunk_index = 0;
        self.total_input_chars = 0;
        self.total_output_chars = 0;
        self.spans_dropped = 0;
        self.metadata.clear();
        self.redactor.reset();
        if let Some(store) = self.redactor.store() {
            store.clear();
        }
    }

    /// Text not yet emitted.
    fn pending(&self) -> &str {
        &self.buffer[self.context_len..]
    }

    /// Detect over context plus pending text and select the spans to redact.
    /// Spans reaching into the context are discarded.
    fn select(&mut self) -> Result<Vec<Span>> {
        let mut detected = self.detector.detect_from(&self.buffer, self.context_len)?;
        detected.retain(|s| s.start >= self.context_len);
        let selection = select_spans(&self.buffer, detected);
        self.spans_dropped += selection.dropped;
        Ok(selection.spans)
    }

    /// Drop everything before `emitted_end` except its last character, which
    /// becomes the new context.
    fn advance_context(&mut self, emitted_end: usize) {
        let keep_from = self.buffer[..emitted_end]
            .char_indices()
            .next_back()
            .map_or(emitted_end, |(idx, _)| idx);
        self.buffer.drain(..keep_from);
        self.context_len = emitted_end - keep_from;
    }

    fn push_metadata(
        &mut self,
        input_size: usize,
        output_size: usize,
        buffer_size: usize,
        entities_redacted: usize,
    ) {
        self.metadata.push(ChunkMetadata {
            chunk_index: self.chunk_index,
            input_size,
            output_size,
            buffer_size,
            entities_redacted,
        });
        self.chunk_index += 1;
    }
}

/// Iterator returned by [`stream_redact`].
pub struct StreamRedact<I> {
    chunks: I,
    buffer: StreamingBuffer,
    done: bool,
}

/// Drive `buffer` over `chunks`, yielding every non-empty output followed by
/// the finalized tail. Stops after the first error.
pub fn stream_redact<I, S>(chunks: I, buffer: StreamingBuffer) -> StreamRedact<I::IntoIter>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    StreamRedact {
        chunks: chunks.into_iter(),
        buffer,
        done: false,
    }
}

impl<I> StreamRedact<I> {
    pub fn buffer(&self) -> &StreamingBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> StreamingBuffer {
        self.buffer
    }
}

impl<I, S> Iterator for StreamRedact<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        for chunk in self.chunks.by_ref() {
            match self.buffer.add_chunk(chunk.as_ref()) {
                Ok(out) if out.is_empty() => continue,
                Ok(out) => return Some(Ok(out)),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        self.done = true;
        match self.buffer.finalize() {
            Ok(out) if out.is_empty() => None,
            other => Some(other),
        }
    }
}
