/*!
 * Markdown document processing.
 *
 * This module covers the document side of the translation pipeline:
 *
 * - `segmenter`: Splits Markdown into translation-sized segments while
 *   tracking the heading hierarchy
 * - `merger`: Re-joins undersized or sentence-broken segments, skipping
 *   over image segments
 * - `writer`: Appends translated segments to the output document, emitting
 *   only the heading levels that changed
 */

// Re-export main types for easier usage
pub use self::merger::Merger;
pub use self::segmenter::{Segment, Segmenter};
pub use self::writer::OutputWriter;

// Submodules
pub mod merger;
pub mod segmenter;
pub mod writer;
