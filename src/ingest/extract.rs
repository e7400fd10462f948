// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text extraction
//!
//! A small registry of extractors keyed by file extension. Every
//! extractor supports two strategies: `Fast` trades fidelity for speed
//! (lexical stripping), `HiRes` walks the document structure and
//! preserves block boundaries. The choice is a pure configuration
//! switch — cleaning and chunking downstream are identical.

use crate::errors::{OrchestratorError, Result};
use pulldown_cmark::{Event, Parser, Tag};
use regex::Regex;
use scraper::{Html, Selector};
use std::path::Path;

/// Extraction strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionQuality {
    /// Cheap lexical extraction, lower fidelity
    Fast,
    /// Structure-aware extraction
    HiRes,
}

impl ExtractionQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionQuality::Fast => "fast",
            ExtractionQuality::HiRes => "hi_res",
        }
    }
}

/// Extract raw text from a source file.
///
/// Fails with `UnsupportedFormat` when the extension has no registered
/// extractor and with `Extraction` on parser failure (recoverable — the
/// caller may retry with the other quality mode).
pub async fn extract_text(path: &Path, quality: ExtractionQuality) -> Result<String> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let supported = matches!(
        extension.as_str(),
        "txt" | "text" | "log" | "md" | "markdown" | "html" | "htm"
    );
    if !supported {
        return Err(OrchestratorError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let raw = tokio::fs::read_to_string(path).await?;

    match extension.as_str() {
        "txt" | "text" | "log" => Ok(raw),
        "md" | "markdown" => extract_markdown(path, &raw, quality),
        "html" | "htm" => extract_html(path, &raw, quality),
        _ => unreachable!("extension checked above"),
    }
}

fn extraction_error(path: &Path, reason: impl std::fmt::Display) -> OrchestratorError {
    OrchestratorError::Extraction {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn extract_markdown(path: &Path, raw: &str, quality: ExtractionQuality) -> Result<String> {
    match quality {
        ExtractionQuality::Fast => fast_strip_markdown(path, raw),
        ExtractionQuality::HiRes => {
            let mut out = String::with_capacity(raw.len());
            for event in Parser::new(raw) {
                match event {
                    Event::Text(text) | Event::Code(text) => out.push_str(&text),
                    Event::SoftBreak | Event::HardBreak => out.push(' '),
                    Event::End(Tag::Paragraph)
                    | Event::End(Tag::Heading(..))
                    | Event::End(Tag::Item)
                    | Event::End(Tag::BlockQuote)
                    | Event::End(Tag::CodeBlock(_)) => out.push_str("\n\n"),
                    _ => {}
                }
            }
            Ok(out)
        }
    }
}

fn fast_strip_markdown(path: &Path, raw: &str) -> Result<String> {
    let headings = Regex::new(r"(?m)^\s{0,3}#{1,6}\s*").map_err(|e| extraction_error(path, e))?;
    let images = Regex::new(r"!\[([^\]]*)\]\([^)]*\)").map_err(|e| extraction_error(path, e))?;
    let links = Regex::new(r"\[([^\]]*)\]\([^)]*\)").map_err(|e| extraction_error(path, e))?;

    let text = headings.replace_all(raw, "");
    let text = images.replace_all(&text, "$1");
    let text = links.replace_all(&text, "$1");
    let text: String = text
        .chars()
        .filter(|c| !matches!(c, '`' | '*' | '_' | '~' | '>'))
        .collect();
    Ok(text)
}

fn extract_html(path: &Path, raw: &str, quality: ExtractionQuality) -> Result<String> {
    match quality {
        ExtractionQuality::Fast => fast_strip_html(path, raw),
        ExtractionQuality::HiRes => {
            let document = Html::parse_document(raw);
            let selector = Selector::parse("p, h1, h2, h3, h4, h5, h6, li, td, th, pre, blockquote")
                .map_err(|e| extraction_error(path, e))?;

            let mut blocks: Vec<String> = Vec::new();
            for element in document.select(&selector) {
                let text = element.text().collect::<Vec<_>>().join(" ");
                if !text.trim().is_empty() {
                    blocks.push(text);
                }
            }

            if blocks.is_empty() {
                // Documents without block markup still carry text nodes
                let text = document.root_element().text().collect::<Vec<_>>().join(" ");
                return Ok(text);
            }

            Ok(blocks.join("\n\n"))
        }
    }
}

fn fast_strip_html(path: &Path, raw: &str) -> Result<String> {
    let scripts =
        Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").map_err(|e| extraction_error(path, e))?;
    let tags = Regex::new(r"<[^>]*>").map_err(|e| extraction_error(path, e))?;

    let text = scripts.replace_all(raw, " ");
    let text = tags.replace_all(&text, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    Ok(text)
}
