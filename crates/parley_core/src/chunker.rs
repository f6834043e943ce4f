//! Splits generated text into transport-sized reply chunks

use serde::{Deserialize, Serialize};

use crate::utils::with_thousands;

/// Transport limit of 2000 minus room for the footer.
pub const DEFAULT_CHUNK_SIZE: usize = 1800;

/// Provenance shown under the last chunk of a reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyFooter {
    pub model_name: Option<String>,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

impl ReplyFooter {
    /// `None` when there is nothing to show.
    pub fn render(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(name) = self.model_name.as_deref().filter(|n| !n.is_empty()) {
            parts.push(name.to_string());
        }
        if let Some(n) = self.input_tokens.filter(|n| *n > 0) {
            parts.push(format!("{} input tokens", with_thousands(n)));
        }
        if let Some(n) = self.output_tokens.filter(|n| *n > 0) {
            parts.push(format!("{} output tokens", with_thousands(n)));
        }

        if parts.is_empty() {
            None
        } else {
            Some(format!("-# {}", parts.join(" - ")))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyChunk {
    pub body: String,
    /// Only ever set on the last chunk
    pub footer: Option<String>,
}

impl ReplyChunk {
    /// The message text to deliver.
    pub fn render(&self) -> String {
        match &self.footer {
            Some(footer) if self.body.is_empty() => footer.clone(),
            Some(footer) => format!("{}\n\n{}", self.body, footer),
            None => self.body.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_len: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl Chunker {
    /// `max_len` is counted in characters and must be non-zero.
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(1),
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Split `text` into ordered chunks of at most `max_len` characters.
    ///
    /// Splits land just after the last line break inside the window, or
    /// exactly at the window edge when there is none. The footer goes on the
    /// last chunk only.
    pub fn to_chunks(&self, text: &str, footer: Option<&ReplyFooter>) -> Vec<ReplyChunk> {
        let mut chunks = Vec::new();
        let mut rest = text;

        while let Some((window_end, _)) = rest.char_indices().nth(self.max_len) {
            let window = &rest[..window_end];
            let split = match window.rfind('\n') {
                Some(idx) => idx + 1,
                None => window_end,
            };
            let (head, tail) = rest.split_at(split);
            chunks.push(ReplyChunk {
                body: head.to_string(),
                footer: None,
            });
            rest = tail;
        }

        chunks.push(ReplyChunk {
            body: rest.to_string(),
            footer: footer.and_then(ReplyFooter::render),
        });
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bodies(chunks: &[ReplyChunk]) -> String {
        chunks.iter().map(|c| c.body.as_str()).collect()
    }

    fn footer() -> ReplyFooter {
        ReplyFooter {
            model_name: Some("Anthropic: Claude".to_string()),
            input_tokens: Some(1234),
            output_tokens: Some(56),
        }
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = Chunker::default().to_chunks("hello", Some(&footer()));
        assert_eq!(
            chunks,
            vec![ReplyChunk {
                body: "hello".to_string(),
                footer: Some(
                    "-# Anthropic: Claude - 1,234 input tokens - 56 output tokens".to_string()
                ),
            }]
        );
    }

    #[test]
    fn test_split_after_last_line_break() {
        let text = format!("{}\n{}", "a".repeat(1700), "b".repeat(799));
        assert_eq!(text.chars().count(), 2500);

        let chunks = Chunker::new(1800).to_chunks(&text, Some(&footer()));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].body, format!("{}\n", "a".repeat(1700)));
        assert_eq!(chunks[0].footer, None);
        assert_eq!(chunks[1].body, "b".repeat(799));
        assert!(chunks[1].footer.is_some());
        assert_eq!(bodies(&chunks), text);
    }

    #[test]
    fn test_hard_split_without_line_break() {
        let text = "x".repeat(4000);
        let chunks = Chunker::new(1800).to_chunks(&text, None);
        let lens: Vec<usize> = chunks.iter().map(|c| c.body.len()).collect();
        assert_eq!(lens, vec![1800, 1800, 400]);
        assert!(chunks.iter().all(|c| c.footer.is_none()));
        assert_eq!(bodies(&chunks), text);
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let text = "é".repeat(25) + "\n" + &"日本".repeat(20);
        let chunks = Chunker::new(10).to_chunks(&text, Some(&footer()));
        assert!(chunks.iter().all(|c| c.body.chars().count() <= 10));
        assert_eq!(bodies(&chunks), text);
        assert_eq!(
            chunks.iter().filter(|c| c.footer.is_some()).count(),
            1
        );
        assert!(chunks.last().unwrap().footer.is_some());
    }

    #[test]
    fn test_leading_line_break_still_progresses() {
        let text = "\nabcdef";
        let chunks = Chunker::new(3).to_chunks(text, None);
        assert_eq!(bodies(&chunks), text);
        assert_eq!(chunks[0].body, "\n");
    }

    #[test]
    fn test_exact_bound_is_single_chunk() {
        let text = "z".repeat(1800);
        assert_eq!(Chunker::new(1800).to_chunks(&text, None).len(), 1);
    }

    #[test]
    fn test_footer_rendering() {
        assert_eq!(ReplyFooter::default().render(), None);

        let zero_tokens = ReplyFooter {
            model_name: None,
            input_tokens: Some(0),
            output_tokens: Some(12),
        };
        assert_eq!(zero_tokens.render().unwrap(), "-# 12 output tokens");

        let chunk = ReplyChunk {
            body: "answer".to_string(),
            footer: footer().render(),
        };
        assert_eq!(
            chunk.render(),
            "answer\n\n-# Anthropic: Claude - 1,234 input tokens - 56 output tokens"
        );
    }
}
