use log::debug;

use crate::config::{SegmentationMode, TextConfig};
use crate::errors::{AppError, AppResult};
use crate::models::{NewsItem, TextChunk};

/// Splits news text into the chunks shown and narrated over one image each
#[derive(Debug, Clone)]
pub struct TextSegmenter {
    mode: SegmentationMode,
    wrap_width: usize,
    delimiter: char,
}

impl Default for TextSegmenter {
    fn default() -> Self {
        Self::new(&TextConfig::default())
    }
}

impl TextSegmenter {
    pub fn new(config: &TextConfig) -> Self {
        Self {
            mode: config.mode,
            wrap_width: config.wrap_width.max(1),
            delimiter: config.delimiter,
        }
    }

    /// Segment with the configured mode
    pub fn segment_with(&self, item: &NewsItem, target_count: usize) -> AppResult<Vec<TextChunk>> {
        let chunks = match self.mode {
            SegmentationMode::Wrapped => self.segment(item, target_count)?,
            SegmentationMode::Delimiter => {
                check_target(target_count)?;
                self.segment_by_delimiter(item)
            }
            SegmentationMode::Even => self.segment_evenly(item, target_count)?,
        };
        debug!(
            "News {}: {} chunks for {} images ({:?})",
            item.id,
            chunks.len(),
            target_count,
            self.mode
        );
        Ok(chunks)
    }

    /// Wrap to fixed-width lines, then group the lines into `target_count` buckets.
    ///
    /// Each bucket holds `max(1, lines / target_count)` lines and the last one takes
    /// the remainder, so the result never has more than `target_count` chunks.
    pub fn segment(&self, item: &NewsItem, target_count: usize) -> AppResult<Vec<TextChunk>> {
        check_target(target_count)?;
        let lines = wrap_words(&item.text, self.wrap_width);
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let buckets = target_count.min(lines.len());
        let per_bucket = (lines.len() / target_count).max(1);

        let parts = (0..buckets)
            .map(|i| {
                let start = i * per_bucket;
                let end = if i + 1 == buckets {
                    lines.len()
                } else {
                    start + per_bucket
                };
                lines[start..end].join("\n")
            })
            .collect();
        Ok(number_chunks(item.id, parts))
    }

    /// Split on the delimiter, keeping it at the end of every chunk but the last
    pub fn segment_by_delimiter(&self, item: &NewsItem) -> Vec<TextChunk> {
        let pieces: Vec<&str> = item
            .text
            .split(self.delimiter)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let last = pieces.len().saturating_sub(1);
        let parts = pieces
            .into_iter()
            .enumerate()
            .map(|(i, piece)| {
                if i < last {
                    format!("{}{}", piece, self.delimiter)
                } else {
                    piece.to_string()
                }
            })
            .collect();
        number_chunks(item.id, parts)
    }

    /// Spread words evenly; the first `words % n` chunks get one extra word
    pub fn segment_evenly(&self, item: &NewsItem, target_count: usize) -> AppResult<Vec<TextChunk>> {
        check_target(target_count)?;
        let words: Vec<&str> = item.text.split_whitespace().collect();
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let n = target_count.min(words.len());
        let base = words.len() / n;
        let extra = words.len() % n;

        let mut parts = Vec::with_capacity(n);
        let mut start = 0;
        for i in 0..n {
            let len = base + usize::from(i < extra);
            parts.push(words[start..start + len].join(" "));
            start += len;
        }
        Ok(number_chunks(item.id, parts))
    }
}

fn check_target(target_count: usize) -> AppResult<()> {
    if target_count == 0 {
        return Err(AppError::ConfigurationError(
            "Chunk target count must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn number_chunks(news_id: u32, parts: Vec<String>) -> Vec<TextChunk> {
    parts
        .into_iter()
        .zip(1u32..)
        .map(|(content, index)| TextChunk {
            news_id,
            index,
            content,
        })
        .collect()
}

/// Greedy word wrap by character count. A word longer than `width` gets a line of its own.
pub fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEWS: &str = "Inflación y Política Económica: La inflación mensual en Argentina ha disminuido a un 4.2%, el nivel más bajo desde enero de 2022. Este descenso se marca como el quinto mes consecutivo de desaceleración";

    fn item(text: &str) -> NewsItem {
        NewsItem {
            id: 1,
            text: text.to_string(),
        }
    }

    fn words_of(chunks: &[TextChunk]) -> Vec<String> {
        chunks
            .iter()
            .flat_map(|c| c.content.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap_words(NEWS, 40);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.chars().count() <= 40, "line too long: {line}");
        }
    }

    #[test]
    fn test_wrap_keeps_long_word_whole() {
        let lines = wrap_words("a supercalifragilistic b", 5);
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn test_segment_count_and_word_order() {
        let segmenter = TextSegmenter::default();
        let expected: Vec<String> = NEWS.split_whitespace().map(str::to_string).collect();
        for target in 1..=12 {
            let chunks = segmenter.segment(&item(NEWS), target).unwrap();
            assert!(!chunks.is_empty());
            assert!(chunks.len() <= target, "target {target} gave {}", chunks.len());
            assert!(chunks.iter().all(|c| !c.content.trim().is_empty()));
            assert_eq!(words_of(&chunks), expected);
            let indices: Vec<u32> = chunks.iter().map(|c| c.index).collect();
            assert_eq!(indices, (1..=chunks.len() as u32).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_last_bucket_absorbs_remainder() {
        // 7 строк по одному слову, 3 корзины: 2 + 2 + 3
        let segmenter = TextSegmenter::new(&TextConfig {
            wrap_width: 1,
            ..TextConfig::default()
        });
        let chunks = segmenter.segment(&item("a b c d e f g"), 3).unwrap();
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["a\nb", "c\nd", "e\nf\ng"]);
    }

    #[test]
    fn test_target_above_line_count_gives_one_chunk_per_line() {
        let segmenter = TextSegmenter::default();
        let chunks = segmenter.segment(&item("short text"), 5).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "short text");
    }

    #[test]
    fn test_zero_target_is_configuration_error() {
        let segmenter = TextSegmenter::default();
        assert!(matches!(
            segmenter.segment(&item(NEWS), 0),
            Err(AppError::ConfigurationError(_))
        ));
        assert!(segmenter.segment_evenly(&item(NEWS), 0).is_err());
    }

    #[test]
    fn test_empty_text_gives_no_chunks() {
        let segmenter = TextSegmenter::default();
        assert!(segmenter.segment(&item("   "), 2).unwrap().is_empty());
        assert!(segmenter.segment_by_delimiter(&item("")).is_empty());
    }

    #[test]
    fn test_delimiter_mode() {
        let segmenter = TextSegmenter::default();
        let chunks = segmenter.segment_by_delimiter(&item("A, B, C"));
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["A,", "B,", "C"]);
    }

    #[test]
    fn test_delimiter_mode_drops_empty_pieces() {
        let segmenter = TextSegmenter::default();
        let chunks = segmenter.segment_by_delimiter(&item("A,, B ,"));
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["A,", "B"]);
    }

    #[test]
    fn test_even_distribution() {
        let segmenter = TextSegmenter::default();
        let chunks = segmenter.segment_evenly(&item("one two three four five"), 2).unwrap();
        let contents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["one two three", "four five"]);

        let chunks = segmenter.segment_evenly(&item("one two"), 4).unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_segment_with_dispatches_on_mode() {
        let segmenter = TextSegmenter::new(&TextConfig {
            mode: SegmentationMode::Delimiter,
            ..TextConfig::default()
        });
        let chunks = segmenter.segment_with(&item("x, y"), 2).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(segmenter.segment_with(&item("x, y"), 0).is_err());
    }
}
