use uuid::Uuid;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Text chunk produced by the chunker.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Unique chunk id
    pub id: Uuid,
    /// Position of the chunk within its document
    pub index: usize,
    /// Raw text of the chunk
    pub text: String,
    /// Character offset of the first character
    pub start: usize,
    /// Character offset after the last character
    pub end: usize,
}

impl Chunk {
    pub fn new(index: usize, text: String, start: usize, end: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            text,
            start,
            end,
        }
    }
}

/// Fixed-size character windows with overlap.
#[derive(Debug, Clone)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl Chunker {
    pub fn new(size: usize, overlap: usize) -> Self {
        Self {
            size: size.max(1),
            overlap: overlap.min(size.saturating_sub(1)),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into overlapping chunks. Whitespace-only windows are skipped.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        if chars.iter().all(|c| c.is_whitespace()) {
            return Vec::new();
        }

        let step = self.size.saturating_sub(self.overlap).max(1);
        let mut chunks = Vec::new();
        let mut idx = 0;

        while idx < chars.len() {
            let end = (idx + self.size).min(chars.len());
            let window: String = chars[idx..end].iter().collect();
            if !window.trim().is_empty() {
                chunks.push(Chunk::new(chunks.len(), window, idx, end));
            }

            if end == chars.len() {
                break;
            }
            idx += step;
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunker_respects_overlap() {
        let chunker = Chunker::new(4, 1);
        let chunks = chunker.chunk("abcdefg");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "abcd");
        assert_eq!(chunks[1].text, "defg");
        assert_eq!(chunks[1].start, 3);
        assert_eq!(chunks[1].index, 1);
    }

    #[test]
    fn chunker_empty_text_returns_empty() {
        assert!(Chunker::default().chunk("").is_empty());
        assert!(Chunker::default().chunk("  \t\n ").is_empty());
    }

    #[test]
    fn chunker_no_overlap() {
        let chunks = Chunker::new(2, 0).chunk("abcdef");
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["ab", "cd", "ef"]);
    }

    #[test]
    fn chunker_counts_characters_not_bytes() {
        let chunks = Chunker::new(3, 0).chunk("жёлтый");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "жёл");
        assert_eq!(chunks[1].end, 6);
    }

    #[test]
    fn chunker_clamps_overlap_and_size() {
        let chunker = Chunker::new(3, 10);
        assert_eq!(chunker.overlap(), 2);
        assert_eq!(Chunker::new(0, 0).size(), 1);
    }

    #[test]
    fn default_windows_cover_long_text() {
        let text = "x".repeat(1200);
        let chunks = Chunker::default().chunk(&text);

        // steps of 400: [0,500) [400,900) [800,1200)
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].start, 800);
        assert_eq!(chunks[2].end, 1200);
    }

    #[test]
    fn chunk_has_unique_id() {
        let c1 = Chunk::new(0, "a".into(), 0, 1);
        let c2 = Chunk::new(0, "a".into(), 0, 1);
        assert_ne!(c1.id, c2.id);
    }
}
