//! Token-window chunker: splits extracted document text into overlapping
//! fixed-size chunks. Chunk order is significant: it is the order consumed
//! by context-weighted vectorization.

use crate::error::RagError;

/// Split `text` into overlapping chunks of up to `size` whitespace-delimited
/// tokens, stepping by `size - overlap` tokens between chunk starts.
///
/// Requires `size > overlap > 0`. The final chunk may be shorter than
/// `size`; empty input yields an empty sequence.
pub fn chunk(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, RagError> {
    if overlap == 0 || size <= overlap {
        return Err(RagError::InvalidArgument(format!(
            "chunk size ({size}) must be greater than overlap ({overlap}), and overlap must be positive"
        )));
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let step = size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + size).min(words.len());
        chunks.push(words[start..end].join(" "));
        start += step;
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(chunk("", 500, 50).unwrap().is_empty());
        assert!(chunk("   \n\t  ", 500, 50).unwrap().is_empty());
    }

    #[test]
    fn test_single_short_chunk() {
        let chunks = chunk("the cat sat", 500, 50).unwrap();
        assert_eq!(chunks, vec!["the cat sat"]);
    }

    #[test]
    fn test_overlap_between_consecutive_chunks() {
        // 10 tokens, size 4, overlap 2 -> starts at 0, 2, 4, 6, 8
        let text = "t0 t1 t2 t3 t4 t5 t6 t7 t8 t9";
        let chunks = chunk(text, 4, 2).unwrap();
        assert_eq!(chunks[0], "t0 t1 t2 t3");
        assert_eq!(chunks[1], "t2 t3 t4 t5");
        assert_eq!(chunks.last().unwrap(), "t8 t9");
    }

    #[test]
    fn test_no_chunk_is_empty() {
        let text = (0..37).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = chunk(&text, 10, 3).unwrap();
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn test_coverage_reconstructs_token_sequence() {
        // Dropping each chunk's first `overlap` tokens (except the first
        // chunk) must reconstruct the original token stream exactly.
        let text = (0..53).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let size = 8;
        let overlap = 3;
        let chunks = chunk(&text, size, overlap).unwrap();

        let mut rebuilt: Vec<String> = Vec::new();
        for (i, c) in chunks.iter().enumerate() {
            let tokens: Vec<&str> = c.split_whitespace().collect();
            let skip = if i == 0 { 0 } else { overlap.min(tokens.len()) };
            rebuilt.extend(tokens[skip..].iter().map(|t| t.to_string()));
        }
        let original: Vec<String> = text.split_whitespace().map(|t| t.to_string()).collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_overlap_not_less_than_size_rejected() {
        assert!(matches!(
            chunk("some text", 500, 500),
            Err(RagError::InvalidArgument(_))
        ));
        assert!(matches!(
            chunk("some text", 50, 500),
            Err(RagError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_zero_overlap_rejected() {
        assert!(matches!(
            chunk("some text", 500, 0),
            Err(RagError::InvalidArgument(_))
        ));
    }
}
