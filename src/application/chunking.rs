//! Paragraph-aware text splitting shared by indexing and answer synthesis.

const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Splits `text` into chunks of at most `max_chars` characters.
///
/// Paragraphs (separated by blank lines) are packed greedily into chunks and
/// re-joined with a blank line. A paragraph longer than the limit is broken on
/// whitespace, and a single word longer than the limit is cut mid-word.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let separator_len = PARAGRAPH_SEPARATOR.chars().count();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    let paragraphs = text
        .split(PARAGRAPH_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty());

    for paragraph in paragraphs {
        for piece in split_paragraph(paragraph, max_chars) {
            let piece_len = piece.chars().count();
            if current.is_empty() {
                current = piece;
                current_len = piece_len;
            } else if current_len + separator_len + piece_len <= max_chars {
                current.push_str(PARAGRAPH_SEPARATOR);
                current.push_str(&piece);
                current_len += separator_len + piece_len;
            } else {
                chunks.push(std::mem::replace(&mut current, piece));
                current_len = piece_len;
            }
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_paragraph(paragraph: &str, max_chars: usize) -> Vec<String> {
    if paragraph.chars().count() <= max_chars {
        return vec![paragraph.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in paragraph.split_whitespace() {
        let word_len = word.chars().count();
        if word_len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            pieces.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }
        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            pieces.push(std::mem::replace(&mut current, word.to_string()));
            current_len = word_len;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("just a tweet", 100), vec!["just a tweet".to_string()]);
    }

    #[test]
    fn empty_and_blank_text_yield_nothing() {
        assert!(chunk_text("", 10).is_empty());
        assert!(chunk_text("  \n\n \n\n", 10).is_empty());
    }

    #[test]
    fn paragraphs_are_packed_up_to_limit() {
        let text = "aaaa\n\nbbbb\n\ncccc";
        // "aaaa\n\nbbbb" is 10 chars
        assert_eq!(
            chunk_text(text, 10),
            vec!["aaaa\n\nbbbb".to_string(), "cccc".to_string()]
        );
        assert_eq!(chunk_text(text, 100), vec!["aaaa\n\nbbbb\n\ncccc".to_string()]);
    }

    #[test]
    fn long_paragraph_splits_on_whitespace() {
        let chunks = chunk_text("one two three four five", 9);
        assert_eq!(chunks, vec!["one two", "three", "four five"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 9));
    }

    #[test]
    fn overlong_word_is_cut() {
        assert_eq!(chunk_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let text = "ééé ééé";
        assert_eq!(chunk_text(text, 7), vec![text.to_string()]);
        assert_eq!(chunk_text(text, 3), vec!["ééé", "ééé"]);
    }
}
