/// Packs the non-blank lines of `text` into chunks of at most `max_length`
/// characters, joining lines with `\n`. A single line longer than the limit
/// is cut into `max_length`-sized pieces.
pub fn split_text_max_length(text: &str, max_length: usize) -> Vec<String> {
    let max_length = max_length.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split('\n').filter(|l| !l.trim().is_empty()) {
        for piece in hard_split(line, max_length) {
            let piece_len = piece.chars().count();
            let needed = if current.is_empty() { piece_len } else { current_len + 1 + piece_len };

            if needed > max_length {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                current.push_str(piece);
                current_len = piece_len;
            } else {
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(piece);
                current_len = needed;
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn hard_split(line: &str, max_length: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in line.char_indices() {
        if count == max_length {
            pieces.push(&line[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    pieces.push(&line[start..]);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk_without_blank_lines() {
        assert_eq!(split_text_max_length("a\n\n  \nb", 100), vec!["a\nb".to_string()]);
    }

    #[test]
    fn lines_are_packed_up_to_the_limit() {
        let chunks = split_text_max_length("aaaa\nbbbb\ncccc", 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn long_lines_are_hard_split() {
        let chunks = split_text_max_length("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let chunks = split_text_max_length("ééé\nüü", 3);
        assert_eq!(chunks, vec!["ééé", "üü"]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(split_text_max_length("\n\n", 10).is_empty());
    }
}
