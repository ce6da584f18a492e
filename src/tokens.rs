use std::ops::Range;

/// Longest run of word characters kept in a single token.
const WORD_PIECE_CHARS: usize = 4;

/// Split text into approximate model tokens, returned as byte ranges.
///
/// The ranges are contiguous and cover the whole input, so slicing the text
/// with every range and concatenating the pieces gives the original back.
/// Boundaries mimic a BPE vocabulary closely enough for budgeting:
/// - words are cut into pieces of up to four characters, the first piece
///   carrying a single leading space when there is one;
/// - every newline and every punctuation character is its own token;
/// - other whitespace runs are grouped four characters at a time.
pub fn tokenize(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::with_capacity(text.len() / 3 + 1);
    let mut chars = text.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c == '\n' {
            spans.push(start..start + 1);
            continue;
        }

        let leads_word = c == ' ' && matches!(chars.peek(), Some(&(_, next)) if is_word(next));
        if is_word(c) || leads_word {
            let mut piece_start = start;
            let mut piece_chars = usize::from(!leads_word);
            let mut end = start + c.len_utf8();

            while let Some(&(idx, next)) = chars.peek() {
                if !is_word(next) {
                    break;
                }
                if piece_chars == WORD_PIECE_CHARS {
                    spans.push(piece_start..idx);
                    piece_start = idx;
                    piece_chars = 0;
                }
                piece_chars += 1;
                end = idx + next.len_utf8();
                chars.next();
            }

            spans.push(piece_start..end);
            continue;
        }

        if c.is_whitespace() {
            let mut piece_start = start;
            let mut piece_chars = 1;
            let mut end = start + c.len_utf8();

            while let Some(&(idx, next)) = chars.peek() {
                if next == '\n' || !next.is_whitespace() {
                    break;
                }
                // leave a lone space in front of a word for the word itself
                if next == ' ' && text[idx + 1..].chars().next().is_some_and(is_word) {
                    break;
                }
                if piece_chars == WORD_PIECE_CHARS {
                    spans.push(piece_start..idx);
                    piece_start = idx;
                    piece_chars = 0;
                }
                piece_chars += 1;
                end = idx + next.len_utf8();
                chars.next();
            }

            spans.push(piece_start..end);
            continue;
        }

        spans.push(start..start + c.len_utf8());
    }

    spans
}

/// Number of tokens in `text`.
pub fn count(text: &str) -> usize {
    tokenize(text).len()
}

/// Longest prefix of `text` holding at most `max_tokens` tokens.
pub fn truncate(text: &str, max_tokens: usize) -> &str {
    let spans = tokenize(text);
    if spans.len() <= max_tokens {
        return text;
    }
    match max_tokens {
        0 => "",
        n => &text[..spans[n - 1].end],
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
