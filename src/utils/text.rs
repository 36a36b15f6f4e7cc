//! Text wrapping for terminal output.
//!
//! Paragraph breaks in model output are meaningful (lists, steps in a
//! recipe), so each input line is wrapped on its own and newlines survive.

const TAB_SIZE: usize = 8;

/// Wrap every line of `text` to at most `width` columns, keeping the
/// original line breaks.
pub fn wrap_text_preserve_newlines(text: &str, width: usize) -> String {
    text.split('\n')
        .map(|line| fill(line, width))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Greedy fill of a single line.
///
/// Tabs expand to 8-column stops and other ASCII whitespace becomes a space.
/// Runs of spaces inside a line are kept. Whitespace is dropped at the end of
/// every output line and at the start of every output line except the first.
/// Hyphenated words may break after a hyphen, and words wider than `width`
/// are cut, preferably just after a hyphen.
pub fn fill(line: &str, width: usize) -> String {
    wrap(line, width).join("\n")
}

/// Same as [`fill`] but returns the individual lines.
pub fn wrap(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut chunks: Vec<Vec<char>> = split_chunks(&normalize_whitespace(line));
    chunks.reverse();

    let mut lines: Vec<String> = Vec::new();

    while !chunks.is_empty() {
        let mut cur_line: Vec<Vec<char>> = Vec::new();
        let mut cur_len = 0usize;

        if !lines.is_empty() && chunks.last().is_some_and(|c| is_blank(c)) {
            chunks.pop();
        }

        while let Some(chunk) = chunks.last() {
            if cur_len + chunk.len() <= width {
                cur_len += chunk.len();
                if let Some(chunk) = chunks.pop() {
                    cur_line.push(chunk);
                }
            } else {
                break;
            }
        }

        if let Some(chunk) = chunks.last_mut() {
            if chunk.len() > width {
                let space_left = width.saturating_sub(cur_len);
                if space_left > 0 {
                    let rest = chunk.split_off(long_word_break(chunk, space_left));
                    cur_len += chunk.len();
                    cur_line.push(std::mem::replace(chunk, rest));
                }
            }
        }

        if cur_line.last().is_some_and(|c| is_blank(c)) {
            cur_line.pop();
        }

        if !cur_line.is_empty() {
            lines.push(cur_line.into_iter().flatten().collect());
        }
    }

    lines
}

fn is_blank(chunk: &[char]) -> bool {
    chunk.iter().all(|c| *c == ' ')
}

/// Where to cut a word that cannot fit on any line: after the last hyphen
/// within `space_left` when something other than hyphens precedes it.
fn long_word_break(chunk: &[char], space_left: usize) -> usize {
    let head = &chunk[..space_left.min(chunk.len())];
    match head.iter().rposition(|&c| c == '-') {
        Some(hyphen) if hyphen > 0 && head[..hyphen].iter().any(|&c| c != '-') => hyphen + 1,
        _ => space_left,
    }
}

// Only ASCII whitespace separates words; NBSP and friends are text.
fn is_wrap_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r')
}

fn is_letter(c: char) -> bool {
    c.is_alphabetic()
}

fn normalize_whitespace(line: &str) -> Vec<char> {
    let mut out = Vec::with_capacity(line.len());
    for c in line.chars() {
        if c == '\t' {
            let pad = TAB_SIZE - (out.len() % TAB_SIZE);
            out.extend(std::iter::repeat(' ').take(pad));
        } else if is_wrap_whitespace(c) {
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

/// Split into alternating runs of spaces and words; words additionally
/// split after an inner hyphen between letters ("pre-workout" -> "pre-",
/// "workout"). Digits do not count, so "123-456" stays whole.
fn split_chunks(chars: &[char]) -> Vec<Vec<char>> {
    let mut chunks: Vec<Vec<char>> = Vec::new();
    let mut current: Vec<char> = Vec::new();

    for (i, &c) in chars.iter().enumerate() {
        let starts_new_run = match current.last() {
            Some(&prev) => (prev == ' ') != (c == ' '),
            None => false,
        };
        if starts_new_run {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(c);

        if c == '-' && hyphen_break_after(chars, i) {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// A hyphen at `i` is a break point when it follows two letters (or a
/// letter-hyphen-letter sequence) and is followed by a letter and then a
/// letter or a hyphen-letter pair.
fn hyphen_break_after(chars: &[char], i: usize) -> bool {
    let at = |j: usize| chars.get(j).copied();
    let letter_at = |j: usize| at(j).is_some_and(is_letter);

    let before = i >= 2
        && letter_at(i - 1)
        && (letter_at(i - 2) || (i >= 3 && at(i - 2) == Some('-') && letter_at(i - 3)));
    let after = letter_at(i + 1)
        && (letter_at(i + 2) || (at(i + 2) == Some('-') && letter_at(i + 3)));

    before && after
}
