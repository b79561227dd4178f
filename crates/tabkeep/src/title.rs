//! Window titles derived from document content.
//!
//! The first non-empty line becomes the title, with leading punctuation and
//! markup stripped (`# Heading` → `Heading`, `- item` → `item`). Files that start
//! with a `//` header comment use the comment text instead; if the comment is
//! empty, a file name mentioned in the first few lines wins, then the first
//! non-comment line. Titles are cut to [`MAX_TITLE_CHARS`] characters.

pub const MAX_TITLE_CHARS: usize = 40;

const HEADER_SCAN_LINES: usize = 5;
const FILE_NAME_SUFFIXES: &[&str] = &[".swift", ".txt", ".rs", ".md"];
const EXTRA_LEADING: &str = "／、，。！？；：—…·・“”‘’《》【】（）";

pub fn display_title(content: &str, fallback: &str) -> String {
    let title = derive_title(content).unwrap_or_else(|| fallback.to_string());
    truncate_chars(&title, MAX_TITLE_CHARS)
}

fn derive_title(content: &str) -> Option<String> {
    let lines: Vec<&str> = content
        .split(['\n', '\r'])
        .filter(|l| !l.is_empty())
        .take(11)
        .collect();
    let first = lines.first()?;

    if !first.trim().starts_with("//") {
        return non_empty(strip_leading_punctuation(first));
    }

    let from_comment = strip_leading_punctuation(&first.replace("//", ""));
    if !from_comment.is_empty() {
        return Some(from_comment);
    }

    for line in lines.iter().take(HEADER_SCAN_LINES) {
        let candidate = line.replace("//", "");
        let candidate = candidate.trim();
        if FILE_NAME_SUFFIXES.iter().any(|s| candidate.ends_with(s)) {
            return Some(candidate.to_string());
        }
    }

    lines
        .iter()
        .find(|l| !l.trim().starts_with("//"))
        .and_then(|l| non_empty(strip_leading_punctuation(l)))
}

fn strip_leading_punctuation(s: &str) -> String {
    s.trim()
        .trim_start_matches(|c: char| {
            c.is_whitespace() || c.is_ascii_punctuation() || EXTRA_LEADING.contains(c)
        })
        .to_string()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect()
    } else {
        s.to_string()
    }
}
