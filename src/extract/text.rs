//! Text normalization, token estimation and prompt formatting.

use crate::extract::types::ExtractedText;
use crate::store::Creator;
use regex::Regex;
use std::sync::LazyLock;

/// Full text beyond this many characters is cut before prompting.
pub const MAX_FULL_TEXT_CHARS: usize = 50_000;

pub const TRUNCATION_MARKER: &str = "\n\n...(content truncated)";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

// ASCII word characters, whitespace, CJK ideographs and common punctuation
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[^A-Za-z0-9_\s\x{4e00}-\x{9fa5}.,;:!?()\[\]{}"'-]"#).expect("valid regex")
});

static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").expect("valid regex"));

/// Normalize raw extracted text: collapse whitespace, strip characters
/// outside the printable/CJK/punctuation set, collapse blank-line runs.
pub fn clean_text(raw: &str) -> String {
    let collapsed = WHITESPACE.replace_all(raw, " ");
    let stripped = DISALLOWED.replace_all(&collapsed, "");
    let compact = BLANK_RUNS.replace_all(&stripped, "\n\n");
    compact.trim().to_string()
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Rough token count: 1.5 CJK characters or 4 other characters per token.
pub fn estimate_tokens(text: &str) -> u64 {
    let (cjk, other) = text.chars().fold((0u64, 0u64), |(cjk, other), c| {
        if is_cjk(c) { (cjk + 1, other) } else { (cjk, other + 1) }
    });
    (cjk as f64 / 1.5 + other as f64 / 4.0).ceil() as u64
}

/// First 4-digit run in a free-text date.
pub fn extract_year(date: &str) -> Option<String> {
    YEAR.find(date).map(|m| m.as_str().to_string())
}

/// "First Last" names joined by ", ".
pub fn format_authors(creators: &[Creator]) -> String {
    creators
        .iter()
        .map(|c| format!("{} {}", c.first_name.trim(), c.last_name.trim()).trim().to_string())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Cut `text` to at most `max_chars` characters, appending the truncation
/// marker when anything was removed.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}{}", &text[..byte_index], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Assemble the labeled document handed to the model.
pub fn format_for_analysis(extracted: &ExtractedText) -> String {
    let mut sections = vec!["# Document Information".to_string()];

    let mut info = Vec::new();
    if !extracted.title.is_empty() {
        info.push(format!("**Title**: {}", extracted.title));
    }
    if !extracted.authors.is_empty() {
        info.push(format!("**Authors**: {}", extracted.authors));
    }
    if !extracted.year.is_empty() {
        info.push(format!("**Year**: {}", extracted.year));
    }
    if let Some(publication) = extracted.publication.as_deref().filter(|p| !p.is_empty()) {
        info.push(format!("**Publication**: {}", publication));
    }
    if let Some(doi) = extracted.doi.as_deref().filter(|d| !d.is_empty()) {
        info.push(format!("**DOI**: {}", doi));
    }
    if !extracted.keywords.is_empty() {
        info.push(format!("**Keywords**: {}", extracted.keywords.join(", ")));
    }
    sections.push(info.join("\n"));

    if !extracted.abstract_text.is_empty() {
        sections.push(format!("## Abstract\n{}", extracted.abstract_text));
    }

    if let Some(full_text) = extracted.full_text.as_deref().filter(|t| !t.is_empty()) {
        sections.push(format!(
            "## Full Text\n{}",
            truncate_chars(full_text, MAX_FULL_TEXT_CHARS)
        ));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens("测试测试"), 3);
        assert_eq!(estimate_tokens("test"), 1);
        assert_eq!(estimate_tokens(""), 0);
        // 2 CJK (1.33) + 5 other (1.25) = 2.58
        assert_eq!(estimate_tokens("测试 test"), 3);
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Hello \n\n\n  world\t!  "), "Hello world !");
        assert_eq!(clean_text("a\u{0000}b\u{FFFD}c"), "abc");
        assert_eq!(clean_text("结果 (p<0.05)"), "结果 (p0.05)");
        assert_eq!(clean_text("x = [1, 2]; \"ok\" - 'y'"), "x  [1, 2]; \"ok\" - 'y'");
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("March 2019").as_deref(), Some("2019"));
        assert_eq!(extract_year("2021-05-01").as_deref(), Some("2021"));
        assert_eq!(extract_year("n.d."), None);
    }

    #[test]
    fn test_format_authors() {
        let creators = vec![
            Creator::new("Ada", "Lovelace"),
            Creator::new("", "Turing"),
            Creator::new("", ""),
        ];
        assert_eq!(format_authors(&creators), "Ada Lovelace, Turing");
    }

    #[test]
    fn test_truncation_is_marked() {
        let long = "a".repeat(MAX_FULL_TEXT_CHARS + 10);
        let cut = truncate_chars(&long, MAX_FULL_TEXT_CHARS);
        assert!(cut.ends_with("...(content truncated)"));
        assert_eq!(cut.chars().filter(|c| *c == 'a').count(), MAX_FULL_TEXT_CHARS);

        let cjk = "测".repeat(5);
        assert_eq!(truncate_chars(&cjk, 3), format!("测测测{}", TRUNCATION_MARKER));
        assert_eq!(truncate_chars("short", 10), "short");
    }

    #[test]
    fn test_format_for_analysis_sections() {
        let extracted = ExtractedText {
            title: "Deep Learning".to_string(),
            authors: "Yann LeCun".to_string(),
            year: "2015".to_string(),
            abstract_text: "A review.".to_string(),
            keywords: vec!["ml".to_string(), "review".to_string()],
            full_text: Some("Body text".to_string()),
            doi: Some("10.1038/nature14539".to_string()),
            ..Default::default()
        };

        let formatted = format_for_analysis(&extracted);
        assert!(formatted.starts_with("# Document Information"));
        assert!(formatted.contains("**Title**: Deep Learning"));
        assert!(formatted.contains("**Keywords**: ml, review"));
        assert!(formatted.contains("**DOI**: 10.1038/nature14539"));
        let abstract_pos = formatted.find("## Abstract").unwrap();
        let full_pos = formatted.find("## Full Text").unwrap();
        assert!(abstract_pos < full_pos);
        assert!(!formatted.contains("**Publication**"));
    }
}
