//! Lightweight markup used in assistant replies.
//!
//! Only two constructs are recognised: newlines become line breaks and
//! `**text**` becomes bold. The pass is single and non-recursive, so markers
//! inside a bold run are not interpreted again and a run never crosses a line.

use once_cell::sync::Lazy;
use regex::Regex;

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text { content: String, bold: bool },
    LineBreak,
}

impl Fragment {
    fn plain(content: &str) -> Self {
        Fragment::Text { content: content.to_string(), bold: false }
    }

    fn bold(content: &str) -> Self {
        Fragment::Text { content: content.to_string(), bold: true }
    }
}

pub fn translate(text: &str) -> Vec<Fragment> {
    let normalized = text.replace("\r\n", "\n");
    let mut fragments = Vec::new();

    for (i, line) in normalized.split('\n').enumerate() {
        if i > 0 {
            fragments.push(Fragment::LineBreak);
        }

        let mut last = 0;
        for caps in BOLD.captures_iter(line) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                fragments.push(Fragment::plain(&line[last..whole.start()]));
            }
            fragments.push(Fragment::bold(inner.as_str()));
            last = whole.end();
        }
        if last < line.len() {
            fragments.push(Fragment::plain(&line[last..]));
        }
    }

    fragments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_plain(fragments: &[Fragment]) -> String {
        fragments
            .iter()
            .map(|f| match f {
                Fragment::Text { content, .. } => content.as_str(),
                Fragment::LineBreak => "\n",
            })
            .collect()
    }

    #[test]
    fn test_plain_text_is_untouched() {
        let text = "Mass is at 10am on Sunday * and 8pm on Wednesday.";
        assert_eq!(translate(text), vec![Fragment::plain(text)]);
    }

    #[test]
    fn test_empty_text() {
        assert!(translate("").is_empty());
    }

    #[test]
    fn test_newlines_become_breaks() {
        let fragments = translate("first\r\nsecond\nthird");
        assert_eq!(
            fragments,
            vec![
                Fragment::plain("first"),
                Fragment::LineBreak,
                Fragment::plain("second"),
                Fragment::LineBreak,
                Fragment::plain("third"),
            ]
        );
    }

    #[test]
    fn test_bold_marker() {
        let fragments = translate("Come on **Sunday** at 10h");
        assert_eq!(
            fragments,
            vec![
                Fragment::plain("Come on "),
                Fragment::bold("Sunday"),
                Fragment::plain(" at 10h"),
            ]
        );
    }

    #[test]
    fn test_unmatched_marker_stays_literal() {
        assert_eq!(translate("a **b"), vec![Fragment::plain("a **b")]);
        assert_eq!(translate("****"), vec![Fragment::plain("****")]);
    }

    #[test]
    fn test_bold_does_not_cross_lines() {
        let fragments = translate("**a\nb**");
        assert_eq!(
            fragments,
            vec![Fragment::plain("**a"), Fragment::LineBreak, Fragment::plain("b**")]
        );
    }

    #[test]
    fn test_single_pass_without_nesting() {
        let fragments = translate("**a **b** c**");
        assert_eq!(
            fragments,
            vec![Fragment::bold("a "), Fragment::plain("b"), Fragment::bold(" c")]
        );
    }

    #[test]
    fn test_to_plain_drops_markers() {
        assert_eq!(to_plain(&translate("x **y**\nz")), "x y\nz");
    }
}
