//! Markdown-to-narration text conversion.

use std::sync::LazyLock;

use regex::Regex;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect("markdown pattern must compile"));
    };
}

pattern!(FENCED_CODE, r"```[\s\S]*?```");
pattern!(HEADER, r"(?m)^[ \t]*#{1,6}\s+");
pattern!(HORIZONTAL_RULE, r"(?m)^[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*$");
pattern!(BOLD_STARS, r"\*\*(.*?)\*\*");
pattern!(BOLD_UNDERSCORES, r"__(.*?)__");
pattern!(ITALIC_STAR, r"\*(.*?)\*");
pattern!(ITALIC_UNDERSCORE, r"_(.*?)_");
pattern!(IMAGE, r"!\[[^\]]*\]\([^)]+\)");
pattern!(LINK, r"\[([^\]]+)\]\([^)]+\)");
pattern!(INLINE_CODE, r"`([^`]+)`");
pattern!(BLOCKQUOTE, r"(?m)^[ \t]*>\s+");
pattern!(BULLET, r"(?m)^[ \t]*[-*+]\s+");
pattern!(ORDERED, r"(?m)^[ \t]*\d+\.\s+");

/// Strip markdown formatting and pictographs, producing plain text for speech.
///
/// Fenced code blocks and images are dropped entirely; emphasis, links and
/// inline code keep their inner text. All whitespace runs collapse to a single
/// space. Text that is not valid markdown passes through unchanged.
pub fn strip_markdown(text: &str) -> String {
    let text = FENCED_CODE.replace_all(text, "");
    let text = HEADER.replace_all(&text, "");
    // Rules go before emphasis, otherwise `***` reads as an empty italic span.
    let text = HORIZONTAL_RULE.replace_all(&text, "");
    let text = BOLD_STARS.replace_all(&text, "$1");
    let text = BOLD_UNDERSCORES.replace_all(&text, "$1");
    let text = ITALIC_STAR.replace_all(&text, "$1");
    let text = ITALIC_UNDERSCORE.replace_all(&text, "$1");
    let text = IMAGE.replace_all(&text, "");
    let text = LINK.replace_all(&text, "$1");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = BLOCKQUOTE.replace_all(&text, "");
    let text = BULLET.replace_all(&text, "");
    let text = ORDERED.replace_all(&text, "");

    let text: String = text.chars().filter(|&c| !is_pictograph(c)).collect();
    collapse_whitespace(&text)
}

/// Emoji, pictograph and symbol blocks that speech engines read out literally
/// (or choke on), plus variation selectors and the zero-width joiner.
fn is_pictograph(c: char) -> bool {
    matches!(
        c,
        '\u{1F600}'..='\u{1F64F}'
            | '\u{1F300}'..='\u{1F5FF}'
            | '\u{1F680}'..='\u{1F6FF}'
            | '\u{1F1E0}'..='\u{1F1FF}'
            | '\u{2600}'..='\u{26FF}'
            | '\u{2700}'..='\u{27BF}'
            | '\u{1F900}'..='\u{1F9FF}'
            | '\u{1FA00}'..='\u{1FA6F}'
            | '\u{1FA70}'..='\u{1FAFF}'
            | '\u{2300}'..='\u{23FF}'
            | '\u{FE00}'..='\u{FE0F}'
            | '\u{1F004}'
            | '\u{1F0CF}'
            | '\u{200D}'
    )
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
