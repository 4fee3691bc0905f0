use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref URL: Regex = Regex::new(r"https?://\S+").unwrap();
    static ref ANGLE: Regex = Regex::new(r"[<>]").unwrap();
    static ref DOUBLE_QUOTES: Regex = Regex::new("[\u{201C}\u{201D}]").unwrap();
    static ref SINGLE_QUOTES: Regex = Regex::new("[\u{2018}\u{2019}]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Cleans a script before it is sent to a speech engine: links are dropped,
/// markup brackets removed, typographic quotes flattened and whitespace
/// collapsed.
pub fn format_for_speech(text: &str) -> String {
    let text = URL.replace_all(text, "");
    let text = ANGLE.replace_all(&text, "");
    let text = DOUBLE_QUOTES.replace_all(&text, "\"");
    let text = SINGLE_QUOTES.replace_all(&text, "'");
    let text = WHITESPACE.replace_all(&text, " ");
    text.trim().to_string()
}

pub fn escape_ssml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_for_speech() {
        let script = "Read more at https://example.com/story?id=1 now.\n\n  <b>Markets</b> \u{201C}rally\u{201D} and it\u{2019}s   fine";
        assert_eq!(
            format_for_speech(script),
            "Read more at now. bMarkets/b \"rally\" and it's fine"
        );
        assert_eq!(format_for_speech("   "), "");
    }

    #[test]
    fn test_escape_ssml() {
        assert_eq!(
            escape_ssml("AT&T <says> \"hi\" it's"),
            "AT&amp;T &lt;says&gt; &quot;hi&quot; it&apos;s"
        );
    }
}
