//! Text sanitization: markup stripping followed by HTML escaping.

use chrono::{DateTime, Utc};

/// Layout of the timestamp appended to processed text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Copy)]
enum State {
    Text,
    Tag { quote: Option<char> },
    Comment,
}

/// Remove markup-like tags from `input`.
///
/// A `<` followed by whitespace (or ending the input) is kept as text.
/// `<!-- ... -->` comments are dropped whole, and quoted attribute values may
/// contain `>`. An unterminated tag swallows the rest of the input.
pub fn strip_tags(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut state = State::Text;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match state {
            State::Text => {
                if c == '<' {
                    match chars.get(i + 1) {
                        None => out.push(c),
                        Some(next) if next.is_whitespace() => out.push(c),
                        Some(_) if starts_with(&chars[i..], "<!--") => {
                            state = State::Comment;
                            i += 4;
                            continue;
                        }
                        Some(_) => state = State::Tag { quote: None },
                    }
                } else {
                    out.push(c);
                }
            }
            State::Tag { quote: Some(q) } => {
                if c == q {
                    state = State::Tag { quote: None };
                }
            }
            State::Tag { quote: None } => match c {
                '"' | '\'' => state = State::Tag { quote: Some(c) },
                '>' => state = State::Text,
                _ => {}
            },
            State::Comment => {
                if starts_with(&chars[i..], "-->") {
                    state = State::Text;
                    i += 3;
                    continue;
                }
            }
        }
        i += 1;
    }

    out
}

fn starts_with(chars: &[char], pat: &str) -> bool {
    let mut it = chars.iter();
    pat.chars().all(|p| it.next() == Some(&p))
}

/// Escape the characters that are structurally significant in HTML text and
/// attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn sanitize(raw: &str) -> String {
    escape_html(&strip_tags(raw))
}

/// Sanitize `raw` and append the processing stamp for `at`.
pub fn transform(raw: &str, at: DateTime<Utc>) -> String {
    format!(
        "{} [Processed at: {}]",
        sanitize(raw),
        at.format(TIMESTAMP_FORMAT)
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn strips_simple_tags() {
        assert_eq!(strip_tags("<b>hi</b>"), "hi");
        assert_eq!(strip_tags("plain text"), "plain text");
    }

    #[test]
    fn script_payload_loses_markup() {
        let out = sanitize("<script>alert(1)</script>");
        assert_eq!(out, "alert(1)");
        assert!(!out.contains('<') && !out.contains('>'));
    }

    #[test]
    fn quoted_attribute_may_contain_gt() {
        assert_eq!(strip_tags(r#"<a href="x>y" title='>'>link</a>"#), "link");
    }

    #[test]
    fn comments_are_removed() {
        assert_eq!(strip_tags("a<!-- <b>hidden</b> -->b"), "ab");
    }

    #[test]
    fn lone_angle_brackets_are_escaped() {
        assert_eq!(sanitize("a < b"), "a &lt; b");
        assert_eq!(sanitize("5 > 3"), "5 &gt; 3");
        assert_eq!(sanitize("trailing <"), "trailing &lt;");
    }

    #[test]
    fn unterminated_tag_swallows_rest() {
        assert_eq!(strip_tags("keep <b unclosed"), "keep ");
    }

    #[test]
    fn escapes_quotes_and_ampersand() {
        assert_eq!(
            sanitize(r#"Tom & "Jerry" 's"#),
            "Tom &amp; &quot;Jerry&quot; &#039;s"
        );
    }

    #[test]
    fn escaped_output_never_contains_raw_brackets() {
        for input in ["<<b>>", "<img src=x onerror=alert(1)>", "1 <2> 3", "<<<"] {
            let out = sanitize(input);
            assert!(!out.contains('<'), "{input:?} -> {out:?}");
            assert!(!out.contains('>'), "{input:?} -> {out:?}");
        }
    }

    #[test]
    fn transform_appends_stamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            transform("<b>hi</b>", at),
            "hi [Processed at: 2024-03-09 14:05:07]"
        );
    }
}
