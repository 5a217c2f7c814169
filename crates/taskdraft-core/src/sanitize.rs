//! Removal of formatting artifacts from raw model text.
//!
//! Models asked for bare JSON still wrap it in Markdown code fences often
//! enough that the fences have to go before decoding. Nothing else about the
//! text is changed.

const FENCE: &str = "```";

/// Strip every code-fence marker and trim surrounding whitespace.
///
/// An opening fence may carry a language tag (```` ```json ````). A `json`
/// tag is always removed with the fence, even when the payload follows it
/// directly (```` ```json{ ````). Any other tag is removed only when it is
/// followed by whitespace or the end of the text, so ```` ```null``` ````
/// keeps its `null`. Stripping repeats until no fence remains, so
/// `sanitize(sanitize(x)) == sanitize(x)` for every input.
pub fn sanitize(raw: &str) -> String {
    let mut current = strip_fences(raw);
    loop {
        let next = strip_fences(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current.trim().to_owned()
}

/// One left-to-right pass removing fence markers.
fn strip_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(FENCE) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + FENCE.len()..];

        let tag_len = rest.find(|c: char| !is_tag_char(c)).unwrap_or(rest.len());
        if tag_len > 0 {
            let after = &rest[tag_len..];
            let delimited = after.is_empty() || after.starts_with(char::is_whitespace);
            if delimited || is_json_tag(&rest[..tag_len]) {
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-')
}

fn is_json_tag(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("json")
}
