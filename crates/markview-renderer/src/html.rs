//! Streaming HTML tokenizer and small HTML utilities.
//!
//! Note content is untrusted and frequently malformed, so the tokenizer
//! here never fails: unclosed tags, stray close tags and half-written
//! markup all degrade to sensible token sequences. Consumers implement
//! [`HtmlVisitor`], three callbacks driven in document order, and keep
//! their own tag stack for structure.

use std::fmt::Write;

/// Visitor driven by [`walk_html`].
pub trait HtmlVisitor {
    /// An opening tag. `name` is lowercased; attribute values are
    /// entity-decoded. `self_closing` is true for `<br/>`-style tags.
    fn open_tag(&mut self, name: &str, attrs: &[(String, String)], self_closing: bool);
    /// A text run, exactly as written in the source (entities intact).
    fn text(&mut self, text: &str);
    /// A closing tag. May arrive without a matching open.
    fn close_tag(&mut self, name: &str);
}

/// Element names that never carry content and render self-closed.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Whether `name` is a void (self-closing) element.
#[must_use]
pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

// Elements whose content is raw text up to the matching close tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "xmp", "plaintext"];

/// Drive `visitor` over `html`.
///
/// Comments and doctype declarations are skipped. `<script>`/`<style>`
/// content is delivered as a single text run so embedded `<` characters
/// cannot desynchronize the stream.
pub fn walk_html(html: &str, visitor: &mut dyn HtmlVisitor) {
    let bytes = html.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        let Some(lt) = html[pos..].find('<').map(|i| pos + i) else {
            visitor.text(&html[pos..]);
            break;
        };
        if lt > pos {
            visitor.text(&html[pos..lt]);
        }

        let rest = &html[lt..];
        if rest.starts_with("<!--") {
            pos = rest.find("-->").map_or(html.len(), |i| lt + i + 3);
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            pos = rest.find('>').map_or(html.len(), |i| lt + i + 1);
        } else if rest.starts_with("</") {
            match rest.find('>') {
                Some(end) => {
                    let name = rest[2..end].trim().to_ascii_lowercase();
                    if !name.is_empty() {
                        visitor.close_tag(&name);
                    }
                    pos = lt + end + 1;
                }
                None => {
                    // Truncated close tag: emit as text and stop.
                    visitor.text(rest);
                    pos = html.len();
                }
            }
        } else if rest.len() > 1 && rest.as_bytes()[1].is_ascii_alphabetic() {
            match parse_open_tag(rest) {
                Some((name, attrs, self_closing, consumed)) => {
                    pos = lt + consumed;
                    visitor.open_tag(&name, &attrs, self_closing);
                    if !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                        pos = emit_raw_text(html, pos, &name, visitor);
                    }
                }
                None => {
                    // Truncated open tag.
                    visitor.text(rest);
                    pos = html.len();
                }
            }
        } else {
            // Bare '<' that starts no tag: literal text.
            visitor.text("<");
            pos = lt + 1;
        }
    }
}

/// Deliver raw-text element content, returning the position after the
/// close tag (or end of input when unterminated).
fn emit_raw_text(html: &str, start: usize, name: &str, visitor: &mut dyn HtmlVisitor) -> usize {
    let close = format!("</{name}");
    let lower = html[start..].to_ascii_lowercase();
    if let Some(i) = lower.find(&close) {
        if i > 0 {
            visitor.text(&html[start..start + i]);
        }
        let after = start + i + close.len();
        visitor.close_tag(name);
        html[after..]
            .find('>')
            .map_or(html.len(), |j| after + j + 1)
    } else {
        if start < html.len() {
            visitor.text(&html[start..]);
        }
        html.len()
    }
}

/// Parse one opening tag at the start of `input` (which begins with `<`).
/// Returns `(name, attrs, self_closing, bytes_consumed)`.
#[allow(clippy::type_complexity)]
fn parse_open_tag(input: &str) -> Option<(String, Vec<(String, String)>, bool, usize)> {
    let bytes = input.as_bytes();
    let mut i = 1;

    let name_start = i;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'>' | b'/') {
        i += 1;
    }
    let name = input[name_start..i].to_ascii_lowercase();

    let mut attrs = Vec::new();
    let mut self_closing = false;

    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        match bytes[i] {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                self_closing = true;
                i += 1;
            }
            _ => {
                let attr_start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && !matches!(bytes[i], b'=' | b'>' | b'/')
                {
                    i += 1;
                }
                let attr_name = input[attr_start..i].to_ascii_lowercase();
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
                let mut value = String::new();
                if i < bytes.len() && bytes[i] == b'=' {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
                        let quote = bytes[i];
                        i += 1;
                        let value_start = i;
                        while i < bytes.len() && bytes[i] != quote {
                            i += 1;
                        }
                        value = decode_entities(&input[value_start..i]);
                        if i < bytes.len() {
                            i += 1; // closing quote
                        }
                    } else {
                        let value_start = i;
                        while i < bytes.len()
                            && !bytes[i].is_ascii_whitespace()
                            && bytes[i] != b'>'
                        {
                            i += 1;
                        }
                        value = decode_entities(&input[value_start..i]);
                    }
                }
                if !attr_name.is_empty() {
                    attrs.push((attr_name, value));
                }
            }
        }
    }

    if name.is_empty() {
        return None;
    }
    Some((name, attrs, self_closing, i))
}

/// Escape text for an HTML text node.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for an HTML attribute value (either quote style).
#[must_use]
pub fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Decode the basic named entities and numeric character references.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let Some(semi) = rest[..rest.len().min(12)].find(';') else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{00a0}'),
            s if s.starts_with("#x") || s.starts_with("#X") => {
                u32::from_str_radix(&s[2..], 16).ok().and_then(char::from_u32)
            }
            s if s.starts_with('#') => s[1..].parse::<u32>().ok().and_then(char::from_u32),
            _ => None,
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Result of [`split_html`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitHtml {
    /// Content of the leading `<style>` block, if any.
    pub css: String,
    /// Everything else.
    pub html: String,
}

/// Split a rendered document into its leading `<style>` block and body.
///
/// An input without a leading `<style>` block comes back whole as `html`
/// with empty `css`.
///
/// # Example
///
/// ```
/// use markview_renderer::html::split_html;
///
/// let split = split_html("<style>b{font-weight:bold;}</style>\n<div>hello</div>");
/// assert_eq!(split.css, "b{font-weight:bold;}");
/// assert_eq!(split.html, "\n<div>hello</div>");
/// ```
#[must_use]
pub fn split_html(html: &str) -> SplitHtml {
    const OPEN: &str = "<style>";
    const CLOSE: &str = "</style>";
    if let Some(body) = html.strip_prefix(OPEN) {
        if let Some(end) = body.find(CLOSE) {
            return SplitHtml {
                css: body[..end].to_owned(),
                html: body[end + CLOSE.len()..].to_owned(),
            };
        }
    }
    SplitHtml {
        css: String::new(),
        html: html.to_owned(),
    }
}

struct StripVisitor {
    out: String,
    raw_depth: usize,
}

impl HtmlVisitor for StripVisitor {
    fn open_tag(&mut self, name: &str, _attrs: &[(String, String)], self_closing: bool) {
        if RAW_TEXT_ELEMENTS.contains(&name) && !self_closing {
            self.raw_depth += 1;
        }
        // Block-level boundaries become whitespace so words don't fuse.
        if matches!(name, "p" | "div" | "br" | "li" | "tr" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6") {
            self.out.push('\n');
        }
    }

    fn text(&mut self, text: &str) {
        if self.raw_depth == 0 {
            self.out.push_str(&decode_entities(text));
        }
    }

    fn close_tag(&mut self, name: &str) {
        if RAW_TEXT_ELEMENTS.contains(&name) {
            self.raw_depth = self.raw_depth.saturating_sub(1);
        }
    }
}

/// Extract the plain text of an HTML fragment. Script and style content
/// is dropped; entities are decoded.
#[must_use]
pub fn strip_tags(html: &str, collapse_white_spaces: bool) -> String {
    let mut visitor = StripVisitor {
        out: String::new(),
        raw_depth: 0,
    };
    walk_html(html, &mut visitor);
    if collapse_white_spaces {
        let mut collapsed = String::with_capacity(visitor.out.len());
        for word in visitor.out.split_whitespace() {
            if !collapsed.is_empty() {
                collapsed.push(' ');
            }
            collapsed.push_str(word);
        }
        collapsed
    } else {
        visitor.out.trim_matches('\n').to_owned()
    }
}

/// Render an opening tag from parts, escaping attribute values.
pub(crate) fn write_open_tag(
    out: &mut String,
    name: &str,
    attrs: &[(String, String)],
    self_closing: bool,
) {
    out.push('<');
    out.push_str(name);
    for (attr_name, value) in attrs {
        write!(out, " {attr_name}=\"{}\"", escape_attr(value)).expect("write to String");
    }
    if self_closing {
        out.push('/');
    }
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl HtmlVisitor for Recorder {
        fn open_tag(&mut self, name: &str, attrs: &[(String, String)], self_closing: bool) {
            let attrs: Vec<String> = attrs
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            let suffix = if self_closing { "/" } else { "" };
            self.events
                .push(format!("open:{name}[{}]{suffix}", attrs.join(",")));
        }
        fn text(&mut self, text: &str) {
            self.events.push(format!("text:{text}"));
        }
        fn close_tag(&mut self, name: &str) {
            self.events.push(format!("close:{name}"));
        }
    }

    fn record(html: &str) -> Vec<String> {
        let mut recorder = Recorder::default();
        walk_html(html, &mut recorder);
        recorder.events
    }

    #[test]
    fn test_simple_element() {
        assert_eq!(
            record("<p>Hello</p>"),
            vec!["open:p[]", "text:Hello", "close:p"]
        );
    }

    #[test]
    fn test_attributes_and_entities() {
        assert_eq!(
            record(r#"<a href="a&amp;b" title='x'>t</a>"#),
            vec!["open:a[href=a&b,title=x]", "text:t", "close:a"]
        );
    }

    #[test]
    fn test_unquoted_and_bare_attributes() {
        assert_eq!(
            record("<input type=checkbox checked>"),
            vec!["open:input[type=checkbox,checked=]"]
        );
    }

    #[test]
    fn test_self_closing() {
        assert_eq!(record("<br/>"), vec!["open:br[]/"]);
        assert_eq!(record("<img src=x />"), vec!["open:img[src=x]/"]);
    }

    #[test]
    fn test_stray_close_and_bare_lt() {
        assert_eq!(
            record("a </b> 1 < 2"),
            vec!["text:a ", "close:b", "text: 1 ", "text:<", "text: 2"]
        );
    }

    #[test]
    fn test_comment_and_doctype_skipped() {
        assert_eq!(
            record("<!doctype html><!-- c --><p>x</p>"),
            vec!["open:p[]", "text:x", "close:p"]
        );
    }

    #[test]
    fn test_script_raw_text() {
        assert_eq!(
            record("<script>if (a<b) {}</script>after"),
            vec![
                "open:script[]",
                "text:if (a<b) {}",
                "close:script",
                "text:after"
            ]
        );
    }

    #[test]
    fn test_unterminated_script() {
        assert_eq!(
            record("<script>alert(1)"),
            vec!["open:script[]", "text:alert(1)"]
        );
    }

    #[test]
    fn test_truncated_tag_is_text() {
        assert_eq!(record("text <a href="), vec!["text:text ", "text:<a href="]);
    }

    #[test]
    fn test_split_html_with_style() {
        let split = split_html("<style>b{font-weight:bold;}</style>\n<div>hello</div>");
        assert_eq!(split.css, "b{font-weight:bold;}");
        assert_eq!(split.html, "\n<div>hello</div>");
    }

    #[test]
    fn test_split_html_without_style() {
        let split = split_html("<div>hello</div>");
        assert_eq!(split.css, "");
        assert_eq!(split.html, "<div>hello</div>");
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(
            strip_tags("<p>Hello <b>world</b></p><script>x</script>", false),
            "Hello world"
        );
    }

    #[test]
    fn test_strip_tags_collapse() {
        assert_eq!(
            strip_tags("<p>a</p>\n\n<p>  b   c </p>", true),
            "a b c"
        );
    }

    #[test]
    fn test_decode_entities_numeric() {
        assert_eq!(decode_entities("&#65;&#x42;&unknown;"), "AB&unknown;");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a<b&\"c\""), "a&lt;b&amp;&quot;c&quot;");
    }
}
