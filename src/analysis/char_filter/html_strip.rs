//! Markup stripping char filter.
//!
//! Removes HTML/XML tags, comments and the bodies of `<script>` and `<style>`
//! elements, and decodes character entities. Block-level elements become a
//! line break so words on either side stay separate, while inline elements
//! vanish entirely (`<b>foo</b>bar` reads as `foobar`).
//!
//! # Examples
//!
//! ```
//! use repodex::analysis::char_filter::html_strip::HtmlStripCharFilter;
//!
//! let (text, _) = HtmlStripCharFilter::new().filter("<p>Fast &amp; safe</p>");
//! assert_eq!(text, "\nFast & safe\n");
//! ```

use super::Transformation;

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "dd", "details", "div", "dl", "dt",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "head",
    "header", "hr", "html", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table",
    "tbody", "td", "tfoot", "th", "thead", "title", "tr", "ul",
];

const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{00A0}'),
    ("copy", '©'),
    ("reg", '®'),
    ("trade", '™'),
    ("hellip", '…'),
    ("mdash", '—'),
    ("ndash", '–'),
    ("laquo", '«'),
    ("raquo", '»'),
    ("lsquo", '‘'),
    ("rsquo", '’'),
    ("ldquo", '“'),
    ("rdquo", '”'),
    ("middot", '·'),
    ("aacute", 'á'),
    ("agrave", 'à'),
    ("auml", 'ä'),
    ("eacute", 'é'),
    ("egrave", 'è'),
    ("iacute", 'í'),
    ("oacute", 'ó'),
    ("ouml", 'ö'),
    ("uacute", 'ú'),
    ("uuml", 'ü'),
    ("ccedil", 'ç'),
    ("ntilde", 'ñ'),
    ("szlig", 'ß'),
];

/// The longest entity body we attempt to decode (`&#x10FFFF;` and friends).
const MAX_ENTITY_LEN: usize = 10;

/// Strips markup from text ahead of tokenization.
#[derive(Clone, Debug, Default)]
pub struct HtmlStripCharFilter;

impl HtmlStripCharFilter {
    /// Create a new markup stripping filter.
    pub fn new() -> Self {
        HtmlStripCharFilter
    }

    /// Apply this filter to the input text.
    ///
    /// Returns the filtered text and the ordered list of transformations.
    pub fn filter(&self, input: &str) -> (String, Vec<Transformation>) {
        let mut output = String::with_capacity(input.len());
        let mut transformations = Vec::new();
        let bytes = input.as_bytes();
        let mut i = 0;

        while i < input.len() {
            let Some(rel) = input[i..].find(['<', '&']) else {
                output.push_str(&input[i..]);
                break;
            };
            output.push_str(&input[i..i + rel]);
            i += rel;

            let replaced = if bytes[i] == b'<' {
                markup_end(input, i).map(|(end, block)| (end, if block { "\n" } else { "" }))
            } else {
                None
            };

            if let Some((end, replacement)) = replaced {
                let new_start = output.len();
                output.push_str(replacement);
                transformations.push(Transformation::new(i, end, new_start, output.len()));
                i = end;
                continue;
            }

            if bytes[i] == b'&' {
                if let Some((end, decoded)) = decode_entity(input, i) {
                    let new_start = output.len();
                    output.push(decoded);
                    transformations.push(Transformation::new(i, end, new_start, output.len()));
                    i = end;
                    continue;
                }
            }

            // A literal '<' or '&' that does not start markup.
            output.push(bytes[i] as char);
            i += 1;
        }

        (output, transformations)
    }
}

/// Finds where the markup construct starting at `start` ends.
///
/// Returns the end byte offset and whether the construct separates words.
/// `None` means the '<' is literal text.
fn markup_end(input: &str, start: usize) -> Option<(usize, bool)> {
    let rest = &input[start..];

    if rest.starts_with("<!--") {
        let end = rest[4..]
            .find("-->")
            .map(|p| start + 4 + p + 3)
            .unwrap_or(input.len());
        return Some((end, true));
    }

    let bytes = rest.as_bytes();
    let mut j = 1;
    let closing = bytes.get(j) == Some(&b'/');
    if closing {
        j += 1;
    }

    match bytes.get(j) {
        Some(b) if b.is_ascii_alphabetic() => {}
        // Declarations and processing instructions: <!DOCTYPE ..>, <?xml ..?>
        Some(b'!') | Some(b'?') if !closing => {
            let end = tag_close(rest, j)?;
            return Some((start + end, true));
        }
        _ => return None,
    }

    let name_start = j;
    while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'-') {
        j += 1;
    }
    let name = rest[name_start..j].to_ascii_lowercase();
    let tag_end = tag_close(rest, j)?;

    if !closing && (name == "script" || name == "style") {
        let close_tag = format!("</{name}");
        let lower = rest[tag_end..].to_ascii_lowercase();
        let end = match lower.find(&close_tag) {
            Some(p) => {
                let after = tag_end + p + close_tag.len();
                tag_close(rest, after).unwrap_or(rest.len())
            }
            None => rest.len(),
        };
        return Some((start + end, true));
    }

    Some((start + tag_end, BLOCK_ELEMENTS.contains(&name.as_str())))
}

/// Offset just past the '>' closing a tag, skipping quoted attribute values.
fn tag_close(rest: &str, from: usize) -> Option<usize> {
    let bytes = rest.as_bytes();
    let mut quote: Option<u8> = None;
    let mut j = from;
    while j < bytes.len() {
        let b = bytes[j];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(j + 1),
            None if b == b'<' => return None,
            None => {}
        }
        j += 1;
    }
    None
}

/// Decodes the entity starting at `start` (which points at '&').
fn decode_entity(input: &str, start: usize) -> Option<(usize, char)> {
    let rest = &input[start + 1..];
    let semi = rest
        .char_indices()
        .take(MAX_ENTITY_LEN + 1)
        .find(|&(_, c)| c == ';')
        .map(|(p, _)| p)?;
    let body = &rest[..semi];
    let end = start + 1 + semi + 1;

    let decoded = if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        char::from_u32(code)?
    } else {
        NAMED_ENTITIES
            .iter()
            .find(|(name, _)| *name == body)
            .map(|&(_, c)| c)?
    };

    Some((end, decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::char_filter::correct_offset;

    fn strip(input: &str) -> String {
        HtmlStripCharFilter::new().filter(input).0
    }

    #[test]
    fn test_plain_text_untouched() {
        let (text, ts) = HtmlStripCharFilter::new().filter("no markup here");
        assert_eq!(text, "no markup here");
        assert!(ts.is_empty());
    }

    #[test]
    fn test_block_and_inline_tags() {
        assert_eq!(strip("<h1>Title</h1><p>Body</p>"), "\nTitle\n\nBody\n");
        assert_eq!(strip("<b>foo</b>bar"), "foobar");
        assert_eq!(strip("<a href=\"x>y\">link</a>"), "link");
    }

    #[test]
    fn test_script_and_comments_removed() {
        assert_eq!(strip("a<script>var x = '<b>';</script>b"), "a\nb");
        assert_eq!(strip("a<STYLE>p {}</STYLE>b"), "a\nb");
        assert_eq!(strip("a<!-- hidden -->b"), "a\nb");
        assert_eq!(strip("a<!-- never closed"), "a\n");
    }

    #[test]
    fn test_entities() {
        assert_eq!(strip("Fish &amp; Chips"), "Fish & Chips");
        assert_eq!(strip("caf&eacute; &#65;&#x42;"), "café AB");
        assert_eq!(strip("AT&T &bogus; & done"), "AT&T &bogus; & done");
    }

    #[test]
    fn test_literal_angle_brackets() {
        assert_eq!(strip("a < b and c > d"), "a < b and c > d");
        assert_eq!(strip("x <= 3"), "x <= 3");
    }

    #[test]
    fn test_offsets_map_back() {
        let input = "<p>Hello <em>big</em> world</p>";
        let (text, ts) = HtmlStripCharFilter::new().filter(input);
        let start = text.find("world").unwrap();
        let end = start + "world".len();
        let raw_start = correct_offset(start, &ts, false);
        let raw_end = correct_offset(end, &ts, true);
        assert_eq!(&input[raw_start..raw_end], "world");

        let start = text.find("big").unwrap();
        let raw_start = correct_offset(start, &ts, false);
        let raw_end = correct_offset(start + 3, &ts, true);
        assert_eq!(&input[raw_start..raw_end], "big");
    }
}
