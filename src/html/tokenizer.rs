use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    /// Raw value as written, entities left encoded.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    StartTag {
        name: String,
        attrs: Vec<Attribute>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Text(&'a str),
    Comment(&'a str),
    Doctype(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned<'a> {
    pub token: Token<'a>,
    pub span: Range<usize>,
}

/// Elements whose content runs verbatim until the matching end tag.
const RAW_TEXT: &[&str] = &["script", "style", "textarea"];

/// Byte-oriented HTML tokenizer. Every token carries its span in the source.
pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    raw_until: Option<String>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            raw_until: None,
        }
    }

    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    fn text_until_next_tag(&mut self, from: usize) -> Spanned<'a> {
        let start = self.pos;
        let end = self.src[from..]
            .find('<')
            .map(|i| from + i)
            .unwrap_or(self.src.len());
        self.pos = end;
        Spanned {
            token: Token::Text(&self.src[start..end]),
            span: start..end,
        }
    }

    fn markup(&mut self) -> Option<Spanned<'a>> {
        let start = self.pos;
        let rest = &self.src[start..];
        let bytes = self.bytes();

        if rest.starts_with("<!--") {
            let (body_end, end) = match rest[4..].find("-->") {
                Some(i) => (start + 4 + i, start + 4 + i + 3),
                None => (self.src.len(), self.src.len()),
            };
            self.pos = end;
            return Some(Spanned {
                token: Token::Comment(&self.src[start + 4..body_end]),
                span: start..end,
            });
        }

        if rest.starts_with("<!") || rest.starts_with("<?") {
            let close = rest.find('>')?;
            self.pos = start + close + 1;
            return Some(Spanned {
                token: Token::Doctype(&self.src[start + 2..start + close]),
                span: start..self.pos,
            });
        }

        if rest.starts_with("</") {
            let name_start = start + 2;
            if !bytes.get(name_start)?.is_ascii_alphabetic() {
                return None;
            }
            let name_end = scan_name(bytes, name_start);
            let close = self.src[name_end..].find('>')? + name_end;
            self.pos = close + 1;
            return Some(Spanned {
                token: Token::EndTag {
                    name: self.src[name_start..name_end].to_ascii_lowercase(),
                },
                span: start..self.pos,
            });
        }

        if !bytes.get(start + 1)?.is_ascii_alphabetic() {
            return None;
        }
        let name_end = scan_name(bytes, start + 1);
        let name = self.src[start + 1..name_end].to_ascii_lowercase();
        let mut attrs = Vec::new();
        let mut i = name_end;
        let self_closing;

        loop {
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            // Truncated tag: let the caller treat the remainder as text.
            let b = *bytes.get(i)?;
            if b == b'>' {
                self_closing = false;
                i += 1;
                break;
            }
            if b == b'/' {
                if bytes.get(i + 1) == Some(&b'>') {
                    self_closing = true;
                    i += 2;
                    break;
                }
                i += 1;
                continue;
            }

            let attr_start = i;
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && !matches!(bytes[i], b'=' | b'>' | b'/')
            {
                i += 1;
            }
            if i == attr_start {
                i += 1;
                continue;
            }
            let attr_name = self.src[attr_start..i].to_ascii_lowercase();

            let mut j = i;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if bytes.get(j) != Some(&b'=') {
                attrs.push(Attribute {
                    name: attr_name,
                    value: None,
                });
                continue;
            }
            j += 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            let quote = *bytes.get(j)?;
            let value = if quote == b'"' || quote == b'\'' {
                let close = self.src[j + 1..].find(quote as char)? + j + 1;
                i = close + 1;
                &self.src[j + 1..close]
            } else {
                let mut k = j;
                while k < bytes.len() && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                    k += 1;
                }
                i = k;
                &self.src[j..k]
            };
            attrs.push(Attribute {
                name: attr_name,
                value: Some(value.to_string()),
            });
        }

        self.pos = i;
        if !self_closing && RAW_TEXT.contains(&name.as_str()) {
            self.raw_until = Some(name.clone());
        }
        Some(Spanned {
            token: Token::StartTag {
                name,
                attrs,
                self_closing,
            },
            span: start..i,
        })
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Spanned<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(name) = self.raw_until.take() {
            let end = find_ignore_case(self.src, self.pos, &format!("</{}", name))
                .unwrap_or(self.src.len());
            if end > self.pos {
                let start = self.pos;
                self.pos = end;
                return Some(Spanned {
                    token: Token::Text(&self.src[start..end]),
                    span: start..end,
                });
            }
        }

        if self.pos >= self.src.len() {
            return None;
        }
        if self.bytes()[self.pos] == b'<' {
            if let Some(token) = self.markup() {
                return Some(token);
            }
            return Some(self.text_until_next_tag(self.pos + 1));
        }
        Some(self.text_until_next_tag(self.pos))
    }
}

fn scan_name(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'-' | b':')) {
        i += 1;
    }
    i
}

fn find_ignore_case(hay: &str, from: usize, needle: &str) -> Option<usize> {
    let hay = hay.as_bytes();
    let needle = needle.as_bytes();
    if needle.len() > hay.len() {
        return None;
    }
    (from..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token<'_>> {
        Tokenizer::new(src).map(|s| s.token).collect()
    }

    #[test]
    fn start_tag_with_mixed_attributes() {
        let toks = tokens(r#"<div class="a b" data-x='1' hidden id=main>"#);
        let Token::StartTag { name, attrs, self_closing } = &toks[0] else {
            panic!("expected start tag, got {:?}", toks[0]);
        };
        assert_eq!(name, "div");
        assert!(!self_closing);
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs[0].value.as_deref(), Some("a b"));
        assert_eq!(attrs[1].value.as_deref(), Some("1"));
        assert_eq!(attrs[2].value, None);
        assert_eq!(attrs[3].value.as_deref(), Some("main"));
    }

    #[test]
    fn braces_and_gt_inside_attribute_values() {
        let toks = tokens(r#"<a title="x > y {z}">t</a>"#);
        assert_eq!(toks.len(), 3);
        assert_eq!(toks[1], Token::Text("t"));
    }

    #[test]
    fn style_content_is_raw() {
        let toks = tokens("<style>.a > p { color: red }</style><p>x</p>");
        assert_eq!(toks[1], Token::Text(".a > p { color: red }"));
        assert_eq!(toks[2], Token::EndTag { name: "style".into() });
    }

    #[test]
    fn truncated_tag_becomes_text() {
        let toks = tokens("<p>done</p><p class=\"x");
        assert_eq!(toks.last(), Some(&Token::Text("<p class=\"x")));
    }

    #[test]
    fn spans_cover_source() {
        let src = "<!-- c --><p>a &amp; b</p>";
        let spans: Vec<_> = Tokenizer::new(src).map(|s| s.span).collect();
        assert_eq!(spans, vec![0..10, 10..13, 13..22, 22..26]);
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        let toks = tokens("a < b");
        assert_eq!(toks, vec![Token::Text("a "), Token::Text("< b")]);
    }
}
