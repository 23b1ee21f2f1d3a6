use datafusion::common::plan_err;
use regex::Regex;
use relsparql_common::DFResult;
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;

static TEMPLATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?<escaped>.)|\{(?<column>[^{}]*)\}|(?<text>[^\\{}]+)|(?<invalid>.)")
        .unwrap()
});

/// A part of a [Template].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplatePart {
    Text(String),
    Column(String),
}

/// An R2RML string template such as `http://ex.org/person/{id}`.
///
/// Backslashes escape curly braces (`\{`) and backslashes in the text parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Template {
    source: String,
    parts: Vec<TemplatePart>,
}

impl Template {
    /// Parses a template.
    pub fn parse(source: impl Into<String>) -> DFResult<Self> {
        let source = source.into();
        let mut parts: Vec<TemplatePart> = Vec::new();

        for captures in TEMPLATE_TOKEN.captures_iter(&source) {
            let text = if let Some(escaped) = captures.name("escaped") {
                escaped.as_str()
            } else if let Some(text) = captures.name("text") {
                text.as_str()
            } else if let Some(column) = captures.name("column") {
                if column.as_str().is_empty() {
                    return plan_err!("Empty column reference in template '{source}'.");
                }
                parts.push(TemplatePart::Column(column.as_str().to_owned()));
                continue;
            } else {
                return plan_err!("Unbalanced curly brace in template '{source}'.");
            };

            match parts.last_mut() {
                Some(TemplatePart::Text(last)) => last.push_str(text),
                _ => parts.push(TemplatePart::Text(text.to_owned())),
            }
        }

        Ok(Self { source, parts })
    }

    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// The referenced columns in order of appearance.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            TemplatePart::Column(column) => Some(column.as_str()),
            TemplatePart::Text(_) => None,
        })
    }

    /// Expands the template. Returns [None] if any referenced column is `NULL`.
    ///
    /// Column values are escaped with [iri_safe] if `escape` is set.
    pub fn expand(
        &self,
        mut lookup: impl FnMut(&str) -> Option<String>,
        escape: bool,
    ) -> Option<String> {
        let mut result = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Text(text) => result.push_str(text),
                TemplatePart::Column(column) => {
                    let value = lookup(column)?;
                    if escape {
                        result.push_str(&iri_safe(&value));
                    } else {
                        result.push_str(&value);
                    }
                }
            }
        }
        Some(result)
    }

    /// Checks whether the template could produce `value`, considering only its text parts.
    pub fn can_produce(&self, value: &str) -> bool {
        let mut rest = value;
        let mut anchored = true;
        let last_index = self.parts.len().saturating_sub(1);

        for (index, part) in self.parts.iter().enumerate() {
            match part {
                TemplatePart::Column(_) => anchored = false,
                TemplatePart::Text(text) if anchored => match rest.strip_prefix(text.as_str()) {
                    Some(stripped) => rest = stripped,
                    None => return false,
                },
                TemplatePart::Text(text) if index == last_index => return rest.ends_with(text.as_str()),
                TemplatePart::Text(text) => match rest.find(text.as_str()) {
                    Some(position) => {
                        rest = &rest[position + text.len()..];
                        anchored = true;
                    }
                    None => return false,
                },
            }
        }

        !anchored || rest.is_empty()
    }
}

impl Display for Template {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Percent-encodes every character that is not an IRI unreserved character (R2RML IRI-safe
/// version of a value).
pub fn iri_safe(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        if is_iri_unreserved(c) {
            result.push(c);
        } else {
            let mut buffer = [0u8; 4];
            for byte in c.encode_utf8(&mut buffer).as_bytes() {
                result.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    result
}

/// Reverses [iri_safe]. Returns [None] if `value` is not the IRI-safe version of any string.
pub fn iri_unsafe(value: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '%' {
            let high = chars.next()?.to_digit(16)?;
            let low = chars.next()?.to_digit(16)?;
            bytes.push(u8::try_from(high * 16 + low).ok()?);
        } else if is_iri_unreserved(c) {
            let mut buffer = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
        } else {
            return None;
        }
    }

    let decoded = String::from_utf8(bytes).ok()?;
    (iri_safe(&decoded) == value).then_some(decoded)
}

/// Whether `c` can be part of the result of [iri_safe].
pub fn appears_in_iri_safe(c: char) -> bool {
    c == '%' || is_iri_unreserved(c)
}

fn is_iri_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~') || is_ucschar(c)
}

fn is_ucschar(c: char) -> bool {
    matches!(u32::from(c),
        0xA0..=0xD7FF
        | 0xF900..=0xFDCF
        | 0xFDF0..=0xFFEF
        | 0x10000..=0x1FFFD
        | 0x20000..=0x2FFFD
        | 0x30000..=0x3FFFD
        | 0x40000..=0x4FFFD
        | 0x50000..=0x5FFFD
        | 0x60000..=0x6FFFD
        | 0x70000..=0x7FFFD
        | 0x80000..=0x8FFFD
        | 0x90000..=0x9FFFD
        | 0xA0000..=0xAFFFD
        | 0xB0000..=0xBFFFD
        | 0xC0000..=0xCFFFD
        | 0xD0000..=0xDFFFD
        | 0xE1000..=0xEFFFD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_template() {
        let template = Template::parse("http://ex.org/{dept}/\\{x\\}/{id}").unwrap();
        assert_eq!(
            template.parts(),
            &[
                TemplatePart::Text("http://ex.org/".to_owned()),
                TemplatePart::Column("dept".to_owned()),
                TemplatePart::Text("/{x}/".to_owned()),
                TemplatePart::Column("id".to_owned()),
            ]
        );
        assert_eq!(template.columns().collect::<Vec<_>>(), vec!["dept", "id"]);
    }

    #[test]
    fn test_parse_invalid_templates() {
        assert!(Template::parse("http://ex.org/{id").is_err());
        assert!(Template::parse("http://ex.org/{}").is_err());
        assert!(Template::parse("http://ex.org/}").is_err());
    }

    #[test]
    fn test_expand() {
        let template = Template::parse("http://ex.org/person/{name}").unwrap();
        assert_eq!(
            template.expand(|_| Some("Jane Doe".to_owned()), true),
            Some("http://ex.org/person/Jane%20Doe".to_owned())
        );
        assert_eq!(
            template.expand(|_| Some("Jane Doe".to_owned()), false),
            Some("http://ex.org/person/Jane Doe".to_owned())
        );
        assert_eq!(template.expand(|_| None, true), None);
    }

    #[test]
    fn test_can_produce() {
        let template = Template::parse("http://ex.org/person/{id}").unwrap();
        assert!(template.can_produce("http://ex.org/person/12"));
        assert!(!template.can_produce("http://ex.org/dept/12"));

        let template = Template::parse("http://ex.org/{a}/s/{b}.html").unwrap();
        assert!(template.can_produce("http://ex.org/1/s/2.html"));
        assert!(!template.can_produce("http://ex.org/1/s/2.json"));
        assert!(!template.can_produce("http://ex.org/1/t/2.html"));
    }

    #[test]
    fn test_iri_safe() {
        assert_eq!(iri_safe("a b/c"), "a%20b%2Fc");
        assert_eq!(iri_safe("Müller"), "Müller");
        assert_eq!(iri_safe("x-y_z.~"), "x-y_z.~");
    }

    #[test]
    fn test_iri_unsafe() {
        assert_eq!(iri_unsafe("a%20b%2Fc").as_deref(), Some("a b/c"));
        assert_eq!(iri_unsafe("M%C3%BCller").as_deref(), None);
        assert_eq!(iri_unsafe("Müller").as_deref(), Some("Müller"));
        assert_eq!(iri_unsafe("a/b"), None);
        assert_eq!(iri_unsafe("a%2fb"), None);
        assert_eq!(iri_unsafe("a%41"), None);
        assert_eq!(iri_unsafe("a%2"), None);
        assert_eq!(iri_unsafe("%FF"), None);
    }

    #[test]
    fn test_appears_in_iri_safe() {
        assert!(appears_in_iri_safe('%'));
        assert!(appears_in_iri_safe('-'));
        assert!(!appears_in_iri_safe('/'));
        assert!(!appears_in_iri_safe(' '));
    }
}
