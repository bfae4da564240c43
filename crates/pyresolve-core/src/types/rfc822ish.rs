//! A forgiving parser for the "email-message-shaped" format wheel and
//! sdist `METADATA`/`PKG-INFO` files are written in. The format predates
//! any real grammar and is really just "whatever Python's
//! `email.parser` accepts"; this grammar covers the subset that real
//! packaging tools produce: a run of `Name: value` header lines,
//! continuation lines indented with whitespace, an optional blank-line
//! separated body (the long description), and ragged trailing newlines.

use miette::IntoDiagnostic;
use std::collections::HashMap;

pub type Fields = HashMap<String, Vec<String>>;

pub struct RFC822ish {
    pub fields: Fields,
    pub body: Option<String>,
}

peg::parser! {
    grammar metadata_parser() for str {
        rule line_ending()
            = quiet!{"\r\n" / "\r" / "\n"} / expected!("end of line")

        rule field_name() -> &'input str
            = quiet!{$(['\x21'..='\x39' | '\x3b'..='\x7e']+)} / expected!("field name")

        rule field_separator()
            = ":" [' ' | '\t']*

        rule field_value_piece()
            = [^ '\r' | '\n']*

        rule continuation_line_ending()
            = quiet!{line_ending() [' ' | '\t']} / expected!("continuation line")

        rule field_value() -> &'input str
            = $(field_value_piece() ** continuation_line_ending())

        rule field() -> (String, String)
            = n:field_name() field_separator() v:field_value()
                { (n.to_ascii_lowercase(), v.to_owned()) }

        rule fields() -> Vec<(String, String)>
            = field() ** line_ending()

        rule trailing_body() -> String
            = line_ending() line_ending() b:$([_]*) { b.to_owned() }

        pub rule document() -> RFC822ish
            = f:fields() body:(trailing_body()?) line_ending()?
                {
                    let mut fields = Fields::new();
                    for (name, value) in f {
                        fields.entry(name).or_default().push(value);
                    }
                    RFC822ish { fields, body }
                }
    }
}

impl RFC822ish {
    pub fn parse(input: &str) -> miette::Result<RFC822ish> {
        metadata_parser::document(input).into_diagnostic()
    }

    pub fn take_all(&mut self, key: &str) -> Vec<String> {
        self.fields.remove(&key.to_ascii_lowercase()).unwrap_or_default()
    }

    pub fn maybe_take(&mut self, key: &str) -> miette::Result<Option<String>> {
        let mut values = self.take_all(key);
        match values.len() {
            0 => Ok(None),
            1 => Ok(values.pop()),
            _ => miette::bail!("multiple values for singleton key {key}"),
        }
    }

    pub fn take(&mut self, key: &str) -> miette::Result<String> {
        self.maybe_take(key)?
            .ok_or_else(|| miette::miette!("can't find required key {key}"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_headers_and_body() {
        let input = "Name: attrs\nVersion: 18.2.0\nRequires-Dist: six\nRequires-Dist: pytest\n\nA long description.\n";
        let mut parsed = RFC822ish::parse(input).unwrap();
        assert_eq!(parsed.take("Name").unwrap(), "attrs");
        assert_eq!(parsed.take("Version").unwrap(), "18.2.0");
        assert_eq!(parsed.take_all("Requires-Dist"), vec!["six", "pytest"]);
        assert_eq!(parsed.body.unwrap().trim(), "A long description.");
    }

    #[test]
    fn continuation_lines_keep_embedded_newlines() {
        let input = "Name: attrs\nDescription: line one\n line two\n\n";
        let mut parsed = RFC822ish::parse(input).unwrap();
        let desc = parsed.take("Description").unwrap();
        assert!(desc.contains("line one"));
        assert!(desc.contains("line two"));
    }
}
