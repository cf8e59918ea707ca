//! Minimal Turtle reader for the in-memory store.
//!
//! Covers what the fact builder emits and what tests seed: `@prefix` and
//! `PREFIX` directives, IRIs, prefixed names, the `a` keyword, `;` and `,`
//! lists, blank node labels, string literals (short and long form) with
//! language tags or datatypes, numbers and booleans. Anonymous blank nodes
//! (`[...]`), collections and `@base` are rejected.

use std::collections::HashMap;

use crate::client::GraphError;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal {
        value: String,
        datatype: Option<String>,
        lang: Option<String>,
    },
}

impl Term {
    pub fn iri(s: impl Into<String>) -> Self {
        Self::Iri(s.into())
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Self::Iri(s) => Some(s),
            _ => None,
        }
    }

    pub fn literal_value(&self) -> Option<&str> {
        match self {
            Self::Literal { value, .. } => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

/// Parse a Turtle document into triples, in document order.
pub fn parse(ttl: &str) -> Result<Vec<Triple>, GraphError> {
    let mut parser = Parser {
        chars: ttl.chars().collect(),
        pos: 0,
        line: 1,
        prefixes: HashMap::new(),
    };
    let mut out = Vec::new();
    parser.document(&mut out)?;
    Ok(out)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    prefixes: HashMap<String, String>,
}

const NAME_STOP: &[char] = &['<', '>', '"', '\'', '{', '}', '|', '^', '`', ';', ',', '(', ')', '[', ']'];

impl Parser {
    fn err(&self, message: impl Into<String>) -> GraphError {
        GraphError::Turtle {
            line: self.line,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn expect(&mut self, want: char) -> Result<(), GraphError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(self.err(format!("expected '{want}', found '{c}'"))),
            None => Err(self.err(format!("expected '{want}', found end of input"))),
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Case-insensitive keyword followed by whitespace.
    fn keyword_ahead(&self, kw: &str) -> bool {
        let n = kw.chars().count();
        let matches = kw
            .chars()
            .enumerate()
            .all(|(i, k)| self.peek_at(i).is_some_and(|c| c.eq_ignore_ascii_case(&k)));
        matches && self.peek_at(n).is_some_and(char::is_whitespace)
    }

    fn document(&mut self, out: &mut Vec<Triple>) -> Result<(), GraphError> {
        loop {
            self.skip_ws();
            let Some(c) = self.peek() else {
                return Ok(());
            };

            if c == '@' {
                self.bump();
                match self.name_token().as_str() {
                    "prefix" => {
                        self.prefix_decl()?;
                        self.skip_ws();
                        self.expect('.')?;
                    }
                    other => return Err(self.err(format!("unsupported directive @{other}"))),
                }
            } else if self.keyword_ahead("PREFIX") {
                self.pos += "PREFIX".len();
                self.prefix_decl()?;
            } else if self.keyword_ahead("BASE") {
                return Err(self.err("BASE is not supported"));
            } else {
                self.triples(out)?;
                self.skip_ws();
                self.expect('.')?;
            }
        }
    }

    fn prefix_decl(&mut self) -> Result<(), GraphError> {
        self.skip_ws();
        let token = self.name_token();
        let Some(name) = token.strip_suffix(':') else {
            return Err(self.err(format!("bad prefix name {token:?}")));
        };
        let name = name.to_string();
        self.skip_ws();
        let iri = self.iriref()?;
        self.prefixes.insert(name, iri);
        Ok(())
    }

    /// Read a bare token (prefixed name, keyword, number). Trailing dots are
    /// left in the input since they terminate the statement.
    fn name_token(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || NAME_STOP.contains(&c) {
                break;
            }
            self.pos += 1;
        }
        while self.pos > start && self.chars[self.pos - 1] == '.' {
            self.pos -= 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn iriref(&mut self) -> Result<String, GraphError> {
        self.expect('<')?;
        let mut iri = String::new();
        loop {
            match self.bump() {
                Some('>') => return Ok(iri),
                Some(c) if c.is_whitespace() => return Err(self.err("whitespace in IRI")),
                Some(c) => iri.push(c),
                None => return Err(self.err("unterminated IRI")),
            }
        }
    }

    fn prefixed(&self, token: &str) -> Result<String, GraphError> {
        let Some((prefix, local)) = token.split_once(':') else {
            return Err(self.err(format!("expected a prefixed name, found {token:?}")));
        };
        match self.prefixes.get(prefix) {
            Some(ns) => Ok(format!("{ns}{local}")),
            None => Err(self.err(format!("undefined prefix {prefix:?}"))),
        }
    }

    fn triples(&mut self, out: &mut Vec<Triple>) -> Result<(), GraphError> {
        let subject = match self.peek() {
            Some('<') => Term::Iri(self.iriref()?),
            Some('[') | Some('(') => return Err(self.err("anonymous nodes are not supported")),
            _ => {
                let token = self.name_token();
                self.resource(&token)?
            }
        };

        loop {
            self.skip_ws();
            let predicate = match self.peek() {
                Some('<') => Term::Iri(self.iriref()?),
                _ => {
                    let token = self.name_token();
                    if token == "a" {
                        Term::iri(RDF_TYPE)
                    } else {
                        Term::Iri(self.prefixed(&token)?)
                    }
                }
            };

            loop {
                self.skip_ws();
                let object = self.object()?;
                out.push(Triple {
                    subject: subject.clone(),
                    predicate: predicate.clone(),
                    object,
                });
                self.skip_ws();
                if self.peek() == Some(',') {
                    self.bump();
                    continue;
                }
                break;
            }

            if self.peek() != Some(';') {
                return Ok(());
            }
            while self.peek() == Some(';') {
                self.bump();
                self.skip_ws();
            }
            if matches!(self.peek(), Some('.') | None) {
                return Ok(());
            }
        }
    }

    /// IRI-valued token: blank node label or prefixed name.
    fn resource(&self, token: &str) -> Result<Term, GraphError> {
        if token.is_empty() {
            return Err(self.err("expected a term"));
        }
        match token.strip_prefix("_:") {
            Some(label) => Ok(Term::Blank(label.to_string())),
            None => Ok(Term::Iri(self.prefixed(token)?)),
        }
    }

    fn object(&mut self) -> Result<Term, GraphError> {
        match self.peek() {
            Some('<') => Ok(Term::Iri(self.iriref()?)),
            Some('"') | Some('\'') => self.literal(),
            Some('[') | Some('(') => Err(self.err("anonymous nodes are not supported")),
            Some(c) if c.is_ascii_digit() || c == '+' || c == '-' || c == '.' => {
                let token = self.name_token();
                self.number(token)
            }
            _ => {
                let token = self.name_token();
                match token.as_str() {
                    "true" | "false" => Ok(Term::Literal {
                        value: token.clone(),
                        datatype: Some(format!("{XSD}boolean")),
                        lang: None,
                    }),
                    _ => self.resource(&token),
                }
            }
        }
    }

    fn number(&self, token: String) -> Result<Term, GraphError> {
        if token.parse::<f64>().is_err() {
            return Err(self.err(format!("bad numeric literal {token:?}")));
        }
        let kind = if token.contains(['e', 'E']) {
            "double"
        } else if token.contains('.') {
            "decimal"
        } else {
            "integer"
        };
        Ok(Term::Literal {
            value: token,
            datatype: Some(format!("{XSD}{kind}")),
            lang: None,
        })
    }

    fn literal(&mut self) -> Result<Term, GraphError> {
        let quote = self.bump().ok_or_else(|| self.err("expected a literal"))?;
        let long = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if long {
            self.pos += 2;
        }

        let mut value = String::new();
        loop {
            let c = self.bump().ok_or_else(|| self.err("unterminated string"))?;
            if c == quote {
                if !long {
                    break;
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.pos += 2;
                    break;
                }
                value.push(c);
            } else if c == '\\' {
                value.push(self.escape()?);
            } else if c == '\n' && !long {
                return Err(self.err("newline in short string"));
            } else {
                value.push(c);
            }
        }

        let mut datatype = None;
        let mut lang = None;
        match self.peek() {
            Some('@') => {
                self.bump();
                let mut tag = String::new();
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() || c == '-' {
                        tag.push(c);
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                lang = Some(tag);
            }
            Some('^') => {
                self.expect('^')?;
                self.expect('^')?;
                datatype = Some(match self.peek() {
                    Some('<') => self.iriref()?,
                    _ => {
                        let token = self.name_token();
                        self.prefixed(&token)?
                    }
                });
            }
            _ => {}
        }

        Ok(Term::Literal {
            value,
            datatype,
            lang,
        })
    }

    fn escape(&mut self) -> Result<char, GraphError> {
        let c = self.bump().ok_or_else(|| self.err("dangling escape"))?;
        Ok(match c {
            't' => '\t',
            'n' => '\n',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            '"' | '\'' | '\\' => c,
            'u' | 'U' => {
                let len = if c == 'u' { 4 } else { 8 };
                let hex: String = (0..len).filter_map(|_| self.bump()).collect();
                u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.err(format!("bad unicode escape \\{c}{hex}")))?
            }
            other => return Err(self.err(format!("unknown escape \\{other}"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
@prefix ex: <http://ns#> .
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>

# a case with two items
ex:Case_1 a ex:Case ;
    ex:hvdcCode "HVDC-ADOPT-SCT-0001" ;
    ex:label "say \"hi\"\n"@en .

<http://ns#Item_1> ex:belongsToCase ex:Case_1 ;
    ex:rowIndex 3 ;
    ex:confidence "0.95"^^xsd:decimal ;
    ex:flag true ;
    ex:tag "a", "b" .
_:b1 ex:note """multi
line""" .
"#;

    #[test]
    fn parses_statements_and_lists() {
        let triples = parse(DOC).unwrap();
        assert_eq!(triples.len(), 10);
        assert_eq!(triples[0].predicate, Term::iri(RDF_TYPE));
        assert_eq!(triples[0].object, Term::iri("http://ns#Case"));
        assert_eq!(triples[2].object.literal_value(), Some("say \"hi\"\n"));
        assert!(matches!(&triples[2].object, Term::Literal { lang: Some(l), .. } if l == "en"));
        assert!(matches!(
            &triples[4].object,
            Term::Literal { datatype: Some(dt), .. } if dt.ends_with("integer")
        ));
        assert!(matches!(
            &triples[5].object,
            Term::Literal { value, datatype: Some(dt), .. } if value == "0.95" && dt.ends_with("decimal")
        ));
        assert_eq!(triples[9].subject, Term::Blank("b1".into()));
        assert_eq!(triples[9].object.literal_value(), Some("multi\nline"));
    }

    #[test]
    fn empty_document_has_no_triples() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("@prefix ex: <http://ns#> .\n# nothing\n").unwrap().is_empty());
    }

    #[test]
    fn errors_carry_line_numbers() {
        match parse("@prefix ex: <http://ns#> .\n\nzz:a ex:b ex:c .") {
            Err(GraphError::Turtle { line, message }) => {
                assert_eq!(line, 3);
                assert!(message.contains("zz"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse("<http://a> <http://b> \"open").is_err());
        assert!(parse("<http://a> <http://b> [ <http://c> 1 ] .").is_err());
    }
}
