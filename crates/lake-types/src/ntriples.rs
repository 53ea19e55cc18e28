//! N-Triples serialization and parsing.
//!
//! Serialization is canonical: one statement per line, in [`TripleSet`]
//! order, terminated by `\n`. The canonical form is what state digests are
//! computed over, so it must never depend on insertion order.

use crate::error::TypeError;
use crate::term::{Literal, Term, Triple, TripleSet};

/// Escape a literal's lexical form for N-Triples output.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Serialize triples as canonical N-Triples text.
pub fn to_ntriples<'a>(triples: impl IntoIterator<Item = &'a Triple>) -> String {
    let mut out = String::new();
    for t in triples {
        out.push_str(&t.to_string());
        out.push('\n');
    }
    out
}

/// Canonical byte form of a triple set, used for state digests.
pub fn canonical_bytes(triples: &TripleSet) -> Vec<u8> {
    to_ntriples(triples).into_bytes()
}

/// Parse an N-Triples document.
///
/// Blank lines and `#` comment lines are skipped. Duplicate statements
/// collapse into one.
pub fn parse_ntriples(input: &str) -> Result<TripleSet, TypeError> {
    let mut triples = TripleSet::new();
    for (index, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parser = LineParser {
            input: line,
            pos: 0,
            line: index + 1,
        };
        triples.insert(parser.statement()?);
    }
    Ok(triples)
}

struct LineParser<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
}

impl LineParser<'_> {
    fn statement(&mut self) -> Result<Triple, TypeError> {
        let subject = self.term()?;
        if matches!(subject, Term::Literal(_)) {
            return Err(self.error("subject must be an IRI or blank node"));
        }
        self.skip_ws();
        let predicate = self.term()?;
        if !predicate.is_iri() {
            return Err(self.error("predicate must be an IRI"));
        }
        self.skip_ws();
        let object = self.term()?;
        self.skip_ws();
        if self.bump() != Some('.') {
            return Err(self.error("expected '.' at end of statement"));
        }
        self.skip_ws();
        match self.peek() {
            None | Some('#') => Ok(Triple::new(subject, predicate, object)),
            Some(c) => Err(self.error(&format!("unexpected {c:?} after statement"))),
        }
    }

    fn term(&mut self) -> Result<Term, TypeError> {
        match self.peek() {
            Some('<') => {
                self.bump();
                Ok(Term::Iri(self.iri_body()?))
            }
            Some('_') => {
                if !self.input[self.pos..].starts_with("_:") {
                    return Err(self.error("malformed blank node"));
                }
                self.pos += 2;
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '-' {
                        self.bump();
                    } else {
                        break;
                    }
                }
                if self.pos == start {
                    return Err(self.error("empty blank node label"));
                }
                Ok(Term::Blank(self.input[start..self.pos].to_string()))
            }
            Some('"') => {
                self.bump();
                self.literal()
            }
            Some(c) => Err(self.error(&format!("unexpected {c:?} where a term was expected"))),
            None => Err(self.error("unexpected end of line")),
        }
    }

    fn iri_body(&mut self) -> Result<String, TypeError> {
        let mut iri = String::new();
        loop {
            match self.bump() {
                Some('>') => return Ok(iri),
                Some(c) if c.is_whitespace() || c == '<' || c == '"' => {
                    return Err(self.error("illegal character in IRI"));
                }
                Some(c) => iri.push(c),
                None => return Err(self.error("unterminated IRI")),
            }
        }
    }

    fn literal(&mut self) -> Result<Term, TypeError> {
        let mut lexical = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => lexical.push(self.escape()?),
                Some(c) => lexical.push(c),
                None => return Err(self.error("unterminated literal")),
            }
        }

        let mut literal = Literal {
            lexical,
            datatype: None,
            language: None,
        };
        if self.peek() == Some('@') {
            self.bump();
            let start = self.pos;
            while let Some(c) = self.peek() {
                if c.is_ascii_alphanumeric() || c == '-' {
                    self.bump();
                } else {
                    break;
                }
            }
            if self.pos == start {
                return Err(self.error("empty language tag"));
            }
            literal.language = Some(self.input[start..self.pos].to_string());
        } else if self.input[self.pos..].starts_with("^^") {
            self.pos += 2;
            if self.bump() != Some('<') {
                return Err(self.error("datatype must be an IRI"));
            }
            literal.datatype = Some(self.iri_body()?);
        }
        Ok(Term::Literal(literal))
    }

    fn escape(&mut self) -> Result<char, TypeError> {
        match self.bump() {
            Some('t') => Ok('\t'),
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('b') => Ok('\u{8}'),
            Some('f') => Ok('\u{c}'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('\\') => Ok('\\'),
            Some('u') => self.hex_escape(4),
            Some('U') => self.hex_escape(8),
            _ => Err(self.error("invalid escape sequence")),
        }
    }

    fn hex_escape(&mut self, len: usize) -> Result<char, TypeError> {
        let end = self.pos + len;
        let digits = self
            .input
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated unicode escape"))?;
        let code =
            u32::from_str_radix(digits, 16).map_err(|_| self.error("invalid unicode escape"))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| self.error("invalid unicode code point"))
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, reason: &str) -> TypeError {
        TypeError::Syntax {
            line: self.line,
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
# a comment
<repo:res/a/b/c> <http://purl.org/dc/elements/1.1/title> "Moby Dick" .
<repo:res/a/b/c> <http://purl.org/dc/elements/1.1/creator> "Herman\tMelville"@en .
<repo:res/a/b/c> <urn:ex:pages> "635"^^<http://www.w3.org/2001/XMLSchema#integer> .
_:b1 <urn:ex:rel> <repo:res/x> . # trailing comment
"#;

    #[test]
    fn parses_all_term_kinds() {
        let triples = parse_ntriples(DOC).unwrap();
        assert_eq!(triples.len(), 4);
        assert!(triples.iter().any(|t| t.object == Term::lang("Herman\tMelville", "en")));
        assert!(triples.iter().any(|t| t.subject == Term::blank("b1")));
        assert!(triples.iter().any(|t| t.object
            == Term::typed("635", "http://www.w3.org/2001/XMLSchema#integer")));
    }

    #[test]
    fn serialization_reparses_to_same_set() {
        let triples = parse_ntriples(DOC).unwrap();
        let text = to_ntriples(&triples);
        assert_eq!(parse_ntriples(&text).unwrap(), triples);
    }

    #[test]
    fn canonical_bytes_ignore_insertion_order() {
        let a = Triple::new(Term::iri("s"), Term::iri("p"), Term::literal("1"));
        let b = Triple::new(Term::iri("s"), Term::iri("p"), Term::literal("2"));
        let first: TripleSet = [a.clone(), b.clone()].into_iter().collect();
        let second: TripleSet = [b, a].into_iter().collect();
        assert_eq!(canonical_bytes(&first), canonical_bytes(&second));
    }

    #[test]
    fn unicode_escapes_decode() {
        let triples = parse_ntriples(r#"<s> <p> "caf\u00e9" ."#).unwrap();
        let t = triples.iter().next().unwrap();
        assert_eq!(t.object.as_lexical(), Some("café"));
    }

    #[test]
    fn rejects_missing_terminator() {
        let err = parse_ntriples("<s> <p> <o>").unwrap_err();
        assert!(matches!(err, TypeError::Syntax { line: 1, .. }));
    }

    #[test]
    fn rejects_literal_predicate() {
        assert!(parse_ntriples(r#"<s> "p" <o> ."#).is_err());
    }

    #[test]
    fn rejects_unterminated_literal() {
        let err = parse_ntriples("\n<s> <p> \"open .").unwrap_err();
        assert!(matches!(err, TypeError::Syntax { line: 2, .. }));
    }
}
