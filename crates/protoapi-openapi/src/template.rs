//! `google.api.http` path templates.
//!
//! ```text
//! Template = "/" Segments [ ":" Verb ] ;
//! Segments = Segment { "/" Segment } ;
//! Segment  = "*" | "**" | LITERAL | Variable ;
//! Variable = "{" FieldPath [ "=" Segments ] "}" ;
//! FieldPath = IDENT { "." IDENT } ;
//! Verb     = LITERAL ;
//! ```
//!
//! The lexer emits one token per slash, per colon and per segment. Variables
//! carry their field path and, when present, the raw sub-template; the latter is
//! dropped again by [`render_route`] since OpenAPI path parameters cannot
//! express it.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Slash,
    Colon,
    Literal(String),
    /// `*` (one segment) or `**` (any number of segments).
    Wildcard { multi: bool },
    /// The custom verb after `:`.
    Ident(String),
    Variable {
        field_path: String,
        template: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("path template must start with `/`")]
    MissingLeadingSlash,

    #[error("unterminated `{{` at offset {0}")]
    Unterminated(usize),

    #[error("variable at offset {0} has no field path")]
    EmptyVariable(usize),

    #[error("empty path segment at offset {0}")]
    EmptySegment(usize),

    #[error("unexpected character `{ch}` at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("malformed percent escape at offset {0}")]
    BadEscape(usize),
}

pub fn tokenize(template: &str) -> Result<Vec<Token>, TemplateError> {
    if !template.starts_with('/') {
        return Err(TemplateError::MissingLeadingSlash);
    }
    let mut lexer = Lexer {
        src: template,
        pos: 0,
        tokens: Vec::new(),
    };
    lexer.segments()?;
    if lexer.peek() == Some(':') {
        lexer.pos += 1;
        lexer.tokens.push(Token::Colon);
        let start = lexer.pos;
        let verb = lexer.literal()?;
        if verb.is_empty() {
            return Err(TemplateError::EmptySegment(start));
        }
        lexer.tokens.push(Token::Ident(verb));
    }
    if let Some(ch) = lexer.peek() {
        return Err(TemplateError::UnexpectedChar {
            ch,
            offset: lexer.pos,
        });
    }
    Ok(lexer.tokens)
}

/// Render tokens as an OpenAPI route: `/v1/{name}:cancel`.
pub fn render_route(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Slash => out.push('/'),
            Token::Colon => out.push(':'),
            Token::Literal(text) | Token::Ident(text) => out.push_str(text),
            Token::Wildcard { multi: false } => out.push('*'),
            Token::Wildcard { multi: true } => out.push_str("**"),
            Token::Variable { field_path, .. } => {
                out.push('{');
                out.push_str(field_path);
                out.push('}');
            }
        }
    }
    out
}

/// Field paths bound by the template's variables, in order.
pub fn variables(tokens: &[Token]) -> Vec<&str> {
    tokens
        .iter()
        .filter_map(|t| match t {
            Token::Variable { field_path, .. } => Some(field_path.as_str()),
            _ => None,
        })
        .collect()
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    /// `"/" Segment { "/" Segment }`, stopping at `:` or end of input.
    fn segments(&mut self) -> Result<(), TemplateError> {
        while self.peek() == Some('/') {
            self.pos += 1;
            self.tokens.push(Token::Slash);
            self.segment()?;
        }
        Ok(())
    }

    fn segment(&mut self) -> Result<(), TemplateError> {
        let start = self.pos;
        match self.peek() {
            None | Some('/') | Some(':') => Err(TemplateError::EmptySegment(start)),
            Some('*') => {
                let multi = self.rest().starts_with("**");
                self.pos += if multi { 2 } else { 1 };
                self.tokens.push(Token::Wildcard { multi });
                Ok(())
            }
            Some('{') => self.variable(),
            Some(ch) if is_literal_char(ch) => {
                let text = self.literal()?;
                self.tokens.push(Token::Literal(text));
                Ok(())
            }
            Some(ch) => Err(TemplateError::UnexpectedChar { ch, offset: start }),
        }
    }

    fn literal(&mut self) -> Result<String, TemplateError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == '%' {
                let escape = self.rest().as_bytes();
                let valid = escape.len() >= 3
                    && escape[1].is_ascii_hexdigit()
                    && escape[2].is_ascii_hexdigit();
                if !valid {
                    return Err(TemplateError::BadEscape(self.pos));
                }
                self.pos += 3;
            } else if is_literal_char(ch) {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn variable(&mut self) -> Result<(), TemplateError> {
        let open = self.pos;
        let close = self.rest().find('}').map(|i| self.pos + i);
        let Some(close) = close else {
            return Err(TemplateError::Unterminated(open));
        };
        let body = &self.src[open + 1..close];
        let (field_path, template) = match body.split_once('=') {
            Some((path, sub)) => (path, Some(sub)),
            None => (body, None),
        };
        if field_path.is_empty() {
            return Err(TemplateError::EmptyVariable(open));
        }
        for (i, ch) in field_path.char_indices() {
            if !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '.') {
                return Err(TemplateError::UnexpectedChar {
                    ch,
                    offset: open + 1 + i,
                });
            }
        }
        if field_path.split('.').any(str::is_empty) {
            return Err(TemplateError::EmptyVariable(open));
        }
        if let Some(sub) = template {
            // Validate the sub-template with the same grammar, minus the verb.
            let mut inner = Lexer {
                src: sub,
                pos: 0,
                tokens: Vec::new(),
            };
            inner.segment()?;
            while inner.peek() == Some('/') {
                inner.pos += 1;
                inner.segment()?;
            }
            if let Some(ch) = inner.peek() {
                return Err(TemplateError::UnexpectedChar {
                    ch,
                    offset: open + 2 + field_path.len() + inner.pos,
                });
            }
        }
        self.tokens.push(Token::Variable {
            field_path: field_path.to_string(),
            template: template.map(str::to_string),
        });
        self.pos = close + 1;
        Ok(())
    }
}

/// RFC 3986 unreserved characters.
fn is_literal_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '-' | '.' | '_' | '~' | '%')
}
