//! Minimal RFC 4515 search-filter parsing.
//!
//! Covers the constructs an authentication search realistically uses:
//! presence, equality and the `&`/`|`/`!` combinators, with `\xx` hex
//! escapes. Anything else in a configured URL is rejected up front rather
//! than sent to the directory.

use ldap3_proto::proto::LdapFilter;

use crate::{error::Error, Result};

/// Parses the filter portion of a directory URL.
pub(crate) fn parse(input: &str) -> Result<LdapFilter> {
    let mut parser = Parser {
        input: input.as_bytes(),
        pos: 0,
    };
    let filter = parser.filter()?;
    if parser.pos != parser.input.len() {
        return Err(parser.error("trailing characters after filter"));
    }
    Ok(filter)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> Error {
        Error::Filter(format!("{message} at offset {}", self.pos))
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn filter(&mut self) -> Result<LdapFilter> {
        self.expect(b'(')?;
        let filter = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                LdapFilter::And(self.filter_list()?)
            }
            Some(b'|') => {
                self.pos += 1;
                LdapFilter::Or(self.filter_list()?)
            }
            Some(b'!') => {
                self.pos += 1;
                LdapFilter::Not(Box::new(self.filter()?))
            }
            Some(_) => self.comparison()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.expect(b')')?;
        Ok(filter)
    }

    fn filter_list(&mut self) -> Result<Vec<LdapFilter>> {
        let mut filters = Vec::new();
        while self.peek() == Some(b'(') {
            filters.push(self.filter()?);
        }
        if filters.is_empty() {
            return Err(self.error("empty filter list"));
        }
        Ok(filters)
    }

    fn comparison(&mut self) -> Result<LdapFilter> {
        let attribute = self.take_while(|byte| byte != b'=' && byte != b'(' && byte != b')')?;
        if attribute.is_empty() {
            return Err(self.error("empty attribute description"));
        }
        if matches!(
            attribute.as_bytes().last(),
            Some(b'>') | Some(b'<') | Some(b'~')
        ) {
            return Err(self.error("only equality and presence matching are supported"));
        }
        self.expect(b'=')?;
        let value = self.take_while(|byte| byte != b')')?;
        if value == "*" {
            return Ok(LdapFilter::Present(attribute));
        }
        if value.contains('*') {
            return Err(self.error("substring filters are not supported"));
        }
        Ok(LdapFilter::Equality(attribute, unescape(&value)?))
    }

    fn take_while(&mut self, keep: impl Fn(u8) -> bool) -> Result<String> {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if !keep(byte) {
                break;
            }
            self.pos += 1;
        }
        // Only ASCII bytes terminate the scan, so the slice cannot split a
        // multi-byte character.
        std::str::from_utf8(&self.input[start..self.pos])
            .map(str::to_string)
            .map_err(|_| self.error("filter is not valid UTF-8"))
    }
}

/// Resolves RFC 4515 `\xx` escapes in an assertion value.
fn unescape(raw: &str) -> Result<String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            let escaped = bytes
                .get(i + 1..i + 3)
                .and_then(|pair| std::str::from_utf8(pair).ok())
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| Error::Filter(format!("invalid escape in value {raw:?}")))?;
            out.push(escaped);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out)
        .map_err(|_| Error::Filter(format!("escaped value {raw:?} is not valid UTF-8")))
}
