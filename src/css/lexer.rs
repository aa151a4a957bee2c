//! CSS tokenizer. Byte-accurate; whitespace and comments are folded into a
//! `ws_before` flag on the following token.

use crate::css::ast::{CssToken, CssTokenKind};
use crate::interner::Atom;
use crate::logger::Log;
use crate::source::{Loc, Range, Source};

pub struct CssLexer<'a> {
  source: &'a Source,
  log: &'a Log,
  bytes: &'a [u8],
  pos: usize,
}

fn is_name_start(b: u8) -> bool {
  b == b'_' || b.is_ascii_alphabetic() || b >= 0x80
}

fn is_name(b: u8) -> bool {
  is_name_start(b) || b.is_ascii_digit() || b == b'-'
}

impl<'a> CssLexer<'a> {
  pub fn new(source: &'a Source, log: &'a Log) -> CssLexer<'a> {
    CssLexer {
      source,
      log,
      bytes: source.contents.as_bytes(),
      pos: 0,
    }
  }

  /// Tokenize the whole file. CSS is small enough per-file that an eager
  /// token vector keeps the parser simple.
  pub fn tokenize(mut self) -> Vec<CssToken> {
    let mut tokens = Vec::new();
    let mut ws_before = false;
    loop {
      let token = self.next_token(&mut ws_before);
      let is_eof = token.kind == CssTokenKind::Eof;
      tokens.push(token);
      if is_eof {
        return tokens;
      }
    }
  }

  fn byte_at(&self, offset: usize) -> u8 {
    *self.bytes.get(self.pos + offset).unwrap_or(&0)
  }

  fn make(&self, kind: CssTokenKind, start: usize, ws_before: bool) -> CssToken {
    CssToken {
      kind,
      text: Atom::new(&self.source.contents[start..self.pos]),
      loc: Loc(start as u32),
      ws_before,
    }
  }

  fn next_token(&mut self, ws_before: &mut bool) -> CssToken {
    // Whitespace and comments fold into ws_before
    let mut ws = std::mem::take(ws_before);
    loop {
      match self.byte_at(0) {
        b' ' | b'\t' | b'\n' | b'\r' | 0x0c => {
          ws = true;
          self.pos += 1;
        }
        b'/' if self.byte_at(1) == b'*' => {
          let start = self.pos;
          self.pos += 2;
          let preserved = self.byte_at(0) == b'!';
          let mut closed = false;
          while self.pos < self.bytes.len() {
            if self.byte_at(0) == b'*' && self.byte_at(1) == b'/' {
              self.pos += 2;
              closed = true;
              break;
            }
            self.pos += 1;
          }
          if !closed {
            self.log.add_error(
              Some(self.source),
              Range::new(start as u32, self.pos as u32),
              "Unterminated comment".to_string(),
            );
          }
          if preserved {
            let token = self.make(CssTokenKind::Comment, start, ws);
            *ws_before = false;
            return token;
          }
          ws = true;
        }
        _ => break,
      }
    }

    let start = self.pos;
    if self.pos >= self.bytes.len() {
      return self.make(CssTokenKind::Eof, start, ws);
    }

    let b = self.bytes[self.pos];
    match b {
      b'"' | b'\'' => self.scan_string(b, start, ws),
      b'#' => {
        self.pos += 1;
        while self.pos < self.bytes.len() && (is_name(self.byte_at(0)) || self.byte_at(0) == b'\\') {
          if self.byte_at(0) == b'\\' {
            self.pos += 2.min(self.bytes.len() - self.pos);
          } else {
            self.pos += 1;
          }
        }
        self.make(CssTokenKind::Hash, start, ws)
      }
      b'@' => {
        self.pos += 1;
        if is_name_start(self.byte_at(0)) || self.byte_at(0) == b'-' {
          while self.pos < self.bytes.len() && is_name(self.byte_at(0)) {
            self.pos += 1;
          }
          self.make(CssTokenKind::AtKeyword, start, ws)
        } else {
          self.make(CssTokenKind::Delim, start, ws)
        }
      }
      b'(' => {
        self.pos += 1;
        self.make(CssTokenKind::OpenParen, start, ws)
      }
      b')' => {
        self.pos += 1;
        self.make(CssTokenKind::CloseParen, start, ws)
      }
      b'[' => {
        self.pos += 1;
        self.make(CssTokenKind::OpenBracket, start, ws)
      }
      b']' => {
        self.pos += 1;
        self.make(CssTokenKind::CloseBracket, start, ws)
      }
      b'{' => {
        self.pos += 1;
        self.make(CssTokenKind::OpenBrace, start, ws)
      }
      b'}' => {
        self.pos += 1;
        self.make(CssTokenKind::CloseBrace, start, ws)
      }
      b':' => {
        self.pos += 1;
        self.make(CssTokenKind::Colon, start, ws)
      }
      b';' => {
        self.pos += 1;
        self.make(CssTokenKind::Semicolon, start, ws)
      }
      b',' => {
        self.pos += 1;
        self.make(CssTokenKind::Comma, start, ws)
      }
      b'<' if self.bytes[self.pos..].starts_with(b"<!--") => {
        self.pos += 4;
        self.make(CssTokenKind::Cdo, start, ws)
      }
      b'-' if self.bytes[self.pos..].starts_with(b"-->") => {
        self.pos += 3;
        self.make(CssTokenKind::Cdc, start, ws)
      }
      b'0'..=b'9' => self.scan_numeric(start, ws),
      b'.' | b'+' if self.byte_at(1).is_ascii_digit() => self.scan_numeric(start, ws),
      b'-' => {
        if self.byte_at(1).is_ascii_digit() || (self.byte_at(1) == b'.' && self.byte_at(2).is_ascii_digit()) {
          self.scan_numeric(start, ws)
        } else if is_name_start(self.byte_at(1)) || self.byte_at(1) == b'-' {
          self.scan_ident_like(start, ws)
        } else {
          self.pos += 1;
          self.make(CssTokenKind::Delim, start, ws)
        }
      }
      b'\\' => self.scan_ident_like(start, ws),
      _ if is_name_start(b) => self.scan_ident_like(start, ws),
      _ => {
        self.pos += 1;
        self.make(CssTokenKind::Delim, start, ws)
      }
    }
  }

  fn scan_string(&mut self, quote: u8, start: usize, ws: bool) -> CssToken {
    self.pos += 1;
    loop {
      if self.pos >= self.bytes.len() {
        self.log.add_error(
          Some(self.source),
          Range::new(start as u32, self.pos as u32),
          "Unterminated string token".to_string(),
        );
        return self.make(CssTokenKind::BadStr, start, ws);
      }
      match self.bytes[self.pos] {
        b'\n' => {
          self.log.add_error(
            Some(self.source),
            Range::new(start as u32, self.pos as u32),
            "Unterminated string token".to_string(),
          );
          return self.make(CssTokenKind::BadStr, start, ws);
        }
        b'\\' => self.pos += 2.min(self.bytes.len() - self.pos),
        b if b == quote => {
          self.pos += 1;
          return self.make(CssTokenKind::Str, start, ws);
        }
        _ => self.pos += 1,
      }
    }
  }

  fn scan_numeric(&mut self, start: usize, ws: bool) -> CssToken {
    if matches!(self.byte_at(0), b'+' | b'-') {
      self.pos += 1;
    }
    while self.byte_at(0).is_ascii_digit() {
      self.pos += 1;
    }
    if self.byte_at(0) == b'.' && self.byte_at(1).is_ascii_digit() {
      self.pos += 1;
      while self.byte_at(0).is_ascii_digit() {
        self.pos += 1;
      }
    }
    if matches!(self.byte_at(0), b'e' | b'E')
      && (self.byte_at(1).is_ascii_digit()
        || (matches!(self.byte_at(1), b'+' | b'-') && self.byte_at(2).is_ascii_digit()))
    {
      self.pos += 2;
      while self.byte_at(0).is_ascii_digit() {
        self.pos += 1;
      }
    }
    // Percentage or dimension unit folds into the same token
    if self.byte_at(0) == b'%' {
      self.pos += 1;
    } else {
      while self.pos < self.bytes.len() && is_name(self.byte_at(0)) {
        self.pos += 1;
      }
    }
    self.make(CssTokenKind::Num, start, ws)
  }

  fn scan_ident_like(&mut self, start: usize, ws: bool) -> CssToken {
    while self.pos < self.bytes.len() {
      let b = self.byte_at(0);
      if b == b'\\' {
        self.pos += 2.min(self.bytes.len() - self.pos);
      } else if is_name(b) {
        self.pos += 1;
      } else {
        break;
      }
    }

    // `url(` gets special tokenization when unquoted
    let text = &self.source.contents[start..self.pos];
    if self.byte_at(0) == b'(' {
      if text.eq_ignore_ascii_case("url") {
        let after_paren = self.pos + 1;
        let mut probe = after_paren;
        while probe < self.bytes.len() && matches!(self.bytes[probe], b' ' | b'\t' | b'\n' | b'\r') {
          probe += 1;
        }
        if probe < self.bytes.len() && !matches!(self.bytes[probe], b'"' | b'\'') {
          // Unquoted url token: consume through the closing paren
          self.pos = probe;
          while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
              b')' => {
                self.pos += 1;
                return self.make(CssTokenKind::Url, start, ws);
              }
              b'\\' => self.pos += 2.min(self.bytes.len() - self.pos),
              b'"' | b'\'' | b'(' => {
                // Invalid inside an unquoted url
                while self.pos < self.bytes.len() && self.bytes[self.pos] != b')' {
                  self.pos += 1;
                }
                self.pos = (self.pos + 1).min(self.bytes.len());
                self.log.add_error(
                  Some(self.source),
                  Range::new(start as u32, self.pos as u32),
                  "Invalid URL token".to_string(),
                );
                return self.make(CssTokenKind::BadUrl, start, ws);
              }
              _ => self.pos += 1,
            }
          }
          self.log.add_error(
            Some(self.source),
            Range::new(start as u32, self.pos as u32),
            "Unterminated URL token".to_string(),
          );
          return self.make(CssTokenKind::BadUrl, start, ws);
        }
      }
      self.pos += 1;
      return self.make(CssTokenKind::Function, start, ws);
    }

    self.make(CssTokenKind::Ident, start, ws)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::options::Loader;
  use std::path::PathBuf;

  fn tokenize(contents: &str) -> Vec<CssToken> {
    let source = Source::new(
      1,
      PathBuf::from("in.css"),
      "in.css".to_string(),
      contents.to_string(),
      Loader::Css,
    );
    let log = Log::new(0);
    CssLexer::new(&source, &log).tokenize()
  }

  #[test]
  fn test_basic_tokens() {
    let tokens = tokenize("a { color: #fff; }");
    let kinds: Vec<CssTokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
      kinds,
      vec![
        CssTokenKind::Ident,
        CssTokenKind::OpenBrace,
        CssTokenKind::Ident,
        CssTokenKind::Colon,
        CssTokenKind::Hash,
        CssTokenKind::Semicolon,
        CssTokenKind::CloseBrace,
        CssTokenKind::Eof,
      ]
    );
  }

  #[test]
  fn test_ws_before_flags() {
    let tokens = tokenize("a+b c>d");
    assert!(!tokens[1].ws_before); // +
    assert!(!tokens[2].ws_before); // b
    assert!(tokens[3].ws_before); // c
    assert!(!tokens[4].ws_before); // >
  }

  #[test]
  fn test_dimensions_and_percentages() {
    let tokens = tokenize("10px 50% 1.5e2 -3px");
    assert_eq!(tokens[0].text.as_str(), "10px");
    assert_eq!(tokens[1].text.as_str(), "50%");
    assert_eq!(tokens[2].text.as_str(), "1.5e2");
    assert_eq!(tokens[3].text.as_str(), "-3px");
    assert!(tokens[..4].iter().all(|t| t.kind == CssTokenKind::Num));
  }

  #[test]
  fn test_url_tokens() {
    let tokens = tokenize("url(image.png) url(\"quoted.png\")");
    assert_eq!(tokens[0].kind, CssTokenKind::Url);
    assert_eq!(tokens[0].text.as_str(), "url(image.png)");
    assert_eq!(tokens[1].kind, CssTokenKind::Function);
    assert_eq!(tokens[2].kind, CssTokenKind::Str);
  }

  #[test]
  fn test_at_keyword_and_function() {
    let tokens = tokenize("@media calc(1px + 2px)");
    assert_eq!(tokens[0].kind, CssTokenKind::AtKeyword);
    assert_eq!(tokens[0].text.as_str(), "@media");
    assert_eq!(tokens[1].kind, CssTokenKind::Function);
    assert_eq!(tokens[1].text.as_str(), "calc(");
  }

  #[test]
  fn test_preserved_comment() {
    let tokens = tokenize("/*! license */ a {}");
    assert_eq!(tokens[0].kind, CssTokenKind::Comment);
    assert_eq!(tokens[1].kind, CssTokenKind::Ident);
  }
}
