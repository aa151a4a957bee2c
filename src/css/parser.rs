//! CSS parser: tokens in, the rule tree of `ast.rs` out. `@import` and
//! `url(...)` produce import records so the graph builder can follow them.

use crate::css::ast::*;
use crate::css::lexer::CssLexer;
use crate::graph::{ImportKind, ImportRecord};
use crate::interner::Atom;
use crate::logger::Log;
use crate::source::{Loc, Range, Source};

pub struct CssParser<'a> {
  source: &'a Source,
  log: &'a Log,
  tokens: Vec<CssToken>,
  pos: usize,
  ast: CssAst,
}

impl<'a> CssParser<'a> {
  pub fn new(source: &'a Source, log: &'a Log) -> CssParser<'a> {
    let tokens = CssLexer::new(source, log).tokenize();
    CssParser {
      source,
      log,
      tokens,
      pos: 0,
      ast: CssAst::default(),
    }
  }

  pub fn parse(mut self) -> CssAst {
    let rules = self.parse_rule_list(true);
    self.ast.rules = rules;
    self.ast
  }

  fn peek(&self) -> &CssToken {
    &self.tokens[self.pos.min(self.tokens.len() - 1)]
  }

  fn bump(&mut self) -> CssToken {
    let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
    if self.pos < self.tokens.len() - 1 {
      self.pos += 1;
    }
    token
  }

  fn at_eof(&self) -> bool {
    self.peek().kind == CssTokenKind::Eof
  }

  fn add_import_record(&mut self, kind: ImportKind, specifier: Atom, loc: Loc) -> u32 {
    let index = self.ast.import_records.len() as u32;
    self.ast.import_records.push(ImportRecord {
      kind,
      specifier,
      range: Range::new(loc.0, loc.0 + specifier.as_str().len() as u32),
      source_index: None,
      is_external: false,
      is_internal: false,
    });
    index
  }

  fn parse_rule_list(&mut self, top_level: bool) -> Vec<Rule> {
    let mut rules = Vec::new();
    loop {
      match self.peek().kind {
        CssTokenKind::Eof => return rules,
        CssTokenKind::CloseBrace if !top_level => return rules,
        CssTokenKind::CloseBrace => {
          // Stray close brace at the top level
          let token = self.bump();
          self.log.add_error(
            Some(self.source),
            Range::new(token.loc.0, token.loc.0 + 1),
            "Unexpected \"}\"".to_string(),
          );
        }
        CssTokenKind::Cdo | CssTokenKind::Cdc => {
          self.bump();
        }
        CssTokenKind::Comment => {
          let token = self.bump();
          rules.push(Rule::Comment {
            loc: token.loc,
            text: token.text,
          });
        }
        CssTokenKind::AtKeyword => rules.push(self.parse_at_rule()),
        CssTokenKind::Semicolon => {
          self.bump();
        }
        _ => rules.push(self.parse_qualified_rule()),
      }
    }
  }

  fn parse_at_rule(&mut self) -> Rule {
    let at = self.bump();
    let loc = at.loc;
    let name_text = at.text.as_str();
    let name_lower = name_text[1..].to_ascii_lowercase();

    match name_lower.as_str() {
      "charset" => {
        let charset = if self.peek().kind == CssTokenKind::Str {
          self.bump().text
        } else {
          Atom::new("\"utf-8\"")
        };
        self.eat_semicolon();
        Rule::AtCharset { loc, charset }
      }
      "import" => {
        let specifier = match self.peek().kind {
          CssTokenKind::Str => {
            let token = self.bump();
            Atom::new(unquote(token.text.as_str()))
          }
          CssTokenKind::Url => {
            let token = self.bump();
            Atom::new(unwrap_url(token.text.as_str()))
          }
          CssTokenKind::Function if self.peek().text.as_str().eq_ignore_ascii_case("url(") => {
            self.bump();
            let inner = if self.peek().kind == CssTokenKind::Str {
              Atom::new(unquote(self.bump().text.as_str()))
            } else {
              Atom::new("")
            };
            if self.peek().kind == CssTokenKind::CloseParen {
              self.bump();
            }
            inner
          }
          _ => {
            self.log.add_error(
              Some(self.source),
              Range::new(loc.0, loc.0 + name_text.len() as u32),
              "Expected URL token or string after \"@import\"".to_string(),
            );
            Atom::new("")
          }
        };
        let tail = self.collect_prelude();
        self.eat_semicolon();
        let record = self.add_import_record(ImportKind::ImportRule, specifier, loc);
        Rule::AtImport { loc, record, tail }
      }
      "namespace" => {
        let mut prefix = None;
        if self.peek().kind == CssTokenKind::Ident {
          prefix = Some(self.bump().text);
        }
        let url = match self.peek().kind {
          CssTokenKind::Str | CssTokenKind::Url => self.bump().text,
          _ => Atom::new(""),
        };
        self.eat_semicolon();
        Rule::AtNamespace { loc, prefix, url }
      }
      "keyframes" | "-webkit-keyframes" | "-moz-keyframes" | "-o-keyframes" => {
        let name = if self.peek().kind == CssTokenKind::Ident || self.peek().kind == CssTokenKind::Str {
          self.bump().text
        } else {
          Atom::new("")
        };
        let mut blocks = Vec::new();
        if self.peek().kind == CssTokenKind::OpenBrace {
          self.bump();
          while !self.at_eof() && self.peek().kind != CssTokenKind::CloseBrace {
            let selector = self.collect_prelude();
            if self.peek().kind == CssTokenKind::OpenBrace {
              self.bump();
              let decls = self.parse_declaration_list();
              if self.peek().kind == CssTokenKind::CloseBrace {
                self.bump();
              }
              blocks.push(KeyframeBlock { selector, decls });
            } else {
              break;
            }
          }
          if self.peek().kind == CssTokenKind::CloseBrace {
            self.bump();
          }
        }
        Rule::AtKeyframes {
          loc,
          at_name: at.text,
          name,
          blocks,
        }
      }
      "media" | "supports" | "layer" | "container" | "scope" => {
        let prelude = self.collect_prelude();
        if self.peek().kind == CssTokenKind::OpenBrace {
          self.bump();
          let rules = self.parse_rule_list(false);
          if self.peek().kind == CssTokenKind::CloseBrace {
            self.bump();
          }
          Rule::KnownAt {
            loc,
            name: at.text,
            prelude,
            rules,
          }
        } else {
          // `@layer name;` has no block
          self.eat_semicolon();
          Rule::UnknownAt {
            loc,
            name: at.text,
            prelude,
            block: None,
          }
        }
      }
      _ => {
        let prelude = self.collect_prelude();
        let block = if self.peek().kind == CssTokenKind::OpenBrace {
          Some(self.collect_balanced_block())
        } else {
          self.eat_semicolon();
          None
        };
        Rule::UnknownAt {
          loc,
          name: at.text,
          prelude,
          block,
        }
      }
    }
  }

  /// Tokens up to `{`, `;`, `}`, or EOF. Records `url(...)` tokens on the way.
  fn collect_prelude(&mut self) -> Vec<CssToken> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    loop {
      match self.peek().kind {
        CssTokenKind::Eof => return tokens,
        CssTokenKind::OpenBrace | CssTokenKind::Semicolon if depth == 0 => return tokens,
        CssTokenKind::CloseBrace if depth == 0 => return tokens,
        CssTokenKind::OpenParen | CssTokenKind::OpenBracket | CssTokenKind::Function => {
          depth += 1;
          tokens.push(self.bump());
        }
        CssTokenKind::CloseParen | CssTokenKind::CloseBracket => {
          depth = depth.saturating_sub(1);
          tokens.push(self.bump());
        }
        CssTokenKind::Url => {
          let token = self.bump();
          let specifier = Atom::new(unwrap_url(token.text.as_str()));
          self.add_import_record(ImportKind::UrlToken, specifier, token.loc);
          tokens.push(token);
        }
        _ => tokens.push(self.bump()),
      }
    }
  }

  /// A raw `{ ... }` block with balanced braces, including the braces.
  fn collect_balanced_block(&mut self) -> Vec<CssToken> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    loop {
      match self.peek().kind {
        CssTokenKind::Eof => return tokens,
        CssTokenKind::OpenBrace => {
          depth += 1;
          tokens.push(self.bump());
        }
        CssTokenKind::CloseBrace => {
          depth -= 1;
          tokens.push(self.bump());
          if depth == 0 {
            return tokens;
          }
        }
        _ => tokens.push(self.bump()),
      }
    }
  }

  fn parse_qualified_rule(&mut self) -> Rule {
    let loc = self.peek().loc;
    let prelude = self.collect_prelude();
    if self.peek().kind != CssTokenKind::OpenBrace {
      // A qualified rule without a block is malformed
      self.log.add_error(
        Some(self.source),
        Range::new(loc.0, loc.0 + 1),
        "Expected \"{\"".to_string(),
      );
      self.eat_semicolon();
      return Rule::Qualified {
        loc,
        prelude,
        decls: Vec::new(),
      };
    }
    self.bump();
    let decls = self.parse_declaration_list();
    if self.peek().kind == CssTokenKind::CloseBrace {
      self.bump();
    }

    let looks_like_selector = prelude.iter().all(|t| {
      !matches!(
        t.kind,
        CssTokenKind::Semicolon | CssTokenKind::OpenBrace | CssTokenKind::BadStr | CssTokenKind::BadUrl
      )
    });
    if looks_like_selector {
      Rule::Selector {
        loc,
        selectors: prelude,
        decls,
      }
    } else {
      Rule::Qualified { loc, prelude, decls }
    }
  }

  fn parse_declaration_list(&mut self) -> Vec<Rule> {
    let mut decls = Vec::new();
    loop {
      match self.peek().kind {
        CssTokenKind::Eof | CssTokenKind::CloseBrace => return decls,
        CssTokenKind::Semicolon => {
          self.bump();
        }
        CssTokenKind::Comment => {
          let token = self.bump();
          decls.push(Rule::Comment {
            loc: token.loc,
            text: token.text,
          });
        }
        CssTokenKind::AtKeyword => {
          // Nested at-rules appear inside declaration blocks (`@media` in
          // nesting-aware CSS); parse them as rules
          decls.push(self.parse_at_rule());
        }
        CssTokenKind::Ident => decls.push(self.parse_declaration()),
        _ => {
          // Could be a nested selector (CSS nesting) or garbage; try a
          // qualified rule, falling back to bad-declaration recovery
          decls.push(self.parse_bad_declaration());
        }
      }
    }
  }

  fn parse_declaration(&mut self) -> Rule {
    let name_token = self.bump();
    let loc = name_token.loc;
    if self.peek().kind != CssTokenKind::Colon {
      // `a { color }` or a nested selector; recover to the next boundary
      let mut tokens = vec![name_token];
      tokens.extend(self.collect_prelude());
      if self.peek().kind == CssTokenKind::OpenBrace {
        tokens.extend(self.collect_balanced_block());
      }
      return Rule::BadDeclaration { loc, tokens };
    }
    self.bump(); // ':'

    let mut value = Vec::new();
    let mut depth = 0usize;
    loop {
      match self.peek().kind {
        CssTokenKind::Eof => break,
        CssTokenKind::Semicolon if depth == 0 => break,
        CssTokenKind::CloseBrace if depth == 0 => break,
        CssTokenKind::OpenParen | CssTokenKind::OpenBracket | CssTokenKind::Function => {
          depth += 1;
          value.push(self.bump());
        }
        CssTokenKind::CloseParen | CssTokenKind::CloseBracket => {
          depth = depth.saturating_sub(1);
          value.push(self.bump());
        }
        CssTokenKind::Url => {
          let token = self.bump();
          let specifier = Atom::new(unwrap_url(token.text.as_str()));
          self.add_import_record(ImportKind::UrlToken, specifier, token.loc);
          value.push(token);
        }
        _ => value.push(self.bump()),
      }
    }

    // Trailing `!important`
    let mut important = false;
    if value.len() >= 2 {
      let last = &value[value.len() - 1];
      let prev = &value[value.len() - 2];
      if last.kind == CssTokenKind::Ident
        && last.text.as_str().eq_ignore_ascii_case("important")
        && prev.kind == CssTokenKind::Delim
        && prev.text.as_str() == "!"
      {
        important = true;
        value.truncate(value.len() - 2);
      }
    }

    Rule::Declaration(Declaration {
      name: name_token.text,
      value,
      important,
      loc,
    })
  }

  fn parse_bad_declaration(&mut self) -> Rule {
    let loc = self.peek().loc;
    let mut tokens = self.collect_prelude();
    if self.peek().kind == CssTokenKind::OpenBrace {
      tokens.extend(self.collect_balanced_block());
    } else {
      self.eat_semicolon();
    }
    Rule::BadDeclaration { loc, tokens }
  }

  fn eat_semicolon(&mut self) {
    if self.peek().kind == CssTokenKind::Semicolon {
      self.bump();
    }
  }
}

/// Strip the quotes from a string token's raw text.
pub fn unquote(raw: &str) -> &str {
  let bytes = raw.as_bytes();
  if bytes.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') && bytes[bytes.len() - 1] == bytes[0] {
    &raw[1..raw.len() - 1]
  } else {
    raw
  }
}

/// Extract the target from a raw `url(...)` token.
pub fn unwrap_url(raw: &str) -> &str {
  let inner = raw
    .strip_prefix("url(")
    .or_else(|| raw.strip_prefix("URL("))
    .unwrap_or(raw);
  let inner = inner.strip_suffix(')').unwrap_or(inner);
  unquote(inner.trim())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::options::Loader;
  use std::path::PathBuf;

  fn parse(contents: &str) -> CssAst {
    let source = Source::new(
      1,
      PathBuf::from("in.css"),
      "in.css".to_string(),
      contents.to_string(),
      Loader::Css,
    );
    let log = Log::new(0);
    CssParser::new(&source, &log).parse()
  }

  #[test]
  fn test_selector_rule() {
    let ast = parse("a.cls > b { color: red; margin: 0 auto !important; }");
    assert_eq!(ast.rules.len(), 1);
    match &ast.rules[0] {
      Rule::Selector { decls, .. } => {
        assert_eq!(decls.len(), 2);
        match &decls[1] {
          Rule::Declaration(decl) => {
            assert_eq!(decl.name.as_str(), "margin");
            assert!(decl.important);
          }
          other => panic!("expected declaration, got {:?}", other),
        }
      }
      other => panic!("expected selector rule, got {:?}", other),
    }
  }

  #[test]
  fn test_at_import_creates_record() {
    let ast = parse("@import \"./theme.css\";\n@import url(base.css);\nbody { x: url(img.png); }");
    assert_eq!(ast.import_records.len(), 3);
    assert_eq!(ast.import_records[0].kind, ImportKind::ImportRule);
    assert_eq!(ast.import_records[0].specifier.as_str(), "./theme.css");
    assert_eq!(ast.import_records[1].specifier.as_str(), "base.css");
    assert_eq!(ast.import_records[2].kind, ImportKind::UrlToken);
    assert_eq!(ast.import_records[2].specifier.as_str(), "img.png");
  }

  #[test]
  fn test_media_block_nests_rules() {
    let ast = parse("@media (min-width: 600px) { a { color: blue } }");
    match &ast.rules[0] {
      Rule::KnownAt { name, rules, .. } => {
        assert_eq!(name.as_str(), "@media");
        assert_eq!(rules.len(), 1);
      }
      other => panic!("expected known at-rule, got {:?}", other),
    }
  }

  #[test]
  fn test_keyframes() {
    let ast = parse("@keyframes spin { from { transform: none } to { transform: rotate(1turn) } }");
    match &ast.rules[0] {
      Rule::AtKeyframes { name, blocks, .. } => {
        assert_eq!(name.as_str(), "spin");
        assert_eq!(blocks.len(), 2);
      }
      other => panic!("expected keyframes, got {:?}", other),
    }
  }

  #[test]
  fn test_bad_declaration_recovers() {
    let ast = parse("a { color } b { color: red }");
    assert_eq!(ast.rules.len(), 2);
    match &ast.rules[0] {
      Rule::Selector { decls, .. } => {
        assert!(matches!(decls[0], Rule::BadDeclaration { .. }));
      }
      other => panic!("expected selector rule, got {:?}", other),
    }
  }

  #[test]
  fn test_unknown_at_rule_preserved() {
    let ast = parse("@font-face { font-family: X; src: url(x.woff2); }");
    assert!(matches!(ast.rules[0], Rule::UnknownAt { .. }));
  }
}
