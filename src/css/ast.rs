//! CSS syntax tree. Tokens inside rules preserve their whitespace-before
//! flags so the printer can minify deterministically (`a+b c>d~e`).

use crate::graph::ImportRecord;
use crate::interner::Atom;
use crate::source::Loc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CssTokenKind {
  Ident,
  /// `name(`; the opening paren is part of the token.
  Function,
  AtKeyword,
  Hash,
  Str,
  BadStr,
  Url,
  BadUrl,
  /// Numbers, percentages, and dimensions keep their raw text.
  Num,
  Delim,
  Colon,
  Semicolon,
  Comma,
  OpenBrace,
  CloseBrace,
  OpenParen,
  CloseParen,
  OpenBracket,
  CloseBracket,
  Cdo,
  Cdc,
  /// A `/*! ... */` comment preserved through minification.
  Comment,
  Eof,
}

#[derive(Clone, Debug)]
pub struct CssToken {
  pub kind: CssTokenKind,
  /// Raw text exactly as written (for `Str` this includes the quotes).
  pub text: Atom,
  pub loc: Loc,
  /// There was whitespace (or a comment) before this token.
  pub ws_before: bool,
}

#[derive(Clone, Debug)]
pub struct Declaration {
  pub name: Atom,
  pub value: Vec<CssToken>,
  pub important: bool,
  pub loc: Loc,
}

#[derive(Clone, Debug)]
pub struct KeyframeBlock {
  pub selector: Vec<CssToken>,
  pub decls: Vec<Rule>,
}

#[derive(Clone, Debug)]
pub enum Rule {
  AtCharset {
    loc: Loc,
    charset: Atom,
  },
  AtImport {
    loc: Loc,
    record: u32,
    /// Media-query tail tokens after the specifier.
    tail: Vec<CssToken>,
  },
  AtKeyframes {
    loc: Loc,
    /// `@keyframes` or a vendor-prefixed variant.
    at_name: Atom,
    name: Atom,
    blocks: Vec<KeyframeBlock>,
  },
  AtNamespace {
    loc: Loc,
    prefix: Option<Atom>,
    url: Atom,
  },
  /// `@media`, `@supports`, `@layer` with a nested rule block.
  KnownAt {
    loc: Loc,
    name: Atom,
    prelude: Vec<CssToken>,
    rules: Vec<Rule>,
  },
  /// Any other at-rule, preserved as raw tokens.
  UnknownAt {
    loc: Loc,
    name: Atom,
    prelude: Vec<CssToken>,
    block: Option<Vec<CssToken>>,
  },
  /// A style rule whose prelude parsed as a selector list.
  Selector {
    loc: Loc,
    selectors: Vec<CssToken>,
    decls: Vec<Rule>,
  },
  /// A qualified rule whose prelude is kept as raw tokens.
  Qualified {
    loc: Loc,
    prelude: Vec<CssToken>,
    decls: Vec<Rule>,
  },
  Declaration(Declaration),
  /// Malformed declaration recovered as raw tokens.
  BadDeclaration {
    loc: Loc,
    tokens: Vec<CssToken>,
  },
  Comment {
    loc: Loc,
    text: Atom,
  },
}

#[derive(Debug, Default)]
pub struct CssAst {
  pub rules: Vec<Rule>,
  pub import_records: Vec<ImportRecord>,
}
