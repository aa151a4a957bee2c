//! CSS printer. Whitespace-before flags on tokens decide where a space is
//! required; in minified mode a space survives only where removing it would
//! glue two tokens into one.

use crate::css::ast::*;
use crate::source::LineOffsetTable;
use crate::sourcemap::SourceMapBuilder;

#[derive(Debug, Clone, Copy, Default)]
pub struct CssPrintOptions {
  pub minify: bool,
  pub ascii_only: bool,
}

pub struct CssPrinter<'a> {
  pub out: String,
  opts: CssPrintOptions,
  indent: usize,
  line: u32,
  col: u32,
  map: Option<SourceMapBuilder>,
  table: Option<&'a LineOffsetTable>,
  records: &'a [crate::graph::ImportRecord],
  source_index: u32,
}

impl<'a> CssPrinter<'a> {
  pub fn new(opts: CssPrintOptions) -> CssPrinter<'a> {
    CssPrinter {
      out: String::new(),
      opts,
      indent: 0,
      line: 0,
      col: 0,
      map: None,
      table: None,
      records: &[],
      source_index: 0,
    }
  }

  pub fn set_map(&mut self, map: SourceMapBuilder) {
    self.map = Some(map);
  }

  pub fn take_map(&mut self) -> Option<SourceMapBuilder> {
    self.map.take()
  }

  pub fn print_file(&mut self, ast: &'a CssAst, table: &'a LineOffsetTable, source_index: u32) {
    self.table = Some(table);
    self.records = &ast.import_records;
    self.source_index = source_index;
    for rule in &ast.rules {
      self.print_rule(rule);
    }
  }

  /// Print a pre-filtered rule list (the bundler drops inlined `@import`s).
  pub fn print_rules(&mut self, ast: &'a CssAst, table: &'a LineOffsetTable, source_index: u32, rules: &[&Rule]) {
    self.table = Some(table);
    self.records = &ast.import_records;
    self.source_index = source_index;
    for rule in rules {
      self.print_rule(rule);
    }
  }

  pub fn finish(mut self) -> (String, Option<SourceMapBuilder>) {
    if !self.opts.minify && !self.out.is_empty() && !self.out.ends_with('\n') {
      self.out.push('\n');
    }
    (self.out, self.map)
  }

  fn write(&mut self, text: &str) {
    for b in text.bytes() {
      if b == b'\n' {
        self.line += 1;
        self.col = 0;
      } else {
        self.col += 1;
      }
    }
    self.out.push_str(text);
  }

  fn newline(&mut self) {
    if !self.opts.minify {
      self.write("\n");
      let indent = "  ".repeat(self.indent);
      self.write(&indent);
    }
  }

  fn space(&mut self) {
    if !self.opts.minify {
      self.write(" ");
    }
  }

  fn add_mapping(&mut self, loc: crate::source::Loc) {
    let (line, col, gen_line, gen_col, source_index) = {
      let table = match self.table {
        Some(table) => table,
        None => return,
      };
      if self.map.is_none() {
        return;
      }
      let (line, col) = table.position(loc);
      (line as u32, col as u32, self.line, self.col, self.source_index)
    };
    if let Some(map) = self.map.as_mut() {
      map.add_mapping(source_index, line, col, gen_line, gen_col);
    }
  }

  fn start_rule(&mut self, loc: crate::source::Loc) {
    if !self.out.is_empty() {
      self.newline();
    }
    self.add_mapping(loc);
  }

  fn print_rule(&mut self, rule: &Rule) {
    match rule {
      Rule::AtCharset { loc, charset } => {
        self.start_rule(*loc);
        self.write("@charset ");
        self.write(charset.as_str());
        self.write(";");
      }
      Rule::AtImport { loc, record, tail } => {
        // Internal imports are inlined by the bundler, so a printed @import
        // is always external
        self.start_rule(*loc);
        self.write("@import ");
        let specifier = self.records[*record as usize].specifier;
        let quoted = format!("\"{}\"", specifier.as_str().replace('\\', "\\\\").replace('"', "\\\""));
        self.write(&quoted);
        if !tail.is_empty() {
          self.write(" ");
          self.print_tokens(tail);
        }
        self.write(";");
      }
      Rule::AtNamespace { loc, prefix, url } => {
        self.start_rule(*loc);
        self.write("@namespace ");
        if let Some(prefix) = prefix {
          self.write(prefix.as_str());
          self.write(" ");
        }
        self.write(url.as_str());
        self.write(";");
      }
      Rule::AtKeyframes {
        loc,
        at_name,
        name,
        blocks,
      } => {
        self.start_rule(*loc);
        self.write(at_name.as_str());
        self.write(" ");
        self.write(name.as_str());
        self.space();
        if self.opts.minify {
          self.write("{");
        } else {
          self.write("{");
        }
        self.indent += 1;
        for block in blocks {
          self.newline();
          self.print_tokens(&block.selector);
          self.space();
          self.write("{");
          self.indent += 1;
          self.print_decls(&block.decls);
          self.indent -= 1;
          self.newline();
          self.write("}");
        }
        self.indent -= 1;
        self.newline();
        self.write("}");
      }
      Rule::KnownAt {
        loc,
        name,
        prelude,
        rules,
      } => {
        self.start_rule(*loc);
        self.write(name.as_str());
        if !prelude.is_empty() {
          self.write(" ");
          self.print_tokens(prelude);
        }
        self.space();
        self.write("{");
        self.indent += 1;
        for rule in rules {
          self.print_rule(rule);
        }
        self.indent -= 1;
        self.newline();
        self.write("}");
      }
      Rule::UnknownAt {
        loc,
        name,
        prelude,
        block,
      } => {
        self.start_rule(*loc);
        self.write(name.as_str());
        if !prelude.is_empty() {
          self.write(" ");
          self.print_tokens(prelude);
        }
        match block {
          Some(tokens) => {
            self.space();
            self.print_tokens(tokens);
          }
          None => self.write(";"),
        }
      }
      Rule::Selector { loc, selectors, decls } => {
        self.start_rule(*loc);
        self.print_selector_tokens(selectors);
        self.space();
        self.write("{");
        self.indent += 1;
        self.print_decls(decls);
        self.indent -= 1;
        self.newline();
        self.write("}");
      }
      Rule::Qualified { loc, prelude, decls } => {
        self.start_rule(*loc);
        self.print_tokens(prelude);
        self.space();
        self.write("{");
        self.indent += 1;
        self.print_decls(decls);
        self.indent -= 1;
        self.newline();
        self.write("}");
      }
      Rule::Declaration(decl) => {
        self.start_rule(decl.loc);
        self.print_declaration(decl);
      }
      Rule::BadDeclaration { loc, tokens } => {
        self.start_rule(*loc);
        self.print_tokens(tokens);
        self.write(";");
      }
      Rule::Comment { loc, text } => {
        self.start_rule(*loc);
        self.write(text.as_str());
      }
    }
  }

  fn print_decls(&mut self, decls: &[Rule]) {
    let count = decls.len();
    for (i, decl) in decls.iter().enumerate() {
      match decl {
        Rule::Declaration(declaration) => {
          self.newline();
          self.add_mapping(declaration.loc);
          self.print_declaration_body(declaration);
          // The final semicolon in a block is dropped when minifying
          if !(self.opts.minify && i == count - 1) {
            self.write(";");
          }
        }
        other => self.print_rule(other),
      }
    }
  }

  fn print_declaration(&mut self, decl: &Declaration) {
    self.print_declaration_body(decl);
    self.write(";");
  }

  fn print_declaration_body(&mut self, decl: &Declaration) {
    self.write(decl.name.as_str());
    self.write(":");
    self.space();
    self.print_tokens(&decl.value);
    if decl.important {
      self.write("!important");
    }
  }

  /// Selector lists tighten around combinators when minifying: `a > b`
  /// becomes `a>b`, but descendant combinators (`a b`) keep their space.
  fn print_selector_tokens(&mut self, tokens: &[CssToken]) {
    self.print_token_run(tokens, true);
  }

  fn print_tokens(&mut self, tokens: &[CssToken]) {
    self.print_token_run(tokens, false);
  }

  fn print_token_run(&mut self, tokens: &[CssToken], selector_mode: bool) {
    let mut prev_last: Option<char> = None;
    for (i, token) in tokens.iter().enumerate() {
      let text = self.token_text(token);
      let first = text.chars().next().unwrap_or(' ');

      let mut emit_space = false;
      if i > 0 && token.ws_before {
        if self.opts.minify {
          if selector_mode && matches!(first, '>' | '+' | '~') {
            // Space collapses into the combinator
            emit_space = false;
          } else if selector_mode && matches!(prev_last, Some('>') | Some('+') | Some('~')) {
            emit_space = false;
          } else if token.kind == CssTokenKind::Comma || prev_last == Some(',') {
            emit_space = false;
          } else {
            // Whitespace between two value/selector tokens is significant
            emit_space = needs_space(prev_last, first);
          }
        } else {
          emit_space = true;
        }
      } else if i > 0 && !token.ws_before {
        emit_space = false;
      }

      if emit_space {
        self.write(" ");
      }
      self.write(&text);
      prev_last = text.chars().last();
    }
  }

  fn token_text(&self, token: &CssToken) -> String {
    let text = token.text.as_str();
    if self.opts.ascii_only && !text.is_ascii() {
      let mut out = String::with_capacity(text.len());
      for c in text.chars() {
        if c.is_ascii() {
          out.push(c);
        } else {
          // CSS escapes terminate with a space when a hex digit could follow
          out.push_str(&format!("\\{:x} ", c as u32));
        }
      }
      out
    } else {
      text.to_string()
    }
  }
}

/// Whether removing the whitespace between two tokens would change how they
/// re-lex (`10px solid` must keep its space; `a>b` must not gain one).
fn needs_space(prev_last: Option<char>, next_first: char) -> bool {
  let prev = match prev_last {
    Some(c) => c,
    None => return false,
  };
  let ident_ish =
    |c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '%' || c == '#' || c == '.' || c == '\\' || !c.is_ascii();
  if ident_ish(prev) && ident_ish(next_first) {
    return true;
  }
  // `*` + `=` and similar do not merge; parens/brackets never need space
  false
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::css::parser::CssParser;
  use crate::logger::Log;
  use crate::options::Loader;
  use crate::source::Source;
  use std::path::PathBuf;

  fn print(contents: &str, minify: bool) -> String {
    let source = Source::new(
      1,
      PathBuf::from("in.css"),
      "in.css".to_string(),
      contents.to_string(),
      Loader::Css,
    );
    let log = Log::new(0);
    let ast = CssParser::new(&source, &log).parse();
    assert!(!log.has_errors(), "parse errors: {:?}", log.take_msgs());
    let mut printer = CssPrinter::new(CssPrintOptions {
      minify,
      ascii_only: false,
    });
    let table = source.line_offsets();
    printer.print_file(&ast, &table, 1);
    printer.finish().0
  }

  #[test]
  fn test_pretty_print() {
    let out = print("a{color:red;margin:0}", false);
    assert_eq!(out, "a {\n  color: red;\n  margin: 0;\n}\n");
  }

  #[test]
  fn test_minify_drops_last_semicolon() {
    let out = print("a { color: red; margin: 0; }", true);
    assert_eq!(out, "a{color:red;margin:0}");
  }

  #[test]
  fn test_minify_selector_combinators() {
    let out = print("a + b c > d ~ e { color: red }", true);
    assert_eq!(out, "a+b c>d~e{color:red}");
  }

  #[test]
  fn test_minified_values_keep_significant_space() {
    let out = print("a { border: 1px solid red }", true);
    assert_eq!(out, "a{border:1px solid red}");
  }

  #[test]
  fn test_important_and_functions() {
    let out = print("a { width: calc(100% - 10px) !important }", true);
    assert_eq!(out, "a{width:calc(100% - 10px)!important}");
  }

  #[test]
  fn test_minify_media() {
    let out = print("@media (min-width: 600px) { a { color: blue } }", true);
    assert_eq!(out, "@media (min-width:600px){a{color:blue}}");
  }

  #[test]
  fn test_print_parse_structural_fixed_point() {
    // Minified output re-parses to a structurally equal AST
    let minified = print("a + b { color: #ff0000; margin: 0 auto }", true);
    let again = print(&minified, true);
    assert_eq!(minified, again);
  }
}
