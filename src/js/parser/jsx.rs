//! JSX parsing and lowering. `<Name attr={1} />` becomes a call to the
//! configured factory (classic transform) or to `jsx`/`jsxs` imported from
//! `<importSource>/jsx-runtime` (automatic transform).

use super::expr::Level;
use super::Parser;
use crate::graph::ImportKind;
use crate::interner::Atom;
use crate::js::ast::*;
use crate::js::lexer::T;
use crate::options::JsxMode;
use crate::source::{Loc, Range};

impl<'a> Parser<'a> {
  /// Parse one JSX element or fragment. Entry: the current token is `<`.
  /// Exit: the current token is the final `>` of the element (not consumed,
  /// so enclosing JSX text scanning can resume from it).
  pub(super) fn parse_jsx_element(&mut self, loc: Loc) -> ExprId {
    self.lexer.next(); // '<'

    // Fragment: `<>`
    if self.lexer.token.kind == T::GreaterThan {
      let children = self.parse_jsx_children(loc);
      return self.build_jsx(loc, None, Vec::new(), children);
    }

    let name = self.parse_jsx_name();

    // Attributes
    let mut attrs: Vec<Prop> = Vec::new();
    loop {
      match self.lexer.token.kind {
        T::Slash => {
          self.lexer.next();
          if self.lexer.token.kind != T::GreaterThan {
            let range = self.lexer.token.range();
            self
              .log
              .add_error(Some(self.source), range, "Expected \">\"".to_string());
          }
          // Self-closing: current token is `>`
          return self.build_jsx(loc, Some(name), attrs, Vec::new());
        }
        T::GreaterThan => {
          let children = self.parse_jsx_children(loc);
          return self.build_jsx(loc, Some(name), attrs, children);
        }
        T::OpenBrace => {
          // Spread attribute: `{...expr}`
          self.lexer.next();
          self.expect(T::DotDotDot, "\"...\"");
          let value = self.parse_expr(Level::Comma);
          self.expect(T::CloseBrace, "\"}\"");
          attrs.push(Prop {
            kind: PropKind::Spread,
            is_computed: false,
            is_shorthand: false,
            key: value,
            value,
          });
        }
        T::Ident | T::Str => {
          let attr_loc = self.loc();
          let attr_name = self.parse_jsx_attr_name();
          let key = self.ast.alloc_expr(attr_loc, EData::String(attr_name));
          let value = if self.eat(T::Equals) {
            match self.lexer.token.kind {
              T::Str => {
                let v = self.lexer.token.value;
                let v_loc = self.loc();
                self.lexer.next();
                self.ast.alloc_expr(v_loc, EData::String(v))
              }
              T::OpenBrace => {
                self.lexer.next();
                let v = self.parse_expr(Level::Comma);
                self.expect(T::CloseBrace, "\"}\"");
                v
              }
              _ => {
                let range = self.lexer.token.range();
                self
                  .log
                  .add_error(Some(self.source), range, "Expected a JSX attribute value".to_string());
                self.ast.alloc_expr(attr_loc, EData::Missing)
              }
            }
          } else {
            self.ast.alloc_expr(attr_loc, EData::Bool(true))
          };
          attrs.push(Prop {
            kind: PropKind::Normal,
            is_computed: false,
            is_shorthand: false,
            key,
            value,
          });
        }
        _ => {
          // Keywords are legal attribute names too
          if crate::js::lexer::is_identifier(self.lexer.raw()) {
            let attr_loc = self.loc();
            let attr_name = self.parse_jsx_attr_name();
            let key = self.ast.alloc_expr(attr_loc, EData::String(attr_name));
            let value = if self.eat(T::Equals) {
              match self.lexer.token.kind {
                T::Str => {
                  let v = self.lexer.token.value;
                  let v_loc = self.loc();
                  self.lexer.next();
                  self.ast.alloc_expr(v_loc, EData::String(v))
                }
                T::OpenBrace => {
                  self.lexer.next();
                  let v = self.parse_expr(Level::Comma);
                  self.expect(T::CloseBrace, "\"}\"");
                  v
                }
                _ => self.ast.alloc_expr(attr_loc, EData::Missing),
              }
            } else {
              self.ast.alloc_expr(attr_loc, EData::Bool(true))
            };
            attrs.push(Prop {
              kind: PropKind::Normal,
              is_computed: false,
              is_shorthand: false,
              key,
              value,
            });
            continue;
          }
          let range = self.lexer.token.range();
          self
            .log
            .add_error(Some(self.source), range, "Expected a JSX attribute or \">\"".to_string());
          return self.build_jsx(loc, Some(name), attrs, Vec::new());
        }
      }
    }
  }

  /// Children loop. Entry: current token is the opening tag's `>`. Exit:
  /// current token is the closing tag's `>`.
  fn parse_jsx_children(&mut self, loc: Loc) -> Vec<ExprId> {
    let mut children = Vec::new();
    loop {
      let (text_start, raw) = self.lexer.scan_jsx_text();
      if let Some(text) = cook_jsx_text(raw.as_str()) {
        let text_loc = Loc(text_start);
        children.push(self.ast.alloc_expr(text_loc, EData::String(Atom::new(&text))));
      }
      match self.lexer.token.kind {
        T::OpenBrace => {
          self.lexer.next();
          if self.lexer.token.kind == T::CloseBrace {
            // `{}` is an empty expression container
          } else if self.lexer.token.kind == T::DotDotDot {
            // `{...children}` spreads into the child list
            self.lexer.next();
            let value = self.parse_expr(Level::Comma);
            let child_loc = self.ast.expr(value).loc;
            children.push(self.ast.alloc_expr(child_loc, EData::Spread(value)));
          } else {
            children.push(self.parse_expr(Level::Comma));
          }
          if self.lexer.token.kind != T::CloseBrace {
            let range = self.lexer.token.range();
            self
              .log
              .add_error(Some(self.source), range, "Expected \"}\"".to_string());
            return children;
          }
          // The `}` stays current so text scanning resumes after it
        }
        T::LessThan => {
          if self.peek_first_byte() == Some(b'/') {
            // Closing tag
            self.lexer.next(); // '<'
            self.lexer.next(); // '/'
            while !matches!(self.lexer.token.kind, T::GreaterThan | T::Eof) {
              self.lexer.next();
            }
            return children;
          }
          let child_loc = self.loc();
          let child = self.parse_jsx_element(child_loc);
          children.push(child);
          // The child's final `>` stays current
        }
        _ => {
          let range = Range::new(loc.0, loc.0 + 1);
          self
            .log
            .add_error(Some(self.source), range, "Unterminated JSX element".to_string());
          return children;
        }
      }
    }
  }

  /// A JSX element name: `div`, `Foo.Bar`, `svg-icon`. Lowercase and dashed
  /// names are intrinsic elements (string literals); everything else is an
  /// identifier path.
  fn parse_jsx_name(&mut self) -> ExprId {
    let loc = self.loc();
    let mut text = self.lexer.token.value.as_str().to_string();
    let mut end = self.lexer.token.end;
    self.lexer.next();

    // Merge dashed and namespaced segments that are byte-adjacent
    loop {
      let adjacent = self.lexer.token.start == end;
      match self.lexer.token.kind {
        T::Minus if adjacent => {
          text.push('-');
          end = self.lexer.token.end;
          self.lexer.next();
          if self.lexer.token.kind == T::Ident && self.lexer.token.start == end {
            text.push_str(self.lexer.token.value.as_str());
            end = self.lexer.token.end;
            self.lexer.next();
            continue;
          }
        }
        T::Colon if adjacent => {
          text.push(':');
          end = self.lexer.token.end;
          self.lexer.next();
          if self.lexer.token.kind == T::Ident && self.lexer.token.start == end {
            text.push_str(self.lexer.token.value.as_str());
            end = self.lexer.token.end;
            self.lexer.next();
            continue;
          }
        }
        _ => break,
      }
    }

    let is_intrinsic = text.contains('-')
      || text.contains(':')
      || text.chars().next().map_or(true, |c| c.is_ascii_lowercase());

    if is_intrinsic {
      return self.ast.alloc_expr(loc, EData::String(Atom::new(&text)));
    }

    // A component reference, possibly dotted: `Foo.Bar`
    let r = self.ref_symbol(Atom::new(&text));
    let mut e = self.ast.alloc_expr(loc, EData::Ident(r));
    while self.lexer.token.kind == T::Dot {
      self.lexer.next();
      let name = self.lexer.token.value;
      self.expect(T::Ident, "an identifier");
      e = self.ast.alloc_expr(
        loc,
        EData::Dot {
          target: e,
          name,
          optional: false,
        },
      );
    }
    e
  }

  fn parse_jsx_attr_name(&mut self) -> Atom {
    let mut text = self.lexer.token.value.as_str().to_string();
    let mut end = self.lexer.token.end;
    self.lexer.next();
    loop {
      let adjacent = self.lexer.token.start == end;
      match self.lexer.token.kind {
        T::Minus | T::Colon if adjacent => {
          text.push(if self.lexer.token.kind == T::Minus { '-' } else { ':' });
          end = self.lexer.token.end;
          self.lexer.next();
          if self.lexer.token.kind == T::Ident && self.lexer.token.start == end {
            text.push_str(self.lexer.token.value.as_str());
            end = self.lexer.token.end;
            self.lexer.next();
            continue;
          }
        }
        _ => break,
      }
    }
    Atom::new(&text)
  }

  /// Assemble the factory call for an element (`name: None` is a fragment).
  fn build_jsx(&mut self, loc: Loc, name: Option<ExprId>, attrs: Vec<Prop>, children: Vec<ExprId>) -> ExprId {
    match self.opts.jsx {
      JsxMode::Transform => {
        let factory = self.jsx_factory_expr(loc, false);
        let name_expr = match name {
          Some(n) => n,
          None => self.jsx_factory_expr(loc, true),
        };
        let props = if attrs.is_empty() {
          self.ast.alloc_expr(loc, EData::Null)
        } else {
          self.maybe_lower_object_spread(loc, attrs)
        };
        let mut args = vec![name_expr, props];
        args.extend(children);
        self.ast.alloc_expr(
          loc,
          EData::Call {
            target: factory,
            args,
            optional: false,
            is_pure: false,
          },
        )
      }
      JsxMode::Automatic => {
        let name_expr = match name {
          Some(n) => n,
          None => {
            let r = self.jsx_runtime_ref("Fragment");
            self.ast.alloc_expr(loc, EData::Ident(r))
          }
        };

        // `key` becomes the third argument, not a prop
        let mut key_arg = None;
        let mut props: Vec<Prop> = Vec::new();
        for attr in attrs {
          let is_key = !attr.is_computed
            && attr.kind == PropKind::Normal
            && matches!(self.ast.expr(attr.key).data, EData::String(s) if s.as_str() == "key");
          if is_key {
            key_arg = Some(attr.value);
          } else {
            props.push(attr);
          }
        }

        // Children fold into the props object
        let use_jsxs = children.len() > 1;
        if !children.is_empty() {
          let children_key = self.ast.alloc_expr(loc, EData::String(Atom::new("children")));
          let children_value = if use_jsxs {
            self.ast.alloc_expr(loc, EData::Array { items: children })
          } else {
            children[0]
          };
          props.push(Prop {
            kind: PropKind::Normal,
            is_computed: false,
            is_shorthand: false,
            key: children_key,
            value: children_value,
          });
        }
        let props_expr = self.maybe_lower_object_spread(loc, props);

        let helper = if use_jsxs { "jsxs" } else { "jsx" };
        let r = self.jsx_runtime_ref(helper);
        let target = self.ast.alloc_expr(loc, EData::Ident(r));
        let mut args = vec![name_expr, props_expr];
        if let Some(key) = key_arg {
          args.push(key);
        }
        self.ast.alloc_expr(
          loc,
          EData::Call {
            target,
            args,
            optional: false,
            is_pure: false,
          },
        )
      }
    }
  }

  fn jsx_factory_expr(&mut self, loc: Loc, fragment: bool) -> ExprId {
    let path = if fragment {
      self.opts.jsx_fragment.clone()
    } else {
      self.opts.jsx_factory.clone()
    };
    let first = path.first().copied().unwrap_or_else(|| Atom::new("React"));
    let r = self.ref_symbol(first);
    let mut e = self.ast.alloc_expr(loc, EData::Ident(r));
    for name in path.into_iter().skip(1) {
      e = self.ast.alloc_expr(
        loc,
        EData::Dot {
          target: e,
          name,
          optional: false,
        },
      );
    }
    e
  }

  /// An import of `jsx`/`jsxs`/`Fragment` from the configured runtime
  /// module, created once per file.
  fn jsx_runtime_ref(&mut self, helper: &str) -> Ref {
    let atom = Atom::new(helper);
    if let Some(&r) = self.jsx_imports.get(&atom) {
      *self.cur_uses.entry(r).or_insert(0) += 1;
      self.symbols[r.inner as usize].use_count_estimate += 1;
      return r;
    }
    let record = match self.jsx_record {
      Some(record) => record,
      None => {
        let specifier = Atom::new(&format!("{}/jsx-runtime", self.opts.jsx_import_source));
        let record = self.add_import_record(ImportKind::Stmt, specifier, Range::default());
        self.jsx_record = Some(record);
        record
      }
    };
    let r = self.new_symbol(atom, SymbolKind::Import);
    self.ast.named_imports.insert(
      r,
      NamedImport {
        alias: atom,
        alias_loc: Loc(0),
        import_record_index: record,
        is_exported: false,
      },
    );
    self.jsx_imports.insert(atom, r);
    self.symbols[r.inner as usize].use_count_estimate = 1;
    *self.cur_uses.entry(r).or_insert(0) += 1;
    r
  }
}

/// Collapse JSX text the way the original transforms do: lines are trimmed,
/// empty lines dropped, and the remainder joined with single spaces. Basic
/// HTML entities are decoded.
fn cook_jsx_text(raw: &str) -> Option<String> {
  if raw.is_empty() {
    return None;
  }
  if !raw.contains('\n') {
    // Single-line text is significant as-is, even when all whitespace
    return Some(decode_entities(raw));
  }
  let lines: Vec<&str> = raw
    .split('\n')
    .map(|line| line.trim())
    .filter(|line| !line.is_empty())
    .collect();
  if lines.is_empty() {
    return None;
  }
  Some(decode_entities(&lines.join(" ")))
}

fn decode_entities(text: &str) -> String {
  if !text.contains('&') {
    return text.to_string();
  }
  let mut out = String::with_capacity(text.len());
  let mut rest = text;
  while let Some(pos) = rest.find('&') {
    out.push_str(&rest[..pos]);
    rest = &rest[pos..];
    let end = match rest.find(';') {
      Some(end) if end <= 12 => end,
      _ => {
        out.push('&');
        rest = &rest[1..];
        continue;
      }
    };
    let entity = &rest[1..end];
    let decoded = match entity {
      "amp" => Some('&'),
      "lt" => Some('<'),
      "gt" => Some('>'),
      "quot" => Some('"'),
      "apos" => Some('\''),
      "nbsp" => Some('\u{a0}'),
      _ => {
        if let Some(num) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
          u32::from_str_radix(num, 16).ok().and_then(char::from_u32)
        } else if let Some(num) = entity.strip_prefix('#') {
          num.parse::<u32>().ok().and_then(char::from_u32)
        } else {
          None
        }
      }
    };
    match decoded {
      Some(c) => {
        out.push(c);
        rest = &rest[end + 1..];
      }
      None => {
        out.push('&');
        rest = &rest[1..];
      }
    }
  }
  out.push_str(rest);
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cook_jsx_text() {
    assert_eq!(cook_jsx_text("  \n  "), None);
    assert_eq!(cook_jsx_text("hello"), Some("hello".to_string()));
    assert_eq!(cook_jsx_text("  a\n   b  \n"), Some("a b".to_string()));
    assert_eq!(cook_jsx_text(" "), Some(" ".to_string()));
  }

  #[test]
  fn test_decode_entities() {
    assert_eq!(decode_entities("a &amp; b"), "a & b");
    assert_eq!(decode_entities("&lt;x&gt;"), "<x>");
    assert_eq!(decode_entities("&#65;&#x42;"), "AB");
    assert_eq!(decode_entities("a & b"), "a & b");
  }
}
