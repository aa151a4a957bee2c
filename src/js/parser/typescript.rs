//! TypeScript erasure, folded into parsing. Type annotations, `interface`,
//! `type`, `declare`, and ambient contexts are recognized and discarded;
//! `enum` and `namespace` are transformed to runtime constructs.

use super::Parser;
use crate::interner::Atom;
use crate::js::ast::*;
use crate::js::lexer::T;
use crate::source::Loc;

impl<'a> Parser<'a> {
  // ------------------------------------------------------------------
  // Type skipping
  // ------------------------------------------------------------------

  /// Skip a full type expression, including unions, intersections, and
  /// conditional types.
  pub(super) fn skip_ts_type(&mut self) {
    self.skip_ts_type_union();
    while self.lexer.token.kind == T::Extends {
      self.lexer.next();
      self.skip_ts_type_union();
      if self.eat(T::Question) {
        self.skip_ts_type();
        self.expect(T::Colon, "\":\"");
        self.skip_ts_type();
      }
    }
  }

  fn skip_ts_type_union(&mut self) {
    // A leading `|` or `&` is allowed
    while matches!(self.lexer.token.kind, T::Bar | T::Ampersand) {
      self.lexer.next();
    }
    self.skip_ts_type_atom();
    while matches!(self.lexer.token.kind, T::Bar | T::Ampersand) {
      self.lexer.next();
      self.skip_ts_type_atom();
    }
  }

  fn skip_ts_type_atom(&mut self) {
    match self.lexer.token.kind {
      T::OpenBrace => self.skip_balanced(T::OpenBrace, T::CloseBrace),
      T::OpenBracket => self.skip_balanced(T::OpenBracket, T::CloseBracket),
      T::OpenParen => {
        self.skip_balanced(T::OpenParen, T::CloseParen);
        if self.eat(T::EqualsGreaterThan) {
          self.skip_ts_type();
          return;
        }
      }
      T::New => {
        self.lexer.next();
        self.skip_ts_type_atom();
        return;
      }
      T::Minus => {
        self.lexer.next();
        if matches!(self.lexer.token.kind, T::Num | T::BigInt) {
          self.lexer.next();
        }
      }
      T::Str | T::Num | T::BigInt | T::True | T::False | T::Null | T::Void | T::This | T::Import => {
        let was_import = self.lexer.token.kind == T::Import;
        self.lexer.next();
        if was_import && self.lexer.token.kind == T::OpenParen {
          self.skip_balanced(T::OpenParen, T::CloseParen);
        }
      }
      T::NoSubTemplate => self.lexer.next(),
      T::TemplateHead => {
        // Template literal type: `${T}`
        loop {
          self.lexer.next();
          self.skip_ts_type();
          if self.lexer.token.kind != T::CloseBrace {
            break;
          }
          self.lexer.rescan_template_token();
          if self.lexer.token.kind == T::TemplateTail {
            self.lexer.next();
            break;
          }
        }
      }
      T::TypeOf => {
        self.lexer.next();
        self.skip_ts_type_atom();
        return;
      }
      T::Ident => {
        let word = self.lexer.token.value.as_str();
        match word {
          "keyof" | "readonly" | "infer" | "unique" | "asserts" => {
            self.lexer.next();
            self.skip_ts_type_atom();
            return;
          }
          _ => self.lexer.next(),
        }
      }
      _ => {
        // Tolerate anything else so error recovery keeps moving
        self.lexer.next();
      }
    }
    self.skip_ts_type_suffixes();
  }

  fn skip_ts_type_suffixes(&mut self) {
    loop {
      match self.lexer.token.kind {
        T::OpenBracket => self.skip_balanced(T::OpenBracket, T::CloseBracket),
        T::Dot => {
          self.lexer.next();
          if self.lexer.token.kind == T::Ident {
            self.lexer.next();
          }
        }
        T::LessThan => self.skip_ts_type_args(),
        T::Ident if self.lexer.token.value.as_str() == "is" && !self.lexer.token.newline_before => {
          // Type predicate: `x is Foo`
          self.lexer.next();
          self.skip_ts_type();
          return;
        }
        _ => return,
      }
    }
  }

  fn skip_balanced(&mut self, open: T, close: T) {
    debug_assert_eq!(self.lexer.token.kind, open);
    let mut depth = 0usize;
    loop {
      let kind = self.lexer.token.kind;
      if kind == T::Eof {
        return;
      }
      if kind == open {
        depth += 1;
      } else if kind == close {
        depth -= 1;
        if depth == 0 {
          self.lexer.next();
          return;
        }
      }
      self.lexer.next();
    }
  }

  /// Skip `<...>` type arguments or parameters. `>>` closes two levels.
  pub(super) fn skip_ts_type_args(&mut self) {
    debug_assert_eq!(self.lexer.token.kind, T::LessThan);
    let mut depth: i32 = 0;
    loop {
      match self.lexer.token.kind {
        T::Eof => return,
        T::LessThan => depth += 1,
        T::LessThanLessThan => depth += 2,
        T::GreaterThan => depth -= 1,
        T::GreaterThanGreaterThan => depth -= 2,
        T::GreaterThanGreaterThanGreaterThan => depth -= 3,
        T::GreaterThanEquals => depth -= 1,
        T::OpenParen => {
          self.skip_balanced(T::OpenParen, T::CloseParen);
          continue;
        }
        T::OpenBrace => {
          self.skip_balanced(T::OpenBrace, T::CloseBrace);
          continue;
        }
        T::OpenBracket => {
          self.skip_balanced(T::OpenBracket, T::CloseBracket);
          continue;
        }
        _ => {}
      }
      self.lexer.next();
      if depth <= 0 {
        return;
      }
    }
  }

  pub(super) fn skip_ts_type_params(&mut self) {
    self.skip_ts_type_args();
  }

  pub(super) fn try_skip_ts_type_args(&mut self) {
    self.skip_ts_type_args();
  }

  // ------------------------------------------------------------------
  // Erased declarations
  // ------------------------------------------------------------------

  /// `interface Name<T> extends A, B { ... }`; current token is `interface`.
  pub(super) fn skip_ts_interface(&mut self) {
    self.lexer.next(); // interface
    if self.lexer.token.kind == T::Ident {
      self.lexer.next();
    }
    if self.lexer.token.kind == T::LessThan {
      self.skip_ts_type_params();
    }
    if self.eat(T::Extends) {
      loop {
        self.skip_ts_type();
        if !self.eat(T::Comma) {
          break;
        }
      }
    }
    if self.lexer.token.kind == T::OpenBrace {
      self.skip_balanced(T::OpenBrace, T::CloseBrace);
    }
  }

  /// `type Name<T> = ...;`; current token is `type`.
  pub(super) fn skip_ts_type_alias(&mut self) {
    self.lexer.next(); // type
    if self.lexer.token.kind == T::Ident {
      self.lexer.next();
    }
    if self.lexer.token.kind == T::LessThan {
      self.skip_ts_type_params();
    }
    self.expect(T::Equals, "\"=\"");
    self.skip_ts_type();
    self.semicolon();
  }

  /// `declare ...`: skip a whole ambient declaration. Current token is
  /// `declare`.
  pub(super) fn skip_ts_declare(&mut self) {
    self.lexer.next(); // declare
    let mut depth = 0usize;
    loop {
      match self.lexer.token.kind {
        T::Eof => return,
        T::OpenBrace | T::OpenParen | T::OpenBracket => {
          depth += 1;
          self.lexer.next();
        }
        T::CloseParen | T::CloseBracket => {
          if depth == 0 {
            return;
          }
          depth -= 1;
          self.lexer.next();
        }
        T::CloseBrace => {
          if depth == 0 {
            return;
          }
          depth -= 1;
          self.lexer.next();
          if depth == 0 {
            // A top-level brace pair ends the declaration body
            return;
          }
        }
        T::Semicolon if depth == 0 => {
          self.lexer.next();
          return;
        }
        _ if depth == 0 && self.lexer.token.newline_before => return,
        _ => self.lexer.next(),
      }
    }
  }

  /// `import type ... from '...'`; current token is `type`.
  pub(super) fn skip_ts_import_clause(&mut self) {
    loop {
      match self.lexer.token.kind {
        T::Str => {
          self.lexer.next();
          break;
        }
        T::Eof | T::Semicolon => break,
        _ if self.lexer.token.newline_before && self.lexer.token.kind == T::Ident => {
          // Malformed; bail at a statement boundary
          break;
        }
        _ => self.lexer.next(),
      }
    }
    self.semicolon();
  }

  /// `export type {A}` / `export type A = ...`; current token is `type`.
  pub(super) fn skip_ts_export_type(&mut self) {
    if self.peek_first_byte() == Some(b'{') {
      self.lexer.next(); // type
      self.skip_balanced(T::OpenBrace, T::CloseBrace);
      if self.is_contextual("from") {
        self.lexer.next();
        if self.lexer.token.kind == T::Str {
          self.lexer.next();
        }
      }
      self.semicolon();
    } else {
      self.skip_ts_type_alias();
    }
  }

  // ------------------------------------------------------------------
  // Enum lowering
  // ------------------------------------------------------------------

  /// `enum E { A, B = 2 }` becomes
  /// `var E; (function(E) { E[E["A"] = 0] = "A"; ... })(E || (E = {}));`.
  /// Current token is `enum`.
  pub(super) fn parse_ts_enum(&mut self, is_export: bool) -> StmtId {
    let loc = self.loc();
    self.lexer.next(); // enum
    let name = self.lexer.token.value;
    let name_loc = self.loc();
    self.expect(T::Ident, "an identifier");
    let container_ref = self.declare(SymbolKind::TsNamespace, name, name_loc);
    if is_export {
      self.record_export_ref(container_ref);
    }

    // Parse members
    self.expect(T::OpenBrace, "\"{\"");
    let mut members: Vec<(Atom, Option<ExprId>, Loc)> = Vec::new();
    // Member initializers are parsed inside the IIFE scope so references to
    // other members resolve to the parameter
    self.push_scope(super::ScopeKind::Function);
    let param_ref = self.declare(SymbolKind::Argument, name, name_loc);
    while self.lexer.token.kind != T::CloseBrace && self.lexer.token.kind != T::Eof {
      let member_loc = self.loc();
      let member_name = match self.lexer.token.kind {
        T::Ident | T::Str => {
          let n = self.lexer.token.value;
          self.lexer.next();
          n
        }
        _ => {
          let range = self.lexer.token.range();
          self
            .log
            .add_error(Some(self.source), range, "Expected an enum member name".to_string());
          break;
        }
      };
      let init = if self.eat(T::Equals) {
        Some(self.parse_expr(super::expr::Level::Comma))
      } else {
        None
      };
      members.push((member_name, init, member_loc));
      if !self.eat(T::Comma) {
        break;
      }
    }
    self.expect(T::CloseBrace, "\"}\"");

    // Build the initializer body
    let mut body = Vec::new();
    let mut next_value: Option<f64> = Some(0.0);
    for (member_name, init, member_loc) in members {
      let value = match init {
        Some(e) => {
          next_value = match self.ast.expr(e).data {
            EData::Number { value, .. } => Some(value + 1.0),
            _ => None,
          };
          e
        }
        None => {
          let value = next_value.unwrap_or(f64::NAN);
          next_value = Some(value + 1.0);
          self.ast.alloc_expr(member_loc, EData::Number { value, raw: None })
        }
      };
      let is_string = matches!(self.ast.expr(value).data, EData::String(_));

      // E["A"] = value
      let param1 = self.ast.alloc_expr(member_loc, EData::Ident(param_ref));
      let key = self.ast.alloc_expr(member_loc, EData::String(member_name));
      let index = self.ast.alloc_expr(
        member_loc,
        EData::Index {
          target: param1,
          index: key,
          optional: false,
        },
      );
      let assign = self.ast.alloc_expr(
        member_loc,
        EData::Binary {
          op: BinOp::Assign,
          left: index,
          right: value,
        },
      );

      let stmt_expr = if is_string {
        assign
      } else {
        // Numeric members get a reverse mapping: E[E["A"] = 0] = "A"
        let param2 = self.ast.alloc_expr(member_loc, EData::Ident(param_ref));
        let reverse = self.ast.alloc_expr(
          member_loc,
          EData::Index {
            target: param2,
            index: assign,
            optional: false,
          },
        );
        let name_str = self.ast.alloc_expr(member_loc, EData::String(member_name));
        self.ast.alloc_expr(
          member_loc,
          EData::Binary {
            op: BinOp::Assign,
            left: reverse,
            right: name_str,
          },
        )
      };
      body.push(self.ast.alloc_stmt(member_loc, SData::Expr(stmt_expr)));
    }
    let temps = self.pop_fn_scope();
    let body = self.prepend_temp_decls(body, temps);

    self.build_container_iife(loc, name, container_ref, param_ref, body, is_export)
  }

  // ------------------------------------------------------------------
  // Namespace lowering
  // ------------------------------------------------------------------

  /// `namespace N { export const x = 1 }` becomes
  /// `var N; (function(N) { const x = 1; N.x = x; })(N || (N = {}));`.
  /// Current token is `namespace` or `module`.
  pub(super) fn parse_ts_namespace(&mut self, is_export: bool) -> StmtId {
    let loc = self.loc();
    self.lexer.next(); // namespace / module

    if self.lexer.token.kind == T::Str {
      // `module "name"` is ambient; erase it
      self.lexer.next();
      if self.lexer.token.kind == T::OpenBrace {
        self.skip_balanced(T::OpenBrace, T::CloseBrace);
      }
      return self.ast.alloc_stmt(loc, SData::Empty);
    }

    // Dotted names nest: `namespace A.B {}` is `namespace A { namespace B {} }`
    let mut names = Vec::new();
    loop {
      let name = self.lexer.token.value;
      let name_loc = self.loc();
      self.expect(T::Ident, "an identifier");
      names.push((name, name_loc));
      if !self.eat(T::Dot) {
        break;
      }
    }

    self.parse_ts_namespace_body(loc, &names, is_export)
  }

  fn parse_ts_namespace_body(&mut self, loc: Loc, names: &[(Atom, Loc)], is_export: bool) -> StmtId {
    let (name, name_loc) = names[0];
    let container_ref = self.declare(SymbolKind::TsNamespace, name, name_loc);
    if is_export {
      self.record_export_ref(container_ref);
    }

    self.push_scope(super::ScopeKind::Function);
    let param_ref = self.declare(SymbolKind::Argument, name, name_loc);

    let old_exports = self.ts_namespace_exports.replace(Vec::new());
    let body = if names.len() > 1 {
      // Inner namespaces are implicitly exported members of the outer one
      let inner = self.parse_ts_namespace_body(loc, &names[1..], true);
      let mut drained = vec![inner];
      drained.append(&mut self.pending_stmts);
      drained
    } else {
      self.parse_block()
    };
    let exported = std::mem::replace(&mut self.ts_namespace_exports, old_exports).unwrap_or_default();

    // N.f = f; for each exported member
    let mut body = body;
    for r in exported {
      let member_name = self.symbols[r.inner as usize].original_name;
      let param = self.ast.alloc_expr(loc, EData::Ident(param_ref));
      let dot = self.ast.alloc_expr(
        loc,
        EData::Dot {
          target: param,
          name: member_name,
          optional: false,
        },
      );
      let value = self.ast.alloc_expr(loc, EData::Ident(r));
      let assign = self.ast.alloc_expr(
        loc,
        EData::Binary {
          op: BinOp::Assign,
          left: dot,
          right: value,
        },
      );
      body.push(self.ast.alloc_stmt(loc, SData::Expr(assign)));
    }

    let temps = self.pop_fn_scope();
    let body = self.prepend_temp_decls(body, temps);
    self.build_container_iife(loc, name, container_ref, param_ref, body, false)
  }

  /// `var N; (function(N) { ... })(N || (N = {}));` is shared by enum and
  /// namespace lowering. The scope for `param_ref` has already been popped.
  fn build_container_iife(
    &mut self,
    loc: Loc,
    _name: Atom,
    container_ref: Ref,
    param_ref: Ref,
    body: Vec<StmtId>,
    is_export: bool,
  ) -> StmtId {
    let func = Fn {
      name: None,
      args: vec![Arg {
        binding: Binding::Ident(param_ref),
        default: None,
      }],
      has_rest_arg: false,
      body,
      is_async: false,
      is_generator: false,
      loc,
    };
    let func_expr = self.ast.alloc_expr(loc, EData::Function(func));

    // N || (N = {})
    let read1 = self.clone_ident(container_ref, loc);
    let read2 = self.clone_ident(container_ref, loc);
    let empty = self.ast.alloc_expr(loc, EData::Object { props: Vec::new() });
    let assign = self.ast.alloc_expr(
      loc,
      EData::Binary {
        op: BinOp::Assign,
        left: read2,
        right: empty,
      },
    );
    let arg = self.ast.alloc_expr(
      loc,
      EData::Binary {
        op: BinOp::LogicalOr,
        left: read1,
        right: assign,
      },
    );
    let call = self.ast.alloc_expr(
      loc,
      EData::Call {
        target: func_expr,
        args: vec![arg],
        optional: false,
        is_pure: false,
      },
    );
    let call_stmt = self.ast.alloc_stmt(loc, SData::Expr(call));
    self.pending_stmts.push(call_stmt);

    self.ast.alloc_stmt(
      loc,
      SData::Local {
        kind: LocalKind::Var,
        decls: vec![Decl {
          binding: Binding::Ident(container_ref),
          init: None,
        }],
        is_export,
      },
    )
  }
}
