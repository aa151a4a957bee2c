//! Expression parsing: Pratt-style precedence climbing with a cover grammar
//! for arrow heads and destructuring assignment targets.

use super::{Parser, RequireCandidate};
use crate::graph::ImportKind;
use crate::interner::Atom;
use crate::js::ast::*;
use crate::js::lexer::{is_identifier, T};
use crate::source::{Loc, Range};

/// Operator precedence. Suffix parsing continues while the operator binds
/// tighter than the requested level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
  Lowest,
  Comma,
  Spread,
  Yield,
  Assign,
  Conditional,
  Nullish,
  LogicalOr,
  LogicalAnd,
  BitOr,
  BitXor,
  BitAnd,
  Equals,
  Compare,
  Shift,
  Add,
  Multiply,
  Exponentiation,
  Prefix,
  Postfix,
  New,
  Call,
  Member,
}

impl Level {
  /// One step looser; used to get right associativity.
  pub fn pred(self) -> Level {
    match self {
      Level::Lowest | Level::Comma => Level::Lowest,
      Level::Spread => Level::Comma,
      Level::Yield => Level::Spread,
      Level::Assign => Level::Yield,
      Level::Conditional => Level::Assign,
      Level::Nullish => Level::Conditional,
      Level::LogicalOr => Level::Nullish,
      Level::LogicalAnd => Level::LogicalOr,
      Level::BitOr => Level::LogicalAnd,
      Level::BitXor => Level::BitOr,
      Level::BitAnd => Level::BitXor,
      Level::Equals => Level::BitAnd,
      Level::Compare => Level::Equals,
      Level::Shift => Level::Compare,
      Level::Add => Level::Shift,
      Level::Multiply => Level::Add,
      Level::Exponentiation => Level::Multiply,
      Level::Prefix => Level::Exponentiation,
      Level::Postfix => Level::Prefix,
      Level::New => Level::Postfix,
      Level::Call => Level::New,
      Level::Member => Level::Call,
    }
  }
}

/// One pending `?.` check in a lowered optional chain. `test` is the
/// expression whose nullishness decides the short circuit.
struct ChainCheck {
  test: ExprId,
}

impl<'a> Parser<'a> {
  pub(super) fn parse_expr(&mut self, level: Level) -> ExprId {
    let left = self.parse_prefix(level);
    self.parse_suffix(left, level)
  }

  pub(super) fn parse_suffix(&mut self, left: ExprId, level: Level) -> ExprId {
    let left = self.parse_member_suffix(left, true);
    self.parse_binary_suffix(left, level)
  }

  // ------------------------------------------------------------------
  // Prefix
  // ------------------------------------------------------------------

  fn parse_prefix(&mut self, level: Level) -> ExprId {
    let loc = self.loc();
    match self.lexer.token.kind {
      T::Num => {
        let value = self.lexer.token.number;
        let raw = if self.lexer.token.has_separator && self.unsupported(crate::compat::feature::NUMERIC_SEPARATOR) {
          // Drop the raw text so the printer re-renders without separators
          None
        } else {
          Some(self.lexer.token.value)
        };
        self.lexer.next();
        self.ast.alloc_expr(loc, EData::Number { value, raw })
      }
      T::BigInt => {
        if self.unsupported(crate::compat::feature::BIGINT) {
          let range = self.lexer.token.range();
          self.feature_error(range, crate::compat::feature::BIGINT);
        }
        let raw = self.lexer.token.value;
        self.lexer.next();
        self.ast.alloc_expr(loc, EData::BigInt(raw))
      }
      T::Str => {
        let value = self.lexer.token.value;
        self.lexer.next();
        self.ast.alloc_expr(loc, EData::String(value))
      }
      T::Slash | T::SlashEquals => {
        self.lexer.rescan_as_regexp();
        let raw = self.lexer.token.value;
        self.lexer.next();
        self.ast.alloc_expr(loc, EData::Regex(raw))
      }
      T::NoSubTemplate | T::TemplateHead => self.parse_template(None, loc),
      T::True => {
        self.lexer.next();
        self.ast.alloc_expr(loc, EData::Bool(true))
      }
      T::False => {
        self.lexer.next();
        self.ast.alloc_expr(loc, EData::Bool(false))
      }
      T::Null => {
        self.lexer.next();
        self.ast.alloc_expr(loc, EData::Null)
      }
      T::This => {
        self.lexer.next();
        self.ast.alloc_expr(loc, EData::This)
      }
      T::Super => {
        self.lexer.next();
        self.ast.alloc_expr(loc, EData::SuperE)
      }
      T::PrivateIdent => {
        let name = self.lexer.token.value;
        self.lexer.next();
        self.ast.alloc_expr(loc, EData::PrivateIdent(name))
      }
      T::OpenParen => self.parse_paren(loc, None),
      T::OpenBracket => self.parse_array(loc),
      T::OpenBrace => self.parse_object(loc),
      T::Function => {
        self.lexer.next();
        let is_generator = self.eat(T::Asterisk);
        self.parse_fn_expr(loc, false, is_generator)
      }
      T::Class => {
        let mut class = self.parse_class(loc, false);
        if self.unsupported(crate::compat::feature::CLASS_FIELD)
          && class.props.iter().any(|p| p.kind == ClassPropKind::Field)
        {
          // Instance fields move into the constructor; static fields on a
          // class expression have no statement to follow, so they stay put
          // and the feature error points at them
          let extra = self.lower_class_fields_in_place(&mut class, None);
          debug_assert!(extra.is_empty());
        }
        self.ast.alloc_expr(loc, EData::Class(class))
      }
      T::New => self.parse_new(loc),
      T::Import => {
        self.lexer.next();
        self.parse_import_expr_suffix(loc)
      }
      T::DotDotDot if level <= Level::Spread => {
        self.lexer.next();
        let value = self.parse_expr(Level::Comma);
        self.ast.alloc_expr(loc, EData::Spread(value))
      }
      T::Plus => self.parse_unary(loc, UnOp::Pos),
      T::Minus => self.parse_unary(loc, UnOp::Neg),
      T::Exclamation => self.parse_unary(loc, UnOp::Not),
      T::Tilde => self.parse_unary(loc, UnOp::BitNot),
      T::Void => self.parse_unary(loc, UnOp::Void),
      T::TypeOf => self.parse_unary(loc, UnOp::TypeOf),
      T::Delete => self.parse_unary(loc, UnOp::Delete),
      T::PlusPlus => self.parse_unary(loc, UnOp::PreInc),
      T::MinusMinus => self.parse_unary(loc, UnOp::PreDec),
      T::LessThan if self.jsx_enabled => {
        let element = self.parse_jsx_element(loc);
        self.lexer.next(); // consume the final `>`
        element
      }
      T::LessThan if self.ts => {
        // A generic arrow function: `<T>(x: T) => x`
        self.skip_ts_type_params();
        let paren_loc = self.loc();
        self.parse_paren(paren_loc, None)
      }
      T::Ident => self.parse_ident_prefix(loc, level),
      _ => {
        let range = self.lexer.token.range();
        self
          .log
          .add_error(Some(self.source), range, format!("Unexpected {:?}", self.lexer.raw()));
        // Skip the offending token unless it closes something
        if !matches!(
          self.lexer.token.kind,
          T::CloseParen | T::CloseBrace | T::CloseBracket | T::Semicolon | T::Eof
        ) {
          self.lexer.next();
        }
        self.ast.alloc_expr(loc, EData::Missing)
      }
    }
  }

  fn parse_unary(&mut self, loc: Loc, op: UnOp) -> ExprId {
    self.lexer.next();
    let value = self.parse_expr(Level::Prefix);
    self.ast.alloc_expr(loc, EData::Unary { op, value })
  }

  fn parse_ident_prefix(&mut self, loc: Loc, level: Level) -> ExprId {
    let name = self.lexer.token.value;
    let word = name.as_str();

    match word {
      "await" if self.in_async || self.fn_depth == 0 => {
        if self.fn_depth == 0 {
          if self.unsupported(crate::compat::feature::TOP_LEVEL_AWAIT) {
            let range = self.lexer.token.range();
            self.feature_error(range, crate::compat::feature::TOP_LEVEL_AWAIT);
          }
          self.top_level_await = Some(loc);
          self.has_es_module_syntax = true;
        }
        self.lexer.next();
        let value = self.parse_expr(Level::Prefix);
        return self.ast.alloc_expr(loc, EData::Await(value));
      }
      "yield" if self.in_generator => {
        self.lexer.next();
        let is_star = self.eat(T::Asterisk);
        let value = if is_star
          || !(matches!(
            self.lexer.token.kind,
            T::Semicolon | T::CloseBrace | T::CloseParen | T::CloseBracket | T::Comma | T::Colon | T::Eof
          ) || self.lexer.token.newline_before)
        {
          Some(self.parse_expr(Level::Yield))
        } else {
          None
        };
        return self.ast.alloc_expr(loc, EData::Yield { value, is_star });
      }
      "async" if !self.lexer.token.newline_before => {
        if self.peek_is_function_keyword() {
          self.lexer.next();
          self.lexer.next(); // function
          let is_generator = self.eat(T::Asterisk);
          return self.parse_fn_expr(loc, true, is_generator);
        }
        match self.peek_first_byte() {
          Some(b'(') => {
            self.lexer.next();
            let paren_loc = self.loc();
            return self.parse_paren(paren_loc, Some(loc));
          }
          Some(b) if b == b'_' || b == b'$' || b.is_ascii_alphabetic() => {
            // `async x => ...`
            if self.peek_word() != Some("function") {
              self.lexer.next();
              let arg_name = self.lexer.token.value;
              let arg_loc = self.loc();
              self.lexer.next();
              if self.lexer.token.kind == T::EqualsGreaterThan {
                return self.parse_arrow_with_single_arg(loc, arg_name, arg_loc, true);
              }
              // Not an arrow after all: `async` then an identifier is a
              // syntax error; recover as a reference
              let r = self.ref_symbol(name);
              return self.ast.alloc_expr(loc, EData::Ident(r));
            }
          }
          _ => {}
        }
      }
      _ => {}
    }

    // Single-identifier define substitution
    for define in self.opts.defines.clone() {
      if define.path.len() == 1 && define.path[0] == name {
        self.lexer.next();
        return self.build_define_replacement(loc, &define.value);
      }
    }

    self.lexer.next();

    // `x => ...`
    if self.lexer.token.kind == T::EqualsGreaterThan && level <= Level::Assign {
      return self.parse_arrow_with_single_arg(loc, name, loc, false);
    }

    let r = self.ref_symbol(name);
    self.ast.alloc_expr(loc, EData::Ident(r))
  }

  pub(super) fn build_define_replacement(&mut self, loc: Loc, value: &crate::options::DefineValue) -> ExprId {
    use crate::options::DefineValue;
    match value {
      DefineValue::Undefined => self.ast.alloc_expr(loc, EData::Undefined),
      DefineValue::Null => self.ast.alloc_expr(loc, EData::Null),
      DefineValue::Bool(b) => self.ast.alloc_expr(loc, EData::Bool(*b)),
      DefineValue::Number(n) => self.ast.alloc_expr(loc, EData::Number { value: *n, raw: None }),
      DefineValue::String(s) => self.ast.alloc_expr(loc, EData::String(*s)),
      DefineValue::Ident(path) => {
        let mut parts = path.as_str().split('.');
        let first = Atom::new(parts.next().unwrap_or("undefined"));
        let r = self.ref_symbol(first);
        let mut e = self.ast.alloc_expr(loc, EData::Ident(r));
        for part in parts {
          e = self.ast.alloc_expr(
            loc,
            EData::Dot {
              target: e,
              name: Atom::new(part),
              optional: false,
            },
          );
        }
        e
      }
    }
  }

  // ------------------------------------------------------------------
  // Member suffixes and optional chains
  // ------------------------------------------------------------------

  pub(super) fn parse_member_suffix(&mut self, mut cur: ExprId, allow_call: bool) -> ExprId {
    let lower_chains = self.unsupported(crate::compat::feature::OPTIONAL_CHAIN);
    let mut checks: Vec<ChainCheck> = Vec::new();

    loop {
      let loc = self.loc();
      match self.lexer.token.kind {
        T::Dot => {
          self.lexer.next();
          let name = self.parse_member_name();
          cur = self.ast.alloc_expr(loc, EData::Dot { target: cur, name, optional: false });
          cur = self.check_dotted_define(cur);
        }
        T::QuestionDot => {
          self.lexer.next();
          if lower_chains {
            let receiver = self.capture_for_chain(cur, &mut checks);
            cur = match self.lexer.token.kind {
              T::OpenBracket => {
                self.lexer.next();
                let index = self.parse_expr(Level::Lowest);
                self.expect(T::CloseBracket, "\"]\"");
                self.ast.alloc_expr(loc, EData::Index { target: receiver, index, optional: false })
              }
              T::OpenParen if allow_call => {
                // The check captured the callee; call it losing `this`,
                // which matches a bare `fn?.()`
                let args = self.parse_call_args();
                self.ast.alloc_expr(
                  loc,
                  EData::Call {
                    target: receiver,
                    args,
                    optional: false,
                    is_pure: false,
                  },
                )
              }
              _ => {
                let name = self.parse_member_name();
                self.ast.alloc_expr(loc, EData::Dot { target: receiver, name, optional: false })
              }
            };
          } else {
            cur = match self.lexer.token.kind {
              T::OpenBracket => {
                self.lexer.next();
                let index = self.parse_expr(Level::Lowest);
                self.expect(T::CloseBracket, "\"]\"");
                self.ast.alloc_expr(loc, EData::Index { target: cur, index, optional: true })
              }
              T::OpenParen if allow_call => {
                let args = self.parse_call_args();
                self.ast.alloc_expr(
                  loc,
                  EData::Call {
                    target: cur,
                    args,
                    optional: true,
                    is_pure: false,
                  },
                )
              }
              _ => {
                let name = self.parse_member_name();
                self.ast.alloc_expr(loc, EData::Dot { target: cur, name, optional: true })
              }
            };
          }
        }
        T::OpenBracket => {
          self.lexer.next();
          let index = self.parse_expr(Level::Lowest);
          self.expect(T::CloseBracket, "\"]\"");
          cur = self.ast.alloc_expr(loc, EData::Index { target: cur, index, optional: false });
        }
        T::OpenParen if allow_call => {
          let candidate_target = self.require_call_target(cur);
          let args = self.parse_call_args();
          let is_pure = self.call_target_is_pure(cur);
          let call = self.ast.alloc_expr(
            loc,
            EData::Call {
              target: cur,
              args: args.clone(),
              optional: false,
              is_pure,
            },
          );
          if let Some((target_ref, kind)) = candidate_target {
            if args.len() == 1 {
              if let EData::String(specifier) = self.ast.expr(args[0]).data {
                let arg_loc = self.ast.expr(args[0]).loc;
                self.require_candidates.push(RequireCandidate {
                  expr: call,
                  target: target_ref,
                  specifier,
                  range: Range::new(arg_loc.0, arg_loc.0 + specifier.as_str().len() as u32 + 2),
                  kind,
                });
              }
            }
          }
          cur = call;
        }
        T::NoSubTemplate | T::TemplateHead => {
          cur = self.parse_template(Some(cur), loc);
        }
        T::Exclamation if self.ts && !self.lexer.token.newline_before => {
          // TS non-null assertion
          self.lexer.next();
        }
        _ => break,
      }
    }

    self.flush_chain(checks, cur)
  }

  /// Capture the current chain target for a lowered `?.`: plain identifiers
  /// are re-evaluated, anything else is stored in a temporary.
  fn capture_for_chain(&mut self, cur: ExprId, checks: &mut Vec<ChainCheck>) -> ExprId {
    let loc = self.ast.expr(cur).loc;
    if let EData::Ident(r) = self.ast.expr(cur).data {
      checks.push(ChainCheck { test: cur });
      return self.ast.alloc_expr(loc, EData::Ident(r));
    }
    let tmp = self.temp_ref();
    let tmp_write = self.ast.alloc_expr(loc, EData::Ident(tmp));
    let assign = self.ast.alloc_expr(
      loc,
      EData::Binary {
        op: BinOp::Assign,
        left: tmp_write,
        right: cur,
      },
    );
    checks.push(ChainCheck { test: assign });
    self.ast.alloc_expr(loc, EData::Ident(tmp))
  }

  /// Assemble the lowered chain:
  /// `(_a = a) == null ? void 0 : ... : current`.
  fn flush_chain(&mut self, checks: Vec<ChainCheck>, cur: ExprId) -> ExprId {
    let mut acc = cur;
    for check in checks.into_iter().rev() {
      let loc = self.ast.expr(check.test).loc;
      let null = self.ast.alloc_expr(loc, EData::Null);
      let test = self.ast.alloc_expr(
        loc,
        EData::Binary {
          op: BinOp::LooseEq,
          left: check.test,
          right: null,
        },
      );
      let undef = self.ast.alloc_expr(loc, EData::Undefined);
      acc = self.ast.alloc_expr(loc, EData::Cond { test, yes: undef, no: acc });
    }
    acc
  }

  fn parse_member_name(&mut self) -> Atom {
    match self.lexer.token.kind {
      T::Ident | T::PrivateIdent => {
        let name = self.lexer.token.value;
        self.lexer.next();
        name
      }
      _ if is_identifier(self.lexer.raw()) => {
        // Keywords are valid property names
        let name = self.lexer.token.value;
        self.lexer.next();
        name
      }
      _ => {
        let range = self.lexer.token.range();
        self
          .log
          .add_error(Some(self.source), range, "Expected a property name".to_string());
        Atom::new("")
      }
    }
  }

  /// If the callee is exactly the free name `require` (or `require.resolve`),
  /// remember it so finalize can turn the call into an import record.
  fn require_call_target(&self, cur: ExprId) -> Option<(Ref, ImportKind)> {
    match &self.ast.expr(cur).data {
      EData::Ident(r) => {
        if self.symbols[r.inner as usize].original_name.as_str() == "require" {
          Some((*r, ImportKind::Require))
        } else {
          None
        }
      }
      EData::Dot { target, name, optional: false } if name.as_str() == "resolve" => {
        match &self.ast.expr(*target).data {
          EData::Ident(r) if self.symbols[r.inner as usize].original_name.as_str() == "require" => {
            Some((*r, ImportKind::RequireResolve))
          }
          _ => None,
        }
      }
      _ => None,
    }
  }

  fn call_target_is_pure(&self, target: ExprId) -> bool {
    let path = self.dotted_path_of(target);
    if path.is_empty() {
      return false;
    }
    self.opts.pure_calls.iter().any(|p| *p == path)
  }

  fn dotted_path_of(&self, mut e: ExprId) -> Vec<Atom> {
    let mut rev = Vec::new();
    loop {
      match &self.ast.expr(e).data {
        EData::Dot { target, name, optional: false } => {
          rev.push(*name);
          e = *target;
        }
        EData::Ident(r) => {
          rev.push(self.symbols[r.inner as usize].original_name);
          rev.reverse();
          return rev;
        }
        _ => return Vec::new(),
      }
    }
  }

  /// Dotted-path define substitution, applied as member expressions build up.
  fn check_dotted_define(&mut self, cur: ExprId) -> ExprId {
    if self.opts.defines.is_empty() {
      return cur;
    }
    let path = self.dotted_path_of(cur);
    if path.len() < 2 {
      return cur;
    }
    for define in self.opts.defines.clone() {
      if define.path == path {
        let loc = self.ast.expr(cur).loc;
        self.cancel_expr_refs(cur);
        return self.build_define_replacement(loc, &define.value);
      }
    }
    cur
  }

  fn cancel_expr_refs(&mut self, mut e: ExprId) {
    loop {
      match self.ast.expr(e).data.clone() {
        EData::Dot { target, .. } => e = target,
        EData::Ident(r) => {
          self.cancel_ref(r);
          return;
        }
        _ => return,
      }
    }
  }

  fn parse_call_args(&mut self) -> Vec<ExprId> {
    self.expect(T::OpenParen, "\"(\"");
    let mut args = Vec::new();
    while self.lexer.token.kind != T::CloseParen && self.lexer.token.kind != T::Eof {
      let loc = self.loc();
      if self.eat(T::DotDotDot) {
        let value = self.parse_expr(Level::Comma);
        args.push(self.ast.alloc_expr(loc, EData::Spread(value)));
      } else {
        args.push(self.parse_expr(Level::Comma));
      }
      if !self.eat(T::Comma) {
        break;
      }
    }
    self.expect(T::CloseParen, "\")\"");
    args
  }

  // ------------------------------------------------------------------
  // Binary and conditional suffixes
  // ------------------------------------------------------------------

  fn parse_binary_suffix(&mut self, mut left: ExprId, level: Level) -> ExprId {
    loop {
      let loc = self.ast.expr(left).loc;

      // TS explicit type arguments on a call (`foo<T>(x)`) are ambiguous
      // with comparison; resolve by speculative scan
      if self.ts && !self.jsx_enabled && self.lexer.token.kind == T::LessThan && level < Level::Compare {
        let state = self.lexer.save();
        self.skip_ts_type_args();
        if self.lexer.token.kind == T::OpenParen {
          let args = self.parse_call_args();
          left = self.ast.alloc_expr(
            loc,
            EData::Call {
              target: left,
              args,
              optional: false,
              is_pure: false,
            },
          );
          left = self.parse_member_suffix(left, true);
          continue;
        }
        self.lexer.restore(state);
      }

      let kind = self.lexer.token.kind;
      let (op, op_level, right_assoc) = match kind {
        T::Comma => (BinOp::Comma, Level::Comma, false),
        T::Equals => (BinOp::Assign, Level::Assign, true),
        T::PlusEquals => (BinOp::AddAssign, Level::Assign, true),
        T::MinusEquals => (BinOp::SubAssign, Level::Assign, true),
        T::AsteriskEquals => (BinOp::MulAssign, Level::Assign, true),
        T::SlashEquals => (BinOp::DivAssign, Level::Assign, true),
        T::PercentEquals => (BinOp::RemAssign, Level::Assign, true),
        T::AsteriskAsteriskEquals => (BinOp::PowAssign, Level::Assign, true),
        T::LessThanLessThanEquals => (BinOp::ShlAssign, Level::Assign, true),
        T::GreaterThanGreaterThanEquals => (BinOp::ShrAssign, Level::Assign, true),
        T::GreaterThanGreaterThanGreaterThanEquals => (BinOp::UShrAssign, Level::Assign, true),
        T::AmpersandEquals => (BinOp::BitAndAssign, Level::Assign, true),
        T::BarEquals => (BinOp::BitOrAssign, Level::Assign, true),
        T::CaretEquals => (BinOp::BitXorAssign, Level::Assign, true),
        T::AmpersandAmpersandEquals => (BinOp::LogicalAndAssign, Level::Assign, true),
        T::BarBarEquals => (BinOp::LogicalOrAssign, Level::Assign, true),
        T::QuestionQuestionEquals => (BinOp::NullishAssign, Level::Assign, true),
        T::QuestionQuestion => (BinOp::NullishCoalescing, Level::Nullish, false),
        T::BarBar => (BinOp::LogicalOr, Level::LogicalOr, false),
        T::AmpersandAmpersand => (BinOp::LogicalAnd, Level::LogicalAnd, false),
        T::Bar => (BinOp::BitOr, Level::BitOr, false),
        T::Caret => (BinOp::BitXor, Level::BitXor, false),
        T::Ampersand => (BinOp::BitAnd, Level::BitAnd, false),
        T::EqualsEquals => (BinOp::LooseEq, Level::Equals, false),
        T::ExclamationEquals => (BinOp::LooseNe, Level::Equals, false),
        T::EqualsEqualsEquals => (BinOp::StrictEq, Level::Equals, false),
        T::ExclamationEqualsEquals => (BinOp::StrictNe, Level::Equals, false),
        T::LessThan => (BinOp::Lt, Level::Compare, false),
        T::LessThanEquals => (BinOp::Le, Level::Compare, false),
        T::GreaterThan => (BinOp::Gt, Level::Compare, false),
        T::GreaterThanEquals => (BinOp::Ge, Level::Compare, false),
        T::In if self.allow_in => (BinOp::In, Level::Compare, false),
        T::InstanceOf => (BinOp::InstanceOf, Level::Compare, false),
        T::LessThanLessThan => (BinOp::Shl, Level::Shift, false),
        T::GreaterThanGreaterThan => (BinOp::Shr, Level::Shift, false),
        T::GreaterThanGreaterThanGreaterThan => (BinOp::UShr, Level::Shift, false),
        T::Plus => (BinOp::Add, Level::Add, false),
        T::Minus => (BinOp::Sub, Level::Add, false),
        T::Asterisk => (BinOp::Mul, Level::Multiply, false),
        T::Slash => (BinOp::Div, Level::Multiply, false),
        T::Percent => (BinOp::Rem, Level::Multiply, false),
        T::AsteriskAsterisk => (BinOp::Pow, Level::Exponentiation, true),
        T::Question => {
          if level >= Level::Conditional {
            return left;
          }
          self.lexer.next();
          let yes = self.parse_expr(Level::Comma);
          self.expect(T::Colon, "\":\"");
          let no = self.parse_expr(Level::Assign.pred());
          left = self.ast.alloc_expr(loc, EData::Cond { test: left, yes, no });
          continue;
        }
        T::PlusPlus if !self.lexer.token.newline_before => {
          if level >= Level::Postfix {
            return left;
          }
          self.lexer.next();
          left = self.ast.alloc_expr(loc, EData::Unary { op: UnOp::PostInc, value: left });
          continue;
        }
        T::MinusMinus if !self.lexer.token.newline_before => {
          if level >= Level::Postfix {
            return left;
          }
          self.lexer.next();
          left = self.ast.alloc_expr(loc, EData::Unary { op: UnOp::PostDec, value: left });
          continue;
        }
        T::Ident if self.ts && self.lexer.token.value.as_str() == "as" && !self.lexer.token.newline_before => {
          // TS cast: `expr as T`
          if level >= Level::Compare {
            return left;
          }
          self.lexer.next();
          if self.is_contextual("const") || self.lexer.token.kind == T::Const {
            self.lexer.next();
          } else {
            self.skip_ts_type();
          }
          continue;
        }
        T::Ident
          if self.ts && self.lexer.token.value.as_str() == "satisfies" && !self.lexer.token.newline_before =>
        {
          if level >= Level::Compare {
            return left;
          }
          self.lexer.next();
          self.skip_ts_type();
          continue;
        }
        _ => return left,
      };

      if level >= op_level {
        return left;
      }
      self.lexer.next();
      let right_level = if right_assoc { op_level.pred() } else { op_level };
      let right = self.parse_expr(right_level);
      left = self.build_binary(loc, op, left, right);

      // Members can follow a lowered chain result, e.g. `(a ?? b).c`
      left = self.parse_member_suffix(left, true);
    }
  }

  // ------------------------------------------------------------------
  // Parenthesized expressions and arrow functions (cover grammar)
  // ------------------------------------------------------------------

  /// Parse `(...)`. The contents are parsed as expressions and reinterpreted
  /// as an arrow parameter list if `=>` follows (or a TS annotation forces
  /// it). `async_loc` marks an `async (` head.
  fn parse_paren(&mut self, loc: Loc, async_loc: Option<Loc>) -> ExprId {
    self.expect(T::OpenParen, "\"(\"");
    let mut items: Vec<ExprId> = Vec::new();
    let mut forced_arrow = false;
    let mut spread_seen = false;

    let old_allow_in = std::mem::replace(&mut self.allow_in, true);
    while self.lexer.token.kind != T::CloseParen && self.lexer.token.kind != T::Eof {
      let item_loc = self.loc();
      let item = if self.eat(T::DotDotDot) {
        spread_seen = true;
        let value = self.parse_expr(Level::Comma);
        self.ast.alloc_expr(item_loc, EData::Spread(value))
      } else {
        let value = self.parse_expr(Level::Comma);
        // A TS type annotation can only appear in a parameter list
        if self.ts && self.lexer.token.kind == T::Colon {
          forced_arrow = true;
          self.lexer.next();
          self.skip_ts_type();
          if self.eat(T::Equals) {
            let default = self.parse_expr(Level::Comma);
            self.ast.alloc_expr(
              item_loc,
              EData::Binary {
                op: BinOp::Assign,
                left: value,
                right: default,
              },
            )
          } else {
            value
          }
        } else {
          value
        }
      };
      items.push(item);
      if !self.eat(T::Comma) {
        break;
      }
    }
    self.allow_in = old_allow_in;
    self.expect(T::CloseParen, "\")\"");
    if self.ts && self.lexer.token.kind == T::Colon {
      // Return type annotation
      forced_arrow = true;
      self.lexer.next();
      self.skip_ts_type();
    }

    if self.lexer.token.kind == T::EqualsGreaterThan || forced_arrow {
      return self.build_arrow_from_exprs(loc, items, async_loc.is_some());
    }

    if let Some(async_loc) = async_loc {
      // `async(...)` was a plain call after all
      let async_ref = self.ref_symbol(Atom::new("async"));
      let target = self.ast.alloc_expr(async_loc, EData::Ident(async_ref));
      return self.ast.alloc_expr(
        async_loc,
        EData::Call {
          target,
          args: items,
          optional: false,
          is_pure: false,
        },
      );
    }

    if spread_seen {
      let range = Range::new(loc.0, loc.0 + 1);
      self
        .log
        .add_error(Some(self.source), range, "Unexpected \"...\"".to_string());
    }

    match items.len() {
      0 => {
        let range = Range::new(loc.0, loc.0 + 1);
        self
          .log
          .add_error(Some(self.source), range, "Unexpected \")\"".to_string());
        self.ast.alloc_expr(loc, EData::Missing)
      }
      1 => items[0],
      _ => {
        // A comma sequence
        let mut acc = items[0];
        for item in items.into_iter().skip(1) {
          acc = self.ast.alloc_expr(loc, EData::Binary { op: BinOp::Comma, left: acc, right: item });
        }
        acc
      }
    }
  }

  fn parse_arrow_with_single_arg(&mut self, loc: Loc, name: Atom, name_loc: Loc, is_async: bool) -> ExprId {
    self.push_scope(super::ScopeKind::Function);
    let r = self.declare(SymbolKind::Argument, name, name_loc);
    let args = vec![Arg {
      binding: Binding::Ident(r),
      default: None,
    }];
    self.finish_arrow(loc, args, false, is_async)
  }

  fn build_arrow_from_exprs(&mut self, loc: Loc, items: Vec<ExprId>, is_async: bool) -> ExprId {
    self.push_scope(super::ScopeKind::Function);
    let mut args = Vec::new();
    let mut has_rest = false;
    for item in items {
      match self.ast.expr(item).data.clone() {
        EData::Spread(inner) => {
          has_rest = true;
          let binding = self.expr_to_binding(inner);
          args.push(Arg { binding, default: None });
        }
        EData::Binary { op: BinOp::Assign, left, right } => {
          let binding = self.expr_to_binding(left);
          args.push(Arg {
            binding,
            default: Some(right),
          });
        }
        _ => {
          let binding = self.expr_to_binding(item);
          args.push(Arg { binding, default: None });
        }
      }
    }
    self.finish_arrow(loc, args, has_rest, is_async)
  }

  fn finish_arrow(&mut self, loc: Loc, args: Vec<Arg>, has_rest_arg: bool, is_async: bool) -> ExprId {
    if is_async && self.unsupported(crate::compat::feature::ASYNC_AWAIT) {
      self.feature_error(Range::new(loc.0, loc.0 + 5), crate::compat::feature::ASYNC_AWAIT);
    }
    self.expect(T::EqualsGreaterThan, "\"=>\"");

    let old_async = std::mem::replace(&mut self.in_async, is_async);
    let old_gen = std::mem::replace(&mut self.in_generator, false);
    let (body, prefer_expr) = if self.lexer.token.kind == T::OpenBrace {
      (self.parse_block(), false)
    } else {
      let value = self.parse_expr(Level::Comma);
      let ret = self.ast.alloc_stmt(loc, SData::Return(Some(value)));
      (vec![ret], true)
    };
    self.in_async = old_async;
    self.in_generator = old_gen;

    let temps = self.pop_fn_scope();
    let body = self.prepend_temp_decls(body, temps);
    self.ast.alloc_expr(
      loc,
      EData::Arrow {
        args,
        has_rest_arg,
        prefer_expr,
        body,
        is_async,
      },
    )
  }

  /// Reinterpret a cover-grammar expression as a binding pattern, declaring
  /// its identifiers in the current (function) scope.
  fn expr_to_binding(&mut self, e: ExprId) -> Binding {
    let loc = self.ast.expr(e).loc;
    match self.ast.expr(e).data.clone() {
      EData::Ident(r) => {
        self.cancel_ref(r);
        let name = self.symbols[r.inner as usize].original_name;
        Binding::Ident(self.declare(SymbolKind::Argument, name, loc))
      }
      EData::Missing => Binding::Missing,
      EData::Array { items } => {
        let mut out = Vec::new();
        let mut has_rest = false;
        for item in items {
          match self.ast.expr(item).data.clone() {
            EData::Missing => out.push(ArrayBindingItem {
              binding: Binding::Missing,
              default: None,
            }),
            EData::Spread(inner) => {
              has_rest = true;
              let binding = self.expr_to_binding(inner);
              out.push(ArrayBindingItem { binding, default: None });
            }
            EData::Binary { op: BinOp::Assign, left, right } => {
              let binding = self.expr_to_binding(left);
              out.push(ArrayBindingItem {
                binding,
                default: Some(right),
              });
            }
            _ => {
              let binding = self.expr_to_binding(item);
              out.push(ArrayBindingItem { binding, default: None });
            }
          }
        }
        Binding::Array { items: out, has_rest }
      }
      EData::Object { props } => {
        let mut out = Vec::new();
        let mut rest = None;
        for prop in props {
          if prop.kind == PropKind::Spread {
            rest = Some(Box::new(self.expr_to_binding(prop.value)));
            continue;
          }
          let (value, default) = match self.ast.expr(prop.value).data.clone() {
            EData::Binary { op: BinOp::Assign, left, right } => (left, Some(right)),
            _ => (prop.value, None),
          };
          let binding = self.expr_to_binding(value);
          out.push(ObjectBindingProp {
            is_computed: prop.is_computed,
            key: prop.key,
            binding,
            default,
          });
        }
        Binding::Object { props: out, rest }
      }
      _ => {
        self.log.add_error(
          Some(self.source),
          Range::new(loc.0, loc.0 + 1),
          "Invalid binding pattern".to_string(),
        );
        Binding::Missing
      }
    }
  }

  // ------------------------------------------------------------------
  // Literals
  // ------------------------------------------------------------------

  fn parse_array(&mut self, loc: Loc) -> ExprId {
    self.expect(T::OpenBracket, "\"[\"");
    let mut items = Vec::new();
    let old_allow_in = std::mem::replace(&mut self.allow_in, true);
    while self.lexer.token.kind != T::CloseBracket && self.lexer.token.kind != T::Eof {
      if self.lexer.token.kind == T::Comma {
        // Array hole
        let hole_loc = self.loc();
        self.lexer.next();
        items.push(self.ast.alloc_expr(hole_loc, EData::Missing));
        continue;
      }
      let item_loc = self.loc();
      let item = if self.eat(T::DotDotDot) {
        let value = self.parse_expr(Level::Comma);
        self.ast.alloc_expr(item_loc, EData::Spread(value))
      } else {
        self.parse_expr(Level::Comma)
      };
      items.push(item);
      if !self.eat(T::Comma) {
        break;
      }
    }
    self.allow_in = old_allow_in;
    self.expect(T::CloseBracket, "\"]\"");
    self.ast.alloc_expr(loc, EData::Array { items })
  }

  fn parse_object(&mut self, loc: Loc) -> ExprId {
    self.expect(T::OpenBrace, "\"{\"");
    let mut props = Vec::new();
    let old_allow_in = std::mem::replace(&mut self.allow_in, true);
    while self.lexer.token.kind != T::CloseBrace && self.lexer.token.kind != T::Eof {
      if self.eat(T::DotDotDot) {
        let value = self.parse_expr(Level::Comma);
        props.push(Prop {
          kind: PropKind::Spread,
          is_computed: false,
          is_shorthand: false,
          key: value,
          value,
        });
        if !self.eat(T::Comma) {
          break;
        }
        continue;
      }

      // get/set/async/generator method modifiers
      let mut kind = PropKind::Normal;
      let mut is_async = false;
      let mut is_generator = self.eat(T::Asterisk);
      if !is_generator && self.lexer.token.kind == T::Ident {
        let word = self.lexer.token.value.as_str();
        if matches!(word, "get" | "set" | "async") && !self.peek_is_property_terminator() {
          match word {
            "get" => kind = PropKind::Get,
            "set" => kind = PropKind::Set,
            _ => is_async = true,
          }
          self.lexer.next();
          is_generator = self.eat(T::Asterisk);
        }
      }

      let (key, is_computed, can_shorthand) = self.parse_property_key();

      if self.lexer.token.kind == T::OpenParen {
        // Method
        let fn_loc = self.ast.expr(key).loc;
        let func = self.parse_fn_rest(fn_loc, is_async, is_generator);
        let value = self.ast.alloc_expr(fn_loc, EData::Function(func));
        props.push(Prop {
          kind,
          is_computed,
          is_shorthand: false,
          key,
          value,
        });
      } else if kind != PropKind::Normal {
        let range = self.lexer.token.range();
        self
          .log
          .add_error(Some(self.source), range, "Expected \"(\"".to_string());
      } else if self.eat(T::Colon) {
        let value = self.parse_expr(Level::Comma);
        props.push(Prop {
          kind: PropKind::Normal,
          is_computed,
          is_shorthand: false,
          key,
          value,
        });
      } else if can_shorthand {
        // `{a}` or cover-grammar `{a = 1}`
        let name = match self.ast.expr(key).data {
          EData::String(name) => name,
          _ => Atom::new(""),
        };
        let key_loc = self.ast.expr(key).loc;
        let r = self.ref_symbol(name);
        let ident = self.ast.alloc_expr(key_loc, EData::Ident(r));
        let value = if self.eat(T::Equals) {
          let default = self.parse_expr(Level::Comma);
          self.ast.alloc_expr(
            key_loc,
            EData::Binary {
              op: BinOp::Assign,
              left: ident,
              right: default,
            },
          )
        } else {
          ident
        };
        props.push(Prop {
          kind: PropKind::Normal,
          is_computed: false,
          is_shorthand: true,
          key,
          value,
        });
      } else {
        let range = self.lexer.token.range();
        self
          .log
          .add_error(Some(self.source), range, "Expected \":\"".to_string());
      }

      if !self.eat(T::Comma) {
        break;
      }
    }
    self.allow_in = old_allow_in;
    self.expect(T::CloseBrace, "\"}\"");
    self.maybe_lower_object_spread(loc, props)
  }

  fn peek_is_property_terminator(&self) -> bool {
    matches!(
      self.peek_first_byte(),
      Some(b':') | Some(b',') | Some(b'}') | Some(b'(') | Some(b'=')
    )
  }

  pub(super) fn parse_property_key(&mut self) -> (ExprId, bool, bool) {
    let loc = self.loc();
    match self.lexer.token.kind {
      T::OpenBracket => {
        self.lexer.next();
        let key = self.parse_expr(Level::Comma);
        self.expect(T::CloseBracket, "\"]\"");
        (key, true, false)
      }
      T::Num => {
        let value = self.lexer.token.number;
        let raw = Some(self.lexer.token.value);
        self.lexer.next();
        (self.ast.alloc_expr(loc, EData::Number { value, raw }), false, false)
      }
      T::Str => {
        let value = self.lexer.token.value;
        self.lexer.next();
        (self.ast.alloc_expr(loc, EData::String(value)), false, false)
      }
      T::PrivateIdent => {
        let name = self.lexer.token.value;
        self.lexer.next();
        (self.ast.alloc_expr(loc, EData::PrivateIdent(name)), false, false)
      }
      T::Ident => {
        let name = self.lexer.token.value;
        self.lexer.next();
        (self.ast.alloc_expr(loc, EData::String(name)), false, true)
      }
      _ if is_identifier(self.lexer.raw()) => {
        let name = self.lexer.token.value;
        self.lexer.next();
        (self.ast.alloc_expr(loc, EData::String(name)), false, false)
      }
      _ => {
        let range = self.lexer.token.range();
        self
          .log
          .add_error(Some(self.source), range, "Expected a property name".to_string());
        (self.ast.alloc_expr(loc, EData::Missing), false, false)
      }
    }
  }

  fn parse_template(&mut self, tag: Option<ExprId>, loc: Loc) -> ExprId {
    if self.lexer.token.kind == T::NoSubTemplate {
      let head_raw = self.lexer.token.value;
      self.lexer.next();
      return self.ast.alloc_expr(
        loc,
        EData::Template {
          tag,
          head_raw,
          parts: Vec::new(),
        },
      );
    }

    let head_raw = self.lexer.token.value;
    self.lexer.next();
    let mut parts = Vec::new();
    loop {
      let part_loc = self.loc();
      let value = self.parse_expr(Level::Lowest);
      if self.lexer.token.kind != T::CloseBrace {
        let range = self.lexer.token.range();
        self
          .log
          .add_error(Some(self.source), range, "Expected \"}\"".to_string());
        parts.push(TemplatePart {
          value,
          raw: Atom::new(""),
          loc: part_loc,
        });
        break;
      }
      self.lexer.rescan_template_token();
      let raw = self.lexer.token.value;
      let is_tail = self.lexer.token.kind == T::TemplateTail;
      self.lexer.next();
      parts.push(TemplatePart {
        value,
        raw,
        loc: part_loc,
      });
      if is_tail {
        break;
      }
    }
    self.ast.alloc_expr(loc, EData::Template { tag, head_raw, parts })
  }

  fn parse_fn_expr(&mut self, loc: Loc, is_async: bool, is_generator: bool) -> ExprId {
    // A function expression's name is scoped to the function itself
    self.push_scope(super::ScopeKind::Block);
    let name = if self.lexer.token.kind == T::Ident {
      let name = self.lexer.token.value;
      let name_loc = self.loc();
      self.lexer.next();
      Some(self.declare(SymbolKind::Hoisted, name, name_loc))
    } else {
      None
    };
    let func = self.parse_fn_rest(loc, is_async, is_generator);
    self.pop_scope();
    self.ast.alloc_expr(loc, EData::Function(Fn { name, ..func }))
  }

  fn parse_new(&mut self, loc: Loc) -> ExprId {
    self.lexer.next(); // new
    if self.lexer.token.kind == T::Dot {
      self.lexer.next();
      if self.is_contextual("target") {
        self.lexer.next();
        return self.ast.alloc_expr(loc, EData::NewTarget);
      }
      let range = self.lexer.token.range();
      self
        .log
        .add_error(Some(self.source), range, "Expected \"target\"".to_string());
      return self.ast.alloc_expr(loc, EData::Missing);
    }

    let target = self.parse_prefix(Level::Member);
    let target = self.parse_member_suffix(target, false);
    if self.ts && self.lexer.token.kind == T::LessThan {
      self.try_skip_ts_type_args();
    }
    let args = if self.lexer.token.kind == T::OpenParen {
      self.parse_call_args()
    } else {
      Vec::new()
    };
    self.ast.alloc_expr(loc, EData::New { target, args })
  }

  pub(super) fn parse_import_expr_suffix(&mut self, loc: Loc) -> ExprId {
    match self.lexer.token.kind {
      T::OpenParen => {
        self.lexer.next();
        let arg = self.parse_expr(Level::Comma);
        if self.eat(T::Comma) && self.lexer.token.kind != T::CloseParen {
          // Import assertions/options are parsed and discarded
          let _ = self.parse_expr(Level::Comma);
          self.eat(T::Comma);
        }
        self.expect(T::CloseParen, "\")\"");
        match self.ast.expr(arg).data {
          EData::String(specifier) => {
            let arg_loc = self.ast.expr(arg).loc;
            let range = Range::new(arg_loc.0, arg_loc.0 + specifier.as_str().len() as u32 + 2);
            let record = self.add_import_record(ImportKind::DynamicImport, specifier, range);
            self.ast.alloc_expr(
              loc,
              EData::DynamicImport {
                record: Some(record),
                expr: None,
              },
            )
          }
          _ => {
            self.log.add_warning(
              Some(self.source),
              Range::new(loc.0, loc.0 + 6),
              "This dynamic import will not be bundled because the argument is not a string literal".to_string(),
            );
            self.ast.alloc_expr(
              loc,
              EData::DynamicImport {
                record: None,
                expr: Some(arg),
              },
            )
          }
        }
      }
      T::Dot => {
        self.lexer.next();
        if self.is_contextual("meta") {
          self.lexer.next();
          self.has_es_module_syntax = true;
          self.ast.alloc_expr(loc, EData::ImportMeta)
        } else {
          let range = self.lexer.token.range();
          self
            .log
            .add_error(Some(self.source), range, "Expected \"meta\"".to_string());
          self.ast.alloc_expr(loc, EData::Missing)
        }
      }
      _ => {
        let range = self.lexer.token.range();
        self
          .log
          .add_error(Some(self.source), range, "Expected \"(\" or \".\"".to_string());
        self.ast.alloc_expr(loc, EData::Missing)
      }
    }
  }
}

// --------------------------------------------------------------------------
// Classes (shared by statement and expression positions)
// --------------------------------------------------------------------------

impl<'a> Parser<'a> {
  pub(super) fn parse_class(&mut self, loc: Loc, is_stmt: bool) -> Class {
    self.expect(T::Class, "\"class\"");

    let mut name = None;
    if self.lexer.token.kind == T::Ident {
      let text = self.lexer.token.value;
      let name_loc = self.loc();
      self.lexer.next();
      if is_stmt {
        name = Some(self.declare(SymbolKind::Class, text, name_loc));
      } else {
        // An expression's name lives in the class's own scope
        self.push_scope(super::ScopeKind::Block);
        name = Some(self.declare(SymbolKind::Class, text, name_loc));
      }
    } else if !is_stmt {
      self.push_scope(super::ScopeKind::Block);
    }
    if is_stmt {
      self.push_scope(super::ScopeKind::Block);
    }

    if self.ts && self.lexer.token.kind == T::LessThan {
      self.skip_ts_type_params();
    }

    let extends = if self.eat(T::Extends) {
      let e = self.parse_expr(Level::New);
      if self.ts && self.lexer.token.kind == T::LessThan {
        self.try_skip_ts_type_args();
      }
      Some(e)
    } else {
      None
    };

    if self.ts && self.is_contextual("implements") {
      self.lexer.next();
      loop {
        self.skip_ts_type();
        if !self.eat(T::Comma) {
          break;
        }
      }
    }

    self.expect(T::OpenBrace, "\"{\"");
    let mut props = Vec::new();
    while self.lexer.token.kind != T::CloseBrace && self.lexer.token.kind != T::Eof {
      if self.eat(T::Semicolon) {
        continue;
      }
      if self.lexer.token.kind == T::At {
        let range = self.lexer.token.range();
        self
          .log
          .add_error(Some(self.source), range, "Decorators are not supported".to_string());
        self.lexer.next();
        let _ = self.parse_expr(Level::New);
        continue;
      }
      if let Some(prop) = self.parse_class_member() {
        props.push(prop);
      }
    }
    self.expect(T::CloseBrace, "\"}\"");
    self.pop_scope();

    Class {
      name,
      extends,
      props,
      loc,
    }
  }

  fn parse_class_member(&mut self) -> Option<ClassProp> {
    let loc = self.loc();
    let mut is_static = false;
    let mut is_async = false;
    let mut is_generator = false;
    let mut kind = ClassPropKind::Field;
    let mut is_declare = false;

    loop {
      if self.lexer.token.kind == T::Asterisk {
        self.lexer.next();
        is_generator = true;
        kind = ClassPropKind::Method;
        continue;
      }
      if self.lexer.token.kind != T::Ident || self.peek_is_property_terminator() {
        break;
      }
      match self.lexer.token.value.as_str() {
        "static" => {
          self.lexer.next();
          is_static = true;
          // `static { ... }` block
          if self.lexer.token.kind == T::OpenBrace {
            if self.unsupported(crate::compat::feature::CLASS_STATIC_BLOCK) {
              let range = Range::new(loc.0, loc.0 + 6);
              self.feature_error(range, crate::compat::feature::CLASS_STATIC_BLOCK);
            }
            self.push_scope(super::ScopeKind::Function);
            let body = self.parse_block();
            let temps = self.pop_fn_scope();
            let body = self.prepend_temp_decls(body, temps);
            let func = Fn {
              name: None,
              args: Vec::new(),
              has_rest_arg: false,
              body,
              is_async: false,
              is_generator: false,
              loc,
            };
            let value = self.ast.alloc_expr(loc, EData::Function(func));
            let key = self.ast.alloc_expr(loc, EData::Missing);
            return Some(ClassProp {
              kind: ClassPropKind::StaticBlock,
              is_static: true,
              is_computed: false,
              key,
              value: Some(value),
              loc,
            });
          }
        }
        "async" => {
          self.lexer.next();
          is_async = true;
          is_generator = self.eat(T::Asterisk);
          kind = ClassPropKind::Method;
        }
        "get" => {
          self.lexer.next();
          kind = ClassPropKind::Get;
        }
        "set" => {
          self.lexer.next();
          kind = ClassPropKind::Set;
        }
        "public" | "private" | "protected" | "readonly" | "abstract" | "override" | "accessor"
          if self.ts =>
        {
          self.lexer.next();
        }
        "declare" if self.ts => {
          self.lexer.next();
          is_declare = true;
        }
        _ => break,
      }
    }

    let (key, is_computed, _) = self.parse_property_key();

    if self.ts {
      // Optional / definite-assignment markers
      if self.lexer.token.kind == T::Question || self.lexer.token.kind == T::Exclamation {
        self.lexer.next();
      }
      if self.lexer.token.kind == T::LessThan {
        self.skip_ts_type_params();
      }
    }

    if self.lexer.token.kind == T::OpenParen {
      let method_kind = if matches!(kind, ClassPropKind::Get | ClassPropKind::Set) {
        kind
      } else {
        ClassPropKind::Method
      };
      let func = self.parse_fn_rest(loc, is_async, is_generator);
      if self.ts && self.ts_overload_marker {
        // TS method overload signature, erased
        return None;
      }
      if matches!(self.ast.expr(key).data, EData::PrivateIdent(_))
        && self.unsupported(crate::compat::feature::CLASS_PRIVATE_MEMBER)
      {
        self.feature_error(Range::new(loc.0, loc.0 + 1), crate::compat::feature::CLASS_PRIVATE_MEMBER);
      }
      let value = self.ast.alloc_expr(loc, EData::Function(func));
      return Some(ClassProp {
        kind: method_kind,
        is_static,
        is_computed,
        key,
        value: Some(value),
        loc,
      });
    }

    // Field
    if self.ts && self.lexer.token.kind == T::Colon {
      self.lexer.next();
      self.skip_ts_type();
    }
    let value = if self.eat(T::Equals) {
      Some(self.parse_expr(Level::Comma))
    } else {
      None
    };
    self.semicolon();
    if is_declare {
      return None;
    }
    Some(ClassProp {
      kind: ClassPropKind::Field,
      is_static,
      is_computed,
      key,
      value,
      loc,
    })
  }
}
