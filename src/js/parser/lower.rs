//! Compat-table-driven lowerings applied while the AST is being built:
//! nullish coalescing, logical assignment, exponentiation, object
//! rest/spread, and class fields.

use super::Parser;
use crate::compat::feature;
use crate::interner::Atom;
use crate::js::ast::*;
use crate::source::{Loc, Range};

impl<'a> Parser<'a> {
  /// Another read of an already-referenced symbol. Keeps use counts honest
  /// so tree shaking and minification see the extra occurrence.
  pub(super) fn clone_ident(&mut self, r: Ref, loc: Loc) -> ExprId {
    if r.source == self.source.index {
      self.symbols[r.inner as usize].use_count_estimate += 1;
    }
    *self.cur_uses.entry(r).or_insert(0) += 1;
    self.ast.alloc_expr(loc, EData::Ident(r))
  }

  /// Construct a binary expression, lowering the operator when the target
  /// does not support it.
  pub(super) fn build_binary(&mut self, loc: Loc, op: BinOp, left: ExprId, right: ExprId) -> ExprId {
    match op {
      BinOp::NullishCoalescing if self.unsupported(feature::NULLISH_COALESCING) => {
        self.lower_nullish(loc, left, right)
      }
      BinOp::Pow if self.unsupported(feature::EXPONENT_OPERATOR) => self.math_pow(loc, left, right),
      BinOp::PowAssign if self.unsupported(feature::EXPONENT_OPERATOR) => {
        let (read, write) = self.split_assign_target(left);
        let pow = self.math_pow(loc, read, right);
        self.ast.alloc_expr(
          loc,
          EData::Binary {
            op: BinOp::Assign,
            left: write,
            right: pow,
          },
        )
      }
      BinOp::LogicalAndAssign | BinOp::LogicalOrAssign | BinOp::NullishAssign
        if self.unsupported(feature::LOGICAL_ASSIGNMENT) =>
      {
        let (read, write) = self.split_assign_target(left);
        let assign = self.ast.alloc_expr(
          loc,
          EData::Binary {
            op: BinOp::Assign,
            left: write,
            right,
          },
        );
        match op {
          BinOp::LogicalAndAssign => self.ast.alloc_expr(
            loc,
            EData::Binary {
              op: BinOp::LogicalAnd,
              left: read,
              right: assign,
            },
          ),
          BinOp::LogicalOrAssign => self.ast.alloc_expr(
            loc,
            EData::Binary {
              op: BinOp::LogicalOr,
              left: read,
              right: assign,
            },
          ),
          _ => {
            if self.unsupported(feature::NULLISH_COALESCING) {
              self.lower_nullish(loc, read, assign)
            } else {
              self.ast.alloc_expr(
                loc,
                EData::Binary {
                  op: BinOp::NullishCoalescing,
                  left: read,
                  right: assign,
                },
              )
            }
          }
        }
      }
      _ => self.ast.alloc_expr(loc, EData::Binary { op, left, right }),
    }
  }

  /// `a ?? b` becomes `a != null ? a : b`, with a temporary when `a` has
  /// side effects. Uses loose `!=` so the known `document.all` edge matches
  /// the original behavior.
  fn lower_nullish(&mut self, loc: Loc, left: ExprId, right: ExprId) -> ExprId {
    let (test_left, reread) = match self.ast.expr(left).data {
      EData::Ident(r) => (left, self.clone_ident(r, loc)),
      _ => {
        let tmp = self.temp_ref();
        let write = self.ast.alloc_expr(loc, EData::Ident(tmp));
        let assign = self.ast.alloc_expr(
          loc,
          EData::Binary {
            op: BinOp::Assign,
            left: write,
            right: left,
          },
        );
        let read = self.ast.alloc_expr(loc, EData::Ident(tmp));
        (assign, read)
      }
    };
    let null = self.ast.alloc_expr(loc, EData::Null);
    let test = self.ast.alloc_expr(
      loc,
      EData::Binary {
        op: BinOp::LooseNe,
        left: test_left,
        right: null,
      },
    );
    self.ast.alloc_expr(
      loc,
      EData::Cond {
        test,
        yes: reread,
        no: right,
      },
    )
  }

  fn math_pow(&mut self, loc: Loc, left: ExprId, right: ExprId) -> ExprId {
    let math = self.ref_symbol(Atom::new("Math"));
    let math_ident = self.ast.alloc_expr(loc, EData::Ident(math));
    let pow = self.ast.alloc_expr(
      loc,
      EData::Dot {
        target: math_ident,
        name: Atom::new("pow"),
        optional: false,
      },
    );
    self.ast.alloc_expr(
      loc,
      EData::Call {
        target: pow,
        args: vec![left, right],
        optional: false,
        is_pure: false,
      },
    )
  }

  /// Split an assignment target into a read expression and a write
  /// expression that evaluate their object (and computed key) only once.
  pub(super) fn split_assign_target(&mut self, target: ExprId) -> (ExprId, ExprId) {
    let loc = self.ast.expr(target).loc;
    match self.ast.expr(target).data.clone() {
      EData::Ident(r) => {
        let read = target;
        let write = self.clone_ident(r, loc);
        (read, write)
      }
      EData::Dot { target: obj, name, optional } => {
        let (obj_read, obj_write) = self.capture_once(obj, loc);
        let read = self.ast.alloc_expr(
          loc,
          EData::Dot {
            target: obj_read,
            name,
            optional,
          },
        );
        let write = self.ast.alloc_expr(
          loc,
          EData::Dot {
            target: obj_write,
            name,
            optional: false,
          },
        );
        (read, write)
      }
      EData::Index { target: obj, index, optional } => {
        let (obj_read, obj_write) = self.capture_once(obj, loc);
        let (index_read, index_write) = self.capture_once(index, loc);
        let read = self.ast.alloc_expr(
          loc,
          EData::Index {
            target: obj_read,
            index: index_read,
            optional,
          },
        );
        let write = self.ast.alloc_expr(
          loc,
          EData::Index {
            target: obj_write,
            index: index_write,
            optional: false,
          },
        );
        (read, write)
      }
      _ => {
        self.log.add_error(
          Some(self.source),
          Range::new(loc.0, loc.0 + 1),
          "Invalid assignment target".to_string(),
        );
        (target, target)
      }
    }
  }

  /// `(expr, expr)` pair where the first evaluates `e` into a temporary and
  /// the second re-reads it. Literals and identifiers skip the temporary.
  fn capture_once(&mut self, e: ExprId, loc: Loc) -> (ExprId, ExprId) {
    match self.ast.expr(e).data {
      EData::Ident(r) => (e, self.clone_ident(r, loc)),
      EData::Number { value, raw } => {
        let copy = self.ast.alloc_expr(loc, EData::Number { value, raw });
        (e, copy)
      }
      EData::String(s) => {
        let copy = self.ast.alloc_expr(loc, EData::String(s));
        (e, copy)
      }
      EData::This => {
        let copy = self.ast.alloc_expr(loc, EData::This);
        (e, copy)
      }
      _ => {
        let tmp = self.temp_ref();
        let write = self.ast.alloc_expr(loc, EData::Ident(tmp));
        let assign = self.ast.alloc_expr(
          loc,
          EData::Binary {
            op: BinOp::Assign,
            left: write,
            right: e,
          },
        );
        let read = self.ast.alloc_expr(loc, EData::Ident(tmp));
        (assign, read)
      }
    }
  }

  // ------------------------------------------------------------------
  // Object rest/spread
  // ------------------------------------------------------------------

  /// Build an object literal, lowering `...spread` into runtime helper
  /// calls when the target requires it.
  pub(super) fn maybe_lower_object_spread(&mut self, loc: Loc, props: Vec<Prop>) -> ExprId {
    let has_spread = props.iter().any(|p| p.kind == PropKind::Spread);
    if !has_spread || !self.unsupported(feature::OBJECT_REST_SPREAD) {
      return self.ast.alloc_expr(loc, EData::Object { props });
    }

    let mut acc: Option<ExprId> = None;
    let mut pending: Vec<Prop> = Vec::new();
    for prop in props {
      if prop.kind == PropKind::Spread {
        let base = match (acc, pending.is_empty()) {
          (None, true) => self.ast.alloc_expr(loc, EData::Object { props: Vec::new() }),
          (None, false) => self.ast.alloc_expr(
            loc,
            EData::Object {
              props: std::mem::take(&mut pending),
            },
          ),
          (Some(a), true) => a,
          (Some(a), false) => {
            let obj = self.ast.alloc_expr(
              loc,
              EData::Object {
                props: std::mem::take(&mut pending),
              },
            );
            self.runtime_call(loc, "__spreadProps", vec![a, obj])
          }
        };
        acc = Some(self.runtime_call(loc, "__spreadValues", vec![base, prop.value]));
      } else {
        pending.push(prop);
      }
    }
    match (acc, pending.is_empty()) {
      (None, _) => self.ast.alloc_expr(loc, EData::Object { props: pending }),
      (Some(a), true) => a,
      (Some(a), false) => {
        let obj = self.ast.alloc_expr(loc, EData::Object { props: pending });
        self.runtime_call(loc, "__spreadProps", vec![a, obj])
      }
    }
  }

  pub(super) fn runtime_call(&mut self, loc: Loc, helper: &str, args: Vec<ExprId>) -> ExprId {
    let r = self.runtime_ref(helper);
    let target = self.ast.alloc_expr(loc, EData::Ident(r));
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

  /// Lower `let {a, ...rest} = init` into
  /// `let _tmp = init, {a} = _tmp, rest = __objRest(_tmp, ["a"])`.
  pub(super) fn lower_object_rest_decls(&mut self, decls: Vec<Decl>) -> Vec<Decl> {
    if !self.unsupported(feature::OBJECT_REST_SPREAD) {
      return decls;
    }
    let mut out = Vec::new();
    for decl in decls {
      let rest = match &decl.binding {
        Binding::Object { rest: Some(_), .. } => true,
        _ => false,
      };
      if !rest {
        out.push(decl);
        continue;
      }
      let (props, rest_binding) = match decl.binding {
        Binding::Object { props, rest } => (props, *rest.unwrap()),
        _ => unreachable!(),
      };
      let init = match decl.init {
        Some(init) => init,
        None => {
          out.push(Decl {
            binding: Binding::Object { props, rest: None },
            init: None,
          });
          continue;
        }
      };
      let loc = self.ast.expr(init).loc;

      // Excluded keys; computed keys cannot be excluded without evaluation
      // order changes, so they are rejected
      let mut keys = Vec::new();
      let mut ok = true;
      for prop in &props {
        if prop.is_computed {
          ok = false;
          break;
        }
        match self.ast.expr(prop.key).data {
          EData::String(s) => keys.push(s),
          EData::Number { value, .. } => keys.push(Atom::new(&format_number_for_key(value))),
          _ => {
            ok = false;
            break;
          }
        }
      }
      if !ok {
        self.feature_error(Range::new(loc.0, loc.0 + 1), feature::OBJECT_REST_SPREAD);
        out.push(Decl {
          binding: Binding::Object {
            props,
            rest: Some(Box::new(rest_binding)),
          },
          init: Some(init),
        });
        continue;
      }

      let tmp = self.temp_ref();
      out.push(Decl {
        binding: Binding::Ident(tmp),
        init: Some(init),
      });
      if !props.is_empty() {
        let read = self.ast.alloc_expr(loc, EData::Ident(tmp));
        out.push(Decl {
          binding: Binding::Object { props, rest: None },
          init: Some(read),
        });
      }
      let read = self.ast.alloc_expr(loc, EData::Ident(tmp));
      let key_exprs = keys
        .into_iter()
        .map(|k| self.ast.alloc_expr(loc, EData::String(k)))
        .collect();
      let keys_array = self.ast.alloc_expr(loc, EData::Array { items: key_exprs });
      let call = self.runtime_call(loc, "__objRest", vec![read, keys_array]);
      out.push(Decl {
        binding: rest_binding,
        init: Some(call),
      });
    }
    out
  }

  // ------------------------------------------------------------------
  // Class fields
  // ------------------------------------------------------------------

  /// Lower class fields for targets without them: instance fields move into
  /// the constructor, static fields become assignments after the class.
  pub(super) fn lower_class(&mut self, mut class: Class, is_export: bool) -> (SData, Vec<StmtId>) {
    let needs_lowering = self.unsupported(feature::CLASS_FIELD)
      && class
        .props
        .iter()
        .any(|p| p.kind == ClassPropKind::Field);
    if !needs_lowering {
      return (SData::Class { class, is_export }, Vec::new());
    }

    let target = class.name;
    let extra = self.lower_class_fields_in_place(&mut class, target);
    (SData::Class { class, is_export }, extra)
  }

  /// Shared field-lowering core. Returns statements that must follow the
  /// class declaration (static field assignments).
  pub(super) fn lower_class_fields_in_place(
    &mut self,
    class: &mut Class,
    static_target: Option<Ref>,
  ) -> Vec<StmtId> {
    let mut instance_inits: Vec<ExprId> = Vec::new();
    let mut static_stmts: Vec<StmtId> = Vec::new();
    let mut kept = Vec::new();

    for prop in std::mem::take(&mut class.props) {
      if prop.kind != ClassPropKind::Field {
        kept.push(prop);
        continue;
      }
      if matches!(self.ast.expr(prop.key).data, EData::PrivateIdent(_)) {
        self.feature_error(
          Range::new(prop.loc.0, prop.loc.0 + 1),
          feature::CLASS_PRIVATE_MEMBER,
        );
        kept.push(prop);
        continue;
      }
      let loc = prop.loc;
      let value = prop
        .value
        .unwrap_or_else(|| self.ast.alloc_expr(loc, EData::Undefined));

      if prop.is_static {
        let target = match static_target {
          Some(r) => r,
          None => {
            self.feature_error(Range::new(loc.0, loc.0 + 1), feature::CLASS_STATIC_FIELD);
            continue;
          }
        };
        let obj = self.clone_ident(target, loc);
        let lhs = self.member_for_key(obj, prop.key, prop.is_computed, loc);
        let assign = self.ast.alloc_expr(
          loc,
          EData::Binary {
            op: BinOp::Assign,
            left: lhs,
            right: value,
          },
        );
        static_stmts.push(self.ast.alloc_stmt(loc, SData::Expr(assign)));
      } else {
        let this = self.ast.alloc_expr(loc, EData::This);
        let lhs = self.member_for_key(this, prop.key, prop.is_computed, loc);
        let assign = self.ast.alloc_expr(
          loc,
          EData::Binary {
            op: BinOp::Assign,
            left: lhs,
            right: value,
          },
        );
        instance_inits.push(assign);
      }
    }
    class.props = kept;

    if !instance_inits.is_empty() {
      self.insert_into_constructor(class, instance_inits);
    }
    static_stmts
  }

  fn member_for_key(&mut self, obj: ExprId, key: ExprId, is_computed: bool, loc: Loc) -> ExprId {
    if !is_computed {
      if let EData::String(name) = self.ast.expr(key).data {
        if crate::js::lexer::is_identifier(name.as_str()) {
          return self.ast.alloc_expr(
            loc,
            EData::Dot {
              target: obj,
              name,
              optional: false,
            },
          );
        }
      }
    }
    self.ast.alloc_expr(
      loc,
      EData::Index {
        target: obj,
        index: key,
        optional: false,
      },
    )
  }

  fn insert_into_constructor(&mut self, class: &mut Class, inits: Vec<ExprId>) {
    let loc = class.loc;
    let init_stmts: Vec<StmtId> = inits
      .into_iter()
      .map(|e| self.ast.alloc_stmt(loc, SData::Expr(e)))
      .collect();

    // Find an existing constructor
    let ctor_value = class.props.iter().find_map(|prop| {
      if prop.kind != ClassPropKind::Method || prop.is_static || prop.is_computed {
        return None;
      }
      match self.ast.expr(prop.key).data {
        EData::String(s) if s.as_str() == "constructor" => prop.value,
        _ => None,
      }
    });

    if let Some(value) = ctor_value {
      let body = match &self.ast.expr(value).data {
        EData::Function(func) => func.body.clone(),
        _ => Vec::new(),
      };
      // Field initializers run after super() when extending
      let mut at = 0;
      for (i, &s) in body.iter().enumerate() {
        if let SData::Expr(e) = &self.ast.stmt(s).data {
          if let EData::Call { target, .. } = &self.ast.expr(*e).data {
            if matches!(self.ast.expr(*target).data, EData::SuperE) {
              at = i + 1;
              break;
            }
          }
        }
      }
      if let EData::Function(func) = &mut self.ast.exprs[value.0 as usize].data {
        for (offset, stmt) in init_stmts.iter().enumerate() {
          func.body.insert(at + offset, *stmt);
        }
      }
      return;
    }

    // Synthesize a constructor
    let mut body = Vec::new();
    let mut args = Vec::new();
    let mut has_rest_arg = false;
    if class.extends.is_some() {
      let args_ref = self.new_symbol(Atom::new("args"), SymbolKind::Argument);
      args.push(Arg {
        binding: Binding::Ident(args_ref),
        default: None,
      });
      has_rest_arg = true;
      let super_expr = self.ast.alloc_expr(loc, EData::SuperE);
      let args_ident = self.ast.alloc_expr(loc, EData::Ident(args_ref));
      let spread = self.ast.alloc_expr(loc, EData::Spread(args_ident));
      let call = self.ast.alloc_expr(
        loc,
        EData::Call {
          target: super_expr,
          args: vec![spread],
          optional: false,
          is_pure: false,
        },
      );
      body.push(self.ast.alloc_stmt(loc, SData::Expr(call)));
    }
    body.extend(init_stmts);

    let func = Fn {
      name: None,
      args,
      has_rest_arg,
      body,
      is_async: false,
      is_generator: false,
      loc,
    };
    let value = self.ast.alloc_expr(loc, EData::Function(func));
    let key = self.ast.alloc_expr(loc, EData::String(Atom::new("constructor")));
    class.props.insert(
      0,
      ClassProp {
        kind: ClassPropKind::Method,
        is_static: false,
        is_computed: false,
        key,
        value: Some(value),
        loc,
      },
    );
  }
}

fn format_number_for_key(value: f64) -> String {
  if value.fract() == 0.0 && value.abs() < 1e15 {
    format!("{}", value as i64)
  } else {
    format!("{}", value)
  }
}
