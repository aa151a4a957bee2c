use bindle::options::{JsxMode, TransformOptions};
use bindle::{transform, Loader};

fn js(code: &str) -> String {
  let result = transform(code, &TransformOptions::default());
  assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
  result.code
}

fn js_with(code: &str, options: &TransformOptions) -> String {
  let result = transform(code, options);
  assert!(result.errors.is_empty(), "unexpected errors: {:?}", result.errors);
  result.code
}

fn ts(code: &str) -> String {
  js_with(
    code,
    &TransformOptions {
      loader: Loader::Ts,
      ..TransformOptions::default()
    },
  )
}

fn lowered(code: &str, target: &str) -> String {
  js_with(
    code,
    &TransformOptions {
      target: vec![target.to_string()],
      ..TransformOptions::default()
    },
  )
}

#[test]
fn test_simple_statement_prints_exactly() {
  assert_eq!(js("var a = 1"), "var a = 1;\n");
}

#[test]
fn test_precedence_and_parens_round_trip() {
  assert_eq!(js("let x = (a + b) * c;"), "let x = (a + b) * c;\n");
  assert_eq!(js("let x = a + b * c;"), "let x = a + b * c;\n");
  assert_eq!(js("let y = a ? b : c;"), "let y = a ? b : c;\n");
  assert_eq!(js("f(a, (b, c));"), "f(a, (b, c));\n");
}

#[test]
fn test_optional_chain_preserved_at_esnext() {
  assert_eq!(js("a?.b;"), "a?.b;\n");
  assert_eq!(js("a?.[b];"), "a?.[b];\n");
}

#[test]
fn test_optional_chain_lowered_at_es2019() {
  let out = lowered("a?.b;", "es2019");
  assert_eq!(out, "a == null ? void 0 : a.b;\n");
}

#[test]
fn test_optional_chain_short_circuits_whole_chain() {
  let out = lowered("a?.b.c;", "es2019");
  assert_eq!(out, "a == null ? void 0 : a.b.c;\n");
}

#[test]
fn test_nullish_lowered_at_es2019() {
  assert_eq!(lowered("let x = a ?? b;", "es2019"), "let x = a != null ? a : b;\n");
  // Side-effectful left-hand sides get a temporary
  let out = lowered("let x = f() ?? b;", "es2019");
  assert!(out.contains("(_a = f()) != null ? _a : b"), "{}", out);
}

#[test]
fn test_nullish_preserved_at_es2020() {
  assert_eq!(lowered("let x = a ?? b;", "es2020"), "let x = a ?? b;\n");
}

#[test]
fn test_logical_assignment_lowered_at_es2020() {
  assert_eq!(lowered("a ||= b;", "es2020"), "a || (a = b);\n");
  assert_eq!(lowered("a &&= b;", "es2020"), "a && (a = b);\n");
}

#[test]
fn test_exponent_lowered_at_es2015() {
  assert_eq!(lowered("let x = a ** b;", "es2015"), "let x = Math.pow(a, b);\n");
}

#[test]
fn test_object_spread_lowered_at_es2017() {
  let out = lowered("let x = {...a, b: 1};", "es2017");
  assert!(out.contains("__spreadProps"), "{}", out);
  assert!(out.contains("__spreadValues"), "{}", out);
  // The helper definitions are prepended
  assert!(out.contains("var __spreadValues"), "{}", out);
}

#[test]
fn test_object_rest_lowered_in_declarations() {
  let out = lowered("let {a, ...rest} = obj;", "es2017");
  assert!(out.contains("__objRest"), "{}", out);
  assert!(out.contains("[\"a\"]"), "{}", out);
}

#[test]
fn test_object_spread_preserved_at_es2018() {
  assert_eq!(lowered("let x = { ...a };", "es2018"), "let x = { ...a };\n");
}

#[test]
fn test_optional_catch_binding_lowered() {
  let out = lowered("try { f(); } catch { g(); }", "es2018");
  assert!(out.contains("catch (_a)"), "{}", out);
  let kept = lowered("try { f(); } catch { g(); }", "es2019");
  assert!(kept.contains("catch {"), "{}", kept);
}

#[test]
fn test_async_below_target_is_an_error() {
  let result = transform(
    "async function f() {}",
    &TransformOptions {
      target: vec!["es2016".to_string()],
      ..TransformOptions::default()
    },
  );
  assert!(!result.errors.is_empty());
  assert!(result.errors[0].text.contains("async functions"));
}

#[test]
fn test_numeric_separators_stripped_below_target() {
  assert_eq!(lowered("let x = 1_000_000;", "es2020"), "let x = 1000000;\n");
  assert_eq!(lowered("let x = 1_000;", "es2021"), "let x = 1_000;\n");
}

#[test]
fn test_typescript_types_are_erased() {
  assert_eq!(ts("let x: number = 1;"), "let x = 1;\n");
  assert_eq!(ts("function f(a: string): void {}"), "function f(a) {\n}\n");
  assert_eq!(ts("interface Foo { a: number }\nlet x = 1;"), "let x = 1;\n");
  assert_eq!(ts("type A = string | number;\nlet x = 1;"), "let x = 1;\n");
  assert_eq!(ts("let y = x as string;"), "let y = x;\n");
  assert_eq!(ts("let y = x!;"), "let y = x;\n");
}

#[test]
fn test_typescript_enum_is_lowered() {
  let out = ts("enum E { A, B = 5, C }");
  assert!(out.contains("var E;"), "{}", out);
  assert!(out.contains("E[E[\"A\"] = 0] = \"A\""), "{}", out);
  assert!(out.contains("E[E[\"B\"] = 5] = \"B\""), "{}", out);
  assert!(out.contains("E[E[\"C\"] = 6] = \"C\""), "{}", out);
}

#[test]
fn test_typescript_string_enum_has_no_reverse_mapping() {
  let out = ts("enum E { A = \"x\" }");
  assert!(out.contains("E[\"A\"] = \"x\""), "{}", out);
  assert!(!out.contains("= \"A\""), "{}", out);
}

#[test]
fn test_typescript_namespace_is_lowered() {
  let out = ts("namespace N { export const x = 1; }");
  assert!(out.contains("var N;"), "{}", out);
  assert!(out.contains("N.x = x"), "{}", out);
}

#[test]
fn test_jsx_classic_transform() {
  let options = TransformOptions {
    loader: Loader::Jsx,
    jsx_factory: "h".to_string(),
    jsx_fragment: "Fragment".to_string(),
    ..TransformOptions::default()
  };
  assert_eq!(js_with("<Foo bar={1} />;", &options), "h(Foo, { bar: 1 });\n");
  assert_eq!(js_with("<div class=\"a\" />;", &options), "h(\"div\", { class: \"a\" });\n");
  assert_eq!(js_with("<Foo />;", &options), "h(Foo, null);\n");
}

#[test]
fn test_jsx_children_and_fragments() {
  let options = TransformOptions {
    loader: Loader::Jsx,
    jsx_factory: "h".to_string(),
    jsx_fragment: "Fragment".to_string(),
    ..TransformOptions::default()
  };
  assert_eq!(
    js_with("<div>hello {name}</div>;", &options),
    "h(\"div\", null, \"hello \", name);\n"
  );
  assert_eq!(js_with("<>{x}</>;", &options), "h(Fragment, null, x);\n");
}

#[test]
fn test_jsx_automatic_runtime() {
  let options = TransformOptions {
    loader: Loader::Jsx,
    jsx: JsxMode::Automatic,
    ..TransformOptions::default()
  };
  let out = js_with("<div a={1}>text</div>;", &options);
  assert!(out.contains("jsx("), "{}", out);
  assert!(out.contains("children"), "{}", out);
}

#[test]
fn test_minify_syntax_forms() {
  let options = TransformOptions {
    minify_whitespace: true,
    minify_syntax: true,
    ..TransformOptions::default()
  };
  assert_eq!(js_with("let x = true;", &options), "let x=!0");
  assert_eq!(js_with("let x = false;", &options), "let x=!1");
  assert_eq!(js_with("let x = 0.5;", &options), "let x=.5");
  assert_eq!(js_with("let x = undefined;", &options), "let x=void 0");
}

#[test]
fn test_undefined_round_trips_without_minification() {
  assert_eq!(js("let x = undefined;"), "let x = undefined;\n");
}

#[test]
fn test_undefined_to_void_zero_only_where_safe() {
  let options = TransformOptions {
    minify_syntax: true,
    ..TransformOptions::default()
  };
  // A shadowing binding keeps its name
  let out = js_with("function f(undefined) {\n  return undefined;\n}", &options);
  assert!(out.contains("return undefined;"), "{}", out);
  // An assignment target must not become `void 0`
  let out = js_with("undefined = 1;", &options);
  assert!(out.contains("undefined = 1"), "{}", out);
}

#[test]
fn test_if_return_collapses_to_conditional() {
  let options = TransformOptions {
    minify_syntax: true,
    ..TransformOptions::default()
  };
  let out = js_with(
    "function f(a) {\n  if (a) {\n    return 1;\n  } else {\n    return 2;\n  }\n}",
    &options,
  );
  assert!(out.contains("return a ? 1 : 2;"), "{}", out);
  assert!(!out.contains("if"), "{}", out);

  // A value-less branch contributes `void 0`
  let out = js_with("function f(a) {\n  if (a) {\n    return 1;\n  } else {\n    return;\n  }\n}", &options);
  assert!(out.contains("return a ? 1 : void 0;"), "{}", out);
}

#[test]
fn test_if_return_without_else_is_never_collapsed() {
  let options = TransformOptions {
    minify_syntax: true,
    ..TransformOptions::default()
  };
  // Collapsing would make the trailing call unreachable
  let out = js_with("function f(a) {\n  if (a) {\n    return 1;\n  }\n  g();\n}", &options);
  assert!(out.contains("if (a)"), "{}", out);
  assert!(out.contains("g();"), "{}", out);
}

#[test]
fn test_minify_whitespace_omits_final_semicolon() {
  let options = TransformOptions {
    minify_whitespace: true,
    ..TransformOptions::default()
  };
  assert_eq!(js_with("f();g();", &options), "f();g()");
}

#[test]
fn test_string_quote_choice() {
  // Double quotes win a tie; the quote with fewer escapes wins otherwise
  assert_eq!(js("let x = 'a';"), "let x = \"a\";\n");
  assert_eq!(js("let x = \"it's\";"), "let x = \"it's\";\n");
  assert_eq!(js("let x = 'say \"hi\"';"), "let x = 'say \"hi\"';\n");
}

#[test]
fn test_ascii_only_output() {
  let out = js("let x = \"caf\u{e9}\";");
  assert_eq!(out, "let x = \"caf\\u00E9\";\n");
}

#[test]
fn test_define_substitution() {
  let mut options = TransformOptions::default();
  options
    .define
    .insert("process.env.NODE_ENV".to_string(), "\"production\"".to_string());
  options.define.insert("DEBUG".to_string(), "false".to_string());
  let out = js_with("if (process.env.NODE_ENV === \"production\" && DEBUG) f();", &options);
  assert!(out.contains("\"production\" === \"production\""), "{}", out);
  assert!(out.contains("&& false"), "{}", out);
}

#[test]
fn test_template_literals_preserved() {
  assert_eq!(js("let x = `a${b}c`;"), "let x = `a${b}c`;\n");
  assert_eq!(js("let x = tag`a`;"), "let x = tag`a`;\n");
}

#[test]
fn test_classes_round_trip() {
  let out = js("class A extends B {\n  constructor() {\n    super();\n  }\n  method(x) {\n    return x;\n  }\n}");
  assert!(out.contains("class A extends B"), "{}", out);
  assert!(out.contains("constructor()"), "{}", out);
  assert!(out.contains("method(x)"), "{}", out);
}

#[test]
fn test_class_fields_lowered_at_es2020() {
  let out = lowered("class A { x = 1; static y = 2; }", "es2020");
  assert!(out.contains("this.x = 1"), "{}", out);
  assert!(out.contains("A.y = 2"), "{}", out);
  let kept = lowered("class A { x = 1; }", "es2022");
  assert!(kept.contains("x = 1;"), "{}", kept);
}

#[test]
fn test_transform_is_idempotent_after_lowering() {
  let once = lowered("a?.b.c;\nlet x = y ?? z;\n", "es2019");
  let twice = {
    let result = transform(
      &once,
      &TransformOptions {
        target: vec!["es2019".to_string()],
        ..TransformOptions::default()
      },
    );
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    result.code
  };
  assert_eq!(once, twice);
}

#[test]
fn test_transform_does_not_resolve_imports() {
  let out = js("import { a } from \"./missing-on-disk.js\";\nconsole.log(a);\n");
  assert!(out.contains("import { a } from \"./missing-on-disk.js\";"), "{}", out);
}

#[test]
fn test_syntax_error_recovery_produces_multiple_errors() {
  let result = transform("let x = ;\nlet y = 2;\nlet z = ;\n", &TransformOptions::default());
  assert!(result.errors.len() >= 2, "expected several errors, got {:?}", result.errors);
}

#[test]
fn test_source_map_round_trips_to_input_positions() {
  let options = TransformOptions {
    sourcemap: true,
    ..TransformOptions::default()
  };
  let result = transform("let a = 1;\nlet b = 2;\n", &options);
  assert!(result.errors.is_empty());
  let map = result.map.expect("map requested");
  let consumer = bindle::sourcemap::SourceMapConsumer::parse(&map).unwrap();
  // The second output line maps back to the second input line
  let (_, line, _) = consumer.lookup(1, 0).expect("mapping for line 2");
  assert_eq!(line, 1);
  assert_eq!(consumer.sources, vec!["<stdin>".to_string()]);
}

#[test]
fn test_css_transform_minifies() {
  let options = TransformOptions {
    loader: Loader::Css,
    minify_whitespace: true,
    ..TransformOptions::default()
  };
  let result = transform("a { color: red; }\n", &options);
  assert!(result.errors.is_empty());
  assert_eq!(result.code, "a{color:red}");
}
