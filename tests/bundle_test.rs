use bindle::options::{BuildOptions, EntryPoint, Format};
use bindle::{build, BuildResult};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, rel: &str, contents: &str) {
  let path = dir.join(rel);
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, contents).unwrap();
}

fn bundle(dir: &Path, entries: &[&str]) -> BuildResult {
  bundle_with(dir, entries, |_| {})
}

fn bundle_with(dir: &Path, entries: &[&str], configure: impl FnOnce(&mut BuildOptions)) -> BuildResult {
  let mut options = BuildOptions {
    entry_points: entries.iter().map(|e| EntryPoint::new(*e)).collect(),
    bundle: true,
    abs_working_dir: Some(dir.to_path_buf()),
    write: false,
    ..BuildOptions::default()
  };
  configure(&mut options);
  build(&options).unwrap()
}

fn output_text(result: &BuildResult, index: usize) -> String {
  String::from_utf8(result.output_files[index].contents.clone()).unwrap()
}

#[test]
fn test_simple_bundle_hoists_and_tree_shakes() {
  let tmp = TempDir::new().unwrap();
  write(
    tmp.path(),
    "math.js",
    "export function add(a, b) { return a + b; }\nexport function unused() { return 1; }\n",
  );
  write(
    tmp.path(),
    "main.js",
    "import { add } from './math.js';\nconsole.log(add(1, 2));\n",
  );
  let result = bundle(tmp.path(), &["main.js"]);
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  assert_eq!(result.output_files.len(), 1);
  let code = output_text(&result, 0);

  // Scope hoisting: no import statements remain
  assert!(!code.contains("import"), "{}", code);
  // The used export survives; the unused one is shaken away
  assert!(code.contains("function add"), "{}", code);
  assert!(!code.contains("unused"), "{}", code);
  // Dependencies come before dependents
  let add_pos = code.find("function add").unwrap();
  let log_pos = code.find("console.log").unwrap();
  assert!(add_pos < log_pos, "{}", code);
}

#[test]
fn test_build_is_deterministic() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "z.js", "export let z = 'z';\n");
  write(tmp.path(), "a.js", "export let a = 'a';\n");
  write(
    tmp.path(),
    "main.js",
    "import { z } from './z.js';\nimport { a } from './a.js';\nconsole.log(z, a);\n",
  );
  let first = bundle(tmp.path(), &["main.js"]);
  let second = bundle(tmp.path(), &["main.js"]);
  assert!(first.errors.is_empty(), "{:?}", first.errors);
  assert_eq!(first.output_files.len(), second.output_files.len());
  for (a, b) in first.output_files.iter().zip(second.output_files.iter()) {
    assert_eq!(a.path, b.path);
    assert_eq!(a.contents, b.contents);
    assert_eq!(a.hash, b.hash);
  }
}

#[test]
fn test_symbol_collisions_are_renamed() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "one.js", "export function helper() { return 1; }\n");
  write(tmp.path(), "two.js", "export function helper() { return 2; }\n");
  write(
    tmp.path(),
    "main.js",
    "import { helper } from './one.js';\nimport { helper as helper2 } from './two.js';\nconsole.log(helper() + helper2());\n",
  );
  let result = bundle(tmp.path(), &["main.js"]);
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  let code = output_text(&result, 0);
  // Both declarations survive under distinct names
  assert!(code.contains("function helper()"), "{}", code);
  assert!(code.contains("function helper2()") || code.contains("function helper3()"), "{}", code);
}

#[test]
fn test_commonjs_interop() {
  let tmp = TempDir::new().unwrap();
  write(
    tmp.path(),
    "lib.js",
    "module.exports = { greet: function() { return 'hi'; } };\n",
  );
  write(
    tmp.path(),
    "main.js",
    "import lib from './lib.js';\nconsole.log(lib.greet());\n",
  );
  let result = bundle(tmp.path(), &["main.js"]);
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  let code = output_text(&result, 0);
  assert!(code.contains("__commonJS"), "{}", code);
  assert!(code.contains("__toESM"), "{}", code);
  // The default import reads through the interop namespace
  assert!(code.contains(".default.greet()"), "{}", code);
}

#[test]
fn test_require_of_esm_module() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "esm.js", "export let value = 42;\n");
  write(
    tmp.path(),
    "main.js",
    "const mod = require('./esm.js');\nconsole.log(mod.value);\n",
  );
  let result = bundle(tmp.path(), &["main.js"]);
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  let code = output_text(&result, 0);
  assert!(code.contains("__esm"), "{}", code);
  assert!(code.contains("__toCommonJS"), "{}", code);
  assert!(code.contains("init_esm"), "{}", code);
}

#[test]
fn test_code_splitting_produces_shared_chunk() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "shared.js", "export let shared = 'both';\n");
  write(
    tmp.path(),
    "x.js",
    "import { shared } from './shared.js';\nconsole.log('x', shared);\n",
  );
  write(
    tmp.path(),
    "y.js",
    "import { shared } from './shared.js';\nconsole.log('y', shared);\n",
  );
  let result = bundle_with(tmp.path(), &["x.js", "y.js"], |options| {
    options.splitting = true;
    options.format = Some(Format::Esm);
  });
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  // Three chunks: x, y, and the shared chunk
  assert_eq!(result.output_files.len(), 3, "{:?}", result.output_files.iter().map(|f| &f.path).collect::<Vec<_>>());

  let x_code = output_text(&result, 0);
  let y_code = output_text(&result, 1);
  let shared_code = output_text(&result, 2);
  // Entries import the shared chunk rather than duplicating it
  assert!(x_code.contains("import { shared } from \"./"), "{}", x_code);
  assert!(y_code.contains("import { shared } from \"./"), "{}", y_code);
  assert!(!x_code.contains("both"), "{}", x_code);
  assert!(shared_code.contains("both"), "{}", shared_code);
  assert!(shared_code.contains("export {"), "{}", shared_code);
}

#[test]
fn test_without_splitting_shared_files_are_duplicated() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "shared.js", "export let shared = 'both';\n");
  write(tmp.path(), "x.js", "import { shared } from './shared.js';\nconsole.log(shared);\n");
  write(tmp.path(), "y.js", "import { shared } from './shared.js';\nconsole.log(shared);\n");
  let result = bundle(tmp.path(), &["x.js", "y.js"]);
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  assert_eq!(result.output_files.len(), 2);
  assert!(output_text(&result, 0).contains("both"));
  assert!(output_text(&result, 1).contains("both"));
}

#[test]
fn test_ambiguous_star_reexport_is_an_error_when_referenced() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "m.js", "export let a = 1;\n");
  write(tmp.path(), "n.js", "export let a = 2;\n");
  write(tmp.path(), "both.js", "export * from './m.js';\nexport * from './n.js';\n");
  write(tmp.path(), "main.js", "import { a } from './both.js';\nconsole.log(a);\n");
  let result = bundle(tmp.path(), &["main.js"]);
  assert!(!result.errors.is_empty());
  assert!(result.errors[0].text.contains("Ambiguous"), "{:?}", result.errors);
}

#[test]
fn test_duplicate_named_export_is_an_error() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "m.js", "export let a = 1;\n");
  write(tmp.path(), "n.js", "export let a = 2;\n");
  write(
    tmp.path(),
    "main.js",
    "export { a } from './m.js';\nexport { a } from './n.js';\n",
  );
  let result = bundle(tmp.path(), &["main.js"]);
  assert!(!result.errors.is_empty());
  assert!(
    result.errors[0].text.contains("Multiple exports with the same name"),
    "{:?}",
    result.errors
  );
}

#[test]
fn test_missing_export_is_an_error_with_location() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "m.js", "export let a = 1;\n");
  write(tmp.path(), "main.js", "import { missing } from './m.js';\nconsole.log(missing);\n");
  let result = bundle(tmp.path(), &["main.js"]);
  assert!(!result.errors.is_empty());
  let error = &result.errors[0];
  assert!(error.text.contains("No matching export"), "{:?}", error);
  let location = error.location.as_ref().expect("binding site location");
  assert_eq!(location.file, "main.js");
}

#[test]
fn test_side_effect_free_package_is_shaken() {
  let tmp = TempDir::new().unwrap();
  write(
    tmp.path(),
    "node_modules/quiet/package.json",
    "{\"main\": \"index.js\", \"sideEffects\": false}",
  );
  write(
    tmp.path(),
    "node_modules/quiet/index.js",
    "console.log('boot side effect');\nexport function used() { return 1; }\nexport function dead() { return 2; }\n",
  );
  write(
    tmp.path(),
    "main.js",
    "import { used } from 'quiet';\nconsole.log(used());\n",
  );
  let result = bundle(tmp.path(), &["main.js"]);
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  let code = output_text(&result, 0);
  assert!(code.contains("function used"), "{}", code);
  assert!(!code.contains("boot side effect"), "{}", code);
  assert!(!code.contains("function dead"), "{}", code);
}

#[test]
fn test_entry_exports_survive_in_esm_output() {
  let tmp = TempDir::new().unwrap();
  write(
    tmp.path(),
    "main.js",
    "export function api() { return 1; }\nexport const VERSION = '1.0';\n",
  );
  let result = bundle_with(tmp.path(), &["main.js"], |options| {
    options.format = Some(Format::Esm);
  });
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  let code = output_text(&result, 0);
  assert!(code.contains("export {"), "{}", code);
  assert!(code.contains("api"), "{}", code);
  assert!(code.contains("VERSION"), "{}", code);
}

#[test]
fn test_iife_format_wraps_output() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "main.js", "console.log('hello');\n");
  let result = bundle_with(tmp.path(), &["main.js"], |options| {
    options.format = Some(Format::Iife);
    options.global_name = Some("MyLib".to_string());
  });
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  let code = output_text(&result, 0);
  assert!(code.starts_with("var MyLib = (() => {"), "{}", code);
  assert!(code.trim_end().ends_with("})();"), "{}", code);
}

#[test]
fn test_external_imports_are_preserved_in_esm() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "main.js", "import react from 'react';\nconsole.log(react);\n");
  let result = bundle_with(tmp.path(), &["main.js"], |options| {
    options.external = vec!["react".to_string()];
    options.format = Some(Format::Esm);
  });
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  let code = output_text(&result, 0);
  assert!(code.contains("from \"react\""), "{}", code);
}

#[test]
fn test_external_imports_become_require_in_cjs() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "main.js", "import react from 'react';\nconsole.log(react);\n");
  let result = bundle_with(tmp.path(), &["main.js"], |options| {
    options.external = vec!["react".to_string()];
    options.format = Some(Format::Cjs);
  });
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  let code = output_text(&result, 0);
  assert!(code.contains("require(\"react\")"), "{}", code);
  assert!(code.contains("__toESM"), "{}", code);
}

#[test]
fn test_json_loader() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "config.json", "{\"name\": \"app\", \"port\": 8080}\n");
  write(
    tmp.path(),
    "main.js",
    "import config from './config.json';\nconsole.log(config.port);\n",
  );
  let result = bundle(tmp.path(), &["main.js"]);
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  let code = output_text(&result, 0);
  assert!(code.contains("name: \"app\""), "{}", code);
  assert!(code.contains("port: 8080"), "{}", code);
}

#[test]
fn test_css_bundle_inlines_imports_in_order() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "theme.css", "a { color: blue; }\n");
  write(tmp.path(), "entry.css", "@import \"./theme.css\";\nbody { color: red; }\n");
  let result = bundle(tmp.path(), &["entry.css"]);
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  assert_eq!(result.output_files.len(), 1);
  let code = output_text(&result, 0);
  assert!(!code.contains("@import"), "{}", code);
  let theme_pos = code.find("color: blue").unwrap();
  let body_pos = code.find("color: red").unwrap();
  assert!(theme_pos < body_pos, "{}", code);
}

#[test]
fn test_js_importing_css_emits_a_css_chunk() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "style.css", ".app { margin: 0; }\n");
  write(tmp.path(), "main.js", "import './style.css';\nconsole.log('app');\n");
  let result = bundle(tmp.path(), &["main.js"]);
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  assert_eq!(result.output_files.len(), 2);
  let js_code = output_text(&result, 0);
  let css_code = output_text(&result, 1);
  assert!(js_code.contains("console.log"), "{}", js_code);
  assert!(!js_code.contains("margin"), "{}", js_code);
  assert!(css_code.contains(".app"), "{}", css_code);
}

#[test]
fn test_dynamic_import_without_splitting_is_inlined() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "lazy.js", "export let lazy = 'loaded';\n");
  write(
    tmp.path(),
    "main.js",
    "import('./lazy.js').then(function(mod) { console.log(mod.lazy); });\n",
  );
  let result = bundle(tmp.path(), &["main.js"]);
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  assert_eq!(result.output_files.len(), 1);
  let code = output_text(&result, 0);
  assert!(code.contains("Promise.resolve()"), "{}", code);
  assert!(code.contains("loaded"), "{}", code);
}

#[test]
fn test_typescript_entry_point() {
  let tmp = TempDir::new().unwrap();
  write(
    tmp.path(),
    "util.ts",
    "export interface Shape { area: number }\nexport function describe(s: Shape): string { return `area ${s.area}`; }\n",
  );
  write(
    tmp.path(),
    "main.ts",
    "import { describe } from './util';\nconsole.log(describe({ area: 3 }));\n",
  );
  let result = bundle(tmp.path(), &["main.ts"]);
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  let code = output_text(&result, 0);
  assert!(code.contains("function describe(s)"), "{}", code);
  assert!(!code.contains("interface"), "{}", code);
  assert!(!code.contains("Shape"), "{}", code);
}

#[test]
fn test_metafile_describes_the_graph() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "dep.js", "export let d = 1;\n");
  write(tmp.path(), "main.js", "import { d } from './dep.js';\nconsole.log(d);\n");
  let result = bundle_with(tmp.path(), &["main.js"], |options| {
    options.metafile = true;
  });
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  let metafile = result.metafile.expect("metafile requested");
  let value: serde_json::Value = serde_json::from_str(&metafile).unwrap();
  assert!(value["inputs"]["main.js"]["imports"][0]["path"] == "dep.js");
  assert!(value["outputs"].as_object().unwrap().len() == 1);
}

#[test]
fn test_minified_bundle() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "dep.js", "export function longFunctionName(value) { return value + 1; }\n");
  write(
    tmp.path(),
    "main.js",
    "import { longFunctionName } from './dep.js';\nconsole.log(longFunctionName(1));\n",
  );
  let result = bundle_with(tmp.path(), &["main.js"], |options| {
    options.minify(true);
  });
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  let code = output_text(&result, 0);
  // The top-level function was renamed to a short identifier
  assert!(!code.contains("longFunctionName"), "{}", code);
  assert!(!code.contains('\n'), "{}", code);
}

#[test]
fn test_sourcemap_external_file() {
  let tmp = TempDir::new().unwrap();
  write(tmp.path(), "main.js", "let value = 1;\nconsole.log(value);\n");
  let result = bundle_with(tmp.path(), &["main.js"], |options| {
    options.sourcemap = bindle::SourceMapMode::Linked;
  });
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  assert_eq!(result.output_files.len(), 2);
  // The map file sits next to the bundle
  let map_file = &result.output_files[0];
  assert!(map_file.path.to_string_lossy().ends_with(".map"), "{:?}", map_file.path);
  let map: serde_json::Value = serde_json::from_slice(&map_file.contents).unwrap();
  assert_eq!(map["version"], 3);
  assert_eq!(map["sources"][0], "main.js");
  let bundle_code = output_text(&result, 1);
  assert!(bundle_code.contains("sourceMappingURL="), "{}", bundle_code);
}

#[test]
fn test_circular_imports_do_not_hang() {
  let tmp = TempDir::new().unwrap();
  write(
    tmp.path(),
    "a.js",
    "import { b } from './b.js';\nexport function a() { return b; }\n",
  );
  write(
    tmp.path(),
    "b.js",
    "import { a } from './a.js';\nexport let b = 'b';\nexport let also = a;\n",
  );
  let result = bundle(tmp.path(), &["a.js"]);
  assert!(result.errors.is_empty(), "{:?}", result.errors);
  let code = output_text(&result, 0);
  assert!(code.contains("function a"), "{}", code);
}

#[test]
fn test_error_limit_caps_diagnostics() {
  let tmp = TempDir::new().unwrap();
  let mut source = String::new();
  for i in 0..30 {
    source.push_str(&format!("import './missing{}.js';\n", i));
  }
  write(tmp.path(), "main.js", &source);
  let result = bundle_with(tmp.path(), &["main.js"], |options| {
    options.error_limit = 5;
  });
  assert_eq!(result.errors.len(), 5);
}
