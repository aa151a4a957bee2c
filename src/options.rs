use crate::compat::{self, FeatureSet};
use crate::interner::Atom;
use crate::logger::{Log, Message, MsgKind};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
  Iife,
  Cjs,
  Esm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
  Browser,
  Node,
  Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Loader {
  Js,
  Jsx,
  Ts,
  Tsx,
  Css,
  Json,
  Text,
  Base64,
  DataUrl,
  File,
  Binary,
}

impl Loader {
  pub fn is_typescript(self) -> bool {
    matches!(self, Loader::Ts | Loader::Tsx)
  }

  pub fn is_jsx_enabled(self) -> bool {
    matches!(self, Loader::Jsx | Loader::Tsx)
  }

  pub fn is_js_like(self) -> bool {
    matches!(self, Loader::Js | Loader::Jsx | Loader::Ts | Loader::Tsx)
  }

  pub fn from_name(name: &str) -> Option<Loader> {
    Some(match name {
      "js" => Loader::Js,
      "jsx" => Loader::Jsx,
      "ts" => Loader::Ts,
      "tsx" => Loader::Tsx,
      "css" => Loader::Css,
      "json" => Loader::Json,
      "text" => Loader::Text,
      "base64" => Loader::Base64,
      "dataurl" => Loader::DataUrl,
      "file" => Loader::File,
      "binary" => Loader::Binary,
      "default" => return None,
      _ => return None,
    })
  }

  /// Default loader for a file extension.
  pub fn by_extension(ext: &str) -> Option<Loader> {
    Some(match ext {
      "js" | "mjs" | "cjs" => Loader::Js,
      "jsx" => Loader::Jsx,
      "ts" | "mts" | "cts" => Loader::Ts,
      "tsx" => Loader::Tsx,
      "css" => Loader::Css,
      "json" => Loader::Json,
      "txt" => Loader::Text,
      _ => return None,
    })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMapMode {
  #[default]
  None,
  Inline,
  External,
  Linked,
  Both,
}

impl SourceMapMode {
  pub fn is_enabled(self) -> bool {
    !matches!(self, SourceMapMode::None)
  }

  pub fn wants_file(self) -> bool {
    matches!(self, SourceMapMode::External | SourceMapMode::Linked | SourceMapMode::Both)
  }

  pub fn wants_inline(self) -> bool {
    matches!(self, SourceMapMode::Inline | SourceMapMode::Both)
  }

  pub fn wants_comment(self) -> bool {
    matches!(self, SourceMapMode::Linked | SourceMapMode::Inline | SourceMapMode::Both)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsxMode {
  /// Lower JSX to `factory(...)` calls.
  #[default]
  Transform,
  /// Lower JSX to `jsx(...)` calls imported from `<importSource>/jsx-runtime`.
  Automatic,
}

/// An entry point: a path, optionally with an explicit output name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
  pub path: String,
  pub name: Option<String>,
}

impl EntryPoint {
  pub fn new(path: impl Into<String>) -> EntryPoint {
    EntryPoint {
      path: path.into(),
      name: None,
    }
  }

  pub fn named(name: impl Into<String>, path: impl Into<String>) -> EntryPoint {
    EntryPoint {
      path: path.into(),
      name: Some(name.into()),
    }
  }
}

/// The build request. A closed struct of optional fields with explicit
/// defaults; unknown options are rejected at the CLI boundary.
#[derive(Debug, Clone)]
pub struct BuildOptions {
  pub entry_points: Vec<EntryPoint>,
  pub bundle: bool,
  pub format: Option<Format>,
  pub platform: Platform,
  pub target: Vec<String>,
  pub loaders: FxHashMap<String, Loader>,
  pub minify_whitespace: bool,
  pub minify_identifiers: bool,
  pub minify_syntax: bool,
  pub sourcemap: SourceMapMode,
  pub sources_content: bool,
  pub define: IndexMap<String, String>,
  pub pure: Vec<String>,
  pub external: Vec<String>,
  pub jsx: JsxMode,
  pub jsx_factory: String,
  pub jsx_fragment: String,
  pub jsx_import_source: String,
  pub splitting: bool,
  pub tree_shaking: Option<bool>,
  pub outdir: Option<PathBuf>,
  pub outfile: Option<PathBuf>,
  pub outbase: Option<PathBuf>,
  pub public_path: String,
  pub entry_names: String,
  pub chunk_names: String,
  pub asset_names: String,
  pub global_name: Option<String>,
  pub metafile: bool,
  pub tsconfig: Option<PathBuf>,
  pub tsconfig_raw: Option<String>,
  pub abs_working_dir: Option<PathBuf>,
  pub error_limit: usize,
  /// Write output files to disk. Tests turn this off and read the returned
  /// buffers instead.
  pub write: bool,
}

impl Default for BuildOptions {
  fn default() -> BuildOptions {
    BuildOptions {
      entry_points: Vec::new(),
      bundle: false,
      format: None,
      platform: Platform::Browser,
      target: Vec::new(),
      loaders: FxHashMap::default(),
      minify_whitespace: false,
      minify_identifiers: false,
      minify_syntax: false,
      sourcemap: SourceMapMode::None,
      sources_content: true,
      define: IndexMap::new(),
      pure: Vec::new(),
      external: Vec::new(),
      jsx: JsxMode::Transform,
      jsx_factory: "React.createElement".to_string(),
      jsx_fragment: "React.Fragment".to_string(),
      jsx_import_source: "react".to_string(),
      splitting: false,
      tree_shaking: None,
      outdir: None,
      outfile: None,
      outbase: None,
      public_path: String::new(),
      entry_names: "[dir]/[name]".to_string(),
      chunk_names: "[name]-[hash]".to_string(),
      asset_names: "[name]-[hash]".to_string(),
      global_name: None,
      metafile: false,
      tsconfig: None,
      tsconfig_raw: None,
      abs_working_dir: None,
      error_limit: 10,
      write: true,
    }
  }
}

impl BuildOptions {
  pub fn minify(&mut self, on: bool) {
    self.minify_whitespace = on;
    self.minify_identifiers = on;
    self.minify_syntax = on;
  }
}

/// The single-input transform request: build options minus entry points,
/// bundling, and path handling.
#[derive(Debug, Clone)]
pub struct TransformOptions {
  pub loader: Loader,
  pub target: Vec<String>,
  pub minify_whitespace: bool,
  pub minify_identifiers: bool,
  pub minify_syntax: bool,
  pub sourcemap: bool,
  pub define: IndexMap<String, String>,
  pub pure: Vec<String>,
  pub jsx: JsxMode,
  pub jsx_factory: String,
  pub jsx_fragment: String,
  pub jsx_import_source: String,
  pub format: Option<Format>,
  pub source_file: String,
}

impl Default for TransformOptions {
  fn default() -> TransformOptions {
    TransformOptions {
      loader: Loader::Js,
      target: Vec::new(),
      minify_whitespace: false,
      minify_identifiers: false,
      minify_syntax: false,
      sourcemap: false,
      define: IndexMap::new(),
      pure: Vec::new(),
      jsx: JsxMode::Transform,
      jsx_factory: "React.createElement".to_string(),
      jsx_fragment: "React.Fragment".to_string(),
      jsx_import_source: "react".to_string(),
      format: None,
      source_file: "<stdin>".to_string(),
    }
  }
}

impl TransformOptions {
  pub fn minify(&mut self, on: bool) {
    self.minify_whitespace = on;
    self.minify_identifiers = on;
    self.minify_syntax = on;
  }
}

/// A `define` replacement value. Only constants and identifier paths are
/// accepted; anything else is a configuration error.
#[derive(Debug, Clone, PartialEq)]
pub enum DefineValue {
  Undefined,
  Null,
  Bool(bool),
  Number(f64),
  String(Atom),
  Ident(Atom),
}

/// A compiled `define` entry: the dotted path to replace and its value.
#[derive(Debug, Clone)]
pub struct Define {
  pub path: Vec<Atom>,
  pub value: DefineValue,
}

fn parse_define_value(text: &str) -> Option<DefineValue> {
  let text = text.trim();
  match text {
    "undefined" => return Some(DefineValue::Undefined),
    "null" => return Some(DefineValue::Null),
    "true" => return Some(DefineValue::Bool(true)),
    "false" => return Some(DefineValue::Bool(false)),
    _ => {}
  }
  if let Ok(n) = text.parse::<f64>() {
    return Some(DefineValue::Number(n));
  }
  let bytes = text.as_bytes();
  if bytes.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') && bytes[bytes.len() - 1] == bytes[0] {
    // String contents are used verbatim; escape handling happens when the
    // replacement is printed.
    let inner = &text[1..text.len() - 1];
    if !inner.contains(bytes[0] as char) && !inner.contains('\\') {
      return Some(DefineValue::String(Atom::new(inner)));
    }
    return None;
  }
  if is_identifier_path(text) {
    return Some(DefineValue::Ident(Atom::new(text)));
  }
  None
}

fn is_identifier_path(text: &str) -> bool {
  !text.is_empty()
    && text.split('.').all(|part| {
      let mut chars = part.chars();
      match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
      }
      chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
    })
}

/// Options after boundary validation, shared by every pipeline stage.
#[derive(Debug, Clone)]
pub struct CompiledOptions {
  pub unsupported: FeatureSet,
  pub defines: Vec<Define>,
  pub pure_calls: Vec<Vec<Atom>>,
  pub format: Format,
  pub output_format_was_inferred: bool,
}

/// Validate the pieces of the options surface shared by build and transform.
/// Problems become error `Message`s; a best-effort compiled form is always
/// returned so later stages can proceed and report more diagnostics.
pub fn compile_common_options(
  target: &[String],
  define: &IndexMap<String, String>,
  pure: &[String],
  format: Option<Format>,
  log: &Log,
) -> CompiledOptions {
  let unsupported = match compat::parse_targets(target) {
    Ok(mask) => mask,
    Err(text) => {
      log.add_msg(Message {
        kind: MsgKind::Error,
        text,
        location: None,
        notes: Vec::new(),
        sort_key: (u32::MAX, 0),
      });
      0
    }
  };

  let mut defines = Vec::new();
  for (key, value) in define {
    if !is_identifier_path(key) {
      option_error(log, format!("Invalid define key: {:?}", key));
      continue;
    }
    match parse_define_value(value) {
      Some(parsed) => defines.push(Define {
        path: key.split('.').map(Atom::new).collect(),
        value: parsed,
      }),
      None => option_error(
        log,
        format!("Invalid define value (must be a constant or identifier): {:?}", value),
      ),
    }
  }

  let mut pure_calls = Vec::new();
  for name in pure {
    if !is_identifier_path(name) {
      option_error(log, format!("Invalid pure function name: {:?}", name));
      continue;
    }
    pure_calls.push(name.split('.').map(Atom::new).collect());
  }

  CompiledOptions {
    unsupported,
    defines,
    pure_calls,
    format: format.unwrap_or(Format::Esm),
    output_format_was_inferred: format.is_none(),
  }
}

pub fn option_error(log: &Log, text: String) {
  log.add_msg(Message {
    kind: MsgKind::Error,
    text,
    location: None,
    notes: Vec::new(),
    sort_key: (u32::MAX, 0),
  });
}

/// Validate build-only option combinations.
pub fn validate_build_options(options: &BuildOptions, log: &Log) {
  if options.entry_points.is_empty() {
    option_error(log, "No entry points were provided".to_string());
  }
  if options.splitting {
    if options.format != Some(Format::Esm) {
      option_error(log, "Splitting currently only works with the \"esm\" format".to_string());
    }
    if !options.bundle {
      option_error(log, "Splitting requires bundling to be enabled".to_string());
    }
  }
  if options.outfile.is_some() && options.outdir.is_some() {
    option_error(log, "Cannot use both \"outfile\" and \"outdir\"".to_string());
  }
  if options.outfile.is_some() && options.entry_points.len() > 1 {
    option_error(
      log,
      "Cannot use \"outfile\" with multiple entry points (use \"outdir\" instead)".to_string(),
    );
  }
  if options.global_name.is_some() && options.format == Some(Format::Esm) {
    option_error(log, "Cannot use \"globalName\" with the \"esm\" format".to_string());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_define_value_parsing() {
    assert_eq!(parse_define_value("true"), Some(DefineValue::Bool(true)));
    assert_eq!(parse_define_value("null"), Some(DefineValue::Null));
    assert_eq!(parse_define_value("1.5"), Some(DefineValue::Number(1.5)));
    assert_eq!(
      parse_define_value("\"production\""),
      Some(DefineValue::String(Atom::new("production")))
    );
    assert_eq!(
      parse_define_value("globalThis.process"),
      Some(DefineValue::Ident(Atom::new("globalThis.process")))
    );
    assert_eq!(parse_define_value("1 + 2"), None);
  }

  #[test]
  fn test_splitting_requires_esm() {
    let log = Log::new(0);
    let options = BuildOptions {
      entry_points: vec![EntryPoint::new("a.js")],
      bundle: true,
      splitting: true,
      format: Some(Format::Cjs),
      ..BuildOptions::default()
    };
    validate_build_options(&options, &log);
    assert!(log.has_errors());
  }

  #[test]
  fn test_outfile_outdir_conflict() {
    let log = Log::new(0);
    let options = BuildOptions {
      entry_points: vec![EntryPoint::new("a.js")],
      outfile: Some(PathBuf::from("out.js")),
      outdir: Some(PathBuf::from("out")),
      ..BuildOptions::default()
    };
    validate_build_options(&options, &log);
    assert!(log.has_errors());
  }

  #[test]
  fn test_loader_tables() {
    assert_eq!(Loader::by_extension("mjs"), Some(Loader::Js));
    assert_eq!(Loader::by_extension("tsx"), Some(Loader::Tsx));
    assert_eq!(Loader::by_extension("wasm"), None);
    assert!(Loader::Tsx.is_typescript());
    assert!(Loader::Tsx.is_jsx_enabled());
    assert!(!Loader::Ts.is_jsx_enabled());
  }
}
