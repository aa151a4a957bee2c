//! The resolver contract surface: maps `(importer, specifier)` to a file on
//! disk plus loader metadata. Deterministic and safe to call from many
//! worker threads concurrently. Everything beyond relative/absolute paths,
//! `tsconfig` aliases, and a minimal `node_modules` walk is out of scope.

use crate::graph::ImportKind;
use crate::options::{BuildOptions, Loader, Platform};
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// A successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
  pub path: PathBuf,
  pub namespace: &'static str,
  /// False when the owning package declares `"sideEffects": false`.
  pub side_effects: bool,
  pub external: bool,
  pub loader: Option<Loader>,
}

impl Resolution {
  fn external(specifier: &str) -> Resolution {
    Resolution {
      path: PathBuf::from(specifier),
      namespace: "external",
      side_effects: true,
      external: true,
      loader: None,
    }
  }
}

/// A `tsconfig.json` `paths` alias: a pattern with at most one `*` and its
/// substitution targets.
#[derive(Debug, Clone)]
struct PathAlias {
  pattern: String,
  targets: Vec<String>,
}

#[derive(Default)]
struct PackageInfo {
  main_fields: Vec<String>,
  side_effects_false: bool,
}

pub struct Resolver {
  platform: Platform,
  external: Vec<String>,
  extensions: Vec<&'static str>,
  base_url: Option<PathBuf>,
  aliases: Vec<PathAlias>,
  package_cache: Mutex<FxHashMap<PathBuf, Option<std::sync::Arc<PackageInfo>>>>,
}

const NODE_BUILTINS: &[&str] = &[
  "assert", "buffer", "child_process", "cluster", "console", "constants", "crypto", "dgram", "dns",
  "domain", "events", "fs", "http", "http2", "https", "module", "net", "os", "path", "perf_hooks",
  "process", "punycode", "querystring", "readline", "repl", "stream", "string_decoder", "timers",
  "tls", "tty", "url", "util", "v8", "vm", "worker_threads", "zlib",
];

impl Resolver {
  pub fn new(options: &BuildOptions, cwd: &Path) -> Resolver {
    let mut resolver = Resolver {
      platform: options.platform,
      external: options.external.clone(),
      extensions: vec![".tsx", ".ts", ".jsx", ".js", ".mjs", ".cjs", ".css", ".json"],
      base_url: None,
      aliases: Vec::new(),
      package_cache: Mutex::new(FxHashMap::default()),
    };
    let tsconfig_path = match &options.tsconfig {
      Some(path) if path.is_absolute() => Some(path.clone()),
      Some(path) => Some(cwd.join(path)),
      None => {
        let default = cwd.join("tsconfig.json");
        if default.exists() {
          Some(default)
        } else {
          None
        }
      }
    };
    if let Some(raw) = &options.tsconfig_raw {
      resolver.load_tsconfig_text(raw, cwd);
    } else if let Some(path) = tsconfig_path {
      if let Ok(mut text) = fs::read_to_string(&path) {
        let dir = path.parent().unwrap_or(cwd).to_path_buf();
        let _ = json_strip_comments::strip(&mut text);
        resolver.load_tsconfig_text(&text, &dir);
      }
    }
    resolver
  }

  fn load_tsconfig_text(&mut self, text: &str, dir: &Path) {
    let mut text = text.to_string();
    let _ = json_strip_comments::strip(&mut text);
    let value: Value = match serde_json::from_str(&text) {
      Ok(value) => value,
      Err(err) => {
        debug!("Failed to parse tsconfig: {}", err);
        return;
      }
    };
    let compiler_options = match value.get("compilerOptions") {
      Some(options) => options,
      None => return,
    };
    if let Some(base_url) = compiler_options.get("baseUrl").and_then(|v| v.as_str()) {
      self.base_url = Some(dir.join(base_url));
    }
    if let Some(paths) = compiler_options.get("paths").and_then(|v| v.as_object()) {
      for (pattern, targets) in paths {
        let targets: Vec<String> = targets
          .as_array()
          .map(|list| {
            list
              .iter()
              .filter_map(|t| t.as_str().map(|s| s.to_string()))
              .collect()
          })
          .unwrap_or_default();
        self.aliases.push(PathAlias {
          pattern: pattern.clone(),
          targets,
        });
      }
    }
  }

  /// Resolve one specifier. `importer_dir` is the directory of the importing
  /// file (the "resolveDir").
  pub fn resolve(&self, importer_dir: &Path, specifier: &str, kind: ImportKind) -> Result<Resolution, String> {
    let _ = kind;

    if specifier.starts_with("data:") {
      return Ok(Resolution {
        path: PathBuf::from(specifier),
        namespace: "dataurl",
        side_effects: true,
        external: false,
        loader: None,
      });
    }

    // The `external` option matches exact specifiers and `pkg/*` prefixes
    for pattern in &self.external {
      if let Some(prefix) = pattern.strip_suffix("/*") {
        if specifier.starts_with(prefix) && specifier.len() > prefix.len() {
          return Ok(Resolution::external(specifier));
        }
      } else if pattern == specifier {
        return Ok(Resolution::external(specifier));
      }
    }

    if specifier.starts_with("./") || specifier.starts_with("../") {
      let base = normalize(&importer_dir.join(specifier));
      return self
        .probe(&base)
        .ok_or_else(|| format!("Could not resolve {:?}", specifier));
    }
    if Path::new(specifier).is_absolute() {
      let base = normalize(Path::new(specifier));
      return self
        .probe(&base)
        .ok_or_else(|| format!("Could not resolve {:?}", specifier));
    }

    // tsconfig paths aliases
    for alias in &self.aliases {
      if let Some(expanded) = match_alias(&alias.pattern, specifier) {
        let base_dir = self.base_url.clone().unwrap_or_else(|| importer_dir.to_path_buf());
        for target in &alias.targets {
          let substituted = target.replace('*', &expanded);
          let base = normalize(&base_dir.join(&substituted));
          if let Some(resolution) = self.probe(&base) {
            return Ok(resolution);
          }
        }
      }
    }

    // baseUrl non-relative lookup
    if let Some(base_url) = &self.base_url {
      let base = normalize(&base_url.join(specifier));
      if let Some(resolution) = self.probe(&base) {
        return Ok(resolution);
      }
    }

    // Node builtins stay external on the node platform
    let bare_root = specifier.split('/').next().unwrap_or(specifier);
    let bare_root = bare_root.strip_prefix("node:").unwrap_or(bare_root);
    if self.platform == Platform::Node && NODE_BUILTINS.contains(&bare_root) {
      return Ok(Resolution::external(specifier));
    }

    // Minimal node_modules walk
    if let Some(resolution) = self.resolve_node_modules(importer_dir, specifier) {
      return Ok(resolution);
    }

    Err(format!(
      "Could not resolve {:?} (mark it as external to exclude it from the bundle)",
      specifier
    ))
  }

  /// Try the path itself, with extension completion, then as a directory
  /// with `/index` completion.
  fn probe(&self, base: &Path) -> Option<Resolution> {
    if base.is_file() {
      return Some(self.found(base.to_path_buf()));
    }
    let base_str = base.to_string_lossy().to_string();
    for ext in &self.extensions {
      let candidate = PathBuf::from(format!("{}{}", base_str, ext));
      if candidate.is_file() {
        return Some(self.found(candidate));
      }
    }
    if base.is_dir() {
      // package.json "main"/"module" applies to directory imports
      if let Some(info) = self.package_info(&base.join("package.json")) {
        for field in &info.main_fields {
          let candidate = normalize(&base.join(field));
          if candidate.is_file() {
            return Some(self.found(candidate));
          }
          let with_ext = self.probe_exts(&candidate);
          if let Some(found) = with_ext {
            return Some(found);
          }
        }
      }
      for ext in &self.extensions {
        let candidate = base.join(format!("index{}", ext));
        if candidate.is_file() {
          return Some(self.found(candidate));
        }
      }
    }
    None
  }

  fn probe_exts(&self, base: &Path) -> Option<Resolution> {
    let base_str = base.to_string_lossy().to_string();
    for ext in &self.extensions {
      let candidate = PathBuf::from(format!("{}{}", base_str, ext));
      if candidate.is_file() {
        return Some(self.found(candidate));
      }
    }
    None
  }

  fn resolve_node_modules(&self, importer_dir: &Path, specifier: &str) -> Option<Resolution> {
    let mut dir = Some(importer_dir.to_path_buf());
    while let Some(current) = dir {
      let candidate = current.join("node_modules").join(specifier);
      if let Some(resolution) = self.probe(&candidate) {
        return Some(resolution);
      }
      dir = current.parent().map(|p| p.to_path_buf());
    }
    None
  }

  fn found(&self, path: PathBuf) -> Resolution {
    let side_effects = self
      .owning_package(&path)
      .map(|info| !info.side_effects_false)
      .unwrap_or(true);
    Resolution {
      path,
      namespace: "file",
      side_effects,
      external: false,
      loader: None,
    }
  }

  /// The nearest enclosing package.json, for the `sideEffects` hint.
  fn owning_package(&self, path: &Path) -> Option<std::sync::Arc<PackageInfo>> {
    let mut dir = path.parent();
    while let Some(current) = dir {
      let manifest = current.join("package.json");
      if let Some(info) = self.package_info(&manifest) {
        return Some(info);
      }
      if current.file_name().map(|n| n == "node_modules").unwrap_or(false) {
        break;
      }
      dir = current.parent();
    }
    None
  }

  fn package_info(&self, manifest: &Path) -> Option<std::sync::Arc<PackageInfo>> {
    {
      let cache = self.package_cache.lock().unwrap();
      if let Some(cached) = cache.get(manifest) {
        return cached.clone();
      }
    }
    let parsed = fs::read_to_string(manifest).ok().and_then(|text| {
      let value: Value = serde_json::from_str(&text).ok()?;
      let mut main_fields = Vec::new();
      let field_order: &[&str] = match self.platform {
        Platform::Node => &["main", "module"],
        _ => &["module", "main"],
      };
      for field in field_order {
        if let Some(main) = value.get(*field).and_then(|v| v.as_str()) {
          main_fields.push(main.to_string());
        }
      }
      let side_effects_false = matches!(value.get("sideEffects"), Some(Value::Bool(false)));
      Some(std::sync::Arc::new(PackageInfo {
        main_fields,
        side_effects_false,
      }))
    });
    let mut cache = self.package_cache.lock().unwrap();
    cache.insert(manifest.to_path_buf(), parsed.clone());
    parsed
  }
}

/// Lexically normalize `.` and `..` segments without touching the disk.
pub fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        if !out.pop() {
          out.push("..");
        }
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

fn match_alias(pattern: &str, specifier: &str) -> Option<String> {
  match pattern.find('*') {
    Some(star) => {
      let (prefix, suffix) = (&pattern[..star], &pattern[star + 1..]);
      if specifier.starts_with(prefix) && specifier.ends_with(suffix) && specifier.len() >= prefix.len() + suffix.len()
      {
        Some(specifier[prefix.len()..specifier.len() - suffix.len()].to_string())
      } else {
        None
      }
    }
    None => {
      if pattern == specifier {
        Some(String::new())
      } else {
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::TempDir;

  fn touch(dir: &Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
  }

  fn resolver_for(dir: &Path) -> Resolver {
    Resolver::new(&BuildOptions::default(), dir)
  }

  #[test]
  fn test_relative_with_extension_completion() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "src/util.ts", "export const x = 1");
    let resolver = resolver_for(tmp.path());
    let result = resolver
      .resolve(&tmp.path().join("src"), "./util", ImportKind::Stmt)
      .unwrap();
    assert_eq!(result.path, tmp.path().join("src/util.ts"));
    assert!(!result.external);
  }

  #[test]
  fn test_index_completion() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "lib/index.js", "module.exports = 1");
    let resolver = resolver_for(tmp.path());
    let result = resolver
      .resolve(tmp.path(), "./lib", ImportKind::Stmt)
      .unwrap();
    assert_eq!(result.path, tmp.path().join("lib/index.js"));
  }

  #[test]
  fn test_external_option() {
    let tmp = TempDir::new().unwrap();
    let options = BuildOptions {
      external: vec!["react".to_string(), "@scope/*".to_string()],
      ..BuildOptions::default()
    };
    let resolver = Resolver::new(&options, tmp.path());
    assert!(resolver.resolve(tmp.path(), "react", ImportKind::Stmt).unwrap().external);
    assert!(
      resolver
        .resolve(tmp.path(), "@scope/pkg", ImportKind::Stmt)
        .unwrap()
        .external
    );
    assert!(resolver.resolve(tmp.path(), "vue", ImportKind::Stmt).is_err());
  }

  #[test]
  fn test_node_modules_and_side_effects() {
    let tmp = TempDir::new().unwrap();
    touch(
      tmp.path(),
      "node_modules/lib/package.json",
      "{\"main\": \"dist/index.js\", \"sideEffects\": false}",
    );
    touch(tmp.path(), "node_modules/lib/dist/index.js", "exports.a = 1");
    let resolver = resolver_for(tmp.path());
    let result = resolver
      .resolve(&tmp.path().join("src"), "lib", ImportKind::Stmt)
      .unwrap();
    assert_eq!(result.path, tmp.path().join("node_modules/lib/dist/index.js"));
    assert!(!result.side_effects);
  }

  #[test]
  fn test_tsconfig_paths() {
    let tmp = TempDir::new().unwrap();
    touch(
      tmp.path(),
      "tsconfig.json",
      "{\"compilerOptions\": {\"baseUrl\": \".\", \"paths\": {\"@app/*\": [\"src/app/*\"]}}}",
    );
    touch(tmp.path(), "src/app/main.ts", "export {}");
    let resolver = resolver_for(tmp.path());
    let result = resolver
      .resolve(&tmp.path().join("elsewhere"), "@app/main", ImportKind::Stmt)
      .unwrap();
    assert_eq!(result.path, tmp.path().join("src/app/main.ts"));
  }

  #[test]
  fn test_node_builtins_external_on_node() {
    let tmp = TempDir::new().unwrap();
    let options = BuildOptions {
      platform: Platform::Node,
      ..BuildOptions::default()
    };
    let resolver = Resolver::new(&options, tmp.path());
    assert!(resolver.resolve(tmp.path(), "fs", ImportKind::Require).unwrap().external);
    assert!(
      resolver
        .resolve(tmp.path(), "node:path", ImportKind::Stmt)
        .unwrap()
        .external
    );
  }

  #[test]
  fn test_normalize() {
    assert_eq!(
      normalize(Path::new("/a/b/../c/./d")),
      PathBuf::from("/a/c/d")
    );
  }
}
