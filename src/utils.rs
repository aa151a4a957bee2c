use rustc_hash::FxHasher;
use std::hash::Hasher;
use std::path::Path;

/// Path as shown in diagnostics, the metafile, and source maps: relative to
/// the working directory when possible.
pub fn pretty_path(path: &Path, cwd: &Path) -> String {
  match pathdiff::diff_paths(path, cwd) {
    Some(rel) if !rel.as_os_str().is_empty() => rel.to_string_lossy().replace('\\', "/"),
    _ => path.to_string_lossy().replace('\\', "/"),
  }
}

/// Content hash used for `[hash]` name templates and output-file identity.
pub fn content_hash(bytes: &[u8]) -> String {
  let mut hasher = FxHasher::default();
  hasher.write(bytes);
  format!("{:08X}", hasher.finish() as u32)
}

/// Substitute `[name]`, `[dir]`, and `[hash]` in an output name template.
pub fn substitute_name_template(template: &str, name: &str, dir: &str, hash: String) -> String {
  let mut out = template
    .replace("[name]", name)
    .replace("[hash]", &hash)
    .replace("[dir]", dir);
  // Collapse the leading separator left behind by an empty [dir]
  while out.starts_with('/') {
    out.remove(0);
  }
  out.replace("//", "/")
}

/// Quote a string as a JS double-quoted literal.
pub fn quote_js_string(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + 2);
  out.push('"');
  for c in text.chars() {
    match c {
      '"' => out.push_str("\\\""),
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\t' => out.push_str("\\t"),
      '\u{2028}' => out.push_str("\\u2028"),
      '\u{2029}' => out.push_str("\\u2029"),
      c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02X}", c as u32)),
      c => out.push(c),
    }
  }
  out.push('"');
  out
}

/// MIME type for the `dataurl` loader.
pub fn mime_type_by_extension(ext: &str) -> &'static str {
  match ext {
    "png" => "image/png",
    "jpg" | "jpeg" => "image/jpeg",
    "gif" => "image/gif",
    "svg" => "image/svg+xml",
    "webp" => "image/webp",
    "avif" => "image/avif",
    "ico" => "image/x-icon",
    "json" => "application/json",
    "css" => "text/css",
    "js" | "mjs" => "text/javascript",
    "txt" => "text/plain",
    "html" => "text/html",
    "woff" => "font/woff",
    "woff2" => "font/woff2",
    "ttf" => "font/ttf",
    "otf" => "font/otf",
    "wasm" => "application/wasm",
    "pdf" => "application/pdf",
    _ => "application/octet-stream",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  #[test]
  fn test_pretty_path() {
    assert_eq!(
      pretty_path(Path::new("/work/src/a.js"), Path::new("/work")),
      "src/a.js"
    );
    assert_eq!(
      pretty_path(Path::new("/elsewhere/a.js"), Path::new("/work")),
      "../elsewhere/a.js"
    );
    let _ = PathBuf::new();
  }

  #[test]
  fn test_name_template() {
    assert_eq!(
      substitute_name_template("[dir]/[name]-[hash]", "main", "app", "ABCD1234".to_string()),
      "app/main-ABCD1234"
    );
    assert_eq!(
      substitute_name_template("[dir]/[name]", "main", "", "X".to_string()),
      "main"
    );
  }

  #[test]
  fn test_quote_js_string() {
    assert_eq!(quote_js_string("a\"b"), "\"a\\\"b\"");
    assert_eq!(quote_js_string("line\nbreak"), "\"line\\nbreak\"");
  }

  #[test]
  fn test_content_hash_is_stable() {
    assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
    assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
  }
}
