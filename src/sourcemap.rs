//! Source-map encoding and assembly: VLQ segments, per-file composition
//! through input maps, and the final `version: 3` JSON.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::Serialize;

const BASE64: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Append one base64 VLQ value.
pub fn encode_vlq(out: &mut String, value: i64) {
  let mut vlq = if value < 0 {
    (((-value) as u64) << 1) | 1
  } else {
    (value as u64) << 1
  };
  loop {
    let mut digit = (vlq & 31) as usize;
    vlq >>= 5;
    if vlq != 0 {
      digit |= 32;
    }
    out.push(BASE64[digit] as char);
    if vlq == 0 {
      break;
    }
  }
}

fn decode_base64(b: u8) -> Option<i64> {
  match b {
    b'A'..=b'Z' => Some((b - b'A') as i64),
    b'a'..=b'z' => Some((b - b'a' + 26) as i64),
    b'0'..=b'9' => Some((b - b'0' + 52) as i64),
    b'+' => Some(62),
    b'/' => Some(63),
    _ => None,
  }
}

/// Decode one VLQ value, advancing the byte cursor.
fn decode_vlq(bytes: &[u8], pos: &mut usize) -> Option<i64> {
  let mut result: i64 = 0;
  let mut shift = 0u32;
  loop {
    let digit = decode_base64(*bytes.get(*pos)?)?;
    *pos += 1;
    result |= (digit & 31) << shift;
    if digit & 32 == 0 {
      break;
    }
    shift += 5;
  }
  let negative = result & 1 == 1;
  result >>= 1;
  Some(if negative { -result } else { result })
}

/// A decoded input source map, used to compose through pre-mapped files.
pub struct SourceMapConsumer {
  /// Per generated line: sorted `(generated_col, source, orig_line, orig_col)`.
  lines: Vec<Vec<(u32, u32, u32, u32)>>,
  pub sources: Vec<String>,
  pub sources_content: Vec<Option<String>>,
}

impl SourceMapConsumer {
  pub fn parse(json_text: &str) -> Option<SourceMapConsumer> {
    let value: serde_json::Value = serde_json::from_str(json_text).ok()?;
    let sources: Vec<String> = value
      .get("sources")?
      .as_array()?
      .iter()
      .map(|s| s.as_str().unwrap_or("").to_string())
      .collect();
    let sources_content: Vec<Option<String>> = match value.get("sourcesContent").and_then(|v| v.as_array()) {
      Some(list) => list.iter().map(|s| s.as_str().map(|s| s.to_string())).collect(),
      None => vec![None; sources.len()],
    };
    let mappings = value.get("mappings")?.as_str()?;

    let mut lines = Vec::new();
    let mut segments = Vec::new();
    let bytes = mappings.as_bytes();
    let mut pos = 0;
    let (mut gen_col, mut src, mut orig_line, mut orig_col) = (0i64, 0i64, 0i64, 0i64);
    while pos < bytes.len() {
      match bytes[pos] {
        b';' => {
          lines.push(std::mem::take(&mut segments));
          gen_col = 0;
          pos += 1;
        }
        b',' => {
          pos += 1;
        }
        _ => {
          gen_col += decode_vlq(bytes, &mut pos)?;
          // Segments may omit the source fields entirely
          if pos < bytes.len() && bytes[pos] != b',' && bytes[pos] != b';' {
            src += decode_vlq(bytes, &mut pos)?;
            orig_line += decode_vlq(bytes, &mut pos)?;
            orig_col += decode_vlq(bytes, &mut pos)?;
            // Optional name index
            if pos < bytes.len() && bytes[pos] != b',' && bytes[pos] != b';' {
              let _ = decode_vlq(bytes, &mut pos)?;
            }
            segments.push((gen_col as u32, src as u32, orig_line as u32, orig_col as u32));
          }
        }
      }
    }
    lines.push(segments);
    Some(SourceMapConsumer {
      lines,
      sources,
      sources_content,
    })
  }

  /// Map a position in the consumer's generated space (0-indexed) back to an
  /// original `(source, line, column)`.
  pub fn lookup(&self, line: u32, col: u32) -> Option<(u32, u32, u32)> {
    let segments = self.lines.get(line as usize)?;
    if segments.is_empty() {
      return None;
    }
    let idx = match segments.binary_search_by_key(&col, |seg| seg.0) {
      Ok(i) => i,
      Err(0) => return None,
      Err(i) => i - 1,
    };
    let seg = segments[idx];
    Some((seg.1, seg.2, seg.3))
  }
}

/// Extract a `//# sourceMappingURL=` (or CSS `/*# ... */`) from file contents.
pub fn find_source_mapping_url(contents: &str) -> Option<&str> {
  for marker in ["//# sourceMappingURL=", "/*# sourceMappingURL="] {
    if let Some(pos) = contents.rfind(marker) {
      let rest = &contents[pos + marker.len()..];
      let end = rest
        .find(|c: char| c.is_whitespace() || c == '*')
        .unwrap_or(rest.len());
      let url = &rest[..end];
      if !url.is_empty() {
        return Some(url);
      }
    }
  }
  None
}

/// Decode an inline `data:application/json;base64,...` source map URL.
pub fn decode_inline_source_map(url: &str) -> Option<String> {
  use base64::Engine;
  let rest = url.strip_prefix("data:")?;
  let comma = rest.find(',')?;
  let (header, payload) = rest.split_at(comma);
  let payload = &payload[1..];
  if header.contains("base64") {
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload).ok()?;
    String::from_utf8(bytes).ok()
  } else {
    Some(payload.to_string())
  }
}

#[derive(Serialize)]
pub struct SourceMapJson {
  pub version: u8,
  pub sources: Vec<String>,
  #[serde(rename = "sourcesContent", skip_serializing_if = "Option::is_none")]
  pub sources_content: Option<Vec<Option<String>>>,
  pub names: Vec<String>,
  pub mappings: String,
}

struct SourceEntry {
  pretty_path: String,
  contents: String,
  input_map: Option<SourceMapConsumer>,
}

/// Accumulates VLQ mapping segments for one output file. The printer calls
/// [`SourceMapBuilder::add_mapping`] for each AST node it emits; generated
/// lines are tracked by the printer counting emitted newlines.
#[derive(Default)]
pub struct SourceMapBuilder {
  mappings: String,
  cur_gen_line: u32,
  line_has_segment: bool,
  last_gen_col: i64,
  last_source: i64,
  last_line: i64,
  last_col: i64,
  /// Final de-duplicated sources list: path -> contents.
  out_sources: IndexMap<String, Option<String>>,
  entries: FxHashMap<u32, SourceEntry>,
}

impl SourceMapBuilder {
  pub fn new() -> SourceMapBuilder {
    SourceMapBuilder::default()
  }

  pub fn register_source(
    &mut self,
    source_index: u32,
    pretty_path: String,
    contents: String,
    input_map: Option<SourceMapConsumer>,
  ) {
    self.entries.insert(
      source_index,
      SourceEntry {
        pretty_path,
        contents,
        input_map,
      },
    );
  }

  /// Add one segment. Positions are 0-indexed; `orig_*` are positions in the
  /// parser input, which compose through the input map when one exists.
  pub fn add_mapping(&mut self, source_index: u32, orig_line: u32, orig_col: u32, gen_line: u32, gen_col: u32) {
    let entry = match self.entries.get(&source_index) {
      Some(entry) => entry,
      None => return,
    };

    // Compose through the input map when present
    let (path, contents, line, col) = match &entry.input_map {
      Some(consumer) => match consumer.lookup(orig_line, orig_col) {
        Some((src, line, col)) => {
          let path = consumer.sources.get(src as usize).cloned().unwrap_or_default();
          let contents = consumer
            .sources_content
            .get(src as usize)
            .cloned()
            .flatten();
          (path, contents, line, col)
        }
        None => return,
      },
      None => (
        entry.pretty_path.clone(),
        Some(entry.contents.clone()),
        orig_line,
        orig_col,
      ),
    };

    let source_id = match self.out_sources.get_index_of(&path) {
      Some(id) => id,
      None => {
        self.out_sources.insert(path, contents);
        self.out_sources.len() - 1
      }
    };

    while self.cur_gen_line < gen_line {
      self.mappings.push(';');
      self.cur_gen_line += 1;
      self.last_gen_col = 0;
      self.line_has_segment = false;
    }
    if self.line_has_segment {
      self.mappings.push(',');
    }
    self.line_has_segment = true;

    encode_vlq(&mut self.mappings, gen_col as i64 - self.last_gen_col);
    encode_vlq(&mut self.mappings, source_id as i64 - self.last_source);
    encode_vlq(&mut self.mappings, line as i64 - self.last_line);
    encode_vlq(&mut self.mappings, col as i64 - self.last_col);
    self.last_gen_col = gen_col as i64;
    self.last_source = source_id as i64;
    self.last_line = line as i64;
    self.last_col = col as i64;
  }

  pub fn build(self, include_sources_content: bool) -> SourceMapJson {
    let (sources, contents): (Vec<String>, Vec<Option<String>>) = self.out_sources.into_iter().unzip();
    SourceMapJson {
      version: 3,
      sources,
      sources_content: if include_sources_content {
        Some(contents)
      } else {
        None
      },
      names: Vec::new(),
      mappings: self.mappings,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_vlq_roundtrip() {
    for value in [0i64, 1, -1, 16, -16, 1024, 123456, -123456] {
      let mut s = String::new();
      encode_vlq(&mut s, value);
      let mut pos = 0;
      assert_eq!(decode_vlq(s.as_bytes(), &mut pos), Some(value));
      assert_eq!(pos, s.len());
    }
  }

  #[test]
  fn test_builder_emits_deltas() {
    let mut builder = SourceMapBuilder::new();
    builder.register_source(1, "a.js".to_string(), "let x = 1;\n".to_string(), None);
    builder.add_mapping(1, 0, 0, 0, 0);
    builder.add_mapping(1, 0, 4, 0, 4);
    builder.add_mapping(1, 1, 0, 1, 0);
    let map = builder.build(true);
    assert_eq!(map.version, 3);
    assert_eq!(map.sources, vec!["a.js".to_string()]);
    assert_eq!(map.mappings, "AAAA,IAAI;AACJ");
  }

  #[test]
  fn test_consumer_roundtrip() {
    let mut builder = SourceMapBuilder::new();
    builder.register_source(1, "in.js".to_string(), "x\ny\n".to_string(), None);
    builder.add_mapping(1, 0, 0, 0, 0);
    builder.add_mapping(1, 1, 2, 0, 10);
    let map = builder.build(true);
    let json = serde_json::to_string(&map).unwrap();
    let consumer = SourceMapConsumer::parse(&json).unwrap();
    assert_eq!(consumer.lookup(0, 0), Some((0, 0, 0)));
    assert_eq!(consumer.lookup(0, 10), Some((0, 1, 2)));
    // A column between segments resolves to the previous segment
    assert_eq!(consumer.lookup(0, 5), Some((0, 0, 0)));
  }

  #[test]
  fn test_find_source_mapping_url() {
    assert_eq!(
      find_source_mapping_url("code();\n//# sourceMappingURL=out.js.map\n"),
      Some("out.js.map")
    );
    assert_eq!(find_source_mapping_url("no map here"), None);
  }

  #[test]
  fn test_composition_through_input_map() {
    // An input map that maps everything on line 0 to original.ts line 5
    let mut inner = SourceMapBuilder::new();
    inner.register_source(1, "original.ts".to_string(), String::new(), None);
    inner.add_mapping(1, 5, 2, 0, 0);
    let inner_json = serde_json::to_string(&inner.build(false)).unwrap();
    let consumer = SourceMapConsumer::parse(&inner_json).unwrap();

    let mut outer = SourceMapBuilder::new();
    outer.register_source(2, "intermediate.js".to_string(), String::new(), Some(consumer));
    outer.add_mapping(2, 0, 3, 7, 0);
    let map = outer.build(false);
    assert_eq!(map.sources, vec!["original.ts".to_string()]);
    // 7 empty lines then one segment pointing at line 5, column 2
    assert!(map.mappings.starts_with(";;;;;;;"));
  }
}
