use crate::options::Loader;
use std::path::PathBuf;

/// Byte offset into a source file's contents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Loc(pub u32);

/// A byte range inside a source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Range {
  pub loc: Loc,
  pub len: u32,
}

impl Range {
  pub fn new(start: u32, end: u32) -> Range {
    Range {
      loc: Loc(start),
      len: end.saturating_sub(start),
    }
  }

  pub fn end(&self) -> u32 {
    self.loc.0 + self.len
  }
}

/// An immutable input file. `index` is assigned in discovery order and is the
/// stable identity used by all downstream stages and source maps.
#[derive(Debug)]
pub struct Source {
  pub index: u32,
  /// Absolute path on disk, or a synthetic identifier for virtual modules.
  pub path: PathBuf,
  /// Path as shown in diagnostics and source maps.
  pub pretty_path: String,
  pub contents: String,
  pub loader: Loader,
}

impl Source {
  pub fn new(index: u32, path: PathBuf, pretty_path: String, contents: String, loader: Loader) -> Source {
    Source {
      index,
      path,
      pretty_path,
      contents,
      loader,
    }
  }

  pub fn line_offsets(&self) -> LineOffsetTable {
    LineOffsetTable::new(&self.contents)
  }

  /// The full text of the line containing `loc`, without its terminator.
  pub fn line_text(&self, table: &LineOffsetTable, loc: Loc) -> &str {
    let (line, _) = table.position(loc);
    let start = table.offsets[line] as usize;
    let end = match table.offsets.get(line + 1) {
      Some(next) => {
        let mut end = *next as usize;
        let bytes = self.contents.as_bytes();
        while end > start && (bytes[end - 1] == b'\n' || bytes[end - 1] == b'\r') {
          end -= 1;
        }
        end
      }
      None => self.contents.len(),
    };
    &self.contents[start..end]
  }
}

/// Sorted byte offsets of line starts; converts `Loc` to `(line, column)` in
/// O(log n). Lines and columns are both 0-indexed here; diagnostics render
/// lines 1-indexed.
#[derive(Debug, Clone)]
pub struct LineOffsetTable {
  offsets: Vec<u32>,
}

impl LineOffsetTable {
  pub fn new(contents: &str) -> LineOffsetTable {
    let mut offsets = vec![0u32];
    for (i, b) in contents.bytes().enumerate() {
      if b == b'\n' {
        offsets.push(i as u32 + 1);
      }
    }
    LineOffsetTable { offsets }
  }

  /// (line, column) for a byte offset. The column is a UTF-8 byte column.
  pub fn position(&self, loc: Loc) -> (usize, usize) {
    let line = match self.offsets.binary_search(&loc.0) {
      Ok(i) => i,
      Err(i) => i - 1,
    };
    (line, (loc.0 - self.offsets[line]) as usize)
  }

  pub fn line_count(&self) -> usize {
    self.offsets.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_line_offset_table() {
    let table = LineOffsetTable::new("ab\ncd\n\nef");
    assert_eq!(table.position(Loc(0)), (0, 0));
    assert_eq!(table.position(Loc(1)), (0, 1));
    assert_eq!(table.position(Loc(3)), (1, 0));
    assert_eq!(table.position(Loc(4)), (1, 1));
    assert_eq!(table.position(Loc(6)), (2, 0));
    assert_eq!(table.position(Loc(7)), (3, 0));
    assert_eq!(table.position(Loc(8)), (3, 1));
    assert_eq!(table.line_count(), 4);
  }

  #[test]
  fn test_line_text() {
    let source = Source::new(
      1,
      PathBuf::from("a.js"),
      "a.js".to_string(),
      "let x = 1;\nlet y = 2;\n".to_string(),
      crate::options::Loader::Js,
    );
    let table = source.line_offsets();
    assert_eq!(source.line_text(&table, Loc(0)), "let x = 1;");
    assert_eq!(source.line_text(&table, Loc(12)), "let y = 2;");
  }
}
