use crate::source::{LineOffsetTable, Loc, Range, Source};
use serde::Serialize;
use std::sync::Mutex;

/// Diagnostic severity. Warnings never fail the build; errors do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgKind {
  Error,
  Warning,
}

/// Where a diagnostic points. Lines are 1-indexed, columns 0-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
  pub file: String,
  pub namespace: String,
  pub line: usize,
  pub column: usize,
  pub length: usize,
  pub line_text: String,
  pub suggestion: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Note {
  pub text: String,
  pub location: Option<Location>,
}

/// A single diagnostic. Workers never crash on user input; they convert
/// failures into these records.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
  pub kind: MsgKind,
  pub text: String,
  pub location: Option<Location>,
  pub notes: Vec<Note>,
  /// (source_index, byte offset) sort key for deterministic ordering.
  #[serde(skip)]
  pub sort_key: (u32, u32),
}

impl Location {
  pub fn from_range(source: &Source, table: &LineOffsetTable, range: Range) -> Location {
    let (line, column) = table.position(range.loc);
    Location {
      file: source.pretty_path.clone(),
      namespace: "file".to_string(),
      line: line + 1,
      column,
      length: range.len as usize,
      line_text: source.line_text(table, range.loc).to_string(),
      suggestion: String::new(),
    }
  }
}

struct LogInner {
  msgs: Vec<Message>,
  errors: usize,
  warnings: usize,
  limit_hit: bool,
}

/// Thread-safe diagnostic collector with an error limit. The coordinator
/// stops enqueueing work once the limit is crossed.
pub struct Log {
  inner: Mutex<LogInner>,
  error_limit: usize,
}

impl Log {
  pub fn new(error_limit: usize) -> Log {
    Log {
      inner: Mutex::new(LogInner {
        msgs: Vec::new(),
        errors: 0,
        warnings: 0,
        limit_hit: false,
      }),
      // 0 means unlimited
      error_limit,
    }
  }

  pub fn add_msg(&self, msg: Message) {
    let mut inner = self.inner.lock().unwrap();
    match msg.kind {
      MsgKind::Error => {
        if self.error_limit != 0 && inner.errors >= self.error_limit {
          inner.limit_hit = true;
          return;
        }
        inner.errors += 1;
      }
      MsgKind::Warning => inner.warnings += 1,
    }
    inner.msgs.push(msg);
  }

  pub fn add_error(&self, source: Option<&Source>, range: Range, text: String) {
    self.add_with_notes(MsgKind::Error, source, range, text, Vec::new());
  }

  pub fn add_warning(&self, source: Option<&Source>, range: Range, text: String) {
    self.add_with_notes(MsgKind::Warning, source, range, text, Vec::new());
  }

  pub fn add_error_with_notes(&self, source: Option<&Source>, range: Range, text: String, notes: Vec<Note>) {
    self.add_with_notes(MsgKind::Error, source, range, text, notes);
  }

  fn add_with_notes(
    &self,
    kind: MsgKind,
    source: Option<&Source>,
    range: Range,
    text: String,
    notes: Vec<Note>,
  ) {
    let (location, sort_key) = match source {
      Some(source) => {
        let table = source.line_offsets();
        (
          Some(Location::from_range(source, &table, range)),
          (source.index, range.loc.0),
        )
      }
      None => (None, (u32::MAX, 0)),
    };
    self.add_msg(Message {
      kind,
      text,
      location,
      notes,
      sort_key,
    });
  }

  pub fn has_errors(&self) -> bool {
    self.inner.lock().unwrap().errors > 0
  }

  pub fn error_count(&self) -> usize {
    self.inner.lock().unwrap().errors
  }

  /// True once the error limit tripped; the scheduler checks this between
  /// batches and drains outstanding tasks without enqueueing more.
  pub fn at_limit(&self) -> bool {
    let inner = self.inner.lock().unwrap();
    self.error_limit != 0 && inner.errors >= self.error_limit
  }

  /// Drain all messages, sorted by (source index, byte offset) so the result
  /// is deterministic regardless of worker completion order.
  pub fn take_msgs(&self) -> Vec<Message> {
    let mut inner = self.inner.lock().unwrap();
    let mut msgs = std::mem::take(&mut inner.msgs);
    msgs.sort_by_key(|m| m.sort_key);
    msgs
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::options::Loader;
  use std::path::PathBuf;

  fn test_source() -> Source {
    Source::new(
      1,
      PathBuf::from("in.js"),
      "in.js".to_string(),
      "let x = ;\nlet y = 2;\n".to_string(),
      Loader::Js,
    )
  }

  #[test]
  fn test_location_rendering() {
    let source = test_source();
    let log = Log::new(0);
    log.add_error(Some(&source), Range::new(8, 9), "Unexpected \";\"".to_string());
    let msgs = log.take_msgs();
    assert_eq!(msgs.len(), 1);
    let loc = msgs[0].location.as_ref().unwrap();
    assert_eq!(loc.line, 1);
    assert_eq!(loc.column, 8);
    assert_eq!(loc.line_text, "let x = ;");
  }

  #[test]
  fn test_error_limit() {
    let source = test_source();
    let log = Log::new(2);
    for _ in 0..5 {
      log.add_error(Some(&source), Range::new(0, 1), "boom".to_string());
    }
    assert!(log.at_limit());
    assert_eq!(log.error_count(), 2);
    assert_eq!(log.take_msgs().len(), 2);
  }

  #[test]
  fn test_messages_sorted_deterministically() {
    let source = test_source();
    let log = Log::new(0);
    log.add_error(Some(&source), Range::new(12, 13), "second".to_string());
    log.add_error(Some(&source), Range::new(0, 1), "first".to_string());
    let msgs = log.take_msgs();
    assert_eq!(msgs[0].text, "first");
    assert_eq!(msgs[1].text, "second");
  }
}
