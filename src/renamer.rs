//! Output name assignment. The linker hands over every module-scope symbol
//! that will be printed, in deterministic order; the renamer assigns names
//! that cannot collide with each other, with free variables, or with any
//! name kept by a nested scope.

use crate::js::ast::{Ref, SymbolMap};
use rustc_hash::{FxHashMap, FxHashSet};

const RESERVED: &[&str] = &[
  "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
  "else", "enum", "export", "extends", "false", "finally", "for", "function", "if", "import", "in",
  "instanceof", "let", "new", "null", "return", "super", "switch", "this", "throw", "true", "typeof",
  "var", "void", "while", "with", "yield", "await", "async", "static", "get", "set", "of",
  "arguments", "eval", "exports", "module", "require", "globalThis", "undefined", "NaN", "Infinity",
  "Promise", "Object",
];

/// A symbol to rename, with the minifier's frequency estimate.
pub struct RenameTarget {
  pub symbol: Ref,
  pub use_count: u32,
  pub must_keep_name: bool,
}

pub struct Renamer {
  taken: FxHashSet<String>,
  minify_counter: usize,
}

impl Renamer {
  /// `reserved` must contain every original name that occurs anywhere in the
  /// output (declared in any scope, or free), so that un-renamed nested
  /// scopes can never capture an assigned name.
  pub fn new(reserved: FxHashSet<String>) -> Renamer {
    let mut taken = reserved;
    for word in RESERVED {
      taken.insert((*word).to_string());
    }
    Renamer {
      taken,
      minify_counter: 0,
    }
  }

  /// Assign names to the targets. With `minify`, targets are visited in
  /// frequency order and handed short names from the identifier alphabet;
  /// otherwise collisions get numeric suffixes.
  pub fn assign(mut self, symbols: &SymbolMap, mut targets: Vec<RenameTarget>, minify: bool) -> FxHashMap<Ref, String> {
    let mut names = FxHashMap::default();

    // Pinned names first so nothing else takes them
    for target in targets.iter().filter(|t| t.must_keep_name) {
      let name = symbols.get(target.symbol).original_name.as_str().to_string();
      self.taken.insert(name.clone());
      names.insert(target.symbol, name);
    }
    targets.retain(|t| !t.must_keep_name);

    if minify {
      // Frequency order; ties broken by symbol identity for determinism
      targets.sort_by(|a, b| b.use_count.cmp(&a.use_count).then(a.symbol.cmp(&b.symbol)));
      for target in targets {
        let name = self.next_minified_name();
        names.insert(target.symbol, name);
      }
    } else {
      targets.sort_by_key(|t| t.symbol);
      for target in targets {
        let original = symbols.get(target.symbol).original_name.as_str();
        let name = self.pick_numbered_name(original);
        names.insert(target.symbol, name);
      }
    }
    names
  }

  fn pick_numbered_name(&mut self, original: &str) -> String {
    let base = if original.is_empty() { "_" } else { original };
    if !self.taken.contains(base) {
      self.taken.insert(base.to_string());
      return base.to_string();
    }
    let mut counter = 2usize;
    loop {
      let candidate = format!("{}{}", base, counter);
      if !self.taken.contains(&candidate) {
        self.taken.insert(candidate.clone());
        return candidate;
      }
      counter += 1;
    }
  }

  fn next_minified_name(&mut self) -> String {
    loop {
      let candidate = minified_name(self.minify_counter);
      self.minify_counter += 1;
      if !self.taken.contains(&candidate) {
        self.taken.insert(candidate.clone());
        return candidate;
      }
    }
  }
}

const HEAD: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_$";
const TAIL: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_$0123456789";

/// The nth name in the legal identifier alphabet: `a`..`$`, `aa`, `ab`, ...
pub fn minified_name(mut index: usize) -> String {
  let mut name = String::new();
  name.push(HEAD[index % HEAD.len()] as char);
  index /= HEAD.len();
  while index > 0 {
    index -= 1;
    name.push(TAIL[index % TAIL.len()] as char);
    index /= TAIL.len();
  }
  name
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::interner::Atom;
  use crate::js::ast::{Symbol, SymbolKind};

  fn symbol_map(names: &[&str]) -> SymbolMap {
    let mut map = SymbolMap::new(1);
    for name in names {
      map.tables[0].push(Symbol::new(Atom::new(name), SymbolKind::Hoisted));
    }
    map
  }

  #[test]
  fn test_minified_name_sequence() {
    assert_eq!(minified_name(0), "a");
    assert_eq!(minified_name(1), "b");
    assert_eq!(minified_name(53), "$");
    assert_eq!(minified_name(54), "aa");
    assert_ne!(minified_name(1000), minified_name(1001));
  }

  #[test]
  fn test_collisions_get_numeric_suffixes() {
    let map = symbol_map(&["x", "x", "y"]);
    let targets = (0..3)
      .map(|i| RenameTarget {
        symbol: Ref::new(0, i),
        use_count: 1,
        must_keep_name: false,
      })
      .collect();
    let names = Renamer::new(FxHashSet::default()).assign(&map, targets, false);
    assert_eq!(names[&Ref::new(0, 0)], "x");
    assert_eq!(names[&Ref::new(0, 1)], "x2");
    assert_eq!(names[&Ref::new(0, 2)], "y");
  }

  #[test]
  fn test_reserved_names_are_skipped() {
    let map = symbol_map(&["a"]);
    let mut reserved = FxHashSet::default();
    reserved.insert("a".to_string());
    let targets = vec![RenameTarget {
      symbol: Ref::new(0, 0),
      use_count: 100,
      must_keep_name: false,
    }];
    let names = Renamer::new(reserved.clone()).assign(&map, targets, true);
    // `a` is reserved, so the minifier hands out `b`
    assert_eq!(names[&Ref::new(0, 0)], "b");

    let targets = vec![RenameTarget {
      symbol: Ref::new(0, 0),
      use_count: 1,
      must_keep_name: false,
    }];
    let names = Renamer::new(reserved).assign(&map, targets, false);
    assert_eq!(names[&Ref::new(0, 0)], "a2");
  }

  #[test]
  fn test_pinned_names_win() {
    let map = symbol_map(&["keep", "keep"]);
    let targets = vec![
      RenameTarget {
        symbol: Ref::new(0, 1),
        use_count: 1,
        must_keep_name: false,
      },
      RenameTarget {
        symbol: Ref::new(0, 0),
        use_count: 1,
        must_keep_name: true,
      },
    ];
    let names = Renamer::new(FxHashSet::default()).assign(&map, targets, false);
    assert_eq!(names[&Ref::new(0, 0)], "keep");
    assert_eq!(names[&Ref::new(0, 1)], "keep2");
  }

  #[test]
  fn test_minified_names_never_collide_with_keywords() {
    // "do" and "in" are two-character keywords in the alphabet's range
    let mut renamer = Renamer::new(FxHashSet::default());
    let mut seen = FxHashSet::default();
    for _ in 0..5000 {
      let name = renamer.next_minified_name();
      assert!(!RESERVED.contains(&name.as_str()), "{} is reserved", name);
      assert!(seen.insert(name));
    }
  }
}
