use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::OnceLock;

/// Process-wide interned string. Identifier equality is index equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(u32);

struct Interner {
  map: FxHashMap<&'static str, Atom>,
  strings: Vec<&'static str>,
}

static INTERNER: OnceLock<Mutex<Interner>> = OnceLock::new();

fn interner() -> &'static Mutex<Interner> {
  INTERNER.get_or_init(|| {
    Mutex::new(Interner {
      map: FxHashMap::default(),
      strings: Vec::with_capacity(1024),
    })
  })
}

impl Atom {
  /// Intern a string, returning its stable id.
  pub fn new(text: &str) -> Atom {
    let mut inner = interner().lock().unwrap();
    if let Some(atom) = inner.map.get(text) {
      return *atom;
    }
    // Interned strings live for the rest of the process. Sources are bounded
    // by the input, so this is a fixed cost per distinct identifier.
    let leaked: &'static str = Box::leak(text.to_owned().into_boxed_str());
    let atom = Atom(inner.strings.len() as u32);
    inner.strings.push(leaked);
    inner.map.insert(leaked, atom);
    atom
  }

  pub fn as_str(self) -> &'static str {
    let inner = interner().lock().unwrap();
    inner.strings[self.0 as usize]
  }

  pub fn is_empty(self) -> bool {
    self.as_str().is_empty()
  }
}

impl fmt::Debug for Atom {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Atom({:?})", self.as_str())
  }
}

impl fmt::Display for Atom {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl From<&str> for Atom {
  fn from(text: &str) -> Atom {
    Atom::new(text)
  }
}

impl From<String> for Atom {
  fn from(text: String) -> Atom {
    Atom::new(&text)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_interning_is_stable() {
    let a = Atom::new("foo");
    let b = Atom::new("foo");
    let c = Atom::new("bar");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.as_str(), "foo");
    assert_eq!(c.as_str(), "bar");
  }

  #[test]
  fn test_empty_atom() {
    assert!(Atom::new("").is_empty());
    assert!(!Atom::new("x").is_empty());
  }
}
