//! Static feature-support table consulted to decide which lowerings fire for
//! a given target. The table maps each syntax feature to the first engine
//! version that supports it; a target spec yields a bitmask of *unsupported*
//! features.

/// Bitmask of language features. A set bit in the result of
/// [`unsupported_features`] means the feature must be lowered (or rejected)
/// for the configured target.
pub type FeatureSet = u64;

pub mod feature {
  pub const ARROW: u64 = 1 << 0;
  pub const CLASS: u64 = 1 << 1;
  pub const CONST_AND_LET: u64 = 1 << 2;
  pub const DEFAULT_ARGUMENT: u64 = 1 << 3;
  pub const DESTRUCTURING: u64 = 1 << 4;
  pub const GENERATOR: u64 = 1 << 5;
  pub const REST_ARGUMENT: u64 = 1 << 6;
  pub const TEMPLATE_LITERAL: u64 = 1 << 7;
  pub const EXPONENT_OPERATOR: u64 = 1 << 8;
  pub const ASYNC_AWAIT: u64 = 1 << 9;
  pub const OBJECT_REST_SPREAD: u64 = 1 << 10;
  pub const FOR_AWAIT: u64 = 1 << 11;
  pub const OPTIONAL_CATCH_BINDING: u64 = 1 << 12;
  pub const OPTIONAL_CHAIN: u64 = 1 << 13;
  pub const NULLISH_COALESCING: u64 = 1 << 14;
  pub const BIGINT: u64 = 1 << 15;
  pub const IMPORT_META: u64 = 1 << 16;
  pub const LOGICAL_ASSIGNMENT: u64 = 1 << 17;
  pub const NUMERIC_SEPARATOR: u64 = 1 << 18;
  pub const CLASS_FIELD: u64 = 1 << 19;
  pub const CLASS_STATIC_FIELD: u64 = 1 << 20;
  pub const CLASS_PRIVATE_MEMBER: u64 = 1 << 21;
  pub const CLASS_STATIC_BLOCK: u64 = 1 << 22;
  pub const TOP_LEVEL_AWAIT: u64 = 1 << 23;
  pub const HASHBANG: u64 = 1 << 24;
  pub const DYNAMIC_IMPORT: u64 = 1 << 25;
}

pub fn feature_name(bit: u64) -> &'static str {
  match bit {
    feature::ARROW => "arrow functions",
    feature::CLASS => "classes",
    feature::CONST_AND_LET => "const and let",
    feature::DEFAULT_ARGUMENT => "default arguments",
    feature::DESTRUCTURING => "destructuring",
    feature::GENERATOR => "generators",
    feature::REST_ARGUMENT => "rest arguments",
    feature::TEMPLATE_LITERAL => "template literals",
    feature::EXPONENT_OPERATOR => "the exponent operator",
    feature::ASYNC_AWAIT => "async functions",
    feature::OBJECT_REST_SPREAD => "object rest and spread",
    feature::FOR_AWAIT => "for-await loops",
    feature::OPTIONAL_CATCH_BINDING => "optional catch bindings",
    feature::OPTIONAL_CHAIN => "optional chaining",
    feature::NULLISH_COALESCING => "the nullish coalescing operator",
    feature::BIGINT => "bigint literals",
    feature::IMPORT_META => "import.meta",
    feature::LOGICAL_ASSIGNMENT => "logical assignment operators",
    feature::NUMERIC_SEPARATOR => "numeric separators",
    feature::CLASS_FIELD => "class fields",
    feature::CLASS_STATIC_FIELD => "static class fields",
    feature::CLASS_PRIVATE_MEMBER => "private class members",
    feature::CLASS_STATIC_BLOCK => "class static blocks",
    feature::TOP_LEVEL_AWAIT => "top-level await",
    feature::HASHBANG => "hashbang comments",
    feature::DYNAMIC_IMPORT => "dynamic import",
    _ => "this feature",
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
  Es,
  Chrome,
  Edge,
  Firefox,
  Ios,
  Node,
  Safari,
}

/// A parsed `(engine, version)` target constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
  pub engine: Engine,
  pub major: u32,
  pub minor: u32,
}

/// One row of the support table: the first version of `engine` that supports
/// `feature`. A feature with no row for an engine is unsupported there.
struct Support {
  feature: u64,
  engine: Engine,
  major: u32,
  minor: u32,
}

const S: &[Support] = &[
  // ES2015 baseline
  sup(feature::ARROW, Engine::Es, 2015, 0),
  sup(feature::ARROW, Engine::Chrome, 49, 0),
  sup(feature::ARROW, Engine::Edge, 13, 0),
  sup(feature::ARROW, Engine::Firefox, 45, 0),
  sup(feature::ARROW, Engine::Ios, 10, 0),
  sup(feature::ARROW, Engine::Node, 6, 0),
  sup(feature::ARROW, Engine::Safari, 10, 0),
  sup(feature::CLASS, Engine::Es, 2015, 0),
  sup(feature::CLASS, Engine::Chrome, 49, 0),
  sup(feature::CLASS, Engine::Edge, 13, 0),
  sup(feature::CLASS, Engine::Firefox, 45, 0),
  sup(feature::CLASS, Engine::Ios, 10, 0),
  sup(feature::CLASS, Engine::Node, 6, 0),
  sup(feature::CLASS, Engine::Safari, 10, 0),
  sup(feature::CONST_AND_LET, Engine::Es, 2015, 0),
  sup(feature::CONST_AND_LET, Engine::Chrome, 49, 0),
  sup(feature::CONST_AND_LET, Engine::Edge, 14, 0),
  sup(feature::CONST_AND_LET, Engine::Firefox, 51, 0),
  sup(feature::CONST_AND_LET, Engine::Ios, 11, 0),
  sup(feature::CONST_AND_LET, Engine::Node, 6, 0),
  sup(feature::CONST_AND_LET, Engine::Safari, 11, 0),
  sup(feature::DEFAULT_ARGUMENT, Engine::Es, 2015, 0),
  sup(feature::DEFAULT_ARGUMENT, Engine::Chrome, 49, 0),
  sup(feature::DEFAULT_ARGUMENT, Engine::Edge, 14, 0),
  sup(feature::DEFAULT_ARGUMENT, Engine::Firefox, 53, 0),
  sup(feature::DEFAULT_ARGUMENT, Engine::Ios, 10, 0),
  sup(feature::DEFAULT_ARGUMENT, Engine::Node, 6, 0),
  sup(feature::DEFAULT_ARGUMENT, Engine::Safari, 10, 0),
  sup(feature::DESTRUCTURING, Engine::Es, 2015, 0),
  sup(feature::DESTRUCTURING, Engine::Chrome, 51, 0),
  sup(feature::DESTRUCTURING, Engine::Edge, 18, 0),
  sup(feature::DESTRUCTURING, Engine::Firefox, 53, 0),
  sup(feature::DESTRUCTURING, Engine::Ios, 10, 0),
  sup(feature::DESTRUCTURING, Engine::Node, 6, 5),
  sup(feature::DESTRUCTURING, Engine::Safari, 10, 0),
  sup(feature::GENERATOR, Engine::Es, 2015, 0),
  sup(feature::GENERATOR, Engine::Chrome, 50, 0),
  sup(feature::GENERATOR, Engine::Edge, 13, 0),
  sup(feature::GENERATOR, Engine::Firefox, 53, 0),
  sup(feature::GENERATOR, Engine::Ios, 10, 0),
  sup(feature::GENERATOR, Engine::Node, 6, 0),
  sup(feature::GENERATOR, Engine::Safari, 10, 0),
  sup(feature::REST_ARGUMENT, Engine::Es, 2015, 0),
  sup(feature::REST_ARGUMENT, Engine::Chrome, 47, 0),
  sup(feature::REST_ARGUMENT, Engine::Edge, 12, 0),
  sup(feature::REST_ARGUMENT, Engine::Firefox, 43, 0),
  sup(feature::REST_ARGUMENT, Engine::Ios, 10, 0),
  sup(feature::REST_ARGUMENT, Engine::Node, 6, 0),
  sup(feature::REST_ARGUMENT, Engine::Safari, 10, 0),
  sup(feature::TEMPLATE_LITERAL, Engine::Es, 2015, 0),
  sup(feature::TEMPLATE_LITERAL, Engine::Chrome, 41, 0),
  sup(feature::TEMPLATE_LITERAL, Engine::Edge, 13, 0),
  sup(feature::TEMPLATE_LITERAL, Engine::Firefox, 34, 0),
  sup(feature::TEMPLATE_LITERAL, Engine::Ios, 9, 0),
  sup(feature::TEMPLATE_LITERAL, Engine::Node, 4, 0),
  sup(feature::TEMPLATE_LITERAL, Engine::Safari, 9, 0),
  // ES2016
  sup(feature::EXPONENT_OPERATOR, Engine::Es, 2016, 0),
  sup(feature::EXPONENT_OPERATOR, Engine::Chrome, 52, 0),
  sup(feature::EXPONENT_OPERATOR, Engine::Edge, 14, 0),
  sup(feature::EXPONENT_OPERATOR, Engine::Firefox, 52, 0),
  sup(feature::EXPONENT_OPERATOR, Engine::Ios, 10, 3),
  sup(feature::EXPONENT_OPERATOR, Engine::Node, 7, 0),
  sup(feature::EXPONENT_OPERATOR, Engine::Safari, 10, 1),
  // ES2017
  sup(feature::ASYNC_AWAIT, Engine::Es, 2017, 0),
  sup(feature::ASYNC_AWAIT, Engine::Chrome, 55, 0),
  sup(feature::ASYNC_AWAIT, Engine::Edge, 15, 0),
  sup(feature::ASYNC_AWAIT, Engine::Firefox, 52, 0),
  sup(feature::ASYNC_AWAIT, Engine::Ios, 11, 0),
  sup(feature::ASYNC_AWAIT, Engine::Node, 7, 6),
  sup(feature::ASYNC_AWAIT, Engine::Safari, 11, 0),
  // ES2018
  sup(feature::OBJECT_REST_SPREAD, Engine::Es, 2018, 0),
  sup(feature::OBJECT_REST_SPREAD, Engine::Chrome, 60, 0),
  sup(feature::OBJECT_REST_SPREAD, Engine::Edge, 79, 0),
  sup(feature::OBJECT_REST_SPREAD, Engine::Firefox, 55, 0),
  sup(feature::OBJECT_REST_SPREAD, Engine::Ios, 11, 3),
  sup(feature::OBJECT_REST_SPREAD, Engine::Node, 8, 3),
  sup(feature::OBJECT_REST_SPREAD, Engine::Safari, 11, 1),
  sup(feature::FOR_AWAIT, Engine::Es, 2018, 0),
  sup(feature::FOR_AWAIT, Engine::Chrome, 63, 0),
  sup(feature::FOR_AWAIT, Engine::Edge, 79, 0),
  sup(feature::FOR_AWAIT, Engine::Firefox, 57, 0),
  sup(feature::FOR_AWAIT, Engine::Ios, 12, 0),
  sup(feature::FOR_AWAIT, Engine::Node, 10, 0),
  sup(feature::FOR_AWAIT, Engine::Safari, 12, 0),
  // ES2019
  sup(feature::OPTIONAL_CATCH_BINDING, Engine::Es, 2019, 0),
  sup(feature::OPTIONAL_CATCH_BINDING, Engine::Chrome, 66, 0),
  sup(feature::OPTIONAL_CATCH_BINDING, Engine::Edge, 79, 0),
  sup(feature::OPTIONAL_CATCH_BINDING, Engine::Firefox, 58, 0),
  sup(feature::OPTIONAL_CATCH_BINDING, Engine::Ios, 11, 3),
  sup(feature::OPTIONAL_CATCH_BINDING, Engine::Node, 10, 0),
  sup(feature::OPTIONAL_CATCH_BINDING, Engine::Safari, 11, 1),
  // ES2020
  sup(feature::OPTIONAL_CHAIN, Engine::Es, 2020, 0),
  sup(feature::OPTIONAL_CHAIN, Engine::Chrome, 80, 0),
  sup(feature::OPTIONAL_CHAIN, Engine::Edge, 80, 0),
  sup(feature::OPTIONAL_CHAIN, Engine::Firefox, 74, 0),
  sup(feature::OPTIONAL_CHAIN, Engine::Ios, 13, 4),
  sup(feature::OPTIONAL_CHAIN, Engine::Node, 14, 0),
  sup(feature::OPTIONAL_CHAIN, Engine::Safari, 13, 1),
  sup(feature::NULLISH_COALESCING, Engine::Es, 2020, 0),
  sup(feature::NULLISH_COALESCING, Engine::Chrome, 80, 0),
  sup(feature::NULLISH_COALESCING, Engine::Edge, 80, 0),
  sup(feature::NULLISH_COALESCING, Engine::Firefox, 72, 0),
  sup(feature::NULLISH_COALESCING, Engine::Ios, 13, 4),
  sup(feature::NULLISH_COALESCING, Engine::Node, 14, 0),
  sup(feature::NULLISH_COALESCING, Engine::Safari, 13, 1),
  sup(feature::BIGINT, Engine::Es, 2020, 0),
  sup(feature::BIGINT, Engine::Chrome, 67, 0),
  sup(feature::BIGINT, Engine::Edge, 79, 0),
  sup(feature::BIGINT, Engine::Firefox, 68, 0),
  sup(feature::BIGINT, Engine::Ios, 14, 0),
  sup(feature::BIGINT, Engine::Node, 10, 4),
  sup(feature::BIGINT, Engine::Safari, 14, 0),
  sup(feature::IMPORT_META, Engine::Es, 2020, 0),
  sup(feature::IMPORT_META, Engine::Chrome, 64, 0),
  sup(feature::IMPORT_META, Engine::Edge, 79, 0),
  sup(feature::IMPORT_META, Engine::Firefox, 62, 0),
  sup(feature::IMPORT_META, Engine::Ios, 12, 0),
  sup(feature::IMPORT_META, Engine::Node, 10, 4),
  sup(feature::IMPORT_META, Engine::Safari, 11, 1),
  sup(feature::DYNAMIC_IMPORT, Engine::Es, 2015, 0),
  sup(feature::DYNAMIC_IMPORT, Engine::Chrome, 63, 0),
  sup(feature::DYNAMIC_IMPORT, Engine::Edge, 79, 0),
  sup(feature::DYNAMIC_IMPORT, Engine::Firefox, 67, 0),
  sup(feature::DYNAMIC_IMPORT, Engine::Ios, 11, 0),
  sup(feature::DYNAMIC_IMPORT, Engine::Node, 12, 20),
  sup(feature::DYNAMIC_IMPORT, Engine::Safari, 11, 1),
  // ES2021
  sup(feature::LOGICAL_ASSIGNMENT, Engine::Es, 2021, 0),
  sup(feature::LOGICAL_ASSIGNMENT, Engine::Chrome, 85, 0),
  sup(feature::LOGICAL_ASSIGNMENT, Engine::Edge, 85, 0),
  sup(feature::LOGICAL_ASSIGNMENT, Engine::Firefox, 79, 0),
  sup(feature::LOGICAL_ASSIGNMENT, Engine::Ios, 14, 0),
  sup(feature::LOGICAL_ASSIGNMENT, Engine::Node, 15, 0),
  sup(feature::LOGICAL_ASSIGNMENT, Engine::Safari, 14, 0),
  sup(feature::NUMERIC_SEPARATOR, Engine::Es, 2021, 0),
  sup(feature::NUMERIC_SEPARATOR, Engine::Chrome, 75, 0),
  sup(feature::NUMERIC_SEPARATOR, Engine::Edge, 79, 0),
  sup(feature::NUMERIC_SEPARATOR, Engine::Firefox, 70, 0),
  sup(feature::NUMERIC_SEPARATOR, Engine::Ios, 13, 0),
  sup(feature::NUMERIC_SEPARATOR, Engine::Node, 12, 5),
  sup(feature::NUMERIC_SEPARATOR, Engine::Safari, 13, 0),
  // ES2022
  sup(feature::CLASS_FIELD, Engine::Es, 2022, 0),
  sup(feature::CLASS_FIELD, Engine::Chrome, 73, 0),
  sup(feature::CLASS_FIELD, Engine::Edge, 79, 0),
  sup(feature::CLASS_FIELD, Engine::Firefox, 69, 0),
  sup(feature::CLASS_FIELD, Engine::Ios, 14, 0),
  sup(feature::CLASS_FIELD, Engine::Node, 12, 0),
  sup(feature::CLASS_FIELD, Engine::Safari, 14, 0),
  sup(feature::CLASS_STATIC_FIELD, Engine::Es, 2022, 0),
  sup(feature::CLASS_STATIC_FIELD, Engine::Chrome, 73, 0),
  sup(feature::CLASS_STATIC_FIELD, Engine::Edge, 79, 0),
  sup(feature::CLASS_STATIC_FIELD, Engine::Firefox, 75, 0),
  sup(feature::CLASS_STATIC_FIELD, Engine::Ios, 14, 5),
  sup(feature::CLASS_STATIC_FIELD, Engine::Node, 12, 0),
  sup(feature::CLASS_STATIC_FIELD, Engine::Safari, 14, 1),
  sup(feature::CLASS_PRIVATE_MEMBER, Engine::Es, 2022, 0),
  sup(feature::CLASS_PRIVATE_MEMBER, Engine::Chrome, 84, 0),
  sup(feature::CLASS_PRIVATE_MEMBER, Engine::Edge, 84, 0),
  sup(feature::CLASS_PRIVATE_MEMBER, Engine::Firefox, 90, 0),
  sup(feature::CLASS_PRIVATE_MEMBER, Engine::Ios, 15, 0),
  sup(feature::CLASS_PRIVATE_MEMBER, Engine::Node, 14, 6),
  sup(feature::CLASS_PRIVATE_MEMBER, Engine::Safari, 15, 0),
  sup(feature::CLASS_STATIC_BLOCK, Engine::Es, 2022, 0),
  sup(feature::CLASS_STATIC_BLOCK, Engine::Chrome, 91, 0),
  sup(feature::CLASS_STATIC_BLOCK, Engine::Edge, 94, 0),
  sup(feature::CLASS_STATIC_BLOCK, Engine::Firefox, 93, 0),
  sup(feature::CLASS_STATIC_BLOCK, Engine::Ios, 16, 4),
  sup(feature::CLASS_STATIC_BLOCK, Engine::Node, 16, 11),
  sup(feature::CLASS_STATIC_BLOCK, Engine::Safari, 16, 4),
  sup(feature::TOP_LEVEL_AWAIT, Engine::Es, 2022, 0),
  sup(feature::TOP_LEVEL_AWAIT, Engine::Chrome, 89, 0),
  sup(feature::TOP_LEVEL_AWAIT, Engine::Edge, 89, 0),
  sup(feature::TOP_LEVEL_AWAIT, Engine::Firefox, 89, 0),
  sup(feature::TOP_LEVEL_AWAIT, Engine::Ios, 15, 0),
  sup(feature::TOP_LEVEL_AWAIT, Engine::Node, 14, 8),
  sup(feature::TOP_LEVEL_AWAIT, Engine::Safari, 15, 0),
  sup(feature::HASHBANG, Engine::Es, 2015, 0),
  sup(feature::HASHBANG, Engine::Chrome, 74, 0),
  sup(feature::HASHBANG, Engine::Edge, 79, 0),
  sup(feature::HASHBANG, Engine::Firefox, 67, 0),
  sup(feature::HASHBANG, Engine::Ios, 13, 4),
  sup(feature::HASHBANG, Engine::Node, 12, 5),
  sup(feature::HASHBANG, Engine::Safari, 13, 1),
];

const fn sup(feature: u64, engine: Engine, major: u32, minor: u32) -> Support {
  Support {
    feature,
    engine,
    major,
    minor,
  }
}

const ALL_FEATURES: u64 = (1 << 26) - 1;

/// Compute the bitmask of features unsupported by *any* of the given targets.
pub fn unsupported_features(targets: &[Target]) -> FeatureSet {
  if targets.is_empty() {
    return 0; // esnext: everything supported
  }
  let mut unsupported = 0u64;
  for target in targets {
    let mut supported = 0u64;
    for row in S {
      if row.engine == target.engine
        && (target.major > row.major || (target.major == row.major && target.minor >= row.minor))
      {
        supported |= row.feature;
      }
    }
    unsupported |= ALL_FEATURES & !supported;
  }
  unsupported
}

/// Parse a single target string: `es2015`..`es2022`, `esnext`, `es6`, or an
/// engine-version string like `chrome58`, `node12.5`, `ios13.4`.
pub fn parse_target(text: &str) -> Result<Option<Target>, String> {
  let lower = text.to_ascii_lowercase();
  if lower == "esnext" {
    return Ok(None);
  }
  let (engine, rest) = if let Some(rest) = lower.strip_prefix("es") {
    (Engine::Es, rest)
  } else if let Some(rest) = lower.strip_prefix("chrome") {
    (Engine::Chrome, rest)
  } else if let Some(rest) = lower.strip_prefix("edge") {
    (Engine::Edge, rest)
  } else if let Some(rest) = lower.strip_prefix("firefox") {
    (Engine::Firefox, rest)
  } else if let Some(rest) = lower.strip_prefix("ios") {
    (Engine::Ios, rest)
  } else if let Some(rest) = lower.strip_prefix("node") {
    (Engine::Node, rest)
  } else if let Some(rest) = lower.strip_prefix("safari") {
    (Engine::Safari, rest)
  } else {
    return Err(format!("Unrecognized target environment {:?}", text));
  };

  let mut parts = rest.splitn(2, '.');
  let major: u32 = parts
    .next()
    .unwrap_or("")
    .parse()
    .map_err(|_| format!("Unrecognized target environment {:?}", text))?;
  let minor: u32 = match parts.next() {
    Some(minor) => minor
      .parse()
      .map_err(|_| format!("Unrecognized target environment {:?}", text))?,
    None => 0,
  };

  // es6 is an alias for es2015, es7 for es2016, and so on
  let major = if engine == Engine::Es && major < 2000 {
    match major {
      5 => return Err("Lowering to ES5 is not supported".to_string()),
      n if (6..=13).contains(&n) => 2009 + n,
      _ => return Err(format!("Unrecognized target environment {:?}", text)),
    }
  } else {
    major
  };

  Ok(Some(Target {
    engine,
    major,
    minor,
  }))
}

/// Parse the `target` option list into an unsupported-feature mask.
pub fn parse_targets(texts: &[String]) -> Result<FeatureSet, String> {
  let mut targets = Vec::new();
  for text in texts {
    if let Some(target) = parse_target(text)? {
      targets.push(target);
    }
  }
  Ok(unsupported_features(&targets))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_esnext_supports_everything() {
    assert_eq!(parse_targets(&["esnext".to_string()]).unwrap(), 0);
    assert_eq!(parse_targets(&[]).unwrap(), 0);
  }

  #[test]
  fn test_es2015_lowers_later_features() {
    let mask = parse_targets(&["es2015".to_string()]).unwrap();
    assert_eq!(mask & feature::ARROW, 0);
    assert_eq!(mask & feature::TEMPLATE_LITERAL, 0);
    assert_ne!(mask & feature::EXPONENT_OPERATOR, 0);
    assert_ne!(mask & feature::OPTIONAL_CHAIN, 0);
    assert_ne!(mask & feature::NULLISH_COALESCING, 0);
    assert_ne!(mask & feature::CLASS_FIELD, 0);
  }

  #[test]
  fn test_es2020_keeps_optional_chain() {
    let mask = parse_targets(&["es2020".to_string()]).unwrap();
    assert_eq!(mask & feature::OPTIONAL_CHAIN, 0);
    assert_eq!(mask & feature::NULLISH_COALESCING, 0);
    assert_ne!(mask & feature::LOGICAL_ASSIGNMENT, 0);
  }

  #[test]
  fn test_engine_versions() {
    let mask = parse_targets(&["chrome58".to_string()]).unwrap();
    assert_eq!(mask & feature::ASYNC_AWAIT, 0);
    assert_ne!(mask & feature::OBJECT_REST_SPREAD, 0);

    let mask = parse_targets(&["node12.5".to_string()]).unwrap();
    assert_eq!(mask & feature::NUMERIC_SEPARATOR, 0);
    let mask = parse_targets(&["node12.4".to_string()]).unwrap();
    assert_ne!(mask & feature::NUMERIC_SEPARATOR, 0);
  }

  #[test]
  fn test_multiple_targets_union_unsupported() {
    let mask = parse_targets(&["chrome80".to_string(), "firefox72".to_string()]).unwrap();
    // chrome80 supports optional chaining but firefox72 does not
    assert_ne!(mask & feature::OPTIONAL_CHAIN, 0);
    assert_eq!(mask & feature::NULLISH_COALESCING, 0);
  }

  #[test]
  fn test_es_aliases() {
    assert_eq!(
      parse_target("es6").unwrap(),
      parse_target("es2015").unwrap()
    );
    assert!(parse_target("es5").is_err());
    assert!(parse_target("browser9").is_err());
  }
}
