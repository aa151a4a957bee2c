//! The synthetic runtime module. It is assigned `source_index == 0`, parsed
//! by the normal JS parser, and its helpers reach user files through
//! synthetic import records, so binding, renaming, and tree shaking treat
//! them like any other module.

/// The import specifier the parser emits for helper imports; the scheduler
/// resolves it to source index 0.
pub use crate::js::parser::RUNTIME_SPECIFIER;

pub const RUNTIME_SOURCE: &str = r#"var __defProp = Object.defineProperty;
var __defProps = Object.defineProperties;
var __getOwnPropDesc = Object.getOwnPropertyDescriptor;
var __getOwnPropDescs = Object.getOwnPropertyDescriptors;
var __getOwnPropNames = Object.getOwnPropertyNames;
var __getOwnPropSymbols = Object.getOwnPropertySymbols;
var __getProtoOf = Object.getPrototypeOf;
var __create = Object.create;
var __hasOwnProp = Object.prototype.hasOwnProperty;
var __propIsEnum = Object.prototype.propertyIsEnumerable;
var __defNormalProp = (obj, key, value) => key in obj ? __defProp(obj, key, { enumerable: true, configurable: true, writable: true, value: value }) : obj[key] = value;
export var __commonJS = (cb, mod) => () => (mod || cb((mod = { exports: {} }).exports, mod), mod.exports);
export var __esm = (fn, res) => () => (fn && (res = fn(fn = 0)), res);
export var __export = (target, all) => {
  for (var name in all)
    __defProp(target, name, { get: all[name], enumerable: true });
};
export var __copyProps = (to, from, except, desc) => {
  if (from && typeof from === "object" || typeof from === "function") {
    for (var key of __getOwnPropNames(from))
      if (!__hasOwnProp.call(to, key) && key !== except)
        __defProp(to, key, { get: () => from[key], enumerable: !(desc = __getOwnPropDesc(from, key)) || desc.enumerable });
  }
  return to;
};
export var __toESM = (mod, isNodeMode, target) => (target = mod != null ? __create(__getProtoOf(mod)) : {}, __copyProps(isNodeMode || !mod || !mod.__esModule ? __defProp(target, "default", { value: mod, enumerable: true }) : target, mod));
export var __toCommonJS = (mod) => __copyProps(__defProp({}, "__esModule", { value: true }), mod);
export var __spreadValues = (a, b) => {
  for (var prop in b || (b = {}))
    if (__hasOwnProp.call(b, prop))
      __defNormalProp(a, prop, b[prop]);
  if (__getOwnPropSymbols)
    for (var prop of __getOwnPropSymbols(b)) {
      if (__propIsEnum.call(b, prop))
        __defNormalProp(a, prop, b[prop]);
    }
  return a;
};
export var __spreadProps = (a, b) => __defProps(a, __getOwnPropDescs(b));
export var __objRest = (source, exclude) => {
  var target = {};
  for (var prop in source)
    if (__hasOwnProp.call(source, prop) && exclude.indexOf(prop) < 0)
      target[prop] = source[prop];
  if (source != null && __getOwnPropSymbols)
    for (var prop of __getOwnPropSymbols(source)) {
      if (exclude.indexOf(prop) < 0 && __propIsEnum.call(source, prop))
        target[prop] = source[prop];
    }
  return target;
};
export var __toBinary = (base64) => {
  var table = {};
  var chars = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
  for (var i = 0; i < chars.length; i++)
    table[chars.charCodeAt(i)] = i;
  var n = base64.length;
  var bytes = new Uint8Array((n - (base64[n - 1] === "=" ? (base64[n - 2] === "=" ? 2 : 1) : 0)) * 3 / 4 | 0);
  var o = 0;
  var acc = 0;
  var nbits = 0;
  for (var j = 0; j < n; j++) {
    var c = table[base64.charCodeAt(j)];
    if (c === undefined)
      continue;
    acc = acc << 6 | c;
    nbits += 6;
    if (nbits >= 8) {
      nbits -= 8;
      bytes[o++] = acc >> nbits & 255;
    }
  }
  return bytes;
};
"#;

#[cfg(test)]
mod tests {
  use super::*;
  use crate::js::parser::{ParseOptions, Parser};
  use crate::logger::Log;
  use crate::options::Loader;
  use crate::source::Source;
  use std::path::PathBuf;

  #[test]
  fn test_runtime_parses_cleanly() {
    let source = Source::new(
      0,
      PathBuf::from(RUNTIME_SPECIFIER),
      RUNTIME_SPECIFIER.to_string(),
      RUNTIME_SOURCE.to_string(),
      Loader::Js,
    );
    let log = Log::new(0);
    let opts = ParseOptions::default();
    let result = Parser::new(&source, &log, &opts).parse();
    assert!(!log.has_errors(), "runtime parse errors: {:?}", log.take_msgs());
    // Every helper the rest of the pipeline references must be exported
    for helper in [
      "__commonJS",
      "__esm",
      "__export",
      "__toESM",
      "__toCommonJS",
      "__spreadValues",
      "__spreadProps",
      "__objRest",
      "__toBinary",
    ] {
      assert!(
        result
          .ast
          .named_exports
          .contains_key(&crate::interner::Atom::new(helper)),
        "runtime is missing helper {}",
        helper
      );
    }
  }
}
