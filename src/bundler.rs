//! The public build and transform entry points: graph construction, linking,
//! parallel chunk printing, source-map assembly, output naming, the
//! metafile, and file writing.

use crate::css::printer::{CssPrintOptions, CssPrinter};
use crate::error::{BindleError, Result};
use crate::graph::{self, Graph, ImportKind};
use crate::js::ast::{Ref, SymbolMap};
use crate::js::parser::{ParseOptions, Parser};
use crate::js::printer::{PrintOptions, Printer};
use crate::linker::{self, Chunk, ChunkKind, LinkResult};
use crate::logger::{Log, Message, MsgKind};
use crate::options::{
  compile_common_options, validate_build_options, BuildOptions, Format, Loader, TransformOptions,
};
use crate::profiler::Profiler;
use crate::resolver::Resolver;
use crate::runtime;
use crate::source::{LineOffsetTable, Source};
use crate::sourcemap::{decode_inline_source_map, find_source_mapping_url, SourceMapBuilder, SourceMapConsumer};
use crate::utils;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OutputFile {
  /// Path relative to the output directory (or absolute when writing).
  pub path: PathBuf,
  pub contents: Vec<u8>,
  pub hash: String,
}

#[derive(Debug, Default)]
pub struct BuildResult {
  pub errors: Vec<Message>,
  pub warnings: Vec<Message>,
  pub output_files: Vec<OutputFile>,
  pub metafile: Option<String>,
  pub mangle_cache: Option<FxHashMap<String, String>>,
}

impl BuildResult {
  fn from_log(log: &Log) -> BuildResult {
    let msgs = log.take_msgs();
    let (errors, warnings) = split_messages(msgs);
    BuildResult {
      errors,
      warnings,
      ..BuildResult::default()
    }
  }
}

fn split_messages(msgs: Vec<Message>) -> (Vec<Message>, Vec<Message>) {
  let mut errors = Vec::new();
  let mut warnings = Vec::new();
  for msg in msgs {
    match msg.kind {
      MsgKind::Error => errors.push(msg),
      MsgKind::Warning => warnings.push(msg),
    }
  }
  (errors, warnings)
}

/// Run a full build. User-level problems land in `BuildResult::errors`;
/// `Err` is reserved for invariant violations and I/O failures writing
/// output.
pub fn build(options: &BuildOptions) -> Result<BuildResult> {
  let log = Log::new(options.error_limit);
  let profiler = Profiler::new(false);
  build_with(options, &log, &profiler)
}

pub fn build_with(options: &BuildOptions, log: &Log, profiler: &Profiler) -> Result<BuildResult> {
  validate_build_options(options, log);
  let compiled = compile_common_options(&options.target, &options.define, &options.pure, options.format, log);
  if log.has_errors() {
    return Ok(BuildResult::from_log(log));
  }

  let cwd = match &options.abs_working_dir {
    Some(dir) => dir.clone(),
    None => std::env::current_dir()?,
  };

  if !options.bundle {
    return build_without_bundling(options, &compiled, log, &cwd);
  }

  let resolver = Resolver::new(options, &cwd);
  let mut graph = graph::build_graph(options, &compiled, &resolver, log, profiler, &cwd);
  if log.has_errors() {
    return Ok(BuildResult::from_log(log));
  }

  let link_start = std::time::Instant::now();
  let link = linker::link(&mut graph, options, &compiled, log);
  profiler.record_link(link_start.elapsed().as_nanos() as u64);
  if log.has_errors() {
    return Ok(BuildResult::from_log(log));
  }

  // Output names first: dynamic-import specifiers and the metafile need them
  let chunk_paths = assign_chunk_paths(options, &graph, &link.chunks, &cwd);

  let print_opts = PrintOptions {
    minify_whitespace: options.minify_whitespace,
    minify_syntax: options.minify_syntax,
    ascii_only: true,
  };

  // Chunks print in parallel; each print task owns its buffer
  let printed: Vec<PrintedChunk> = link
    .chunks
    .par_iter()
    .map(|chunk| {
      let start = std::time::Instant::now();
      let result = print_chunk(chunk, &graph, &link, options, &compiled, print_opts);
      profiler.record_print(start.elapsed().as_nanos() as u64);
      result
    })
    .collect();

  if log.has_errors() {
    return Ok(BuildResult::from_log(log));
  }

  let mut output_files = Vec::new();
  for (chunk_index, mut printed_chunk) in printed.into_iter().enumerate() {
    let rel_path = chunk_paths[chunk_index].clone();

    // Cross-chunk markers become relative specifiers now that names exist
    for (other_index, other_path) in chunk_paths.iter().enumerate() {
      let marker = format!("bindle:chunk:{}", other_index);
      if printed_chunk.code.contains(&marker) {
        let relative = relative_specifier(&rel_path, other_path);
        printed_chunk.code = printed_chunk.code.replace(&marker, &relative);
      }
    }

    // Source map assembly
    if let Some(map) = printed_chunk.map.take() {
      let map_json = map.build(options.sources_content);
      let json_text = serde_json::to_string(&map_json)
        .map_err(|e| BindleError::Internal(format!("source map serialization failed: {}", e)))?;
      let comment_prefix = match link.chunks[chunk_index].kind {
        ChunkKind::Js => "//#",
        ChunkKind::Css => "/*#",
      };
      let comment_suffix = match link.chunks[chunk_index].kind {
        ChunkKind::Js => "",
        ChunkKind::Css => " */",
      };
      if options.sourcemap.wants_inline() {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(json_text.as_bytes());
        printed_chunk.code.push_str(&format!(
          "{} sourceMappingURL=data:application/json;base64,{}{}\n",
          comment_prefix, encoded, comment_suffix
        ));
      } else if options.sourcemap.wants_comment() {
        let map_name = format!(
          "{}.map",
          Path::new(&rel_path).file_name().unwrap_or_default().to_string_lossy()
        );
        printed_chunk
          .code
          .push_str(&format!("{} sourceMappingURL={}{}\n", comment_prefix, map_name, comment_suffix));
      }
      if options.sourcemap.wants_file() {
        let map_path = format!("{}.map", rel_path);
        let bytes = json_text.into_bytes();
        let hash = utils::content_hash(&bytes);
        output_files.push(OutputFile {
          path: PathBuf::from(map_path),
          contents: bytes,
          hash,
        });
      }
    }

    let bytes = printed_chunk.code.into_bytes();
    let hash = utils::content_hash(&bytes);
    output_files.push(OutputFile {
      path: PathBuf::from(rel_path),
      contents: bytes,
      hash,
    });
  }

  // Assets from the `file` loader
  for asset in &graph.assets {
    let hash = utils::content_hash(&asset.bytes);
    output_files.push(OutputFile {
      path: PathBuf::from(&asset.relative_path),
      contents: asset.bytes.clone(),
      hash,
    });
  }

  let metafile = if options.metafile {
    Some(build_metafile(&graph, &link.chunks, &chunk_paths, &output_files))
  } else {
    None
  };

  if options.write {
    write_output_files(options, &output_files, &cwd)?;
  }

  let msgs = log.take_msgs();
  let (errors, warnings) = split_messages(msgs);
  Ok(BuildResult {
    errors,
    warnings,
    output_files,
    metafile,
    mangle_cache: None,
  })
}

struct PrintedChunk {
  code: String,
  map: Option<SourceMapBuilder>,
}

fn print_chunk(
  chunk: &Chunk,
  graph: &Graph,
  link: &LinkResult,
  options: &BuildOptions,
  compiled: &crate::options::CompiledOptions,
  print_opts: PrintOptions,
) -> PrintedChunk {
  let tables: FxHashMap<u32, LineOffsetTable> = chunk
    .files_in_order
    .iter()
    .chain(chunk.segments.iter().map(|(source, _)| source))
    .map(|&source| (source, graph.modules[source as usize].source.line_offsets()))
    .collect();

  let map_builder = if options.sourcemap.is_enabled() {
    let mut builder = SourceMapBuilder::new();
    let mut registered = rustc_hash::FxHashSet::default();
    for &source_index in chunk
      .files_in_order
      .iter()
      .chain(chunk.segments.iter().map(|(source, _)| source))
    {
      if !registered.insert(source_index) {
        continue;
      }
      let source = &graph.modules[source_index as usize].source;
      let input_map = load_input_source_map(source);
      builder.register_source(
        source_index,
        source.pretty_path.clone(),
        source.contents.clone(),
        input_map,
      );
    }
    Some(builder)
  } else {
    None
  };

  match chunk.kind {
    ChunkKind::Js => {
      let mut printer = Printer::new(print_opts, &graph.symbols, &link.renames);
      if let Some(builder) = map_builder {
        printer.set_map(builder);
      }

      // IIFE prologue
      if compiled.format == Format::Iife && chunk.is_entry {
        match &options.global_name {
          Some(name) => printer.print_raw(&format!("var {} = (() => {{\n", name)),
          None => printer.print_raw("(() => {\n"),
        }
      }

      for (source_index, stmts) in &chunk.segments {
        let ast = graph.modules[*source_index as usize]
          .ast
          .as_js()
          .expect("js chunk segments reference js modules");
        let table = &tables[source_index];
        printer.print_file(ast, table, *source_index, stmts);
      }

      let (mut code, map) = printer.finish();
      if compiled.format == Format::Iife && chunk.is_entry {
        if !code.ends_with('\n') {
          code.push('\n');
        }
        code.push_str("})();\n");
      }
      PrintedChunk { code, map }
    }
    ChunkKind::Css => {
      let mut printer = CssPrinter::new(CssPrintOptions {
        minify: options.minify_whitespace,
        ascii_only: true,
      });
      if let Some(builder) = map_builder {
        printer.set_map(builder);
      }
      for &source_index in &chunk.files_in_order {
        if let crate::graph::ModuleAst::Css(ast) = &graph.modules[source_index as usize].ast {
          let table = &tables[&source_index];
          // Inlined imports are dropped; everything else prints in order
          let rules: Vec<&crate::css::ast::Rule> = ast
            .rules
            .iter()
            .filter(|rule| match rule {
              crate::css::ast::Rule::AtImport { record, .. } => {
                let rec = &ast.import_records[*record as usize];
                rec.is_external || rec.source_index.is_none()
              }
              _ => true,
            })
            .collect();
          printer.print_rules(ast, table, source_index, &rules);
        }
      }
      let (code, map) = printer.finish();
      PrintedChunk { code, map }
    }
  }
}

fn load_input_source_map(source: &Source) -> Option<SourceMapConsumer> {
  let url = find_source_mapping_url(&source.contents)?;
  if url.starts_with("data:") {
    let text = decode_inline_source_map(url)?;
    return SourceMapConsumer::parse(&text);
  }
  let map_path = source.path.parent()?.join(url);
  let text = std::fs::read_to_string(map_path).ok()?;
  SourceMapConsumer::parse(&text)
}

/// Compute each chunk's output path (relative to outdir).
fn assign_chunk_paths(options: &BuildOptions, graph: &Graph, chunks: &[Chunk], cwd: &Path) -> Vec<String> {
  let outbase = options
    .outbase
    .clone()
    .unwrap_or_else(|| cwd.to_path_buf());

  chunks
    .iter()
    .map(|chunk| {
      if let (Some(outfile), true) = (&options.outfile, chunk.is_entry) {
        if chunk.kind == ChunkKind::Js {
          return outfile.to_string_lossy().to_string();
        }
        // The CSS sibling of an outfile swaps the extension
        let mut path = outfile.clone();
        path.set_extension("css");
        return path.to_string_lossy().to_string();
      }

      let dir = chunk
        .entry_point
        .map(|entry| {
          let path = &graph.modules[entry as usize].source.path;
          path
            .parent()
            .and_then(|parent| pathdiff::diff_paths(parent, &outbase))
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            .filter(|rel| !rel.starts_with(".."))
            .unwrap_or_default()
        })
        .unwrap_or_default();

      // A stable hash over the chunk's input identities and contents
      let mut hash_input = String::new();
      for &file in &chunk.files_in_order {
        let source = &graph.modules[file as usize].source;
        hash_input.push_str(&source.pretty_path);
        hash_input.push('\0');
        hash_input.push_str(&source.contents);
        hash_input.push('\0');
      }
      let hash = utils::content_hash(hash_input.as_bytes());

      let template = if chunk.is_entry {
        &options.entry_names
      } else {
        &options.chunk_names
      };
      let name = utils::substitute_name_template(template, &chunk.name_stem, &dir, hash);
      format!("{}.{}", name, chunk.output_extension())
    })
    .collect()
}

/// `./b.js`-style specifier from one output file to another.
fn relative_specifier(from: &str, to: &str) -> String {
  let from_dir = Path::new(from).parent().unwrap_or(Path::new(""));
  let rel = pathdiff::diff_paths(Path::new(to), from_dir).unwrap_or_else(|| PathBuf::from(to));
  let text = rel.to_string_lossy().replace('\\', "/");
  if text.starts_with("../") {
    text
  } else {
    format!("./{}", text)
  }
}

fn write_output_files(options: &BuildOptions, files: &[OutputFile], cwd: &Path) -> Result<()> {
  let outdir = match (&options.outdir, &options.outfile) {
    (Some(outdir), _) => {
      if outdir.is_absolute() {
        outdir.clone()
      } else {
        cwd.join(outdir)
      }
    }
    (None, Some(_)) => cwd.to_path_buf(),
    (None, None) => return Ok(()), // nothing to write without a destination
  };
  for file in files {
    let path = if file.path.is_absolute() {
      file.path.clone()
    } else {
      outdir.join(&file.path)
    };
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, &file.contents)?;
    debug!("Wrote {}", path.display());
  }
  Ok(())
}

fn import_kind_name(kind: ImportKind) -> &'static str {
  match kind {
    ImportKind::Stmt => "import-statement",
    ImportKind::Require => "require-call",
    ImportKind::DynamicImport => "dynamic-import",
    ImportKind::RequireResolve => "require-resolve",
    ImportKind::ImportRule => "import-rule",
    ImportKind::UrlToken => "url-token",
  }
}

/// The JSON graph description produced for `metafile: true`.
fn build_metafile(graph: &Graph, chunks: &[Chunk], chunk_paths: &[String], outputs: &[OutputFile]) -> String {
  let mut inputs = serde_json::Map::new();
  for module in &graph.modules {
    if module.source.index == 0 {
      continue;
    }
    let imports: Vec<serde_json::Value> = module
      .ast
      .import_records()
      .iter()
      .filter(|record| !record.is_internal)
      .map(|record| {
        let path = match record.source_index {
          Some(target) => graph.modules[target as usize].source.pretty_path.clone(),
          None => record.specifier.as_str().to_string(),
        };
        json!({
          "path": path,
          "kind": import_kind_name(record.kind),
          "external": record.is_external,
        })
      })
      .collect();
    inputs.insert(
      module.source.pretty_path.clone(),
      json!({
        "bytes": module.source.contents.len(),
        "imports": imports,
      }),
    );
  }

  let mut output_map = serde_json::Map::new();
  for (chunk_index, chunk) in chunks.iter().enumerate() {
    let path = &chunk_paths[chunk_index];
    let bytes = outputs
      .iter()
      .find(|file| file.path == Path::new(path))
      .map(|file| file.contents.len())
      .unwrap_or(0);
    let mut chunk_inputs = serde_json::Map::new();
    for &file in &chunk.files_in_order {
      if file == 0 {
        continue;
      }
      let source = &graph.modules[file as usize].source;
      chunk_inputs.insert(
        source.pretty_path.clone(),
        json!({ "bytesInOutput": source.contents.len() }),
      );
    }
    let mut entry = serde_json::Map::new();
    entry.insert("bytes".to_string(), json!(bytes));
    entry.insert("inputs".to_string(), serde_json::Value::Object(chunk_inputs));
    if let Some(entry_point) = chunk.entry_point {
      entry.insert(
        "entryPoint".to_string(),
        json!(graph.modules[entry_point as usize].source.pretty_path),
      );
    }
    output_map.insert(path.clone(), serde_json::Value::Object(entry));
  }

  serde_json::to_string(&json!({
    "inputs": serde_json::Value::Object(inputs),
    "outputs": serde_json::Value::Object(output_map),
  }))
  .unwrap_or_else(|_| "{}".to_string())
}

/// `bundle: false`: each entry is transformed independently, with imports
/// left untouched.
fn build_without_bundling(
  options: &BuildOptions,
  compiled: &crate::options::CompiledOptions,
  log: &Log,
  cwd: &Path,
) -> Result<BuildResult> {
  let mut output_files = Vec::new();
  for entry in &options.entry_points {
    let path = if Path::new(&entry.path).is_absolute() {
      PathBuf::from(&entry.path)
    } else {
      cwd.join(&entry.path)
    };
    let contents = match std::fs::read_to_string(&path) {
      Ok(contents) => contents,
      Err(err) => {
        log.add_error(
          None,
          crate::source::Range::default(),
          format!("Could not read entry point {}: {}", path.display(), err),
        );
        continue;
      }
    };
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("js");
    let loader = options
      .loaders
      .get(ext)
      .copied()
      .or_else(|| Loader::by_extension(ext))
      .unwrap_or(Loader::Js);

    let transform_options = TransformOptions {
      loader,
      target: options.target.clone(),
      minify_whitespace: options.minify_whitespace,
      minify_identifiers: options.minify_identifiers,
      minify_syntax: options.minify_syntax,
      sourcemap: options.sourcemap.is_enabled(),
      define: options.define.clone(),
      pure: options.pure.clone(),
      jsx: options.jsx,
      jsx_factory: options.jsx_factory.clone(),
      jsx_fragment: options.jsx_fragment.clone(),
      jsx_import_source: options.jsx_import_source.clone(),
      format: Some(compiled.format),
      source_file: utils::pretty_path(&path, cwd),
    };
    let result = transform(&contents, &transform_options);
    for msg in result.errors.iter().chain(result.warnings.iter()) {
      log.add_msg(msg.clone());
    }
    if !result.errors.is_empty() {
      continue;
    }

    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("out");
    let ext = if loader == Loader::Css { "css" } else { "js" };
    let rel = match &options.outfile {
      Some(outfile) => outfile.to_string_lossy().to_string(),
      None => format!("{}.{}", stem, ext),
    };
    let bytes = result.code.into_bytes();
    let hash = utils::content_hash(&bytes);
    output_files.push(OutputFile {
      path: PathBuf::from(rel),
      contents: bytes,
      hash,
    });
  }

  if options.write && !log.has_errors() {
    write_output_files(options, &output_files, cwd)?;
  }
  let (errors, warnings) = split_messages(log.take_msgs());
  Ok(BuildResult {
    errors,
    warnings,
    output_files,
    metafile: None,
    mangle_cache: None,
  })
}

// --------------------------------------------------------------------------
// Transform
// --------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct TransformResult {
  pub code: String,
  pub map: Option<String>,
  pub errors: Vec<Message>,
  pub warnings: Vec<Message>,
}

/// Single-input transform: lowering, minification, and printing without any
/// import resolution.
pub fn transform(code: &str, options: &TransformOptions) -> TransformResult {
  let log = Log::new(0);
  let compiled = compile_common_options(&options.target, &options.define, &options.pure, options.format, &log);

  let source = Arc::new(Source::new(
    1,
    PathBuf::from(&options.source_file),
    options.source_file.clone(),
    code.to_string(),
    options.loader,
  ));

  if options.loader == Loader::Css {
    let ast = crate::css::parser::CssParser::new(&source, &log).parse();
    let mut printer = CssPrinter::new(CssPrintOptions {
      minify: options.minify_whitespace,
      ascii_only: true,
    });
    let table = source.line_offsets();
    if options.sourcemap {
      let mut builder = SourceMapBuilder::new();
      builder.register_source(1, source.pretty_path.clone(), source.contents.clone(), None);
      printer.set_map(builder);
    }
    printer.print_file(&ast, &table, 1);
    let (out, map) = printer.finish();
    let map = map.and_then(|m| serde_json::to_string(&m.build(true)).ok());
    let (errors, warnings) = split_messages(log.take_msgs());
    return TransformResult {
      code: out,
      map,
      errors,
      warnings,
    };
  }

  let parse_opts = ParseOptions {
    unsupported: compiled.unsupported,
    defines: compiled.defines.clone(),
    pure_calls: compiled.pure_calls.clone(),
    jsx: options.jsx,
    jsx_factory: options.jsx_factory.split('.').map(crate::interner::Atom::new).collect(),
    jsx_fragment: options.jsx_fragment.split('.').map(crate::interner::Atom::new).collect(),
    jsx_import_source: options.jsx_import_source.clone(),
  };
  let parsed = Parser::new(&source, &log, &parse_opts).parse();

  // Lowerings may pull in runtime helpers; satisfy them by prepending the
  // needed helper definitions
  let runtime_source = Arc::new(Source::new(
    0,
    PathBuf::from(runtime::RUNTIME_SPECIFIER),
    runtime::RUNTIME_SPECIFIER.to_string(),
    runtime::RUNTIME_SOURCE.to_string(),
    Loader::Js,
  ));
  let runtime_parsed = Parser::new(&runtime_source, &log, &ParseOptions::default()).parse();

  let mut symbols = SymbolMap::new(2);
  symbols.tables[0] = runtime_parsed.symbols;
  symbols.tables[1] = parsed.symbols;
  let mut runtime_ast = runtime_parsed.ast;
  let file_ast = parsed.ast;

  // Bind helper imports to runtime exports and mark the helper parts live
  let mut live_runtime_parts = vec![false; runtime_ast.parts.len()];
  let mut worklist: Vec<Ref> = Vec::new();
  for (import_ref, import) in &file_ast.named_imports {
    let record = &file_ast.import_records[import.import_record_index as usize];
    if record.specifier.as_str() != runtime::RUNTIME_SPECIFIER {
      continue;
    }
    if let Some(export) = runtime_ast.named_exports.get(&import.alias) {
      let target = export.target;
      symbols.merge(*import_ref, target);
      worklist.push(target);
    }
  }
  while let Some(r) = worklist.pop() {
    let root = symbols.follow(r);
    if root.source != 0 {
      continue;
    }
    if let Some(parts) = runtime_ast.top_level_symbols_to_parts.get(&root).cloned() {
      for part in parts {
        if !live_runtime_parts[part as usize] {
          live_runtime_parts[part as usize] = true;
          let uses: Vec<Ref> = runtime_ast.parts[part as usize].symbol_uses.keys().copied().collect();
          worklist.extend(uses);
        }
      }
    }
  }

  // Helper declarations print without their `export` keyword
  let runtime_stmts: Vec<crate::js::ast::StmtId> = runtime_ast
    .parts
    .iter()
    .enumerate()
    .filter(|(i, _)| live_runtime_parts[*i])
    .flat_map(|(_, part)| part.stmts.iter().copied())
    .collect();
  for &stmt in &runtime_stmts {
    if let crate::js::ast::SData::Local { is_export, .. } = &mut runtime_ast.stmts[stmt.0 as usize].data {
      *is_export = false;
    }
  }

  // Rename runtime declarations away from anything the file declares
  let mut reserved = rustc_hash::FxHashSet::default();
  for symbol in &symbols.tables[1] {
    reserved.insert(symbol.original_name.as_str().to_string());
  }
  let mut targets = Vec::new();
  for part in &runtime_ast.parts {
    for &decl in &part.declared_symbols {
      targets.push(crate::renamer::RenameTarget {
        symbol: decl,
        use_count: symbols.get(decl).use_count_estimate,
        must_keep_name: false,
      });
    }
  }
  let renames = crate::renamer::Renamer::new(reserved).assign(&symbols, targets, false);

  let print_opts = PrintOptions {
    minify_whitespace: options.minify_whitespace,
    minify_syntax: options.minify_syntax,
    ascii_only: true,
  };
  let mut printer = Printer::new(print_opts, &symbols, &renames);
  if options.sourcemap {
    let mut builder = SourceMapBuilder::new();
    builder.register_source(1, source.pretty_path.clone(), source.contents.clone(), None);
    printer.set_map(builder);
  }

  let runtime_table = runtime_source.line_offsets();
  if !runtime_stmts.is_empty() {
    printer.print_file(&runtime_ast, &runtime_table, 0, &runtime_stmts);
  }
  let file_table = source.line_offsets();
  let file_stmts: Vec<crate::js::ast::StmtId> = file_ast
    .parts
    .iter()
    .flat_map(|part| part.stmts.iter().copied())
    .collect();
  printer.print_file(&file_ast, &file_table, 1, &file_stmts);

  let (out, map) = printer.finish();
  let map = map.and_then(|m| serde_json::to_string(&m.build(true)).ok());
  let (errors, warnings) = split_messages(log.take_msgs());
  TransformResult {
    code: out,
    map,
    errors,
    warnings,
  }
}
