//! The linker: the cross-file pass. Resolves exports (including star
//! re-export closures), binds imports to exports through symbol union-find,
//! decides CommonJS wrapping, tree-shakes at part granularity, assigns
//! chunks, renames symbols, and converts each file's statements into their
//! output form for the printer.

use crate::graph::{Graph, ImportKind, ModuleAst};
use crate::interner::Atom;
use crate::js::ast::*;
use crate::js::parser::module_stem;
use crate::logger::{Log, Note};
use crate::options::{BuildOptions, CompiledOptions, Format};
use crate::source::{Loc, Range};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Wrap {
  #[default]
  None,
  /// `var require_x = __commonJS((exports, module) => { ... });`
  Cjs,
  /// `var init_x = __esm(() => { ... });`
  Esm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkKind {
  Js,
  Css,
}

/// A unit of output: an ordered list of per-file statement segments.
#[derive(Debug)]
pub struct Chunk {
  pub kind: ChunkKind,
  /// (source_index, statements) in emission order. CSS chunks leave the
  /// statement list empty and print whole files.
  pub segments: Vec<(u32, Vec<StmtId>)>,
  pub files_in_order: Vec<u32>,
  pub entry_point: Option<u32>,
  pub is_entry: bool,
  /// Stem used for `[name]` in the output path template.
  pub name_stem: String,
}

#[derive(Debug, Default)]
struct ExportTarget {
  target: Ref,
  source_of_export: u32,
}

#[derive(Debug, Default)]
struct ModuleMeta {
  wrap: Wrap,
  is_included: bool,
  live_parts: Vec<bool>,
  resolved_exports: IndexMap<Atom, ExportTarget>,
  ambiguous_exports: FxHashMap<Atom, Vec<u32>>,
  cjs_style: bool,
  needs_exports_object: bool,
  /// record index -> per-import-statement namespace ref.
  namespace_refs: FxHashMap<u32, Ref>,
  entry_bits: u64,
  /// Output statements produced by the convert phase.
  converted: Option<Vec<StmtId>>,
}

pub struct LinkResult {
  pub chunks: Vec<Chunk>,
  pub renames: FxHashMap<Ref, String>,
}

pub fn link(graph: &mut Graph, options: &BuildOptions, compiled: &CompiledOptions, log: &Log) -> LinkResult {
  let mut linker = Linker {
    graph,
    options,
    compiled,
    log,
    meta: Vec::new(),
    dynamic_entries: Vec::new(),
    chunk_of_file: FxHashMap::default(),
    renames: FxHashMap::default(),
  };
  linker.run()
}

struct Linker<'a> {
  graph: &'a mut Graph,
  options: &'a BuildOptions,
  compiled: &'a CompiledOptions,
  log: &'a Log,
  meta: Vec<ModuleMeta>,
  /// Dynamic-import targets promoted to entry points under `splitting`.
  dynamic_entries: Vec<u32>,
  chunk_of_file: FxHashMap<u32, usize>,
  renames: FxHashMap<Ref, String>,
}

impl<'a> Linker<'a> {
  fn run(&mut self) -> LinkResult {
    let count = self.graph.modules.len();
    self.meta = (0..count)
      .map(|i| {
        let mut meta = ModuleMeta::default();
        if let ModuleAst::Js(ast) = &self.graph.modules[i].ast {
          meta.live_parts = vec![false; ast.parts.len()];
          meta.cjs_style = ast.exports_kind == ExportsKind::Cjs;
        }
        meta
      })
      .collect();

    self.collect_namespace_refs();
    self.resolve_exports();
    self.decide_wraps();
    self.bind_imports();
    self.tree_shake();
    let mut chunks = self.assign_chunks();
    self.renames = self.rename();
    self.convert_all(&mut chunks);
    LinkResult {
      chunks,
      renames: std::mem::take(&mut self.renames),
    }
  }

  /// The output name a symbol will print with.
  fn final_name(&mut self, r: Ref) -> Atom {
    let root = self.graph.symbols.follow(r);
    match self.renames.get(&root) {
      Some(name) => Atom::new(name),
      None => self.graph.symbols.get(root).original_name,
    }
  }

  fn js_ast(&self, source: u32) -> Option<&JsAst> {
    self.graph.modules[source as usize].ast.as_js()
  }

  fn source_error(&self, source: u32, loc: Loc, len: u32, text: String) {
    let module = &self.graph.modules[source as usize];
    self
      .log
      .add_error(Some(&module.source), Range::new(loc.0, loc.0 + len), text);
  }

  // ------------------------------------------------------------------
  // Phase 0: per-import-statement namespace refs
  // ------------------------------------------------------------------

  fn collect_namespace_refs(&mut self) {
    for index in 0..self.graph.modules.len() {
      let pairs: Vec<(u32, Ref)> = match self.js_ast(index as u32) {
        Some(ast) => ast
          .stmts
          .iter()
          .filter_map(|stmt| match &stmt.data {
            SData::Import {
              record, namespace_ref, ..
            } => Some((*record, *namespace_ref)),
            _ => None,
          })
          .collect(),
        None => continue,
      };
      self.meta[index].namespace_refs.extend(pairs);
    }
  }

  // ------------------------------------------------------------------
  // Phase 1: export resolution (star closure + ambiguity)
  // ------------------------------------------------------------------

  fn resolve_exports(&mut self) {
    for index in 0..self.graph.modules.len() as u32 {
      let own: Vec<(Atom, Ref)> = match self.js_ast(index) {
        Some(ast) => ast
          .named_exports
          .iter()
          .map(|(name, export)| (*name, export.target))
          .collect(),
        None => continue,
      };
      for (name, target) in own {
        self.meta[index as usize].resolved_exports.insert(
          name,
          ExportTarget {
            target,
            source_of_export: index,
          },
        );
      }
      let mut visited = FxHashSet::default();
      self.add_star_exports(index, index, &mut visited);
    }
  }

  fn add_star_exports(&mut self, into: u32, from: u32, visited: &mut FxHashSet<u32>) {
    if !visited.insert(from) {
      // Cycles in re-export chains resolve to nothing
      return;
    }
    let records: Vec<u32> = match self.js_ast(from) {
      Some(ast) => ast.export_star_records.clone(),
      None => return,
    };
    for record_index in records {
      let target = {
        let ast = self.js_ast(from).unwrap();
        let record = &ast.import_records[record_index as usize];
        if record.is_external {
          continue;
        }
        match record.source_index {
          Some(target) => target,
          None => continue,
        }
      };
      if self.meta[target as usize].cjs_style {
        // `export * from './cjs'` cannot be statically resolved
        let ast = self.js_ast(from).unwrap();
        let range = ast.import_records[record_index as usize].range;
        let module = &self.graph.modules[from as usize];
        self.log.add_error(
          Some(&module.source),
          range,
          "Re-exporting all symbols from a CommonJS module is not supported".to_string(),
        );
        continue;
      }
      let target_exports: Vec<(Atom, Ref)> = match self.js_ast(target) {
        Some(ast) => ast
          .named_exports
          .iter()
          .map(|(name, export)| (*name, export.target))
          .collect(),
        None => continue,
      };
      let default_atom = Atom::new("default");
      for (name, target_ref) in target_exports {
        if name == default_atom {
          // `export *` never re-exports default
          continue;
        }
        let own_has = {
          let ast = self.js_ast(into).unwrap();
          ast.named_exports.contains_key(&name)
        };
        if own_has {
          continue;
        }
        match self.meta[into as usize].resolved_exports.get(&name) {
          Some(existing) if existing.source_of_export != target => {
            self.meta[into as usize]
              .ambiguous_exports
              .entry(name)
              .or_default()
              .push(target);
          }
          Some(_) => {}
          None => {
            self.meta[into as usize].resolved_exports.insert(
              name,
              ExportTarget {
                target: target_ref,
                source_of_export: target,
              },
            );
          }
        }
      }
      // Transitive closure through the target's own stars
      self.add_star_exports(into, target, visited);
    }
  }

  // ------------------------------------------------------------------
  // Phase 2: CommonJS / ESM wrapping decisions
  // ------------------------------------------------------------------

  fn wrap_module(&mut self, target: u32) {
    let meta = &mut self.meta[target as usize];
    if meta.wrap != Wrap::None {
      return;
    }
    let is_js = self.graph.modules[target as usize].ast.as_js().is_some();
    if !is_js {
      return;
    }
    if meta.cjs_style {
      meta.wrap = Wrap::Cjs;
    } else {
      meta.wrap = Wrap::Esm;
      meta.needs_exports_object = true;
    }

    // Rename the wrapper symbols after their final shape
    let module = &self.graph.modules[target as usize];
    let stem = module_stem(&module.source);
    let ast = module.ast.as_js().unwrap();
    let wrapper_ref = ast.wrapper_ref;
    let exports_ref = ast.exports_ref;
    let wrap = self.meta[target as usize].wrap;
    match wrap {
      Wrap::Cjs => {
        self.graph.symbols.get_mut(wrapper_ref).original_name = Atom::new(&format!("require_{}", stem));
        // `exports`/`module` become the wrapper's parameters
        self.graph.symbols.get_mut(exports_ref).must_not_be_renamed = true;
        self.graph.symbols.get_mut(ast.module_ref).must_not_be_renamed = true;
      }
      Wrap::Esm => {
        self.graph.symbols.get_mut(wrapper_ref).original_name = Atom::new(&format!("init_{}", stem));
        self.graph.symbols.get_mut(exports_ref).original_name = Atom::new(&format!("{}_exports", stem));
      }
      Wrap::None => {}
    }

    if self.graph.modules[target as usize]
      .ast
      .as_js()
      .map(|ast| ast.has_top_level_await)
      .unwrap_or(false)
    {
      let module = &self.graph.modules[target as usize];
      self.log.add_error(
        Some(&module.source),
        Range::default(),
        "This module uses top-level await and cannot be wrapped for \"require\"".to_string(),
      );
    }
  }

  fn decide_wraps(&mut self) {
    // require()/require.resolve()/dynamic import targets get wrapped
    for index in 0..self.graph.modules.len() as u32 {
      let records: Vec<(ImportKind, Option<u32>)> = match &self.graph.modules[index as usize].ast {
        ModuleAst::Js(ast) => ast
          .import_records
          .iter()
          .map(|r| (r.kind, if r.is_external { None } else { r.source_index }))
          .collect(),
        ModuleAst::Css(_) => continue,
      };
      for (kind, target) in records {
        let target = match target {
          Some(target) => target,
          None => continue,
        };
        match kind {
          ImportKind::Require | ImportKind::RequireResolve => self.wrap_module(target),
          ImportKind::DynamicImport if !self.options.splitting => self.wrap_module(target),
          ImportKind::Stmt => {
            if self.meta[target as usize].cjs_style {
              self.wrap_module(target);
            }
          }
          _ => {}
        }
      }
    }

    // A CommonJS entry point is wrapped and invoked
    for &entry in &self.graph.entry_points.clone() {
      if self.meta[entry as usize].cjs_style {
        self.wrap_module(entry);
      }
    }
  }

  // ------------------------------------------------------------------
  // Phase 3: import binding
  // ------------------------------------------------------------------

  fn bind_imports(&mut self) {
    let star_atom = Atom::new("*");
    for index in 0..self.graph.modules.len() as u32 {
      let imports: Vec<(Ref, NamedImport)> = match self.js_ast(index) {
        Some(ast) => ast.named_imports.iter().map(|(r, ni)| (*r, ni.clone())).collect(),
        None => continue,
      };
      for (import_ref, import) in imports {
        let (target, is_external, alias_loc) = {
          let ast = self.js_ast(index).unwrap();
          let record = &ast.import_records[import.import_record_index as usize];
          (record.source_index, record.is_external, import.alias_loc)
        };
        if is_external || target.is_none() {
          continue;
        }
        let target = target.unwrap();

        if self.graph.modules[target as usize].ast.as_js().is_none() {
          // Importing bindings from CSS has no meaning
          if import.alias != star_atom {
            self.source_error(
              index,
              alias_loc,
              import.alias.as_str().len() as u32,
              format!("Cannot import {:?} from a CSS file", import.alias.as_str()),
            );
          }
          continue;
        }

        if self.meta[target as usize].cjs_style {
          // CJS interop: the reference prints as `import_x.alias`
          let ns = self.meta[index as usize]
            .namespace_refs
            .get(&import.import_record_index)
            .copied();
          let ns = match ns {
            Some(ns) => ns,
            // Re-export clauses have no import statement; synthesize against
            // the target's exports object instead
            None => {
              self.wrap_module(target);
              self.js_ast(target).unwrap().exports_ref
            }
          };
          if import.alias == star_atom {
            // The namespace ref itself becomes the interop object
            continue;
          }
          self.graph.symbols.get_mut(import_ref).namespace_alias = Some(NamespaceAlias {
            namespace_ref: ns,
            alias: import.alias,
          });
          continue;
        }

        if import.alias == star_atom {
          // Namespace imports materialize the target's exports object
          self.wrap_module(target);
          let exports_ref = self.js_ast(target).unwrap().exports_ref;
          self.graph.symbols.merge(import_ref, exports_ref);
          continue;
        }

        if let Some(sources) = self.meta[target as usize].ambiguous_exports.get(&import.alias) {
          let sources = sources.clone();
          let notes = sources
            .iter()
            .map(|&s| Note {
              text: format!(
                "One matching export is in {:?}",
                self.graph.modules[s as usize].source.pretty_path
              ),
              location: None,
            })
            .collect();
          let module = &self.graph.modules[index as usize];
          self.log.add_error_with_notes(
            Some(&module.source),
            Range::new(alias_loc.0, alias_loc.0 + import.alias.as_str().len() as u32),
            format!("Ambiguous import {:?} has multiple matching exports", import.alias.as_str()),
            notes,
          );
          continue;
        }

        match self.meta[target as usize].resolved_exports.get(&import.alias) {
          Some(export) => {
            let export_target = export.target;
            self.graph.symbols.merge(import_ref, export_target);
          }
          None => {
            let module = &self.graph.modules[index as usize];
            let target_path = self.graph.modules[target as usize].source.pretty_path.clone();
            self.log.add_error(
              Some(&module.source),
              Range::new(alias_loc.0, alias_loc.0 + import.alias.as_str().len() as u32),
              format!("No matching export in {:?} for import {:?}", target_path, import.alias.as_str()),
            );
          }
        }
      }
    }
  }

  // ------------------------------------------------------------------
  // Phase 4: tree shaking over parts
  // ------------------------------------------------------------------

  fn tree_shaking_enabled(&self) -> bool {
    self.options.tree_shaking.unwrap_or(true)
  }

  fn tree_shake(&mut self) {
    let mut worklist: Vec<(u32, u32)> = Vec::new();

    for &entry in &self.graph.entry_points.clone() {
      self.include_file(entry, true, &mut worklist);
      // The entry's exports are roots
      let export_targets: Vec<Ref> = self.meta[entry as usize]
        .resolved_exports
        .values()
        .map(|e| e.target)
        .collect();
      for target in export_targets {
        self.include_symbol(target, &mut worklist);
      }
    }

    while let Some((source, part_index)) = worklist.pop() {
      self.process_part(source, part_index, &mut worklist);
    }

    // Interop helpers injected during statement conversion must be alive
    // before renaming; derive them from the record/wrap combinations
    for index in 0..self.graph.modules.len() as u32 {
      if !self.meta[index as usize].is_included {
        continue;
      }
      let records: Vec<(ImportKind, Option<u32>, bool)> = match self.js_ast(index) {
        Some(ast) => ast
          .import_records
          .iter()
          .map(|r| (r.kind, r.source_index, r.is_external))
          .collect(),
        None => continue,
      };
      for (kind, target, external) in records {
        if external {
          if kind == ImportKind::Stmt && self.compiled.format == Format::Cjs {
            self.include_runtime_helper("__toESM", &mut worklist);
          }
          continue;
        }
        let target = match target {
          Some(target) => target,
          None => continue,
        };
        match (kind, self.meta[target as usize].wrap) {
          (ImportKind::Stmt, Wrap::Cjs) => {
            self.include_runtime_helper("__toESM", &mut worklist);
          }
          (ImportKind::Require, Wrap::Esm) => {
            self.include_runtime_helper("__toCommonJS", &mut worklist);
          }
          (ImportKind::DynamicImport, Wrap::Cjs) if !self.options.splitting => {
            self.include_runtime_helper("__toESM", &mut worklist);
            self.include_runtime_helper("__toCommonJS", &mut worklist);
          }
          _ => {}
        }
      }
    }
    for &entry in &self.graph.entry_points.clone() {
      let has_exports = !self.meta[entry as usize].resolved_exports.is_empty();
      let needs_export_helper = has_exports
        && self.meta[entry as usize].wrap == Wrap::None
        && (self.compiled.format == Format::Cjs
          || (self.compiled.format == Format::Iife && self.options.global_name.is_some()));
      if needs_export_helper {
        self.include_runtime_helper("__export", &mut worklist);
      }
    }
    while let Some((source, part_index)) = worklist.pop() {
      self.process_part(source, part_index, &mut worklist);
    }
  }

  /// Mark a file as reachable. `force` includes even parts a
  /// `sideEffects: false` hint would otherwise drop.
  fn include_file(&mut self, source: u32, force: bool, worklist: &mut Vec<(u32, u32)>) {
    if self.meta[source as usize].is_included {
      return;
    }
    self.meta[source as usize].is_included = true;
    debug!("Including {:?}", self.graph.modules[source as usize].source.pretty_path);

    if self.js_ast(source).is_none() {
      // CSS: reachability is enough, but @import targets are reachable too
      let targets: Vec<u32> = self.graph.modules[source as usize]
        .ast
        .import_records()
        .iter()
        .filter(|r| !r.is_external && r.kind == ImportKind::ImportRule)
        .filter_map(|r| r.source_index)
        .collect();
      for target in targets {
        self.include_file(target, false, worklist);
      }
      return;
    }
    let ast = self.js_ast(source).unwrap();

    let include_all = self.meta[source as usize].cjs_style
      || self.meta[source as usize].wrap == Wrap::Cjs
      || ast.has_direct_eval
      || !self.tree_shaking_enabled();
    let side_effects = self.graph.modules[source as usize].side_effects || force;
    let part_count = ast.parts.len();
    for part_index in 0..part_count {
      let removable = self.js_ast(source).unwrap().parts[part_index].can_be_removed_if_unused;
      if include_all || (!removable && side_effects) {
        self.include_part(source, part_index as u32, worklist);
      }
    }

    // Bare imports keep their targets reachable even when no symbol is used
    let records: Vec<(ImportKind, Option<u32>, bool)> = self
      .js_ast(source)
      .unwrap()
      .import_records
      .iter()
      .map(|r| (r.kind, r.source_index, r.is_external))
      .collect();
    if include_all {
      for (_, target, external) in records {
        if let (Some(target), false) = (target, external) {
          self.include_file(target, false, worklist);
          self.include_wrapper(target, worklist);
        }
      }
    }
  }

  fn include_part(&mut self, source: u32, part_index: u32, worklist: &mut Vec<(u32, u32)>) {
    if self.meta[source as usize].live_parts[part_index as usize] {
      return;
    }
    self.meta[source as usize].live_parts[part_index as usize] = true;
    worklist.push((source, part_index));
  }

  fn process_part(&mut self, source: u32, part_index: u32, worklist: &mut Vec<(u32, u32)>) {
    let (uses, record_indices) = {
      let ast = self.js_ast(source).unwrap();
      let part = &ast.parts[part_index as usize];
      (
        part.symbol_uses.keys().copied().collect::<Vec<Ref>>(),
        part.import_record_indices.clone(),
      )
    };

    for use_ref in uses {
      self.include_symbol(use_ref, worklist);
    }

    for record_index in record_indices {
      let (kind, target, external) = {
        let ast = self.js_ast(source).unwrap();
        let record = &ast.import_records[record_index as usize];
        (record.kind, record.source_index, record.is_external)
      };
      if external {
        continue;
      }
      let target = match target {
        Some(target) => target,
        None => continue,
      };
      let _ = kind;
      self.include_file(target, false, worklist);
      self.include_wrapper(target, worklist);
    }
  }

  /// Make the declaring parts of a symbol live, following union-find links
  /// across files.
  fn include_symbol(&mut self, use_ref: Ref, worklist: &mut Vec<(u32, u32)>) {
    let root = self.graph.symbols.follow(use_ref);

    if let Some(alias) = self.graph.symbols.get(root).namespace_alias.clone() {
      self.include_symbol(alias.namespace_ref, worklist);
    }

    let home = root.source;
    let parts = self
      .js_ast(home)
      .and_then(|ast| ast.top_level_symbols_to_parts.get(&root).cloned());
    match parts {
      Some(parts) => {
        self.include_file(home, false, worklist);
        for part in parts {
          self.include_part(home, part, worklist);
        }
      }
      None => {
        // Synthetic refs (exports objects, wrappers) have no declaring part;
        // reaching them keeps their whole file
        self.include_file(home, false, worklist);
        self.include_wrapper(home, worklist);
      }
    }
  }

  /// Wrapped files pull in their runtime helper.
  fn include_wrapper(&mut self, target: u32, worklist: &mut Vec<(u32, u32)>) {
    match self.meta[target as usize].wrap {
      Wrap::Cjs => {
        self.include_runtime_helper("__commonJS", worklist);
      }
      Wrap::Esm => {
        self.include_runtime_helper("__esm", worklist);
        if self.meta[target as usize].needs_exports_object {
          self.include_runtime_helper("__export", worklist);
        }
      }
      Wrap::None => {}
    }
  }

  fn runtime_helper_ref(&self, name: &str) -> Option<Ref> {
    self
      .js_ast(0)
      .and_then(|ast| ast.named_exports.get(&Atom::new(name)))
      .map(|export| export.target)
  }

  fn include_runtime_helper(&mut self, name: &str, worklist: &mut Vec<(u32, u32)>) -> Option<Ref> {
    let target = self.runtime_helper_ref(name)?;
    self.include_symbol(target, worklist);
    Some(target)
  }

  // ------------------------------------------------------------------
  // Phase 5: chunk assignment
  // ------------------------------------------------------------------

  fn assign_chunks(&mut self) -> Vec<Chunk> {
    // Dynamic imports become their own entry chunks under splitting
    if self.options.splitting {
      for index in 0..self.graph.modules.len() as u32 {
        let targets: Vec<u32> = match self.js_ast(index) {
          Some(ast) => ast
            .import_records
            .iter()
            .filter(|r| r.kind == ImportKind::DynamicImport && !r.is_external)
            .filter_map(|r| r.source_index)
            .collect(),
          None => continue,
        };
        for target in targets {
          if self.meta[target as usize].is_included && !self.dynamic_entries.contains(&target) {
            self.dynamic_entries.push(target);
          }
        }
      }
      self.dynamic_entries.sort();
    }

    let mut all_entries: Vec<(u32, bool)> = self
      .graph
      .entry_points
      .iter()
      .map(|&e| (e, true))
      .collect();
    for &dynamic in &self.dynamic_entries {
      if !all_entries.iter().any(|(e, _)| *e == dynamic) {
        all_entries.push((dynamic, false));
      }
    }

    let mut chunks = Vec::new();
    if self.options.splitting {
      // Entry-point reachability sets decide chunk membership
      for (bit, (entry, _)) in all_entries.iter().enumerate() {
        let mut stack = vec![*entry];
        let mut seen = FxHashSet::default();
        while let Some(file) = stack.pop() {
          if !seen.insert(file) || !self.meta[file as usize].is_included {
            continue;
          }
          self.meta[file as usize].entry_bits |= 1 << bit.min(63);
          if let Some(ast) = self.js_ast(file) {
            for record in &ast.import_records {
              if record.kind == ImportKind::DynamicImport {
                continue; // a different chunk's root
              }
              if let (Some(target), false) = (record.source_index, record.is_external) {
                stack.push(target);
              }
            }
          }
        }
      }

      // Global topological order over live js files
      let order = self.topo_order(all_entries.iter().map(|(e, _)| *e).collect());

      // One chunk per distinct reachability set, keyed deterministically
      let mut groups: IndexMap<u64, Vec<u32>> = IndexMap::new();
      for &file in &order {
        let bits = self.meta[file as usize].entry_bits;
        if bits != 0 {
          groups.entry(bits).or_default().push(file);
        }
      }
      // Entry chunks come first, in entry order; shared chunks after,
      // ordered by their lowest file path
      let mut shared: Vec<(u64, Vec<u32>)> = Vec::new();
      for (bit, (entry, is_entry)) in all_entries.iter().enumerate() {
        let own_bits = 1u64 << bit.min(63);
        let files = groups.shift_remove(&own_bits).unwrap_or_else(|| vec![*entry]);
        let stem = self.entry_stem(*entry);
        for &file in &files {
          self.chunk_of_file.insert(file, chunks.len());
        }
        chunks.push(Chunk {
          kind: ChunkKind::Js,
          segments: Vec::new(),
          files_in_order: files,
          entry_point: Some(*entry),
          is_entry: *is_entry,
          name_stem: stem,
        });
      }
      for (bits, files) in groups {
        shared.push((bits, files));
      }
      shared.sort_by(|a, b| {
        let path_a = &self.graph.modules[a.1[0] as usize].source.pretty_path;
        let path_b = &self.graph.modules[b.1[0] as usize].source.pretty_path;
        path_a.cmp(path_b)
      });
      for (index, (_, files)) in shared.into_iter().enumerate() {
        for &file in &files {
          self.chunk_of_file.insert(file, chunks.len());
        }
        chunks.push(Chunk {
          kind: ChunkKind::Js,
          segments: Vec::new(),
          files_in_order: files,
          entry_point: None,
          is_entry: false,
          name_stem: format!("chunk-{}", index + 1),
        });
      }
    } else {
      // One self-contained chunk per entry point. A CSS-only entry has no
      // JS chunk at all
      for &(entry, is_entry) in &all_entries {
        let order = self.topo_order(vec![entry]);
        if order.is_empty() {
          continue;
        }
        let stem = self.entry_stem(entry);
        chunks.push(Chunk {
          kind: ChunkKind::Js,
          segments: Vec::new(),
          files_in_order: order,
          entry_point: Some(entry),
          is_entry,
          name_stem: stem,
        });
      }
    }

    // The runtime reaches chunks through symbol binding rather than import
    // records, so force it to the front of any JS chunk missing it
    let runtime_live = self.meta[0].live_parts.iter().any(|&live| live);
    if runtime_live {
      for chunk in chunks.iter_mut() {
        if chunk.kind == ChunkKind::Js && !chunk.files_in_order.contains(&0) {
          chunk.files_in_order.insert(0, 0);
        }
      }
    }

    // One CSS chunk per entry that reaches CSS
    for &(entry, _) in &all_entries {
      let css_files = self.css_order(entry);
      if !css_files.is_empty() {
        let stem = self.entry_stem(entry);
        chunks.push(Chunk {
          kind: ChunkKind::Css,
          segments: Vec::new(),
          files_in_order: css_files,
          entry_point: Some(entry),
          is_entry: true,
          name_stem: stem,
        });
      }
    }

    chunks
  }

  fn entry_stem(&self, entry: u32) -> String {
    // An explicit entry name wins over the file stem
    let path = &self.graph.modules[entry as usize].source.path;
    for ep in &self.options.entry_points {
      if let Some(name) = &ep.name {
        let resolved = path.to_string_lossy();
        if resolved.ends_with(&ep.path) || ep.path.ends_with(&*resolved) {
          return name.clone();
        }
      }
    }
    path
      .file_stem()
      .and_then(|s| s.to_str())
      .unwrap_or("out")
      .to_string()
  }

  /// Dependencies-first DFS over live JS files; deterministic because record
  /// order is parse order and roots are visited in the given order.
  fn topo_order(&self, roots: Vec<u32>) -> Vec<u32> {
    let mut order = Vec::new();
    let mut state: FxHashMap<u32, bool> = FxHashMap::default(); // false = visiting
    for root in roots {
      self.topo_visit(root, &mut state, &mut order);
    }
    order
  }

  fn topo_visit(&self, file: u32, state: &mut FxHashMap<u32, bool>, order: &mut Vec<u32>) {
    if !self.meta[file as usize].is_included {
      return;
    }
    if self.js_ast(file).is_none() {
      return;
    }
    match state.get(&file) {
      Some(_) => return, // visited or in-progress (cycle broken here)
      None => {}
    }
    state.insert(file, false);
    if let Some(ast) = self.js_ast(file) {
      for record in &ast.import_records {
        if record.is_external || record.kind == ImportKind::DynamicImport {
          continue;
        }
        if let Some(target) = record.source_index {
          self.topo_visit(target, state, order);
        }
      }
    }
    state.insert(file, true);
    order.push(file);
  }

  fn css_order(&self, entry: u32) -> Vec<u32> {
    let mut order = Vec::new();
    let mut seen = FxHashSet::default();
    self.css_visit(entry, &mut seen, &mut order);
    order
  }

  fn css_visit(&self, file: u32, seen: &mut FxHashSet<u32>, order: &mut Vec<u32>) {
    if !seen.insert(file) || !self.meta[file as usize].is_included {
      return;
    }
    let module = &self.graph.modules[file as usize];
    for record in module.ast.import_records() {
      if record.is_external || record.kind == ImportKind::UrlToken {
        continue;
      }
      if record.kind == ImportKind::DynamicImport {
        continue;
      }
      if let Some(target) = record.source_index {
        self.css_visit(target, seen, order);
      }
    }
    if matches!(module.ast, ModuleAst::Css(_)) {
      order.push(file);
    }
  }

  // ------------------------------------------------------------------
  // Phase 6: rename
  // ------------------------------------------------------------------

  fn rename(&mut self) -> FxHashMap<Ref, String> {
    use crate::renamer::{RenameTarget, Renamer};

    let included: Vec<u32> = (0..self.graph.modules.len() as u32)
      .filter(|&i| self.meta[i as usize].is_included)
      .collect();

    // Reserve every name that survives un-renamed: free variables and
    // nested-scope declarations
    let mut reserved: FxHashSet<String> = FxHashSet::default();
    let mut module_scope: FxHashSet<Ref> = FxHashSet::default();
    for &index in &included {
      let ast = match self.js_ast(index) {
        Some(ast) => ast,
        None => continue,
      };
      for part in &ast.parts {
        for &decl in &part.declared_symbols {
          module_scope.insert(self.graph.symbols.follow_readonly(decl));
        }
      }
      if self.meta[index as usize].wrap != Wrap::None {
        module_scope.insert(ast.wrapper_ref);
      }
      if self.meta[index as usize].needs_exports_object {
        module_scope.insert(ast.exports_ref);
      }
      for (_, ns) in &self.meta[index as usize].namespace_refs {
        module_scope.insert(self.graph.symbols.follow_readonly(*ns));
      }
    }
    for &index in &included {
      let table = &self.graph.symbols.tables[index as usize];
      for (inner, symbol) in table.iter().enumerate() {
        let r = Ref::new(index, inner as u32);
        let is_declaration = symbol.link.is_none()
          && !matches!(symbol.kind, SymbolKind::Unbound)
          && !module_scope.contains(&r);
        let is_free = matches!(symbol.kind, SymbolKind::Unbound) && symbol.link.is_none();
        if is_declaration || is_free || symbol.must_not_be_renamed {
          reserved.insert(symbol.original_name.as_str().to_string());
        }
      }
    }

    let mut targets: Vec<RenameTarget> = Vec::new();
    let mut seen: FxHashSet<Ref> = FxHashSet::default();
    let mut ordered: Vec<Ref> = module_scope.into_iter().collect();
    ordered.sort();
    for root in ordered {
      if !seen.insert(root) {
        continue;
      }
      let symbol = self.graph.symbols.get(root);
      targets.push(RenameTarget {
        symbol: root,
        use_count: symbol.use_count_estimate,
        must_keep_name: symbol.must_not_be_renamed,
      });
    }

    let renamer = Renamer::new(reserved);
    renamer.assign(&self.graph.symbols, targets, self.options.minify_identifiers)
  }

  // ------------------------------------------------------------------
  // Phase 7: statement conversion
  // ------------------------------------------------------------------

  fn convert_all(&mut self, chunks: &mut Vec<Chunk>) {
    // Expression-level rewrites first (require -> wrapper calls)
    for index in 0..self.graph.modules.len() as u32 {
      if self.meta[index as usize].is_included && self.js_ast(index).is_some() {
        self.rewrite_require_exprs(index);
      }
    }

    for index in 0..self.graph.modules.len() as u32 {
      if self.meta[index as usize].is_included && self.js_ast(index).is_some() {
        let stmts = self.convert_module(index);
        self.meta[index as usize].converted = Some(stmts);
      }
    }

    let chunk_count = chunks.len();
    for chunk_index in 0..chunk_count {
      if chunks[chunk_index].kind != ChunkKind::Js {
        continue;
      }
      let files = chunks[chunk_index].files_in_order.clone();
      let mut segments: Vec<(u32, Vec<StmtId>)> = Vec::new();

      // Cross-chunk imports come first
      if self.options.splitting {
        let headers = self.cross_chunk_headers(chunk_index, chunks);
        segments.extend(headers);
      }

      for &file in &files {
        if let Some(stmts) = self.meta[file as usize].converted.clone() {
          segments.push((file, stmts));
        }
      }

      // Entry trailer: export shape / wrapper invocation
      if let Some(entry) = chunks[chunk_index].entry_point {
        if chunks[chunk_index].is_entry {
          let trailer = self.entry_trailer(entry);
          if !trailer.is_empty() {
            segments.push((entry, trailer));
          }
        } else {
          // A dynamic-entry chunk exports its file's bindings
          let trailer = self.dynamic_entry_trailer(entry);
          if !trailer.is_empty() {
            segments.push((entry, trailer));
          }
        }
      }

      // Cross-chunk exports last
      if self.options.splitting {
        let exports = self.cross_chunk_exports(chunk_index, chunks);
        if !exports.is_empty() {
          let home = chunks[chunk_index].files_in_order.first().copied().unwrap_or(0);
          segments.push((home, exports));
        }
      }

      chunks[chunk_index].segments = segments;
    }
  }

  fn alloc_expr(&mut self, source: u32, loc: Loc, data: EData) -> ExprId {
    self.graph.modules[source as usize]
      .ast
      .as_js_mut()
      .unwrap()
      .alloc_expr(loc, data)
  }

  fn alloc_stmt(&mut self, source: u32, loc: Loc, data: SData) -> StmtId {
    self.graph.modules[source as usize]
      .ast
      .as_js_mut()
      .unwrap()
      .alloc_stmt(loc, data)
  }

  fn ident(&mut self, source: u32, r: Ref) -> ExprId {
    self.alloc_expr(source, Loc(0), EData::Ident(r))
  }

  fn call(&mut self, source: u32, target: ExprId, args: Vec<ExprId>) -> ExprId {
    self.alloc_expr(
      source,
      Loc(0),
      EData::Call {
        target,
        args,
        optional: false,
        is_pure: false,
      },
    )
  }

  fn helper_call(&mut self, source: u32, helper: &str, args: Vec<ExprId>) -> ExprId {
    let helper_ref = self
      .runtime_helper_ref(helper)
      .expect("runtime helper must exist");
    let target = self.ident(source, helper_ref);
    self.call(source, target, args)
  }

  /// Rewrite `require(...)`/`import(...)` expressions whose targets are
  /// bundled.
  fn rewrite_require_exprs(&mut self, source: u32) {
    let expr_count = self.js_ast(source).unwrap().exprs.len();
    for expr_index in 0..expr_count {
      let data = self.js_ast(source).unwrap().exprs[expr_index].data.clone();
      match data {
        EData::Require { record } => {
          let (target, external) = {
            let record = &self.js_ast(source).unwrap().import_records[record as usize];
            (record.source_index, record.is_external)
          };
          if external {
            continue;
          }
          let target = match target {
            Some(target) => target,
            None => continue,
          };
          let replacement = self.module_require_expr(source, target);
          let new_data = self.js_ast(source).unwrap().exprs[replacement.0 as usize].data.clone();
          self.graph.modules[source as usize].ast.as_js_mut().unwrap().exprs[expr_index].data = new_data;
        }
        EData::DynamicImport { record: Some(record), .. } => {
          let (target, external) = {
            let rec = &self.js_ast(source).unwrap().import_records[record as usize];
            (rec.source_index, rec.is_external)
          };
          if external {
            continue;
          }
          let target = match target {
            Some(target) => target,
            None => continue,
          };
          if self.options.splitting {
            // Rewritten to a relative chunk import by the bundler
            if let Some(&chunk) = self.chunk_of_file.get(&target) {
              let marker = Atom::new(&format!("bindle:chunk:{}", chunk));
              self.graph.modules[source as usize]
                .ast
                .as_js_mut()
                .unwrap()
                .import_records[record as usize]
                .specifier = marker;
            }
            continue;
          }
          // Same-bundle dynamic import: Promise.resolve().then(() => ns)
          let ns = self.module_namespace_expr(source, target);
          let ret = self.alloc_stmt(source, Loc(0), SData::Return(Some(ns)));
          let arrow = self.alloc_expr(
            source,
            Loc(0),
            EData::Arrow {
              args: Vec::new(),
              has_rest_arg: false,
              prefer_expr: true,
              body: vec![ret],
              is_async: false,
            },
          );
          let promise_ref = self.pinned_global(source, "Promise");
          let promise = self.ident(source, promise_ref);
          let resolve = self.alloc_expr(
            source,
            Loc(0),
            EData::Dot {
              target: promise,
              name: Atom::new("resolve"),
              optional: false,
            },
          );
          let resolved = self.call(source, resolve, Vec::new());
          let then = self.alloc_expr(
            source,
            Loc(0),
            EData::Dot {
              target: resolved,
              name: Atom::new("then"),
              optional: false,
            },
          );
          let full = self.call(source, then, vec![arrow]);
          let full_data = self.js_ast(source).unwrap().exprs[full.0 as usize].data.clone();
          self.graph.modules[source as usize].ast.as_js_mut().unwrap().exprs[expr_index].data = full_data;
        }
        _ => {}
      }
    }
  }

  /// What a `require()` of the target evaluates to.
  fn module_require_expr(&mut self, source: u32, target: u32) -> ExprId {
    let wrapper = self.js_ast(target).unwrap().wrapper_ref;
    match self.meta[target as usize].wrap {
      Wrap::Cjs => {
        let target_expr = self.ident(source, wrapper);
        self.call(source, target_expr, Vec::new())
      }
      _ => {
        // (init_x(), __toCommonJS(x_exports))
        let init = self.ident(source, wrapper);
        let init_call = self.call(source, init, Vec::new());
        let exports_ref = self.js_ast(target).unwrap().exports_ref;
        let exports = self.ident(source, exports_ref);
        let to_cjs = self.helper_call(source, "__toCommonJS", vec![exports]);
        self.alloc_expr(
          source,
          Loc(0),
          EData::Binary {
            op: BinOp::Comma,
            left: init_call,
            right: to_cjs,
          },
        )
      }
    }
  }

  /// What a dynamic `import()` of the target evaluates to.
  fn module_namespace_expr(&mut self, source: u32, target: u32) -> ExprId {
    match self.meta[target as usize].wrap {
      Wrap::Cjs => {
        let require = self.module_require_expr(source, target);
        self.helper_call(source, "__toESM", vec![require])
      }
      _ => {
        let wrapper = self.js_ast(target).unwrap().wrapper_ref;
        let init = self.ident(source, wrapper);
        let init_call = self.call(source, init, Vec::new());
        let exports_ref = self.js_ast(target).unwrap().exports_ref;
        let exports = self.ident(source, exports_ref);
        self.alloc_expr(
          source,
          Loc(0),
          EData::Binary {
            op: BinOp::Comma,
            left: init_call,
            right: exports,
          },
        )
      }
    }
  }

  fn pinned_global(&mut self, source: u32, name: &str) -> Ref {
    let table = &mut self.graph.symbols.tables[source as usize];
    let r = Ref::new(source, table.len() as u32);
    let mut symbol = Symbol::new(Atom::new(name), SymbolKind::Unbound);
    symbol.must_not_be_renamed = true;
    table.push(symbol);
    r
  }

  /// Convert one module's live statements into output form.
  fn convert_module(&mut self, source: u32) -> Vec<StmtId> {
    let wrap = self.meta[source as usize].wrap;
    let live_stmts: Vec<StmtId> = {
      let ast = self.js_ast(source).unwrap();
      let meta = &self.meta[source as usize];
      ast
        .parts
        .iter()
        .enumerate()
        .filter(|(i, _)| meta.live_parts[*i])
        .flat_map(|(_, part)| part.stmts.iter().copied())
        .collect()
    };

    let mut body = Vec::new();
    for stmt in live_stmts {
      if let Some(converted) = self.convert_stmt(source, stmt) {
        body.push(converted);
      }
    }

    match wrap {
      Wrap::None => body,
      Wrap::Cjs => {
        // var require_x = __commonJS((exports, module) => { ... });
        let (exports_ref, module_ref, wrapper_ref) = {
          let ast = self.js_ast(source).unwrap();
          (ast.exports_ref, ast.module_ref, ast.wrapper_ref)
        };
        let arrow = self.alloc_expr(
          source,
          Loc(0),
          EData::Arrow {
            args: vec![
              Arg {
                binding: Binding::Ident(exports_ref),
                default: None,
              },
              Arg {
                binding: Binding::Ident(module_ref),
                default: None,
              },
            ],
            has_rest_arg: false,
            prefer_expr: false,
            body,
            is_async: false,
          },
        );
        let wrapper = self.helper_call(source, "__commonJS", vec![arrow]);
        let decl = self.alloc_stmt(
          source,
          Loc(0),
          SData::Local {
            kind: LocalKind::Var,
            decls: vec![Decl {
              binding: Binding::Ident(wrapper_ref),
              init: Some(wrapper),
            }],
            is_export: false,
          },
        );
        vec![decl]
      }
      Wrap::Esm => {
        let (exports_ref, wrapper_ref) = {
          let ast = self.js_ast(source).unwrap();
          (ast.exports_ref, ast.wrapper_ref)
        };
        // Top-level declarations leave the closure so the exports object's
        // getters (and importers in other files) can reach them
        let (hoisted, body) = self.hoist_for_esm_wrapper(source, body);
        let mut out = Vec::new();
        if !hoisted.is_empty() {
          let decls = hoisted
            .into_iter()
            .map(|r| Decl {
              binding: Binding::Ident(r),
              init: None,
            })
            .collect();
          out.push(self.alloc_stmt(
            source,
            Loc(0),
            SData::Local {
              kind: LocalKind::Var,
              decls,
              is_export: false,
            },
          ));
        }
        if self.meta[source as usize].needs_exports_object {
          out.extend(self.exports_object_stmts(source, exports_ref));
        }
        let arrow = self.alloc_expr(
          source,
          Loc(0),
          EData::Arrow {
            args: Vec::new(),
            has_rest_arg: false,
            prefer_expr: false,
            body,
            is_async: false,
          },
        );
        let wrapper = self.helper_call(source, "__esm", vec![arrow]);
        out.push(self.alloc_stmt(
          source,
          Loc(0),
          SData::Local {
            kind: LocalKind::Var,
            decls: vec![Decl {
              binding: Binding::Ident(wrapper_ref),
              init: Some(wrapper),
            }],
            is_export: false,
          },
        ));
        out
      }
    }
  }

  /// Pull top-level declarations out of a wrapped module's initializer,
  /// leaving assignments behind: `let x = 1` becomes module-level `var x`
  /// plus `x = 1` inside the `__esm` closure.
  fn hoist_for_esm_wrapper(&mut self, source: u32, body: Vec<StmtId>) -> (Vec<Ref>, Vec<StmtId>) {
    let mut hoisted = Vec::new();
    let mut out = Vec::new();
    for stmt in body {
      let data = self.js_ast(source).unwrap().stmt(stmt).data.clone();
      let loc = self.js_ast(source).unwrap().stmt(stmt).loc;
      match data {
        SData::Local { decls, .. } => {
          for decl in decls {
            let mut refs = Vec::new();
            crate::js::parser::collect_binding_refs(&decl.binding, &mut refs);
            hoisted.extend(refs);
            if let Some(init) = decl.init {
              let target = self.binding_to_expr(source, &decl.binding);
              let assign = self.alloc_expr(
                source,
                loc,
                EData::Binary {
                  op: BinOp::Assign,
                  left: target,
                  right: init,
                },
              );
              out.push(self.alloc_stmt(source, loc, SData::Expr(assign)));
            }
          }
        }
        SData::Fn { func, .. } => match func.name {
          Some(name) => {
            hoisted.push(name);
            let value = self.alloc_expr(source, loc, EData::Function(func));
            let target = self.ident(source, name);
            let assign = self.alloc_expr(
              source,
              loc,
              EData::Binary {
                op: BinOp::Assign,
                left: target,
                right: value,
              },
            );
            out.push(self.alloc_stmt(source, loc, SData::Expr(assign)));
          }
          None => out.push(stmt),
        },
        SData::Class { class, .. } => match class.name {
          Some(name) => {
            hoisted.push(name);
            let value = self.alloc_expr(source, loc, EData::Class(class));
            let target = self.ident(source, name);
            let assign = self.alloc_expr(
              source,
              loc,
              EData::Binary {
                op: BinOp::Assign,
                left: target,
                right: value,
              },
            );
            out.push(self.alloc_stmt(source, loc, SData::Expr(assign)));
          }
          None => out.push(stmt),
        },
        _ => out.push(stmt),
      }
    }
    (hoisted, out)
  }

  /// A binding pattern as an assignment target expression.
  fn binding_to_expr(&mut self, source: u32, binding: &Binding) -> ExprId {
    match binding {
      Binding::Missing => self.alloc_expr(source, Loc(0), EData::Missing),
      Binding::Ident(r) => self.ident(source, *r),
      Binding::Array { items, has_rest } => {
        let count = items.len();
        let mut out_items = Vec::new();
        for (i, item) in items.iter().enumerate() {
          let mut e = self.binding_to_expr(source, &item.binding);
          if let Some(default) = item.default {
            e = self.alloc_expr(
              source,
              Loc(0),
              EData::Binary {
                op: BinOp::Assign,
                left: e,
                right: default,
              },
            );
          }
          if *has_rest && i == count - 1 {
            e = self.alloc_expr(source, Loc(0), EData::Spread(e));
          }
          out_items.push(e);
        }
        self.alloc_expr(source, Loc(0), EData::Array { items: out_items })
      }
      Binding::Object { props, rest } => {
        let mut out_props = Vec::new();
        for prop in props {
          let mut value = self.binding_to_expr(source, &prop.binding);
          if let Some(default) = prop.default {
            value = self.alloc_expr(
              source,
              Loc(0),
              EData::Binary {
                op: BinOp::Assign,
                left: value,
                right: default,
              },
            );
          }
          out_props.push(Prop {
            kind: PropKind::Normal,
            is_computed: prop.is_computed,
            is_shorthand: false,
            key: prop.key,
            value,
          });
        }
        if let Some(rest) = rest {
          let value = self.binding_to_expr(source, rest);
          out_props.push(Prop {
            kind: PropKind::Spread,
            is_computed: false,
            is_shorthand: false,
            key: value,
            value,
          });
        }
        self.alloc_expr(source, Loc(0), EData::Object { props: out_props })
      }
    }
  }

  /// `var x_exports = {}; __export(x_exports, { a: () => a, ... });`
  fn exports_object_stmts(&mut self, source: u32, exports_ref: Ref) -> Vec<StmtId> {
    let empty = self.alloc_expr(source, Loc(0), EData::Object { props: Vec::new() });
    let decl = self.alloc_stmt(
      source,
      Loc(0),
      SData::Local {
        kind: LocalKind::Var,
        decls: vec![Decl {
          binding: Binding::Ident(exports_ref),
          init: Some(empty),
        }],
        is_export: false,
      },
    );

    let exports: Vec<(Atom, Ref)> = self.meta[source as usize]
      .resolved_exports
      .iter()
      .map(|(name, export)| (*name, export.target))
      .collect();
    let mut props = Vec::new();
    for (name, target) in exports {
      let key = self.alloc_expr(source, Loc(0), EData::String(name));
      let value_ident = self.ident(source, target);
      let ret = self.alloc_stmt(source, Loc(0), SData::Return(Some(value_ident)));
      let getter = self.alloc_expr(
        source,
        Loc(0),
        EData::Arrow {
          args: Vec::new(),
          has_rest_arg: false,
          prefer_expr: true,
          body: vec![ret],
          is_async: false,
        },
      );
      props.push(Prop {
        kind: PropKind::Normal,
        is_computed: false,
        is_shorthand: false,
        key,
        value: getter,
      });
    }
    let map = self.alloc_expr(source, Loc(0), EData::Object { props });
    let exports_ident = self.ident(source, exports_ref);
    let call = self.helper_call(source, "__export", vec![exports_ident, map]);
    let call_stmt = self.alloc_stmt(source, Loc(0), SData::Expr(call));
    vec![decl, call_stmt]
  }

  fn convert_stmt(&mut self, source: u32, stmt: StmtId) -> Option<StmtId> {
    let data = self.js_ast(source).unwrap().stmt(stmt).data.clone();
    let loc = self.js_ast(source).unwrap().stmt(stmt).loc;
    match data {
      SData::Directive(_) => None,
      SData::Import {
        record,
        namespace_ref,
        default_ref,
        items,
        is_star,
      } => {
        let (target, external, kind) = {
          let rec = &self.js_ast(source).unwrap().import_records[record as usize];
          (rec.source_index, rec.is_external, rec.kind)
        };
        let _ = kind;
        let has_bindings = default_ref.is_some() || is_star || !items.is_empty();
        if external || target.is_none() {
          return self.convert_external_import(source, stmt, record, namespace_ref, default_ref, &items, is_star);
        }
        let target = target.unwrap();
        if self.js_ast(target).is_none() {
          // CSS import: handled by the css chunk
          return None;
        }
        match self.meta[target as usize].wrap {
          Wrap::Cjs => {
            // var import_x = __toESM(require_x());
            let require = self.module_require_expr(source, target);
            if !has_bindings {
              return Some(self.alloc_stmt(source, loc, SData::Expr(require)));
            }
            let interop = self.helper_call(source, "__toESM", vec![require]);
            Some(self.alloc_stmt(
              source,
              loc,
              SData::Local {
                kind: LocalKind::Var,
                decls: vec![Decl {
                  binding: Binding::Ident(namespace_ref),
                  init: Some(interop),
                }],
                is_export: false,
              },
            ))
          }
          Wrap::Esm => {
            let wrapper = self.js_ast(target).unwrap().wrapper_ref;
            let init = self.ident(source, wrapper);
            let call = self.call(source, init, Vec::new());
            Some(self.alloc_stmt(source, loc, SData::Expr(call)))
          }
          Wrap::None => None,
        }
      }
      SData::ExportNamed { .. } => None,
      SData::ExportStar { record, alias } => {
        let target = {
          let rec = &self.js_ast(source).unwrap().import_records[record as usize];
          if rec.is_external {
            None
          } else {
            rec.source_index
          }
        };
        let _ = alias;
        match target {
          Some(target) if self.meta[target as usize].wrap != Wrap::None => {
            let wrapper = self.js_ast(target).unwrap().wrapper_ref;
            let init = self.ident(source, wrapper);
            let call = self.call(source, init, Vec::new());
            Some(self.alloc_stmt(source, loc, SData::Expr(call)))
          }
          _ => None,
        }
      }
      SData::ExportDefault { default_ref, value } => match value {
        DefaultValue::Expr(e) => Some(self.alloc_stmt(
          source,
          loc,
          SData::Local {
            kind: LocalKind::Var,
            decls: vec![Decl {
              binding: Binding::Ident(default_ref),
              init: Some(e),
            }],
            is_export: false,
          },
        )),
        DefaultValue::Fn(mut func) => {
          match func.name {
            Some(name) => {
              self.graph.symbols.merge(default_ref, name);
            }
            None => func.name = Some(default_ref),
          }
          Some(self.alloc_stmt(source, loc, SData::Fn { func, is_export: false }))
        }
        DefaultValue::Class(mut class) => {
          match class.name {
            Some(name) => {
              self.graph.symbols.merge(default_ref, name);
            }
            None => class.name = Some(default_ref),
          }
          Some(self.alloc_stmt(source, loc, SData::Class { class, is_export: false }))
        }
      },
      SData::Local { is_export: true, kind, decls } => Some(self.alloc_stmt(
        source,
        loc,
        SData::Local {
          kind,
          decls,
          is_export: false,
        },
      )),
      SData::Fn { func, is_export: true } => {
        Some(self.alloc_stmt(source, loc, SData::Fn { func, is_export: false }))
      }
      SData::Class { class, is_export: true } => {
        Some(self.alloc_stmt(source, loc, SData::Class { class, is_export: false }))
      }
      _ => Some(stmt),
    }
  }

  /// External imports survive in esm output, become `require` interop in
  /// cjs output, and are an error in iife output.
  fn convert_external_import(
    &mut self,
    source: u32,
    stmt: StmtId,
    record: u32,
    namespace_ref: Ref,
    default_ref: Option<Ref>,
    items: &[ClauseItem],
    is_star: bool,
  ) -> Option<StmtId> {
    let loc = self.js_ast(source).unwrap().stmt(stmt).loc;
    match self.compiled.format {
      Format::Esm => Some(stmt),
      Format::Cjs => {
        // Bindings route through an interop namespace object
        let has_bindings = default_ref.is_some() || is_star || !items.is_empty();
        let require = self.alloc_expr(source, loc, EData::Require { record });
        if !has_bindings {
          return Some(self.alloc_stmt(source, loc, SData::Expr(require)));
        }
        let interop = self.helper_call(source, "__toESM", vec![require]);
        if let Some(d) = default_ref {
          self.graph.symbols.get_mut(d).namespace_alias = Some(NamespaceAlias {
            namespace_ref,
            alias: Atom::new("default"),
          });
        }
        for item in items {
          self.graph.symbols.get_mut(item.name_ref).namespace_alias = Some(NamespaceAlias {
            namespace_ref,
            alias: item.alias,
          });
        }
        Some(self.alloc_stmt(
          source,
          loc,
          SData::Local {
            kind: LocalKind::Var,
            decls: vec![Decl {
              binding: Binding::Ident(namespace_ref),
              init: Some(interop),
            }],
            is_export: false,
          },
        ))
      }
      Format::Iife => {
        let range = self.js_ast(source).unwrap().import_records[record as usize].range;
        let module = &self.graph.modules[source as usize];
        self.log.add_error(
          Some(&module.source),
          range,
          "External imports are not supported with the \"iife\" output format".to_string(),
        );
        None
      }
    }
  }

  // ------------------------------------------------------------------
  // Entry trailers and cross-chunk wiring
  // ------------------------------------------------------------------

  fn entry_trailer(&mut self, entry: u32) -> Vec<StmtId> {
    let wrap = self.meta[entry as usize].wrap;
    let format = self.compiled.format;
    let mut out = Vec::new();

    if wrap == Wrap::Cjs {
      // The wrapped entry is invoked at the end of the bundle
      let wrapper = self.js_ast(entry).unwrap().wrapper_ref;
      let target = self.ident(entry, wrapper);
      let call = self.call(entry, target, Vec::new());
      match format {
        Format::Esm => {
          let default_ref = self.pinned_default_ref(entry);
          out.push(self.alloc_stmt(
            entry,
            Loc(0),
            SData::ExportDefault {
              default_ref,
              value: DefaultValue::Expr(call),
            },
          ));
        }
        Format::Cjs => {
          let module_ref = self.js_ast(entry).unwrap().module_ref;
          self.graph.symbols.get_mut(module_ref).must_not_be_renamed = true;
          let module_ident = self.ident(entry, module_ref);
          let lhs = self.alloc_expr(
            entry,
            Loc(0),
            EData::Dot {
              target: module_ident,
              name: Atom::new("exports"),
              optional: false,
            },
          );
          let assign = self.alloc_expr(
            entry,
            Loc(0),
            EData::Binary {
              op: BinOp::Assign,
              left: lhs,
              right: call,
            },
          );
          out.push(self.alloc_stmt(entry, Loc(0), SData::Expr(assign)));
        }
        Format::Iife => {
          if self.options.global_name.is_some() {
            out.push(self.alloc_stmt(entry, Loc(0), SData::Return(Some(call))));
          } else {
            out.push(self.alloc_stmt(entry, Loc(0), SData::Expr(call)));
          }
        }
      }
      return out;
    }

    if wrap == Wrap::Esm {
      // Initialize, then hand out the exports object
      let wrapper = self.js_ast(entry).unwrap().wrapper_ref;
      let init = self.ident(entry, wrapper);
      let call = self.call(entry, init, Vec::new());
      out.push(self.alloc_stmt(entry, Loc(0), SData::Expr(call)));
    }

    let exports: Vec<(Atom, Ref)> = self.meta[entry as usize]
      .resolved_exports
      .iter()
      .map(|(name, export)| (*name, export.target))
      .collect();
    if exports.is_empty() {
      return out;
    }

    match format {
      Format::Esm => {
        let items: Vec<ClauseItem> = exports
          .iter()
          .map(|(name, target)| ClauseItem {
            alias: *name,
            alias_loc: Loc(0),
            name_ref: *target,
          })
          .collect();
        out.push(self.alloc_stmt(entry, Loc(0), SData::ExportNamed { items, record: None }));
      }
      Format::Cjs => {
        // __export(exports, { a: () => a, ... });
        let exports_ref = self.js_ast(entry).unwrap().exports_ref;
        self.graph.symbols.get_mut(exports_ref).must_not_be_renamed = true;
        let stmts = self.export_call_stmts(entry, exports_ref, &exports);
        out.extend(stmts);
      }
      Format::Iife => {
        if self.options.global_name.is_some() {
          // Build an exports object and return it from the IIFE
          let exports_ref = self.js_ast(entry).unwrap().exports_ref;
          {
            let module = &self.graph.modules[entry as usize];
            let stem = module_stem(&module.source);
            self.graph.symbols.get_mut(exports_ref).original_name =
              Atom::new(&format!("{}_exports", stem));
          }
          out.extend(self.exports_object_stmts_for(entry, exports_ref, &exports));
          let exports_ident = self.ident(entry, exports_ref);
          out.push(self.alloc_stmt(entry, Loc(0), SData::Return(Some(exports_ident))));
        }
      }
    }
    out
  }

  fn export_call_stmts(&mut self, source: u32, exports_ref: Ref, exports: &[(Atom, Ref)]) -> Vec<StmtId> {
    let mut props = Vec::new();
    for (name, target) in exports {
      let key = self.alloc_expr(source, Loc(0), EData::String(*name));
      let value_ident = self.ident(source, *target);
      let ret = self.alloc_stmt(source, Loc(0), SData::Return(Some(value_ident)));
      let getter = self.alloc_expr(
        source,
        Loc(0),
        EData::Arrow {
          args: Vec::new(),
          has_rest_arg: false,
          prefer_expr: true,
          body: vec![ret],
          is_async: false,
        },
      );
      props.push(Prop {
        kind: PropKind::Normal,
        is_computed: false,
        is_shorthand: false,
        key,
        value: getter,
      });
    }
    let map = self.alloc_expr(source, Loc(0), EData::Object { props });
    let exports_ident = self.ident(source, exports_ref);
    let call = self.helper_call(source, "__export", vec![exports_ident, map]);
    vec![self.alloc_stmt(source, Loc(0), SData::Expr(call))]
  }

  fn exports_object_stmts_for(&mut self, source: u32, exports_ref: Ref, exports: &[(Atom, Ref)]) -> Vec<StmtId> {
    let empty = self.alloc_expr(source, Loc(0), EData::Object { props: Vec::new() });
    let decl = self.alloc_stmt(
      source,
      Loc(0),
      SData::Local {
        kind: LocalKind::Var,
        decls: vec![Decl {
          binding: Binding::Ident(exports_ref),
          init: Some(empty),
        }],
        is_export: false,
      },
    );
    let mut out = vec![decl];
    out.extend(self.export_call_stmts(source, exports_ref, exports));
    out
  }

  fn pinned_default_ref(&mut self, source: u32) -> Ref {
    let table = &mut self.graph.symbols.tables[source as usize];
    let r = Ref::new(source, table.len() as u32);
    table.push(Symbol::new(Atom::new("entry_default"), SymbolKind::Synthetic));
    r
  }

  fn dynamic_entry_trailer(&mut self, entry: u32) -> Vec<StmtId> {
    // Dynamic-entry chunks re-export the target module's bindings
    let exports: Vec<(Atom, Ref)> = self.meta[entry as usize]
      .resolved_exports
      .iter()
      .map(|(name, export)| (*name, export.target))
      .collect();
    if exports.is_empty() {
      return Vec::new();
    }
    let items: Vec<ClauseItem> = exports
      .iter()
      .map(|(name, target)| ClauseItem {
        alias: *name,
        alias_loc: Loc(0),
        name_ref: *target,
      })
      .collect();
    vec![self.alloc_stmt(entry, Loc(0), SData::ExportNamed { items, record: None })]
  }

  /// Imports this chunk needs from other chunks.
  fn cross_chunk_headers(&mut self, chunk_index: usize, chunks: &[Chunk]) -> Vec<(u32, Vec<StmtId>)> {
    let mut needed: IndexMap<usize, Vec<Ref>> = IndexMap::new();
    let files = chunks[chunk_index].files_in_order.clone();
    for &file in &files {
      let uses: Vec<Ref> = {
        let ast = self.js_ast(file).unwrap();
        let meta = &self.meta[file as usize];
        ast
          .parts
          .iter()
          .enumerate()
          .filter(|(i, _)| meta.live_parts[*i])
          .flat_map(|(_, part)| part.symbol_uses.keys().copied())
          .collect()
      };
      for use_ref in uses {
        let root = self.graph.symbols.follow(use_ref);
        if let Some(&home_chunk) = self.chunk_of_file.get(&root.source) {
          if home_chunk != chunk_index {
            let list = needed.entry(home_chunk).or_default();
            if !list.contains(&root) {
              list.push(root);
            }
          }
        }
      }
    }
    if needed.is_empty() {
      return Vec::new();
    }
    let home = files.first().copied().unwrap_or(0);
    let mut stmts = Vec::new();
    let mut from_chunks: Vec<(usize, Vec<Ref>)> = needed.into_iter().collect();
    from_chunks.sort_by_key(|(chunk, _)| *chunk);
    for (from_chunk, mut refs) in from_chunks {
      refs.sort();
      let record = {
        let ast = self.graph.modules[home as usize].ast.as_js_mut().unwrap();
        let index = ast.import_records.len() as u32;
        ast.import_records.push(crate::graph::ImportRecord {
          kind: ImportKind::Stmt,
          specifier: Atom::new(&format!("bindle:chunk:{}", from_chunk)),
          range: Range::default(),
          source_index: None,
          is_external: true,
          is_internal: true,
        });
        index
      };
      let items: Vec<ClauseItem> = refs
        .iter()
        .map(|&r| ClauseItem {
          // The alias is the final output name so both sides of the chunk
          // boundary agree
          alias: self.final_name(r),
          alias_loc: Loc(0),
          name_ref: r,
        })
        .collect();
      let namespace_ref = self.pinned_global(home, "ns");
      stmts.push(self.alloc_stmt(
        home,
        Loc(0),
        SData::Import {
          record,
          namespace_ref,
          default_ref: None,
          items,
          is_star: false,
        },
      ));
    }
    vec![(home, stmts)]
  }

  /// Exports this chunk provides to other chunks.
  fn cross_chunk_exports(&mut self, chunk_index: usize, chunks: &[Chunk]) -> Vec<StmtId> {
    let mut exported: Vec<Ref> = Vec::new();
    for (other_index, other) in chunks.iter().enumerate() {
      if other_index == chunk_index || other.kind != ChunkKind::Js {
        continue;
      }
      for &file in &other.files_in_order {
        let uses: Vec<Ref> = {
          let ast = match self.js_ast(file) {
            Some(ast) => ast,
            None => continue,
          };
          let meta = &self.meta[file as usize];
          ast
            .parts
            .iter()
            .enumerate()
            .filter(|(i, _)| meta.live_parts[*i])
            .flat_map(|(_, part)| part.symbol_uses.keys().copied())
            .collect()
        };
        for use_ref in uses {
          let root = self.graph.symbols.follow(use_ref);
          if self.chunk_of_file.get(&root.source) == Some(&chunk_index) && !exported.contains(&root) {
            exported.push(root);
          }
        }
      }
    }
    if exported.is_empty() {
      return Vec::new();
    }
    exported.sort();
    let home = chunks[chunk_index].files_in_order.first().copied().unwrap_or(0);
    let items: Vec<ClauseItem> = exported
      .iter()
      .map(|&r| ClauseItem {
        alias: self.final_name(r),
        alias_loc: Loc(0),
        name_ref: r,
      })
      .collect();
    vec![self.alloc_stmt(home, Loc(0), SData::ExportNamed { items, record: None })]
  }
}

/// Per-chunk access for the printer and bundler.
impl Chunk {
  pub fn output_extension(&self) -> &'static str {
    match self.kind {
      ChunkKind::Js => "js",
      ChunkKind::Css => "css",
    }
  }
}

