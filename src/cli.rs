use crate::bundler;
use crate::error::Result;
use crate::logger::{Message, MsgKind};
use crate::options::{BuildOptions, EntryPoint, Format, JsxMode, Loader, Platform, SourceMapMode};
use crate::profiler::Profiler;
use clap::Parser;
use colored::Colorize;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(name = "bindle")]
#[command(about = "Bindle - Fast bundler and minifier for JavaScript, TypeScript, JSX, and CSS", long_about = None)]
#[command(version)]
struct Cli {
  /// Entry points (`src/app.ts` or `name=src/app.ts`)
  #[arg(required = true)]
  entry_points: Vec<String>,

  /// Bundle all dependencies into the output
  #[arg(long)]
  bundle: bool,

  /// Output file (single entry point only)
  #[arg(long)]
  outfile: Option<PathBuf>,

  /// Output directory
  #[arg(long)]
  outdir: Option<PathBuf>,

  /// Base directory for computing output paths
  #[arg(long)]
  outbase: Option<PathBuf>,

  /// Output format: iife, cjs, or esm
  #[arg(long)]
  format: Option<String>,

  /// Platform: browser, node, or neutral
  #[arg(long, default_value = "browser")]
  platform: String,

  /// Language target (e.g. es2017, chrome58, node12). Repeatable
  #[arg(long)]
  target: Vec<String>,

  /// Enable all minification
  #[arg(long)]
  minify: bool,

  /// Minify whitespace only
  #[arg(long)]
  minify_whitespace: bool,

  /// Minify identifiers only
  #[arg(long)]
  minify_identifiers: bool,

  /// Minify syntax only
  #[arg(long)]
  minify_syntax: bool,

  /// Source map mode: inline, external, linked, or both
  #[arg(long, num_args = 0..=1, default_missing_value = "linked")]
  sourcemap: Option<String>,

  /// Substitute an expression for a global (`--define:K=V`). Repeatable
  #[arg(long = "define", value_name = "K=V")]
  define: Vec<String>,

  /// Treat a function as side-effect free. Repeatable
  #[arg(long = "pure", value_name = "NAME")]
  pure: Vec<String>,

  /// Exclude a module from the bundle. Repeatable
  #[arg(long = "external", value_name = "MODULE")]
  external: Vec<String>,

  /// Loader for an extension (`--loader:.ext=loader`). Repeatable
  #[arg(long = "loader", value_name = ".EXT=LOADER")]
  loader: Vec<String>,

  /// Enable code splitting (requires --format=esm)
  #[arg(long)]
  splitting: bool,

  /// JSX factory function
  #[arg(long)]
  jsx_factory: Option<String>,

  /// JSX fragment expression
  #[arg(long)]
  jsx_fragment: Option<String>,

  /// JSX mode: transform or automatic
  #[arg(long)]
  jsx: Option<String>,

  /// Import source for the automatic JSX runtime
  #[arg(long)]
  jsx_import_source: Option<String>,

  /// Global name for the iife format
  #[arg(long)]
  global_name: Option<String>,

  /// Write a JSON description of the build graph to this file
  #[arg(long)]
  metafile: Option<PathBuf>,

  /// Path to tsconfig.json
  #[arg(long)]
  tsconfig: Option<PathBuf>,

  /// Public path prefix for file-loader URLs
  #[arg(long)]
  public_path: Option<String>,

  /// Entry output name template
  #[arg(long)]
  entry_names: Option<String>,

  /// Chunk output name template
  #[arg(long)]
  chunk_names: Option<String>,

  /// Asset output name template
  #[arg(long)]
  asset_names: Option<String>,

  /// Disable tree shaking
  #[arg(long)]
  no_tree_shaking: bool,

  /// Enable debug logging
  #[arg(short, long, global = true)]
  debug: bool,

  /// Enable performance profiling (also: BINDLE_PROFILE=1)
  #[arg(long)]
  profile: bool,
}

/// Returns Ok(true) when the build failed with user errors.
pub fn run() -> Result<bool> {
  let cli = Cli::parse();

  let log_level = if cli.debug { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bindle={}", log_level).into()),
    )
    .without_time()
    .with_target(false)
    .init();

  let enable_profiling = cli.profile || std::env::var("BINDLE_PROFILE").is_ok();
  let profiler = Profiler::new(enable_profiling);

  let options = match build_options_from_cli(&cli) {
    Ok(options) => options,
    Err(message) => {
      eprintln!("{} {}", "✘".red().bold(), message);
      return Ok(true);
    }
  };

  debug!("Building {} entry point(s)", options.entry_points.len());
  let log = crate::logger::Log::new(options.error_limit);
  let result = bundler::build_with(&options, &log, &profiler)?;

  for warning in &result.warnings {
    print_message(warning);
  }
  for error in &result.errors {
    print_message(error);
  }

  if let (Some(metafile_path), Some(metafile)) = (&cli.metafile, &result.metafile) {
    std::fs::write(metafile_path, metafile)?;
  }

  profiler.print_report();

  if result.errors.is_empty() {
    if options.outdir.is_none() && options.outfile.is_none() {
      // No output destination: print to stdout like a filter
      for file in &result.output_files {
        print!("{}", String::from_utf8_lossy(&file.contents));
      }
    } else {
      let summary = format!(
        "{} file{} written",
        result.output_files.len(),
        if result.output_files.len() == 1 { "" } else { "s" }
      );
      eprintln!("{} {}", "✔".green(), summary);
    }
    Ok(false)
  } else {
    eprintln!(
      "\n{} {} error{}",
      "✘".red().bold(),
      result.errors.len(),
      if result.errors.len() == 1 { "" } else { "s" }
    );
    Ok(true)
  }
}

fn build_options_from_cli(cli: &Cli) -> std::result::Result<BuildOptions, String> {
  let mut options = BuildOptions::default();

  for entry in &cli.entry_points {
    match entry.split_once('=') {
      Some((name, path)) if !name.contains('/') && !name.contains('.') => {
        options.entry_points.push(EntryPoint::named(name, path));
      }
      _ => options.entry_points.push(EntryPoint::new(entry.clone())),
    }
  }

  options.bundle = cli.bundle;
  options.outfile = cli.outfile.clone();
  options.outdir = cli.outdir.clone();
  options.outbase = cli.outbase.clone();
  options.target = cli.target.clone();
  options.splitting = cli.splitting;
  options.external = cli.external.clone();
  options.global_name = cli.global_name.clone();
  options.metafile = cli.metafile.is_some();
  options.tsconfig = cli.tsconfig.clone();
  options.tree_shaking = if cli.no_tree_shaking { Some(false) } else { None };

  options.format = match cli.format.as_deref() {
    None => None,
    Some("iife") => Some(Format::Iife),
    Some("cjs") => Some(Format::Cjs),
    Some("esm") => Some(Format::Esm),
    Some(other) => return Err(format!("Invalid output format: {:?}", other)),
  };

  options.platform = match cli.platform.as_str() {
    "browser" => Platform::Browser,
    "node" => Platform::Node,
    "neutral" => Platform::Neutral,
    other => return Err(format!("Invalid platform: {:?}", other)),
  };

  if cli.minify {
    options.minify(true);
  }
  options.minify_whitespace |= cli.minify_whitespace;
  options.minify_identifiers |= cli.minify_identifiers;
  options.minify_syntax |= cli.minify_syntax;

  options.sourcemap = match cli.sourcemap.as_deref() {
    None => SourceMapMode::None,
    Some("inline") => SourceMapMode::Inline,
    Some("external") => SourceMapMode::External,
    Some("linked") => SourceMapMode::Linked,
    Some("both") => SourceMapMode::Both,
    Some(other) => return Err(format!("Invalid source map mode: {:?}", other)),
  };

  let mut define = IndexMap::new();
  for pair in &cli.define {
    match pair.split_once('=') {
      Some((key, value)) => {
        define.insert(key.to_string(), value.to_string());
      }
      None => return Err(format!("Invalid define (expected K=V): {:?}", pair)),
    }
  }
  options.define = define;
  options.pure = cli.pure.clone();

  let mut loaders = FxHashMap::default();
  for pair in &cli.loader {
    let (ext, name) = pair
      .split_once('=')
      .ok_or_else(|| format!("Invalid loader (expected .ext=loader): {:?}", pair))?;
    let ext = ext.trim_start_matches('.');
    let loader = Loader::from_name(name).ok_or_else(|| format!("Invalid loader name: {:?}", name))?;
    loaders.insert(ext.to_string(), loader);
  }
  options.loaders = loaders;

  if let Some(jsx) = &cli.jsx {
    options.jsx = match jsx.as_str() {
      "transform" => JsxMode::Transform,
      "automatic" => JsxMode::Automatic,
      other => return Err(format!("Invalid jsx mode: {:?} (expected transform or automatic)", other)),
    };
  }
  if let Some(factory) = &cli.jsx_factory {
    options.jsx_factory = factory.clone();
  }
  if let Some(fragment) = &cli.jsx_fragment {
    options.jsx_fragment = fragment.clone();
  }
  if let Some(import_source) = &cli.jsx_import_source {
    options.jsx_import_source = import_source.clone();
  }
  if let Some(public_path) = &cli.public_path {
    options.public_path = public_path.clone();
  }
  if let Some(entry_names) = &cli.entry_names {
    options.entry_names = entry_names.clone();
  }
  if let Some(chunk_names) = &cli.chunk_names {
    options.chunk_names = chunk_names.clone();
  }
  if let Some(asset_names) = &cli.asset_names {
    options.asset_names = asset_names.clone();
  }

  Ok(options)
}

/// Pretty-print one diagnostic with file:line:column and caret context.
fn print_message(msg: &Message) {
  let label = match msg.kind {
    MsgKind::Error => "error".red().bold(),
    MsgKind::Warning => "warning".yellow().bold(),
  };
  match &msg.location {
    Some(loc) => {
      eprintln!("{}: {}: {}", format!("{}:{}:{}", loc.file, loc.line, loc.column).bold(), label, msg.text);
      eprintln!("    {}", loc.line_text);
      let caret = " ".repeat(loc.column) + &"~".repeat(loc.length.max(1)).chars().take(40).collect::<String>();
      eprintln!("    {}", caret.green());
    }
    None => eprintln!("{}: {}", label, msg.text),
  }
  for note in &msg.notes {
    eprintln!("  note: {}", note.text);
  }
}
