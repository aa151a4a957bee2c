use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Pipeline phase profiler with zero cost when disabled.
pub struct Profiler {
  enabled: bool,
  stats: ProfileStats,
}

#[derive(Default)]
pub struct ProfileStats {
  // Parse
  pub files_parsed: AtomicUsize,
  pub parse_time_ns: AtomicU64,

  // Link
  pub link_time_ns: AtomicU64,

  // Print
  pub chunks_printed: AtomicUsize,
  pub print_time_ns: AtomicU64,

  // Source maps
  pub source_map_time_ns: AtomicU64,
}

impl Profiler {
  pub fn new(enabled: bool) -> Profiler {
    Profiler {
      enabled,
      stats: ProfileStats::default(),
    }
  }

  #[inline(always)]
  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  #[inline]
  pub fn record_parse(&self, duration_ns: u64) {
    if !self.enabled {
      return;
    }
    self.stats.files_parsed.fetch_add(1, Ordering::Relaxed);
    self.stats.parse_time_ns.fetch_add(duration_ns, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_link(&self, duration_ns: u64) {
    if !self.enabled {
      return;
    }
    self.stats.link_time_ns.fetch_add(duration_ns, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_print(&self, duration_ns: u64) {
    if !self.enabled {
      return;
    }
    self.stats.chunks_printed.fetch_add(1, Ordering::Relaxed);
    self.stats.print_time_ns.fetch_add(duration_ns, Ordering::Relaxed);
  }

  #[inline]
  pub fn record_source_map(&self, duration_ns: u64) {
    if !self.enabled {
      return;
    }
    self
      .stats
      .source_map_time_ns
      .fetch_add(duration_ns, Ordering::Relaxed);
  }

  /// Print the report to stderr. No-op when disabled.
  pub fn print_report(&self) {
    if !self.enabled {
      return;
    }
    let files = self.stats.files_parsed.load(Ordering::Relaxed);
    let parse_ms = self.stats.parse_time_ns.load(Ordering::Relaxed) as f64 / 1_000_000.0;
    let link_ms = self.stats.link_time_ns.load(Ordering::Relaxed) as f64 / 1_000_000.0;
    let chunks = self.stats.chunks_printed.load(Ordering::Relaxed);
    let print_ms = self.stats.print_time_ns.load(Ordering::Relaxed) as f64 / 1_000_000.0;
    let map_ms = self.stats.source_map_time_ns.load(Ordering::Relaxed) as f64 / 1_000_000.0;

    eprintln!("Performance Report");
    eprintln!("==================");
    eprintln!("Parse:      {} files, {:.2}ms (cumulative across workers)", files, parse_ms);
    eprintln!("Link:       {:.2}ms", link_ms);
    eprintln!("Print:      {} chunks, {:.2}ms", chunks, print_ms);
    eprintln!("Source map: {:.2}ms", map_ms);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_disabled_profiler_records_nothing() {
    let profiler = Profiler::new(false);
    profiler.record_parse(1000);
    profiler.record_link(1000);
    assert_eq!(profiler.stats.files_parsed.load(Ordering::Relaxed), 0);
    assert_eq!(profiler.stats.link_time_ns.load(Ordering::Relaxed), 0);
  }

  #[test]
  fn test_enabled_profiler_accumulates() {
    let profiler = Profiler::new(true);
    profiler.record_parse(1000);
    profiler.record_parse(500);
    assert_eq!(profiler.stats.files_parsed.load(Ordering::Relaxed), 2);
    assert_eq!(profiler.stats.parse_time_ns.load(Ordering::Relaxed), 1500);
  }
}
