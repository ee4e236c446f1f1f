//! Per-generation statistics
//!
//! Computed on the host from the two halves of the double buffer: after a
//! step the previous generation is still intact next to the current one,
//! so births and deaths fall out of a single pass over both.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};

use crate::grid::LIVING_CELL;

/// Configuration for metrics collection
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled
    pub enabled: bool,
    /// Interval (in steps) between samples
    pub interval: u64,
    /// Path to CSV output file (None = log only)
    pub output_path: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: 1,
            output_path: None,
        }
    }
}

/// Statistics for a single generation
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationStats {
    pub step: u64,
    pub population: usize,
    /// Dead in the previous generation, living now
    pub births: usize,
    /// Living in the previous generation, dead now
    pub deaths: usize,
    pub total_cells: usize,
    /// Wall time of the `advance()` call that produced this generation
    pub step_micros: u64,
}

impl GenerationStats {
    pub fn compute(step: u64, previous: &[u8], current: &[u8], step_micros: u64) -> Self {
        debug_assert_eq!(previous.len(), current.len());
        let mut population = 0;
        let mut births = 0;
        let mut deaths = 0;
        for (&before, &after) in previous.iter().zip(current) {
            let was = before == LIVING_CELL;
            let is = after == LIVING_CELL;
            population += is as usize;
            births += (!was && is) as usize;
            deaths += (was && !is) as usize;
        }
        Self {
            step,
            population,
            births,
            deaths,
            total_cells: current.len(),
            step_micros,
        }
    }

    /// Format as CSV row
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{:.4},{}",
            self.step,
            self.population,
            self.births,
            self.deaths,
            self.density(),
            self.step_micros,
        )
    }

    /// CSV header
    pub fn csv_header() -> &'static str {
        "step,population,births,deaths,density,step_micros"
    }

    /// Fraction of cells that are alive
    pub fn density(&self) -> f64 {
        if self.total_cells == 0 {
            0.0
        } else {
            self.population as f64 / self.total_cells as f64
        }
    }

    /// No cell changed state in this generation
    pub fn is_still(&self) -> bool {
        self.births == 0 && self.deaths == 0
    }
}

/// Collects samples and writes them to CSV / the log
pub struct MetricsTracker {
    config: MetricsConfig,
    csv_writer: Option<BufWriter<File>>,
    // Running aggregates; nothing per-sample is retained
    samples: u64,
    peak_population: usize,
    total_micros: u64,
    /// First sampled step at which nothing changed
    still_since: Option<u64>,
    extinct_at: Option<u64>,
}

impl MetricsTracker {
    pub fn new(config: MetricsConfig) -> std::io::Result<Self> {
        let csv_writer = if let Some(ref path) = config.output_path {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?;
            let mut writer = BufWriter::new(file);
            writeln!(writer, "{}", GenerationStats::csv_header())?;
            Some(writer)
        } else {
            None
        };

        Ok(Self {
            config,
            csv_writer,
            samples: 0,
            peak_population: 0,
            total_micros: 0,
            still_since: None,
            extinct_at: None,
        })
    }

    /// Check if we should collect metrics this step
    pub fn should_collect(&self, step: u64) -> bool {
        self.config.enabled && step % self.config.interval.max(1) == 0
    }

    pub fn collect(&mut self, step: u64, previous: &[u8], current: &[u8], step_micros: u64) -> GenerationStats {
        let stats = GenerationStats::compute(step, previous, current, step_micros);

        if stats.is_still() {
            self.still_since.get_or_insert(step);
        } else {
            self.still_since = None;
        }
        if stats.population == 0 && self.extinct_at.is_none() {
            self.extinct_at = Some(step);
            log::info!("Population extinct at step {}", step);
        }

        log::debug!(
            "step {}: population={} births={} deaths={} ({} us)",
            stats.step,
            stats.population,
            stats.births,
            stats.deaths,
            stats.step_micros
        );

        if let Some(ref mut writer) = self.csv_writer {
            if let Err(e) = writeln!(writer, "{}", stats.to_csv_row()) {
                log::warn!("Failed to write metrics row: {}", e);
            }
        }

        self.samples += 1;
        self.peak_population = self.peak_population.max(stats.population);
        self.total_micros += stats.step_micros;
        stats
    }

    /// Number of generations sampled so far
    pub fn samples(&self) -> u64 {
        self.samples
    }

    pub fn peak_population(&self) -> usize {
        self.peak_population
    }

    /// Mean `advance()` wall time over the sampled steps
    pub fn mean_step_micros(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_micros as f64 / self.samples as f64
        }
    }

    /// Step since which every sample has been unchanged, if any
    pub fn still_since(&self) -> Option<u64> {
        self.still_since
    }

    pub fn extinct_at(&self) -> Option<u64> {
        self.extinct_at
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut writer) = self.csv_writer {
            writer.flush()?;
        }
        Ok(())
    }

    pub fn print_summary(&self) {
        if self.samples == 0 {
            return;
        }

        println!("\nMetrics summary:");
        println!("  Samples: {}", self.samples());
        println!("  Peak population: {}", self.peak_population());
        println!("  Mean step time: {:.1} us", self.mean_step_micros());
        if let Some(step) = self.extinct_at() {
            println!("  Extinct at step {}", step);
        } else if let Some(step) = self.still_since() {
            println!("  Still life since step {}", step);
        }
    }
}

impl Drop for MetricsTracker {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
