//! Progress reporting and run summaries for the CLI

use std::path::{Path, PathBuf};
use std::time::Instant;

use geolink_core::{LinkageOutput, RunObserver, Stage};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Progress bars driven by the engine's stage events
pub struct ProgressObserver {
    _multi: MultiProgress,
    main_bar: ProgressBar,
    stats_bar: ProgressBar,
    start_time: Instant,
    stages_done: usize,
}

impl ProgressObserver {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let main_bar = multi.add(ProgressBar::new(0));
        let stats_bar = multi.add(ProgressBar::new(0));
        Self::with_bars(multi, main_bar, stats_bar)
    }

    /// Observer that draws nothing, for `--json` runs
    pub fn hidden() -> Self {
        let multi = MultiProgress::new();
        let main_bar = multi.add(ProgressBar::hidden());
        let stats_bar = multi.add(ProgressBar::hidden());
        Self::with_bars(multi, main_bar, stats_bar)
    }

    fn with_bars(multi: MultiProgress, main_bar: ProgressBar, stats_bar: ProgressBar) -> Self {
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {human_pos}/{human_len} ({per_sec}) {msg}")
        {
            main_bar.set_style(style.progress_chars("█▓▒░-"));
        }
        if let Ok(style) = ProgressStyle::default_bar().template("Stats: {msg}") {
            stats_bar.set_style(style);
        }
        Self {
            _multi: multi,
            main_bar,
            stats_bar,
            start_time: Instant::now(),
            stages_done: 0,
        }
    }

    /// Finish progress reporting
    pub fn finish(&self) {
        self.main_bar.finish_with_message("Complete!");
        self.stats_bar.finish_with_message(format!(
            "{} stages in {:.1}s",
            self.stages_done,
            self.start_time.elapsed().as_secs_f64()
        ));
    }

    /// Format large numbers with a unit suffix
    fn format_number(n: usize) -> String {
        if n >= 1_000_000 {
            format!("{:.1}M", n as f64 / 1_000_000.0)
        } else if n >= 1_000 {
            format!("{:.1}K", n as f64 / 1_000.0)
        } else {
            n.to_string()
        }
    }
}

impl RunObserver for ProgressObserver {
    fn stage_started(&mut self, stage: Stage, items: usize) {
        self.main_bar.reset();
        self.main_bar.set_length(items as u64);
        self.main_bar.set_message(stage.label());
    }

    fn stage_progress(&mut self, _stage: Stage, done: usize) {
        self.main_bar.set_position(done as u64);
    }

    fn stage_finished(&mut self, stage: Stage, affected: usize) {
        self.stages_done += 1;
        self.main_bar.set_position(self.main_bar.length().unwrap_or(0));
        self.stats_bar.set_message(format!(
            "{}: {}",
            stage.label(),
            Self::format_number(affected)
        ));
    }
}

/// Print a formatted summary of a linkage run
pub fn print_summary_report(output: &LinkageOutput, directory: Option<&Path>, written: &[PathBuf]) {
    let stats = &output.stats;
    let diagnostics = &output.diagnostics;

    println!("\n{}", "═".repeat(60));
    println!("Linkage Complete");
    println!("{}", "═".repeat(60));

    match directory {
        Some(dir) => println!("Output:             {} ({} files)", dir.display(), written.len()),
        None => println!("Output:             (dry run - no output written)"),
    }

    println!("Polygons:           {}", format_with_commas(stats.polygons));
    println!("Distinct names:     {}", format_with_commas(stats.distinct_names));
    println!(
        "Multi-variant:      {} name groups",
        format_with_commas(diagnostics.multi_variant_groups)
    );
    println!("Incidents:          {}", format_with_commas(stats.incidents));
    println!("  exact:            {}", format_with_commas(stats.exact));
    println!("  buffered:         {}", format_with_commas(stats.buffered));
    println!("  name fallback:    {}", format_with_commas(stats.name_fallback));
    println!(
        "  unresolved:       {} ({:.1}% linked)",
        format_with_commas(stats.unresolved),
        stats.linkage_rate()
    );
    if stats.corrected > 0 {
        println!(
            "  corrected:        {} ({:.1}%)",
            format_with_commas(stats.corrected),
            stats.correction_rate()
        );
    }
    if diagnostics.ambiguous_matches > 0 {
        println!("  ambiguous:        {}", format_with_commas(diagnostics.ambiguous_matches));
    }

    if stats.demographic_records > 0 {
        println!(
            "Demographics:       {} of {} linked ({:.1}%)",
            format_with_commas(stats.demographics_linked),
            format_with_commas(stats.demographic_records),
            stats.demographic_linkage_rate()
        );
    }

    println!(
        "With incidents:     {} polygons",
        format_with_commas(stats.polygons_with_incidents)
    );
    println!(
        "Composite index:    {} polygons ({:.1}%)",
        format_with_commas(stats.composite_indices),
        stats.index_coverage()
    );

    println!("{}", "═".repeat(60));
}

/// Format number with thousand separators
pub fn format_with_commas(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(ProgressObserver::format_number(42), "42");
        assert_eq!(ProgressObserver::format_number(1_234), "1.2K");
        assert_eq!(ProgressObserver::format_number(1_234_567), "1.2M");
    }

    #[test]
    fn test_format_with_commas() {
        assert_eq!(format_with_commas(1234), "1,234");
        assert_eq!(format_with_commas(1234567), "1,234,567");
        assert_eq!(format_with_commas(42), "42");
        assert_eq!(format_with_commas(0), "0");
    }

    #[test]
    fn test_hidden_observer_tracks_stages() {
        let mut observer = ProgressObserver::hidden();
        observer.stage_started(Stage::ExactContainment, 10);
        observer.stage_progress(Stage::ExactContainment, 5);
        observer.stage_finished(Stage::ExactContainment, 8);
        observer.stage_finished(Stage::Aggregation, 3);
        assert_eq!(observer.stages_done, 2);
        observer.finish();
    }
}
