//! Plain-text statistics report

use crate::aggregator::{LayerFrequency, Stats, SubtypeShare};
use crate::config::Config;
use crate::pipeline::AnalysisOutcome;
use std::fmt::Write;

/// Message shown when the selection holds no rows
pub const NO_DATA_MESSAGE: &str = "No data for this selection.";
/// Message shown when the filter kept no rows
pub const NO_MATCHES_MESSAGE: &str = "The filter matched zero records.";

/// One-line summary, e.g. for a status bar
pub fn summary_line(stats: &Stats) -> String {
    format!(
        "{} events ({} touch, {} flick, {} HWK) from {} rows",
        stats.total, stats.touch_count, stats.flick_count, stats.hwk_count, stats.filtered_rows
    )
}

/// Render any pipeline outcome as text
pub fn render_outcome(outcome: &AnalysisOutcome, config: &Config) -> String {
    match outcome {
        AnalysisOutcome::Unreadable { reason, skipped } => {
            let mut out = format!("Files could not be read: {reason}\n");
            for file in skipped {
                let _ = writeln!(out, "  - {} [{}]", file.path.display(), file.code);
            }
            out
        }
        AnalysisOutcome::NoData => format!("{NO_DATA_MESSAGE}\n"),
        AnalysisOutcome::NoMatches { reference_rows } => format!(
            "{NO_MATCHES_MESSAGE} ({reference_rows} rows before filtering)\n"
        ),
        AnalysisOutcome::Ready(view) => render(&view.stats, config),
    }
}

/// Full statistics report
pub fn render(stats: &Stats, config: &Config) -> String {
    let mut out = String::new();
    let _ = write_report(&mut out, stats, config);
    out
}

fn write_report(out: &mut String, stats: &Stats, config: &Config) -> std::fmt::Result {
    writeln!(out, "=== Event statistics ===")?;
    writeln!(out)?;

    if stats.is_empty() {
        writeln!(out, "{NO_MATCHES_MESSAGE}")?;
        return Ok(());
    }

    let duration = stats.time.as_ref().map(|t| t.duration_sec).unwrap_or(0.0);

    writeln!(out, "Overview")?;
    writeln!(out, "  Total events:   {}", stats.total)?;
    writeln!(out, "  Unique layers:  {}", stats.unique_layers)?;
    writeln!(out, "  Duration:       {:.2} s", duration)?;
    writeln!(out)?;

    writeln!(out, "By type")?;
    writeln!(
        out,
        "  Touch:  {} ({:.1}%)",
        stats.touch_count, stats.shares.touch_pct
    )?;
    writeln!(
        out,
        "  Flick:  {} ({:.1}%), one per gesture",
        stats.flick_count, stats.shares.flick_pct
    )?;
    writeln!(out, "  HWK:    {} ({:.1}%)", stats.hwk_count, stats.shares.hwk_pct)?;
    writeln!(out)?;

    if let Some(time) = &stats.time {
        writeln!(out, "Time")?;
        writeln!(out, "  First event:    {:.2} s", time.first_ms as f64 / 1000.0)?;
        writeln!(out, "  Last event:     {:.2} s", time.last_ms as f64 / 1000.0)?;
        writeln!(out, "  Mean interval:  {:.2} s", time.mean_interval_ms / 1000.0)?;
        writeln!(out)?;
    }

    if let Some(coords) = &stats.coordinates {
        writeln!(out, "Touches (flick starts excluded)")?;
        writeln!(out, "  Density:  {:.2} /s", stats.densities.touch_per_sec)?;
        writeln!(
            out,
            "  X range:  {:.0} .. {:.0} (mean {:.1})",
            coords.x.min, coords.x.max, coords.x.mean
        )?;
        writeln!(
            out,
            "  Y range:  {:.0} .. {:.0} (mean {:.1})",
            coords.y.min, coords.y.max, coords.y.mean
        )?;
        writeln!(out)?;
    }

    if stats.hwk_count > 0 {
        writeln!(out, "HWK")?;
        writeln!(out, "  Density:  {:.2} /s", stats.densities.hwk_per_sec)?;
        write_shares(out, &stats.hwk_kinds)?;
        writeln!(out)?;
    }

    if stats.flick_count > 0 {
        writeln!(out, "Flicks")?;
        writeln!(out, "  Density:           {:.2} /s", stats.densities.flick_per_sec)?;
        writeln!(out, "  Share of touches:  {:.1}%", stats.flick_ratio_pct)?;
        write_shares(out, &stats.swipe_directions)?;
        writeln!(out)?;
    }

    if !stats.touch_layers.is_empty() {
        writeln!(out, "Touch layers")?;
        write_layers(out, &stats.touch_layers, config.top_layers)?;
        writeln!(out)?;
    }

    if stats.flick_count > 0 && !stats.swipe_layers.is_empty() {
        writeln!(out, "Flick layers")?;
        write_layers(out, &stats.swipe_layers, config.top_swipe_layers)?;
    }

    Ok(())
}

fn write_shares(out: &mut String, shares: &[SubtypeShare]) -> std::fmt::Result {
    for share in shares {
        writeln!(out, "  {}: {} ({:.1}%)", share.label, share.count, share.pct)?;
    }
    Ok(())
}

fn write_layers(out: &mut String, layers: &[LayerFrequency], top: usize) -> std::fmt::Result {
    for layer in layers.iter().take(top) {
        writeln!(out, "  {}: {} ({:.1}%)", layer.name, layer.count, layer.pct)?;
    }
    if layers.len() > top {
        writeln!(out, "  ... {} more layers", layers.len() - top)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterSpec;
    use crate::pipeline::analyze;
    use crate::types::{EventTable, TimeRange};

    fn sample() -> EventTable {
        EventTable::from_rows(vec![
            (0, 10.0, 10.0, "btn_a"),
            (1000, 20.0, 20.0, "btn_b"),
            (1500, 90.0, 20.0, "swipe_up"),
            (2000, 0.0, 0.0, "HWK_boost"),
            (3000, 30.0, 30.0, "btn_a"),
        ])
    }

    #[test]
    fn test_report_sections() {
        let outcome = analyze(sample(), &FilterSpec::pass_all());
        let text = render_outcome(&outcome, &Config::default());

        assert!(text.contains("Total events:   4"));
        assert!(text.contains("Flick:  1 (25.0%)"));
        assert!(text.contains("HWK_boost: 1 (100.0%)"));
        assert!(text.contains("SWIPE_UP: 1"));
        assert!(text.contains("btn_a: 2"));
        assert!(text.contains("Duration:       3.00 s"));
    }

    #[test]
    fn test_top_layers_truncated() {
        let mut config = Config::default();
        config.top_layers = 1;
        let table = EventTable::from_rows(vec![
            (0, 1.0, 1.0, "btn_a"),
            (10, 1.0, 1.0, "btn_b"),
            (20, 1.0, 1.0, "btn_a"),
        ]);
        let outcome = analyze(table, &FilterSpec::pass_all());
        let text = render_outcome(&outcome, &config);
        assert!(text.contains("... 1 more layers"));
    }

    #[test]
    fn test_no_data_states_render_differently() {
        let config = Config::default();
        let no_data = render_outcome(&AnalysisOutcome::NoData, &config);
        let spec = FilterSpec::new(TimeRange::new(10_000, 20_000), Vec::<String>::new());
        let no_matches = render_outcome(&analyze(sample(), &spec), &config);

        assert!(no_data.contains(NO_DATA_MESSAGE));
        assert!(no_matches.contains(NO_MATCHES_MESSAGE));
        assert!(no_matches.contains("5 rows"));
        assert_ne!(no_data, no_matches);
    }

    #[test]
    fn test_summary_line() {
        let outcome = analyze(sample(), &FilterSpec::pass_all());
        let stats = outcome.stats().expect("ready");
        assert_eq!(
            summary_line(stats),
            "4 events (2 touch, 1 flick, 1 HWK) from 5 rows"
        );
    }
}
