use std::time::Duration;

use crate::dedup::TrendRecord;
use crate::ledger::CollectionStamp;
use crate::pipeline::RunReport;

pub fn print_trends(records: &[TrendRecord], stamp: &CollectionStamp) {
    println!("Trending searches collected {} {}", stamp.date, stamp.time);
    println!(
        "{:>3} | {:<28} | {:<44} | {:<20}",
        "#", "Title", "Volume", "Growth"
    );
    println!("{}", "-".repeat(104));
    for r in records {
        println!(
            "{:>3} | {:<28} | {:<44} | {:<20}",
            r.rank,
            truncate(&r.title, 28),
            truncate(&r.volume, 44),
            truncate(&r.growth, 20)
        );
    }
}

pub fn print_summary(report: &RunReport) {
    let strategies: Vec<String> = report
        .strategies
        .iter()
        .map(|s| match &s.error {
            Some(_) => format!("{} (failed)", s.name),
            None => format!("{} ({})", s.name, s.found),
        })
        .collect();
    println!("\nStrategies: {}", strategies.join(", "));

    for outcome in &report.stores {
        match &outcome.result {
            Ok(m) => println!(
                "  {:<9} +{} rows, {} total  {}",
                outcome.store, m.added, m.final_rows, m.location
            ),
            Err(e) => println!("  {:<9} FAILED at {}: {}", outcome.store, outcome.location, e),
        }
    }
    if report.stores.is_empty() {
        println!("  No stores enabled.");
    }
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("손흥민 경기", 3), "손흥민...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }
}
