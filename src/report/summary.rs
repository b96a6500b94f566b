//! Human-readable console output: progress lines, batch summary, failure analysis.

use std::io::{self, Write};

use crate::core::{BenchmarkRun, FileRun, Stage, StageOutcome};
use crate::engine::KrtToolchain;
use crate::storage::ArtifactPaths;
use crate::triage::{FailureCategory, FailureReport};

const RULE: &str = "============================================================";
const THIN_RULE: &str = "------------------------------------------------------------";
const EXAMPLES_PER_CATEGORY: usize = 3;
const DEFAULT_REPLAY_COMMAND: &str = "krt -b /opt/atelierb-free-24.04.2/bin/REPLAY.kin";

/// `us` below a millisecond, `ms` below a second, `s` below a minute, then `XmY.Ys`.
pub fn format_time(seconds: f64) -> String {
    if seconds < 0.001 {
        format!("{:.0}us", seconds * 1_000_000.0)
    } else if seconds < 1.0 {
        format!("{:.1}ms", seconds * 1000.0)
    } else if seconds < 60.0 {
        format!("{seconds:.2}s")
    } else {
        let minutes = (seconds / 60.0).floor();
        format!("{}m{:.1}s", minutes as u64, seconds - minutes * 60.0)
    }
}

/// `1234567` -> `1,234,567`
pub fn group_thousands(n: u64) -> String {
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

fn stage_status(outcome: Option<&StageOutcome>) -> (&'static str, String) {
    match outcome {
        None => ("-", "-".to_string()),
        Some(o) if o.timed_out => ("TIMEOUT", format_time(o.elapsed_seconds)),
        Some(o) if o.succeeded => ("OK", format_time(o.elapsed_seconds)),
        Some(o) => ("FAIL", format_time(o.elapsed_seconds)),
    }
}

/// One-line result for a finished file, e.g. `PP:OK(1.20s) REPLAY:FAIL(3.0ms) [SUCCES]`.
pub fn progress_line(run: &FileRun) -> String {
    let (pp, pp_time) = stage_status(run.stage1.as_ref());
    let (replay, replay_time) = stage_status(run.stage2.as_ref());
    format!("PP:{pp}({pp_time}) REPLAY:{replay}({replay_time}) [{}]", run.result_label)
}

fn write_stage<W: Write>(out: &mut W, run: &BenchmarkRun, stage: Stage) -> io::Result<()> {
    let totals = run.totals(stage);
    writeln!(out, "{stage} Stage:")?;
    writeln!(out, "  Succeeded: {}", totals.succeeded)?;
    writeln!(out, "  Failed:    {}", totals.failed)?;
    writeln!(out, "  Timeouts:  {}", totals.timeouts)?;
    writeln!(out, "  Total time: {}", format_time(totals.total_time_seconds))?;
    if let Some(avg) = totals.average_success_time() {
        writeln!(out, "  Avg time (success): {}", format_time(avg))?;
    }
    writeln!(out)
}

pub fn write_summary<W: Write>(out: &mut W, run: &BenchmarkRun, paths: &ArtifactPaths) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "BENCHMARK SUMMARY")?;
    writeln!(out, "{RULE}")?;
    writeln!(out)?;
    writeln!(out, "Total files processed: {}", run.total_files())?;
    writeln!(
        out,
        "Timeouts: PP={:?}s, REPLAY={:?}s",
        run.stage1_timeout.as_secs_f64(),
        run.stage2_timeout.as_secs_f64()
    )?;
    writeln!(out)?;
    write_stage(out, run, Stage::Prove)?;
    write_stage(out, run, Stage::Replay)?;
    writeln!(out, "Total time: {}", format_time(run.total_time()))?;
    writeln!(out)?;
    writeln!(out, "Output directories:")?;
    writeln!(out, "  Traces:          {}/", paths.trace.display())?;
    writeln!(out, "  Replays:         {}/", paths.replay.display())?;
    writeln!(out, "  Replay failures: {}/", paths.replay_failures.display())?;
    writeln!(out, "{RULE}")
}

fn quote(text: &str) -> String {
    shlex::try_quote(text).map(|q| q.into_owned()).unwrap_or_else(|_| text.to_string())
}

/// Shell command that replays an archived failure from inside the archive directory.
pub fn repro_command(toolchain: Option<&KrtToolchain>) -> String {
    match toolchain {
        Some(t) => format!(
            "{} -b {}",
            quote(&t.krt.to_string_lossy()),
            quote(&t.replay_module.to_string_lossy())
        ),
        None => DEFAULT_REPLAY_COMMAND.to_string(),
    }
}

/// Failure analysis by category.
///
/// Without `verbose` only the first few cases of each category are listed.
pub fn write_failure_analysis<W: Write>(
    out: &mut W,
    failures: &FailureReport,
    paths: &ArtifactPaths,
    toolchain: Option<&KrtToolchain>,
    threshold: u64,
    verbose: bool,
) -> io::Result<()> {
    if failures.is_empty() {
        writeln!(out)?;
        return writeln!(out, "No REPLAY failures to analyze.");
    }
    writeln!(out)?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "REPLAY FAILURE ANALYSIS")?;
    writeln!(out, "{RULE}")?;
    writeln!(out)?;
    writeln!(out, "Total failures: {}", failures.total())?;
    writeln!(out, "Files copied to: {}/", paths.replay_failures.display())?;
    writeln!(out)?;
    writeln!(out, "{THIN_RULE}")?;
    writeln!(out, "FAILURE CATEGORIES")?;
    writeln!(out, "{THIN_RULE}")?;

    for (category, records) in failures.iter() {
        writeln!(out)?;
        writeln!(out, "{category} ({} cases): {}", records.len(), category.description())?;
        let shown = if verbose { records.len() } else { EXAMPLES_PER_CATEGORY };
        for record in records.iter().take(shown) {
            let size = if record.artifact_size_bytes > threshold {
                format!("{} bytes", group_thousands(record.artifact_size_bytes))
            } else {
                "empty".to_string()
            };
            writeln!(out, "  - {} ({size})", record.identifier)?;
            if verbose {
                if let Some(stats) = &record.trace_stats {
                    let top: Vec<String> = stats.top_rules.iter().map(|(r, n)| format!("{r}={n}")).collect();
                    writeln!(
                        out,
                        "      {} lines, {} rule applications ({} unique), top: {}",
                        stats.lines,
                        stats.rule_applications,
                        stats.unique_rules,
                        top.join(" ")
                    )?;
                }
            }
        }
        if records.len() > shown {
            writeln!(out, "  ... and {} more", records.len() - shown)?;
        }
    }

    let overflow = failures.get(FailureCategory::StackOverflow);
    if !overflow.is_empty() {
        let sizes: Vec<u64> = overflow.iter().map(|r| r.artifact_size_bytes).collect();
        let min = sizes.iter().copied().min().unwrap_or(0);
        let max = sizes.iter().copied().max().unwrap_or(0);
        let avg = sizes.iter().sum::<u64>() / sizes.len() as u64;
        writeln!(out)?;
        writeln!(out, "{THIN_RULE}")?;
        writeln!(out, "STACK OVERFLOW STATISTICS")?;
        writeln!(out, "{THIN_RULE}")?;
        writeln!(out, "  Count: {}", sizes.len())?;
        writeln!(out, "  Trace sizes: {} - {} bytes", group_thousands(min), group_thousands(max))?;
        writeln!(out, "  Average: {} bytes", group_thousands(avg))?;
    }

    writeln!(out)?;
    writeln!(out, "{THIN_RULE}")?;
    writeln!(out, "TO TEST A FAILURE MANUALLY:")?;
    writeln!(out, "{THIN_RULE}")?;
    writeln!(out, "  cd {}", quote(&paths.replay_failures.to_string_lossy()))?;
    writeln!(out, "  {} <name>.replay.goal", repro_command(toolchain))?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::FailureRecord;
    use std::time::Duration;

    #[test]
    fn test_format_time_units() {
        assert_eq!(format_time(0.0004), "400us");
        assert_eq!(format_time(0.25), "250.0ms");
        assert_eq!(format_time(1.5), "1.50s");
        assert_eq!(format_time(125.3), "2m5.3s");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_progress_line() {
        let mut run = FileRun::new("g1.but");
        run.stage1 = Some(StageOutcome::finished(Some(0), Duration::from_millis(1500), None, 10));
        assert_eq!(progress_line(&run), "PP:OK(1.50s) REPLAY:-(-) [UNKNOWN]");
        run.stage2 = Some(StageOutcome::timed_out(Duration::from_secs(2), Duration::from_secs(2)));
        assert_eq!(progress_line(&run), "PP:OK(1.50s) REPLAY:TIMEOUT(2.00s) [UNKNOWN]");
    }

    #[test]
    fn test_summary_mentions_totals() {
        let mut batch = BenchmarkRun::new(Duration::from_secs(60), Duration::from_secs(120));
        let mut run = FileRun::new("g1.but");
        run.stage1 = Some(StageOutcome::finished(Some(0), Duration::from_secs(2), None, 10));
        batch.files.push(run);
        let mut out = Vec::new();
        write_summary(&mut out, &batch, &ArtifactPaths::new("/out")).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Total files processed: 1"));
        assert!(text.contains("Timeouts: PP=60.0s, REPLAY=120.0s"));
        assert!(text.contains("Avg time (success): 2.00s"));
        assert!(text.contains("Traces:          /out/trace/"));
    }

    fn overflow(id: &str, size: u64) -> FailureRecord {
        FailureRecord {
            identifier: id.into(),
            artifact_size_bytes: size,
            raw_error: Some("GOALS STACK OVERFLOW".into()),
            category: FailureCategory::StackOverflow,
            trace_stats: None,
        }
    }

    #[test]
    fn test_failure_analysis_limits_examples() {
        let mut failures = FailureReport::default();
        for (i, size) in [1000, 3000, 2000, 4000, 5000].into_iter().enumerate() {
            failures.push(overflow(&format!("g{i}"), size));
        }
        let paths = ArtifactPaths::new("/out dir");
        let toolchain = KrtToolchain::new("/bin/krt", "/k/PP.kin", "/k/REPLAY.kin");
        let mut out = Vec::new();
        write_failure_analysis(&mut out, &failures, &paths, Some(&toolchain), 10, false).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("STACK_OVERFLOW (5 cases)"));
        assert!(text.contains("  - g2 (2,000 bytes)"));
        assert!(!text.contains("  - g3 "));
        assert!(text.contains("... and 2 more"));
        assert!(text.contains("Trace sizes: 1,000 - 5,000 bytes"));
        assert!(text.contains("Average: 3,000 bytes"));
        assert!(text.contains("/out dir/replay-failures"));
        assert!(text.contains("REPLAY.kin <name>.replay.goal"));

        let mut out = Vec::new();
        write_failure_analysis(&mut out, &failures, &paths, None, 10, true).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("  - g4 (5,000 bytes)"));
        assert!(!text.contains("more"));
    }

    #[test]
    fn test_no_failures() {
        let mut out = Vec::new();
        write_failure_analysis(&mut out, &FailureReport::default(), &ArtifactPaths::new("/o"), None, 10, false)
            .unwrap();
        assert!(String::from_utf8(out).unwrap().contains("No REPLAY failures to analyze."));
    }
}
