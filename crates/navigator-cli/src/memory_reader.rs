// navigator-cli/src/memory_reader.rs
// ============================================================================
// Module: Process Memory Reader
// Description: Reads resident-set size and available system memory from
//              `/proc` for the adaptive memory controller.
// Purpose: Give the scheduler's background sampler a real reading instead
//          of the fixed-sequence reader the library crate uses in tests.
// Dependencies: std
// ============================================================================

use navigator_scheduler::MemoryReader;

/// Reads `VmRSS` and `MemAvailable` from `/proc/self/status` and
/// `/proc/meminfo`. Returns `(0.0, f64::MAX)` on platforms without `/proc`
/// or if either file is unreadable, which the adaptive memory controller
/// reads as "no pressure" rather than treating a read failure as critical.
#[derive(Debug, Default)]
pub struct ProcMemoryReader;

impl MemoryReader for ProcMemoryReader {
    fn read(&self) -> (f64, f64) {
        (read_rss_mb().unwrap_or(0.0), read_available_mb().unwrap_or(f64::MAX))
    }
}

fn read_rss_mb() -> Option<f64> {
    let content = std::fs::read_to_string("/proc/self/status").ok()?;
    kb_field(&content, "VmRSS:")
}

fn read_available_mb() -> Option<f64> {
    let content = std::fs::read_to_string("/proc/meminfo").ok()?;
    kb_field(&content, "MemAvailable:")
}

fn kb_field(content: &str, prefix: &str) -> Option<f64> {
    content
        .lines()
        .find(|line| line.starts_with(prefix))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|value| value.parse::<f64>().ok())
        .map(|kb| kb / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kb_field_extracts_and_converts_a_matching_line() {
        let content = "VmRSS:\t  40960 kB\nVmSize:\t 200000 kB\n";
        assert_eq!(kb_field(content, "VmRSS:"), Some(40.0));
    }

    #[test]
    fn kb_field_returns_none_when_the_prefix_is_absent() {
        let content = "VmSize:\t 200000 kB\n";
        assert_eq!(kb_field(content, "VmRSS:"), None);
    }
}
