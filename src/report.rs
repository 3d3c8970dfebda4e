use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Get current Unix timestamp in seconds.
fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

/// Destination for mapped metrics; called once per reported entry per cycle.
pub trait MetricSink {
    fn report(&mut self, name: &str, value: f64);
}

/// Writes metrics to stdout in the relay line protocol
/// (`NAME value timestamp`), optionally mirroring every line to a report log.
pub struct StdoutSink {
    prefix: String,
    report_log: Option<File>,
}

impl StdoutSink {
    pub fn new(prefix: String, report_log_file: Option<&str>) -> io::Result<Self> {
        let report_log = match report_log_file {
            Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
            None => None,
        };
        Ok(Self { prefix, report_log })
    }
}

impl MetricSink for StdoutSink {
    fn report(&mut self, name: &str, value: f64) {
        let line = format!("{}{} {} {}", self.prefix, name, value, unix_timestamp());
        println!("{}", line);
        if let Some(log) = self.report_log.as_mut() {
            if let Err(e) = writeln!(log, "{}", line) {
                warn!("Failed to append to report log: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_log_mirrors_emitted_lines() {
        let path = std::env::temp_dir().join(format!("agent-report-log-{}.log", std::process::id()));
        let path_str = path.to_str().unwrap();

        {
            let mut sink = StdoutSink::new("DEV_".to_string(), Some(path_str)).unwrap();
            sink.report("OS_CPUUTIL_AVG", 55.2);
            sink.report("OS_INSTANCE_SUM", 3.0);
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("DEV_OS_CPUUTIL_AVG 55.2 "));
        assert!(lines[1].starts_with("DEV_OS_INSTANCE_SUM 3 "));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn sink_without_report_log_still_reports() {
        let mut sink = StdoutSink::new(String::new(), None).unwrap();
        sink.report("OS_VOLUME_SUM", 12.0);
    }
}
