//! Output control with leveled, timestamped logging

use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct OutputManager {
    pub verbose: bool,
    quiet: bool,
    start_time: Instant,
}

impl OutputManager {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            start_time: Instant::now(),
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            start_time: Instant::now(),
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.print_with_timestamp("INFO", message);
        }
    }

    pub fn verbose(&self, message: &str) {
        if self.verbose {
            self.print_with_timestamp("INFO", message);
        }
    }

    pub fn detail(&self, message: &str) {
        if self.verbose {
            println!("      {}", message);
        }
    }

    pub fn warning(&self, message: &str) {
        self.print_with_timestamp("WARN", message);
    }

    pub fn error(&self, message: &str) {
        self.print_with_timestamp("ERROR", message);
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.print_with_timestamp("OK", message);
        }
    }

    pub fn section(&self, title: &str) {
        if self.quiet {
            return;
        }
        if self.verbose {
            let separator = "-".repeat(60);
            println!("\n{}\n{}\n{}", separator, title, separator);
        } else {
            println!("\n{}", title);
        }
    }

    fn print_with_timestamp(&self, level: &str, message: &str) {
        if self.verbose {
            println!(
                "[{:8.3}s] {} {}",
                self.start_time.elapsed().as_secs_f64(),
                level,
                message
            );
        } else {
            println!("{}: {}", level, message);
        }
    }

    pub fn format_size(&self, size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.1} {}", size, UNITS[unit_index])
        }
    }

    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{:.1}s", duration.as_secs_f64())
        } else {
            format!("{}m {}s", secs / 60, secs % 60)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        let output = OutputManager::new_quiet();
        assert_eq!(output.format_size(512), "512 B");
        assert_eq!(output.format_size(2048), "2.0 KB");
        assert_eq!(output.format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_format_duration() {
        let output = OutputManager::new_quiet();
        assert_eq!(output.format_duration(Duration::from_secs(5)), "5.0s");
        assert_eq!(output.format_duration(Duration::from_secs(125)), "2m 5s");
    }
}
