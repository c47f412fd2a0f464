//! Table output formatting for CLI commands
//!
//! Run reports and the service list, rendered with comfy-table.

use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::cli::commands::services::ServiceEntry;
use crate::domain::models::RunReport;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
        }
    }

    pub const fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// One row per checked service, in request order
    pub fn format_report(&self, report: &RunReport) -> String {
        let mut table = Self::create_base_table();
        table.set_header(vec![
            Cell::new("Service").add_attribute(Attribute::Bold),
            Cell::new("Result").add_attribute(Attribute::Bold),
            Cell::new("Timeout (s)").add_attribute(Attribute::Bold),
            Cell::new("Elapsed (s)").add_attribute(Attribute::Bold),
        ]);

        for outcome in &report.outcomes {
            let label = if outcome.passed { "PASS" } else { "FAIL" };
            let result_cell = if self.use_colors {
                let color = if outcome.passed { Color::Green } else { Color::Red };
                Cell::new(label).fg(color)
            } else {
                Cell::new(label)
            };
            table.add_row(vec![
                Cell::new(outcome.service.as_str()),
                result_cell,
                Cell::new(outcome.timeout_secs),
                Cell::new(format!("{:.1}", outcome.elapsed_secs)),
            ]);
        }

        table.to_string()
    }

    pub fn format_services(&self, services: &[ServiceEntry]) -> String {
        let mut table = Self::create_base_table();
        table.set_header(vec![
            Cell::new("Service").add_attribute(Attribute::Bold),
            Cell::new("Check").add_attribute(Attribute::Bold),
            Cell::new("Timeout (s)").add_attribute(Attribute::Bold),
        ]);

        for entry in services {
            table.add_row(vec![
                Cell::new(&entry.service),
                Cell::new(&entry.check),
                Cell::new(entry.timeout_secs),
            ]);
        }

        table.to_string()
    }

    fn create_base_table() -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
fn supports_color() -> bool {
    // Respect NO_COLOR environment variable
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ServiceKey, ServiceOutcome};
    use chrono::Utc;

    #[test]
    fn test_report_table_lists_each_outcome() {
        let mut report = RunReport::new("run1", Utc::now());
        report.outcomes.push(ServiceOutcome {
            service: ServiceKey::Conman,
            passed: true,
            timeout_secs: 300,
            elapsed_secs: 2.25,
        });
        report.outcomes.push(ServiceOutcome {
            service: ServiceKey::Ims,
            passed: false,
            timeout_secs: 60,
            elapsed_secs: 61.0,
        });

        let rendered = TableFormatter::with_colors(false).format_report(&report);
        assert!(rendered.contains("conman"));
        assert!(rendered.contains("PASS"));
        assert!(rendered.contains("ims"));
        assert!(rendered.contains("FAIL"));
        assert!(rendered.contains("61.0"));
    }

    #[test]
    fn test_no_color_env_disables_colors() {
        temp_env::with_var("NO_COLOR", Some("1"), || {
            assert!(!supports_color());
        });
    }
}
