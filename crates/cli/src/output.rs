//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use longevity_core::models::FeatureValue;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Parse a format name from the config file
    pub fn parse(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => print_json(&items),
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    if let Ok(json) = serde_json::to_string_pretty(value) {
        println!("{}", json);
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a score in [0, 1] as a percentage
pub fn format_score(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}

/// Format a metric value, with missing values shown as a dash
pub fn format_value(value: &FeatureValue) -> String {
    match value {
        FeatureValue::Missing => "-".to_string(),
        FeatureValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        FeatureValue::Number(n) => format!("{:.2}", n),
        other => other.to_string(),
    }
}

/// Color a longevity category by how promising it is
pub fn color_category(category: &str) -> String {
    match category.to_lowercase().as_str() {
        "excellent" | "good" => category.green().to_string(),
        "average" => category.yellow().to_string(),
        "below average" | "poor" => category.red().to_string(),
        _ => category.to_string(),
    }
}

/// Color a score based on value
pub fn color_score(score: f64) -> String {
    let formatted = format_score(score);
    if score >= 0.6 {
        formatted.green().to_string()
    } else if score >= 0.4 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&FeatureValue::Missing), "-");
        assert_eq!(format_value(&FeatureValue::Number(1000.0)), "1000");
        assert_eq!(format_value(&FeatureValue::Number(4.567)), "4.57");
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(0.85), "85%");
        assert_eq!(format_score(0.0), "0%");
    }

    #[test]
    fn test_parse_format() {
        assert!(matches!(OutputFormat::parse("json"), Some(OutputFormat::Json)));
        assert!(matches!(OutputFormat::parse("TABLE"), Some(OutputFormat::Table)));
        assert!(OutputFormat::parse("yaml").is_none());
    }
}
