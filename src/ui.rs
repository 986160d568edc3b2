//! Terminal output for the command-line tool.
//!
//! Versions go to stdout, one per line, so pipelines can consume them.
//! Everything else goes to stderr.

use console::style;

use crate::domain::SemanticVersion;
use crate::error::StoreError;

/// Render versions one per line
pub fn format_versions(versions: &[SemanticVersion]) -> String {
    versions
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn display_versions(versions: &[SemanticVersion]) {
    if !versions.is_empty() {
        println!("{}", format_versions(versions));
    }
}

pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

pub fn display_success(message: &str) {
    eprintln!("{} {}", style("✓").green(), message);
}

pub fn display_status(message: &str) {
    eprintln!("{} {}", style("→").yellow(), message);
}

/// Error line plus a hint when running again later may help
pub fn display_store_error(err: &StoreError) {
    display_error(&err.to_string());
    if err.is_retriable() {
        display_status("this failure is temporary; run the step again");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_versions() {
        let versions = vec![
            SemanticVersion::new(1, 0, 0),
            SemanticVersion::parse("1.1.0-rc.1").unwrap(),
        ];
        assert_eq!(format_versions(&versions), "1.0.0\n1.1.0-rc.1");
    }

    #[test]
    fn test_format_no_versions() {
        assert_eq!(format_versions(&[]), "");
    }
}
