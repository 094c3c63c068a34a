//! Utility functions for directory lookup and text output
//!
//! Configuration follows the XDG Base Directory specification:
//!
//! - Config: `~/.config/nsgaudit/` - analyzer configuration (`config.json`)
//!
//! # Example
//!
//! ```
//! use nsgaudit::utils::{get_config_dir, truncate_string};
//!
//! if let Some(config_path) = get_config_dir() {
//!     // Load configuration from config_path
//!     let _ = config_path.join("config.json");
//! }
//! assert_eq!(truncate_string("abcdefghij", 8), "abcde...");
//! ```

use directories::ProjectDirs;
use std::path::PathBuf;

pub fn get_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "nsgaudit", "nsgaudit").map(|pd| pd.config_dir().to_path_buf())
}

/// Truncates a string to a maximum length and adds an ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        // Find the nearest character boundary to avoid splitting multi-byte characters
        let end = s
            .char_indices()
            .map(|(idx, _)| idx)
            .take_while(|&idx| idx <= max_len.saturating_sub(3))
            .last()
            .unwrap_or(0);
        format!("{}...", &s[..end])
    }
}

/// Joins rule names for one-line summaries, eliding the tail past `max`.
pub fn join_names(names: &[String], max: usize) -> String {
    if names.len() <= max {
        names.join(", ")
    } else {
        format!(
            "{} and {} more",
            names[..max].join(", "),
            names.len() - max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_untouched() {
        assert_eq!(truncate_string("short", 10), "short");
    }

    #[test]
    fn test_truncate_multibyte_boundary() {
        let s = "ééééééééé";
        let out = truncate_string(s, 8);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 8);
    }

    #[test]
    fn test_join_names_elides() {
        let names: Vec<String> = ["a", "b", "c", "d"].iter().map(ToString::to_string).collect();
        assert_eq!(join_names(&names, 4), "a, b, c, d");
        assert_eq!(join_names(&names, 2), "a, b and 2 more");
    }
}
