//! Console output for operators.
//!
//! Everything here prints to stdout (stderr for errors); diagnostics go through
//! `tracing` instead.

use crate::analyzer::{ResolvedTags, TagAction};
use crate::boundary::ReleaseWarning;
use console::style;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red().bold(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Display a release warning to the user.
pub fn display_warning(warning: &ReleaseWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// Print a titled block of text
pub fn display_section(title: &str, body: &str) {
    println!("\n{}\n", style(title).bold().underlined());
    println!("{}", body.trim_end());
}

/// Display the version change of a release
pub fn display_release_plan(previous: Option<&str>, next: &str, branch: &str) {
    match previous {
        Some(previous) => println!(
            "\n{} {} → {} on {}",
            style("Release:").bold(),
            style(previous).red(),
            style(next).green(),
            style(branch).cyan()
        ),
        None => println!(
            "\n{} {} (first release) on {}",
            style("Release:").bold(),
            style(next).green(),
            style(branch).cyan()
        ),
    }
}

/// Render the floating tag table
pub fn format_tag_table(tags: &ResolvedTags) -> String {
    let width = tags
        .iter()
        .map(|resolved| resolved.tag.to_string().len())
        .max()
        .unwrap_or(0)
        .max("Tag".len());

    let mut lines = vec![format!("{:<width$}  {:<16}  {}", "Tag", "Version", "Action")];
    for resolved in tags.iter() {
        let version = resolved
            .version
            .as_ref()
            .map(|v| v.tag_name())
            .unwrap_or_else(|| "-".to_string());
        let action = match resolved.action {
            TagAction::None => style(resolved.action.to_string()).dim().to_string(),
            TagAction::Update => style(resolved.action.to_string()).green().to_string(),
            TagAction::Delete => style(resolved.action.to_string()).red().to_string(),
        };
        lines.push(format!(
            "{:<width$}  {:<16}  {}",
            resolved.tag.to_string(),
            version,
            action
        ));
    }
    lines.join("\n")
}

/// Print the floating tag table
pub fn display_tag_table(tags: &ResolvedTags) {
    if tags.is_empty() {
        display_status("No floating tags");
    } else {
        println!("{}", format_tag_table(tags));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::TagResolver;
    use crate::domain::{TagRef, Version};

    #[test]
    fn test_format_tag_table() {
        console::set_colors_enabled(false);
        let tags = vec![TagRef::new("v1.2.0", "c1", Some(Version::new(1, 2, 0)))];
        let table = format_tag_table(&TagResolver::new(false).resolve(&tags));

        let lines: Vec<_> = table.lines().collect();
        assert!(lines[0].starts_with("Tag"));
        assert!(lines.iter().any(|l| l.starts_with("latest") && l.contains("v1.2.0")));
        assert!(lines.iter().any(|l| l.starts_with("v1.next") && l.ends_with("update")));
    }

    #[test]
    fn test_display_functions() {
        // Visual verification, output goes to the terminal
        display_status("test status");
        display_success("test success");
        display_warning(&ReleaseWarning::NoChanges { previous: None });
    }
}
