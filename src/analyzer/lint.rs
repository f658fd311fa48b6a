//! Changelog lint/normalize step applied before display and after every edit

/// Normalizes changelog markdown
pub trait ChangelogLinter: Send + Sync {
    fn lint(&self, markdown: &str) -> String;
}

/// Whitespace and bullet normalizer
///
/// - trailing whitespace removed from every line
/// - runs of blank lines collapsed to one
/// - `*` and `+` bullets rewritten to `-`
/// - exactly one trailing newline
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownNormalizer;

impl ChangelogLinter for MarkdownNormalizer {
    fn lint(&self, markdown: &str) -> String {
        let mut lines: Vec<String> = Vec::new();

        for line in markdown.lines() {
            let line = line.trim_end();

            if line.is_empty() {
                if lines.last().map_or(true, |last| last.is_empty()) {
                    continue;
                }
                lines.push(String::new());
                continue;
            }

            let indent = line.len() - line.trim_start().len();
            let body = &line[indent..];
            let normalized = match body.strip_prefix("* ").or_else(|| body.strip_prefix("+ ")) {
                Some(rest) => format!("{}- {}", &line[..indent], rest),
                None => line.to_string(),
            };
            lines.push(normalized);
        }

        while lines.last().is_some_and(|last| last.is_empty()) {
            lines.pop();
        }

        if lines.is_empty() {
            return String::new();
        }

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}
