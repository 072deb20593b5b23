//! Drift diagnostics for blocks that no longer match.
//!
//! When a search block is absent the file has usually drifted: whitespace was
//! reformatted, a comment was edited, or the block was already rewritten by
//! hand. Locating the most similar region tells a human where to look.

use std::collections::HashSet;
use std::fmt;
use strsim::normalized_levenshtein;

/// Most similar region of a file for a block that was not found verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftReport {
    /// First line of the region (1-based, inclusive)
    pub start_line: usize,
    /// Last line of the region (1-based, inclusive)
    pub end_line: usize,
    /// Normalized Levenshtein similarity in [0.0, 1.0]
    pub similarity: f64,
}

impl fmt::Display for DriftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "closest region is lines {}-{} ({:.0}% similar)",
            self.start_line,
            self.end_line,
            self.similarity * 100.0
        )
    }
}

/// Windows that get a full edit-distance score.
const MAX_CANDIDATES: usize = 8;

/// Find the window of lines in `content` most similar to `block`.
///
/// The window is as tall as the block. Windows are first ranked by how many
/// of their lines (trimmed, non-blank) also occur in the block; only the top
/// few are scored with normalized Levenshtein. Returns `None` when either
/// side has no lines.
pub fn closest_region(content: &str, block: &str) -> Option<DriftReport> {
    let lines: Vec<&str> = content.lines().collect();
    let block_height = block.lines().count();
    if lines.is_empty() || block_height == 0 {
        return None;
    }

    let window = block_height.min(lines.len());
    let block = block.trim_end_matches('\n');

    let block_lines: HashSet<&str> = block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let hits: Vec<usize> = lines
        .iter()
        .map(|line| usize::from(block_lines.contains(line.trim())))
        .collect();

    // Sliding count of shared lines per window start
    let mut ranked = Vec::with_capacity(lines.len() - window + 1);
    let mut shared: usize = hits[..window].iter().sum();
    ranked.push((shared, 0));
    for start in 1..=(lines.len() - window) {
        shared = shared + hits[start + window - 1] - hits[start - 1];
        ranked.push((shared, start));
    }
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    ranked.truncate(MAX_CANDIDATES);

    let mut best: Option<DriftReport> = None;
    for (_, start) in ranked {
        let candidate = lines[start..start + window].join("\n");
        let similarity = normalized_levenshtein(&candidate, block);

        let better = best.as_ref().map_or(true, |current| {
            similarity > current.similarity
                || (similarity == current.similarity && start + 1 < current.start_line)
        });
        if better {
            best = Some(DriftReport {
                start_line: start + 1,
                end_line: start + window,
                similarity,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_region_scores_one() {
        let content = "a\nb\nfont-style: italic;\nc\n";
        let report = closest_region(content, "font-style: italic;").unwrap();
        assert_eq!(report.start_line, 3);
        assert_eq!(report.end_line, 3);
        assert!((report.similarity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_drifted_whitespace_found() {
        let content = "header\n<style>\n  .x { font-style: normal; }\n</style>\nfooter\n";
        let block = "<style>\n    .x { font-style: normal; }\n</style>";
        let report = closest_region(content, block).unwrap();
        assert_eq!(report.start_line, 2);
        assert_eq!(report.end_line, 4);
        assert!(report.similarity > 0.9);
    }

    #[test]
    fn test_block_taller_than_file() {
        let report = closest_region("only\n", "one\ntwo\nthree").unwrap();
        assert_eq!(report.start_line, 1);
        assert_eq!(report.end_line, 1);
    }

    #[test]
    fn test_empty_content() {
        assert!(closest_region("", "block").is_none());
    }

    #[test]
    fn test_display() {
        let report = DriftReport {
            start_line: 10,
            end_line: 12,
            similarity: 0.5,
        };
        assert_eq!(report.to_string(), "closest region is lines 10-12 (50% similar)");
    }

    #[test]
    fn test_large_file_finds_drifted_block() {
        let block = "<style>\n  .a { font-style: normal; }\n  .b { font-style: normal; }\n</style>";
        let drifted = block.replace("  .b", "    .b");

        let mut content = String::new();
        for i in 0..1000 {
            content.push_str(&format!("const filler{i} = {i};\n"));
        }
        content.push_str(&drifted);
        content.push('\n');
        for i in 0..1000 {
            content.push_str(&format!("const tail{i} = {i};\n"));
        }

        let report = closest_region(&content, block).unwrap();
        assert_eq!(report.start_line, 1001);
        assert_eq!(report.end_line, 1004);
        assert!(report.similarity > 0.9);
    }
}
