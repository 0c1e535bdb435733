//! Pure wikitext surgery on category and proposal pages.
//!
//! Nothing in here performs I/O: each function takes the current page text
//! and returns the text that should be written, or `None` when the page is
//! already in the desired state.

use anyhow::{Context, Result};
use regex::Regex;

pub fn transclusion_line(root: &str, category: &str, proposal: &str) -> String {
    transclusion_for_title(&format!("{root}/{category}/{proposal}"))
}

pub fn transclusion_for_title(full_title: &str) -> String {
    format!("{{{{:{full_title}}}}}")
}

/// Append `line` after the trimmed content. `None` if it is already present.
pub fn add_transclusion(content: &str, line: &str) -> Option<String> {
    if content.contains(line) {
        return None;
    }
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Some(line.to_string());
    }
    Some(format!("{trimmed}\n{line}"))
}

/// Drop `line` together with the newline in front of it. A line at the very
/// top of the page has no leading newline, so only the reference is removed.
pub fn remove_transclusion(content: &str, line: &str) -> Option<String> {
    let with_newline = format!("\n{line}");
    if content.contains(&with_newline) {
        return Some(content.replacen(&with_newline, "", 1));
    }
    if content.contains(line) {
        return Some(content.replacen(line, "", 1));
    }
    None
}

/// Swap `old_line` for `new_line` in place. When the new reference already
/// exists only the old one is dropped. `None` if `old_line` is absent.
pub fn rename_transclusion(content: &str, old_line: &str, new_line: &str) -> Option<String> {
    if !content.contains(old_line) {
        return None;
    }
    if old_line == new_line {
        return None;
    }
    if content.contains(new_line) {
        return remove_transclusion(content, old_line);
    }
    Some(content.replacen(old_line, new_line, 1))
}

/// Counts transclusions of pages below one survey root, at most one per line.
#[derive(Debug, Clone)]
pub struct TransclusionCounter {
    pattern: Regex,
}

impl TransclusionCounter {
    pub fn new(root: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(r"\{{\{{:{}.*\}}\}}", regex::escape(root)))
            .with_context(|| format!("failed to build transclusion pattern for {root}"))?;
        Ok(Self { pattern })
    }

    pub fn count(&self, content: &str) -> usize {
        self.pattern.find_iter(content).count()
    }
}

pub fn count_transclusions(root: &str, content: &str) -> Result<usize> {
    Ok(TransclusionCounter::new(root)?.count(content))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderCheck {
    /// The header already names the proposal.
    Valid,
    /// The header argument was rewritten; holds the new page text.
    Corrected(String),
    /// No header template at the top of the page.
    Missing,
}

pub fn proposal_header(template: &str, proposal: &str) -> String {
    format!("{{{{:{template}|1={proposal}}}}}")
}

/// Make the first argument of the proposal header match `proposal`.
pub fn correct_proposal_header(template: &str, content: &str, proposal: &str) -> HeaderCheck {
    if content.contains(&proposal_header(template, proposal)) {
        return HeaderCheck::Valid;
    }
    let pattern = format!(r"^\s*\{{\{{:{}\|1=(.*?)\}}\}}", regex::escape(template));
    let Ok(regex) = Regex::new(&pattern) else {
        return HeaderCheck::Missing;
    };
    let Some(argument) = regex.captures(content).and_then(|captures| captures.get(1)) else {
        return HeaderCheck::Missing;
    };

    let mut corrected = String::with_capacity(content.len() + proposal.len());
    corrected.push_str(&content[..argument.start()]);
    corrected.push_str(proposal);
    corrected.push_str(&content[argument.end()..]);
    HeaderCheck::Corrected(corrected)
}
