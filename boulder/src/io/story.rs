//! Story document reader.
//!
//! A story is a markdown file whose status lives either in YAML front-matter
//! (`status: READY`) or under a `## Status` heading. Status is re-read on every
//! check; nothing is cached.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::core::story::StoryStatus;

/// Source of story statuses. The filesystem reader is the default.
pub trait StoryReader {
    fn read_status(&self, story_path: &Path) -> Result<StoryStatus>;
}

/// Reads story documents from disk.
pub struct FsStoryReader;

impl StoryReader for FsStoryReader {
    fn read_status(&self, story_path: &Path) -> Result<StoryStatus> {
        let contents = fs::read_to_string(story_path)
            .with_context(|| format!("read story {}", story_path.display()))?;
        let raw = parse_status(&contents)
            .ok_or_else(|| anyhow!("no status field in {}", story_path.display()))?;
        raw.parse::<StoryStatus>().map_err(|err| anyhow!(err))
    }
}

/// Extract the raw status value, preferring front-matter over a `## Status` section.
pub fn parse_status(contents: &str) -> Option<String> {
    frontmatter_status(contents).or_else(|| section_status(contents))
}

fn frontmatter_status(contents: &str) -> Option<String> {
    let mut lines = contents.lines();
    if lines.next()?.trim_end() != "---" {
        return None;
    }
    let mut status = None;
    for line in lines {
        if line.trim_end() == "---" {
            return status;
        }
        if status.is_some() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("status") {
            let value = value.trim().trim_matches(['"', '\'']).trim();
            status = (!value.is_empty()).then(|| value.to_string());
        }
    }
    // Unterminated front-matter is not front-matter.
    None
}

fn section_status(contents: &str) -> Option<String> {
    let mut lines = contents.lines();
    lines.find(|line| {
        let trimmed = line.trim();
        trimmed
            .strip_prefix("## ")
            .is_some_and(|title| title.trim().eq_ignore_ascii_case("status"))
    })?;
    for line in lines {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            return None;
        }
        if trimmed.is_empty() {
            continue;
        }
        let value = trimmed
            .trim_start_matches(['-', '*'])
            .trim()
            .trim_matches('*')
            .trim_matches('`')
            .trim();
        return (!value.is_empty()).then(|| value.to_string());
    }
    None
}
