use std::path::PathBuf;

use chrono::Datelike;
use flickrdown_logging::flickrdown_warn;

use crate::ItemMeta;

const MAX_COMPONENT_CHARS: usize = 120;

/// Maps an item's metadata to the path stem its files are written under.
///
/// The stem has no extension; the processor appends `.meta` and the media
/// extension to it.
pub trait DestinationResolver: Send + Sync {
    fn resolve(&self, meta: &ItemMeta) -> PathBuf;
}

/// `{root}/{year}/{month:02}/{first collection}/{title}`
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    root: PathBuf,
}

impl ArchiveLayout {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl DestinationResolver for ArchiveLayout {
    fn resolve(&self, meta: &ItemMeta) -> PathBuf {
        let mut path = self.root.join(format!("{:04}", meta.taken.year()));
        path.push(format!("{:02}", meta.taken.month()));

        if let Some(collection) = meta.collections.first() {
            if meta.collections.len() > 1 {
                flickrdown_warn!(
                    "Multiple collections for item {} / {}, filing under {:?}",
                    meta.id,
                    meta.title,
                    collection
                );
            }
            path.push(sanitize_component(collection, "unnamed"));
        }

        path.push(sanitize_component(&meta.title, meta.id.as_str()));
        path
    }
}

/// Makes `input` safe to use as a single path component on any platform.
///
/// Falls back to `fallback` (itself sanitized) when nothing usable remains.
pub fn sanitize_component(input: &str, fallback: &str) -> String {
    let cleaned = clean(input);
    if cleaned.is_empty() {
        let fallback = clean(fallback);
        if fallback.is_empty() {
            return "untitled".to_string();
        }
        return fallback;
    }
    cleaned
}

fn clean(input: &str) -> String {
    let replaced: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_matches(&['_', ' ', '.'][..]);

    // Collapse multiple underscores
    let mut compacted = String::with_capacity(trimmed.len());
    let mut prev_underscore = false;
    for c in trimmed.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }

    let mut final_name: String = compacted.chars().take(MAX_COMPONENT_CHARS).collect();
    if is_reserved_windows_name(&final_name) {
        final_name.push('_');
    }
    final_name
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}
