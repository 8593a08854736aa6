use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const BUILTIN_INTERVIEWER: &str = include_str!("../prompts/interviewer.md");
const BUILTIN_COACH: &str = include_str!("../prompts/coach.md");
const BUILTIN_TECHNICAL: &str = include_str!("../prompts/technical.md");

/// Reads every `*.md` file in `dir` into a map keyed by file stem.
/// Subdirectories and other files are ignored.
pub fn load_prompts(dir: &Path) -> Result<HashMap<String, String>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read prompts directory: {}", dir.display()))?;

    let mut prompts = HashMap::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|ext| ext.to_str()) != Some("md") {
            continue;
        }
        let key = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .with_context(|| format!("Prompt file name is not valid UTF-8: {}", path.display()))?
            .to_string();
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;
        tracing::debug!("Loaded prompt '{key}' ({} bytes)", text.len());
        prompts.insert(key, text);
    }
    Ok(prompts)
}

/// System prompts for the three agents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub interviewer: String,
    pub coach: String,
    pub technical: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            interviewer: BUILTIN_INTERVIEWER.to_string(),
            coach: BUILTIN_COACH.to_string(),
            technical: BUILTIN_TECHNICAL.to_string(),
        }
    }
}

impl Prompts {
    /// Prompts from `dir`, with the built-in text for any that are missing
    /// or blank. An unreadable directory means all built-ins.
    pub fn load(dir: &Path) -> Self {
        let mut loaded = match load_prompts(dir) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!("{e:#}; using built-in prompts");
                HashMap::new()
            }
        };
        let mut take = |key: &str, builtin: &str| match loaded.remove(key) {
            Some(text) if !text.trim().is_empty() => text,
            _ => builtin.to_string(),
        };
        let prompts = Self {
            interviewer: take("interviewer", BUILTIN_INTERVIEWER),
            coach: take("coach", BUILTIN_COACH),
            technical: take("technical", BUILTIN_TECHNICAL),
        };
        tracing::info!("Prompts ready (directory {})", dir.display());
        prompts
    }
}
