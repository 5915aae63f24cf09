//! # Prompt store
//!
//! Prompt templates live in a directory tree and are addressed by logical
//! name: `prompts/reflection/writer.md` is `"reflection/writer"`. The store
//! is built once at startup and handed to whatever needs templates; it is
//! never mutated afterwards.
//!
//! Plain-text files (`.txt`, `.md`, `.prompt`) hold the template verbatim.
//! YAML files (`.yaml`, `.yml`) hold it in their `prompt` field, which keeps
//! prompt repositories that store metadata next to the text loadable.

use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::{DirEntry, WalkDir};
use yava_error::{Error, ErrorKind, Result};

/// Directory name looked up by [`PromptStore::discover`]
pub const PROMPTS_DIR: &str = "prompts";

/// System prompt of the writer in the reflection loop
pub const WRITER_PROMPT: &str = "reflection/writer";
/// System prompt of the reviewer in the reflection loop
pub const REVIEWER_PROMPT: &str = "reflection/reviewer";
/// Template of the checker; placeholders `{format}`, `{topic}`, `{essay}`
pub const CHECK_PROMPT: &str = "reflection/check";
/// System prompt for plan generation
pub const PLANNING_PROMPT: &str = "planning/planning";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("valid placeholder regex"));

/// Read-only lookup of prompt templates by logical name
#[derive(Debug, Clone, Default)]
pub struct PromptStore {
    templates: BTreeMap<String, String>,
    root: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct PromptFile {
    prompt: String,
}

impl PromptStore {
    /// Build an in-memory store
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            templates: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            root: None,
        }
    }

    /// Load every template below `root`
    pub fn from_dir(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(Error::new(
                ErrorKind::FileNotFound,
                format!("prompt directory '{}' does not exist", root.display()),
            )
            .with_operation("prompts::from_dir"));
        }

        let mut templates = BTreeMap::new();
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = entry.map_err(|e| {
                Error::new(ErrorKind::IoFailed, e.to_string())
                    .with_operation("prompts::from_dir")
                    .set_source(e)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(template) = load_template(path)? else {
                continue;
            };
            let name = logical_name(root, path);

            if templates.insert(name.clone(), template).is_some() {
                return Err(Error::config_invalid(format!("prompt '{}' defined twice", name))
                    .with_operation("prompts::from_dir")
                    .with_context("prompt", name)
                    .with_context("path", path.display().to_string()));
            }
        }

        tracing::debug!(root = %root.display(), count = templates.len(), "loaded prompts");

        Ok(Self {
            templates,
            root: Some(root.to_path_buf()),
        })
    }

    /// Find a `prompts` directory in `start` or its parent and load it
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let start = start.as_ref();
        let candidates = std::iter::once(start).chain(start.parent());

        for dir in candidates {
            let candidate = dir.join(PROMPTS_DIR);
            if candidate.is_dir() {
                return Self::from_dir(&candidate).map_err(|e| e.with_operation("prompts::discover"));
            }
        }

        Err(Error::new(ErrorKind::FileNotFound, format!("no '{}' directory found", PROMPTS_DIR))
            .with_operation("prompts::discover")
            .with_context("start", start.display().to_string()))
    }

    pub fn get(&self, name: &str) -> Result<&str> {
        self.templates
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::prompt_not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    /// Template names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Directory the store was loaded from, if any
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Fetch a template and fill in its placeholders
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> Result<String> {
        Ok(render_template(self.get(name)?, vars))
    }
}

/// Replace each `{key}` with its value in a single pass.
///
/// Placeholders without a value stay as they are, so literal braces in a
/// template survive. Values are never re-scanned.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn load_template(path: &Path) -> Result<Option<String>> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "txt" | "md" | "prompt" => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| Error::from(e).with_context("path", path.display().to_string()))?;
            Ok(Some(text))
        }
        "yaml" | "yml" => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| Error::from(e).with_context("path", path.display().to_string()))?;
            let file: PromptFile = serde_yaml::from_str(&raw).map_err(|e| {
                Error::new(ErrorKind::SerializationFailed, e.to_string())
                    .with_operation("prompts::load_template")
                    .with_context("path", path.display().to_string())
                    .set_source(e)
            })?;
            Ok(Some(file.prompt))
        }
        _ => Ok(None),
    }
}

fn logical_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_from_dir_names_by_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "reflection/writer.md", "You are an essay writer.");
        write(dir.path(), "reflection/check.txt", "Is this a {format} about {topic}?");
        write(dir.path(), "planning/planning.yaml", "prompt: Plan carefully.\nversion: 3\n");
        write(dir.path(), "README", "ignored");

        let store = PromptStore::from_dir(dir.path()).unwrap();

        assert_eq!(store.names(), vec!["planning/planning", "reflection/check", "reflection/writer"]);
        assert_eq!(store.get(WRITER_PROMPT).unwrap(), "You are an essay writer.");
        assert_eq!(store.get(PLANNING_PROMPT).unwrap(), "Plan carefully.");
        assert_eq!(store.root(), Some(dir.path()));
    }

    #[test]
    fn test_hidden_directories_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".git/description.txt", "not a prompt");
        write(dir.path(), "a.txt", "A");

        let store = PromptStore::from_dir(dir.path()).unwrap();
        assert_eq!(store.names(), vec!["a"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "reflection/writer.md", "one");
        write(dir.path(), "reflection/writer.txt", "two");

        let err = PromptStore::from_dir(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        assert_eq!(err.context_value("prompt"), Some("reflection/writer"));
    }

    #[test]
    fn test_bad_yaml() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.yaml", "text: no prompt field\n");

        let err = PromptStore::from_dir(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SerializationFailed);
    }

    #[test]
    fn test_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = PromptStore::from_dir(dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[test]
    fn test_discover_in_start_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "prompts/reflection/writer.md", "here");

        let store = PromptStore::discover(dir.path()).unwrap();
        assert_eq!(store.get(WRITER_PROMPT).unwrap(), "here");
    }

    #[test]
    fn test_discover_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "prompts/reflection/writer.md", "parent");
        let child = dir.path().join("notebooks");
        fs::create_dir_all(&child).unwrap();

        let store = PromptStore::discover(&child).unwrap();
        assert_eq!(store.get(WRITER_PROMPT).unwrap(), "parent");
    }

    #[test]
    fn test_discover_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let child = dir.path().join("a");
        fs::create_dir_all(&child).unwrap();

        let err = PromptStore::discover(&child).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert_eq!(err.operation(), "prompts::discover");
    }

    #[test]
    fn test_get_missing() {
        let store = PromptStore::from_pairs([("a", "b")]);
        let err = store.get(REVIEWER_PROMPT).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PromptNotFound);
        assert!(store.contains("a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_bundled_prompts() {
        let store = PromptStore::discover(env!("CARGO_MANIFEST_DIR")).unwrap();
        for name in [WRITER_PROMPT, REVIEWER_PROMPT, CHECK_PROMPT, PLANNING_PROMPT] {
            assert!(store.contains(name), "missing {}", name);
        }
        assert!(store.get(CHECK_PROMPT).unwrap().contains("{essay}"));
    }

    #[test]
    fn test_render() {
        let store = PromptStore::from_pairs([(CHECK_PROMPT, "Is this a {format} about {topic}?\n{essay}")]);
        let out = store
            .render(CHECK_PROMPT, &[("format", "essay"), ("topic", "owls"), ("essay", "Owls hoot.")])
            .unwrap();
        assert_eq!(out, "Is this a essay about owls?\nOwls hoot.");
    }

    #[test]
    fn test_render_keeps_unknown_and_does_not_rescan_values() {
        let out = render_template("{a} {json} {b}", &[("a", "{b}"), ("b", "B")]);
        assert_eq!(out, "{b} {json} B");
    }

    #[test]
    fn test_placeholders_are_word_characters_only() {
        let out = render_template("{a_1} {a-1} { a } {}", &[("a_1", "x"), ("a-1", "y"), ("a", "z")]);
        assert_eq!(out, "x {a-1} { a } {}");
    }
}
