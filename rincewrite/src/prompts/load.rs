//! Load prompt templates from a directory of YAML files.
//!
//! **Canonical source**: default prompt text lives in `rincewrite/prompts/*.yaml`;
//! it is embedded at compile time and used when no directory is given and
//! `PROMPTS_DIR` is unset. A directory overrides templates file by file, keyed by
//! file stem (`welcome.yaml` overrides `welcome`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ConversationError;

use super::template::PromptTemplate;

/// Embedded default YAML (canonical source: `rincewrite/prompts/*.yaml`).
macro_rules! embed_prompt_yaml {
    ($name:literal) => {
        include_str!(concat!("../../prompts/", $name))
    };
}
const EMBED_WELCOME: &str = embed_prompt_yaml!("welcome.yaml");
const EMBED_CHAT: &str = embed_prompt_yaml!("chat.yaml");

/// Name of the template rendered by the welcome node.
pub const WELCOME_PROMPT: &str = "welcome";
/// Name of the template rendered by the chat node.
pub const CHAT_PROMPT: &str = "chat";

/// Error when loading prompts from a directory (missing dir, invalid YAML).
#[derive(Debug, thiserror::Error)]
pub enum PromptLoadError {
    #[error("prompts directory not found or not readable: {0}")]
    DirNotFound(String),
    #[error("failed to read prompts file {path}: {message}")]
    ReadFile { path: String, message: String },
    #[error("failed to parse YAML in {path}: {message}")]
    ParseYaml { path: String, message: String },
}

impl From<PromptLoadError> for ConversationError {
    fn from(err: PromptLoadError) -> Self {
        ConversationError::TemplateResolutionFailure(err.to_string())
    }
}

fn parse_yaml(path: &str, content: &str) -> Result<PromptTemplate, PromptLoadError> {
    serde_yaml::from_str(content).map_err(|e| PromptLoadError::ParseYaml {
        path: path.to_string(),
        message: e.to_string(),
    })
}

fn read_yaml_file(path: &Path) -> Result<PromptTemplate, PromptLoadError> {
    let content = std::fs::read_to_string(path).map_err(|e| PromptLoadError::ReadFile {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    parse_yaml(&path.display().to_string(), &content)
}

/// Named prompt templates.
#[derive(Debug, Clone, Default)]
pub struct PromptRegistry {
    templates: HashMap<String, PromptTemplate>,
}

impl PromptRegistry {
    /// Registry holding only the embedded defaults.
    pub fn embedded() -> Result<Self, PromptLoadError> {
        let mut registry = Self::default();
        registry.insert(WELCOME_PROMPT, parse_yaml("<embedded welcome.yaml>", EMBED_WELCOME)?);
        registry.insert(CHAT_PROMPT, parse_yaml("<embedded chat.yaml>", EMBED_CHAT)?);
        Ok(registry)
    }

    /// Embedded defaults overridden by every `*.yaml` / `*.yml` file in `dir`.
    ///
    /// Files are read in name order; other files are ignored.
    pub fn load(dir: &Path) -> Result<Self, PromptLoadError> {
        if !dir.is_dir() {
            return Err(PromptLoadError::DirNotFound(dir.display().to_string()));
        }
        let entries = std::fs::read_dir(dir)
            .map_err(|_| PromptLoadError::DirNotFound(dir.display().to_string()))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                p.is_file()
                    && matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("yaml") | Some("yml")
                    )
            })
            .collect();
        paths.sort();

        let mut registry = Self::embedded()?;
        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let template = read_yaml_file(&path)?;
            tracing::debug!(name = %stem, path = %path.display(), "prompt template override");
            registry.insert(stem, template);
        }
        Ok(registry)
    }

    /// Loads from `dir` if given, else from `PROMPTS_DIR` if set, else the embedded defaults.
    pub fn load_or_default(dir: Option<&Path>) -> Result<Self, PromptLoadError> {
        let dir = dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("PROMPTS_DIR").ok().map(PathBuf::from));
        match dir {
            Some(d) => Self::load(&d),
            None => Self::embedded(),
        }
    }

    /// Adds or replaces a template.
    pub fn insert(&mut self, name: impl Into<String>, template: PromptTemplate) {
        self.templates.insert(name.into(), template);
    }

    /// Template registered under `name`, validated.
    pub fn resolve(&self, name: &str) -> Result<PromptTemplate, ConversationError> {
        let template = self.templates.get(name).ok_or_else(|| {
            ConversationError::TemplateResolutionFailure(format!(
                "no prompt template named '{}'",
                name
            ))
        })?;
        template.validate(name)?;
        Ok(template.clone())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_resolve() {
        let registry = PromptRegistry::embedded().unwrap();
        assert_eq!(registry.names(), vec![CHAT_PROMPT, WELCOME_PROMPT]);
        let welcome = registry.resolve(WELCOME_PROMPT).unwrap();
        assert!(welcome.system.contains("{piece_name}"));
        assert!(welcome.human.is_some());
        assert!(registry.resolve(CHAT_PROMPT).is_ok());
    }

    #[test]
    fn resolve_unknown_name_fails() {
        let registry = PromptRegistry::embedded().unwrap();
        let err = registry.resolve("outline").unwrap_err();
        assert!(matches!(err, ConversationError::TemplateResolutionFailure(_)));
    }

    /// **Scenario**: a directory file overrides only the template with the same stem.
    #[test]
    fn directory_overrides_by_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("chat.yaml"),
            "system: \"Short answers for {user_name}.\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = PromptRegistry::load(dir.path()).unwrap();
        let chat = registry.resolve(CHAT_PROMPT).unwrap();
        assert_eq!(chat.system, "Short answers for {user_name}.");
        assert_eq!(chat.human, None);
        let welcome = registry.resolve(WELCOME_PROMPT).unwrap();
        assert!(welcome.system.contains("Rincewrite"));
    }

    #[test]
    fn missing_directory_is_dir_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = PromptRegistry::load(&missing).unwrap_err();
        assert!(matches!(err, PromptLoadError::DirNotFound(_)));
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("welcome.yaml"), "system: [unclosed\n").unwrap();
        let err = PromptRegistry::load(dir.path()).unwrap_err();
        assert!(matches!(err, PromptLoadError::ParseYaml { .. }), "{:?}", err);
        let conv: ConversationError = err.into();
        assert!(matches!(conv, ConversationError::TemplateResolutionFailure(_)));
    }

    /// **Scenario**: an override with an unknown placeholder loads but fails to resolve.
    #[test]
    fn override_with_unknown_placeholder_fails_resolution() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("welcome.yaml"), "system: \"Hi {reader}\"\n").unwrap();
        let registry = PromptRegistry::load(dir.path()).unwrap();
        assert!(registry.resolve(WELCOME_PROMPT).is_err());
    }
}
