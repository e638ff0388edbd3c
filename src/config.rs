use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = ".redliner.toml";

/// Which blocks a clean export emits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanScope {
    /// Only blocks with at least one surviving edit, under section headers.
    #[default]
    Edited,
    /// Every block, edits applied.
    Full,
}

/// Export settings loaded from `.redliner.toml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Revision and comment author.
    pub author: String,
    /// Label at the start of the page header.
    pub brand: String,
    /// Blocks a clean export emits.
    pub clean_scope: CleanScope,
    /// Section header for edited blocks with no preceding heading.
    pub fallback_section: String,
    /// Document font.
    pub font: String,
    /// Whether edit rationales become comments.
    pub include_comments: bool,
    /// Comment author initials.
    pub initials: String,
}

/// Raw TOML structure for `.redliner.toml`. Every key is optional.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RedlinerTomlConfig {
    /// See [`Config::author`].
    author: Option<String>,
    /// See [`Config::brand`].
    brand: Option<String>,
    /// See [`Config::clean_scope`].
    clean_scope: Option<CleanScope>,
    /// See [`Config::fallback_section`].
    fallback_section: Option<String>,
    /// See [`Config::font`].
    font: Option<String>,
    /// See [`Config::include_comments`].
    include_comments: Option<bool>,
    /// See [`Config::initials`].
    initials: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            author: "Contract Review Assistant".to_string(),
            brand: "REDLINER".to_string(),
            clean_scope: CleanScope::Edited,
            fallback_section: "General Provisions".to_string(),
            font: "Arial".to_string(),
            include_comments: true,
            initials: "CRA".to_string(),
        };
    }
}

impl Config {
    /// Load `.redliner.toml` from `root`, or the defaults if there is none.
    /// A file that exists but is malformed is an error; it never silently
    /// falls back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
        };
        return Self::parse(&content);
    }

    /// Load an explicitly named config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigNotFound` if the file does not exist,
    /// `Error::Io` if reading fails otherwise, or `Error::TomlDe` if the TOML
    /// is malformed.
    pub fn load_from(path: &Path) -> Result<Self, Error> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound { path: path.to_path_buf() });
            },
            Err(e) => return Err(Error::Io(e)),
        };
        return Self::parse(&content);
    }

    /// Overlay TOML keys on the defaults.
    fn parse(content: &str) -> Result<Self, Error> {
        let raw: RedlinerTomlConfig = toml::from_str(content)?;
        let defaults = Self::default();
        return Ok(Self {
            author: raw.author.unwrap_or(defaults.author),
            brand: raw.brand.unwrap_or(defaults.brand),
            clean_scope: raw.clean_scope.unwrap_or(defaults.clean_scope),
            fallback_section: raw.fallback_section.unwrap_or(defaults.fallback_section),
            font: raw.font.unwrap_or(defaults.font),
            include_comments: raw.include_comments.unwrap_or(defaults.include_comments),
            initials: raw.initials.unwrap_or(defaults.initials),
        });
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::unwrap_used, reason = "test assertions")]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn keys_overlay_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "author = \"Legal Ops\"\nclean_scope = \"full\"\ninclude_comments = false\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.author, "Legal Ops");
        assert_eq!(config.clean_scope, CleanScope::Full);
        assert!(!config.include_comments);
        assert_eq!(config.initials, "CRA");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "clean_scope = \"sometimes\"\n").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::TomlDe(_))));

        std::fs::write(dir.path().join(CONFIG_FILE), "colour = \"red\"\n").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::TomlDe(_))));
    }

    #[test]
    fn explicit_missing_path_is_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(matches!(Config::load_from(&path), Err(Error::ConfigNotFound { .. })));
    }
}
