//! Saved rule sets
//!
//! A preset is a `Preset.txt` file of `key=value` lines, one per entry of
//! the rule field table in table order. Unset fields are written as `key=`.
//! Reading is lenient: lines that no longer line up with the table are
//! skipped so presets written by other versions still load.

use crate::rules::{rule_fields, RandomizerRules};
use crate::storage::{write_atomic, StorageError};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// File holding a preset inside its directory
pub const PRESET_FILE: &str = "Preset.txt";

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("Invalid preset name '{0}'")]
    InvalidName(String),

    #[error("Preset '{0}' not found")]
    NotFound(String),

    #[error("Preset I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Render rules as preset text
pub fn write_preset(rules: &RandomizerRules) -> String {
    let mut out = String::new();
    for field in rule_fields() {
        let value = (field.get)(rules)
            .map(|v| v.to_preset())
            .unwrap_or_default();
        out.push_str(field.key);
        out.push('=');
        out.push_str(&value);
        out.push('\n');
    }
    out
}

/// Parse preset text on top of the default rules
pub fn read_preset(content: &str) -> RandomizerRules {
    let mut rules = RandomizerRules::default();
    let fields = rule_fields();
    let mut next = 0;

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            warn!("Preset line {} has no '=', skipping", number + 1);
            continue;
        };
        let key = key.trim();

        let Some(offset) = fields[next..].iter().position(|f| f.key == key) else {
            warn!("Preset line {} has unexpected key '{key}', skipping", number + 1);
            continue;
        };
        let field = &fields[next + offset];
        next += offset + 1;

        if let Err(e) = (field.set)(&mut rules, value.trim()) {
            warn!("Preset value for '{key}' is invalid ({e}), skipping");
        }
    }

    rules
}

fn check_name(name: &str) -> Result<(), PresetError> {
    let invalid = name.trim().is_empty()
        || name.contains(['/', '\\'])
        || name == "."
        || name == "..";
    if invalid {
        return Err(PresetError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Presets stored under `<data>/Presets`
#[derive(Debug, Clone)]
pub struct PresetStore {
    root: PathBuf,
}

impl PresetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn preset_path(&self, name: &str) -> Result<PathBuf, PresetError> {
        check_name(name)?;
        Ok(self.root.join(name).join(PRESET_FILE))
    }

    /// Create or replace a preset
    pub async fn save(&self, name: &str, rules: &RandomizerRules) -> Result<PathBuf, PresetError> {
        let path = self.preset_path(name)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        write_atomic(&path, write_preset(rules).as_bytes()).await?;
        debug!("Saved preset '{name}' to {}", path.display());
        Ok(path)
    }

    pub async fn load(&self, name: &str) -> Result<RandomizerRules, PresetError> {
        let path = self.preset_path(name)?;
        if !fs::try_exists(&path).await? {
            return Err(PresetError::NotFound(name.to_string()));
        }
        let content = fs::read_to_string(&path).await?;
        Ok(read_preset(&content))
    }

    /// Names of every stored preset, sorted
    pub async fn list(&self) -> Result<Vec<String>, PresetError> {
        if !fs::try_exists(&self.root).await? {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !fs::try_exists(entry.path().join(PRESET_FILE)).await? {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Environment, Mood, SiteMask};
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_rules() -> RandomizerRules {
        let mut rules = RandomizerRules {
            time_limit: Duration::from_secs(45 * 60),
            ..RandomizerRules::default()
        };
        rules.request_rules.environments.insert(Environment::Island);
        rules.request_rules.moods.insert(Mood::Night);
        rules.request_rules.name = Some("speed".to_string());
        rules.request_rules.free_skip_limit = Some(3);
        rules.request_rules.in_beta = Some(false);
        rules
    }

    #[test]
    fn test_write_emits_every_field_in_order() {
        let text = write_preset(&RandomizerRules::default());
        let keys: Vec<&str> = text
            .lines()
            .map(|l| l.split_once('=').unwrap().0)
            .collect();
        let expected: Vec<&str> = rule_fields().iter().map(|f| f.key).collect();
        assert_eq!(keys, expected);
        assert!(text.contains("\nauthor=\n"));
    }

    #[test]
    fn test_preset_text_restores_rules() {
        let rules = sample_rules();
        assert_eq!(read_preset(&write_preset(&rules)), rules);
    }

    #[test]
    fn test_mismatched_lines_are_skipped() {
        let text = "\
time_limit=600000
removed_field=1
garbage line
name=abc
free_skip_limit=not-a-number
gold_skip_limit=2
environment=Island
";
        let rules = read_preset(text);
        assert_eq!(rules.time_limit, Duration::from_secs(600));
        assert_eq!(rules.request_rules.name.as_deref(), Some("abc"));
        assert_eq!(rules.request_rules.free_skip_limit, None);
        assert_eq!(rules.request_rules.gold_skip_limit, Some(2));
        // Out of order: environment precedes gold_skip_limit in the table
        assert!(rules.request_rules.environments.is_empty());
        assert_eq!(rules.request_rules.site, SiteMask::ANY);
    }

    #[tokio::test]
    async fn test_store_save_load_list() {
        let temp = TempDir::new().unwrap();
        let store = PresetStore::new(temp.path().join("Presets"));
        assert!(store.list().await.unwrap().is_empty());

        store.save("zeta", &RandomizerRules::default()).await.unwrap();
        let path = store.save("alpha", &sample_rules()).await.unwrap();
        assert!(path.ends_with("alpha/Preset.txt"));

        assert_eq!(store.list().await.unwrap(), vec!["alpha", "zeta"]);
        assert_eq!(store.load("alpha").await.unwrap(), sample_rules());
        assert!(matches!(
            store.load("missing").await,
            Err(PresetError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_names_are_rejected() {
        let temp = TempDir::new().unwrap();
        let store = PresetStore::new(temp.path());
        for name in ["", "  ", "a/b", "a\\b", ".."] {
            assert!(matches!(
                store.save(name, &RandomizerRules::default()).await,
                Err(PresetError::InvalidName(_))
            ));
        }
    }
}
