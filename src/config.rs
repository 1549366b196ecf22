use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::UserDirs;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Everything the tool can be told through a config file.
///
/// Each section is a plain value handed to the operation that needs it.
/// Missing sections and fields fall back to their defaults, so an empty file
/// is a valid config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dedupe: DedupeOptions,
    pub housekeeping: HousekeepingConfig,
    pub logging: LoggingConfig,
}

/// Options for a duplicate scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeOptions {
    /// Report what would be deleted without deleting anything.
    pub dry_run: bool,
    /// Number of hashing threads. 1 keeps the scan fully sequential.
    pub threads: usize,
    /// Files smaller than this many bytes are ignored.
    pub min_size: u64,
    /// Draw progress spinners on stderr.
    pub progress: bool,
}

impl Default for DedupeOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            threads: 1,
            min_size: 0,
            progress: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HousekeepingConfig {
    /// Directory emptied by `clean-tmp` when none is given on the command line.
    pub tmp_dir: Option<PathBuf>,
    /// Directory sorted by `sort-files` when none is given on the command line.
    pub sort_dir: Option<PathBuf>,
    pub sort_rules: SortRules,
}

impl HousekeepingConfig {
    pub fn tmp_dir(&self) -> PathBuf {
        self.tmp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// The configured sort directory, else the user's downloads folder.
    pub fn sort_dir(&self) -> Option<PathBuf> {
        self.sort_dir.clone().or_else(|| {
            UserDirs::new().and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: bool,
    /// When set, every run writes a timestamped log file into this directory.
    pub log_dir: Option<PathBuf>,
}

/// Maps a lowercase file extension (without the dot) to the folder name files
/// with that extension are moved into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortRules(BTreeMap<String, String>);

impl Default for SortRules {
    fn default() -> Self {
        let rules = [
            ("png", "Images"),
            ("jpg", "Images"),
            ("jpeg", "Images"),
            ("pdf", "PDFs"),
            ("txt", "Text"),
            ("py", "Code"),
        ];
        Self(
            rules
                .into_iter()
                .map(|(ext, folder)| (ext.to_string(), folder.to_string()))
                .collect(),
        )
    }
}

impl SortRules {
    pub fn new<I, E, F>(rules: I) -> Self
    where
        I: IntoIterator<Item = (E, F)>,
        E: Into<String>,
        F: Into<String>,
    {
        Self(
            rules
                .into_iter()
                .map(|(ext, folder)| (normalize_extension(&ext.into()), folder.into()))
                .collect(),
        )
    }

    /// Folder for `path`, matched on its extension case-insensitively.
    pub fn folder_for(&self, path: &Path) -> Option<&str> {
        let ext = path.extension()?.to_str()?;
        self.0.get(&normalize_extension(ext)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

impl Config {
    /// Loads a config file. Unknown keys are ignored.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::ParseConfig {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from '{}': {:?}", path.display(), config);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Config = toml::from_str(content)?;
        // Keys written as ".JPG" in the file still match "photo.jpg".
        config.housekeeping.sort_rules = SortRules(
            std::mem::take(&mut config.housekeeping.sort_rules.0)
                .into_iter()
                .map(|(ext, folder)| (normalize_extension(&ext), folder))
                .collect(),
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.dedupe.threads, 1);
        assert!(!config.dedupe.dry_run);
        assert_eq!(config.housekeeping.sort_rules.len(), 6);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [dedupe]
            dry_run = true
            min_size = 1024

            [logging]
            log_dir = "/var/log/sweep"
            "#,
        )
        .unwrap();
        assert!(config.dedupe.dry_run);
        assert_eq!(config.dedupe.min_size, 1024);
        assert_eq!(config.dedupe.threads, 1);
        assert!(config.dedupe.progress);
        assert_eq!(config.logging.log_dir, Some(PathBuf::from("/var/log/sweep")));
    }

    #[test]
    fn configured_sort_dir_wins() {
        let config = Config::from_toml(
            r#"
            [housekeeping]
            sort_dir = "/data/inbox"
            "#,
        )
        .unwrap();
        assert_eq!(config.housekeeping.sort_dir(), Some(PathBuf::from("/data/inbox")));
        assert_eq!(Config::default().housekeeping.sort_dir, None);
    }

    #[test]
    fn custom_sort_rules_replace_defaults() {
        let config = Config::from_toml(
            r#"
            [housekeeping.sort_rules]
            ".MP4" = "Videos"
            rs = "Code"
            "#,
        )
        .unwrap();
        let rules = &config.housekeeping.sort_rules;
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.folder_for(Path::new("clip.mp4")), Some("Videos"));
        assert_eq!(rules.folder_for(Path::new("main.RS")), Some("Code"));
        assert_eq!(rules.folder_for(Path::new("photo.png")), None);
    }

    #[test]
    fn default_rules_are_case_insensitive() {
        let rules = SortRules::default();
        assert_eq!(rules.folder_for(Path::new("Scan.PDF")), Some("PDFs"));
        assert_eq!(rules.folder_for(Path::new("photo.JpEg")), Some("Images"));
        assert_eq!(rules.folder_for(Path::new("README")), None);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[dedupe\nthreads = ").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseConfig { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadConfig { .. }));
    }
}
