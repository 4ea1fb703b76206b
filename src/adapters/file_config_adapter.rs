//! INI file configuration adapter.
//!
//! Only `#` starts a comment: condition lists use `;` as their separator, so
//! the INI reader must leave it alone. Section and key names are
//! case-insensitive and reported in lowercase.

use crate::ports::config_port::ConfigPort;
use configparser::ini::{Ini, IniDefault};
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    fn empty() -> Ini {
        let mut defaults = IniDefault::default();
        defaults.comment_symbols = vec!['#'];
        Ini::new_from_defaults(defaults)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Self::empty();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Self::empty();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn sections(&self) -> Vec<String> {
        let mut sections = self.config.sections();
        sections.sort();
        sections
    }

    fn keys(&self, section: &str) -> Vec<String> {
        let section = section.to_lowercase();
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(&section)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[strategy.ema_cross]
id = 1
display_name = EMA Cross
entry_long = crosses_above(ema_20, ema_50)
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("strategy.ema_cross", "display_name"),
            Some("EMA Cross".to_string())
        );
        assert_eq!(
            adapter.get_string("strategy.ema_cross", "entry_long"),
            Some("crosses_above(ema_20, ema_50)".to_string())
        );
    }

    #[test]
    fn semicolons_survive_in_values() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy.a]\nentry_long = above(close, ema_20); below(rsi_14, 70)\n# comment line\n",
        )
        .unwrap();
        assert_eq!(
            adapter.get_string("strategy.a", "entry_long"),
            Some("above(close, ema_20); below(rsi_14, 70)".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[strategy.a]\nid = 1\n").unwrap();
        assert_eq!(adapter.get_string("strategy.a", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn sections_and_keys_are_sorted() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy.b]\nid = 2\n[risk_profiles]\ntight = 0.5\n[strategy.a]\nid = 1\ndetail.exit = x\n",
        )
        .unwrap();
        let sections = adapter.sections();
        let strategies: Vec<&String> =
            sections.iter().filter(|s| s.starts_with("strategy.")).collect();
        assert_eq!(strategies, vec!["strategy.a", "strategy.b"]);
        assert!(sections.contains(&"risk_profiles".to_string()));
        assert_eq!(adapter.keys("strategy.a"), vec!["detail.exit", "id"]);
        assert!(adapter.keys("nope").is_empty());
    }

    #[test]
    fn names_are_case_insensitive() {
        let adapter = FileConfigAdapter::from_string("[Strategy.EMA]\nID = 3\n").unwrap();
        assert_eq!(adapter.get_string("strategy.ema", "id"), Some("3".to_string()));
        assert_eq!(adapter.keys("Strategy.EMA"), vec!["id"]);
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[risk_profiles]\ntight = 0.5\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("risk_profiles", "tight"),
            Some("0.5".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(result.is_err());
    }
}
