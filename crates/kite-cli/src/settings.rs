use std::path::Path;
use std::path::PathBuf;

use kite_core::Config;

pub const CONFIG_FILE: &str = "config.toml";

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("kite").join(CONFIG_FILE))
}

pub fn default_journal_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("kite").join("journal.jsonl"))
}

/// Loads `path` if given, else the default location when it exists, else
/// built-in defaults. YAML is accepted for `.yaml`/`.yml` files.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_config_path().filter(|path| path.exists()) {
            Some(path) => path,
            None => return Ok(Config::default()),
        },
    };
    let raw = std::fs::read_to_string(&path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    parse_config(&path, &raw)
}

pub fn parse_config(path: &Path, raw: &str) -> Result<Config, Box<dyn std::error::Error>> {
    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    );
    let config = if is_yaml {
        Config::from_yaml_str(raw)?
    } else {
        toml::from_str(raw)?
    };
    Ok(config)
}

pub fn journal_path(config: &Config, override_path: Option<PathBuf>) -> Option<PathBuf> {
    if override_path.is_some() {
        return override_path;
    }
    if !config.journal.enabled {
        return None;
    }
    config.journal.path.clone().or_else(default_journal_path)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use std::io::Write;

    use super::*;

    #[test]
    fn toml_and_yaml_configs_agree() {
        let toml_src = "[session]\nagent_name = \"proverbs\"\n\n[actions]\nenable = [\"go_to_moon\"]\n";
        let yaml_src = "session:\n  agent_name: proverbs\nactions:\n  enable: [go_to_moon]\n";
        let from_toml = parse_config(Path::new("config.toml"), toml_src).unwrap();
        let from_yaml = parse_config(Path::new("config.yaml"), yaml_src).unwrap();
        assert_eq!(from_toml, from_yaml);
        assert_eq!(from_toml.session.agent_name, "proverbs");
        assert_eq!(from_toml.session.log_capacity, 2_000);
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[display]\ntheme_color = \"teal\"").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.display.theme_color, "teal");
    }

    #[test]
    fn journal_is_off_unless_enabled_or_overridden() {
        let mut config = Config::default();
        assert_eq!(journal_path(&config, None), None);
        let explicit = PathBuf::from("/tmp/kite.jsonl");
        assert_eq!(journal_path(&config, Some(explicit.clone())), Some(explicit.clone()));

        config.journal.enabled = true;
        config.journal.path = Some(explicit.clone());
        assert_eq!(journal_path(&config, None), Some(explicit));
    }
}
