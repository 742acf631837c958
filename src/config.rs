use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.yml";

#[derive(Debug)]
pub struct AppConfig {
    pub root: PathBuf,
    pub server_name: String,
    pub items_file: PathBuf,
    pub map_dir: PathBuf,
    pub log_level: String,
}

/// Optional `<root>/config.yml`. Relative paths resolve against the root.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server_name: Option<String>,
    pub items_file: Option<PathBuf>,
    pub map_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl ServerConfig {
    pub fn load(root: &Path) -> Result<Self, String> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
        Self::parse(&content).map_err(|err| format!("{}: {}", path.display(), err))
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|err| format!("invalid config: {}", err))
    }
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        if args.len() < 2 {
            return Err("usage: tibia-tile <asset-root>".to_string());
        }

        let root = Path::new(&args[1]).to_path_buf();
        let file = ServerConfig::load(&root)?;
        Ok(Self::resolve(root, file, |key| std::env::var(key).ok()))
    }

    fn resolve(
        root: PathBuf,
        file: ServerConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env = |key: &str| {
            lookup(key).and_then(|value| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
        };

        let items_file = env("TIBIA_ITEMS_FILE")
            .map(PathBuf::from)
            .or(file.items_file)
            .unwrap_or_else(|| PathBuf::from("dat/items.yml"));
        let map_dir = env("TIBIA_MAP_DIR")
            .map(PathBuf::from)
            .or(file.map_dir)
            .unwrap_or_else(|| PathBuf::from("map"));
        let log_level = env("TIBIA_LOG_LEVEL")
            .or(file.log_level)
            .unwrap_or_else(|| "info".to_string());
        let server_name = file.server_name.unwrap_or_else(|| "tibia".to_string());

        Self {
            items_file: root.join(items_file),
            map_dir: root.join(map_dir),
            root,
            server_name,
            log_level,
        }
    }
}
