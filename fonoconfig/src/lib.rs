//! # FonoBox Configuration Module
//!
//! Ce module fournit la gestion de la configuration de FonoBox :
//! - Chargement depuis un fichier YAML externe
//! - Fusion avec la configuration par défaut intégrée
//! - Overrides par variables d'environnement
//! - Getters/setters typés pour les valeurs de configuration
//! - Accès singleton thread-safe
//!
//! ## Utilisation
//!
//! ```no_run
//! use fonoconfig::get_config;
//!
//! let config = get_config();
//! let port = config.get_http_port();
//! let audio_dir = config.get_audio_dir()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing::info;
use uuid::Uuid;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("fonobox.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load FonoBox configuration"));
}

const ENV_CONFIG_DIR: &str = "FONOBOX_CONFIG";
const ENV_PREFIX: &str = "FONOBOX_CONFIG__";

// Valeurs par défaut quand la clé est absente du YAML
const DEFAULT_HTTP_PORT: u16 = 8090;
const DEFAULT_BASE_URL: &str = "http://localhost";
const DEFAULT_EXTRACTION_BINARY: &str = "yt-dlp";
const DEFAULT_STREAM_URL_TTL_SECS: u64 = 7200;
const DEFAULT_LOG_MIN_LEVEL: &str = "info";

/// Macro pour générer getter/setter de valeurs chaîne avec défaut
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> String {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.is_empty() => s,
                _ => $default.to_string(),
            }
        }

        pub fn $setter(&self, value: &str) -> Result<()> {
            self.set_value($path, Value::String(value.to_string()))
        }
    };
}

/// Macro pour générer getter/setter de valeurs entières avec défaut
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> u64 {
            match self.get_value($path) {
                Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap(),
                Ok(Value::Number(n)) if n.is_i64() => n.as_i64().unwrap().max(0) as u64,
                _ => $default,
            }
        }

        pub fn $setter(&self, value: u64) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Macro pour générer getter/setter de valeurs booléennes avec défaut
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> bool {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => b,
                _ => $default,
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Paramètres du tier de stockage durable (objet compatible S3)
///
/// Le tier est considéré comme désactivé tant que `bucket` est vide.
#[derive(Debug, Clone)]
pub struct DurableTierSettings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub prefix: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// Gestionnaire de configuration de FonoBox
///
/// Charge la configuration YAML, la fusionne avec les valeurs par défaut
/// intégrées, applique les overrides d'environnement et expose des accesseurs
/// typés. Conçu pour être utilisé via le singleton [`get_config`].
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: String,
    data: Mutex<Value>,
}

impl Config {
    /// Cherche le répertoire de configuration en essayant plusieurs emplacements
    fn find_config_dir(directory: &str) -> String {
        // 1. Répertoire fourni explicitement
        if !directory.is_empty() {
            return directory.to_string();
        }

        // 2. Variable d'environnement
        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        // 3. Répertoire courant
        if Path::new(".fonobox").exists() {
            return ".fonobox".to_string();
        }

        // 4. Répertoire home
        if let Some(home) = home_dir() {
            let home_config = home.join(".fonobox");
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        // Défaut
        if let Some(home) = home_dir() {
            return home.join(".fonobox").to_string_lossy().to_string();
        }
        ".fonobox".to_string()
    }

    /// Valide et prépare le répertoire de configuration
    fn validate_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("Le chemin spécifié n'est pas un répertoire"));
        }

        // Test d'écriture
        let test_file = path.join(".write_test");
        fs::write(&test_file, b"test")?;
        fs::remove_file(&test_file)?;

        Ok(())
    }

    /// Détermine et valide le répertoire de configuration
    pub fn config_dir(directory: &str) -> String {
        let dir_path = Self::find_config_dir(directory);
        let path = Path::new(&dir_path);

        Self::validate_config_dir(path)
            .expect("Impossible de valider le répertoire de configuration");

        dir_path
    }

    /// Charge la configuration depuis le répertoire spécifié
    ///
    /// 1. Détermine le répertoire de configuration
    /// 2. Charge la configuration par défaut intégrée
    /// 3. Fusionne avec le fichier config.yaml externe s'il existe
    /// 4. Applique les overrides de variables d'environnement
    /// 5. Sauvegarde la configuration fusionnée
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory);
        info!(config_dir = %config_dir, "Using config directory");

        let config_file_path = Path::new(&config_dir).join("config.yaml");
        let path = config_file_path.to_string_lossy().to_string();

        let mut default_value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        let yaml_data = if let Ok(data) = fs::read(&path) {
            info!(config_file = %path, "Loaded config file");
            data
        } else {
            info!(config_file = %path, "Config file not found, using default embedded config");
            DEFAULT_CONFIG.as_bytes().to_vec()
        };

        let external_value: Value = serde_yaml::from_slice(&yaml_data)?;
        merge_yaml(&mut default_value, &external_value);
        let mut config_value = lower_keys_value(default_value);

        Self::apply_env_overrides(&mut config_value);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(config_value),
        };

        config.save()?;
        Ok(config)
    }

    /// Applique les overrides `FONOBOX_CONFIG__SECTION__KEY=value`
    ///
    /// La valeur est interprétée comme un scalaire YAML (nombre, booléen)
    /// quand c'est possible, sinon comme une chaîne.
    fn apply_env_overrides(data: &mut Value) {
        for (key, raw) in env::vars() {
            let Some(suffix) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            let path: Vec<String> = suffix
                .split("__")
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect();
            if path.is_empty() {
                continue;
            }

            let value: Value =
                serde_yaml::from_str(&raw).unwrap_or(Value::String(raw.clone()));

            let path_refs: Vec<&str> = path.iter().map(|s| s.as_str()).collect();
            if let Err(e) = Self::set_value_internal(data, &path_refs, value) {
                tracing::warn!(var = %key, "Cannot apply env override: {}", e);
            } else {
                info!(var = %key, "Applied config override from environment");
            }
        }
    }

    /// Sauvegarde la configuration courante dans le fichier config.yaml
    pub fn save(&self) -> Result<()> {
        let data = self.data.lock().unwrap();
        let yaml = serde_yaml::to_string(&*data)?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Positionne une valeur au chemin donné et sauvegarde
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        let mut data = self.data.lock().unwrap();
        Self::set_value_internal(&mut data, path, value)?;
        drop(data);
        self.save()?;
        Ok(())
    }

    fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
        if path.is_empty() {
            *data = value;
            return Ok(());
        }
        if let Value::Mapping(map) = data {
            let key = path[0].to_lowercase();
            let key_value = Value::String(key);
            if path.len() == 1 {
                map.insert(key_value, value);
            } else {
                let entry = map
                    .entry(key_value)
                    .or_insert(Value::Mapping(Mapping::new()));
                Self::set_value_internal(entry, &path[1..], value)?;
            }
            Ok(())
        } else {
            Err(anyhow!("Le chemin ne traverse pas un mapping YAML"))
        }
    }

    /// Lit la valeur au chemin donné (Null si absente)
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock().unwrap();
        let mut current = &*data;
        for key in path {
            let lowered = key.to_lowercase();
            match current {
                Value::Mapping(map) => match map.get(&Value::String(lowered)) {
                    Some(v) => current = v,
                    None => return Ok(Value::Null),
                },
                _ => return Ok(Value::Null),
            }
        }
        Ok(current.clone())
    }

    /// Retourne le répertoire de configuration
    pub fn get_config_dir(&self) -> &str {
        &self.config_dir
    }

    // ============ Serveur HTTP ============

    impl_string_config!(get_base_url, set_base_url, &["host", "base_url"], DEFAULT_BASE_URL);

    pub fn get_http_port(&self) -> u16 {
        match self.get_value(&["host", "http_port"]) {
            Ok(Value::Number(n)) if n.is_u64() => n.as_u64().unwrap() as u16,
            _ => DEFAULT_HTTP_PORT,
        }
    }

    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_value(&["host", "http_port"], Value::Number(Number::from(port)))
    }

    /// UUID de l'instance, généré et persisté au premier accès
    pub fn get_instance_uuid(&self) -> Result<String> {
        match self.get_value(&["server", "uuid"])? {
            Value::String(s) if !s.is_empty() => Ok(s),
            _ => {
                let id = Uuid::new_v4().to_string();
                self.set_value(&["server", "uuid"], Value::String(id.clone()))?;
                Ok(id)
            }
        }
    }

    // ============ Stockage ============

    /// Répertoire de données (créé si nécessaire)
    ///
    /// Vide dans la configuration = sous-répertoire `data` du répertoire
    /// de configuration.
    pub fn get_data_dir(&self) -> Result<String> {
        let dir = match self.get_value(&["storage", "data_dir"])? {
            Value::String(s) if !s.is_empty() => PathBuf::from(s),
            _ => Path::new(&self.config_dir).join("data"),
        };
        fs::create_dir_all(&dir)?;
        Ok(dir.to_string_lossy().to_string())
    }

    /// Répertoire du tier local de stockage audio (créé si nécessaire)
    pub fn get_audio_dir(&self) -> Result<String> {
        let dir = Path::new(&self.get_data_dir()?).join("audio");
        fs::create_dir_all(&dir)?;
        Ok(dir.to_string_lossy().to_string())
    }

    /// Chemin de la base SQLite du registre de pistes
    pub fn get_registry_db_path(&self) -> Result<String> {
        let dir = self.get_data_dir()?;
        Ok(Path::new(&dir)
            .join("registry.db")
            .to_string_lossy()
            .to_string())
    }

    /// Paramètres du tier durable, ou None si le tier est désactivé
    pub fn get_durable_tier(&self) -> Option<DurableTierSettings> {
        let get_str = |path: &[&str]| -> Option<String> {
            match self.get_value(path) {
                Ok(Value::String(s)) if !s.is_empty() => Some(s),
                _ => None,
            }
        };

        let bucket = get_str(&["storage", "durable", "bucket"])?;

        Some(DurableTierSettings {
            bucket,
            region: get_str(&["storage", "durable", "region"])
                .unwrap_or_else(|| "us-east-1".to_string()),
            endpoint: get_str(&["storage", "durable", "endpoint"]),
            prefix: get_str(&["storage", "durable", "prefix"])
                .unwrap_or_else(|| "fonobox/audio".to_string()),
            access_key_id: get_str(&["storage", "durable", "access_key_id"]),
            secret_access_key: get_str(&["storage", "durable", "secret_access_key"]),
        })
    }

    // ============ Extraction ============

    impl_string_config!(
        get_extraction_binary,
        set_extraction_binary,
        &["extraction", "binary"],
        DEFAULT_EXTRACTION_BINARY
    );

    // ============ Streaming ============

    impl_u64_config!(
        get_stream_url_ttl_secs,
        set_stream_url_ttl_secs,
        &["streaming", "url_ttl_secs"],
        DEFAULT_STREAM_URL_TTL_SECS
    );

    // ============ Logs ============

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["logs", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );

    impl_bool_config!(get_log_enable_console, set_log_enable_console, &["logs", "console"], true);
}

// Implémentation manuelle de Clone (Mutex n'est pas Clone)
impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data.lock().unwrap().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

/// Fusionne récursivement `other` dans `base`
///
/// Les mappings sont fusionnés clé par clé, toute autre valeur de `other`
/// remplace celle de `base`.
fn merge_yaml(base: &mut Value, other: &Value) {
    match (base, other) {
        (Value::Mapping(base_map), Value::Mapping(other_map)) => {
            for (key, other_value) in other_map {
                match base_map.get_mut(key) {
                    Some(base_value) => merge_yaml(base_value, other_value),
                    None => {
                        base_map.insert(key.clone(), other_value.clone());
                    }
                }
            }
        }
        (base, other) => {
            *base = other.clone();
        }
    }
}

/// Normalise toutes les clés de mapping en minuscules
fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut lowered = Mapping::new();
            for (key, val) in map {
                let key = match key {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                lowered.insert(key, lower_keys_value(val));
            }
            Value::Mapping(lowered)
        }
        other => other,
    }
}

/// Retourne le singleton de configuration global
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_yaml_overrides_scalars() {
        let mut base: Value = serde_yaml::from_str("host:\n  http_port: 8090\n  base_url: a").unwrap();
        let other: Value = serde_yaml::from_str("host:\n  http_port: 9999").unwrap();
        merge_yaml(&mut base, &other);

        let host = base.get("host").unwrap();
        assert_eq!(host.get("http_port").unwrap().as_u64(), Some(9999));
        assert_eq!(host.get("base_url").unwrap().as_str(), Some("a"));
    }

    #[test]
    fn test_load_config_in_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();

        assert_eq!(config.get_http_port(), 8090);
        assert_eq!(config.get_extraction_binary(), "yt-dlp");
        assert_eq!(config.get_stream_url_ttl_secs(), 7200);
        // Le tier durable est désactivé par défaut (bucket vide)
        assert!(config.get_durable_tier().is_none());

        // Le fichier config.yaml a été créé
        assert!(dir.path().join("config.yaml").exists());
    }

    #[test]
    fn test_set_and_get_value() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();

        config
            .set_value(
                &["storage", "durable", "bucket"],
                Value::String("my-bucket".to_string()),
            )
            .unwrap();

        let durable = config.get_durable_tier().expect("tier should be enabled");
        assert_eq!(durable.bucket, "my-bucket");
        assert_eq!(durable.prefix, "fonobox/audio");
    }

    #[test]
    fn test_instance_uuid_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();

        let first = config.get_instance_uuid().unwrap();
        let second = config.get_instance_uuid().unwrap();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }
}
