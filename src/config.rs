use anyhow::Result;
use thiserror::Error;

/// Contraseña del nodo si no hay `LAVA_PASSWORD` ni `LAVALINK_PASSWORD`.
/// Coincide con el `application.yml` por defecto de Lavalink.
pub const DEFAULT_NODE_PASSWORD: &str = "youshallnotpass";

#[derive(Error, Debug)]
pub enum ConfigError {
    /// Falta una variable de entorno obligatoria
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub prefix: String,

    // Lavalink
    pub lava_host: String,
    pub lava_port: u16,
    pub lava_password: String,
    pub lava_secure: bool,
    pub search_provider: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración desde una función de búsqueda de claves,
    /// así los tests no tocan el entorno del proceso.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("DISCORD_TOKEN".to_string()))?;

        let lava_port = match lookup("LAVA_PORT") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                name: "LAVA_PORT",
                reason: format!("{e}"),
            })?,
            None => defaults.lava_port,
        };

        let lava_secure = match lookup("LAVA_SECURE") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                name: "LAVA_SECURE",
                reason: format!("{e}"),
            })?,
            None => defaults.lava_secure,
        };

        let config = Self {
            discord_token,
            prefix: lookup("PREFIX").unwrap_or(defaults.prefix),
            lava_host: lookup("LAVA_HOST").unwrap_or(defaults.lava_host),
            lava_port,
            lava_password: lookup("LAVA_PASSWORD")
                .or_else(|| lookup("LAVALINK_PASSWORD"))
                .unwrap_or(defaults.lava_password),
            lava_secure,
            search_provider: lookup("SEARCH_PROVIDER").unwrap_or(defaults.search_provider),
        };

        config.validate()?;

        Ok(config)
    }

    /// Valida la configuración
    ///
    /// - El prefijo no puede estar vacío, o todo mensaje sería un comando
    /// - El puerto del nodo debe ser mayor que 0
    /// - El proveedor de búsqueda no puede estar vacío
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            anyhow::bail!(ConfigError::InvalidValue {
                name: "PREFIX",
                reason: "prefix must not be empty".to_string(),
            });
        }

        if self.lava_port == 0 {
            anyhow::bail!(ConfigError::InvalidValue {
                name: "LAVA_PORT",
                reason: "port must be greater than 0".to_string(),
            });
        }

        if self.search_provider.trim().is_empty() {
            anyhow::bail!(ConfigError::InvalidValue {
                name: "SEARCH_PROVIDER",
                reason: "search provider must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// `host:port` del nodo Lavalink configurado
    pub fn node_endpoint(&self) -> String {
        format!("{}:{}", self.lava_host, self.lava_port)
    }

    /// Obtiene un resumen de la configuración para logging.
    ///
    /// Nunca incluye el token del bot ni la contraseña del nodo.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Prefix: {}\n  \
            Lavalink: {} (tls={}, custom secret={})\n  \
            Search provider: {}",
            self.prefix,
            self.node_endpoint(),
            self.lava_secure,
            self.lava_password != DEFAULT_NODE_PASSWORD,
            self.search_provider,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (token has no default - must be provided)
            discord_token: String::new(),
            prefix: "m!".to_string(),

            // Lavalink defaults
            lava_host: "localhost".to_string(),
            lava_port: 2333,
            lava_password: DEFAULT_NODE_PASSWORD.to_string(),
            lava_secure: false,
            search_provider: "ytsearch".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::MissingEnvVar(name)) if name == "DISCORD_TOKEN"
        ));
    }

    #[test]
    fn test_defaults_apply() {
        let config = Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "abc")])).unwrap();
        assert_eq!(config.prefix, "m!");
        assert_eq!(config.node_endpoint(), "localhost:2333");
        assert_eq!(config.lava_password, DEFAULT_NODE_PASSWORD);
        assert_eq!(config.search_provider, "ytsearch");
        assert!(!config.lava_secure);
    }

    #[test]
    fn test_password_falls_back_to_lavalink_password() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("LAVALINK_PASSWORD", "second"),
        ]))
        .unwrap();
        assert_eq!(config.lava_password, "second");

        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("LAVA_PASSWORD", "first"),
            ("LAVALINK_PASSWORD", "second"),
        ]))
        .unwrap();
        assert_eq!(config.lava_password, "first");
    }

    #[test]
    fn test_invalid_port_and_empty_prefix() {
        assert!(Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("LAVA_PORT", "not-a-port"),
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("LAVA_PORT", "0"),
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup_from(&[("DISCORD_TOKEN", "abc"), ("PREFIX", "")])).is_err());
    }

    #[test]
    fn test_summary_hides_secrets() {
        let config = Config::from_lookup(lookup_from(&[
            ("DISCORD_TOKEN", "super-secret-token"),
            ("LAVA_PASSWORD", "node-secret"),
        ]))
        .unwrap();
        let summary = config.summary();
        assert!(!summary.contains("super-secret-token"));
        assert!(!summary.contains("node-secret"));
        assert!(summary.contains("localhost:2333"));
    }
}
