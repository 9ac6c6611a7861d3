//! Carga y gestión de configuración de la aplicación (Neo4j + Ollama + web).

use std::env;

use anyhow::{anyhow, Result};

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    pub ollama_base_url: String,
    pub ollama_model: String,
    pub ollama_embed_model: String,
    pub ollama_keep_alive: String,
    pub ollama_reset_on_start: bool,

    pub web_port: u16,
    pub csv_path: String,
    pub index_dir: String,
    pub wipe_on_load: bool,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    /// La contraseña de Neo4j es obligatoria; el resto tiene valores por defecto.
    pub fn from_env() -> Result<Self> {
        let neo4j_uri =
            env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://localhost:7687".to_string());
        let neo4j_user = env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string());
        let neo4j_password =
            env::var("NEO4J_PASSWORD").map_err(|_| anyhow!("Falta NEO4J_PASSWORD en el entorno"))?;
        if neo4j_password.is_empty() {
            return Err(anyhow!("NEO4J_PASSWORD está vacía en el entorno"));
        }

        let ollama_base_url =
            env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());
        let ollama_model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| "phi3:mini".to_string());
        let ollama_embed_model =
            env::var("OLLAMA_EMBED_MODEL").unwrap_or_else(|_| "nomic-embed-text".to_string());
        let ollama_keep_alive = env::var("OLLAMA_KEEP_ALIVE").unwrap_or_else(|_| "0".to_string());
        let ollama_reset_on_start = env_flag("OLLAMA_RESET_ON_START", false);

        let web_port = match env::var("WEB_APP_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| anyhow!("WEB_APP_PORT no es un puerto válido: {raw}"))?,
            Err(_) => 8000,
        };

        let csv_path = env::var("CSV_PATH")
            .unwrap_or_else(|_| "data/smartphone-specification.csv".to_string());
        let index_dir = env::var("INDEX_DIR").unwrap_or_else(|_| "index_store".to_string());
        let wipe_on_load = env_flag("GRAPH_WIPE_ON_LOAD", true);

        Ok(Self {
            neo4j_uri,
            neo4j_user,
            neo4j_password,
            ollama_base_url,
            ollama_model,
            ollama_embed_model,
            ollama_keep_alive,
            ollama_reset_on_start,
            web_port,
            csv_path,
            index_dir,
            wipe_on_load,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("0.0.0.0:{}", self.web_port)
    }
}

/// Interpreta una variable de entorno como flag ("1"/"true"/"yes", sin
/// distinguir mayúsculas). Ausente → `default`.
fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Una sola prueba toca el entorno del proceso para evitar carreras entre
    // tests paralelos.
    #[test]
    fn from_env_aplica_defaults() {
        for name in [
            "NEO4J_URI",
            "NEO4J_USER",
            "OLLAMA_BASE_URL",
            "OLLAMA_MODEL",
            "OLLAMA_EMBED_MODEL",
            "OLLAMA_KEEP_ALIVE",
            "OLLAMA_RESET_ON_START",
            "WEB_APP_PORT",
            "CSV_PATH",
            "INDEX_DIR",
            "GRAPH_WIPE_ON_LOAD",
        ] {
            env::remove_var(name);
        }
        env::set_var("NEO4J_PASSWORD", "secreto");

        let cfg = AppConfig::from_env().expect("la configuración por defecto debe cargar");
        assert_eq!(cfg.neo4j_uri, "bolt://localhost:7687");
        assert_eq!(cfg.neo4j_user, "neo4j");
        assert_eq!(cfg.ollama_base_url, "http://localhost:11434");
        assert_eq!(cfg.ollama_model, "phi3:mini");
        assert_eq!(cfg.ollama_embed_model, "nomic-embed-text");
        assert_eq!(cfg.ollama_keep_alive, "0");
        assert!(!cfg.ollama_reset_on_start);
        assert_eq!(cfg.web_port, 8000);
        assert_eq!(cfg.csv_path, "data/smartphone-specification.csv");
        assert_eq!(cfg.index_dir, "index_store");
        assert!(cfg.wipe_on_load);
        assert_eq!(cfg.server_addr(), "0.0.0.0:8000");

        env::set_var("WEB_APP_PORT", "no-es-un-puerto");
        assert!(AppConfig::from_env().is_err());
        env::remove_var("WEB_APP_PORT");

        env::remove_var("NEO4J_PASSWORD");
        assert!(AppConfig::from_env().is_err());
    }
}
