//! Abstracción sobre Rig para hablar con el servidor local de Ollama:
//! embeddings, generación con contexto y gestión básica de modelos.

use std::time::Duration;

use anyhow::{anyhow, Result};
use rig::client::{CompletionClient, EmbeddingsClient};
use rig::completion::Prompt;
use rig::embeddings::EmbeddingModel;
use rig::providers::ollama;
use serde_json::json;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Ventana de contexto del modelo de chat (tokens).
const NUM_CTX: u32 = 2048;
/// Tope de tokens generados por respuesta.
const NUM_PREDICT: u32 = 512;

/// Gestor del LLM y de los embeddings servidos por Ollama.
#[derive(Debug, Clone)]
pub struct LlmManager {
    pub base_url: String,
    pub chat_model: String,
    pub embed_model: String,
    pub keep_alive: String,
}

impl LlmManager {
    /// Construye el gestor a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            base_url: cfg.ollama_base_url.trim_end_matches('/').to_string(),
            chat_model: cfg.ollama_model.clone(),
            embed_model: cfg.ollama_embed_model.clone(),
            keep_alive: cfg.ollama_keep_alive.clone(),
        }
    }

    fn client(&self) -> Result<ollama::Client> {
        Ok(ollama::Client::builder()
            .base_url(&self.base_url)
            .build())
    }

    /// Comprueba que el servidor de Ollama responde (`GET /api/tags`).
    pub async fn ping(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let response = reqwest::Client::new()
            .get(&url)
            .timeout(Duration::from_secs(3))
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "No puedo conectar con Ollama en {}. Asegúrate de que está \
                     instalado y ejecutándose. Detalle: {e}",
                    self.base_url
                )
            })?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Ollama respondió con status {} en {url}",
                response.status()
            ));
        }
        info!("OK Ollama: {}", self.base_url);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // EMBEDDINGS
    // ---------------------------------------------------------------------

    /// Calcula los embeddings de una lista de textos, en el mismo orden.
    pub async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>> {
        let expected = texts.len();
        let client = self.client()?;
        let embedding_model = client.embedding_model(&self.embed_model);
        let embeddings = embedding_model.embed_texts(texts).await?;

        if embeddings.len() != expected {
            return Err(anyhow!(
                "Número de embeddings ({}) distinto al número de textos ({})",
                embeddings.len(),
                expected
            ));
        }

        Ok(embeddings.into_iter().map(|e| e.vec).collect())
    }

    // ---------------------------------------------------------------------
    // CHAT / COMPLETION
    // ---------------------------------------------------------------------

    /// Genera una respuesta a partir de un preámbulo de persona, la pregunta
    /// y el contexto recuperado. Generación acotada: ventana de 2048 tokens
    /// y 512 tokens de salida como máximo.
    pub async fn answer_with_context(
        &self,
        preamble: &str,
        question: &str,
        context: &str,
    ) -> Result<String> {
        let client = self.client()?;

        let agent = client
            .agent(&self.chat_model)
            .preamble(preamble)
            .context(context)
            .additional_params(json!({
                "options": {
                    "num_ctx": NUM_CTX,
                    "num_predict": NUM_PREDICT,
                },
                "keep_alive": self.keep_alive,
            }))
            .build();

        let answer = agent.prompt(question).await?;
        Ok(answer)
    }

    // ---------------------------------------------------------------------
    // GESTIÓN DE MODELOS (CLI de ollama)
    // ---------------------------------------------------------------------

    /// Descarga los modelos de chat y de embeddings con `ollama pull`.
    pub async fn pull_models(&self) -> Result<()> {
        for model in [&self.chat_model, &self.embed_model] {
            info!("Pulling model: {model}");
            let status = Command::new("ollama")
                .args(["pull", model])
                .status()
                .await
                .map_err(|_| anyhow!("No encuentro 'ollama' en el PATH. ¿Está instalado?"))?;
            if !status.success() {
                return Err(anyhow!("Falló 'ollama pull {model}'"));
            }
        }
        info!("OK. Modelos listos.");
        Ok(())
    }

    /// Descarga de memoria el modelo de chat (`ollama stop`). No es fatal:
    /// si el binario no está o el comando falla, solo se avisa.
    pub async fn reset_model(&self) {
        match Command::new("ollama")
            .args(["stop", &self.chat_model])
            .status()
            .await
        {
            Ok(status) if !status.success() => {
                warn!("'ollama stop {}' terminó con {status}", self.chat_model);
            }
            Ok(_) => {}
            Err(_) => warn!("No encuentro 'ollama' en el PATH; omito el reinicio del modelo."),
        }
    }
}
