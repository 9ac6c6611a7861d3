//! Motor de consulta RAG sobre el índice de resúmenes de phones.
//!
//! Flujo por pregunta:
//!   1. Embedding de la consulta.
//!   2. Recuperación top-k con diversidad (MMR, alpha 0.7) sobre el índice.
//!   3. Construcción del contexto (resúmenes concatenados).
//!   4. El LLM responde con el preámbulo de persona fijo.
//!
//! Cada pregunta es independiente: no se conserva memoria entre turnos.

use std::path::Path;

use anyhow::Result;

use crate::{
    config::AppConfig,
    llm::LlmManager,
    vector_store::{PhoneIndex, ScoredDoc},
};

pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_ALPHA: f64 = 0.7;

/// Persona fija del asistente. Acota el tono, el idioma, el rechazo de
/// preguntas fuera de tema y la política de no dar precios exactos.
pub const SYSTEM_PROMPT: &str = "\
Eres un asistente especializado en smartphones. Responde siempre en español de España, \
tutea y usa un tono natural. Evita modismos latinoamericanos. No uses 'señor/señora' \
ni tratamientos formales. No mezcles inglés ni escribas etiquetas.

Reglas de comportamiento:
Tu objetivo es dar información sobre un modelo de smartphone o recomendar al usuario \
un smartphone según la información que te proporcione.
Nunca des el precio exacto: di que varía según la zona y da una estimación de si es \
caro o barato.
Además, sé muy concreto al responder lo que te pregunta el usuario.
Si te preguntan algo que no está relacionado con teléfonos móviles, rechaza amablemente \
la pregunta y di cuál es tu función.";

/// Respuesta fija cuando la recuperación no aporta ningún documento.
pub const NO_CONTEXT_REPLY: &str = "No se encontró información relevante en la base de datos \
para responder a esta pregunta.";

/// Texto de bienvenida del chat (web y consola).
pub const INTRO_TEXT: &str = "\
Hola. Soy un asistente RAG de especificaciones de móviles. Mi función es ayudarte a \
encontrar qué móvil es mejor para lo que buscas, usando una base de datos local de \
modelos y sus características. Solo respondo preguntas sobre móviles.";

/// Motor de consulta: índice cargado, LLM y parámetros de recuperación.
/// Se construye una vez en el arranque y se comparte entre peticiones.
pub struct QueryEngine {
    index: PhoneIndex,
    llm: LlmManager,
    top_k: usize,
    alpha: f64,
}

impl QueryEngine {
    pub fn new(index: PhoneIndex, llm: LlmManager) -> Self {
        Self {
            index,
            llm,
            top_k: DEFAULT_TOP_K,
            alpha: DEFAULT_ALPHA,
        }
    }

    /// Carga el índice persistido y arma el motor con la configuración dada.
    pub fn from_persisted(cfg: &AppConfig) -> Result<Self> {
        let index = PhoneIndex::load(Path::new(&cfg.index_dir))?;
        tracing::info!(
            "Índice cargado: {} documentos (embeddings: {}).",
            index.doc_count(),
            index.embed_model()
        );
        Ok(Self::new(index, LlmManager::from_config(cfg)))
    }

    /// Solo recuperación (sin generación): embedding de la consulta y top-k
    /// diverso. Lo usa el diagnóstico `query-index`.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<ScoredDoc>> {
        let mut embeddings = self.llm.embed_texts(vec![question.to_string()]).await?;
        let query_vec = embeddings
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No se pudo generar el embedding de la consulta"))?;
        Ok(self.index.top_k_mmr(&query_vec, top_k, self.alpha))
    }

    /// Responde una pregunta con recuperación + generación.
    pub async fn answer(&self, question: &str) -> Result<String> {
        if self.index.doc_count() == 0 {
            return Ok(NO_CONTEXT_REPLY.to_string());
        }

        let hits = self.retrieve(question, self.top_k).await?;
        if hits.is_empty() {
            return Ok(NO_CONTEXT_REPLY.to_string());
        }

        let context = join_context(&hits);
        self.llm
            .answer_with_context(SYSTEM_PROMPT, question, &context)
            .await
    }
}

/// Concatena los resúmenes recuperados en un único bloque de contexto.
pub fn join_context(hits: &[ScoredDoc]) -> String {
    let texts: Vec<&str> = hits.iter().map(|h| h.doc.text.as_str()).collect();
    texts.join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::PhoneDoc;

    #[test]
    fn la_persona_codifica_rechazo_y_politica_de_precios() {
        assert!(SYSTEM_PROMPT.contains("rechaza amablemente"));
        assert!(SYSTEM_PROMPT.contains("no está relacionado con teléfonos móviles"));
        assert!(SYSTEM_PROMPT.contains("Nunca des el precio exacto"));
        assert!(SYSTEM_PROMPT.contains("español de España"));
    }

    #[test]
    fn indice_vacio_responde_sin_llamar_al_modelo() {
        let index = PhoneIndex::from_parts("nomic-embed-text", Vec::new(), Vec::new())
            .expect("un índice vacío es coherente");
        let llm = LlmManager {
            base_url: "http://localhost:11434".to_string(),
            chat_model: "phi3:mini".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            keep_alive: "0".to_string(),
        };
        let engine = QueryEngine::new(index, llm);

        let reply = tokio_test::block_on(engine.answer("¿Qué móvil me compro?"))
            .expect("con índice vacío no hay red de por medio");
        assert_eq!(reply, NO_CONTEXT_REPLY);
    }

    #[test]
    fn el_contexto_separa_documentos() {
        let hits = vec![
            ScoredDoc {
                score: 0.9,
                doc: PhoneDoc {
                    model: "a".to_string(),
                    text: "Model=a".to_string(),
                },
            },
            ScoredDoc {
                score: 0.5,
                doc: PhoneDoc {
                    model: "b".to_string(),
                    text: "Model=b".to_string(),
                },
            },
        ];
        assert_eq!(join_context(&hits), "Model=a\n\n---\n\nModel=b");
        assert_eq!(join_context(&[]), "");
    }
}
