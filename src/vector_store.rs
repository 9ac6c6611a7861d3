//! Índice de recuperación sobre los resúmenes de phones.
//!
//! API pública:
//!   - `build_and_persist(&Graph, &LlmManager, &Path)`
//!   - `PhoneIndex::load(&Path)` y `PhoneIndex::top_k_mmr(...)`
//!   - `artifact_doc_count(&Path)` (diagnóstico sin red).
//!
//! El índice se reconstruye siempre entero: no hay camino incremental.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use neo4rs::Graph;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{llm::LlmManager, neo4j_client};

/// Artefactos serializados del índice dentro del directorio de persistencia.
pub const DOCSTORE_FILE: &str = "docstore.json";
pub const VECTOR_STORE_FILE: &str = "vector_store.json";
pub const META_FILE: &str = "index_meta.json";

/// Los embeddings se piden a Ollama en bloques de este tamaño.
const EMBED_BATCH_SIZE: usize = 64;

/// Los candidatos de la fase de diversidad salen de un pool de 4×k por coseno.
const MMR_POOL_FACTOR: usize = 4;

/// Documento recuperable: el resumen plano de un phone más su nombre
/// visible como metadato.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneDoc {
    pub model: String,
    pub text: String,
}

/// Un documento recuperado con su relevancia (coseno con la consulta).
#[derive(Debug, Clone)]
pub struct ScoredDoc {
    pub score: f64,
    pub doc: PhoneDoc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexMeta {
    embed_model: String,
    dimensions: usize,
    document_count: usize,
    created_at: String,
}

/// Índice en memoria: documentos y vectores en paralelo, mismo orden.
#[derive(Debug)]
pub struct PhoneIndex {
    docs: Vec<PhoneDoc>,
    vectors: Vec<Vec<f64>>,
    meta: IndexMeta,
}

impl PhoneIndex {
    /// Ensambla un índice ya embebido, validando la coherencia de las partes.
    pub fn from_parts(
        embed_model: &str,
        docs: Vec<PhoneDoc>,
        vectors: Vec<Vec<f64>>,
    ) -> Result<Self> {
        if docs.len() != vectors.len() {
            return Err(anyhow!(
                "Índice incoherente: {} documentos frente a {} vectores",
                docs.len(),
                vectors.len()
            ));
        }
        let dimensions = vectors.first().map(Vec::len).unwrap_or(0);
        if vectors.iter().any(|v| v.len() != dimensions) {
            return Err(anyhow!("Índice incoherente: vectores de dimensiones distintas"));
        }

        let meta = IndexMeta {
            embed_model: embed_model.to_string(),
            dimensions,
            document_count: docs.len(),
            created_at: Utc::now().to_rfc3339(),
        };
        Ok(Self { docs, vectors, meta })
    }

    /// Construye el índice embebiendo todos los documentos, por bloques y en
    /// secuencia.
    pub async fn build(llm: &LlmManager, docs: Vec<PhoneDoc>) -> Result<Self> {
        let mut vectors = Vec::with_capacity(docs.len());
        for batch in docs.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            let mut batch_vectors = llm.embed_texts(texts).await?;
            vectors.append(&mut batch_vectors);
        }
        Self::from_parts(&llm.embed_model, docs, vectors)
    }

    /// Serializa los tres artefactos del índice en `dir`.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("No puedo crear el directorio {}", dir.display()))?;

        write_json(&dir.join(DOCSTORE_FILE), &self.docs)?;
        write_json(&dir.join(VECTOR_STORE_FILE), &self.vectors)?;
        write_json(&dir.join(META_FILE), &self.meta)?;

        info!(
            "Índice persistido en {} ({} documentos, {} dimensiones).",
            dir.display(),
            self.meta.document_count,
            self.meta.dimensions
        );
        Ok(())
    }

    /// Recarga un índice persistido. Falla con mensaje descriptivo si faltan
    /// artefactos o si docstore y vector store no cuadran.
    pub fn load(dir: &Path) -> Result<Self> {
        let docs: Vec<PhoneDoc> = read_json(&dir.join(DOCSTORE_FILE))?;
        let vectors: Vec<Vec<f64>> = read_json(&dir.join(VECTOR_STORE_FILE))?;
        let meta: IndexMeta = read_json(&dir.join(META_FILE))?;

        if docs.len() != vectors.len() || docs.len() != meta.document_count {
            return Err(anyhow!(
                "Artefactos incoherentes en {}: {} documentos, {} vectores, {} según metadatos",
                dir.display(),
                docs.len(),
                vectors.len(),
                meta.document_count
            ));
        }

        Ok(Self { docs, vectors, meta })
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    pub fn embed_model(&self) -> &str {
        &self.meta.embed_model
    }

    /// Recuperación top-k con diversidad (maximal marginal relevance).
    ///
    /// Se preselecciona un pool de candidatos por coseno y después se
    /// seleccionan k iterativamente maximizando
    /// `alpha·sim(consulta, doc) − (1−alpha)·max sim(doc, elegidos)`.
    /// El score devuelto es la relevancia por coseno, no el valor MMR.
    pub fn top_k_mmr(&self, query: &[f64], top_k: usize, alpha: f64) -> Vec<ScoredDoc> {
        let pool_size = top_k.saturating_mul(MMR_POOL_FACTOR).max(top_k);

        let mut pool: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine(query, v)))
            .collect();
        pool.sort_by(|a, b| b.1.total_cmp(&a.1));
        pool.truncate(pool_size);

        let mut selected: Vec<(usize, f64)> = Vec::new();
        while selected.len() < top_k && !pool.is_empty() {
            let mut best_pos = 0;
            let mut best_value = f64::NEG_INFINITY;
            for (pos, &(candidate, relevance)) in pool.iter().enumerate() {
                let redundancy = selected
                    .iter()
                    .map(|&(chosen, _)| cosine(&self.vectors[candidate], &self.vectors[chosen]))
                    .fold(0.0_f64, f64::max);
                let value = alpha * relevance - (1.0 - alpha) * redundancy;
                if value > best_value {
                    best_value = value;
                    best_pos = pos;
                }
            }
            selected.push(pool.remove(best_pos));
        }

        selected
            .into_iter()
            .map(|(i, score)| ScoredDoc {
                score,
                doc: self.docs[i].clone(),
            })
            .collect()
    }
}

/// Construye el índice a partir del grafo y lo deja persistido en `dir`.
/// Devuelve el número de documentos indexados.
pub async fn build_and_persist(graph: &Graph, llm: &LlmManager, dir: &Path) -> Result<usize> {
    let summaries = neo4j_client::fetch_phone_summaries(graph).await?;
    let docs: Vec<PhoneDoc> = summaries
        .into_iter()
        .map(|(model, text)| PhoneDoc { model, text })
        .collect();

    if docs.is_empty() {
        return Err(anyhow!(
            "No hay resúmenes de phones en el grafo; carga el CSV antes de construir el índice"
        ));
    }

    let index = PhoneIndex::build(llm, docs).await?;
    index.persist(dir)?;
    Ok(index.doc_count())
}

/// Diagnóstico: número de documentos según el artefacto `docstore.json`,
/// sin tocar ni Neo4j ni Ollama.
pub fn artifact_doc_count(dir: &Path) -> Result<usize> {
    let docs: Vec<PhoneDoc> = read_json(&dir.join(DOCSTORE_FILE))?;
    Ok(docs.len())
}

/// Similitud coseno; 0.0 si alguno de los vectores es nulo.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("No puedo escribir {}", path.display()))?;
    serde_json::to_writer(file, value)
        .with_context(|| format!("No puedo serializar {}", path.display()))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Falta el artefacto del índice {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Artefacto ilegible: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(model: &str) -> PhoneDoc {
        PhoneDoc {
            model: model.to_string(),
            text: format!("Model={model}"),
        }
    }

    fn indice() -> PhoneIndex {
        PhoneIndex::from_parts(
            "nomic-embed-text",
            vec![doc("a"), doc("a-bis"), doc("b")],
            vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0]],
        )
        .expect("las partes son coherentes")
    }

    #[test]
    fn partes_incoherentes_fallan() {
        let err = PhoneIndex::from_parts("m", vec![doc("a")], vec![]);
        assert!(err.is_err());

        let err = PhoneIndex::from_parts(
            "m",
            vec![doc("a"), doc("b")],
            vec![vec![1.0], vec![1.0, 2.0]],
        );
        assert!(err.is_err());
    }

    #[test]
    fn persistir_y_recargar_conserva_el_recuento() {
        let dir = tempfile::tempdir().expect("directorio temporal");
        let index = indice();
        index.persist(dir.path()).expect("el índice debe persistir");

        let reloaded = PhoneIndex::load(dir.path()).expect("el índice debe recargar");
        assert_eq!(reloaded.doc_count(), index.doc_count());
        assert_eq!(reloaded.embed_model(), "nomic-embed-text");
        assert_eq!(
            artifact_doc_count(dir.path()).expect("docstore presente"),
            index.doc_count()
        );
    }

    #[test]
    fn directorio_ausente_es_error_descriptivo() {
        let missing = Path::new("/no/existe/index_store");
        assert!(PhoneIndex::load(missing).is_err());
        assert!(artifact_doc_count(missing).is_err());
    }

    #[test]
    fn alpha_uno_degenera_en_ranking_por_coseno() {
        let index = indice();
        let hits = index.top_k_mmr(&[1.0, 0.05], 3, 1.0);
        let models: Vec<&str> = hits.iter().map(|h| h.doc.model.as_str()).collect();
        assert_eq!(models, vec!["a", "a-bis", "b"]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn la_diversidad_evita_duplicados_cercanos() {
        let index = indice();
        // Con alpha intermedio, el segundo elegido debe ser el documento
        // distinto, no el casi-duplicado del primero.
        let hits = index.top_k_mmr(&[1.0, 0.05], 2, 0.5);
        let models: Vec<&str> = hits.iter().map(|h| h.doc.model.as_str()).collect();
        assert_eq!(models, vec!["a", "b"]);
    }

    #[test]
    fn k_mayor_que_el_corpus_devuelve_todo() {
        let index = indice();
        let hits = index.top_k_mmr(&[0.5, 0.5], 10, 0.7);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn coseno_con_vector_nulo_es_cero() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
    }
}
