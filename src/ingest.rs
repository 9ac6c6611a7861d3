//! Ingesta del CSV de smartphones en Neo4j: normalización de filas y carga
//! por lotes con upserts parametrizados.

use std::path::Path;

use anyhow::{Context, Result};
use neo4rs::{query, BoltMap, BoltType, Graph};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    models::{PhoneRecord, RawPhoneRow},
    neo4j_client, normalize,
};

/// Tamaño fijo de lote: cada lote viaja como una única sentencia UNWIND.
pub const BATCH_SIZE: usize = 200;

/// Upsert de un lote completo. El nodo :Phone se funde por clave en
/// minúsculas y sus atributos escalares se sobreescriben siempre (las claves
/// ausentes del mapa se leen como null y eliminan la propiedad). Las
/// categorías se funden solo cuando el campo de origen no está vacío.
const LOAD_BATCH: &str = "
UNWIND $rows AS row
WITH row
WHERE row.model_key <> ''

MERGE (p:Phone {model: row.model_key})
SET
  p.model_raw = row.model,
  p.price = row.price,
  p.rating = row.rating,
  p.volte = row.volte,
  p.nfc = row.nfc,
  p.ir_blaster = row.ir_blaster,
  p.ram_gb = row.ram_gb,
  p.storage_gb = row.storage_gb,
  p.battery_mah = row.battery_mah,
  p.screen_size_in = row.screen_size_in,
  p.refresh_rate_hz = row.refresh_rate_hz,
  p.rear_camera_mp_list = row.rear_camera_mp_list,
  p.rear_camera_count = row.rear_camera_count,
  p.front_camera_mp = row.front_camera_mp,
  p.memory_card_supported = row.memory_card_supported,
  p.text = row.text

WITH p, row

FOREACH (_ IN CASE WHEN row.os <> '' THEN [1] ELSE [] END |
  MERGE (o:OS {name: row.os})
  MERGE (p)-[:RUNS]->(o)
)

FOREACH (_ IN CASE WHEN row.chipset <> '' THEN [1] ELSE [] END |
  MERGE (c:Chipset {name: row.chipset})
  MERGE (p)-[:HAS_CHIPSET]->(c)
)

FOREACH (_ IN CASE WHEN row.network_type <> '' THEN [1] ELSE [] END |
  MERGE (n:Network {name: row.network_type})
  MERGE (p)-[:SUPPORTS_NETWORK]->(n)
)

FOREACH (_ IN CASE WHEN row.display_type <> '' THEN [1] ELSE [] END |
  MERGE (d:DisplayType {name: row.display_type})
  MERGE (p)-[:HAS_DISPLAY_TYPE]->(d)
)

FOREACH (_ IN CASE WHEN row.memory_card_supported = true AND row.memory_card_type <> '' THEN [1] ELSE [] END |
  MERGE (m:MemoryCardType {name: row.memory_card_type})
  MERGE (p)-[:SUPPORTS_MEMORY_CARD_TYPE]->(m)
)";

/// Resumen de los resultados de una carga completa.
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub rows_read: u32,
    pub rows_loaded: u32,
    pub rows_skipped: u32,
    pub values_discarded: u32,
    pub phones_in_graph: i64,
    pub relationships: Vec<(String, i64)>,
}

impl std::fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Resumen: {} filas leídas, {} cargadas, {} omitidas, {} valores descartados. \
             Phones en el grafo: {}.",
            self.rows_read,
            self.rows_loaded,
            self.rows_skipped,
            self.values_discarded,
            self.phones_in_graph
        )?;
        if !self.relationships.is_empty() {
            write!(f, " Relaciones:")?;
            for (rel, n) in &self.relationships {
                write!(f, " {rel}={n}")?;
            }
        }
        Ok(())
    }
}

/// Lee el CSV completo. Cada fila queda como texto opcional sin interpretar.
pub fn read_rows(path: &Path) -> Result<Vec<RawPhoneRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("No puedo abrir el CSV en {}", path.display()))?;

    let mut rows = Vec::new();
    for result in reader.deserialize::<RawPhoneRow>() {
        let row = result.with_context(|| format!("Fila ilegible en {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Normaliza todas las filas, avisando de los valores descartados.
/// Devuelve los registros listos para cargar junto con los contadores.
pub fn normalize_rows(raw_rows: &[RawPhoneRow]) -> (Vec<PhoneRecord>, u32, u32) {
    let mut records = Vec::new();
    let mut skipped = 0u32;
    let mut discarded_total = 0u32;

    for raw in raw_rows {
        match normalize::normalize_row(raw) {
            Some(normalized) => {
                if !normalized.discarded.is_empty() {
                    warn!(
                        "Valores ilegibles descartados en '{}': {}",
                        normalized.record.model,
                        normalized.discarded.join(", ")
                    );
                    discarded_total += normalized.discarded.len() as u32;
                }
                records.push(normalized.record);
            }
            None => skipped += 1,
        }
    }

    (records, skipped, discarded_total)
}

/// Carga el CSV en el grafo: vaciado opcional, constraints y lotes
/// secuenciales. El primer lote que falle aborta la carga.
pub async fn load_csv_into_graph(graph: &Graph, cfg: &AppConfig) -> Result<LoadSummary> {
    let raw_rows = read_rows(Path::new(&cfg.csv_path))?;
    let (records, skipped, discarded) = normalize_rows(&raw_rows);

    let mut summary = LoadSummary {
        rows_read: raw_rows.len() as u32,
        rows_loaded: records.len() as u32,
        rows_skipped: skipped,
        values_discarded: discarded,
        ..LoadSummary::default()
    };

    if cfg.wipe_on_load {
        neo4j_client::wipe_graph(graph).await?;
    }
    neo4j_client::ensure_schema(graph).await?;

    for (i, batch) in records.chunks(BATCH_SIZE).enumerate() {
        let rows: Vec<BoltType> = batch.iter().map(record_to_bolt).collect();
        graph
            .run(query(LOAD_BATCH).param("rows", rows))
            .await
            .with_context(|| format!("Falló el lote {}", i + 1))?;
        info!("Lote {} insertado ({} filas)", i + 1, batch.len());
    }

    summary.phones_in_graph = neo4j_client::phone_count(graph).await?;
    summary.relationships = neo4j_client::relationship_counts(graph).await?;
    info!("{summary}");

    Ok(summary)
}

/// Convierte un registro en el mapa de parámetros del UNWIND. Los numéricos
/// ausentes se omiten del mapa: en Cypher la clave que falta se lee como null.
fn record_to_bolt(record: &PhoneRecord) -> BoltType {
    let mut row = BoltMap::new();
    row.put("model_key".into(), record.model_key().into());
    row.put("model".into(), record.model.as_str().into());
    row.put("os".into(), record.os.as_str().into());
    row.put("network_type".into(), record.network_type.as_str().into());
    row.put("chipset".into(), record.chipset.as_str().into());
    row.put("display_type".into(), record.display_type.as_str().into());
    row.put(
        "rear_camera_mp_list".into(),
        record.rear_camera_mp_list.as_str().into(),
    );
    row.put(
        "memory_card_type".into(),
        record.memory_card_type.as_str().into(),
    );
    row.put("volte".into(), record.volte.into());
    row.put("nfc".into(), record.nfc.into());
    row.put("ir_blaster".into(), record.ir_blaster.into());
    row.put(
        "memory_card_supported".into(),
        record.memory_card_supported.into(),
    );
    row.put("text".into(), record.summary_text().into());

    if let Some(v) = record.price_eur {
        row.put("price".into(), v.into());
    }
    if let Some(v) = record.rating {
        row.put("rating".into(), v.into());
    }
    if let Some(v) = record.ram_gb {
        row.put("ram_gb".into(), v.into());
    }
    if let Some(v) = record.storage_gb {
        row.put("storage_gb".into(), v.into());
    }
    if let Some(v) = record.battery_mah {
        row.put("battery_mah".into(), v.into());
    }
    if let Some(v) = record.screen_size_in {
        row.put("screen_size_in".into(), v.into());
    }
    if let Some(v) = record.refresh_rate_hz {
        row.put("refresh_rate_hz".into(), v.into());
    }
    if let Some(v) = record.rear_camera_count {
        row.put("rear_camera_count".into(), v.into());
    }
    if let Some(v) = record.front_camera_mp {
        row.put("front_camera_mp".into(), v.into());
    }

    BoltType::Map(row)
}
