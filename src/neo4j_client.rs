use crate::config::AppConfig;
use anyhow::{anyhow, Result};
use neo4rs::{query, Graph};
use tracing::info;
use url::Url;

pub async fn connect_from_config(cfg: &AppConfig) -> Result<Graph> {
    let url = Url::parse(&cfg.neo4j_uri)?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    let addr = format!("{host}:{port}");

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &cfg.neo4j_user, &cfg.neo4j_password)
        .await
        .map_err(|e| {
            anyhow!(
                "No puedo conectar con Neo4j en {} con el usuario {}. Detalle: {e}",
                cfg.neo4j_uri,
                cfg.neo4j_user
            )
        })?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// Comprobación mínima de vida: `RETURN 1`.
pub async fn ping(graph: &Graph) -> Result<()> {
    graph
        .run(query("RETURN 1"))
        .await
        .map_err(|e| anyhow!("Neo4j no responde. Detalle: {e}"))
}

/// Crea los constraints de unicidad para las etiquetas del grafo:
/// :Phone y las cinco categorías compartidas. Idempotente (IF NOT EXISTS).
pub async fn ensure_schema(graph: &Graph) -> Result<()> {
    let statements = [
        "CREATE CONSTRAINT phone_model_unique IF NOT EXISTS
         FOR (p:Phone)
         REQUIRE p.model IS UNIQUE",
        "CREATE CONSTRAINT os_name_unique IF NOT EXISTS
         FOR (o:OS)
         REQUIRE o.name IS UNIQUE",
        "CREATE CONSTRAINT chipset_name_unique IF NOT EXISTS
         FOR (c:Chipset)
         REQUIRE c.name IS UNIQUE",
        "CREATE CONSTRAINT network_name_unique IF NOT EXISTS
         FOR (n:Network)
         REQUIRE n.name IS UNIQUE",
        "CREATE CONSTRAINT displaytype_name_unique IF NOT EXISTS
         FOR (d:DisplayType)
         REQUIRE d.name IS UNIQUE",
        "CREATE CONSTRAINT memcardtype_name_unique IF NOT EXISTS
         FOR (m:MemoryCardType)
         REQUIRE m.name IS UNIQUE",
    ];

    for stmt in statements {
        graph.run(query(stmt)).await?;
    }

    info!("Esquema de Neo4j asegurado (constraints de unicidad creados).");
    Ok(())
}

/// Borra todo el contenido del grafo. Solo se usa en la recarga completa.
pub async fn wipe_graph(graph: &Graph) -> Result<()> {
    graph.run(query("MATCH (n) DETACH DELETE n")).await?;
    info!("Grafo vaciado (MATCH (n) DETACH DELETE n).");
    Ok(())
}

/// Número de nodos :Phone cargados.
pub async fn phone_count(graph: &Graph) -> Result<i64> {
    let mut cursor = graph
        .execute(query("MATCH (p:Phone) RETURN count(p) AS n"))
        .await?;
    let row = cursor
        .next()
        .await?
        .ok_or_else(|| anyhow!("La consulta de recuento no devolvió filas"))?;
    row.get::<i64>("n")
        .ok_or_else(|| anyhow!("Falta el campo 'n' en el recuento de phones"))
}

/// Recuento de relaciones por tipo, de mayor a menor.
pub async fn relationship_counts(graph: &Graph) -> Result<Vec<(String, i64)>> {
    let mut cursor = graph
        .execute(query(
            "MATCH ()-[r]->() RETURN type(r) AS rel, count(r) AS n ORDER BY n DESC",
        ))
        .await?;

    let mut counts = Vec::new();
    while let Some(row) = cursor.next().await? {
        if let (Some(rel), Some(n)) = (row.get::<String>("rel"), row.get::<i64>("n")) {
            counts.push((rel, n));
        }
    }
    Ok(counts)
}

/// Recupera `(nombre_para_mostrar, resumen)` de cada phone con resumen.
/// Es la fuente de documentos del índice de recuperación.
pub async fn fetch_phone_summaries(graph: &Graph) -> Result<Vec<(String, String)>> {
    let mut cursor = graph
        .execute(query(
            "MATCH (p:Phone)
             WHERE p.text IS NOT NULL
             RETURN p.model_raw AS model, p.text AS text",
        ))
        .await?;

    let mut summaries = Vec::new();
    while let Some(row) = cursor.next().await? {
        if let (Some(model), Some(text)) = (row.get::<String>("model"), row.get::<String>("text")) {
            summaries.push((model, text));
        }
    }
    Ok(summaries)
}
