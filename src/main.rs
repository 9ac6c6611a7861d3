// Módulos de la aplicación
mod api;
mod app_state;
mod config;
mod ingest;
mod llm;
mod models;
mod neo4j_client;
mod normalize;
mod rag;
mod vector_store;

use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use clap::{Parser, Subcommand};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{app_state::AppState, config::AppConfig, llm::LlmManager};

#[derive(Parser)]
#[command(name = "smartphone_rag_webapp")]
#[command(about = "Sistema RAG de especificaciones de smartphones sobre Neo4j y Ollama")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Comprueba que Ollama y Neo4j están accesibles
    Check,
    /// Descarga los modelos de chat y embeddings con `ollama pull`
    SetupModels,
    /// Carga el CSV en el grafo (vaciado opcional + lotes con upsert)
    Load,
    /// Construye el índice de recuperación y lo persiste en disco
    BuildIndex,
    /// Chat interactivo por consola sobre el índice persistido
    Chat,
    /// Ejecuta el pipeline completo y arranca el servidor web (por defecto)
    Serve,
    /// Diagnóstico: número de documentos del índice persistido
    DocCount,
    /// Diagnóstico: recuperación pura (sin generación) para una consulta
    QueryIndex {
        /// Consulta a probar
        query: String,
        #[arg(long, default_value_t = rag::DEFAULT_TOP_K)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // 2. Cargar configuración
    let cfg = AppConfig::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Check => check(&cfg).await,
        Commands::SetupModels => LlmManager::from_config(&cfg).pull_models().await,
        Commands::Load => load(&cfg).await,
        Commands::BuildIndex => build_index(&cfg).await,
        Commands::Chat => chat(&cfg).await,
        Commands::Serve => serve(&cfg).await,
        Commands::DocCount => doc_count(&cfg),
        Commands::QueryIndex { query, top_k } => query_index(&cfg, &query, top_k).await,
    }
}

/// Preflight: Ollama y Neo4j deben responder. Sin reintentos.
async fn check(cfg: &AppConfig) -> Result<()> {
    LlmManager::from_config(cfg).ping().await?;
    let graph = neo4j_client::connect_from_config(cfg).await?;
    neo4j_client::ping(&graph).await?;
    println!("Entorno OK.");
    Ok(())
}

async fn load(cfg: &AppConfig) -> Result<()> {
    let graph = neo4j_client::connect_from_config(cfg).await?;
    let summary = ingest::load_csv_into_graph(&graph, cfg).await?;
    println!("{summary}");
    Ok(())
}

async fn build_index(cfg: &AppConfig) -> Result<()> {
    let graph = neo4j_client::connect_from_config(cfg).await?;
    let llm = LlmManager::from_config(cfg);
    let count = vector_store::build_and_persist(&graph, &llm, Path::new(&cfg.index_dir)).await?;
    println!(
        "OK. Índice creado con {count} documentos en {}/",
        cfg.index_dir
    );
    Ok(())
}

/// Chat RAG por consola. Cada pregunta es independiente.
async fn chat(cfg: &AppConfig) -> Result<()> {
    let engine = rag::QueryEngine::from_persisted(cfg)?;

    println!("{}", rag::INTRO_TEXT);
    println!("Chat RAG listo. Escribe 'exit' para salir.");

    let stdin = std::io::stdin();
    loop {
        print!("\n> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let answer = engine.answer(question).await?;
        println!("\n{answer}");
    }
    Ok(())
}

fn doc_count(cfg: &AppConfig) -> Result<()> {
    let count = vector_store::artifact_doc_count(Path::new(&cfg.index_dir))?;
    println!("Documentos en el índice: {count}");
    Ok(())
}

async fn query_index(cfg: &AppConfig, query: &str, top_k: usize) -> Result<()> {
    let engine = rag::QueryEngine::from_persisted(cfg)?;
    let results = engine.retrieve(query, top_k).await?;

    println!("Consulta: {query}");
    println!("Top K: {top_k}");
    println!("Resultados: {}\n", results.len());

    for (i, hit) in results.iter().enumerate() {
        let snippet: String = hit.doc.text.chars().take(200).collect();
        println!("#{} score={:.4} model={}", i + 1, hit.score, hit.doc.model);
        println!("  {snippet}\n");
    }
    Ok(())
}

/// Pipeline completo y servidor web: reinicio opcional del modelo,
/// comprobaciones, carga del grafo, construcción del índice y axum.
async fn serve(cfg: &AppConfig) -> Result<()> {
    let llm = LlmManager::from_config(cfg);

    if cfg.ollama_reset_on_start {
        llm.reset_model().await;
    }

    // 1. Pipeline de datos: preflight → modelos → grafo → índice
    llm.ping().await?;
    let graph = neo4j_client::connect_from_config(cfg).await?;
    neo4j_client::ping(&graph).await?;
    llm.pull_models().await?;

    let summary = ingest::load_csv_into_graph(&graph, cfg).await?;
    info!("{summary}");

    let count = vector_store::build_and_persist(&graph, &llm, Path::new(&cfg.index_dir)).await?;
    info!("Índice listo con {count} documentos.");

    // 2. Motor de consulta compartido, construido una sola vez
    let engine = rag::QueryEngine::from_persisted(cfg)?;
    let app_state = AppState {
        engine: Arc::new(engine),
    };

    // 3. Router de la API + frontend estático
    let app = Router::new()
        .merge(api::create_router(app_state))
        .fallback_service(ServeDir::new("frontend"))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 4. Iniciar el servidor
    let listener = tokio::net::TcpListener::bind(cfg.server_addr()).await?;
    let server_url = format!("http://localhost:{}", cfg.web_port);
    info!("🚀 Servidor escuchando en {}", &server_url);

    // Abrir el frontend en el navegador por defecto
    if webbrowser::open(&server_url).is_err() {
        info!(
            "No se pudo abrir el navegador. Por favor, accede a {} manualmente.",
            server_url
        );
    }

    axum::serve(listener, app).await?;
    Ok(())
}
