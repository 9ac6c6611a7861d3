use std::sync::Arc;

use crate::rag::QueryEngine;

/// Estado compartido del servidor web. El motor de consulta se construye una
/// sola vez en el arranque y llega a los handlers como dependencia explícita.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
}
