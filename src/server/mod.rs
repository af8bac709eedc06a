//! HTTP surface for job submission and result queries.
//!
//! A thin collaborator over the producer and the content store: submit a
//! job, poll its status, query records, read aggregate statistics. No
//! extraction logic lives here.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::queue::JobProducer;
use crate::store::ContentStore;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub producer: Arc<JobProducer>,
    pub store: Arc<dyn ContentStore>,
}

/// Start the web server on the configured address.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
