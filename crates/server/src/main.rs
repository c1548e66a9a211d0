//! Deploycat entrypoint

use std::sync::Arc;

use actix_web::middleware::{self, from_fn};
use actix_web::{App, HttpServer, web::Data};
use deploycat::http::{configure, health, response_time};
use deploycat::{CertResolver, KubeCluster, Orchestrator, Settings, telemetry};
use kube::Client;
use tracing::{error, info, instrument};

#[tokio::main]
#[instrument(level = "info", target = "deploycat::main", name = "main")]
async fn main() -> anyhow::Result<()> {
    telemetry::init()?;

    let settings = Settings::from_env()?;

    // Requests must never be served with an unusable certificate configuration
    let certs = match CertResolver::load(&settings.certs_config) {
        Ok(certs) => Arc::new(certs),
        Err(e) => {
            error!(
                error = %e,
                path = %settings.certs_config.display(),
                "invalid certificate configuration, refusing to start"
            );
            return Err(e.into());
        }
    };

    let client = Client::try_default().await?;
    let namespace = settings
        .namespace
        .clone()
        .unwrap_or_else(|| client.default_namespace().to_string());

    info!(
        namespace = %namespace,
        bind_addr = %settings.bind_addr,
        cluster_timeout_secs = settings.cluster_timeout.as_secs(),
        "kubernetes client initialized, starting server"
    );

    let cluster = KubeCluster::new(client, namespace, settings.cluster_timeout);
    let orchestrator = Data::new(Orchestrator::new(cluster, certs));

    HttpServer::new(move || {
        App::new()
            .app_data(orchestrator.clone())
            .wrap(from_fn(response_time))
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(health)
            .configure(configure::<KubeCluster>)
    })
    .bind(&settings.bind_addr)?
    .shutdown_timeout(5)
    .run()
    .await?;

    info!("server shutdown complete");
    Ok(())
}
