pub mod api;
pub mod config;
pub mod curator;
pub mod errors;
pub mod metrics_defs;
pub mod normalizer;
pub mod reconcile;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod testutils;

use api::ReconcileService;
use errors::ReconcilerError;
use reconcile::Reconciler;
use shared::admin_service::AdminService;
use shared::http::run_http_service;

/// Builds the configured store and reconciler.
pub async fn build_reconciler(config: &config::Config) -> Result<Reconciler, ReconcilerError> {
    config.validate()?;
    let store = store::get_store(&config.store).await?;
    Ok(Reconciler::new(
        store,
        config.table_name.clone(),
        config.curation.policy(),
    ))
}

/// Serves batch submissions and the admin endpoints until either listener fails.
pub async fn run(config: config::Config) -> Result<(), ReconcilerError> {
    let reconciler = build_reconciler(&config).await?;
    shared::metrics_defs::describe_all(metrics_defs::ALL_METRICS);

    let ready = reconciler.clone();
    let admin_service = AdminService::<_, ReconcilerError>::new(move || ready.is_ready());
    let reconcile_service = ReconcileService::new(reconciler, config.api_key.clone());

    let reconcile_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        reconcile_service,
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        admin_service,
    );

    tokio::try_join!(reconcile_task, admin_task)?;
    Ok(())
}
