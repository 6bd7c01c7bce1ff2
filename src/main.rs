// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use thiserror::Error;

use statechain_enclave_host::{
    api::router,
    boundary::{SimulatedBoundary, TrustedBoundary, TrustedBoundaryGateway},
    config::ServerConfig,
    error::{SecretStatus, ServiceError},
    logging::init_logging,
    sealing::SealingKeyManager,
    signing::{SessionSweeper, SigningPolicy, SigningSessionCoordinator},
    state::AppState,
    storage::{
        AuditLog, EncryptedStorage, PersistenceGateway, SecretStore, StatechainDatabase,
        StorageError, StoragePaths,
    },
};

#[derive(Debug, Error)]
enum StartupError {
    #[error("data directory unusable: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Parser)]
#[command(name = "statechain-enclave-host", version, about)]
struct Cli {
    /// Generate the master secret before serving (no-op if one exists).
    #[arg(short = 'g', long = "generate-new-secret")]
    generate_new_secret: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.log_format);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: ServerConfig) -> Result<(), StartupError> {
    let mut storage = EncryptedStorage::new(StoragePaths::new(&config.data_dir));
    storage.initialize()?;

    let boundary: Arc<dyn TrustedBoundary> = match config.sealing_key {
        Some(key) => Arc::new(SimulatedBoundary::new(key)),
        None => {
            tracing::warn!(
                "SIMULATED_SEALING_KEY not set; sealed secrets will not survive a restart"
            );
            Arc::new(SimulatedBoundary::ephemeral())
        }
    };
    let gateway = Arc::new(
        TrustedBoundaryGateway::initialize(boundary, config.boundary_call_timeout)
            .await
            .map_err(|e| ServiceError::BoundaryInitFailure(e.to_string()))?,
    );

    let result = serve(cli, config, storage, Arc::clone(&gateway)).await;

    if let Err(e) = gateway.shutdown().await {
        error!(error = %e, "Trusted boundary shutdown failed");
    }
    result
}

async fn serve(
    cli: Cli,
    config: ServerConfig,
    storage: EncryptedStorage,
    gateway: Arc<TrustedBoundaryGateway>,
) -> Result<(), StartupError> {
    let audit = Arc::new(AuditLog::new(storage.clone()));
    let sealing = Arc::new(SealingKeyManager::bootstrap(
        SecretStore::new(storage.clone()),
        Arc::clone(&gateway),
        Some(Arc::clone(&audit)),
    )?);

    if cli.generate_new_secret {
        match sealing.add_secret().await? {
            SecretStatus::Generated => info!("Master secret generated at startup"),
            SecretStatus::AlreadyExists => info!("Master secret already exists"),
        }
    }

    let database =
        StatechainDatabase::open(&storage.paths().statechain_db()).map_err(ServiceError::from)?;
    let persistence: Arc<dyn PersistenceGateway> = Arc::new(database);

    let coordinator = Arc::new(
        SigningSessionCoordinator::new(
            Arc::clone(&sealing),
            Arc::clone(&gateway),
            persistence,
            SigningPolicy {
                nonce_ttl: config.nonce_ttl,
                max_signatures: config.max_signatures,
            },
        )
        .with_audit(audit),
    );

    let shutdown = CancellationToken::new();
    // Dropped on any early return below, which cancels the sweeper.
    let sweeper = SessionSweeper::new(Arc::clone(&coordinator)).spawn(shutdown.clone());

    let app = router(AppState::new(coordinator, sealing, gateway, storage));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Statechain enclave host listening (docs at /docs)");

    let signal = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signal.cancel();
        })
        .await;

    sweeper.stop().await;
    info!("Server stopped");

    Ok(served?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
