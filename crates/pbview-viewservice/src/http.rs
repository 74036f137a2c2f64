//! HTTP transport for the view service
//!
//! Routes:
//! - `POST /ping` with [`PingArgs`], replies [`ViewReply`]
//! - `GET /view`, replies [`ViewReply`]

use crate::service::ViewService;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use pbview_core::{Result, ServerId, View, ViewNumber, ViewServiceConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// Body of a ping request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PingArgs {
    /// The reporting server
    pub me: ServerId,

    /// View the server is running, 0 after a (re)start
    pub viewnum: ViewNumber,
}

/// Reply to both ping and get
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewReply {
    pub view: View,
}

#[derive(Clone)]
struct AppState {
    service: Arc<ViewService>,
    rpc_count: Arc<AtomicU64>,
}

/// Build the router serving `service`
pub fn router(service: Arc<ViewService>, rpc_count: Arc<AtomicU64>) -> Router {
    Router::new()
        .route("/ping", post(ping))
        .route("/view", get(view))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service, rpc_count })
}

async fn ping(State(app): State<AppState>, Json(args): Json<PingArgs>) -> Json<ViewReply> {
    app.rpc_count.fetch_add(1, Ordering::Relaxed);
    tracing::trace!(me = %args.me, viewnum = args.viewnum, "ping");
    let view = app.service.ping(&args.me, args.viewnum).await;
    Json(ViewReply { view })
}

async fn view(State(app): State<AppState>) -> Json<ViewReply> {
    app.rpc_count.fetch_add(1, Ordering::Relaxed);
    let view = app.service.get().await;
    Json(ViewReply { view })
}

/// A running view service: HTTP listener plus tick driver
pub struct ServerHandle {
    local_addr: SocketAddr,
    service: Arc<ViewService>,
    rpc_count: Arc<AtomicU64>,
    dead: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    server_task: JoinHandle<()>,
    ticker_task: JoinHandle<()>,
}

/// Bind `config.listen_addr` and start serving
pub async fn start_server(config: ViewServiceConfig) -> Result<ServerHandle> {
    start_with_service(config.clone(), Arc::new(ViewService::new(&config))).await
}

/// Start serving an already constructed service
pub async fn start_with_service(
    config: ViewServiceConfig,
    service: Arc<ViewService>,
) -> Result<ServerHandle> {
    config.validate()?;
    let listener = TcpListener::bind(config.listen_addr).await?;
    let local_addr = listener.local_addr()?;

    let rpc_count = Arc::new(AtomicU64::new(0));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = router(service.clone(), rpc_count.clone());
    let mut server_shutdown = shutdown_rx.clone();
    let server_task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|dead| *dead).await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "view service listener failed");
        }
    });
    let ticker_task = service.clone().spawn_ticker(shutdown_rx);

    tracing::info!(
        addr = %local_addr,
        tick_interval_ms = config.tick_interval.as_millis() as u64,
        dead_pings = config.dead_pings,
        "view service started"
    );

    Ok(ServerHandle {
        local_addr,
        service,
        rpc_count,
        dead: AtomicBool::new(false),
        shutdown_tx,
        server_task,
        ticker_task,
    })
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn service(&self) -> &Arc<ViewService> {
        &self.service
    }

    /// Number of ping and get calls handled so far
    pub fn rpc_count(&self) -> u64 {
        self.rpc_count.load(Ordering::Relaxed)
    }

    /// Stop accepting requests and stop ticking
    pub fn kill(&self) {
        if !self.dead.swap(true, Ordering::SeqCst) {
            tracing::info!(addr = %self.local_addr, "view service killed");
            self.shutdown_tx.send_replace(true);
        }
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }

    /// Wait until both the listener and the ticker have stopped
    pub async fn join(self) {
        if let Err(e) = self.server_task.await {
            tracing::warn!(error = %e, "listener task panicked");
        }
        if let Err(e) = self.ticker_task.await {
            tracing::warn!(error = %e, "ticker task panicked");
        }
    }
}
