use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::LifecycleError;
use crate::subsystem::Subsystem;

/// An axum router served on its own task.
///
/// The port is bound when the server is built, so an address conflict is a
/// construction failure. `start` spawns the accept loop and returns right
/// away; errors from the loop are only logged.
///
/// Requests still in flight when the grace period runs out are cut short
/// with a 503.
pub struct HttpServer {
    name: String,
    local_addr: SocketAddr,
    pending: Option<(TcpListener, Router)>,
    shutdown: CancellationToken,
    force: CancellationToken,
    task: Option<JoinHandle<()>>,
}

async fn abort_on_force(
    State(force): State<CancellationToken>,
    req: Request,
    next: Next,
) -> Response {
    tokio::select! {
        response = next.run(req) => response,
        _ = force.cancelled() => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

impl HttpServer {
    pub async fn bind(name: &str, addr: &str, router: Router) -> Result<Self, LifecycleError> {
        let bind_error = |source| LifecycleError::Bind {
            name: name.to_owned(),
            addr: addr.to_owned(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let force = CancellationToken::new();
        let router = router.layer(middleware::from_fn_with_state(force.clone(), abort_on_force));

        Ok(Self {
            name: name.to_owned(),
            local_addr,
            pending: Some((listener, router)),
            shutdown: CancellationToken::new(),
            force,
            task: None,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address a local client should dial. Wildcard binds map to loopback.
    pub fn probe_addr(&self) -> SocketAddr {
        let ip = match self.local_addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        SocketAddr::new(ip, self.local_addr.port())
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

#[async_trait]
impl Subsystem for HttpServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self) -> Result<(), LifecycleError> {
        let Some((listener, router)) = self.pending.take() else {
            return Err(LifecycleError::AlreadyRunning(self.name.clone()));
        };

        let name = self.name.clone();
        let token = self.shutdown.clone();
        self.task = Some(tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(server = %name, "server stopped with error: {}", e);
            }
        }));

        info!(server = %self.name, "listening on {}", self.local_addr);
        Ok(())
    }

    async fn shutdown(&mut self, grace: Duration) -> Result<(), LifecycleError> {
        let Some(mut task) = self.task.take() else {
            return Err(LifecycleError::NotRunning(self.name.clone()));
        };

        self.shutdown.cancel();
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(LifecycleError::Shutdown {
                name: self.name.clone(),
                reason: e.to_string(),
            }),
            Err(_) => {
                warn!(server = %self.name, "connections still open after {:?}, closing", grace);
                self.force.cancel();
                task.abort();
                Err(LifecycleError::ShutdownTimeout {
                    name: self.name.clone(),
                    grace,
                })
            }
        }
    }
}
