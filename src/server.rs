//! TCP accept loop and graceful shutdown.
//!
//! On shutdown the listener stops accepting and every open connection is
//! allowed to finish its in-flight requests before [`Server::serve`] returns.
//! Response logging for those requests completes as part of that drain.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::body::ResponseBody;
use crate::error::Error;
use crate::request::Request;
use crate::router::Router;

/// Serves a [`Router`] over HTTP/1.1 and HTTP/2.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// ```rust,no_run
    /// let server = loupe::Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Serves until SIGTERM or Ctrl-C, then drains open connections.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        serve_with_shutdown(listener, router, shutdown_signal()).await
    }
}

/// Serves on an already bound `listener` until `shutdown` resolves, then
/// drains open connections.
pub async fn serve_with_shutdown(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()>,
) -> Result<(), Error> {
    let router = Arc::new(router);
    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    info!(addr = %listener.local_addr()?, "loupe listening");

    loop {
        tokio::select! {
            biased;

            () = &mut shutdown => {
                info!(open = connections.len(), "shutting down, draining connections");
                break;
            }

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    connections.spawn(serve_connection(stream, peer, Arc::clone(&router)));
                }
                Err(e) => error!("accept failed: {e}"),
            },

            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    while connections.join_next().await.is_some() {}

    info!("loupe stopped");
    Ok(())
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, router: Arc<Router>) {
    debug!(%peer, "connection opened");
    let service = service_fn(move |req| dispatch(Arc::clone(&router), req));
    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        error!(%peer, "connection error: {e}");
    }
}

/// An `Err` here means the request could not be read off the wire; hyper
/// answers it by closing the connection.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<Incoming>,
) -> Result<http::Response<ResponseBody>, Error> {
    let response = router.dispatch(Request::from_http(req)).await?;
    Ok(response.into_inner())
}

/// SIGTERM or SIGINT on Unix, Ctrl-C elsewhere.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
