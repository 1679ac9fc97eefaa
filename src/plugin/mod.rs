//! go-plugin style server lifecycle
//!
//! Terraform launches the provider binary with a magic cookie in the
//! environment, reads one handshake line from stdout to learn the server
//! address, and connects over gRPC. The server binds an ephemeral loopback
//! port and runs until Terraform closes it or calls `StopProvider`.

mod server;

pub use server::ProviderService;

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_stream::wrappers::TcpListenerStream;
use tracing::info;

use crate::proto::tfplugin6::provider_server::ProviderServer;
use crate::provider::Provider;

/// go-plugin core protocol version
pub const CORE_PROTOCOL_VERSION: u32 = 1;
/// Terraform plugin protocol version this provider speaks
pub const PROTOCOL_VERSION: u32 = 6;

const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

/// Serve the provider until Terraform disconnects or stops it.
///
/// Prints the go-plugin handshake line
/// (`core-version|protocol-version|network|address|protocol`) on stdout
/// once the listener is bound.
pub async fn serve(provider: Provider) -> anyhow::Result<()> {
    if std::env::var(MAGIC_COOKIE_KEY).as_deref() != Ok(MAGIC_COOKIE_VALUE) {
        bail!(
            "this binary is a Terraform provider plugin and is meant to be \
             launched by Terraform, not run directly"
        );
    }

    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .context("binding loopback listener")?;
    let addr = listener.local_addr().context("reading listener address")?;

    let shutdown = Arc::new(Notify::new());
    let service = ProviderService::new(provider, shutdown.clone());

    println!("{CORE_PROTOCOL_VERSION}|{PROTOCOL_VERSION}|tcp|{addr}|grpc");
    std::io::stdout().flush().context("flushing handshake")?;
    info!(%addr, "provider server listening");

    tonic::transport::Server::builder()
        .add_service(ProviderServer::new(service))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            shutdown.notified().await;
        })
        .await
        .context("serving plugin")?;

    info!("provider server stopped");
    Ok(())
}
