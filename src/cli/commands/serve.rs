//! Serve command - run the proxy

use crate::cli::args::ServeArgs;
use crate::cli::commands::Runtime;
use crate::config::Config;
use crate::error::{CachefrontError, CachefrontResult};
use crate::network::{HttpTransport, Transport};
use crate::server::{self, ServerState};
use crate::storage::{create_storage, CacheStorage, MemoryStorage};
use crate::worker::Registration;
use console::style;
use std::sync::Arc;
use url::Url;

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: &Config) -> CachefrontResult<()> {
    let storage: Arc<dyn CacheStorage> = if args.ephemeral {
        Arc::new(MemoryStorage::new())
    } else {
        create_storage(config)?
    };
    let listen = args.listen.unwrap_or_else(|| config.server.listen.clone());
    let origin = Url::parse(&config.worker.origin)
        .map_err(|e| CachefrontError::invalid_url(&config.worker.origin, e))?;

    let http = HttpTransport::from_config(config)?;
    server::check_forwarding(&http.wire_url(&origin), &listen)?;

    let transport: Arc<dyn Transport> = Arc::new(http);
    let runtime = Runtime::with_parts(config, storage, transport)?;

    let registration = Arc::new(Registration::new());
    let state = registration.register(Arc::clone(&runtime.worker)).await;

    println!(
        "{} version {} ({}) on {} for {}",
        style("Serving").green().bold(),
        style(runtime.worker.version()).cyan(),
        state,
        style(&listen).cyan(),
        origin
    );

    let server_state = Arc::new(ServerState {
        registration,
        transport: runtime.transport,
        origin,
        max_body_bytes: usize::try_from(config.network.max_body_bytes).unwrap_or(usize::MAX),
    });

    server::serve(&listen, server_state).await
}
