//! Fetch command - run one request through the cache-first policy

use crate::cli::args::FetchArgs;
use crate::cli::commands::Runtime;
use crate::config::Config;
use crate::error::{CachefrontError, CachefrontResult};
use crate::http::{Request, Response};
use crate::network::{HttpTransport, StubTransport, Transport};
use crate::storage::create_storage;
use crate::worker::FetchOutcome;
use console::style;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> CachefrontResult<()> {
    let transport: Arc<dyn Transport> = if args.offline {
        let stub = StubTransport::new();
        stub.set_offline(true);
        Arc::new(stub)
    } else {
        Arc::new(HttpTransport::from_config(config)?)
    };
    let runtime = Runtime::with_parts(config, create_storage(config)?, transport)?;

    let origin = Url::parse(&config.worker.origin)
        .map_err(|e| CachefrontError::invalid_url(&config.worker.origin, e))?;
    let url = origin
        .join(&args.target)
        .map_err(|e| CachefrontError::invalid_url(&args.target, e))?;
    let request = Request::get(url);
    debug!("Fetching via {} transport", runtime.transport.transport_name());

    match runtime.worker.fetch(&request).await? {
        FetchOutcome::Responded(mut responded) => {
            // The process exits right after; let the dynamic-cache write land.
            responded.settle().await;
            print_response(&request, responded.response, &responded.source.to_string(), args.body)
        }
        FetchOutcome::Declined => {
            let response = runtime.transport.fetch(&request).await?;
            print_response(&request, response, "pass-through", args.body)
        }
    }
}

fn print_response(
    request: &Request,
    response: Response,
    source: &str,
    show_body: bool,
) -> CachefrontResult<()> {
    let status = if response.is_ok() {
        style(response.status().to_string()).green()
    } else {
        style(response.status().to_string()).red()
    };

    eprintln!(
        "{} {} {} ({}, {})",
        status,
        request.method(),
        request.url(),
        style(source).cyan(),
        response.kind()
    );

    let body = response.into_body();
    if show_body {
        io::stdout()
            .write_all(&body)
            .map_err(|e| CachefrontError::io("writing response body", e))?;
    } else {
        eprintln!("{} bytes", body.len());
    }
    Ok(())
}
