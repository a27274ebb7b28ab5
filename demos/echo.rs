//! Echo bridge - answers every engine request with the request itself.
//!
//! This example demonstrates:
//! - Building a bridge from the engine's option keys
//! - Registering a handler that fills and ends the response
//! - Exiting with status 1 on a fatal bridge error
//!
//! # Running
//!
//! ```text
//! SERVER_SOCKET_PATH=/tmp/arnelify.sock RUST_LOG=debug \
//!     cargo run --example echo            # dial the engine's socket
//! cargo run --example echo -- listen      # own the socket instead
//! ```

use arnelify_uds::{BridgeBuilder, Response, UdsConfig};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut opts = json!({});
    if let Ok(path) = std::env::var("SERVER_SOCKET_PATH") {
        opts["SERVER_SOCKET_PATH"] = Value::String(path);
    }
    if let Some(kb) = std::env::var("SERVER_BLOCK_SIZE_KB")
        .ok()
        .and_then(|kb| kb.parse::<u64>().ok())
    {
        opts["SERVER_BLOCK_SIZE_KB"] = json!(kb);
    }

    let builder = BridgeBuilder::new()
        .config(UdsConfig::from_opts(&opts))
        .handler(|req: Value, mut res: Response| async move {
            res.set_header("Content-Type", "application/json");
            res.add_body(&req.to_string())?;
            res.end()?;
            Ok(res)
        });

    let listen = std::env::args().nth(1).as_deref() == Some("listen");
    let result = if listen {
        match builder.listen().await {
            Ok(mut listener) => listener.wait_for_shutdown().await,
            Err(e) => Err(e),
        }
    } else {
        match builder.connect().await {
            Ok(mut connector) => connector.wait_for_shutdown().await,
            Err(e) => Err(e),
        }
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
