use axum::{Router, extract::Path, routing::get};
use recoverer::prelude::*;

async fn index() -> &'static str {
    "try /panic, /panic/<message> or /error"
}

async fn panic_default() -> &'static str {
    panic!("this should never actually panic");
}

async fn panic_with(Path(message): Path<String>) -> &'static str {
    panic!("{}", message);
}

async fn panic_error() -> &'static str {
    std::panic::panic_any(anyhow::anyhow!("database connection lost"));
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("Starting example server...");

    let vars = ExportedVars::global().clone();
    vars.publish("version", Label::new(env!("CARGO_PKG_VERSION")));
    let panics = vars.publish("panics", Counter::new());

    // RECOVERER_SHOW / RECOVERER_SIMPLE override the opaque defaults
    let defaults = RecoveryOptions::from_env()?;
    let options = RecoveryOptions::builder()
        .logger(TracingLogger)
        .show(defaults.show)
        .simple(defaults.simple)
        .vars(vars)
        .intercept_with(move |request, _value, location| {
            panics.add(1);
            tracing::info!("panic #{} on {} at {}", panics.value(), request.uri, location);
            if request.headers.contains_key("x-hide-panic") {
                return Err("client asked for no details".into());
            }
            Ok(())
        })
        .build();

    let router = Router::new()
        .route("/", get(index))
        .route("/panic", get(panic_default))
        .route("/panic/{message}", get(panic_with))
        .route("/error", get(panic_error))
        .layer(RecoverLayer::new(options));

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
