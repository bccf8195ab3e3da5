//! A small static site with client caching.
//!
//! Images and downloads live in a nested layout decorated with a 30 day cache
//! concern; everything else that is not HTML is cached site-wide for the
//! duration read from `site.toml` (7 days when the file does not exist). The
//! site-wide policy leaves responses that already carry an expiry alone.
//!
//! Run with:
//!
//! ```text
//! RUST_LOG=debug cargo run --example site
//! ```

use concerns::cache::{CacheConcernBuilder, CacheConfig, is_not_html};
use concerns::handler::{HandlerBuilder, LayoutBuilder, ParentRef, Resource};
use concerns::http::ContentType;
use concerns::middleware::{LoggerMiddleware, PolicyMiddleware};
use concerns::server::{Host, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "site.toml";

const PAGE: &str = "<!doctype html><title>concerns</title>\
<link rel=\"stylesheet\" href=\"/custom.css\"><img src=\"/images/logo.svg\">";

fn assets() -> LayoutBuilder {
    LayoutBuilder::new()
        .route(
            "/images/logo.svg",
            Resource::bytes("<svg xmlns=\"http://www.w3.org/2000/svg\"/>", ContentType::ImageSvg),
        )
        .route(
            "/downloads/readme.txt",
            Resource::bytes("Nothing to see here.", ContentType::TextPlain),
        )
        .concern(CacheConcernBuilder::days(30))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = CacheConfig::load(CONFIG_PATH)?;
    info!(path = CONFIG_PATH, days = config.duration_days, "cache config loaded");

    let root = LayoutBuilder::new()
        .route("/", Resource::bytes(PAGE, ContentType::TextHtml))
        .route("/custom.css", Resource::bytes("body { margin: 0 }", ContentType::TextCss))
        .route("*", assets())
        .build(ParentRef::root());

    let server = Server::bind("127.0.0.1:8080").await?;

    Host::new(root)
        .middleware(LoggerMiddleware)
        .middleware(PolicyMiddleware::new(config.policy().predicate(|request, response| {
            response.get_expires().is_none() && is_not_html(request, response)
        })))
        .run(server)
        .await?;

    Ok(())
}
