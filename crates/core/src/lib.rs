pub mod dom;
pub mod css;
pub mod error;
pub mod surface;
pub mod source;
pub mod populate;
pub mod hook;
pub mod config;
#[cfg(feature = "fetch")]
pub mod fetch;

use std::sync::Arc;

use config::Config;
use error::ConfigError;
use hook::ExtensibilityHook;
use parking_lot::Mutex;
use populate::DropdownPopulator;
use source::RefSource;
use surface::DomSurface;

/// Parse an HTML page, turn the configured fields into dropdowns, and wait
/// until every dropdown shows its list (or its error).
/// This is the primary entry point for refdrop-core.
pub async fn apply(
    html: &str,
    config: &Config,
    source: Arc<dyn RefSource>,
) -> Result<DomSurface, ConfigError> {
    let bindings = config.bindings()?;
    let surface = Arc::new(Mutex::new(DomSurface::from_html(html)));
    let populator = DropdownPopulator::new(Arc::clone(&surface), source)
        .with_options(config.convert_options());
    let hook = ExtensibilityHook::new(populator, bindings);

    hook.on_load(());
    hook.settle().await;

    let page = surface.lock().clone();
    Ok(page)
}
