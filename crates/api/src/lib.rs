//! In-memory request guards for the blog API.
//!
//! - [`stores::ViewGuard`] decides whether a page view bumps an article's
//!   view counter, at most once per viewer per window.
//! - [`stores::CodeStore`] issues and single-use validates the emailed
//!   six digit codes for registration and password reset.
//! - [`identity`] resolves who the viewer is from request metadata.
//! - [`image_url`] turns stored upload paths into the URL a browser should load.
//!
//! ```ignore
//! let config = Config::from_env()?;
//! telemetry::init(&config)?;
//!
//! let stores = Stores::new(&config, Arc::new(SystemClock));
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let sweepers = stores.spawn_sweepers(config.sweep_interval(), shutdown_rx);
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod image_url;
pub mod stores;
pub mod telemetry;
#[cfg(test)]
mod test_utils;

pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use error::AppError;
pub use identity::{AuthenticatedUser, Viewer, resolve_identity};
pub use image_url::UrlContext;
pub use stores::{CodeError, CodePurpose, CodeStore, Stores, ViewGuard};
