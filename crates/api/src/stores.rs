//! Ephemeral in-memory stores.
//!
//! Nothing here is persisted: a restart forgets every view record and every
//! pending verification code, which is acceptable for data this short-lived.
//!
//! ## Stores
//!
//! - **views** - Last counted view per `identity:article_id` (15 min window)
//! - **verification** - One pending email verification code per address (10 min TTL)
//!
//! ## Usage in Handlers
//!
//! Stores are built once at startup and shared through the application state:
//!
//! ```ignore
//! async fn get_article(viewer: Viewer, State(state): State<AppState>, Path(id): Path<String>) {
//!     if state.stores.views.can_count_view(&viewer.0, &id) {
//!         articles.increment_views(&id).await?;
//!     }
//! }
//!
//! async fn register(State(state): State<AppState>, Json(payload): Json<RegisterPayload>) {
//!     state.stores.codes.validate_code(&payload.email, &payload.code)?;
//! }
//! ```

mod sweeper;
mod verification;
mod views;

pub use sweeper::{Sweep, spawn_sweeper};
pub use verification::{CodeError, CodePurpose, CodeStore, generate_code};
pub use views::ViewGuard;

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};

use crate::{clock::Clock, config::Config};

/// Collection of all in-memory stores.
#[derive(Clone)]
pub struct Stores {
    pub views: Arc<ViewGuard>,
    pub codes: Arc<CodeStore>,
    clock: Arc<dyn Clock>,
}

impl Stores {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            views: Arc::new(ViewGuard::from_config(config, clock.clone())),
            codes: Arc::new(CodeStore::from_config(config, clock.clone())),
            clock,
        }
    }

    /// Start one background sweeper per store. They stop once `shutdown` is
    /// set to `true` or its sender is dropped.
    pub fn spawn_sweepers(
        &self,
        period: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        vec![
            spawn_sweeper(
                self.views.clone(),
                self.clock.clone(),
                period,
                shutdown.clone(),
            ),
            spawn_sweeper(self.codes.clone(), self.clock.clone(), period, shutdown),
        ]
    }
}
