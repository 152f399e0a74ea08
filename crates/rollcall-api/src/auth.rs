use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use rollcall_sync::{Engine, GuestDirectory, VerificationService};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub engine: Engine,
    pub verifier: VerificationService,
    pub directory: GuestDirectory,
    /// Shared secret every operator presents as a bearer token.
    pub operator_key: String,
    /// Cancelled when the server begins shutting down so long-lived
    /// streams let go of their connections.
    pub shutdown: CancellationToken,
}

impl AppStateInner {
    pub fn new(engine: Engine, operator_key: impl Into<String>) -> AppState {
        Arc::new(Self {
            verifier: VerificationService::new(engine.clone()),
            directory: GuestDirectory::new(engine.clone()),
            engine,
            operator_key: operator_key.into(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Compare without short-circuiting on the first differing byte.
    pub fn operator_key_matches(&self, presented: &str) -> bool {
        let (a, b) = (self.operator_key.as_bytes(), presented.as_bytes());
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}
