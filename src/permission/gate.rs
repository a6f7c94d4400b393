use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{Authorization, PermissionSource, PermissionState};
use crate::types::Action;

pub struct PermissionGate {
    authorization: Authorization,
    source: Arc<dyn PermissionSource>,
}

impl PermissionGate {
    pub fn new(authorization: Authorization, source: Arc<dyn PermissionSource>) -> Self {
        Self { authorization, source }
    }

    pub fn authorization(&self) -> &Authorization {
        &self.authorization
    }

    /// Resolve a single `(module, action)` check. Lookup failures deny.
    pub async fn check(&self, module: &str, action: Action) -> bool {
        let user_id = match &self.authorization {
            Authorization::Admin => return true,
            Authorization::Scoped { user_id } => user_id,
        };

        match self.source.load(user_id).await {
            Ok(Some(document)) => {
                let allowed = document.allows(module, action);
                debug!("permission {}:{} for {} -> {}", module, action, user_id, allowed);
                allowed
            }
            Ok(None) => {
                debug!("no permission document for {}, denying {}:{}", user_id, module, action);
                false
            }
            Err(err) => {
                warn!("Permission lookup for {} failed, denying {}:{}: {}", user_id, module, action, err);
                false
            }
        }
    }

    pub async fn decide(&self, module: &str, action: Action) -> PermissionState {
        PermissionState::Resolved(self.check(module, action).await)
    }

    /// Evaluate several checks concurrently; results keep input order
    pub async fn check_all(&self, checks: &[(&str, Action)]) -> Vec<bool> {
        join_all(checks.iter().map(|(module, action)| self.check(module, *action))).await
    }

    /// Start a check in the background. The receiver holds `Loading` until it resolves.
    pub fn watch(self: &Arc<Self>, module: impl Into<String>, action: Action) -> watch::Receiver<PermissionState> {
        let (tx, rx) = watch::channel(PermissionState::Loading);
        let gate = Arc::clone(self);
        let module = module.into();
        tokio::spawn(async move {
            let state = gate.decide(&module, action).await;
            // Receiver may be gone already
            let _ = tx.send(state);
        });
        rx
    }
}
