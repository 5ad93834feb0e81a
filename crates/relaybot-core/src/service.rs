use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    audit::{AuditEvent, AuditLogger},
    config::Config,
    domain::{MessageRef, Sender},
    engine::{DeleteOutcome, RelayEngine, RelayOutcome},
    messaging::port::ChatTransport,
    registry::{AllowList, GroupRegistry},
    security::Authorizer,
    store::Store,
    Result,
};

/// What became of an inbound text message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextDisposition {
    Unauthorized,
    Relayed(RelayOutcome),
}

/// Everything a transport adapter needs: policy, registries and the engine,
/// sharing one store handle.
pub struct RelayService {
    authorizer: Authorizer,
    users: AllowList,
    groups: GroupRegistry,
    engine: RelayEngine,
    audit: Option<AuditLogger>,
}

impl RelayService {
    pub fn new<I, S>(admins: I, store: Store, transport: Arc<dyn ChatTransport>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let users = AllowList::new(store.clone());
        Self {
            authorizer: Authorizer::new(admins, users.clone()),
            users,
            groups: GroupRegistry::new(store.clone()),
            engine: RelayEngine::new(store, transport),
            audit: None,
        }
    }

    pub fn from_config(cfg: &Config, store: Store, transport: Arc<dyn ChatTransport>) -> Self {
        let mut svc = Self::new(&cfg.admin_users, store, transport);
        svc.engine = svc
            .engine
            .with_max_concurrency(cfg.relay_max_concurrency)
            .with_purge_policy(cfg.purge_policy);
        svc.with_audit(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        ))
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    pub fn users(&self) -> &AllowList {
        &self.users
    }

    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    pub fn engine(&self) -> &RelayEngine {
        &self.engine
    }

    /// Authorize the sender, then fan the text out.
    pub async fn handle_text(
        &self,
        original: &MessageRef,
        sender: &Sender,
        text: &str,
    ) -> Result<TextDisposition> {
        if !self.authorizer.is_sender_authorized(sender).await? {
            info!(sender = %sender.display_name(), "rejected message from unauthorized sender");
            self.audit(AuditEvent::unauthorized(sender, text));
            return Ok(TextDisposition::Unauthorized);
        }

        let outcome = self
            .engine
            .relay(original, text, sender)
            .await
            .inspect_err(|e| self.audit(AuditEvent::error(Some(sender), &e.to_string(), "relay")))?;
        self.audit(AuditEvent::relay(sender, original, text, &outcome));
        Ok(TextDisposition::Relayed(outcome))
    }

    /// Cascade a deletion of `original`. `requested_by` is `None` for platform notifications.
    pub async fn cascade_delete(
        &self,
        original: &MessageRef,
        requested_by: Option<&Sender>,
    ) -> Result<DeleteOutcome> {
        let outcome = self.engine.cascade_delete(original).await?;
        if outcome.attempted() > 0 {
            self.audit(AuditEvent::cascade_delete(requested_by, original, &outcome));
        }
        Ok(outcome)
    }

    pub(crate) fn audit(&self, event: AuditEvent) {
        let Some(audit) = &self.audit else {
            return;
        };
        if let Err(e) = audit.write(event) {
            warn!(path = %audit.path().display(), error = %e, "failed to write audit event");
        }
    }
}
