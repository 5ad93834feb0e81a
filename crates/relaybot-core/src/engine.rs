//! Relay fan-out and cascade delete.
//!
//! Every destination is an independent edge: a send (or delete) failure on one
//! is logged and recorded in the outcome, and never stops the others. Per-edge
//! operations run concurrently up to `max_concurrency` and are all joined before
//! the outcome is returned.

use std::{str::FromStr, sync::Arc};

use futures::{stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::{
    domain::{ChatId, MessageRef, Sender},
    errors::Error,
    messaging::port::ChatTransport,
    registry::GroupRegistry,
    relay_map::RelayMap,
    store::{Insert, Removal, Store},
    Result,
};

const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// What happens to relay links after a cascade delete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PurgePolicy {
    /// Drop every link for the original, whatever the remote deletes did.
    #[default]
    All,
    /// Drop only links whose remote delete succeeded; failed copies stay mapped
    /// so a later `/delete` can retry them.
    Succeeded,
}

impl FromStr for PurgePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" | "always" => Ok(Self::All),
            "succeeded" | "success" | "on_success" => Ok(Self::Succeeded),
            other => Err(Error::Config(format!(
                "unknown purge policy {other:?} (expected \"all\" or \"succeeded\")"
            ))),
        }
    }
}

/// A copy that reached its destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivered {
    pub destination: ChatId,
    pub relayed: MessageRef,
    pub link: Insert,
}

/// A destination that did not end up with a recorded copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub destination: ChatId,
    /// Set when the send went through but the link could not be stored.
    pub relayed: Option<MessageRef>,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayOutcome {
    pub delivered: Vec<Delivered>,
    pub failed: Vec<DeliveryFailure>,
}

impl RelayOutcome {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteFailure {
    pub relayed: MessageRef,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: Vec<MessageRef>,
    pub failed: Vec<DeleteFailure>,
    /// Links removed from the relay map.
    pub purged: u64,
}

impl DeleteOutcome {
    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.failed.len()
    }
}

pub struct RelayEngine {
    groups: GroupRegistry,
    relay_map: RelayMap,
    transport: Arc<dyn ChatTransport>,
    max_concurrency: usize,
    purge_policy: PurgePolicy,
}

impl RelayEngine {
    pub fn new(store: Store, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            groups: GroupRegistry::new(store.clone()),
            relay_map: RelayMap::new(store),
            transport,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            purge_policy: PurgePolicy::default(),
        }
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn with_purge_policy(mut self, policy: PurgePolicy) -> Self {
        self.purge_policy = policy;
        self
    }

    pub fn relay_map(&self) -> &RelayMap {
        &self.relay_map
    }

    /// Fan `text` out to every configured group and record each delivered copy.
    ///
    /// The caller is responsible for authorizing `sender` first. Only a failure to
    /// read the group list is returned as an error.
    pub async fn relay(
        &self,
        original: &MessageRef,
        text: &str,
        sender: &Sender,
    ) -> Result<RelayOutcome> {
        let destinations = self.groups.list().await?;
        if destinations.is_empty() {
            debug!(original = %original, "no destination groups configured");
            return Ok(RelayOutcome::default());
        }

        let results: Vec<std::result::Result<Delivered, DeliveryFailure>> =
            stream::iter(destinations)
                .map(|destination| self.relay_to(original, text, destination))
                .buffered(self.max_concurrency)
                .collect()
                .await;

        let mut outcome = RelayOutcome::default();
        for r in results {
            match r {
                Ok(d) => outcome.delivered.push(d),
                Err(f) => outcome.failed.push(f),
            }
        }

        info!(
            original = %original,
            sender = %sender.display_name(),
            delivered = outcome.delivered.len(),
            failed = outcome.failed.len(),
            "relayed message"
        );
        Ok(outcome)
    }

    async fn relay_to(
        &self,
        original: &MessageRef,
        text: &str,
        destination: ChatId,
    ) -> std::result::Result<Delivered, DeliveryFailure> {
        let relayed = match self.transport.send_text(&destination, text).await {
            Ok(m) => m,
            Err(e) => {
                warn!(destination = %destination, original = %original, error = %e, "relay send failed");
                return Err(DeliveryFailure {
                    destination,
                    relayed: None,
                    error: e.to_string(),
                });
            }
        };

        match self.relay_map.add(original, &relayed).await {
            Ok(link) => {
                if link == Insert::AlreadyExists {
                    debug!(relayed = %relayed, "relay link already recorded");
                }
                Ok(Delivered {
                    destination,
                    relayed,
                    link,
                })
            }
            Err(e) => {
                // The copy exists remotely but cannot be cascaded later.
                error!(relayed = %relayed, original = %original, error = %e, "failed to record relay link");
                Err(DeliveryFailure {
                    destination,
                    relayed: Some(relayed),
                    error: e.to_string(),
                })
            }
        }
    }

    /// Delete every relayed copy of `original`, then purge its links per policy.
    pub async fn cascade_delete(&self, original: &MessageRef) -> Result<DeleteOutcome> {
        let links = self.relay_map.lookup(original).await?;
        if links.is_empty() {
            debug!(original = %original, "no relayed copies to delete");
            return Ok(DeleteOutcome::default());
        }

        let results: Vec<(MessageRef, Result<()>)> = stream::iter(links)
            .map(|link| async move {
                let res = self.transport.delete_message(&link).await;
                (link, res)
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let mut outcome = DeleteOutcome::default();
        for (link, res) in results {
            match res {
                Ok(()) => outcome.deleted.push(link),
                Err(e) => {
                    warn!(relayed = %link, original = %original, error = %e, "relay delete failed");
                    outcome.failed.push(DeleteFailure {
                        relayed: link,
                        error: e.to_string(),
                    });
                }
            }
        }

        outcome.purged = match self.purge_policy {
            PurgePolicy::All => self.relay_map.purge(original).await?,
            PurgePolicy::Succeeded => {
                let mut n = 0;
                for link in &outcome.deleted {
                    if self.relay_map.remove_link(link).await? == Removal::Removed {
                        n += 1;
                    }
                }
                n
            }
        };

        info!(
            original = %original,
            deleted = outcome.deleted.len(),
            failed = outcome.failed.len(),
            purged = outcome.purged,
            "cascade delete finished"
        );
        Ok(outcome)
    }
}
