//! Referral graph
//!
//! One edge per referee, first referral wins. Activation happens once, on
//! the referee's first paid invoice, and is what unlocks both bonuses.

use crate::store::Store;
use crate::types::{Referral, ReferralStats, UserId};
use crate::Result;
use std::sync::Arc;
use tracing::info;

/// Referrer → referee edges
#[derive(Clone)]
pub struct ReferralGraph {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for ReferralGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferralGraph").finish_non_exhaustive()
    }
}

impl ReferralGraph {
    /// Wrap a store
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Link `referee_id` to `referrer_id`. No-op for self-referral or when
    /// the referee already has a referrer. Returns whether a link was made.
    pub async fn link_referral(&self, referrer_id: UserId, referee_id: UserId) -> Result<bool> {
        if referrer_id == referee_id {
            return Ok(false);
        }
        let linked = self.store.insert_referral(referrer_id, referee_id).await?;
        if linked {
            info!(referrer_id = %referrer_id, referee_id = %referee_id, "Referral linked");
        }
        Ok(linked)
    }

    /// Referral of a referee
    pub async fn get_referral(&self, referee_id: UserId) -> Result<Option<Referral>> {
        self.store.get_referral(referee_id).await
    }

    /// Activate the referee's referral. Returns the referrer on the first
    /// call only; absent or already-activated edges give `None`.
    pub async fn activate_referral(&self, referee_id: UserId) -> Result<Option<UserId>> {
        let referrer = self.store.activate_referral(referee_id).await?;
        if let Some(referrer_id) = referrer {
            info!(referrer_id = %referrer_id, referee_id = %referee_id, "Referral activated");
        }
        Ok(referrer)
    }

    /// Invited and activated counts for a referrer
    pub async fn stats(&self, referrer_id: UserId) -> Result<ReferralStats> {
        self.store.referral_stats(referrer_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn graph() -> ReferralGraph {
        ReferralGraph::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_first_referral_wins() {
        let graph = graph();
        let (a, b, c) = (UserId::new(1), UserId::new(2), UserId::new(3));

        assert!(graph.link_referral(a, b).await.unwrap());
        assert!(!graph.link_referral(c, b).await.unwrap());

        let referral = graph.get_referral(b).await.unwrap().unwrap();
        assert_eq!(referral.referrer_id, a);
        assert!(!referral.activated);
    }

    #[tokio::test]
    async fn test_self_referral_forbidden() {
        let graph = graph();
        let a = UserId::new(1);

        assert!(!graph.link_referral(a, a).await.unwrap());
        assert!(graph.get_referral(a).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_activation_is_one_shot() {
        let graph = graph();
        let (a, b) = (UserId::new(1), UserId::new(2));
        graph.link_referral(a, b).await.unwrap();

        assert_eq!(graph.activate_referral(b).await.unwrap(), Some(a));
        assert_eq!(graph.activate_referral(b).await.unwrap(), None);
        assert_eq!(graph.activate_referral(UserId::new(99)).await.unwrap(), None);

        let referral = graph.get_referral(b).await.unwrap().unwrap();
        assert!(referral.activated);
        assert!(referral.activated_at.is_some());
    }

    #[tokio::test]
    async fn test_stats() {
        let graph = graph();
        let a = UserId::new(1);
        for referee in 2..=4 {
            graph.link_referral(a, UserId::new(referee)).await.unwrap();
        }
        graph.link_referral(UserId::new(50), UserId::new(5)).await.unwrap();
        graph.activate_referral(UserId::new(3)).await.unwrap();

        let stats = graph.stats(a).await.unwrap();
        assert_eq!(stats, ReferralStats { invited: 3, activated: 1 });
    }
}
