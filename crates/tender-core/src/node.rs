//! # Validation Scope
//!
//! Nested entities never own or point back to their tender. Instead every
//! validator and serializer receives a `Scope`: a borrowed view of the
//! enclosing tender plus a read-only chain of parent scopes.
//!
//! ## Back-Edges
//! ```text
//!   Scope::root(tender)            tender = Some(&Tender)
//!        │ child("Bid")
//!        ▼
//!   Scope { parent ──────────┐ }   walks up to the root for the tender
//!        │ child("LotValue") │
//!        ▼                   │
//!   Scope { parent ──────────┘ }
//!
//!   Scope::detached("Period")      no tender anywhere up the chain
//!        └── enclosing_tender() ──► CoreError::DetachedNode
//! ```
//!
//! A detached scope asking for its tender is a programming error, never a
//! user input problem, so it surfaces as `CoreError::DetachedNode`.

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::models::tender::Tender;
use crate::time::Timestamp;

/// Where a node sits and what it can see.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    tender: Option<&'a Tender>,
    parent: Option<&'a Scope<'a>>,
    entity: &'static str,
    now: Timestamp,
    config: &'a CoreConfig,
}

impl<'a> Scope<'a> {
    /// Scope of a tender itself.
    pub fn root(tender: &'a Tender, now: Timestamp, config: &'a CoreConfig) -> Self {
        Scope {
            tender: Some(tender),
            parent: None,
            entity: "Tender",
            now,
            config,
        }
    }

    /// Scope of an entity that is a direct child of `tender`.
    pub fn attached(
        tender: &'a Tender,
        entity: &'static str,
        now: Timestamp,
        config: &'a CoreConfig,
    ) -> Self {
        Scope {
            tender: Some(tender),
            parent: None,
            entity,
            now,
            config,
        }
    }

    /// Scope of an entity built on its own.
    pub fn detached(entity: &'static str, now: Timestamp, config: &'a CoreConfig) -> Self {
        Scope {
            tender: None,
            parent: None,
            entity,
            now,
            config,
        }
    }

    /// Scope of a nested entity.
    pub fn child<'b>(&'b self, entity: &'static str) -> Scope<'b>
    where
        'a: 'b,
    {
        Scope {
            tender: None,
            parent: Some(self),
            entity,
            now: self.now,
            config: self.config,
        }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// Entity name of the direct parent, if any.
    pub fn parent_entity(&self) -> Option<&'static str> {
        self.parent.map(|parent| parent.entity)
    }

    pub fn is_attached(&self) -> bool {
        self.parent_tender().is_some()
    }

    /// True when the node was built under some parent, attached or not.
    pub fn has_parent(&self) -> bool {
        self.tender.is_some() || self.parent.is_some()
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn config(&self) -> &'a CoreConfig {
        self.config
    }

    /// The enclosing tender, or `None` for detached nodes.
    pub fn parent_tender(&self) -> Option<&'a Tender> {
        let mut scope = self;
        loop {
            if let Some(tender) = scope.tender {
                return Some(tender);
            }
            match scope.parent {
                Some(parent) => scope = parent,
                None => return None,
            }
        }
    }

    /// The enclosing tender.
    ///
    /// ## Errors
    /// `CoreError::DetachedNode` when the chain has no tender.
    pub fn enclosing_tender(&self) -> CoreResult<&'a Tender> {
        self.parent_tender().ok_or(CoreError::DetachedNode {
            entity: self.entity,
        })
    }

    /// Date of the tender's first revision, or now when it has none.
    pub fn first_revision_date(&self) -> CoreResult<Timestamp> {
        let tender = self.enclosing_tender()?;
        Ok(tender.first_revision_date().unwrap_or(self.now))
    }

    /// Like `first_revision_date` but falls back to now when detached.
    pub fn reference_date(&self) -> Timestamp {
        self.parent_tender()
            .and_then(Tender::first_revision_date)
            .unwrap_or(self.now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::kyiv_midnight;

    #[test]
    fn test_child_finds_tender_through_chain() {
        let config = CoreConfig::default();
        let tender = Tender {
            title: Some("root".to_string()),
            ..Tender::default()
        };
        let now = kyiv_midnight(2017, 10, 7);
        let root = Scope::root(&tender, now, &config);
        let bid = root.child("Bid");
        let lot_value = bid.child("LotValue");

        let found = lot_value.enclosing_tender().unwrap();
        assert_eq!(found.title.as_deref(), Some("root"));
        assert_eq!(lot_value.parent_entity(), Some("Bid"));
    }

    #[test]
    fn test_detached_chain_is_an_invariant_violation() {
        let config = CoreConfig::default();
        let now = kyiv_midnight(2017, 10, 7);
        let period = Scope::detached("Period", now, &config);
        let inner = period.child("Period");

        assert!(inner.parent_tender().is_none());
        let err = inner.enclosing_tender().unwrap_err();
        assert!(matches!(err, CoreError::DetachedNode { entity: "Period" }));
        assert_eq!(inner.reference_date(), now);
    }
}
