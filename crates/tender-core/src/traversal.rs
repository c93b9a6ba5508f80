//! # Traversal and ACL
//!
//! Resolves the ids of a request path to one node of the tender aggregate
//! and computes who may do what with it.
//!
//! ## Lineage
//! ```text
//!   root ACL (static, from CoreConfig)
//!     └── Tender      owner grants + per-bid create_award_complaint
//!           └── Award / Bid / Complaint / ...   their own grants
//!                 └── Document
//! ```
//! Permission checks walk the lineage nearest-first; within one ACL the
//! first entry that matches one of the caller's principals decides. Deny
//! entries for disabled brokers sit before the broker grants.
//!
//! ## Principals
//! ```text
//! Everyone                 system.Everyone
//! Principal::group("x")    g:x
//! principal(owner, token)  <owner>_<token>   (None_None before creation)
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::config::CoreConfig;
use crate::error::{ErrorResponse, Location};
use crate::models::{Award, Bid, Cancellation, Complaint, Contract, Document, Lot, Question, Tender};

/// Principal of an owner/token pair.
pub fn principal(owner: Option<&str>, token: Option<&str>) -> String {
    format!("{}_{}", owner.unwrap_or("None"), token.unwrap_or("None"))
}

// =============================================================================
// Principals and Permissions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Principal {
    Everyone,
    Named(String),
    Group(String),
}

impl Principal {
    pub fn named(name: &str) -> Self {
        Principal::Named(name.to_string())
    }

    pub fn group(name: &str) -> Self {
        Principal::Group(name.to_string())
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::Everyone => f.write_str("system.Everyone"),
            Principal::Named(name) => f.write_str(name),
            Principal::Group(name) => write!(f, "g:{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewListing,
    ViewTender,
    CreateTender,
    EditTender,
    UploadTenderDocuments,
    CreateBid,
    EditBid,
    CreateQuestion,
    CreateComplaint,
    EditComplaint,
    UploadComplaintDocuments,
    CreateAwardComplaint,
    Auction,
    ExtractCredentials,
    /// Matches every permission.
    All,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewListing => "view_listing",
            Permission::ViewTender => "view_tender",
            Permission::CreateTender => "create_tender",
            Permission::EditTender => "edit_tender",
            Permission::UploadTenderDocuments => "upload_tender_documents",
            Permission::CreateBid => "create_bid",
            Permission::EditBid => "edit_bid",
            Permission::CreateQuestion => "create_question",
            Permission::CreateComplaint => "create_complaint",
            Permission::EditComplaint => "edit_complaint",
            Permission::UploadComplaintDocuments => "upload_complaint_documents",
            Permission::CreateAwardComplaint => "create_award_complaint",
            Permission::Auction => "auction",
            Permission::ExtractCredentials => "extract_credentials",
            Permission::All => "ALL_PERMISSIONS",
        }
    }

    fn covers(&self, requested: Permission) -> bool {
        *self == Permission::All || *self == requested
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Access Control Entries
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AceAction {
    Allow,
    Deny,
}

/// One access control entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ace {
    pub action: AceAction,
    pub principal: Principal,
    pub permission: Permission,
}

impl Ace {
    pub fn allow(principal: Principal, permission: Permission) -> Self {
        Ace {
            action: AceAction::Allow,
            principal,
            permission,
        }
    }

    pub fn deny(principal: Principal, permission: Permission) -> Self {
        Ace {
            action: AceAction::Deny,
            principal,
            permission,
        }
    }
}

impl fmt::Display for Ace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self.action {
            AceAction::Allow => "Allow",
            AceAction::Deny => "Deny",
        };
        write!(f, "{} {} {}", action, self.principal, self.permission)
    }
}

/// Grants that hold for every node.
pub fn root_acl(config: &CoreConfig) -> Vec<Ace> {
    const CREATIONS: [Permission; 4] = [
        Permission::CreateBid,
        Permission::CreateComplaint,
        Permission::CreateQuestion,
        Permission::CreateTender,
    ];

    let mut acl = vec![
        Ace::allow(Principal::Everyone, Permission::ViewListing),
        Ace::allow(Principal::Everyone, Permission::ViewTender),
    ];
    for broker in &config.disabled_brokers {
        acl.extend(CREATIONS.iter().map(|p| Ace::deny(Principal::named(broker), *p)));
    }
    acl.extend(CREATIONS.iter().map(|p| Ace::allow(Principal::group("brokers"), *p)));
    acl.extend([
        Ace::allow(Principal::group("auction"), Permission::Auction),
        Ace::allow(Principal::group("auction"), Permission::UploadTenderDocuments),
        Ace::allow(Principal::group("contracting"), Permission::ExtractCredentials),
        Ace::allow(Principal::group("competitive_dialogue"), Permission::CreateTender),
        Ace::allow(Principal::group("chronograph"), Permission::EditTender),
        Ace::allow(Principal::group("Administrator"), Permission::EditTender),
        Ace::allow(Principal::group("Administrator"), Permission::EditBid),
        Ace::allow(Principal::group("admins"), Permission::All),
        Ace::allow(Principal::group("bots"), Permission::UploadTenderDocuments),
    ]);
    acl
}

// =============================================================================
// Identity
// =============================================================================

/// The authenticated caller.
///
/// `token` is the access token sent with the request; combined with the
/// user id it forms the owner principal that local roles are keyed by.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub userid: Option<String>,
    pub groups: Vec<String>,
    pub token: Option<String>,
}

impl Identity {
    pub fn new(userid: &str, groups: &[&str]) -> Self {
        Identity {
            userid: Some(userid.to_string()),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn principals(&self) -> Vec<Principal> {
        let mut principals = vec![Principal::Everyone];
        if let Some(userid) = &self.userid {
            principals.push(Principal::named(userid));
            if let Some(token) = &self.token {
                principals.push(Principal::Named(principal(Some(userid), Some(token))));
            }
        }
        principals.extend(self.groups.iter().map(|g| Principal::group(g)));
        principals
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Route parameters keyed like `tender_id`, `bid_id`, `document_id`.
pub type MatchDict = BTreeMap<String, String>;

/// The node a path points at.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Tender(&'a Tender),
    Award(&'a Award),
    Contract(&'a Contract),
    Bid(&'a Bid),
    Complaint(&'a Complaint),
    Cancellation(&'a Cancellation),
    Question(&'a Question),
    Lot(&'a Lot),
    Document(&'a Document),
}

impl<'a> Node<'a> {
    pub fn id(&self) -> Option<&'a str> {
        match self {
            Node::Tender(tender) => tender.id.as_deref(),
            Node::Award(award) => award.id.as_deref(),
            Node::Contract(contract) => contract.id.as_deref(),
            Node::Bid(bid) => bid.id.as_deref(),
            Node::Complaint(complaint) => complaint.id.as_deref(),
            Node::Cancellation(cancellation) => cancellation.id.as_deref(),
            Node::Question(question) => question.id.as_deref(),
            Node::Lot(lot) => lot.id.as_deref(),
            Node::Document(document) => document.id.as_deref(),
        }
    }

    fn acl(&self) -> Vec<Ace> {
        match self {
            Node::Tender(tender) => tender.acl(),
            Node::Bid(bid) => bid.acl(),
            Node::Complaint(complaint) => complaint.acl(),
            _ => Vec::new(),
        }
    }

    fn local_roles(&self) -> BTreeMap<String, &'static str> {
        match self {
            Node::Tender(tender) => tender.local_roles(),
            Node::Bid(bid) => bid.local_roles(),
            Node::Complaint(complaint) => complaint.local_roles(),
            _ => BTreeMap::new(),
        }
    }
}

/// A resolved node with its lineage, nearest first.
#[derive(Debug, Clone)]
pub struct Resolved<'a> {
    lineage: Vec<Node<'a>>,
    root_acl: Vec<Ace>,
}

impl<'a> Resolved<'a> {
    /// The node the path points at, `None` for the root.
    pub fn node(&self) -> Option<Node<'a>> {
        self.lineage.first().copied()
    }

    pub fn tender(&self) -> Option<&'a Tender> {
        match self.lineage.last() {
            Some(Node::Tender(tender)) => Some(*tender),
            _ => None,
        }
    }

    /// Effective ACL: node grants first, root grants last.
    pub fn acl(&self) -> Vec<Ace> {
        self.lineage
            .iter()
            .flat_map(Node::acl)
            .chain(self.root_acl.iter().cloned())
            .collect()
    }

    pub fn permits(&self, identity: &Identity, permission: Permission) -> bool {
        let principals = identity.principals();
        self.acl()
            .iter()
            .find(|ace| ace.permission.covers(permission) && principals.contains(&ace.principal))
            .is_some_and(|ace| ace.action == AceAction::Allow)
    }

    /// Role the caller acts in on this node.
    ///
    /// Ownership roles (`tender_owner`, `bid_owner`, `complaint_owner`) come
    /// from the lineage, nearest first; otherwise the caller's first group,
    /// and `anonym` without one.
    pub fn authenticated_role(&self, identity: &Identity) -> String {
        if let (Some(userid), Some(token)) = (&identity.userid, &identity.token) {
            let owner = principal(Some(userid), Some(token));
            let local = self
                .lineage
                .iter()
                .find_map(|node| node.local_roles().get(&owner).copied());
            if let Some(role) = local {
                return role.to_string();
            }
        }
        identity
            .groups
            .first()
            .cloned()
            .unwrap_or_else(|| "anonym".to_string())
    }
}

fn lookup<'a, T>(
    items: &'a [T],
    key: &str,
    params: &MatchDict,
    id_of: impl Fn(&T) -> Option<&str>,
) -> Result<&'a T, ErrorResponse> {
    let name = format!("{}_id", key);
    let wanted = params.get(&name).map(String::as_str);
    items
        .iter()
        .find(|item| wanted.is_some() && id_of(*item) == wanted)
        .ok_or_else(|| {
            tracing::debug!(key = %name, "path segment not found");
            ErrorResponse::not_found(Location::Url, name)
        })
}

/// Documents are versioned by reusing the id; the latest version wins.
fn lookup_document<'a>(documents: &'a [Document], params: &MatchDict) -> Result<&'a Document, ErrorResponse> {
    let name = "document_id".to_string();
    let wanted = params.get(&name).map(String::as_str);
    documents
        .iter()
        .rev()
        .find(|document| wanted.is_some() && document.id.as_deref() == wanted)
        .ok_or_else(|| ErrorResponse::not_found(Location::Url, name))
}

/// Resolves route parameters against a loaded tender.
///
/// Keys are tried in a fixed priority order; `tender = None` (creation)
/// resolves to the root.
///
/// ## Errors
/// 404 `url`/`<key>_id` "Not Found" for an id missing from its collection.
pub fn resolve<'a>(
    tender: Option<&'a Tender>,
    params: &MatchDict,
    config: &CoreConfig,
) -> Result<Resolved<'a>, ErrorResponse> {
    let root_acl = root_acl(config);
    let Some(tender) = tender else {
        return Ok(Resolved {
            lineage: Vec::new(),
            root_acl,
        });
    };

    let has = |key: &str| params.contains_key(&format!("{}_id", key));
    let mut lineage = Vec::with_capacity(4);

    if has("award") {
        let award = lookup(&tender.awards, "award", params, |a| a.id.as_deref())?;
        if has("complaint") {
            let complaint = lookup(&award.complaints, "complaint", params, |c| c.id.as_deref())?;
            if has("document") {
                lineage.push(Node::Document(lookup_document(&complaint.documents, params)?));
            }
            lineage.push(Node::Complaint(complaint));
        } else if has("document") {
            lineage.push(Node::Document(lookup_document(&award.documents, params)?));
        }
        lineage.push(Node::Award(award));
    } else if has("contract") {
        let contract = lookup(&tender.contracts, "contract", params, |c| c.id.as_deref())?;
        if has("document") {
            lineage.push(Node::Document(lookup_document(&contract.documents, params)?));
        }
        lineage.push(Node::Contract(contract));
    } else if has("bid") {
        let bid = lookup(&tender.bids, "bid", params, |b| b.id.as_deref())?;
        if has("document") {
            lineage.push(Node::Document(lookup_document(&bid.documents, params)?));
        }
        lineage.push(Node::Bid(bid));
    } else if has("complaint") {
        let complaint = lookup(&tender.complaints, "complaint", params, |c| c.id.as_deref())?;
        if has("document") {
            lineage.push(Node::Document(lookup_document(&complaint.documents, params)?));
        }
        lineage.push(Node::Complaint(complaint));
    } else if has("cancellation") {
        let cancellation =
            lookup(&tender.cancellations, "cancellation", params, |c| c.id.as_deref())?;
        if has("document") {
            lineage.push(Node::Document(lookup_document(&cancellation.documents, params)?));
        }
        lineage.push(Node::Cancellation(cancellation));
    } else if has("document") {
        lineage.push(Node::Document(lookup_document(&tender.documents, params)?));
    } else if has("question") {
        let question = lookup(&tender.questions, "question", params, |q| q.id.as_deref())?;
        lineage.push(Node::Question(question));
    } else if has("lot") {
        lineage.push(Node::Lot(lookup(&tender.lots, "lot", params, |l| l.id.as_deref())?));
    }
    lineage.push(Node::Tender(tender));

    Ok(Resolved { lineage, root_acl })
}

// =============================================================================
// Unit Tests
// =============================================================================
