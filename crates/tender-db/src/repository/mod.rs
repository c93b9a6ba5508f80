//! # Repository Module
//!
//! Database repository implementations for the tender store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.tenders(server_id).extract(id)                             │
//! │       ▼                                                                 │
//! │  TenderRepository                                                      │
//! │  ├── get / load / extract     read one document                        │
//! │  ├── save                     optimistic write by rev                  │
//! │  ├── save_tender              validate, record revision, write         │
//! │  ├── archive                  hide a tender behind 410                 │
//! │  └── generate_tender_id       UA-YYYY-MM-DD-NNNNNN                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`TenderRepository`] - Tender documents, revisions and tenderIDs

pub mod tender;

pub use tender::{SaveContext, StoredDocument, TenderRepository};
