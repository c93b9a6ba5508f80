//! # Tender Repository
//!
//! Stores each tender as one JSON document with an optimistic revision tag.
//!
//! ## Save Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       save_tender                                       │
//! │                                                                         │
//! │  1. assign ids            tender.id, nested ids, tenderID              │
//! │  2. test mode             "[ТЕСТУВАННЯ]" / "[TESTING]" title prefixes  │
//! │  3. validate              every field error → DbError::Invalid         │
//! │  4. diff                  previous document vs current (plain JSON)    │
//! │       └── no changes → return None, nothing written                    │
//! │  5. revision              {author, date, rev: previous rev, changes}   │
//! │  6. dateModified = now                                                 │
//! │  7. save                  UPDATE ... WHERE id = ? AND rev = ?          │
//! │       └── 0 rows → RevisionConflict (never retried here)               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Revision Tags
//! `rev` is `"<N>-<32 hex>"`. N counts saves of the document; the hex part
//! is random so two writers never produce the same tag.

use serde_json::{json, Value as JsonValue};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use tender_core::models::Entity;
use tender_core::revision::Revision;
use tender_core::time::{format_iso, kyiv_offset, Timestamp};
use tender_core::{CoreConfig, CoreError, Tender};

use crate::error::{DbError, DbResult};

/// Fields left out of the revision diff.
const UNTRACKED_FIELDS: &[&str] = &["revisions", "dateModified"];

// =============================================================================
// Stored Document
// =============================================================================

/// A document as read from or written to the `tenders` table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    /// `None` for a document that has never been saved.
    pub rev: Option<String>,
    pub document: JsonValue,
    pub is_archived: bool,
}

impl StoredDocument {
    /// A document that has not been saved yet.
    pub fn new(id: impl Into<String>, document: JsonValue) -> Self {
        StoredDocument {
            id: id.into(),
            rev: None,
            document,
            is_archived: false,
        }
    }

    /// Deserializes the stored tender.
    pub fn to_tender(&self) -> DbResult<Tender> {
        Ok(serde_json::from_value(self.document.clone())?)
    }

    fn summary(&self, field: &str) -> Option<&str> {
        self.document.get(field).and_then(JsonValue::as_str)
    }
}

#[derive(Debug, FromRow)]
struct TenderRow {
    id: String,
    rev: String,
    document: String,
    is_archived: i64,
}

impl TryFrom<TenderRow> for StoredDocument {
    type Error = DbError;

    fn try_from(row: TenderRow) -> DbResult<Self> {
        Ok(StoredDocument {
            id: row.id,
            rev: Some(row.rev),
            document: serde_json::from_str(&row.document)?,
            is_archived: row.is_archived != 0,
        })
    }
}

/// Who is saving and as of when.
#[derive(Debug, Clone, Copy)]
pub struct SaveContext<'a> {
    /// Recorded as the revision author.
    pub author: &'a str,
    pub now: Timestamp,
    pub config: &'a CoreConfig,
}

fn next_rev(previous: Option<&str>) -> String {
    let generation = previous
        .and_then(|rev| rev.split('-').next())
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-{}", generation + 1, Uuid::new_v4().simple())
}

fn untracked_removed(document: &JsonValue) -> JsonValue {
    let mut document = document.clone();
    if let Some(map) = document.as_object_mut() {
        for field in UNTRACKED_FIELDS {
            map.remove(*field);
        }
    }
    document
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for tender documents.
#[derive(Debug, Clone)]
pub struct TenderRepository {
    pool: SqlitePool,
    server_id: Option<String>,
}

impl TenderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TenderRepository {
            pool,
            server_id: None,
        }
    }

    /// Sets the suffix appended to generated tenderIDs.
    pub fn with_server_id(mut self, server_id: Option<&str>) -> Self {
        self.server_id = server_id.map(str::to_string);
        self
    }

    /// Reads a document, archived or not.
    pub async fn get(&self, id: &str) -> DbResult<Option<StoredDocument>> {
        let row: Option<TenderRow> = sqlx::query_as(
            r#"
            SELECT id, rev, document, is_archived
            FROM tenders
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StoredDocument::try_from).transpose()
    }

    /// Reads a live document.
    ///
    /// ## Errors
    /// - `NotFound` when no document has this id
    /// - `Archived` when the tender was archived
    pub async fn load(&self, id: &str) -> DbResult<StoredDocument> {
        let Some(document) = self.get(id).await? else {
            debug!(tender_id = %id, "Tender not found");
            return Err(DbError::not_found("Tender", id));
        };
        if document.is_archived {
            debug!(tender_id = %id, "Tender is archived");
            return Err(DbError::Archived { id: id.to_string() });
        }
        Ok(document)
    }

    /// Reads a live tender. Errors as [`TenderRepository::load`].
    pub async fn extract(&self, id: &str) -> DbResult<Tender> {
        self.load(id).await?.to_tender()
    }

    /// Writes a document and returns `(id, new rev)`.
    ///
    /// A document without `rev` is inserted; otherwise the stored row must
    /// still carry that `rev`. A save never retries.
    pub async fn save(&self, document: &StoredDocument) -> DbResult<(String, String)> {
        let rev = next_rev(document.rev.as_deref());
        let body = serde_json::to_string(&document.document)?;
        let status = document.summary("status").unwrap_or("active.enquiries");

        match document.rev.as_deref() {
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO tenders
                        (id, rev, tender_id, status, mode, is_archived, document, date_modified)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                )
                .bind(&document.id)
                .bind(&rev)
                .bind(document.summary("tenderID"))
                .bind(status)
                .bind(document.summary("mode"))
                .bind(document.is_archived)
                .bind(&body)
                .bind(document.summary("dateModified"))
                .execute(&self.pool)
                .await;

                if let Err(err) = result {
                    return Err(match DbError::from(err) {
                        DbError::UniqueViolation { field, .. } if field == "tenders.id" => {
                            DbError::RevisionConflict {
                                id: document.id.clone(),
                                expected: "new document".to_string(),
                            }
                        }
                        other => other,
                    });
                }
            }
            Some(expected) => {
                let result = sqlx::query(
                    r#"
                    UPDATE tenders
                    SET rev = ?1, tender_id = ?2, status = ?3, mode = ?4,
                        is_archived = ?5, document = ?6, date_modified = ?7
                    WHERE id = ?8 AND rev = ?9
                    "#,
                )
                .bind(&rev)
                .bind(document.summary("tenderID"))
                .bind(status)
                .bind(document.summary("mode"))
                .bind(document.is_archived)
                .bind(&body)
                .bind(document.summary("dateModified"))
                .bind(&document.id)
                .bind(expected)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    if self.get(&document.id).await?.is_none() {
                        return Err(DbError::not_found("Tender", &document.id));
                    }
                    debug!(tender_id = %document.id, expected, "Stale revision");
                    return Err(DbError::RevisionConflict {
                        id: document.id.clone(),
                        expected: expected.to_string(),
                    });
                }
            }
        }

        debug!(tender_id = %document.id, rev = %rev, "Document saved");
        Ok((document.id.clone(), rev))
    }

    /// Marks a tender archived; later reads answer 410.
    pub async fn archive(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE tenders SET is_archived = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Tender", id));
        }

        info!(tender_id = %id, "Tender archived");
        Ok(())
    }

    /// Issues the next public tender identifier for the Kyiv day of `now`.
    ///
    /// Format: `UA-YYYY-MM-DD-NNNNNN`, plus `-<server_id>` when configured.
    pub async fn generate_tender_id(&self, now: Timestamp) -> DbResult<String> {
        let local = now.with_timezone(&kyiv_offset(now.naive_utc().date()));
        let day = local.format("%Y-%m-%d").to_string();

        let index: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tender_id_counters (day, value) VALUES (?1, 1)
            ON CONFLICT(day) DO UPDATE SET value = value + 1
            RETURNING value
            "#,
        )
        .bind(&day)
        .fetch_one(&self.pool)
        .await?;

        let mut tender_id = format!("UA-{}-{:06}", day, index);
        if let Some(server_id) = &self.server_id {
            tender_id.push('-');
            tender_id.push_str(server_id);
        }
        Ok(tender_id)
    }

    /// Validates and stores a tender, recording what changed since `previous`.
    ///
    /// `previous` is the document the change was based on, `None` for a new
    /// tender. Returns the new rev, or `None` when nothing changed and no
    /// write happened. Validation errors surface before anything is written.
    pub async fn save_tender(
        &self,
        tender: &mut Tender,
        previous: Option<&StoredDocument>,
        ctx: &SaveContext<'_>,
    ) -> DbResult<Option<String>> {
        tender.assign_ids();
        if tender.is_test() {
            tender.set_mode_test_titles();
        }

        let errors = tender.validate_at(ctx.now, ctx.config)?;
        if !errors.is_empty() {
            debug!(tender_id = ?tender.id, fields = errors.len(), "Tender failed validation");
            return Err(DbError::Invalid(CoreError::Validation(errors)));
        }

        // A rejected tender must not consume a number from the day counter.
        if tender.tender_id.is_none() {
            tender.tender_id = Some(self.generate_tender_id(ctx.now).await?);
        }

        let id = tender
            .id
            .clone()
            .ok_or_else(|| DbError::Internal("tender has no id after assign_ids".to_string()))?;

        let current = untracked_removed(&serde_json::to_value(&*tender)?);
        let before = previous
            .map(|document| untracked_removed(&document.document))
            .unwrap_or_else(|| json!({}));

        let Some(mut revision) = Revision::between(ctx.author, ctx.now, &before, &current) else {
            debug!(tender_id = %id, "No changes, save skipped");
            return Ok(None);
        };
        revision.rev = previous.and_then(|document| document.rev.clone());
        tender.revisions.push(revision);

        let old_date_modified = tender.date_modified.replace(ctx.now);

        let document = StoredDocument {
            id: id.clone(),
            rev: previous.and_then(|document| document.rev.clone()),
            document: serde_json::to_value(&*tender)?,
            is_archived: false,
        };
        let (_, rev) = self.save(&document).await?;

        info!(
            tender_id = %id,
            rev = %rev,
            date_modified_old = %old_date_modified.as_ref().map(format_iso).unwrap_or_default(),
            date_modified_new = %format_iso(&ctx.now),
            "Saved tender"
        );
        Ok(Some(rev))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tender_core::time::kyiv_midnight;
    use tender_core::TenderStatus;

    async fn repository() -> TenderRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.tenders(None)
    }

    fn now() -> Timestamp {
        kyiv_midnight(2017, 10, 7)
    }

    fn valid_tender() -> Tender {
        serde_json::from_value(json!({
            "title": "футляри до державних нагород",
            "procuringEntity": {
                "name": "Державне управління справами",
                "identifier": {"scheme": "UA-EDR", "id": "00037256"},
                "address": {"countryName": "Україна"},
                "contactPoint": {"name": "Державне управління справами", "telephone": "0440000000"}
            },
            "value": {"amount": 500, "currency": "UAH"},
            "minimalStep": {"amount": 35, "currency": "UAH"},
            "items": [{
                "description": "футляри до державних нагород",
                "classification": {"scheme": "CPV", "id": "44617100-9", "description": "Cartons"},
                "additionalClassifications": [
                    {"scheme": "ДКПП", "id": "17.21.1", "description": "папір і картон гофровані"}
                ]
            }],
            "enquiryPeriod": {"endDate": "2017-10-14T00:00:00+03:00"},
            "tenderPeriod": {"endDate": "2017-10-21T00:00:00+03:00"}
        }))
        .unwrap()
    }

    #[test]
    fn test_next_rev() {
        assert!(next_rev(None).starts_with("1-"));
        let rev = next_rev(Some("7-0123456789abcdef0123456789abcdef"));
        assert!(rev.starts_with("8-"));
        assert_eq!(rev.len(), 2 + 32);
        assert!(next_rev(Some("garbage")).starts_with("1-"));
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let repo = repository().await;
        let document = StoredDocument::new("abc", json!({"status": "draft", "title": "x"}));

        let (id, rev) = repo.save(&document).await.unwrap();
        assert_eq!(id, "abc");
        assert!(rev.starts_with("1-"));

        let stored = repo.get("abc").await.unwrap().unwrap();
        assert_eq!(stored.rev.as_deref(), Some(rev.as_str()));
        assert_eq!(stored.document["title"], "x");
        assert!(!stored.is_archived);

        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_rev_conflicts() {
        let repo = repository().await;
        let (_, first) = repo.save(&StoredDocument::new("abc", json!({"n": 1}))).await.unwrap();

        let mut based_on_first = repo.get("abc").await.unwrap().unwrap();
        based_on_first.document = json!({"n": 2});
        let (_, second) = repo.save(&based_on_first).await.unwrap();
        assert!(second.starts_with("2-"));

        // Still based on the first revision.
        let stale = StoredDocument {
            rev: Some(first.clone()),
            ..StoredDocument::new("abc", json!({"n": 3}))
        };
        let err = repo.save(&stale).await.unwrap_err();
        assert!(matches!(err, DbError::RevisionConflict { expected, .. } if expected == first));

        let duplicate = repo.save(&StoredDocument::new("abc", json!({}))).await.unwrap_err();
        assert!(matches!(duplicate, DbError::RevisionConflict { .. }));

        let missing = StoredDocument {
            rev: Some(first),
            ..StoredDocument::new("nope", json!({}))
        };
        assert!(matches!(repo.save(&missing).await.unwrap_err(), DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_extract_not_found_and_archived() {
        let repo = repository().await;
        let err = repo.extract("missing").await.unwrap_err();
        assert_eq!(err.to_response().unwrap().status_code, 404);

        let mut tender = valid_tender();
        let ctx = SaveContext {
            author: "broker",
            now: now(),
            config: &CoreConfig::default(),
        };
        repo.save_tender(&mut tender, None, &ctx).await.unwrap();
        let id = tender.id.clone().unwrap();

        assert_eq!(repo.extract(&id).await.unwrap().title, tender.title);

        repo.archive(&id).await.unwrap();
        let err = repo.extract(&id).await.unwrap_err();
        assert!(matches!(err, DbError::Archived { .. }));
        assert_eq!(err.to_response().unwrap().status_code, 410);

        assert!(matches!(
            repo.archive("missing").await.unwrap_err(),
            DbError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_generate_tender_id() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.tenders(None);

        assert_eq!(repo.generate_tender_id(now()).await.unwrap(), "UA-2017-10-07-000001");
        assert_eq!(repo.generate_tender_id(now()).await.unwrap(), "UA-2017-10-07-000002");

        // 23:30 UTC on the 7th is already the 8th in Kyiv.
        let late = tender_core::time::parse_iso("2017-10-07T23:30:00+00:00").unwrap();
        assert_eq!(repo.generate_tender_id(late).await.unwrap(), "UA-2017-10-08-000001");

        let suffixed = db.tenders(Some("s1"));
        assert_eq!(
            suffixed.generate_tender_id(now()).await.unwrap(),
            "UA-2017-10-07-000003-s1"
        );
    }

    #[tokio::test]
    async fn test_save_tender_records_revisions() {
        let repo = repository().await;
        let config = CoreConfig::default();
        let ctx = SaveContext {
            author: "broker",
            now: now(),
            config: &config,
        };

        let mut tender = valid_tender();
        let first = repo.save_tender(&mut tender, None, &ctx).await.unwrap().unwrap();
        assert!(first.starts_with("1-"));
        assert!(tender.id.is_some());
        assert!(tender.items[0].id.is_some());
        assert_eq!(tender.tender_id.as_deref(), Some("UA-2017-10-07-000001"));
        assert_eq!(tender.date_modified, Some(now()));
        assert_eq!(tender.revisions.len(), 1);
        assert_eq!(tender.revisions[0].author, "broker");
        assert!(tender.revisions[0].rev.is_none());

        let id = tender.id.clone().unwrap();
        let previous = repo.load(&id).await.unwrap();
        let mut loaded = previous.to_tender().unwrap();
        assert_eq!(loaded, tender);

        let later = now() + tender_core::time::days(1);
        loaded.title = Some("нова назва".to_string());
        let ctx = SaveContext { now: later, ..ctx };
        let second = repo
            .save_tender(&mut loaded, Some(&previous), &ctx)
            .await
            .unwrap()
            .unwrap();
        assert!(second.starts_with("2-"));
        assert_eq!(loaded.revisions.len(), 2);
        assert_eq!(loaded.revisions[1].rev.as_deref(), Some(first.as_str()));
        assert_eq!(loaded.date_modified, Some(later));

        // The stored revision reverts to the previous title.
        let stored = repo.load(&id).await.unwrap();
        let reverted = loaded.revisions[1].revert(&stored.document).unwrap();
        assert_eq!(reverted["title"], "футляри до державних нагород");
    }

    #[tokio::test]
    async fn test_save_tender_skips_noop() {
        let repo = repository().await;
        let config = CoreConfig::default();
        let ctx = SaveContext {
            author: "broker",
            now: now(),
            config: &config,
        };

        let mut tender = valid_tender();
        repo.save_tender(&mut tender, None, &ctx).await.unwrap();
        let previous = repo.load(tender.id.as_deref().unwrap()).await.unwrap();

        let mut unchanged = previous.to_tender().unwrap();
        let later = SaveContext {
            now: now() + tender_core::time::days(1),
            ..ctx
        };
        assert_eq!(repo.save_tender(&mut unchanged, Some(&previous), &later).await.unwrap(), None);
        assert_eq!(unchanged.date_modified, Some(now()));

        let stored = repo.load(tender.id.as_deref().unwrap()).await.unwrap();
        assert_eq!(stored.rev, previous.rev);
    }

    #[tokio::test]
    async fn test_save_tender_rejects_invalid_before_write() {
        let repo = repository().await;
        let config = CoreConfig::default();
        let ctx = SaveContext {
            author: "broker",
            now: now(),
            config: &config,
        };

        let mut tender = valid_tender();
        tender.title = None;
        tender.minimal_step = None;
        let err = repo.save_tender(&mut tender, None, &ctx).await.unwrap_err();

        let response = err.to_response().unwrap();
        assert_eq!(response.status_code, 422);
        assert!(response.entry("title").is_some());
        assert!(response.entry("minimalStep").is_some());

        assert!(repo.get(tender.id.as_deref().unwrap()).await.unwrap().is_none());
        assert!(tender.tender_id.is_none());
        assert_eq!(repo.generate_tender_id(now()).await.unwrap(), "UA-2017-10-07-000001");
    }

    #[tokio::test]
    async fn test_save_tender_test_mode_titles() {
        let repo = repository().await;
        let config = CoreConfig::default();
        let ctx = SaveContext {
            author: "broker",
            now: now(),
            config: &config,
        };

        let mut tender = valid_tender();
        tender.mode = Some("test".to_string());
        tender.status = TenderStatus::ActiveEnquiries;
        repo.save_tender(&mut tender, None, &ctx).await.unwrap();

        assert_eq!(
            tender.title.as_deref(),
            Some("[ТЕСТУВАННЯ] футляри до державних нагород")
        );
        assert_eq!(tender.title_en.as_deref(), Some("[TESTING] "));
    }
}
