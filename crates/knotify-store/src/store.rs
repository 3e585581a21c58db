//! SQLite-backed datastore.
//!
//! Lists (tags, target ids) are stored as JSON text columns; timestamps as
//! fixed-width RFC3339 text so range filters work with plain string
//! comparison. WAL mode keeps concurrent reads cheap.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params, params_from_iter};

use knotify_core::error::{KnotifyError, Result};
use knotify_core::types::{
    ChannelKind, DeliveryRecord, DeliveryStatus, Guest, MessageStatus, MessageTarget,
    ScheduledMessage, SubEventAssignment,
};

/// Datastore handle. Cheap to share behind an `Arc`.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| KnotifyError::Store(format!("DB open error: {e}")))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    /// Open an isolated in-memory database; one per test run.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| KnotifyError::Store(format!("DB open error: {e}")))?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| KnotifyError::Store(format!("Lock: {e}")))
    }

    /// Run schema migrations.
    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL,
                subject TEXT,
                content TEXT NOT NULL,
                send_at TEXT NOT NULL,
                target_all INTEGER DEFAULT 0,
                target_guest_ids_json TEXT DEFAULT '[]',
                target_tags_json TEXT DEFAULT '[]',
                target_sub_event_ids_json TEXT DEFAULT '[]',
                sms_enabled INTEGER DEFAULT 1,
                push_enabled INTEGER DEFAULT 0,
                email_enabled INTEGER DEFAULT 0,
                status TEXT DEFAULT 'scheduled',
                recipient_count INTEGER DEFAULT 0,
                success_count INTEGER DEFAULT 0,
                failure_count INTEGER DEFAULT 0,
                sent_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS guests (
                id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL,
                name TEXT NOT NULL,
                phone TEXT,
                email TEXT,
                tags_json TEXT DEFAULT '[]',
                sms_opt_out INTEGER DEFAULT 0,
                push_opt_out INTEGER DEFAULT 0,
                email_opt_out INTEGER DEFAULT 0,
                user_id TEXT
            );

            CREATE TABLE IF NOT EXISTS sub_event_assignments (
                guest_id TEXT NOT NULL,
                sub_event_id TEXT NOT NULL,
                is_invited INTEGER DEFAULT 1,
                PRIMARY KEY (guest_id, sub_event_id)
            );

            CREATE TABLE IF NOT EXISTS delivery_records (
                id TEXT PRIMARY KEY,
                message_id TEXT NOT NULL,
                guest_id TEXT NOT NULL,
                phone TEXT,
                email TEXT,
                sms_status TEXT DEFAULT 'not_applicable',
                push_status TEXT DEFAULT 'not_applicable',
                email_status TEXT DEFAULT 'not_applicable',
                sms_provider_id TEXT,
                push_provider_id TEXT,
                email_provider_id TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (message_id, guest_id)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_due
                ON messages (status, send_at);
            CREATE INDEX IF NOT EXISTS idx_guests_event
                ON guests (event_id);
            CREATE INDEX IF NOT EXISTS idx_records_message
                ON delivery_records (message_id);
            ",
        )
        .map_err(|e| KnotifyError::Store(format!("Migration error: {e}")))?;
        Ok(())
    }

    // ── Messages ──

    /// Insert a newly authored message.
    pub fn insert_message(&self, msg: &ScheduledMessage) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO messages (id, event_id, subject, content, send_at, target_all,
                target_guest_ids_json, target_tags_json, target_sub_event_ids_json,
                sms_enabled, push_enabled, email_enabled, status,
                recipient_count, success_count, failure_count, sent_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                msg.id,
                msg.event_id,
                msg.subject,
                msg.content,
                fmt_ts(&msg.send_at),
                msg.target.all_guests,
                to_json(&msg.target.guest_ids),
                to_json(&msg.target.guest_tags),
                to_json(&msg.target.sub_event_ids),
                msg.sms_enabled,
                msg.push_enabled,
                msg.email_enabled,
                msg.status.as_str(),
                msg.recipient_count,
                msg.success_count,
                msg.failure_count,
                msg.sent_at.as_ref().map(fmt_ts),
                fmt_ts(&msg.created_at),
            ],
        )
        .map_err(|e| KnotifyError::Store(format!("Insert message: {e}")))?;
        Ok(())
    }

    /// Fetch one message by id.
    pub fn get_message(&self, id: &str) -> Result<Option<ScheduledMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {MESSAGE_COLS} FROM messages WHERE id = ?1"))
            .map_err(|e| KnotifyError::Store(format!("Prepare: {e}")))?;
        let mut rows = stmt
            .query_map(params![id], row_to_message)
            .map_err(|e| KnotifyError::Store(format!("Query: {e}")))?;
        match rows.next() {
            Some(row) => Ok(Some(
                row.map_err(|e| KnotifyError::Store(format!("Row: {e}")))?,
            )),
            None => Ok(None),
        }
    }

    /// List messages for an event, newest first.
    pub fn list_messages(&self, event_id: &str) -> Result<Vec<ScheduledMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MESSAGE_COLS} FROM messages WHERE event_id = ?1 ORDER BY created_at DESC"
            ))
            .map_err(|e| KnotifyError::Store(format!("Prepare: {e}")))?;
        let rows = stmt
            .query_map(params![event_id], row_to_message)
            .map_err(|e| KnotifyError::Store(format!("Query: {e}")))?;
        collect_rows(rows)
    }

    /// Select due messages: still scheduled, send_at at or before `now`,
    /// bounded to `limit` rows per invocation.
    pub fn due_messages(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<ScheduledMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MESSAGE_COLS} FROM messages
                 WHERE status = 'scheduled' AND send_at <= ?1
                 ORDER BY send_at ASC LIMIT ?2"
            ))
            .map_err(|e| KnotifyError::Store(format!("Prepare: {e}")))?;
        let rows = stmt
            .query_map(params![fmt_ts(&now), limit], row_to_message)
            .map_err(|e| KnotifyError::Store(format!("Query: {e}")))?;
        collect_rows(rows)
    }

    /// Conditional claim: scheduled → sending, only if the row is still
    /// scheduled. Returns false when another run already claimed it.
    pub fn claim_sending(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE messages SET status = 'sending' WHERE id = ?1 AND status = 'scheduled'",
                params![id],
            )
            .map_err(|e| KnotifyError::Store(format!("Claim: {e}")))?;
        Ok(changed == 1)
    }

    /// Terminal transition with aggregate counts. `sent_at` is set only on
    /// the success path.
    pub fn finalize_message(
        &self,
        id: &str,
        status: MessageStatus,
        recipient_count: i64,
        success_count: i64,
        failure_count: i64,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE messages SET status = ?2, recipient_count = ?3,
                success_count = ?4, failure_count = ?5, sent_at = ?6
             WHERE id = ?1",
            params![
                id,
                status.as_str(),
                recipient_count,
                success_count,
                failure_count,
                sent_at.as_ref().map(fmt_ts),
            ],
        )
        .map_err(|e| KnotifyError::Store(format!("Finalize: {e}")))?;
        Ok(())
    }

    // ── Guests ──

    pub fn insert_guest(&self, guest: &Guest) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO guests (id, event_id, name, phone, email, tags_json,
                sms_opt_out, push_opt_out, email_opt_out, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                guest.id,
                guest.event_id,
                guest.name,
                guest.phone,
                guest.email,
                to_json(&guest.tags),
                guest.sms_opt_out,
                guest.push_opt_out,
                guest.email_opt_out,
                guest.user_id,
            ],
        )
        .map_err(|e| KnotifyError::Store(format!("Insert guest: {e}")))?;
        Ok(())
    }

    /// All guests of an event, in insertion order.
    pub fn guests_for_event(&self, event_id: &str) -> Result<Vec<Guest>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, event_id, name, phone, email, tags_json,
                        sms_opt_out, push_opt_out, email_opt_out, user_id
                 FROM guests WHERE event_id = ?1 ORDER BY rowid",
            )
            .map_err(|e| KnotifyError::Store(format!("Prepare: {e}")))?;
        let rows = stmt
            .query_map(params![event_id], row_to_guest)
            .map_err(|e| KnotifyError::Store(format!("Query: {e}")))?;
        collect_rows(rows)
    }

    // ── Sub-event assignments ──

    pub fn insert_assignment(&self, a: &SubEventAssignment) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO sub_event_assignments (guest_id, sub_event_id, is_invited)
             VALUES (?1, ?2, ?3)",
            params![a.guest_id, a.sub_event_id, a.is_invited],
        )
        .map_err(|e| KnotifyError::Store(format!("Insert assignment: {e}")))?;
        Ok(())
    }

    /// Guest ids invited to any of the given sub-events.
    pub fn invited_guest_ids(&self, sub_event_ids: &[String]) -> Result<HashSet<String>> {
        if sub_event_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let conn = self.conn()?;
        let placeholders = vec!["?"; sub_event_ids.len()].join(", ");
        let mut stmt = conn
            .prepare(&format!(
                "SELECT DISTINCT guest_id FROM sub_event_assignments
                 WHERE is_invited = 1 AND sub_event_id IN ({placeholders})"
            ))
            .map_err(|e| KnotifyError::Store(format!("Prepare: {e}")))?;
        let rows = stmt
            .query_map(params_from_iter(sub_event_ids.iter()), |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| KnotifyError::Store(format!("Query: {e}")))?;
        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row.map_err(|e| KnotifyError::Store(format!("Row: {e}")))?);
        }
        Ok(ids)
    }

    // ── Delivery records ──

    /// Bulk insert the per-recipient ledger. Per-row failures are logged as
    /// data-integrity warnings and do not abort the pipeline; returns the
    /// number of rows actually written.
    pub fn insert_delivery_records(&self, records: &[DeliveryRecord]) -> Result<usize> {
        let conn = self.conn()?;
        let mut inserted = 0;
        for rec in records {
            let result = conn.execute(
                "INSERT INTO delivery_records (id, message_id, guest_id, phone, email,
                    sms_status, push_status, email_status,
                    sms_provider_id, push_provider_id, email_provider_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    rec.id,
                    rec.message_id,
                    rec.guest_id,
                    rec.phone,
                    rec.email,
                    rec.sms_status.as_str(),
                    rec.push_status.as_str(),
                    rec.email_status.as_str(),
                    rec.sms_provider_id,
                    rec.push_provider_id,
                    rec.email_provider_id,
                    fmt_ts(&rec.created_at),
                ],
            );
            match result {
                Ok(_) => inserted += 1,
                Err(e) => tracing::warn!(
                    "Delivery record insert failed (message={}, guest={}): {e}",
                    rec.message_id,
                    rec.guest_id
                ),
            }
        }
        Ok(inserted)
    }

    /// Update one channel's sub-status on a delivery record.
    pub fn update_channel_status(
        &self,
        message_id: &str,
        guest_id: &str,
        kind: ChannelKind,
        status: DeliveryStatus,
        provider_id: Option<&str>,
    ) -> Result<()> {
        let (status_col, provider_col) = match kind {
            ChannelKind::Sms => ("sms_status", "sms_provider_id"),
            ChannelKind::Push => ("push_status", "push_provider_id"),
            ChannelKind::Email => ("email_status", "email_provider_id"),
        };
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "UPDATE delivery_records SET {status_col} = ?3, {provider_col} = ?4
                 WHERE message_id = ?1 AND guest_id = ?2"
            ),
            params![message_id, guest_id, status.as_str(), provider_id],
        )
        .map_err(|e| KnotifyError::Store(format!("Update record: {e}")))?;
        Ok(())
    }

    /// All ledger rows for a message, for post-hoc audit reads.
    pub fn records_for_message(&self, message_id: &str) -> Result<Vec<DeliveryRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, message_id, guest_id, phone, email,
                        sms_status, push_status, email_status,
                        sms_provider_id, push_provider_id, email_provider_id, created_at
                 FROM delivery_records WHERE message_id = ?1 ORDER BY rowid",
            )
            .map_err(|e| KnotifyError::Store(format!("Prepare: {e}")))?;
        let rows = stmt
            .query_map(params![message_id], row_to_record)
            .map_err(|e| KnotifyError::Store(format!("Query: {e}")))?;
        collect_rows(rows)
    }
}

const MESSAGE_COLS: &str = "id, event_id, subject, content, send_at, target_all,
    target_guest_ids_json, target_tags_json, target_sub_event_ids_json,
    sms_enabled, push_enabled, email_enabled, status,
    recipient_count, success_count, failure_count, sent_at, created_at";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduledMessage> {
    let status: String = row.get(12)?;
    let sent_at: Option<String> = row.get(16)?;
    Ok(ScheduledMessage {
        id: row.get(0)?,
        event_id: row.get(1)?,
        subject: row.get(2)?,
        content: row.get(3)?,
        send_at: parse_ts(&row.get::<_, String>(4)?),
        target: MessageTarget {
            all_guests: row.get(5)?,
            guest_ids: from_json(&row.get::<_, String>(6)?),
            guest_tags: from_json(&row.get::<_, String>(7)?),
            sub_event_ids: from_json(&row.get::<_, String>(8)?),
        },
        sms_enabled: row.get(9)?,
        push_enabled: row.get(10)?,
        email_enabled: row.get(11)?,
        status: MessageStatus::parse(&status).unwrap_or(MessageStatus::Failed),
        recipient_count: row.get(13)?,
        success_count: row.get(14)?,
        failure_count: row.get(15)?,
        sent_at: sent_at.as_deref().map(parse_ts),
        created_at: parse_ts(&row.get::<_, String>(17)?),
    })
}

fn row_to_guest(row: &rusqlite::Row<'_>) -> rusqlite::Result<Guest> {
    Ok(Guest {
        id: row.get(0)?,
        event_id: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        tags: from_json(&row.get::<_, String>(5)?),
        sms_opt_out: row.get(6)?,
        push_opt_out: row.get(7)?,
        email_opt_out: row.get(8)?,
        user_id: row.get(9)?,
    })
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeliveryRecord> {
    let sms: String = row.get(5)?;
    let push: String = row.get(6)?;
    let email: String = row.get(7)?;
    Ok(DeliveryRecord {
        id: row.get(0)?,
        message_id: row.get(1)?,
        guest_id: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        sms_status: DeliveryStatus::parse(&sms).unwrap_or(DeliveryStatus::NotApplicable),
        push_status: DeliveryStatus::parse(&push).unwrap_or(DeliveryStatus::NotApplicable),
        email_status: DeliveryStatus::parse(&email).unwrap_or(DeliveryStatus::NotApplicable),
        sms_provider_id: row.get(8)?,
        push_provider_id: row.get(9)?,
        email_provider_id: row.get(10)?,
        created_at: parse_ts(&row.get::<_, String>(11)?),
    })
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| KnotifyError::Store(format!("Row: {e}")))?);
    }
    Ok(out)
}

/// Fixed-width RFC3339 so string comparison matches time order.
fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            tracing::warn!("Unparseable timestamp '{s}': {e}");
            Utc::now()
        })
}

fn to_json(list: &[String]) -> String {
    serde_json::to_string(list).unwrap_or_else(|_| "[]".into())
}

fn from_json(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_else(|e| {
        tracing::warn!("Unparseable JSON list column: {e}");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_message(send_at: DateTime<Utc>) -> ScheduledMessage {
        ScheduledMessage::new("ev1", "Hello {name}!", send_at, MessageTarget::all())
    }

    #[test]
    fn test_message_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let mut msg = sample_message(Utc::now());
        msg.subject = Some("Reminder".into());
        msg.target = MessageTarget {
            all_guests: false,
            guest_ids: vec!["g1".into()],
            guest_tags: vec!["family".into()],
            sub_event_ids: vec!["ceremony".into()],
        };
        store.insert_message(&msg).unwrap();

        let loaded = store.get_message(&msg.id).unwrap().unwrap();
        assert_eq!(loaded.content, "Hello {name}!");
        assert_eq!(loaded.subject.as_deref(), Some("Reminder"));
        assert_eq!(loaded.target.guest_tags, vec!["family".to_string()]);
        assert_eq!(loaded.status, MessageStatus::Scheduled);
    }

    #[test]
    fn test_list_messages_newest_first() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        let mut older = sample_message(now);
        older.created_at = now - Duration::minutes(10);
        let newer = sample_message(now);
        store.insert_message(&older).unwrap();
        store.insert_message(&newer).unwrap();

        let listed = store.list_messages("ev1").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
        assert!(store.list_messages("other-event").unwrap().is_empty());
    }

    #[test]
    fn test_due_selection_boundary() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        let due = sample_message(now - Duration::minutes(5));
        let future = sample_message(now + Duration::minutes(5));
        store.insert_message(&due).unwrap();
        store.insert_message(&future).unwrap();

        let selected = store.due_messages(now, 50).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, due.id);
    }

    #[test]
    fn test_due_selection_skips_non_scheduled() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        let msg = sample_message(now - Duration::minutes(1));
        store.insert_message(&msg).unwrap();
        store
            .finalize_message(&msg.id, MessageStatus::Sent, 3, 3, 0, Some(now))
            .unwrap();
        assert!(store.due_messages(now, 50).unwrap().is_empty());
    }

    #[test]
    fn test_claim_is_conditional() {
        let store = Store::open_in_memory().unwrap();
        let msg = sample_message(Utc::now());
        store.insert_message(&msg).unwrap();

        assert!(store.claim_sending(&msg.id).unwrap());
        // A second overlapping run must see the claim and back off.
        assert!(!store.claim_sending(&msg.id).unwrap());
        let loaded = store.get_message(&msg.id).unwrap().unwrap();
        assert_eq!(loaded.status, MessageStatus::Sending);
    }

    #[test]
    fn test_record_pair_is_unique() {
        let store = Store::open_in_memory().unwrap();
        let a = DeliveryRecord::new("m1", "g1");
        let b = DeliveryRecord::new("m1", "g1");
        let inserted = store.insert_delivery_records(&[a, b]).unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(store.records_for_message("m1").unwrap().len(), 1);
    }

    #[test]
    fn test_update_channel_status() {
        let store = Store::open_in_memory().unwrap();
        let mut rec = DeliveryRecord::new("m1", "g1");
        rec.sms_status = DeliveryStatus::Pending;
        store.insert_delivery_records(&[rec]).unwrap();

        store
            .update_channel_status("m1", "g1", ChannelKind::Sms, DeliveryStatus::Sent, Some("prov-1"))
            .unwrap();

        let recs = store.records_for_message("m1").unwrap();
        assert_eq!(recs[0].sms_status, DeliveryStatus::Sent);
        assert_eq!(recs[0].sms_provider_id.as_deref(), Some("prov-1"));
        assert_eq!(recs[0].push_status, DeliveryStatus::NotApplicable);
    }

    #[test]
    fn test_invited_guest_ids() {
        let store = Store::open_in_memory().unwrap();
        for (guest, sub_event, invited) in [
            ("g1", "ceremony", true),
            ("g2", "ceremony", false),
            ("g3", "reception", true),
        ] {
            store
                .insert_assignment(&SubEventAssignment {
                    guest_id: guest.into(),
                    sub_event_id: sub_event.into(),
                    is_invited: invited,
                })
                .unwrap();
        }
        let ids = store.invited_guest_ids(&["ceremony".into()]).unwrap();
        assert_eq!(ids.len(), 1);
        assert!(ids.contains("g1"));
        assert!(store.invited_guest_ids(&[]).unwrap().is_empty());
    }
}
