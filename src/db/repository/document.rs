use chrono::NaiveDateTime;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

const DOCUMENT_COLUMNS: &str = "id, agency_id, file, status, no_new_records, notes,
     created_at, created_by, updated_at, updated_by";

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, agency_id, file, status, no_new_records, notes,
         created_at, created_by, updated_at, updated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            doc.id.to_string(),
            doc.agency_id.map(|id| id.to_string()),
            doc.file,
            doc.status.as_str(),
            doc.no_new_records as i32,
            doc.notes,
            doc.created_at,
            doc.created_by,
            doc.updated_at,
            doc.updated_by,
        ],
    )
    .map_err(|e| DatabaseError::on_insert("Document", &doc.file, e))?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
    let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1");
    query_optional(conn, &sql, &[&id.to_string()])
}

/// Lookup by the (agency, file) uniqueness key.
pub fn get_document_by_agency_file(
    conn: &Connection,
    agency_id: Option<&Uuid>,
    file: &str,
) -> Result<Option<Document>, DatabaseError> {
    match agency_id {
        Some(agency_id) => {
            let sql = format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE agency_id = ?1 AND file = ?2"
            );
            query_optional(conn, &sql, &[&agency_id.to_string(), &file])
        }
        None => {
            let sql = format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE agency_id IS NULL AND file = ?1
                 ORDER BY created_at, id LIMIT 1"
            );
            query_optional(conn, &sql, &[&file])
        }
    }
}

/// First document stored under `file`, regardless of agency.
pub fn get_document_by_file(conn: &Connection, file: &str) -> Result<Option<Document>, DatabaseError> {
    let sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE file = ?1 ORDER BY created_at, id LIMIT 1"
    );
    query_optional(conn, &sql, &[&file])
}

/// Idempotent create keyed on (agency, file). Returns the row and whether it
/// was newly inserted.
pub fn get_or_create_document(
    conn: &Connection,
    agency_id: Option<Uuid>,
    file: &str,
) -> Result<(Document, bool), DatabaseError> {
    if let Some(existing) = get_document_by_agency_file(conn, agency_id.as_ref(), file)? {
        return Ok((existing, false));
    }
    let doc = Document::new(agency_id, file);
    insert_document(conn, &doc)?;
    Ok((doc, true))
}

pub fn update_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET agency_id = ?2, file = ?3, status = ?4, no_new_records = ?5,
         notes = ?6, updated_at = ?7, updated_by = ?8
         WHERE id = ?1",
        params![
            doc.id.to_string(),
            doc.agency_id.map(|id| id.to_string()),
            doc.file,
            doc.status.as_str(),
            doc.no_new_records as i32,
            doc.notes,
            super::now(),
            doc.updated_by,
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::not_found("Document", doc.id));
    }
    Ok(())
}

/// Write only the status column. Used by reconciliation so a cascade never
/// clobbers concurrent edits to other fields.
pub fn update_document_status(
    conn: &Connection,
    id: &Uuid,
    status: Status,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE documents SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id.to_string(), status.as_str(), super::now()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::not_found("Document", id));
    }
    Ok(())
}

pub fn list_documents(
    conn: &Connection,
    filter: &DocumentFilter,
) -> Result<Vec<Document>, DatabaseError> {
    let mut sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE 1=1");
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(agency_id) = &filter.agency_id {
        values.push(Box::new(agency_id.to_string()));
        sql.push_str(&format!(" AND agency_id = ?{}", values.len()));
    }
    if !filter.statuses.is_empty() {
        let mut placeholders = Vec::with_capacity(filter.statuses.len());
        for status in &filter.statuses {
            values.push(Box::new(status.as_str()));
            placeholders.push(format!("?{}", values.len()));
        }
        sql.push_str(&format!(" AND status IN ({})", placeholders.join(", ")));
    }
    if let Some(suffix) = &filter.file_suffix {
        values.push(Box::new(super::like_suffix(suffix)));
        sql.push_str(&format!(" AND file LIKE ?{} ESCAPE '\\'", values.len()));
    }
    if let Some(suffix) = &filter.exclude_file_suffix {
        values.push(Box::new(super::like_suffix(suffix)));
        sql.push_str(&format!(" AND file NOT LIKE ?{} ESCAPE '\\'", values.len()));
    }
    if let Some(no_new_records) = filter.no_new_records {
        values.push(Box::new(no_new_records as i32));
        sql.push_str(&format!(" AND no_new_records = ?{}", values.len()));
    }
    sql.push_str(" ORDER BY file, id");

    let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    query_many(conn, &sql, &refs)
}

pub fn list_documents_for_agency(
    conn: &Connection,
    agency_id: &Uuid,
) -> Result<Vec<Document>, DatabaseError> {
    list_documents(
        conn,
        &DocumentFilter {
            agency_id: Some(*agency_id),
            ..Default::default()
        },
    )
}

/// Documents of one agency whose path starts with `prefix`. Used to find
/// the parent of a processed file from its stripped path.
pub fn documents_with_file_prefix(
    conn: &Connection,
    agency_id: &Uuid,
    prefix: &str,
) -> Result<Vec<Document>, DatabaseError> {
    let sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents
         WHERE agency_id = ?1 AND file LIKE ?2 ESCAPE '\\'
         ORDER BY file, id"
    );
    query_many(conn, &sql, &[&agency_id.to_string(), &super::like_prefix(prefix)])
}

/// How many documents, in any agency, have this exact file name.
pub fn count_documents_named(conn: &Connection, file_name: &str) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE file = ?1 OR file LIKE ?2 ESCAPE '\\'",
        params![file_name, super::like_suffix(&format!("/{file_name}"))],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

pub fn delete_document(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM documents WHERE id = ?1", params![id.to_string()])?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("Document", id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Related documents (symmetric)
// ---------------------------------------------------------------------------

fn canonical_pair(a: &Uuid, b: &Uuid) -> (String, String) {
    let (a, b) = (a.to_string(), b.to_string());
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Record that two documents are related. Relating a document to itself is
/// rejected; relating an already related pair is a no-op.
pub fn relate_documents(conn: &Connection, a: &Uuid, b: &Uuid) -> Result<(), DatabaseError> {
    if a == b {
        return Err(DatabaseError::ConstraintViolation(
            "a document cannot be related to itself".into(),
        ));
    }
    let (low, high) = canonical_pair(a, b);
    conn.execute(
        "INSERT OR IGNORE INTO document_relations (document_id, related_id) VALUES (?1, ?2)",
        params![low, high],
    )?;
    Ok(())
}

pub fn unrelate_documents(conn: &Connection, a: &Uuid, b: &Uuid) -> Result<(), DatabaseError> {
    let (low, high) = canonical_pair(a, b);
    conn.execute(
        "DELETE FROM document_relations WHERE document_id = ?1 AND related_id = ?2",
        params![low, high],
    )?;
    Ok(())
}

pub fn related_documents(conn: &Connection, id: &Uuid) -> Result<Vec<Document>, DatabaseError> {
    let sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id IN (
             SELECT related_id FROM document_relations WHERE document_id = ?1
             UNION
             SELECT document_id FROM document_relations WHERE related_id = ?1
         )
         ORDER BY file, id"
    );
    query_many(conn, &sql, &[&id.to_string()])
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn query_optional(
    conn: &Connection,
    sql: &str,
    values: &[&dyn ToSql],
) -> Result<Option<Document>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    match stmt.query_row(values, read_document_row) {
        Ok(row) => Ok(Some(document_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn query_many(
    conn: &Connection,
    sql: &str,
    values: &[&dyn ToSql],
) -> Result<Vec<Document>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(values, read_document_row)?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(document_from_row(row?)?);
    }
    Ok(docs)
}

struct DocumentRow {
    id: String,
    agency_id: Option<String>,
    file: String,
    status: String,
    no_new_records: i32,
    notes: Option<String>,
    created_at: NaiveDateTime,
    created_by: Option<String>,
    updated_at: NaiveDateTime,
    updated_by: Option<String>,
}

fn read_document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        agency_id: row.get(1)?,
        file: row.get(2)?,
        status: row.get(3)?,
        no_new_records: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
        created_by: row.get(7)?,
        updated_at: row.get(8)?,
        updated_by: row.get(9)?,
    })
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    Ok(Document {
        id: super::parse_uuid(&row.id)?,
        agency_id: super::parse_optional_uuid(row.agency_id)?,
        file: row.file,
        status: Status::from_stored(&row.status),
        no_new_records: row.no_new_records != 0,
        notes: row.notes,
        created_at: row.created_at,
        created_by: row.created_by,
        updated_at: row.updated_at,
        updated_by: row.updated_by,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::get_or_create_agency;
    use crate::db::sqlite::open_memory_database;

    fn setup() -> (Connection, Uuid) {
        let conn = open_memory_database().unwrap();
        let (agency, _) = get_or_create_agency(&conn, "Kent Police Department").unwrap();
        (conn, agency.id)
    }

    #[test]
    fn insert_and_get_document() {
        let (conn, agency_id) = setup();
        let mut doc = Document::new(Some(agency_id), "agency_attachments/Kent/letter.pdf");
        doc.notes = Some("first installment".into());
        insert_document(&conn, &doc).unwrap();

        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.file, doc.file);
        assert_eq!(loaded.agency_id, Some(agency_id));
        assert_eq!(loaded.status, Status::Unchecked);
        assert_eq!(loaded.notes.as_deref(), Some("first installment"));
    }

    #[test]
    fn agency_file_pair_is_unique() {
        let (conn, agency_id) = setup();
        let file = "agency_attachments/Kent/letter.pdf";
        insert_document(&conn, &Document::new(Some(agency_id), file)).unwrap();
        let err = insert_document(&conn, &Document::new(Some(agency_id), file)).unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn get_or_create_document_is_idempotent() {
        let (conn, agency_id) = setup();
        let file = "agency_attachments/Kent/letter.pdf";
        let (first, created) = get_or_create_document(&conn, Some(agency_id), file).unwrap();
        assert!(created);
        let (second, created) = get_or_create_document(&conn, Some(agency_id), file).unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn unknown_stored_status_reads_as_unchecked() {
        let (conn, agency_id) = setup();
        let doc = Document::new(Some(agency_id), "agency_attachments/Kent/letter.pdf");
        insert_document(&conn, &doc).unwrap();
        conn.execute(
            "UPDATE documents SET status = 'awaiting-ocr' WHERE id = ?1",
            params![doc.id.to_string()],
        )
        .unwrap();

        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.status, Status::Unchecked);
    }

    #[test]
    fn update_status_only() {
        let (conn, agency_id) = setup();
        let mut doc = Document::new(Some(agency_id), "agency_attachments/Kent/letter.pdf");
        doc.notes = Some("keep me".into());
        insert_document(&conn, &doc).unwrap();

        update_document_status(&conn, &doc.id, Status::AwaitingCsv).unwrap();
        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.status, Status::AwaitingCsv);
        assert_eq!(loaded.notes.as_deref(), Some("keep me"));
    }

    #[test]
    fn update_missing_document_is_not_found() {
        let conn = open_memory_database().unwrap();
        let doc = Document::new(None, "agency_attachments/Kent/ghost.pdf");
        assert!(matches!(
            update_document(&conn, &doc).unwrap_err(),
            DatabaseError::NotFound { .. }
        ));
    }

    #[test]
    fn filter_by_status_set_and_suffix() {
        let (conn, agency_id) = setup();
        let mut a = Document::new(Some(agency_id), "agency_attachments/Kent/a.pdf");
        a.status = Status::AwaitingReading;
        let mut b = Document::new(Some(agency_id), "agency_attachments/Kent/b.pdf");
        b.status = Status::CaseDoc;
        let mut c = Document::new(Some(agency_id), "agency_attachments/Kent/c.ocr.pdf");
        c.status = Status::AwaitingReading;
        let mut d = Document::new(Some(agency_id), "agency_attachments/Kent/d.pdf");
        d.status = Status::Complete;
        for doc in [&a, &b, &c, &d] {
            insert_document(&conn, doc).unwrap();
        }

        let found = list_documents(
            &conn,
            &DocumentFilter {
                statuses: vec![Status::AwaitingReading, Status::CaseDoc],
                file_suffix: Some(".pdf".into()),
                exclude_file_suffix: Some(".ocr.pdf".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let files: Vec<&str> = found.iter().map(|d| d.file.as_str()).collect();
        assert_eq!(
            files,
            vec!["agency_attachments/Kent/a.pdf", "agency_attachments/Kent/b.pdf"]
        );
    }

    #[test]
    fn filter_by_no_new_records() {
        let (conn, agency_id) = setup();
        let mut frozen = Document::new(Some(agency_id), "agency_attachments/Kent/none.pdf");
        frozen.no_new_records = true;
        insert_document(&conn, &frozen).unwrap();
        insert_document(&conn, &Document::new(Some(agency_id), "agency_attachments/Kent/x.pdf"))
            .unwrap();

        let found = list_documents(
            &conn,
            &DocumentFilter {
                no_new_records: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, frozen.id);
    }

    #[test]
    fn prefix_lookup_is_scoped_to_agency() {
        let (conn, agency_id) = setup();
        let (other, _) = get_or_create_agency(&conn, "Auburn Police Department").unwrap();
        insert_document(&conn, &Document::new(Some(agency_id), "agency_attachments/Kent/log.pdf"))
            .unwrap();
        insert_document(&conn, &Document::new(Some(other.id), "agency_attachments/Kent/log.xlsx"))
            .unwrap();

        let found = documents_with_file_prefix(&conn, &agency_id, "agency_attachments/Kent/log").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file, "agency_attachments/Kent/log.pdf");
    }

    #[test]
    fn count_by_file_name_across_agencies() {
        let (conn, agency_id) = setup();
        let (other, _) = get_or_create_agency(&conn, "Auburn Police Department").unwrap();
        insert_document(&conn, &Document::new(Some(agency_id), "agency_attachments/Kent/log.pdf"))
            .unwrap();
        insert_document(&conn, &Document::new(Some(other.id), "agency_attachments/Auburn/log.pdf"))
            .unwrap();
        insert_document(&conn, &Document::new(Some(other.id), "agency_attachments/Auburn/catalog.pdf"))
            .unwrap();

        assert_eq!(count_documents_named(&conn, "log.pdf").unwrap(), 2);
        assert_eq!(count_documents_named(&conn, "catalog.pdf").unwrap(), 1);
        assert_eq!(count_documents_named(&conn, "missing.pdf").unwrap(), 0);
    }

    #[test]
    fn relations_are_symmetric() {
        let (conn, agency_id) = setup();
        let a = Document::new(Some(agency_id), "agency_attachments/Kent/a.pdf");
        let b = Document::new(Some(agency_id), "agency_attachments/Kent/b.pdf");
        insert_document(&conn, &a).unwrap();
        insert_document(&conn, &b).unwrap();

        relate_documents(&conn, &b.id, &a.id).unwrap();
        relate_documents(&conn, &a.id, &b.id).unwrap();

        assert_eq!(related_documents(&conn, &a.id).unwrap()[0].id, b.id);
        assert_eq!(related_documents(&conn, &b.id).unwrap()[0].id, a.id);

        unrelate_documents(&conn, &a.id, &b.id).unwrap();
        assert!(related_documents(&conn, &a.id).unwrap().is_empty());
        assert!(related_documents(&conn, &b.id).unwrap().is_empty());
    }

    #[test]
    fn self_relation_rejected() {
        let (conn, agency_id) = setup();
        let a = Document::new(Some(agency_id), "agency_attachments/Kent/a.pdf");
        insert_document(&conn, &a).unwrap();
        assert!(relate_documents(&conn, &a.id, &a.id).is_err());
    }
}
