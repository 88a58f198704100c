use chrono::NaiveDateTime;
use rusqlite::types::ToSql;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

const PROCESSED_COLUMNS: &str = "p.id, p.document_id, p.file, p.status, p.source_page,
     p.source_sheet, p.incident_pgs, p.pages, p.created_at, p.created_by, p.updated_at, p.updated_by";

pub fn insert_processed_document(
    conn: &Connection,
    pdoc: &ProcessedDocument,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO processed_documents (id, document_id, file, status, source_page,
         source_sheet, incident_pgs, pages, created_at, created_by, updated_at, updated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            pdoc.id.to_string(),
            pdoc.document_id.map(|id| id.to_string()),
            pdoc.file,
            pdoc.status.as_str(),
            pdoc.source_page,
            pdoc.source_sheet,
            encode_spans(pdoc.incident_pgs.as_deref())?,
            pdoc.pages,
            pdoc.created_at,
            pdoc.created_by,
            pdoc.updated_at,
            pdoc.updated_by,
        ],
    )
    .map_err(|e| DatabaseError::on_insert("ProcessedDocument", &pdoc.file, e))?;
    Ok(())
}

pub fn get_processed_document(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<ProcessedDocument>, DatabaseError> {
    let sql = format!("SELECT {PROCESSED_COLUMNS} FROM processed_documents p WHERE p.id = ?1");
    query_optional(conn, &sql, &[&id.to_string()])
}

/// Lookup by the globally unique file path.
pub fn get_processed_by_file(
    conn: &Connection,
    file: &str,
) -> Result<Option<ProcessedDocument>, DatabaseError> {
    let sql = format!("SELECT {PROCESSED_COLUMNS} FROM processed_documents p WHERE p.file = ?1");
    query_optional(conn, &sql, &[&file])
}

pub fn update_processed_document(
    conn: &Connection,
    pdoc: &ProcessedDocument,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE processed_documents SET document_id = ?2, file = ?3, status = ?4,
         source_page = ?5, source_sheet = ?6, incident_pgs = ?7, pages = ?8,
         updated_at = ?9, updated_by = ?10
         WHERE id = ?1",
        params![
            pdoc.id.to_string(),
            pdoc.document_id.map(|id| id.to_string()),
            pdoc.file,
            pdoc.status.as_str(),
            pdoc.source_page,
            pdoc.source_sheet,
            encode_spans(pdoc.incident_pgs.as_deref())?,
            pdoc.pages,
            super::now(),
            pdoc.updated_by,
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::not_found("ProcessedDocument", pdoc.id));
    }
    Ok(())
}

/// Every artifact of one document, ordered by file then id.
pub fn list_for_document(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<ProcessedDocument>, DatabaseError> {
    list_processed_documents(
        conn,
        &ProcessedDocumentFilter {
            document_id: Some(*document_id),
            ..Default::default()
        },
    )
}

/// Artifacts of a document that are already complete.
pub fn completed_artifacts(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<ProcessedDocument>, DatabaseError> {
    list_processed_documents(
        conn,
        &ProcessedDocumentFilter {
            document_id: Some(*document_id),
            status: Some(Status::Complete),
            ..Default::default()
        },
    )
}

/// Artifacts with no parent document.
pub fn orphaned_artifacts(conn: &Connection) -> Result<Vec<ProcessedDocument>, DatabaseError> {
    let sql = format!(
        "SELECT {PROCESSED_COLUMNS} FROM processed_documents p
         WHERE p.document_id IS NULL ORDER BY p.file, p.id"
    );
    query_many(conn, &sql, &[])
}

pub fn list_processed_documents(
    conn: &Connection,
    filter: &ProcessedDocumentFilter,
) -> Result<Vec<ProcessedDocument>, DatabaseError> {
    let mut sql = format!(
        "SELECT {PROCESSED_COLUMNS} FROM processed_documents p
         LEFT JOIN documents d ON d.id = p.document_id
         WHERE 1=1"
    );
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(document_id) = &filter.document_id {
        values.push(Box::new(document_id.to_string()));
        sql.push_str(&format!(" AND p.document_id = ?{}", values.len()));
    }
    if let Some(agency_id) = &filter.agency_id {
        values.push(Box::new(agency_id.to_string()));
        sql.push_str(&format!(" AND d.agency_id = ?{}", values.len()));
    }
    if let Some(status) = &filter.status {
        values.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND p.status = ?{}", values.len()));
    }
    if let Some(suffix) = &filter.file_suffix {
        values.push(Box::new(super::like_suffix(suffix)));
        sql.push_str(&format!(" AND p.file LIKE ?{} ESCAPE '\\'", values.len()));
    }
    if !filter.document_statuses.is_empty() {
        let mut placeholders = Vec::with_capacity(filter.document_statuses.len());
        for status in &filter.document_statuses {
            values.push(Box::new(status.as_str()));
            placeholders.push(format!("?{}", values.len()));
        }
        sql.push_str(&format!(" AND d.status IN ({})", placeholders.join(", ")));
    }
    sql.push_str(" ORDER BY p.file, p.id");

    let refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    query_many(conn, &sql, &refs)
}

pub fn delete_processed_document(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM processed_documents WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("ProcessedDocument", id));
    }
    Ok(())
}

fn encode_spans(spans: Option<&[PageSpan]>) -> Result<Option<String>, DatabaseError> {
    spans
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DatabaseError::ConstraintViolation(format!("incident_pgs: {e}")))
}

fn decode_spans(raw: Option<String>) -> Result<Option<Vec<PageSpan>>, DatabaseError> {
    raw.as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| DatabaseError::ConstraintViolation(format!("incident_pgs: {e}")))
}

fn query_optional(
    conn: &Connection,
    sql: &str,
    values: &[&dyn ToSql],
) -> Result<Option<ProcessedDocument>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    match stmt.query_row(values, read_processed_row) {
        Ok(row) => Ok(Some(processed_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn query_many(
    conn: &Connection,
    sql: &str,
    values: &[&dyn ToSql],
) -> Result<Vec<ProcessedDocument>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(values, read_processed_row)?;

    let mut pdocs = Vec::new();
    for row in rows {
        pdocs.push(processed_from_row(row?)?);
    }
    Ok(pdocs)
}

// Internal row type for ProcessedDocument mapping
struct ProcessedRow {
    id: String,
    document_id: Option<String>,
    file: String,
    status: String,
    source_page: Option<String>,
    source_sheet: Option<String>,
    incident_pgs: Option<String>,
    pages: Option<u32>,
    created_at: NaiveDateTime,
    created_by: Option<String>,
    updated_at: NaiveDateTime,
    updated_by: Option<String>,
}

fn read_processed_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProcessedRow> {
    Ok(ProcessedRow {
        id: row.get(0)?,
        document_id: row.get(1)?,
        file: row.get(2)?,
        status: row.get(3)?,
        source_page: row.get(4)?,
        source_sheet: row.get(5)?,
        incident_pgs: row.get(6)?,
        pages: row.get(7)?,
        created_at: row.get(8)?,
        created_by: row.get(9)?,
        updated_at: row.get(10)?,
        updated_by: row.get(11)?,
    })
}

fn processed_from_row(row: ProcessedRow) -> Result<ProcessedDocument, DatabaseError> {
    Ok(ProcessedDocument {
        id: super::parse_uuid(&row.id)?,
        document_id: super::parse_optional_uuid(row.document_id)?,
        file: row.file,
        status: Status::from_stored(&row.status),
        source_page: row.source_page,
        source_sheet: row.source_sheet,
        incident_pgs: decode_spans(row.incident_pgs)?,
        pages: row.pages,
        created_at: row.created_at,
        created_by: row.created_by,
        updated_at: row.updated_at,
        updated_by: row.updated_by,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{get_or_create_agency, insert_document, update_document_status};
    use crate::db::sqlite::open_memory_database;

    fn setup() -> (Connection, Document) {
        let conn = open_memory_database().unwrap();
        let (agency, _) = get_or_create_agency(&conn, "Kent Police Department").unwrap();
        let doc = Document::new(Some(agency.id), "agency_attachments/Kent/letter.pdf");
        insert_document(&conn, &doc).unwrap();
        (conn, doc)
    }

    #[test]
    fn insert_and_get_with_metadata() {
        let (conn, doc) = setup();
        let mut pdoc =
            ProcessedDocument::new(Some(doc.id), "agency_attachments/Kent/letter-p4-9.ocr.pdf");
        pdoc.source_page = Some("4-9".into());
        pdoc.incident_pgs = Some(vec![[0, 2], [3, 5]]);
        pdoc.pages = Some(6);
        insert_processed_document(&conn, &pdoc).unwrap();

        let loaded = get_processed_document(&conn, &pdoc.id).unwrap().unwrap();
        assert_eq!(loaded.status, Status::AwaitingCsv);
        assert_eq!(loaded.source_page.as_deref(), Some("4-9"));
        assert_eq!(loaded.incident_pgs, Some(vec![[0, 2], [3, 5]]));
        assert_eq!(loaded.pages, Some(6));

        let by_file = get_processed_by_file(&conn, &pdoc.file).unwrap().unwrap();
        assert_eq!(by_file.id, pdoc.id);
    }

    #[test]
    fn file_is_globally_unique() {
        let (conn, doc) = setup();
        let file = "agency_attachments/Kent/letter.csv";
        insert_processed_document(&conn, &ProcessedDocument::new(Some(doc.id), file)).unwrap();
        let err = insert_processed_document(&conn, &ProcessedDocument::new(None, file)).unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn update_changes_status() {
        let (conn, doc) = setup();
        let mut pdoc = ProcessedDocument::new(Some(doc.id), "agency_attachments/Kent/letter.csv");
        insert_processed_document(&conn, &pdoc).unwrap();
        pdoc.status = Status::Complete;
        update_processed_document(&conn, &pdoc).unwrap();

        let loaded = get_processed_document(&conn, &pdoc.id).unwrap().unwrap();
        assert_eq!(loaded.status, Status::Complete);
    }

    #[test]
    fn completed_artifacts_filters_status() {
        let (conn, doc) = setup();
        for file in [
            "agency_attachments/Kent/letter.cleaned.csv",
            "agency_attachments/Kent/letter.csv",
            "agency_attachments/Kent/letter.ocr.pdf",
        ] {
            insert_processed_document(&conn, &ProcessedDocument::new(Some(doc.id), file)).unwrap();
        }
        assert_eq!(list_for_document(&conn, &doc.id).unwrap().len(), 3);
        let complete = completed_artifacts(&conn, &doc.id).unwrap();
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0].file, "agency_attachments/Kent/letter.cleaned.csv");
    }

    #[test]
    fn filter_by_document_status_and_suffix() {
        let (conn, doc) = setup();
        update_document_status(&conn, &doc.id, Status::AwaitingReading).unwrap();
        let other = Document::new(doc.agency_id, "agency_attachments/Kent/done.pdf");
        insert_document(&conn, &other).unwrap();
        update_document_status(&conn, &other.id, Status::Complete).unwrap();

        insert_processed_document(
            &conn,
            &ProcessedDocument::new(Some(doc.id), "agency_attachments/Kent/letter.ocr.pdf"),
        )
        .unwrap();
        insert_processed_document(
            &conn,
            &ProcessedDocument::new(Some(other.id), "agency_attachments/Kent/done.ocr.pdf"),
        )
        .unwrap();

        let found = list_processed_documents(
            &conn,
            &ProcessedDocumentFilter {
                agency_id: doc.agency_id,
                file_suffix: Some(".ocr.pdf".into()),
                document_statuses: vec![Status::AwaitingReading, Status::CaseDoc],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file, "agency_attachments/Kent/letter.ocr.pdf");
    }

    #[test]
    fn orphans_are_listed() {
        let conn = open_memory_database().unwrap();
        insert_processed_document(
            &conn,
            &ProcessedDocument::new(None, "agency_attachments/Kent/stray.csv"),
        )
        .unwrap();
        assert_eq!(orphaned_artifacts(&conn).unwrap().len(), 1);
    }

    #[test]
    fn delete_artifact() {
        let (conn, doc) = setup();
        let pdoc = ProcessedDocument::new(Some(doc.id), "agency_attachments/Kent/letter.auto.csv");
        insert_processed_document(&conn, &pdoc).unwrap();
        delete_processed_document(&conn, &pdoc.id).unwrap();
        assert!(get_processed_document(&conn, &pdoc.id).unwrap().is_none());
        assert!(delete_processed_document(&conn, &pdoc.id).is_err());
    }
}
