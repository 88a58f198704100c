use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_synthetic_document(
    conn: &Connection,
    merge: &SyntheticDocument,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO synthetic_documents (id, file, completed, created_at, created_by,
         updated_at, updated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            merge.id.to_string(),
            merge.file,
            merge.completed as i32,
            merge.created_at,
            merge.created_by,
            merge.updated_at,
            merge.updated_by,
        ],
    )
    .map_err(|e| DatabaseError::on_insert("SyntheticDocument", &merge.id.to_string(), e))?;
    Ok(())
}

pub fn get_synthetic_document(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<SyntheticDocument>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, file, completed, created_at, created_by, updated_at, updated_by
         FROM synthetic_documents WHERE id = ?1",
    )?;
    match stmt.query_row(params![id.to_string()], read_merge_row) {
        Ok(row) => Ok(Some(merge_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_synthetic_document(
    conn: &Connection,
    merge: &SyntheticDocument,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE synthetic_documents SET file = ?2, completed = ?3, updated_at = ?4, updated_by = ?5
         WHERE id = ?1",
        params![
            merge.id.to_string(),
            merge.file,
            merge.completed as i32,
            super::now(),
            merge.updated_by,
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::not_found("SyntheticDocument", merge.id));
    }
    Ok(())
}

pub fn delete_synthetic_document(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM synthetic_documents WHERE id = ?1",
        params![id.to_string()],
    )?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("SyntheticDocument", id));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

pub fn link_document(conn: &Connection, merge_id: &Uuid, document_id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO synthetic_document_documents (synthetic_id, document_id)
         VALUES (?1, ?2)",
        params![merge_id.to_string(), document_id.to_string()],
    )?;
    Ok(())
}

pub fn link_processed(
    conn: &Connection,
    merge_id: &Uuid,
    processed_id: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO synthetic_document_processed (synthetic_id, processed_id)
         VALUES (?1, ?2)",
        params![merge_id.to_string(), processed_id.to_string()],
    )?;
    Ok(())
}

/// Documents and artifacts linked to a merge.
pub fn merge_links(conn: &Connection, merge_id: &Uuid) -> Result<MergeLinks, DatabaseError> {
    Ok(MergeLinks {
        document_ids: id_column(
            conn,
            "SELECT document_id FROM synthetic_document_documents
             WHERE synthetic_id = ?1 ORDER BY document_id",
            &merge_id.to_string(),
        )?,
        processed_document_ids: id_column(
            conn,
            "SELECT processed_id FROM synthetic_document_processed
             WHERE synthetic_id = ?1 ORDER BY processed_id",
            &merge_id.to_string(),
        )?,
    })
}

/// Merges touching a document, linked either directly or through one of its
/// artifacts.
pub fn merges_for_document(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<SyntheticDocument>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, file, completed, created_at, created_by, updated_at, updated_by
         FROM synthetic_documents WHERE id IN (
             SELECT synthetic_id FROM synthetic_document_documents WHERE document_id = ?1
             UNION
             SELECT sp.synthetic_id FROM synthetic_document_processed sp
             JOIN processed_documents p ON p.id = sp.processed_id
             WHERE p.document_id = ?1
         )
         ORDER BY created_at, id",
    )?;
    let rows = stmt.query_map(params![document_id.to_string()], read_merge_row)?;

    let mut merges = Vec::new();
    for row in rows {
        merges.push(merge_from_row(row?)?);
    }
    Ok(merges)
}

pub fn has_completed_merge(conn: &Connection, document_id: &Uuid) -> Result<bool, DatabaseError> {
    Ok(merges_for_document(conn, document_id)?
        .iter()
        .any(|merge| merge.completed))
}

/// Distinct agencies owning the items linked to a merge. Artifacts count
/// through their parent document; detached items contribute nothing.
pub fn merge_agencies(conn: &Connection, merge_id: &Uuid) -> Result<Vec<Uuid>, DatabaseError> {
    id_column(
        conn,
        "SELECT d.agency_id FROM synthetic_document_documents sd
         JOIN documents d ON d.id = sd.document_id
         WHERE sd.synthetic_id = ?1 AND d.agency_id IS NOT NULL
         UNION
         SELECT d.agency_id FROM synthetic_document_processed sp
         JOIN processed_documents p ON p.id = sp.processed_id
         JOIN documents d ON d.id = p.document_id
         WHERE sp.synthetic_id = ?1 AND d.agency_id IS NOT NULL
         ORDER BY 1",
        &merge_id.to_string(),
    )
}

fn id_column(conn: &Connection, sql: &str, key: &str) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(super::parse_uuid(&row?)?);
    }
    Ok(ids)
}

struct MergeRow {
    id: String,
    file: Option<String>,
    completed: i32,
    created_at: NaiveDateTime,
    created_by: Option<String>,
    updated_at: NaiveDateTime,
    updated_by: Option<String>,
}

fn read_merge_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MergeRow> {
    Ok(MergeRow {
        id: row.get(0)?,
        file: row.get(1)?,
        completed: row.get(2)?,
        created_at: row.get(3)?,
        created_by: row.get(4)?,
        updated_at: row.get(5)?,
        updated_by: row.get(6)?,
    })
}

fn merge_from_row(row: MergeRow) -> Result<SyntheticDocument, DatabaseError> {
    Ok(SyntheticDocument {
        id: super::parse_uuid(&row.id)?,
        file: row.file,
        completed: row.completed != 0,
        created_at: row.created_at,
        created_by: row.created_by,
        updated_at: row.updated_at,
        updated_by: row.updated_by,
    })
}
