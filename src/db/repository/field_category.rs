use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::FieldCategory;

const MAX_SEARCH_RESULTS: usize = 20;

pub fn get_field_category(
    conn: &Connection,
    fieldname: &str,
    value: &str,
) -> Result<Option<FieldCategory>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, fieldname, value, count FROM field_categories
         WHERE fieldname = ?1 AND value = ?2",
    )?;
    match stmt.query_row(params![fieldname, value], read_category_row) {
        Ok(row) => Ok(Some(category_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Find or create the (fieldname, value) entry. New entries start at count 0.
pub fn get_or_create_field_category(
    conn: &Connection,
    fieldname: &str,
    value: &str,
) -> Result<FieldCategory, DatabaseError> {
    if let Some(existing) = get_field_category(conn, fieldname, value)? {
        return Ok(existing);
    }
    let category = FieldCategory {
        id: Uuid::new_v4(),
        fieldname: fieldname.to_string(),
        value: value.to_string(),
        count: 0,
    };
    conn.execute(
        "INSERT INTO field_categories (id, fieldname, value, count) VALUES (?1, ?2, ?3, ?4)",
        params![category.id.to_string(), category.fieldname, category.value, category.count],
    )
    .map_err(|e| DatabaseError::on_insert("FieldCategory", value, e))?;
    Ok(category)
}

/// Bump the usage counter, creating the entry on first use.
pub fn increment_field_category(
    conn: &Connection,
    fieldname: &str,
    value: &str,
) -> Result<FieldCategory, DatabaseError> {
    let mut category = get_or_create_field_category(conn, fieldname, value)?;
    conn.execute(
        "UPDATE field_categories SET count = count + 1 WHERE id = ?1",
        params![category.id.to_string()],
    )?;
    category.count += 1;
    Ok(category)
}

/// Values of a field containing `query` (case-insensitive), most used first.
pub fn search_field_categories(
    conn: &Connection,
    fieldname: &str,
    query: &str,
) -> Result<Vec<FieldCategory>, DatabaseError> {
    let pattern = format!("%{}%", query.to_lowercase());
    let mut stmt = conn.prepare(
        "SELECT id, fieldname, value, count FROM field_categories
         WHERE fieldname = ?1 AND LOWER(value) LIKE ?2
         ORDER BY count DESC, value
         LIMIT ?3",
    )?;
    let rows = stmt.query_map(
        params![fieldname, pattern, MAX_SEARCH_RESULTS as i64],
        read_category_row,
    )?;

    let mut categories = Vec::new();
    for row in rows {
        categories.push(category_from_row(row?)?);
    }
    Ok(categories)
}

struct CategoryRow {
    id: String,
    fieldname: String,
    value: String,
    count: i64,
}

fn read_category_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CategoryRow> {
    Ok(CategoryRow {
        id: row.get(0)?,
        fieldname: row.get(1)?,
        value: row.get(2)?,
        count: row.get(3)?,
    })
}

fn category_from_row(row: CategoryRow) -> Result<FieldCategory, DatabaseError> {
    Ok(FieldCategory {
        id: super::parse_uuid(&row.id)?,
        fieldname: row.fieldname,
        value: row.value,
        count: row.count,
    })
}
