use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::agency::{population_hint, Agency};

const AGENCY_COLUMNS: &str =
    "id, name, population, completed, request_done, created_at, created_by, updated_at, updated_by";

pub fn insert_agency(conn: &Connection, agency: &Agency) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO agencies (id, name, population, completed, request_done,
         created_at, created_by, updated_at, updated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            agency.id.to_string(),
            agency.name,
            agency.population,
            agency.completed as i32,
            agency.request_done as i32,
            agency.created_at,
            agency.created_by,
            agency.updated_at,
            agency.updated_by,
        ],
    )
    .map_err(|e| DatabaseError::on_insert("Agency", &agency.name, e))?;
    Ok(())
}

pub fn get_agency(conn: &Connection, id: &Uuid) -> Result<Option<Agency>, DatabaseError> {
    query_one(
        conn,
        &format!("SELECT {AGENCY_COLUMNS} FROM agencies WHERE id = ?1"),
        &id.to_string(),
    )
}

pub fn get_agency_by_name(conn: &Connection, name: &str) -> Result<Option<Agency>, DatabaseError> {
    query_one(
        conn,
        &format!("SELECT {AGENCY_COLUMNS} FROM agencies WHERE name = ?1"),
        name,
    )
}

/// Look up an agency by name, creating it when missing. New agencies get a
/// population from the built-in table when one is known.
pub fn get_or_create_agency(conn: &Connection, name: &str) -> Result<(Agency, bool), DatabaseError> {
    if let Some(existing) = get_agency_by_name(conn, name)? {
        return Ok((existing, false));
    }
    let mut agency = Agency::new(name);
    agency.population = population_hint(name);
    insert_agency(conn, &agency)?;
    tracing::info!(agency = %agency.name, population = ?agency.population, "Agency created");
    Ok((agency, true))
}

pub fn update_agency(conn: &Connection, agency: &Agency) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE agencies SET name = ?2, population = ?3, completed = ?4, request_done = ?5,
         updated_at = ?6, updated_by = ?7
         WHERE id = ?1",
        params![
            agency.id.to_string(),
            agency.name,
            agency.population,
            agency.completed as i32,
            agency.request_done as i32,
            super::now(),
            agency.updated_by,
        ],
    )?;
    if rows == 0 {
        return Err(DatabaseError::not_found("Agency", agency.id));
    }
    Ok(())
}

/// All agencies, ordered by name.
pub fn list_agencies(conn: &Connection) -> Result<Vec<Agency>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {AGENCY_COLUMNS} FROM agencies ORDER BY name"))?;
    let rows = stmt.query_map([], read_agency_row)?;

    let mut agencies = Vec::new();
    for row in rows {
        agencies.push(agency_from_row(row?)?);
    }
    Ok(agencies)
}

/// Delete an agency. Its documents stay, detached.
pub fn delete_agency(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let deleted = conn.execute("DELETE FROM agencies WHERE id = ?1", params![id.to_string()])?;
    if deleted == 0 {
        return Err(DatabaseError::not_found("Agency", id));
    }
    tracing::info!(agency_id = %id, "Agency deleted, documents detached");
    Ok(())
}

fn query_one(conn: &Connection, sql: &str, key: &str) -> Result<Option<Agency>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    match stmt.query_row(params![key], read_agency_row) {
        Ok(row) => Ok(Some(agency_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// Internal row type for Agency mapping
struct AgencyRow {
    id: String,
    name: String,
    population: Option<i64>,
    completed: i32,
    request_done: i32,
    created_at: NaiveDateTime,
    created_by: Option<String>,
    updated_at: NaiveDateTime,
    updated_by: Option<String>,
}

fn read_agency_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgencyRow> {
    Ok(AgencyRow {
        id: row.get(0)?,
        name: row.get(1)?,
        population: row.get(2)?,
        completed: row.get(3)?,
        request_done: row.get(4)?,
        created_at: row.get(5)?,
        created_by: row.get(6)?,
        updated_at: row.get(7)?,
        updated_by: row.get(8)?,
    })
}

fn agency_from_row(row: AgencyRow) -> Result<Agency, DatabaseError> {
    Ok(Agency {
        id: super::parse_uuid(&row.id)?,
        name: row.name,
        population: row.population,
        completed: row.completed != 0,
        request_done: row.request_done != 0,
        created_at: row.created_at,
        created_by: row.created_by,
        updated_at: row.updated_at,
        updated_by: row.updated_by,
    })
}
