use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::record::CompanyRecord;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Error connecting to the database at {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS companies (
            company_name  TEXT NOT NULL,
            ebitda_source TEXT,
            cif_source    TEXT,
            cif           TEXT PRIMARY KEY,
            ebitda        NUMERIC
        );
        ",
    )?;
    Ok(())
}

// ── Loading ──

/// Insert records, skipping any whose CIF is already stored. Returns how many
/// rows were actually inserted.
pub fn load_records(conn: &Connection, records: &[CompanyRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO companies (company_name, ebitda_source, cif_source, cif, ebitda)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (cif) DO NOTHING",
        )?;
        for r in records {
            count += stmt.execute(params![
                r.company_name, r.ebitda_source, r.cif_source, r.cif, r.ebitda,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── CRUD ──

const SELECT_COMPANY: &str =
    "SELECT company_name, ebitda_source, cif_source, cif, ebitda FROM companies";

fn company_from_row(row: &Row) -> rusqlite::Result<CompanyRecord> {
    Ok(CompanyRecord {
        company_name: row.get(0)?,
        ebitda_source: row.get(1)?,
        cif_source: row.get(2)?,
        cif: row.get(3)?,
        ebitda: row.get(4)?,
    })
}

pub fn list_companies(conn: &Connection) -> rusqlite::Result<Vec<CompanyRecord>> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY rowid", SELECT_COMPANY))?;
    let rows = stmt
        .query_map([], company_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_company(conn: &Connection, cif: &str) -> rusqlite::Result<Option<CompanyRecord>> {
    conn.query_row(
        &format!("{} WHERE cif = ?1", SELECT_COMPANY),
        params![cif],
        company_from_row,
    )
    .optional()
}

pub fn insert_company(conn: &Connection, r: &CompanyRecord) -> rusqlite::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO companies (company_name, ebitda_source, cif_source, cif, ebitda)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![r.company_name, r.ebitda_source, r.cif_source, r.cif, r.ebitda],
    )?;
    tx.commit()
}

/// Overwrite the non-key fields of `cif`. Returns false if no such company.
pub fn update_company(conn: &Connection, cif: &str, r: &CompanyRecord) -> rusqlite::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute(
        "UPDATE companies
         SET company_name = ?1, ebitda_source = ?2, cif_source = ?3, ebitda = ?4
         WHERE cif = ?5",
        params![r.company_name, r.ebitda_source, r.cif_source, r.ebitda, cif],
    )?;
    tx.commit()?;
    Ok(changed > 0)
}

pub fn delete_company(conn: &Connection, cif: &str) -> rusqlite::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute("DELETE FROM companies WHERE cif = ?1", params![cif])?;
    tx.commit()?;
    Ok(changed > 0)
}

// ── Stats ──

pub struct Stats {
    pub companies: usize,
    pub total_ebitda: f64,
    pub mean_ebitda: Option<f64>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let (companies, total_ebitda, mean_ebitda): (usize, f64, Option<f64>) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(ebitda), 0.0), AVG(ebitda) FROM companies",
        [],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
    )?;
    Ok(Stats {
        companies,
        total_ebitda,
        mean_ebitda,
    })
}
