use rusqlite::Connection;
use tracing::{info, warn};

use crate::db;
use crate::error::ServiceError;
use crate::record::CompanyRecord;

/// Request-level operations over the companies table, keyed by CIF.
pub struct CompanyService<'a> {
    conn: &'a Connection,
}

impl<'a> CompanyService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn list(&self) -> Result<Vec<CompanyRecord>, ServiceError> {
        Ok(db::list_companies(self.conn)?)
    }

    pub fn get(&self, cif: &str) -> Result<CompanyRecord, ServiceError> {
        db::get_company(self.conn, cif)?.ok_or_else(|| ServiceError::NotFound(cif.to_string()))
    }

    pub fn create(&self, company: CompanyRecord) -> Result<CompanyRecord, ServiceError> {
        validate(&company.company_name, &company.cif)?;
        db::insert_company(self.conn, &company).inspect_err(|e| {
            warn!("Error creating company {}: {}", company.cif, e);
        })?;
        info!("Company {} created", company.cif);
        Ok(company)
    }

    /// Replace the stored fields of `cif`. The key itself never changes.
    pub fn update(
        &self,
        cif: &str,
        mut company: CompanyRecord,
    ) -> Result<CompanyRecord, ServiceError> {
        company.cif = cif.to_string();
        validate(&company.company_name, cif)?;
        if db::update_company(self.conn, cif, &company)? {
            info!("Company {} updated", cif);
            Ok(company)
        } else {
            Err(ServiceError::NotFound(cif.to_string()))
        }
    }

    pub fn delete(&self, cif: &str) -> Result<(), ServiceError> {
        if db::delete_company(self.conn, cif)? {
            info!("Company {} deleted", cif);
            Ok(())
        } else {
            Err(ServiceError::NotFound(cif.to_string()))
        }
    }
}

fn validate(name: &str, cif: &str) -> Result<(), ServiceError> {
    if name.trim().is_empty() {
        return Err(ServiceError::Invalid("company name is empty".into()));
    }
    if cif.trim().is_empty() {
        return Err(ServiceError::Invalid("CIF is empty".into()));
    }
    Ok(())
}
