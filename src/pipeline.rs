use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::browser::Navigator;
use crate::extract::PageExtractor;
use crate::normalize::normalize;
use crate::record::{CompanyRecord, Extracted};

/// Companies at or below this EBITDA (source currency units) are dropped.
pub const EBITDA_THRESHOLD: f64 = 3_000_000.0;

/// A company as assembled during one pass, before filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedCompany {
    pub name: String,
    pub ebitda_source: String,
    pub cif_source: String,
    pub cif: Extracted<String>,
    pub ebitda: Extracted<f64>,
}

impl ScrapedCompany {
    pub fn qualifies(&self) -> bool {
        let ebitda_ok =
            matches!(self.ebitda, Extracted::Value(v) if v.is_finite() && v > EBITDA_THRESHOLD);
        let cif_ok = matches!(&self.cif, Extracted::Value(c) if !c.trim().is_empty());
        ebitda_ok && cif_ok
    }

    pub fn into_record(self) -> CompanyRecord {
        CompanyRecord {
            company_name: self.name,
            ebitda_source: Some(self.ebitda_source),
            cif_source: Some(self.cif_source),
            cif: self.cif.unwrap_or_default(),
            ebitda: self.ebitda.into_option(),
        }
    }
}

/// Keep only companies above the EBITDA threshold with a usable CIF.
pub fn retain_qualified(mut companies: Vec<ScrapedCompany>) -> Vec<ScrapedCompany> {
    companies.retain(ScrapedCompany::qualifies);
    companies
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub listed: usize,
    pub with_ebitda: usize,
    pub with_cif: usize,
    pub kept: usize,
}

pub struct RunOutput {
    pub records: Vec<CompanyRecord>,
    pub summary: RunSummary,
}

pub struct Pipeline<N> {
    extractor: PageExtractor<N>,
}

impl<N: Navigator> Pipeline<N> {
    pub fn new(extractor: PageExtractor<N>) -> Self {
        Self { extractor }
    }

    /// One sequential pass: listing, then EBITDA and CIF per company, then
    /// the filter. Consumes the pipeline so the browser is closed afterwards.
    pub async fn run(self, listing_url: &str) -> RunOutput {
        let listing = match self.extractor.extract_listing(listing_url).await {
            Extracted::Value(entries) => entries,
            Extracted::Unavailable => {
                warn!("Ranking table unavailable, continuing with no companies");
                Vec::new()
            }
        };

        let mut summary = RunSummary {
            listed: listing.len(),
            ..Default::default()
        };

        let pb = ProgressBar::new(listing.len() as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=> "));
        }

        let mut scraped = Vec::with_capacity(listing.len());
        for entry in listing {
            pb.set_message(entry.name.clone());
            let slug = normalize(&entry.name);
            let ebitda = self.extractor.extract_ebitda(&entry.detail_url).await;
            let cif = self.extractor.extract_cif(&slug).await;

            summary.with_ebitda += ebitda.is_available() as usize;
            summary.with_cif += cif.is_available() as usize;
            scraped.push(ScrapedCompany {
                cif_source: self.extractor.cif_url(&slug),
                name: entry.name,
                ebitda_source: entry.detail_url,
                cif,
                ebitda,
            });
            pb.inc(1);
        }
        pb.finish_and_clear();

        let records: Vec<CompanyRecord> = retain_qualified(scraped)
            .into_iter()
            .map(ScrapedCompany::into_record)
            .collect();
        summary.kept = records.len();

        info!(
            "Scraped {} companies ({} with EBITDA, {} with CIF), kept {} after {} page loads",
            summary.listed,
            summary.with_ebitda,
            summary.with_cif,
            summary.kept,
            self.extractor.browser().visits()
        );
        RunOutput { records, summary }
    }
}
