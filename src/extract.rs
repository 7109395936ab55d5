use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::browser::{Browser, Navigator, Page};
use crate::error::ExtractError;
use crate::record::Extracted;

const RANKING_TABLE: &str = "#tabla-ranking";
const EBITDA_LABEL: &str = "Ebitda 2023";
const TAX_ID: &str = r#"[itemprop="taxID"]"#;

static RANKING_TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(RANKING_TABLE).unwrap());
static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static TAX_ID_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(TAX_ID).unwrap());

/// One row of the ranking table.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingEntry {
    pub name: String,
    pub detail_url: String,
}

/// The three page-level reads the pipeline needs. Each one degrades to
/// `Extracted::Unavailable` on failure and logs why.
pub struct PageExtractor<N> {
    browser: Browser<N>,
    cif_lookup_base: Url,
}

impl<N: Navigator> PageExtractor<N> {
    pub fn new(browser: Browser<N>, cif_lookup_base: &str) -> Result<Self, ExtractError> {
        let base = Url::parse(cif_lookup_base)
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .ok_or_else(|| ExtractError::InvalidUrl(cif_lookup_base.to_string()))?;
        Ok(Self {
            browser,
            cif_lookup_base: base,
        })
    }

    /// Lookup URL for `slug`, which is appended as one percent-encoded segment.
    pub fn cif_url(&self, slug: &str) -> String {
        let mut url = self.cif_lookup_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(slug);
        }
        url.to_string()
    }

    pub async fn extract_listing(&self, url: &str) -> Extracted<Vec<ListingEntry>> {
        let result: Result<_, ExtractError> = async {
            let page = self
                .browser
                .open_when(url, RANKING_TABLE, |doc| {
                    doc.select(&RANKING_TABLE_SEL).next().is_some()
                })
                .await?;
            parse_listing(&page)
        }
        .await;

        match result {
            Ok(entries) => {
                info!("Found {} companies in ranking table", entries.len());
                Extracted::Value(entries)
            }
            Err(e) => {
                warn!("Error while extracting table on {}: {}", url, e);
                Extracted::Unavailable
            }
        }
    }

    pub async fn extract_ebitda(&self, detail_url: &str) -> Extracted<f64> {
        let result: Result<_, ExtractError> = async {
            let page = self
                .browser
                .open_when(detail_url, EBITDA_LABEL, |doc| find_ebitda_label(doc).is_some())
                .await?;
            parse_ebitda(&page.document())
        }
        .await;

        if let Err(e) = &result {
            warn!("Error extracting EBITDA from {}: {}", detail_url, e);
        }
        result.into()
    }

    pub async fn extract_cif(&self, slug: &str) -> Extracted<String> {
        let url = self.cif_url(slug);
        let result: Result<_, ExtractError> = async {
            let page = self
                .browser
                .open_when(&url, TAX_ID, |doc| doc.select(&TAX_ID_SEL).next().is_some())
                .await?;
            parse_cif(&page.document())
        }
        .await;

        if let Err(e) = &result {
            warn!("Error extracting CIF from {}: {}", url, e);
        }
        result.into()
    }

    pub fn browser(&self) -> &Browser<N> {
        &self.browser
    }
}

fn parse_listing(page: &Page) -> Result<Vec<ListingEntry>, ExtractError> {
    let base = Url::parse(&page.url).map_err(|_| ExtractError::InvalidUrl(page.url.clone()))?;
    let doc = page.document();
    let table = doc
        .select(&RANKING_TABLE_SEL)
        .next()
        .ok_or_else(|| ExtractError::ElementMissing(RANKING_TABLE.to_string()))?;

    let mut entries = Vec::new();
    for row in table.select(&ROW_SEL) {
        let cells: Vec<ElementRef> = row.select(&CELL_SEL).collect();
        if cells.len() < 3 {
            continue;
        }
        let Some(link) = cells[2].select(&LINK_SEL).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            warn!("Skipping ranking row without href");
            continue;
        };
        let detail_url = match base.join(href) {
            Ok(u) => u.to_string(),
            Err(_) => {
                warn!("Skipping ranking row with bad href {:?}", href);
                continue;
            }
        };
        entries.push(ListingEntry {
            name: text_of(&link),
            detail_url,
        });
    }
    Ok(entries)
}

/// The `td` whose own text nodes mention the EBITDA label.
fn find_ebitda_label(doc: &Html) -> Option<ElementRef<'_>> {
    doc.select(&CELL_SEL).find(|td| {
        td.children()
            .filter_map(|n| n.value().as_text())
            .any(|t| t.contains(EBITDA_LABEL))
    })
}

fn parse_ebitda(doc: &Html) -> Result<f64, ExtractError> {
    let label = find_ebitda_label(doc)
        .ok_or_else(|| ExtractError::ElementMissing(format!("cell {:?}", EBITDA_LABEL)))?;
    let value = label
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "td")
        .ok_or_else(|| ExtractError::ElementMissing(format!("value next to {:?}", EBITDA_LABEL)))?;
    parse_amount(&text_of(&value))
}

fn parse_cif(doc: &Html) -> Result<String, ExtractError> {
    let el = doc
        .select(&TAX_ID_SEL)
        .next()
        .ok_or_else(|| ExtractError::ElementMissing(TAX_ID.to_string()))?;
    let cif = text_of(&el);
    if cif.is_empty() {
        return Err(ExtractError::EmptyText(TAX_ID.to_string()));
    }
    Ok(cif)
}

/// Parse a Spanish-formatted amount such as `"3.500.000 €"` or `"-12.345,67 €"`.
pub fn parse_amount(raw: &str) -> Result<f64, ExtractError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(*c, '€' | '.') && !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ExtractError::InvalidNumber {
            raw: raw.to_string(),
        })
}

fn text_of(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::browser::testing::*;

    const LISTING: &str = "https://ranking.example.es/ranking_empresas_nacional.html";
    const LOOKUP: &str = "https://cif.example.es/empresa";

    fn extractor(nav: FixtureNavigator) -> PageExtractor<FixtureNavigator> {
        PageExtractor::new(browser(nav), LOOKUP).unwrap()
    }

    #[test]
    fn amounts() {
        assert_eq!(parse_amount("3.500.000 €").unwrap(), 3_500_000.0);
        assert_eq!(parse_amount("  1.234,5 €").unwrap(), 1234.5);
        assert_eq!(parse_amount("-12.000\u{a0}€").unwrap(), -12_000.0);
        assert!(parse_amount("n.d.").is_err());
        assert!(parse_amount("").is_err());
        assert!(parse_amount("inf").is_err());
    }

    #[tokio::test]
    async fn listing_rows() {
        let nav = FixtureNavigator::default().with_fixture(LISTING, "ranking");
        let entries = extractor(nav).extract_listing(LISTING).await.unwrap_or_default();
        assert_eq!(
            entries,
            vec![
                ListingEntry {
                    name: "Mercadona SA".into(),
                    detail_url: "https://ranking.example.es/empresa/mercadona.html".into(),
                },
                ListingEntry {
                    name: "Compañía Española de Petróleos S.A.U.".into(),
                    detail_url: "https://ranking.example.es/empresa/cepsa.html".into(),
                },
                ListingEntry {
                    name: "Talleres Pérez & Hijos, S.L.".into(),
                    detail_url: "https://otra.example.es/talleres".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn listing_skips_short_rows() {
        let html = r#"<table id="tabla-ranking">
            <tr><th>#</th><th>Empresa</th></tr>
            <tr><td>1</td><td><a href="/a">Short</a></td></tr>
            <tr><td>2</td><td>x</td><td>no link</td></tr>
            <tr><td>3</td><td>x</td><td><a href="/b"> Kept </a></td></tr>
        </table>"#;
        let nav = FixtureNavigator::default().with_page(LISTING, html);
        let entries = extractor(nav).extract_listing(LISTING).await.unwrap_or_default();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Kept");
        assert_eq!(entries[0].detail_url, "https://ranking.example.es/b");
    }

    #[tokio::test]
    async fn listing_without_table_is_unavailable() {
        let nav = FixtureNavigator::default().with_page(LISTING, "<p>Mantenimiento</p>");
        let listing = extractor(nav).extract_listing(LISTING).await;
        assert_eq!(listing, Extracted::Unavailable);
    }

    #[tokio::test]
    async fn ebitda_from_detail_page() {
        let url = "https://ranking.example.es/empresa/mercadona.html";
        let nav = FixtureNavigator::default().with_fixture(url, "detail");
        assert_eq!(
            extractor(nav).extract_ebitda(url).await,
            Extracted::Value(3_512_345.0)
        );
    }

    #[tokio::test]
    async fn ebitda_unparseable_value() {
        let url = "http://x/acme";
        let html = "<table><tr><td>Ebitda 2023</td><td>No disponible</td></tr></table>";
        let nav = FixtureNavigator::default().with_page(url, html);
        assert_eq!(extractor(nav).extract_ebitda(url).await, Extracted::Unavailable);
    }

    #[tokio::test]
    async fn ebitda_label_only_in_nested_element_does_not_count() {
        let url = "http://x/acme";
        let html = "<table><tr><td><b>Ebitda 2023</b></td><td>5.000.000 €</td></tr></table>";
        let nav = FixtureNavigator::default().with_page(url, html);
        assert_eq!(extractor(nav).extract_ebitda(url).await, Extracted::Unavailable);
    }

    #[tokio::test]
    async fn cif_from_lookup_page() {
        let nav = FixtureNavigator::default()
            .with_fixture("https://cif.example.es/empresa/mercadona-sa", "cif");
        assert_eq!(
            extractor(nav).extract_cif("mercadona-sa").await,
            Extracted::Value("A46103834".to_string())
        );
    }

    #[tokio::test]
    async fn cif_missing_page_or_element() {
        let nav = FixtureNavigator::default().with_page(
            "https://cif.example.es/empresa/vacia",
            r#"<span itemprop="taxID"> </span>"#,
        );
        let ex = extractor(nav);
        assert_eq!(ex.extract_cif("vacia").await, Extracted::Unavailable);
        assert_eq!(ex.extract_cif("no-existe").await, Extracted::Unavailable);
    }

    #[tokio::test]
    async fn missing_ebitda_cell_costs_one_page_load() {
        let url = "http://x/acme";
        let html = "<table><tr><td>Ventas 2023</td><td>9.000.000 €</td></tr></table>";
        let nav = FixtureNavigator::default().with_page(url, html);
        let ex = PageExtractor::new(Browser::new(nav, Duration::from_millis(200)), LOOKUP).unwrap();
        assert_eq!(ex.extract_ebitda(url).await, Extracted::Unavailable);
        assert_eq!(ex.browser().visits(), 1);
    }

    #[test]
    fn cif_url_joins_base_and_slug() {
        let ex = extractor(FixtureNavigator::default());
        assert_eq!(ex.cif_url("acme-sa"), "https://cif.example.es/empresa/acme-sa");

        let slash = PageExtractor::new(
            browser(FixtureNavigator::default()),
            "https://cif.example.es/empresa/",
        )
        .unwrap();
        assert_eq!(slash.cif_url("acme-sa"), "https://cif.example.es/empresa/acme-sa");
    }

    #[test]
    fn cif_url_escapes_reserved_characters() {
        let ex = extractor(FixtureNavigator::default());
        assert_eq!(
            ex.cif_url("a/b#c?d"),
            "https://cif.example.es/empresa/a%2Fb%23c%3Fd"
        );
    }

    #[test]
    fn lookup_base_must_be_a_url() {
        assert!(PageExtractor::new(browser(FixtureNavigator::default()), "datoscif").is_err());
    }
}
