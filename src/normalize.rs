use std::sync::LazyLock;

use regex::Regex;

static SAU_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-sau$").unwrap());
static SLU_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-slu$").unwrap());
static SOCIEDAD_ANONIMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)-sociedad-an[oó]nima.*$").unwrap());
static SOCIEDAD_LIMITADA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)-sociedad-limitada.*$").unwrap());

/// Turn a company name as listed into the slug the CIF lookup site uses.
///
/// Order matters: the suffix rules only see hyphenated, lower-cased text.
pub fn normalize(raw_name: &str) -> String {
    let slug = raw_name
        .replace(['.', ','], "")
        .replace(" & ", "-")
        .to_lowercase()
        .replace(' ', "-");

    let slug: String = slug
        .chars()
        .map(|c| if c == 'ñ' { 'n' } else { c })
        .filter(|c| !matches!(*c, '(' | ')'))
        .collect();

    let slug = SAU_RE.replace(&slug, "-sa");
    let slug = SLU_RE.replace(&slug, "-sl");
    let slug = SOCIEDAD_ANONIMA_RE.replace(&slug, "-sa");
    SOCIEDAD_LIMITADA_RE.replace(&slug, "-sl").into_owned()
}
