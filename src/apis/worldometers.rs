//! Scraper for the per-country demographics pages on worldometers.info.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::app::ports::{EventSink, HttpClientPort, PipelineEvent};
use crate::constants::{
    COUNTRY, COUNTRY_PAGE_DELAY_MS, DEMOGRAPHICS_FIELDS, DEMOGRAPHICS_HEADING, DEMOGRAPHICS_RAW_CSV,
    INDEX_DELAY_MS, LIFE_EXPECTANCY_BOTH, LIFE_EXPECTANCY_FEMALE, LIFE_EXPECTANCY_MALE, POPULATION_DENSITY,
    URBAN_POPULATION_ABSOLUTE, URBAN_POPULATION_PERCENTAGE,
};
use crate::error::{PipelineError, Result};
use crate::types::RawTable;

static HEADING_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h2, h3").expect("valid selector"));
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));

/// One regex per numeric field, applied to the page text. Case-insensitive,
/// and `.` crosses line breaks. "Males" is word-bounded so it cannot match
/// inside "Females".
static FIELD_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let patterns = [
        (LIFE_EXPECTANCY_BOTH, r"(?is)Life\s*Expectancy.*?Both\s*Sexes.*?(\d+(?:\.\d+)?)"),
        (LIFE_EXPECTANCY_FEMALE, r"(?is)Life\s*Expectancy.*?\bFemales?\b.*?(\d+(?:\.\d+)?)"),
        (LIFE_EXPECTANCY_MALE, r"(?is)Life\s*Expectancy.*?\bMales?\b.*?(\d+(?:\.\d+)?)"),
        (URBAN_POPULATION_PERCENTAGE, r"(?is)Urban\s+Population.*?(\d+(?:\.\d+)?)\s*%"),
        (URBAN_POPULATION_ABSOLUTE, r"(?is)Urban\s+Population.*?\(([\d,]+)\s*people"),
        (POPULATION_DENSITY, r"(?is)Population\s+Density.*?is\s*([\d.]+)\s*people"),
    ];
    patterns
        .into_iter()
        .map(|(field, pattern)| (field, Regex::new(pattern).expect("valid regex")))
        .collect()
});

pub struct WorldometersCrawler<H> {
    http: H,
    base_url: String,
}

impl<H: HttpClientPort> WorldometersCrawler<H> {
    pub fn new(http: H, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// GET with a polite fixed delay before the request.
    fn get(&self, url: &str, delay_ms: u64) -> Result<String> {
        debug!("GET {}", url);
        thread::sleep(Duration::from_millis(delay_ms));
        self.http.get_text(url)
    }

    /// Scrapes every linked country page into a raw demographics table.
    /// Failing pages are reported through `sink` and skipped.
    #[instrument(skip_all, fields(base_url = %self.base_url))]
    pub fn crawl(&self, sink: &dyn EventSink) -> Result<RawTable> {
        let home = self.get(&format!("{}/demographics/", self.base_url), INDEX_DELAY_MS)?;
        let links = extract_country_links(&home, &self.base_url)?;
        sink.emit(PipelineEvent::CountryLinksFound { count: links.len() });

        let mut headers = vec![COUNTRY.to_string()];
        headers.extend(DEMOGRAPHICS_FIELDS.iter().map(|f| f.to_string()));
        let mut table = RawTable::new(DEMOGRAPHICS_RAW_CSV, headers);

        for (country, href) in links {
            match self.get(&href, COUNTRY_PAGE_DELAY_MS) {
                Ok(html) => {
                    let mut row = vec![country];
                    row.extend(parse_country_page(&html).into_iter().map(Option::unwrap_or_default));
                    table.rows.push(row);
                }
                Err(e) => sink.emit(PipelineEvent::CountryFetchFailed {
                    country,
                    error: e.to_string(),
                }),
            }
        }

        info!("Scraped {} country pages", table.len());
        Ok(table)
    }
}

/// Returns `(country, absolute url)` for each country link in the section
/// headed "Demographics of Countries", in page order.
pub fn extract_country_links(html: &str, base_url: &str) -> Result<Vec<(String, String)>> {
    let doc = Html::parse_document(html);
    let heading = doc
        .select(&HEADING_SELECTOR)
        .find(|h| normalized_text(h).contains(DEMOGRAPHICS_HEADING))
        .ok_or_else(|| PipelineError::Scrape {
            message: format!("Could not find the '{DEMOGRAPHICS_HEADING}' heading"),
        })?;

    let mut links: Vec<(String, String)> = Vec::new();
    for sibling in heading.next_siblings() {
        let Some(element) = ElementRef::wrap(sibling) else {
            continue;
        };
        // the section ends at the next heading
        if matches!(element.value().name(), "h1" | "h2" | "h3") {
            break;
        }
        for a in element.select(&LINK_SELECTOR) {
            let Some(href) = a.value().attr("href").map(str::trim) else {
                continue;
            };
            if !(href.contains("/demographics/") && href.ends_with("-demographics/")) {
                continue;
            }
            let name = normalized_text(&a);
            let url = if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{base_url}{href}")
            };
            // a repeated name keeps its first position but the latest link
            match links.iter_mut().find(|(n, _)| *n == name) {
                Some(existing) => existing.1 = url,
                None => links.push((name, url)),
            }
        }
    }

    if links.is_empty() {
        return Err(PipelineError::Scrape {
            message: "No country links detected - page structure may have changed".into(),
        });
    }
    Ok(links)
}

/// Extracts the six demographics fields (in `DEMOGRAPHICS_FIELDS` order) from
/// a country page. Thousands separators are removed from matches.
pub fn parse_country_page(html: &str) -> Vec<Option<String>> {
    let doc = Html::parse_document(html);
    let text = doc
        .root_element()
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    FIELD_PATTERNS
        .iter()
        .map(|(_, re)| {
            re.captures(&text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().replace(',', ""))
        })
        .collect()
}

fn normalized_text(element: &ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory_sink::MemorySink;
    use std::collections::HashMap;

    struct CannedHttp {
        pages: HashMap<String, String>,
    }

    impl HttpClientPort for CannedHttp {
        fn get_text(&self, url: &str) -> Result<String> {
            self.pages.get(url).cloned().ok_or_else(|| PipelineError::Scrape {
                message: format!("404 for {url}"),
            })
        }
    }

    const INDEX: &str = r#"
        <html><body>
          <h2>World Demographics</h2>
          <ul><li><a href="/demographics/world-demographics/">World</a></li></ul>
          <h2>Demographics of Countries</h2>
          <ul>
            <li><a href="/demographics/chile-demographics/">Chile</a></li>
            <li><a href="https://www.worldometers.info/demographics/peru-demographics/">Peru</a></li>
            <li><a href="/population/chile-population/">Chile population</a></li>
            <li><a href="/demographics/atlantis-demographics/">Atlantis</a></li>
          </ul>
          <h3>Other</h3>
          <ul><li><a href="/demographics/mars-demographics/">Mars</a></li></ul>
        </body></html>"#;

    const CHILE: &str = r#"
        <html><body>
          <h2>Life Expectancy</h2>
          <p>Both Sexes</p><div>80.74 years</div>
          <p>Females</p><div>83.2</div>
          <p>Males</p><div>78.1</div>
          <h2>Urban Population</h2>
          <p>87.8 % of the population is urban (16,610,135 people in 2020)</p>
          <h2>Population Density</h2>
          <p>The population density in Chile is 26 people per Km2</p>
        </body></html>"#;

    #[test]
    fn test_extract_country_links_stays_in_section() {
        let links = extract_country_links(INDEX, "https://example.org").unwrap();
        assert_eq!(
            links,
            vec![
                ("Chile".to_string(), "https://example.org/demographics/chile-demographics/".to_string()),
                (
                    "Peru".to_string(),
                    "https://www.worldometers.info/demographics/peru-demographics/".to_string()
                ),
                ("Atlantis".to_string(), "https://example.org/demographics/atlantis-demographics/".to_string()),
            ]
        );
    }

    #[test]
    fn test_missing_heading_is_an_error() {
        let err = extract_country_links("<h2>Nothing here</h2>", "https://example.org").unwrap_err();
        assert!(matches!(err, PipelineError::Scrape { .. }));
    }

    #[test]
    fn test_parse_country_page() {
        let fields = parse_country_page(CHILE);
        assert_eq!(
            fields,
            vec![
                Some("80.74".to_string()),
                Some("83.2".to_string()),
                Some("78.1".to_string()),
                Some("87.8".to_string()),
                Some("16610135".to_string()),
                Some("26".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_country_page_without_data() {
        assert_eq!(parse_country_page("<p>Under construction</p>"), vec![None; 6]);
    }

    #[test]
    fn test_crawl_skips_failing_pages() {
        let base = "https://example.org";
        let mut pages = HashMap::new();
        pages.insert(format!("{base}/demographics/"), INDEX.to_string());
        pages.insert(format!("{base}/demographics/chile-demographics/"), CHILE.to_string());
        let crawler = WorldometersCrawler::new(CannedHttp { pages }, format!("{base}/"));
        let sink = MemorySink::new();

        let table = crawler.crawl(&sink).unwrap();
        assert_eq!(table.headers[0], COUNTRY);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0][0], "Chile");
        assert_eq!(table.rows[0][1], "80.74");

        let failures: Vec<String> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                PipelineEvent::CountryFetchFailed { country, .. } => Some(country),
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec!["Peru".to_string(), "Atlantis".to_string()]);
    }
}
