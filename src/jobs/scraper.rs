// src/jobs/scraper.rs
use super::{EmploymentType, NewJob};
use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Fetches a posting page and turns it into a `NewJob`
pub struct JobScraper {
    client: Client,
}

impl JobScraper {
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    pub async fn fetch_posting(&self, url: &str) -> Result<NewJob> {
        info!("Fetching job post: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to fetch job post")?;

        if !response.status().is_success() {
            anyhow::bail!("HTTP error: {}", response.status());
        }

        let html = response
            .text()
            .await
            .context("Failed to read response body")?;

        let mut posting =
            parse_posting(&html).context("Failed to extract job content from page")?;
        posting.source = Some("scraped".to_string());
        posting.source_url = Some(url.to_string());

        info!(
            "Successfully extracted job: {} at {}",
            posting.title, posting.company
        );
        Ok(posting)
    }
}

/// Structured data first, then known job boards, then generic markup
pub fn parse_posting(html: &str) -> Option<NewJob> {
    let document = Html::parse_document(html);
    parse_json_ld(&document)
        .or_else(|| parse_known_board(&document))
        .or_else(|| parse_generic(&document))
}

fn parse_json_ld(document: &Html) -> Option<NewJob> {
    let selector = Selector::parse("script[type='application/ld+json']").ok()?;

    document.select(&selector).find_map(|script| {
        let raw = script.text().collect::<String>();
        let value: Value = serde_json::from_str(raw.trim()).ok()?;
        let posting = find_job_posting(&value)?;
        debug!("Found JobPosting structured data");
        posting_from_json_ld(posting)
    })
}

fn find_job_posting(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_job_posting),
        Value::Object(map) => {
            if map.get("@type").and_then(Value::as_str) == Some("JobPosting") {
                Some(value)
            } else {
                map.get("@graph").and_then(find_job_posting)
            }
        }
        _ => None,
    }
}

fn posting_from_json_ld(posting: &Value) -> Option<NewJob> {
    let title = posting.get("title").and_then(Value::as_str).map(clean_text)?;
    let company = posting
        .pointer("/hiringOrganization/name")
        .and_then(Value::as_str)
        .map(clean_text)
        .unwrap_or_default();
    let description = posting
        .get("description")
        .and_then(Value::as_str)
        .map(html_to_text)
        .unwrap_or_default();

    let location_node = match posting.get("jobLocation") {
        Some(Value::Array(items)) => items.first(),
        other => other,
    };
    let location = location_node
        .and_then(|loc| loc.pointer("/address/addressLocality"))
        .and_then(Value::as_str)
        .map(clean_text)
        .unwrap_or_default();

    let employment_type: EmploymentType = posting
        .get("employmentType")
        .and_then(|t| match t {
            Value::Array(items) => items.first().and_then(Value::as_str),
            other => other.as_str(),
        })
        .and_then(|t| t.parse().ok())
        .unwrap_or_default();

    let remote = posting.get("jobLocationType").and_then(Value::as_str) == Some("TELECOMMUTE");

    let salary_number = |path: &str| {
        posting
            .pointer(path)
            .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .map(|v| v.round() as i64)
    };
    let salary_min = salary_number("/baseSalary/value/minValue");
    let salary_max = salary_number("/baseSalary/value/maxValue");
    let currency = posting
        .pointer("/baseSalary/currency")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(NewJob {
        title,
        company,
        location,
        description,
        employment_type,
        remote,
        salary_min,
        salary_max,
        currency,
        ..Default::default()
    })
}

fn parse_known_board(document: &Html) -> Option<NewJob> {
    let title_selectors = [
        "h1.top-card-layout__title",
        ".job-details-jobs-unified-top-card__job-title",
        ".posting-headline h2",
        "#header h1.app-title",
    ];

    let company_selectors = [
        ".job-details-jobs-unified-top-card__company-name",
        ".top-card-layout__card .top-card-layout__second-subline",
        ".main-header-logo img[alt]",
        "#header .company-name",
    ];

    let description_selectors = [
        ".jobs-description__container",
        ".jobs-description-content__text",
        ".posting-page .section-wrapper",
        "#content",
    ];

    let location_selectors = [
        ".job-details-jobs-unified-top-card__bullet",
        ".top-card-layout__card .top-card-layout__first-subline",
        ".posting-categories .location",
        "#header .location",
    ];

    let title = find_text_by_selectors(document, &title_selectors)?;
    let company = find_text_by_selectors(document, &company_selectors)?;
    let description = find_text_by_selectors(document, &description_selectors)?;
    let location = find_text_by_selectors(document, &location_selectors).unwrap_or_default();

    Some(NewJob {
        remote: location.to_lowercase().contains("remote"),
        title,
        company,
        location,
        description,
        ..Default::default()
    })
}

fn parse_generic(document: &Html) -> Option<NewJob> {
    warn!("Falling back to generic job parsing");

    let title_selectors = ["h1", "[class*='job-title']", "[class*='title']"];
    let company_selectors = [
        "[class*='company']",
        "[class*='employer']",
        "[class*='organization']",
    ];
    let description_selectors = [
        "[class*='description']",
        "[class*='content']",
        "main",
        "article",
    ];
    let location_selectors = ["[class*='location']"];

    let title = find_text_by_selectors(document, &title_selectors)?;
    let company = find_text_by_selectors(document, &company_selectors).unwrap_or_default();
    let description = find_text_by_selectors(document, &description_selectors)?;
    let location = find_text_by_selectors(document, &location_selectors).unwrap_or_default();

    Some(NewJob {
        remote: location.to_lowercase().contains("remote"),
        title,
        company,
        location,
        description,
        ..Default::default()
    })
}

fn find_text_by_selectors(document: &Html, selectors: &[&str]) -> Option<String> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = element
                .value()
                .attr("alt")
                .map(clean_text)
                .unwrap_or_else(|| clean_text(&element.text().collect::<Vec<_>>().join(" ")));
            if text.len() > 1 {
                return Some(text);
            }
        }
    }
    None
}

fn html_to_text(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    clean_text(&parsed.root_element().text().collect::<Vec<_>>().join(" "))
}

fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
