use crate::config::EpicOptions;
use crate::http::{endpoint, FetchError, HttpFetcher};
use crate::model::ImageCandidate;
use log::debug;
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// One entry of a bulk catalog lookup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(rename = "keyImages", default)]
    pub key_images: Option<Vec<ImageCandidate>>,
}

impl CatalogItem {
    pub fn images(&self) -> &[ImageCandidate] {
        self.key_images.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchPage {
    #[serde(default)]
    elements: Option<Vec<CatalogItem>>,
}

/// Client for the public catalog and store-content services.
#[derive(Debug, Clone)]
pub struct EpicCatalog {
    http: HttpFetcher,
    catalog_base_url: String,
    store_content_base_url: String,
    search_locales: Vec<String>,
    product_locale: String,
    country: String,
    timeout: Duration,
}

impl EpicCatalog {
    pub fn new(options: &EpicOptions, http: HttpFetcher, timeout: Duration) -> Self {
        Self {
            http,
            catalog_base_url: options.catalog_base_url.clone(),
            store_content_base_url: options.store_content_base_url.clone(),
            search_locales: options.search_locales.clone(),
            product_locale: options.product_locale.clone(),
            country: options.country.clone(),
            timeout,
        }
    }

    /// Images of one exact catalog item.
    pub async fn item_images(&self, namespace: &str, item_id: &str) -> Vec<ImageCandidate> {
        match self.bulk_items(namespace, item_id).await {
            Ok(mut items) => items
                .remove(item_id)
                .and_then(|item| item.key_images)
                .unwrap_or_default(),
            Err(err) => {
                debug!("catalog lookup for {}/{} failed: {}", namespace, item_id, err);
                Vec::new()
            }
        }
    }

    /// Offer search over every title variant and locale; stops at the first
    /// combination whose chosen result carries images.
    pub async fn search_offers(&self, title: &str, app_name: &str) -> Vec<ImageCandidate> {
        for query in title_variants(title, app_name) {
            for locale in &self.search_locales {
                match self.offers_page(locale, &query).await {
                    Ok(elements) => {
                        let images = pick_element(&elements, title)
                            .map(|item| item.images().to_vec())
                            .unwrap_or_default();
                        if !images.is_empty() {
                            return images;
                        }
                    }
                    Err(err) => debug!("offer search for {:?} ({}) failed: {}", query, locale, err),
                }
            }
        }
        Vec::new()
    }

    /// Broader store-content product search by title alone.
    pub async fn search_products(&self, title: &str) -> Vec<ImageCandidate> {
        let title = title.trim();
        if title.is_empty() {
            return Vec::new();
        }
        match self.products_page(title).await {
            Ok(elements) => pick_element(&elements, title)
                .map(|item| item.images().to_vec())
                .unwrap_or_default(),
            Err(err) => {
                debug!("product search for {:?} failed: {}", title, err);
                Vec::new()
            }
        }
    }

    async fn bulk_items(
        &self,
        namespace: &str,
        item_id: &str,
    ) -> Result<HashMap<String, CatalogItem>, FetchError> {
        let url = endpoint(
            &self.catalog_base_url,
            &["catalog", "api", "shared", "namespace", namespace, "bulk", "items"],
            &[("ids", item_id)],
        )?;
        self.http.json(url, self.timeout).await
    }

    async fn offers_page(&self, locale: &str, query: &str) -> Result<Vec<CatalogItem>, FetchError> {
        let url = endpoint(
            &self.catalog_base_url,
            &["catalog", "api", "shared", "offers"],
            &[
                ("locale", locale),
                ("searchKeywords", query),
                ("country", self.country.as_str()),
            ],
        )?;
        self.fetch_page(url).await
    }

    async fn products_page(&self, title: &str) -> Result<Vec<CatalogItem>, FetchError> {
        let url = endpoint(
            &self.store_content_base_url,
            &["store", "api", "products"],
            &[
                ("locale", self.product_locale.as_str()),
                ("country", self.country.as_str()),
                ("keywords", title),
            ],
        )?;
        self.fetch_page(url).await
    }

    async fn fetch_page(&self, url: Url) -> Result<Vec<CatalogItem>, FetchError> {
        let page: SearchPage = self.http.json(url, self.timeout).await?;
        Ok(page.elements.unwrap_or_default())
    }
}

/// Search queries for a title, most specific first, without repeats.
pub fn title_variants(title: &str, app_name: &str) -> Vec<String> {
    let title = title.trim();
    let stripped = title.replace(['\'', ':'], "").replace('-', " ");
    let truncated = title.split(':').next().unwrap_or(title);
    let long_words = title
        .split_whitespace()
        .filter(|word| word.chars().count() > 2)
        .collect::<Vec<_>>()
        .join(" ");

    let mut variants: Vec<String> = Vec::new();
    for candidate in [
        title.to_string(),
        collapse_whitespace(&stripped),
        truncated.trim().to_string(),
        long_words,
        app_name.trim().to_string(),
    ] {
        if !candidate.is_empty() && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The result whose title equals `title` ignoring case, else the first one.
pub fn pick_element<'a>(elements: &'a [CatalogItem], title: &str) -> Option<&'a CatalogItem> {
    let wanted = title.trim().to_lowercase();
    elements
        .iter()
        .find(|item| {
            item.title
                .as_deref()
                .map(|candidate| candidate.trim().to_lowercase() == wanted)
                .unwrap_or(false)
        })
        .or_else(|| elements.first())
}
