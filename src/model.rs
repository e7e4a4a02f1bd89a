use serde::Serialize;

/// One product tile as scraped, before any cleaning.
///
/// Every field is whatever text the page happened to carry, so all of
/// them are optional except `page_url`, which we always know.
#[derive(Debug, Clone, Default)]
pub struct RawProduct {
    pub title: Option<String>,
    pub url: Option<String>,
    pub img: Option<String>,
    pub current_price: Option<String>,
    pub original_price: Option<String>,
    pub free_delivery: bool,
    /// Pagination URL this tile was scraped from.
    pub page_url: String,
}

/// Normalized product record. Field order fixes the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub title: Option<String>,
    /// Always scheme-qualified; unique across a run.
    pub url: String,
    pub img: Option<String>,
    /// First whitespace token of the title.
    pub brand: Option<String>,
    /// USD, rounded to 2 fractional digits.
    pub current_price: Option<f64>,
    pub original_price: Option<f64>,
    pub free_delivery: bool,
    pub page_url: String,
}
