use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::model::{Product, RawProduct};

/// PKR → USD rate applied to every price field.
pub const PKR_TO_USD_RATE: f64 = 278.81;

/// Leading currency token on price literals ("Rs. 12,345", "Rs 500", "₨500").
static CURRENCY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:Rs\.?|₨)\s*").unwrap());

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("product has no url")]
    MissingUrl,
    #[error("invalid price format: {0:?}")]
    InvalidPriceFormat(String),
}

/// What to do with a record whose URL is valid but whose price text
/// does not parse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceErrorPolicy {
    /// Emit the record with the failing price field unset.
    EmitWithoutPrice,
    /// Drop the whole record.
    DropRecord,
}

pub const PRICE_ERROR_POLICY: PriceErrorPolicy = PriceErrorPolicy::EmitWithoutPrice;

/// A normalized record plus any price fields cleared under
/// [`PriceErrorPolicy::EmitWithoutPrice`], so the caller can log them.
pub struct Normalized {
    pub product: Product,
    pub price_errors: Vec<NormalizeError>,
}

/// Normalize one raw record. Pure: no I/O, no shared state.
pub fn normalize(raw: RawProduct) -> Result<Normalized, NormalizeError> {
    let url = raw.url.as_deref().ok_or(NormalizeError::MissingUrl)?;
    let url = complete_url(url);

    let brand = raw
        .title
        .as_deref()
        .and_then(|t| t.split_whitespace().next())
        .map(str::to_string);

    let mut price_errors = Vec::new();
    let current_price = convert_price(raw.current_price.as_deref(), &mut price_errors)?;
    let original_price = convert_price(raw.original_price.as_deref(), &mut price_errors)?;

    Ok(Normalized {
        product: Product {
            title: raw.title,
            url,
            img: raw.img,
            brand,
            current_price,
            original_price,
            free_delivery: raw.free_delivery,
            page_url: raw.page_url,
        },
        price_errors,
    })
}

/// Prefix `https:` when the raw URL carries no explicit scheme.
/// Covers the protocol-relative `//host/path` form the site emits.
pub fn complete_url(url: &str) -> String {
    if url.starts_with("https:") || url.starts_with("http:") {
        url.to_string()
    } else {
        format!("https:{url}")
    }
}

fn convert_price(
    text: Option<&str>,
    price_errors: &mut Vec<NormalizeError>,
) -> Result<Option<f64>, NormalizeError> {
    let Some(text) = text else { return Ok(None) };
    match parse_price(text) {
        Ok(pkr) => Ok(Some(round2(pkr / PKR_TO_USD_RATE))),
        Err(e) => match PRICE_ERROR_POLICY {
            PriceErrorPolicy::EmitWithoutPrice => {
                price_errors.push(e);
                Ok(None)
            }
            PriceErrorPolicy::DropRecord => Err(e),
        },
    }
}

/// Strict decimal parse of a currency literal.
///
/// Strips the leading currency token and thousands separators, then
/// parses the remainder with `str::parse::<f64>`. The text is never
/// evaluated as anything but a number literal.
fn parse_price(text: &str) -> Result<f64, NormalizeError> {
    let cleaned = CURRENCY_PREFIX.replace(text.trim(), "");
    let cleaned = cleaned.trim().replace(',', "");
    cleaned
        .parse::<f64>()
        .map_err(|_| NormalizeError::InvalidPriceFormat(text.to_string()))
}

/// Round half away from zero to 2 fractional digits.
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(url: &str) -> RawProduct {
        RawProduct {
            url: Some(url.to_string()),
            page_url: "https://www.daraz.pk/washers-dryers?page=1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn price_conversion_reference() {
        // Rs. 27,881 / 278.81 = 100 USD
        assert_eq!(parse_price("Rs. 27,881").unwrap(), 27881.0);
        let mut errs = Vec::new();
        let price = convert_price(Some("Rs. 27,881"), &mut errs).unwrap();
        assert_eq!(price, Some(100.0));
        assert!(errs.is_empty());
    }

    #[test]
    fn price_prefix_variants() {
        assert_eq!(parse_price("Rs 500").unwrap(), 500.0);
        assert_eq!(parse_price("₨500").unwrap(), 500.0);
        assert_eq!(parse_price("  Rs. 1,234.56 ").unwrap(), 1234.56);
        assert_eq!(parse_price("999").unwrap(), 999.0);
    }

    #[test]
    fn price_rejects_non_numeric() {
        assert_eq!(
            parse_price("Rs. about 500"),
            Err(NormalizeError::InvalidPriceFormat("Rs. about 500".into()))
        );
        assert!(parse_price("").is_err());
        assert!(parse_price("Rs.").is_err());
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(99.994), 99.99);
        assert_eq!(round2(99.996), 100.0);
    }

    #[test]
    fn completes_protocol_relative_url() {
        assert_eq!(complete_url("//example.com/p/1"), "https://example.com/p/1");
    }

    #[test]
    fn preserves_existing_scheme() {
        assert_eq!(complete_url("https://example.com/p/2"), "https://example.com/p/2");
        assert_eq!(complete_url("http://example.com/p/3"), "http://example.com/p/3");
    }

    #[test]
    fn derives_brand_from_title() {
        let mut r = raw("//example.com/p/1");
        r.title = Some("Acme Dryer 7kg".to_string());
        let n = normalize(r).unwrap();
        assert_eq!(n.product.brand.as_deref(), Some("Acme"));
        assert_eq!(n.product.title.as_deref(), Some("Acme Dryer 7kg"));
    }

    #[test]
    fn brand_unset_without_title() {
        let n = normalize(raw("//example.com/p/1")).unwrap();
        assert_eq!(n.product.brand, None);
    }

    #[test]
    fn missing_url_is_rejected() {
        let r = RawProduct::default();
        assert!(matches!(normalize(r), Err(NormalizeError::MissingUrl)));
    }

    #[test]
    fn absent_prices_stay_absent() {
        let n = normalize(raw("//example.com/p/1")).unwrap();
        assert_eq!(n.product.current_price, None);
        assert_eq!(n.product.original_price, None);
        assert!(n.price_errors.is_empty());
    }

    #[test]
    fn bad_price_emits_record_without_price() {
        let mut r = raw("//example.com/p/1");
        r.current_price = Some("Rs. N/A".to_string());
        r.original_price = Some("Rs. 27,881".to_string());
        let n = normalize(r).unwrap();
        assert_eq!(n.product.current_price, None);
        assert_eq!(n.product.original_price, Some(100.0));
        assert_eq!(n.price_errors.len(), 1);
    }

    #[test]
    fn normalization_is_idempotent_over_equal_input() {
        let mut r = raw("//example.com/p/9");
        r.title = Some("Haier Washer".to_string());
        r.current_price = Some("Rs. 55,762".to_string());
        let a = normalize(r.clone()).unwrap().product;
        let b = normalize(r).unwrap().product;
        assert_eq!(a, b);
    }
}
