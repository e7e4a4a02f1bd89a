use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::model::RawProduct;

// Tile markup of the category listing grid. Prices sit in styled divs
// with no stable class, so the style attribute is the selector.
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div#id-title").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img#id-img").unwrap());
static CURRENT_PRICE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[style='font-size: 18px;'] span:nth-of-type(2)").unwrap());
static ORIGINAL_PRICE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div[style='font-size: 10px;'] > del").unwrap());
static FREE_DELIVERY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.free-delivery--OD68c").unwrap());

/// Parse one product tile's inner HTML into a raw record.
///
/// Absent markup maps to absent fields; nothing is invented here.
/// Cleaning and conversion belong to [`crate::normalize`].
pub fn parse_tile(html: &str, page_url: &str) -> RawProduct {
    let doc = Html::parse_fragment(html);

    RawProduct {
        title: select_text(&doc, &TITLE),
        url: doc
            .select(&LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string),
        img: doc
            .select(&IMG)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string),
        current_price: select_text(&doc, &CURRENT_PRICE),
        original_price: select_text(&doc, &ORIGINAL_PRICE),
        free_delivery: doc.select(&FREE_DELIVERY).next().is_some(),
        page_url: page_url.to_string(),
    }
}

fn select_text(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_TILE: &str = r#"
        <div id="id-title">Acme Dryer 7kg</div>
        <a href="//www.daraz.pk/products/acme-dryer-7kg-i12345.html"></a>
        <img id="id-img" src="https://img.example.com/12345.jpg">
        <div style="font-size: 18px;"><span>Rs.</span><span>27,881</span></div>
        <div style="font-size: 10px;"><del>Rs. 30,000</del></div>
        <div class="free-delivery--OD68c">Free Delivery</div>
    "#;

    #[test]
    fn extracts_all_fields() {
        let raw = parse_tile(FULL_TILE, "https://www.daraz.pk/washers-dryers?page=2");
        assert_eq!(raw.title.as_deref(), Some("Acme Dryer 7kg"));
        assert_eq!(
            raw.url.as_deref(),
            Some("//www.daraz.pk/products/acme-dryer-7kg-i12345.html")
        );
        assert_eq!(raw.img.as_deref(), Some("https://img.example.com/12345.jpg"));
        assert_eq!(raw.current_price.as_deref(), Some("27,881"));
        assert_eq!(raw.original_price.as_deref(), Some("Rs. 30,000"));
        assert!(raw.free_delivery);
        assert_eq!(raw.page_url, "https://www.daraz.pk/washers-dryers?page=2");
    }

    #[test]
    fn sparse_tile_yields_absent_fields() {
        let raw = parse_tile("<div>placeholder tile</div>", "https://www.daraz.pk/x");
        assert_eq!(raw.title, None);
        assert_eq!(raw.url, None);
        assert_eq!(raw.img, None);
        assert_eq!(raw.current_price, None);
        assert_eq!(raw.original_price, None);
        assert!(!raw.free_delivery);
    }

    #[test]
    fn no_discount_means_no_original_price() {
        let html = r#"
            <div id="id-title">Budget Washer</div>
            <a href="//www.daraz.pk/products/budget-washer-i9.html"></a>
            <div style="font-size: 18px;"><span>Rs.</span><span>9,999</span></div>
        "#;
        let raw = parse_tile(html, "https://www.daraz.pk/x");
        assert_eq!(raw.current_price.as_deref(), Some("9,999"));
        assert_eq!(raw.original_price, None);
        assert!(!raw.free_delivery);
    }
}
