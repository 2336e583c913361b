//! HTML extraction for catalog listing and product detail pages
//!
//! Tied to the catalog's current markup: listing rows are `<tr>` elements
//! carrying `data-course-id` (pre-packaged solutions) or `data-entity-id`
//! (individual tests); detail pages describe themselves through the meta
//! description and `<h4>` headings each followed by a `<p>` body.

use scraper::{ElementRef, Html, Selector};

use crate::product::{Product, ProductType, Section};

/// A product row before detail enrichment
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    pub product_type: ProductType,
    pub name: String,
    pub link: String,
    pub remote_testing: bool,
    pub adaptive: bool,
    pub test_types: Vec<String>,
}

impl ListingRow {
    pub fn into_product(self) -> Product {
        let mut product = Product::new(self.product_type, self.name, self.link);
        product.remote_testing = self.remote_testing;
        product.adaptive = self.adaptive;
        product.test_types = self.test_types;
        product
    }
}

/// Content recovered from a product detail page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductDetails {
    pub description: String,
    pub sections: Vec<Section>,
}

struct ListingSelectors {
    course_rows: Selector,
    entity_rows: Selector,
    title_cell: Selector,
    anchor: Selector,
    general_cell: Selector,
    yes_marker: Selector,
    key_marker: Selector,
}

impl ListingSelectors {
    fn new() -> Self {
        Self {
            course_rows: Selector::parse("tr[data-course-id]").expect("course row selector"),
            entity_rows: Selector::parse("tr[data-entity-id]").expect("entity row selector"),
            title_cell: Selector::parse("td.custom__table-heading__title")
                .expect("title cell selector"),
            anchor: Selector::parse("a").expect("anchor selector"),
            general_cell: Selector::parse("td.custom__table-heading__general")
                .expect("general cell selector"),
            yes_marker: Selector::parse("span.-yes").expect("yes marker selector"),
            key_marker: Selector::parse("span.product-catalogue__key")
                .expect("key marker selector"),
        }
    }
}

/// Join a catalog href with the origin when it is site-relative
pub fn absolute_link(base_url: &str, href: &str) -> String {
    if href.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    } else {
        href.to_string()
    }
}

/// Extract every product row from a listing page.
///
/// Pre-packaged rows come first, then individual ones, in document order
/// within each group. Rows without a titled link are dropped.
pub fn parse_listing(html: &str, base_url: &str) -> Vec<ListingRow> {
    let selectors = ListingSelectors::new();
    let document = Html::parse_document(html);

    let course = document
        .select(&selectors.course_rows)
        .map(|row| (row, ProductType::PrePackaged));
    let entity = document
        .select(&selectors.entity_rows)
        .map(|row| (row, ProductType::Individual));

    course
        .chain(entity)
        .filter_map(|(row, product_type)| parse_row(row, product_type, base_url, &selectors))
        .collect()
}

fn parse_row(
    row: ElementRef<'_>,
    product_type: ProductType,
    base_url: &str,
    selectors: &ListingSelectors,
) -> Option<ListingRow> {
    let title_cell = row.select(&selectors.title_cell).next()?;
    let anchor = title_cell.select(&selectors.anchor).next()?;

    let href = anchor.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    let name = element_text(&anchor);
    if name.is_empty() {
        return None;
    }

    let cells: Vec<ElementRef<'_>> = row.select(&selectors.general_cell).collect();
    let has_yes = |idx: usize| {
        cells
            .get(idx)
            .map(|cell| cell.select(&selectors.yes_marker).next().is_some())
            .unwrap_or(false)
    };
    let test_types = cells
        .get(2)
        .map(|cell| {
            cell.select(&selectors.key_marker)
                .map(|span| element_text(&span))
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Some(ListingRow {
        product_type,
        name,
        link: absolute_link(base_url, href),
        remote_testing: has_yes(0),
        adaptive: has_yes(1),
        test_types,
    })
}

/// Extract description and heading/body sections from a detail page
pub fn parse_details(html: &str) -> ProductDetails {
    let document = Html::parse_document(html);
    let meta = Selector::parse(r#"meta[name="description"]"#).expect("meta selector");
    let heading = Selector::parse("h4").expect("heading selector");

    let description = document
        .select(&meta)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(|c| c.trim().to_string())
        .unwrap_or_default();

    let sections = document
        .select(&heading)
        .filter_map(|h4| {
            let body = h4
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "p")?;
            Some(Section::new(element_text(&h4), element_text(&body)))
        })
        .collect();

    ProductDetails {
        description,
        sections,
    }
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
