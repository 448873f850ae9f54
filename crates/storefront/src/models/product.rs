//! Catalog products and listing queries.

use serde::{Deserialize, Serialize};

use bazaar_core::{Price, ProductId};

/// A product as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Store-assigned id; carts key lines by its string form.
    pub id: ProductId,
    /// Display/lookup code. Not unique.
    pub pid: i32,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub image_url: String,
    pub stock: u32,
}

impl Product {
    /// Whether the product can currently be bought.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Admin-supplied product fields for create and update.
///
/// `image_url` is `None` when no new image was uploaded; updates then keep the
/// stored image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub pid: i32,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub image_url: Option<String>,
    pub stock: u32,
}

/// Catalog orderings offered on the home page.
///
/// Parsed from the human-readable labels the listing page submits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogSort {
    /// Best-stocked first.
    #[default]
    StockDesc,
    PriceAsc,
    PriceDesc,
    Newest,
    /// Only products with no stock left.
    OutOfStock,
}

impl CatalogSort {
    /// Selectable orderings, in menu order.
    pub const SELECTABLE: [Self; 4] = [Self::PriceAsc, Self::PriceDesc, Self::Newest, Self::OutOfStock];

    /// Parse a sort label; anything unknown falls back to the default ordering.
    #[must_use]
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            Some("Price: Low to High") => Self::PriceAsc,
            Some("Price: High to Low") => Self::PriceDesc,
            Some("Newest Arrivals") => Self::Newest,
            Some("Out of Stock") => Self::OutOfStock,
            _ => Self::StockDesc,
        }
    }

    /// The label shown in the sort menu; `None` for the default ordering.
    #[must_use]
    pub const fn label(&self) -> Option<&'static str> {
        match self {
            Self::StockDesc => None,
            Self::PriceAsc => Some("Price: Low to High"),
            Self::PriceDesc => Some("Price: High to Low"),
            Self::Newest => Some("Newest Arrivals"),
            Self::OutOfStock => Some("Out of Stock"),
        }
    }
}

/// A page request against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingQuery {
    pub sort: CatalogSort,
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl ListingQuery {
    /// Largest page size a visitor may request.
    pub const MAX_PER_PAGE: u32 = 100;

    /// Build a query, clamping page and page size into range.
    #[must_use]
    pub fn new(sort: CatalogSort, page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> Self {
        Self {
            sort,
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(default_per_page)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    /// Rows to skip for this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

/// One page of results plus the numbers needed to render pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    /// Total matching rows across all pages.
    pub total: u64,
}

impl<T> Page<T> {
    /// Number of pages (at least one, so an empty catalog still renders page 1).
    #[must_use]
    pub fn pages(&self) -> u32 {
        let per_page = u64::from(self.per_page.max(1));
        let pages = self.total.div_ceil(per_page).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.pages()
    }
}
