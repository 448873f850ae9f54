//! Catalog route handlers: listing, search and product detail.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::ProductId;

use super::Layout;
use crate::db::products::SEARCH_LIMIT;
use crate::error::{AppError, Result};
use crate::models::{CatalogSort, ListingQuery, Page, Product};
use crate::state::AppState;

/// Listing query parameters. Numbers arrive as text so junk falls back to
/// defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub sort: Option<String>,
}

impl ListingParams {
    fn number(value: Option<&str>) -> Option<u32> {
        value.and_then(|v| v.trim().parse().ok())
    }

    /// Resolve into a clamped catalog query.
    #[must_use]
    pub fn to_query(&self, default_per_page: u32) -> ListingQuery {
        ListingQuery::new(
            CatalogSort::from_label(self.sort.as_deref()),
            Self::number(self.page.as_deref()),
            Self::number(self.per_page.as_deref()),
            default_per_page,
        )
    }
}

/// A sort menu entry.
pub struct SortOption {
    pub label: &'static str,
    pub selected: bool,
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "catalog/index.html")]
pub struct IndexTemplate {
    pub layout: Layout,
    pub products: Vec<Product>,
    pub page: u32,
    pub pages: u32,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
    pub sort_options: Vec<SortOption>,
}

fn page_url(query: &ListingQuery, page: u32) -> String {
    let mut url = format!("/?page={page}&per_page={}", query.per_page);
    if let Some(label) = query.sort.label() {
        url.push_str("&sort=");
        url.push_str(&urlencoding::encode(label));
    }
    url
}

impl IndexTemplate {
    fn new(layout: Layout, query: &ListingQuery, page: Page<Product>) -> Self {
        let pages = page.pages();
        Self {
            prev_url: page.has_prev().then(|| page_url(query, page.page - 1)),
            next_url: page.has_next().then(|| page_url(query, page.page + 1)),
            sort_options: CatalogSort::SELECTABLE
                .iter()
                .filter_map(|sort| {
                    sort.label().map(|label| SortOption {
                        label,
                        selected: *sort == query.sort,
                    })
                })
                .collect(),
            page: page.page,
            pages,
            products: page.items,
            layout,
        }
    }
}

/// Display the paginated, sorted catalog.
#[instrument(skip(state, session))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<ListingParams>,
) -> Result<impl IntoResponse> {
    let query = params.to_query(state.config().catalog_page_size);
    let page = state.catalog().list(query).await?;
    let layout = Layout::load(&state, &session).await;

    Ok(IndexTemplate::new(layout, &query, page))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// Search results template.
#[derive(Template, WebTemplate)]
#[template(path = "catalog/results.html")]
pub struct ResultsTemplate {
    pub layout: Layout,
    pub keyword: String,
    pub products: Vec<Product>,
}

/// Keyword search. An empty keyword shows no results.
#[instrument(skip(state, session))]
pub async fn result(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse> {
    let keyword = params.q.unwrap_or_default().trim().to_owned();
    let products = if keyword.is_empty() {
        Vec::new()
    } else {
        state.catalog().search(&keyword, SEARCH_LIMIT).await?
    };
    let layout = Layout::load(&state, &session).await;

    Ok(ResultsTemplate {
        layout,
        keyword,
        products,
    })
}

/// Product detail template.
#[derive(Template, WebTemplate)]
#[template(path = "catalog/product.html")]
pub struct ProductTemplate {
    pub layout: Layout,
    pub product: Product,
}

/// Display a single product.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let not_found = || AppError::NotFound(format!("product {id}"));
    let product_id: ProductId = id.parse().map_err(|_| not_found())?;
    let product = state.catalog().get(product_id).await?.ok_or_else(not_found)?;
    let layout = Layout::load(&state, &session).await;

    Ok(ProductTemplate { layout, product })
}
