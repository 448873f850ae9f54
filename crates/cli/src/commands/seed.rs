//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - pid: 512
//!     name: Enamel mug
//!     description: Holds 350ml.
//!     price: "9.99"
//!     stock: 12
//!     img: https://files.example.com/mug.png
//! ```
//!
//! The whole file is validated before anything is inserted.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use bazaar_core::Price;
use bazaar_storefront::db::{Catalog, PgCatalog, RepositoryError};
use bazaar_storefront::models::ProductDraft;

use super::{ConnectError, connect};

/// Errors that can occur while seeding.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Could not read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Top-level layout of a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

/// One product entry as written in YAML.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub pid: i32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub img: String,
}

impl SeedProduct {
    fn to_draft(&self) -> Result<ProductDraft, String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(format!("product {}: name is empty", self.pid));
        }
        let price = self
            .price
            .parse::<Price>()
            .map_err(|e| format!("product {name}: {e}"))?;

        Ok(ProductDraft {
            pid: self.pid,
            name: name.to_owned(),
            description: self.description.trim().to_owned(),
            price,
            image_url: Some(self.img.trim().to_owned()),
            stock: self.stock,
        })
    }
}

/// Validate every entry, collecting all problems.
pub fn validate(seed: &SeedFile) -> Result<Vec<ProductDraft>, Vec<String>> {
    let (drafts, errors): (Vec<_>, Vec<_>) = seed
        .products
        .iter()
        .map(SeedProduct::to_draft)
        .partition(Result::is_ok);

    if errors.is_empty() {
        Ok(drafts.into_iter().filter_map(Result::ok).collect())
    } else {
        Err(errors.into_iter().filter_map(Result::err).collect())
    }
}

/// Insert validated products, returning how many were created.
pub async fn insert_all(catalog: &dyn Catalog, drafts: &[ProductDraft]) -> Result<usize, RepositoryError> {
    for draft in drafts {
        let product = catalog.create(draft).await?;
        info!(id = %product.id, name = %product.name, "Inserted product");
    }
    Ok(drafts.len())
}

/// Seed products from a YAML file.
pub async fn products(file_path: &str) -> Result<(), SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_owned()));
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: SeedFile = serde_yaml::from_str(&content)?;
    info!(products = seed.products.len(), "Parsed seed file");

    let drafts = validate(&seed).map_err(|errors| {
        error!("Seed file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        SeedError::Invalid(errors.len())
    })?;

    let pool = connect().await?;
    let inserted = insert_all(&PgCatalog::new(pool), &drafts).await?;

    info!("Seeding complete! Products inserted: {inserted}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_storefront::db::memory::InMemoryCatalog;

    use super::*;

    const SEED: &str = r#"
products:
  - pid: 512
    name: Enamel mug
    description: Holds 350ml.
    price: "9.99"
    stock: 12
    img: https://files.example.com/mug.png
  - pid: 513
    name: Tea towel
    price: "5"
"#;

    #[test]
    fn test_parse_and_validate() {
        let seed: SeedFile = serde_yaml::from_str(SEED).unwrap();
        let drafts = validate(&seed).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].price.to_string(), "9.99");
        assert_eq!(drafts[1].stock, 0);
    }

    #[test]
    fn test_validate_collects_every_error() {
        let seed: SeedFile = serde_yaml::from_str(
            r#"
products:
  - { pid: 1, name: "", price: "1.00" }
  - { pid: 2, name: Ok, price: "-3" }
  - { pid: 3, name: Fine, price: "2.50" }
"#,
        )
        .unwrap();
        assert_eq!(validate(&seed).unwrap_err().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_all() {
        let seed: SeedFile = serde_yaml::from_str(SEED).unwrap();
        let drafts = validate(&seed).unwrap();
        let catalog = InMemoryCatalog::new();

        assert_eq!(insert_all(&catalog, &drafts).await.unwrap(), 2);
        assert_eq!(catalog.len(), 2);
    }
}
