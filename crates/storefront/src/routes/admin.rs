//! Admin product management: add, edit and remove catalog entries.
//!
//! Every handler takes [`RequireAdmin`], so visitors who are not logged in
//! are sent to `/login` and other accounts get a 403.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::{Price, ProductId};

use super::Layout;
use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, push_notice};
use crate::models::{Notice, Product, ProductDraft};
use crate::state::AppState;
use crate::storage::{image_content_type, object_name};

/// An uploaded image file.
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Raw product form fields as submitted.
#[derive(Default)]
pub struct ProductForm {
    pub pid: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub quantity: String,
    pub image: Option<Upload>,
}

impl ProductForm {
    /// Prefill from a stored product.
    fn from_product(product: &Product) -> Self {
        Self {
            pid: product.pid.to_string(),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.to_string(),
            quantity: product.stock.to_string(),
            image: None,
        }
    }

    /// Read the multipart body. A file input left empty counts as no image.
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            if name == "img" {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !file_name.is_empty() && !bytes.is_empty() {
                    form.image = Some(Upload {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let value = field
                .text()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            match name.as_str() {
                "pid" => form.pid = value,
                "name" => form.name = value,
                "description" => form.description = value,
                "price" => form.price = value,
                "quantity" => form.quantity = value,
                _ => {}
            }
        }
        Ok(form)
    }

    /// Check the text fields. The image is handled separately.
    fn validate(&self) -> std::result::Result<ProductDraft, String> {
        let pid = self
            .pid
            .trim()
            .parse::<i32>()
            .map_err(|_| "Product code must be a whole number".to_owned())?;
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Name is required".to_owned());
        }
        let price = self
            .price
            .parse::<Price>()
            .map_err(|_| "Price must be a non-negative amount".to_owned())?;
        let stock = self
            .quantity
            .trim()
            .parse::<u32>()
            .map_err(|_| "Quantity must be a whole number of zero or more".to_owned())?;

        Ok(ProductDraft {
            pid,
            name: name.to_owned(),
            description: self.description.trim().to_owned(),
            price,
            image_url: None,
            stock,
        })
    }
}

/// Add/edit product form template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/product_form.html")]
pub struct ProductFormTemplate {
    pub layout: Layout,
    pub title: &'static str,
    pub action: String,
    pub form: ProductForm,
    pub current_image: Option<String>,
    pub image_required: bool,
}

/// Delete confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/delete.html")]
pub struct DeleteTemplate {
    pub layout: Layout,
    pub product: Product,
}

#[derive(Debug, Deserialize)]
pub struct ProductParams {
    pub id: Option<String>,
}

impl ProductParams {
    fn product_id(&self) -> Result<ProductId> {
        self.id
            .as_deref()
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| AppError::NotFound("product".to_owned()))
    }
}

async fn load_product(state: &AppState, id: ProductId) -> Result<Product> {
    state
        .catalog()
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// Store the uploaded image and return its public URL.
async fn store_image(state: &AppState, upload: Upload) -> std::result::Result<String, String> {
    let content_type = image_content_type(&upload.file_name)
        .ok_or_else(|| "Image must be a JPG, PNG, GIF or WebP file".to_owned())?;
    state
        .storage()
        .upload(&object_name(&upload.file_name), content_type, upload.bytes)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "Image upload failed");
            "The image could not be uploaded, please try again".to_owned()
        })
}

/// A random 30-bit product code to prefill the add form.
fn suggested_pid() -> i32 {
    i32::try_from(rand::random::<u32>() >> 2).unwrap_or_default()
}

async fn form_page(
    state: &AppState,
    session: &Session,
    template: ProductFormTemplate,
    error: Option<String>,
) -> Response {
    let mut layout = Layout::load(state, session).await;
    let status = error.as_ref().map_or(StatusCode::OK, |_| StatusCode::UNPROCESSABLE_ENTITY);
    if let Some(message) = error {
        layout = layout.with_notice(Notice::error(message));
    }
    (status, ProductFormTemplate { layout, ..template }).into_response()
}

fn add_form(form: ProductForm) -> ProductFormTemplate {
    ProductFormTemplate {
        layout: Layout::default(),
        title: "Add product",
        action: "/add_product".to_owned(),
        form,
        current_image: None,
        image_required: true,
    }
}

fn edit_form(product: &Product, form: ProductForm) -> ProductFormTemplate {
    ProductFormTemplate {
        layout: Layout::default(),
        title: "Edit product",
        action: format!("/edit_product?id={}", product.id),
        form,
        current_image: Some(product.image_url.clone()),
        image_required: false,
    }
}

/// Display the add product form.
#[instrument(skip_all)]
pub async fn add_page(_admin: RequireAdmin, State(state): State<AppState>, session: Session) -> Response {
    let form = ProductForm {
        pid: suggested_pid().to_string(),
        ..ProductForm::default()
    };
    form_page(&state, &session, add_form(form), None).await
}

/// Create a product from the submitted form and image.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn add(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> Result<Response> {
    let mut form = ProductForm::read(multipart).await?;

    let mut draft = match form.validate() {
        Ok(draft) => draft,
        Err(message) => return Ok(form_page(&state, &session, add_form(form), Some(message)).await),
    };
    let Some(upload) = form.image.take() else {
        let message = "An image is required".to_owned();
        return Ok(form_page(&state, &session, add_form(form), Some(message)).await);
    };
    match store_image(&state, upload).await {
        Ok(url) => draft.image_url = Some(url),
        Err(message) => return Ok(form_page(&state, &session, add_form(form), Some(message)).await),
    }

    let product = state.catalog().create(&draft).await?;
    tracing::info!(product_id = %product.id, "Product added");
    push_notice(&session, Notice::info(format!("{} was added", product.name))).await;
    Ok(Redirect::to(&format!("/product/{}", product.id)).into_response())
}

/// Display the edit form for a product.
#[instrument(skip_all)]
pub async fn edit_page(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<ProductParams>,
) -> Result<Response> {
    let product = load_product(&state, params.product_id()?).await?;
    let form = ProductForm::from_product(&product);
    Ok(form_page(&state, &session, edit_form(&product, form), None).await)
}

/// Update a product. Without a new image the stored one is kept.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn edit(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<ProductParams>,
    multipart: Multipart,
) -> Result<Response> {
    let product = load_product(&state, params.product_id()?).await?;
    let mut form = ProductForm::read(multipart).await?;

    let mut draft = match form.validate() {
        Ok(draft) => draft,
        Err(message) => {
            return Ok(form_page(&state, &session, edit_form(&product, form), Some(message)).await);
        }
    };
    if let Some(upload) = form.image.take() {
        match store_image(&state, upload).await {
            Ok(url) => draft.image_url = Some(url),
            Err(message) => {
                return Ok(form_page(&state, &session, edit_form(&product, form), Some(message)).await);
            }
        }
    }

    let updated = match state.catalog().update(product.id, &draft).await {
        Ok(updated) => updated,
        Err(RepositoryError::NotFound) => return Err(AppError::NotFound(format!("product {}", product.id))),
        Err(err) => return Err(err.into()),
    };
    tracing::info!(product_id = %updated.id, "Product updated");
    push_notice(&session, Notice::info(format!("{} was updated", updated.name))).await;
    Ok(Redirect::to(&format!("/product/{}", updated.id)).into_response())
}

/// Ask for confirmation before deleting a product.
#[instrument(skip_all)]
pub async fn remove_page(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<ProductParams>,
) -> Result<Response> {
    let product = load_product(&state, params.product_id()?).await?;
    let layout = Layout::load(&state, &session).await;
    Ok(DeleteTemplate { layout, product }.into_response())
}

/// Delete a product. Carts that already hold it keep their snapshot line.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn remove(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<ProductParams>,
) -> Result<Redirect> {
    let id = params.product_id()?;
    match state.catalog().delete(id).await {
        Ok(()) => {}
        Err(RepositoryError::NotFound) => return Err(AppError::NotFound(format!("product {id}"))),
        Err(err) => return Err(err.into()),
    }
    tracing::info!(product_id = %id, "Product removed");
    push_notice(&session, Notice::info("Product removed")).await;
    Ok(Redirect::to("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> ProductForm {
        ProductForm {
            pid: "512".into(),
            name: " Mug ".into(),
            description: "Holds coffee".into(),
            price: "9.99".into(),
            quantity: "5".into(),
            image: None,
        }
    }

    #[test]
    fn test_validate_trims_and_parses() {
        let draft = filled().validate();
        assert!(matches!(&draft, Ok(d) if d.name == "Mug" && d.stock == 5 && d.pid == 512));
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let negative = ProductForm {
            price: "-1".into(),
            ..filled()
        };
        assert!(negative.validate().is_err());

        let nameless = ProductForm {
            name: "  ".into(),
            ..filled()
        };
        assert!(nameless.validate().is_err());

        let fractional = ProductForm {
            quantity: "1.5".into(),
            ..filled()
        };
        assert!(fractional.validate().is_err());
    }

    #[test]
    fn test_suggested_pid_fits_30_bits() {
        for _ in 0..100 {
            let pid = suggested_pid();
            assert!((0..1 << 30).contains(&pid));
        }
    }
}
