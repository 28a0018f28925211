//! Product route handlers.
//!
//! Nested under `/api/products`:
//!
//! ```text
//! GET    /api/products        - list, newest first
//! POST   /api/products        - create (name, price, image required)
//! PUT    /api/products/{id}   - partial update
//! DELETE /api/products/{id}   - delete
//! ```

use axum::{
    Router,
    extract::{Path, State},
    routing::{get, put},
};
use serde_json::Value;

use storegate_core::ProductId;

use crate::db::ProductRepository;
use crate::error::AppError;
use crate::models::{NewProduct, Product, ProductPatch};
use crate::pipeline::Payload;
use crate::routes::envelope::{ApiResult, Envelope};
use crate::state::AppState;

/// Mount point of this router.
pub const PREFIX: &str = "/api/products";

/// Create the product router (paths relative to [`PREFIX`]).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", put(update).delete(remove))
}

/// List all products.
pub async fn list(State(state): State<AppState>) -> ApiResult<Envelope<Vec<Product>>> {
    let pool = state.database().pool()?;
    let products = ProductRepository::new(pool).list().await?;
    Ok(Envelope::ok(products))
}

/// Create a product.
pub async fn create(
    State(state): State<AppState>,
    Payload(product): Payload<NewProduct>,
) -> ApiResult<Envelope<Product>> {
    let product = product
        .validate()
        .map_err(|message| AppError::Validation(message.to_string()))?;

    let pool = state.database().pool()?;
    let created = ProductRepository::new(pool).create(&product).await?;

    tracing::info!(product_id = %created.id, "Product created");
    Ok(Envelope::created(created))
}

/// Update some fields of a product.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Payload(patch): Payload<ProductPatch>,
) -> ApiResult<Envelope<Product>> {
    let id = parse_id(&id)?;
    let patch = patch
        .validate()
        .map_err(|message| AppError::Validation(message.to_string()))?;

    let pool = state.database().pool()?;
    let updated = ProductRepository::new(pool)
        .update(id, &patch)
        .await
        .map_err(|e| not_found_as_product(e.into()))?;

    Ok(Envelope::ok(updated))
}

/// Delete a product.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Envelope<Value>> {
    let id = parse_id(&id)?;

    let pool = state.database().pool()?;
    ProductRepository::new(pool)
        .delete(id)
        .await
        .map_err(|e| not_found_as_product(e.into()))?;

    tracing::info!(product_id = %id, "Product deleted");
    Ok(Envelope::ok(Value::Null))
}

fn parse_id(raw: &str) -> Result<ProductId, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation("Invalid product id".to_string()))
}

fn not_found_as_product(err: AppError) -> AppError {
    match err {
        AppError::Database(crate::db::RepositoryError::NotFound) => {
            AppError::NotFound("Product".to_string())
        }
        other => other,
    }
}
