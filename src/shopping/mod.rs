//! Shopping list aggregation over a user's cart and the txt / pdf reports built from it.

pub mod aggregate;
pub mod error;
mod handlers;
pub mod model;
mod pdf;
pub mod render;
pub mod store;

use crate::state::AppState;
use axum::Router;

pub use error::ShoppingListError;
pub use model::{MissingIngredientPolicy, ReportFormat};
pub use store::PgShoppingStore;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
