use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument};

use super::{
    aggregate::build_shopping_list,
    error::ShoppingListError,
    model::ReportFormat,
    render::{render, RenderedReport},
    store::CartStore,
};
use crate::{
    auth::AuthUser,
    error::AppError,
    recipes::{
        dto::RecipeShort,
        handlers::{add_to, remove_from},
        repo::Membership,
    },
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/recipes/download_shopping_cart", get(download_shopping_cart))
        .route(
            "/recipes/:id/shopping_cart",
            post(add_to_cart).delete(remove_from_cart),
        )
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub format: Option<String>,
}

impl DownloadQuery {
    fn report_format(&self, default: ReportFormat) -> Result<ReportFormat, ShoppingListError> {
        match self.format.as_deref().map(str::trim) {
            None | Some("") => Ok(default),
            Some(raw) => raw.parse().map_err(ShoppingListError::InvalidInput),
        }
    }
}

impl IntoResponse for RenderedReport {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, HeaderValue::from_static(self.content_type)),
                (
                    header::CONTENT_DISPOSITION,
                    HeaderValue::from_static(self.disposition),
                ),
            ],
            self.body,
        )
            .into_response()
    }
}

#[instrument(skip(state))]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<DownloadQuery>,
) -> Result<RenderedReport, AppError> {
    let settings = state.config.shopping_list;
    let format = q.report_format(settings.default_format)?;

    let store = state.shopping_store();
    let recipe_ids = store.recipe_ids_in_cart(user_id).await?;
    let lines =
        build_shopping_list(&recipe_ids, &store, &store, settings.missing_ingredient).await?;
    let report = render(&lines, format)?;

    info!(
        %user_id,
        recipes = recipe_ids.len(),
        lines = lines.len(),
        bytes = report.body.len(),
        ?format,
        "shopping list downloaded"
    );
    Ok(report)
}

#[instrument(skip(state))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<RecipeShort>), AppError> {
    add_to(&state, Membership::ShoppingCart, user_id, id).await
}

#[instrument(skip(state))]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    remove_from(&state, Membership::ShoppingCart, user_id, id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ingredients::repo_types::IngredientId, shopping::model::AggregatedLine};

    fn query(format: Option<&str>) -> DownloadQuery {
        DownloadQuery {
            format: format.map(Into::into),
        }
    }

    #[test]
    fn missing_format_uses_default() {
        assert_eq!(
            query(None).report_format(ReportFormat::Document).unwrap(),
            ReportFormat::Document
        );
        assert_eq!(
            query(Some(" ")).report_format(ReportFormat::PlainText).unwrap(),
            ReportFormat::PlainText
        );
    }

    #[test]
    fn unknown_format_is_invalid_input() {
        let err = query(Some("docx"))
            .report_format(ReportFormat::PlainText)
            .unwrap_err();
        assert!(matches!(err, ShoppingListError::InvalidInput(_)));
        assert_eq!(
            AppError::from(err).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn report_is_sent_as_attachment() {
        let lines = vec![AggregatedLine {
            ingredient_id: IngredientId(1),
            ingredient_name: "flour".into(),
            measurement_unit: "g".into(),
            total_quantity: 300,
        }];
        let res = render(&lines, ReportFormat::PlainText).unwrap().into_response();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"shopping_list.txt\""
        );
    }

    #[test]
    fn pdf_report_carries_its_own_headers() {
        let res = render(&[], ReportFormat::Document).unwrap().into_response();
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(
            res.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"shopping_list.pdf\""
        );
    }

    #[tokio::test]
    async fn download_requires_token() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let app = routes().with_state(AppState::fake());
        let res = app
            .oneshot(
                Request::get("/recipes/download_shopping_cart")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
