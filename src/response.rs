//! Response envelopes. Rows go out with camelCase keys.

use crate::case::keys_to_camel_case;
use crate::service::Page;
use crate::store::Row;
use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResponse {
    pub items: Vec<Row>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl From<Page> for PagedResponse {
    fn from(page: Page) -> Self {
        PagedResponse {
            items: page.items.into_iter().map(keys_to_camel_case).collect(),
            total_count: page.total_count,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages,
        }
    }
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl DeleteResponse {
    pub fn deleted(label: &str) -> Self {
        DeleteResponse {
            success: true,
            message: format!("{} deleted", label),
            dependencies: Vec::new(),
        }
    }

    pub fn blocked(label: &str, dependencies: Vec<String>) -> Self {
        DeleteResponse {
            success: false,
            message: format!("{} cannot be deleted while referenced by: {}", label, dependencies.join(", ")),
            dependencies,
        }
    }
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        let status = if self.success { StatusCode::OK } else { StatusCode::CONFLICT };
        (status, Json(self)).into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependenciesResponse {
    pub has_dependencies: bool,
    pub dependencies: Vec<String>,
}

/// One row as the API shows it.
pub fn row_body(row: Row) -> Json<Row> {
    Json(keys_to_camel_case(row))
}
