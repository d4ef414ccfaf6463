//! Shopping list export

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use sqlx::FromRow;

pub const HEADER: &str = "Foodgram shopping list:";
pub const FILENAME: &str = "shopping_list.txt";

/// One aggregated line: total amount of an ingredient across the cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Render the plain-text export, one `name, amount unit` line per item
pub fn render(items: &[ShoppingListItem]) -> String {
    let mut text = String::with_capacity(HEADER.len() + items.len() * 32);
    text.push_str(HEADER);
    text.push('\n');
    for item in items {
        text.push_str(&format!(
            "{}, {} {}\n",
            item.name, item.amount, item.measurement_unit
        ));
    }
    text
}

/// Downloadable text attachment
pub struct ShoppingListFile(pub String);

impl IntoResponse for ShoppingListFile {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", FILENAME),
                ),
            ],
            self.0,
        )
            .into_response()
    }
}
