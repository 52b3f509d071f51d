use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Language {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub file_extension: String,
    pub compile_command: Option<String>,
    pub run_command: String,
    pub is_active: bool,
}
