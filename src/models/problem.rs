use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The slice of a problem the judge core consumes. `function_name` set means
/// the problem is judged in function-call style and gets a driver stub.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProblemRef {
    pub id: i64,
    pub function_name: Option<String>,
}
