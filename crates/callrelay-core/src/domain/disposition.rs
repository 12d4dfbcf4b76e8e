//! Call disposition, produced once per call by the Disposition component.

use crate::domain::call::CallId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Disposition {
    pub call_id: CallId,
    pub issue_summary: String,
    pub resolution: String,
    pub next_steps: String,
    pub suggested_categories: Vec<String>,
    pub confidence: f32,
}
