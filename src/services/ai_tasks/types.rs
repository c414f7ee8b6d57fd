use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub order_id: Option<i32>,
    pub provider_id: i32,
    pub input_image_path: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub style_category_id: Option<i32>,
    pub style_image_id: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub submitted: u32,
    pub polled: u32,
    pub errors: u32,
}
