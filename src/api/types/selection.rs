use serde::Deserialize;

use crate::AppState;

#[derive(Deserialize)]
pub struct SelectionTokenParams {
    pub token: String,

    #[serde(skip)]
    pub state: Option<AppState>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitPicksParams {
    pub token: String,
    pub image_ids: Vec<i32>,

    #[serde(skip)]
    pub state: Option<AppState>,
}
