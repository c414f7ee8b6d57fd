use crate::{
    api::types::{IssueViewTokenParams, SelectionTokenParams, SubmitPicksParams},
    error::{AppError, Result},
    infrastructure::db::repositories::OrderRepository,
    services::selection::{
        self as selection_service, ConfirmResult, IssuedToken, PickReceipt, SelectionSession,
    },
};

use super::app_state;

pub async fn issue_view_token(params: IssueViewTokenParams) -> Result<IssuedToken> {
    let app_state = app_state(params.state)?;

    let order = OrderRepository::find_by_id(app_state.db.get_connection(), params.order_id)
        .await?
        .ok_or(AppError::OrderNotFound)?;

    selection_service::issue_view_token(&app_state, &order).await
}

pub async fn open(params: SelectionTokenParams) -> Result<SelectionSession> {
    let app_state = app_state(params.state)?;

    selection_service::open_session(&app_state, &params.token).await
}

pub async fn submit(params: SubmitPicksParams) -> Result<PickReceipt> {
    let app_state = app_state(params.state)?;

    selection_service::submit_picks(&app_state, &params.token, params.image_ids).await
}

pub async fn confirm(params: SelectionTokenParams) -> Result<ConfirmResult> {
    let app_state = app_state(params.state)?;

    selection_service::confirm(&app_state, &params.token).await
}
