use crate::{
    api::types::{DispatchOrderParams, DispatchResponse, OrderResponse},
    error::Result,
    services::printer::{self as printer_service, DispatchOutcome},
};

use super::app_state;

pub async fn dispatch(params: DispatchOrderParams) -> Result<DispatchResponse> {
    let app_state = app_state(params.state)?;

    let outcome = printer_service::dispatch(&app_state, params.order_id, &params.actor).await?;

    Ok(match outcome {
        DispatchOutcome::Sent(order) => DispatchResponse {
            sent: true,
            message: None,
            order: OrderResponse::try_from(order)?,
        },
        DispatchOutcome::Failed { order, message } => DispatchResponse {
            sent: false,
            message: Some(message),
            order: OrderResponse::try_from(order)?,
        },
    })
}
