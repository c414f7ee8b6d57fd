use serde_json::Value;

use crate::{
    AppState,
    api::{
        methods::{ai, orders, payment, printer, selection},
        types::{
            CancelOrderParams, ConsumeCouponParams, CreateOrderParams, CreateTaskParams,
            DispatchOrderParams, ExtraPaidParams, GetOrderParams, IssueViewTokenParams,
            PaymentPaidParams, ProductionCompleteParams, RecordRetouchParams,
            RecordShootingParams, RefundParams, SelectionTokenParams, StartAiParams,
            SubmitPicksParams, TaskActionParams, TransitionOrderParams,
        },
    },
    error::AppError,
};

macro_rules! dispatch {
    ($param_type:ty, $handler:path, $params:expr, $state:expr) => {{
        let mut p: $param_type =
            serde_json::from_value($params).map_err(|e| AppError::InvalidParams(e.to_string()))?;

        p.state = Some($state);

        let result = $handler(p).await?;
        serde_json::to_value(result).map_err(AppError::from)
    }};
}

async fn dispatch_order(method: &str, params: Value, state: AppState) -> Result<Value, AppError> {
    match method {
        "order.create" => dispatch!(CreateOrderParams, orders::create_order, params, state),
        "order.get" => dispatch!(GetOrderParams, orders::get_order, params, state),
        "order.transition" => {
            dispatch!(TransitionOrderParams, orders::transition_order, params, state)
        }
        "order.cancel" => dispatch!(CancelOrderParams, orders::cancel_order, params, state),
        "order.recordShooting" => {
            dispatch!(RecordShootingParams, orders::record_shooting, params, state)
        }
        "order.recordRetouch" => {
            dispatch!(RecordRetouchParams, orders::record_retouch, params, state)
        }
        "order.productionComplete" => dispatch!(
            ProductionCompleteParams,
            orders::production_complete,
            params,
            state
        ),
        _ => Err(AppError::MethodNotFound(method.to_string())),
    }
}

async fn dispatch_payment(method: &str, params: Value, state: AppState) -> Result<Value, AppError> {
    match method {
        "payment.paid" => dispatch!(PaymentPaidParams, payment::payment_paid, params, state),
        "payment.refund" => dispatch!(RefundParams, payment::refund, params, state),
        "payment.extraPaid" => dispatch!(ExtraPaidParams, payment::extra_paid, params, state),
        _ => Err(AppError::MethodNotFound(method.to_string())),
    }
}

async fn dispatch_ai(method: &str, params: Value, state: AppState) -> Result<Value, AppError> {
    match method {
        "ai.createTask" => dispatch!(CreateTaskParams, ai::create_task, params, state),
        "ai.start" => dispatch!(StartAiParams, ai::start, params, state),
        "ai.submit" => dispatch!(TaskActionParams, ai::submit, params, state),
        "ai.resubmit" => dispatch!(TaskActionParams, ai::resubmit, params, state),
        "ai.cancel" => dispatch!(TaskActionParams, ai::cancel, params, state),
        _ => Err(AppError::MethodNotFound(method.to_string())),
    }
}

async fn dispatch_selection(
    method: &str,
    params: Value,
    state: AppState,
) -> Result<Value, AppError> {
    match method {
        "selection.issueViewToken" => dispatch!(
            IssueViewTokenParams,
            selection::issue_view_token,
            params,
            state
        ),
        "selection.open" => dispatch!(SelectionTokenParams, selection::open, params, state),
        "selection.submit" => dispatch!(SubmitPicksParams, selection::submit, params, state),
        "selection.confirm" => dispatch!(SelectionTokenParams, selection::confirm, params, state),
        _ => Err(AppError::MethodNotFound(method.to_string())),
    }
}

pub async fn dispatch_method(
    method: &str,
    params: Value,
    state: AppState,
) -> Result<Value, AppError> {
    if method.starts_with("order.") {
        return dispatch_order(method, params, state).await;
    }
    if method.starts_with("payment.") {
        return dispatch_payment(method, params, state).await;
    }
    if method.starts_with("ai.") {
        return dispatch_ai(method, params, state).await;
    }
    if method.starts_with("selection.") {
        return dispatch_selection(method, params, state).await;
    }

    match method {
        "printer.dispatch" => dispatch!(DispatchOrderParams, printer::dispatch, params, state),
        "coupon.consume" => dispatch!(ConsumeCouponParams, payment::consume_coupon, params, state),
        _ => Err(AppError::MethodNotFound(method.to_string())),
    }
}
