use crate::{
    AppState,
    error::{AppError, Result},
};

pub mod ai;
pub mod orders;
pub mod payment;
pub mod printer;
pub mod selection;

fn app_state(state: Option<AppState>) -> Result<AppState> {
    state.ok_or(AppError::InternalServerError(
        "Failed to get app state".to_string(),
    ))
}
