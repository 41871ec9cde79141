use crate::api::response::Envelope;
use crate::errors::ApiError;
use crate::fields::FieldView;
use crate::state::AppState;
use axum::extract::{Path, State};

pub async fn all(State(state): State<AppState>) -> Envelope<Vec<FieldView>> {
    Envelope::ok(state.fields.all_fields().await)
}

pub async fn one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Envelope<FieldView>, ApiError> {
    state
        .fields
        .field(&id)
        .await
        .map(Envelope::ok)
        .ok_or(ApiError::NotFound("Field not found"))
}
