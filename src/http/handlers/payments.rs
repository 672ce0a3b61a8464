use crate::domain::identity::CurrentUser;
use crate::domain::payment::{
    BankTransferSubmission, CallbackParams, CreatePaymentRequest, PaymentResult, ReceiptFile, ReviewRequest,
    TransferReferenceRequest, VerifyPaymentRequest,
};
use crate::error::{err, ErrorEnvelope, FlowError};
use crate::AppState;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

pub(crate) fn flow_error(e: FlowError) -> Response {
    if matches!(e, FlowError::Store(_) | FlowError::Configuration(_)) {
        tracing::error!("payment flow failed: {}", e);
    }
    (e.status_code(), Json(ErrorEnvelope::from(&e))).into_response()
}

fn require_user(user: Option<Extension<CurrentUser>>) -> Result<CurrentUser, Response> {
    user.map(|Extension(u)| u).ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(err("AUTHENTICATION_REQUIRED", "sign in to continue")),
        )
            .into_response()
    })
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(err("VALIDATION_ERROR", message))).into_response()
}

/// Vendor failures are reported as 502 with the result body; everything the
/// vendor answered, approved or not, is a 200.
fn payment_response(result: PaymentResult) -> Response {
    let status = if result.error_kind.is_some() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    (status, Json(result)).into_response()
}

pub async fn create_payment(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Json(req): Json<CreatePaymentRequest>,
) -> Response {
    let user = match require_user(user) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.payment_flow.create_payment(req.booking_id, user.user_id).await {
        Ok(result) => payment_response(result),
        Err(e) => flow_error(e),
    }
}

pub async fn verify_payment(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Json(req): Json<VerifyPaymentRequest>,
) -> Response {
    let user = match require_user(user) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state
        .payment_flow
        .verify_payment(&req.transaction_id, req.booking_id, Some(user.user_id))
        .await
    {
        Ok(result) => payment_response(result),
        Err(e) => flow_error(e),
    }
}

pub async fn payphone_callback(State(state): State<AppState>, Query(params): Query<CallbackParams>) -> Response {
    match state.payment_flow.handle_callback(params).await {
        Ok(outcome) => {
            tracing::info!(
                booking_id = %outcome.booking_id,
                success = outcome.result.success,
                "payment callback handled"
            );
            Redirect::to(&outcome.redirect_url).into_response()
        }
        Err(e) => flow_error(e),
    }
}

pub async fn register_transfer_reference(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Json(req): Json<TransferReferenceRequest>,
) -> Response {
    let user = match require_user(user) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state
        .payment_flow
        .register_transfer_reference(req.booking_id, user.user_id, &req.reference)
        .await
    {
        Ok(submitted) => (StatusCode::OK, Json(submitted)).into_response(),
        Err(e) => flow_error(e),
    }
}

pub async fn bank_transfer_page(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Path(booking_id): Path<Uuid>,
) -> Response {
    let user = match require_user(user) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.payment_flow.bank_transfer_page(booking_id, user.user_id).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => flow_error(e),
    }
}

async fn read_submission(mut multipart: Multipart) -> Result<BankTransferSubmission, Response> {
    let mut submission = BankTransferSubmission {
        reference_number: String::new(),
        transfer_date: None,
        receipt: None,
        notes: None,
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => return Err(bad_request(&format!("unreadable form: {}", e))),
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "receipt" => {
                let file_name = field.file_name().unwrap_or("receipt").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(&format!("unreadable receipt: {}", e)))?;
                if !bytes.is_empty() {
                    submission.receipt = Some(ReceiptFile {
                        file_name,
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            "reference_number" | "transfer_date" | "notes" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(&format!("unreadable field {}: {}", name, e)))?;
                match name.as_str() {
                    "reference_number" => submission.reference_number = value,
                    "transfer_date" if !value.trim().is_empty() => {
                        let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                            .map_err(|_| bad_request("transfer_date must be YYYY-MM-DD"))?;
                        submission.transfer_date = Some(date);
                    }
                    "notes" => submission.notes = Some(value),
                    _ => {}
                }
            }
            _ => {}
        }
    }

    Ok(submission)
}

pub async fn submit_bank_transfer(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Path(booking_id): Path<Uuid>,
    multipart: Multipart,
) -> Response {
    let user = match require_user(user) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let submission = match read_submission(multipart).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    match state
        .payment_flow
        .confirm_bank_transfer(booking_id, user.user_id, submission, Utc::now().date_naive())
        .await
    {
        Ok(submitted) => (StatusCode::CREATED, Json(submitted)).into_response(),
        Err(e) => flow_error(e),
    }
}

pub async fn review_bank_transfer(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Response {
    match state
        .payment_flow
        .review_bank_transfer(booking_id, req.into())
        .await
    {
        Ok(status) => (
            StatusCode::OK,
            Json(serde_json::json!({ "booking_id": booking_id, "payment_status": status })),
        )
            .into_response(),
        Err(e) => flow_error(e),
    }
}
