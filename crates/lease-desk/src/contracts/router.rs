use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use super::audit::SigningContext;
use super::delivery::{DeliveryChannel, MessageOutbox};
use super::error::ContractError;
use super::lifecycle::{ContractId, TenantContact};
use super::repository::{AuditRecordView, ContractRepository, RepositoryError};
use super::service::{ContractService, ContractServiceError, UploadDetails};
use super::report::PortfolioReport;
use super::signature::{
    SignatureCapture, StrokePoint, DEFAULT_CANVAS, MAX_CANVAS, MAX_STROKE_POINTS,
};
use super::template::LeaseTerms;

/// Router builder exposing the contract lifecycle over HTTP.
pub fn contract_router<R, O>(service: Arc<ContractService<R, O>>) -> Router
where
    R: ContractRepository + 'static,
    O: MessageOutbox + 'static,
{
    // Oversized uploads must reach validation to be reported as such.
    let upload_limit = service.settings().max_upload_bytes.saturating_mul(2);

    Router::new()
        .route(
            "/api/v1/contracts",
            post(create_handler::<R, O>).get(list_handler::<R, O>),
        )
        .route(
            "/api/v1/contracts/upload",
            post(upload_handler::<R, O>).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/v1/contracts/:contract_id", get(get_handler::<R, O>))
        .route(
            "/api/v1/contracts/:contract_id/pages",
            post(add_page_handler::<R, O>),
        )
        .route(
            "/api/v1/contracts/:contract_id/pages/:index",
            put(update_page_handler::<R, O>).delete(remove_page_handler::<R, O>),
        )
        .route(
            "/api/v1/contracts/:contract_id/send",
            post(send_handler::<R, O>),
        )
        .route(
            "/api/v1/contracts/:contract_id/view",
            post(view_handler::<R, O>),
        )
        .route(
            "/api/v1/contracts/:contract_id/sign",
            post(sign_handler::<R, O>),
        )
        .with_state(service)
}

/// HTTP status for a service failure.
pub fn status_for(error: &ContractServiceError) -> StatusCode {
    match error {
        ContractServiceError::Contract(ContractError::Validation(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ContractServiceError::Contract(ContractError::IndexOutOfRange { .. }) => {
            StatusCode::NOT_FOUND
        }
        ContractServiceError::Contract(ContractError::StateTransitionRejected(_)) => {
            StatusCode::CONFLICT
        }
        ContractServiceError::Contract(ContractError::SignatureFailed(_)) => {
            StatusCode::BAD_GATEWAY
        }
        ContractServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ContractServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ContractServiceError::Repository(RepositoryError::Unavailable(_))
        | ContractServiceError::Delivery(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: ContractServiceError) -> Response {
    let payload = json!({
        "error": error.to_string(),
    });
    (status_for(&error), Json(payload)).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TodayQuery {
    #[serde(default)]
    today: Option<NaiveDate>,
}

impl TodayQuery {
    fn resolve(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadQuery {
    file_name: String,
    property: String,
    #[serde(default)]
    owner_name: Option<String>,
    #[serde(default)]
    tenant_name: Option<String>,
    #[serde(default)]
    tenant_phone: Option<String>,
    #[serde(default)]
    tenant_email: Option<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    value: Option<u32>,
}

impl UploadQuery {
    fn into_details(self) -> UploadDetails {
        let tenant = self.tenant_name.map(|name| TenantContact {
            name,
            phone: self.tenant_phone,
            email: self.tenant_email,
        });
        UploadDetails {
            owner_name: self.owner_name.unwrap_or_default(),
            property: self.property,
            tenant,
            start_date: self.start_date,
            end_date: self.end_date,
            value: self.value.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageEdit {
    content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendPayload {
    channel: DeliveryChannel,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignPayload {
    signer_identifier: String,
    #[serde(default)]
    strokes: Option<Vec<Vec<StrokePoint>>>,
    #[serde(default)]
    canvas_width: Option<u32>,
    #[serde(default)]
    canvas_height: Option<u32>,
    #[serde(default)]
    signer_ip: Option<String>,
    #[serde(default)]
    user_agent: Option<String>,
}

impl SignPayload {
    /// Oversized pads are refused rather than rasterized.
    fn capture(&self) -> Result<Option<SignatureCapture>, String> {
        let Some(strokes) = self.strokes.as_ref() else {
            return Ok(None);
        };
        let width = self.canvas_width.unwrap_or(DEFAULT_CANVAS.0);
        let height = self.canvas_height.unwrap_or(DEFAULT_CANVAS.1);
        if width > MAX_CANVAS.0 || height > MAX_CANVAS.1 {
            return Err(format!(
                "signature canvas {width}x{height} exceeds {}x{}",
                MAX_CANVAS.0, MAX_CANVAS.1
            ));
        }
        let points: usize = strokes.iter().map(Vec::len).sum();
        if points > MAX_STROKE_POINTS {
            return Err(format!(
                "signature has {points} points, more than {MAX_STROKE_POINTS}"
            ));
        }
        Ok(Some(SignatureCapture::from_strokes(width, height, strokes)))
    }

    /// Body fields win over request headers.
    fn context(&self, headers: &HeaderMap) -> SigningContext {
        let forwarded_for = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(|hop| hop.trim().to_string());
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        SigningContext {
            signer_ip: self.signer_ip.clone().or(forwarded_for),
            user_agent: self.user_agent.clone().or(user_agent),
        }
    }
}

pub(crate) async fn create_handler<R, O>(
    State(service): State<Arc<ContractService<R, O>>>,
    Json(terms): Json<LeaseTerms>,
) -> Response
where
    R: ContractRepository + 'static,
    O: MessageOutbox + 'static,
{
    match service.create_from_terms(terms) {
        Ok(record) => {
            let view = record.view(
                Utc::now().date_naive(),
                service.settings().expiring_window_days,
            );
            (StatusCode::CREATED, Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn upload_handler<R, O>(
    State(service): State<Arc<ContractService<R, O>>>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    R: ContractRepository + 'static,
    O: MessageOutbox + 'static,
{
    let declared_mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let file_name = query.file_name.clone();

    match service.create_from_upload(
        &file_name,
        &declared_mime,
        body.to_vec(),
        query.into_details(),
    ) {
        Ok(record) => {
            let view = record.view(
                Utc::now().date_naive(),
                service.settings().expiring_window_days,
            );
            (StatusCode::CREATED, Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<R, O>(
    State(service): State<Arc<ContractService<R, O>>>,
    Query(query): Query<TodayQuery>,
) -> Response
where
    R: ContractRepository + 'static,
    O: MessageOutbox + 'static,
{
    let today = query.resolve();
    let window = service.settings().expiring_window_days;
    let records = match service.list() {
        Ok(records) => records,
        Err(error) => return error_response(error),
    };
    let report = PortfolioReport::build(
        records.iter().map(|record| &record.contract),
        today,
        window,
    );

    let contracts: Vec<_> = records
        .iter()
        .map(|record| record.view(today, window))
        .collect();
    let payload = json!({
        "as_of": today,
        "contracts": contracts,
        "counts": report.counts(),
        "expiring": report.expiring(),
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn get_handler<R, O>(
    State(service): State<Arc<ContractService<R, O>>>,
    Path(contract_id): Path<String>,
    Query(query): Query<TodayQuery>,
) -> Response
where
    R: ContractRepository + 'static,
    O: MessageOutbox + 'static,
{
    match service.get(&ContractId(contract_id)) {
        Ok(record) => {
            let view = record.view(query.resolve(), service.settings().expiring_window_days);
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn add_page_handler<R, O>(
    State(service): State<Arc<ContractService<R, O>>>,
    Path(contract_id): Path<String>,
) -> Response
where
    R: ContractRepository + 'static,
    O: MessageOutbox + 'static,
{
    match service.add_page(&ContractId(contract_id)).await {
        Ok(record) => pages_response(&record.document),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn update_page_handler<R, O>(
    State(service): State<Arc<ContractService<R, O>>>,
    Path((contract_id, index)): Path<(String, usize)>,
    Json(edit): Json<PageEdit>,
) -> Response
where
    R: ContractRepository + 'static,
    O: MessageOutbox + 'static,
{
    match service
        .update_page(&ContractId(contract_id), index, edit.content)
        .await
    {
        Ok(record) => pages_response(&record.document),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn remove_page_handler<R, O>(
    State(service): State<Arc<ContractService<R, O>>>,
    Path((contract_id, index)): Path<(String, usize)>,
) -> Response
where
    R: ContractRepository + 'static,
    O: MessageOutbox + 'static,
{
    match service.remove_page(&ContractId(contract_id), index).await {
        Ok(record) => pages_response(&record.document),
        Err(error) => error_response(error),
    }
}

fn pages_response(document: &super::document::ContractDocument) -> Response {
    let pages: Vec<_> = document
        .pages()
        .enumerate()
        .map(|(index, page)| {
            json!({
                "index": index,
                "page_id": page.id.value(),
                "content": page.content,
                "signed": document.overlay_for(index).is_some(),
            })
        })
        .collect();
    let payload = json!({
        "page_count": document.page_count(),
        "pages": pages,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn send_handler<R, O>(
    State(service): State<Arc<ContractService<R, O>>>,
    Path(contract_id): Path<String>,
    Json(payload): Json<SendPayload>,
) -> Response
where
    R: ContractRepository + 'static,
    O: MessageOutbox + 'static,
{
    match service
        .send(&ContractId(contract_id), payload.channel, Utc::now())
        .await
    {
        Ok(message) => (StatusCode::ACCEPTED, Json(message)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn view_handler<R, O>(
    State(service): State<Arc<ContractService<R, O>>>,
    Path(contract_id): Path<String>,
) -> Response
where
    R: ContractRepository + 'static,
    O: MessageOutbox + 'static,
{
    match service
        .mark_viewed(&ContractId(contract_id), Utc::now())
        .await
    {
        Ok(record) => {
            let view = record.view(
                Utc::now().date_naive(),
                service.settings().expiring_window_days,
            );
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn sign_handler<R, O>(
    State(service): State<Arc<ContractService<R, O>>>,
    Path(contract_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<SignPayload>,
) -> Response
where
    R: ContractRepository + 'static,
    O: MessageOutbox + 'static,
{
    let capture = match payload.capture() {
        Ok(capture) => capture,
        Err(reason) => {
            let payload = json!({ "error": reason });
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
        }
    };
    let context = payload.context(&headers);
    match service
        .sign(
            &ContractId(contract_id),
            &payload.signer_identifier,
            context,
            capture.as_ref(),
        )
        .await
    {
        Ok(record) => (StatusCode::OK, Json(AuditRecordView::from(&record))).into_response(),
        Err(error) => error_response(error),
    }
}
