use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, State};
use axum::http::{header, HeaderName, Request};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use facematch_core::Subject;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::engine::EngineHandle;
use crate::error::ApiError;
use crate::resolver::{ImageResolver, ImageSource};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared, immutable state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    engine: EngineHandle,
    resolver: Arc<ImageResolver>,
}

impl AppState {
    pub fn new(engine: EngineHandle, resolver: ImageResolver) -> Self {
        Self {
            engine,
            resolver: Arc::new(resolver),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    #[serde(rename = "match")]
    pub matched: bool,
}

/// Fields of the compare form. Unknown fields are skipped.
///
/// Accepts `multipart/form-data` and `application/x-www-form-urlencoded` bodies. Any
/// other body, including none at all, reads as an empty form so the missing-image
/// checks report what is absent.
#[derive(Debug, Default)]
struct CompareForm {
    cnic_image: Option<Bytes>,
    profile_image: Option<Bytes>,
    cnic_image_url: Option<String>,
    profile_image_url: Option<String>,
}

/// A urlencoded body can only carry the URL fields.
#[derive(Debug, Deserialize)]
struct UrlForm {
    cnic_image_url: Option<String>,
    profile_image_url: Option<String>,
}

#[axum::async_trait]
impl<S> FromRequest<S> for CompareForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state).await?;
            CompareForm::read(multipart).await
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(urls) = Form::<UrlForm>::from_request(req, state).await?;
            Ok(CompareForm {
                cnic_image_url: urls.cnic_image_url,
                profile_image_url: urls.profile_image_url,
                ..CompareForm::default()
            })
        } else {
            tracing::debug!(content_type = %content_type, "no form body, treating every field as absent");
            Ok(CompareForm::default())
        }
    }
}

impl CompareForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = CompareForm::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            match name.as_str() {
                "cnic_image" => form.cnic_image = Some(field.bytes().await?),
                "profile_image" => form.profile_image = Some(field.bytes().await?),
                "cnic_image_url" => form.cnic_image_url = Some(field.text().await?),
                "profile_image_url" => form.profile_image_url = Some(field.text().await?),
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }
        Ok(form)
    }
}

/// Build the service router: routes, CORS, request ids and tracing.
pub fn router(state: AppState, max_request_bytes: usize) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/testing/", get(testing))
        .route("/testing", get(testing))
        .route("/compare-faces/", post(compare_faces))
        .route("/compare-faces", post(compare_faces))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .with_state(state)
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            let id = req
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!("http", method = %req.method(), uri = %req.uri(), request_id = %id)
        }))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        // mirrors the request origin so credentials stay allowed
        .layer(CorsLayer::very_permissive())
}

async fn testing() -> Json<Value> {
    Json(json!({ "message": "Testing" }))
}

async fn compare_faces(
    State(state): State<AppState>,
    form: CompareForm,
) -> Result<Json<CompareResponse>, ApiError> {
    let cnic = state
        .resolver
        .resolve(Subject::Cnic, ImageSource::select(form.cnic_image, form.cnic_image_url))
        .await?;
    let profile = state
        .resolver
        .resolve(Subject::Profile, ImageSource::select(form.profile_image, form.profile_image_url))
        .await?;

    let matched = state.engine.compare(cnic, profile).await?;
    tracing::info!(matched, "faces compared");

    Ok(Json(CompareResponse { matched }))
}

async fn fallback() -> ApiError {
    ApiError::NotFound
}
