use crate::errors::ReconcilerError;
use crate::metrics_defs::REQUESTS;
use crate::reconcile::{ReconcileOutcome, ReconcilePayload, ReconcileStatus, Reconciler};
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Request, Response};
use serde::Serialize;
use shared::counter;
use shared::http::{boxed, make_error_response, make_json_response};
use std::future::Future;
use std::pin::Pin;

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Serialize)]
struct MessageBody {
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    message: &'static str,
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Details {
    groups_success: bool,
    links_success: bool,
    groups_unprocessed: usize,
    links_unprocessed: usize,
}

#[derive(Serialize)]
struct OutcomeBody {
    message: &'static str,
    details: Details,
}

impl From<&ReconcileOutcome> for OutcomeBody {
    fn from(outcome: &ReconcileOutcome) -> Self {
        let groups_success = outcome.groups.succeeded();
        let links_success = outcome.invite_links.succeeded();
        let message = match (groups_success, links_success) {
            (true, true) => "Groups and invite links updated successfully",
            (true, false) => "Groups updated successfully, but invite links update failed",
            (false, true) => "Invite links updated successfully, but groups update failed",
            (false, false) => "Failed to update groups and invite links",
        };
        OutcomeBody {
            message,
            details: Details {
                groups_success,
                links_success,
                groups_unprocessed: outcome.groups.unprocessed_count(),
                links_unprocessed: outcome.invite_links.unprocessed_count(),
            },
        }
    }
}

fn status_code(status: ReconcileStatus) -> StatusCode {
    match status {
        ReconcileStatus::Success => StatusCode::OK,
        ReconcileStatus::Partial => StatusCode::MULTI_STATUS,
        ReconcileStatus::Failure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Accepts batch submissions over HTTP and reports how each stage went.
#[derive(Clone)]
pub struct ReconcileService {
    reconciler: Reconciler,
    api_key: Option<String>,
}

impl ReconcileService {
    pub fn new(reconciler: Reconciler, api_key: Option<String>) -> Self {
        if api_key.is_none() {
            tracing::warn!("no api_key configured, all submissions will be rejected");
        }
        Self {
            reconciler,
            api_key,
        }
    }

    fn is_authorized<B>(&self, request: &Request<B>) -> bool {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok());

        match (provided, self.api_key.as_deref()) {
            (Some(provided), Some(expected)) => !provided.is_empty() && provided == expected,
            _ => false,
        }
    }

    pub async fn handle(&self, request: Request<Bytes>) -> Result<Response<Bytes>, ReconcilerError> {
        let response = self.respond(request).await?;
        counter!(REQUESTS, "status" => response.status().as_str().to_string()).increment(1);
        Ok(response)
    }

    async fn respond(&self, request: Request<Bytes>) -> Result<Response<Bytes>, ReconcilerError> {
        if request.method() != Method::POST {
            return Ok(make_error_response(StatusCode::METHOD_NOT_ALLOWED));
        }

        if !self.is_authorized(&request) {
            tracing::warn!(path = %request.uri().path(), "rejected submission with invalid api key");
            return Ok(make_json_response(
                StatusCode::UNAUTHORIZED,
                &MessageBody {
                    message: "Unauthorized: Invalid or missing API key",
                },
            )?);
        }

        let payload = match ReconcilePayload::from_slice(request.body()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::info!(error = %e, "rejected invalid payload");
                return Ok(make_json_response(
                    StatusCode::BAD_REQUEST,
                    &ErrorBody {
                        message: "Error processing request",
                        error: e.to_string(),
                    },
                )?);
            }
        };

        let outcome = self.reconciler.reconcile(&payload).await;
        let status = outcome.status();
        if status != ReconcileStatus::Success {
            tracing::warn!(status = status.as_str(), "batch not fully applied");
        }

        Ok(make_json_response(
            status_code(status),
            &OutcomeBody::from(&outcome),
        )?)
    }
}

impl Service<Request<Incoming>> for ReconcileService {
    type Response = Response<BoxBody<Bytes, ReconcilerError>>;
    type Error = ReconcilerError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let bytes = body.collect().await?.to_bytes();
            let response = service.handle(Request::from_parts(parts, bytes)).await?;
            Ok(response.map(boxed))
        })
    }
}
