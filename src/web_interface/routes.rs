use bytes::Bytes;
use log::{debug, error};
use std::sync::Arc;
use warp::reject::{LengthRequired, PayloadTooLarge};
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::types::{ApiError, ServiceInfoResponse, ValidationErrorResponse};
use crate::error_handling::types::ServiceError;
use crate::service_management::control::ServiceControl;
use crate::service_management::types::ServiceRequest;

/// Upper bound for a POST /services body
const MAX_BODY_BYTES: u64 = 64 * 1024;

fn with_control(
    control: Arc<ServiceControl>,
) -> impl Filter<Extract = (Arc<ServiceControl>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || control.clone())
}

fn json_error(message: &str, status: StatusCode) -> reply::Response {
    reply::with_status(reply::json(&ApiError::new(message)), status).into_response()
}

/// Maps a control-surface error onto its HTTP status and body.
pub fn error_response(err: ServiceError) -> reply::Response {
    match err {
        ServiceError::Validation(errors) => reply::with_status(
            reply::json(&ValidationErrorResponse {
                message: "validation_error".to_string(),
                errors,
            }),
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .into_response(),
        ServiceError::InvalidOptions(message) | ServiceError::InvalidLocation(message) => {
            json_error(&message, StatusCode::BAD_REQUEST)
        }
        ServiceError::Conflict => json_error(&err.to_string(), StatusCode::CONFLICT),
        ServiceError::NotFound => json_error(&err.to_string(), StatusCode::NOT_FOUND),
        ServiceError::Internal(message) => {
            error!("Internal service error: {}", message);
            json_error(&message, StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Answers a missing or oversized body like any other malformed body.
async fn recover_body_rejection(err: Rejection) -> Result<reply::Response, Rejection> {
    if err.find::<LengthRequired>().is_some() || err.find::<PayloadTooLarge>().is_some() {
        debug!("Rejected start request body: {:?}", err);
        return Ok(json_error("Malformed request body", StatusCode::BAD_REQUEST));
    }
    Err(err)
}

/// GET /services
pub fn list_services_route(
    control: Arc<ServiceControl>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("services")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_control(control))
        .and_then(|control: Arc<ServiceControl>| async move {
            let mut services: Vec<ServiceInfoResponse> = control
                .list()
                .iter()
                .map(|(id, instance)| ServiceInfoResponse::new(id, instance))
                .collect();
            services.sort_by(|a, b| a.id.cmp(&b.id));
            Ok::<_, Rejection>(reply::with_status(reply::json(&services), StatusCode::OK))
        })
}

/// GET /services/:id
pub fn get_service_route(
    control: Arc<ServiceControl>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("services" / String)
        .and(warp::get())
        .and(with_control(control))
        .and_then(|id: String, control: Arc<ServiceControl>| async move {
            let res = match control.get(&id) {
                Ok(instance) => reply::with_status(
                    reply::json(&ServiceInfoResponse::new(&id, &instance)),
                    StatusCode::OK,
                )
                .into_response(),
                Err(e) => error_response(e),
            };
            Ok::<_, Rejection>(res)
        })
}

/// POST /services
pub fn start_service_route(
    control: Arc<ServiceControl>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("services")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_control(control))
        .and_then(|body: Bytes, control: Arc<ServiceControl>| async move {
            let request: ServiceRequest = match serde_json::from_slice(&body) {
                Ok(r) => r,
                Err(e) => {
                    debug!("Malformed start request: {}", e);
                    return Ok::<_, Rejection>(json_error(
                        "Malformed request body",
                        StatusCode::BAD_REQUEST,
                    ));
                }
            };

            let res = match control.start(request).await {
                Ok((id, instance)) => reply::with_status(
                    reply::json(&ServiceInfoResponse::new(&id, &instance)),
                    StatusCode::CREATED,
                )
                .into_response(),
                Err(e) => error_response(e),
            };
            Ok::<_, Rejection>(res)
        })
        .recover(recover_body_rejection)
}

/// DELETE /services/:id
pub fn stop_service_route(
    control: Arc<ServiceControl>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("services" / String)
        .and(warp::delete())
        .and(with_control(control))
        .and_then(|id: String, control: Arc<ServiceControl>| async move {
            let res = match control.stop(&id).await {
                Ok(()) => StatusCode::ACCEPTED.into_response(),
                Err(e) => error_response(e),
            };
            Ok::<_, Rejection>(res)
        })
}
