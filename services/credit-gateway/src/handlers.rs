use crate::errors::GatewayError;
use crate::models::{CheckStatus, CreateInvoiceRequest, StartRequest};
use crate::services::CommandService;
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "credit-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Register a user (`/start`)
pub async fn start(
    service: web::Data<Arc<CommandService>>,
    request: web::Json<StartRequest>,
) -> Result<HttpResponse, GatewayError> {
    let response = service.start(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Balance endpoint (`/balance`)
pub async fn get_balance(
    service: web::Data<Arc<CommandService>>,
    user_id: web::Path<i64>,
) -> Result<HttpResponse, GatewayError> {
    let response = service.balance(user_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Referral link and counters (`/ref`)
pub async fn get_referrals(
    service: web::Data<Arc<CommandService>>,
    user_id: web::Path<i64>,
) -> Result<HttpResponse, GatewayError> {
    let response = service.referral_stats(user_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Balance journal
pub async fn get_transactions(
    service: web::Data<Arc<CommandService>>,
    user_id: web::Path<i64>,
) -> Result<HttpResponse, GatewayError> {
    let response = service.history(user_id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// Create a top-up invoice (`/pay`)
pub async fn create_invoice(
    service: web::Data<Arc<CommandService>>,
    request: web::Json<CreateInvoiceRequest>,
) -> Result<HttpResponse, GatewayError> {
    let response = service.create_invoice(request.user_id).await?;
    Ok(HttpResponse::Created().json(response))
}

/// Check an invoice and settle it when paid
///
/// 202 while no payment is visible, 200 once settled.
pub async fn check_invoice(
    service: web::Data<Arc<CommandService>>,
    code: web::Path<String>,
) -> Result<HttpResponse, GatewayError> {
    let response = service.check_invoice(&code).await?;
    match response.status {
        CheckStatus::Pending => Ok(HttpResponse::Accepted().json(response)),
        CheckStatus::Settled | CheckStatus::AlreadySettled => Ok(HttpResponse::Ok().json(response)),
    }
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint(service: web::Data<Arc<CommandService>>) -> HttpResponse {
    match service.metrics_text() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => HttpResponse::InternalServerError().json(json!({
            "error": "Failed to gather metrics",
            "details": e.to_string()
        })),
    }
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/users", web::post().to(start))
            .route("/users/{user_id}/balance", web::get().to(get_balance))
            .route("/users/{user_id}/referrals", web::get().to(get_referrals))
            .route("/users/{user_id}/transactions", web::get().to(get_transactions))
            .route("/invoices", web::post().to(create_invoice))
            .route("/invoices/{code}/check", web::post().to(check_invoice)),
    )
    .route("/metrics", web::get().to(metrics_endpoint))
    .route("/health", web::get().to(health_check));
}
