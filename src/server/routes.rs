use actix_web::{HttpResponse, Responder, web};
use tracing::{debug, info};

use crate::domain::ApplicantRecord;
use crate::report::summarize;
use crate::server::AppState;
use crate::server::models::{
    ApiError, BatchRequest, BatchResponse, BatchSummary, HealthResponse, ModelResponse,
};

/// Mount every endpoint under `/api/v1`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health_check))
            .route("/model", web::get().to(model_info))
            .route("/score", web::post().to(score_one))
            .route("/score/batch", web::post().to(score_batch)),
    );
}

async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: !state.scorer.artifact().pipeline.features.is_empty(),
        max_batch: state.max_batch,
        timestamp: chrono::Utc::now(),
    })
}

async fn model_info(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ModelResponse {
        summary: state.scorer.summary(),
        metrics: state.scorer.artifact().metrics.clone(),
    })
}

/// POST /api/v1/score
///
/// ```json
/// { "id": 100002, "features": { "AMT_INCOME_TOTAL": 202500.0, "NAME_CONTRACT_TYPE": "Cash loans" } }
/// ```
async fn score_one(
    state: web::Data<AppState>,
    body: web::Json<ApplicantRecord>,
) -> Result<HttpResponse, ApiError> {
    let score = state.scorer.score(&body)?;
    debug!(id = ?score.id, probability = score.probability, "scored applicant");
    Ok(HttpResponse::Ok().json(score))
}

/// POST /api/v1/score/batch
///
/// ```json
/// { "applicants": [ { "id": 1, "features": { ... } }, ... ] }
/// ```
async fn score_batch(
    state: web::Data<AppState>,
    body: web::Json<BatchRequest>,
) -> Result<HttpResponse, ApiError> {
    let applicants = &body.applicants;
    if applicants.len() > state.max_batch {
        return Err(ApiError::batch_too_large(applicants.len(), state.max_batch));
    }

    let mut scores = Vec::with_capacity(applicants.len());
    for (i, record) in applicants.iter().enumerate() {
        let score = state
            .scorer
            .score(record)
            .map_err(|e| ApiError::invalid_feature(format!("applicant {i}: {e}")))?;
        scores.push(score);
    }

    let totals = summarize(&scores, state.scorer.threshold());
    info!(
        count = totals.count,
        declined = totals.declined,
        "scored batch"
    );
    Ok(HttpResponse::Ok().json(BatchResponse {
        scores,
        summary: BatchSummary {
            count: totals.count,
            declined: totals.declined,
            mean_probability: totals.mean_probability,
        },
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use serde_json::{Value, json};

    use super::*;
    use crate::models::Scorer;
    use crate::models::scorer::tests::artifact;
    use crate::server::json_config;

    async fn send(req: test::TestRequest, max_batch: usize) -> (StatusCode, Value) {
        let state = AppState {
            scorer: Arc::new(Scorer::from_artifact(artifact()).unwrap()),
            max_batch,
        };
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .app_data(json_config())
                .configure(configure_routes),
        )
        .await;
        let resp = test::call_service(&app, req.to_request()).await;
        let status = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }

    #[actix_web::test]
    async fn health_reports_model() {
        let (status, body) = send(test::TestRequest::get().uri("/api/v1/health"), 10).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model_loaded"], true);
        assert_eq!(body["max_batch"], 10);
    }

    #[actix_web::test]
    async fn model_returns_summary_and_metrics() {
        let (status, body) = send(test::TestRequest::get().uri("/api/v1/model"), 10).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["feature_count"], 3);
        assert_eq!(body["threshold"], 0.5);
        assert_eq!(body["metrics"]["n"], 2);
    }

    #[actix_web::test]
    async fn score_returns_probability_and_id() {
        let req = test::TestRequest::post()
            .uri("/api/v1/score")
            .set_json(json!({"id": "A-1", "features": {"AMT": 0.0, "KIND": "b"}}));
        let (status, body) = send(req, 10).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "A-1");
        assert_eq!(body["decision"], "approve");
        assert_eq!(body["grade"], "A");
        let p = body["probability"].as_f64().unwrap();
        assert!((p - crate::math::sigmoid(-4.0)).abs() < 1e-12);
    }

    #[actix_web::test]
    async fn invalid_feature_is_unprocessable() {
        let req = test::TestRequest::post()
            .uri("/api/v1/score")
            .set_json(json!({"features": {"AMT": "lots"}}));
        let (status, body) = send(req, 10).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_feature");
        assert_eq!(body["status_code"], 422);
    }

    #[actix_web::test]
    async fn malformed_json_is_bad_request() {
        let req = test::TestRequest::post()
            .uri("/api/v1/score")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json");
        let (status, body) = send(req, 10).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_json");
    }

    #[actix_web::test]
    async fn batch_scores_and_summarizes() {
        let req = test::TestRequest::post().uri("/api/v1/score/batch").set_json(json!({
            "applicants": [
                {"id": 1, "features": {"AMT": 0.0, "KIND": "b"}},
                {"id": 2, "features": {}}
            ]
        }));
        let (status, body) = send(req, 10).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scores"].as_array().unwrap().len(), 2);
        assert_eq!(body["summary"]["count"], 2);
        // The empty record sits exactly at the threshold.
        assert_eq!(body["summary"]["declined"], 1);
    }

    #[actix_web::test]
    async fn batch_error_names_the_index() {
        let req = test::TestRequest::post().uri("/api/v1/score/batch").set_json(json!({
            "applicants": [{"features": {}}, {"features": {"AMT": "x"}}]
        }));
        let (status, body) = send(req, 10).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["message"].as_str().unwrap().starts_with("applicant 1:"));
    }

    #[actix_web::test]
    async fn oversized_batch_is_rejected() {
        let req = test::TestRequest::post().uri("/api/v1/score/batch").set_json(json!({
            "applicants": [{"features": {}}, {"features": {}}, {"features": {}}]
        }));
        let (status, body) = send(req, 2).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"], "batch_too_large");
    }
}
