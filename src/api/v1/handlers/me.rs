/*
 * Responsibility
 * - GET /api/v1/me: 検証済み claims をそのまま返す
 */
use axum::Json;
use bearer_jwt::{Claims, MapClaims};
use serde_json::{Value, json};

pub async fn me(Claims(claims): Claims<MapClaims>) -> Json<Value> {
    Json(json!({ "claims": claims }))
}
