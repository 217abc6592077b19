/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - Bearer が必要な範囲を route_layer で適用する
 */
use axum::{Router, routing::get};
use bearer_jwt::{JwtAuth, MapClaims, middleware::auth};

use crate::api::v1::handlers::me::me;

pub fn routes(jwt: JwtAuth<MapClaims>) -> Router {
    auth::apply(Router::new().route("/me", get(me)), jwt)
}
