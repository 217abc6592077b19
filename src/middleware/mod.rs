/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: bearer JWT 認証 / http: request-id, body limit, timeout, trace
 */
pub mod auth;
pub mod http;
