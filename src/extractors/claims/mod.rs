/*!
 * Authenticated claims extractor
 *
 * Responsibility:
 * - 検証済み claims を handler に提供する (Claims<C>)
 * - string-keyed per-request store (Locals) の store / retrieve
 * - axum 依存は core に閉じ込め、型定義は types に分離する
 *
 * Public API:
 * - Claims, MapClaims, Locals
 * - store, retrieve
 */

mod core;
mod types;

pub use self::core::{retrieve, store};
pub use types::{Claims, Locals, MapClaims};
