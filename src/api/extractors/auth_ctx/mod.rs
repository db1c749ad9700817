/*!
 * Authentication context extractor
 *
 * Responsibility:
 * - Hand the verified caller identity (AuthCtx) to the authorization gate and handlers
 * - axum-specific code lives in core, the type itself in types
 *
 * Public API:
 * - AuthCtx
 * - AuthCtxExtractor
 */

mod core;
mod types;

pub use self::core::AuthCtxExtractor;
pub use types::AuthCtx;
