/*
 * Responsibility
 * - middleware entry points (each exposes `apply`)
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod security_headers;
