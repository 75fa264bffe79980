//! Response hardening shared by every route

mod headers;

pub use headers::security_headers_middleware;
