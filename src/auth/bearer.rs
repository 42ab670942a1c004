//! `Authorization: Bearer <token>` header parsing.

use axum::http::HeaderValue;

const BEARER_SCHEME: &str = "Bearer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerCredential<'a> {
    /// No header, or a header with nothing in it.
    Absent,
    Malformed,
    Present(&'a str),
}

pub fn parse_bearer(header: Option<&HeaderValue>) -> BearerCredential<'_> {
    let Some(header) = header else {
        return BearerCredential::Absent;
    };

    let Ok(value) = header.to_str() else {
        return BearerCredential::Malformed;
    };

    let mut parts = value.split_whitespace();

    let Some(scheme) = parts.next() else {
        return BearerCredential::Absent;
    };

    match (parts.next(), parts.next()) {
        (Some(token), None) if scheme.eq_ignore_ascii_case(BEARER_SCHEME) => {
            BearerCredential::Present(token)
        }
        _ => BearerCredential::Malformed,
    }
}
