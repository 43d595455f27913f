use axum::async_trait;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use axum::Form;
use std::collections::HashMap;

use super::error::ApiError;

pub const QUERY_FIELD: &str = "query";

/// The `query` field of a submitted form, read from either an urlencoded or a
/// multipart body. Any other body is treated as a form without fields.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryForm {
    pub query: Option<String>,
}

impl QueryForm {
    /// The query text. Only an absent field is an error; an empty value is passed on.
    pub fn into_query(self) -> Result<String, ApiError> {
        self.query.ok_or(ApiError::MissingQuery)
    }
}

#[async_trait]
impl<S> FromRequest<S> for QueryForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::InvalidForm(e.body_text()))?;
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| ApiError::InvalidForm(e.body_text()))?
            {
                if field.name() == Some(QUERY_FIELD) {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| ApiError::InvalidForm(e.body_text()))?;
                    return Ok(Self { query: Some(value) });
                }
            }
            Ok(Self { query: None })
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(mut fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::InvalidForm(e.body_text()))?;
            Ok(Self { query: fields.remove(QUERY_FIELD) })
        } else {
            Ok(Self { query: None })
        }
    }
}
