use crate::error::ApiError;
use axum::{
    Form,
    extract::{FromRequest, Multipart, Query, Request},
    http::header,
};
use std::collections::HashMap;

/// Text fields of a submission, read from either a urlencoded or a multipart
/// body. Query parameters fill in names the body does not set.
///
/// File parts are drained and dropped; uploads are handled downstream.
pub struct SubmissionForm(pub HashMap<String, String>);

impl<S> FromRequest<S> for SubmissionForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let query = Query::<HashMap<String, String>>::try_from_uri(req.uri())
            .map(|Query(query)| query)
            .unwrap_or_default();

        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let mut fields = if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::MalformedBody(e.body_text()))?;
            read_multipart(multipart).await?
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| ApiError::MalformedBody(e.body_text()))?;
            fields
        } else {
            return Err(ApiError::UnsupportedBody(content_type));
        };

        for (name, value) in query {
            fields.entry(name).or_insert(value);
        }
        Ok(SubmissionForm(fields))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<HashMap<String, String>, ApiError> {
    let mut fields = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::MalformedBody(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if field.file_name().is_some() {
            field
                .bytes()
                .await
                .map_err(|e| ApiError::MalformedBody(e.body_text()))?;
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::MalformedBody(e.body_text()))?;
        // First value wins for repeated names
        fields.entry(name).or_insert(value);
    }

    Ok(fields)
}
