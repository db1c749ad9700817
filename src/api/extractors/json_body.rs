/*
 * Responsibility
 * - Lenient JSON body extractor for the user write routes
 * - A body that is absent, not JSON, or the wrong shape reads as `T::default()`,
 *   so the DTO's validate() answers with its own 400 instead of axum's 415/422
 * - Body read failures (size limit) keep axum's rejection
 */
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;

pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = JsonRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection @ JsonRejection::BytesRejection(_)) => Err(rejection),
            Err(rejection) => {
                tracing::debug!(reason = %rejection.body_text(), "unreadable JSON body treated as empty");
                Ok(JsonBody(T::default()))
            }
        }
    }
}
