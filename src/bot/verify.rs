use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::{HeaderMap, StatusCode};
use ring::signature::{ED25519, UnparsedPublicKey};

use crate::bot::server::BotState;

pub const SIGNATURE_HEADER: &str = "X-Signature-Ed25519";
pub const TIMESTAMP_HEADER: &str = "X-Signature-Timestamp";

/// Request body whose signature has already been checked by [`verify_interaction`]
#[derive(Clone)]
pub struct VerifiedBody(pub Bytes);

impl VerifiedBody {
    pub fn as_json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(&self.0)
    }
}

/// Rejects any request not signed with the application's key. Discord probes the endpoint with
/// bad signatures and expects a 401 back.
pub async fn verify_interaction(
    State(state): State<Arc<BotState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let headers = req.headers().clone();
    let body = match extract_body(&mut req).await {
        Ok(bytes) => bytes,
        Err(_) => return Err(StatusCode::BAD_REQUEST),
    };

    if let Err(status) = verify_signature(&state.public_key, &headers, &body) {
        tracing::warn!(%status, "unable to verify interaction signature");
        return Err(status);
    }

    req.extensions_mut().insert(VerifiedBody(body));
    Ok(next.run(req).await)
}

async fn extract_body(request: &mut Request) -> Result<Bytes, axum::Error> {
    let body = std::mem::replace(request.body_mut(), Body::empty());
    axum::body::to_bytes(body, usize::MAX).await
}

fn verify_signature(public_key: &[u8], headers: &HeaderMap, body: &Bytes) -> Result<(), StatusCode> {
    let (signature, timestamp) = get_message_parts(headers)?;
    let signature = hex::decode(signature).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);

    UnparsedPublicKey::new(&ED25519, public_key)
        .verify(&message, &signature)
        .map_err(|_| StatusCode::UNAUTHORIZED)
}

fn get_message_parts(headers: &HeaderMap) -> Result<(&str, &str), StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let timestamp = headers
        .get(TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    Ok((signature, timestamp))
}

impl<S> FromRequest<S> for VerifiedBody
where
    S: Send + Sync,
{
    type Rejection = StatusCode;
    async fn from_request(req: Request, _: &S) -> Result<Self, Self::Rejection> {
        req.extensions()
            .get::<VerifiedBody>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}


#[cfg(test)]
mod test {
    use http::HeaderValue;

    use super::signing::TestSigner;
    use super::*;

    fn headers(signature: &str, timestamp: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(signature).unwrap());
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_str(timestamp).unwrap());
        headers
    }

    #[test]
    fn test_valid_signature() {
        let signer = TestSigner::generate();
        let body = Bytes::from_static(br#"{"type":1}"#);
        let signature = signer.sign("1717243200", &body);

        assert!(verify_signature(&signer.public_key(), &headers(&signature, "1717243200"), &body).is_ok());
    }

    #[test]
    fn test_rejections() {
        let signer = TestSigner::generate();
        let other = TestSigner::generate();
        let body = Bytes::from_static(br#"{"type":1}"#);
        let signature = signer.sign("1717243200", &body);

        // timestamp is part of the signed message
        assert_eq!(
            verify_signature(&signer.public_key(), &headers(&signature, "1717243201"), &body),
            Err(StatusCode::UNAUTHORIZED)
        );
        // tampered body
        assert_eq!(
            verify_signature(
                &signer.public_key(),
                &headers(&signature, "1717243200"),
                &Bytes::from_static(br#"{"type":2}"#)
            ),
            Err(StatusCode::UNAUTHORIZED)
        );
        // wrong key
        assert_eq!(
            verify_signature(&other.public_key(), &headers(&signature, "1717243200"), &body),
            Err(StatusCode::UNAUTHORIZED)
        );
        // not hex
        assert_eq!(
            verify_signature(&signer.public_key(), &headers("zz", "1717243200"), &body),
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            verify_signature(&signer.public_key(), &HeaderMap::new(), &body),
            Err(StatusCode::UNAUTHORIZED)
        );
    }
}
