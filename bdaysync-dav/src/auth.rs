//! Basic authentication with a Digest retry.
//!
//! Every request goes out with Basic credentials. When the server answers
//! 401 with a `Digest` challenge, the request is answered once more with a
//! Digest `Authorization` header. Any other 401 is returned as is.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use digest_auth::{AuthContext, HttpMethod};
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::{HeaderValue, Request, Response, StatusCode};
use tower::{Layer, Service, ServiceExt};

#[derive(Clone)]
pub struct DavAuthLayer {
    username: String,
    password: String,
}

impl DavAuthLayer {
    pub fn new(username: &str, password: &str) -> Self {
        DavAuthLayer {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

impl<S> Layer<S> for DavAuthLayer {
    type Service = DavAuth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DavAuth {
            inner,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Clone)]
pub struct DavAuth<S> {
    inner: S,
    username: String,
    password: String,
}

impl<S> DavAuth<S> {
    fn basic(&self) -> Option<HeaderValue> {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        HeaderValue::from_str(&format!("Basic {token}")).ok()
    }
}

/// The `Authorization` value answering a Digest `challenge` for `request`.
///
/// None when the challenge is not Digest or cannot be parsed.
pub fn digest_answer<B>(challenge: &str, request: &Request<B>, username: &str, password: &str) -> Option<HeaderValue> {
    if !challenge.trim_start().to_ascii_lowercase().starts_with("digest") {
        return None;
    }

    let uri = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_string(), |pq| pq.as_str().to_string());
    let context = AuthContext::new_with_method(
        username,
        password,
        uri,
        None::<&[u8]>,
        HttpMethod::from(request.method().as_str()),
    );

    let mut prompt = digest_auth::parse(challenge).ok()?;
    let answer = prompt.respond(&context).ok()?;
    HeaderValue::from_str(&answer.to_string()).ok()
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for DavAuth<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Clone + Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        if let Some(basic) = self.basic() {
            request.headers_mut().insert(AUTHORIZATION, basic);
        }
        let retry = request.clone();

        // Keep the service that was polled ready; later calls use the clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let username = self.username.clone();
        let password = self.password.clone();

        Box::pin(async move {
            let response = inner.call(request).await?;
            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            let answer = response
                .headers()
                .get_all(WWW_AUTHENTICATE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .find_map(|challenge| digest_answer(challenge, &retry, &username, &password));
            let Some(answer) = answer else {
                return Ok(response);
            };

            tracing::debug!(uri = %retry.uri(), "retrying with digest authentication");
            let mut retry = retry;
            retry.headers_mut().insert(AUTHORIZATION, answer);
            inner.ready().await?.call(retry).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHALLENGE: &str = r#"Digest realm="Baikal", qop="auth", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#;

    fn propfind(uri: &str) -> Request<String> {
        Request::builder()
            .method("PROPFIND")
            .uri(uri)
            .body(String::new())
            .unwrap()
    }

    #[test]
    fn test_digest_answer() {
        let answer = digest_answer(CHALLENGE, &propfind("https://dav.example.com/dav/"), "ada", "secret").unwrap();
        let answer = answer.to_str().unwrap();

        assert!(answer.starts_with("Digest "));
        assert!(answer.contains(r#"username="ada""#));
        assert!(answer.contains(r#"uri="/dav/""#));
        assert!(answer.contains(r#"realm="Baikal""#));
        assert!(!answer.contains("secret"));
    }

    #[test]
    fn test_basic_challenge_gets_no_answer() {
        let request = propfind("/dav/");
        assert!(digest_answer(r#"Basic realm="x""#, &request, "ada", "secret").is_none());
    }
}
