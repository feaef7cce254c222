//! Calls actions on a remote OneBot HTTP endpoint.

use reqwest::{Client, ClientBuilder, Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

use onebot_core::{ActionRawResponse, HttpClientConfig, Params};

use crate::error::{ClientError, ClientResult};

/// Bytes of a non-2xx body kept in [`ClientError::Status`].
const MAX_ERROR_BODY: usize = 1024;

/// HTTP client for OneBot actions.
///
/// The action name is appended to the base URL as the last path segment.
#[derive(Debug, Clone)]
pub struct HttpActionClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpActionClient {
    pub fn new(config: HttpClientConfig) -> ClientResult<Self> {
        let base_url = config.base_url.trim();
        if base_url.is_empty() {
            return Err(ClientError::InvalidConfig("base url is empty".into()));
        }

        let client = ClientBuilder::new().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POSTs `params` as JSON and returns the successful response.
    pub async fn call(&self, action: &str, params: &Params) -> ClientResult<ActionRawResponse> {
        self.call_with(Method::POST, action, params).await
    }

    /// Calls `action` with GET (params in the query) or POST (JSON body).
    pub async fn call_with(
        &self,
        method: Method,
        action: &str,
        params: &Params,
    ) -> ClientResult<ActionRawResponse> {
        let mut url = self.target_url(action)?;

        let mut request = if method == Method::GET {
            if !params.is_empty() {
                url.query_pairs_mut().extend_pairs(query_pairs(params));
            }
            self.client.get(url)
        } else if method == Method::POST {
            self.client.post(url).json(params)
        } else {
            return Err(ClientError::InvalidConfig(format!(
                "unsupported http method: {method}"
            )));
        };

        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        trace!(action, %method, "Calling remote action");
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let body = &body[..body.len().min(MAX_ERROR_BODY)];
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(body).trim().to_string(),
            });
        }

        let raw: ActionRawResponse = serde_json::from_slice(&response.bytes().await?)?;
        if !raw.is_ok() || raw.retcode() != 0 {
            debug!(action, retcode = raw.retcode(), "Remote action failed");
            return Err(ClientError::Action {
                action: action.to_string(),
                status: raw.status(),
                retcode: raw.retcode(),
                message: raw.message().to_string(),
            });
        }
        Ok(raw)
    }

    /// Serializes `params`, calls `action` and decodes `data` into `T`.
    pub async fn call_typed<P, T>(&self, action: &str, params: &P) -> ClientResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let params = match serde_json::to_value(params)? {
            Value::Object(map) => map,
            Value::Null => Params::new(),
            other => {
                return Err(ClientError::InvalidConfig(format!(
                    "action params must be an object, got {other}"
                )));
            }
        };
        let response = self.call(action, &params).await?;
        Ok(response.decode_data()?)
    }

    fn target_url(&self, action: &str) -> ClientResult<Url> {
        let action = action.trim_start_matches('/');
        let target = if action.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, action)
        };

        let url = Url::parse(&target)
            .map_err(|e| ClientError::InvalidConfig(format!("build url {target}: {e}")))?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ClientError::InvalidConfig(format!(
                "build url {target}: missing scheme or host"
            )));
        }
        Ok(url)
    }
}

/// Flattens params into query pairs. Arrays become repeated keys.
fn query_pairs(params: &Params) -> Vec<(&str, String)> {
    let mut pairs = Vec::with_capacity(params.len());
    for (key, value) in params {
        match value {
            Value::Array(values) => {
                pairs.extend(values.iter().map(|v| (key.as_str(), scalar_to_string(v))));
            }
            v => pairs.push((key.as_str(), scalar_to_string(v))),
        }
    }
    pairs
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty_base_url() {
        let err = HttpActionClient::new(HttpClientConfig::new("  ")).unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn test_target_url() {
        let client = HttpActionClient::new(HttpClientConfig::new("http://127.0.0.1:5700/")).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:5700");
        assert_eq!(
            client.target_url("/send_msg").unwrap().as_str(),
            "http://127.0.0.1:5700/send_msg"
        );

        let client = HttpActionClient::new(HttpClientConfig::new("localhost")).unwrap();
        assert!(matches!(
            client.target_url("send_msg"),
            Err(ClientError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_query_pairs() {
        let params = serde_json::json!({"group_id": 1, "tags": ["a", "b"], "name": "x y"});
        let params = params.as_object().unwrap();
        let mut pairs = query_pairs(params);
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("group_id", "1".to_string()),
                ("name", "x y".to_string()),
                ("tags", "a".to_string()),
                ("tags", "b".to_string()),
            ]
        );
    }

    #[test]
    fn test_scalar_to_string() {
        assert_eq!(scalar_to_string(&Value::String("a b".into())), "a b");
        assert_eq!(scalar_to_string(&serde_json::json!(42)), "42");
        assert_eq!(scalar_to_string(&serde_json::json!(true)), "true");
    }
}
