//! [`RemoteStore`] over the Firebase Realtime Database REST API.
//!
//! Each collection lives at `{base_url}/{path}.json`. Ordered queries use the
//! `orderBy` / `limitToFirst` / `limitToLast` parameters; the server returns an
//! unordered JSON object, so results are re-sorted client-side by the order
//! field with the key as tie-breaker (Firebase's own rule). Keys are generated
//! client-side, as Firebase push ids are.

use async_trait::async_trait;
use reqwest::{Client, Method, Response, Url};
use serde_json::{Map, Value};
use std::time::Duration;

use super::{new_key, order_value, Document, RemoteError, RemoteResult, RemoteStore};
use crate::config::RemoteConfig;

pub struct FirebaseStore {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
}

enum Limit {
    First(usize),
    Last(usize),
}

impl FirebaseStore {
    pub fn new(config: &RemoteConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(
            !config.base_url.is_empty(),
            "remote.base_url must be set for the firebase backend"
        );
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| anyhow::anyhow!("invalid remote.base_url {:?}: {e}", config.base_url))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            auth_token: config.auth_token.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> RemoteResult<Url> {
        let mut relative = segments.join("/");
        relative.push_str(".json");
        let mut url = self
            .base_url
            .join(&relative)
            .map_err(|e| RemoteError::Malformed(format!("bad document path {relative:?}: {e}")))?;
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> RemoteResult<Response> {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn get_json(&self, url: Url) -> RemoteResult<Value> {
        let response = self.send(Method::GET, url, None).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| RemoteError::Malformed(e.to_string()))
    }

    /// `{path}.json?orderBy="field"` plus the optional limit parameter.
    fn query_url(&self, path: &str, order_field: &str, limit: Option<Limit>) -> RemoteResult<Url> {
        let mut url = self.url(&[path])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("orderBy", &format!("\"{order_field}\""));
            match limit {
                Some(Limit::First(n)) => {
                    query.append_pair("limitToFirst", &n.to_string());
                }
                Some(Limit::Last(n)) => {
                    query.append_pair("limitToLast", &n.to_string());
                }
                None => {}
            }
        }
        Ok(url)
    }

    async fn query(
        &self,
        path: &str,
        order_field: &str,
        limit: Option<Limit>,
    ) -> RemoteResult<Vec<Document>> {
        let url = self.query_url(path, order_field, limit)?;
        let value = self.get_json(url).await?;
        Ok(collection_to_documents(value, order_field))
    }
}

/// Turn a Firebase collection snapshot into documents sorted by `order_field`.
///
/// `null` is an empty collection. Children that are not objects are skipped.
fn collection_to_documents(value: Value, order_field: &str) -> Vec<Document> {
    let Value::Object(children) = value else {
        return Vec::new();
    };

    let mut docs: Vec<Document> = children
        .into_iter()
        .filter_map(|(key, child)| match child {
            Value::Object(fields) => Some(Document::new(key, fields)),
            _ => {
                tracing::warn!(key = %key, "skipping non-object child");
                None
            }
        })
        .collect();

    docs.sort_by(|a, b| {
        let ka = a.fields.get(order_field).and_then(order_value);
        let kb = b.fields.get(order_field).and_then(order_value);
        ka.cmp(&kb).then_with(|| a.key.cmp(&b.key))
    });
    docs
}

#[async_trait]
impl RemoteStore for FirebaseStore {
    async fn ordered_last(
        &self,
        path: &str,
        order_field: &str,
        n: usize,
    ) -> RemoteResult<Vec<Document>> {
        self.query(path, order_field, Some(Limit::Last(n))).await
    }

    async fn ordered_first(
        &self,
        path: &str,
        order_field: &str,
        n: usize,
    ) -> RemoteResult<Vec<Document>> {
        self.query(path, order_field, Some(Limit::First(n))).await
    }

    async fn ordered_all(&self, path: &str, order_field: &str) -> RemoteResult<Vec<Document>> {
        self.query(path, order_field, None).await
    }

    async fn count(&self, path: &str) -> RemoteResult<usize> {
        let mut url = self.url(&[path])?;
        url.query_pairs_mut().append_pair("shallow", "true");
        match self.get_json(url).await? {
            Value::Object(children) => Ok(children.len()),
            Value::Null => Ok(0),
            other => Err(RemoteError::Malformed(format!(
                "expected shallow object at {path}, got {other}"
            ))),
        }
    }

    async fn generate_id(&self, _path: &str) -> RemoteResult<String> {
        Ok(new_key())
    }

    async fn write(&self, path: &str, id: &str, value: Map<String, Value>) -> RemoteResult<()> {
        let url = self.url(&[path, id])?;
        self.send(Method::PUT, url, Some(&Value::Object(value)))
            .await?;
        Ok(())
    }

    async fn delete(&self, path: &str, id: &str) -> RemoteResult<()> {
        let url = self.url(&[path, id])?;
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn remove_all(&self, path: &str) -> RemoteResult<()> {
        let url = self.url(&[path])?;
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }
}
