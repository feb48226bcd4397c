// Copyright 2024 SAP SE
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#[cfg(test)]
use std::collections::HashMap;
use std::future::Future;
#[cfg(test)]
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::Deserialize;
use url::Url;

use crate::projects::Project;

pub const DOCKER_HUB_API: &str = "https://hub.docker.com";

#[derive(Debug)]
pub struct RealClient {
    http: reqwest::Client,
    api_endpoint: Url,
}

pub trait Client {
    fn new(api_endpoint: &str) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Returns the number of pulls Docker Hub reports for the given image.
    fn pull_count(&self, project: &Project) -> impl Future<Output = anyhow::Result<u64>> + Send;
}

#[derive(Debug, Deserialize)]
struct RepositoryInfo {
    pull_count: u64,
}

impl Client for RealClient {
    fn new(api_endpoint: &str) -> anyhow::Result<Self> {
        let api_endpoint =
            Url::parse(api_endpoint).with_context(|| format!("failed to parse api endpoint {api_endpoint}"))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")?;
        Ok(Self { http, api_endpoint })
    }

    async fn pull_count(&self, project: &Project) -> anyhow::Result<u64> {
        let url = repository_url(&self.api_endpoint, project)?;
        let info: RepositoryInfo = self
            .http
            .get(url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .with_context(|| format!("failed to fetch Docker Hub data for {project}"))?
            .json()
            .await
            .with_context(|| format!("cannot decode Docker Hub response for {project} from {url}"))?;
        Ok(info.pull_count)
    }
}

fn repository_url(api_endpoint: &Url, project: &Project) -> anyhow::Result<Url> {
    let mut url = api_endpoint.clone();
    url.path_segments_mut()
        .map_err(|()| anyhow!("api endpoint {api_endpoint} cannot be a base"))?
        .pop_if_empty()
        .extend(["v2", "repositories", project.username.as_str(), project.repository.as_str(), ""]);
    Ok(url)
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockClient {
    pub pull_counts: Mutex<HashMap<String, u64>>,
    pub requests: Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockClient {
    pub fn with_pull_counts(pull_counts: &[(&str, u64)]) -> Self {
        let client = Self::default();
        client
            .pull_counts
            .lock()
            .unwrap()
            .extend(pull_counts.iter().map(|(name, count)| ((*name).to_string(), *count)));
        client
    }
}

#[cfg(test)]
impl Client for MockClient {
    fn new(_api_endpoint: &str) -> anyhow::Result<Self> {
        Ok(Self::default())
    }

    async fn pull_count(&self, project: &Project) -> anyhow::Result<u64> {
        let name = project.to_string();
        self.requests.lock().unwrap().push(name.clone());
        self.pull_counts
            .lock()
            .unwrap()
            .get(&name)
            .copied()
            .ok_or_else(|| anyhow!("MockClient pull_counts contains no {name}"))
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use crate::api_clients;
    use crate::projects::Project;

    fn redis_stack() -> Project {
        Project {
            username: "redis".to_string(),
            repository: "redis-stack".to_string(),
        }
    }

    #[test]
    fn repository_url() {
        let endpoint = Url::parse(api_clients::DOCKER_HUB_API).unwrap();
        let url = api_clients::repository_url(&endpoint, &redis_stack()).unwrap();
        assert_eq!(url.as_str(), "https://hub.docker.com/v2/repositories/redis/redis-stack/");

        let endpoint = Url::parse("http://127.0.0.1:8080/mirror/").unwrap();
        let url = api_clients::repository_url(&endpoint, &redis_stack()).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/mirror/v2/repositories/redis/redis-stack/");
    }

    #[test]
    fn rejects_invalid_endpoint() {
        use api_clients::Client;
        assert!(api_clients::RealClient::new("not a url").is_err());
    }

    /// Serves `response` to a single HTTP request and returns the endpoint to query.
    async fn serve_once(response: String) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });
        endpoint
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    async fn pull_count_from(status: &str, body: &str) -> anyhow::Result<u64> {
        use api_clients::Client;

        let endpoint = serve_once(http_response(status, body)).await;
        let client = api_clients::RealClient::new(&endpoint).unwrap();
        client.pull_count(&redis_stack()).await
    }

    #[tokio::test]
    async fn reads_pull_count() {
        let pull_count = pull_count_from("200 OK", r#"{"name":"redis-stack","pull_count":123456789,"star_count":3}"#)
            .await
            .unwrap();
        assert_eq!(pull_count, 123_456_789);
    }

    #[tokio::test]
    async fn error_status_names_project() {
        let err = pull_count_from("404 Not Found", r#"{"message":"object not found"}"#)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("redis/redis-stack"), "{err:#}");
        assert!(format!("{err:#}").contains("404"), "{err:#}");
    }

    #[tokio::test]
    async fn missing_pull_count_names_project() {
        let err = pull_count_from("200 OK", "{}").await.unwrap_err();
        assert!(format!("{err:#}").contains("redis/redis-stack"), "{err:#}");
    }

    #[tokio::test]
    async fn non_numeric_pull_count_names_project() {
        let err = pull_count_from("200 OK", r#"{"pull_count":"x"}"#).await.unwrap_err();
        assert!(format!("{err:#}").contains("redis/redis-stack"), "{err:#}");
    }
}
