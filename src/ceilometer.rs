use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::Config;

/// Aggregation window for statistics queries, in seconds.
pub const STATISTICS_PERIOD_SECS: u32 = 300;

/// Aggregated statistics for one meter over one period window.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Statistics {
    pub avg: Option<f64>,
    pub sum: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub count: Option<f64>,
    pub duration: Option<f64>,
    pub period: Option<f64>,
}

impl Statistics {
    /// Look up an aggregate by field name. Unknown or absent fields are None.
    pub fn field(&self, name: &str) -> Option<f64> {
        match name {
            "avg" => self.avg,
            "sum" => self.sum,
            "min" => self.min,
            "max" => self.max,
            "count" => self.count,
            "duration" => self.duration,
            "period" => self.period,
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    metering_url: String,
}

/// Authenticated Ceilometer query client.
///
/// Holds a cached identity token, re-authenticating lazily when the token is
/// missing or rejected.
pub struct CeilometerClient {
    http: reqwest::Client,
    auth_url: String,
    username: String,
    tenant: String,
    password: String,
    session: Mutex<Option<Session>>,
}

impl CeilometerClient {
    pub fn new(config: &Config) -> Result<Self, QueryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.service_timeout_secs))
            .build()
            .map_err(|e| QueryError::Request(e.to_string()))?;

        Ok(Self {
            http,
            auth_url: config.service_endpoint.trim_end_matches('/').to_string(),
            username: config.service_user.clone(),
            tenant: config.service_tenant.clone(),
            password: config.service_password.clone(),
            session: Mutex::new(None),
        })
    }

    /// Fetch statistics for one meter over the aggregation window.
    ///
    /// Returns the most recent record, or None when the service has no data
    /// for the window.
    pub async fn statistics(&self, meter: &str) -> Result<Option<Statistics>, QueryError> {
        let session = self.session().await?;

        let url = format!("{}/v2/meters/{}/statistics", session.metering_url, meter);
        let response = self
            .http
            .get(&url)
            .header("X-Auth-Token", session.token.as_str())
            .query(&[("period", STATISTICS_PERIOD_SECS)])
            .send()
            .await
            .map_err(|e| QueryError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            // Token expired; drop it so the next attempt re-authenticates.
            *self.session.lock().await = None;
            return Err(QueryError::Auth(format!("token rejected for meter {}", meter)));
        }
        if !response.status().is_success() {
            return Err(QueryError::Status(response.status().as_u16()));
        }

        let mut records: Vec<Statistics> = response
            .json()
            .await
            .map_err(|e| QueryError::Decode(e.to_string()))?;

        // Records are ordered oldest first; the last one is the current window.
        Ok(records.pop())
    }

    async fn session(&self) -> Result<Session, QueryError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(session.clone());
        }

        let session = self.authenticate().await?;
        debug!("Authenticated against {}", self.auth_url);
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn authenticate(&self) -> Result<Session, QueryError> {
        let body = serde_json::json!({
            "auth": {
                "tenantName": self.tenant,
                "passwordCredentials": {
                    "username": self.username,
                    "password": self.password,
                }
            }
        });

        let response = self
            .http
            .post(format!("{}/tokens", self.auth_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(QueryError::Auth(format!(
                "token request returned {}",
                response.status()
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| QueryError::Decode(e.to_string()))?;

        let metering_url = token_response
            .access
            .service_catalog
            .iter()
            .find(|service| service.service_type == "metering")
            .and_then(|service| service.endpoints.first())
            .map(|endpoint| endpoint.public_url.trim_end_matches('/').to_string())
            .ok_or_else(|| QueryError::Auth("no metering endpoint in service catalog".to_string()))?;

        Ok(Session {
            token: token_response.access.token.id,
            metering_url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access: Access,
}

#[derive(Debug, Deserialize)]
struct Access {
    token: Token,
    #[serde(rename = "serviceCatalog", default)]
    service_catalog: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct Token {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    #[serde(rename = "publicURL")]
    public_url: String,
}

#[derive(Debug)]
pub enum QueryError {
    Auth(String),
    Request(String),
    Status(u16),
    Decode(String),
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::Auth(e) => write!(f, "Authentication error: {}", e),
            QueryError::Request(e) => write!(f, "Request error: {}", e),
            QueryError::Status(code) => write!(f, "Unexpected response status: {}", code),
            QueryError::Decode(e) => write!(f, "Decode error: {}", e),
        }
    }
}

impl std::error::Error for QueryError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };

    fn test_config(endpoint: &str) -> Config {
        Config {
            service_endpoint: endpoint.to_string(),
            service_user: "admin".to_string(),
            service_tenant: "admin".to_string(),
            service_password: "secret".to_string(),
            service_timeout_secs: 5,
            log_file: None,
            report_log_file: None,
            metric_prefix: String::new(),
            poll_interval_secs: 10,
            retry_count: 0,
            retry_delay_secs: 5,
            verbose: false,
        }
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut tmp = [0u8; 1024];
        loop {
            let n = stream.read(&mut tmp).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&tmp[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_string();
                let content_length = head
                    .lines()
                    .find_map(|line| {
                        let line = line.to_ascii_lowercase();
                        line.strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if buf.len() - (pos + 4) >= content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    async fn write_response(stream: &mut TcpStream, body: &str) {
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();
    }

    fn token_body(metering_url: &str) -> String {
        format!(
            r#"{{"access":{{"token":{{"id":"tok-1"}},"serviceCatalog":[{{"type":"metering","endpoints":[{{"publicURL":"{}"}}]}}]}}}}"#,
            metering_url
        )
    }

    #[tokio::test]
    async fn statistics_query_authenticates_and_returns_latest() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base = format!("http://{}", addr);

        let token = token_body(&base);
        let server = tokio::spawn(async move {
            // First connection: the token request
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            assert!(request.starts_with("POST /tokens"));
            assert!(request.contains("passwordCredentials"));
            write_response(&mut stream, &token).await;

            // Second connection: the statistics query
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            assert!(request.starts_with("GET /v2/meters/cpu_util/statistics"));
            assert!(request.contains("period=300"));
            assert!(request.contains("tok-1"));
            write_response(
                &mut stream,
                r#"[{"avg":10.0,"sum":20.0,"min":5.0,"max":15.0},{"avg":55.2,"sum":110.4,"min":50.0,"max":60.0}]"#,
            )
            .await;
        });

        let client = CeilometerClient::new(&test_config(&base)).unwrap();
        let record = client.statistics("cpu_util").await.unwrap().unwrap();
        assert_eq!(record.avg, Some(55.2));
        assert_eq!(record.max, Some(60.0));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn empty_window_yields_none() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base = format!("http://{}", addr);

        let token = token_body(&base);
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            write_response(&mut stream, &token).await;

            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;
            write_response(&mut stream, "[]").await;
        });

        let client = CeilometerClient::new(&test_config(&base)).unwrap();
        let record = client.statistics("volume").await.unwrap();
        assert!(record.is_none());

        server.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_service_is_a_query_error() {
        let client = CeilometerClient::new(&test_config("http://127.0.0.1:1")).unwrap();
        let result = client.statistics("cpu_util").await;
        assert!(matches!(result, Err(QueryError::Auth(_))));
    }

    #[test]
    fn token_response_parses_catalog() {
        let json = token_body("http://controller:8777");
        let parsed: TokenResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.access.token.id, "tok-1");
        assert_eq!(parsed.access.service_catalog.len(), 1);
        assert_eq!(
            parsed.access.service_catalog[0].endpoints[0].public_url,
            "http://controller:8777"
        );
    }

    #[test]
    fn field_lookup_by_name() {
        let record = Statistics {
            avg: Some(55.2),
            sum: Some(110.4),
            ..Default::default()
        };
        assert_eq!(record.field("avg"), Some(55.2));
        assert_eq!(record.field("sum"), Some(110.4));
        assert_eq!(record.field("min"), None);
        assert_eq!(record.field("not_a_field"), None);
    }
}
