use reqwest::blocking::Client;
use reqwest::header::SET_COOKIE;
use reqwest::redirect::Policy;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::debug;

use crate::config::{DeviceConfig, OperationConfig};
use crate::device::cookie::parse_set_cookie;
use crate::device::errors::DeviceError;
use crate::device::traits::DeviceOperations;
use crate::device::types::{Operation, SessionToken};

/// Blocking HTTP implementation of [`DeviceOperations`]
///
/// Every request is bounded by the configured timeout, so a hung device turns
/// into a failed step instead of stalling the workflow.
///
/// The blocking client runs its own runtime internally: build, use and drop it
/// off the async runtime (e.g. inside `tokio::task::spawn_blocking`).
#[derive(Debug)]
pub struct HttpDeviceClient {
    http: Client,
    root_url: Url,
    session_header: String,
    initialize: PreparedRequest,
    authenticate: PreparedRequest,
    apply: PreparedRequest,
}

#[derive(Debug)]
struct PreparedRequest {
    operation: Operation,
    url: Url,
    body: serde_json::Value,
    success_marker: Option<String>,
}

impl PreparedRequest {
    fn new(
        operation: Operation,
        base: &Url,
        config: &OperationConfig,
        password: &str,
    ) -> Result<Self, DeviceError> {
        let body = serde_json::from_str(&config.render_payload(password))
            .map_err(|source| DeviceError::InvalidPayload { operation, source })?;
        Ok(Self {
            operation,
            url: join(base, &config.path)?,
            body,
            success_marker: config.success_marker.clone(),
        })
    }
}

fn join(base: &Url, path: &str) -> Result<Url, DeviceError> {
    base.join(path).map_err(|e| DeviceError::InvalidUrl {
        url: format!("{base}{path}"),
        reason: e.to_string(),
    })
}

impl HttpDeviceClient {
    /// Create a client for the device described by `config`
    pub fn new(config: &DeviceConfig) -> Result<Self, DeviceError> {
        let base = Url::parse(&config.base_url).map_err(|e| DeviceError::InvalidUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        let password = config.password.as_deref().unwrap_or_default();

        // Only the device's own 200 counts; a redirect is a failed step.
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .redirect(Policy::none())
            .build()
            .map_err(DeviceError::ClientBuild)?;

        Ok(Self {
            http,
            root_url: join(&base, &config.root_path)?,
            session_header: config.session_header.clone(),
            initialize: PreparedRequest::new(
                Operation::InitializeSession,
                &base,
                &config.initialize,
                password,
            )?,
            authenticate: PreparedRequest::new(
                Operation::Authenticate,
                &base,
                &config.authenticate,
                password,
            )?,
            apply: PreparedRequest::new(Operation::ApplyConfiguration, &base, &config.apply, password)?,
        })
    }

    fn post(&self, request: &PreparedRequest, token: &SessionToken) -> Result<(), DeviceError> {
        let operation = request.operation;
        debug!(%operation, url = %request.url, "posting to device");

        let response = self
            .http
            .post(request.url.clone())
            .header(self.session_header.as_str(), token.as_str())
            .json(&request.body)
            .send()
            .map_err(|source| DeviceError::Transport { operation, source })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DeviceError::UnexpectedStatus {
                operation,
                status: status.as_u16(),
            });
        }

        let Some(marker) = &request.success_marker else {
            return Ok(());
        };
        let body = response
            .text()
            .map_err(|source| DeviceError::Transport { operation, source })?;
        if body.contains(marker.as_str()) {
            Ok(())
        } else {
            Err(DeviceError::MarkerNotFound {
                operation,
                marker: marker.clone(),
            })
        }
    }
}

fn require_session(token: &SessionToken, operation: Operation) -> Result<(), DeviceError> {
    if token.is_empty() {
        return Err(DeviceError::MissingSession { operation });
    }
    Ok(())
}

impl DeviceOperations for HttpDeviceClient {
    fn fetch_root(&self) -> Result<SessionToken, DeviceError> {
        let operation = Operation::FetchRoot;
        debug!(%operation, url = %self.root_url, "fetching device root");

        let response = self
            .http
            .get(self.root_url.clone())
            .send()
            .map_err(|source| DeviceError::Transport { operation, source })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DeviceError::UnexpectedStatus {
                operation,
                status: status.as_u16(),
            });
        }

        let header = response
            .headers()
            .get(SET_COOKIE)
            .ok_or(DeviceError::MissingSessionCookie)?;
        let header = String::from_utf8_lossy(header.as_bytes());
        Ok(parse_set_cookie(&header))
    }

    fn initialize_session(&self, token: &SessionToken) -> Result<(), DeviceError> {
        require_session(token, Operation::InitializeSession)?;
        self.post(&self.initialize, token)
    }

    fn authenticate(&self, token: &SessionToken) -> Result<(), DeviceError> {
        require_session(token, Operation::Authenticate)?;
        self.post(&self.authenticate, token)
    }

    fn apply_configuration(&self, token: &SessionToken) -> Result<(), DeviceError> {
        self.post(&self.apply, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RestarterConfig;

    #[test]
    fn test_paths_resolved_against_base() {
        let mut config = RestarterConfig::default().device;
        config.base_url = "http://10.1.1.1:8080".to_string();

        let client = HttpDeviceClient::new(&config).unwrap();
        assert_eq!(client.root_url.as_str(), "http://10.1.1.1:8080/");
        assert_eq!(
            client.authenticate.url.as_str(),
            "http://10.1.1.1:8080/cgi-bin/login.cgi"
        );
    }

    #[test]
    fn test_invalid_payload_reported_per_operation() {
        let mut config = RestarterConfig::default().device;
        config.initialize.payload = "{".to_string();

        let err = HttpDeviceClient::new(&config).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::InvalidPayload {
                operation: Operation::InitializeSession,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_session_rejected_before_request() {
        let client = HttpDeviceClient::new(&RestarterConfig::default().device).unwrap();
        let err = client.authenticate(&SessionToken::default()).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::MissingSession {
                operation: Operation::Authenticate
            }
        ));
    }
}
