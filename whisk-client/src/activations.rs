//! Activation-related API endpoints

use tracing::debug;
use whisk_core::dto::activation::ActivationDetail;

use crate::ActionClient;
use crate::error::Result;

impl ActionClient {
    /// Get the detail of an activation
    ///
    /// The platform answers 404 both while an activation is still running and
    /// for ids it has never seen; the error keeps the status so callers can
    /// tell that apart from other failures.
    pub async fn get_activation_detail(
        &self,
        namespace: &str,
        activation_id: &str,
    ) -> Result<ActivationDetail> {
        let url = self.activation_url(namespace, activation_id);
        debug!("GET {}", url);

        let response = self.authorized(self.client.get(&url)).send().await?;

        self.handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use crate::{ActionClient, ClientError, Credentials};
    use serde_json::json;
    use wiremock::matchers::{basic_auth, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ActionClient {
        ActionClient::new(server.uri(), Credentials::new("user", "secret"))
    }

    #[tokio::test]
    async fn test_completed_activation() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/nuvolaris/activations/abc123"))
            .and(basic_auth("user", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "activationId": "abc123",
                "response": {
                    "result": {
                        "mf_process_status": "failed",
                        "mf_process_ret_code": 137,
                        "mf_process_stderr": "killed",
                        "mf_process_stdout": ""
                    }
                }
            })))
            .mount(&server)
            .await;

        let detail = client_for(&server)
            .get_activation_detail("nuvolaris", "abc123")
            .await
            .unwrap();
        let result = detail.response.result;
        assert_eq!(result.status(), Some("failed"));
        assert_eq!(result.return_code, Some(137));
        assert_eq!(result.stderr_text().as_deref(), Some("killed"));
    }

    #[tokio::test]
    async fn test_running_activation_reports_404() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/nuvolaris/activations/abc123"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": "The requested resource does not exist."
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .get_activation_detail("nuvolaris", "abc123")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_malformed_activation_body() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .get_activation_detail("nuvolaris", "abc123")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::ParseError(_)));
    }
}
