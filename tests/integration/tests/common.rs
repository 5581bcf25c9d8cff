//! Common test utilities and fixtures.

use std::time::Duration;

use da_core::AppConfig;
use da_server::Server;
use da_test_utils::{ResponseBuilder, TestIdp};
use reqwest::{redirect, Client, Response};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::sleep;

/// Entity id of the service under test.
pub const SP_ENTITY_ID: &str = "urn:device-access-approval:test";

/// Identity provider login URL.
pub const IDP_LOGIN_URL: &str = "https://idp.example.test/saml2";

/// Where users land after logging out.
pub const LOGOUT_URL: &str = "https://idp.example.test/logout";

/// Group that grants access.
pub const ACCESS_GROUP: &str = "00000000-0000-0000-0000-00000000a11c";

/// Test environment with a running server.
pub struct TestEnv {
    /// Identity provider whose certificate the server trusts.
    pub idp: TestIdp,
    /// Base URL of the running server.
    pub base_url: String,
    /// HTTP client with a cookie store that does not follow redirects.
    pub client: Client,
    /// Server shutdown signal.
    _shutdown_tx: oneshot::Sender<()>,
}

impl TestEnv {
    /// Starts a server with the default test configuration.
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(|_| {}).await
    }

    /// Starts a server after letting the caller adjust the configuration.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> anyhow::Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("da_server=debug,da_protocol_saml=debug,da_session=debug")
            .try_init();

        let idp = TestIdp::new();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);

        let mut config = AppConfig::for_testing(SP_ENTITY_ID, IDP_LOGIN_URL, idp.certificate_pem());
        config.logout_url = Some(LOGOUT_URL.to_string());
        config.access_group = ACCESS_GROUP.to_string();
        adjust(&mut config);

        let (_shutdown_tx, shutdown_rx) = oneshot::channel();

        let server = Server::new(config)?;
        tokio::spawn(async move {
            tokio::select! {
                result = server.serve(listener) => {
                    if let Err(e) = result {
                        tracing::error!("Server error: {}", e);
                    }
                }
                _ = shutdown_rx => {
                    tracing::info!("Server shutdown requested");
                }
            }
        });

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .cookie_store(true)
            .redirect(redirect::Policy::none())
            .build()?;

        wait_for_server(&client, &base_url).await?;

        Ok(Self {
            idp,
            base_url,
            client,
            _shutdown_tx,
        })
    }

    /// Absolute URL for a path on the server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// A response addressed to the server under test.
    pub fn response(&self) -> ResponseBuilder<'_> {
        self.idp
            .response_for(SP_ENTITY_ID)
            .destination(&self.url("/saml/acs"))
    }

    /// Posts a response to the assertion consumer service.
    pub async fn post_acs(&self, response: &ResponseBuilder<'_>) -> anyhow::Result<Response> {
        self.post_acs_raw(&response.build_encoded()).await
    }

    /// Posts an already encoded `SAMLResponse` value.
    pub async fn post_acs_raw(&self, saml_response: &str) -> anyhow::Result<Response> {
        Ok(self
            .client
            .post(self.url("/saml/acs"))
            .form(&[("SAMLResponse", saml_response), ("RelayState", "")])
            .send()
            .await?)
    }
}

/// The `Location` header of a redirect.
pub fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

/// Waits for the server to be ready.
async fn wait_for_server(client: &Client, base_url: &str) -> anyhow::Result<()> {
    let ready_url = format!("{}/isReady", base_url);
    let max_attempts = 50;

    for attempt in 1..=max_attempts {
        match client.get(&ready_url).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Server ready after {} attempts", attempt);
                return Ok(());
            }
            Ok(response) => {
                tracing::debug!(
                    "Server not ready (status {}), attempt {}/{}",
                    response.status(),
                    attempt,
                    max_attempts
                );
            }
            Err(e) => {
                tracing::debug!("Server not ready ({}), attempt {}/{}", e, attempt, max_attempts);
            }
        }
        sleep(Duration::from_millis(100)).await;
    }

    anyhow::bail!("Server did not become ready in time")
}
