//! Test helpers for integration tests
//!
//! Provides an in-process gateway on an ephemeral port backed by the in-memory store, and a
//! WebSocket client that speaks the gateway frame format.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, Response};
use serde_json::{json, Value};
use support_common::{AppConfig, ChatConfig, JwtService};
use support_core::{ParticipantRole, Snowflake};
use support_db::{MemoryStore, Repositories};
use support_gateway::{create_gateway_state_with_repositories, run_server, GatewayState};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::fixtures::{authenticate, Frame};

/// Signing secret shared by the test server and the tokens the tests mint
pub const TEST_JWT_SECRET: &str = "integration-test-secret-that-is-long-enough";

/// How long to wait for an expected frame
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: GatewayState,
    pub store: Arc<MemoryStore>,
    jwt: JwtService,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server
    pub async fn start() -> Result<Self> {
        Self::start_with_chat(ChatConfig::default()).await
    }

    /// Start a test server with custom chat tuning
    pub async fn start_with_chat(chat: ChatConfig) -> Result<Self> {
        let mut config = test_config()?;
        config.chat = chat;

        let store = Arc::new(MemoryStore::new());
        let state =
            create_gateway_state_with_repositories(&config, Repositories::memory(Arc::clone(&store)));

        // Bind to an ephemeral port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        // Spawn server task
        let server_state = state.clone();
        let handle = tokio::spawn(async move {
            run_server(listener, server_state).await.ok();
        });

        // Create HTTP client
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            client,
            state,
            store,
            jwt: JwtService::new(TEST_JWT_SECRET, config.jwt.access_token_expiry),
            _handle: handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn gateway_url(&self) -> String {
        format!("ws://{}/gateway", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Mint a token the way the storefront auth service would
    pub fn token(&self, user_id: Snowflake, role: ParticipantRole) -> Result<String> {
        Ok(self.jwt.generate_token(user_id, role)?)
    }

    /// Open an unauthenticated socket
    pub async fn connect(&self) -> Result<WsClient> {
        let (stream, _) = connect_async(self.gateway_url())
            .await
            .context("WebSocket handshake failed")?;
        Ok(WsClient {
            stream,
            last_seq: 0,
        })
    }

    /// Open a socket and complete the handshake
    pub async fn connect_as(&self, user_id: Snowflake, role: ParticipantRole) -> Result<WsClient> {
        let mut client = self.connect().await?;
        let token = self.token(user_id, role)?;
        client
            .send("authenticate", authenticate(user_id, role, &token))
            .await?;

        let ack = client.expect("authenticated").await?;
        if ack.d["userId"] != json!(user_id.to_string()) {
            bail!("authenticated for the wrong participant: {}", ack.d);
        }
        Ok(client)
    }

    /// Poll until `check` holds, for state that settles after a socket closes
    pub async fn eventually<F>(&self, mut check: F) -> Result<()>
    where
        F: FnMut(&GatewayState) -> bool,
    {
        for _ in 0..100 {
            if check(&self.state) {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        bail!("condition not reached")
    }
}

/// Gateway configuration for tests: memory store, ephemeral port
pub fn test_config() -> Result<AppConfig> {
    AppConfig::from_lookup(|key| match key {
        "GATEWAY_PORT" => Some("0".to_string()),
        "STORE_BACKEND" => Some("memory".to_string()),
        "JWT_SECRET" => Some(TEST_JWT_SECRET.to_string()),
        _ => None,
    })
    .map_err(|e| anyhow::anyhow!("Config error: {e}"))
}

/// A WebSocket client that checks sequence numbers as frames arrive
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    last_seq: u64,
}

impl WsClient {
    /// Send a client frame
    pub async fn send(&mut self, event: &str, data: Value) -> Result<()> {
        let frame = json!({ "t": event, "d": data });
        self.stream.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    /// Send an arbitrary WebSocket message
    pub async fn send_raw(&mut self, message: Message) -> Result<()> {
        self.stream.send(message).await?;
        Ok(())
    }

    /// Next server frame; fails on timeout, close or a sequence gap
    pub async fn recv(&mut self) -> Result<Frame> {
        loop {
            let message = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .context("timed out waiting for a frame")?
                .context("stream ended")??;

            match message {
                Message::Text(text) => {
                    let frame: Frame = serde_json::from_str(&text)?;
                    if frame.s != self.last_seq + 1 {
                        bail!("sequence gap: expected {}, got {}", self.last_seq + 1, frame.s);
                    }
                    self.last_seq = frame.s;
                    return Ok(frame);
                }
                Message::Close(frame) => bail!("connection closed: {frame:?}"),
                _ => {}
            }
        }
    }

    /// Read until a frame named `event` arrives, skipping others
    pub async fn expect(&mut self, event: &str) -> Result<Frame> {
        loop {
            let frame = self.recv().await?;
            if frame.t == event {
                return Ok(frame);
            }
        }
    }

    /// Fail if a frame named `event` arrives within `within`
    pub async fn expect_none(&mut self, event: &str, within: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            match tokio::time::timeout_at(deadline, self.recv()).await {
                Err(_) => return Ok(()),
                Ok(Ok(frame)) if frame.t == event => bail!("unexpected {event}: {}", frame.d),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    /// Read until the server closes; returns the close code
    pub async fn expect_close(&mut self) -> Result<u16> {
        loop {
            let message = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .context("timed out waiting for close")?
                .context("stream ended without a close frame")??;

            if let Message::Close(frame) = message {
                let frame = frame.context("close frame without a code")?;
                return Ok(u16::from(frame.code));
            }
        }
    }

    /// Close the socket from the client side
    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
