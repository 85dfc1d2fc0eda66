use crate::error::{Error, Result};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

pub const WS_BASE_URL: &str = "wss://api.openai.com/v1/realtime";
const BETA_HEADER: &str = "openai-beta";
const BETA_HEADER_VALUE: &str = "realtime=v1";

#[derive(Debug)]
pub struct WsStream(WebSocketStream<MaybeTlsStream<TcpStream>>);

impl WsStream {
    pub(crate) const fn new(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self(stream)
    }
}

impl futures::Stream for WsStream {
    type Item = std::result::Result<
        tokio_tungstenite::tungstenite::Message,
        tokio_tungstenite::tungstenite::Error,
    >;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        std::pin::Pin::new(&mut self.0).poll_next(cx)
    }
}

impl futures::Sink<tokio_tungstenite::tungstenite::Message> for WsStream {
    type Error = tokio_tungstenite::tungstenite::Error;

    fn poll_ready(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::pin::Pin::new(&mut self.0).poll_ready(cx)
    }

    fn start_send(
        mut self: std::pin::Pin<&mut Self>,
        item: tokio_tungstenite::tungstenite::Message,
    ) -> std::result::Result<(), Self::Error> {
        std::pin::Pin::new(&mut self.0).start_send(item)
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::pin::Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_close(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::pin::Pin::new(&mut self.0).poll_close(cx)
    }
}

/// Build the connection URL, appending the model as a query parameter.
///
/// # Errors
/// Returns an error if `base_url` is not a valid URL.
pub fn realtime_url(base_url: &str, model: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)?;
    url.query_pairs_mut().append_pair("model", model);
    Ok(url)
}

/// Establish a WebSocket connection to the Realtime API.
///
/// # Errors
/// Returns [`Error::Connection`] if the handshake fails (for example when the
/// API key is rejected), or a URL/header error if the inputs are malformed.
pub async fn connect(base_url: &str, api_key: &str, model: &str) -> Result<WsStream> {
    let url = realtime_url(base_url, model)?;
    let auth_header = HeaderValue::from_str(&format!("Bearer {api_key}"))?;

    let mut req = url.as_str().into_client_request()?;
    let h = req.headers_mut();
    h.insert(AUTHORIZATION, auth_header);
    h.insert(BETA_HEADER, HeaderValue::from_static(BETA_HEADER_VALUE));

    let (ws_stream, _) = connect_async(req)
        .await
        .map_err(|e| Error::Connection(e.to_string()))?;

    tracing::info!("Connected to OpenAI Realtime API ({model})");

    Ok(WsStream::new(ws_stream))
}
