use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt, future};
use shared::models::Credential;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::debug;
use url::Url;

use super::{LiveChannel, LiveConnection};
use crate::error::{SessionError, SessionResult};

/// The live channel over WebSocket: `<url>?token=<credential token>`.
#[derive(Debug, Clone)]
pub struct WebSocketChannel {
    url: Url,
}

impl WebSocketChannel {
    /// Channel rooted at `url`.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    /// The URL dialed for `credential`.
    #[must_use]
    pub fn url_for(&self, credential: &Credential) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("token", &credential.token);
        url
    }
}

#[async_trait]
impl LiveChannel for WebSocketChannel {
    async fn connect(&self, credential: &Credential) -> SessionResult<LiveConnection> {
        let url = self.url_for(credential);
        let (socket, response) = connect_async(url.as_str())
            .await
            .map_err(|err| SessionError::Connection(err.to_string()))?;
        debug!(status = %response.status(), endpoint = %self.url, "websocket handshake complete");

        let (write, read) = socket.split();
        let sink = write
            .sink_map_err(|err| SessionError::Connection(err.to_string()))
            .with(|frame: String| future::ready(Ok::<_, SessionError>(WsMessage::text(frame))));
        let stream = read.filter_map(|item| {
            future::ready(match item {
                Ok(WsMessage::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(WsMessage::Binary(bytes)) => Some(
                    String::from_utf8(bytes.to_vec())
                        .map_err(|_| SessionError::Decode("binary frame is not UTF-8".to_string())),
                ),
                Ok(WsMessage::Close(frame)) => Some(Err(SessionError::Connection(
                    frame.map_or_else(
                        || "server sent close".to_string(),
                        |frame| format!("server sent close: {}", frame.reason.as_str()),
                    ),
                ))),
                Ok(_) => None,
                Err(err) => Some(Err(SessionError::Connection(err.to_string()))),
            })
        });

        Ok(LiveConnection::new(Box::pin(sink), Box::pin(stream)))
    }
}
