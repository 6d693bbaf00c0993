//! [`WsSimulatorClient`] – WebSocket link to an external simulator process.
//!
//! Each step is one text message each way: the command batch goes out as a
//! JSON array, the simulator answers with a JSON array of output frames.
//!
//! ```text
//! → [{"$type": "move_by", "distance": 0.5}]
//! ← [{"$type": "transforms", "objects": [...]}, {"$type": "magnebot", ...}]
//! ```

use std::net::TcpStream;

use tracing::{debug, info, warn};
use transport_types::{Command, OutputFrame, TransportError};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::client::SimulatorClient;

pub struct WsSimulatorClient {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
    url: String,
}

impl WsSimulatorClient {
    /// Open the WebSocket connection to `url` (e.g. `ws://127.0.0.1:1071`).
    pub fn connect(url: &str) -> Result<Self, TransportError> {
        let (socket, _response) = tungstenite::connect(url)
            .map_err(|e| TransportError::Connection(format!("{url}: {e}")))?;
        info!(url, "connected to simulator");
        Ok(Self {
            socket,
            url: url.to_string(),
        })
    }

    /// Serialize a batch to its wire form.
    pub fn encode_batch(commands: &[Command]) -> Result<String, TransportError> {
        serde_json::to_string(commands).map_err(|e| TransportError::Protocol(e.to_string()))
    }

    /// Parse a step's wire form.
    pub fn decode_frames(payload: &[u8]) -> Result<Vec<OutputFrame>, TransportError> {
        serde_json::from_slice(payload).map_err(|e| TransportError::Protocol(e.to_string()))
    }

    /// Close the connection.  Errors are logged, not returned.
    pub fn close(mut self) {
        if let Err(e) = self.socket.close(None) {
            warn!(error = %e, "error closing simulator connection");
        }
    }
}

impl SimulatorClient for WsSimulatorClient {
    fn communicate(&mut self, commands: &[Command]) -> Result<Vec<OutputFrame>, TransportError> {
        let payload = Self::encode_batch(commands)?;
        self.socket
            .send(Message::text(payload))
            .map_err(|e| TransportError::Connection(format!("{}: {e}", self.url)))?;

        loop {
            let message = self
                .socket
                .read()
                .map_err(|e| TransportError::Connection(format!("{}: {e}", self.url)))?;
            match message {
                Message::Text(text) => return Self::decode_frames(text.as_bytes()),
                Message::Binary(bytes) => return Self::decode_frames(&bytes),
                Message::Close(_) => {
                    return Err(TransportError::Connection(format!(
                        "{}: simulator closed the connection",
                        self.url
                    )));
                }
                other => debug!(?other, "ignoring control message"),
            }
        }
    }
}
