//! WebSocket-based live reload.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Path of the live reload WebSocket endpoint.
pub const RELOAD_SOCKET_PATH: &str = "/__ezsite/reload";

/// Path of the live reload client script.
pub const RELOAD_SCRIPT_PATH: &str = "/__ezsite/reload.js";

/// Messages sent to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReloadMessage {
    /// Full page reload
    Reload {
        /// Source file that triggered the reload
        path: String,
    },

    /// Connection established
    Connected,
}

/// Hub for broadcasting reload messages to all connected clients.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    sender: broadcast::Sender<ReloadMessage>,
}

impl ReloadHub {
    /// Create a new reload hub.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Send a message to all connected clients.
    pub fn send(&self, msg: ReloadMessage) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(msg);
    }

    /// Subscribe to reload messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

/// `<script>` tag loading the reload client, appended to served pages.
pub fn reload_script_tag() -> String {
    format!(r#"<script src="{RELOAD_SCRIPT_PATH}"></script>"#)
}

/// Generate the client-side reload script.
///
/// The socket URL is derived from the page location so the script works
/// through tunnels and on any allowed host.
pub fn reload_client_script() -> String {
    format!(
        r#"
(function() {{
  'use strict';

  const scheme = location.protocol === 'https:' ? 'wss://' : 'ws://';
  const ws = new WebSocket(scheme + location.host + '{RELOAD_SOCKET_PATH}');
  let reconnectAttempts = 0;
  const maxReconnectAttempts = 10;

  ws.onopen = function() {{
    console.log('[ezsite] Connected');
    reconnectAttempts = 0;
  }};

  ws.onmessage = function(event) {{
    const msg = JSON.parse(event.data);

    switch (msg.type) {{
      case 'reload':
        console.log('[ezsite] Changed:', msg.path);
        location.reload();
        break;

      case 'connected':
        console.log('[ezsite] Server acknowledged connection');
        break;
    }}
  }};

  ws.onclose = function() {{
    console.log('[ezsite] Disconnected');
    if (reconnectAttempts < maxReconnectAttempts) {{
      reconnectAttempts++;
      setTimeout(function() {{
        console.log('[ezsite] Reconnecting...');
        location.reload();
      }}, 1000 * reconnectAttempts);
    }}
  }};
}})();
"#
    )
}
