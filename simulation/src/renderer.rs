//! Renderer stand-in for the simulator
//!
//! Tallies messages by type, optionally echoes them to stdout as JSON
//! lines, and wakes anyone waiting for the next message.

use std::collections::BTreeMap;
use std::io::Write;

use fogmap_discovery::{RendererMessage, RendererSink};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::warn;

#[derive(Debug, Default)]
pub struct SimRenderer {
    echo: bool,
    counts: Mutex<BTreeMap<&'static str, usize>>,
    changed: Notify,
}

impl SimRenderer {
    pub fn new(echo: bool) -> Self {
        Self {
            echo,
            ..Self::default()
        }
    }

    /// Messages received of one type
    pub fn count(&self, kind: &str) -> usize {
        self.counts.lock().get(kind).copied().unwrap_or(0)
    }

    /// Messages received per type
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        self.counts.lock().clone()
    }

    /// Resolves after the next message arrives
    ///
    /// Create the future before checking the condition it waits for.
    pub fn changed(&self) -> tokio::sync::futures::Notified<'_> {
        self.changed.notified()
    }
}

impl RendererSink for SimRenderer {
    fn post_message(&self, message: &str) {
        match serde_json::from_str::<RendererMessage>(message) {
            Ok(decoded) => {
                *self.counts.lock().entry(decoded.kind()).or_default() += 1;
            }
            Err(e) => warn!(error = %e, "Renderer received an unknown message"),
        }

        if self.echo {
            let mut stdout = std::io::stdout().lock();
            let _ = writeln!(stdout, "{message}");
        }
        self.changed.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fogmap_discovery::RendererBridge;
    use std::sync::Arc;

    #[test]
    fn test_counts_by_kind() {
        let renderer = Arc::new(SimRenderer::new(false));
        let bridge = RendererBridge::with_sink(renderer.clone());

        bridge.send_discovery_mode(true);
        bridge.send_clear_fog();
        bridge.send_discovery_mode(false);

        assert_eq!(renderer.count("setDiscoveryMode"), 2);
        assert_eq!(renderer.count("clearDiscoveryFog"), 1);
        assert_eq!(renderer.count("revealDiscoveryPoint"), 0);
    }

    #[tokio::test]
    async fn test_changed_wakes_waiter() {
        let renderer = Arc::new(SimRenderer::new(false));
        let waiter = renderer.changed();

        let sender = Arc::clone(&renderer);
        tokio::spawn(async move {
            sender.post_message(r#"{"type":"clearDiscoveryFog"}"#);
        });

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("woken");
    }
}
