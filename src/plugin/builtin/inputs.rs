use crate::error::PluginError;
use crate::pipeline::InputContext;
use crate::plugin::registry::{parse_settings, PluginSettings};
use crate::plugin::{Input, InputWrapper, PluginWrapper};
use async_trait::async_trait;
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

/// Reads one message per datagram
pub struct UdpInput {
    address: String,
    socket: Option<UdpSocket>,
}

#[derive(Debug, Deserialize)]
struct UdpInputSettings {
    address: String,
}

impl UdpInput {
    /// Input that binds `address` when it starts running
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            socket: None,
        }
    }

    /// Bind immediately, so the local address is known before running
    pub async fn bind(address: impl Into<String>) -> Result<Self, PluginError> {
        let address = address.into();
        let socket = UdpSocket::bind(&address).await?;
        Ok(Self {
            address,
            socket: Some(socket),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

#[async_trait]
impl Input for UdpInput {
    async fn run(&mut self, ctx: InputContext) -> Result<(), PluginError> {
        let socket = match self.socket.take() {
            Some(socket) => socket,
            None => UdpSocket::bind(&self.address).await?,
        };
        info!(input = %ctx.name(), address = ?socket.local_addr().ok(), "Listening for UDP messages");

        loop {
            let Some(mut pack) = ctx.next_pack().await else {
                break;
            };

            let received = tokio::select! {
                _ = ctx.stopped() => break,
                received = socket.recv(&mut pack.state.msg_bytes) => received,
            };

            match received {
                Ok(len) => {
                    pack.state.msg_bytes.truncate(len);
                    debug!(input = %ctx.name(), len, "Datagram received");
                    ctx.deliver(pack).await;
                }
                Err(e) => {
                    warn!(input = %ctx.name(), "UDP receive failed: {}", e);
                }
            }
        }

        info!(input = %ctx.name(), "UDP input stopped");
        Ok(())
    }
}

pub(super) fn udp_input(
    name: &str,
    settings: &PluginSettings,
) -> Result<InputWrapper, PluginError> {
    let settings: UdpInputSettings = parse_settings(name, settings)?;
    let address = settings.address;
    Ok(PluginWrapper::new(name, move || {
        Box::new(UdpInput::new(address.clone())) as Box<dyn Input>
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::pipeline::{EventBus, PackPool, PipelineExecutor};
    use crate::test_utils::{recording_config, Recorder};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use tokio_util::task::TaskTracker;

    #[tokio::test]
    async fn test_udp_input_delivers_datagrams() {
        let recorder = Recorder::default();
        let config = Arc::new(recording_config(&recorder, 2));
        let metrics = Arc::new(Metrics::new());
        let pool = PackPool::new(&config, metrics.clone()).unwrap();
        let shutdown = CancellationToken::new();
        let ctx = InputContext::new(
            "udp",
            pool.clone(),
            PipelineExecutor::new(metrics),
            EventBus::default(),
            shutdown.clone(),
            TaskTracker::new(),
        );

        let mut input = UdpInput::bind("127.0.0.1:0").await.unwrap();
        let addr = input.local_addr().unwrap();
        let task = tokio::spawn(async move { input.run(ctx).await });

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(br#"{"type":"ping","payload":"one"}"#, addr)
            .await
            .unwrap();
        client
            .send_to(br#"{"type":"ping","payload":"two"}"#, addr)
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while recorder.payloads().len() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        shutdown.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(recorder.payloads(), vec!["one", "two"]);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_udp_input_requires_address() {
        assert!(udp_input("udp", &PluginSettings::new()).is_err());
    }
}
