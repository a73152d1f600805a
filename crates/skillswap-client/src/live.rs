use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use uuid::Uuid;

use skillswap_types::events::{GatewayCommand, GatewayEvent};

use crate::error::{ClientError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// A live gateway connection. Events arrive through [`Subscription::next`];
/// dropping the handle closes the socket.
#[derive(Debug)]
pub struct Subscription {
    user_id: Uuid,
    events: mpsc::UnboundedReceiver<GatewayEvent>,
    commands: mpsc::UnboundedSender<GatewayCommand>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Connects, identifies and waits for `Ready`.
    pub async fn connect(url: &str, token: &str) -> Result<Self> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut sink, mut stream) = ws.split();

        send_command(
            &mut sink,
            &GatewayCommand::Identify {
                token: token.to_string(),
            },
        )
        .await?;

        let user_id = tokio::time::timeout(READY_TIMEOUT, wait_for_ready(&mut stream))
            .await
            .map_err(|_| ClientError::Gateway("timed out waiting for Ready".into()))??;
        debug!("Gateway ready for {}", user_id);

        let (events_tx, events) = mpsc::unbounded_channel();
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(pump(sink, stream, events_tx, commands_rx));

        Ok(Self {
            user_id,
            events,
            commands,
            task,
        })
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Next pushed event; `None` once the connection is gone.
    pub async fn next(&mut self) -> Option<GatewayEvent> {
        self.events.recv().await
    }

    /// Follow the chat rooms shared with these peers.
    pub fn follow(&self, peer_ids: Vec<Uuid>) -> Result<()> {
        self.command(GatewayCommand::Subscribe { peer_ids })
    }

    pub fn unfollow(&self, peer_ids: Vec<Uuid>) -> Result<()> {
        self.command(GatewayCommand::Unsubscribe { peer_ids })
    }

    fn command(&self, cmd: GatewayCommand) -> Result<()> {
        self.commands
            .send(cmd)
            .map_err(|_| ClientError::Gateway("connection closed".into()))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn wait_for_ready(stream: &mut SplitStream<WsStream>) -> Result<Uuid> {
    while let Some(msg) = stream.next().await {
        match msg? {
            Message::Text(text) => {
                return match serde_json::from_str::<GatewayEvent>(text.as_str())? {
                    GatewayEvent::Ready { user_id, .. } => Ok(user_id),
                    other => Err(ClientError::Gateway(format!("expected Ready, got {other:?}"))),
                };
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Err(ClientError::Gateway("closed before Ready".into()))
}

/// Moves events from the socket to the handle and commands the other way.
async fn pump(
    mut sink: SplitSink<WsStream, Message>,
    mut stream: SplitStream<WsStream>,
    events: mpsc::UnboundedSender<GatewayEvent>,
    mut commands: mpsc::UnboundedReceiver<GatewayCommand>,
) {
    loop {
        tokio::select! {
            msg = stream.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("Gateway read failed: {}", e);
                        break;
                    }
                };
                match serde_json::from_str::<GatewayEvent>(text.as_str()) {
                    Ok(GatewayEvent::Error { message }) => warn!("Gateway rejected a command: {}", message),
                    Ok(event) => {
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Unrecognised gateway event: {}", e),
                }
            }
            cmd = commands.recv() => {
                let Some(cmd) = cmd else { break };
                if let Err(e) = send_command(&mut sink, &cmd).await {
                    warn!("Gateway write failed: {}", e);
                    break;
                }
            }
        }
    }
    let _ = sink.close().await;
}

async fn send_command(sink: &mut SplitSink<WsStream, Message>, cmd: &GatewayCommand) -> Result<()> {
    let json = serde_json::to_string(cmd)?;
    sink.send(Message::text(json)).await?;
    Ok(())
}
