use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use subpulse_core::{LiveFrame, PushEvent};
use subpulse_sdk::{SdkError, SdkResult};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// 实时通道地址；有身份时带 `user` 参数，否则匿名连接。
/// 只改写协议前缀，主机名里的 "http" 字样保持原样。
pub fn live_url(base_url: &str, identity: Option<i64>) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = match base.strip_prefix("http") {
        Some(rest) => format!("ws{}", rest),
        None => base.to_string(),
    };
    match identity {
        Some(user) => format!("{}/live?user={}", ws_base, user),
        None => format!("{}/live", ws_base),
    }
}

/// 下行文本帧到推送事件的翻译；无法解析的帧直接丢弃
pub fn frame_to_event(text: &str) -> Option<PushEvent> {
    match serde_json::from_str::<LiveFrame>(text) {
        Ok(LiveFrame::ReceiveNotification(payload)) => Some(payload.into()),
        Err(err) => {
            debug!(error = %err, "skipping unrecognized live frame");
            None
        }
    }
}

/// 一条已建立的实时连接：事件接收端 + 关闭信号
pub struct LiveConnection {
    events: mpsc::UnboundedReceiver<PushEvent>,
    shutdown: watch::Sender<bool>,
}

impl LiveConnection {
    pub fn new(events: mpsc::UnboundedReceiver<PushEvent>, shutdown: watch::Sender<bool>) -> Self {
        Self { events, shutdown }
    }

    /// 按服务端发送顺序接收事件；连接关闭后返回 None
    pub async fn recv(&mut self) -> Option<PushEvent> {
        self.events.recv().await
    }

    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// 连接器抽象，测试时可注入假实现
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(&self, url: &str) -> SdkResult<LiveConnection>;
}

/// 基于 tokio-tungstenite 的生产连接器
pub struct WsConnector;

#[async_trait]
impl LiveConnector for WsConnector {
    async fn connect(&self, url: &str) -> SdkResult<LiveConnection> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| SdkError::NetworkError(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    // 关闭信号或连接句柄被释放：停止转发，迟到帧一律丢弃
                    _ = shutdown_rx.changed() => break,
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(event) = frame_to_event(text.as_str()) {
                                if tx.send(event).is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if let Ok(text) = String::from_utf8(data.to_vec()) {
                                if let Some(event) = frame_to_event(&text) {
                                    if tx.send(event).is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                        Some(Ok(Message::Ping(_))) => {
                            if let Err(e) = write.send(Message::Pong(vec![].into())).await {
                                warn!(error = %e, "failed to send pong");
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("live channel closed by server");
                            break;
                        }
                        Some(Err(e)) => {
                            // 连接错误不上抛给用户，静默断开
                            warn!(error = %e, "live channel receive error");
                            break;
                        }
                        Some(Ok(_)) => {}
                    }
                }
            }
        });

        Ok(LiveConnection::new(rx, shutdown_tx))
    }
}

/// 连接生命周期管理器：每个会话至多一条连接，
/// 身份变化时先回收旧连接再建立新连接
pub struct LiveChannelManager {
    connector: Box<dyn LiveConnector>,
    base_url: String,
    identity: Option<i64>,
    connection: Option<LiveConnection>,
    state: ConnectionState,
}

impl LiveChannelManager {
    pub fn new(base_url: &str) -> Self {
        Self::with_connector(base_url, Box::new(WsConnector))
    }

    pub fn with_connector(base_url: &str, connector: Box<dyn LiveConnector>) -> Self {
        Self {
            connector,
            base_url: base_url.trim_end_matches('/').to_string(),
            identity: None,
            connection: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn identity(&self) -> Option<i64> {
        self.identity
    }

    /// 切换会话身份并重建连接；`None` 表示匿名连接。
    /// 连接失败不上抛，仅记录日志并停留在 Disconnected。
    pub async fn set_identity(&mut self, identity: Option<i64>) {
        self.teardown();
        self.identity = identity;
        self.state = ConnectionState::Connecting;

        let url = live_url(&self.base_url, identity);
        match self.connector.connect(&url).await {
            Ok(connection) => {
                info!(url = %url, "live channel connected");
                self.connection = Some(connection);
                self.state = ConnectionState::Connected;
            }
            Err(err) => {
                warn!(error = %err, url = %url, "live channel connect failed");
                self.state = ConnectionState::Disconnected;
            }
        }
    }

    /// 关闭当前连接并释放事件订阅；之后不再投递任何事件
    pub fn teardown(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
        self.state = ConnectionState::Disconnected;
    }

    /// 接收下一个推送事件；无连接或连接已关闭时返回 None
    pub async fn recv(&mut self) -> Option<PushEvent> {
        match &mut self.connection {
            Some(connection) => connection.recv().await,
            None => None,
        }
    }
}

impl Drop for LiveChannelManager {
    fn drop(&mut self) {
        self.teardown();
    }
}
