use std::{
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use log::{debug, info, warn};
use tokio::{net::UdpSocket, sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;

use tether_shared::{
    ChannelError, ChannelId, Clock, DisposeReason, EngineBuilder, Envelope, KcpEngineBuilder,
    PacketHandler, RecvError, UdpPacketSender, MAX_DATAGRAM_SIZE,
};

use crate::{ClientChannel, ClientConfig, ClientEvent};

// upper bound on how long the driver sleeps with nothing scheduled
const IDLE_WAKE: Duration = Duration::from_millis(100);

type CompleteCallback = Box<dyn FnOnce(ChannelId) + Send>;
type CloseCallback = Box<dyn FnOnce(ChannelId, DisposeReason) + Send>;

/// Callbacks invoked on the driver task as the channel's lifecycle unfolds.
/// Each fires at most once.
#[derive(Default)]
pub struct ConnectCallbacks {
    on_complete: Option<CompleteCallback>,
    on_fail: Option<CloseCallback>,
    on_disconnect: Option<CloseCallback>,
}

impl ConnectCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handshake was confirmed.
    pub fn on_complete(mut self, callback: impl FnOnce(ChannelId) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// The channel closed before the handshake was confirmed.
    pub fn on_fail(
        mut self,
        callback: impl FnOnce(ChannelId, DisposeReason) + Send + 'static,
    ) -> Self {
        self.on_fail = Some(Box::new(callback));
        self
    }

    /// An established channel closed.
    pub fn on_disconnect(
        mut self,
        callback: impl FnOnce(ChannelId, DisposeReason) + Send + 'static,
    ) -> Self {
        self.on_disconnect = Some(Box::new(callback));
        self
    }

    fn fire(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::ConnectComplete { channel_id } => {
                if let Some(callback) = self.on_complete.take() {
                    callback(channel_id);
                }
            }
            ClientEvent::ConnectFailed { channel_id, reason } => {
                if let Some(callback) = self.on_fail.take() {
                    callback(channel_id, reason);
                }
            }
            ClientEvent::Disconnected { channel_id, reason } => {
                if let Some(callback) = self.on_disconnect.take() {
                    callback(channel_id, reason);
                }
            }
        }
    }
}

enum ClientCommand {
    Send { envelope: Envelope, body: Vec<u8> },
    Dispose,
}

/// Cross-thread handle to a channel owned by its driver task.
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::UnboundedSender<ClientCommand>,
    channel_id: Arc<AtomicU32>,
    closed: CancellationToken,
    local_addr: SocketAddr,
    max_body_length: i32,
}

impl ClientHandle {
    /// Current channel id. It changes if the server reports a collision
    /// during the handshake.
    pub fn channel_id(&self) -> ChannelId {
        ChannelId::new(self.channel_id.load(Ordering::Acquire))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Queues a packet for the driver. Oversized bodies are rejected here;
    /// other failures are reported through the callbacks.
    pub fn send(&self, envelope: Envelope, body: &[u8]) -> Result<(), ChannelError> {
        let too_large = i32::try_from(body.len()).map_or(true, |len| len > self.max_body_length);
        if too_large {
            return Err(ChannelError::BodyTooLarge {
                length: body.len(),
                max: self.max_body_length,
            });
        }

        self.commands
            .send(ClientCommand::Send {
                envelope,
                body: body.to_vec(),
            })
            .map_err(|_| ChannelError::Disposed {
                channel_id: self.channel_id(),
            })
    }

    /// Disposes the channel. Calling it again, or after the channel closed
    /// on its own, does nothing.
    pub fn dispose(&self) {
        let _ = self.commands.send(ClientCommand::Dispose);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the driver task has finished.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}

/// Binds an ephemeral UDP socket and starts the handshake with `remote` on
/// a new driver task, using the KCP engine.
pub async fn connect(
    remote: SocketAddr,
    config: ClientConfig,
    callbacks: ConnectCallbacks,
    handler: Box<dyn PacketHandler>,
) -> io::Result<ClientHandle> {
    let engine_builder = Arc::new(KcpEngineBuilder::new(config.channel.engine.clone()));
    connect_with_engine(remote, config, callbacks, handler, engine_builder).await
}

/// Like [`connect`], with a caller-supplied reliable engine.
pub async fn connect_with_engine(
    remote: SocketAddr,
    config: ClientConfig,
    callbacks: ConnectCallbacks,
    handler: Box<dyn PacketHandler>,
    engine_builder: Arc<dyn EngineBuilder>,
) -> io::Result<ClientHandle> {
    let unspecified = match remote.ip() {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    let socket = Arc::new(UdpSocket::bind(SocketAddr::new(unspecified, 0)).await?);
    let local_addr = socket.local_addr()?;

    let max_body_length = config.channel.max_body_length;
    let sender = Arc::new(UdpPacketSender::new(socket.clone()));
    let mut channel = ClientChannel::new(config, sender, engine_builder, handler);

    let clock = Clock::new();
    let channel_id = channel
        .connect(clock.now(), remote)
        .map_err(io::Error::other)?;

    let (commands, receiver) = mpsc::unbounded_channel();
    let closed = CancellationToken::new();
    let shared_id = Arc::new(AtomicU32::new(channel_id.to_u32()));

    let driver = ClientDriver {
        socket,
        channel,
        clock,
        commands: receiver,
        closed: closed.clone(),
        callbacks,
        channel_id: shared_id.clone(),
    };
    tokio::spawn(driver.run());

    Ok(ClientHandle {
        commands,
        channel_id: shared_id,
        closed,
        local_addr,
        max_body_length,
    })
}

struct ClientDriver {
    socket: Arc<UdpSocket>,
    channel: ClientChannel,
    clock: Clock,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
    closed: CancellationToken,
    callbacks: ConnectCallbacks,
    channel_id: Arc<AtomicU32>,
}

impl ClientDriver {
    async fn run(mut self) {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            let now = self.clock.now();
            self.channel.update(now);
            self.channel_id
                .store(self.channel.channel_id().to_u32(), Ordering::Release);
            for event in self.channel.take_events() {
                self.callbacks.fire(event);
            }
            if self.channel.is_closed() {
                break;
            }

            let wake = match self.channel.next_deadline(now) {
                Some(tick) => self.clock.instant_of(now, tick),
                None => std::time::Instant::now() + IDLE_WAKE,
            };

            tokio::select! {
                received = self.socket.recv_from(&mut buffer) => match received {
                    Ok((len, from)) if len < buffer.len() => {
                        self.channel.receive_datagram(from, &buffer[..len]);
                    }
                    Ok((_, from)) => {
                        let error = RecvError::Truncated { address: from, size: buffer.len() };
                        debug!("{}", error);
                    }
                    Err(error) => {
                        warn!("client socket error: {}", RecvError::Io { kind: error.kind() });
                        self.channel.dispose_with(DisposeReason::SocketError);
                    }
                },
                command = self.commands.recv() => match command {
                    Some(ClientCommand::Send { envelope, body }) => {
                        if let Err(error) = self.channel.send(envelope, &body) {
                            debug!("send on channel {} failed: {}", self.channel.channel_id(), error);
                        }
                    }
                    Some(ClientCommand::Dispose) | None => self.channel.dispose(),
                },
                _ = tokio::time::sleep_until(Instant::from_std(wake)) => {}
            }
        }

        info!("client driver for channel {} stopped", self.channel.channel_id());
        self.closed.cancel();
    }
}
