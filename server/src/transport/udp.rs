use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::{
    net::UdpSocket,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use tether_shared::{
    ChannelError, ChannelId, Clock, EngineBuilder, Envelope, KcpEngineBuilder, PacketHandler,
    RecvError, UdpPacketSender, MAX_DATAGRAM_SIZE,
};

use crate::{ServerChannelTable, ServerConfig, ServerEvent};

// upper bound on how long the driver sleeps with nothing scheduled
const IDLE_WAKE: Duration = Duration::from_millis(100);

enum ServerCommand {
    Send {
        channel_id: ChannelId,
        envelope: Envelope,
        body: Vec<u8>,
    },
    Remove(ChannelId),
    Shutdown,
}

/// Cross-thread handle to a channel table owned by its driver task.
#[derive(Clone)]
pub struct ServerHandle {
    commands: UnboundedSender<ServerCommand>,
    closed: CancellationToken,
    local_addr: SocketAddr,
    max_body_length: i32,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Queues a packet for an established channel. Oversized bodies are
    /// rejected here; failures on the driver end the channel and surface as
    /// [`ServerEvent::Disconnected`].
    pub fn send(
        &self,
        channel_id: ChannelId,
        envelope: Envelope,
        body: &[u8],
    ) -> Result<(), ChannelError> {
        let too_large = i32::try_from(body.len()).map_or(true, |len| len > self.max_body_length);
        if too_large {
            return Err(ChannelError::BodyTooLarge {
                length: body.len(),
                max: self.max_body_length,
            });
        }

        self.commands
            .send(ServerCommand::Send {
                channel_id,
                envelope,
                body: body.to_vec(),
            })
            .map_err(|_| ChannelError::Disposed { channel_id })
    }

    pub fn remove_channel(&self, channel_id: ChannelId) {
        let _ = self.commands.send(ServerCommand::Remove(channel_id));
    }

    /// Disconnects every channel and stops the driver.
    pub fn shutdown(&self) {
        let _ = self.commands.send(ServerCommand::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the driver task has finished.
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}

/// Binds `address` and accepts channels on it from a new driver task, using
/// the KCP engine. Lifecycle events arrive on the returned receiver.
pub async fn listen(
    address: SocketAddr,
    config: ServerConfig,
    handler: Box<dyn PacketHandler>,
) -> io::Result<(ServerHandle, UnboundedReceiver<ServerEvent>)> {
    let engine_builder = Arc::new(KcpEngineBuilder::new(config.channel.engine.clone()));
    listen_with_engine(address, config, handler, engine_builder).await
}

/// Like [`listen`], with a caller-supplied reliable engine.
pub async fn listen_with_engine(
    address: SocketAddr,
    config: ServerConfig,
    handler: Box<dyn PacketHandler>,
    engine_builder: Arc<dyn EngineBuilder>,
) -> io::Result<(ServerHandle, UnboundedReceiver<ServerEvent>)> {
    let socket = Arc::new(UdpSocket::bind(address).await?);
    let local_addr = socket.local_addr()?;
    info!("listening on {}", local_addr);

    let max_body_length = config.channel.max_body_length;
    let clock = Clock::new();
    let sender = Arc::new(UdpPacketSender::new(socket.clone()));
    let table = ServerChannelTable::new(clock.now(), config, sender, engine_builder, handler);

    let (commands, command_receiver) = mpsc::unbounded_channel();
    let (events, event_receiver) = mpsc::unbounded_channel();
    let closed = CancellationToken::new();

    let driver = ServerDriver {
        socket,
        table,
        clock,
        commands: command_receiver,
        events,
        closed: closed.clone(),
    };
    tokio::spawn(driver.run());

    Ok((
        ServerHandle {
            commands,
            closed,
            local_addr,
            max_body_length,
        },
        event_receiver,
    ))
}

struct ServerDriver {
    socket: Arc<UdpSocket>,
    table: ServerChannelTable,
    clock: Clock,
    commands: UnboundedReceiver<ServerCommand>,
    events: UnboundedSender<ServerEvent>,
    closed: CancellationToken,
}

impl ServerDriver {
    async fn run(mut self) {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        let mut running = true;

        while running {
            let now = self.clock.now();
            self.table.update(now);
            self.forward_events();

            let wake = match self.table.next_deadline(now) {
                Some(tick) => self.clock.instant_of(now, tick),
                None => std::time::Instant::now() + IDLE_WAKE,
            };

            tokio::select! {
                received = self.socket.recv_from(&mut buffer) => match received {
                    Ok((len, from)) if len < buffer.len() => {
                        self.table.receive_datagram(self.clock.now(), from, &buffer[..len]);
                    }
                    Ok((_, from)) => {
                        let error = RecvError::Truncated { address: from, size: buffer.len() };
                        debug!("{}", error);
                    }
                    // one peer's failure must not stop the others
                    Err(error) => warn!("server socket error: {}", RecvError::Io { kind: error.kind() }),
                },
                command = self.commands.recv() => match command {
                    Some(ServerCommand::Send { channel_id, envelope, body }) => {
                        if let Err(error) = self.table.send(channel_id, envelope, &body) {
                            debug!("send on channel {} failed: {}", channel_id, error);
                        }
                    }
                    Some(ServerCommand::Remove(channel_id)) => {
                        self.table.remove_channel(channel_id);
                    }
                    Some(ServerCommand::Shutdown) | None => {
                        self.table.shutdown();
                        running = false;
                    }
                },
                _ = tokio::time::sleep_until(Instant::from_std(wake)) => {}
            }
        }

        self.forward_events();
        info!("server driver stopped");
        self.closed.cancel();
    }

    fn forward_events(&mut self) {
        for event in self.table.take_events() {
            if self.events.send(event).is_err() {
                debug!("server event dropped: receiver is gone");
            }
        }
    }
}
