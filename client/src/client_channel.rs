use std::{collections::VecDeque, mem, net::SocketAddr, sync::Arc};

use log::{debug, info, trace, warn};

use tether_shared::{
    pack_packet, send_control, tick_less_than, BufferPool, Channel, ChannelConfig, ChannelError,
    ChannelId, ControlHeader, DisposeReason, EngineBuilder, Envelope, MessageKind, PacketHandler,
    PacketSender, PooledBuffer, ReliableStream, SegmentOutput, StreamFault, Tick, TimeWheel,
    TimerKey, Timers, CONTROL_HEADER_SIZE, DEFAULT_BUFFER_CAPACITY,
};

use crate::{events::ClientEvent, ClientConfig};

/// Handshake state of a [`ClientChannel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    AwaitingConfirm,
    Established,
    Closed,
}

enum ClientTimer {
    ConnectTimeout,
}

/// The connecting side of one channel.
///
/// Holds no socket and no clock: datagrams come in through
/// [`ClientChannel::receive_datagram`], time through [`ClientChannel::update`],
/// and everything outbound goes to the injected [`PacketSender`]. Lifecycle
/// changes are queued as [`ClientEvent`]s.
pub struct ClientChannel {
    config: ChannelConfig,
    sender: Arc<dyn PacketSender>,
    engine_builder: Arc<dyn EngineBuilder>,
    handler: Box<dyn PacketHandler>,
    pool: BufferPool,

    state: ClientState,
    channel_id: ChannelId,
    remote: Option<SocketAddr>,
    stream: Option<ReliableStream>,
    // packets sent before the handshake completed, flushed in order
    cache: VecDeque<PooledBuffer>,
    timers: Timers<ClientTimer>,
    connect_timer: Option<TimerKey>,
    wheel: Option<TimeWheel>,
    events: VecDeque<ClientEvent>,
}

impl ClientChannel {
    pub fn new(
        config: ClientConfig,
        sender: Arc<dyn PacketSender>,
        engine_builder: Arc<dyn EngineBuilder>,
        handler: Box<dyn PacketHandler>,
    ) -> Self {
        let pool = BufferPool::new(DEFAULT_BUFFER_CAPACITY);

        Self {
            config: config.channel,
            sender,
            engine_builder,
            handler,
            pool,
            state: ClientState::Idle,
            channel_id: ChannelId::generate(),
            remote: None,
            stream: None,
            cache: VecDeque::new(),
            timers: Timers::new(),
            connect_timer: None,
            wheel: None,
            events: VecDeque::new(),
        }
    }

    /// Starts the handshake with `remote` under a freshly generated id.
    pub fn connect(&mut self, now: Tick, remote: SocketAddr) -> Result<ChannelId, ChannelError> {
        self.connect_with_channel_id(now, remote, ChannelId::generate())
    }

    /// Starts the handshake under a caller-chosen id. The id is still
    /// replaced if the server reports a collision.
    pub fn connect_with_channel_id(
        &mut self,
        now: Tick,
        remote: SocketAddr,
        channel_id: ChannelId,
    ) -> Result<ChannelId, ChannelError> {
        if self.state != ClientState::Idle {
            return Err(ChannelError::AlreadyConnected {
                channel_id: self.channel_id,
            });
        }

        self.channel_id = channel_id;
        self.remote = Some(remote);
        self.state = ClientState::AwaitingConfirm;
        self.wheel = Some(TimeWheel::new(now));
        self.connect_timer = Some(self.timers.schedule_once(
            now,
            self.config.connect_timeout_ms,
            ClientTimer::ConnectTimeout,
        ));

        info!("channel {} connecting to {}", channel_id, remote);
        self.send_signal(MessageKind::RequestConnection);

        Ok(channel_id)
    }

    /// Processes one datagram read from the socket.
    pub fn receive_datagram(&mut self, from: SocketAddr, datagram: &[u8]) {
        if self.remote != Some(from) {
            trace!("ignoring datagram from unknown peer {}", from);
            return;
        }
        if matches!(self.state, ClientState::Idle | ClientState::Closed) {
            return;
        }

        let (header, rest) = match ControlHeader::decode(datagram) {
            Ok(decoded) => decoded,
            Err(error) => {
                debug!("dropping datagram from {}: {}", from, error);
                return;
            }
        };
        if header.channel_id != self.channel_id {
            trace!(
                "ignoring {:?} for channel {}, current is {}",
                header.kind,
                header.channel_id,
                self.channel_id
            );
            return;
        }
        if header.kind.is_signal() && datagram.len() != CONTROL_HEADER_SIZE {
            debug!("dropping {:?} of {} bytes", header.kind, datagram.len());
            return;
        }

        match header.kind {
            MessageKind::WaitConfirmConnection => {
                if self.state == ClientState::AwaitingConfirm {
                    self.establish();
                }
            }
            MessageKind::RepeatChannelId => {
                if self.state == ClientState::AwaitingConfirm {
                    let previous = self.channel_id;
                    self.channel_id = ChannelId::regenerate(previous);
                    warn!(
                        "channel id {} already taken on {}, retrying as {}",
                        previous, from, self.channel_id
                    );
                    self.send_signal(MessageKind::RequestConnection);
                }
            }
            MessageKind::Disconnect => {
                self.dispose_with(DisposeReason::PeerDisconnect);
            }
            MessageKind::ReceiveData => {
                self.receive_segment(rest);
            }
            MessageKind::RequestConnection | MessageKind::ConfirmConnection => {
                trace!("ignoring server-bound {:?}", header.kind);
            }
        }
    }

    /// Queues an application packet. Before the handshake completes the
    /// packet is cached and flushed once the channel is established.
    pub fn send(&mut self, envelope: Envelope, body: &[u8]) -> Result<(), ChannelError> {
        match self.state {
            ClientState::Idle => return Err(ChannelError::NotConnected),
            ClientState::Closed => {
                return Err(ChannelError::Disposed {
                    channel_id: self.channel_id,
                })
            }
            ClientState::AwaitingConfirm | ClientState::Established => {}
        }

        let packet = pack_packet(&self.pool, envelope, body, self.config.max_body_length)?;

        if self.state == ClientState::AwaitingConfirm {
            if self.cache.len() >= self.config.max_cached_messages {
                warn!(
                    "channel {} dropped opcode {}: {} packets already waiting for the handshake",
                    self.channel_id,
                    envelope.opcode,
                    self.cache.len()
                );
                return Err(ChannelError::CacheFull {
                    channel_id: self.channel_id,
                    capacity: self.config.max_cached_messages,
                });
            }
            self.cache.push_back(packet);
            return Ok(());
        }

        self.send_established(packet)
    }

    /// Fires timers and drives the reliable engine if it is due.
    pub fn update(&mut self, now: Tick) {
        for timer in self.timers.take_expired(now) {
            match timer {
                ClientTimer::ConnectTimeout => {
                    self.connect_timer = None;
                    if self.state == ClientState::AwaitingConfirm {
                        warn!(
                            "channel {} not confirmed within {}ms",
                            self.channel_id, self.config.connect_timeout_ms
                        );
                        self.dispose_with(DisposeReason::ConnectTimeout);
                    }
                }
            }
        }

        let Some(wheel) = self.wheel.as_mut() else {
            return;
        };
        if !wheel.pop_due(now).contains(&self.channel_id) {
            return;
        }
        let Some(stream) = self.stream.as_mut() else {
            return;
        };

        match stream.update(now) {
            Ok(next) => wheel.add_deadline(self.channel_id, next),
            Err(fault) => self.fail(fault),
        }
    }

    /// Disposes the channel on behalf of the local application.
    pub fn dispose(&mut self) {
        self.dispose_with(DisposeReason::Local);
    }

    /// Single teardown path. Safe to call repeatedly; only the first call
    /// has any effect.
    pub fn dispose_with(&mut self, reason: DisposeReason) {
        let previous = mem::replace(&mut self.state, ClientState::Closed);
        if previous == ClientState::Closed {
            return;
        }

        if previous != ClientState::Idle && reason != DisposeReason::PeerDisconnect {
            self.send_signal(MessageKind::Disconnect);
        }

        if let Some(key) = self.connect_timer.take() {
            self.timers.cancel(key);
        }
        self.stream = None;
        self.cache.clear();
        if let Some(wheel) = self.wheel.as_mut() {
            wheel.clear();
        }

        info!("channel {} closed: {}", self.channel_id, reason);

        match previous {
            ClientState::Established => self.events.push_back(ClientEvent::Disconnected {
                channel_id: self.channel_id,
                reason,
            }),
            ClientState::AwaitingConfirm if reason != DisposeReason::Local => {
                self.events.push_back(ClientEvent::ConnectFailed {
                    channel_id: self.channel_id,
                    reason,
                })
            }
            _ => {}
        }
    }

    /// Earliest tick at which [`ClientChannel::update`] has work to do.
    pub fn next_deadline(&self, now: Tick) -> Option<Tick> {
        let engine = self.wheel.as_ref().and_then(|wheel| {
            if wheel.has_immediate() {
                Some(now)
            } else {
                wheel.next_deadline()
            }
        });
        let timer = self.timers.next_deadline(now);

        match (engine, timer) {
            (Some(engine), Some(timer)) => {
                Some(if tick_less_than(timer, engine) { timer } else { engine })
            }
            (engine, timer) => engine.or(timer),
        }
    }

    pub fn take_events(&mut self) -> Vec<ClientEvent> {
        self.events.drain(..).collect()
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    pub fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }

    pub fn is_established(&self) -> bool {
        self.state == ClientState::Established
    }

    pub fn is_closed(&self) -> bool {
        self.state == ClientState::Closed
    }

    /// Packets cached while waiting for the handshake.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Packets handed to the engine and not yet acknowledged.
    pub fn wait_send_count(&self) -> usize {
        self.stream.as_ref().map_or(0, ReliableStream::wait_send_count)
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    // Private

    fn establish(&mut self) {
        if let Some(key) = self.connect_timer.take() {
            self.timers.cancel(key);
        }
        let Some(remote) = self.remote else {
            return;
        };

        let output = SegmentOutput::new(self.sender.clone(), remote, self.channel_id);
        let engine = match self.engine_builder.build(self.channel_id, output) {
            Ok(engine) => engine,
            Err(error) => {
                warn!("channel {} engine not created: {}", self.channel_id, error);
                self.dispose_with(DisposeReason::EngineFailure);
                return;
            }
        };
        self.stream = Some(ReliableStream::new(
            self.channel_id,
            engine,
            self.config.max_body_length,
            self.config.engine.max_send_window,
        ));
        self.state = ClientState::Established;
        self.send_signal(MessageKind::ConfirmConnection);

        info!("channel {} connected to {}", self.channel_id, remote);
        self.events.push_back(ClientEvent::ConnectComplete {
            channel_id: self.channel_id,
        });

        if let Some(wheel) = self.wheel.as_mut() {
            wheel.add_deadline(self.channel_id, 0);
        }

        let cached = mem::take(&mut self.cache);
        debug!(
            "channel {} flushing {} cached packets",
            self.channel_id,
            cached.len()
        );
        for packet in cached {
            if self.send_established(packet).is_err() {
                return;
            }
        }
    }

    fn send_established(&mut self, packet: PooledBuffer) -> Result<(), ChannelError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(ChannelError::Disposed {
                channel_id: self.channel_id,
            });
        };

        match stream.send(packet) {
            Ok(()) => {
                if let Some(wheel) = self.wheel.as_mut() {
                    wheel.add_deadline(self.channel_id, 0);
                }
                Ok(())
            }
            Err(fault) => {
                let error = match &fault {
                    StreamFault::WindowOverflow { waiting, max } => ChannelError::WindowOverflow {
                        channel_id: self.channel_id,
                        waiting: *waiting,
                        max: *max,
                    },
                    _ => ChannelError::Disposed {
                        channel_id: self.channel_id,
                    },
                };
                self.fail(fault);
                Err(error)
            }
        }
    }

    fn receive_segment(&mut self, segment: &[u8]) {
        let Some(stream) = self.stream.as_mut() else {
            trace!("channel {} data before confirmation, dropped", self.channel_id);
            return;
        };

        if !stream.input(segment) {
            return;
        }
        if let Err(fault) = stream.drain(self.handler.as_mut()) {
            self.fail(fault);
            return;
        }

        if let Some(wheel) = self.wheel.as_mut() {
            wheel.add_deadline(self.channel_id, 0);
        }
    }

    fn fail(&mut self, fault: StreamFault) {
        warn!("channel {} failed: {}", self.channel_id, fault);
        self.dispose_with(fault.dispose_reason());
    }

    fn send_signal(&self, kind: MessageKind) {
        let Some(remote) = self.remote else {
            return;
        };
        if let Err(error) = send_control(self.sender.as_ref(), &remote, kind, self.channel_id) {
            debug!("{:?} for channel {} not sent: {}", kind, self.channel_id, error);
        }
    }
}

impl Channel for ClientChannel {
    fn send(
        &mut self,
        channel_id: ChannelId,
        envelope: Envelope,
        body: &[u8],
    ) -> Result<(), ChannelError> {
        if channel_id != self.channel_id {
            return Err(ChannelError::UnknownChannel { channel_id });
        }
        ClientChannel::send(self, envelope, body)
    }

    fn dispose(&mut self, channel_id: ChannelId) {
        if channel_id == self.channel_id {
            ClientChannel::dispose(self);
        }
    }

    fn on_update(&mut self, now: Tick) {
        self.update(now);
    }
}
