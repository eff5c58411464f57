use std::{
    collections::{HashMap, VecDeque},
    mem,
    net::SocketAddr,
    sync::Arc,
};

use log::{debug, info, trace, warn};

use tether_shared::{
    pack_packet, send_control, tick_less_than, BufferPool, Channel, ChannelConfig, ChannelError,
    ChannelId, ControlHeader, DisposeReason, EngineBuilder, Envelope, MessageKind, PacketHandler,
    PacketSender, ReliableStream, SegmentOutput, StreamFault, Tick, TimeWheel,
    CONTROL_HEADER_SIZE, DEFAULT_BUFFER_CAPACITY,
};

use crate::{
    channel_entry::ChannelEntry, events::ServerEvent, pending::PendingConnection, ServerConfig,
};

/// Every channel accepted on one server socket.
///
/// Like the client channel this is sans-IO: the owner feeds datagrams and
/// time in, and all output goes to the shared [`PacketSender`]. Engines are
/// only driven when the shared [`TimeWheel`] says they are due.
pub struct ServerChannelTable {
    config: ChannelConfig,
    sender: Arc<dyn PacketSender>,
    engine_builder: Arc<dyn EngineBuilder>,
    handler: Box<dyn PacketHandler>,
    pool: BufferPool,

    pending: HashMap<ChannelId, PendingConnection>,
    pending_expiry: TimeWheel,
    channels: HashMap<ChannelId, ChannelEntry>,
    update_wheel: TimeWheel,
    // channels that failed mid-pass, removed once the pass is over
    removals: Vec<(ChannelId, DisposeReason)>,
    events: VecDeque<ServerEvent>,
}

impl ServerChannelTable {
    pub fn new(
        now: Tick,
        config: ServerConfig,
        sender: Arc<dyn PacketSender>,
        engine_builder: Arc<dyn EngineBuilder>,
        handler: Box<dyn PacketHandler>,
    ) -> Self {
        Self {
            config: config.channel,
            sender,
            engine_builder,
            handler,
            pool: BufferPool::new(DEFAULT_BUFFER_CAPACITY),
            pending: HashMap::new(),
            pending_expiry: TimeWheel::new(now),
            channels: HashMap::new(),
            update_wheel: TimeWheel::new(now),
            removals: Vec::new(),
            events: VecDeque::new(),
        }
    }

    /// Processes one datagram read from the shared socket.
    pub fn receive_datagram(&mut self, now: Tick, from: SocketAddr, datagram: &[u8]) {
        let (header, rest) = match ControlHeader::decode(datagram) {
            Ok(decoded) => decoded,
            Err(error) => {
                debug!("dropping datagram from {}: {}", from, error);
                return;
            }
        };
        if header.kind.is_signal() && datagram.len() != CONTROL_HEADER_SIZE {
            debug!(
                "dropping {:?} of {} bytes from {}",
                header.kind,
                datagram.len(),
                from
            );
            return;
        }

        let channel_id = header.channel_id;
        match header.kind {
            MessageKind::RequestConnection => self.on_request(now, from, channel_id),
            MessageKind::ConfirmConnection => self.on_confirm(now, from, channel_id),
            MessageKind::Disconnect => self.on_disconnect(from, channel_id),
            MessageKind::ReceiveData => self.on_data(from, channel_id, rest),
            MessageKind::WaitConfirmConnection | MessageKind::RepeatChannelId => {
                trace!("ignoring client-bound {:?} from {}", header.kind, from);
            }
        }
        self.apply_removals();
    }

    /// Expires stale handshakes and drives every engine that is due.
    pub fn update(&mut self, now: Tick) {
        for channel_id in self.pending_expiry.pop_due(now) {
            // the id may have been confirmed, or re-requested with a later
            // deadline, since this one was scheduled
            let expired = self
                .pending
                .get(&channel_id)
                .is_some_and(|pending| pending.is_expired(now));
            if !expired {
                continue;
            }
            if let Some(pending) = self.pending.remove(&channel_id) {
                debug!(
                    "pending channel {} from {} timed out after {}ms",
                    channel_id,
                    pending.address,
                    now.wrapping_sub(pending.created_at)
                );
            }
        }

        for channel_id in self.update_wheel.pop_due(now) {
            let Some(entry) = self.channels.get_mut(&channel_id) else {
                continue;
            };
            match entry.stream.update(now) {
                Ok(next) => self.update_wheel.add_deadline(channel_id, next),
                Err(fault) => {
                    warn!("channel {} failed: {}", channel_id, fault);
                    self.removals.push((channel_id, fault.dispose_reason()));
                }
            }
        }

        self.apply_removals();
    }

    /// Packs and queues an application packet on an established channel.
    pub fn send(
        &mut self,
        channel_id: ChannelId,
        envelope: Envelope,
        body: &[u8],
    ) -> Result<(), ChannelError> {
        let Some(entry) = self.channels.get_mut(&channel_id) else {
            return Err(ChannelError::UnknownChannel { channel_id });
        };

        let packet = pack_packet(&self.pool, envelope, body, self.config.max_body_length)?;
        match entry.stream.send(packet) {
            Ok(()) => {
                self.update_wheel.add_deadline(channel_id, 0);
                Ok(())
            }
            Err(fault) => {
                warn!("channel {} failed: {}", channel_id, fault);
                let error = match &fault {
                    StreamFault::WindowOverflow { waiting, max } => ChannelError::WindowOverflow {
                        channel_id,
                        waiting: *waiting,
                        max: *max,
                    },
                    _ => ChannelError::Disposed { channel_id },
                };
                self.dispose_channel(channel_id, fault.dispose_reason());
                Err(error)
            }
        }
    }

    /// Removes a channel, established or pending. Established channels get
    /// a `Disconnect` and a [`ServerEvent::Disconnected`]. Returns whether
    /// anything was removed.
    pub fn remove_channel(&mut self, channel_id: ChannelId) -> bool {
        if self.channels.contains_key(&channel_id) {
            self.dispose_channel(channel_id, DisposeReason::Local);
            return true;
        }
        self.pending.remove(&channel_id).is_some()
    }

    /// Disposes every channel and forgets every pending handshake.
    pub fn shutdown(&mut self) {
        let channel_ids: Vec<ChannelId> = self.channels.keys().copied().collect();
        for channel_id in channel_ids {
            self.dispose_channel(channel_id, DisposeReason::Local);
        }
        self.pending.clear();
        self.pending_expiry.clear();
        self.update_wheel.clear();
    }

    /// Earliest tick at which [`ServerChannelTable::update`] has work to do.
    pub fn next_deadline(&self, now: Tick) -> Option<Tick> {
        if self.update_wheel.has_immediate() {
            return Some(now);
        }
        match (
            self.update_wheel.next_deadline(),
            self.pending_expiry.next_deadline(),
        ) {
            (Some(update), Some(expiry)) => {
                Some(if tick_less_than(expiry, update) { expiry } else { update })
            }
            (update, expiry) => update.or(expiry),
        }
    }

    pub fn take_events(&mut self) -> Vec<ServerEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_established(&self, channel_id: ChannelId) -> bool {
        self.channels.contains_key(&channel_id)
    }

    pub fn is_pending(&self, channel_id: ChannelId) -> bool {
        self.pending.contains_key(&channel_id)
    }

    pub fn channel_address(&self, channel_id: ChannelId) -> Option<SocketAddr> {
        self.channels.get(&channel_id).map(|entry| entry.address)
    }

    /// Tick at which the channel's handshake was confirmed.
    pub fn established_at(&self, channel_id: ChannelId) -> Option<Tick> {
        self.channels.get(&channel_id).map(|entry| entry.established_at)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.keys().copied()
    }

    pub fn wait_send_count(&self, channel_id: ChannelId) -> Option<usize> {
        self.channels
            .get(&channel_id)
            .map(|entry| entry.stream.wait_send_count())
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    // Private

    fn on_request(&mut self, now: Tick, from: SocketAddr, channel_id: ChannelId) {
        if let Some(pending) = self.pending.get(&channel_id) {
            if pending.address != from {
                warn!(
                    "channel id {} already pending for {}, refusing {}",
                    channel_id, pending.address, from
                );
                self.send_signal(&from, MessageKind::RepeatChannelId, channel_id);
            }
            // same peer retrying, already answered
            return;
        }
        if self.channels.contains_key(&channel_id) {
            warn!(
                "channel id {} already established, refusing {}",
                channel_id, from
            );
            self.send_signal(&from, MessageKind::RepeatChannelId, channel_id);
            return;
        }

        let pending =
            PendingConnection::new(channel_id, from, now, self.config.pending_timeout_ms);
        // 0 would read as "due immediately"
        let expiry = match pending.timeout_at {
            0 => 1,
            tick => tick,
        };
        self.pending_expiry.add_deadline(channel_id, expiry);
        self.pending.insert(channel_id, pending);

        debug!("channel {} pending for {}", channel_id, from);
        self.send_signal(&from, MessageKind::WaitConfirmConnection, channel_id);
    }

    fn on_confirm(&mut self, now: Tick, from: SocketAddr, channel_id: ChannelId) {
        let Some(pending) = self.pending.get(&channel_id) else {
            trace!("confirm for channel {} without a pending request", channel_id);
            return;
        };
        if pending.address != from {
            warn!(
                "confirm for channel {} from {}, but it was requested by {}",
                channel_id, from, pending.address
            );
            return;
        }
        self.pending.remove(&channel_id);

        let output = SegmentOutput::new(self.sender.clone(), from, channel_id);
        let engine = match self.engine_builder.build(channel_id, output) {
            Ok(engine) => engine,
            Err(error) => {
                warn!("channel {} engine not created: {}", channel_id, error);
                self.send_signal(&from, MessageKind::Disconnect, channel_id);
                return;
            }
        };

        self.channels.insert(
            channel_id,
            ChannelEntry {
                channel_id,
                address: from,
                established_at: now,
                stream: ReliableStream::new(
                    channel_id,
                    engine,
                    self.config.max_body_length,
                    self.config.engine.max_send_window,
                ),
            },
        );
        self.update_wheel.add_deadline(channel_id, 0);

        info!("channel {} established with {}", channel_id, from);
        self.events.push_back(ServerEvent::Connected {
            channel_id,
            address: from,
        });
    }

    fn on_disconnect(&mut self, from: SocketAddr, channel_id: ChannelId) {
        if self.channel_address(channel_id) == Some(from) {
            self.removals.push((channel_id, DisposeReason::PeerDisconnect));
            return;
        }
        let abandoned = self
            .pending
            .get(&channel_id)
            .is_some_and(|pending| pending.address == from);
        if abandoned {
            self.pending.remove(&channel_id);
            debug!("pending channel {} abandoned by {}", channel_id, from);
        }
    }

    fn on_data(&mut self, from: SocketAddr, channel_id: ChannelId, segment: &[u8]) {
        let Some(entry) = self.channels.get_mut(&channel_id) else {
            trace!("data for unknown channel {} from {}", channel_id, from);
            return;
        };
        if entry.address != from {
            debug!(
                "data for channel {} from {}, expected {}",
                channel_id, from, entry.address
            );
            return;
        }

        if !entry.stream.input(segment) {
            return;
        }
        match entry.stream.drain(self.handler.as_mut()) {
            Ok(_) => self.update_wheel.add_deadline(channel_id, 0),
            Err(fault) => {
                warn!("channel {} failed: {}", channel_id, fault);
                self.removals.push((channel_id, fault.dispose_reason()));
            }
        }
    }

    fn apply_removals(&mut self) {
        for (channel_id, reason) in mem::take(&mut self.removals) {
            self.dispose_channel(channel_id, reason);
        }
    }

    fn dispose_channel(&mut self, channel_id: ChannelId, reason: DisposeReason) {
        let Some(entry) = self.channels.remove(&channel_id) else {
            return;
        };
        if reason != DisposeReason::PeerDisconnect {
            self.send_signal(&entry.address, MessageKind::Disconnect, channel_id);
        }

        info!(
            "channel {} with {} closed: {}",
            entry.channel_id, entry.address, reason
        );
        self.events.push_back(ServerEvent::Disconnected {
            channel_id: entry.channel_id,
            reason,
        });
    }

    fn send_signal(&self, address: &SocketAddr, kind: MessageKind, channel_id: ChannelId) {
        if let Err(error) = send_control(self.sender.as_ref(), address, kind, channel_id) {
            debug!("{:?} for channel {} not sent: {}", kind, channel_id, error);
        }
    }
}

impl Channel for ServerChannelTable {
    fn send(
        &mut self,
        channel_id: ChannelId,
        envelope: Envelope,
        body: &[u8],
    ) -> Result<(), ChannelError> {
        ServerChannelTable::send(self, channel_id, envelope, body)
    }

    fn dispose(&mut self, channel_id: ChannelId) {
        self.remove_channel(channel_id);
    }

    fn on_update(&mut self, now: Tick) {
        self.update(now);
    }
}
