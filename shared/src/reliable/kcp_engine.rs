use kcp::Kcp;
use log::debug;

use crate::{
    reliable::{
        engine::{EngineBuilder, ReliableEngine, SegmentOutput},
        error::EngineError,
        settings::EngineSettings,
    },
    types::{ChannelId, Tick},
};

// kcp segment header
const KCP_OVERHEAD: usize = 24;
// kcp refuses a single send spanning its receive window of fragments
const SEGMENTS_PER_SEND: usize = 64;

/// [`ReliableEngine`] backed by the `kcp` crate. The channel id doubles as
/// the KCP conversation id.
///
/// The engine runs in stream mode: payload boundaries are not kept, the
/// packet framer on top restores them.
pub struct KcpEngine {
    kcp: Kcp<SegmentOutput>,
    send_chunk: usize,
}

impl KcpEngine {
    pub fn new(
        channel_id: ChannelId,
        output: SegmentOutput,
        settings: &EngineSettings,
    ) -> Result<Self, EngineError> {
        let mut kcp = Kcp::new_stream(channel_id.to_u32(), output);
        kcp.set_nodelay(
            settings.nodelay,
            settings.interval_ms,
            settings.fast_resend,
            settings.no_congestion_window,
        );
        kcp.set_rx_minrto(settings.min_rto_ms);

        let mut engine = Self {
            kcp,
            send_chunk: send_chunk(settings.mtu),
        };
        engine.set_window(settings.send_window, settings.receive_window);
        engine.set_mtu(settings.mtu)?;

        debug!(
            "kcp engine for channel {}: mtu {}, windows {}/{}",
            channel_id, settings.mtu, settings.send_window, settings.receive_window
        );
        Ok(engine)
    }
}

impl ReliableEngine for KcpEngine {
    fn input(&mut self, segment: &[u8]) -> Result<(), EngineError> {
        self.kcp
            .input(segment)
            .map(|_| ())
            .map_err(|error| EngineError::Input {
                reason: error.to_string(),
            })
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), EngineError> {
        for chunk in payload.chunks(self.send_chunk) {
            self.kcp.send(chunk).map_err(|error| EngineError::Send {
                size: payload.len(),
                reason: error.to_string(),
            })?;
        }
        Ok(())
    }

    fn peek_size(&self) -> i32 {
        match self.kcp.peeksize() {
            Ok(size) => i32::try_from(size).unwrap_or(i32::MAX),
            Err(_) => -1,
        }
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, EngineError> {
        self.kcp
            .recv(buffer)
            .map_err(|error| EngineError::Receive {
                reason: error.to_string(),
            })
    }

    fn update(&mut self, now: Tick) -> Result<(), EngineError> {
        self.kcp
            .update(now)
            .map_err(|error| EngineError::Update {
                reason: error.to_string(),
            })
    }

    fn check(&self, now: Tick) -> Tick {
        // kcp answers with a delay, callers want the tick
        match self.kcp.check(now) {
            0 => 0,
            delay => now.wrapping_add(delay),
        }
    }

    fn wait_send_count(&self) -> usize {
        self.kcp.wait_snd()
    }

    fn set_window(&mut self, send: u16, receive: u16) {
        self.kcp.set_wndsize(send, receive);
    }

    fn set_mtu(&mut self, mtu: usize) -> Result<(), EngineError> {
        self.kcp
            .set_mtu(mtu)
            .map_err(|_| EngineError::InvalidMtu { mtu })?;
        self.send_chunk = send_chunk(mtu);
        Ok(())
    }
}

fn send_chunk(mtu: usize) -> usize {
    mtu.saturating_sub(KCP_OVERHEAD).max(1) * SEGMENTS_PER_SEND
}

/// Builds a [`KcpEngine`] per channel from shared settings.
#[derive(Clone, Debug, Default)]
pub struct KcpEngineBuilder {
    settings: EngineSettings,
}

impl KcpEngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }
}

impl EngineBuilder for KcpEngineBuilder {
    fn build(
        &self,
        channel_id: ChannelId,
        output: SegmentOutput,
    ) -> Result<Box<dyn ReliableEngine>, EngineError> {
        Ok(Box::new(KcpEngine::new(channel_id, output, &self.settings)?))
    }
}
