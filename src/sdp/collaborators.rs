//! Traits standing in for the external collaborators a real deployment
//! would plug in: the ICE agent, the DTLS-SRTP stack, the SDP subsystem and
//! the RTCP helpers. Only their contracts are specified here; `sdp::stub`
//! supplies a deterministic, non-networked implementation used by this
//! crate's own tests (it is not a production ICE/DTLS stack).

use anyhow::Result;

/// Parsed m-line counts produced by `SdpTransform::preparse`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MLineCounts {
    pub audio: u32,
    pub video: u32,
}

/// One negotiated media stream's two components (RTP and RTCP).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamId(pub u32);

pub trait IceAgent: Send + Sync {
    /// `init(stun_host, stun_port, rtp_min, rtp_max)`.
    fn init(&self, stun_host: &str, stun_port: u16, rtp_min: u16, rtp_max: u16) -> Result<()>;

    /// Sets up the local ICE agent in offerer or answerer role.
    fn setup_local(&self, is_offerer: bool, audio: bool, video: bool) -> Result<()>;

    fn setup_remote_candidate(&self, stream_id: StreamId, component_id: u8) -> Result<()>;

    /// Number of active streams for the local agent.
    fn streams_num(&self) -> usize;

    /// Whether local candidate gathering has completed for every stream.
    fn candidates_done(&self) -> bool;

    /// Whether the agent has given up gathering candidates.
    fn failed(&self) -> bool;
}

pub trait DtlsContext: Send + Sync {
    /// `init(cert_pem_path, cert_key_path)`.
    fn init(&self, cert_pem_path: &str, cert_key_path: &str) -> Result<()>;
}

pub trait SdpTransform: Send + Sync {
    /// `preparse(text, &audio, &video) -> parsed*`.
    fn preparse(&self, sdp: &str) -> Result<MLineCounts>;

    /// Populates the handle's media context from the remote SDP.
    fn parse(&self, sdp: &str) -> Result<()>;

    /// Strips the original peer's ICE/DTLS identity.
    fn anonymize(&self, sdp: &str) -> Result<String>;

    /// Merges in the gateway's own ICE/DTLS identity and candidates.
    fn merge(&self, stripped_sdp: &str) -> Result<String>;
}

pub trait RtcpHelpers: Send + Sync {
    fn gen_pli(&self) -> Vec<u8>;
    fn gen_fir(&self, seq: &mut i32) -> Vec<u8>;
    fn gen_remb(&self, bitrate_bps: u32) -> Vec<u8>;
    fn has_pli(&self, buf: &[u8]) -> bool;
    fn has_fir(&self, buf: &[u8]) -> bool;
}
