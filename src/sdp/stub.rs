//! A minimal, deterministic, in-memory stand-in for the ICE/DTLS/SDP
//! collaborators, sufficient to exercise the negotiation coordinator in this
//! crate's own tests. It performs no real networking and must never be used
//! against a live endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::Result;

use super::collaborators::{DtlsContext, IceAgent, MLineCounts, RtcpHelpers, SdpTransform, StreamId};

#[derive(Default)]
pub struct StubIceAgent {
    streams: Mutex<Vec<StreamId>>,
    done: AtomicBool,
    failed: AtomicBool,
}

impl IceAgent for StubIceAgent {
    fn init(&self, _stun_host: &str, _stun_port: u16, _rtp_min: u16, _rtp_max: u16) -> Result<()> {
        Ok(())
    }

    fn setup_local(&self, _is_offerer: bool, audio: bool, video: bool) -> Result<()> {
        let mut streams = self.streams.lock().expect("ice stub mutex poisoned");
        streams.clear();
        if audio {
            streams.push(StreamId(0));
        }
        if video {
            streams.push(StreamId(1));
        }
        // The stub considers candidate gathering instantly complete.
        self.done.store(true, Ordering::Release);
        Ok(())
    }

    fn setup_remote_candidate(&self, _stream_id: StreamId, _component_id: u8) -> Result<()> {
        Ok(())
    }

    fn streams_num(&self) -> usize {
        self.streams.lock().expect("ice stub mutex poisoned").len()
    }

    fn candidates_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    fn failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

pub struct StubDtlsContext;

impl DtlsContext for StubDtlsContext {
    fn init(&self, _cert_pem_path: &str, _cert_key_path: &str) -> Result<()> {
        Ok(())
    }
}

pub struct StubSdpTransform;

impl SdpTransform for StubSdpTransform {
    fn preparse(&self, sdp: &str) -> Result<MLineCounts> {
        let audio = sdp.matches("m=audio").count() as u32;
        let video = sdp.matches("m=video").count() as u32;
        Ok(MLineCounts { audio, video })
    }

    fn parse(&self, _sdp: &str) -> Result<()> {
        Ok(())
    }

    fn anonymize(&self, sdp: &str) -> Result<String> {
        // Strip any `a=ice-ufrag`/`a=ice-pwd`/`a=fingerprint` lines: these
        // carry the original peer's ICE/DTLS identity.
        let stripped: String = sdp
            .lines()
            .filter(|line| {
                !line.starts_with("a=ice-ufrag")
                    && !line.starts_with("a=ice-pwd")
                    && !line.starts_with("a=fingerprint")
            })
            .collect::<Vec<_>>()
            .join("\r\n");
        Ok(stripped)
    }

    fn merge(&self, stripped_sdp: &str) -> Result<String> {
        let mut merged = stripped_sdp.to_owned();
        merged.push_str("\r\na=ice-ufrag:gw\r\na=ice-pwd:gwpwd\r\n");
        Ok(merged)
    }
}

pub struct StubRtcpHelpers;

impl RtcpHelpers for StubRtcpHelpers {
    fn gen_pli(&self) -> Vec<u8> {
        vec![0x80, 0xce, 0x00, 0x02]
    }

    fn gen_fir(&self, seq: &mut i32) -> Vec<u8> {
        *seq += 1;
        vec![0x80, 0xce, 0x00, 0x04, *seq as u8]
    }

    fn gen_remb(&self, bitrate_bps: u32) -> Vec<u8> {
        let mut buf = vec![0x8f, 0xce, 0x00, 0x06];
        buf.extend_from_slice(&bitrate_bps.to_be_bytes());
        buf
    }

    fn has_pli(&self, buf: &[u8]) -> bool {
        buf.get(1) == Some(&0xce) && buf.get(3) == Some(&0x02)
    }

    fn has_fir(&self, buf: &[u8]) -> bool {
        buf.get(1) == Some(&0xce) && buf.get(3) == Some(&0x04)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preparse_counts_mlines() {
        let sdp = "v=0\r\nm=audio 1 RTP/AVP 0\r\nm=video 2 RTP/AVP 96\r\nm=video 3 RTP/AVP 97\r\n";
        let counts = StubSdpTransform.preparse(sdp).unwrap();
        assert_eq!(counts.audio, 1);
        assert_eq!(counts.video, 2);
    }

    #[test]
    fn anonymize_strips_identity_lines() {
        let sdp = "v=0\r\na=ice-ufrag:abcd\r\na=fingerprint:sha-256 AA\r\nm=audio 1 RTP/AVP 0\r\n";
        let anonymized = StubSdpTransform.anonymize(sdp).unwrap();
        assert!(!anonymized.contains("ice-ufrag"));
        assert!(!anonymized.contains("fingerprint"));
        assert!(anonymized.contains("m=audio"));
    }
}
