use std::fmt;

use serde::{Deserialize, Serialize};

/// Default protocol version advertised for every channel.
pub const DEFAULT_CHANNEL_VERSION: u32 = 2;

/// Transport flavor a channel runs over.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelTransportKind {
    Stream,
    Datagram,
}

impl fmt::Display for ChannelTransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelTransportKind::Stream => "stream",
            ChannelTransportKind::Datagram => "datagram",
        };
        write!(f, "{s}")
    }
}

/// Codec carried on the video channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    Verbatim,
    Vp8,
    Zip,
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VideoCodec::Verbatim => "verbatim",
            VideoCodec::Vp8 => "vp8",
            VideoCodec::Zip => "zip",
        };
        write!(f, "{s}")
    }
}

/// Parameters for one logical channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub transport: ChannelTransportKind,
    pub version: u32,
    pub codec: Option<VideoCodec>,
}

impl ChannelConfig {
    pub fn new(transport: ChannelTransportKind, version: u32, codec: Option<VideoCodec>) -> Self {
        ChannelConfig {
            transport,
            version,
            codec,
        }
    }
}

/// The single configuration both peers commit to after negotiation.
/// Write-once on the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub control: ChannelConfig,
    pub event: ChannelConfig,
    pub video: ChannelConfig,
}

/// The set of configurations an endpoint is willing to accept, per channel,
/// in preference order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSessionConfig {
    pub control: Vec<ChannelConfig>,
    pub event: Vec<ChannelConfig>,
    pub video: Vec<ChannelConfig>,
}

impl CandidateSessionConfig {
    /// Candidate set every endpoint supports out of the box.
    pub fn default_config() -> Self {
        let stream = |codec| {
            ChannelConfig::new(ChannelTransportKind::Stream, DEFAULT_CHANNEL_VERSION, codec)
        };
        CandidateSessionConfig {
            control: vec![stream(None)],
            event: vec![stream(None)],
            video: vec![
                stream(Some(VideoCodec::Vp8)),
                stream(Some(VideoCodec::Verbatim)),
                stream(Some(VideoCodec::Zip)),
            ],
        }
    }

    /// Whether `config` is a member of this candidate set, channel by channel.
    pub fn is_supported(&self, config: &SessionConfig) -> bool {
        self.control.contains(&config.control)
            && self.event.contains(&config.event)
            && self.video.contains(&config.video)
    }

    /// Responder-side narrowing: picks the first entry of `self` per channel
    /// that the peer also offers. `None` when any channel has no overlap.
    pub fn select_common(&self, other: &CandidateSessionConfig) -> Option<SessionConfig> {
        let pick = |ours: &[ChannelConfig], theirs: &[ChannelConfig]| {
            ours.iter().find(|c| theirs.contains(c)).copied()
        };

        Some(SessionConfig {
            control: pick(&self.control, &other.control)?,
            event: pick(&self.event, &other.event)?,
            video: pick(&self.video, &other.video)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(codec: Option<VideoCodec>) -> ChannelConfig {
        ChannelConfig::new(ChannelTransportKind::Stream, DEFAULT_CHANNEL_VERSION, codec)
    }

    #[test]
    fn test_default_config_supports_itself() {
        let candidates = CandidateSessionConfig::default_config();
        let selected = candidates.select_common(&candidates);
        assert!(selected.is_some());
        if let Some(config) = selected {
            assert!(candidates.is_supported(&config));
            assert_eq!(config.video.codec, Some(VideoCodec::Vp8));
        }
    }

    #[test]
    fn test_is_supported_rejects_unknown_entry() {
        let candidates = CandidateSessionConfig::default_config();
        let config = SessionConfig {
            control: stream(None),
            event: stream(None),
            video: ChannelConfig::new(ChannelTransportKind::Datagram, 9, Some(VideoCodec::Vp8)),
        };
        assert!(!candidates.is_supported(&config));
    }

    #[test]
    fn test_select_common_prefers_own_order() {
        let ours = CandidateSessionConfig {
            control: vec![stream(None)],
            event: vec![stream(None)],
            video: vec![stream(Some(VideoCodec::Zip)), stream(Some(VideoCodec::Vp8))],
        };
        let theirs = CandidateSessionConfig {
            control: vec![stream(None)],
            event: vec![stream(None)],
            video: vec![stream(Some(VideoCodec::Vp8)), stream(Some(VideoCodec::Zip))],
        };

        let selected = ours.select_common(&theirs);
        assert_eq!(
            selected.map(|c| c.video.codec),
            Some(Some(VideoCodec::Zip))
        );
    }

    #[test]
    fn test_select_common_no_overlap() {
        let ours = CandidateSessionConfig {
            control: vec![stream(None)],
            event: vec![stream(None)],
            video: vec![stream(Some(VideoCodec::Zip))],
        };
        let theirs = CandidateSessionConfig {
            control: vec![stream(None)],
            event: vec![stream(None)],
            video: vec![stream(Some(VideoCodec::Vp8))],
        };
        assert_eq!(ours.select_common(&theirs), None);
    }

    #[test]
    fn test_session_config_serde() {
        let candidates = CandidateSessionConfig::default_config();
        let json = serde_json::to_string(&candidates).unwrap();
        let decoded: CandidateSessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, candidates);
    }
}
