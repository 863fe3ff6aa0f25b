use std::fmt;

/// Content name under which all session channels are registered with the
/// signaling layer.
pub const CONTENT_NAME: &str = "remodesk";

/// Namespace identifying session content descriptions.
pub const CONTENT_NAMESPACE: &str = "urn:remodesk:session:1";

/// The five fixed sub-channels of a session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Control,
    Event,
    Video,
    VideoRtp,
    VideoRtcp,
}

const CHANNEL_KIND_CONTROL_STR: &str = "control";
const CHANNEL_KIND_EVENT_STR: &str = "event";
const CHANNEL_KIND_VIDEO_STR: &str = "video";
const CHANNEL_KIND_VIDEO_RTP_STR: &str = "videortp";
const CHANNEL_KIND_VIDEO_RTCP_STR: &str = "videortcp";

impl ChannelKind {
    /// All five channels, in bring-up order.
    pub const ALL: [ChannelKind; 5] = [
        ChannelKind::Control,
        ChannelKind::Event,
        ChannelKind::Video,
        ChannelKind::VideoRtp,
        ChannelKind::VideoRtcp,
    ];

    /// Wire name of the channel, also the key-derivation label.
    pub fn name(&self) -> &'static str {
        match self {
            ChannelKind::Control => CHANNEL_KIND_CONTROL_STR,
            ChannelKind::Event => CHANNEL_KIND_EVENT_STR,
            ChannelKind::Video => CHANNEL_KIND_VIDEO_STR,
            ChannelKind::VideoRtp => CHANNEL_KIND_VIDEO_RTP_STR,
            ChannelKind::VideoRtcp => CHANNEL_KIND_VIDEO_RTCP_STR,
        }
    }

    /// Datagram channels carry RTP/RTCP; the rest are stream channels.
    pub fn is_datagram(&self) -> bool {
        matches!(self, ChannelKind::VideoRtp | ChannelKind::VideoRtcp)
    }

    pub fn from_name(name: &str) -> Option<ChannelKind> {
        match name {
            CHANNEL_KIND_CONTROL_STR => Some(ChannelKind::Control),
            CHANNEL_KIND_EVENT_STR => Some(ChannelKind::Event),
            CHANNEL_KIND_VIDEO_STR => Some(ChannelKind::Video),
            CHANNEL_KIND_VIDEO_RTP_STR => Some(ChannelKind::VideoRtp),
            CHANNEL_KIND_VIDEO_RTCP_STR => Some(ChannelKind::VideoRtcp),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
