use bytes::Bytes;
use serde::{Deserialize, Serialize};

use shared::crypto::SealedMasterKey;

use crate::config::{CandidateSessionConfig, SessionConfig};

/// Session payload carried inside a signaling content.
///
/// An initiate carries `candidate_config` plus the sealed master key; an
/// accept carries `final_config` plus the responder's certificate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentDescription {
    pub candidate_config: Option<CandidateSessionConfig>,
    pub final_config: Option<SessionConfig>,
    /// DER-encoded endpoint certificate.
    pub certificate: Option<Bytes>,
    pub sealed_master_key: Option<SealedMasterKey>,
    pub initiator_token: Option<String>,
    pub receiver_token: Option<String>,
}

/// One named content of a session description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub name: String,
    pub namespace: String,
    pub description: ContentDescription,
}

/// The full local or remote description held by the signaling layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub contents: Vec<ContentInfo>,
}

impl SessionDescription {
    /// Returns the first content carrying the given namespace, if any.
    pub fn first_content_by_type(&self, namespace: &str) -> Option<&ContentInfo> {
        self.contents.iter().find(|c| c.namespace == namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CONTENT_NAMESPACE;

    #[test]
    fn test_first_content_by_type() {
        let description = SessionDescription {
            contents: vec![
                ContentInfo {
                    name: "other".to_owned(),
                    namespace: "urn:other:1".to_owned(),
                    description: ContentDescription::default(),
                },
                ContentInfo {
                    name: "remodesk".to_owned(),
                    namespace: CONTENT_NAMESPACE.to_owned(),
                    description: ContentDescription {
                        initiator_token: Some("tok".to_owned()),
                        ..Default::default()
                    },
                },
            ],
        };

        let content = description.first_content_by_type(CONTENT_NAMESPACE);
        assert_eq!(
            content.and_then(|c| c.description.initiator_token.as_deref()),
            Some("tok")
        );
        assert!(description.first_content_by_type("urn:missing:1").is_none());
    }

    #[test]
    fn test_description_serde() {
        let description = SessionDescription {
            contents: vec![ContentInfo {
                name: "remodesk".to_owned(),
                namespace: CONTENT_NAMESPACE.to_owned(),
                description: ContentDescription {
                    candidate_config: Some(CandidateSessionConfig::default_config()),
                    certificate: Some(Bytes::from_static(b"\x30\x82")),
                    ..Default::default()
                },
            }],
        };

        let json = serde_json::to_string(&description).unwrap();
        let decoded: SessionDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, description);
    }
}
