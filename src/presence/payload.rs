//! The outbound presence snapshot.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyPrivacy {
    #[default]
    Private,
    Public,
}

impl PartyPrivacy {
    /// Any level maps onto one of the two valid privacy values.
    pub fn from_level(level: i32) -> Self {
        match level.rem_euclid(2) {
            1 => Self::Public,
            _ => Self::Private,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageSlot {
    pub key: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Party {
    pub id: String,
    pub size: u32,
    pub max: u32,
    pub privacy: PartyPrivacy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Secrets {
    pub join: Option<String>,
    #[serde(rename = "match")]
    pub match_secret: Option<String>,
    pub spectate: Option<String>,
}

impl Secrets {
    pub fn is_empty(&self) -> bool {
        self.join.is_none() && self.match_secret.is_none() && self.spectate.is_none()
    }
}

/// Immutable snapshot built once per publish cycle and compared structurally
/// against the last one sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresencePayload {
    pub state: String,
    pub details: String,
    pub large_image: ImageSlot,
    pub small_image: ImageSlot,
    pub start_timestamp: Option<i64>,
    pub end_timestamp: Option<i64>,
    pub party: Option<Party>,
    pub secrets: Secrets,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privacy_levels_wrap() {
        assert_eq!(PartyPrivacy::from_level(0), PartyPrivacy::Private);
        assert_eq!(PartyPrivacy::from_level(1), PartyPrivacy::Public);
        assert_eq!(PartyPrivacy::from_level(3), PartyPrivacy::Public);
        assert_eq!(PartyPrivacy::from_level(-1), PartyPrivacy::Public);
    }

    #[test]
    fn payloads_compare_structurally() {
        let a = PresencePayload {
            state: "Playing".to_string(),
            ..PresencePayload::default()
        };
        let mut b = a.clone();
        assert_eq!(a, b);
        b.large_image.key = "grass".to_string();
        assert_ne!(a, b);
    }

    #[test]
    fn serializes_match_secret_name() {
        let payload = PresencePayload {
            secrets: Secrets {
                match_secret: Some("m".to_string()),
                ..Secrets::default()
            },
            ..PresencePayload::default()
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["secrets"]["match"], "m");
    }
}
