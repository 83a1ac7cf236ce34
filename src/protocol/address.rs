//! Contact address resolution.

use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

/// Domain suffix for group destinations.
const GROUP_DOMAIN: &str = "g.us";
/// Domain suffix for direct-message destinations.
const CONTACT_DOMAIN: &str = "s.whatsapp.net";

/// Destination kind for an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactType {
    Group,
    Contact,
}

impl FromStr for ContactType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "group" => Ok(Self::Group),
            "contact" => Ok(Self::Contact),
            other => Err(BridgeError::Validation(format!(
                "invalid contact_type: {other}"
            ))),
        }
    }
}

impl fmt::Display for ContactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group => write!(f, "group"),
            Self::Contact => write!(f, "contact"),
        }
    }
}

/// Resolve a raw contact id into a protocol address.
///
/// Groups get the group-domain suffix verbatim; direct contacts are
/// normalized by stripping every `+` before the direct-message suffix.
pub fn resolve_address(contact_type: ContactType, contact_id: &str) -> String {
    match contact_type {
        ContactType::Group => format!("{contact_id}@{GROUP_DOMAIN}"),
        ContactType::Contact => {
            let digits = contact_id.replace('+', "");
            format!("{digits}@{CONTACT_DOMAIN}")
        }
    }
}
