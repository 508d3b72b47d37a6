//! Privacy participation gate.
//!
//! Whether a given demand source may see a given auction request is a policy
//! decision owned by an external collaborator (TCF/GPP evaluation, publisher
//! block lists, jurisdiction rules). The exchange only consumes the decision:
//! deny, allow as-is, or allow with identifying fields stripped.

use crate::auction::types::AuctionRequest;

/// Decision for one (source, request) pair.
#[derive(Debug, Clone)]
pub enum Participation {
    /// The source must not see this request at all.
    Denied,
    /// The source receives the request unmodified.
    Allowed,
    /// The source participates, but with the supplied redacted request
    /// instead of the original.
    Redacted(Box<AuctionRequest>),
}

/// Consent/privacy gate consulted once per source before request building.
pub trait ConsentGate: Send + Sync {
    fn may_participate(&self, source: &str, request: &AuctionRequest) -> Participation;
}

/// Gate that admits every source with the request unmodified. The default
/// when the host wires no policy in.
#[derive(Debug, Default)]
pub struct AllowAll;

impl ConsentGate for AllowAll {
    fn may_participate(&self, _source: &str, _request: &AuctionRequest) -> Participation {
        Participation::Allowed
    }
}

/// Strip identifying fields from a request, for gates that allow a source
/// only without user data: user id and consent string go, device IP and
/// user-agent go, slots and pricing stay.
#[must_use]
pub fn redact_identifiers(request: &AuctionRequest) -> AuctionRequest {
    let mut redacted = request.clone();
    redacted.user = None;
    if let Some(device) = &mut redacted.device {
        device.ip = None;
        device.user_agent = None;
    }
    redacted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tests::auction_request;

    #[test]
    fn allow_all_admits_everything() {
        let request = auction_request(&[("top", &["dsp-a"])]);
        assert!(matches!(
            AllowAll.may_participate("dsp-a", &request),
            Participation::Allowed
        ));
    }

    #[test]
    fn redaction_strips_user_and_device_identifiers() {
        let mut request = auction_request(&[("top", &["dsp-a"])]);
        request.user = Some(crate::auction::types::UserInfo {
            id: Some("uid-1".to_string()),
            consent: Some("CPc...".to_string()),
        });
        request.device = Some(crate::auction::types::DeviceInfo {
            user_agent: Some("Mozilla/5.0".to_string()),
            ip: Some("203.0.113.7".to_string()),
            language: Some("en".to_string()),
        });

        let redacted = redact_identifiers(&request);
        assert!(redacted.user.is_none());
        let device = redacted.device.expect("device should remain");
        assert!(device.ip.is_none());
        assert!(device.user_agent.is_none());
        assert_eq!(device.language.as_deref(), Some("en"), "non-identifying fields stay");
        assert_eq!(redacted.slots.len(), request.slots.len());
    }
}
