//! Generic OpenRTB 2.x adapter.
//!
//! Turns the sanitized auction request into a plain OpenRTB bid request and
//! the source's OpenRTB bid response back into canonical bids. Configurable
//! per source: the endpoint, whether to send one request per impression, and
//! the currency to assume when the response omits one.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::adapter::{AdapterError, BidAdapter, BuildResult, ParseResult, Warning};
use crate::auction::types::{AuctionRequest, ImpressionSlot, MediaType, RawBid};
use crate::openrtb::{
    Banner, Bid, Device, Format, Imp, ImpExt, OpenRtbRequest, OpenRtbResponse, Site, User, Video,
};
use crate::transport::{HttpResponse, OutboundCall};

const OPENRTB_VERSION_HEADER: &str = "x-openrtb-version";
const OPENRTB_VERSION: &str = "2.5";

/// Per-source configuration for the generic adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRtbAdapterConfig {
    /// Bid endpoint URL
    pub endpoint: String,
    /// Send one outbound request per impression instead of one for all
    #[serde(default)]
    pub split_imps: bool,
    /// Currency assumed when a response carries no `cur` field
    #[serde(default)]
    pub bid_currency: Option<String>,
}

impl OpenRtbAdapterConfig {
    #[must_use]
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            split_imps: false,
            bid_currency: None,
        }
    }
}

/// A demand source reachable over plain OpenRTB 2.x.
pub struct OpenRtbAdapter {
    name: String,
    config: OpenRtbAdapterConfig,
}

impl OpenRtbAdapter {
    #[must_use]
    pub fn new(name: impl Into<String>, config: OpenRtbAdapterConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    fn to_openrtb(&self, request: &AuctionRequest, imps: Vec<Imp>, deadline: Duration) -> OpenRtbRequest {
        OpenRtbRequest {
            id: request.id.clone(),
            imp: imps,
            site: Some(Site {
                domain: Some(request.publisher.domain.clone()),
                page: request.publisher.page_url.clone(),
                extra: HashMap::new(),
            }),
            device: request.device.as_ref().map(|device| Device {
                ua: device.user_agent.clone(),
                ip: device.ip.clone(),
                language: device.language.clone(),
                extra: HashMap::new(),
            }),
            user: request.user.as_ref().map(|user| User {
                id: user.id.clone(),
                consent: user.consent.clone(),
                extra: HashMap::new(),
            }),
            test: request.test.then_some(1),
            tmax: Some(deadline.as_millis() as u64),
            cur: request.currencies.clone(),
            extra: HashMap::new(),
        }
    }

    fn to_imp(slot: &ImpressionSlot) -> Imp {
        let banner_formats: Vec<Format> = slot
            .formats
            .iter()
            .filter(|format| format.media_type == MediaType::Banner)
            .map(|format| Format {
                w: format.width,
                h: format.height,
            })
            .collect();

        let video = slot
            .formats
            .iter()
            .find(|format| format.media_type == MediaType::Video)
            .map(|format| Video {
                w: Some(format.width),
                h: Some(format.height),
                maxduration: None,
                extra: HashMap::new(),
            });

        // The sanitized slot carries exactly one bidder entry: this source's.
        let params = slot.bidders.values().next().cloned();

        Imp {
            id: slot.id.clone(),
            banner: (!banner_formats.is_empty()).then(|| Banner {
                format: banner_formats,
                extra: HashMap::new(),
            }),
            video,
            bidfloor: slot.floor_price,
            bidfloorcur: slot.floor_currency.clone(),
            ext: params.map(|bidder| ImpExt {
                bidder: Some(bidder),
                extra: HashMap::new(),
            }),
            extra: HashMap::new(),
        }
    }

    fn encode(&self, openrtb: &OpenRtbRequest) -> Result<OutboundCall, AdapterError> {
        let body = serde_json::to_vec(openrtb)
            .map_err(|e| AdapterError::build(format!("failed to encode bid request: {e}")))?;
        Ok(
            OutboundCall::post_json(self.config.endpoint.clone(), Bytes::from(body))
                .with_header(OPENRTB_VERSION_HEADER, OPENRTB_VERSION),
        )
    }

    fn parse_bid(bid: &Bid, currency: Option<&str>) -> Result<RawBid, Warning> {
        let slot_id = bid
            .impid
            .clone()
            .filter(|impid| !impid.is_empty())
            .ok_or_else(|| Warning::bid_invalid("bid without impid"))?;

        if !bid.price.is_finite() {
            return Err(Warning::bid_invalid(format!(
                "bid for slot '{slot_id}' has non-numeric price"
            )));
        }

        let media_type = if bid.dur.is_some() {
            MediaType::Video
        } else {
            MediaType::Banner
        };

        Ok(RawBid {
            slot_id,
            price: bid.price,
            currency: currency.map(str::to_string),
            creative: bid.adm.clone(),
            deal_id: bid.dealid.clone(),
            adomain: bid.adomain.clone(),
            categories: bid.cat.clone(),
            duration_sec: bid.dur,
            width: bid.w,
            height: bid.h,
            media_type,
        })
    }
}

impl BidAdapter for OpenRtbAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_requests(&self, request: &AuctionRequest, deadline: Duration) -> BuildResult {
        if let Err(e) = Url::parse(&self.config.endpoint) {
            return BuildResult::error(AdapterError::build(format!(
                "invalid endpoint '{}': {e}",
                self.config.endpoint
            )));
        }

        let mut calls = Vec::new();
        if self.config.split_imps {
            for slot in &request.slots {
                let openrtb =
                    self.to_openrtb(request, vec![Self::to_imp(slot)], deadline);
                match self.encode(&openrtb) {
                    Ok(call) => calls.push(call),
                    Err(error) => return BuildResult::error(error),
                }
            }
        } else {
            let imps = request.slots.iter().map(Self::to_imp).collect();
            let openrtb = self.to_openrtb(request, imps, deadline);
            match self.encode(&openrtb) {
                Ok(call) => calls.push(call),
                Err(error) => return BuildResult::error(error),
            }
        }

        BuildResult::calls(calls)
    }

    fn parse_response(&self, _call: &OutboundCall, response: &HttpResponse) -> ParseResult {
        if response.status.as_u16() == 204 {
            return ParseResult::empty();
        }
        if !response.status.is_success() {
            return ParseResult::error(AdapterError::parse(format!(
                "unexpected status {}",
                response.status
            )));
        }

        let parsed: OpenRtbResponse = match serde_json::from_slice(&response.body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ParseResult::error(AdapterError::parse(format!(
                    "failed to decode bid response: {e}"
                )))
            }
        };

        let currency = parsed
            .cur
            .as_deref()
            .or(self.config.bid_currency.as_deref());

        let mut result = ParseResult::empty();
        for seatbid in &parsed.seatbid {
            for bid in &seatbid.bid {
                match Self::parse_bid(bid, currency) {
                    Ok(raw) => result.bids.push(raw),
                    Err(warning) => result.warnings.push(warning),
                }
            }
        }
        result
    }

    fn supports_media_type(&self, media_type: MediaType) -> bool {
        matches!(media_type, MediaType::Banner | MediaType::Video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tests::auction_request;
    use http::StatusCode;

    const DEADLINE: Duration = Duration::from_millis(850);

    fn adapter() -> OpenRtbAdapter {
        OpenRtbAdapter::new(
            "dsp-a",
            OpenRtbAdapterConfig::for_endpoint("https://bid.dsp-a.example/rtb"),
        )
    }

    fn decode_body(call: &OutboundCall) -> OpenRtbRequest {
        serde_json::from_slice(&call.body).expect("body should be OpenRTB JSON")
    }

    #[test]
    fn builds_one_call_with_all_impressions() {
        let mut request = auction_request(&[("top", &["dsp-a"]), ("side", &["dsp-a"])]);
        request.slots[0].floor_price = Some(1.5);

        let built = adapter().build_requests(&request, DEADLINE);
        assert_eq!(built.calls.len(), 1);
        assert!(built.error.is_none());

        let openrtb = decode_body(&built.calls[0]);
        assert_eq!(openrtb.imp.len(), 2);
        assert_eq!(openrtb.tmax, Some(850));
        assert_eq!(openrtb.imp[0].bidfloor, Some(1.5));
        assert!(openrtb.imp[0].banner.is_some());
        assert!(
            built.calls[0]
                .headers
                .iter()
                .any(|(name, value)| name == OPENRTB_VERSION_HEADER && value == OPENRTB_VERSION),
            "version header must be set"
        );
    }

    #[test]
    fn split_imps_builds_one_call_per_impression() {
        let request = auction_request(&[("top", &["dsp-a"]), ("side", &["dsp-a"])]);
        let adapter = OpenRtbAdapter::new("dsp-a", OpenRtbAdapterConfig {
            endpoint: "https://bid.dsp-a.example/rtb".to_string(),
            split_imps: true,
            bid_currency: None,
        });

        let built = adapter.build_requests(&request, DEADLINE);
        assert_eq!(built.calls.len(), 2);
        assert_eq!(decode_body(&built.calls[0]).imp.len(), 1);
    }

    #[test]
    fn invalid_endpoint_is_a_build_error() {
        let adapter =
            OpenRtbAdapter::new("dsp-a", OpenRtbAdapterConfig::for_endpoint("not a url"));
        let built = adapter.build_requests(&auction_request(&[("top", &["dsp-a"])]), DEADLINE);
        assert!(built.calls.is_empty());
        assert!(built.error.is_some());
    }

    #[test]
    fn bidder_params_travel_in_imp_ext() {
        let mut request = auction_request(&[("top", &["dsp-a"])]);
        request.slots[0]
            .bidders
            .insert("dsp-a".to_string(), serde_json::json!({"placement": 42}));

        let built = adapter().build_requests(&request, DEADLINE);
        let openrtb = decode_body(&built.calls[0]);
        let ext = openrtb.imp[0].ext.as_ref().expect("imp.ext present");
        assert_eq!(
            ext.bidder.as_ref().and_then(|b| b.get("placement")),
            Some(&serde_json::json!(42))
        );
    }

    fn response(body: &str) -> HttpResponse {
        HttpResponse::new(StatusCode::OK, Bytes::from(body.to_string()))
    }

    fn any_call() -> OutboundCall {
        OutboundCall::post_json("https://bid.dsp-a.example/rtb", Bytes::new())
    }

    #[test]
    fn parses_bids_with_the_response_currency() {
        let parsed = adapter().parse_response(
            &any_call(),
            &response(
                r#"{"cur":"EUR","seatbid":[{"seat":"dsp-a","bid":[
                    {"impid":"top","price":2.5,"adm":"<div/>","dealid":"d7","w":300,"h":250}
                ]}]}"#,
            ),
        );

        assert!(parsed.error.is_none());
        assert_eq!(parsed.bids.len(), 1);
        let bid = &parsed.bids[0];
        assert_eq!(bid.slot_id, "top");
        assert_eq!(bid.currency.as_deref(), Some("EUR"));
        assert_eq!(bid.deal_id.as_deref(), Some("d7"));
        assert_eq!(bid.media_type, MediaType::Banner);
    }

    #[test]
    fn missing_cur_falls_back_to_configured_bid_currency() {
        let adapter = OpenRtbAdapter::new("dsp-a", OpenRtbAdapterConfig {
            endpoint: "https://bid.dsp-a.example/rtb".to_string(),
            split_imps: false,
            bid_currency: Some("JPY".to_string()),
        });
        let parsed = adapter.parse_response(
            &any_call(),
            &response(r#"{"seatbid":[{"bid":[{"impid":"top","price":120.0,"adm":"<div/>"}]}]}"#),
        );
        assert_eq!(parsed.bids[0].currency.as_deref(), Some("JPY"));
    }

    #[test]
    fn no_content_means_no_bid_not_an_error() {
        let parsed = adapter().parse_response(
            &any_call(),
            &HttpResponse::new(StatusCode::NO_CONTENT, Bytes::new()),
        );
        assert!(parsed.bids.is_empty());
        assert!(parsed.error.is_none());
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        let parsed = adapter().parse_response(&any_call(), &response("{not json"));
        assert!(parsed.bids.is_empty());
        assert!(parsed.error.is_some());
    }

    #[test]
    fn server_error_status_is_a_parse_error() {
        let parsed = adapter().parse_response(
            &any_call(),
            &HttpResponse::new(StatusCode::BAD_GATEWAY, Bytes::new()),
        );
        assert!(parsed.error.is_some());
    }

    #[test]
    fn bids_without_impid_become_warnings_not_errors() {
        let parsed = adapter().parse_response(
            &any_call(),
            &response(
                r#"{"cur":"USD","seatbid":[{"bid":[
                    {"price":1.0,"adm":"<div/>"},
                    {"impid":"top","price":2.0,"adm":"<div/>"}
                ]}]}"#,
            ),
        );
        assert_eq!(parsed.bids.len(), 1);
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.error.is_none());
    }

    #[test]
    fn video_bids_are_typed_by_duration() {
        let parsed = adapter().parse_response(
            &any_call(),
            &response(
                r#"{"cur":"USD","seatbid":[{"bid":[
                    {"impid":"top","price":4.0,"adm":"<VAST/>","dur":15}
                ]}]}"#,
            ),
        );
        assert_eq!(parsed.bids[0].media_type, MediaType::Video);
        assert_eq!(parsed.bids[0].duration_sec, Some(15));
    }
}
