//! HTTP offer/answer signaling
//!
//! One `POST /api/v1/pipecat/rtc/offer` round trip carries the complete
//! (non-trickled) offer and returns the complete answer. Higher setup
//! latency than the WebSocket strategy (the caller must wait for full ICE
//! gathering first), but no persistent connection to manage.

use super::protocol::{AnswerResponse, OfferRequest, SdpKind, SdpPayload};
use super::{SignalEvent, SignalingTransport};
use crate::config::AudioCodec;
use crate::{Error, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

/// Request/response signaling over the backend REST API
pub struct HttpSignaling {
    http: reqwest::Client,
    offer_url: Url,
    access_token: String,
    codec_filter: Option<AudioCodec>,
}

impl HttpSignaling {
    /// Path of the offer endpoint under the API base
    pub const OFFER_PATH: &'static str = "/api/v1/pipecat/rtc/offer";

    /// Create a transport for the given backend
    pub fn new(
        api_base_url: &str,
        access_token: &str,
        codec_filter: Option<AudioCodec>,
    ) -> Result<Self> {
        let base = Url::parse(api_base_url)
            .map_err(|e| Error::InvalidConfig(format!("Invalid API base URL: {}", e)))?;
        let offer_url = base
            .join(Self::OFFER_PATH)
            .map_err(|e| Error::InvalidConfig(format!("Invalid offer URL: {}", e)))?;

        Ok(Self {
            http: reqwest::Client::new(),
            offer_url,
            access_token: access_token.to_string(),
            codec_filter,
        })
    }
}

#[async_trait]
impl SignalingTransport for HttpSignaling {
    fn trickles(&self) -> bool {
        false
    }

    async fn send_offer(&self, mut offer: OfferRequest) -> Result<Option<SdpPayload>> {
        if let Some(codec) = self.codec_filter {
            offer.sdp = filter_audio_codec(&offer.sdp, codec);
        }

        debug!(pc_id = %offer.pc_id, "Posting offer to {}", self.offer_url);

        let response = self
            .http
            .post(self.offer_url.clone())
            .bearer_auth(&self.access_token)
            .json(&offer)
            .send()
            .await
            .map_err(|e| Error::SignalingError(format!("Offer POST failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Offer rejected by backend");
            return Err(Error::SignalingError(format!(
                "Backend rejected offer ({}): {}",
                status, body
            )));
        }

        let answer: AnswerResponse = response
            .json()
            .await
            .map_err(|e| Error::SerializationError(format!("Invalid answer body: {}", e)))?;

        Ok(Some(SdpPayload {
            sdp: answer.sdp,
            kind: SdpKind::Answer,
        }))
    }

    async fn send_candidate(&self, _candidate: Option<super::protocol::CandidatePayload>) -> Result<()> {
        // Candidates ride inside the fully-gathered offer on this strategy.
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::Receiver<SignalEvent>> {
        None
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Restrict the audio m-line of an SDP to the given codec.
///
/// Payload types whose `a=rtpmap` names another codec are removed from the
/// audio media description together with their `a=fmtp`/`a=rtcp-fb` lines.
/// Video and application sections pass through untouched.
pub fn filter_audio_codec(sdp: &str, codec: AudioCodec) -> String {
    let wanted = codec.sdp_name().to_ascii_lowercase();

    // Payload types to drop: rtpmap entries in the audio section naming a
    // different codec.
    let mut dropped: Vec<String> = Vec::new();
    let mut in_audio = false;
    for line in sdp.lines() {
        if line.starts_with("m=") {
            in_audio = line.starts_with("m=audio");
            continue;
        }
        if !in_audio {
            continue;
        }
        if let Some(rest) = line.strip_prefix("a=rtpmap:") {
            let mut parts = rest.splitn(2, ' ');
            let pt = parts.next().unwrap_or_default();
            let encoding = parts.next().unwrap_or_default();
            let name = encoding.split('/').next().unwrap_or_default();
            if !name.eq_ignore_ascii_case(&wanted) {
                dropped.push(pt.to_string());
            }
        }
    }

    if dropped.is_empty() {
        return sdp.to_string();
    }

    let dropped_ref: Vec<&str> = dropped.iter().map(String::as_str).collect();
    let mut out = Vec::new();
    let mut in_audio = false;
    for line in sdp.lines() {
        if line.starts_with("m=") {
            in_audio = line.starts_with("m=audio");
            if in_audio {
                // m=audio <port> <proto> <pt> <pt> ...; the first three
                // fields are never payload types.
                let mut rebuilt: Vec<&str> = line.split(' ').take(3).collect();
                rebuilt.extend(
                    line.split(' ')
                        .skip(3)
                        .filter(|pt| !dropped_ref.contains(pt)),
                );
                out.push(rebuilt.join(" "));
                continue;
            }
            out.push(line.to_string());
            continue;
        }

        if in_audio {
            let drops_line = ["a=rtpmap:", "a=fmtp:", "a=rtcp-fb:"]
                .iter()
                .any(|prefix| {
                    line.strip_prefix(prefix)
                        .and_then(|rest| rest.split(|c| c == ' ').next())
                        .map(|pt| dropped_ref.contains(&pt))
                        .unwrap_or(false)
                });
            if drops_line {
                continue;
            }
        }
        out.push(line.to_string());
    }

    // SDP lines are CRLF-terminated.
    let mut joined = out.join("\r\n");
    joined.push_str("\r\n");
    joined
}
