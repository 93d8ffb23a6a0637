//! Transport adapter (component I): control plane and data plane.
//!
//! The control plane is a thin `reqwest::blocking` wrapper: POST a
//! urlencoded form, classify the response by status code. The data plane
//! is a fixed-cadence slice send/receive abstraction over whatever
//! streaming transport backs a session; this crate ships an in-process
//! loopback implementation (`LoopbackTransport`) usable by tests and by an
//! embedder that doesn't want a real network dependency for smoke-testing.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ControlPlaneError;

/// Outcome of a control-plane POST, matching §4.I's response classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlResponse {
    /// HTTP 200: body handed back verbatim for the caller to parse.
    Ok(String),
    /// HTTP 400: body is either a decimal error code or free text.
    Error(ErrorBody),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorBody {
    Code(i64),
    Text(String),
}

/// Blocking HTTP client for the `/GetJson`, `/CreateInstance`, ... family
/// of endpoints.
pub struct ControlPlaneClient {
    http: reqwest::blocking::Client,
}

impl ControlPlaneClient {
    pub fn new(config: &ClientConfig) -> Self {
        let http = reqwest::blocking::Client::builder()
            .connect_timeout(config.control_timeout)
            .timeout(config.control_timeout)
            .build()
            .expect("static reqwest client configuration is always valid");
        ControlPlaneClient { http }
    }

    /// POST `base_url/path` with an urlencoded form body, classifying the
    /// response per §4.I. Anything other than 200/400 is a transport-level
    /// failure.
    pub fn post_form(
        &self,
        base_url: &str,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<ControlResponse, ControlPlaneError> {
        let url = format!("{base_url}{path}");
        debug!(url = %url, "posting control-plane request");
        let response = self.http.post(&url).form(form).send()?;
        let status = response.status();
        let body = response.text()?;
        match status.as_u16() {
            200 => Ok(ControlResponse::Ok(body)),
            400 => Ok(ControlResponse::Error(parse_error_body(&body))),
            other => {
                warn!(status = other, "unexpected control-plane status");
                Err(ControlPlaneError::UnexpectedStatus(other))
            }
        }
    }

    /// GET `base_url/GetAvailableFactories`, parsed as whitespace-separated
    /// `name key` pairs.
    pub fn get_available_factories(
        &self,
        base_url: &str,
    ) -> Result<Vec<(String, String)>, ControlPlaneError> {
        let url = format!("{base_url}/GetAvailableFactories");
        let body = self.http.get(&url).send()?.text()?;
        let mut pairs = Vec::new();
        let mut tokens = body.split_whitespace();
        while let (Some(name), Some(key)) = (tokens.next(), tokens.next()) {
            pairs.push((name.to_string(), key.to_string()));
        }
        Ok(pairs)
    }
}

fn parse_error_body(body: &str) -> ErrorBody {
    match body.trim().parse::<i64>() {
        Ok(code) => ErrorBody::Code(code),
        Err(_) => ErrorBody::Text(body.trim().to_string()),
    }
}

/// A single fixed-size audio+control slice moving in one direction across
/// the data plane, borrowed rather than owned so a caller on the audio
/// thread can send straight out of its own preallocated scratch buffers
/// without a per-cycle copy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliceRef<'a> {
    pub audio: &'a [f32],
    pub control: &'a [f32],
}

/// A single fixed-size audio+control slice, owned. Used by transports
/// (like [`LoopbackTransport`]) that need to hold a slice between a send
/// and a later receive; never appears on `RemoteInstance`'s hot path.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Slice {
    pub audio: Vec<f32>,
    pub control: Vec<f32>,
}

/// The data-plane contract component G drives: send one slice, then
/// receive one slice, strictly ordered per §5. Implementors own whatever
/// socket/session state backs a single instance; the instance is the only
/// caller. Both methods are written to avoid forcing an allocation on the
/// caller: `send` borrows, and `recv` writes into caller-owned buffers and
/// reports how much of each it filled.
pub trait DataPlane {
    fn send(&mut self, slice: SliceRef<'_>) -> Result<(), crate::error::SliceError>;
    /// Fill `audio_out`/`control_out` from the next received slice, up to
    /// their lengths, and return `(audio_len, control_len)` actually
    /// written. Never allocates.
    fn recv(
        &mut self,
        audio_out: &mut [f32],
        control_out: &mut [f32],
    ) -> Result<(usize, usize), crate::error::SliceError>;
}

/// An in-process loopback data plane: whatever is sent is returned
/// unchanged on the next receive. Used by tests and by callers who want to
/// exercise component G's cadence logic without a real server. Not on the
/// hot path itself, so it's free to own (and clone into) its queued
/// slices.
#[derive(Default)]
pub struct LoopbackTransport {
    pending: std::collections::VecDeque<Slice>,
    fail_next_send: bool,
    fail_next_recv: bool,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        LoopbackTransport::default()
    }

    pub fn fail_next_send(&mut self) {
        self.fail_next_send = true;
    }

    pub fn fail_next_recv(&mut self) {
        self.fail_next_recv = true;
    }
}

impl DataPlane for LoopbackTransport {
    fn send(&mut self, slice: SliceRef<'_>) -> Result<(), crate::error::SliceError> {
        if self.fail_next_send {
            self.fail_next_send = false;
            return Err(crate::error::SliceError::Write);
        }
        self.pending.push_back(Slice {
            audio: slice.audio.to_vec(),
            control: slice.control.to_vec(),
        });
        Ok(())
    }

    fn recv(
        &mut self,
        audio_out: &mut [f32],
        control_out: &mut [f32],
    ) -> Result<(usize, usize), crate::error::SliceError> {
        if self.fail_next_recv {
            self.fail_next_recv = false;
            return Err(crate::error::SliceError::Read);
        }
        let Some(slice) = self.pending.pop_front() else {
            audio_out.fill(0.0);
            return Ok((0, 0));
        };
        let audio_len = slice.audio.len().min(audio_out.len());
        audio_out[..audio_len].copy_from_slice(&slice.audio[..audio_len]);
        let control_len = slice.control.len().min(control_out.len());
        control_out[..control_len].copy_from_slice(&slice.control[..control_len]);
        Ok((audio_len, control_len))
    }
}

/// Parameters used to open a streaming master session, mirroring §6's
/// `{bufferSize, sampleRate, partialCycle, latency}` shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamParams {
    pub buffer_size: usize,
    pub sample_rate: u32,
    pub partial_cycle: bool,
    pub latency: u32,
}

/// Form fields for `/CreateInstance`, collected here because they're
/// threaded through from config defaults plus per-call overrides.
pub fn create_instance_form<'a>(
    ip: &'a str,
    port: &'a str,
    compression: &'a str,
    latency: &'a str,
    mtu: &'a str,
    factory_key: &'a str,
    instance_key: &'a str,
) -> Vec<(&'a str, &'a str)> {
    vec![
        ("NJ_ip", ip),
        ("NJ_port", port),
        ("NJ_compression", compression),
        ("NJ_latency", latency),
        ("NJ_mtu", mtu),
        ("factoryKey", factory_key),
        ("instanceKey", instance_key),
    ]
}

/// A typed view over an application/x-www-form-urlencoded multi-value
/// form, used when building `/GetJson`'s variable-length `options` field
/// list.
pub fn get_json_form<'a>(
    name: &'a str,
    options: &'a [String],
    opt_level: &'a str,
    sha_key: &'a str,
    dsp_data: &'a str,
) -> Vec<(String, String)> {
    let mut form: HashMap<&str, String> = HashMap::new();
    form.insert("name", name.to_string());
    form.insert("number_options", options.len().to_string());
    form.insert("opt_level", opt_level.to_string());
    form.insert("shaKey", sha_key.to_string());
    form.insert("dsp_data", dsp_data.to_string());
    let mut pairs: Vec<(String, String)> = form.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    for opt in options {
        pairs.push(("options".to_string(), opt.clone()));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_body_prefers_numeric() {
        assert_eq!(parse_error_body(" 42 \n"), ErrorBody::Code(42));
        assert_eq!(
            parse_error_body("unknown option -foo"),
            ErrorBody::Text("unknown option -foo".to_string())
        );
    }

    #[test]
    fn loopback_echoes_sent_slices_in_order() {
        let mut transport = LoopbackTransport::new();
        transport
            .send(SliceRef { audio: &[1.0, 2.0], control: &[] })
            .unwrap();
        transport
            .send(SliceRef { audio: &[3.0, 4.0], control: &[] })
            .unwrap();
        let mut audio_out = vec![0.0; 2];
        let mut control_out = vec![0.0; 0];
        let (len, _) = transport.recv(&mut audio_out, &mut control_out).unwrap();
        assert_eq!(len, 2);
        assert_eq!(audio_out, vec![1.0, 2.0]);
        let (len, _) = transport.recv(&mut audio_out, &mut control_out).unwrap();
        assert_eq!(len, 2);
        assert_eq!(audio_out, vec![3.0, 4.0]);
    }

    #[test]
    fn loopback_can_be_made_to_fail_once() {
        let mut transport = LoopbackTransport::new();
        transport.fail_next_send();
        let err = transport
            .send(SliceRef { audio: &[0.0], control: &[] })
            .unwrap_err();
        assert_eq!(err, crate::error::SliceError::Write);
        // the next send succeeds again.
        transport
            .send(SliceRef { audio: &[0.0], control: &[] })
            .unwrap();
    }

    #[test]
    fn create_instance_form_carries_all_fields() {
        let form = create_instance_form("127.0.0.1", "19000", "0", "5", "1500", "abc", "xyz");
        assert!(form.contains(&("factoryKey", "abc")));
        assert!(form.contains(&("instanceKey", "xyz")));
        assert_eq!(form.len(), 7);
    }
}
