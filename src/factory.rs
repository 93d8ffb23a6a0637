//! Remote factory (component F).
//!
//! A factory is the compiled, content-addressed artifact a server hands
//! back for a DSP source: input/output arity, a flat metadata map, and a
//! UI layout. `RemoteFactory` itself is inert data; [`create`] and
//! [`destroy`] are free functions because establishing or tearing one down
//! is a control-plane round trip, not a method you'd want to fake a
//! receiver for for in isolation.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::FactoryError;
use crate::hash::factory_key;
use crate::transport::{get_json_form, ControlPlaneClient, ControlResponse, ErrorBody};
use crate::ui::{DiscardingBuilder, UIBlock};

/// Options threaded into `/GetJson`'s `options`/`opt_level` fields.
#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    pub argv: Vec<String>,
    pub opt_level: i32,
    /// If set, `dsp_data` carries a pre-compiled machine-code payload
    /// rather than DSP source text (§4.F step 2).
    pub machine_code: Option<Vec<u8>>,
}

/// A compiled factory as reported by the server.
#[derive(Clone, Debug)]
pub struct RemoteFactory {
    key: String,
    server_base_url: String,
    num_inputs: u32,
    num_outputs: u32,
    metadata: HashMap<String, String>,
    ui: UIBlock,
}

impl RemoteFactory {
    /// Construct a factory from already-known fields. Used by [`create`]
    /// once a descriptor has been parsed, and by tests that need a factory
    /// without a live server.
    pub fn from_parts(
        key: String,
        server_base_url: String,
        num_inputs: u32,
        num_outputs: u32,
        metadata: HashMap<String, String>,
        ui: UIBlock,
    ) -> Self {
        RemoteFactory {
            key,
            server_base_url,
            num_inputs,
            num_outputs,
            metadata,
            ui,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn server_base_url(&self) -> &str {
        &self.server_base_url
    }

    pub fn num_inputs(&self) -> u32 {
        self.num_inputs
    }

    pub fn num_outputs(&self) -> u32 {
        self.num_outputs
    }

    pub fn ui(&self) -> &UIBlock {
        &self.ui
    }

    /// Emit every stored `(key, value)` metadata pair into `sink`.
    pub fn metadata(&self, mut sink: impl FnMut(&str, &str)) {
        for (key, value) in &self.metadata {
            sink(key, value);
        }
    }
}

/// The wire shape of a `/GetJson` descriptor: a flat metadata map plus a
/// `ui` array. `inputs`/`outputs` live in the metadata map on the wire and
/// are extracted into typed fields during parsing.
#[derive(serde::Deserialize)]
struct Descriptor {
    #[serde(flatten)]
    meta: HashMap<String, serde_json::Value>,
}

const INPUTS_KEY: &str = "inputs";
const OUTPUTS_KEY: &str = "outputs";

/// Establish a factory on `server` for `source`, per §4.F:
/// 1. normalize + hash, 2. choose source vs. machine-code payload,
/// 3. POST `/GetJson`, 4. parse the descriptor, extracting mandatory
/// `inputs`/`outputs` metadata, 5. map a 400 response to a compilation
/// error, 6. hand the factory back for the caller to register.
pub fn create(
    client: &ControlPlaneClient,
    config: &ClientConfig,
    host: &str,
    port: u16,
    name: &str,
    source: &str,
    options: &CompileOptions,
) -> Result<RemoteFactory, FactoryError> {
    let server_id = config.server_id(host, port);
    let base_url = format!("http://{host}:{port}");
    let key = factory_key(source, &server_id);

    let dsp_data = match &options.machine_code {
        Some(bytes) => percent_escape(bytes),
        None => source.to_string(),
    };

    let form = get_json_form(
        name,
        &options.argv,
        &options.opt_level.to_string(),
        &key,
        &dsp_data,
    );
    let form_refs: Vec<(&str, &str)> = form.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    let response = client.post_form(&base_url, "/GetJson", &form_refs)?;
    match response {
        ControlResponse::Ok(body) => parse_descriptor(&key, &base_url, &body),
        ControlResponse::Error(ErrorBody::Code(code)) => {
            Err(FactoryError::Compilation(format!("server error code {code}")))
        }
        ControlResponse::Error(ErrorBody::Text(text)) => Err(FactoryError::Compilation(text)),
    }
}

/// Fetch a previously compiled factory's descriptor by key, without
/// resubmitting source (`/GetJsonFromKey`).
pub fn fetch_by_key(
    client: &ControlPlaneClient,
    base_url: &str,
    key: &str,
) -> Result<RemoteFactory, FactoryError> {
    let response = client.post_form(base_url, "/GetJsonFromKey", &[("shaKey", key)])?;
    match response {
        ControlResponse::Ok(body) => parse_descriptor(key, base_url, &body),
        ControlResponse::Error(ErrorBody::Code(_)) => Err(FactoryError::NotFound),
        ControlResponse::Error(ErrorBody::Text(text)) => Err(FactoryError::Compilation(text)),
    }
}

fn parse_descriptor(key: &str, base_url: &str, body: &str) -> Result<RemoteFactory, FactoryError> {
    let descriptor: Descriptor = serde_json::from_str(body)?;
    let mut meta = descriptor.meta;

    let ui_value = meta
        .remove("ui")
        .ok_or(FactoryError::MissingMetadata("ui"))?;
    let ui = UIBlock::from_json(&ui_value)?;
    // Dry-build the descriptor once against a no-op builder so a
    // malformed offset wiring is caught here, not on the audio thread
    // the first time a real control surface drives this block.
    ui.build(&mut DiscardingBuilder);

    let num_inputs = extract_arity(&mut meta, INPUTS_KEY)?;
    let num_outputs = extract_arity(&mut meta, OUTPUTS_KEY)?;

    let metadata = meta
        .into_iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
        .collect();

    info!(key = %key, inputs = num_inputs, outputs = num_outputs, "factory established");
    Ok(RemoteFactory::from_parts(
        key.to_string(),
        base_url.to_string(),
        num_inputs,
        num_outputs,
        metadata,
        ui,
    ))
}

fn extract_arity(
    meta: &mut HashMap<String, serde_json::Value>,
    key: &'static str,
) -> Result<u32, FactoryError> {
    let value = meta.remove(key).ok_or(FactoryError::MissingMetadata(key))?;
    value
        .as_str()
        .and_then(|s| s.parse::<u32>().ok())
        .or_else(|| value.as_u64().map(|n| n as u32))
        .ok_or(FactoryError::MissingMetadata(key))
}

/// Best-effort teardown: POST `/DeleteFactory` and log-and-continue on
/// failure, per §4.F. The registry's own bookkeeping is the authority on
/// whether this should even be called (refcount zero, no live instances).
pub fn destroy(client: &ControlPlaneClient, factory: &RemoteFactory) {
    let result = client.post_form(
        factory.server_base_url(),
        "/DeleteFactory",
        &[("shaKey", factory.key())],
    );
    if let Err(err) = result {
        warn!(key = %factory.key(), error = %err, "best-effort factory deletion failed");
    }
}

fn percent_escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for &b in bytes {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_descriptor_extracts_mandatory_arities() {
        let body = serde_json::json!({
            "inputs": "2",
            "outputs": "2",
            "author": "someone",
            "ui": [
                {"type": "hslider", "label": "gain", "init": 0.5, "min": 0.0, "max": 1.0, "step": 0.01}
            ]
        })
        .to_string();
        let factory = parse_descriptor("key1", "http://localhost:7777", &body).unwrap();
        assert_eq!(factory.num_inputs(), 2);
        assert_eq!(factory.num_outputs(), 2);
        assert_eq!(factory.ui().input_count(), 1);
        let mut seen = Vec::new();
        factory.metadata(|k, v| seen.push((k.to_string(), v.to_string())));
        assert!(seen.contains(&("author".to_string(), "someone".to_string())));
    }

    #[test]
    fn parse_descriptor_rejects_missing_arity() {
        let body = serde_json::json!({ "inputs": "1", "ui": [] }).to_string();
        let err = parse_descriptor("key1", "http://localhost:7777", &body).unwrap_err();
        assert!(matches!(err, FactoryError::MissingMetadata("outputs")));
    }

    #[test]
    fn percent_escape_leaves_unreserved_bytes_untouched() {
        assert_eq!(percent_escape(b"abcXYZ019-_.~"), "abcXYZ019-_.~");
        assert_eq!(percent_escape(&[0xff, 0x00]), "%FF%00");
    }
}
