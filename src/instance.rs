//! Remote instance (component G): the audio-callback-facing session.
//!
//! This is the one module whose hot path (`compute`) runs on the audio
//! thread: it must never allocate, lock, perform HTTP, or log (§5). Every
//! buffer `compute` touches is allocated up front in `create`, and the
//! only fallible operation on the hot path is the data-plane slice
//! send/receive, whose failure degrades to silence rather than an error
//! return.

use rand::Rng;

use crate::config::ClientConfig;
use crate::error::{InstanceError, SliceError};
use crate::factory::RemoteFactory;
use crate::transport::{create_instance_form, ControlPlaneClient, ControlResponse, DataPlane, SliceRef};

/// Generate a fresh `instanceKey` for `/CreateInstance`: random enough that
/// two instances created against the same factory in the same process
/// never collide, without needing any process-wide counter. The caller is
/// free to supply its own key instead (e.g. to make a session
/// reproducible in a test).
pub fn generate_instance_key() -> String {
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| {
            let n: u8 = rng.gen_range(0..16);
            std::char::from_digit(n as u32, 16).unwrap()
        })
        .collect()
}

/// Which wire-level failure triggered a degrade-to-silence cycle, handed
/// to the caller's error callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    Write,
    Read,
}

impl From<TransportFailure> for SliceError {
    fn from(value: TransportFailure) -> Self {
        match value {
            TransportFailure::Write => SliceError::Write,
            TransportFailure::Read => SliceError::Read,
        }
    }
}

/// A live audio session against a [`RemoteFactory`].
pub struct RemoteInstance {
    server_base_url: String,
    factory_key: String,
    instance_key: String,
    buffer_size: usize,
    #[allow(dead_code)]
    sample_rate: u32,
    num_inputs: usize,
    num_outputs: usize,
    input_controls: Vec<f32>,
    output_controls: Vec<f32>,
    running: bool,
    transport: Box<dyn DataPlane + Send>,
    error_callback: Box<dyn FnMut(SliceError) -> i32 + Send>,
    // Hot-path scratch, sized once in `create` so `run_cycle` never
    // allocates (§5).
    audio_send_scratch: Vec<f32>,
    audio_recv_scratch: Vec<f32>,
    control_send_scratch: Vec<f32>,
    control_recv_scratch: Vec<f32>,
}

impl RemoteInstance {
    /// Materialize a session against `factory`, per §4.G steps 1-5:
    /// allocate control arrays sized by a dry UI build, POST
    /// `/CreateInstance`, and hand back an instance ready for `start`.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        client: &ControlPlaneClient,
        config: &ClientConfig,
        factory: &RemoteFactory,
        sample_rate: u32,
        buffer_size: usize,
        instance_key: String,
        master_ip: &str,
        transport: Box<dyn DataPlane + Send>,
        error_callback: impl FnMut(SliceError) -> i32 + Send + 'static,
    ) -> Result<RemoteInstance, InstanceError> {
        if buffer_size > config.control_channel_capacity {
            return Err(InstanceError::BufferTooLarge(
                buffer_size,
                config.control_channel_capacity,
            ));
        }

        let input_count = factory.ui().input_count();
        let output_count = factory.ui().output_count();

        let port = "19000";
        let latency = config.transport_latency.to_string();
        let form = create_instance_form(
            master_ip,
            port,
            "0",
            &latency,
            "1500",
            factory.key(),
            instance_key.as_str(),
        );
        let response = client.post_form(factory.server_base_url(), "/CreateInstance", &form)?;
        match response {
            ControlResponse::Ok(_) => {}
            ControlResponse::Error(_) => return Err(InstanceError::TransportNotStarted),
        }

        Ok(RemoteInstance {
            server_base_url: factory.server_base_url().to_string(),
            factory_key: factory.key().to_string(),
            instance_key,
            buffer_size,
            sample_rate,
            num_inputs: input_count,
            num_outputs: output_count,
            input_controls: vec![0.0; input_count],
            output_controls: vec![0.0; output_count],
            running: true,
            transport,
            error_callback: Box::new(error_callback),
            audio_send_scratch: vec![0.0; buffer_size * input_count.max(1)],
            audio_recv_scratch: vec![0.0; buffer_size * output_count.max(1)],
            control_send_scratch: vec![0.0; config.control_channel_capacity],
            control_recv_scratch: vec![0.0; config.control_channel_capacity],
        })
    }

    pub fn start(&self, client: &ControlPlaneClient) -> Result<(), InstanceError> {
        client.post_form(
            &self.server_base_url,
            "/StartAudio",
            &[("instanceKey", self.instance_key.as_str())],
        )?;
        Ok(())
    }

    pub fn stop(&self, client: &ControlPlaneClient) -> Result<(), InstanceError> {
        client.post_form(
            &self.server_base_url,
            "/StopAudio",
            &[("instanceKey", self.instance_key.as_str())],
        )?;
        Ok(())
    }

    pub fn factory_key(&self) -> &str {
        &self.factory_key
    }

    pub fn input_controls(&mut self) -> &mut [f32] {
        &mut self.input_controls
    }

    pub fn output_controls(&self) -> &[f32] {
        &self.output_controls
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// The hot path. `inputs`/`outputs` carry one slice per channel, each
    /// at least `frame_count` samples long; channel count must match the
    /// factory's reported arity.
    pub fn compute(&mut self, frame_count: usize, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        debug_assert_eq!(inputs.len(), self.num_inputs);
        debug_assert_eq!(outputs.len(), self.num_outputs);

        let mut offset = 0;
        while offset < frame_count {
            if !self.running {
                zero_fill(outputs, offset, frame_count - offset);
                return;
            }
            let valid_len = (frame_count - offset).min(self.buffer_size);
            self.run_cycle(inputs, outputs, offset, valid_len);
            offset += valid_len;
        }
    }

    fn run_cycle(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        offset: usize,
        valid_len: usize,
    ) {
        let buffer_size = self.buffer_size;
        self.audio_send_scratch.fill(0.0);
        for (ch, input) in inputs.iter().enumerate() {
            let dst = &mut self.audio_send_scratch[ch * buffer_size..ch * buffer_size + buffer_size];
            dst[..valid_len].copy_from_slice(&input[offset..offset + valid_len]);
            // dst[valid_len..] is already zero: the tail cycle's padding
            // up to the fixed wire frame size.
        }
        encode_control(&self.input_controls, &mut self.control_send_scratch);
        let control_len = self.input_controls.len();

        let slice = SliceRef {
            audio: &self.audio_send_scratch,
            control: &self.control_send_scratch[..control_len],
        };

        if let Err(_err) = self.transport.send(slice) {
            self.degrade(outputs, offset, valid_len, TransportFailure::Write);
            return;
        }

        let mut audio_recv = std::mem::take(&mut self.audio_recv_scratch);
        let mut control_recv = std::mem::take(&mut self.control_recv_scratch);
        let recv_result = self.transport.recv(&mut audio_recv, &mut control_recv);
        match recv_result {
            Ok((audio_len, control_len)) => {
                for (ch, output) in outputs.iter_mut().enumerate() {
                    let src_base = ch * buffer_size;
                    if audio_len >= src_base + valid_len {
                        output[offset..offset + valid_len]
                            .copy_from_slice(&audio_recv[src_base..src_base + valid_len]);
                    }
                }
                decode_control(&control_recv[..control_len], &mut self.output_controls);
                self.audio_recv_scratch = audio_recv;
                self.control_recv_scratch = control_recv;
            }
            Err(_err) => {
                self.audio_recv_scratch = audio_recv;
                self.control_recv_scratch = control_recv;
                self.degrade(outputs, offset, valid_len, TransportFailure::Read);
            }
        }
    }

    fn degrade(
        &mut self,
        outputs: &mut [&mut [f32]],
        offset: usize,
        valid_len: usize,
        failure: TransportFailure,
    ) {
        zero_fill(outputs, offset, valid_len);
        let code = (self.error_callback)(failure.into());
        if code != 0 {
            self.running = false;
        }
    }
}

fn zero_fill(outputs: &mut [&mut [f32]], offset: usize, len: usize) {
    for output in outputs.iter_mut() {
        let end = (offset + len).min(output.len());
        if offset < end {
            output[offset..end].fill(0.0);
        }
    }
}

/// Pack control-input values into a caller-owned wire control channel
/// buffer. The actual server-side codec is an external collaborator; this
/// crate only needs a stable, reversible packing to drive the send/receive
/// cadence, without allocating on the hot path.
fn encode_control(values: &[f32], packed: &mut [f32]) {
    let n = values.len().min(packed.len());
    packed[..n].copy_from_slice(&values[..n]);
}

/// Unpack a received control channel back into an output-control array in
/// place, leaving any unfilled tail untouched.
fn decode_control(packed: &[f32], values: &mut [f32]) {
    let n = packed.len().min(values.len());
    values[..n].copy_from_slice(&packed[..n]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LoopbackTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn test_instance(buffer_size: usize) -> RemoteInstance {
        RemoteInstance {
            server_base_url: "http://localhost:7777".to_string(),
            factory_key: "key".to_string(),
            instance_key: "inst".to_string(),
            buffer_size,
            sample_rate: 44100,
            num_inputs: 1,
            num_outputs: 1,
            input_controls: vec![0.0],
            output_controls: vec![0.0],
            running: true,
            transport: Box::new(LoopbackTransport::new()),
            error_callback: Box::new(|_| 0),
            audio_send_scratch: vec![0.0; buffer_size],
            audio_recv_scratch: vec![0.0; buffer_size],
            control_send_scratch: vec![0.0; 8192],
            control_recv_scratch: vec![0.0; 8192],
        }
    }

    #[test]
    fn full_cycle_passes_audio_through_the_loopback() {
        let mut instance = test_instance(4);
        let input = vec![1.0f32, 2.0, 3.0, 4.0];
        let mut output = vec![0.0f32; 4];
        {
            let inputs: [&[f32]; 1] = [&input];
            let mut out_slice: [&mut [f32]; 1] = [&mut output];
            instance.compute(4, &inputs, &mut out_slice);
        }
        assert_eq!(output, input);
    }

    #[test]
    fn tail_cycle_zero_pads_before_sending() {
        let mut instance = test_instance(4);
        let input = vec![9.0f32, 9.0]; // 2 samples, buffer_size 4
        let mut output = vec![0.0f32; 2];
        {
            let inputs: [&[f32]; 1] = [&input];
            let mut out_slice: [&mut [f32]; 1] = [&mut output];
            instance.compute(2, &inputs, &mut out_slice);
        }
        assert_eq!(output, vec![9.0, 9.0]);
    }

    #[test]
    fn stopped_instance_returns_silence_without_touching_transport() {
        let mut instance = test_instance(4);
        instance.running = false;
        let input = vec![5.0f32; 4];
        let mut output = vec![7.0f32; 4];
        {
            let inputs: [&[f32]; 1] = [&input];
            let mut out_slice: [&mut [f32]; 1] = [&mut output];
            instance.compute(4, &inputs, &mut out_slice);
        }
        assert_eq!(output, vec![0.0; 4]);
    }

    #[test]
    fn send_failure_zero_fills_and_invokes_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let mut instance = test_instance(4);
        instance.error_callback = Box::new(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            0 // keep running
        });
        instance.transport = Box::new({
            let mut t = LoopbackTransport::new();
            t.fail_next_send();
            t
        });
        let input = vec![1.0f32; 4];
        let mut output = vec![9.0f32; 4];
        {
            let inputs: [&[f32]; 1] = [&input];
            let mut out_slice: [&mut [f32]; 1] = [&mut output];
            instance.compute(4, &inputs, &mut out_slice);
        }
        assert_eq!(output, vec![0.0; 4]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(instance.is_running());
    }

    #[test]
    fn nonzero_callback_return_latches_off_running() {
        let mut instance = test_instance(4);
        instance.error_callback = Box::new(|_| 1); // latch off
        instance.transport = Box::new({
            let mut t = LoopbackTransport::new();
            t.fail_next_recv();
            t
        });
        let input = vec![1.0f32; 8];
        let mut output = vec![0.0f32; 8];
        {
            let inputs: [&[f32]; 1] = [&input];
            let mut out_slice: [&mut [f32]; 1] = [&mut output];
            instance.compute(8, &inputs, &mut out_slice);
        }
        assert!(!instance.is_running());
        // second cycle should have degraded silently without touching
        // the (already exhausted) transport again.
        assert_eq!(output[4..8], [0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn encode_decode_control_round_trips_within_capacity() {
        let mut packed = vec![0.0; 3];
        encode_control(&[1.0, 2.0, 3.0], &mut packed);
        let mut out = vec![0.0; 3];
        decode_control(&packed, &mut out);
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn create_rejects_buffer_larger_than_control_channel_capacity() {
        let mut config = ClientConfig::default();
        config.control_channel_capacity = 16;
        let client = ControlPlaneClient::new(&config);
        let ui = crate::ui::UIBlock::from_json(&serde_json::json!([])).unwrap();
        let factory = RemoteFactory::from_parts(
            "key".to_string(),
            "http://localhost:7777".to_string(),
            1,
            1,
            std::collections::HashMap::new(),
            ui,
        );
        let err = RemoteInstance::create(
            &client,
            &config,
            &factory,
            44100,
            32,
            "inst".to_string(),
            "127.0.0.1",
            Box::new(LoopbackTransport::new()),
            |_| 0,
        )
        .unwrap_err();
        assert!(matches!(err, InstanceError::BufferTooLarge(32, 16)));
    }

    #[test]
    fn generated_instance_keys_are_hex_and_distinct() {
        let a = generate_instance_key();
        let b = generate_instance_key();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
