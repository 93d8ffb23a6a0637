//! FIR bytecode model and remote DSP factory/instance session client.
//!
//! Two sub-cores: a typed stack-machine intermediate representation
//! ([`opcode`], [`fir`], [`stack_analyzer`], [`ui`]) and a client-side
//! remote session lifecycle ([`hash`], [`registry`], [`factory`],
//! [`instance`], [`discovery`], [`transport`]) for driving a DSP factory
//! hosted on a remote compiler/runtime server.

pub mod config;
pub mod discovery;
pub mod error;
pub mod factory;
pub mod fir;
pub mod hash;
pub mod instance;
pub mod opcode;
pub mod registry;
pub mod stack_analyzer;
pub mod transport;
pub mod ui;

pub use config::ClientConfig;
pub use error::DspError;
pub use factory::RemoteFactory;
pub use instance::{generate_instance_key, RemoteInstance};
pub use registry::FactoryRegistry;
