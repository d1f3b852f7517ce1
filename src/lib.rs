pub mod checkpoint;
pub mod config;
pub mod directive;
pub mod engine;
pub mod error;
pub mod export;
pub mod frontier;
pub mod medication;
pub mod registry;
pub mod remote;
pub mod seeds;

pub use config::Config;
pub use engine::ExpansionEngine;
pub use error::{Result, TermgraphError};
pub use registry::ConceptRegistry;
pub use remote::{DrugLookup, RemoteLookup, RxNavClient, UtsClient};
