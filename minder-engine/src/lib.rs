//! minder-engine: classification, routing, and the per-user runtime

pub mod classify;
pub mod config;
pub mod intent;
pub mod prompts;
pub mod router;
pub mod runtime;

pub use classify::{ClassifierConfig, FixtureClassifier, IntentClassifier, LlmClassifier, UserContext};
pub use config::{Config, config_path, init_config, load_config, minder_home, save_config};
pub use intent::{Intent, StatusDomain, WireResponse};
pub use router::{Acknowledgment, UserPartition, handle};
pub use runtime::{Engine, Outbound, OutboundPayload};
