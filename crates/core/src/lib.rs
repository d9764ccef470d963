pub mod config;
pub mod credential;
pub mod event;
pub mod gate;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod storage;
pub mod testing;
pub mod trigger;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use credential::{select_credential, AccessToken, CredentialError, CredentialProvider};
pub use event::{decode, DecodeError, EventGridEvent, NotificationDecoder};
pub use gate::{ArtifactError, ArtifactOutcome, GateResult, PollPolicy, Readiness, ReadinessGate};
pub use job::{JobConfig, JobConfigError, JobConfigResolver};
pub use orchestrator::{ErrorKind, EventOrchestrator, EventOutcome, OutcomeStatus, Stage};
pub use storage::{AzureBlobStore, BlobStore, ConnectionString, StorageError, StorageLocation};
pub use trigger::{
    ComputeClient, ContainerInstanceClient, TriggerDispatcher, TriggerError, TriggerRequest,
};
