//! OS2Phonebook - a search backend for organisational phonebooks.
//!
//! Imports org units and employees from an OS2MO HR service, flattens them
//! into self-contained search documents, bulk-loads a search index and
//! serves a small HTTP query API with a narrow-then-broad search fallback.
//!
//! # Architecture
//!
//! - **models**: Flat document structures for employees and org units
//! - **error**: Custom error types for precise error handling
//! - **config**: Configuration management from environment variables
//! - **mo**: HTTP client and import routine for the OS2MO service API
//! - **normalize**: Turns imported records into index documents
//! - **datastore**: Search intents, query dispatch and index backends
//! - **server**: The HTTP query API
//! - **bootstrap**: Import pipeline, cache files and datastore readiness

pub mod bootstrap;
pub mod config;
pub mod datastore;
pub mod error;
pub mod mo;
pub mod models;
pub mod normalize;
pub mod server;

pub use config::{Config, DataloadAuth};
pub use datastore::{DataStore, ElasticBackend, IndexBackend, MemoryIndex};
pub use error::{ConfigError, DatastoreError, MoApiError, NormalizeError, ServiceError};
pub use mo::MoClient;
pub use models::{AddressBook, Employee, EmployeeDocument, KleRef, OrgUnit, OrgUnitDocument};
pub use server::{build_router, AppState};
