//! # extexec
//!
//! Run user-supplied programs as the lifecycle of a declarative resource.
//!
//! For each lifecycle verb (create/read/update/delete) the engine creates a
//! private staging directory, writes the resource's inputs into it, runs the
//! configured program with environment variables pointing at those files,
//! reads the identifier and state the program wrote back, and removes the
//! directory again, whatever happened.
//!
//! ## Protocol
//!
//! With the default prefix `EXT` the program sees:
//!
//! | Variable | File | Mode |
//! |---|---|---|
//! | `EXT_DIR` | the staging directory | |
//! | `EXT_FILE_provider_input` | provider-level input | 0400 |
//! | `EXT_FILE_provider_input_sensitive` | provider-level sensitive input | 0400 |
//! | `EXT_FILE_input` | resource input | 0400 |
//! | `EXT_FILE_input_sensitive` | resource sensitive input | 0400 |
//! | `EXT_FILE_old_state` | state before the operation | 0400 |
//! | `EXT_FILE_state` | new state, overwritten by the program | 0600 |
//! | `EXT_FILE_id` | identifier, written by the program | 0600 |
//!
//! ## Example
//!
//! ```ignore
//! use extexec::{Engine, ProgramSpec, ProviderConfig, ResourceRecord, RunContext, Settings, Verb};
//!
//! let engine = Engine::new(Settings::default(), ProviderConfig::default());
//! let program = ProgramSpec::new(Verb::Create, vec![
//!     "sh".into(),
//!     "-c".into(),
//!     r#"cat "$EXT_FILE_input" > "$EXT_FILE_state"; echo -n ID1 > "$EXT_FILE_id""#.into(),
//! ])?;
//!
//! let mut record = ResourceRecord::default().with_input("hello");
//! let diags = engine.run(&RunContext::background(), &mut record, Verb::Create, &program);
//!
//! assert!(!diags.has_error());
//! assert_eq!(record.id, "ID1");
//! assert_eq!(record.state, "hello");
//! ```
//!
//! ## Diagnostics
//!
//! Operations never return early with an error. Every stage appends to a
//! [`Diagnostics`] list and the caller treats the operation as failed when
//! [`Diagnostics::has_error`] is true. Each run carries at least one warning
//! with the program's combined output, and a failed cleanup is only a
//! warning.

pub mod cancel;
pub mod command;
pub mod diag;
pub mod env;
pub mod error;
pub mod orchestrator;
pub mod record;
pub mod result;
pub mod settings;
pub mod staging;
pub mod types;

// Re-export main types at crate root
pub use cancel::{CancelToken, Interrupt, RunContext};
pub use diag::{Diagnostic, Diagnostics, Severity};
pub use error::{Error, ErrorCategory, Result};
pub use orchestrator::{Engine, Phase, run_program};
pub use record::{Output, ResourceData, ResourceRecord};
pub use result::ResultReader;
pub use settings::{DEFAULT_PREFIX, Settings, StagingBase};
pub use staging::{StagingArea, StagingFile};
pub use types::{ProgramSpec, ProviderConfig, Verb};
