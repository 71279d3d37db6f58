//! mountplan - resolve, compose, and project agent-runtime bundles
//!
//! Bundles are named configuration units describing an AI agent runtime's
//! capability set: execution strategy, providers, tools, hooks, sub-agents,
//! context documents, and free-form instructions. This crate resolves them
//! from heterogeneous sources (local directories, git repositories, zip
//! archives), composes them deterministically along their declared includes,
//! expands cross-bundle content mentions, and projects the result into a
//! mount plan consumable by an external runtime.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mountplan::{BundleLoader, Discovery, MountPlan, SourceCache};
//!
//! # async fn example() -> mountplan::Result<()> {
//! let cache = Arc::new(SourceCache::with_defaults(std::env::current_dir()?)?);
//! let discovery = Arc::new(Discovery::new());
//! discovery.register("foundation", "git+https://github.com/org/foundation@main");
//!
//! let loader = BundleLoader::new(cache, discovery);
//! let bundle = loader.load("foundation").await?;
//! let plan = MountPlan::from_bundle(&bundle);
//! let instruction = mountplan::render_instruction(&bundle).await?;
//! # let _ = (plan, instruction);
//! # Ok(())
//! # }
//! ```
//!
//! The crate never executes agent logic and never installs modules: it emits
//! descriptors and leaves activation to the consuming runtime.

pub mod bundle;
pub mod cache;
pub mod compose;
pub mod discovery;
pub mod error;
pub mod frontmatter;
pub mod fsio;
pub mod loader;
pub mod mentions;
pub mod paths;
pub mod plan;
pub mod source;
pub mod uri;
pub mod validator;

pub use bundle::Bundle;
pub use cache::{CacheEntry, CachePolicy, SourceCache};
pub use compose::{compose, deep_merge, merge_module_lists};
pub use discovery::Discovery;
pub use error::{MountplanError, Result};
pub use loader::{BundleLoader, LoaderOptions, load_bundle};
pub use mentions::{ContentDeduplicator, MentionResolver, load_mentions, parse_mentions};
pub use plan::{MountPlan, render_instruction};
pub use source::{HandlerRegistry, SourceHandler};
pub use uri::{ParsedSourceRef, SchemeFamily};
pub use validator::{ValidationResult, validate, validate_completeness, validate_or_raise};
