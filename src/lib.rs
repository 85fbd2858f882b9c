//! # Pipeline Config Library
//!
//! This library provides the core functionality for declaring, validating,
//! and publishing continuous-integration build pipelines. It is designed to
//! be used by the `pipeline-config` command-line tool but can also be
//! embedded in other applications that manage pipeline declarations.
//!
//! ## Core Concepts
//!
//! - **Settings (`settings`)**: host-wide configuration (platform
//!   credentials, default fork and branch, server identity, target matrix),
//!   loaded once and passed explicitly into every component.
//! - **Model (`model`)**: the per-user repository model - root repositories
//!   with their suffixes, build jobs, robots, distro/arch matrix, and
//!   dependency entries, all with default-inheritance from the settings.
//! - **Platform Resolver (`resolver`, `github`)**: suggestion lists and
//!   validation verdicts for repository names, fork owners, and branches,
//!   answered against a hosted Git platform through the `PlatformClient`
//!   trait.
//! - **Serializer (`serializer`)**: renders the model into the canonical
//!   `pipeline_config.yaml` wire document.
//! - **Sync Pipeline (`sync`)**: persists the document locally and publishes
//!   it into the shared configuration repository via clone-or-pull, place,
//!   add, commit, and push stages.
//! - **Generation Trigger (`generate`)**: waits for the persisted record to
//!   settle on disk, then spawns the external generator and interprets its
//!   output into a status result.
//!
//! ## Execution Flow
//!
//! A save parses the user's declaration into the model, renders it with the
//! serializer, runs the sync pipeline, and optionally hands off to the
//! generation trigger. Validation (`check`) runs the resolver's verdicts
//! over every declared repository without touching any state.

pub mod error;
pub mod generate;
pub mod github;
pub mod model;
pub mod resolver;
pub mod serializer;
pub mod settings;
pub mod sync;
