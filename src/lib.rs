//! # Account Harvester
//!
//! Incremental mirroring of online accounts into a local semantic store.
//!
//! For each configured account the harvester enumerates the documents,
//! photos, folders, and albums the provider exposes and mirrors their
//! metadata as typed resources and properties. The reconciliation engine
//! decides for every observed entity whether the store already holds a
//! faithful copy, and deletes resources that disappeared upstream.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌────────────┐   ┌──────────┐   ┌──────────────┐
//! │  Providers  │──▶│   Crawl    │──▶│ Mappers  │──▶│  GraphStore  │
//! │ snapshot/fs │   │ orchestr.  │   │ doc/photo│   │ sqlite/sparql│
//! └─────────────┘   └─────┬──────┘   │   tree   │   └──────▲───────┘
//!                         │          └────┬─────┘          │
//!                         ▼               ▼                │
//!                 ┌──────────────┐  ┌──────────┐           │
//!                 │   identity   │  │  change  │───────────┘
//!                 │ previous set │  │ watermark│
//!                 └──────────────┘  └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! harvest init                # create the store
//! harvest accounts            # check configured accounts
//! harvest crawl all           # crawl every account concurrently
//! harvest show google:drive:<id>
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Provider-neutral entity types |
//! | [`ontology`] | Class and property names |
//! | [`error`] | Typed errors of the library seams |
//! | [`store`] | Graph store trait and backends |
//! | [`identity`] | Identifiers and the previous-resource set |
//! | [`change`] | Data source and watermark checks |
//! | [`mapper`] | Entity to triple mapping |
//! | [`crawl`] | Per-account crawl state machine |
//! | [`provider`] | Provider service traits and account assembly |
//! | [`provider_snapshot`] | Services over exported JSON listings |
//! | [`provider_fs`] | Local directory as a folder tree |
//! | [`mime`] | File name based type guessing |
//! | [`harvest`] | Concurrent multi-account crawl driver |
//! | [`db`] | Store connection |
//! | [`migrate`] | Schema creation |

pub mod accounts;
pub mod change;
pub mod config;
pub mod crawl;
pub mod db;
pub mod error;
pub mod harvest;
pub mod identity;
pub mod mapper;
pub mod migrate;
pub mod mime;
pub mod models;
pub mod ontology;
pub mod provider;
pub mod provider_fs;
pub mod provider_snapshot;
pub mod show;
pub mod store;
