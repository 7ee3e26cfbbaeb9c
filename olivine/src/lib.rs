#![allow(dead_code, unused_imports)]
//! # Olivine - Embedded Document Store
//!
//! Olivine is a lightweight, embedded document store written in Rust. It
//! keeps schemaless documents and typed records in named collections,
//! and layers filters, sorting, pagination, unique indexes, joins, and
//! change events on top of a narrow storage-engine boundary.
//!
//! ## Key Features
//!
//! - **Embedded**: no separate server process, the store lives inside
//!   the application
//! - **Typed Records**: any `Entity` type maps to and from documents,
//!   addressed by a declared primary key
//! - **Declared Up Front**: collections, keys, indexes, and optional
//!   fields are registered on the builder before the store opens
//! - **Rich Querying**: a recursive filter tree with comparison, range,
//!   text, regex, and array-element operators
//! - **Key Generation**: explicit keys, caller-supplied generators, or
//!   engine-assigned integer sequences
//! - **Joins**: parent-child joins across collections without a query
//!   planner
//! - **Change Events**: per-collection insert, update, and remove
//!   listeners, delivered in write order
//! - **Clean API**: PIMPL pattern provides a stable, encapsulated
//!   interface; every handle is cheap to clone and share across threads
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use olivine::filter::field;
//! use olivine::find_options::FindOptions;
//! use olivine::keys::KeyKind;
//! use olivine::olivine::Olivine;
//! use olivine::registration::EntityRegistration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Declare collections and open the store.
//! let db = Olivine::builder()
//!     .register(
//!         EntityRegistration::<Compound>::new("compounds")
//!             .with_key("serial", KeyKind::I64),
//!     )
//!     .open()?;
//!
//! // Insert a typed record.
//! db.insert(&Compound::new(7, "caffeine", 194.19))?;
//!
//! // Query with a filter.
//! let heavy = db
//!     .find::<Compound>(&field("mass").gt(100.0f64), &FindOptions::new())?
//!     .records()?;
//!
//! // Close the store.
//! db.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - Values, ordering, locking, the event bus, and time
//! - [`document`] - Documents and the [`doc!`] construction macro
//! - [`engine`] - The storage-engine boundary and the in-memory engine
//! - [`errors`] - Error types and result definitions
//! - [`events`] - Change events and listeners
//! - [`filter`] - Filter trees, the fluent filter API, and compilation
//! - [`find_options`] - Sorting, pagination, and collation options
//! - [`join`] - Parent-child joins
//! - [`keys`] - Primary keys, key kinds, and key generators
//! - [`olivine`] - The store facade
//! - [`olivine_builder`] - Store builder for registration and opening
//! - [`olivine_id`] - Engine-level document ids
//! - [`ops`] - Cursors over query results
//! - [`registration`] - Collection and record-type declarations

use crate::snowflake::SnowflakeIdGenerator;
use std::sync::LazyLock;

pub mod common;
pub mod document;
pub mod engine;
pub mod errors;
pub mod events;
pub mod filter;
pub mod find_options;
pub mod join;
pub mod keys;
pub mod olivine;
pub mod olivine_builder;
pub(crate) mod olivine_config;
pub mod olivine_id;
pub mod ops;
pub(crate) mod projection;
pub mod registration;
pub(crate) mod snowflake;

pub(crate) static ID_GENERATOR: LazyLock<SnowflakeIdGenerator> =
    LazyLock::new(SnowflakeIdGenerator::new);
