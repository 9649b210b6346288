//! Deterministic query parsing and intent validation
//!
//! This crate owns everything about a query that can be decided without an
//! external call:
//! - the closed vocabularies (categories, brands, vehicle makes and models,
//!   positions) with multilingual indicator phrases
//! - the token parser that lowers free text into an [`Intent`]
//! - the schema validator that lowers untrusted JSON (LLM output) into an
//!   [`Intent`], strictly or leniently
//!
//! [`Intent`]: parts_search_core::Intent

pub mod parser;
pub mod validator;
pub mod vocab;

pub use parser::{normalize_query, parse_query, TokenParse};
pub use validator::{
    merge_hybrid, merge_intents, SchemaValidator, ValidationMode, ValidationOutcome,
};
