//! Filegate Metadata Library
//!
//! The metadata catalog holds one row per file and one per bucket. This crate
//! defines the [`MetadataStore`] trait the gateway depends on and a GraphQL
//! client implementing it against a Hasura-style schema.

pub mod graphql;
mod queries;
pub mod traits;

pub use graphql::GraphqlMetadataStore;
pub use traits::MetadataStore;
