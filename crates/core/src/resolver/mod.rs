//! Entity resolution for holder names.
//!
//! Raw names from filings are normalized, matched against a curated alias
//! table and previously seen holders, and either merged or minted into a
//! canonical holder with a stable id.

mod aliases;
mod normalize;
mod resolver;
mod similarity;

pub use aliases::AliasTable;
pub use normalize::{display_name, normalize_name};
pub use resolver::{
    CurationCandidate, EntityResolver, Resolution, ResolutionSource, ResolverConfig,
};
pub use similarity::{NameSimilarity, SimilarityKind, TokenSetRatio, TokenSortJaroWinkler};
