#![allow(clippy::missing_docs_in_private_items)]

pub mod keyword;
pub mod ranking;
pub mod search;
pub mod vector;

pub use ranking::{RankedItem, RankingWeights, SearchCandidate};
pub use search::{execute_search, SearchRequest};
