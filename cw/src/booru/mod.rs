//! Booru API access: payload types, search ranking, and the client

mod client;
mod ranking;
mod types;

pub use client::{BooruClient, BooruError};
pub use ranking::{DEFAULT_TOP_N, closest_matches, display_name, parse_option_id, similarity};
pub use types::{ComicUpdate, MediaRef, Pool, Post, PostEnvelope};
