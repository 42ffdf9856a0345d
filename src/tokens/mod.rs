//! Design-token lookups for `token:<name>` size values.

mod core;

pub use self::core::{NoTokens, TOKEN_PREFIX, TokenResolver, TokenTable};
