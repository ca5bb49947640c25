pub mod password;
pub mod tokens;

pub use tokens::{Claims, TokenCodec, TokenError, TokenPair};
