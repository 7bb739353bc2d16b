pub mod error;
pub mod token;

pub use error::TokenError;
pub use token::{IssuedToken, TokenSigner, DEFAULT_TTL_SECONDS};
