pub mod metadata;
pub mod token;

pub use metadata::MetadataService;
pub use token::{AccessClaims, IssuedToken, TokenService};
