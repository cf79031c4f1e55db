pub mod verifier;

pub use verifier::{EcdsaVerifier, SignatureVerifier, StaticVerifier};
