// Application Layer - Use Cases

pub mod constants;
pub mod enumerator;
pub mod verifier;

// Re-exports
pub use enumerator::DescendantEnumerator;
pub use verifier::{TerminationVerifier, VerifierConfig};
