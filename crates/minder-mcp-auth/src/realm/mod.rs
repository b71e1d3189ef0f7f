//! Realm discovery and validation
//!
//! [`RealmLocator`] finds the realm a target's tokens are issued by;
//! [`RealmValidator`] decides whether that realm may be talked to.

pub mod locator;
pub mod validator;

pub use locator::{BoxError, ChallengeProbe, DiscoveryError, HttpChallengeProbe, RealmLocator};
pub use validator::{RealmPolicy, RealmPolicyBuilder, RealmValidationError, RealmValidator};
