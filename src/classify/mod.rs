//! Sequence classification.
//!
//! The trained model is an external collaborator: it is consumed through the
//! `BehaviorClassifier` trait and loaded from a model artifact plus a label
//! encoder artifact. Only scores flow out; the aggregation logic never sees
//! model internals.

mod backends;
mod classifier;
mod labels;

pub use backends::StubClassifier;
#[cfg(feature = "backend-tract")]
pub use backends::TractClassifier;
pub use classifier::{classify, normalize_scores, BehaviorClassifier, SequencePrediction};
pub use labels::LabelEncoder;
