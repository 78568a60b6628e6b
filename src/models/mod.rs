pub mod features;
pub mod result;

pub use features::{Advisory, AdvisoryRange, FeatureName, FeatureRecord, VariableKind};
pub use result::ResultRecord;
