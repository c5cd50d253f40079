//! SeaORM entities, one module per table.

pub mod check_error;
pub mod check_result;
pub mod iframe_check;
pub mod latency_sample;
pub mod target;
pub mod video_check;

// Prelude for convenient importing of entities and their related types.
pub mod prelude {
    pub use super::target::Entity as Target;
    pub use super::target::Model as TargetModel;
    pub use super::target::ActiveModel as TargetActiveModel;
    pub use super::target::Column as TargetColumn;

    pub use super::check_result::Entity as CheckResult;
    pub use super::check_result::Model as CheckResultModel;
    pub use super::check_result::ActiveModel as CheckResultActiveModel;
    pub use super::check_result::Column as CheckResultColumn;

    pub use super::check_error::Entity as CheckError;
    pub use super::check_error::Model as CheckErrorModel;
    pub use super::check_error::ActiveModel as CheckErrorActiveModel;
    pub use super::check_error::Column as CheckErrorColumn;

    pub use super::iframe_check::Entity as IframeCheck;
    pub use super::iframe_check::Model as IframeCheckModel;
    pub use super::iframe_check::ActiveModel as IframeCheckActiveModel;
    pub use super::iframe_check::Column as IframeCheckColumn;

    pub use super::video_check::Entity as VideoCheck;
    pub use super::video_check::Model as VideoCheckModel;
    pub use super::video_check::ActiveModel as VideoCheckActiveModel;
    pub use super::video_check::Column as VideoCheckColumn;

    pub use super::latency_sample::Entity as LatencySample;
    pub use super::latency_sample::Model as LatencySampleModel;
    pub use super::latency_sample::ActiveModel as LatencySampleActiveModel;
    pub use super::latency_sample::Column as LatencySampleColumn;
}
