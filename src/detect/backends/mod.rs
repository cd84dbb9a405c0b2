pub mod luma;
pub mod scripted;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use luma::LumaBlobBackend;
pub use scripted::ScriptedBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
