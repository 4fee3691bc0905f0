pub mod error;
pub mod models;
pub mod push;
pub mod speech;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use models::LanguageModel;
pub use push::PushSender;
pub use speech::{SpeechProvider, VoiceOptions};
pub use storage::{BriefingStorage, Storage, SubscriberStorage};
pub use types::*;
