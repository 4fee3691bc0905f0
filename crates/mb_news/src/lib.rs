pub mod cli;
pub mod curate;
pub mod daily;
pub mod generator;
pub mod notify;
pub mod sources;

pub use cli::{handle_command, BriefingArgs, BriefingCommands, HumanDuration};
pub use daily::{run_daily, DailyReport};
pub use generator::{
    date_range, BriefingGenerator, GenerateOutcome, GenerateRequest, HistoricalResult,
    HistoricalStatus,
};
pub use notify::{PushNotifier, PushReport};
pub use sources::{FetchWindow, FetchedNews, NewsSource, TheNewsApi, TheNewsApiConfig};

pub mod prelude {
    pub use super::generator::{BriefingGenerator, GenerateRequest};
    pub use super::sources::NewsSource;
    pub use mb_core::{Article, Briefing, Error, Result, Topic};
}
