use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand};
use mb_core::{Briefing, Error, Result};
use tracing::{error, info};

use crate::daily::run_daily;
use crate::generator::{BriefingGenerator, GenerateOutcome, GenerateRequest};
use crate::notify::PushNotifier;

const DEFAULT_PURGE_DAYS: i64 = 30;

/// Interval such as `24h`, `30m` or `1h15m30s`. A bare number is seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_value = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                let unit = match c {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    'd' => 86400,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_seconds = num
                    .checked_mul(unit)
                    .and_then(|secs| total_seconds.checked_add(secs))
                    .ok_or_else(|| "Duration is too large".to_string())?;
                current_number.clear();
                has_value = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        if !current_number.is_empty() {
            let secs = current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_seconds = total_seconds
                .checked_add(secs)
                .ok_or_else(|| "Duration is too large".to_string())?;
            has_value = true;
        }

        if !has_value {
            return Err("Duration must include a number".to_string());
        }
        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

#[derive(Args, Debug, Clone)]
pub struct BriefingArgs {
    #[command(subcommand)]
    pub command: BriefingCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum BriefingCommands {
    /// Generate the briefing for a date (today by default)
    Generate {
        /// Date in YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Regenerate even if the date already has a briefing
        #[arg(long)]
        force: bool,
    },
    /// Generate today's briefing if missing and notify push subscribers
    Daily {
        /// Keep running, once per interval (e.g. 24h, 12h30m)
        #[arg(long)]
        every: Option<HumanDuration>,
    },
    /// Print a stored briefing
    Show {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List dates with a stored briefing, newest first
    Dates,
    /// Print recent briefing summaries
    History {
        #[arg(long, default_value_t = 14)]
        limit: usize,
    },
    /// Delete briefings and audio older than the given number of days
    Purge {
        #[arg(long, default_value_t = DEFAULT_PURGE_DAYS)]
        days: i64,
    },
}

pub async fn handle_command(
    args: BriefingArgs,
    generator: &BriefingGenerator,
    notifier: Option<&PushNotifier>,
) -> Result<()> {
    let storage = generator.storage();
    match args.command {
        BriefingCommands::Generate { date, force } => {
            let request = GenerateRequest { date, force, ..GenerateRequest::default() };
            match generator.generate(request).await? {
                GenerateOutcome::Skipped(existing) => {
                    println!("⏭️ {} already generated: {}", existing.date, existing.full_briefing.headline);
                }
                GenerateOutcome::Generated { briefing, elapsed } => {
                    println!(
                        "✅ {} generated in {:.1}s: {}",
                        briefing.date,
                        elapsed.as_secs_f64(),
                        briefing.full_briefing.headline
                    );
                    print_briefing(&briefing);
                }
            }
        }
        BriefingCommands::Daily { every } => loop {
            match run_daily(generator, notifier).await {
                Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                Err(e) if every.is_some() => error!("Daily run failed: {}", e),
                Err(e) => return Err(e),
            }
            let Some(HumanDuration(interval)) = every else {
                break;
            };
            info!("Waiting {}s before next daily run", interval.as_secs());
            tokio::time::sleep(interval).await;
        },
        BriefingCommands::Show { date } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            match storage.get_briefing(date).await? {
                Some(briefing) => print_briefing(&briefing),
                None => println!("No briefing for {}", date),
            }
        }
        BriefingCommands::Dates => {
            for date in storage.list_dates().await? {
                println!("{}", date);
            }
        }
        BriefingCommands::History { limit } => {
            for summary in storage.history(limit).await? {
                println!(
                    "{}  {:>5}  {:>2} stories  {}",
                    summary.date, summary.duration, summary.story_count, summary.headline
                );
            }
        }
        BriefingCommands::Purge { days } => {
            let cutoff = chrono::Duration::try_days(days)
                .and_then(|age| Utc::now().date_naive().checked_sub_signed(age))
                .ok_or_else(|| Error::InvalidInput(format!("Purge age out of range: {} days", days)))?;
            let removed = storage.purge_before(cutoff).await?;
            println!("🧹 Removed {} briefings older than {}", removed, cutoff);
        }
    }
    Ok(())
}

fn print_briefing(briefing: &Briefing) {
    println!("📅 {}  {}", briefing.date, briefing.full_briefing.headline);
    println!("⏱️ {}  {} stories", briefing.full_briefing.duration, briefing.meta.total_stories);
    if let Some(url) = &briefing.full_briefing.audio_url {
        println!("🔊 {}", url);
    }
    for brief in &briefing.category_briefs {
        println!("\n{} {}: {}", brief.emoji, brief.display_name, brief.headline);
        for story in &brief.stories {
            println!("  - {} ({})", story.title, story.source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::test_support::{generator, FixedSource};
    use clap::Parser;
    use mb_core::BriefingStorage;
    use mb_storage::backends::memory::MemoryStorage;
    use std::sync::Arc;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: BriefingCommands,
    }

    #[test]
    fn test_human_duration() {
        assert_eq!("24h".parse::<HumanDuration>().unwrap().0, Duration::from_secs(86_400));
        assert_eq!("1h15m30s".parse::<HumanDuration>().unwrap().0, Duration::from_secs(4_530));
        assert_eq!("90".parse::<HumanDuration>().unwrap().0, Duration::from_secs(90));
        assert!("".parse::<HumanDuration>().is_err());
        assert!("5x".parse::<HumanDuration>().is_err());
        assert!("h".parse::<HumanDuration>().is_err());
        assert_eq!(
            "999999999999999d".parse::<HumanDuration>(),
            Err("Duration is too large".to_string())
        );
        assert!("18446744073709551615s1s".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = TestCli::try_parse_from(["mb", "generate", "--date", "2026-01-03", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            BriefingCommands::Generate { date: Some(_), force: true }
        ));

        let cli = TestCli::try_parse_from(["mb", "daily", "--every", "12h"]).unwrap();
        assert!(matches!(
            cli.command,
            BriefingCommands::Daily { every: Some(HumanDuration(d)) } if d == Duration::from_secs(43_200)
        ));

        let cli = TestCli::try_parse_from(["mb", "purge"]).unwrap();
        assert!(matches!(cli.command, BriefingCommands::Purge { days: 30 }));
    }

    #[tokio::test]
    async fn test_generate_then_purge() {
        let storage = Arc::new(MemoryStorage::new());
        let generator = generator(FixedSource::sample(), storage.clone());
        let old = Utc::now().date_naive() - chrono::Duration::days(40);

        let generate = BriefingArgs {
            command: BriefingCommands::Generate { date: Some(old), force: false },
        };
        handle_command(generate, &generator, None).await.unwrap();
        assert!(storage.has_briefing(old).await.unwrap());

        let purge = BriefingArgs { command: BriefingCommands::Purge { days: 30 } };
        handle_command(purge, &generator, None).await.unwrap();
        assert!(storage.list_dates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_rejects_out_of_range_age() {
        let storage = Arc::new(MemoryStorage::new());
        let generator = generator(FixedSource::sample(), storage);

        let purge = BriefingArgs { command: BriefingCommands::Purge { days: i64::MAX } };
        let result = handle_command(purge, &generator, None).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
