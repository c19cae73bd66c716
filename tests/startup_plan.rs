//! Integration tests from config text to trigger plan.
//!
//! These cover the decisions made at startup: which feeds get polled, and
//! when the first cycles happen, for each scheduling mode.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Asia::Shanghai;
use pretty_assertions::assert_eq;
use secrecy::SecretString;

use hubrelay::config::{FileConfig, RuntimeOptions, Settings};
use hubrelay::schedule::{Cadence, TriggerPlan};

fn settings(extra: &str, options: RuntimeOptions) -> Settings {
    let content = format!(
        "rss_hub_url = \"https://rsshub.app\"\nfeed_paths = [\"/36kr/newsflashes\"]\n{extra}"
    );
    Settings::resolve(FileConfig::parse(&content).unwrap(), options).unwrap()
}

fn options() -> RuntimeOptions {
    RuntimeOptions {
        chat_id: Some("-100123".to_string()),
        bot_token: Some(SecretString::from("123:abc")),
        ..RuntimeOptions::default()
    }
}

fn shanghai(h: u32, m: u32) -> DateTime<Utc> {
    Shanghai
        .with_ymd_and_hms(2025, 10, 14, h, m, 0)
        .unwrap()
        .with_timezone(&Utc)
}

fn plan(settings: &Settings, now: DateTime<Utc>) -> TriggerPlan {
    TriggerPlan::from_config(&settings.schedule, settings.skip_initial_check, now)
}

// ============================================================================
// Immediate mode
// ============================================================================

#[test]
fn test_default_config_checks_now_and_hourly() {
    let s = settings("", options());
    let now = shanghai(8, 15);
    assert_eq!(
        plan(&s, now),
        TriggerPlan {
            run_at_startup: true,
            cadence: Cadence::Every {
                first: now + Duration::hours(1),
                period: Duration::hours(1),
            },
        }
    );
}

#[test]
fn test_skip_initial_check_flag() {
    let s = settings(
        "",
        RuntimeOptions {
            skip_initial_check: true,
            ..options()
        },
    );
    assert!(!plan(&s, shanghai(8, 15)).run_at_startup);
}

#[test]
fn test_zero_interval_runs_once() {
    let s = settings("check_interval = 0.0\n", options());
    assert_eq!(
        plan(&s, shanghai(8, 15)),
        TriggerPlan {
            run_at_startup: true,
            cadence: Cadence::Once,
        }
    );
}

// ============================================================================
// Aligned mode
// ============================================================================

#[test]
fn test_two_hourly_from_nine_started_mid_morning() {
    let s = settings("check_interval = 2.0\nstart_time = \"09:00\"\n", options());
    assert_eq!(
        plan(&s, shanghai(10, 30)),
        TriggerPlan {
            run_at_startup: false,
            cadence: Cadence::Chain {
                first: shanghai(11, 0),
                period: Duration::hours(2),
            },
        }
    );
}

#[test]
fn test_start_time_later_today_waits_for_it() {
    let s = settings("check_interval = 3.0\nstart_time = \"18:00\"\n", options());
    let p = plan(&s, shanghai(10, 30));
    assert!(!p.run_at_startup);
    assert_eq!(
        p.cadence,
        Cadence::Chain {
            first: shanghai(18, 0),
            period: Duration::hours(3),
        }
    );
}

#[test]
fn test_half_hourly_from_nine_catches_up() {
    let s = settings("check_interval = 0.5\nstart_time = \"09:00\"\n", options());
    let p = plan(&s, shanghai(10, 40));
    assert!(p.run_at_startup);
    assert_eq!(
        p.cadence,
        Cadence::Every {
            first: shanghai(11, 0),
            period: Duration::minutes(30),
        }
    );
}

// ============================================================================
// Feed selection
// ============================================================================

#[test]
fn test_mock_mode_polls_only_the_fixture() {
    let s = settings(
        "mock_feed = \"/mock/sample.xml\"\n",
        RuntimeOptions {
            use_mock_data: true,
            ..options()
        },
    );
    assert_eq!(s.feeds, vec!["/mock/sample.xml".to_string()]);
}
