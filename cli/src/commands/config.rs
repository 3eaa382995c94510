//! Config command - show and update stored defaults.

use std::time::Duration;

use anyhow::{bail, Context as _, Result};

use crate::duration::format_duration;
use crate::settings::{Settings, SettingsStore};

pub async fn show(json: bool) -> Result<()> {
    let store = SettingsStore::new()?;
    let settings = store.load().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    println!("Config file: {}", store.path().display());
    println!();
    print!("{}", render(&settings));
    Ok(())
}

pub async fn set(
    grace_period: Option<Duration>,
    timeout: Option<Duration>,
    no_timeout: bool,
) -> Result<()> {
    if grace_period.is_none() && timeout.is_none() && !no_timeout {
        bail!("Nothing to set: pass --grace-period, --timeout or --no-timeout");
    }

    let store = SettingsStore::new()?;
    let mut settings = store.load().await?;
    apply(&mut settings, grace_period, timeout, no_timeout)?;
    store.save(&settings).await?;

    print!("{}", render(&settings));
    Ok(())
}

fn apply(
    settings: &mut Settings,
    grace_period: Option<Duration>,
    timeout: Option<Duration>,
    no_timeout: bool,
) -> Result<()> {
    if let Some(grace) = grace_period {
        settings.grace_period_ms = to_millis("grace period", grace)?;
    }
    if no_timeout {
        settings.timeout_ms = None;
    } else if let Some(timeout) = timeout {
        settings.timeout_ms = Some(to_millis("timeout", timeout)?);
    }
    Ok(())
}

/// Milliseconds as stored on disk; durations that don't fit are rejected.
fn to_millis(name: &str, d: Duration) -> Result<u64> {
    u64::try_from(d.as_millis()).with_context(|| format!("{name} is too large to store"))
}

fn render(settings: &Settings) -> String {
    let timeout = settings
        .timeout()
        .map(format_duration)
        .unwrap_or_else(|| "none".to_string());

    format!(
        "Grace period: {}\nTimeout:      {}\n",
        format_duration(settings.grace_period()),
        timeout
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply() {
        let mut settings = Settings::default();

        apply(&mut settings, Some(Duration::from_millis(200)), Some(Duration::from_secs(5)), false).unwrap();
        assert_eq!(settings.grace_period_ms, 200);
        assert_eq!(settings.timeout_ms, Some(5000));

        apply(&mut settings, None, None, true).unwrap();
        assert_eq!(settings.grace_period_ms, 200);
        assert_eq!(settings.timeout_ms, None);
    }

    #[test]
    fn test_apply_rejects_unstorable_durations() {
        let mut settings = Settings::default();

        let err = apply(&mut settings, Some(Duration::from_secs(u64::MAX)), None, false).unwrap_err();
        assert!(err.to_string().contains("grace period"));
        assert!(apply(&mut settings, None, Some(Duration::MAX), false).is_err());

        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_render() {
        let settings = Settings {
            grace_period_ms: 1500,
            timeout_ms: None,
        };
        assert_eq!(render(&settings), "Grace period: 1500ms\nTimeout:      none\n");
    }
}
