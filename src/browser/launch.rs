use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cdp::CdpSession;
use super::{Launcher, TransportError};

/// Default time allowed for the browser to start and answer.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Flags every launch carries regardless of configuration.
pub const FIXED_BROWSER_ARGS: &[&str] = &[
    "--disable-gpu",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-setuid-sandbox",
];

/// How the shared browser process is started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BrowserLaunchConfig {
    /// Browser binary; chromiumoxide's platform lookup when unset.
    pub executable_path: Option<PathBuf>,
    /// Extra flags appended after [`FIXED_BROWSER_ARGS`].
    pub args: Vec<String>,
    pub headless: bool,
    #[serde(with = "humantime_serde")]
    pub launch_timeout: Duration,
}

impl Default for BrowserLaunchConfig {
    fn default() -> Self {
        Self {
            executable_path: None,
            args: Vec::new(),
            headless: true,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
        }
    }
}

impl BrowserLaunchConfig {
    /// Fixed flags followed by user flags, each normalised to a `--` prefix.
    pub fn launch_args(&self) -> Vec<String> {
        let user = self
            .args
            .iter()
            .map(|arg| arg.trim())
            .filter(|arg| !arg.is_empty())
            .map(|arg| {
                if arg.starts_with("--") {
                    arg.to_string()
                } else {
                    format!("--{}", arg.trim_start_matches('-'))
                }
            });
        FIXED_BROWSER_ARGS
            .iter()
            .map(|arg| arg.to_string())
            .chain(user)
            .collect()
    }

    fn browser_config(&self) -> Result<BrowserConfig, TransportError> {
        let mut builder = BrowserConfig::builder()
            .launch_timeout(self.launch_timeout)
            .args(self.launch_args());
        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable_path {
            builder = builder.chrome_executable(path);
        }
        builder.build().map_err(TransportError::Protocol)
    }
}

/// Launches a local Chrome/Chromium through chromiumoxide.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeLauncher;

impl Launcher for ChromeLauncher {
    type Session = CdpSession;

    async fn launch(&self, config: &BrowserLaunchConfig) -> Result<CdpSession, TransportError> {
        let browser_config = config.browser_config()?;
        debug!(
            executable = ?config.executable_path,
            headless = config.headless,
            "launching browser"
        );
        let (browser, mut handler) = Browser::launch(browser_config).await?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(%err, "browser event loop stopped");
                    break;
                }
            }
        });

        Ok(CdpSession::new(browser, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_headless() {
        let cfg = BrowserLaunchConfig::default();
        assert!(cfg.headless);
        assert!(cfg.executable_path.is_none());
        assert!(cfg.args.is_empty());
        assert_eq!(cfg.launch_timeout, DEFAULT_LAUNCH_TIMEOUT);
    }

    #[test]
    fn launch_args_prefix_fixed_flags() {
        let cfg = BrowserLaunchConfig {
            args: vec![
                "no-first-run".into(),
                "--lang=en-US".into(),
                "-single-dash".into(),
                "  ".into(),
            ],
            ..BrowserLaunchConfig::default()
        };
        let args = cfg.launch_args();
        assert_eq!(&args[..4], FIXED_BROWSER_ARGS);
        assert_eq!(
            &args[4..],
            ["--no-first-run", "--lang=en-US", "--single-dash"]
        );
    }

    #[test]
    fn deserializes_humantime_timeout() {
        let cfg: BrowserLaunchConfig = toml::from_str(
            r#"
            executable_path = "/usr/bin/chromium"
            args = ["no-first-run"]
            headless = false
            launch_timeout = "45s"
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.executable_path, Some(PathBuf::from("/usr/bin/chromium")));
        assert!(!cfg.headless);
        assert_eq!(cfg.launch_timeout, Duration::from_secs(45));
    }
}
