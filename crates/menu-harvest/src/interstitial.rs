//! Cookie banner and modal dismissal.
//!
//! Best-effort by contract: [`dismiss_interstitials`] never fails. A script
//! error or an overlay nobody recognises just means extraction proceeds on
//! whatever the page shows.

use serde::Deserialize;
use std::time::Duration;

use crate::config::InterstitialConfig;
use crate::renderer::{scripts, RenderContext};

/// A visible clickable control as reported by the scan script.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VisibleControl {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub aria: String,
}

impl VisibleControl {
    pub fn label(&self) -> &str {
        if self.text.is_empty() {
            &self.aria
        } else {
            &self.text
        }
    }
}

/// Index of the first control that accepts or closes an overlay.
pub fn pick_control(controls: &[VisibleControl], config: &InterstitialConfig) -> Option<usize> {
    controls
        .iter()
        .take(config.max_controls)
        .position(|c| is_affirmative(c, config) || is_closing(c, config))
}

fn is_affirmative(control: &VisibleControl, config: &InterstitialConfig) -> bool {
    let text = control.text.to_lowercase();
    if text.is_empty() {
        return false;
    }
    config.affirmative.iter().any(|word| text.contains(word.as_str()))
        || text
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| config.affirmative_words.iter().any(|w| w == token))
}

fn is_closing(control: &VisibleControl, config: &InterstitialConfig) -> bool {
    let text = control.text.trim().to_lowercase();
    let aria = control.aria.trim().to_lowercase();
    config.closing.iter().any(|word| {
        text == *word || aria == *word || (word.len() > 1 && aria.contains(word.as_str()))
    })
}

/// Dismiss up to `config.rounds` stacked overlays on the current page.
///
/// Returns the labels of the controls that were clicked, in order.
pub async fn dismiss_interstitials(
    page: &dyn RenderContext,
    config: &InterstitialConfig,
    settle_ms: u64,
) -> Vec<String> {
    let mut clicked = Vec::new();

    for round in 0..config.rounds {
        let controls = match page.execute_js(&scripts::scan_controls(config.max_controls)).await {
            Ok(value) => serde_json::from_value::<Vec<VisibleControl>>(value).unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Interstitial scan failed: {e:#}");
                break;
            }
        };

        let Some(index) = pick_control(&controls, config) else {
            tracing::debug!(round, controls = controls.len(), "No interstitial control matched");
            break;
        };
        let label = controls[index].label().to_string();

        match page.execute_js(&scripts::click_control(index)).await {
            Ok(serde_json::Value::Bool(true)) => {
                tracing::debug!(round, "Dismissed interstitial via {label:?}");
                clicked.push(label);
            }
            Ok(_) => {
                tracing::debug!("Interstitial control {label:?} vanished before the click");
                break;
            }
            Err(e) => {
                tracing::warn!("Interstitial click on {label:?} failed: {e:#}");
                break;
            }
        }

        if settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(settle_ms)).await;
        }
    }

    clicked
}
