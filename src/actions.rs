//! Action Dispatcher for notification taps.
//!
//! A tapped notification hands back the opaque payload it was displayed
//! with, shaped `<category>_<context>`. The category is matched by prefix
//! against a fixed set; anything else decodes to [`RoutedIntent::Noop`] so
//! payloads minted by newer app versions are tolerated.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Known payload categories, matched as prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    SmartFeeding,
    SmartWeight,
    ReminderComplete,
}

impl ActionCategory {
    pub fn all() -> &'static [ActionCategory] {
        &[
            ActionCategory::SmartFeeding,
            ActionCategory::SmartWeight,
            ActionCategory::ReminderComplete,
        ]
    }

    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            ActionCategory::SmartFeeding => "smart_feeding",
            ActionCategory::SmartWeight => "smart_weight",
            ActionCategory::ReminderComplete => "reminder_complete",
        }
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Where a tapped notification should take the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutedIntent {
    /// Open the feeding log.
    Feeding { context: String },
    /// Open the weight log.
    Weight { context: String },
    /// Mark the reminder done.
    CompleteReminder { context: String },
    /// Unrecognized payload; nothing to do.
    Noop,
}

impl RoutedIntent {
    #[must_use]
    pub fn category(&self) -> Option<ActionCategory> {
        match self {
            RoutedIntent::Feeding { .. } => Some(ActionCategory::SmartFeeding),
            RoutedIntent::Weight { .. } => Some(ActionCategory::SmartWeight),
            RoutedIntent::CompleteReminder { .. } => Some(ActionCategory::ReminderComplete),
            RoutedIntent::Noop => None,
        }
    }

    /// Application-defined remainder after the category.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        match self {
            RoutedIntent::Feeding { context }
            | RoutedIntent::Weight { context }
            | RoutedIntent::CompleteReminder { context } => Some(context),
            RoutedIntent::Noop => None,
        }
    }

    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, RoutedIntent::Noop)
    }
}

/// Decode a notification payload into an intent. Never fails.
pub fn decode(payload: &str) -> RoutedIntent {
    for category in ActionCategory::all() {
        if let Some(rest) = payload.strip_prefix(category.prefix()) {
            let context = rest.strip_prefix('_').unwrap_or(rest).to_owned();
            return match category {
                ActionCategory::SmartFeeding => RoutedIntent::Feeding { context },
                ActionCategory::SmartWeight => RoutedIntent::Weight { context },
                ActionCategory::ReminderComplete => RoutedIntent::CompleteReminder { context },
            };
        }
    }
    RoutedIntent::Noop
}

/// Leading `_`-separated token, for logging without the full payload.
fn leading_token(payload: &str) -> &str {
    payload.split('_').next().unwrap_or_default()
}

/// Receives decoded taps on the application side.
#[async_trait]
pub trait ActionForwarder: Send + Sync {
    /// Forward the raw payload; `true` when the app acknowledged it.
    async fn handle_notification_action(&self, payload: &str) -> bool;
}

/// Result of dispatching one tap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub intent: RoutedIntent,
    /// Whether the application layer acknowledged the action.
    pub acknowledged: bool,
}

/// Decodes taps and forwards recognized ones to the application layer.
pub struct ActionDispatcher {
    forwarder: Arc<dyn ActionForwarder>,
    ignored: AtomicU64,
}

impl fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("ignored", &self.ignored_count())
            .finish_non_exhaustive()
    }
}

impl ActionDispatcher {
    pub fn new(forwarder: Arc<dyn ActionForwarder>) -> Self {
        Self {
            forwarder,
            ignored: AtomicU64::new(0),
        }
    }

    /// Decode `payload` and route it.
    ///
    /// Unrecognized payloads are counted and dropped; they are never errors.
    pub async fn dispatch(&self, payload: &str) -> DispatchOutcome {
        let intent = decode(payload);
        let Some(category) = intent.category() else {
            self.ignored.fetch_add(1, Ordering::Relaxed);
            debug!(
                token = leading_token(payload),
                len = payload.len(),
                "ignoring unrecognized notification action"
            );
            return DispatchOutcome {
                intent,
                acknowledged: false,
            };
        };

        let acknowledged = self.forwarder.handle_notification_action(payload).await;
        info!(category = %category, acknowledged, "notification action routed");
        DispatchOutcome {
            intent,
            acknowledged,
        }
    }

    /// Payloads dropped because their category was not recognized.
    #[must_use]
    pub fn ignored_count(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }
}
