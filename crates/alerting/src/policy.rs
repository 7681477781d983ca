//! Alert Policy Implementation

use std::sync::Arc;

use dms::{AlertnessState, Transition};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AlertError;

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Play the audible alert when entering sleeping
    pub sound_enabled: bool,
    /// Show a visible notice when drifting from awake to drowsy
    pub drowsy_notice: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            drowsy_notice: true,
        }
    }
}

/// Toast styling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    Default,
    Warning,
    Destructive,
}

/// User-visible notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub variant: ToastVariant,
}

impl Toast {
    fn new(title: &str, description: &str, variant: ToastVariant) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            variant,
        }
    }

    pub fn sleeping() -> Self {
        Self::new(
            "Alert!",
            "You appear to be sleeping! Please take a break.",
            ToastVariant::Destructive,
        )
    }

    pub fn drowsy() -> Self {
        Self::new(
            "Warning",
            "Warning: You are showing signs of drowsiness!",
            ToastVariant::Warning,
        )
    }

    pub fn detection_started() -> Self {
        Self::new(
            "Detection Started",
            "Drowsiness detection is now active.",
            ToastVariant::Default,
        )
    }

    pub fn detection_stopped() -> Self {
        Self::new(
            "Detection Stopped",
            "Drowsiness detection has been deactivated.",
            ToastVariant::Default,
        )
    }

    pub fn input_not_ready() -> Self {
        Self::new(
            "Webcam not ready",
            "Please ensure your webcam is connected and permissions are granted.",
            ToastVariant::Destructive,
        )
    }
}

/// Action raised by a transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertAction {
    PlaySound,
    ShowToast(Toast),
}

impl AlertAction {
    pub fn label(&self) -> &'static str {
        match self {
            AlertAction::PlaySound => "play_sound",
            AlertAction::ShowToast(_) => "show_toast",
        }
    }
}

/// Audio playback capability
pub trait AudioPlayer: Send + Sync {
    fn play_alert(&self) -> Result<(), AlertError>;
}

/// Delivery of user-visible notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: &Toast);
}

/// Maps alertness transitions to alerts
pub struct AlertPolicy {
    config: AlertConfig,
    audio: Arc<dyn AudioPlayer>,
    notifier: Arc<dyn Notifier>,
}

impl AlertPolicy {
    pub fn new(config: AlertConfig, audio: Arc<dyn AudioPlayer>, notifier: Arc<dyn Notifier>) -> Self {
        info!("Creating alert policy with config: {:?}", config);
        Self {
            config,
            audio,
            notifier,
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Alerts for a transition. Empty when nothing should fire.
    pub fn on_state_change(&self, previous: AlertnessState, current: AlertnessState) -> Vec<AlertAction> {
        if previous == current {
            return Vec::new();
        }

        match (previous, current) {
            (_, AlertnessState::Sleeping) => {
                let mut actions = Vec::with_capacity(2);
                if self.config.sound_enabled {
                    actions.push(AlertAction::PlaySound);
                }
                actions.push(AlertAction::ShowToast(Toast::sleeping()));
                actions
            }
            (AlertnessState::Awake, AlertnessState::Drowsy) if self.config.drowsy_notice => {
                vec![AlertAction::ShowToast(Toast::drowsy())]
            }
            _ => Vec::new(),
        }
    }

    /// Evaluate a transition and deliver its alerts
    pub fn handle(&self, transition: &Transition) -> Vec<AlertAction> {
        let actions = self.on_state_change(transition.previous, transition.current);
        self.dispatch(&actions);
        actions
    }

    /// Deliver actions. Audio failures are logged and swallowed.
    pub fn dispatch(&self, actions: &[AlertAction]) {
        for action in actions {
            metrics::counter!("dms_alerts_total", "action" => action.label()).increment(1);
            match action {
                AlertAction::PlaySound => {
                    if let Err(e) = self.audio.play_alert() {
                        warn!("Error playing alert: {}", e);
                    }
                }
                AlertAction::ShowToast(toast) => {
                    info!("Alert: {} - {}", toast.title, toast.description);
                    self.notifier.notify(toast);
                }
            }
        }
    }

    /// Deliver a notice outside of a transition (session lifecycle)
    pub fn notice(&self, toast: Toast) {
        self.notifier.notify(&toast);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingAudio {
        plays: AtomicUsize,
        fail: bool,
    }

    impl AudioPlayer for CountingAudio {
        fn play_alert(&self) -> Result<(), AlertError> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AlertError::Audio("no output device".into()))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        toasts: Mutex<Vec<Toast>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, toast: &Toast) {
            self.toasts.lock().unwrap().push(toast.clone());
        }
    }

    fn policy(config: AlertConfig) -> (AlertPolicy, Arc<CountingAudio>, Arc<RecordingNotifier>) {
        let audio = Arc::new(CountingAudio::default());
        let notifier = Arc::new(RecordingNotifier::default());
        (
            AlertPolicy::new(config, audio.clone(), notifier.clone()),
            audio,
            notifier,
        )
    }

    #[test]
    fn test_entering_sleeping_plays_sound_and_warns() {
        let (policy, _, _) = policy(AlertConfig::default());
        for from in [AlertnessState::Awake, AlertnessState::Drowsy] {
            let actions = policy.on_state_change(from, AlertnessState::Sleeping);
            assert_eq!(
                actions,
                vec![AlertAction::PlaySound, AlertAction::ShowToast(Toast::sleeping())]
            );
        }
    }

    #[test]
    fn test_staying_asleep_is_silent() {
        let (policy, _, _) = policy(AlertConfig::default());
        assert!(policy
            .on_state_change(AlertnessState::Sleeping, AlertnessState::Sleeping)
            .is_empty());
    }

    #[test]
    fn test_drowsy_is_visual_only() {
        let (policy, _, _) = policy(AlertConfig::default());
        let actions = policy.on_state_change(AlertnessState::Awake, AlertnessState::Drowsy);
        assert_eq!(actions, vec![AlertAction::ShowToast(Toast::drowsy())]);

        // Sleeping -> drowsy raises nothing
        assert!(policy
            .on_state_change(AlertnessState::Sleeping, AlertnessState::Drowsy)
            .is_empty());
    }

    #[test]
    fn test_sound_can_be_disabled() {
        let (policy, _, _) = policy(AlertConfig {
            sound_enabled: false,
            ..Default::default()
        });
        let actions = policy.on_state_change(AlertnessState::Awake, AlertnessState::Sleeping);
        assert!(!actions.contains(&AlertAction::PlaySound));
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_only_sleeping_plays_sound() {
        let (policy, _, _) = policy(AlertConfig::default());
        let states = [
            AlertnessState::Inactive,
            AlertnessState::Awake,
            AlertnessState::Drowsy,
            AlertnessState::Sleeping,
        ];
        for from in states {
            for to in states {
                let plays = policy
                    .on_state_change(from, to)
                    .contains(&AlertAction::PlaySound);
                assert_eq!(plays, to == AlertnessState::Sleeping && from != to);
            }
        }
    }

    #[test]
    fn test_dispatch_survives_audio_failure() {
        let audio = Arc::new(CountingAudio {
            fail: true,
            ..Default::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let policy = AlertPolicy::new(AlertConfig::default(), audio.clone(), notifier.clone());

        policy.handle(&Transition {
            previous: AlertnessState::Awake,
            current: AlertnessState::Sleeping,
        });

        assert_eq!(audio.plays.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.toasts.lock().unwrap().as_slice(), &[Toast::sleeping()]);
    }
}
