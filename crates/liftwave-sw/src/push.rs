//! Push notifications and click routing.

use serde::Serialize;

/// Notification action identifier: jump into a new workout.
pub const ACTION_START_WORKOUT: &str = "start-workout";
/// Notification action identifier: open today's recommendations.
pub const ACTION_VIEW_RECOMMENDATIONS: &str = "view-recommendations";

/// A notification the host should display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub actions: Vec<NotificationAction>,
}

/// An action button on a notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: String,
}

/// Build the training-reminder notification. The push payload, when
/// present, becomes the body text.
pub fn build_notification(payload: Option<&str>) -> Notification {
    Notification {
        title: "Muscle Rotation Manager".to_string(),
        body: payload.unwrap_or("Time to train!").to_string(),
        icon: "/icons/icon-192x192.png".to_string(),
        badge: "/icons/badge-72x72.png".to_string(),
        vibrate: vec![200, 100, 200],
        actions: vec![
            NotificationAction {
                action: ACTION_START_WORKOUT.to_string(),
                title: "Start workout".to_string(),
                icon: "/icons/action-start.png".to_string(),
            },
            NotificationAction {
                action: ACTION_VIEW_RECOMMENDATIONS.to_string(),
                title: "View recommendations".to_string(),
                icon: "/icons/action-view.png".to_string(),
            },
        ],
    }
}

/// Deep-link target for a notification click.
pub fn action_target(action: Option<&str>) -> &'static str {
    match action {
        Some(ACTION_START_WORKOUT) => "/?action=new-workout",
        Some(ACTION_VIEW_RECOMMENDATIONS) => "/?action=recommendations",
        _ => "/",
    }
}
