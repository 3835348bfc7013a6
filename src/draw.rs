//! Intent drawing hooks
//!
//! Actions announce what they are about to do - planned paths, target
//! circles, labels - through an `IntentDrawer`. The default sink discards
//! everything; `TraceDrawer` routes intents to the tracing subscriber,
//! which is enough for headless debugging.

use crate::core::types::{Circle, Rect, Team, Vec2};

pub trait IntentDrawer: Send + Sync {
    fn draw_path(&self, team: Team, path: &[Vec2]);
    fn draw_circle(&self, team: Team, circle: &Circle);
    fn draw_rect(&self, team: Team, rect: &Rect);
    fn draw_text(&self, team: Team, position: Vec2, text: &str);
}

/// Discards every intent.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDrawer;

impl IntentDrawer for NullDrawer {
    fn draw_path(&self, _team: Team, _path: &[Vec2]) {}
    fn draw_circle(&self, _team: Team, _circle: &Circle) {}
    fn draw_rect(&self, _team: Team, _rect: &Rect) {}
    fn draw_text(&self, _team: Team, _position: Vec2, _text: &str) {}
}

/// Logs intents at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceDrawer;

impl IntentDrawer for TraceDrawer {
    fn draw_path(&self, team: Team, path: &[Vec2]) {
        if let (Some(first), Some(last)) = (path.first(), path.last()) {
            tracing::debug!(
                %team,
                waypoints = path.len(),
                from = ?(first.x, first.y),
                to = ?(last.x, last.y),
                "intent: path"
            );
        }
    }

    fn draw_circle(&self, team: Team, circle: &Circle) {
        tracing::debug!(
            %team,
            center = ?(circle.center.x, circle.center.y),
            radius = circle.radius,
            "intent: circle"
        );
    }

    fn draw_rect(&self, team: Team, rect: &Rect) {
        tracing::debug!(
            %team,
            min = ?(rect.min.x, rect.min.y),
            max = ?(rect.max.x, rect.max.y),
            "intent: rect"
        );
    }

    fn draw_text(&self, team: Team, position: Vec2, text: &str) {
        tracing::debug!(%team, at = ?(position.x, position.y), text, "intent: label");
    }
}
