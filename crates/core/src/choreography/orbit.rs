use super::actor::{ActorId, ActorKind, AnimatedActor};
use crate::{
    easing::{progress, Lerp},
    geometry::{normalized_to_screen, Point, ScreenSize},
    timeline::Millis,
};

/// Two laps of an ellipse around the sanctum, as fractions of the screen.
/// Each lap starts and ends at the bottom of the ellipse.
pub const ORBIT_WAYPOINTS: [(f64, f64); 17] = [
    (0.50, 0.67),
    (0.29, 0.635),
    (0.20, 0.55),
    (0.29, 0.465),
    (0.50, 0.43),
    (0.71, 0.465),
    (0.80, 0.55),
    (0.71, 0.635),
    (0.50, 0.67),
    (0.29, 0.635),
    (0.20, 0.55),
    (0.29, 0.465),
    (0.50, 0.43),
    (0.71, 0.465),
    (0.80, 0.55),
    (0.71, 0.635),
    (0.50, 0.67),
];

/// Centre of the tray along the waypoint path at normalized time `t`.
/// Waypoints are spaced evenly in time.
pub fn orbit_point(t: f64, screen: ScreenSize) -> Point {
    let segments = ORBIT_WAYPOINTS.len() - 1;
    let scaled = t.clamp(0.0, 1.0) * segments as f64;
    let index = (scaled.floor() as usize).min(segments - 1);
    let local = scaled - index as f64;

    let (ax, ay) = ORBIT_WAYPOINTS[index];
    let (bx, by) = ORBIT_WAYPOINTS[index + 1];
    let normalized = Point::lerp(&Point::new(ax, ay), &Point::new(bx, by), local);
    normalized_to_screen(normalized, screen)
}

/// The offering tray making its laps.
#[derive(Debug, Clone)]
pub(crate) struct TrayOrbit {
    pub id: ActorId,
    pub started_at: Millis,
    pub duration: Millis,
    screen: ScreenSize,
    size: f64,
}

impl TrayOrbit {
    pub fn new(id: ActorId, started_at: Millis, duration: Millis, screen: ScreenSize, size: f64) -> Self {
        Self {
            id,
            started_at,
            duration,
            screen,
            size,
        }
    }

    pub fn ends_at(&self) -> Millis {
        self.started_at + self.duration
    }

    pub fn is_complete(&self, now: Millis) -> bool {
        now >= self.ends_at()
    }

    fn top_left(&self, centre: Point) -> Point {
        Point::new(centre.x - self.size / 2.0, centre.y - self.size / 2.0)
    }

    pub fn actor(&self, now: Millis) -> AnimatedActor {
        let t = progress(now, self.started_at, self.duration);
        AnimatedActor {
            id: self.id,
            kind: ActorKind::Tray,
            spawn_time: self.started_at,
            origin_position: self.top_left(orbit_point(0.0, self.screen)),
            position: self.top_left(orbit_point(t, self.screen)),
            opacity: 1.0,
            scale: 1.0,
            rotation_deg: 0.0,
            retire_at: self.ends_at(),
        }
    }
}
