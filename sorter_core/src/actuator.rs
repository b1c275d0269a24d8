//! Diverter servo control.
//!
//! Every move is followed by the settle delay and a signal release. A sort
//! cycle always ends at HOME, including when the sort move itself failed.

use sorter_traits::{Clock, Servo};

use crate::config::ActuatorCfg;
use crate::error::Result;
use crate::hw_error::hw_report;
use crate::types::Disposition;

pub const MIN_ANGLE: f32 = 0.0;
pub const MAX_ANGLE: f32 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Position {
    Home,
    Good,
    Bad,
    Degrees(f32),
}

impl From<Disposition> for Position {
    fn from(d: Disposition) -> Self {
        match d {
            Disposition::Accept => Position::Good,
            Disposition::Reject => Position::Bad,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveOutcome {
    pub angle: f32,
    /// The request was outside [0, 180] or not a number.
    pub clamped: bool,
}

pub struct Actuator {
    servo: Box<dyn Servo + Send>,
    cfg: ActuatorCfg,
    angle: Option<f32>,
}

impl Actuator {
    pub fn new(servo: Box<dyn Servo + Send>, cfg: ActuatorCfg) -> Self {
        Self {
            servo,
            cfg,
            angle: None,
        }
    }

    pub fn cfg(&self) -> &ActuatorCfg {
        &self.cfg
    }

    /// Last angle the servo accepted; `None` before the first move.
    pub fn angle(&self) -> Option<f32> {
        self.angle
    }

    pub fn is_home(&self) -> bool {
        self.angle == Some(self.resolve(Position::Home).angle)
    }

    /// Map a position to a bounded angle without moving.
    pub fn resolve(&self, pos: Position) -> MoveOutcome {
        let requested = match pos {
            Position::Home => self.cfg.home_deg,
            Position::Good => self.cfg.good_deg,
            Position::Bad => self.cfg.bad_deg,
            Position::Degrees(d) => d,
        };
        if requested.is_nan() {
            return MoveOutcome {
                angle: self.cfg.home_deg.clamp(MIN_ANGLE, MAX_ANGLE),
                clamped: true,
            };
        }
        let angle = requested.clamp(MIN_ANGLE, MAX_ANGLE);
        MoveOutcome {
            angle,
            clamped: angle != requested,
        }
    }

    pub fn move_to(&mut self, pos: Position, clock: &dyn Clock) -> Result<MoveOutcome> {
        let out = self.resolve(pos);
        if out.clamped {
            tracing::warn!(?pos, angle = out.angle, "servo request clamped");
        }
        self.servo
            .set_angle(out.angle)
            .map_err(|e| hw_report(&e, "move servo"))?;
        self.angle = Some(out.angle);
        clock.sleep_ms(self.cfg.move_delay_ms);
        if let Err(e) = self.servo.release() {
            tracing::warn!(error = %e, "servo release failed");
        }
        tracing::debug!(angle = out.angle, "servo moved");
        Ok(out)
    }

    /// Move to the bin, hold, and return HOME.
    pub fn sort(&mut self, disposition: Disposition, clock: &dyn Clock) -> Result<MoveOutcome> {
        let out = match self.move_to(disposition.into(), clock) {
            Ok(o) => o,
            Err(e) => {
                if let Err(home) = self.move_to(Position::Home, clock) {
                    tracing::error!(error = %format!("{home:#}"), "servo failed to return home");
                }
                return Err(e);
            }
        };
        clock.sleep_ms(self.cfg.hold_ms);
        self.move_to(Position::Home, clock)?;
        Ok(out)
    }

    pub fn park(&mut self, clock: &dyn Clock) -> Result<()> {
        self.move_to(Position::Home, clock)?;
        Ok(())
    }
}
