//! Inbound command packets: a batch of robot commands for one team.

use std::io::{Read, Write};

use super::codec::{Decode, Encode, ProtocolError, Result};
use crate::domain::{Actuation, Kick, RobotCommand, Team};

#[derive(Clone, Debug, PartialEq)]
pub struct CommandPacket {
    /// Sender clock in seconds; informational only.
    pub timestamp: f64,
    pub team: Team,
    pub commands: Vec<RobotCommand>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ActuationTag {
    Wheels = 0,
    Velocity = 1,
}

impl TryFrom<u8> for ActuationTag {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ActuationTag::Wheels),
            1 => Ok(ActuationTag::Velocity),
            _ => Err(ProtocolError::InvalidTag(value, "actuation")),
        }
    }
}

impl Encode for Team {
    fn encode(&self, write: impl Write) -> Result<()> {
        (self.index() as u8).encode(write)
    }

    fn encode_len(&self) -> usize {
        1
    }
}

impl Decode for Team {
    fn decode(read: impl Read) -> Result<Self> {
        let value = u8::decode(read)?;
        Team::try_from(value).map_err(|value| ProtocolError::InvalidTag(value, "team"))
    }
}

impl Encode for RobotCommand {
    fn encode(&self, mut write: impl Write) -> Result<()> {
        let id = u8::try_from(self.id).map_err(|_| ProtocolError::TooManyEntries(self.id))?;
        id.encode(&mut write)?;
        match self.actuation {
            Actuation::Wheels(speeds) => {
                (ActuationTag::Wheels as u8).encode(&mut write)?;
                speeds.map(|speed| speed as f32).encode(&mut write)?;
            }
            Actuation::Velocity { vx, vy, omega } => {
                (ActuationTag::Velocity as u8).encode(&mut write)?;
                [vx as f32, vy as f32, omega as f32].encode(&mut write)?;
            }
        }
        [
            self.kick.flat as f32,
            self.kick.chip as f32,
            self.dribbler_spin as f32,
        ]
        .encode(write)
    }

    fn encode_len(&self) -> usize {
        let actuation = match self.actuation {
            Actuation::Wheels(_) => 16,
            Actuation::Velocity { .. } => 12,
        };
        2 + actuation + 12
    }
}

impl Decode for RobotCommand {
    fn decode(mut read: impl Read) -> Result<Self> {
        let id = u8::decode(&mut read)?;
        let actuation = match ActuationTag::try_from(u8::decode(&mut read)?)? {
            ActuationTag::Wheels => {
                Actuation::Wheels(finite(<[f32; 4]>::decode(&mut read)?, "wheel")?)
            }
            ActuationTag::Velocity => {
                let [vx, vy, omega] = finite(<[f32; 3]>::decode(&mut read)?, "velocity")?;
                Actuation::Velocity { vx, vy, omega }
            }
        };
        let [flat, chip] = finite(<[f32; 2]>::decode(&mut read)?, "kick")?;
        let [dribbler_spin] = finite(<[f32; 1]>::decode(read)?, "dribbler")?;
        Ok(RobotCommand {
            id: id.into(),
            actuation,
            kick: Kick { flat, chip },
            dribbler_spin,
        })
    }
}

/// Widens wire floats, rejecting NaN and infinities.
fn finite<const N: usize>(values: [f32; N], what: &'static str) -> Result<[f64; N]> {
    if values.iter().all(|value| value.is_finite()) {
        Ok(values.map(f64::from))
    } else {
        Err(ProtocolError::NonFinite(what))
    }
}

impl Encode for CommandPacket {
    fn encode(&self, mut write: impl Write) -> Result<()> {
        self.timestamp.encode(&mut write)?;
        self.team.encode(&mut write)?;
        self.commands.encode(write)
    }

    fn encode_len(&self) -> usize {
        8 + 1 + self.commands.encode_len()
    }
}

impl Decode for CommandPacket {
    fn decode(mut read: impl Read) -> Result<Self> {
        Ok(CommandPacket {
            timestamp: f64::decode(&mut read)?,
            team: Team::decode(&mut read)?,
            commands: Vec::decode(read)?,
        })
    }
}
