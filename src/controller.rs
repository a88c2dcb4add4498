//! Command channel: external controllers steering the robots.
//!
//! Packets are drained between ticks. Each decoded command lands in its robot's pending slot,
//! replacing a command that has not been applied yet.

use std::{
    io::ErrorKind,
    net::{Ipv4Addr, SocketAddrV4, UdpSocket},
};

use bevy::prelude::*;
use tracing::{debug, error, info, warn};

use crate::{
    channel::{bind_nonblocking, BindError},
    domain::PhysicsWorld,
    protocol::{decode_exact, CommandPacket},
    resource::ConfigRes,
};

/// Large enough for a full batch of eleven wheel commands.
const MAX_PACKET_SIZE: usize = 1024;

pub struct Controller;

impl Plugin for Controller {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, listen);
    }
}

fn listen(config: Res<ConfigRes>, mut commands: Commands) {
    let mut receiver = CommandReceiver::default();
    if let Err(err) = receiver.reconfigure(config.network.command_port) {
        error!(%err, "command channel disabled");
    }
    commands.insert_resource(receiver);
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PollSummary {
    pub packets: usize,
    pub applied: usize,
    pub dropped_packets: usize,
    pub dropped_commands: usize,
}

/// Owns the inbound socket. Without a socket no commands are accepted.
#[derive(Resource, Default)]
pub struct CommandReceiver {
    socket: Option<UdpSocket>,
}

impl CommandReceiver {
    /// Closes the current socket and listens on `port`. On failure the receiver stays inert
    /// until the next successful call.
    pub fn reconfigure(&mut self, port: u16) -> Result<(), BindError> {
        self.socket = None;
        let socket = bind_nonblocking(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))?;
        self.socket = Some(socket);
        info!("command listen port bound on: {port}");
        Ok(())
    }

    /// Drains every waiting packet into the robots' pending slots.
    pub fn poll(&mut self, world: &mut PhysicsWorld) -> PollSummary {
        let mut summary = PollSummary::default();
        let Some(socket) = &self.socket else {
            return summary;
        };
        let mut buffer = [0; MAX_PACKET_SIZE];

        loop {
            match socket.recv_from(&mut buffer) {
                Ok((len, sender)) => {
                    summary.packets += 1;
                    match decode_exact::<CommandPacket>(&buffer[..len]) {
                        Ok(packet) => apply_packet(world, packet, &mut summary),
                        Err(err) => {
                            summary.dropped_packets += 1;
                            debug!(%err, %sender, "dropped malformed command packet");
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    warn!(%err, "unable to receive command packet");
                    break;
                }
            }
        }
        summary
    }
}

fn apply_packet(world: &mut PhysicsWorld, packet: CommandPacket, summary: &mut PollSummary) {
    for command in packet.commands {
        match world.submit_command(packet.team, command) {
            Ok(true) => summary.applied += 1,
            Ok(false) => summary.dropped_commands += 1,
            Err(err) => {
                summary.dropped_commands += 1;
                debug!(%err, "dropped command");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        domain::{Actuation, RobotCommand, Team},
        protocol::encode_to_vec,
        tests::{free_port, world_spec},
    };

    fn velocity(id: usize, vx: f64) -> RobotCommand {
        RobotCommand {
            id,
            actuation: Actuation::Velocity {
                vx,
                vy: 0.0,
                omega: 0.0,
            },
            ..RobotCommand::default()
        }
    }

    fn send(port: u16, bytes: &[u8]) {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        socket.send_to(bytes, (Ipv4Addr::LOCALHOST, port)).unwrap();
    }

    fn send_packet(port: u16, team: Team, commands: Vec<RobotCommand>) {
        let packet = CommandPacket {
            timestamp: 0.0,
            team,
            commands,
        };
        send(port, &encode_to_vec(&packet).unwrap());
    }

    /// Polls until `expected` packets arrived; loopback delivery is not instantaneous.
    fn poll_packets(
        receiver: &mut CommandReceiver,
        world: &mut PhysicsWorld,
        expected: usize,
    ) -> PollSummary {
        let mut total = PollSummary::default();
        for _ in 0..200 {
            let summary = receiver.poll(world);
            total.packets += summary.packets;
            total.applied += summary.applied;
            total.dropped_packets += summary.dropped_packets;
            total.dropped_commands += summary.dropped_commands;
            if total.packets >= expected {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        total
    }

    #[test]
    fn test_bind_conflict_then_reconfigure() {
        let occupied = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let busy_port = occupied.local_addr().unwrap().port();
        let mut world = PhysicsWorld::build(&world_spec(5)).unwrap();

        let mut receiver = CommandReceiver::default();
        assert!(matches!(
            receiver.reconfigure(busy_port),
            Err(BindError::Io { .. })
        ));
        assert_eq!(receiver.poll(&mut world), PollSummary::default());

        let port = free_port();
        receiver.reconfigure(port).unwrap();

        send_packet(port, Team::Blue, vec![velocity(2, 1.0)]);
        let summary = poll_packets(&mut receiver, &mut world, 1);
        assert_eq!(summary.applied, 1);
        assert_eq!(
            world.robot_mut(Team::Blue, 2).unwrap().apply_pending(),
            Some(velocity(2, 1.0))
        );
    }

    #[test]
    fn test_malformed_packet_is_dropped_alone() {
        let port = free_port();
        let mut receiver = CommandReceiver::default();
        receiver.reconfigure(port).unwrap();
        let mut world = PhysicsWorld::build(&world_spec(5)).unwrap();

        send_packet(port, Team::Yellow, vec![velocity(0, 0.5)]);
        send(port, &[1, 2, 3]);
        let summary = poll_packets(&mut receiver, &mut world, 2);

        assert_eq!(summary.dropped_packets, 1);
        assert_eq!(
            world.robot_mut(Team::Yellow, 0).unwrap().apply_pending(),
            Some(velocity(0, 0.5))
        );
    }

    #[test]
    fn test_unknown_robot_drops_only_that_command() {
        let port = free_port();
        let mut receiver = CommandReceiver::default();
        receiver.reconfigure(port).unwrap();
        let mut world = PhysicsWorld::build(&world_spec(3)).unwrap();

        send_packet(port, Team::Blue, vec![velocity(7, 1.0), velocity(1, 1.0)]);
        let summary = poll_packets(&mut receiver, &mut world, 1);

        assert_eq!(summary.applied, 1);
        assert_eq!(summary.dropped_commands, 1);
        assert_eq!(
            world.robot_mut(Team::Blue, 1).unwrap().apply_pending(),
            Some(velocity(1, 1.0))
        );
    }

    #[test]
    fn test_later_packet_overwrites_pending_command() {
        let port = free_port();
        let mut receiver = CommandReceiver::default();
        receiver.reconfigure(port).unwrap();
        let mut world = PhysicsWorld::build(&world_spec(3)).unwrap();

        send_packet(port, Team::Blue, vec![velocity(0, 1.0)]);
        send_packet(port, Team::Blue, vec![velocity(0, 2.0)]);
        poll_packets(&mut receiver, &mut world, 2);

        assert_eq!(
            world.robot_mut(Team::Blue, 0).unwrap().apply_pending(),
            Some(velocity(0, 2.0))
        );
    }

    #[test]
    fn test_non_finite_packet_is_dropped() {
        let port = free_port();
        let mut receiver = CommandReceiver::default();
        receiver.reconfigure(port).unwrap();
        let mut world = PhysicsWorld::build(&world_spec(3)).unwrap();

        send_packet(port, Team::Blue, vec![velocity(0, f64::NAN)]);
        send_packet(port, Team::Blue, vec![velocity(1, 1.0)]);
        let summary = poll_packets(&mut receiver, &mut world, 2);

        assert_eq!(summary.dropped_packets, 1);
        assert_eq!(summary.applied, 1);
        assert_eq!(world.robot_mut(Team::Blue, 0).unwrap().apply_pending(), None);
        for _ in 0..5 {
            world.step(0.016).unwrap();
        }
        assert!(world
            .robots()
            .iter()
            .all(|robot| robot.velocity().iter().all(|v| v.is_finite())));
    }
}
