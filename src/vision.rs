//! Vision channel: publishes a snapshot of the world to multicast clients once per tick.

use std::{
    net::{Ipv4Addr, SocketAddrV4, UdpSocket},
    time::Instant,
};

use bevy::prelude::*;
use once_cell::sync::Lazy;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{error, info, warn};

use crate::{
    channel::{bind_nonblocking, BindError},
    domain::PhysicsWorld,
    protocol::{encode_to_vec, Perturbation, VisionFrame},
    resource::ConfigRes,
};

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Time-to-live of multicast frames; clients are expected on the local network.
const MULTICAST_TTL: u32 = 1;

pub struct Vision;

impl Plugin for Vision {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, connect);
    }
}

fn connect(config: Res<ConfigRes>, mut commands: Commands) {
    let mut publisher = VisionPublisher::new(config.perturbation(), config.seed);
    let network = &config.network;
    if let Err(err) = publisher.reconfigure(&network.vision_address, network.vision_port) {
        error!(%err, "vision channel disabled");
    }
    commands.insert_resource(publisher);
}

/// Owns the outbound socket. Without a socket the publisher is inert and frames are dropped.
#[derive(Resource)]
pub struct VisionPublisher {
    socket: Option<UdpSocket>,
    target: Option<SocketAddrV4>,
    perturbation: Perturbation,
    rng: ChaCha8Rng,
    sequence: u32,
    /// Set while sends fail, so a lasting failure is reported once.
    send_failing: bool,
}

impl VisionPublisher {
    pub fn new(perturbation: Perturbation, seed: u64) -> Self {
        Self {
            socket: None,
            target: None,
            perturbation,
            rng: ChaCha8Rng::seed_from_u64(seed),
            sequence: 0,
            send_failing: false,
        }
    }

    pub fn perturbation(&self) -> &Perturbation {
        &self.perturbation
    }

    pub fn set_perturbation(&mut self, perturbation: Perturbation, seed: u64) {
        self.perturbation = perturbation;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Drops the current socket and opens a new one for `address:port`. On failure the publisher
    /// stays inert until the next successful call.
    pub fn reconfigure(&mut self, address: &str, port: u16) -> Result<(), BindError> {
        self.socket = None;
        self.target = None;
        self.send_failing = false;

        let address = address
            .parse::<Ipv4Addr>()
            .map_err(|_| BindError::InvalidAddress(address.to_string()))?;
        let local = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
        let socket = bind_nonblocking(local)?;
        if address.is_multicast() {
            let io_error = |source| BindError::Io {
                address: local,
                source,
            };
            socket.set_multicast_ttl_v4(MULTICAST_TTL).map_err(io_error)?;
            socket.set_multicast_loop_v4(true).map_err(io_error)?;
        }

        self.socket = Some(socket);
        self.target = Some(SocketAddrV4::new(address, port));
        info!("vision server connected on: {port}");
        Ok(())
    }

    pub fn capture(&self, world: &PhysicsWorld) -> VisionFrame {
        VisionFrame::capture(world, self.sequence, EPOCH.elapsed().as_secs_f64())
    }

    /// Sends one frame, perturbed as configured. Failures are logged and otherwise ignored.
    pub fn publish(&mut self, frame: VisionFrame) -> bool {
        self.sequence = self.sequence.wrapping_add(1);
        let (Some(socket), Some(target)) = (&self.socket, self.target) else {
            return false;
        };
        let frame = self.perturbation.apply(frame, &mut self.rng);
        let bytes = match encode_to_vec(&frame) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, "unable to encode vision frame");
                return false;
            }
        };
        match socket.send_to(&bytes, target) {
            Ok(_) => {
                if self.send_failing {
                    info!(%target, "vision frames are delivered again");
                }
                self.send_failing = false;
                true
            }
            Err(err) => {
                if !self.send_failing {
                    warn!(%err, %target, "unable to send vision frame");
                }
                self.send_failing = true;
                false
            }
        }
    }
}
