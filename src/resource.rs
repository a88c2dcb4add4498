//! The resource module encapsulates domain entities for use with Bevy.

use std::ops::{Deref, DerefMut};

use bevy::ecs::system::Resource;

use crate::{
    config::SimConfig,
    domain,
    status::{MotionTracker, StatusReport},
};

macro_rules! resource {
    ($name:ident, $target:ty) => {
        #[derive(Resource)]
        pub struct $name($target);

        impl Deref for $name {
            type Target = $target;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }

        impl From<$target> for $name {
            fn from(value: $target) -> Self {
                Self(value)
            }
        }
    };
}

resource!(WorldRes, domain::PhysicsWorld);
resource!(MatchRes, domain::MatchState);
resource!(LoopRes, domain::TickLoop);
resource!(ConfigRes, SimConfig);
resource!(TrackerRes, MotionTracker);
resource!(StatusRes, StatusReport);
