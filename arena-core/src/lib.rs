//! Zone Arena battle-session engine.
//!
//! This crate pairs two remote players for a real-time, turn-based
//! 1-vs-1 battle and keeps both clients' view of the match consistent
//! across network loss and reconnection. It provides:
//! - FIFO matchmaking and a session registry
//! - The per-room turn state machine with randomized skill resolution
//!   under zone modifiers
//! - Status-effect ticking and win-condition detection
//! - A persistent-identity reconnection protocol with full-snapshot
//!   resynchronization
//!
//! Presentation (rendering, animations, asset pipelines) lives outside
//! this crate; the engine consumes [`events::InboundEvent`]s and emits
//! [`events::OutboundEvent`]s a transport can frame as JSON.
//!
//! # Quick Start
//!
//! ```
//! use arena_core::{ArenaHost, InboundEvent};
//!
//! let mut host = ArenaHost::new();
//! let (alice, _) = host.connect(None);
//! let (bob, _) = host.connect(None);
//!
//! host.handle(alice, InboundEvent::JoinQueue { username: "alice".into() });
//! let deliveries = host.handle(bob, InboundEvent::JoinQueue { username: "bob".into() });
//! assert!(!deliveries.is_empty()); // match-started for both players
//!
//! // Alice owns the opening turn.
//! let deliveries = host.handle(alice, InboundEvent::UseSkill);
//! assert!(!deliveries.is_empty());
//! ```

pub mod catalog;
pub mod chance;
pub mod events;
pub mod host;
pub mod identity;
pub mod registry;
pub mod resolver;
pub mod selector;
pub mod session;
pub mod state;
pub mod status;
pub mod testing;

// Primary public API
pub use catalog::{Skill, SkillEffect, SkillId, SkillKind, GAMBLE_NOTHING, GAMBLE_ULTIMATE};
pub use events::{GameSnapshot, InboundEvent, OutboundEvent, PlayerView};
pub use host::{ArenaHost, Delivery, HostHandle, HostRequest};
pub use identity::{ConnectionId, IdentityManager, PlayerId};
pub use registry::{SessionRegistry, WaitingPlayer};
pub use session::{Action, ActionError, ActionReport, GameSession, MatchOutcome, RoomId};
pub use state::{ActiveZone, MpRegenBonus, PlayerBattleState, PoisonStatus, Zone};
pub use testing::TestHarness;
