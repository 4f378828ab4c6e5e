//! Core of the robot action composer: the instruction model, the JSON record
//! stores, and delivery of instructions to the connected robot.

pub mod delivery;
pub mod error;
pub mod frame;
pub mod instruction;
pub mod motions;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod store;
pub mod uploads;

pub use delivery::deliver;
pub use error::{DeliveryError, InstructionError, ResolveError, StoreError};
pub use frame::{DiscoveryFrame, Frame};
pub use instruction::{Action, Command, Instruction, Move, Say, ShowImage, ShowUrl};
pub use registry::{Connection, ConnectionRegistry, ConnectionStatus, FrameSink};
pub use resolver::{InstructionSource, Resolver};
pub use session::{Session, SessionItem, SessionStore};
pub use store::{ActionStore, AudioStore, ImageStore, MoveStore, Record, Store};
