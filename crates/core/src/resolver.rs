//! Looks an identifier up across the stores and returns what to send.

use crate::error::ResolveError;
use crate::instruction::{Action, Instruction, Move, Say, ShowImage};
use crate::session::Session;
use crate::store::Store;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Something that can turn an identifier into an [`Instruction`].
#[async_trait]
pub trait InstructionSource: Send + Sync {
    async fn find_instruction(&self, id: Uuid) -> Option<Instruction>;
}

#[async_trait]
impl InstructionSource for Store<Session> {
    async fn find_instruction(&self, id: Uuid) -> Option<Instruction> {
        self.find_action(id).await.map(Instruction::Action)
    }
}

#[async_trait]
impl InstructionSource for Store<Move> {
    async fn find_instruction(&self, id: Uuid) -> Option<Instruction> {
        self.get(id).await.ok().map(Instruction::Move)
    }
}

#[async_trait]
impl InstructionSource for Store<Action> {
    async fn find_instruction(&self, id: Uuid) -> Option<Instruction> {
        self.get(id).await.ok().map(Instruction::Action)
    }
}

#[async_trait]
impl InstructionSource for Store<Say> {
    async fn find_instruction(&self, id: Uuid) -> Option<Instruction> {
        self.get(id).await.ok().map(Instruction::Say)
    }
}

#[async_trait]
impl InstructionSource for Store<ShowImage> {
    async fn find_instruction(&self, id: Uuid) -> Option<Instruction> {
        self.get(id).await.ok().map(Instruction::ShowImage)
    }
}

/// Tries each source in order; the first hit wins.
#[derive(Clone)]
pub struct Resolver {
    sources: Vec<Arc<dyn InstructionSource>>,
}

impl Resolver {
    pub fn new(sources: Vec<Arc<dyn InstructionSource>>) -> Self {
        Self { sources }
    }

    pub async fn resolve(&self, id: Uuid) -> Result<Instruction, ResolveError> {
        for source in &self.sources {
            if let Some(instruction) = source.find_instruction(id).await {
                debug!(%id, command = %instruction.command(), "Instruction resolved");
                return Ok(instruction);
            }
        }
        Err(ResolveError::NotFound(id))
    }
}
