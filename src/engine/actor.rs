use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tracing::info;

use super::executor::{CreateOutcome, Executor, Record, TableDescription, UpdateOutcome};
use crate::config::EngineConfig;
use crate::error::SchemaGenError;
use crate::schema::FieldMap;

#[derive(Debug)]
pub enum EngineActorMessage {
    /// Insert a record into a resource, evolving its schema first.
    Create(
        String,
        FieldMap,
        RpcReplyPort<Result<CreateOutcome, SchemaGenError>>,
    ),

    /// Records of a resource matching all filters.
    Read(
        String,
        FieldMap,
        RpcReplyPort<Result<Vec<Record>, SchemaGenError>>,
    ),

    /// Update the given fields of one record.
    Update(
        String,
        i64,
        FieldMap,
        RpcReplyPort<Result<UpdateOutcome, SchemaGenError>>,
    ),

    /// Delete one record by id.
    Delete(String, i64, RpcReplyPort<Result<i64, SchemaGenError>>),

    /// Catalog dump of every user table.
    Describe(RpcReplyPort<Result<Vec<TableDescription>, SchemaGenError>>),
}

/// Cloneable front door to the engine actor.
#[derive(Clone)]
pub struct EngineHandle {
    actor: ActorRef<EngineActorMessage>,
}

impl EngineHandle {
    pub async fn create(
        &self,
        resource: impl Into<String>,
        fields: FieldMap,
    ) -> Result<CreateOutcome, SchemaGenError> {
        ractor::call!(
            self.actor,
            EngineActorMessage::Create,
            resource.into(),
            fields
        )
        .map_err(|e| SchemaGenError::RactorError(format!("EngineActor Create RPC failed: {e}")))?
    }

    pub async fn read(
        &self,
        resource: impl Into<String>,
        filters: FieldMap,
    ) -> Result<Vec<Record>, SchemaGenError> {
        ractor::call!(
            self.actor,
            EngineActorMessage::Read,
            resource.into(),
            filters
        )
        .map_err(|e| SchemaGenError::RactorError(format!("EngineActor Read RPC failed: {e}")))?
    }

    pub async fn update(
        &self,
        resource: impl Into<String>,
        id: i64,
        fields: FieldMap,
    ) -> Result<UpdateOutcome, SchemaGenError> {
        ractor::call!(
            self.actor,
            EngineActorMessage::Update,
            resource.into(),
            id,
            fields
        )
        .map_err(|e| SchemaGenError::RactorError(format!("EngineActor Update RPC failed: {e}")))?
    }

    pub async fn delete(&self, resource: impl Into<String>, id: i64) -> Result<i64, SchemaGenError> {
        ractor::call!(self.actor, EngineActorMessage::Delete, resource.into(), id)
            .map_err(|e| SchemaGenError::RactorError(format!("EngineActor Delete RPC failed: {e}")))?
    }

    pub async fn describe(&self) -> Result<Vec<TableDescription>, SchemaGenError> {
        ractor::call!(self.actor, EngineActorMessage::Describe).map_err(|e| {
            SchemaGenError::RactorError(format!("EngineActor Describe RPC failed: {e}"))
        })?
    }
}

struct EngineActor;

#[ractor::async_trait]
impl Actor for EngineActor {
    type Msg = EngineActorMessage;
    type State = Executor;
    type Arguments = Executor;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        executor: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        info!("EngineActor initialized");
        Ok(executor)
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            EngineActorMessage::Create(resource, fields, reply) => {
                let res = state.create(&resource, &fields).await;
                let _ = reply.send(res);
            }
            EngineActorMessage::Read(resource, filters, reply) => {
                let res = state.read(&resource, &filters).await;
                let _ = reply.send(res);
            }
            EngineActorMessage::Update(resource, id, fields, reply) => {
                let res = state.update(&resource, id, &fields).await;
                let _ = reply.send(res);
            }
            EngineActorMessage::Delete(resource, id, reply) => {
                let res = state.delete(&resource, id).await;
                let _ = reply.send(res);
            }
            EngineActorMessage::Describe(reply) => {
                let res = state.describe().await;
                let _ = reply.send(res);
            }
        }
        Ok(())
    }
}

/// Connect to `database_url` and spawn the engine actor, returning a cloneable handle.
///
/// The actor is unnamed so several engines may share one process.
pub async fn spawn(database_url: &str, cfg: &EngineConfig) -> Result<EngineHandle, SchemaGenError> {
    let executor = Executor::connect(database_url, cfg).await?;

    let (actor, _jh) = Actor::spawn(None, EngineActor, executor)
        .await
        .map_err(|e| SchemaGenError::RactorError(format!("failed to spawn EngineActor: {e}")))?;

    Ok(EngineHandle { actor })
}
