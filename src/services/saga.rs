use tracing::{error, warn};

use crate::error::AiRegistryError;
use crate::interfaces::collaborators::EmbeddingIndex;
use crate::store::AiStore;

/// Undo action for a side effect that can be reverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    RemoveEntity,
    RemoveEmbeddings(Vec<String>),
}

impl Compensation {
    fn describe(&self, ai_id: &str) -> String {
        match self {
            Self::RemoveEntity => format!("ai row {ai_id}"),
            Self::RemoveEmbeddings(handles) => format!("embedding handles {}", handles.join(",")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Creation,
    Update,
}

/// Ledger of the side effects performed by a multi-step write.
///
/// Reversible effects carry a [`Compensation`]; irreversible ones are only
/// described so that a failed run can report what remains.
#[derive(Debug)]
pub struct Saga {
    operation: Operation,
    ai_id: String,
    compensations: Vec<Compensation>,
    irreversible: Vec<String>,
}

impl Saga {
    /// Ledger for creating `ai_id`; a partial failure is [`AiRegistryError::PartialCreation`].
    pub fn new(ai_id: &str) -> Self {
        Self::with_operation(Operation::Creation, ai_id)
    }

    /// Ledger for a write to an existing AI; a partial failure is [`AiRegistryError::PartialUpdate`].
    pub fn for_update(ai_id: &str) -> Self {
        Self::with_operation(Operation::Update, ai_id)
    }

    fn with_operation(operation: Operation, ai_id: &str) -> Self {
        Self {
            operation,
            ai_id: ai_id.to_string(),
            compensations: Vec::new(),
            irreversible: Vec::new(),
        }
    }

    pub fn compensate_with(&mut self, compensation: Compensation) {
        self.compensations.push(compensation);
    }

    pub fn irreversible(&mut self, effect: impl Into<String>) {
        self.irreversible.push(effect.into());
    }

    /// Reverts what can be reverted, newest first, and classifies the failure.
    ///
    /// Returns `cause` unchanged when nothing is left behind, otherwise a
    /// partial-write error naming every lingering effect.
    pub async fn abort(
        self,
        store: &AiStore,
        embeddings: &dyn EmbeddingIndex,
        cause: AiRegistryError,
    ) -> AiRegistryError {
        let Saga {
            operation,
            ai_id,
            compensations,
            irreversible,
        } = self;
        let mut lingering = irreversible;

        for compensation in compensations.into_iter().rev() {
            warn!(ai_id = %ai_id, ?compensation, "compensating after failed write");
            let outcome = match &compensation {
                Compensation::RemoveEntity => store.delete_ai_cascade(&ai_id).await.map(|_| ()),
                Compensation::RemoveEmbeddings(handles) => {
                    embeddings.delete_texts(handles.clone()).await
                }
            };
            if let Err(err) = outcome {
                error!(ai_id = %ai_id, ?compensation, error = %err, "compensation failed");
                lingering.push(compensation.describe(&ai_id));
            }
        }

        if lingering.is_empty() {
            return cause;
        }
        let cause = cause.to_string();
        match operation {
            Operation::Creation => AiRegistryError::PartialCreation {
                ai_id,
                lingering,
                cause,
            },
            Operation::Update => AiRegistryError::PartialUpdate {
                ai_id,
                lingering,
                cause,
            },
        }
    }
}
