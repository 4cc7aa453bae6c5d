use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sync::{
    CollectionPath, DocumentPath, StoreFailure, SubscriptionChange, SubscriptionId,
};

/// Requests to the hosted document database.
///
/// `Subscribe` asks the shell to start a change stream for a collection.
/// Snapshots and stream failures come back as app events tagged with the
/// subscription id, so retired streams can be recognised and ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DocumentOperation {
    Subscribe {
        subscription: SubscriptionId,
        collection: CollectionPath,
    },
    Unsubscribe {
        subscription: SubscriptionId,
    },
    Create {
        collection: CollectionPath,
        fields: Value,
    },
    Delete {
        document: DocumentPath,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentOutput {
    Created { id: String },
    Deleted,
    Failed(StoreFailure),
}

impl Operation for DocumentOperation {
    type Output = DocumentOutput;
}

pub struct Documents<Ev> {
    context: CapabilityContext<DocumentOperation, Ev>,
}

impl<Ev> Capability<Ev> for Documents<Ev> {
    type Operation = DocumentOperation;
    type MappedSelf<MappedEv> = Documents<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Documents::new(self.context.map_event(f))
    }
}

impl<Ev> Documents<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<DocumentOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn subscribe(&self, subscription: SubscriptionId, collection: CollectionPath) {
        self.notify(DocumentOperation::Subscribe {
            subscription,
            collection,
        });
    }

    pub fn unsubscribe(&self, subscription: SubscriptionId) {
        self.notify(DocumentOperation::Unsubscribe { subscription });
    }

    /// Tells the shell about a subscription change produced by the store.
    pub fn apply(&self, change: SubscriptionChange) {
        if let Some(retired) = change.retired {
            self.unsubscribe(retired);
        }
        if let Some((subscription, collection)) = change.opened {
            self.subscribe(subscription, collection);
        }
    }

    /// Creates a document with a server-generated id.
    pub fn create<F>(&self, collection: CollectionPath, fields: Value, make_event: F)
    where
        F: FnOnce(Result<String, StoreFailure>) -> Ev + Send + 'static,
    {
        self.request(DocumentOperation::Create { collection, fields }, move |output| {
            make_event(match output {
                DocumentOutput::Created { id } => Ok(id),
                DocumentOutput::Failed(failure) => Err(failure),
                DocumentOutput::Deleted => Err(unexpected("Deleted")),
            })
        });
    }

    pub fn delete<F>(&self, document: DocumentPath, make_event: F)
    where
        F: FnOnce(Result<(), StoreFailure>) -> Ev + Send + 'static,
    {
        self.request(DocumentOperation::Delete { document }, move |output| {
            make_event(match output {
                DocumentOutput::Deleted => Ok(()),
                DocumentOutput::Failed(failure) => Err(failure),
                DocumentOutput::Created { .. } => Err(unexpected("Created")),
            })
        });
    }

    fn notify(&self, operation: DocumentOperation) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(operation).await;
        });
    }

    fn request<F>(&self, operation: DocumentOperation, make_event: F)
    where
        F: FnOnce(DocumentOutput) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let output = ctx.request_from_shell(operation).await;
            ctx.update_app(make_event(output));
        });
    }
}

fn unexpected(variant: &str) -> StoreFailure {
    StoreFailure {
        code: "unexpected-output".into(),
        message: format!("shell answered with {variant}"),
    }
}
