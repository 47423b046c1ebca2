use std::{collections::HashMap, sync::RwLock};

use tokio::sync::{mpsc::UnboundedSender, oneshot};

use crate::{Error, Message, Result};

/// Decision taken by the application on a [`DidCommAction`].
#[derive(Debug)]
pub enum ActionResponse<O> {
    Continue(O),
    Stop(Option<Error>),
}

/// Request for a user decision.
///
/// The protocol instance stays suspended until [`DidCommAction::continue_with`]
/// or [`DidCommAction::stop`] is called. Dropping the action leaves it
/// suspended; it can still be resumed through the service by its PIID.
#[derive(Debug)]
pub struct DidCommAction<O> {
    pub protocol_name: String,
    pub message: Message,
    pub properties: HashMap<String, String>,
    responder: oneshot::Sender<ActionResponse<O>>,
}

impl<O> DidCommAction<O> {
    pub fn new(
        protocol_name: &str,
        message: Message,
        properties: HashMap<String, String>,
    ) -> (Self, oneshot::Receiver<ActionResponse<O>>) {
        let (responder, response) = oneshot::channel();
        (
            Self {
                protocol_name: protocol_name.into(),
                message,
                properties,
                responder,
            },
            response,
        )
    }

    pub fn continue_with(self, options: O) {
        // the service may have shut down, nothing left to resume then
        let _ = self.responder.send(ActionResponse::Continue(options));
    }

    pub fn stop(self, err: Option<Error>) {
        let _ = self.responder.send(ActionResponse::Stop(err));
    }
}

/// Single subscriber slot for action events.
pub struct ActionEvents<T> {
    sender: RwLock<Option<UnboundedSender<T>>>,
}

impl<T> Default for ActionEvents<T> {
    fn default() -> Self {
        Self {
            sender: RwLock::new(None),
        }
    }
}

impl<T> ActionEvents<T> {
    pub fn register(&self, ch: UnboundedSender<T>) -> Result<()> {
        let mut sender = self.sender.write().map_err(|e| Error::Generic(e.to_string()))?;
        if sender.as_ref().map_or(false, |s| !s.is_closed()) {
            return Err(Error::Generic(
                "channel is already registered for the action event".into(),
            ));
        }
        *sender = Some(ch);
        Ok(())
    }

    pub fn unregister(&self, ch: &UnboundedSender<T>) -> Result<()> {
        let mut sender = self.sender.write().map_err(|e| Error::Generic(e.to_string()))?;
        match sender.as_ref() {
            Some(current) if current.same_channel(ch) => {
                *sender = None;
                Ok(())
            }
            _ => Err(Error::Generic(
                "invalid channel passed to unregister the action event".into(),
            )),
        }
    }

    /// Current live subscriber, if any.
    pub fn sender(&self) -> Option<UnboundedSender<T>> {
        self.sender
            .read()
            .ok()
            .and_then(|s| s.as_ref().filter(|s| !s.is_closed()).cloned())
    }
}
