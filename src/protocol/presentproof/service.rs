use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{mpsc::UnboundedSender, oneshot};

use super::{
    models::*,
    states::{can_trigger_action_events, next_state, State},
};
use crate::{
    messages::CODE_INTERNAL_ERROR,
    service::{
        ActionEvents, ActionResponse, DidCommAction, Handler, MessageEvents, Messenger, StateMsg,
        StateMsgType,
    },
    storage::{prefix_end, StorageProvider, Store},
    util::Logger,
    verifiable::{PresentationParser, VerifiableStore},
    Error, Message, Result, ResultExt,
};

/// Protocol name, also the store namespace.
pub const NAME: &str = "present-proof";

const STATE_NAME_KEY: &str = "present-proof-state-";
const TRANSITIONAL_PAYLOAD_KEY: &str = "present-proof-transitional-";

const PIID_PROPERTY: &str = "piid";

/// Protocol instance suspended until the user continues or stops it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TransitionalPayload {
    pub piid: String,
    #[serde(rename = "stateName")]
    pub state_name: String,
    pub msg: Message,
    #[serde(rename = "myDID")]
    pub my_did: String,
    #[serde(rename = "theirDID")]
    pub their_did: String,
}

/// Everything a state needs to execute.
pub(crate) struct MetaData {
    pub(crate) piid: String,
    pub(crate) state: State,
    pub(crate) msg: Message,
    pub(crate) my_did: String,
    pub(crate) their_did: String,
    pub(crate) outbound: bool,
    pub(crate) options: ContinueOptions,
    /// Why the instance is being abandoned.
    pub(crate) err: Option<Error>,
    pub(crate) verifiable: Arc<dyn VerifiableStore>,
    pub(crate) parser: Arc<dyn PresentationParser>,
}

/// Collaborators of the present-proof [`Service`].
pub struct Provider {
    pub messenger: Arc<dyn Messenger>,
    pub storage: Arc<dyn StorageProvider>,
    pub verifiable: Arc<dyn VerifiableStore>,
    pub parser: Arc<dyn PresentationParser>,
}

/// Action event raised by the present-proof service.
pub type Action = DidCommAction<ContinueOptions>;

/// Present-proof protocol service.
///
/// Requests, proposals and presentations suspend the instance until the
/// registered action subscriber continues or stops it; every other message
/// is processed in the background.
#[derive(Clone)]
pub struct Service {
    inner: Arc<Inner>,
}

struct Inner {
    messenger: Arc<dyn Messenger>,
    store: Arc<dyn Store>,
    verifiable: Arc<dyn VerifiableStore>,
    parser: Arc<dyn PresentationParser>,
    actions: ActionEvents<Action>,
    msg_events: MessageEvents,
    log: Logger,
}

impl Service {
    pub fn new(provider: Provider) -> Result<Self> {
        let store = provider
            .storage
            .open_store(NAME)
            .context("failed to open present-proof store")?;
        Ok(Self {
            inner: Arc::new(Inner {
                messenger: provider.messenger,
                store,
                verifiable: provider.verifiable,
                parser: provider.parser,
                actions: ActionEvents::default(),
                msg_events: MessageEvents::default(),
                log: Logger::new("didcomm/presentproof/service"),
            }),
        })
    }

    pub fn register_action_event(&self, ch: UnboundedSender<Action>) -> Result<()> {
        self.inner.actions.register(ch)
    }

    pub fn unregister_action_event(&self, ch: &UnboundedSender<Action>) -> Result<()> {
        self.inner.actions.unregister(ch)
    }

    pub fn register_msg_event(&self, ch: UnboundedSender<StateMsg>) -> Result<()> {
        self.inner.msg_events.register(ch)
    }

    pub fn unregister_msg_event(&self, ch: &UnboundedSender<StateMsg>) -> Result<()> {
        self.inner.msg_events.unregister(ch)
    }

    /// Instances waiting for a user decision.
    pub fn actions(&self) -> Result<Vec<TransitionalPayload>> {
        self.inner
            .store
            .iterate(TRANSITIONAL_PAYLOAD_KEY, &prefix_end(TRANSITIONAL_PAYLOAD_KEY))?
            .map(|(_, value)| -> Result<TransitionalPayload> { Ok(serde_json::from_slice(&value)?) })
            .collect()
    }

    /// Resumes the suspended instance `piid` with the user's input. The
    /// instance then proceeds in the background.
    pub async fn action_continue(&self, piid: &str, options: ContinueOptions) -> Result<()> {
        let mut md = self.take_transitional_payload(piid)?;
        md.options = options;
        tokio::spawn(self.clone().process_callback(md));
        Ok(())
    }

    /// Abandons the suspended instance `piid`, reporting the rejection to
    /// the other party.
    pub async fn action_stop(&self, piid: &str, err: Option<Error>) -> Result<()> {
        let mut md = self.take_transitional_payload(piid)?;
        let reason = err.map(|e| e.to_string()).unwrap_or_else(|| "stopped".into());
        md.err = Some(Error::Rejected(reason));
        md.state = State::Abandoning {
            code: Some(CODE_INTERNAL_ERROR.into()),
        };
        tokio::spawn(self.clone().process_callback(md));
        Ok(())
    }

    /// Current state of `piid`, [`State::Start`] if the instance is unknown.
    pub fn current_state(&self, piid: &str) -> Result<State> {
        match self.inner.store.get(&state_key(piid)) {
            Ok(name) => Ok(State::from_name(&String::from_utf8(name)?)),
            Err(e) if e.is_not_found() => Ok(State::Start),
            Err(e) => Err(e),
        }
    }

    fn do_handle(&self, msg: Message, outbound: bool, my_did: &str, their_did: &str) -> Result<MetaData> {
        let piid = piid_of(&msg);
        match self.inner.store.get(&transitional_key(&piid)) {
            Ok(_) => return Err(Error::ActionPending(piid)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.context("get transitional payload")),
        }

        let current = self.current_state(&piid).context("current state name")?;
        let next = next_state(&msg, outbound).context("next state")?;
        if !current.can_transition_to(&next) {
            return Err(Error::InvalidStateTransition {
                from: current.name().into(),
                to: next.name().into(),
            });
        }

        Ok(MetaData {
            piid,
            state: next,
            msg,
            my_did: my_did.into(),
            their_did: their_did.into(),
            outbound,
            options: ContinueOptions::default(),
            err: None,
            verifiable: self.inner.verifiable.clone(),
            parser: self.inner.parser.clone(),
        })
    }

    /// Executes states from `md.state` on until one yields [`State::NoOp`].
    async fn handle(&self, md: &mut MetaData) -> Result<()> {
        let mut current = md.state.clone();
        while !current.is_no_op() {
            md.state = current.clone();
            self.notify(md, StateMsgType::PreState);
            self.save_state_name(&md.piid, &current)
                .context("failed to persist state")?;

            let (next, action) = current
                .execute(md)
                .context(format!("execute {}", current))?;
            if !next.is_no_op() && !current.can_transition_to(&next) {
                return Err(Error::InvalidStateTransition {
                    from: current.name().into(),
                    to: next.name().into(),
                });
            }

            action
                .run(self.inner.messenger.as_ref())
                .await
                .context(format!("action {}", current))?;
            self.notify(md, StateMsgType::PostState);
            current = next;
        }
        Ok(())
    }

    /// Background execution; a failing instance is abandoned.
    async fn process_callback(self, mut md: MetaData) {
        let err = match self.handle(&mut md).await {
            Ok(()) => return,
            Err(err) => err,
        };
        error!(target: self.inner.log.target(), "failed to handle {}: {}", md.piid, err);
        if matches!(md.state, State::Abandoning { .. } | State::Done) {
            return;
        }

        md.state = State::Abandoning {
            code: Some(CODE_INTERNAL_ERROR.into()),
        };
        md.err = Some(err);
        if let Err(err) = self.handle(&mut md).await {
            error!(target: self.inner.log.target(), "failed to abandon {}: {}", md.piid, err);
        }
    }

    async fn await_decision(self, piid: String, response: oneshot::Receiver<ActionResponse<ContinueOptions>>) {
        let resumed = match response.await {
            Ok(ActionResponse::Continue(options)) => self.action_continue(&piid, options).await,
            Ok(ActionResponse::Stop(err)) => self.action_stop(&piid, err).await,
            Err(_) => {
                debug!(target: self.inner.log.target(), "action of {} was dropped, it stays pending", piid);
                return;
            }
        };
        if let Err(err) = resumed {
            error!(target: self.inner.log.target(), "failed to resume {}: {}", piid, err);
        }
    }

    fn notify(&self, md: &MetaData, kind: StateMsgType) {
        self.inner.msg_events.notify(StateMsg {
            protocol_name: NAME.into(),
            kind,
            msg: md.msg.clone(),
            state_id: md.state.name().into(),
            properties: properties(&md.piid),
        });
    }

    fn save_state_name(&self, piid: &str, state: &State) -> Result<()> {
        self.inner
            .store
            .put(&state_key(piid), state.name().as_bytes())
    }

    fn save_transitional_payload(&self, payload: &TransitionalPayload) -> Result<()> {
        self.inner
            .store
            .put(&transitional_key(&payload.piid), &serde_json::to_vec(payload)?)
    }

    /// Loads and removes the payload of `piid`.
    fn take_transitional_payload(&self, piid: &str) -> Result<MetaData> {
        let bytes = self
            .inner
            .store
            .get(&transitional_key(piid))
            .context("get transitional payload")?;
        let payload: TransitionalPayload = serde_json::from_slice(&bytes)?;
        self.inner
            .store
            .delete(&transitional_key(piid))
            .context("delete transitional payload")?;

        Ok(MetaData {
            piid: payload.piid,
            state: State::from_name(&payload.state_name),
            msg: payload.msg,
            my_did: payload.my_did,
            their_did: payload.their_did,
            outbound: false,
            options: ContinueOptions::default(),
            err: None,
            verifiable: self.inner.verifiable.clone(),
            parser: self.inner.parser.clone(),
        })
    }
}

#[async_trait]
impl Handler for Service {
    fn name(&self) -> &str {
        NAME
    }

    fn accept(&self, msg_type: &str) -> bool {
        matches!(
            msg_type,
            PROPOSE_PRESENTATION_MSG_TYPE
                | REQUEST_PRESENTATION_MSG_TYPE
                | PRESENTATION_MSG_TYPE
                | ACK_MSG_TYPE
                | PROBLEM_REPORT_MSG_TYPE
        )
    }

    async fn handle_inbound(&self, msg: Message, my_did: &str, their_did: &str) -> Result<String> {
        let md = self.do_handle(msg, false, my_did, their_did)?;
        let piid = md.piid.clone();

        if !can_trigger_action_events(&md.msg) {
            tokio::spawn(self.clone().process_callback(md));
            return Ok(piid);
        }

        let sender = self.inner.actions.sender().ok_or(Error::NoClients)?;
        self.save_transitional_payload(&TransitionalPayload {
            piid: piid.clone(),
            state_name: md.state.name().into(),
            msg: md.msg.clone(),
            my_did: md.my_did.clone(),
            their_did: md.their_did.clone(),
        })
        .context("save transitional payload")?;

        let (action, response) = Action::new(NAME, md.msg, properties(&piid));
        if sender.send(action).is_err() {
            // subscriber went away in between
            self.inner
                .store
                .delete(&transitional_key(&piid))
                .context("delete transitional payload")?;
            return Err(Error::NoClients);
        }
        debug!(target: self.inner.log.target(), "{} is waiting for an action", piid);

        tokio::spawn(self.clone().await_decision(piid.clone(), response));
        Ok(piid)
    }

    async fn handle_outbound(&self, mut msg: Message, my_did: &str, their_did: &str) -> Result<()> {
        if msg.id().is_empty() {
            msg.set_id(&uuid::Uuid::new_v4().to_string());
        }
        let mut md = self.do_handle(msg, true, my_did, their_did)?;
        self.handle(&mut md).await
    }
}

fn state_key(piid: &str) -> String {
    format!("{}{}", STATE_NAME_KEY, piid)
}

fn transitional_key(piid: &str) -> String {
    format!("{}{}", TRANSITIONAL_PAYLOAD_KEY, piid)
}

fn properties(piid: &str) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    properties.insert(PIID_PROPERTY.to_string(), piid.to_string());
    properties
}

/// Instance ID: the parent thread if any, the thread otherwise.
fn piid_of(msg: &Message) -> String {
    let pthid = msg.parent_thread_id();
    if !pthid.is_empty() {
        return pthid;
    }
    msg.thread_id()
        .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use tokio::sync::mpsc::unbounded_channel;

    use super::*;
    use crate::{
        messages::Thread,
        storage::MemStoreProvider,
        verifiable::{JsonPresentationParser, PresentationStore},
    };

    #[derive(Default)]
    struct NullMessenger {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Messenger for NullMessenger {
        async fn send(&self, _: Message, _: &str, _: &str) -> Result<()> {
            *self.calls.lock().map_err(|e| Error::Generic(e.to_string()))? += 1;
            Ok(())
        }

        async fn reply_to(&self, _: &str, _: Message) -> Result<()> {
            *self.calls.lock().map_err(|e| Error::Generic(e.to_string()))? += 1;
            Ok(())
        }

        async fn reply_to_nested(&self, _: &str, _: Message, _: &str, _: &str) -> Result<()> {
            *self.calls.lock().map_err(|e| Error::Generic(e.to_string()))? += 1;
            Ok(())
        }
    }

    fn service() -> Result<(Service, Arc<NullMessenger>)> {
        let storage = Arc::new(MemStoreProvider::new());
        let messenger = Arc::new(NullMessenger::default());
        let service = Service::new(Provider {
            messenger: messenger.clone(),
            storage: storage.clone(),
            verifiable: Arc::new(PresentationStore::new(storage.as_ref())?),
            parser: Arc::new(JsonPresentationParser),
        })?;
        Ok((service, messenger))
    }

    #[test]
    fn piid_prefers_the_parent_thread() -> Result<()> {
        let mut msg = Message::new(ACK_MSG_TYPE);
        assert_eq!(piid_of(&msg), msg.id());

        msg.set_thread(Thread::implicit_reply("thread"))?;
        assert_eq!(piid_of(&msg), "thread");

        msg.set_thread(Thread {
            thid: "thread".into(),
            pthid: "parent".into(),
            ..Default::default()
        })?;
        assert_eq!(piid_of(&msg), "parent");
        Ok(())
    }

    #[test]
    fn accepts_its_own_message_types() -> Result<()> {
        let (service, _) = service()?;
        assert_eq!(service.name(), NAME);
        assert!(service.accept(REQUEST_PRESENTATION_MSG_TYPE));
        assert!(service.accept(ACK_MSG_TYPE));
        assert!(!service.accept("https://didcomm.org/routing/1.0/forward"));
        Ok(())
    }

    #[tokio::test]
    async fn request_without_clients_is_refused() -> Result<()> {
        let (service, _) = service()?;
        let request = Message::new(REQUEST_PRESENTATION_MSG_TYPE);

        let err = service
            .handle_inbound(request.clone(), "did:example:me", "did:example:them")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoClients));
        assert!(service.actions()?.is_empty());
        assert_eq!(service.current_state(request.id())?, State::Start);
        Ok(())
    }

    #[tokio::test]
    async fn illegal_transition_leaves_the_state_alone() -> Result<()> {
        let (service, messenger) = service()?;

        let err = service
            .handle_inbound(Message::new(ACK_MSG_TYPE), "did:example:me", "did:example:them")
            .await
            .unwrap_err();

        assert!(matches!(
            err.root(),
            Error::InvalidStateTransition { from, to } if from == "start" && to == "done"
        ));
        assert_eq!(*messenger.calls.lock().map_err(|e| Error::Generic(e.to_string()))?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn second_message_waits_for_the_pending_action() -> Result<()> {
        // Arrange
        let (service, _) = service()?;
        let (tx, mut actions) = unbounded_channel();
        service.register_action_event(tx)?;
        let request = Message::new(REQUEST_PRESENTATION_MSG_TYPE);
        let piid = service
            .handle_inbound(request.clone(), "did:example:me", "did:example:them")
            .await?;
        // Act
        let err = service
            .handle_inbound(request, "did:example:me", "did:example:them")
            .await
            .unwrap_err();
        // Assert
        assert!(matches!(err, Error::ActionPending(ref p) if p == &piid));
        let action = tokio::time::timeout(Duration::from_secs(5), actions.recv())
            .await
            .map_err(|_| Error::Timeout("action".into()))?
            .ok_or(Error::NoClients)?;
        assert_eq!(action.properties.get(PIID_PROPERTY), Some(&piid));
        Ok(())
    }

    #[tokio::test]
    async fn dropped_action_stays_pending() -> Result<()> {
        let (service, _) = service()?;
        let (tx, mut actions) = unbounded_channel();
        service.register_action_event(tx)?;

        let piid = service
            .handle_inbound(
                Message::new(PROPOSE_PRESENTATION_MSG_TYPE),
                "did:example:me",
                "did:example:them",
            )
            .await?;
        drop(actions.recv().await);

        let pending = service.actions()?;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].piid, piid);
        assert_eq!(pending[0].state_name, "proposal-received");
        assert_eq!(pending[0].my_did, "did:example:me");

        assert!(service
            .action_continue("unknown", ContinueOptions::default())
            .await
            .unwrap_err()
            .is_not_found());
        service.action_continue(&piid, ContinueOptions::default()).await?;
        assert!(service.actions()?.is_empty());
        Ok(())
    }
}
