use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::{mpsc::UnboundedSender, oneshot};

use super::models::*;
use crate::{
    connection::{ConnectionLookup, ConnectionRecord},
    dispatcher::Outbound,
    kms::KeyManager,
    messages::{Forward, FORWARD_MSG_TYPE},
    service::{ActionEvents, ActionResponse, DidCommAction, Handler, PendingReplies},
    storage::{StorageProvider, Store},
    util::Logger,
    vdri::{get_destination, Registry},
    Error, Message, Result, ResultExt,
};

const ROUTE_CONN_ID_DATA_KEY: &str = "route-connID";
const ROUTE_CONFIG_DATA_KEY: &str = "route-config";

/// Default wait for a router's answer.
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Action event raised by the route coordination service.
pub type Action = DidCommAction<Options>;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Endpoint granted to agents when acting as a router.
    pub router_endpoint: String,
    /// How long [`Service::register`] and [`Service::add_key`] wait.
    pub client_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            router_endpoint: String::new(),
            client_timeout: DEFAULT_CLIENT_TIMEOUT,
        }
    }
}

/// Collaborators of the route coordination [`Service`].
pub struct Provider {
    pub outbound: Arc<dyn Outbound>,
    pub storage: Arc<dyn StorageProvider>,
    pub kms: Arc<dyn KeyManager>,
    pub registry: Arc<dyn Registry>,
    pub config: ServiceConfig,
}

/// Route coordination (Aries RFC 0211).
///
/// As a client it registers with one router and adds recipient keys to it;
/// both calls wait for the router's answer. As a router it grants routes,
/// keeps the key list and forwards messages for registered keys.
#[derive(Clone)]
pub struct Service {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn Store>,
    connections: ConnectionLookup,
    outbound: Arc<dyn Outbound>,
    kms: Arc<dyn KeyManager>,
    registry: Arc<dyn Registry>,
    config: ServiceConfig,
    grants: PendingReplies<Grant>,
    keylist_updates: PendingReplies<KeylistUpdateResponse>,
    actions: ActionEvents<Action>,
    log: Logger,
}

impl Service {
    pub fn new(provider: Provider) -> Result<Self> {
        let store = provider
            .storage
            .open_store(COORDINATION)
            .context("open route coordination store")?;
        let connections = ConnectionLookup::new(provider.storage.as_ref())?;

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                connections,
                outbound: provider.outbound,
                kms: provider.kms,
                registry: provider.registry,
                config: provider.config,
                grants: PendingReplies::default(),
                keylist_updates: PendingReplies::default(),
                actions: ActionEvents::default(),
                log: Logger::new("didcomm/route/service"),
            }),
        })
    }

    pub fn register_action_event(&self, ch: UnboundedSender<Action>) -> Result<()> {
        self.inner.actions.register(ch)
    }

    pub fn unregister_action_event(&self, ch: &UnboundedSender<Action>) -> Result<()> {
        self.inner.actions.unregister(ch)
    }

    /// Registers with the router at the other end of `connection_id` and
    /// waits for its grant.
    ///
    /// Only one router can be registered at a time. Dropping the returned
    /// future stops waiting and forgets the request.
    pub async fn register(&self, connection_id: &str) -> Result<()> {
        if self.router_connection_id()?.is_some() {
            return Err(Error::RouterAlreadyRegistered);
        }
        let conn = self.connection(connection_id)?;

        let request = Request {
            msg_type: REQUEST_MSG_TYPE.into(),
            id: uuid::Uuid::new_v4().to_string(),
        };
        let (grant, _pending) = self.inner.grants.register(&request.id)?;
        self.inner
            .outbound
            .send_to_did(&Message::encode(&request)?, &conn.my_did, &conn.their_did)
            .await
            .context("send route request")?;

        let grant = self.wait(grant, "grant from the router").await?;
        self.save_router_config(&Config::new(&grant.endpoint, grant.routing_keys))
            .context("save route config")?;
        self.inner
            .store
            .put(ROUTE_CONN_ID_DATA_KEY, connection_id.as_bytes())
    }

    /// Forgets the registered router.
    pub fn unregister(&self) -> Result<()> {
        self.get_connection()?;
        // TODO: ask the router to drop our keys with a keylist update
        self.inner.store.delete(ROUTE_CONN_ID_DATA_KEY)?;
        self.inner.store.delete(ROUTE_CONFIG_DATA_KEY)
    }

    /// Connection ID of the registered router.
    pub fn get_connection(&self) -> Result<String> {
        self.router_connection_id()?
            .ok_or(Error::RouterNotRegistered)
    }

    /// Adds `recipient_key` to the key list of the registered router and
    /// waits for its confirmation.
    pub async fn add_key(&self, recipient_key: &str) -> Result<()> {
        let conn = self.connection(&self.get_connection()?)?;

        let update = KeylistUpdate {
            msg_type: KEYLIST_UPDATE_MSG_TYPE.into(),
            id: uuid::Uuid::new_v4().to_string(),
            updates: vec![Update {
                recipient_key: recipient_key.into(),
                action: UpdateAction::Add,
            }],
        };
        let (response, _pending) = self.inner.keylist_updates.register(&update.id)?;
        self.inner
            .outbound
            .send_to_did(&Message::encode(&update)?, &conn.my_did, &conn.their_did)
            .await
            .context("send keylist update")?;

        let response = self.wait(response, "keylist update response from the router").await?;
        let failed = response.updated.iter().any(|u| {
            u.recipient_key == recipient_key
                && u.action == UpdateAction::Add
                && u.result != UpdateResult::Success
        });
        if failed {
            return Err(Error::Generic(
                "failed to update the recipient key with the router".into(),
            ));
        }
        Ok(())
    }

    /// Endpoint and routing keys of the registered router.
    pub fn config(&self) -> Result<Config> {
        self.get_connection()?;
        let bytes = self
            .inner
            .store
            .get(ROUTE_CONFIG_DATA_KEY)
            .context("get router config data")?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn wait<T>(&self, reply: oneshot::Receiver<T>, what: &str) -> Result<T> {
        match tokio::time::timeout(self.inner.config.client_timeout, reply).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(Error::Generic(format!("stopped waiting for {}", what))),
            Err(_) => Err(Error::Timeout(what.into())),
        }
    }

    fn router_connection_id(&self) -> Result<Option<String>> {
        match self.inner.store.get(ROUTE_CONN_ID_DATA_KEY) {
            Ok(id) if id.is_empty() => Ok(None),
            Ok(id) => Ok(Some(String::from_utf8(id)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.context("fetch router connection id")),
        }
    }

    fn connection(&self, connection_id: &str) -> Result<ConnectionRecord> {
        match self.inner.connections.get_connection_record(connection_id) {
            Ok(conn) => Ok(conn),
            Err(e) if e.is_not_found() => Err(Error::ConnectionNotFound),
            Err(e) => Err(e.context("fetch connection record from store")),
        }
    }

    fn save_router_config(&self, config: &Config) -> Result<()> {
        self.inner
            .store
            .put(ROUTE_CONFIG_DATA_KEY, &serde_json::to_vec(config)?)
    }

    async fn await_request_decision(
        self,
        msg: Message,
        my_did: String,
        their_did: String,
        response: oneshot::Receiver<ActionResponse<Options>>,
    ) {
        match response.await {
            Ok(ActionResponse::Continue(options)) => {
                if let Err(err) = self.grant(&msg, options, &my_did, &their_did).await {
                    error!(target: self.inner.log.target(), "failed to handle inbound request {}: {}", msg.id(), err);
                }
            }
            Ok(ActionResponse::Stop(err)) => {
                info!(target: self.inner.log.target(), "user aborted route request {}: {:?}", msg.id(), err);
            }
            Err(_) => {
                debug!(target: self.inner.log.target(), "route request {} was dropped", msg.id());
            }
        }
    }

    /// Answers a route request.
    async fn grant(&self, msg: &Message, options: Options, my_did: &str, their_did: &str) -> Result<()> {
        let request: Request = msg.decode().context("route request message unmarshal")?;

        let endpoint = match options.service_endpoint.as_str() {
            "" => self.inner.config.router_endpoint.clone(),
            endpoint => endpoint.to_string(),
        };
        let routing_keys = if options.routing_keys.is_empty() {
            vec![self.inner.kms.create_key_set().context("failed to create keys")?]
        } else {
            options.routing_keys
        };
        let grant = Grant {
            msg_type: GRANT_MSG_TYPE.into(),
            id: request.id,
            endpoint,
            routing_keys,
        };

        self.inner
            .outbound
            .send_to_did(&Message::encode(&grant)?, my_did, their_did)
            .await
    }

    async fn process_message(&self, msg: &Message, my_did: &str, their_did: &str) -> Result<()> {
        match msg.msg_type() {
            GRANT_MSG_TYPE => {
                let grant: Grant = msg.decode().context("route grant message unmarshal")?;
                let id = grant.id.clone();
                if !self.inner.grants.complete(&id, grant) {
                    warn!(target: self.inner.log.target(), "no one is waiting for grant {}", id);
                }
                Ok(())
            }
            KEYLIST_UPDATE_MSG_TYPE => self.update_keylist(msg, my_did, their_did).await,
            KEYLIST_UPDATE_RESPONSE_MSG_TYPE => {
                let response: KeylistUpdateResponse = msg
                    .decode()
                    .context("route keylist update response message unmarshal")?;
                let id = response.id.clone();
                if !self.inner.keylist_updates.complete(&id, response) {
                    warn!(target: self.inner.log.target(), "no one is waiting for keylist update response {}", id);
                }
                Ok(())
            }
            FORWARD_MSG_TYPE => self.forward(msg).await,
            other => Err(Error::UnrecognizedMessageType(other.into())),
        }
    }

    /// Router side of a key list update.
    async fn update_keylist(&self, msg: &Message, my_did: &str, their_did: &str) -> Result<()> {
        let update: KeylistUpdate = msg.decode().context("route key list update message unmarshal")?;

        let updated = update
            .updates
            .into_iter()
            .map(|u| {
                let result = match u.action {
                    UpdateAction::Add => {
                        match self
                            .inner
                            .store
                            .put(&data_key(&u.recipient_key), their_did.as_bytes())
                        {
                            Ok(()) => UpdateResult::Success,
                            Err(err) => {
                                error!(target: self.inner.log.target(), "failed to add the route key to store: {}", err);
                                UpdateResult::ServerError
                            }
                        }
                    }
                    // keys are never removed from the store
                    UpdateAction::Remove => UpdateResult::ServerError,
                };
                UpdateResponse {
                    recipient_key: u.recipient_key,
                    action: u.action,
                    result,
                }
            })
            .collect();

        let response = KeylistUpdateResponse {
            msg_type: KEYLIST_UPDATE_RESPONSE_MSG_TYPE.into(),
            id: update.id,
            updated,
        };
        self.inner
            .outbound
            .send_to_did(&Message::encode(&response)?, my_did, their_did)
            .await
    }

    /// Router side of a forward: relays the packed message to the agent that
    /// registered the `to` key.
    async fn forward(&self, msg: &Message) -> Result<()> {
        let forward: Forward = msg.decode().context("forward message unmarshal")?;
        let their_did = String::from_utf8(
            self.inner
                .store
                .get(&data_key(&forward.to))
                .context("route key fetch")?,
        )?;
        let destination = get_destination(&their_did, self.inner.registry.as_ref()).context("get destination")?;
        let packed = forward.msg.get().as_bytes().to_vec();

        let sender = match self.inner.actions.sender() {
            Some(sender) => sender,
            None => return self.inner.outbound.forward(&packed, &destination).await,
        };

        let mut properties = HashMap::new();
        properties.insert("theirDID".to_string(), their_did);
        let (action, response) = Action::new(COORDINATION, msg.clone(), properties);
        if sender.send(action).is_err() {
            return self.inner.outbound.forward(&packed, &destination).await;
        }

        let service = self.clone();
        tokio::spawn(async move {
            if let Ok(ActionResponse::Continue(_)) = response.await {
                if let Err(err) = service.inner.outbound.forward(&packed, &destination).await {
                    error!(target: service.inner.log.target(), "router forward failed in continuation: {}", err);
                }
            }
        });
        Ok(())
    }
}

fn data_key(id: &str) -> String {
    format!("route-{}", id)
}

#[async_trait]
impl Handler for Service {
    fn name(&self) -> &str {
        COORDINATION
    }

    fn accept(&self, msg_type: &str) -> bool {
        matches!(
            msg_type,
            REQUEST_MSG_TYPE
                | GRANT_MSG_TYPE
                | KEYLIST_UPDATE_MSG_TYPE
                | KEYLIST_UPDATE_RESPONSE_MSG_TYPE
                | FORWARD_MSG_TYPE
        )
    }

    async fn handle_inbound(&self, msg: Message, my_did: &str, their_did: &str) -> Result<String> {
        debug!(target: self.inner.log.target(), "input: msg={} myDID={} theirDID={}", msg.msg_type(), my_did, their_did);
        let id = msg.id().to_string();

        if msg.msg_type() == REQUEST_MSG_TYPE {
            let sender = self.inner.actions.sender().ok_or(Error::NoClients)?;
            let (action, response) = Action::new(COORDINATION, msg.clone(), HashMap::new());
            sender.send(action).map_err(|_| Error::NoClients)?;
            tokio::spawn(self.clone().await_request_decision(
                msg,
                my_did.to_string(),
                their_did.to_string(),
                response,
            ));
            return Ok(id);
        }

        let service = self.clone();
        let (my_did, their_did) = (my_did.to_string(), their_did.to_string());
        tokio::spawn(async move {
            let log = service.inner.log.clone();
            match service.process_message(&msg, &my_did, &their_did).await {
                Ok(()) => debug!(target: log.target(), "processed {} {}", msg.msg_type(), msg.id()),
                Err(err) => error!(target: log.target(), "failed to process {} {}: {}", msg.msg_type(), msg.id(), err),
            }
        });
        Ok(id)
    }

    async fn handle_outbound(&self, msg: Message, my_did: &str, their_did: &str) -> Result<()> {
        if msg.msg_type() != REQUEST_MSG_TYPE {
            return Err(Error::UnrecognizedMessageType(msg.msg_type().into()));
        }
        let connection_id = self
            .inner
            .connections
            .get_connection_id_by_dids(my_did, their_did)
            .context(format!(
                "failed to lookup connection record for myDID={} theirDID={}",
                my_did, their_did
            ))?;
        self.register(&connection_id).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    use super::*;
    use crate::{
        kms::LocalKms,
        storage::MemStoreProvider,
        transport::Destination,
        vdri::{Doc, MemRegistry, Service as DidService, DIDCOMM_SERVICE_TYPE},
    };

    const MY_DID: &str = "did:example:agent";
    const THEIR_DID: &str = "did:example:router";

    #[derive(Debug)]
    enum Sent {
        ToDid(Message, String, String),
        Forward(Vec<u8>, Destination),
    }

    struct ChannelOutbound {
        sent: UnboundedSender<Sent>,
    }

    #[async_trait]
    impl Outbound for ChannelOutbound {
        async fn send(&self, _: &Message, _: &str, _: &Destination) -> Result<()> {
            Err(Error::NotImplemented("send".into()))
        }

        async fn send_to_did(&self, msg: &Message, my_did: &str, their_did: &str) -> Result<()> {
            self.sent
                .send(Sent::ToDid(msg.clone(), my_did.into(), their_did.into()))
                .map_err(|e| Error::Generic(e.to_string()))
        }

        async fn forward(&self, packed: &[u8], destination: &Destination) -> Result<()> {
            self.sent
                .send(Sent::Forward(packed.to_vec(), destination.clone()))
                .map_err(|e| Error::Generic(e.to_string()))
        }
    }

    struct Fixture {
        service: Service,
        sent: UnboundedReceiver<Sent>,
        storage: Arc<MemStoreProvider>,
        registry: Arc<MemRegistry>,
    }

    fn fixture(client_timeout: Duration) -> Result<Fixture> {
        let storage = Arc::new(MemStoreProvider::new());
        let registry = Arc::new(MemRegistry::new()?);
        let (tx, sent) = unbounded_channel();
        let service = Service::new(Provider {
            outbound: Arc::new(ChannelOutbound { sent: tx }),
            storage: storage.clone(),
            kms: Arc::new(LocalKms::new(storage.as_ref())?),
            registry: registry.clone(),
            config: ServiceConfig {
                router_endpoint: "https://router.example.com".into(),
                client_timeout,
            },
        })?;
        Ok(Fixture {
            service,
            sent,
            storage,
            registry,
        })
    }

    fn save_connection(storage: &MemStoreProvider, connection_id: &str) -> Result<()> {
        ConnectionLookup::new(storage)?.save_connection_record(&ConnectionRecord {
            connection_id: connection_id.into(),
            my_did: MY_DID.into(),
            their_did: THEIR_DID.into(),
        })
    }

    async fn next_sent(sent: &mut UnboundedReceiver<Sent>) -> Result<Sent> {
        tokio::time::timeout(Duration::from_secs(5), sent.recv())
            .await
            .map_err(|_| Error::Timeout("outbound message".into()))?
            .ok_or_else(|| Error::Generic("outbound closed".into()))
    }

    async fn next_message(sent: &mut UnboundedReceiver<Sent>) -> Result<Message> {
        match next_sent(sent).await? {
            Sent::ToDid(msg, _, _) => Ok(msg),
            other => Err(Error::Generic(format!("unexpected {:?}", other))),
        }
    }

    #[tokio::test]
    async fn register_saves_the_grant() -> Result<()> {
        // Arrange
        let mut f = fixture(DEFAULT_CLIENT_TIMEOUT)?;
        save_connection(&f.storage, "conn-1")?;
        let service = f.service.clone();
        let registration = tokio::spawn(async move { service.register("conn-1").await });
        // Act
        let request = next_message(&mut f.sent).await?;
        assert_eq!(request.msg_type(), REQUEST_MSG_TYPE);
        let grant = Grant {
            msg_type: GRANT_MSG_TYPE.into(),
            id: request.id().into(),
            endpoint: "https://router.example.com/agent".into(),
            routing_keys: vec!["routing-key".into()],
        };
        f.service
            .handle_inbound(Message::encode(&grant)?, MY_DID, THEIR_DID)
            .await?;
        registration
            .await
            .map_err(|e| Error::Generic(e.to_string()))??;
        // Assert
        assert_eq!(f.service.get_connection()?, "conn-1");
        let config = f.service.config()?;
        assert_eq!(config.endpoint(), "https://router.example.com/agent");
        assert_eq!(config.keys(), ["routing-key".to_string()]);
        assert!(!f.service.inner.grants.is_pending(request.id()));

        let err = f.service.register("conn-1").await.unwrap_err();
        assert!(matches!(err, Error::RouterAlreadyRegistered));
        Ok(())
    }

    #[tokio::test]
    async fn register_times_out_without_grant() -> Result<()> {
        let mut f = fixture(Duration::from_millis(50))?;
        save_connection(&f.storage, "conn-1")?;

        let err = f.service.register("conn-1").await.unwrap_err();

        assert!(matches!(err, Error::Timeout(_)));
        let request = next_message(&mut f.sent).await?;
        assert!(!f.service.inner.grants.is_pending(request.id()));
        assert!(matches!(f.service.get_connection(), Err(Error::RouterNotRegistered)));
        assert!(matches!(f.service.add_key("key").await, Err(Error::RouterNotRegistered)));
        Ok(())
    }

    #[tokio::test]
    async fn register_needs_a_known_connection() -> Result<()> {
        let f = fixture(DEFAULT_CLIENT_TIMEOUT)?;
        let err = f.service.register("unknown").await.unwrap_err();
        assert!(matches!(err, Error::ConnectionNotFound));
        assert!(matches!(f.service.unregister(), Err(Error::RouterNotRegistered)));
        assert!(matches!(f.service.config(), Err(Error::RouterNotRegistered)));
        Ok(())
    }

    #[tokio::test]
    async fn add_key_reports_router_failures() -> Result<()> {
        // Arrange
        let mut f = fixture(DEFAULT_CLIENT_TIMEOUT)?;
        save_connection(&f.storage, "conn-1")?;
        f.service.inner.store.put(ROUTE_CONN_ID_DATA_KEY, b"conn-1")?;

        for result in [UpdateResult::Success, UpdateResult::ServerError] {
            let service = f.service.clone();
            let adding = tokio::spawn(async move { service.add_key("recipient-key").await });
            // Act
            let update: KeylistUpdate = next_message(&mut f.sent).await?.decode()?;
            let response = KeylistUpdateResponse {
                msg_type: KEYLIST_UPDATE_RESPONSE_MSG_TYPE.into(),
                id: update.id.clone(),
                updated: vec![UpdateResponse {
                    recipient_key: "recipient-key".into(),
                    action: UpdateAction::Add,
                    result,
                }],
            };
            f.service
                .handle_inbound(Message::encode(&response)?, MY_DID, THEIR_DID)
                .await?;
            // Assert
            let added = adding.await.map_err(|e| Error::Generic(e.to_string()))?;
            assert_eq!(added.is_ok(), result == UpdateResult::Success);
        }
        Ok(())
    }

    #[tokio::test]
    async fn router_stores_added_keys() -> Result<()> {
        let mut f = fixture(DEFAULT_CLIENT_TIMEOUT)?;
        let update = KeylistUpdate {
            msg_type: KEYLIST_UPDATE_MSG_TYPE.into(),
            id: "update-1".into(),
            updates: vec![
                Update {
                    recipient_key: "added".into(),
                    action: UpdateAction::Add,
                },
                Update {
                    recipient_key: "removed".into(),
                    action: UpdateAction::Remove,
                },
            ],
        };

        f.service
            .handle_inbound(Message::encode(&update)?, THEIR_DID, MY_DID)
            .await?;

        let response: KeylistUpdateResponse = next_message(&mut f.sent).await?.decode()?;
        assert_eq!(response.id, "update-1");
        assert_eq!(response.updated[0].result, UpdateResult::Success);
        assert_eq!(response.updated[1].result, UpdateResult::ServerError);
        assert_eq!(f.service.inner.store.get("route-added")?, MY_DID.as_bytes());
        Ok(())
    }

    #[tokio::test]
    async fn route_request_needs_a_decision() -> Result<()> {
        let mut f = fixture(DEFAULT_CLIENT_TIMEOUT)?;
        let request = Message::encode(&Request {
            msg_type: REQUEST_MSG_TYPE.into(),
            id: "request-1".into(),
        })?;
        let err = f
            .service
            .handle_inbound(request.clone(), THEIR_DID, MY_DID)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoClients));

        let (tx, mut actions) = unbounded_channel();
        f.service.register_action_event(tx)?;
        f.service.handle_inbound(request, THEIR_DID, MY_DID).await?;
        actions
            .recv()
            .await
            .ok_or(Error::NoClients)?
            .continue_with(Options::default());

        let grant: Grant = next_message(&mut f.sent).await?.decode()?;
        assert_eq!(grant.id, "request-1");
        assert_eq!(grant.endpoint, "https://router.example.com");
        assert_eq!(grant.routing_keys.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn forward_is_relayed_to_the_key_owner() -> Result<()> {
        // Arrange
        let mut f = fixture(DEFAULT_CLIENT_TIMEOUT)?;
        f.registry.store(Doc {
            id: MY_DID.into(),
            public_key: vec![],
            service: vec![DidService {
                id: format!("{}#didcomm", MY_DID),
                service_type: DIDCOMM_SERVICE_TYPE.into(),
                priority: 0,
                recipient_keys: vec!["recipient-key".into()],
                routing_keys: vec![],
                service_endpoint: "https://agent.example.com".into(),
            }],
        })?;
        f.service.inner.store.put("route-recipient-key", MY_DID.as_bytes())?;
        let envelope = r#"{"protected":"e30","ciphertext":"abc"}"#;
        let forward = Forward::new(
            "recipient-key",
            serde_json::value::RawValue::from_string(envelope.into())?,
        );
        // Act
        f.service
            .handle_inbound(Message::encode(&forward)?, THEIR_DID, MY_DID)
            .await?;
        // Assert
        match next_sent(&mut f.sent).await? {
            Sent::Forward(packed, destination) => {
                assert_eq!(packed, envelope.as_bytes());
                assert_eq!(destination.service_endpoint, "https://agent.example.com");
            }
            other => panic!("unexpected {:?}", other),
        }
        Ok(())
    }
}
