mod common;

use std::sync::Arc;

use common::*;
use didcomm_agent::{
    crypto::CryptoAlgorithm,
    dispatcher::{DispatcherConfig, OutboundDispatcher},
    kms::LocalKms,
    messages::{Attachment, ReturnRoute},
    messenger::OutboundMessenger,
    packer::{Packager, Packer},
    protocol::presentproof::{
        Action, ContinueOptions, Presentation, Provider, Service as PresentProof,
        PRESENTATION_MSG_TYPE, REQUEST_PRESENTATION_MSG_TYPE,
    },
    service::Handler,
    storage::MemStoreProvider,
    vdri::MemRegistry,
    verifiable::{JsonPresentationParser, PresentationStore},
};
use tokio::sync::mpsc::unbounded_channel;
use utilities::get_keypair_set;

const VP: &[u8] = br#"{"@context":["https://www.w3.org/2018/credentials/v1"],"type":"VerifiablePresentation"}"#;

#[tokio::test]
async fn presentation_reaches_the_verifier_packed() -> Result<()> {
    // Arrange
    let _ = env_logger::builder().is_test(true).try_init();
    let keys = get_keypair_set();
    let storage = Arc::new(MemStoreProvider::new());

    let kms = Arc::new(LocalKms::new(storage.as_ref())?);
    kms.import_key(keys.alice_private)?;
    let registry = Arc::new(MemRegistry::new()?);
    registry.store(didcomm_doc(ALICE_DID, &keys.alice_verkey(), vec![], "http://alice.example.com"))?;
    registry.store(didcomm_doc(BOB_DID, &keys.bobs_verkey(), vec![], "http://bob.example.com"))?;

    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = Arc::new(OutboundDispatcher::new(DispatcherConfig {
        transports: vec![transport.clone() as Arc<dyn OutboundTransport>],
        packager: Arc::new(Packer::new(kms.clone(), CryptoAlgorithm::XC20P)),
        transport_return_route: ReturnRoute::None,
        registry,
        kms,
    }));
    let messenger = Arc::new(OutboundMessenger::new(dispatcher, storage.as_ref())?);
    let prover = PresentProof::new(Provider {
        messenger: messenger.clone(),
        storage: storage.clone(),
        verifiable: Arc::new(PresentationStore::new(storage.as_ref())?),
        parser: Arc::new(JsonPresentationParser),
    })?;
    let (actions_tx, mut actions) = unbounded_channel::<Action>();
    prover.register_action_event(actions_tx)?;
    let (states_tx, mut states) = unbounded_channel();
    prover.register_msg_event(states_tx)?;

    let request = Message::new(REQUEST_PRESENTATION_MSG_TYPE);
    messenger.handle_inbound(&request, ALICE_DID, BOB_DID)?;
    // Act
    prover.handle_inbound(request.clone(), ALICE_DID, BOB_DID).await?;
    recv(&mut actions).await?.continue_with(ContinueOptions::default().with_presentation(
        Presentation {
            presentations: vec![Attachment::base64_json(VP)],
            ..Default::default()
        },
    ));
    post_states_until(&mut states, "presentation-sent").await?;
    // Assert
    let sent = transport.sent()?;
    assert_eq!(sent.len(), 1);
    let (packed, destination) = &sent[0];
    assert_eq!(destination.service_endpoint, "http://bob.example.com");

    let bob_kms = LocalKms::new(&MemStoreProvider::new())?;
    bob_kms.import_key(keys.bobs_private)?;
    let bob = Packer::new(Arc::new(bob_kms), CryptoAlgorithm::XC20P);
    let envelope = bob.unpack_message(packed)?;
    assert_eq!(envelope.from_verkey, keys.alice_public.to_vec());

    let reply = Message::from_bytes(&envelope.message)?;
    assert_eq!(reply.msg_type(), PRESENTATION_MSG_TYPE);
    assert_eq!(reply.thread_id()?, request.id());
    let presentation: Presentation = reply.decode()?;
    assert_eq!(presentation.presentations[0].decoded()?, VP.to_vec());
    Ok(())
}
