use std::fmt;

use super::{
    models::*,
    service::MetaData,
};
use crate::{
    messages::{ProblemReport, CODE_REJECTED_ERROR},
    service::Messenger,
    Error, Message, Result, ResultExt,
};

const START: &str = "start";
const ABANDONING: &str = "abandoning";
const DONE: &str = "done";
const NO_OP: &str = "noop";
const REQUEST_SENT: &str = "request-sent";
const REQUEST_RECEIVED: &str = "request-received";
const PROPOSAL_SENT: &str = "proposal-sent";
const PROPOSAL_RECEIVED: &str = "proposal-received";
const PRESENTATION_SENT: &str = "presentation-sent";
const PRESENTATION_RECEIVED: &str = "presentation-received";

/// Present-proof protocol state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    /// Pseudo state of an instance that has not started yet.
    Start,
    /// Error absorbing state; a non empty code is reported to the other party.
    Abandoning { code: Option<String> },
    Done,
    /// Stops automatic execution until new input arrives.
    NoOp,
    RequestSent,
    RequestReceived,
    ProposalSent,
    ProposalReceived,
    PresentationSent,
    PresentationReceived,
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::Start => START,
            State::Abandoning { .. } => ABANDONING,
            State::Done => DONE,
            State::NoOp => NO_OP,
            State::RequestSent => REQUEST_SENT,
            State::RequestReceived => REQUEST_RECEIVED,
            State::ProposalSent => PROPOSAL_SENT,
            State::ProposalReceived => PROPOSAL_RECEIVED,
            State::PresentationSent => PRESENTATION_SENT,
            State::PresentationReceived => PRESENTATION_RECEIVED,
        }
    }

    /// State persisted under `name`. Unknown names map to [`State::NoOp`].
    pub fn from_name(name: &str) -> Self {
        match name {
            START => State::Start,
            ABANDONING => State::Abandoning { code: None },
            DONE => State::Done,
            REQUEST_SENT => State::RequestSent,
            REQUEST_RECEIVED => State::RequestReceived,
            PROPOSAL_SENT => State::ProposalSent,
            PROPOSAL_RECEIVED => State::ProposalReceived,
            PRESENTATION_SENT => State::PresentationSent,
            PRESENTATION_RECEIVED => State::PresentationReceived,
            _ => State::NoOp,
        }
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self, State::NoOp)
    }

    /// Legal successors of this state.
    pub fn can_transition_to(&self, next: &State) -> bool {
        use State::*;
        match self {
            Start => matches!(
                next,
                RequestSent | ProposalReceived | ProposalSent | RequestReceived
            ),
            Abandoning { .. } => matches!(next, Done),
            Done | NoOp => false,
            RequestReceived => matches!(next, PresentationSent | ProposalSent | Abandoning { .. }),
            RequestSent => matches!(
                next,
                PresentationReceived | ProposalReceived | Abandoning { .. }
            ),
            PresentationSent | PresentationReceived => matches!(next, Abandoning { .. } | Done),
            ProposalSent => matches!(next, RequestReceived | Abandoning { .. }),
            ProposalReceived => matches!(next, RequestSent | Abandoning { .. }),
        }
    }

    /// Runs the state. Returns the followup state and the side effect to
    /// perform once the transition was found legal and persisted.
    pub(crate) fn execute(&self, md: &MetaData) -> Result<(State, StateAction)> {
        match self {
            State::Start => Err(Error::NotImplemented(START.into())),
            State::NoOp => Err(Error::CannotExecuteNoOp),
            State::Done => Ok((State::NoOp, StateAction::None)),
            State::Abandoning { code } => abandon(code.as_deref(), md),
            State::RequestReceived => {
                // a ready presentation wins over a counter proposal
                if md.options.presentation.is_some() {
                    Ok((State::PresentationSent, StateAction::None))
                } else {
                    Ok((State::ProposalSent, StateAction::None))
                }
            }
            State::RequestSent => {
                if md.outbound && !md.msg.has_thread() {
                    return Ok((State::NoOp, initial_send(md)));
                }
                let mut request = md
                    .options
                    .request_presentation
                    .clone()
                    .ok_or_else(|| Error::Generic("request was not provided".into()))?;
                request.msg_type = REQUEST_PRESENTATION_MSG_TYPE.into();
                Ok((State::NoOp, reply(md, &request)?))
            }
            State::ProposalSent => {
                if md.outbound && !md.msg.has_thread() {
                    return Ok((State::NoOp, initial_send(md)));
                }
                let mut propose = md
                    .options
                    .propose_presentation
                    .clone()
                    .ok_or_else(|| Error::Generic("propose-presentation was not provided".into()))?;
                propose.msg_type = PROPOSE_PRESENTATION_MSG_TYPE.into();
                Ok((State::NoOp, reply(md, &propose)?))
            }
            State::PresentationSent => {
                let mut presentation = md
                    .options
                    .presentation
                    .clone()
                    .ok_or_else(|| Error::Generic("presentation was not provided".into()))?;
                presentation.msg_type = PRESENTATION_MSG_TYPE.into();
                Ok((State::NoOp, reply(md, &presentation)?))
            }
            State::PresentationReceived => {
                save_presentations(md)?;
                Ok((State::Done, reply(md, &Ack::new())?))
            }
            State::ProposalReceived => Ok((State::RequestSent, StateAction::None)),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn abandon(code: Option<&str>, md: &MetaData) -> Result<(State, StateAction)> {
    let code = match code {
        Some(code) if !code.is_empty() => code,
        // nothing to report, abandon silently
        _ => return Ok((State::Done, StateAction::None)),
    };
    let code = match &md.err {
        Some(err) if err.is_rejection() => CODE_REJECTED_ERROR,
        _ => code,
    };
    let thread_id = md.msg.thread_id().context("threadID")?;
    let report = ProblemReport::new(PROBLEM_REPORT_MSG_TYPE, code);

    Ok((
        State::Done,
        StateAction::ReplyToNested {
            thread_id,
            msg: Message::encode(&report)?,
            my_did: md.my_did.clone(),
            their_did: md.their_did.clone(),
        },
    ))
}

fn initial_send(md: &MetaData) -> StateAction {
    StateAction::Send {
        msg: md.msg.clone(),
        my_did: md.my_did.clone(),
        their_did: md.their_did.clone(),
    }
}

fn reply<T: serde::Serialize>(md: &MetaData, body: &T) -> Result<StateAction> {
    Ok(StateAction::ReplyTo {
        msg_id: md.msg.id().to_string(),
        msg: Message::encode(body)?,
    })
}

fn save_presentations(md: &MetaData) -> Result<()> {
    let presentation: Presentation = md.msg.decode().context("decode")?;
    if presentation.presentations.is_empty() {
        return Err(Error::Generic("presentations were not provided".into()));
    }

    for (i, attachment) in presentation.presentations.iter().enumerate() {
        let raw = attachment.decoded().context("to verifiable presentation")?;
        let vp = md
            .parser
            .parse_presentation(&raw)
            .context("to verifiable presentation")?;
        let name = md
            .options
            .presentation_names
            .get(i)
            .cloned()
            .unwrap_or_else(|| vp.id.clone());
        md.verifiable
            .save_presentation(&name, &vp)
            .context("save presentation")?;
    }
    Ok(())
}

/// Side effect of a state, run through the [`Messenger`] after the
/// transition was persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum StateAction {
    None,
    /// Starts an interaction.
    Send {
        msg: Message,
        my_did: String,
        their_did: String,
    },
    ReplyTo {
        msg_id: String,
        msg: Message,
    },
    ReplyToNested {
        thread_id: String,
        msg: Message,
        my_did: String,
        their_did: String,
    },
}

impl StateAction {
    pub async fn run(self, messenger: &dyn Messenger) -> Result<()> {
        match self {
            StateAction::None => Ok(()),
            StateAction::Send {
                msg,
                my_did,
                their_did,
            } => messenger.send(msg, &my_did, &their_did).await,
            StateAction::ReplyTo { msg_id, msg } => messenger.reply_to(&msg_id, msg).await,
            StateAction::ReplyToNested {
                thread_id,
                msg,
                my_did,
                their_did,
            } => {
                messenger
                    .reply_to_nested(&thread_id, msg, &my_did, &their_did)
                    .await
            }
        }
    }
}

/// Proposed next state for `msg`, by type and direction.
pub fn next_state(msg: &Message, outbound: bool) -> Result<State> {
    match msg.msg_type() {
        REQUEST_PRESENTATION_MSG_TYPE if outbound => Ok(State::RequestSent),
        REQUEST_PRESENTATION_MSG_TYPE => Ok(State::RequestReceived),
        PROPOSE_PRESENTATION_MSG_TYPE if outbound => Ok(State::ProposalSent),
        PROPOSE_PRESENTATION_MSG_TYPE => Ok(State::ProposalReceived),
        PRESENTATION_MSG_TYPE => Ok(State::PresentationReceived),
        ACK_MSG_TYPE => Ok(State::Done),
        PROBLEM_REPORT_MSG_TYPE => Ok(State::Abandoning { code: None }),
        other => Err(Error::UnrecognizedMessageType(other.into())),
    }
}

/// Message types that need a user decision before the instance proceeds.
pub fn can_trigger_action_events(msg: &Message) -> bool {
    matches!(
        msg.msg_type(),
        PROPOSE_PRESENTATION_MSG_TYPE | REQUEST_PRESENTATION_MSG_TYPE | PRESENTATION_MSG_TYPE
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        messages::{Attachment, Thread, CODE_INTERNAL_ERROR},
        storage::MemStoreProvider,
        verifiable::{JsonPresentationParser, PresentationStore, VerifiableStore},
    };

    const ALL: [State; 10] = [
        State::Start,
        State::Abandoning { code: None },
        State::Done,
        State::NoOp,
        State::RequestSent,
        State::RequestReceived,
        State::ProposalSent,
        State::ProposalReceived,
        State::PresentationSent,
        State::PresentationReceived,
    ];

    fn metadata(msg: Message) -> Result<(MetaData, Arc<PresentationStore>)> {
        let verifiable = Arc::new(PresentationStore::new(&MemStoreProvider::new())?);
        let md = MetaData {
            piid: "piid".into(),
            state: State::Start,
            msg,
            my_did: "did:example:me".into(),
            their_did: "did:example:them".into(),
            outbound: false,
            options: ContinueOptions::default(),
            err: None,
            verifiable: verifiable.clone(),
            parser: Arc::new(JsonPresentationParser),
        };
        Ok((md, verifiable))
    }

    fn legal(from: &State) -> Vec<&'static str> {
        ALL.iter()
            .filter(|to| from.can_transition_to(to))
            .map(State::name)
            .collect()
    }

    #[test]
    fn names_round_trip() {
        for state in ALL.iter() {
            assert_eq!(&State::from_name(state.name()), state);
        }
        assert_eq!(State::from_name("unknown"), State::NoOp);
    }

    #[test]
    fn transition_table() {
        assert_eq!(
            legal(&State::Start),
            vec![REQUEST_SENT, REQUEST_RECEIVED, PROPOSAL_SENT, PROPOSAL_RECEIVED]
        );
        assert_eq!(legal(&State::Abandoning { code: None }), vec![DONE]);
        assert!(legal(&State::Done).is_empty());
        assert!(legal(&State::NoOp).is_empty());
        assert_eq!(
            legal(&State::RequestReceived),
            vec![ABANDONING, PROPOSAL_SENT, PRESENTATION_SENT]
        );
        assert_eq!(
            legal(&State::RequestSent),
            vec![ABANDONING, PROPOSAL_RECEIVED, PRESENTATION_RECEIVED]
        );
        assert_eq!(legal(&State::PresentationSent), vec![ABANDONING, DONE]);
        assert_eq!(legal(&State::PresentationReceived), vec![ABANDONING, DONE]);
        assert_eq!(legal(&State::ProposalSent), vec![ABANDONING, REQUEST_RECEIVED]);
        assert_eq!(legal(&State::ProposalReceived), vec![ABANDONING, REQUEST_SENT]);
    }

    #[test]
    fn next_state_depends_on_type_and_direction() -> Result<()> {
        let request = Message::new(REQUEST_PRESENTATION_MSG_TYPE);
        assert_eq!(next_state(&request, true)?, State::RequestSent);
        assert_eq!(next_state(&request, false)?, State::RequestReceived);

        let propose = Message::new(PROPOSE_PRESENTATION_MSG_TYPE);
        assert_eq!(next_state(&propose, true)?, State::ProposalSent);
        assert_eq!(next_state(&propose, false)?, State::ProposalReceived);

        assert_eq!(next_state(&Message::new(PRESENTATION_MSG_TYPE), false)?, State::PresentationReceived);
        assert_eq!(next_state(&Message::new(ACK_MSG_TYPE), false)?, State::Done);
        assert_eq!(
            next_state(&Message::new(PROBLEM_REPORT_MSG_TYPE), false)?,
            State::Abandoning { code: None }
        );

        let err = next_state(&Message::new("unknown"), false).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedMessageType(t) if t == "unknown"));
        Ok(())
    }

    #[test]
    fn only_decisions_trigger_actions() {
        assert!(can_trigger_action_events(&Message::new(REQUEST_PRESENTATION_MSG_TYPE)));
        assert!(can_trigger_action_events(&Message::new(PROPOSE_PRESENTATION_MSG_TYPE)));
        assert!(can_trigger_action_events(&Message::new(PRESENTATION_MSG_TYPE)));
        assert!(!can_trigger_action_events(&Message::new(ACK_MSG_TYPE)));
        assert!(!can_trigger_action_events(&Message::new(PROBLEM_REPORT_MSG_TYPE)));
    }

    #[test]
    fn pseudo_states_do_not_execute() -> Result<()> {
        let (md, _) = metadata(Message::new(ACK_MSG_TYPE))?;
        assert!(matches!(State::Start.execute(&md), Err(Error::NotImplemented(_))));
        assert!(matches!(State::NoOp.execute(&md), Err(Error::CannotExecuteNoOp)));
        assert_eq!(State::Done.execute(&md)?, (State::NoOp, StateAction::None));
        Ok(())
    }

    #[test]
    fn abandoning_without_code_is_silent() -> Result<()> {
        let (md, _) = metadata(Message::new(PROBLEM_REPORT_MSG_TYPE))?;
        for code in [None, Some(String::new())] {
            let (next, action) = State::Abandoning { code }.execute(&md)?;
            assert_eq!(next, State::Done);
            assert_eq!(action, StateAction::None);
        }
        Ok(())
    }

    #[test]
    fn rejection_is_reported_as_rejected() -> Result<()> {
        let (mut md, _) = metadata(Message::new(REQUEST_PRESENTATION_MSG_TYPE))?;
        md.err = Some(Error::Rejected("no thanks".into()).context("action stop"));
        let state = State::Abandoning {
            code: Some(CODE_INTERNAL_ERROR.into()),
        };

        let (next, action) = state.execute(&md)?;

        assert_eq!(next, State::Done);
        match action {
            StateAction::ReplyToNested { thread_id, msg, .. } => {
                assert_eq!(thread_id, md.msg.id());
                let report: ProblemReport = msg.decode()?;
                assert_eq!(report.code(), CODE_REJECTED_ERROR);
                assert_eq!(report.msg_type, PROBLEM_REPORT_MSG_TYPE);
            }
            other => panic!("unexpected action {:?}", other),
        }

        md.err = Some(Error::Generic("boom".into()));
        let (_, action) = state.execute(&md)?;
        match action {
            StateAction::ReplyToNested { msg, .. } => {
                assert_eq!(msg.decode::<ProblemReport>()?.code(), CODE_INTERNAL_ERROR)
            }
            other => panic!("unexpected action {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn presentation_takes_precedence_over_proposal() -> Result<()> {
        let (mut md, _) = metadata(Message::new(REQUEST_PRESENTATION_MSG_TYPE))?;
        assert_eq!(State::RequestReceived.execute(&md)?.0, State::ProposalSent);

        md.options = ContinueOptions::default()
            .with_propose_presentation(ProposePresentation::default())
            .with_presentation(Presentation::default());
        assert_eq!(State::RequestReceived.execute(&md)?.0, State::PresentationSent);
        Ok(())
    }

    #[test]
    fn initial_request_is_sent_not_replied() -> Result<()> {
        let (mut md, _) = metadata(Message::new(REQUEST_PRESENTATION_MSG_TYPE))?;
        md.outbound = true;

        let (next, action) = State::RequestSent.execute(&md)?;

        assert_eq!(next, State::NoOp);
        assert!(matches!(action, StateAction::Send { ref my_did, .. } if my_did == "did:example:me"));
        Ok(())
    }

    #[test]
    fn request_reply_needs_a_request() -> Result<()> {
        let (mut md, _) = metadata(Message::new(PROPOSE_PRESENTATION_MSG_TYPE))?;
        md.msg.set_thread(Thread::implicit_reply("thread"))?;
        assert!(State::RequestSent.execute(&md).is_err());

        md.options = ContinueOptions::default().with_request_presentation(RequestPresentation::default());
        let (next, action) = State::RequestSent.execute(&md)?;
        assert_eq!(next, State::NoOp);
        match action {
            StateAction::ReplyTo { msg_id, msg } => {
                assert_eq!(msg_id, md.msg.id());
                assert_eq!(msg.msg_type(), REQUEST_PRESENTATION_MSG_TYPE);
            }
            other => panic!("unexpected action {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn presentation_sent_needs_a_presentation() -> Result<()> {
        let (md, _) = metadata(Message::new(REQUEST_PRESENTATION_MSG_TYPE))?;
        let err = State::PresentationSent.execute(&md).unwrap_err();
        assert_eq!(err.to_string(), "presentation was not provided");
        Ok(())
    }

    #[test]
    fn received_presentations_are_saved_and_acked() -> Result<()> {
        // Arrange
        let vp = br#"{"@context":"https://www.w3.org/2018/credentials/v1","id":"urn:vp:1","type":"VerifiablePresentation"}"#;
        let presentation = Presentation {
            msg_type: PRESENTATION_MSG_TYPE.into(),
            presentations: vec![Attachment::base64_json(vp)],
            ..Default::default()
        };
        let (mut md, verifiable) = metadata(Message::encode(&presentation)?)?;
        md.options = ContinueOptions::default().with_presentation_names(vec!["license".into()]);
        // Act
        let (next, action) = State::PresentationReceived.execute(&md)?;
        // Assert
        assert_eq!(next, State::Done);
        assert!(matches!(action, StateAction::ReplyTo { ref msg, .. } if msg.msg_type() == ACK_MSG_TYPE));
        assert_eq!(verifiable.get_presentation_id_by_name("license")?, "urn:vp:1");
        Ok(())
    }

    #[test]
    fn presentation_without_attachments_fails() -> Result<()> {
        let (md, _) = metadata(Message::new(PRESENTATION_MSG_TYPE))?;
        let err = State::PresentationReceived.execute(&md).unwrap_err();
        assert_eq!(err.to_string(), "presentations were not provided");
        Ok(())
    }
}
