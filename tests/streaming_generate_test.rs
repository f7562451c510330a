//! Streaming generation tests: fragments fold into the poem in order.
//!
//! Uses the scripted generator, which streams its fragments from a worker
//! thread exactly like an asynchronous native runtime would.

use edge_lens_lib::config::{GeneratorConfig, LoadPolicy};
use edge_lens_lib::engine::scripted::{Ending, ScriptedGenerator, ScriptedGeneratorFactory};
use edge_lens_lib::error::{EngineError, SessionError};
use edge_lens_lib::session::{GenerateSession, PromptTemplate};
use std::sync::Arc;
use std::time::Duration;

const CAT_POEM: [&str; 4] = ["Roses ", "are red, ", "cats go ", "meow."];

fn poem_session(generator: ScriptedGenerator) -> (GenerateSession, Arc<ScriptedGenerator>, Arc<ScriptedGeneratorFactory>) {
    let generator = Arc::new(generator);
    let factory = Arc::new(ScriptedGeneratorFactory::new(generator.clone()));
    let session = GenerateSession::attach_with_template(
        GeneratorConfig::terrible_poem(),
        factory.clone(),
        true,
        PromptTemplate::new("Write a poem about: {subject}"),
    );
    (session, generator, factory)
}

#[tokio::test]
async fn test_cat_poem_streams_to_completion() {
    let (session, generator, _) =
        poem_session(ScriptedGenerator::new(CAT_POEM).with_chunk_delay(Duration::from_millis(10)));
    session.load().await.unwrap();
    assert!(session.state().loaded);

    let ticket = session.generate("cats").unwrap();

    let state = session.state();
    assert!(!state.complete);
    assert!(!state.enabled());
    assert_eq!(state.partial_text, "");
    assert_eq!(state.subject.as_deref(), Some("cats"));
    assert_eq!(state.title(), "\"cats\"");

    ticket.finished().await;

    let state = session.state();
    eprintln!("[TEST] poem: {:?}", state.partial_text);
    assert_eq!(state.partial_text, "Roses are red, cats go meow.");
    assert!(state.complete);
    assert!(state.enabled());
    assert_eq!(generator.prompts(), vec!["Write a poem about: cats".to_string()]);
}

#[tokio::test]
async fn test_observers_see_only_appends() {
    let (session, _, _) =
        poem_session(ScriptedGenerator::new(CAT_POEM).with_chunk_delay(Duration::from_millis(15)));
    session.load().await.unwrap();
    let mut rx = session.subscribe();

    let ticket = session.generate("cats").unwrap();

    let mut seen = Vec::new();
    loop {
        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        let done = state.complete;
        seen.push(state);
        if done {
            break;
        }
    }
    ticket.finished().await;

    for pair in seen.windows(2) {
        assert!(
            pair[1].partial_text.starts_with(&pair[0].partial_text),
            "{:?} does not extend {:?}",
            pair[1].partial_text,
            pair[0].partial_text
        );
    }
    let completes = seen.iter().filter(|s| s.complete).count();
    assert_eq!(completes, 1);
    assert_eq!(seen.last().unwrap().partial_text, "Roses are red, cats go meow.");
    assert!(session.state().complete);
}

#[tokio::test]
async fn test_second_request_rejected_while_streaming() {
    let (session, generator, _) =
        poem_session(ScriptedGenerator::new(CAT_POEM).with_chunk_delay(Duration::from_millis(20)));
    session.load().await.unwrap();

    let ticket = session.generate("cats").unwrap();
    assert_eq!(session.generate("dogs").unwrap_err(), SessionError::Busy);
    ticket.finished().await;

    session.add_reaction("👍");
    let ticket = session.generate("dogs").unwrap();
    let state = session.state();
    assert_eq!(state.partial_text, "");
    assert_eq!(state.reactions, "");
    assert_eq!(state.subject.as_deref(), Some("dogs"));
    ticket.finished().await;

    assert_eq!(session.state().partial_text, "Roses are red, cats go meow.");
    assert_eq!(generator.prompts().len(), 2);
}

#[tokio::test]
async fn test_load_failure_is_final() {
    let factory = Arc::new(ScriptedGeneratorFactory::failing(EngineError::OutOfMemory(
        "2.6 GB model".to_string(),
    )));
    let session = GenerateSession::attach(GeneratorConfig::terrible_poem(), factory.clone(), true);

    let err = session.load().await.unwrap_err();
    assert_eq!(err, EngineError::OutOfMemory("2.6 GB model".to_string()));

    let state = session.state();
    assert!(state.loaded);
    assert_eq!(state.loading_error, Some(err.clone()));
    assert!(!state.enabled());

    assert_eq!(session.generate("cats").unwrap_err(), SessionError::Disabled(err.clone()));
    assert_eq!(session.load().await.unwrap_err(), err);
    assert_eq!(factory.creates(), 1);
}

#[tokio::test]
async fn test_generate_before_load_finishes_is_not_ready() {
    let generator = Arc::new(ScriptedGenerator::new(CAT_POEM));
    let factory = Arc::new(
        ScriptedGeneratorFactory::new(generator).with_load_delay(Duration::from_millis(100)),
    );
    let session = GenerateSession::attach(GeneratorConfig::terrible_poem(), factory.clone(), true);

    assert_eq!(session.generate("cats").unwrap_err(), SessionError::NotReady);
    assert!(!session.state().loaded);

    session.load().await.unwrap();
    session.generate("cats").unwrap().finished().await;
    assert!(session.state().complete);
    assert_eq!(factory.creates(), 1);
}

#[tokio::test]
async fn test_lazy_policy_loads_on_first_generate() {
    let generator = Arc::new(ScriptedGenerator::new(CAT_POEM));
    let factory = Arc::new(ScriptedGeneratorFactory::new(generator));
    let mut config = GeneratorConfig::terrible_poem();
    config.load_policy = LoadPolicy::Lazy;
    config.random_seed = Some(1234);
    let session = GenerateSession::attach(config, factory.clone(), true);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(factory.creates(), 0);
    assert!(!session.state().loaded);

    session.generate("cats").unwrap().finished().await;

    let state = session.state();
    assert!(state.loaded);
    assert!(state.complete);
    assert_eq!(state.partial_text, "Roses are red, cats go meow.");
    assert_eq!(factory.creates(), 1);
    assert_eq!(factory.seeds(), vec![1234]);

    session.generate("dogs").unwrap().finished().await;
    assert_eq!(factory.creates(), 1);
}

#[tokio::test]
async fn test_lazy_load_failure_completes_and_disables() {
    let factory = Arc::new(ScriptedGeneratorFactory::failing(EngineError::AssetMissing(
        "gemma2-2b-it-cpu-int8.task".to_string(),
    )));
    let mut config = GeneratorConfig::terrible_poem();
    config.load_policy = LoadPolicy::Lazy;
    let session = GenerateSession::attach(config, factory.clone(), true);

    session.generate("cats").unwrap().finished().await;

    let state = session.state();
    assert!(state.loaded);
    assert!(state.complete);
    assert_eq!(state.partial_text, "");
    assert!(matches!(state.loading_error, Some(EngineError::AssetMissing(_))));
    assert!(matches!(session.generate("cats"), Err(SessionError::Disabled(_))));
    assert_eq!(factory.creates(), 1);
}

#[tokio::test]
async fn test_stream_without_terminal_marker_still_completes() {
    let (session, _, _) = poem_session(ScriptedGenerator::new(CAT_POEM).with_ending(Ending::Hangup));
    session.load().await.unwrap();

    session.generate("cats").unwrap().finished().await;

    let state = session.state();
    assert!(state.complete);
    assert_eq!(state.partial_text, "Roses are red, cats go meow.");
}

#[tokio::test]
async fn test_refused_generation_completes_empty() {
    let (session, _, _) = poem_session(
        ScriptedGenerator::new(CAT_POEM).with_ending(Ending::Refuse("context overflow".to_string())),
    );
    session.load().await.unwrap();

    session.generate("cats").unwrap().finished().await;

    let state = session.state();
    assert!(state.complete);
    assert_eq!(state.partial_text, "");
    assert!(state.loading_error.is_none());
}

#[tokio::test]
async fn test_reactions_accumulate() {
    let (session, _, _) = poem_session(ScriptedGenerator::new(CAT_POEM));
    session.add_reaction("👍");
    session.add_reaction("✋");
    assert_eq!(session.state().reactions, " 👍 ✋");
}

#[tokio::test]
async fn test_closed_session_refuses_work() {
    let (session, _, _) = poem_session(ScriptedGenerator::new(CAT_POEM));
    session.load().await.unwrap();
    session.close().await;

    assert_eq!(session.generate("cats").unwrap_err(), SessionError::Closed);
    assert_eq!(session.load().await.unwrap_err(), EngineError::Closed);
}
