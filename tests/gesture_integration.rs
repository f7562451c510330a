//! Integration tests for the live gesture reaction session.
//!
//! Frames are analyzed one request each; recognized gestures become emoji
//! and anything unrecognized leaves the last reaction on screen.

use edge_lens_lib::capture::scripted::ReleaseCounter;
use edge_lens_lib::config::{ClassifierConfig, LensConfig};
use edge_lens_lib::engine::scripted::{
    ScriptedAnswer, ScriptedClassifier, ScriptedClassifierFactory, ScriptedGenerator,
    ScriptedGeneratorFactory,
};
use edge_lens_lib::engine::ClassificationResult;
use edge_lens_lib::session::{ClassifyProfile, ClassifySession};
use edge_lens_lib::EdgeLens;
use std::sync::Arc;

fn gesture(label: &str, score: f32) -> ScriptedAnswer {
    ScriptedAnswer::ok(ClassificationResult::single([(label, score)]))
}

fn gesture_session(classifier: Arc<ScriptedClassifier>) -> ClassifySession {
    ClassifySession::attach(
        ClassifyProfile::reaction_gesture(),
        ClassifierConfig::reaction_gesture(),
        Arc::new(ScriptedClassifierFactory::new(classifier)),
        true,
    )
}

#[tokio::test]
async fn test_gestures_become_emoji_and_unknowns_keep_last() {
    let classifier = Arc::new(ScriptedClassifier::new(ClassificationResult::default()));
    classifier.push(gesture("Thumb_Up", 0.8));
    classifier.push(gesture("None", 0.9));
    classifier.push(gesture("Victory", 0.3));
    classifier.push(gesture("Open_Palm", 0.7));
    let session = gesture_session(classifier.clone());
    let frames = ReleaseCounter::new();

    session.submit(Some(frames.frame(640, 480, 0))).unwrap().unwrap().finished().await;
    assert_eq!(session.state().result.as_deref(), Some("👍"));

    // Recognizer's "None" label: nothing to show, last reaction stays.
    session.submit(Some(frames.frame(640, 480, 0))).unwrap().unwrap().finished().await;
    assert_eq!(session.state().result.as_deref(), Some("👍"));

    // Below the 0.5 floor.
    session.submit(Some(frames.frame(640, 480, 0))).unwrap().unwrap().finished().await;
    assert_eq!(session.state().result.as_deref(), Some("👍"));

    session.submit(Some(frames.frame(640, 480, 0))).unwrap().unwrap().finished().await;
    assert_eq!(session.state().result.as_deref(), Some("✋"));

    assert_eq!(classifier.calls(), 4);
    assert_eq!(frames.count(), 4);
}

#[tokio::test]
async fn test_live_frames_keep_result_while_in_flight() {
    let classifier = Arc::new(ScriptedClassifier::new(ClassificationResult::default()));
    classifier.push(gesture("Closed_Fist", 0.9));
    let session = gesture_session(classifier);
    let frames = ReleaseCounter::new();

    session.submit(Some(frames.frame(100, 100, 0))).unwrap().unwrap().finished().await;
    assert_eq!(session.state().result.as_deref(), Some("✊"));

    let ticket = session.submit(Some(frames.frame(100, 100, 0))).unwrap().unwrap();
    assert_eq!(session.state().result.as_deref(), Some("✊"));
    ticket.finished().await;
    assert_eq!(session.state().result.as_deref(), Some("✊"));
}

#[tokio::test]
async fn test_frames_scaled_to_longest_side_then_rotated() {
    let classifier = Arc::new(ScriptedClassifier::new(ClassificationResult::default()));
    let session = gesture_session(classifier.clone());
    let frames = ReleaseCounter::new();

    session.submit(Some(frames.frame(1000, 600, 0))).unwrap().unwrap().finished().await;
    assert_eq!(classifier.last_input(), Some((500, 300)));

    session.submit(Some(frames.frame(1000, 600, 90))).unwrap().unwrap().finished().await;
    assert_eq!(classifier.last_input(), Some((300, 500)));

    let preview = session.state().preview.unwrap();
    assert_eq!((preview.width(), preview.height()), (300, 500));
}

#[tokio::test]
async fn test_edge_lens_builds_screen_sessions() {
    let classifier = Arc::new(ScriptedClassifier::new(ClassificationResult::single([("Thumb_Down", 0.99)])));
    let lens = EdgeLens::new(
        LensConfig::default(),
        Arc::new(ScriptedClassifierFactory::new(classifier)),
        Arc::new(ScriptedGeneratorFactory::new(Arc::new(ScriptedGenerator::new(["ok"])))),
    );

    let gestures = lens.reaction_gesture();
    assert_eq!(gestures.profile(), ClassifyProfile::reaction_gesture());
    let frames = ReleaseCounter::new();
    gestures.submit(Some(frames.frame(50, 50, 0))).unwrap().unwrap().finished().await;
    assert_eq!(gestures.state().result.as_deref(), Some("👎"));

    let photo = lens.take_photo();
    photo.submit(Some(frames.frame(50, 50, 0))).unwrap().unwrap().finished().await;
    assert_eq!(photo.state().result.as_deref(), Some("Thumb_Down"));

    let poem = lens.terrible_poem();
    poem.load().await.unwrap();
    assert!(poem.state().loaded);
}
