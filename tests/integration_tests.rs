//! Integration Tests
//!
//! End-to-end tests for the interception pipeline on the mock platform:
//! discovery, capture, rendering, volume interception and context recovery.

use std::sync::Arc;

use approx::assert_relative_eq;
use pretty_assertions::assert_eq;

use stereofix::config::{EngineOptions, ExtensionSettings, StereoMode, VocalIsolationVariant};
use stereofix::engine::{InteractionKind, LifecycleState, ResumeOutcome, StageKind, StereoBuffer};
use stereofix::error::{AttachError, ProcessingError};
use stereofix::isolation::{MidSideModel, SpectralModel, SpectralModelSlot};
use stereofix::media::RefusalReason;
use stereofix::platform::{
    Document, ElementId, MediaElement, MockBackend, MockDocument, MockMediaElement,
};
use stereofix::PatchSession;

/// Helper: the two-channel buffer used by the reference scenarios
fn scenario_buffer() -> StereoBuffer {
    StereoBuffer::from_channels(vec![1.0, 0.0, -1.0], vec![1.0, 0.0, 1.0])
}

struct Page {
    backend: Arc<MockBackend>,
    document: Arc<MockDocument>,
}

impl Page {
    fn with_elements(ids: &[u64]) -> Self {
        let document = Arc::new(MockDocument::new());
        for &id in ids {
            document.insert(Arc::new(MockMediaElement::new(id)));
        }
        Self {
            backend: Arc::new(MockBackend::default()),
            document,
        }
    }

    fn start(&self, json: &str, slot: SpectralModelSlot) -> PatchSession {
        PatchSession::start(
            &ExtensionSettings::from_json(json).unwrap(),
            &EngineOptions::default(),
            self.backend.clone(),
            self.document.clone(),
            Arc::new(slot),
        )
        .unwrap()
    }

    fn render(&self, id: u64, input: &StereoBuffer) -> StereoBuffer {
        self.backend
            .latest_context()
            .unwrap()
            .process(ElementId(id), input)
            .unwrap()
    }
}

// === Reference Scenarios ===

#[test]
fn test_average_scenario() {
    let page = Page::with_elements(&[1]);
    let _session = page.start(r#"{ "enabled": true, "mode": "average" }"#, SpectralModelSlot::new());

    let output = page.render(1, &scenario_buffer());

    assert_eq!(output.left(), &[1.0, 0.0, 0.0]);
    assert_eq!(output.right(), &[1.0, 0.0, 0.0]);
}

#[test]
fn test_basic_isolation_scenario() {
    let page = Page::with_elements(&[1]);
    let _session = page.start(
        r#"{ "enabled": true, "musicRemoval": true, "vocalIsolationVariant": "basic" }"#,
        SpectralModelSlot::new(),
    );

    let output = page.render(1, &scenario_buffer());

    assert_eq!(output.left(), &[0.0, 0.0, -1.0]);
    assert_eq!(output.right(), &[0.0, 0.0, -1.0]);
}

#[test]
fn test_left_and_right_modes() {
    let page = Page::with_elements(&[1]);
    let _session = page.start(r#"{ "enabled": true, "mode": "left" }"#, SpectralModelSlot::new());
    let output = page.render(1, &scenario_buffer());
    assert_eq!(output.right(), &[1.0, 0.0, -1.0]);

    let page = Page::with_elements(&[1]);
    let _session = page.start(r#"{ "enabled": true, "mode": "right" }"#, SpectralModelSlot::new());
    let output = page.render(1, &scenario_buffer());
    assert_eq!(output.left(), &[1.0, 0.0, 1.0]);
}

#[test]
fn test_non_finite_input_is_silenced() {
    let page = Page::with_elements(&[1]);
    let _session = page.start(r#"{ "enabled": true }"#, SpectralModelSlot::new());

    let input = StereoBuffer::from_channels(vec![f32::NAN, 0.5], vec![f32::NEG_INFINITY, 0.5]);
    let output = page.render(1, &input);

    assert_eq!(output.left(), &[0.0, 0.5]);
}

// === Vocal Isolation Fallback ===

/// Model that always fails
struct BrokenModel;

impl SpectralModel for BrokenModel {
    fn name(&self) -> &str {
        "broken"
    }

    fn isolate(&self, _: &[f32], _: &[f32], _: &mut [f32]) -> Result<(), ProcessingError> {
        Err(ProcessingError::SpectralRuntimeFault {
            reason: "inference failed".to_string(),
        })
    }
}

#[test]
fn test_spectral_unavailable_uses_enhanced() {
    let page = Page::with_elements(&[1]);
    let session = page.start(
        r#"{ "enabled": true, "musicRemoval": true, "vocalIsolationVariant": "spectral" }"#,
        SpectralModelSlot::unavailable("model failed to load"),
    );

    let context = page.backend.latest_context().unwrap();
    assert_eq!(
        context.topology_of(ElementId(1)).unwrap(),
        vec![
            StageKind::Isolation,
            StageKind::HighPass,
            StageKind::Compressor,
            StageKind::StereoMix,
            StageKind::Gain,
        ]
    );
    assert_eq!(session.registry().unwrap().len(), 1);
}

#[test]
fn test_spectral_runtime_fault_falls_back_per_buffer() {
    let page = Page::with_elements(&[1]);
    let _session = page.start(
        r#"{ "enabled": true, "musicRemoval": true, "vocalIsolationVariant": "spectral" }"#,
        SpectralModelSlot::ready(Arc::new(BrokenModel)),
    );

    // Every buffer faults; each one is rendered with basic isolation instead
    let input = StereoBuffer::from_channels(vec![0.01; 64], vec![0.0; 64]);
    let output = page.render(1, &input);

    assert!(output.left().iter().all(|s| s.is_finite()));
    assert!(output.peak() > 0.0);
    assert_eq!(output.left(), output.right());
}

#[test]
fn test_spectral_model_runs_when_available() {
    let page = Page::with_elements(&[1]);
    let session = page.start(
        r#"{ "enabled": true, "musicRemoval": true, "vocalIsolationVariant": "spectral" }"#,
        SpectralModelSlot::ready(Arc::new(MidSideModel)),
    );

    let graph = page.backend.latest_context().unwrap();
    assert_eq!(graph.topology_of(ElementId(1)).unwrap().len(), 5);
    assert_eq!(
        session.configuration().unwrap().vocal_isolation_variant,
        VocalIsolationVariant::Spectral
    );
}

// === Attachment ===

#[test]
fn test_attach_idempotence() {
    let page = Page::with_elements(&[1, 2]);
    let session = page.start(r#"{ "enabled": true }"#, SpectralModelSlot::new());
    let registry = session.registry().unwrap();

    let first = session.scan_now();
    assert_eq!(first.attached, 0);
    assert_eq!(registry.len(), 2);

    let element: Arc<dyn MediaElement> = page.document.media_elements()[0].clone();
    let err = registry
        .attach(&element, session.configuration().unwrap())
        .unwrap_err();
    assert!(matches!(err, AttachError::AlreadyBound(status) if status.patched));
    assert_eq!(page.backend.contexts_created(), 1);
}

#[test]
fn test_volume_round_trip_through_session() {
    let page = Page::with_elements(&[]);
    let element = Arc::new(MockMediaElement::new(7));
    page.document.insert(element.clone());
    let session = page.start(r#"{ "enabled": true }"#, SpectralModelSlot::new());
    let gain = session.registry().unwrap().gain(ElementId(7)).unwrap();

    element.set_volume(0.4);
    assert_relative_eq!(element.volume(), 0.4);
    assert_relative_eq!(gain.get(), 0.4);

    let output = page.render(7, &StereoBuffer::from_channels(vec![1.0], vec![1.0]));
    assert_relative_eq!(output.left()[0], 0.4);
}

#[test]
fn test_muted_element_attaches_after_unmute() {
    let page = Page::with_elements(&[]);
    let element = Arc::new(MockMediaElement::new(3));
    element.set_muted(true);
    page.document.insert(element.clone());

    let session = page.start(r#"{ "enabled": true }"#, SpectralModelSlot::new());
    assert_eq!(session.initial_scan().skipped, 1);
    assert!(element.has_native_accessor());

    element.set_muted(false);
    assert_eq!(session.scan_now().attached, 1);
    assert!(!element.has_native_accessor());
}

#[test]
fn test_captured_element_is_not_retried() {
    let page = Page::with_elements(&[1]);
    page.backend.capture_elsewhere(ElementId(1));

    let session = page.start(r#"{ "enabled": true }"#, SpectralModelSlot::new());
    assert_eq!(session.initial_scan().refused, 1);

    let report = session.scan_now();
    assert_eq!(report.candidates, 0);
    assert!(session.registry().unwrap().is_empty());
}

#[test]
fn test_removed_element_is_pruned() {
    let page = Page::with_elements(&[]);
    let element = Arc::new(MockMediaElement::new(5));
    page.document.insert(element.clone());
    let session = page.start(r#"{ "enabled": true }"#, SpectralModelSlot::new());

    page.document.remove(ElementId(5));
    assert_eq!(session.prune(), 1);
    assert!(element.has_native_accessor());
}

// === Lifecycle ===

#[test]
fn test_autoplay_suspension_resumes_on_gesture() {
    let page = Page::with_elements(&[1]);
    page.backend.set_start_suspended(true);
    page.backend.fail_next_resumes(1);
    let session = page.start(r#"{ "enabled": true }"#, SpectralModelSlot::new());
    let context = page.backend.latest_context().unwrap();

    // Suspended: nothing renders yet
    let mut left = vec![1.0];
    let mut right = vec![0.0];
    assert!(!context.render(ElementId(1), &mut left, &mut right));

    assert_eq!(
        session.on_user_interaction(InteractionKind::Scroll),
        ResumeOutcome::Ignored
    );
    assert!(matches!(
        session.on_user_interaction(InteractionKind::PointerDown),
        ResumeOutcome::Failed(_)
    ));
    assert_eq!(
        session.on_user_interaction(InteractionKind::KeyDown),
        ResumeOutcome::Resumed
    );
    assert_eq!(
        session.on_user_interaction(InteractionKind::KeyDown),
        ResumeOutcome::Ignored
    );

    assert!(context.render(ElementId(1), &mut left, &mut right));
    assert_eq!(left, vec![0.5]);
}

#[test]
fn test_closed_context_is_recreated_for_new_bindings() {
    let page = Page::with_elements(&[1]);
    let session = page.start(r#"{ "enabled": true }"#, SpectralModelSlot::new());
    let lifecycle = session.lifecycle().unwrap().clone();

    lifecycle.close();
    assert_eq!(lifecycle.state(), LifecycleState::Closed);
    assert_eq!(session.prune(), 1);

    page.document.insert(Arc::new(MockMediaElement::new(2)));
    let report = session.scan_now();

    assert_eq!(report.candidates, 1);
    assert_eq!(report.attached, 1);
    assert_eq!(page.backend.contexts_created(), 2);
    assert_eq!(lifecycle.state(), LifecycleState::Active);
    let registry = session.registry().unwrap();
    let status = registry.status(ElementId(2)).unwrap();
    assert_eq!(status.context_generation, 2);

    // The first element's capture died with the old context
    assert!(!registry.is_bound(ElementId(1)));
    assert_eq!(
        registry.refusal(ElementId(1)),
        Some(RefusalReason::HeldByClosedContext)
    );
    let first: Arc<dyn MediaElement> = page.document.media_elements()[0].clone();
    assert_eq!(first.id(), ElementId(1));
    assert_eq!(
        registry.attach(&first, session.configuration().unwrap()),
        Err(AttachError::HeldByClosedContext { element: ElementId(1) })
    );
}

#[test]
fn test_spectral_choice_holds_after_late_model_load() {
    let page = Page::with_elements(&[1]);
    let slot = Arc::new(SpectralModelSlot::new());
    let session = PatchSession::start(
        &ExtensionSettings::from_json(
            r#"{ "enabled": true, "musicRemoval": true, "vocalIsolationVariant": "spectral" }"#,
        )
        .unwrap(),
        &EngineOptions::default(),
        page.backend.clone(),
        page.document.clone(),
        slot.clone(),
    )
    .unwrap();

    // The model finishes loading after the first element was bound
    assert!(slot.resolve(Ok(Arc::new(MidSideModel))));
    page.document.insert(Arc::new(MockMediaElement::new(2)));
    assert_eq!(session.scan_now().attached, 1);

    let input = StereoBuffer::from_channels(vec![0.6; 256], vec![0.4; 256]);
    let first = page.render(1, &input);
    let second = page.render(2, &input);
    assert_eq!(first, second);
}

#[test]
fn test_mixed_mode_page() {
    let page = Page::with_elements(&[1, 2, 3]);
    let session = page.start(
        r#"{ "enabled": true, "mode": "left", "musicRemoval": true }"#,
        SpectralModelSlot::new(),
    );

    assert_eq!(session.configuration().unwrap().mode, StereoMode::Left);
    assert_eq!(
        session.registry().unwrap().bound_elements(),
        vec![ElementId(1), ElementId(2), ElementId(3)]
    );
}
