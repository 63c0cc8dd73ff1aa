//! Session lifecycle and per-frame pipeline tests


use std::time::{Duration, Instant};
use test_helpers::{
    level_face, overlay_png, video_frame, CameraBehavior, FailingSettings, HarnessBuilder, FRAME_HEIGHT, FRAME_WIDTH,
};
use tryon_overlay::{
    config::Config,
    constants::{landmark, DEFAULT_ERROR_MESSAGE, DEFAULT_INSTRUCTIONS, DEFAULT_NO_FACE_PROMPT, DEFAULT_RETRY_TEXT},
    error::AcquisitionError,
    guidance::GuidanceStyle,
    landmarks::LandmarkSet,
    session::{FrameOutcome, FrameSize, SessionState},
    settings::{AppearanceSettings, SettingsCatalog, TargetSettings},
    Error,
};

fn two_target_catalog() -> SettingsCatalog {
    let mut catalog = SettingsCatalog::new();
    catalog.insert(
        "aviator",
        TargetSettings {
            name: "Aviator".to_string(),
            overlay_source: "aviator.png".to_string(),
            appearance: None,
        },
    );
    let mut round = AppearanceSettings::default();
    round.offset_y = 12.0;
    round.size_scale = 1.1;
    catalog.insert(
        "round",
        TargetSettings {
            name: "Round".to_string(),
            overlay_source: "round.png".to_string(),
            appearance: Some(round),
        },
    );
    catalog
}

#[tokio::test]
async fn test_open_activates_session() {
    let mut harness = HarnessBuilder::new().build();
    assert_eq!(harness.session.state(), &SessionState::Idle);

    harness.session.open("aviator").await.unwrap();

    assert_eq!(harness.session.state(), &SessionState::Active);
    assert_eq!(harness.session.target_name(), Some("Aviator"));
    assert_eq!(
        harness.session.frame_size(),
        Some(FrameSize {
            width: FRAME_WIDTH,
            height: FRAME_HEIGHT
        })
    );
    let surface = harness.session.surface().unwrap();
    assert_eq!((surface.width(), surface.height()), (FRAME_WIDTH, FRAME_HEIGHT));
    assert!(harness.session.asset_warning().is_none());

    let events = harness.probe.events();
    assert!(events.contains(&"camera.start"));
    assert!(events.contains(&"detector.load"));
}

#[tokio::test]
async fn test_face_frame_renders_overlay() {
    let mut harness = HarnessBuilder::new().build();
    harness.session.open("aviator").await.unwrap();

    let outcome = harness
        .session
        .on_results(&video_frame(128), &[level_face(0.5)], Instant::now())
        .unwrap();

    let FrameOutcome::Rendered(layers) = outcome else {
        panic!("expected a rendered frame, got {outcome:?}");
    };
    assert!(layers.overlay && layers.shadow && layers.reflections);

    // Eyes 128 px apart: overlay drawn 299.5 px wide centered at (318, 245.6)
    let surface = harness.session.surface().unwrap();
    assert_eq!(surface.pixel(318, 230).unwrap().alpha(), 255);
    assert_eq!(surface.pixel(20, 20).unwrap().alpha(), 0);

    let view = harness.session.guidance();
    assert_eq!(view.style, GuidanceStyle::Neutral);
    assert_eq!(view.text, DEFAULT_INSTRUCTIONS[0]);
}

#[tokio::test]
async fn test_empty_cycles_keep_placement() {
    let mut harness = HarnessBuilder::new().build();
    harness.session.open("aviator").await.unwrap();

    let frame = video_frame(128);
    let now = Instant::now();
    harness.session.on_results(&frame, &[level_face(0.5)], now).unwrap();
    let placement = harness.session.smoothed().placement().unwrap();

    for _ in 0..5 {
        let outcome = harness.session.on_results(&frame, &[], now).unwrap();
        assert_eq!(outcome, FrameOutcome::NoFace);
    }

    assert_eq!(harness.session.smoothed().placement(), Some(placement));
    assert!(!harness.session.smoothed().in_frame());
    assert_eq!(harness.session.state(), &SessionState::Active);

    let view = harness.session.guidance();
    assert_eq!(view.style, GuidanceStyle::Warning);
    assert_eq!(view.text, DEFAULT_NO_FACE_PROMPT);

    // Surface is cleared while no face is tracked
    let surface = harness.session.surface().unwrap();
    assert!(surface.pixels().iter().all(|p| p.alpha() == 0));
}

#[tokio::test]
async fn test_target_switch_seeds_instead_of_blending() {
    let mut harness = HarnessBuilder::new()
        .settings(two_target_catalog())
        .asset("round.png", overlay_png(80, 80))
        .build();
    harness.session.open("aviator").await.unwrap();

    let frame = video_frame(128);
    let now = Instant::now();
    harness.session.on_results(&frame, &[level_face(0.3)], now).unwrap();
    harness.session.on_results(&frame, &[level_face(0.3)], now).unwrap();

    harness.session.open("round").await.unwrap();
    assert_eq!(harness.session.target_name(), Some("Round"));
    assert_eq!(harness.session.appearance().offset_y, 12.0);
    assert!(harness.session.smoothed().placement().is_none());

    harness.session.on_results(&frame, &[level_face(0.7)], now).unwrap();
    let placement = harness.session.smoothed().placement().unwrap();
    assert!((placement.x - 0.7 * f64::from(FRAME_WIDTH)).abs() < 1e-9);
    // Square overlay: height follows the new aspect ratio
    assert!((placement.height - placement.width).abs() < 1e-9);

    // The camera is not restarted for a switch
    assert_eq!(harness.probe.count("camera.start"), 1);
}

#[tokio::test]
async fn test_consecutive_faces_are_blended() {
    let mut harness = HarnessBuilder::new().build();
    harness.session.open("aviator").await.unwrap();

    let frame = video_frame(128);
    let now = Instant::now();
    harness.session.on_results(&frame, &[level_face(0.25)], now).unwrap();
    harness.session.on_results(&frame, &[level_face(0.5)], now).unwrap();

    // 0.6 * 160 + 0.4 * 320
    let placement = harness.session.smoothed().placement().unwrap();
    assert!((placement.x - 224.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_permission_denied_enters_error_with_retry() {
    let mut harness = HarnessBuilder::new()
        .camera(CameraBehavior::Fail(AcquisitionError::PermissionDenied))
        .build();

    let result = harness.session.open("aviator").await;
    assert!(matches!(
        result,
        Err(Error::Acquisition(AcquisitionError::PermissionDenied))
    ));
    assert!(matches!(harness.session.state(), SessionState::Error(_)));

    let view = harness.session.error_view().unwrap();
    assert_eq!(view.message, DEFAULT_ERROR_MESSAGE);
    assert_eq!(view.retry_text, DEFAULT_RETRY_TEXT);
    assert!(view.detail.contains("permission denied"));

    // Detector came up but is released again
    assert_eq!(harness.probe.count("detector.stop"), 1);

    // Frames are ignored while in error
    let outcome = harness
        .session
        .on_results(&video_frame(128), &[level_face(0.5)], Instant::now())
        .unwrap();
    assert_eq!(outcome, FrameOutcome::Ignored);

    *harness.camera.lock().unwrap() = CameraBehavior::Deliver(FrameSize {
        width: FRAME_WIDTH,
        height: FRAME_HEIGHT,
    });
    harness.session.retry().await.unwrap();
    assert_eq!(harness.session.state(), &SessionState::Active);
    assert!(harness.session.error_view().is_none());
}

#[tokio::test]
async fn test_camera_timeout() {
    let mut config = Config::default();
    config.camera.acquisition_timeout_ms = 50;
    let mut harness = HarnessBuilder::new().config(config).camera(CameraBehavior::Hang).build();

    let started = Instant::now();
    let result = harness.session.open("aviator").await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(
        result,
        Err(Error::Acquisition(AcquisitionError::Timeout(d))) if d == Duration::from_millis(50)
    ));
    assert!(harness.session.error_view().is_some());
}

#[tokio::test]
async fn test_detector_failure_releases_camera() {
    let mut harness = HarnessBuilder::new()
        .detector_error(AcquisitionError::DetectorLoad("model missing".to_string()))
        .build();

    let result = harness.session.open("aviator").await;
    assert!(matches!(result, Err(Error::Acquisition(AcquisitionError::DetectorLoad(_)))));
    assert_eq!(harness.probe.count("camera.stop"), 1);
    assert!(matches!(harness.session.state(), SessionState::Error(_)));
}

#[tokio::test]
async fn test_retry_requires_error_state() {
    let mut harness = HarnessBuilder::new().build();
    assert!(matches!(harness.session.retry().await, Err(Error::InvalidState(_))));

    harness.session.open("aviator").await.unwrap();
    assert!(matches!(harness.session.retry().await, Err(Error::InvalidState(_))));
}

#[tokio::test]
async fn test_settings_failure_falls_back_to_defaults() {
    let mut config = Config::default();
    config.appearance.offset_x = 7.0;
    let mut harness = HarnessBuilder::new().config(config).settings(FailingSettings).build();

    harness.session.open("aviator").await.unwrap();

    assert_eq!(harness.session.state(), &SessionState::Active);
    assert_eq!(harness.session.appearance().offset_x, 7.0);
    assert!(harness.session.asset_warning().is_some());
}

#[tokio::test]
async fn test_missing_overlay_warns_and_keeps_running() {
    let mut catalog = SettingsCatalog::new();
    catalog.insert(
        "cat-eye",
        TargetSettings {
            name: "Cat Eye".to_string(),
            overlay_source: "cat-eye.png".to_string(),
            appearance: None,
        },
    );
    let mut harness = HarnessBuilder::new().settings(catalog).build();
    harness.session.open("cat-eye").await.unwrap();

    let warning = harness.session.asset_warning().unwrap();
    assert!(warning.contains("cat-eye.png"));

    let outcome = harness
        .session
        .on_results(&video_frame(128), &[level_face(0.5)], Instant::now())
        .unwrap();
    let FrameOutcome::Rendered(layers) = outcome else {
        panic!("expected a rendered frame, got {outcome:?}");
    };
    assert!(!layers.any());

    // Placement still tracks using the fallback aspect ratio
    let placement = harness.session.smoothed().placement().unwrap();
    assert!((placement.height / placement.width - 0.4).abs() < 1e-9);
}

#[tokio::test]
async fn test_close_ignores_frames_and_resumes() {
    let mut harness = HarnessBuilder::new().build();
    harness.session.open("aviator").await.unwrap();

    let frame = video_frame(128);
    let now = Instant::now();
    harness.session.on_results(&frame, &[level_face(0.4)], now).unwrap();
    let placement = harness.session.smoothed().placement().unwrap();

    harness.session.close().await;
    assert_eq!(harness.session.state(), &SessionState::Closed);
    assert!(harness.session.surface().is_none());

    let events = harness.probe.events();
    let camera_stop = events.iter().position(|e| *e == "camera.stop").unwrap();
    let detector_stop = events.iter().position(|e| *e == "detector.stop").unwrap();
    assert!(camera_stop < detector_stop);

    let outcome = harness.session.on_results(&frame, &[level_face(0.6)], now).unwrap();
    assert_eq!(outcome, FrameOutcome::Ignored);
    assert_eq!(harness.session.smoothed().placement(), Some(placement));

    // Reopening the same target restarts the devices and keeps the state
    harness.session.open("aviator").await.unwrap();
    assert_eq!(harness.session.state(), &SessionState::Active);
    assert_eq!(harness.probe.count("camera.start"), 2);
    assert_eq!(harness.session.smoothed().placement(), Some(placement));
    assert!(harness.session.surface().is_some());
}

#[tokio::test]
async fn test_light_sampled_on_cadence() {
    let mut harness = HarnessBuilder::new().build();
    harness.session.open("aviator").await.unwrap();

    let bright = video_frame(255);
    let now = Instant::now();
    for _ in 0..29 {
        harness.session.on_results(&bright, &[level_face(0.5)], now).unwrap();
    }
    assert_eq!(harness.session.smoothed().light_level(), 0.5);

    harness.session.on_results(&bright, &[level_face(0.5)], now).unwrap();
    assert_eq!(harness.session.face_frames(), 30);
    // 0.6 * 0.5 + 0.4 * 1.0
    assert!((harness.session.smoothed().light_level() - 0.7).abs() < 1e-9);
}

#[tokio::test]
async fn test_empty_frame_is_fatal() {
    let mut harness = HarnessBuilder::new().build();
    harness.session.open("aviator").await.unwrap();

    let result = harness
        .session
        .on_results(&image::RgbaImage::new(0, 0), &[level_face(0.5)], Instant::now());
    assert!(matches!(result, Err(Error::FrameRead(_))));
    assert!(matches!(harness.session.state(), SessionState::Error(_)));
}

#[tokio::test]
async fn test_frame_failure_releases_devices_before_retry() {
    let mut harness = HarnessBuilder::new().build();
    harness.session.open("aviator").await.unwrap();

    let result = harness
        .session
        .on_results(&image::RgbaImage::new(0, 0), &[level_face(0.5)], Instant::now());
    assert!(result.is_err());

    harness.session.retry().await.unwrap();
    assert_eq!(harness.session.state(), &SessionState::Active);
    assert_eq!(
        harness.probe.events(),
        vec![
            "camera.start",
            "detector.load",
            "camera.stop",
            "detector.stop",
            "camera.start",
            "detector.load"
        ]
    );
}

#[tokio::test]
async fn test_process_frame_failure_releases_devices() {
    let mut harness = HarnessBuilder::new().build();
    harness.session.open("aviator").await.unwrap();

    let result = harness
        .session
        .process_frame(&image::RgbaImage::new(0, 0), Instant::now())
        .await;
    assert!(matches!(result, Err(Error::FrameRead(_))));
    assert!(matches!(harness.session.state(), SessionState::Error(_)));
    assert_eq!(harness.probe.count("camera.stop"), 1);
    assert_eq!(harness.probe.count("detector.stop"), 1);

    // Already released, closing does not stop them twice
    harness.session.close().await;
    assert_eq!(harness.probe.count("camera.stop"), 1);
    assert_eq!(harness.probe.count("detector.stop"), 1);
}

#[tokio::test]
async fn test_non_finite_landmarks_are_a_detection_gap() {
    let mut harness = HarnessBuilder::new().build();
    harness.session.open("aviator").await.unwrap();

    let mut points = level_face(0.5).points().to_vec();
    points[landmark::NOSE_TIP].z = f64::INFINITY;
    let broken = LandmarkSet::new(points);

    let frame = video_frame(128);
    let now = Instant::now();
    let outcome = harness.session.on_results(&frame, &[broken], now).unwrap();
    assert_eq!(outcome, FrameOutcome::NoFace);
    assert!(harness.session.smoothed().placement().is_none());
    // Unusable sets do not advance the light cadence
    assert_eq!(harness.session.face_frames(), 0);

    let outcome = harness.session.on_results(&frame, &[level_face(0.5)], now).unwrap();
    let FrameOutcome::Rendered(layers) = outcome else {
        panic!("expected a rendered frame, got {outcome:?}");
    };
    assert!(layers.overlay);
    assert_eq!(harness.session.face_frames(), 1);
    let placement = harness.session.smoothed().placement().unwrap();
    assert!(placement.width.is_finite() && placement.width > 0.0);
}

#[tokio::test]
async fn test_guidance_rotates_while_tracking() {
    let mut harness = HarnessBuilder::new().build();
    harness.session.open("aviator").await.unwrap();

    let frame = video_frame(128);
    let start = Instant::now();
    harness.session.on_results(&frame, &[level_face(0.5)], start).unwrap();
    harness
        .session
        .on_results(&frame, &[level_face(0.5)], start + Duration::from_millis(3_100))
        .unwrap();

    assert_eq!(harness.session.guidance().text, DEFAULT_INSTRUCTIONS[1]);
}

#[tokio::test]
async fn test_process_frame_runs_detector() {
    let mut harness = HarnessBuilder::new().build();
    harness.session.open("aviator").await.unwrap();
    harness
        .detections
        .lock()
        .unwrap()
        .extend([vec![level_face(0.5)], vec![]]);

    let frame = video_frame(128);
    let now = Instant::now();
    assert!(matches!(
        harness.session.process_frame(&frame, now).await.unwrap(),
        FrameOutcome::Rendered(_)
    ));
    assert_eq!(
        harness.session.process_frame(&frame, now).await.unwrap(),
        FrameOutcome::NoFace
    );

    harness.session.close().await;
    assert_eq!(
        harness.session.process_frame(&frame, now).await.unwrap(),
        FrameOutcome::Ignored
    );
}
