use knitkit_communication::{
    request_script, spawn_session, SessionController, SimulatedDevice, SimulatedDeviceConfig,
    Transport, WorkerConfig,
};
use knitkit_core::{
    Error, KnitOptions, NeedleRange, SessionEvent, SessionState, StartPosition, TransportError,
};
use knitkit_pattern::{KnitImage, LineEncoder};
use std::time::Duration;

fn stripes() -> KnitImage {
    let pixels = (0..6u32)
        .flat_map(|y| (0..8u32).map(move |x| ((x / 2 + y) % 3) as u8))
        .collect();
    KnitImage::from_indices(8, 6, 3, pixels).unwrap()
}

fn script(cycles: u32) -> Vec<u8> {
    let image = stripes();
    let range = NeedleRange::new(20, 59)
        .unwrap()
        .placed(image.width(), Default::default())
        .unwrap();
    let encoder = LineEncoder::new(image, range).unwrap();
    request_script(&encoder, 0, cycles)
}

fn configured(device: &SimulatedDevice, options: KnitOptions) -> SessionController {
    let mut controller = SessionController::new(device.clone());
    controller
        .configure(
            stripes(),
            NeedleRange::new(20, 59).unwrap(),
            StartPosition::new(0),
            options,
        )
        .unwrap();
    controller
}

fn fast_config() -> WorkerConfig {
    WorkerConfig {
        settle_delay: Duration::from_millis(10),
        response_timeout: Duration::from_secs(2),
        ..WorkerConfig::new("sim")
    }
}

#[tokio::test]
async fn test_worker_runs_image_to_completion() {
    let script = script(1);
    assert_eq!(script.len(), 18);
    let device = SimulatedDevice::with_script(script.clone());
    let controller = configured(&device, KnitOptions::default());
    let mut events = controller.subscribe();

    let handle = spawn_session(controller, fast_config());

    let outcome = handle.join().await.unwrap();
    assert_eq!(outcome.result.unwrap(), SessionState::Finished);
    assert_eq!(outcome.controller.state(), SessionState::Finished);
    assert!(!outcome.controller.transport().is_open());
    assert_eq!(outcome.controller.device_api_version(), Some(5));

    assert_eq!(device.lines().len(), script.len());
    assert!(device.lines().last().unwrap().is_last());
    assert_eq!(outcome.controller.progress().row, 5);

    let mut saw_finished = false;
    while let Ok(event) = events.try_recv() {
        if event == SessionEvent::Finished {
            saw_finished = true;
        }
    }
    assert!(saw_finished);
}

#[tokio::test]
async fn test_worker_cancel_returns_configured_controller() {
    let config = SimulatedDeviceConfig {
        pass_delay: Duration::from_millis(20),
        ..Default::default()
    };
    let device = SimulatedDevice::new(config, script(50));
    let controller = configured(
        &device,
        KnitOptions {
            infinite_repeat: true,
            ..Default::default()
        },
    );

    let handle = spawn_session(controller, fast_config());
    for _ in 0..200 {
        if device.lines().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(handle.observer().state(), SessionState::Knitting);
    handle.cancel();

    let outcome = handle.join().await.unwrap();
    assert_eq!(outcome.result.unwrap(), SessionState::Configured);
    assert!(outcome.controller.job().is_some());
    assert!(!device.is_finished());
}

#[tokio::test]
async fn test_worker_idle_timeout_fails_session() {
    // Device requests the first line only
    let device = SimulatedDevice::with_script([0]);
    let controller = configured(&device, KnitOptions::default());

    let config = WorkerConfig {
        idle_timeout: Some(Duration::from_millis(100)),
        ..fast_config()
    };
    let handle = spawn_session(controller, config);
    let observer = handle.observer().clone();

    let outcome = handle.join().await.unwrap();
    assert!(matches!(
        outcome.result,
        Err(Error::Transport(TransportError::Timeout { timeout_ms: 100 }))
    ));
    assert_eq!(observer.state(), SessionState::Error);
    assert_eq!(device.lines().len(), 1);
}

#[tokio::test]
async fn test_worker_serves_corrupted_last_line_after_finishing() {
    let device = SimulatedDevice::with_script([0]);
    device.corrupt_next_lines(1);
    let mut controller = SessionController::new(device.clone());
    controller
        .configure(
            KnitImage::from_indices(4, 1, 2, vec![1; 4]).unwrap(),
            NeedleRange::new(20, 59).unwrap(),
            StartPosition::new(0),
            KnitOptions::default(),
        )
        .unwrap();

    let handle = spawn_session(controller, fast_config());
    let outcome = handle.join().await.unwrap();

    assert_eq!(outcome.result.unwrap(), SessionState::Finished);
    assert!(!outcome.controller.transport().is_open());
    assert_eq!(device.checksum_failures(), 1);
    assert!(device.is_finished());
    assert_eq!(device.lines().len(), 1);
}
