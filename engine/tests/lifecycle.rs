mod common;

use common::{Event, Recorder, adapter, as_callback};
use elkpi_engine::{AudioIODevice, ChannelMask, DeviceError, DeviceState, XRUNS_UNKNOWN};
use std::time::Duration;

fn open_default(device: &mut elkpi_engine::DeviceAdapter) {
    device
        .open(ChannelMask::first(2), ChannelMask::first(2), 48_000.0, 512)
        .expect("open");
}

#[test]
fn follows_closed_open_running_open_closed() {
    let (mut device, mock) = adapter(2, 2);
    assert_eq!(device.state(), DeviceState::Closed);
    assert!(!device.is_open());

    open_default(&mut device);
    assert_eq!(device.state(), DeviceState::Open);
    assert!(device.is_open());

    device.start(None).unwrap();
    assert_eq!(device.state(), DeviceState::Running);
    assert!(mock.is_running());

    device.stop().unwrap();
    assert_eq!(device.state(), DeviceState::Open);
    assert!(!mock.is_running());

    device.close().unwrap();
    assert_eq!(device.state(), DeviceState::Closed);
    assert_eq!(mock.calls(), ["init", "open", "start", "stop", "close"]);
}

#[test]
fn start_requires_an_open_device() {
    let (mut device, mock) = adapter(2, 2);
    assert_eq!(device.start(None), Err(DeviceError::NotOpen));
    assert_eq!(device.state(), DeviceState::Closed);
    assert_eq!(mock.calls(), ["init"]);
}

#[test]
fn start_while_running_fails_without_touching_state() {
    let (mut device, mock) = adapter(2, 2);
    open_default(&mut device);
    let recorder = Recorder::new(0.5);
    device.start(Some(&as_callback(&recorder))).unwrap();

    let other = Recorder::new(0.1);
    assert_eq!(
        device.start(Some(&as_callback(&other))),
        Err(DeviceError::AlreadyRunning)
    );
    assert_eq!(device.state(), DeviceState::Running);
    assert!(other.events().is_empty());

    mock.deliver().unwrap();
    assert_eq!(recorder.io_count(), 1);
    assert_eq!(other.io_count(), 0);
}

#[test]
fn stop_requires_a_running_device() {
    let (mut device, _mock) = adapter(2, 2);
    assert_eq!(device.stop(), Err(DeviceError::NotRunning));
    open_default(&mut device);
    assert_eq!(device.stop(), Err(DeviceError::NotRunning));
    assert_eq!(device.state(), DeviceState::Open);
}

#[test]
fn close_is_idempotent_and_stops_a_running_device() {
    let (mut device, mock) = adapter(2, 2);
    open_default(&mut device);
    let recorder = Recorder::new(0.5);
    device.start(Some(&as_callback(&recorder))).unwrap();

    device.close().unwrap();
    device.close().unwrap();
    assert_eq!(device.state(), DeviceState::Closed);
    assert!(!device.is_playing());
    assert_eq!(recorder.events(), [Event::AboutToStart { block_size: 512 }, Event::Stopped]);
    assert_eq!(
        mock.calls(),
        ["init", "open", "start", "stop", "close"],
        "second close must not reach the transport"
    );
}

#[test]
fn open_failure_stays_closed_and_keeps_the_transport_message() {
    let (mut device, mock) = adapter(2, 2);
    mock.fail_open(true);
    let err = device
        .open(ChannelMask::first(2), ChannelMask::first(2), 48_000.0, 512)
        .unwrap_err();

    assert!(matches!(&err, DeviceError::Open(msg) if msg.contains("Device or resource busy")));
    assert_eq!(device.state(), DeviceState::Closed);
    assert!(device.last_error().contains("Device or resource busy"));
    assert!(device.input_channel_names().is_empty());
    assert_eq!(device.xrun_count(), XRUNS_UNKNOWN);

    mock.fail_open(false);
    open_default(&mut device);
    assert_eq!(device.last_error(), "");
}

#[test]
fn open_failure_is_reported_to_a_registered_callback() {
    let (mut device, mock) = adapter(2, 2);
    let recorder = Recorder::new(0.5);
    device.set_callback(Some(&as_callback(&recorder)));
    mock.fail_open(true);

    assert!(device.open(ChannelMask::EMPTY, ChannelMask::EMPTY, 0.0, 0).is_err());
    assert!(matches!(&recorder.events()[..], [Event::Error(msg)] if msg.contains("open")));
}

#[test]
fn start_failure_stays_open_and_notifies_the_callback() {
    let (mut device, mock) = adapter(2, 2);
    open_default(&mut device);
    mock.fail_start(true);

    let recorder = Recorder::new(0.5);
    let err = device.start(Some(&as_callback(&recorder))).unwrap_err();
    assert!(matches!(err, DeviceError::Start(_)));
    assert_eq!(device.state(), DeviceState::Open);
    assert!(!device.is_playing());
    assert!(device.last_error().contains("Operation not permitted"));
    assert!(matches!(&recorder.events()[..], [Event::Error(msg)] if msg.contains("start")));

    mock.fail_start(false);
    device.start(Some(&as_callback(&recorder))).unwrap();
    assert_eq!(device.state(), DeviceState::Running);
}

#[test]
fn start_failure_keeps_a_previously_registered_callback() {
    let (mut device, mock) = adapter(2, 2);
    open_default(&mut device);
    let recorder = Recorder::new(0.5);
    device.set_callback(Some(&as_callback(&recorder)));
    mock.fail_start(true);

    assert!(device.start(None).is_err());
    assert!(device.is_playing());
}

#[test]
fn close_failure_still_reaches_closed() {
    let (mut device, mock) = adapter(2, 2);
    open_default(&mut device);
    device.start(None).unwrap();
    mock.fail_close(true);

    let err = device.close().unwrap_err();
    assert!(matches!(err, DeviceError::TransportClose(_)));
    assert_eq!(device.state(), DeviceState::Closed);
    assert!(!device.is_open());
    assert!(device.last_error().contains("Input/output error"));
    assert_eq!(device.xrun_count(), XRUNS_UNKNOWN);
}

#[test]
fn reopen_resizes_channel_lists() {
    let (mut device, mock) = adapter(2, 2);
    open_default(&mut device);
    assert_eq!(device.input_channel_names(), ["In #1", "In #2"]);
    assert_eq!(device.output_channel_names(), ["Out #1", "Out #2"]);

    device.close().unwrap();
    mock.set_channels(0, 4);
    open_default(&mut device);
    assert!(device.input_channel_names().is_empty());
    assert_eq!(device.output_channel_names(), ["Out #1", "Out #2", "Out #3", "Out #4"]);

    let recorder = Recorder::new(1.0);
    device.start(Some(&as_callback(&recorder))).unwrap();
    let output = mock.deliver().unwrap();
    assert_eq!(output.len(), 4 * 512);
    assert!(output.iter().all(|&s| s == 1.0));
    assert_eq!(
        recorder.events().last(),
        Some(&Event::Io { inputs: 0, outputs: 4, samples: 512 })
    );
}

#[test]
fn reopen_without_close_resizes_too() {
    let (mut device, mock) = adapter(2, 2);
    open_default(&mut device);
    mock.set_channels(1, 1);
    open_default(&mut device);
    assert_eq!(device.input_channel_names(), ["In #1"]);
    assert_eq!(device.output_channel_names(), ["Out #1"]);
    assert_eq!(mock.calls(), ["init", "open", "close", "open"]);
}

#[test]
fn xrun_counter_is_unknown_outside_open() {
    let (mut device, mock) = adapter(0, 2);
    assert_eq!(device.xrun_count(), -1);

    open_default(&mut device);
    assert_eq!(device.xrun_count(), 0);
    device.start(None).unwrap();

    let mut last = device.xrun_count();
    for _ in 0..3 {
        mock.deliver().unwrap();
        // Nearly four periods of 512 frames at 48 kHz.
        std::thread::sleep(Duration::from_millis(40));
        let now = device.report_xruns();
        assert!(now >= last);
        last = now;
    }
    assert!(device.xrun_count() >= 2);

    device.close().unwrap();
    assert_eq!(device.xrun_count(), -1);
}

#[test]
fn fixed_capabilities() {
    let (mut device, _mock) = adapter(2, 2);
    open_default(&mut device);
    assert_eq!(device.default_buffer_size(), 512);
    assert_eq!(device.available_buffer_sizes(), [512]);
    assert_eq!(device.current_buffer_size_samples(), 512);
    assert_eq!(device.current_sample_rate(), 48_000.0);
    assert_eq!(device.available_sample_rates(), [48_000.0]);
    assert_eq!(device.current_bit_depth(), 32);
    assert_eq!(device.active_input_channels(), ChannelMask::EMPTY);
    assert_eq!(device.active_output_channels(), ChannelMask::EMPTY);
    assert_eq!(device.input_latency_samples(), 512);
    assert_eq!(device.output_latency_samples(), 512);
    assert!(!device.has_control_panel());
    assert!(!device.set_audio_preprocessing_enabled(true));
}

#[test]
fn unknown_sample_rate_disables_xrun_counting() {
    let (mut device, mock) = adapter(0, 1);
    mock.set_sample_rate(0.0);
    open_default(&mut device);
    assert_eq!(device.current_sample_rate(), 0.0);
    assert!(device.available_sample_rates().is_empty());
    device.start(None).unwrap();

    mock.deliver().unwrap();
    std::thread::sleep(Duration::from_millis(40));
    mock.deliver().unwrap();
    assert_eq!(device.report_xruns(), 0);
}
