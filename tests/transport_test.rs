//! Integration tests for the transport: scripted serial streams, timeouts,
//! end of stream and request serialization under concurrent callers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hvps::transport::{Link, StreamLink, Transport};
use hvps::{Brand, Hvps, HvpsError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

// =============================================================================
// Scripted serial streams
// =============================================================================

#[tokio::test]
async fn test_caen_get_over_scripted_stream() {
    let mock = tokio_test::io::Builder::new()
        .write(b"$BD:02,CMD:MON,PAR:BDNCH\r\n")
        .read(b"#BD:02,CMD:OK,VAL:4\r\n")
        .write(b"$BD:02,CMD:MON,CH:1,PAR:VMON\r\n")
        .read(b"#BD:02,CMD:OK,VAL:0123.4\r\n")
        .build();
    let hvps = Hvps::new(Brand::Caen, StreamLink::new(mock), Duration::from_millis(200));

    let channel = hvps.module(2).await.unwrap().channel(1).await.unwrap();
    assert_eq!(channel.measured_voltage().await.unwrap(), 123.4);
}

#[tokio::test]
async fn test_iseg_set_over_scripted_stream() {
    let mock = tokio_test::io::Builder::new()
        .write(b":READ:MODULE:CHANNELNUMBER?\r\n")
        .read(b":READ:MODULE:CHANNELNUMBER?\r\n2\r\n")
        .write(b":VOLT 1.000000E+02,(@0);*OPC?\r\n")
        .read(b":VOLT 1.000000E+02,(@0);*OPC?\r\n1\r\n")
        .build();
    let hvps = Hvps::new(Brand::Iseg, StreamLink::new(mock), Duration::from_millis(200));

    let channel = hvps.module(0).await.unwrap().channel(0).await.unwrap();
    channel.set_voltage(100.0).await.unwrap();
}

#[tokio::test]
async fn test_iseg_wrong_echo_is_invalid_response() {
    let mock = tokio_test::io::Builder::new()
        .write(b":READ:FIRMWARE:NAME?\r\n")
        .read(b":READ:FIRMWARE:RELEASE?\r\nNHR\r\n")
        .build();
    let hvps = Hvps::new(Brand::Iseg, StreamLink::new(mock), Duration::from_millis(200));

    let module = hvps.module(0).await.unwrap();
    assert!(matches!(
        module.name().await,
        Err(HvpsError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_rejected_set_surfaces_as_invalid_response() {
    let mock = tokio_test::io::Builder::new()
        .write(b"$BD:00,CMD:SET,PAR:BDCLR\r\n")
        .read(b"#BD:00,LOC:ERR\r\n")
        .build();
    let hvps = Hvps::new(Brand::Caen, StreamLink::new(mock), Duration::from_millis(200));

    let err = hvps.module(0).await.unwrap().clear_alarm().await.unwrap_err();
    assert!(matches!(err, HvpsError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_end_of_stream_is_empty_response() {
    let mock = tokio_test::io::Builder::new()
        .write(b"$BD:00,CMD:MON,PAR:BDNAME\r\n")
        .build();
    let hvps = Hvps::new(Brand::Caen, StreamLink::new(mock), Duration::from_millis(200));

    let module = hvps.module(0).await.unwrap();
    assert!(matches!(module.name().await, Err(HvpsError::EmptyResponse)));
    // the stream is gone; nothing further reaches the wire
    assert!(matches!(module.name().await, Err(HvpsError::LinkClosed)));
}

#[tokio::test(start_paused = true)]
async fn test_silent_device_times_out() {
    let (client, _device) = tokio::io::duplex(256);
    let timeout = Duration::from_millis(300);
    let hvps = Hvps::new(Brand::Caen, StreamLink::new(client), timeout);

    let module = hvps.module(0).await.unwrap();
    match module.name().await {
        Err(HvpsError::Timeout(t)) => assert_eq!(t, timeout),
        other => panic!("expected timeout, got {other:?}"),
    }
}

/// Serves a duplex device that answers every line with `reply(line)`,
/// holding back the first answer for `first_delay`.
fn spawn_slow_device<F>(device: DuplexStream, first_delay: Duration, reply: F)
where
    F: Fn(&str) -> String + Send + 'static,
{
    tokio::spawn(async move {
        let (rd, mut wr) = tokio::io::split(device);
        let mut lines = BufReader::new(rd).lines();
        let mut delay = Some(first_delay);
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(d) = delay.take() {
                tokio::time::sleep(d).await;
            }
            if wr.write_all(reply(&line).as_bytes()).await.is_err() {
                break;
            }
        }
    });
}

#[tokio::test(start_paused = true)]
async fn test_late_reply_is_not_taken_for_the_next_one() {
    let (client, device) = tokio::io::duplex(256);
    spawn_slow_device(device, Duration::from_millis(150), |line| {
        format!("{line}:ANS\r\n")
    });
    let transport = Transport::spawn(StreamLink::new(client), Duration::from_millis(100));

    let first = transport.exchange(b"Q1\r\n".to_vec(), 1).await;
    assert!(matches!(first, Err(HvpsError::Timeout(_))));

    // Q1's answer lands after its deadline and must be dropped
    let second = transport.exchange(b"Q2\r\n".to_vec(), 1).await.unwrap();
    assert_eq!(second, b"Q2:ANS\r\n");
    let third = transport.exchange(b"Q3\r\n".to_vec(), 1).await.unwrap();
    assert_eq!(third, b"Q3:ANS\r\n");
}

#[tokio::test(start_paused = true)]
async fn test_mismatched_echo_resyncs_before_next_request() {
    let (client, device) = tokio::io::duplex(1024);
    // slower than the timeout and the quiet period that follows it
    spawn_slow_device(device, Duration::from_millis(250), |line| {
        let value = match line.trim_end_matches('?') {
            ":READ:MODULE:CHANNELNUMBER" => "4",
            ":READ:FIRMWARE:NAME" => "NHR",
            ":READ:FIRMWARE:RELEASE" => "1.09",
            _ => "0",
        };
        format!("{line}\r\n{value}\r\n")
    });
    let hvps = Hvps::new(Brand::Iseg, StreamLink::new(client), Duration::from_millis(100));
    let module = hvps.module(0).await.unwrap();

    assert!(matches!(
        module.channel_count().await,
        Err(HvpsError::Timeout(_))
    ));
    // the first answer finally shows up in place of this one
    assert!(matches!(
        module.name().await,
        Err(HvpsError::InvalidResponse(_))
    ));
    assert_eq!(module.firmware_release().await.unwrap(), "1.09");
    assert_eq!(module.channel_count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_validation_error_never_writes() {
    // The scripted stream expects no traffic at all.
    let mock = tokio_test::io::Builder::new().build();
    let hvps = Hvps::new(Brand::Caen, StreamLink::new(mock), Duration::from_millis(200));

    let module = hvps.module(0).await.unwrap();
    let err = module
        .set("BDILKM", Some(hvps::Value::from("AJAR")))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

// =============================================================================
// Serialization
// =============================================================================

/// Echoes each frame back as its reply and records the order of link calls.
#[derive(Clone, Default)]
struct RecordingLink {
    events: Arc<Mutex<Vec<String>>>,
    last: Vec<u8>,
}

#[async_trait]
impl Link for RecordingLink {
    async fn write(&mut self, frame: &[u8]) -> hvps::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("W {}", String::from_utf8_lossy(frame).trim_end()));
        self.last = frame.to_vec();
        Ok(())
    }

    async fn read_line(&mut self, _timeout: Duration) -> hvps::Result<Vec<u8>> {
        // Give other tasks every chance to interleave.
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.events
            .lock()
            .unwrap()
            .push(format!("R {}", String::from_utf8_lossy(&self.last).trim_end()));
        Ok(self.last.clone())
    }

    fn is_open(&self) -> bool {
        true
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_exchanges_never_interleave() {
    let link = RecordingLink::default();
    let events = Arc::clone(&link.events);
    let transport = Arc::new(Transport::spawn(link, Duration::from_millis(100)));

    let mut tasks = Vec::new();
    for i in 0..16 {
        let transport = Arc::clone(&transport);
        tasks.push(tokio::spawn(async move {
            let frame = format!("REQ{i}\r\n").into_bytes();
            let reply = transport.exchange(frame.clone(), 2).await.unwrap();
            // two lines, both the echo of this request
            assert_eq!(reply, [frame.clone(), frame].concat());
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 16 * 3);
    for exchange in events.chunks(3) {
        let name = exchange[0].trim_start_matches("W ");
        assert_eq!(exchange[1], format!("R {name}"));
        assert_eq!(exchange[2], format!("R {name}"));
    }
}
