//! Integration tests for PumpCodec over Tokio streams.

mod common;

use futures::{SinkExt, StreamExt};
use pumplink_core::{CrcOrder, PumpAddress, PumpState};
use pumplink_protocol::{
    CommandBuilder, Frame, FrameShape, PumpCodec, PumpCommand, Record, StatusOrigin, decode,
};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::codec::{Framed, FramedRead};

fn create_framed_duplex(
    buffer_size: usize,
) -> (Framed<DuplexStream, PumpCodec>, Framed<DuplexStream, PumpCodec>) {
    let (controller, pump) = tokio::io::duplex(buffer_size);
    (
        Framed::new(controller, PumpCodec::new()),
        Framed::new(pump, PumpCodec::new()),
    )
}

#[tokio::test]
async fn test_command_reaches_pump_side() {
    let (mut controller, mut pump) = create_framed_duplex(256);
    let builder = CommandBuilder::new(PumpAddress::default());

    controller
        .send(builder.command(PumpCommand::Authorize))
        .await
        .unwrap();

    let raw = pump.next().await.unwrap().unwrap();
    assert_eq!(raw.shape(), FrameShape::Long);
    let Frame::Long(frame) = Frame::from_raw(raw, CrcOrder::LoHi).unwrap() else {
        panic!("expected a long frame");
    };
    assert!(frame.crc_ok());
    assert_eq!(frame.payload(), &[PumpCommand::Authorize.as_u8()]);
}

#[tokio::test]
async fn test_poll_and_reply_exchange() {
    let (mut controller, mut pump) = create_framed_duplex(256);
    let builder = CommandBuilder::new(PumpAddress::default());

    controller.send(builder.min_poll()).await.unwrap();
    let poll = pump.next().await.unwrap().unwrap();
    assert_eq!(poll.as_bytes(), &[0x50, 0x20, 0xFA]);

    // pump answers with a status reply written straight to the wire
    pump.get_mut()
        .write_all(&common::status_reply(0x04))
        .await
        .unwrap();

    let raw = controller.next().await.unwrap().unwrap();
    let decoded = decode(&Frame::from_raw(raw, CrcOrder::LoHi).unwrap());
    assert_eq!(
        decoded.records,
        vec![Record::Status {
            state: PumpState::Filling,
            origin: StatusOrigin::StatusReply
        }]
    );
}

#[tokio::test]
async fn test_frames_split_across_writes() {
    let (mut writer, reader) = tokio::io::duplex(64);
    let mut frames = FramedRead::new(reader, PumpCodec::new());

    let mut stream = vec![0x50, 0x70, 0xFA];
    stream.extend(common::sim_volume(8000, 4000));
    stream.extend(common::composite(0x38, &[(0x01, &[0x10, 0x00])]));

    let task = tokio::spawn(async move {
        for chunk in stream.chunks(5) {
            writer.write_all(chunk).await.unwrap();
            tokio::task::yield_now().await;
        }
    });

    let mut shapes = Vec::new();
    for _ in 0..3 {
        shapes.push(frames.next().await.unwrap().unwrap().shape());
    }
    task.await.unwrap();

    assert_eq!(
        shapes,
        vec![FrameShape::Short, FrameShape::Long, FrameShape::Long]
    );
}

#[tokio::test]
async fn test_stream_ends_when_writer_closes() {
    let (writer, reader) = tokio::io::duplex(64);
    let mut frames = FramedRead::new(reader, PumpCodec::new());
    drop(writer);
    assert!(frames.next().await.is_none());
}
