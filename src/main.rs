//! Record a synthetic animated scene.
//!
//! Usage: `scene-recorder [options.json] [seconds]`

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use scene_recorder::recorder::{MediaWriter, RecordingEvent};
use scene_recorder::{
    AntialiasingMode, FrameStreamWriter, RasterImage, RecordingOptions, Resolution,
    SceneRecorder, TickMode,
};

/// Horizontal gradient that scrolls one width per second
fn gradient(at_time: f64, size: Resolution, _aa: AntialiasingMode) -> anyhow::Result<RasterImage> {
    let width = size.width.max(1) as f64;
    let offset = at_time.fract() * width;
    let mut data = Vec::with_capacity(size.area() * 4);
    for y in 0..size.height {
        for x in 0..size.width {
            let t = ((x as f64 + offset) % width) / width;
            let v = (y as f64 / size.height.max(1) as f64 * 255.0) as u8;
            data.extend_from_slice(&[(t * 255.0) as u8, v, 255 - (t * 255.0) as u8, 255]);
        }
    }
    Ok(RasterImage::new(size.width, size.height, data))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    scene_recorder::init_tracing();

    let mut args = std::env::args().skip(1);
    let options = match args.next() {
        Some(path) => RecordingOptions::load(Path::new(&path))?,
        None => RecordingOptions::default(),
    };
    let seconds: f64 = match args.next() {
        Some(s) => s.parse()?,
        None => 3.0,
    };

    tracing::info!("Scene Recorder v{}", env!("CARGO_PKG_VERSION"));

    let recorder = SceneRecorder::builder(options)
        .renderer(Arc::new(gradient))
        .writer_factory(Arc::new(|| {
            Arc::new(FrameStreamWriter::new()) as Arc<dyn MediaWriter>
        }))
        .tick_mode(TickMode::Display {
            refresh_hz: Some(60),
        })
        .build()?;

    let mut events = recorder.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                RecordingEvent::Started { session_id } => {
                    tracing::info!("Session {} started", session_id)
                }
                RecordingEvent::Finished(summary) => tracing::info!(
                    "Session {} wrote {} frames ({} dropped)",
                    summary.session_id,
                    summary.frames.appended,
                    summary.frames.dropped()
                ),
                RecordingEvent::Error { code, message } => {
                    tracing::error!("{}: {}", code, message)
                }
            }
        }
    });

    recorder.start_writing().await?;
    tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))).await;
    let path = recorder.finish_writing().await?;

    println!("{}", path.display());
    Ok(())
}
