use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use vela_engine::buffer::{AudioBuffer, BufferConfig, ChannelLayout};
use vela_engine::facade::Engine;
use vela_playlist::TrackKind;

fn scene_48_tracks(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine");
    group.measurement_time(Duration::from_secs(15));
    group.sample_size(20);

    group.bench_function("48_tracks_96k_block64", |b| {
        let config = BufferConfig::new(96_000.0, 64, ChannelLayout::Stereo);
        let mut engine = Engine::new(config.clone());

        for i in 0..48 {
            engine
                .apply(vela_engine::commands::Command::AddTrack {
                    kind: TrackKind::Audio,
                    name: Some(format!("track-{i}")),
                })
                .expect("add track");
        }
        engine
            .apply(vela_engine::commands::Command::Play { start_offset: Some(0.0) })
            .expect("play");

        let mut buffer = AudioBuffer::from_config(&config);
        b.iter(|| {
            engine.process_block(&mut buffer);
        });
    });

    group.finish();
}

criterion_group!(benches, scene_48_tracks);
criterion_main!(benches);
