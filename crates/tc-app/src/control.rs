//! Thread clavier : sondage non bloquant toutes les 30 ms.

use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};

use tc_audio::AudioSink;
use tc_core::config::RenderMode;
use tc_render::AsciiRenderer;

use crate::pipeline::PipelineShared;

const POLL_INTERVAL: Duration = Duration::from_millis(30);

/// Poll stdin until shutdown, dispatching single-key bindings.
pub fn run(
    shared: &PipelineShared,
    renderer: &AsciiRenderer,
    audio: Option<&AudioSink>,
    base_volume: f32,
    stop: &dyn Fn(),
) {
    while shared.running() {
        let ready = match event::poll(POLL_INTERVAL) {
            Ok(ready) => ready,
            Err(e) => {
                log::warn!("keyboard poll error: {e}");
                thread::sleep(POLL_INTERVAL);
                continue;
            }
        };
        if !ready {
            continue;
        }
        let Ok(Event::Key(key)) = event::read() else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        handle_key(key.code, shared, renderer, audio, base_volume, stop);
    }
}

/// One key, one action. SPACE pauses and mutes, `q` requests shutdown,
/// the rest mutate the shared renderer configuration.
fn handle_key(
    code: KeyCode,
    shared: &PipelineShared,
    renderer: &AsciiRenderer,
    audio: Option<&AudioSink>,
    base_volume: f32,
    stop: &dyn Fn(),
) {
    match code {
        KeyCode::Char(' ') => {
            let paused = shared.toggle_pause();
            if let Some(sink) = audio {
                sink.set_volume(if paused { 0.0 } else { base_volume });
            }
        }
        KeyCode::Char('q' | 'Q') => stop(),
        KeyCode::Char('c' | 'C') => renderer.cycle_mode(),
        KeyCode::Char('d' | 'D') => renderer.cycle_dither(),
        KeyCode::Char('g') => renderer.adjust_gamma(-0.1),
        KeyCode::Char('G') => renderer.adjust_gamma(0.1),
        KeyCode::Char('b') => renderer.adjust_contrast(-0.1),
        KeyCode::Char('B') => renderer.adjust_contrast(0.1),
        KeyCode::Char('1') => renderer.set_mode(RenderMode::Gray),
        KeyCode::Char('2') => renderer.set_mode(RenderMode::Ansi256),
        KeyCode::Char('3') => renderer.set_mode(RenderMode::TrueColor),
        KeyCode::Char('r' | 'R') => renderer.configure(renderer.snapshot()),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tc_core::config::{DitherMode, RendererConfig};

    fn fixture() -> (PipelineShared, AsciiRenderer) {
        (
            PipelineShared::new(),
            AsciiRenderer::new(RendererConfig::default()),
        )
    }

    #[test]
    fn space_toggles_pause() {
        let (shared, renderer) = fixture();
        handle_key(KeyCode::Char(' '), &shared, &renderer, None, 1.0, &|| {});
        assert!(shared.paused());
        handle_key(KeyCode::Char(' '), &shared, &renderer, None, 1.0, &|| {});
        assert!(!shared.paused());
    }

    #[test]
    fn q_requests_stop() {
        let (shared, renderer) = fixture();
        let stopped = AtomicBool::new(false);
        handle_key(KeyCode::Char('q'), &shared, &renderer, None, 1.0, &|| {
            stopped.store(true, Ordering::Relaxed);
        });
        assert!(stopped.load(Ordering::Relaxed));
    }

    #[test]
    fn mode_keys_set_and_cycle() {
        let (shared, renderer) = fixture();
        handle_key(KeyCode::Char('3'), &shared, &renderer, None, 1.0, &|| {});
        assert_eq!(renderer.snapshot().mode, RenderMode::TrueColor);
        handle_key(KeyCode::Char('c'), &shared, &renderer, None, 1.0, &|| {});
        assert_eq!(renderer.snapshot().mode, RenderMode::Gray);
    }

    #[test]
    fn dither_cycles_back_to_start_after_three() {
        let (shared, renderer) = fixture();
        let before = renderer.snapshot().dither;
        for _ in 0..3 {
            handle_key(KeyCode::Char('d'), &shared, &renderer, None, 1.0, &|| {});
        }
        assert_eq!(renderer.snapshot().dither, before);
        handle_key(KeyCode::Char('d'), &shared, &renderer, None, 1.0, &|| {});
        assert_ne!(renderer.snapshot().dither, DitherMode::Bayer4);
    }

    #[test]
    fn gamma_and_contrast_nudges() {
        let (shared, renderer) = fixture();
        let gamma = renderer.snapshot().gamma;
        handle_key(KeyCode::Char('G'), &shared, &renderer, None, 1.0, &|| {});
        assert!((renderer.snapshot().gamma - (gamma + 0.1)).abs() < 1e-5);
        handle_key(KeyCode::Char('b'), &shared, &renderer, None, 1.0, &|| {});
        assert!((renderer.snapshot().contrast - 0.9).abs() < 1e-5);
    }

    #[test]
    fn reapply_keeps_config_identical() {
        let (shared, renderer) = fixture();
        let before = renderer.snapshot();
        handle_key(KeyCode::Char('r'), &shared, &renderer, None, 1.0, &|| {});
        assert_eq!(renderer.snapshot(), before);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let (shared, renderer) = fixture();
        let before = renderer.snapshot();
        handle_key(KeyCode::Char('z'), &shared, &renderer, None, 1.0, &|| {});
        handle_key(KeyCode::Esc, &shared, &renderer, None, 1.0, &|| {});
        assert_eq!(renderer.snapshot(), before);
        assert!(shared.running());
    }
}
