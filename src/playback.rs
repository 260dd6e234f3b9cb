use std::time::Duration;

use tracing::{debug, info};

use crate::config::{MarkerConfig, QUIT_KEY};
use crate::db::ClipStore;
use crate::error::MarkpipeResult;

/// Decoded frame handed to the display sink.
pub type Frame = image::RgbImage;

/// A frame-position interval scheduled for playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: i64,
    pub end: i64,
}

/// Why playback of an interval ended. Only `Quit` aborts the rest of the
/// scheduled list; the other two just move on to the next interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Quit,
    EndOfStream,
    IntervalDone,
}

/// Frame source contract. Positions are frame indices; `position` reports the
/// index of the frame `next_frame` will produce next.
pub trait Decoder {
    fn position(&self) -> i64;
    fn seek(&mut self, frame: i64) -> MarkpipeResult<()>;
    fn next_frame(&mut self) -> MarkpipeResult<Option<Frame>>;
    fn frame_count(&self) -> i64;
    fn fps(&self) -> f64;
}

pub trait DisplaySink {
    fn show(&mut self, frame: &Frame) -> MarkpipeResult<()>;
}

pub trait InputSource {
    /// Non-blocking-ish poll for one pending key, bounded by `timeout`.
    fn poll_key(&mut self, timeout: Duration) -> MarkpipeResult<Option<char>>;
}

const KEY_POLL_TIMEOUT: Duration = Duration::from_millis(1);

/// Drives one playback session: advance a frame, show it, poll for one key,
/// react, repeat. Marking persists synchronously inside the same step that
/// saw the key, so a marked clip is durable before the next frame renders.
pub struct PlaybackController<'a, D, S, I> {
    decoder: D,
    display: S,
    input: I,
    store: &'a ClipStore,
    config: MarkerConfig,
    pre_roll: i64,
    post_roll: i64,
}

impl<'a, D, S, I> PlaybackController<'a, D, S, I>
where
    D: Decoder,
    S: DisplaySink,
    I: InputSource,
{
    pub fn new(decoder: D, display: S, input: I, store: &'a ClipStore, config: MarkerConfig) -> Self {
        let fps = decoder.fps();
        let pre_roll = config.pre_roll_frames(fps);
        let post_roll = config.post_roll_frames(fps);
        debug!(
            "roll window at {} fps: -{} / +{} frames",
            fps, pre_roll, post_roll
        );
        Self {
            decoder,
            display,
            input,
            store,
            config,
            pre_roll,
            post_roll,
        }
    }

    /// Read access to the decoder, for position introspection after a run.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Play the whole stream, or only the stored clips of the requested
    /// categories when any are given. Categories play in request order, clips
    /// within a category in store order.
    pub fn run(&mut self, events: &[i64]) -> MarkpipeResult<StopReason> {
        let intervals = self.schedule(events)?;
        info!("playing {} interval(s)", intervals.len());
        self.play_intervals(&intervals)
    }

    fn schedule(&self, events: &[i64]) -> MarkpipeResult<Vec<Interval>> {
        if events.is_empty() {
            return Ok(vec![Interval {
                start: 0,
                end: self.decoder.frame_count(),
            }]);
        }
        let mut intervals = Vec::new();
        for &event in events {
            let clips = self.store.load(event)?;
            debug!("event {}: {} stored clip(s)", event, clips.len());
            intervals.extend(clips.iter().map(|clip| Interval {
                start: clip.start,
                end: clip.end,
            }));
        }
        Ok(intervals)
    }

    fn play_intervals(&mut self, intervals: &[Interval]) -> MarkpipeResult<StopReason> {
        let mut reason = StopReason::IntervalDone;
        for interval in intervals {
            reason = self.play_interval(interval)?;
            if reason == StopReason::Quit {
                info!("quit requested, dropping remaining intervals");
                break;
            }
        }
        Ok(reason)
    }

    fn play_interval(&mut self, interval: &Interval) -> MarkpipeResult<StopReason> {
        debug!("interval [{}, {}]", interval.start, interval.end);
        self.decoder.seek(interval.start)?;
        while self.decoder.position() < interval.end {
            let frame = match self.decoder.next_frame()? {
                Some(frame) => frame,
                None => return Ok(StopReason::EndOfStream),
            };
            self.display.show(&frame)?;
            if let Some(key) = self.input.poll_key(KEY_POLL_TIMEOUT)? {
                if key == QUIT_KEY {
                    return Ok(StopReason::Quit);
                }
                if let Some(category) = self.config.category_for(key) {
                    self.mark(category)?;
                }
                // any other key is ignored
            }
        }
        Ok(StopReason::IntervalDone)
    }

    // Marker action: derive the clip window from the current position and
    // persist it. Playback neither pauses nor seeks.
    fn mark(&mut self, category: i64) -> MarkpipeResult<()> {
        let position = self.decoder.position();
        let start = (position - self.pre_roll).max(0);
        let end = position + self.post_roll;
        info!(
            "marked event {} at frame {} -> [{}, {}]",
            category, position, start, end
        );
        self.store.save(category, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct FakeDecoder {
        position: i64,
        frames: i64,
        fps: f64,
    }

    impl FakeDecoder {
        fn new(frames: i64, fps: f64) -> Self {
            Self {
                position: 0,
                frames,
                fps,
            }
        }
    }

    impl Decoder for FakeDecoder {
        fn position(&self) -> i64 {
            self.position
        }

        fn seek(&mut self, frame: i64) -> MarkpipeResult<()> {
            self.position = frame;
            Ok(())
        }

        fn next_frame(&mut self) -> MarkpipeResult<Option<Frame>> {
            if self.position >= self.frames {
                return Ok(None);
            }
            self.position += 1;
            Ok(Some(Frame::new(2, 2)))
        }

        fn frame_count(&self) -> i64 {
            self.frames
        }

        fn fps(&self) -> f64 {
            self.fps
        }
    }

    struct CountingDisplay {
        shown: usize,
    }

    impl DisplaySink for CountingDisplay {
        fn show(&mut self, _frame: &Frame) -> MarkpipeResult<()> {
            self.shown += 1;
            Ok(())
        }
    }

    // One scripted entry per poll; silence once the script runs out.
    struct ScriptedInput {
        script: VecDeque<Option<char>>,
    }

    impl ScriptedInput {
        fn new(script: Vec<Option<char>>) -> Self {
            Self {
                script: script.into(),
            }
        }

        fn silent() -> Self {
            Self {
                script: VecDeque::new(),
            }
        }
    }

    impl InputSource for ScriptedInput {
        fn poll_key(&mut self, _timeout: Duration) -> MarkpipeResult<Option<char>> {
            Ok(self.script.pop_front().unwrap_or(None))
        }
    }

    #[test]
    fn test_full_playback_covers_the_stream() {
        let store = ClipStore::open_in_memory().unwrap();
        let display = CountingDisplay { shown: 0 };
        let mut controller = PlaybackController::new(
            FakeDecoder::new(30, 25.0),
            display,
            ScriptedInput::silent(),
            &store,
            MarkerConfig::default(),
        );

        let reason = controller.run(&[]).unwrap();

        assert_eq!(reason, StopReason::IntervalDone);
        assert_eq!(controller.display.shown, 30);
    }

    #[test]
    fn test_marker_window_around_position() {
        let store = ClipStore::open_in_memory().unwrap();
        // at 25 fps the reference rolls are 50 and 125 frames
        let mut controller = PlaybackController::new(
            FakeDecoder::new(2000, 25.0),
            CountingDisplay { shown: 0 },
            ScriptedInput::new(vec![None, None, Some('4')]),
            &store,
            MarkerConfig::default(),
        );

        controller.run(&[]).unwrap();

        let clips = store.load(4).unwrap();
        assert_eq!(clips.len(), 1);
        // marked after frame 3 was shown, position 3, early enough to clamp
        assert_eq!(clips[0].start, 0);
        assert_eq!(clips[0].end, 3 + 125);
    }

    #[test]
    fn test_marker_clamps_start_to_zero() {
        let store = ClipStore::open_in_memory().unwrap();
        let mut controller = PlaybackController::new(
            FakeDecoder::new(10_000, 1000.0),
            CountingDisplay { shown: 0 },
            ScriptedInput::new(vec![None; 499].into_iter().chain([Some('1')]).collect()),
            &store,
            MarkerConfig::default(),
        );

        controller.run(&[]).unwrap();

        // position 500 with a 2000-frame pre roll clamps to zero
        let clips = store.load(1).unwrap();
        assert_eq!(clips[0].start, 0);
        assert_eq!(clips[0].end, 5500);
    }

    #[test]
    fn test_marker_window_mid_stream() {
        let store = ClipStore::open_in_memory().unwrap();
        let mut controller = PlaybackController::new(
            FakeDecoder::new(20_000, 1000.0),
            CountingDisplay { shown: 0 },
            ScriptedInput::new(
                vec![None; 9999]
                    .into_iter()
                    .chain([Some('2')])
                    .collect(),
            ),
            &store,
            MarkerConfig::default(),
        );

        controller.run(&[]).unwrap();

        let clips = store.load(2).unwrap();
        assert_eq!(clips[0].start, 8000);
        assert_eq!(clips[0].end, 15_000);
    }

    #[test]
    fn test_quit_stops_playback() {
        let store = ClipStore::open_in_memory().unwrap();
        let display = CountingDisplay { shown: 0 };
        let mut controller = PlaybackController::new(
            FakeDecoder::new(100, 25.0),
            display,
            ScriptedInput::new(vec![None, None, Some('q')]),
            &store,
            MarkerConfig::default(),
        );

        let reason = controller.run(&[]).unwrap();

        assert_eq!(reason, StopReason::Quit);
        assert_eq!(controller.display.shown, 3);
    }

    #[test]
    fn test_unbound_keys_are_ignored() {
        let store = ClipStore::open_in_memory().unwrap();
        let mut controller = PlaybackController::new(
            FakeDecoder::new(5, 25.0),
            CountingDisplay { shown: 0 },
            ScriptedInput::new(vec![Some('x'), Some('0'), Some(' ')]),
            &store,
            MarkerConfig::default(),
        );

        let reason = controller.run(&[]).unwrap();

        assert_eq!(reason, StopReason::IntervalDone);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_filtered_playback_visits_categories_in_request_order() {
        let store = ClipStore::open_in_memory().unwrap();
        // saved out of order on purpose
        store.save(5, 200, 210).unwrap();
        store.save(3, 400, 410).unwrap();
        store.save(3, 100, 110).unwrap();

        let mut controller = PlaybackController::new(
            FakeDecoder::new(1000, 25.0),
            CountingDisplay { shown: 0 },
            ScriptedInput::silent(),
            &store,
            MarkerConfig::default(),
        );

        let intervals = controller.schedule(&[3, 5]).unwrap();
        assert_eq!(
            intervals,
            vec![
                Interval {
                    start: 100,
                    end: 110
                },
                Interval {
                    start: 400,
                    end: 410
                },
                Interval {
                    start: 200,
                    end: 210
                },
            ]
        );

        let reason = controller.run(&[3, 5]).unwrap();
        assert_eq!(reason, StopReason::IntervalDone);
        assert_eq!(controller.display.shown, 30);
    }

    #[test]
    fn test_empty_category_contributes_nothing() {
        let store = ClipStore::open_in_memory().unwrap();
        store.save(2, 10, 12).unwrap();

        let mut controller = PlaybackController::new(
            FakeDecoder::new(100, 25.0),
            CountingDisplay { shown: 0 },
            ScriptedInput::silent(),
            &store,
            MarkerConfig::default(),
        );

        let reason = controller.run(&[8, 2]).unwrap();

        assert_eq!(reason, StopReason::IntervalDone);
        assert_eq!(controller.display.shown, 2);
    }

    #[test]
    fn test_quit_aborts_remaining_intervals() {
        let store = ClipStore::open_in_memory().unwrap();
        store.save(1, 0, 10).unwrap();
        store.save(1, 20, 30).unwrap();
        store.save(1, 40, 50).unwrap();

        let display = CountingDisplay { shown: 0 };
        let mut controller = PlaybackController::new(
            FakeDecoder::new(100, 25.0),
            display,
            // quit during the second interval
            ScriptedInput::new(
                vec![None; 12].into_iter().chain([Some('q')]).collect(),
            ),
            &store,
            MarkerConfig::default(),
        );

        let reason = controller.run(&[1]).unwrap();

        assert_eq!(reason, StopReason::Quit);
        // 10 frames of the first interval, 3 of the second, none of the third
        assert_eq!(controller.display.shown, 13);
    }

    #[test]
    fn test_marking_stays_active_during_filtered_replay() {
        let store = ClipStore::open_in_memory().unwrap();
        store.save(3, 100, 120).unwrap();

        let mut controller = PlaybackController::new(
            FakeDecoder::new(10_000, 25.0),
            CountingDisplay { shown: 0 },
            ScriptedInput::new(vec![None, Some('7')]),
            &store,
            MarkerConfig::default(),
        );

        controller.run(&[3]).unwrap();

        let marked = store.load(7).unwrap();
        assert_eq!(marked.len(), 1);
        // two frames into the replayed clip, position 102
        assert_eq!(marked[0].start, 102 - 50);
        assert_eq!(marked[0].end, 102 + 125);
    }

    #[test]
    fn test_end_of_stream_ends_interval_gracefully() {
        let store = ClipStore::open_in_memory().unwrap();
        // stored end reaches past the stream, playback stops at its edge
        store.save(6, 90, 500).unwrap();

        let display = CountingDisplay { shown: 0 };
        let mut controller = PlaybackController::new(
            FakeDecoder::new(100, 25.0),
            display,
            ScriptedInput::silent(),
            &store,
            MarkerConfig::default(),
        );

        let reason = controller.run(&[6]).unwrap();

        assert_eq!(reason, StopReason::EndOfStream);
        assert_eq!(controller.display.shown, 10);
    }
}
