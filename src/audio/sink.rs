use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};

use crate::{audio::track::Track, error::MusicResult};

/// Called with the playback generation of a track that stopped producing
/// audio, whether it ended, errored or was stopped.
pub type FinishedCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// A single audio stream into one voice channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Joins the voice channel. Fails with `MusicError::Connection`.
    async fn connect(&self, channel_id: ChannelId) -> MusicResult<()>;

    /// Starts `track`, replacing whatever was playing. `generation` is
    /// handed back through the finished callback.
    async fn play(&self, track: &Track, generation: u64);

    async fn pause(&self);

    async fn resume(&self);

    /// Moves the playhead. Returns `false` if the backend rejected it.
    async fn seek(&self, position: Duration) -> bool;

    async fn stop(&self);

    /// Stops playback and leaves the voice channel.
    async fn disconnect(&self);
}

/// Creates one sink per guild session.
pub trait AudioBackend: Send + Sync {
    fn create_sink(&self, guild_id: GuildId, on_finished: FinishedCallback) -> Arc<dyn AudioSink>;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::error::MusicError;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum SinkCall {
        Connect(ChannelId),
        Play(String, u64),
        Pause,
        Resume,
        Seek(Duration),
        Stop,
        Disconnect,
    }

    /// Sink that records every call and succeeds unless told otherwise.
    #[derive(Default)]
    pub struct RecordingSink {
        calls: Mutex<Vec<SinkCall>>,
        fail_connect: bool,
        reject_seek: bool,
    }

    impl RecordingSink {
        pub fn failing_connect() -> Self {
            Self {
                fail_connect: true,
                ..Default::default()
            }
        }

        pub fn rejecting_seek() -> Self {
            Self {
                reject_seek: true,
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<SinkCall> {
            self.calls.lock().clone()
        }

        pub fn last_generation(&self) -> Option<u64> {
            self.calls.lock().iter().rev().find_map(|call| match call {
                SinkCall::Play(_, generation) => Some(*generation),
                _ => None,
            })
        }
    }

    #[async_trait]
    impl AudioSink for RecordingSink {
        async fn connect(&self, channel_id: ChannelId) -> MusicResult<()> {
            self.calls.lock().push(SinkCall::Connect(channel_id));
            if self.fail_connect {
                return Err(MusicError::Connection("channel is full".into()));
            }
            Ok(())
        }

        async fn play(&self, track: &Track, generation: u64) {
            self.calls.lock().push(SinkCall::Play(track.title().to_string(), generation));
        }

        async fn pause(&self) {
            self.calls.lock().push(SinkCall::Pause);
        }

        async fn resume(&self) {
            self.calls.lock().push(SinkCall::Resume);
        }

        async fn seek(&self, position: Duration) -> bool {
            self.calls.lock().push(SinkCall::Seek(position));
            !self.reject_seek
        }

        async fn stop(&self) {
            self.calls.lock().push(SinkCall::Stop);
        }

        async fn disconnect(&self) {
            self.calls.lock().push(SinkCall::Disconnect);
        }
    }

    /// Backend handing out one shared recording sink.
    #[derive(Default)]
    pub struct RecordingBackend {
        pub sink: Arc<RecordingSink>,
    }

    impl AudioBackend for RecordingBackend {
        fn create_sink(&self, _guild_id: GuildId, _on_finished: FinishedCallback) -> Arc<dyn AudioSink> {
            self.sink.clone()
        }
    }
}
